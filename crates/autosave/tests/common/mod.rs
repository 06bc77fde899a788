//! Shared test doubles for the autosave behaviour tests.
#![allow(dead_code)]

use async_trait::async_trait;
use autosave::{
    AutoSaveConfig, AutoSaver, CacheInvalidator, FocusedInput, SectionKey, SectionWriter,
    WriteError,
};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct RecordedWrite {
    pub key: SectionKey,
    pub patch: Value,
    pub at: Instant,
}

/// Records every write with its (virtual) time; can fail or block on a gate.
#[derive(Clone, Default)]
pub struct RecordingWriter {
    calls: Arc<Mutex<Vec<RecordedWrite>>>,
    failure: Arc<Mutex<Option<String>>>,
    gate: Option<Arc<Semaphore>>,
}

impl RecordingWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(message: &str) -> Self {
        let writer = Self::default();
        writer.fail_with(Some(message));
        writer
    }

    /// Writes block until [`release`](Self::release) is called once per write.
    pub fn gated() -> Self {
        Self {
            gate: Some(Arc::new(Semaphore::new(0))),
            ..Self::default()
        }
    }

    pub fn release(&self, writes: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(writes);
        }
    }

    pub fn fail_with(&self, message: Option<&str>) {
        *self.failure.lock() = message.map(str::to_string);
    }

    pub fn calls(&self) -> Vec<RecordedWrite> {
        self.calls.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn patches(&self) -> Vec<Value> {
        self.calls.lock().iter().map(|c| c.patch.clone()).collect()
    }
}

#[async_trait]
impl SectionWriter for RecordingWriter {
    async fn write(&self, key: &SectionKey, patch: Value) -> Result<(), WriteError> {
        self.calls.lock().push(RecordedWrite {
            key: key.clone(),
            patch,
            at: Instant::now(),
        });

        if let Some(gate) = &self.gate {
            let permit = gate
                .acquire()
                .await
                .map_err(|_| WriteError::Transport("gate closed".to_string()))?;
            permit.forget();
        }

        match self.failure.lock().clone() {
            Some(message) => Err(WriteError::Rejected(message)),
            None => Ok(()),
        }
    }
}

#[derive(Clone, Default)]
pub struct RecordingInvalidator {
    keys: Arc<Mutex<Vec<SectionKey>>>,
}

impl RecordingInvalidator {
    pub fn keys(&self) -> Vec<SectionKey> {
        self.keys.lock().clone()
    }
}

#[async_trait]
impl CacheInvalidator for RecordingInvalidator {
    async fn invalidate(&self, key: &SectionKey) {
        self.keys.lock().push(key.clone());
    }
}

/// A text field whose typed value has not been blurred yet.
#[derive(Default)]
pub struct FakeFocusedInput {
    pub value: Mutex<Option<(String, Value)>>,
}

impl FakeFocusedInput {
    pub fn typing(path: &str, value: Value) -> Arc<Self> {
        Arc::new(Self {
            value: Mutex::new(Some((path.to_string(), value))),
        })
    }
}

impl FocusedInput for FakeFocusedInput {
    fn take_uncommitted(&self) -> Option<(String, Value)> {
        self.value.lock().take()
    }
}

pub fn key() -> SectionKey {
    SectionKey::new("report-7", "claimant")
}

pub fn saver(debounce_ms: u64, writer: &RecordingWriter) -> AutoSaver {
    saver_with(
        AutoSaveConfig::default().with_debounce_ms(debounce_ms),
        writer,
        &RecordingInvalidator::default(),
    )
}

pub fn saver_with(
    config: AutoSaveConfig,
    writer: &RecordingWriter,
    invalidator: &RecordingInvalidator,
) -> AutoSaver {
    AutoSaver::new(
        key(),
        &config,
        Arc::new(writer.clone()),
        Arc::new(invalidator.clone()),
    )
    .expect("saver should be created inside a runtime")
}

/// Lets spawned tasks run without moving the paused clock.
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

pub fn ms(value: u64) -> Duration {
    Duration::from_millis(value)
}
