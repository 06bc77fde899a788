use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use autosave::{SectionKey, SectionWriter, WriteError};

/// Dry-run writer: one JSON line per flush on stdout.
pub struct StdoutWriter;

#[async_trait]
impl SectionWriter for StdoutWriter {
    async fn write(&self, key: &SectionKey, patch: Value) -> Result<(), WriteError> {
        let line = json!({
            "record_id": key.record_id,
            "section": key.section,
            "patch": patch,
        });
        let rendered =
            serde_json::to_string(&line).map_err(|e| WriteError::Serialization(e.to_string()))?;
        println!("{}", rendered);
        Ok(())
    }
}

/// Counts writes and failures of the wrapped writer for the replay summary.
pub struct CountingWriter {
    inner: Arc<dyn SectionWriter>,
    writes: AtomicUsize,
    failures: AtomicUsize,
}

impl CountingWriter {
    pub fn new(inner: Arc<dyn SectionWriter>) -> Self {
        Self {
            inner,
            writes: AtomicUsize::new(0),
            failures: AtomicUsize::new(0),
        }
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn failures(&self) -> usize {
        self.failures.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SectionWriter for CountingWriter {
    async fn write(&self, key: &SectionKey, patch: Value) -> Result<(), WriteError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let result = self.inner.write(key, patch).await;
        if result.is_err() {
            self.failures.fetch_add(1, Ordering::SeqCst);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysFails;

    #[async_trait]
    impl SectionWriter for AlwaysFails {
        async fn write(&self, _key: &SectionKey, _patch: Value) -> Result<(), WriteError> {
            Err(WriteError::Rejected("nope".to_string()))
        }
    }

    #[tokio::test]
    async fn test_counting_writer_tracks_failures() {
        let writer = CountingWriter::new(Arc::new(AlwaysFails));
        let key = SectionKey::new("r-1", "fees");

        assert!(writer.write(&key, json!({"a": 1})).await.is_err());
        assert!(writer.write(&key, json!({"a": 2})).await.is_err());

        assert_eq!(writer.writes(), 2);
        assert_eq!(writer.failures(), 2);
    }

    #[tokio::test]
    async fn test_stdout_writer_succeeds() {
        let writer = CountingWriter::new(Arc::new(StdoutWriter));
        writer
            .write(&SectionKey::new("r-1", "fees"), json!({"base": 1}))
            .await
            .unwrap();
        assert_eq!(writer.writes(), 1);
        assert_eq!(writer.failures(), 0);
    }
}
