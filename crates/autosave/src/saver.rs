//! Field change accumulator & flusher.
//!
//! Edits are recorded synchronously into a [`PendingChangeSet`]. Each edit
//! re-arms one debounce timer; when it fires (or on [`AutoSaver::flush_now`])
//! the pending set is drained in a single locked step and sent as exactly one
//! write. Edits arriving while that write is in flight go to the next flush.

use parking_lot::Mutex;
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::AutoSaveConfig;
use crate::dot_path::{flatten_value, validate_path};
use crate::errors::{AutoSaveError, AutoSaveResult};
use crate::invalidation::CacheInvalidator;
use crate::pending::PendingChangeSet;
use crate::status::{StatusCell, StatusSnapshot};
use crate::writer::{SectionKey, SectionWriter};

/// The control that currently has focus and may hold a value not yet committed.
pub trait FocusedInput: Send + Sync {
    /// Returns the in-progress `(path, value)` and marks it committed.
    fn take_uncommitted(&self) -> Option<(String, Value)>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlushTrigger {
    Debounce,
    Manual,
    Teardown,
}

impl FlushTrigger {
    fn as_str(&self) -> &'static str {
        match self {
            FlushTrigger::Debounce => "debounce",
            FlushTrigger::Manual => "manual",
            FlushTrigger::Teardown => "teardown",
        }
    }
}

struct SaverState {
    pending: PendingChangeSet,
    timer: Option<JoinHandle<()>>,
    /// Bumped on every arm/cancel; a timer only flushes if its generation is current
    generation: u64,
    in_flight: usize,
    disposed: bool,
    focused: Option<Arc<dyn FocusedInput>>,
}

impl SaverState {
    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        self.generation = self.generation.wrapping_add(1);
    }

    /// Drains the pending set and counts the write as in flight. `None` when empty.
    fn take_for_flush(&mut self) -> Option<PendingChangeSet> {
        if self.pending.is_empty() {
            return None;
        }
        self.in_flight += 1;
        Some(self.pending.take())
    }
}

struct Shared {
    key: SectionKey,
    session_id: Uuid,
    debounce: Duration,
    requeue_on_failure: bool,
    disabled: AtomicBool,
    state: Mutex<SaverState>,
    status: StatusCell,
    writer: Arc<dyn SectionWriter>,
    invalidator: Arc<dyn CacheInvalidator>,
    runtime: Handle,
}

impl Shared {
    fn arm_timer(self: &Arc<Self>, state: &mut SaverState) {
        state.cancel_timer();
        let generation = state.generation;
        let shared = Arc::clone(self);
        let delay = self.debounce;

        state.timer = Some(self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            shared.on_timer_fired(generation).await;
        }));
    }

    async fn on_timer_fired(self: Arc<Self>, generation: u64) {
        let snapshot = {
            let mut state = self.state.lock();
            if state.generation != generation || state.disposed {
                return;
            }
            // Detach: a later edit must not abort the write this task is about to make
            state.timer = None;
            state.take_for_flush()
        };

        if let Some(snapshot) = snapshot {
            // Failure is reported through the status channel
            let _ = self.write_snapshot(snapshot, FlushTrigger::Debounce).await;
        }
    }

    async fn write_snapshot(
        &self,
        snapshot: PendingChangeSet,
        trigger: FlushTrigger,
    ) -> AutoSaveResult<()> {
        let items = snapshot.len();
        let patch = snapshot.expand();

        self.status.begin_flush();
        debug!(
            target: "autosave::saver",
            record_id = %self.key.record_id,
            section = %self.key.section,
            session_id = %self.session_id,
            trigger = trigger.as_str(),
            items_count = items as u64,
            "flush started"
        );

        let started = Instant::now();
        let result = self.writer.write(&self.key, patch).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        {
            let mut state = self.state.lock();
            state.in_flight = state.in_flight.saturating_sub(1);
            if result.is_err() && self.requeue_on_failure && !state.disposed {
                state.pending.merge_under(snapshot);
            }
        }

        match result {
            Ok(()) => {
                self.status.succeed();
                info!(
                    target: "autosave::saver",
                    record_id = %self.key.record_id,
                    section = %self.key.section,
                    trigger = trigger.as_str(),
                    items_count = items as u64,
                    duration_ms = duration_ms,
                    "flush completed"
                );
                self.invalidator.invalidate(&self.key).await;
                Ok(())
            }
            Err(e) => {
                self.status.fail(e.to_string());
                if trigger == FlushTrigger::Teardown {
                    warn!(
                        target: "autosave::saver",
                        record_id = %self.key.record_id,
                        section = %self.key.section,
                        error = %e,
                        "teardown flush failed, edits discarded"
                    );
                } else {
                    error!(
                        target: "autosave::saver",
                        record_id = %self.key.record_id,
                        section = %self.key.section,
                        trigger = trigger.as_str(),
                        items_count = items as u64,
                        duration_ms = duration_ms,
                        requeued = self.requeue_on_failure,
                        error = %e,
                        "flush failed"
                    );
                }
                Err(e.into())
            }
        }
    }
}

/// Debounced accumulator for one (record, section) editing session.
///
/// Must be created inside a tokio runtime; the timer and the teardown write
/// run as tasks on that runtime. Dropping the saver disposes it.
pub struct AutoSaver {
    shared: Arc<Shared>,
}

impl AutoSaver {
    pub fn new(
        key: SectionKey,
        config: &AutoSaveConfig,
        writer: Arc<dyn SectionWriter>,
        invalidator: Arc<dyn CacheInvalidator>,
    ) -> AutoSaveResult<Self> {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|_| AutoSaveError::NoRuntime)?;

        let session_id = Uuid::new_v4();
        debug!(
            target: "autosave::saver",
            record_id = %key.record_id,
            section = %key.section,
            session_id = %session_id,
            debounce_ms = config.debounce_ms,
            "session created"
        );

        Ok(Self {
            shared: Arc::new(Shared {
                key,
                session_id,
                debounce: config.debounce(),
                requeue_on_failure: config.requeue_on_failure,
                disabled: AtomicBool::new(false),
                state: Mutex::new(SaverState {
                    pending: PendingChangeSet::new(),
                    timer: None,
                    generation: 0,
                    in_flight: 0,
                    disposed: false,
                    focused: None,
                }),
                status: StatusCell::new(),
                writer,
                invalidator,
                runtime,
            }),
        })
    }

    pub fn key(&self) -> &SectionKey {
        &self.shared.key
    }

    pub fn session_id(&self) -> Uuid {
        self.shared.session_id
    }

    pub fn debounce(&self) -> Duration {
        self.shared.debounce
    }

    /// Records one edit and re-arms the debounce timer. No I/O.
    ///
    /// Silently ignored while disabled or after [`dispose`](Self::dispose).
    pub fn save_field(&self, path: impl Into<String>, value: Value) -> AutoSaveResult<()> {
        self.save_fields([(path.into(), value)])
    }

    /// Records a batch of edits under one timer re-arm.
    ///
    /// All paths are validated first; on error nothing is recorded.
    pub fn save_fields<I>(&self, entries: I) -> AutoSaveResult<()>
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        if self.is_disabled() {
            return Ok(());
        }

        let entries: Vec<(String, Value)> = entries.into_iter().collect();
        for (path, _) in &entries {
            validate_path(path)?;
        }
        if entries.is_empty() {
            return Ok(());
        }

        let mut state = self.shared.state.lock();
        if state.disposed {
            debug!(
                target: "autosave::saver",
                record_id = %self.shared.key.record_id,
                section = %self.shared.key.section,
                dropped = entries.len() as u64,
                "edit after dispose ignored"
            );
            return Ok(());
        }

        for (path, value) in entries {
            state.pending.insert(path, value);
        }
        self.shared.arm_timer(&mut state);
        Ok(())
    }

    /// Records every leaf of a nested object, e.g. a whole `claimantInfo` sub-form.
    pub fn save_object(&self, prefix: &str, value: &Value) -> AutoSaveResult<()> {
        self.save_fields(flatten_value(prefix, value))
    }

    /// Cancels the timer and writes whatever is pending right now.
    ///
    /// Issues no write when nothing is pending. The write error is also
    /// reported through the status channel.
    pub async fn flush_now(&self) -> AutoSaveResult<()> {
        let snapshot = {
            let mut state = self.shared.state.lock();
            state.cancel_timer();
            state.take_for_flush()
        };

        match snapshot {
            Some(snapshot) => {
                self.shared
                    .write_snapshot(snapshot, FlushTrigger::Manual)
                    .await
            }
            None => {
                debug!(
                    target: "autosave::saver",
                    record_id = %self.shared.key.record_id,
                    section = %self.shared.key.section,
                    "flush skipped, nothing pending"
                );
                Ok(())
            }
        }
    }

    /// Ends the session: commits the focused input, then sends any pending
    /// edits as a detached best-effort write whose error is logged and dropped.
    ///
    /// Never fails and never blocks. Idempotent.
    pub fn dispose(&self) {
        let focused = {
            let mut state = self.shared.state.lock();
            if state.disposed {
                return;
            }
            state.focused.take()
        };

        if let Some(input) = focused {
            if let Some((path, value)) = input.take_uncommitted() {
                self.record_uncommitted(path, value);
            }
        }

        let snapshot = {
            let mut state = self.shared.state.lock();
            state.disposed = true;
            state.cancel_timer();
            state.take_for_flush()
        };

        let Some(snapshot) = snapshot else {
            debug!(
                target: "autosave::saver",
                record_id = %self.shared.key.record_id,
                section = %self.shared.key.section,
                "session disposed"
            );
            return;
        };

        debug!(
            target: "autosave::saver",
            record_id = %self.shared.key.record_id,
            section = %self.shared.key.section,
            items_count = snapshot.len() as u64,
            "session disposed with pending edits, flushing in background"
        );

        let shared = Arc::clone(&self.shared);
        // Errors are logged inside write_snapshot
        drop(self.shared.runtime.spawn(async move {
            let _ = shared.write_snapshot(snapshot, FlushTrigger::Teardown).await;
        }));
    }

    fn record_uncommitted(&self, path: String, value: Value) {
        if self.is_disabled() {
            return;
        }
        if let Err(e) = validate_path(&path) {
            warn!(
                target: "autosave::saver",
                record_id = %self.shared.key.record_id,
                error = %e,
                "focused input returned an invalid path"
            );
            return;
        }
        self.shared.state.lock().pending.insert(path, value);
    }

    /// Takes effect for future edits only; an armed timer or in-flight write proceeds.
    pub fn set_disabled(&self, disabled: bool) {
        self.shared.disabled.store(disabled, Ordering::SeqCst);
    }

    pub fn is_disabled(&self) -> bool {
        self.shared.disabled.load(Ordering::SeqCst)
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.state.lock().disposed
    }

    pub fn set_focused_input(&self, input: Option<Arc<dyn FocusedInput>>) {
        self.shared.state.lock().focused = input;
    }

    pub fn status(&self) -> StatusSnapshot {
        self.shared.status.current()
    }

    pub fn watch_status(&self) -> watch::Receiver<StatusSnapshot> {
        self.shared.status.subscribe()
    }

    /// Edits pending or a write in flight: the page-unload guard should warn.
    pub fn has_unsaved_changes(&self) -> bool {
        let state = self.shared.state.lock();
        !state.pending.is_empty() || state.in_flight > 0
    }

    pub fn pending_len(&self) -> usize {
        self.shared.state.lock().pending.len()
    }

    pub fn pending_snapshot(&self) -> PendingChangeSet {
        self.shared.state.lock().pending.clone()
    }

    pub fn is_timer_armed(&self) -> bool {
        self.shared.state.lock().timer.is_some()
    }
}

impl Drop for AutoSaver {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for AutoSaver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AutoSaver")
            .field("key", &self.shared.key)
            .field("session_id", &self.shared.session_id)
            .field("debounce", &self.shared.debounce)
            .field("disabled", &self.is_disabled())
            .finish_non_exhaustive()
    }
}
