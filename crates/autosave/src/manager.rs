use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::config::AutoSaveConfig;
use crate::errors::{AutoSaveError, AutoSaveResult};
use crate::invalidation::CacheInvalidator;
use crate::saver::AutoSaver;
use crate::writer::{SectionKey, SectionWriter};

/// Registry of independent [`AutoSaver`] sessions, one per (record, section).
///
/// Sessions share the writer, the invalidator and the configuration but never
/// their pending edits or timers.
pub struct AutoSaveManager {
    config: AutoSaveConfig,
    writer: Arc<dyn SectionWriter>,
    invalidator: Arc<dyn CacheInvalidator>,
    sessions: RwLock<HashMap<SectionKey, Arc<AutoSaver>>>,
    locked_records: RwLock<HashSet<String>>,
}

impl AutoSaveManager {
    pub fn new(
        config: AutoSaveConfig,
        writer: Arc<dyn SectionWriter>,
        invalidator: Arc<dyn CacheInvalidator>,
    ) -> AutoSaveResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            writer,
            invalidator,
            sessions: RwLock::new(HashMap::new()),
            locked_records: RwLock::new(HashSet::new()),
        })
    }

    pub fn config(&self) -> &AutoSaveConfig {
        &self.config
    }

    /// Returns the open session for `key`, creating it on first use.
    ///
    /// A new session of a locked record starts disabled.
    pub fn session(&self, key: &SectionKey) -> AutoSaveResult<Arc<AutoSaver>> {
        if let Some(existing) = self.sessions.read().get(key) {
            return Ok(Arc::clone(existing));
        }

        let mut sessions = self.sessions.write();
        if let Some(existing) = sessions.get(key) {
            return Ok(Arc::clone(existing));
        }

        let saver = Arc::new(AutoSaver::new(
            key.clone(),
            &self.config,
            Arc::clone(&self.writer),
            Arc::clone(&self.invalidator),
        )?);
        if self.locked_records.read().contains(&key.record_id) {
            saver.set_disabled(true);
        }

        sessions.insert(key.clone(), Arc::clone(&saver));
        debug!(target: "autosave::manager", %key, open = sessions.len(), "session opened");
        Ok(saver)
    }

    /// Disposes and forgets the session. Returns `false` if none was open.
    pub fn close(&self, key: &SectionKey) -> bool {
        let removed = self.sessions.write().remove(key);
        match removed {
            Some(saver) => {
                saver.dispose();
                debug!(target: "autosave::manager", %key, "session closed");
                true
            }
            None => false,
        }
    }

    /// Locks or unlocks every open and future section of a record.
    pub fn set_record_disabled(&self, record_id: &str, disabled: bool) {
        {
            let mut locked = self.locked_records.write();
            if disabled {
                locked.insert(record_id.to_string());
            } else {
                locked.remove(record_id);
            }
        }

        for (key, saver) in self.sessions.read().iter() {
            if key.record_id == record_id {
                saver.set_disabled(disabled);
            }
        }
        info!(target: "autosave::manager", record_id, disabled, "record lock changed");
    }

    pub fn is_record_disabled(&self, record_id: &str) -> bool {
        self.locked_records.read().contains(record_id)
    }

    /// Flushes every open session; failures are collected into one error.
    pub async fn flush_all(&self) -> AutoSaveResult<()> {
        let sessions = self.open_sessions();
        let total = sessions.len();

        let mut failures = Vec::new();
        for saver in sessions {
            if let Err(e) = saver.flush_now().await {
                error!(target: "autosave::manager", key = %saver.key(), error = %e, "flush failed");
                failures.push(format!("{}: {}", saver.key(), e));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(AutoSaveError::FlushAll {
                failed: failures.len(),
                total,
                details: failures.join("; "),
            })
        }
    }

    /// True while any session has pending edits or a write in flight.
    pub fn should_block_unload(&self) -> bool {
        self.sessions
            .read()
            .values()
            .any(|saver| saver.has_unsaved_changes())
    }

    /// Disposes every session (best-effort teardown writes) and empties the registry.
    pub fn dispose_all(&self) {
        let drained: Vec<Arc<AutoSaver>> =
            self.sessions.write().drain().map(|(_, saver)| saver).collect();
        let count = drained.len();
        for saver in drained {
            saver.dispose();
        }
        if count > 0 {
            info!(target: "autosave::manager", sessions = count as u64, "all sessions disposed");
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }

    fn open_sessions(&self) -> Vec<Arc<AutoSaver>> {
        let mut sessions: Vec<(SectionKey, Arc<AutoSaver>)> = self
            .sessions
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), Arc::clone(v)))
            .collect();
        sessions.sort_by(|a, b| a.0.cmp(&b.0));
        sessions.into_iter().map(|(_, saver)| saver).collect()
    }
}

impl Drop for AutoSaveManager {
    fn drop(&mut self) {
        self.dispose_all();
    }
}
