use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::watch;

/// Save indicator shown next to the form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveStatus {
    Idle,
    Saving,
    Saved,
    Error,
}

impl SaveStatus {
    /// Text for the UI indicator; empty while idle.
    pub fn label(&self) -> &'static str {
        match self {
            SaveStatus::Idle => "",
            SaveStatus::Saving => "Saving…",
            SaveStatus::Saved => "Saved",
            SaveStatus::Error => "Failed to save",
        }
    }
}

impl fmt::Display for SaveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SaveStatus::Idle => "idle",
            SaveStatus::Saving => "saving",
            SaveStatus::Saved => "saved",
            SaveStatus::Error => "error",
        };
        f.write_str(name)
    }
}

/// Read-only `{status, error}` view exposed to observers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub status: SaveStatus,
    pub error: Option<String>,
    pub last_saved_at: Option<DateTime<Utc>>,
}

impl Default for StatusSnapshot {
    fn default() -> Self {
        Self {
            status: SaveStatus::Idle,
            error: None,
            last_saved_at: None,
        }
    }
}

/// Owns the watch channel; only the saver writes to it.
#[derive(Debug)]
pub(crate) struct StatusCell {
    tx: watch::Sender<StatusSnapshot>,
}

impl StatusCell {
    pub(crate) fn new() -> Self {
        let (tx, _rx) = watch::channel(StatusSnapshot::default());
        Self { tx }
    }

    pub(crate) fn current(&self) -> StatusSnapshot {
        self.tx.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
        self.tx.subscribe()
    }

    pub(crate) fn begin_flush(&self) {
        self.tx.send_modify(|s| {
            s.status = SaveStatus::Saving;
            s.error = None;
        });
    }

    pub(crate) fn succeed(&self) {
        self.tx.send_modify(|s| {
            s.status = SaveStatus::Saved;
            s.error = None;
            s.last_saved_at = Some(Utc::now());
        });
    }

    pub(crate) fn fail(&self, message: String) {
        self.tx.send_modify(|s| {
            s.status = SaveStatus::Error;
            s.error = Some(message);
        });
    }
}
