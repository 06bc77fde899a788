//! Debounced auto-save for form sections.
//!
//! An [`AutoSaver`] collects field edits addressed by dot-path, coalesces
//! them, and writes them as a single patch after a quiet period, on demand,
//! or when the session ends. [`AutoSaveManager`] keeps one saver per
//! (record, section).

pub mod config;
pub mod dot_path;
pub mod errors;
pub mod http_writer;
pub mod invalidation;
pub mod manager;
pub mod pending;
pub mod saver;
pub mod status;
pub mod writer;

pub use config::{AutoSaveConfig, EndpointConfig, DEFAULT_DEBOUNCE_MS};
pub use dot_path::{expand_dot_paths, flatten_value, validate_path};
pub use errors::{AutoSaveError, AutoSaveResult, ConfigError, WriteError};
pub use http_writer::HttpSectionWriter;
pub use invalidation::{CacheInvalidator, Invalidation, InvalidationBus, NoopInvalidator};
pub use manager::AutoSaveManager;
pub use pending::PendingChangeSet;
pub use saver::{AutoSaver, FocusedInput};
pub use status::{SaveStatus, StatusSnapshot};
pub use writer::{SectionKey, SectionWriter};
