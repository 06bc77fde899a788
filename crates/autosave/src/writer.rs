use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::errors::WriteError;

/// Addresses one write target: a section of a record (e.g. report `r-42`, section `claimant`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SectionKey {
    pub record_id: String,
    pub section: String,
}

impl SectionKey {
    pub fn new(record_id: impl Into<String>, section: impl Into<String>) -> Self {
        Self {
            record_id: record_id.into(),
            section: section.into(),
        }
    }
}

impl fmt::Display for SectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.record_id, self.section)
    }
}

/// Performs the single network write of a flush.
///
/// `patch` is the dot-path-expanded object of changed fields. An `Err`
/// surfaces as the `error` status; `Ok` marks the section saved and
/// triggers cache invalidation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SectionWriter: Send + Sync {
    async fn write(&self, key: &SectionKey, patch: Value) -> Result<(), WriteError>;
}
