use serde_json::Value;
use std::collections::BTreeMap;

use crate::dot_path::expand_dot_paths;

/// In-memory map of not-yet-written field edits, keyed by dot-path.
///
/// Re-assigning a path overwrites its value (last write wins).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingChangeSet {
    entries: BTreeMap<String, Value>,
}

impl PendingChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value that was replaced, if any.
    pub fn insert(&mut self, path: impl Into<String>, value: Value) -> Option<Value> {
        self.entries.insert(path.into(), value)
    }

    /// Entries of `newer` overwrite ours.
    pub fn merge(&mut self, newer: PendingChangeSet) {
        self.entries.extend(newer.entries);
    }

    /// Re-inserts `older` entries only for paths without a newer value.
    pub fn merge_under(&mut self, older: PendingChangeSet) {
        for (path, value) in older.entries {
            self.entries.entry(path).or_insert(value);
        }
    }

    /// Snapshot and clear in one step.
    pub fn take(&mut self) -> PendingChangeSet {
        std::mem::take(self)
    }

    pub fn get(&self, path: &str) -> Option<&Value> {
        self.entries.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn entries(&self) -> &BTreeMap<String, Value> {
        &self.entries
    }

    /// Wire shape of the write: dotted keys expanded into a nested object.
    pub fn expand(&self) -> Value {
        expand_dot_paths(&self.entries)
    }
}

impl FromIterator<(String, Value)> for PendingChangeSet {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
