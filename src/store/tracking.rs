//! Change tracking between reads and writes of a store

use crate::path::{Path, Segment};
use std::collections::BTreeSet;

/// Keys modified or removed since tracking was last cleared
///
/// `updated` and `deleted` never share an entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub updated: BTreeSet<String>,
    pub deleted: BTreeSet<String>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.updated.is_empty() && self.deleted.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct ChangeTracker {
    changes: ChangeSet,
}

impl ChangeTracker {
    pub fn changes(&self) -> &ChangeSet {
        &self.changes
    }

    pub fn mark_updated(&mut self, key: &str) {
        self.changes.deleted.remove(key);
        self.changes.updated.insert(key.to_string());
    }

    pub fn mark_deleted(&mut self, key: &str) {
        self.changes.updated.remove(key);
        self.changes.deleted.insert(key.to_string());
    }

    /// Record a write at `path`
    pub fn record_set(&mut self, path: &Path) {
        self.mark_updated(&path.root().as_key());
        if !path.is_top_level() {
            self.mark_updated(&path.to_string());
        }
    }

    /// Record a removal at `path`
    ///
    /// Removing a top-level entry drops pending updates nested under it.
    /// Removing a nested value still leaves its top-level entry in place,
    /// so that entry counts as updated.
    pub fn record_unset(&mut self, path: &Path) {
        if path.is_top_level() {
            let root = path.root().as_key();
            // A digit key is spelled `1.a` when set through an index and
            // `['1'].a` when set through a quoted key
            let mut prefixes = vec![Path::top_level(&root).to_string()];
            if matches!(Segment::key(&root), Segment::Index(_)) {
                prefixes.push(root.to_string());
            }
            self.changes.updated.retain(|entry| {
                !prefixes
                    .iter()
                    .any(|prefix| is_nested_under(entry, prefix))
            });
            self.mark_deleted(&root);
        } else {
            self.mark_deleted(&path.to_string());
            self.mark_updated(&path.root().as_key());
        }
    }

    /// Replace the tracked state after a full content reset
    pub fn reset(&mut self, old_keys: &[String], new_keys: &[String]) {
        let updated: BTreeSet<String> = new_keys.iter().cloned().collect();
        let deleted = old_keys
            .iter()
            .chain(self.changes.deleted.iter())
            .filter(|key| !updated.contains(*key))
            .cloned()
            .collect();
        self.changes = ChangeSet { updated, deleted };
    }

    pub fn clear(&mut self) {
        self.changes = ChangeSet::default();
    }
}

fn is_nested_under(entry: &str, key: &str) -> bool {
    entry
        .strip_prefix(key)
        .is_some_and(|rest| rest.starts_with('.') || rest.starts_with('['))
}
