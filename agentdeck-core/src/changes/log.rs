//! Change log storage
//!
//! [`ChangeLog`] is the storage seam of the tracker. [`crate::db::Database`]
//! persists to SQLite; [`MemoryChangeLog`] keeps everything in memory.

use crate::error::Result;
use crate::types::{Change, ResourceId};
use std::sync::Mutex;

/// Append-only store of [`Change`] entries.
///
/// Implementations must serialize appends so each resource's history stays
/// in the order its changes were recorded.
pub trait ChangeLog: Send + Sync {
    /// Append one entry.
    fn append(&self, change: &Change) -> Result<()>;

    /// All entries for a resource, oldest first.
    fn history(&self, resource_id: &ResourceId) -> Result<Vec<Change>>;

    /// One entry of a resource's history.
    fn find(&self, resource_id: &ResourceId, change_id: &str) -> Result<Option<Change>> {
        Ok(self
            .history(resource_id)?
            .into_iter()
            .find(|c| c.id == change_id))
    }
}

/// In-memory change log.
#[derive(Debug, Default)]
pub struct MemoryChangeLog {
    entries: Mutex<Vec<Change>>,
}

impl MemoryChangeLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ChangeLog for MemoryChangeLog {
    fn append(&self, change: &Change) -> Result<()> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(change.clone());
        Ok(())
    }

    fn history(&self, resource_id: &ResourceId) -> Result<Vec<Change>> {
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|c| &c.resource_id == resource_id)
            .cloned()
            .collect())
    }
}
