//! Bounded, persisted transition history

use tracing::warn;

use crate::errors::MonitorError;
use crate::filesys::file::File;
use crate::models::service::HistoryEntry;

/// Maximum entries retained in the ledger
pub const DEFAULT_CAPACITY: usize = 20;

/// Most-recent-first log of status transitions.
///
/// The owner persists after every mutation; the cost of frequent small
/// writes is accepted so no transition is lost across a restart.
#[derive(Debug)]
pub struct HistoryLedger {
    entries: Vec<HistoryEntry>,
    capacity: usize,
}

impl HistoryLedger {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            capacity,
        }
    }

    /// Entries, most recent first
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert at the front and truncate to capacity immediately
    pub fn append(&mut self, entry: HistoryEntry) {
        self.entries.insert(0, entry);
        self.entries.truncate(self.capacity);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Load from file. An absent, unreadable or corrupt store degrades to
    /// an empty ledger rather than failing startup.
    pub async fn load(file: &File, capacity: usize) -> Self {
        let mut ledger = Self::new(capacity);

        if !file.exists().await {
            return ledger;
        }

        match file.read_json::<Vec<HistoryEntry>>().await {
            Ok(mut entries) => {
                entries.truncate(capacity);
                ledger.entries = entries;
            }
            Err(e) => {
                warn!("Discarding unreadable history file: {}", e);
            }
        }

        ledger
    }

    /// Persist the ledger to the given file
    pub async fn persist(&self, file: &File) -> Result<(), MonitorError> {
        file.write_json(&self.entries).await
    }
}
