//! Bug persistence behind a small repository trait.
//!
//! Implementations are synchronous; `BugService` runs them on the blocking
//! pool. Each call is one locked read/modify/write, so concurrent writers to
//! the same record race and the later write wins.

pub mod db;
pub mod memory;

use crate::models::bug::{BugFilter, BugRecord};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("store lock poisoned")]
    Poisoned,
    #[error("record {0} already exists")]
    Duplicate(String),
}

pub trait BugRepository: Send + Sync {
    /// Records matching `filter`, newest first.
    fn list(&self, filter: &BugFilter) -> Result<Vec<BugRecord>, StoreError>;

    fn get(&self, id: &str) -> Result<Option<BugRecord>, StoreError>;

    fn create(&self, record: &BugRecord) -> Result<(), StoreError>;

    /// Replace a stored record. Returns `false` when `record.id` is unknown.
    fn update(&self, record: &BugRecord) -> Result<bool, StoreError>;

    /// Returns `false` when `id` is unknown.
    fn delete(&self, id: &str) -> Result<bool, StoreError>;
}

pub(crate) fn sort_newest_first(records: &mut [BugRecord]) {
    records.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });
}
