use super::{sort_newest_first, BugRepository, StoreError};
use crate::models::bug::{BugFilter, BugRecord};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// Keyed in-memory collection. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryBugRepository {
    bugs: Mutex<HashMap<String, BugRecord>>,
}

impl MemoryBugRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, BugRecord>>, StoreError> {
        self.bugs.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl BugRepository for MemoryBugRepository {
    fn list(&self, filter: &BugFilter) -> Result<Vec<BugRecord>, StoreError> {
        let bugs = self.lock()?;
        let mut out: Vec<BugRecord> = bugs
            .values()
            .filter(|bug| filter.matches(bug))
            .cloned()
            .collect();
        sort_newest_first(&mut out);
        Ok(out)
    }

    fn get(&self, id: &str) -> Result<Option<BugRecord>, StoreError> {
        Ok(self.lock()?.get(id).cloned())
    }

    fn create(&self, record: &BugRecord) -> Result<(), StoreError> {
        let mut bugs = self.lock()?;
        if bugs.contains_key(&record.id) {
            return Err(StoreError::Duplicate(record.id.clone()));
        }
        bugs.insert(record.id.clone(), record.clone());
        Ok(())
    }

    fn update(&self, record: &BugRecord) -> Result<bool, StoreError> {
        let mut bugs = self.lock()?;
        match bugs.get_mut(&record.id) {
            Some(slot) => {
                *slot = record.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.lock()?.remove(id).is_some())
    }
}
