use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, RwLock};

use super::{Progress, ProgressError};
use crate::core::ContentHash;

/// Ledger kept in memory. Also records every narrated line so tests can
/// inspect what a migration reported.
#[derive(Clone, Default)]
pub struct MemoryProgress {
    entries: Arc<RwLock<BTreeMap<ContentHash, ContentHash>>>,
    messages: Arc<Mutex<Vec<String>>>,
}

impl MemoryProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().map(|m| m.clone()).unwrap_or_default()
    }
}

impl Progress for MemoryProgress {
    fn has(&self, legacy: &ContentHash) -> Result<bool, ProgressError> {
        let entries = self.entries.read().map_err(|_| ProgressError::Poisoned)?;
        Ok(entries.contains_key(legacy))
    }

    fn get(&self, legacy: &ContentHash) -> Result<ContentHash, ProgressError> {
        let entries = self.entries.read().map_err(|_| ProgressError::Poisoned)?;
        entries
            .get(legacy)
            .copied()
            .ok_or(ProgressError::Missing(*legacy))
    }

    fn put(&self, legacy: ContentHash, migrated: ContentHash) -> Result<(), ProgressError> {
        let mut entries = self.entries.write().map_err(|_| ProgressError::Poisoned)?;
        match entries.get(&legacy) {
            Some(existing) if *existing != migrated => Err(ProgressError::Conflict {
                legacy,
                existing: *existing,
                new: migrated,
            }),
            Some(_) => Ok(()),
            None => {
                entries.insert(legacy, migrated);
                Ok(())
            }
        }
    }

    fn log(&self, message: fmt::Arguments<'_>) {
        tracing::info!(target: "migrate::progress", "{message}");
        if let Ok(mut messages) = self.messages.lock() {
            messages.push(message.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_ledger_contract() {
        let ledger = MemoryProgress::new();
        super::super::tests::check_ledger_contract(&ledger);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn log_is_recorded() {
        let ledger = MemoryProgress::new();
        ledger.log(format_args!("migrating {}", 3));
        assert_eq!(ledger.messages(), vec!["migrating 3".to_string()]);
    }
}
