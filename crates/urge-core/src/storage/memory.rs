use std::collections::HashMap;

use super::{Store, UsageLog, Write};
use crate::error::StoreError;
use crate::stats::UsageRecord;

/// In-process store for tests and ephemeral sessions.
///
/// `fail_writes` makes every write fail, to exercise the rollback path.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: HashMap<String, String>,
    usage: Vec<UsageRecord>,
    fail_writes: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn check_writable(&self, key: &str) -> Result<(), StoreError> {
        if self.fail_writes {
            return Err(StoreError::WriteFailed {
                key: key.to_string(),
                message: "writes disabled".to_string(),
            });
        }
        Ok(())
    }
}

impl Store for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.values.get(key).cloned())
    }

    fn apply(&mut self, writes: &[Write<'_>]) -> Result<(), StoreError> {
        if let Some((key, _)) = writes.first() {
            self.check_writable(key)?;
        }
        for (key, value) in writes {
            match value {
                Some(v) => {
                    self.values.insert((*key).to_string(), v.clone());
                }
                None => {
                    self.values.remove(*key);
                }
            }
        }
        Ok(())
    }
}

impl UsageLog for MemoryStore {
    fn record_usage(&mut self, record: &UsageRecord) -> Result<(), StoreError> {
        self.check_writable("usage")?;
        self.usage.push(record.clone());
        Ok(())
    }

    fn usage_records(&self) -> Result<Vec<UsageRecord>, StoreError> {
        Ok(self.usage.clone())
    }

    fn clear_usage(&mut self) -> Result<(), StoreError> {
        self.check_writable("usage")?;
        self.usage.clear();
        Ok(())
    }

    fn wipe(&mut self, writes: &[Write<'_>]) -> Result<(), StoreError> {
        self.check_writable("usage")?;
        self.apply(writes)?;
        self.usage.clear();
        Ok(())
    }
}
