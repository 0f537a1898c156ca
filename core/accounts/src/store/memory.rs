//! In-memory account store.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use credkeep_common::{AccountId, Error, Result, UserId};

use super::{check_unique_login, not_found, select_visible, AccountStore};
use crate::config::StoreConfig;
use crate::record::AccountRecord;

/// In-memory account store.
///
/// Useful for testing and embedding. All data is lost on drop.
pub struct MemoryStore {
    records: RwLock<HashMap<AccountId, AccountRecord>>,
    config: StoreConfig,
}

impl MemoryStore {
    /// Create a new empty store with default settings.
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    /// Create a new empty store.
    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.read().map(|records| records.len()).unwrap_or(0)
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<AccountId, AccountRecord>>> {
        self.records
            .read()
            .map_err(|_| Error::StorageFailure("Memory store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<AccountId, AccountRecord>>> {
        self.records
            .write()
            .map_err(|_| Error::StorageFailure("Memory store lock poisoned".to_string()))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn put(&self, record: &AccountRecord) -> Result<()> {
        let mut records = self.write()?;
        if self.config.unique_logins {
            check_unique_login(records.values(), record)?;
        }
        records.insert(*record.id(), record.clone());
        Ok(())
    }

    async fn get(&self, id: &AccountId) -> Result<AccountRecord> {
        self.read()?.get(id).cloned().ok_or_else(|| not_found(id))
    }

    async fn list_by_owner_or_shared(
        &self,
        owner: &UserId,
        include_admin: bool,
    ) -> Result<Vec<AccountRecord>> {
        Ok(select_visible(self.read()?.values(), owner, include_admin))
    }

    async fn delete(&self, id: &AccountId) -> Result<()> {
        self.write()?
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| not_found(id))
    }
}
