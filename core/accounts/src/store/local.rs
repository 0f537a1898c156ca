//! JSON-file account store.

use async_trait::async_trait;
use std::collections::HashMap;
use std::ffi::OsString;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use credkeep_common::{AccountId, Error, Result, UserId};

use super::{check_unique_login, not_found, select_visible, AccountStore};
use crate::config::StoreConfig;
use crate::record::AccountRecord;

type Records = HashMap<AccountId, AccountRecord>;

/// Account store backed by a single JSON file.
///
/// All records are held in memory. A mutation builds the complete new state,
/// writes it to a private temporary file, syncs it and renames it over the
/// store file. The in-memory state is replaced only after the rename, so a
/// failed write changes nothing.
///
/// The file holds secrets and is only readable by its owner.
pub struct LocalStore {
    path: PathBuf,
    records: Arc<RwLock<Records>>,
    /// Held from reading the current state until the new one is committed.
    writer: Arc<Mutex<()>>,
    config: StoreConfig,
}

impl LocalStore {
    /// Open (or start) the store at `path`.
    ///
    /// # Postconditions
    /// - Parent directory exists
    /// - Records from an existing file are loaded
    ///
    /// # Errors
    /// - `StorageFailure` if the file cannot be read or parsed
    pub async fn open(path: impl AsRef<Path>, config: StoreConfig) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| storage_failure(parent, e))?;
            }
        }

        let records = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let list: Vec<AccountRecord> = serde_json::from_slice(&bytes).map_err(|e| {
                    Error::StorageFailure(format!("Corrupt account file {}: {}", path.display(), e))
                })?;
                list.into_iter().map(|r| (*r.id(), r)).collect()
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(storage_failure(&path, e)),
        };

        debug!(path = %path.display(), accounts = records.len(), "opened account store");

        Ok(Self {
            path,
            records: Arc::new(RwLock::new(records)),
            writer: Arc::new(Mutex::new(())),
            config,
        })
    }

    /// Location of the store file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| OsString::from("accounts.json"));
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Records>> {
        self.records
            .read()
            .map_err(|_| Error::StorageFailure("Local store lock poisoned".to_string()))
    }

    /// Persist `next` and make it the in-memory state.
    ///
    /// Runs on the blocking pool and owns the writer guard, so it completes
    /// as a whole even if the calling future is dropped.
    async fn commit(&self, writer: OwnedMutexGuard<()>, next: Records) -> Result<()> {
        let path = self.path.clone();
        let temp = self.temp_path();
        let records = self.records.clone();

        tokio::task::spawn_blocking(move || {
            let _writer = writer;
            write_file(&temp, &path, &next)?;
            *records
                .write()
                .map_err(|_| Error::StorageFailure("Local store lock poisoned".to_string()))? = next;
            Ok(())
        })
        .await
        .map_err(|e| Error::StorageFailure(format!("Account file writer failed: {}", e)))?
    }
}

/// Write `records` to `temp`, sync it and rename it over `path`.
fn write_file(temp: &Path, path: &Path, records: &Records) -> Result<()> {
    let mut list: Vec<&AccountRecord> = records.values().collect();
    list.sort_by(|a, b| {
        a.created_at()
            .cmp(&b.created_at())
            .then_with(|| a.id().cmp(b.id()))
    });
    let bytes = serde_json::to_vec_pretty(&list)
        .map_err(|e| Error::StorageFailure(format!("Cannot encode accounts: {}", e)))?;

    // A leftover temp file could carry wider permissions.
    match std::fs::remove_file(temp) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(storage_failure(temp, e)),
    }

    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(temp).map_err(|e| storage_failure(temp, e))?;
    file.write_all(&bytes).map_err(|e| storage_failure(temp, e))?;
    file.sync_all().map_err(|e| storage_failure(temp, e))?;
    drop(file);

    std::fs::rename(temp, path).map_err(|e| storage_failure(path, e))?;
    Ok(())
}

fn storage_failure(path: &Path, err: std::io::Error) -> Error {
    Error::StorageFailure(format!("{}: {}", path.display(), err))
}

#[async_trait]
impl AccountStore for LocalStore {
    fn name(&self) -> &str {
        "local"
    }

    async fn put(&self, record: &AccountRecord) -> Result<()> {
        let writer = self.writer.clone().lock_owned().await;
        let next = {
            let records = self.read()?;
            if self.config.unique_logins {
                check_unique_login(records.values(), record)?;
            }
            let mut next = records.clone();
            next.insert(*record.id(), record.clone());
            next
        };
        self.commit(writer, next).await
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
        let writer = self.writer.clone().lock_owned().await;
        let next = {
            let records = self.read()?;
            if !records.contains_key(id) {
                return Err(not_found(id));
            }
            let mut next = records.clone();
            next.remove(id);
            next
        };
        self.commit(writer, next).await
    }
}
