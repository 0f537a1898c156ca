//! Account store boundary.
//!
//! Stores persist [`AccountRecord`]s keyed by identity. Every operation is
//! atomic for a single identity: no reader observes a partially written
//! record. Access policy lives in the manager, not here.

mod local;
mod memory;

use async_trait::async_trait;

use credkeep_common::{AccountId, Error, Result, UserId};

use crate::record::AccountRecord;

pub use local::LocalStore;
pub use memory::MemoryStore;

/// Durable CRUD over account records.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Get the store name (e.g., "memory", "local").
    fn name(&self) -> &str;

    /// Insert or replace a record by identity.
    ///
    /// # Errors
    /// - `DuplicateLogin` if the store enforces unique logins and another
    ///   identity uses the same login on the same backend
    /// - `StorageFailure` if the write could not be made durable; the
    ///   previous state is kept
    async fn put(&self, record: &AccountRecord) -> Result<()>;

    /// Get a record.
    ///
    /// # Errors
    /// - `NotFound` if no record has this identity
    async fn get(&self, id: &AccountId) -> Result<AccountRecord>;

    /// Records owned by `owner` plus all shared records, or every record when
    /// `include_admin` is set. Ordered by creation time.
    async fn list_by_owner_or_shared(
        &self,
        owner: &UserId,
        include_admin: bool,
    ) -> Result<Vec<AccountRecord>>;

    /// Delete a record.
    ///
    /// # Errors
    /// - `NotFound` if no record has this identity
    async fn delete(&self, id: &AccountId) -> Result<()>;
}

pub(crate) fn not_found(id: &AccountId) -> Error {
    Error::NotFound(format!("Account {} not found", id))
}

/// Fail if another identity already uses `candidate`'s login on its backend.
pub(crate) fn check_unique_login<'a>(
    mut existing: impl Iterator<Item = &'a AccountRecord>,
    candidate: &AccountRecord,
) -> Result<()> {
    let taken = existing.any(|record| {
        record.id() != candidate.id()
            && record.backend_type() == candidate.backend_type()
            && record.login_name() == candidate.login_name()
    });
    if taken {
        return Err(Error::DuplicateLogin(format!(
            "Login '{}' already exists for backend '{}'",
            candidate.login_name(),
            candidate.backend_type()
        )));
    }
    Ok(())
}

/// Apply the listing rule and ordering shared by all stores.
pub(crate) fn select_visible<'a>(
    records: impl Iterator<Item = &'a AccountRecord>,
    owner: &UserId,
    include_admin: bool,
) -> Vec<AccountRecord> {
    let mut visible: Vec<AccountRecord> = records
        .filter(|record| include_admin || record.is_shared() || record.owner() == owner)
        .cloned()
        .collect();
    visible.sort_by(|a, b| {
        a.created_at()
            .cmp(&b.created_at())
            .then_with(|| a.id().cmp(b.id()))
    });
    visible
}
