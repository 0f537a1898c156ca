//! Account manager: access policy and refresh coordination.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use credkeep_backend::BackendRegistry;
use credkeep_common::{AccountId, CallerContext, Error, Result, Secret};

use crate::config::ManagerConfig;
use crate::locks::IdentityLocks;
use crate::record::{AccountInfo, AccountRecord, InfoUpdate, RefreshApplied, RefreshStep};
use crate::store::{not_found, AccountStore};

/// Account info returned by a lookup, with a warning when an optional
/// refresh failed and the info is the last known state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountView {
    pub info: AccountInfo,
    pub warning: Option<String>,
}

impl AccountView {
    fn new(info: AccountInfo) -> Self {
        Self {
            info,
            warning: None,
        }
    }
}

/// Record state after a refresh attempt.
struct Refreshed {
    record: AccountRecord,
    failure: Option<String>,
}

/// Manager for stored accounts.
///
/// Sole owner of the account store and the backend registry. Every
/// operation takes the caller context produced by the permission layer and
/// re-derives authority from the stored owner.
pub struct AccountManager {
    store: Arc<dyn AccountStore>,
    registry: RwLock<Arc<BackendRegistry>>,
    locks: IdentityLocks,
    config: ManagerConfig,
}

impl AccountManager {
    /// Create a manager over `store` with the backends in `registry`.
    pub fn new(store: Arc<dyn AccountStore>, registry: BackendRegistry) -> Self {
        Self {
            store,
            registry: RwLock::new(Arc::new(registry)),
            locks: IdentityLocks::new(),
            config: ManagerConfig::default(),
        }
    }

    /// Replace the manager settings.
    pub fn with_config(mut self, config: ManagerConfig) -> Self {
        self.config = config;
        self
    }

    /// Get the manager settings.
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Snapshot of the current backend registry.
    pub async fn registry(&self) -> Arc<BackendRegistry> {
        self.registry.read().await.clone()
    }

    /// Swap in a reloaded registry.
    ///
    /// Operations already running keep the snapshot they started with.
    /// Accounts whose backend disappeared stay stored but cannot refresh or
    /// change their config.
    pub async fn replace_registry(&self, registry: BackendRegistry) {
        let types = registry.list_types();
        *self.registry.write().await = Arc::new(registry);
        info!(backends = ?types, "backend registry replaced");
    }

    /// All registered backend type names.
    pub async fn list_available_backend_types(&self) -> Vec<String> {
        self.registry().await.list_types()
    }

    /// Accounts the caller owns plus shared ones, or every account for
    /// administrative callers.
    pub async fn get_all_accounts(&self, ctx: &CallerContext) -> Result<Vec<AccountInfo>> {
        let records = self
            .store
            .list_by_owner_or_shared(ctx.user(), ctx.is_administrative())
            .await?;
        Ok(records.iter().map(AccountRecord::to_info).collect())
    }

    /// Look up one account, optionally refreshing it first.
    ///
    /// Returns `None` when the account does not exist, belongs to another
    /// backend type, or is not visible to the caller; these cases are
    /// indistinguishable. A refresh is only performed for the owner or an
    /// administrative caller, and a failed refresh yields the last known
    /// info together with a warning.
    ///
    /// # Errors
    /// - `StorageFailure` if the store cannot be read
    pub async fn get_account(
        &self,
        id: &AccountId,
        backend_type: &str,
        ctx: &CallerContext,
        refresh: bool,
    ) -> Result<Option<AccountView>> {
        let record = match self.load(id, backend_type).await {
            Ok(record) => record,
            Err(err) if err.is_not_found() => return Ok(None),
            Err(err) => return Err(err),
        };

        if !ctx.may_view(record.owner(), record.is_shared()) {
            debug!(account = %id, caller = %ctx.user(), "account not visible to caller");
            return Ok(None);
        }

        if !refresh || !ctx.may_manage(record.owner()) {
            return Ok(Some(AccountView::new(record.to_info())));
        }

        match self.refresh_record(id, true).await {
            Ok(refreshed) => Ok(Some(AccountView {
                info: refreshed.record.to_info(),
                warning: refreshed.failure,
            })),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => {
                warn!(account = %id, error = %err, "refresh failed, returning cached info");
                Ok(Some(AccountView {
                    info: record.to_info(),
                    warning: Some(err.to_string()),
                }))
            }
        }
    }

    /// Create an account owned by the caller.
    ///
    /// # Postconditions
    /// - Account is activated, not shared, with an empty config
    ///
    /// # Errors
    /// - `UnknownBackend` if the backend type is not registered; nothing is
    ///   stored
    /// - `InvalidInput` for an empty login
    /// - `DuplicateLogin`, `StorageFailure` from the store
    pub async fn create_account(
        &self,
        backend_type: &str,
        login_name: &str,
        secret: Secret,
        ctx: &CallerContext,
    ) -> Result<AccountInfo> {
        self.registry().await.describe(backend_type)?;

        let record = AccountRecord::new(backend_type, login_name, secret, ctx.user().clone())?;
        self.store.put(&record).await?;
        info!(
            account = %record.id(),
            backend = backend_type,
            owner = %ctx.user(),
            "account created"
        );

        if self.config.refresh_on_create {
            match self.refresh_record(record.id(), true).await {
                Ok(refreshed) => {
                    if let Some(failure) = &refreshed.failure {
                        warn!(account = %record.id(), error = %failure, "initial refresh failed");
                    }
                    return Ok(refreshed.record.to_info());
                }
                Err(err) => {
                    warn!(account = %record.id(), error = %err, "initial refresh failed");
                }
            }
        }

        Ok(record.to_info())
    }

    /// Replace login name and/or secret.
    ///
    /// # Errors
    /// - `NotFound` if absent, of another backend type, or not visible to
    ///   the caller
    /// - `Forbidden` if visible (shared) but not owned by a
    ///   non-administrative caller
    /// - `InvalidInput`, `DuplicateLogin`, `StorageFailure`; the stored
    ///   record is unchanged
    pub async fn update_account(
        &self,
        id: &AccountId,
        backend_type: &str,
        login_name: Option<&str>,
        secret: Option<Secret>,
        ctx: &CallerContext,
    ) -> Result<AccountInfo> {
        let _guard = self.locks.acquire(id).await;
        let mut record = self.load_for_write(id, backend_type, ctx).await?;

        record.apply_update(login_name.map(str::to_string), secret, None, None)?;
        self.store.put(&record).await?;
        info!(account = %id, caller = %ctx.user(), "account credentials updated");

        Ok(record.to_info())
    }

    /// Change activation, sharing and config.
    ///
    /// # Errors
    /// - Same as [`AccountManager::update_account`]
    /// - `InvalidConfig` if the merged config fails the backend schema
    /// - `UnknownBackend` when changing config of an account whose backend
    ///   is no longer registered
    pub async fn update_account_info(
        &self,
        id: &AccountId,
        backend_type: &str,
        update: InfoUpdate,
        ctx: &CallerContext,
    ) -> Result<AccountInfo> {
        let _guard = self.locks.acquire(id).await;
        let mut record = self.load_for_write(id, backend_type, ctx).await?;

        let backend = match update.config {
            Some(_) => Some(self.registry().await.describe(record.backend_type())?),
            None => None,
        };
        record.apply_info(&update, backend.as_deref())?;
        self.store.put(&record).await?;
        info!(
            account = %id,
            caller = %ctx.user(),
            activated = record.is_activated(),
            shared = record.is_shared(),
            "account settings updated"
        );

        Ok(record.to_info())
    }

    /// Remove an account.
    ///
    /// # Errors
    /// - `NotFound` / `Forbidden` as for [`AccountManager::update_account`]
    /// - `StorageFailure` from the store
    pub async fn remove_account(
        &self,
        id: &AccountId,
        backend_type: &str,
        ctx: &CallerContext,
    ) -> Result<()> {
        let _guard = self.locks.acquire(id).await;
        self.load_for_write(id, backend_type, ctx).await?;

        self.store.delete(id).await?;
        info!(account = %id, caller = %ctx.user(), "account removed");
        Ok(())
    }

    /// Refresh an account on behalf of its owner or an administrator.
    ///
    /// # Errors
    /// - `NotFound` / `Forbidden` as for [`AccountManager::update_account`]
    /// - `UnknownBackend` if the backend is no longer registered
    /// - `BackendUnavailable` if the check failed; the account keeps its
    ///   previous status and is marked degraded
    pub async fn refresh_account(
        &self,
        id: &AccountId,
        backend_type: &str,
        ctx: &CallerContext,
        force: bool,
    ) -> Result<AccountInfo> {
        {
            let _guard = self.locks.acquire(id).await;
            self.load_for_write(id, backend_type, ctx).await?;
        }

        let refreshed = self.refresh_record(id, force).await?;
        match refreshed.failure {
            Some(failure) => Err(Error::BackendUnavailable(failure)),
            None => Ok(refreshed.record.to_info()),
        }
    }

    async fn load(&self, id: &AccountId, backend_type: &str) -> Result<AccountRecord> {
        let record = self.store.get(id).await?;
        if record.backend_type() != backend_type {
            return Err(not_found(id));
        }
        Ok(record)
    }

    /// Load a record the caller intends to modify.
    ///
    /// Callers who cannot even see the record get the same `NotFound` as
    /// for a missing one.
    async fn load_for_write(
        &self,
        id: &AccountId,
        backend_type: &str,
        ctx: &CallerContext,
    ) -> Result<AccountRecord> {
        let record = self.load(id, backend_type).await?;
        if ctx.may_manage(record.owner()) {
            return Ok(record);
        }
        if record.is_shared() {
            return Err(Error::Forbidden(format!(
                "Not permitted to modify account {}",
                id
            )));
        }
        Err(not_found(id))
    }

    /// Query the backend without holding the identity lock across the call.
    ///
    /// Lock, snapshot, unlock; check; lock, re-read, apply unless the
    /// record changed in between, persist, unlock.
    async fn refresh_record(&self, id: &AccountId, force: bool) -> Result<Refreshed> {
        let registry = self.registry().await;

        let ticket = {
            let _guard = self.locks.acquire(id).await;
            let record = self.store.get(id).await?;
            let backend = registry.describe(record.backend_type())?;
            let interval = self.config.refresh_interval(backend.min_refresh_interval());

            match record.begin_refresh_at(backend, force, interval, Utc::now())? {
                RefreshStep::Ready(ticket) => ticket,
                RefreshStep::Cached => {
                    debug!(account = %id, "using cached status");
                    return Ok(Refreshed {
                        record,
                        failure: None,
                    });
                }
                RefreshStep::Inactive => {
                    debug!(account = %id, "account deactivated, refresh skipped");
                    return Ok(Refreshed {
                        record,
                        failure: None,
                    });
                }
            }
        };

        debug!(
            account = %ticket.account(),
            started_at = %ticket.started_at(),
            "querying backend status"
        );
        let result = ticket.run().await;

        let _guard = self.locks.acquire(id).await;
        let mut record = self.store.get(id).await?;
        match record.finish_refresh(result) {
            RefreshApplied::Updated => {
                self.store.put(&record).await?;
                debug!(account = %id, "status refreshed");
                Ok(Refreshed {
                    record,
                    failure: None,
                })
            }
            RefreshApplied::Degraded(failure) => {
                self.store.put(&record).await?;
                warn!(account = %id, error = %failure, "backend status check failed");
                Ok(Refreshed {
                    record,
                    failure: Some(failure),
                })
            }
            RefreshApplied::Stale => {
                debug!(account = %id, "discarding stale refresh result");
                Ok(Refreshed {
                    record,
                    failure: None,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use credkeep_backend::{ConfigOption, ConfigSchema, OptionKind, StaticBackend, StatusReport};
    use credkeep_common::UserId;
    use serde_json::json;
    use std::time::Duration;

    struct Fixture {
        manager: Arc<AccountManager>,
        store: Arc<MemoryStore>,
        host_a: Arc<StaticBackend>,
    }

    fn fixture_with(host_a: StaticBackend) -> Fixture {
        let schema = ConfigSchema::empty()
            .with_option(ConfigOption::new("limit_dl", OptionKind::Int, json!(0), ""));
        let host_a = Arc::new(host_a.with_schema(schema));
        let mut registry = BackendRegistry::new();
        registry.register(host_a.clone()).unwrap();
        registry.register(Arc::new(StaticBackend::new("hostB"))).unwrap();

        let store = Arc::new(MemoryStore::new());
        let manager = Arc::new(AccountManager::new(store.clone(), registry));
        Fixture {
            manager,
            store,
            host_a,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(StaticBackend::new("hostA"))
    }

    fn caller(name: &str) -> CallerContext {
        CallerContext::new(UserId::new(name).unwrap(), false)
    }

    fn admin() -> CallerContext {
        CallerContext::new(UserId::new("root").unwrap(), true)
    }

    async fn create(f: &Fixture, login: &str, ctx: &CallerContext) -> AccountInfo {
        f.manager
            .create_account("hostA", login, Secret::new("p1"), ctx)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_sharing_scenario() {
        let f = fixture();
        let c1 = caller("c1");
        let c2 = caller("c2");

        let info = create(&f, "u1", &c1).await;
        assert_eq!(info.owner.as_str(), "c1");
        assert!(!info.shared);
        assert!(info.activated);

        let hidden = f.manager.get_account(&info.id, "hostA", &c2, false).await.unwrap();
        assert!(hidden.is_none());

        f.manager
            .update_account_info(
                &info.id,
                "hostA",
                InfoUpdate {
                    shared: Some(true),
                    ..Default::default()
                },
                &c1,
            )
            .await
            .unwrap();

        let view = f
            .manager
            .get_account(&info.id, "hostA", &c2, false)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(view.info.login_name, "u1");
        assert!(view.info.shared);
        assert!(!serde_json::to_string(&view).unwrap().contains("p1"));
    }

    #[tokio::test]
    async fn test_hidden_account_looks_like_missing() {
        let f = fixture();
        let info = create(&f, "u1", &caller("c1")).await;
        let c2 = caller("c2");

        let hidden = f.manager.get_account(&info.id, "hostA", &c2, true).await.unwrap();
        let missing = f
            .manager
            .get_account(&AccountId::generate(), "hostA", &c2, true)
            .await
            .unwrap();
        let wrong_backend = f.manager.get_account(&info.id, "hostB", &caller("c1"), false).await.unwrap();

        assert_eq!(hidden, missing);
        assert!(hidden.is_none());
        assert!(wrong_backend.is_none());

        let write = f
            .manager
            .remove_account(&info.id, "hostA", &c2)
            .await
            .unwrap_err()
            .to_string();
        let missing_write = f
            .manager
            .remove_account(&AccountId::generate(), "hostA", &c2)
            .await
            .unwrap_err();
        assert!(missing_write.is_not_found());
        assert!(write.starts_with("Not found"));
    }

    #[tokio::test]
    async fn test_shared_account_is_read_only_for_others() {
        let f = fixture();
        let c1 = caller("c1");
        let c2 = caller("c2");
        let info = create(&f, "u1", &c1).await;
        f.manager
            .update_account_info(&info.id, "hostA", InfoUpdate { shared: Some(true), ..Default::default() }, &c1)
            .await
            .unwrap();

        let err = f
            .manager
            .update_account(&info.id, "hostA", Some("stolen"), None, &c2)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));

        // Refresh by a non-owner is skipped, not an error.
        let view = f.manager.get_account(&info.id, "hostA", &c2, true).await.unwrap().unwrap();
        assert!(view.warning.is_none());
        assert_eq!(f.host_a.calls(), 0);
    }

    #[tokio::test]
    async fn test_admin_sees_and_manages_everything() {
        let f = fixture();
        let info = create(&f, "u1", &caller("c1")).await;
        create(&f, "u2", &caller("c2")).await;

        assert_eq!(f.manager.get_all_accounts(&admin()).await.unwrap().len(), 2);
        assert_eq!(f.manager.get_all_accounts(&caller("c1")).await.unwrap().len(), 1);

        let updated = f
            .manager
            .update_account(&info.id, "hostA", Some("renamed"), None, &admin())
            .await
            .unwrap();
        assert_eq!(updated.login_name, "renamed");
        assert_eq!(updated.owner.as_str(), "c1");

        f.manager.remove_account(&info.id, "hostA", &admin()).await.unwrap();
        assert_eq!(f.store.len(), 1);
    }

    #[tokio::test]
    async fn test_create_with_unknown_backend_persists_nothing() {
        let f = fixture();
        let err = f
            .manager
            .create_account("nope", "u1", Secret::new("p1"), &caller("c1"))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::UnknownBackend(_)));
        assert!(f.store.is_empty());
    }

    #[tokio::test]
    async fn test_create_duplicate_login() {
        let f = fixture();
        create(&f, "u1", &caller("c1")).await;

        let err = f
            .manager
            .create_account("hostA", "u1", Secret::new("x"), &caller("c2"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateLogin(_)));

        // Same login on another backend is fine.
        f.manager
            .create_account("hostB", "u1", Secret::new("x"), &caller("c2"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_remove_missing_leaves_others() {
        let f = fixture();
        let c1 = caller("c1");
        let info = create(&f, "u1", &c1).await;

        let err = f
            .manager
            .remove_account(&AccountId::generate(), "hostA", &c1)
            .await
            .unwrap_err();

        assert!(err.is_not_found());
        assert!(f.manager.get_account(&info.id, "hostA", &c1, false).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_invalid_config_leaves_stored_record() {
        let f = fixture();
        let c1 = caller("c1");
        let info = create(&f, "u1", &c1).await;

        let mut config = credkeep_common::AccountConfig::new();
        config.insert("bogus".to_string(), json!(1));
        let err = f
            .manager
            .update_account_info(
                &info.id,
                "hostA",
                InfoUpdate {
                    shared: Some(true),
                    config: Some(config),
                    ..Default::default()
                },
                &c1,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::InvalidConfig(_)));
        let stored = f.store.get(&info.id).await.unwrap();
        assert!(!stored.is_shared());
        assert_eq!(stored.revision(), 0);
    }

    #[tokio::test]
    async fn test_refresh_failure_returns_stale_info_with_warning() {
        let f = fixture();
        let c1 = caller("c1");
        let info = create(&f, "u1", &c1).await;

        let fresh = f.manager.get_account(&info.id, "hostA", &c1, true).await.unwrap().unwrap();
        assert!(fresh.warning.is_none());
        let status = fresh.info.live_status.clone().unwrap();

        f.host_a.set_failure("service down");
        let degraded = f.manager.get_account(&info.id, "hostA", &c1, true).await.unwrap().unwrap();

        assert!(degraded.warning.unwrap().contains("service down"));
        assert_eq!(degraded.info.live_status, Some(status));
        assert!(degraded.info.refresh_error.unwrap().contains("service down"));

        let err = f.manager.refresh_account(&info.id, "hostA", &c1, true).await.unwrap_err();
        assert!(matches!(err, Error::BackendUnavailable(_)));
    }

    #[tokio::test]
    async fn test_non_forced_refresh_uses_cache() {
        let f = fixture_with(StaticBackend::new("hostA").with_min_refresh_interval(Duration::from_secs(60)));
        let c1 = caller("c1");
        let info = create(&f, "u1", &c1).await;

        let first = f.manager.refresh_account(&info.id, "hostA", &c1, false).await.unwrap();
        let second = f.manager.refresh_account(&info.id, "hostA", &c1, false).await.unwrap();

        assert_eq!(f.host_a.calls(), 1);
        assert_eq!(first.live_status, second.live_status);
    }

    #[tokio::test]
    async fn test_deactivated_account_is_not_refreshed() {
        let f = fixture();
        let c1 = caller("c1");
        let info = create(&f, "u1", &c1).await;
        f.manager
            .update_account_info(&info.id, "hostA", InfoUpdate { activated: Some(false), ..Default::default() }, &c1)
            .await
            .unwrap();

        let view = f.manager.get_account(&info.id, "hostA", &c1, true).await.unwrap().unwrap();
        assert!(view.warning.is_none());
        assert!(view.info.live_status.is_none());
        assert_eq!(f.host_a.calls(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_updates_serialize() {
        let f = fixture();
        let c1 = caller("c1");
        let info = create(&f, "u1", &c1).await;

        for round in 0..20 {
            let login = format!("login-{}", round);
            let mut config = credkeep_common::AccountConfig::new();
            config.insert("limit_dl".to_string(), json!(round));

            let credentials = f
                .manager
                .update_account(&info.id, "hostA", Some(&login), Some(Secret::new("p2")), &c1);
            let settings = f.manager.update_account_info(
                &info.id,
                "hostA",
                InfoUpdate {
                    shared: Some(round % 2 == 0),
                    config: Some(config),
                    ..Default::default()
                },
                &c1,
            );
            let (a, b) = tokio::join!(credentials, settings);
            a.unwrap();
            b.unwrap();

            let stored = f.store.get(&info.id).await.unwrap();
            assert_eq!(stored.login_name(), login);
            assert_eq!(stored.config().get("limit_dl"), Some(&json!(round)));
            assert_eq!(stored.is_shared(), round % 2 == 0);
        }

        assert_eq!(f.store.get(&info.id).await.unwrap().revision(), 40);
    }

    #[tokio::test]
    async fn test_many_writers_each_apply_once() {
        let f = fixture();
        let c1 = caller("c1");
        let info = create(&f, "u1", &c1).await;

        let tasks = (0..16).map(|i| {
            let manager = f.manager.clone();
            let c1 = c1.clone();
            let id = info.id;
            tokio::spawn(async move {
                manager
                    .update_account(&id, "hostA", Some(&format!("w{}", i)), None, &c1)
                    .await
            })
        });
        for result in futures::future::join_all(tasks).await {
            result.unwrap().unwrap();
        }

        assert_eq!(f.store.get(&info.id).await.unwrap().revision(), 16);
    }

    #[tokio::test]
    async fn test_refresh_does_not_block_writes_and_stale_result_is_dropped() {
        let f = fixture_with(StaticBackend::new("hostA").with_latency(Duration::from_millis(200)));
        let c1 = caller("c1");
        let info = create(&f, "u1", &c1).await;

        let refresh = {
            let manager = f.manager.clone();
            let c1 = c1.clone();
            let id = info.id;
            tokio::spawn(async move { manager.get_account(&id, "hostA", &c1, true).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        let update = tokio::time::timeout(
            Duration::from_millis(100),
            f.manager.update_account(&info.id, "hostA", None, Some(Secret::new("p2")), &c1),
        )
        .await;
        assert!(update.is_ok(), "update waited for the backend call");
        update.unwrap().unwrap();

        let view = refresh.await.unwrap().unwrap().unwrap();
        assert!(view.warning.is_none());
        assert!(view.info.live_status.is_none());
        assert!(f.store.get(&info.id).await.unwrap().live_status().is_none());
        assert_eq!(f.host_a.calls(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_refresh_leaves_record_unchanged() {
        let f = fixture_with(StaticBackend::new("hostA").with_latency(Duration::from_millis(200)));
        let c1 = caller("c1");
        let info = create(&f, "u1", &c1).await;

        let result = tokio::time::timeout(
            Duration::from_millis(50),
            f.manager.refresh_account(&info.id, "hostA", &c1, true),
        )
        .await;
        assert!(result.is_err());

        let stored = f.store.get(&info.id).await.unwrap();
        assert!(stored.live_status().is_none());
        assert!(!stored.is_degraded());

        // The identity is not left locked.
        tokio::time::timeout(
            Duration::from_millis(100),
            f.manager.update_account(&info.id, "hostA", Some("u2"), None, &c1),
        )
        .await
        .unwrap()
        .unwrap();
    }

    #[tokio::test]
    async fn test_registry_reload() {
        let f = fixture();
        let c1 = caller("c1");
        let info = create(&f, "u1", &c1).await;

        let mut reloaded = BackendRegistry::new();
        reloaded.register(Arc::new(StaticBackend::new("hostC"))).unwrap();
        f.manager.replace_registry(reloaded).await;

        assert_eq!(f.manager.list_available_backend_types().await, vec!["hostC".to_string()]);

        // The account survives but cannot refresh.
        let view = f.manager.get_account(&info.id, "hostA", &c1, true).await.unwrap().unwrap();
        assert!(view.warning.unwrap().contains("Unknown backend"));
        let err = f
            .manager
            .create_account("hostA", "u9", Secret::new("p"), &c1)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnknownBackend(_)));
    }

    #[tokio::test]
    async fn test_refresh_on_create() {
        let mut f = fixture_with(StaticBackend::new("hostA").with_status(StatusReport::premium()));
        f.manager = Arc::new(
            AccountManager::new(f.store.clone(), {
                let mut registry = BackendRegistry::new();
                registry.register(f.host_a.clone()).unwrap();
                registry
            })
            .with_config(ManagerConfig::default().with_refresh_on_create(true)),
        );

        let info = create(&f, "u1", &caller("c1")).await;
        assert!(info.live_status.unwrap().report.premium);
        assert_eq!(f.host_a.calls(), 1);
    }
}
