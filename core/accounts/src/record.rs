//! Stored accounts and their caller-safe projection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use credkeep_backend::{Backend, LiveStatus, StatusReport};
use credkeep_common::{AccountConfig, AccountId, Error, Result, Secret, UserId};

/// One stored account.
///
/// Identity, backend type and owner are fixed at creation. Everything else
/// changes only through the methods below, which validate before they
/// mutate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountRecord {
    id: AccountId,
    backend_type: String,
    login_name: String,
    secret: Secret,
    owner: UserId,
    shared: bool,
    activated: bool,
    #[serde(default)]
    config: AccountConfig,
    #[serde(default)]
    live_status: Option<LiveStatus>,
    #[serde(default)]
    refresh_error: Option<String>,
    /// Start of the last status check applied, successful or not.
    #[serde(default)]
    last_attempt_at: Option<DateTime<Utc>>,
    /// Bumped by every credential or settings write.
    #[serde(default)]
    revision: u64,
    created_at: DateTime<Utc>,
    modified_at: DateTime<Utc>,
}

/// Caller-safe view of an account. Never carries the secret.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub id: AccountId,
    pub backend_type: String,
    pub login_name: String,
    pub owner: UserId,
    pub shared: bool,
    pub activated: bool,
    pub config: AccountConfig,
    pub live_status: Option<LiveStatus>,
    /// Set while the last refresh failed.
    pub refresh_error: Option<String>,
}

/// Settings change for an account; `None` leaves a field as it is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InfoUpdate {
    pub activated: Option<bool>,
    pub shared: Option<bool>,
    /// Entries merged over the current config. A `null` value removes the entry.
    pub config: Option<AccountConfig>,
}

/// What a refresh request needs to do.
pub enum RefreshStep {
    /// Cached status is fresh enough.
    Cached,
    /// Account is deactivated; nothing to do.
    Inactive,
    /// Backend must be queried.
    Ready(RefreshTicket),
}

/// Snapshot of everything a status check needs.
///
/// Owns its data so the check can run without any lock on the record;
/// dropping it (or the future of [`RefreshTicket::run`]) changes nothing.
pub struct RefreshTicket {
    account: AccountId,
    backend: Arc<dyn Backend>,
    login_name: String,
    secret: Secret,
    config: AccountConfig,
    revision: u64,
    started_at: DateTime<Utc>,
}

/// Outcome of a status check, not yet applied to any record.
#[derive(Debug)]
pub struct RefreshResult {
    account: AccountId,
    revision: u64,
    started_at: DateTime<Utc>,
    outcome: std::result::Result<StatusReport, String>,
}

/// How a [`RefreshResult`] was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshApplied {
    /// New live status stored.
    Updated,
    /// Check failed; previous status kept, record marked degraded.
    Degraded(String),
    /// Record changed since the snapshot or holds a newer status; result dropped.
    Stale,
}

impl AccountRecord {
    /// Create a new activated, unshared account with an empty config.
    ///
    /// # Errors
    /// - `InvalidInput` if the backend type or login name is empty
    pub fn new(
        backend_type: impl Into<String>,
        login_name: impl Into<String>,
        secret: Secret,
        owner: UserId,
    ) -> Result<Self> {
        let backend_type = backend_type.into();
        let login_name = login_name.into();
        if backend_type.is_empty() {
            return Err(Error::InvalidInput(
                "Backend type cannot be empty".to_string(),
            ));
        }
        validate_login(&login_name)?;

        let now = Utc::now();
        Ok(Self {
            id: AccountId::generate(),
            backend_type,
            login_name,
            secret,
            owner,
            shared: false,
            activated: true,
            config: AccountConfig::new(),
            live_status: None,
            refresh_error: None,
            last_attempt_at: None,
            revision: 0,
            created_at: now,
            modified_at: now,
        })
    }

    /// Get the account identity.
    pub fn id(&self) -> &AccountId {
        &self.id
    }

    /// Get the backend type name.
    pub fn backend_type(&self) -> &str {
        &self.backend_type
    }

    /// Get the login name on the backend.
    pub fn login_name(&self) -> &str {
        &self.login_name
    }

    /// Get the owning user.
    pub fn owner(&self) -> &UserId {
        &self.owner
    }

    /// Whether any authenticated user may see the account.
    pub fn is_shared(&self) -> bool {
        self.shared
    }

    /// Whether the account is in use.
    pub fn is_activated(&self) -> bool {
        self.activated
    }

    /// Get the backend options.
    pub fn config(&self) -> &AccountConfig {
        &self.config
    }

    /// Last status a check reported, if any.
    pub fn live_status(&self) -> Option<&LiveStatus> {
        self.live_status.as_ref()
    }

    /// Message of the last failed refresh, if it has not succeeded since.
    pub fn refresh_error(&self) -> Option<&str> {
        self.refresh_error.as_deref()
    }

    /// Whether the last refresh failed.
    pub fn is_degraded(&self) -> bool {
        self.refresh_error.is_some()
    }

    /// Write counter, bumped by every credential or settings change.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Get the creation time.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Time of the last credential or settings change.
    pub fn modified_at(&self) -> DateTime<Utc> {
        self.modified_at
    }

    /// Whether the cached status is younger than `interval` at `now`.
    pub fn is_fresh(&self, interval: Duration, now: DateTime<Utc>) -> bool {
        self.live_status
            .as_ref()
            .map(|status| status.is_fresh(interval, now))
            .unwrap_or(false)
    }

    /// Replace the provided credential and config fields.
    ///
    /// # Preconditions
    /// - `backend` must be given when `config` is
    ///
    /// # Postconditions
    /// - On success, revision is bumped; a credential change also clears the
    ///   cached status, which described the old credentials
    /// - On error, the record is unchanged
    ///
    /// # Errors
    /// - `InvalidInput` for an empty login name
    /// - `InvalidConfig` if the merged config fails the backend schema
    /// - `UnknownBackend` if `config` is given without a backend
    pub fn apply_update(
        &mut self,
        login_name: Option<String>,
        secret: Option<Secret>,
        config: Option<AccountConfig>,
        backend: Option<&dyn Backend>,
    ) -> Result<()> {
        if let Some(login) = &login_name {
            validate_login(login)?;
        }
        let config = match config {
            Some(changes) => Some(self.merged_config(&changes, backend)?),
            None => None,
        };

        let mut credentials_changed = false;
        if let Some(login) = login_name {
            credentials_changed |= login != self.login_name;
            self.login_name = login;
        }
        if let Some(secret) = secret {
            credentials_changed |= secret != self.secret;
            self.secret = secret;
        }
        if let Some(config) = config {
            self.config = config;
        }
        if credentials_changed {
            self.live_status = None;
            self.refresh_error = None;
            self.last_attempt_at = None;
        }
        self.touch();
        Ok(())
    }

    /// Apply a settings change.
    ///
    /// # Errors
    /// - Same as [`AccountRecord::apply_update`] for the config part; on
    ///   error nothing is applied
    pub fn apply_info(&mut self, update: &InfoUpdate, backend: Option<&dyn Backend>) -> Result<()> {
        let config = match &update.config {
            Some(changes) => Some(self.merged_config(changes, backend)?),
            None => None,
        };

        if let Some(activated) = update.activated {
            self.activated = activated;
        }
        if let Some(shared) = update.shared {
            self.shared = shared;
        }
        if let Some(config) = config {
            self.config = config;
        }
        self.touch();
        Ok(())
    }

    fn merged_config(
        &self,
        changes: &AccountConfig,
        backend: Option<&dyn Backend>,
    ) -> Result<AccountConfig> {
        let backend = backend.ok_or_else(|| Error::UnknownBackend(self.backend_type.clone()))?;

        let mut merged = self.config.clone();
        for (key, value) in changes {
            if value.is_null() {
                merged.remove(key);
            } else {
                merged.insert(key.clone(), value.clone());
            }
        }
        backend.validate_config(&merged)?;
        Ok(merged)
    }

    fn touch(&mut self) {
        self.revision += 1;
        self.modified_at = Utc::now();
    }

    /// Decide whether a refresh needs the backend, using the backend's own
    /// minimum interval.
    ///
    /// # Errors
    /// - `InvalidInput` if `backend` is not this account's backend type
    pub fn begin_refresh(&self, backend: Arc<dyn Backend>, force: bool) -> Result<RefreshStep> {
        let interval = backend.min_refresh_interval();
        self.begin_refresh_at(backend, force, interval, Utc::now())
    }

    /// Like [`AccountRecord::begin_refresh`] with an explicit interval and clock.
    pub fn begin_refresh_at(
        &self,
        backend: Arc<dyn Backend>,
        force: bool,
        min_interval: Duration,
        now: DateTime<Utc>,
    ) -> Result<RefreshStep> {
        if backend.name() != self.backend_type {
            return Err(Error::InvalidInput(format!(
                "Account {} belongs to backend '{}', not '{}'",
                self.id,
                self.backend_type,
                backend.name()
            )));
        }
        if !self.activated {
            return Ok(RefreshStep::Inactive);
        }
        if !force && self.is_fresh(min_interval, now) {
            return Ok(RefreshStep::Cached);
        }

        Ok(RefreshStep::Ready(RefreshTicket {
            account: self.id,
            backend,
            login_name: self.login_name.clone(),
            secret: self.secret.clone(),
            config: self.config.clone(),
            revision: self.revision,
            started_at: now,
        }))
    }

    /// Apply a finished status check.
    ///
    /// The result is dropped as stale if the record was written since the
    /// snapshot, or if a check that started later (successful or failed)
    /// was already applied.
    pub fn finish_refresh(&mut self, result: RefreshResult) -> RefreshApplied {
        if result.account != self.id || result.revision != self.revision {
            return RefreshApplied::Stale;
        }
        let latest = self
            .last_attempt_at
            .into_iter()
            .chain(self.live_status.as_ref().map(|status| status.checked_at))
            .max();
        if latest.is_some_and(|latest| latest > result.started_at) {
            return RefreshApplied::Stale;
        }

        self.last_attempt_at = Some(result.started_at);
        match result.outcome {
            Ok(report) => {
                self.live_status = Some(report.into_live(result.started_at));
                self.refresh_error = None;
                RefreshApplied::Updated
            }
            Err(message) => {
                self.refresh_error = Some(message.clone());
                RefreshApplied::Degraded(message)
            }
        }
    }

    /// Refresh in place, for callers holding the record exclusively.
    ///
    /// # Errors
    /// - `BackendUnavailable` if the check failed; the record keeps its
    ///   previous status and is marked degraded
    pub async fn refresh(&mut self, backend: Arc<dyn Backend>, force: bool) -> Result<()> {
        let ticket = match self.begin_refresh(backend, force)? {
            RefreshStep::Ready(ticket) => ticket,
            RefreshStep::Cached | RefreshStep::Inactive => return Ok(()),
        };
        match self.finish_refresh(ticket.run().await) {
            RefreshApplied::Degraded(message) => Err(Error::BackendUnavailable(message)),
            RefreshApplied::Updated | RefreshApplied::Stale => Ok(()),
        }
    }

    /// Project to the caller-safe view.
    pub fn to_info(&self) -> AccountInfo {
        AccountInfo {
            id: self.id,
            backend_type: self.backend_type.clone(),
            login_name: self.login_name.clone(),
            owner: self.owner.clone(),
            shared: self.shared,
            activated: self.activated,
            config: self.config.clone(),
            live_status: self.live_status.clone(),
            refresh_error: self.refresh_error.clone(),
        }
    }
}

impl RefreshTicket {
    /// Account the snapshot was taken from.
    pub fn account(&self) -> &AccountId {
        &self.account
    }

    /// When the check counts as started; stamped on the resulting status.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Query the backend. Touches no record.
    pub async fn run(self) -> RefreshResult {
        let outcome = self
            .backend
            .check_status(&self.login_name, &self.secret, &self.config)
            .await
            .map_err(|e| e.to_string());

        RefreshResult {
            account: self.account,
            revision: self.revision,
            started_at: self.started_at,
            outcome,
        }
    }
}

impl RefreshResult {
    /// Whether the backend check succeeded.
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

fn validate_login(login_name: &str) -> Result<()> {
    if login_name.trim().is_empty() {
        return Err(Error::InvalidInput(
            "Login name cannot be empty".to_string(),
        ));
    }
    Ok(())
}
