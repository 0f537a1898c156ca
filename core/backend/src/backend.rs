//! Backend capability trait definition.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use credkeep_common::{AccountConfig, Result, Secret};

use crate::schema::ConfigSchema;

/// Minimum refresh interval used when a backend does not override it.
pub const DEFAULT_MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Status reported by a backend for one set of credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    /// Whether the credentials were accepted.
    pub valid: bool,
    /// Whether the account has premium privileges.
    pub premium: bool,
    /// Expiry of the premium period, if the backend has one.
    pub valid_until: Option<DateTime<Utc>>,
    /// Remaining traffic in bytes (None = unlimited or unknown).
    pub traffic_left: Option<u64>,
    /// Traffic quota in bytes (None = unlimited or unknown).
    pub max_traffic: Option<u64>,
}

impl StatusReport {
    /// A valid account without premium privileges or quota information.
    pub fn valid() -> Self {
        Self {
            valid: true,
            premium: false,
            valid_until: None,
            traffic_left: None,
            max_traffic: None,
        }
    }

    /// A valid premium account.
    pub fn premium() -> Self {
        Self {
            premium: true,
            ..Self::valid()
        }
    }

    /// Credentials the backend rejected.
    pub fn invalid() -> Self {
        Self {
            valid: false,
            ..Self::valid()
        }
    }

    /// Stamp this report with the time the check that produced it started.
    pub fn into_live(self, checked_at: DateTime<Utc>) -> LiveStatus {
        LiveStatus {
            report: self,
            checked_at,
        }
    }
}

/// Last-known backend status cached on an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveStatus {
    /// Reported values.
    #[serde(flatten)]
    pub report: StatusReport,
    /// When the check producing this status started.
    pub checked_at: DateTime<Utc>,
}

impl LiveStatus {
    /// Whether this status is still within `interval` at `now`.
    pub fn is_fresh(&self, interval: Duration, now: DateTime<Utc>) -> bool {
        match chrono::Duration::from_std(interval) {
            Ok(interval) => self.checked_at + interval > now,
            // An interval too large to represent never expires.
            Err(_) => true,
        }
    }
}

/// Capability interface implemented by every backend type.
///
/// Implementations must handle their own authentication and rate limiting.
/// Account records never specialize on the backend; everything
/// backend-specific goes through this trait.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Get the backend type name (e.g., "offline", "hostA").
    fn name(&self) -> &str;

    /// Options accepted in an account's configuration.
    fn schema(&self) -> &ConfigSchema;

    /// Cached status younger than this is reused by non-forced refreshes.
    fn min_refresh_interval(&self) -> Duration {
        DEFAULT_MIN_REFRESH_INTERVAL
    }

    /// Validate an account configuration.
    ///
    /// # Errors
    /// - `InvalidConfig` for unknown options or values of the wrong kind
    fn validate_config(&self, config: &AccountConfig) -> Result<()> {
        self.schema().validate(config)
    }

    /// Query the backend for the live status of a set of credentials.
    ///
    /// # Postconditions
    /// - Has no effect on stored accounts; callers decide what to keep
    ///
    /// # Errors
    /// - `BackendUnavailable` when the service cannot be reached or fails
    async fn check_status(
        &self,
        login: &str,
        secret: &Secret,
        config: &AccountConfig,
    ) -> Result<StatusReport>;
}
