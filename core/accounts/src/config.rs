//! Manager and store settings.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings for [`crate::AccountManager`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Query the backend right after an account is created.
    pub refresh_on_create: bool,
    /// Lower bound applied to every backend's minimum refresh interval.
    pub min_refresh_floor: Duration,
}

impl ManagerConfig {
    /// Set whether new accounts are refreshed immediately.
    pub fn with_refresh_on_create(mut self, enabled: bool) -> Self {
        self.refresh_on_create = enabled;
        self
    }

    /// Set the refresh interval floor.
    pub fn with_min_refresh_floor(mut self, floor: Duration) -> Self {
        self.min_refresh_floor = floor;
        self
    }

    /// Effective refresh interval for a backend advertising `backend_interval`.
    pub fn refresh_interval(&self, backend_interval: Duration) -> Duration {
        backend_interval.max(self.min_refresh_floor)
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            refresh_on_create: false,
            min_refresh_floor: Duration::ZERO,
        }
    }
}

/// Settings shared by the account stores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Reject a second account with the same login on the same backend.
    pub unique_logins: bool,
}

impl StoreConfig {
    /// Set the duplicate-login policy.
    pub fn with_unique_logins(mut self, enabled: bool) -> Self {
        self.unique_logins = enabled;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            unique_logins: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_interval_floor() {
        let config = ManagerConfig::default().with_min_refresh_floor(Duration::from_secs(30));

        assert_eq!(config.refresh_interval(Duration::from_secs(10)), Duration::from_secs(30));
        assert_eq!(config.refresh_interval(Duration::from_secs(300)), Duration::from_secs(300));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: StoreConfig = serde_json::from_str("{}").unwrap();
        assert!(config.unique_logins);

        let config: ManagerConfig = serde_json::from_str(r#"{"refresh_on_create":true}"#).unwrap();
        assert!(config.refresh_on_create);
        assert_eq!(config.min_refresh_floor, Duration::ZERO);
    }
}
