//! In-process backend with a fixed status.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::debug;

use credkeep_common::{AccountConfig, Error, Result, Secret};

use crate::backend::{Backend, StatusReport, DEFAULT_MIN_REFRESH_INTERVAL};
use crate::schema::ConfigSchema;

/// Backend that answers status checks locally.
///
/// Useful for accounts on services without a status API, and for testing.
/// The reported status (or failure) can be changed at runtime and every
/// check is counted.
pub struct StaticBackend {
    name: String,
    schema: ConfigSchema,
    min_refresh_interval: Duration,
    latency: Duration,
    outcome: Mutex<std::result::Result<StatusReport, String>>,
    calls: AtomicUsize,
}

impl StaticBackend {
    /// Create a backend reporting every account as valid.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: ConfigSchema::empty(),
            min_refresh_interval: DEFAULT_MIN_REFRESH_INTERVAL,
            latency: Duration::ZERO,
            outcome: Mutex::new(Ok(StatusReport::valid())),
            calls: AtomicUsize::new(0),
        }
    }

    /// Set the option schema.
    pub fn with_schema(mut self, schema: ConfigSchema) -> Self {
        self.schema = schema;
        self
    }

    /// Set the minimum refresh interval.
    pub fn with_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh_interval = interval;
        self
    }

    /// Delay every status check by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Set the reported status.
    pub fn with_status(self, report: StatusReport) -> Self {
        self.set_status(report);
        self
    }

    /// Report `report` from now on.
    pub fn set_status(&self, report: StatusReport) {
        *self.outcome.lock().unwrap_or_else(PoisonError::into_inner) = Ok(report);
    }

    /// Fail every check with `message` from now on.
    pub fn set_failure(&self, message: impl Into<String>) {
        *self.outcome.lock().unwrap_or_else(PoisonError::into_inner) = Err(message.into());
    }

    /// Number of status checks performed so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Backend for StaticBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn schema(&self) -> &ConfigSchema {
        &self.schema
    }

    fn min_refresh_interval(&self) -> Duration {
        self.min_refresh_interval
    }

    async fn check_status(
        &self,
        login: &str,
        _secret: &Secret,
        _config: &AccountConfig,
    ) -> Result<StatusReport> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        debug!(backend = %self.name, login, "checking account status");

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let outcome = self
            .outcome
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        outcome.map_err(Error::BackendUnavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reports_configured_status() {
        let backend = StaticBackend::new("hostA").with_status(StatusReport::premium());

        let report = backend
            .check_status("u1", &Secret::new("p1"), &AccountConfig::new())
            .await
            .unwrap();

        assert!(report.premium);
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn test_failure_maps_to_backend_unavailable() {
        let backend = StaticBackend::new("hostA");
        backend.set_failure("connection refused");

        let err = backend
            .check_status("u1", &Secret::new("p1"), &AccountConfig::new())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::BackendUnavailable(msg) if msg == "connection refused"));
    }

    #[tokio::test]
    async fn test_latency_delays_check() {
        let backend = StaticBackend::new("slow").with_latency(Duration::from_millis(20));
        let started = std::time::Instant::now();

        backend
            .check_status("u1", &Secret::new("p1"), &AccountConfig::new())
            .await
            .unwrap();

        assert!(started.elapsed() >= Duration::from_millis(20));
    }
}
