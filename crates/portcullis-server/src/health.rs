//! Liveness and readiness.
//!
//! - `/health` answers `200` while the process is serving.
//! - `/ready` answers `200` only while every registered check passes and the
//!   server is not draining; load balancers stop routing on `503`.
//!
//! Both bypass the gate so health checks never touch the identity provider.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Body of the `/health` response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthStatus {
    /// Always `healthy` while the process answers.
    pub status: String,
    /// Service name.
    pub service: String,
    /// Crate version.
    pub version: String,
    /// Seconds since start.
    pub uptime_seconds: u64,
}

/// Liveness reporter.
#[derive(Debug, Clone)]
pub struct HealthCheck {
    service: String,
    version: String,
    start_time: Instant,
}

impl HealthCheck {
    /// Creates a reporter, starting the uptime clock now.
    #[must_use]
    pub fn new(service: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            version: version.into(),
            start_time: Instant::now(),
        }
    }

    /// The current status.
    #[must_use]
    pub fn status(&self) -> HealthStatus {
        HealthStatus {
            status: "healthy".to_string(),
            service: self.service.clone(),
            version: self.version.clone(),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }
}

/// Body of the `/ready` response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReadinessStatus {
    /// Whether traffic should be routed here.
    pub ready: bool,
    /// Individual check results, by name.
    pub checks: BTreeMap<String, bool>,
}

type ReadinessCheckFn = Arc<dyn Fn() -> bool + Send + Sync>;

/// Readiness reporter with named checks and a drain switch.
///
/// # Example
///
/// ```rust
/// use portcullis_server::ReadinessCheck;
///
/// let readiness = ReadinessCheck::new().add_check("config", || true);
/// assert!(readiness.is_ready());
///
/// readiness.set_ready(false);
/// assert!(!readiness.is_ready());
/// ```
#[derive(Clone)]
pub struct ReadinessCheck {
    checks: Vec<(String, ReadinessCheckFn)>,
    ready_override: Arc<AtomicBool>,
}

impl std::fmt::Debug for ReadinessCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadinessCheck")
            .field("checks", &self.checks.iter().map(|(n, _)| n).collect::<Vec<_>>())
            .field("ready_override", &self.ready_override)
            .finish()
    }
}

impl ReadinessCheck {
    /// Creates a reporter with no checks; ready until drained.
    #[must_use]
    pub fn new() -> Self {
        Self {
            checks: Vec::new(),
            ready_override: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Registers a named check.
    #[must_use]
    pub fn add_check<F>(mut self, name: impl Into<String>, check: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        self.checks.push((name.into(), Arc::new(check)));
        self
    }

    /// Whether the server is accepting traffic and every check passes.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready_override.load(Ordering::SeqCst) && self.checks.iter().all(|(_, check)| check())
    }

    /// The full status with individual results.
    #[must_use]
    pub fn status(&self) -> ReadinessStatus {
        let checks: BTreeMap<String, bool> = self
            .checks
            .iter()
            .map(|(name, check)| (name.clone(), check()))
            .collect();

        let ready = self.ready_override.load(Ordering::SeqCst) && checks.values().all(|&v| v);
        ReadinessStatus { ready, checks }
    }

    /// Flips the drain switch. Cleared during graceful shutdown.
    pub fn set_ready(&self, ready: bool) {
        self.ready_override.store(ready, Ordering::SeqCst);
    }
}

impl Default for ReadinessCheck {
    fn default() -> Self {
        Self::new()
    }
}
