//! Aggregated health check reporting.
//!
//! Collects each watcher's `health_check()` result into a unified
//! [`DaemonHealth`] report. The overall daemon status is the worst
//! status among all watchers.
//!
//! # Aggregation Rule
//!
//! - All Healthy -> Healthy
//! - Any Degraded, none Unhealthy -> Degraded(reasons)
//! - Any Unhealthy -> Unhealthy(reasons)

use serde::Serialize;

use mori_core::pipeline::HealthStatus;

/// Aggregated health report for the entire daemon.
#[derive(Debug, Clone, Serialize)]
pub struct DaemonHealth {
    /// Overall daemon health status (worst of all watchers).
    pub status: HealthStatus,
    /// Daemon uptime in seconds since start.
    pub uptime_secs: u64,
    /// Per-watcher health reports.
    pub watchers: Vec<WatcherHealth>,
}

/// Health status for a single watcher.
#[derive(Debug, Clone, Serialize)]
pub struct WatcherHealth {
    /// Server id the watcher is responsible for.
    pub server_id: String,
    /// Current health status of the watcher.
    pub status: HealthStatus,
}

/// Aggregate multiple watcher health statuses into a single status.
///
/// Returns the worst status found: Unhealthy > Degraded > Healthy.
pub fn aggregate_status(watchers: &[WatcherHealth]) -> HealthStatus {
    let mut worst = HealthStatus::Healthy;
    let mut reasons = Vec::new();

    for watcher in watchers {
        match &watcher.status {
            HealthStatus::Healthy => {}
            HealthStatus::Degraded(reason) => {
                if !worst.is_unhealthy() {
                    reasons.push(format!("{}: {}", watcher.server_id, reason));
                    worst = HealthStatus::Degraded(String::new());
                }
            }
            HealthStatus::Unhealthy(reason) => {
                if !worst.is_unhealthy() {
                    // Degraded reasons are superseded by unhealthy ones
                    reasons.clear();
                }
                reasons.push(format!("{}: {}", watcher.server_id, reason));
                worst = HealthStatus::Unhealthy(String::new());
            }
        }
    }

    match worst {
        HealthStatus::Healthy => HealthStatus::Healthy,
        HealthStatus::Degraded(_) => HealthStatus::Degraded(reasons.join("; ")),
        HealthStatus::Unhealthy(_) => HealthStatus::Unhealthy(reasons.join("; ")),
    }
}
