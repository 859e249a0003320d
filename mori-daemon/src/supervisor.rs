//! Watcher supervision -- assembly, channel wiring, and lifecycle management.
//!
//! The [`Supervisor`] is the central coordinator of `mori-daemon`.
//! It loads configuration, builds one independent [`ServerWatcher`] per
//! enabled server, starts them with fault isolation (one server's startup
//! failure never prevents the others from running), drains the death and
//! ban audit channels into structured logs, and performs signal-driven
//! graceful shutdown.
//!
//! Watchers share nothing mutable except the per-path file lock registry;
//! a stalled or failing server never blocks another server's stream.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use mori_core::config::MoriConfig;
use mori_core::event::{BanEvent, DeathEvent};
use mori_core::metrics as m;
use mori_core::pipeline::Pipeline;
use mori_core::types::DispatchKind;
use mori_watcher::config::WatcherConfig;
use mori_watcher::pathlock::PathLocks;
use mori_watcher::watch::{ServerWatcher, ServerWatcherBuilder};

use crate::health::{DaemonHealth, WatcherHealth, aggregate_status};
use crate::metrics_server;

/// Channel capacity constants.
const DEATH_CHANNEL_CAPACITY: usize = 256;
const BAN_CHANNEL_CAPACITY: usize = 256;

/// The daemon supervisor.
///
/// Owns the complete lifecycle of all configured watchers:
/// configuration loading, channel wiring, fault-isolated startup,
/// health reporting, and graceful shutdown.
pub struct Supervisor {
    /// Loaded and validated configuration.
    config: MoriConfig,
    /// One watcher per enabled server.
    watchers: Vec<ServerWatcher>,
    /// Death event receiver (forward-mode watchers).
    death_rx: Option<mpsc::Receiver<DeathEvent>>,
    /// Ban audit receiver (self-managed watchers).
    ban_rx: Option<mpsc::Receiver<BanEvent>>,
    /// Shutdown broadcast sender (signals all drain tasks).
    shutdown_tx: broadcast::Sender<()>,
    /// Daemon start time (for uptime reporting).
    start_time: Instant,
}

impl Supervisor {
    /// Load configuration from a file and build the supervisor.
    pub async fn build(config_path: &Path) -> Result<Self> {
        let config = MoriConfig::load(config_path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?;
        Self::build_from_config(config).await
    }

    /// Build from an already-loaded configuration.
    ///
    /// Useful for testing or when config has already been loaded.
    /// A server whose watcher configuration cannot be resolved is skipped
    /// with an error log; it does not abort the other servers.
    pub async fn build_from_config(config: MoriConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        // Install metrics recorder before watcher assembly
        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
            info!(port = config.metrics.port, "metrics endpoint enabled");
        }

        debug!("creating event channels and lock registry");
        let (death_tx, death_rx) = mpsc::channel::<DeathEvent>(DEATH_CHANNEL_CAPACITY);
        let (ban_tx, ban_rx) = mpsc::channel::<BanEvent>(BAN_CHANNEL_CAPACITY);
        let (shutdown_tx, _) = broadcast::channel(16);
        let locks = Arc::new(PathLocks::new());

        let mut watchers = Vec::new();
        for server in config.enabled_servers() {
            let watcher_config = match WatcherConfig::resolve(&config.watcher, server) {
                Ok(resolved) => resolved,
                Err(e) => {
                    error!(
                        server = %server.id,
                        error = %e,
                        "invalid watcher configuration, skipping server"
                    );
                    continue;
                }
            };

            let mut builder = ServerWatcherBuilder::new()
                .config(watcher_config)
                .locks(Arc::clone(&locks));
            builder = match server.mode {
                DispatchKind::Forward => builder.death_sender(death_tx.clone()),
                DispatchKind::SelfManaged => builder.ban_sender(ban_tx.clone()),
            };

            match builder.build() {
                Ok(watcher) => {
                    info!(server = %server.id, mode = %server.mode, "watcher assembled");
                    watchers.push(watcher);
                }
                Err(e) => {
                    error!(
                        server = %server.id,
                        error = %e,
                        "failed to assemble watcher, skipping server"
                    );
                }
            }
        }

        info!(total_watchers = watchers.len(), "supervisor initialized");

        if config.metrics.enabled {
            record_daemon_metrics(watchers.len());
        }

        Ok(Self {
            config,
            watchers,
            death_rx: Some(death_rx),
            ban_rx: Some(ban_rx),
            shutdown_tx,
            start_time: Instant::now(),
        })
    }

    /// Number of assembled watchers.
    pub fn watcher_count(&self) -> usize {
        self.watchers.len()
    }

    /// Get a reference to the loaded configuration.
    pub fn config(&self) -> &MoriConfig {
        &self.config
    }

    /// Start every assembled watcher, isolating failures.
    ///
    /// A watcher whose `Preparing` stage fails (e.g. missing logs
    /// directory) is logged and left stopped; the others keep running.
    /// Returns the number of watchers that entered `Running`.
    pub async fn start_all(&mut self) -> usize {
        let mut started = 0;
        for watcher in &mut self.watchers {
            match watcher.start().await {
                Ok(()) => started += 1,
                Err(e) => {
                    error!(
                        server = %watcher.server_id(),
                        error = %e,
                        "watcher failed to start, other watchers unaffected"
                    );
                }
            }
        }
        started
    }

    /// Stop every running watcher.
    pub async fn stop_all(&mut self) {
        for watcher in &mut self.watchers {
            if watcher.state_name() != "running" {
                continue;
            }
            if let Err(e) = watcher.stop().await {
                error!(
                    server = %watcher.server_id(),
                    error = %e,
                    "watcher failed to stop cleanly"
                );
            }
        }
    }

    /// Start all watchers and block until a shutdown signal arrives.
    ///
    /// # Shutdown Triggers
    ///
    /// - `SIGTERM` (from systemd, Docker, or `kill`)
    /// - `SIGINT` (Ctrl+C)
    pub async fn run(&mut self) -> Result<()> {
        // Write PID file if configured
        if !self.config.general.pid_file.is_empty() {
            let path = Path::new(&self.config.general.pid_file).to_path_buf();
            write_pid_file(&path)?;
        }

        let started = self.start_all().await;
        if started == 0 {
            if !self.config.general.pid_file.is_empty() {
                remove_pid_file(Path::new(&self.config.general.pid_file));
            }
            return Err(anyhow::anyhow!(
                "no watcher could be started ({} configured)",
                self.watchers.len()
            ));
        }
        info!(
            started = started,
            total = self.watchers.len(),
            "watchers running"
        );

        // Drain death events (forward mode) into structured logs.
        // External consumers hook into this channel boundary.
        let mut death_task = self.death_rx.take().map(|rx| {
            let shutdown_rx = self.shutdown_tx.subscribe();
            spawn_death_logger(rx, shutdown_rx)
        });

        // Drain ban audit events (self-managed mode).
        let mut ban_task = self.ban_rx.take().map(|rx| {
            let shutdown_rx = self.shutdown_tx.subscribe();
            spawn_ban_audit_logger(rx, shutdown_rx)
        });

        // Periodic uptime metric refresh
        let mut uptime_task = if self.config.metrics.enabled {
            let shutdown_rx = self.shutdown_tx.subscribe();
            Some(spawn_uptime_updater(self.start_time, shutdown_rx))
        } else {
            None
        };

        info!("entering main event loop");
        let signal = wait_for_shutdown_signal().await?;
        info!(signal = signal, "shutdown signal received");

        info!("broadcasting shutdown signal to drain tasks");
        let _ = self.shutdown_tx.send(());

        self.stop_all().await;

        if let Some(task) = death_task.take() {
            let _ = task.await;
        }
        if let Some(task) = ban_task.take() {
            let _ = task.await;
        }
        if let Some(task) = uptime_task.take() {
            let _ = task.await;
        }

        if !self.config.general.pid_file.is_empty() {
            remove_pid_file(Path::new(&self.config.general.pid_file));
        }

        info!("supervisor shut down");
        Ok(())
    }

    /// Get the current aggregated health status.
    pub async fn health(&self) -> DaemonHealth {
        let mut watchers = Vec::with_capacity(self.watchers.len());
        for watcher in &self.watchers {
            watchers.push(WatcherHealth {
                server_id: watcher.server_id().to_owned(),
                status: watcher.health_check().await,
            });
        }

        let overall_status = aggregate_status(&watchers);
        let uptime_secs = self.start_time.elapsed().as_secs();

        if self.config.metrics.enabled {
            #[allow(clippy::cast_precision_loss)]
            metrics::gauge!(m::DAEMON_UPTIME_SECONDS).set(uptime_secs as f64);
        }

        DaemonHealth {
            status: overall_status,
            uptime_secs,
            watchers,
        }
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
///
/// Returns the name of the signal that triggered the shutdown.
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Write the current process PID to a file.
///
/// Used to prevent duplicate daemon instances.
///
/// # Security
///
/// - Uses `create_new(true)` to atomically create file (prevents TOCTOU races)
/// - Verifies the created file is a regular file (prevents symlink attacks)
/// - Creates parent directory with restrictive permissions (0o700)
fn write_pid_file(path: &Path) -> Result<()> {
    use std::fs::{self, OpenOptions};
    use std::io::{ErrorKind, Write};

    if let Some(parent) = path.parent() {
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            let mut builder = fs::DirBuilder::new();
            builder.mode(0o700).recursive(true);
            builder.create(parent)?;
        }
        #[cfg(not(unix))]
        {
            fs::create_dir_all(parent)?;
        }
    }

    let pid = std::process::id();

    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            let existing_pid = fs::read_to_string(path).unwrap_or_else(|_| "unknown".to_string());
            return Err(anyhow::anyhow!(
                "PID file {} already exists with PID: {}. Is another instance running?",
                path.display(),
                existing_pid.trim()
            ));
        }
        Err(e) => return Err(e.into()),
    };

    let metadata = file.metadata()?;
    if !metadata.is_file() {
        let _ = fs::remove_file(path);
        return Err(anyhow::anyhow!(
            "PID file {} is not a regular file (possible symlink attack)",
            path.display()
        ));
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let permissions = std::fs::Permissions::from_mode(0o600);
        file.set_permissions(permissions)?;
    }

    writeln!(file, "{}", pid)?;

    info!(pid = pid, path = %path.display(), "PID file written");
    Ok(())
}

/// Remove the PID file on daemon shutdown.
///
/// Logs a warning but does not fail if the file cannot be removed.
fn remove_pid_file(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        warn!(
            path = %path.display(),
            error = %e,
            "failed to remove PID file"
        );
    } else {
        info!(path = %path.display(), "PID file removed");
    }
}

/// Spawn a background task that logs forwarded death events.
///
/// This is the delivery boundary for forward-mode watchers: downstream
/// consumers (bots, web hooks) attach here. The daemon itself only logs.
fn spawn_death_logger(
    mut death_rx: mpsc::Receiver<DeathEvent>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                event = death_rx.recv() => {
                    match event {
                        Some(event) => {
                            info!(
                                event_id = %event.id,
                                server = %event.server_id,
                                subject = %event.record.subject.steam_id,
                                alive_secs = ?event.record.subject.alive_secs,
                                log_ts = ?event.record.timestamp,
                                trace = %event.metadata.trace_id,
                                "death event received"
                            );
                        }
                        None => {
                            debug!("death channel closed, exiting logger");
                            break;
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    debug!("death logger shutting down");
                    break;
                }
            }
        }
    })
}

/// Spawn a background task that logs ban audit events.
///
/// BanEvents report completed (or failed) ban list writes from
/// self-managed watchers.
fn spawn_ban_audit_logger(
    mut ban_rx: mpsc::Receiver<BanEvent>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                event = ban_rx.recv() => {
                    match event {
                        Some(event) => {
                            info!(
                                event_id = %event.id,
                                server = %event.server_id,
                                subject = %event.subject,
                                success = event.success,
                                trace = %event.metadata.trace_id,
                                "ban list write completed"
                            );
                        }
                        None => {
                            debug!("ban channel closed, exiting logger");
                            break;
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    debug!("ban audit logger shutting down");
                    break;
                }
            }
        }
    })
}

/// Record daemon-level metrics (build info, watchers registered).
fn record_daemon_metrics(watcher_count: usize) {
    #[allow(clippy::cast_precision_loss)]
    metrics::gauge!(m::DAEMON_BUILD_INFO, "version" => env!("CARGO_PKG_VERSION")).set(1.0);

    #[allow(clippy::cast_precision_loss)]
    metrics::gauge!(m::DAEMON_WATCHERS_REGISTERED).set(watcher_count as f64);

    debug!(
        watcher_count = watcher_count,
        version = env!("CARGO_PKG_VERSION"),
        "daemon metrics recorded"
    );
}

/// Spawn a background task that periodically updates the uptime metric.
fn spawn_uptime_updater(
    start_time: Instant,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(10));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let uptime_secs = start_time.elapsed().as_secs();
                    #[allow(clippy::cast_precision_loss)]
                    metrics::gauge!(m::DAEMON_UPTIME_SECONDS).set(uptime_secs as f64);
                }
                _ = shutdown_rx.recv() => {
                    debug!("uptime updater shutting down");
                    break;
                }
            }
        }
    })
}
