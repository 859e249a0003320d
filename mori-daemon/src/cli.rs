//! CLI argument definitions for mori-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;

/// Mori death watcher daemon.
///
/// Supervises one log watcher per configured game server: tails the
/// newest log file, extracts death events, filters false positives and
/// maintains the external ban list (or forwards events downstream).
#[derive(Parser, Debug)]
#[command(name = "mori-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to mori.toml configuration file.
    #[arg(short, long, default_value = "/etc/mori/mori.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration file and exit without starting the daemon.
    #[arg(long)]
    pub validate: bool,

    /// Override PID file path (takes precedence over config file).
    #[arg(long)]
    pub pid_file: Option<String>,
}
