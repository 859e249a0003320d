//! Supervisor integration tests: assembly, fault-isolated startup,
//! aggregated health and graceful stop.

use mori_core::config::{MoriConfig, ServerConfig};
use mori_core::pipeline::HealthStatus;
use mori_core::types::DispatchKind;
use mori_daemon::supervisor::Supervisor;

fn server_entry(id: &str, logs_dir: &str, mode: DispatchKind) -> ServerConfig {
    ServerConfig {
        id: id.to_owned(),
        logs_dir: logs_dir.to_owned(),
        enabled: true,
        mode,
        cache_path: None,
        ban_list_path: None,
        log_file_pattern: None,
        death_event: None,
        poll_interval_secs: None,
        ban_delay_secs: None,
        ban_min_spacing_secs: None,
        verbose: None,
        archive_old_logs: None,
        suicide_exception: None,
    }
}

fn base_config(dir: &std::path::Path) -> MoriConfig {
    let mut config = MoriConfig::default();
    config.watcher.cache_path = dir.join("cache.json").display().to_string();
    config.watcher.ban_list_path = dir.join("bans.txt").display().to_string();
    config
}

#[tokio::test]
async fn disabled_servers_are_not_assembled() {
    let dir = tempfile::tempdir().unwrap();
    let logs = dir.path().join("logs");
    std::fs::create_dir_all(&logs).unwrap();

    let mut config = base_config(dir.path());
    config.servers = vec![
        server_entry("alpha", &logs.display().to_string(), DispatchKind::SelfManaged),
        ServerConfig {
            enabled: false,
            ..server_entry("bravo", &logs.display().to_string(), DispatchKind::SelfManaged)
        },
    ];

    let supervisor = Supervisor::build_from_config(config).await.unwrap();
    assert_eq!(supervisor.watcher_count(), 1);
}

#[tokio::test]
async fn startup_failure_of_one_watcher_does_not_block_others() {
    let dir = tempfile::tempdir().unwrap();
    let good_logs = dir.path().join("good");
    std::fs::create_dir_all(&good_logs).unwrap();
    let missing_logs = dir.path().join("missing");

    let mut config = base_config(dir.path());
    config.servers = vec![
        server_entry(
            "good",
            &good_logs.display().to_string(),
            DispatchKind::SelfManaged,
        ),
        server_entry(
            "broken",
            &missing_logs.display().to_string(),
            DispatchKind::SelfManaged,
        ),
    ];

    let mut supervisor = Supervisor::build_from_config(config).await.unwrap();
    assert_eq!(supervisor.watcher_count(), 2);

    let started = supervisor.start_all().await;
    assert_eq!(started, 1);

    // Aggregated health reflects the failed watcher without hiding the good one
    let health = supervisor.health().await;
    assert!(health.status.is_unhealthy());
    let broken = health
        .watchers
        .iter()
        .find(|w| w.server_id == "broken")
        .unwrap();
    assert!(broken.status.is_unhealthy());
    let good = health
        .watchers
        .iter()
        .find(|w| w.server_id == "good")
        .unwrap();
    assert_eq!(good.status, HealthStatus::Healthy);

    supervisor.stop_all().await;
}

#[tokio::test]
async fn forward_and_self_managed_servers_coexist() {
    let dir = tempfile::tempdir().unwrap();
    let logs_a = dir.path().join("a");
    let logs_b = dir.path().join("b");
    std::fs::create_dir_all(&logs_a).unwrap();
    std::fs::create_dir_all(&logs_b).unwrap();

    let mut config = base_config(dir.path());
    config.servers = vec![
        server_entry("alpha", &logs_a.display().to_string(), DispatchKind::Forward),
        server_entry(
            "bravo",
            &logs_b.display().to_string(),
            DispatchKind::SelfManaged,
        ),
    ];

    let mut supervisor = Supervisor::build_from_config(config).await.unwrap();
    assert_eq!(supervisor.watcher_count(), 2);
    assert_eq!(supervisor.start_all().await, 2);

    let health = supervisor.health().await;
    assert_eq!(health.status, HealthStatus::Healthy);

    supervisor.stop_all().await;
    let health = supervisor.health().await;
    assert!(health.status.is_unhealthy());
}

#[tokio::test]
async fn empty_server_list_builds_with_zero_watchers() {
    let dir = tempfile::tempdir().unwrap();
    let config = base_config(dir.path());
    let supervisor = Supervisor::build_from_config(config).await.unwrap();
    assert_eq!(supervisor.watcher_count(), 0);
}

#[tokio::test]
async fn invalid_config_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = base_config(dir.path());
    config.general.log_level = "loudest".to_owned();
    let result = Supervisor::build_from_config(config).await;
    assert!(result.is_err());
}
