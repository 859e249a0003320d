//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`
//! 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `mori_`
//! - 모듈명: `watcher_`, `scheduler_`, `banlist_`, `daemon_`
//! - 접미어: `_total` (counter), 없음 (gauge)

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 서버 레이블 키
pub const LABEL_SERVER: &str = "server";

/// 결과 레이블 키 (success, failure)
pub const LABEL_RESULT: &str = "result";

// ─── Watcher 메트릭 ────────────────────────────────────────────────

/// Watcher: 처리된 로그 라인 수 (counter, label: server)
pub const WATCHER_LINES_TOTAL: &str = "mori_watcher_lines_total";

/// Watcher: 판별자를 통과한 사망 이벤트 수 (counter, label: server)
pub const WATCHER_DEATHS_TOTAL: &str = "mori_watcher_deaths_total";

/// Watcher: 예외 규칙으로 억제된 사망 수 (counter, label: server)
pub const WATCHER_SUPPRESSED_TOTAL: &str = "mori_watcher_suppressed_total";

/// Watcher: 디코딩되지 않아 건너뛴 라인 수 (counter, label: server)
pub const WATCHER_DECODE_SKIPPED_TOTAL: &str = "mori_watcher_decode_skipped_total";

/// Watcher: 폴링 사이클 에러 수 (counter, label: server)
pub const WATCHER_POLL_ERRORS_TOTAL: &str = "mori_watcher_poll_errors_total";

/// Watcher: 감지된 로그 파일 로테이션 수 (counter, label: server)
pub const WATCHER_ROTATIONS_TOTAL: &str = "mori_watcher_rotations_total";

// ─── Scheduler / Ban List 메트릭 ───────────────────────────────────

/// Scheduler: 대기 중인 밴 수 (gauge, label: server)
pub const SCHEDULER_PENDING_BANS: &str = "mori_scheduler_pending_bans";

/// Ban list: 쓰기 시도 수 (counter, labels: server, result)
pub const BANLIST_WRITES_TOTAL: &str = "mori_banlist_writes_total";

// ─── Daemon 메트릭 ─────────────────────────────────────────────────

/// Daemon: 빌드 정보 (gauge, label: version)
pub const DAEMON_BUILD_INFO: &str = "mori_daemon_build_info";

/// Daemon: 등록된 감시기 수 (gauge)
pub const DAEMON_WATCHERS_REGISTERED: &str = "mori_daemon_watchers_registered";

/// Daemon: 가동 시간 (gauge, 초)
pub const DAEMON_UPTIME_SECONDS: &str = "mori_daemon_uptime_seconds";

/// 모든 메트릭의 설명을 전역 레코더에 등록합니다.
///
/// 레코더 설치 직후 한 번 호출합니다.
pub fn describe_all() {
    metrics::describe_counter!(
        WATCHER_LINES_TOTAL,
        "Total log lines processed by the watcher"
    );
    metrics::describe_counter!(
        WATCHER_DEATHS_TOTAL,
        "Total qualifying death events detected"
    );
    metrics::describe_counter!(
        WATCHER_SUPPRESSED_TOTAL,
        "Total death events suppressed by exception rules"
    );
    metrics::describe_counter!(
        WATCHER_DECODE_SKIPPED_TOTAL,
        "Total lines skipped because they did not decode as structured records"
    );
    metrics::describe_counter!(WATCHER_POLL_ERRORS_TOTAL, "Total failed poll cycles");
    metrics::describe_counter!(WATCHER_ROTATIONS_TOTAL, "Total log file rotations detected");
    metrics::describe_gauge!(SCHEDULER_PENDING_BANS, "Pending bans awaiting execution");
    metrics::describe_counter!(BANLIST_WRITES_TOTAL, "Ban list write attempts by result");
    metrics::describe_gauge!(DAEMON_BUILD_INFO, "Daemon build information");
    metrics::describe_gauge!(DAEMON_WATCHERS_REGISTERED, "Number of registered watchers");
    metrics::describe_gauge!(DAEMON_UPTIME_SECONDS, "Daemon uptime in seconds");
}
