//! 감시기 설정 — core 설정에서 서버별 값을 해석
//!
//! [`WatcherConfig`]는 core의 `[watcher]` 기본값과 `[[servers]]` 항목을
//! 합쳐 만든, 감시기 인스턴스 하나의 확정 설정입니다. 감시기 수명 동안
//! 불변입니다.
//!
//! # 사용 예시
//! ```ignore
//! use mori_core::config::MoriConfig;
//! use mori_watcher::config::WatcherConfig;
//!
//! let core = MoriConfig::default();
//! for server in core.enabled_servers() {
//!     let config = WatcherConfig::resolve(&core.watcher, server)?;
//! }
//! ```

use std::path::PathBuf;
use std::time::Duration;

use mori_core::config::{ServerConfig, SuicideExceptionConfig, WatcherDefaults};
use mori_core::types::{DispatchKind, Position};

use crate::classify::ExceptionRule;
use crate::error::WatcherError;

/// 감시기 인스턴스 하나의 확정 설정
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// 서버 고유 ID (캐시 문서의 키, 로그 레이블)
    pub server_id: String,
    /// 로그 디렉토리
    pub logs_dir: PathBuf,
    /// 로그 파일 이름 패턴 (glob)
    pub log_file_pattern: String,
    /// 사망 이벤트 판별자 값
    pub death_event: String,
    /// 폴링 주기
    pub poll_interval: Duration,
    /// 폴링 실패 시 백오프
    pub error_backoff: Duration,
    /// 디스패치 모드
    pub mode: DispatchKind,
    /// 영속 캐시 파일 경로
    pub cache_path: PathBuf,
    /// 밴 목록 파일 경로 (self-managed 모드)
    pub ban_list_path: PathBuf,
    /// 밴 지연
    pub ban_delay: Duration,
    /// 밴 최소 간격
    pub ban_min_spacing: Duration,
    /// 밴 목록 쓰기 재시도 횟수
    pub write_retry_attempts: u32,
    /// 밴 목록 쓰기 재시도 간격
    pub write_retry_delay: Duration,
    /// 상세 진단 로그 출력
    pub verbose: bool,
    /// 로테이션된 옛 로그 파일을 archived/로 이동
    pub archive_old_logs: bool,
    /// 예외 규칙 (설정 순서대로 평가)
    pub exceptions: Vec<ExceptionRule>,
}

impl WatcherConfig {
    /// 공통 기본값과 서버 항목에서 확정 설정을 만듭니다.
    pub fn resolve(
        defaults: &WatcherDefaults,
        server: &ServerConfig,
    ) -> Result<Self, WatcherError> {
        let exception_config = server
            .suicide_exception
            .as_ref()
            .unwrap_or(&defaults.suicide_exception);

        let config = Self {
            server_id: server.id.clone(),
            logs_dir: PathBuf::from(&server.logs_dir),
            log_file_pattern: server
                .log_file_pattern
                .clone()
                .unwrap_or_else(|| defaults.log_file_pattern.clone()),
            death_event: server
                .death_event
                .clone()
                .unwrap_or_else(|| defaults.death_event.clone()),
            poll_interval: Duration::from_secs(
                server.poll_interval_secs.unwrap_or(defaults.poll_interval_secs),
            ),
            error_backoff: Duration::from_secs(defaults.error_backoff_secs),
            mode: server.mode,
            cache_path: PathBuf::from(
                server.cache_path.as_ref().unwrap_or(&defaults.cache_path),
            ),
            ban_list_path: PathBuf::from(
                server
                    .ban_list_path
                    .as_ref()
                    .unwrap_or(&defaults.ban_list_path),
            ),
            ban_delay: Duration::from_secs(
                server.ban_delay_secs.unwrap_or(defaults.ban_delay_secs),
            ),
            ban_min_spacing: Duration::from_secs(
                server
                    .ban_min_spacing_secs
                    .unwrap_or(defaults.ban_min_spacing_secs),
            ),
            write_retry_attempts: defaults.write_retry_attempts,
            write_retry_delay: Duration::from_millis(defaults.write_retry_delay_ms),
            verbose: server.verbose.unwrap_or(defaults.verbose),
            archive_old_logs: server.archive_old_logs.unwrap_or(defaults.archive_old_logs),
            exceptions: build_exceptions(exception_config),
        };

        config.validate()?;
        Ok(config)
    }

    /// 확정 설정의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), WatcherError> {
        if self.server_id.trim().is_empty() {
            return Err(WatcherError::Config {
                field: "server_id".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }
        if self.logs_dir.as_os_str().is_empty() {
            return Err(WatcherError::Config {
                field: "logs_dir".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }
        if self.poll_interval.is_zero() {
            return Err(WatcherError::Config {
                field: "poll_interval".to_owned(),
                reason: "must be greater than zero".to_owned(),
            });
        }
        if let Err(e) = glob::Pattern::new(&self.log_file_pattern) {
            return Err(WatcherError::Config {
                field: "log_file_pattern".to_owned(),
                reason: format!("invalid glob pattern: {e}"),
            });
        }
        if self.mode == DispatchKind::SelfManaged && self.ban_list_path.as_os_str().is_empty() {
            return Err(WatcherError::Config {
                field: "ban_list_path".to_owned(),
                reason: "required in self_managed mode".to_owned(),
            });
        }
        if self.cache_path.as_os_str().is_empty() {
            return Err(WatcherError::Config {
                field: "cache_path".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }
        Ok(())
    }
}

/// 예외 규칙 설정을 규칙 목록으로 변환합니다.
fn build_exceptions(config: &SuicideExceptionConfig) -> Vec<ExceptionRule> {
    if !config.enabled {
        return Vec::new();
    }
    vec![ExceptionRule::SuicideAtOrigin {
        origin: Position::from(config.origin),
        tolerance: config.tolerance,
    }]
}
