//! 설정 관리 — mori.toml 파싱 및 런타임 설정
//!
//! [`MoriConfig`]는 데몬과 모든 감시기의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`MORI_WATCHER_POLL_INTERVAL_SECS=5` 형식)
//! 3. 설정 파일 (`mori.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), mori_core::error::MoriError> {
//! use mori_core::config::MoriConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = MoriConfig::load("mori.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = MoriConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, MoriError};
use crate::types::DispatchKind;

/// Mori 통합 설정
///
/// `mori.toml` 파일의 최상위 구조를 나타냅니다.
/// `[watcher]` 섹션은 모든 서버에 공통으로 적용되는 기본값이고,
/// `[[servers]]` 항목이 서버별로 이를 덮어씁니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MoriConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 메트릭 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
    /// 감시기 공통 기본값
    #[serde(default)]
    pub watcher: WatcherDefaults,
    /// 감시 대상 서버 목록
    #[serde(default)]
    pub servers: Vec<ServerConfig>,
}

impl MoriConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, MoriError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, MoriError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                MoriError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                MoriError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, MoriError> {
        toml::from_str(toml_str).map_err(|e| {
            MoriError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `MORI_{SECTION}_{FIELD}`
    /// 예: `MORI_WATCHER_POLL_INTERVAL_SECS=5`
    ///
    /// 서버별 설정(`[[servers]]`)은 환경변수로 오버라이드하지 않습니다.
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "MORI_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "MORI_GENERAL_LOG_FORMAT");
        override_string(&mut self.general.data_dir, "MORI_GENERAL_DATA_DIR");
        override_string(&mut self.general.pid_file, "MORI_GENERAL_PID_FILE");

        // Metrics
        override_bool(&mut self.metrics.enabled, "MORI_METRICS_ENABLED");
        override_string(&mut self.metrics.listen_addr, "MORI_METRICS_LISTEN_ADDR");
        override_u16(&mut self.metrics.port, "MORI_METRICS_PORT");

        // Watcher defaults
        override_string(&mut self.watcher.cache_path, "MORI_WATCHER_CACHE_PATH");
        override_string(
            &mut self.watcher.ban_list_path,
            "MORI_WATCHER_BAN_LIST_PATH",
        );
        override_string(
            &mut self.watcher.log_file_pattern,
            "MORI_WATCHER_LOG_FILE_PATTERN",
        );
        override_string(&mut self.watcher.death_event, "MORI_WATCHER_DEATH_EVENT");
        override_u64(
            &mut self.watcher.poll_interval_secs,
            "MORI_WATCHER_POLL_INTERVAL_SECS",
        );
        override_u64(
            &mut self.watcher.error_backoff_secs,
            "MORI_WATCHER_ERROR_BACKOFF_SECS",
        );
        override_u64(
            &mut self.watcher.ban_delay_secs,
            "MORI_WATCHER_BAN_DELAY_SECS",
        );
        override_u64(
            &mut self.watcher.ban_min_spacing_secs,
            "MORI_WATCHER_BAN_MIN_SPACING_SECS",
        );
        override_bool(&mut self.watcher.verbose, "MORI_WATCHER_VERBOSE");
        override_bool(
            &mut self.watcher.archive_old_logs,
            "MORI_WATCHER_ARCHIVE_OLD_LOGS",
        );
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), MoriError> {
        // log_level 검증
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_level".to_owned(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            }
            .into());
        }

        // log_format 검증
        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_format".to_owned(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            }
            .into());
        }

        self.watcher.validate("watcher")?;

        // 서버 ID 중복/공백 검증
        let mut seen = HashSet::new();
        for server in &self.servers {
            if server.id.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "servers.id".to_owned(),
                    reason: "server id must not be empty".to_owned(),
                }
                .into());
            }
            if !seen.insert(server.id.as_str()) {
                return Err(ConfigError::InvalidValue {
                    field: "servers.id".to_owned(),
                    reason: format!("duplicate server id '{}'", server.id),
                }
                .into());
            }
            if server.enabled && server.logs_dir.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: format!("servers.{}.logs_dir", server.id),
                    reason: "logs_dir must not be empty for an enabled server".to_owned(),
                }
                .into());
            }
        }

        Ok(())
    }

    /// 활성화된 서버 설정만 반환합니다.
    pub fn enabled_servers(&self) -> impl Iterator<Item = &ServerConfig> {
        self.servers.iter().filter(|s| s.enabled)
    }
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// 데이터 디렉토리
    pub data_dir: String,
    /// PID 파일 경로 (빈 문자열이면 비활성화)
    pub pid_file: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
            data_dir: "/var/lib/mori".to_owned(),
            pid_file: String::new(),
        }
    }
}

/// 메트릭 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 수신 대기 주소
    pub listen_addr: String,
    /// 수신 대기 포트
    pub port: u16,
    /// 스크레이프 엔드포인트 경로
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9473,
            endpoint: "/metrics".to_owned(),
        }
    }
}

/// 감시기 공통 기본값
///
/// 모든 서버에 적용되는 기본 설정입니다. `[[servers]]` 항목의
/// 동일 필드가 `Some`이면 서버별 값이 우선합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherDefaults {
    /// 영속 캐시 파일 경로 (모든 감시기가 공유 가능)
    pub cache_path: String,
    /// 밴 목록 파일 경로 (self-managed 모드)
    pub ban_list_path: String,
    /// 로그 파일 이름 패턴 (glob)
    pub log_file_pattern: String,
    /// 사망 이벤트 판별자 값
    pub death_event: String,
    /// 폴링 주기 (초)
    pub poll_interval_secs: u64,
    /// 폴링 실패 시 백오프 (초)
    pub error_backoff_secs: u64,
    /// 밴 지연 (초)
    pub ban_delay_secs: u64,
    /// 밴 최소 간격 (초)
    pub ban_min_spacing_secs: u64,
    /// 밴 목록 쓰기 재시도 횟수
    pub write_retry_attempts: u32,
    /// 밴 목록 쓰기 재시도 간격 (밀리초)
    pub write_retry_delay_ms: u64,
    /// 상세 진단 로그 출력
    pub verbose: bool,
    /// 로테이션된 옛 로그 파일을 archived/로 이동
    pub archive_old_logs: bool,
    /// 원점 자살 예외 규칙
    pub suicide_exception: SuicideExceptionConfig,
}

impl Default for WatcherDefaults {
    fn default() -> Self {
        Self {
            cache_path: "/var/lib/mori/watch_cache.json".to_owned(),
            ban_list_path: "/var/lib/mori/bans.txt".to_owned(),
            log_file_pattern: "*.adm".to_owned(),
            death_event: "PLAYER_DEATH".to_owned(),
            poll_interval_secs: 1,
            error_backoff_secs: 10,
            ban_delay_secs: 5,
            ban_min_spacing_secs: 2,
            write_retry_attempts: 10,
            write_retry_delay_ms: 250,
            verbose: false,
            archive_old_logs: false,
            suicide_exception: SuicideExceptionConfig::default(),
        }
    }
}

impl WatcherDefaults {
    /// 기본값 섹션의 유효성을 검증합니다.
    fn validate(&self, section: &str) -> Result<(), MoriError> {
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: format!("{section}.poll_interval_secs"),
                reason: "must be greater than zero".to_owned(),
            }
            .into());
        }
        if self.log_file_pattern.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: format!("{section}.log_file_pattern"),
                reason: "must not be empty".to_owned(),
            }
            .into());
        }
        if self.death_event.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: format!("{section}.death_event"),
                reason: "must not be empty".to_owned(),
            }
            .into());
        }
        if self.suicide_exception.tolerance < 0.0 {
            return Err(ConfigError::InvalidValue {
                field: format!("{section}.suicide_exception.tolerance"),
                reason: "must not be negative".to_owned(),
            }
            .into());
        }
        Ok(())
    }
}

/// 원점 자살 예외 규칙 설정
///
/// 스폰 지점(원점) 부근에서 발생한 자해 사망을 거짓 양성으로 간주하여
/// 억제합니다. tolerance가 0이면 좌표 완전 일치, 양수이면 유클리드 거리
/// 기준으로 판정합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SuicideExceptionConfig {
    /// 규칙 활성화 여부
    pub enabled: bool,
    /// 원점 좌표 [x, y, z]
    pub origin: [f64; 3],
    /// 허용 반경 (0이면 완전 일치)
    pub tolerance: f64,
}

impl Default for SuicideExceptionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            origin: [0.0, 0.0, 0.0],
            tolerance: 0.0,
        }
    }
}

/// 서버별 감시 설정
///
/// 하나의 감시기 인스턴스에 대응합니다. `Option` 필드는 설정하지 않으면
/// `[watcher]` 기본값을 따릅니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// 서버 고유 ID (캐시 문서의 키)
    pub id: String,
    /// 로그 디렉토리 경로
    pub logs_dir: String,
    /// 감시 활성화 여부
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// 디스패치 모드 (forward / self_managed)
    #[serde(default)]
    pub mode: DispatchKind,
    /// 캐시 파일 경로 오버라이드
    #[serde(default)]
    pub cache_path: Option<String>,
    /// 밴 목록 파일 경로 오버라이드
    #[serde(default)]
    pub ban_list_path: Option<String>,
    /// 로그 파일 이름 패턴 오버라이드
    #[serde(default)]
    pub log_file_pattern: Option<String>,
    /// 사망 이벤트 판별자 오버라이드
    #[serde(default)]
    pub death_event: Option<String>,
    /// 폴링 주기 오버라이드 (초)
    #[serde(default)]
    pub poll_interval_secs: Option<u64>,
    /// 밴 지연 오버라이드 (초)
    #[serde(default)]
    pub ban_delay_secs: Option<u64>,
    /// 밴 최소 간격 오버라이드 (초)
    #[serde(default)]
    pub ban_min_spacing_secs: Option<u64>,
    /// 상세 진단 로그 오버라이드
    #[serde(default)]
    pub verbose: Option<bool>,
    /// 옛 로그 보관 오버라이드
    #[serde(default)]
    pub archive_old_logs: Option<bool>,
    /// 원점 자살 예외 오버라이드
    #[serde(default)]
    pub suicide_exception: Option<SuicideExceptionConfig>,
}

fn default_true() -> bool {
    true
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}

fn override_u16(target: &mut u16, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u16>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u16 from env var, ignoring"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_values() {
        let config = MoriConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.general.log_format, "json");
        assert!(!config.metrics.enabled);
        assert_eq!(config.watcher.log_file_pattern, "*.adm");
        assert_eq!(config.watcher.death_event, "PLAYER_DEATH");
        assert_eq!(config.watcher.poll_interval_secs, 1);
        assert_eq!(config.watcher.ban_delay_secs, 5);
        assert_eq!(config.watcher.ban_min_spacing_secs, 2);
        assert!(config.servers.is_empty());
    }

    #[test]
    fn default_config_passes_validation() {
        let config = MoriConfig::default();
        config.validate().unwrap();
    }

    #[test]
    fn from_str_empty_toml_uses_defaults() {
        let config = MoriConfig::parse("").unwrap();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.watcher.log_file_pattern, "*.adm");
    }

    #[test]
    fn from_str_partial_toml_merges_with_defaults() {
        let toml = r#"
[general]
log_level = "debug"

[watcher]
poll_interval_secs = 5
"#;
        let config = MoriConfig::parse(toml).unwrap();
        assert_eq!(config.general.log_level, "debug");
        // log_format은 기본값 유지
        assert_eq!(config.general.log_format, "json");
        assert_eq!(config.watcher.poll_interval_secs, 5);
        assert_eq!(config.watcher.ban_delay_secs, 5);
    }

    #[test]
    fn from_str_full_toml() {
        let toml = r#"
[general]
log_level = "warn"
log_format = "pretty"
data_dir = "/opt/mori/data"
pid_file = "/opt/mori/mori.pid"

[metrics]
enabled = true
listen_addr = "0.0.0.0"
port = 9900

[watcher]
cache_path = "/opt/mori/cache.json"
ban_list_path = "/opt/mori/bans.txt"
log_file_pattern = "dl_*.ljson"
death_event = "PLAYER_DEATH"
poll_interval_secs = 2
error_backoff_secs = 30
ban_delay_secs = 10
ban_min_spacing_secs = 3
verbose = true
archive_old_logs = true

[watcher.suicide_exception]
enabled = true
origin = [512.0, 5.0, 512.0]
tolerance = 25.0

[[servers]]
id = "alpha"
logs_dir = "/srv/dayz/alpha/profiles"
mode = "self_managed"

[[servers]]
id = "bravo"
logs_dir = "/srv/dayz/bravo/profiles"
mode = "forward"
enabled = false
poll_interval_secs = 7
"#;
        let config = MoriConfig::parse(toml).unwrap();
        assert_eq!(config.general.log_level, "warn");
        assert_eq!(config.metrics.port, 9900);
        assert_eq!(config.watcher.log_file_pattern, "dl_*.ljson");
        assert!(config.watcher.suicide_exception.enabled);
        assert_eq!(config.watcher.suicide_exception.tolerance, 25.0);
        assert_eq!(config.servers.len(), 2);
        assert_eq!(config.servers[0].mode, DispatchKind::SelfManaged);
        assert_eq!(config.servers[1].mode, DispatchKind::Forward);
        assert!(!config.servers[1].enabled);
        assert_eq!(config.servers[1].poll_interval_secs, Some(7));
        assert_eq!(config.enabled_servers().count(), 1);
    }

    #[test]
    fn from_str_invalid_toml_returns_error() {
        let result = MoriConfig::parse("invalid = [[[toml");
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(
            err,
            MoriError::Config(ConfigError::ParseFailed { .. })
        ));
    }

    #[test]
    fn validate_rejects_invalid_log_level() {
        let mut config = MoriConfig::default();
        config.general.log_level = "verbose".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("log_level"));
    }

    #[test]
    fn validate_rejects_invalid_log_format() {
        let mut config = MoriConfig::default();
        config.general.log_format = "xml".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("log_format"));
    }

    #[test]
    fn validate_rejects_zero_poll_interval() {
        let mut config = MoriConfig::default();
        config.watcher.poll_interval_secs = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("poll_interval_secs"));
    }

    #[test]
    fn validate_rejects_negative_tolerance() {
        let mut config = MoriConfig::default();
        config.watcher.suicide_exception.tolerance = -1.0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("tolerance"));
    }

    #[test]
    fn validate_rejects_duplicate_server_ids() {
        let toml = r#"
[[servers]]
id = "alpha"
logs_dir = "/srv/a"

[[servers]]
id = "alpha"
logs_dir = "/srv/b"
"#;
        let config = MoriConfig::parse(toml).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn validate_rejects_empty_server_id() {
        let toml = r#"
[[servers]]
id = ""
logs_dir = "/srv/a"
"#;
        let err = MoriConfig::parse(toml).unwrap().validate().unwrap_err();
        assert!(err.to_string().contains("server id"));
    }

    #[test]
    fn validate_rejects_enabled_server_without_logs_dir() {
        let toml = r#"
[[servers]]
id = "alpha"
logs_dir = ""
"#;
        let err = MoriConfig::parse(toml).unwrap().validate().unwrap_err();
        assert!(err.to_string().contains("logs_dir"));
    }

    #[test]
    fn disabled_server_may_omit_logs_dir() {
        let toml = r#"
[[servers]]
id = "alpha"
logs_dir = ""
enabled = false
"#;
        MoriConfig::parse(toml).unwrap().validate().unwrap();
    }

    #[test]
    #[serial_test::serial]
    fn env_override_string() {
        let mut val = "original".to_owned();
        // SAFETY: 테스트는 serial로 실행되므로 환경변수 조작이 안전합니다.
        unsafe { std::env::set_var("TEST_MORI_STR", "overridden") };
        override_string(&mut val, "TEST_MORI_STR");
        assert_eq!(val, "overridden");
        unsafe { std::env::remove_var("TEST_MORI_STR") };
    }

    #[test]
    #[serial_test::serial]
    fn env_override_bool_valid() {
        let mut val = false;
        // SAFETY: 테스트는 serial로 실행되므로 환경변수 조작이 안전합니다.
        unsafe { std::env::set_var("TEST_MORI_BOOL", "true") };
        override_bool(&mut val, "TEST_MORI_BOOL");
        assert!(val);
        unsafe { std::env::remove_var("TEST_MORI_BOOL") };
    }

    #[test]
    #[serial_test::serial]
    fn env_override_bool_invalid_keeps_original() {
        let mut val = false;
        // SAFETY: 테스트는 serial로 실행되므로 환경변수 조작이 안전합니다.
        unsafe { std::env::set_var("TEST_MORI_BOOL_BAD", "not-a-bool") };
        override_bool(&mut val, "TEST_MORI_BOOL_BAD");
        assert!(!val); // 원래 값 유지
        unsafe { std::env::remove_var("TEST_MORI_BOOL_BAD") };
    }

    #[test]
    #[serial_test::serial]
    fn env_override_u64_valid() {
        let mut val = 1u64;
        // SAFETY: 테스트는 serial로 실행되므로 환경변수 조작이 안전합니다.
        unsafe { std::env::set_var("TEST_MORI_U64", "42") };
        override_u64(&mut val, "TEST_MORI_U64");
        assert_eq!(val, 42);
        unsafe { std::env::remove_var("TEST_MORI_U64") };
    }

    #[test]
    fn env_override_missing_var_keeps_original() {
        let mut val = "original".to_owned();
        override_string(&mut val, "TEST_MORI_NONEXISTENT_12345");
        assert_eq!(val, "original");
    }

    #[test]
    #[serial_test::serial]
    fn apply_env_overrides_touches_watcher_defaults() {
        let mut config = MoriConfig::default();
        // SAFETY: 테스트는 serial로 실행되므로 환경변수 조작이 안전합니다.
        unsafe { std::env::set_var("MORI_WATCHER_POLL_INTERVAL_SECS", "9") };
        config.apply_env_overrides();
        assert_eq!(config.watcher.poll_interval_secs, 9);
        unsafe { std::env::remove_var("MORI_WATCHER_POLL_INTERVAL_SECS") };
    }

    #[test]
    fn config_serialize_roundtrip() {
        let config = MoriConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed = MoriConfig::parse(&toml_str).unwrap();
        assert_eq!(config.general.log_level, parsed.general.log_level);
        assert_eq!(config.watcher.cache_path, parsed.watcher.cache_path);
        assert_eq!(
            config.watcher.suicide_exception.tolerance,
            parsed.watcher.suicide_exception.tolerance
        );
    }

    #[tokio::test]
    async fn from_file_not_found() {
        let result = MoriConfig::from_file("/nonexistent/path/mori.toml").await;
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(
            err,
            MoriError::Config(ConfigError::FileNotFound { .. })
        ));
    }
}
