//! 이벤트 시스템 — 모듈 간 통신의 기본 단위
//!
//! 감시기와 데몬 사이의 통신은 이벤트 기반 메시지 패싱으로 수행됩니다.
//! [`EventMetadata`]는 모든 이벤트에 공통으로 포함되는 메타데이터이며,
//! [`Event`] trait은 모든 이벤트 타입이 구현해야 하는 인터페이스입니다.
//!
//! 감시기는 자신이 속한 태스크에서 이벤트를 생성하여 `tokio::mpsc` 채널로
//! 전송합니다. 수신측의 동시성 모델에 대한 가정은 "채널 수신이 다른
//! 태스크에서 안전하다"는 것뿐입니다.

use std::fmt;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::types::DeathRecord;

// --- 모듈명 상수 ---

/// 로그 감시기 모듈명
pub const MODULE_WATCHER: &str = "log-watcher";
/// 밴 스케줄러 모듈명
pub const MODULE_SCHEDULER: &str = "ban-scheduler";
/// 감시기 슈퍼바이저 모듈명
pub const MODULE_SUPERVISOR: &str = "supervisor";

// --- 이벤트 타입 상수 ---

/// 사망 이벤트 타입
pub const EVENT_TYPE_DEATH: &str = "death";
/// 밴 액션 이벤트 타입
pub const EVENT_TYPE_BAN: &str = "ban";

/// 이벤트 메타데이터 — 모든 이벤트에 공통으로 포함되는 추적 정보
///
/// 각 이벤트의 발생 시각, 생성 모듈, 추적 ID를 담고 있어
/// 하나의 사망이 밴으로 이어지는 흐름을 로그에서 연결할 수 있습니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMetadata {
    /// 이벤트 발생 시각
    pub timestamp: SystemTime,
    /// 이벤트를 생성한 모듈명 (예: "log-watcher")
    pub source_module: String,
    /// 추적 ID — 같은 흐름의 이벤트를 연결합니다
    pub trace_id: String,
}

impl EventMetadata {
    /// 기존 trace_id를 사용하여 새 메타데이터를 생성합니다.
    pub fn new(source_module: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self {
            timestamp: SystemTime::now(),
            source_module: source_module.into(),
            trace_id: trace_id.into(),
        }
    }

    /// 새로운 UUID v4 trace_id를 생성하여 메타데이터를 만듭니다.
    ///
    /// 새로운 이벤트 체인의 시작점에서 사용합니다.
    pub fn with_new_trace(source_module: impl Into<String>) -> Self {
        Self {
            timestamp: SystemTime::now(),
            source_module: source_module.into(),
            trace_id: uuid::Uuid::new_v4().to_string(),
        }
    }
}

impl fmt::Display for EventMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] source={} trace={}",
            unix_timestamp_str(self.timestamp),
            self.source_module,
            self.trace_id,
        )
    }
}

/// 모든 이벤트가 구현해야 하는 기본 trait
///
/// `Send + Sync + 'static` 바운드로 `tokio::mpsc` 채널을 통한
/// 안전한 전송을 보장합니다.
pub trait Event: Send + Sync + 'static {
    /// 이벤트 고유 ID (UUID v4)
    fn event_id(&self) -> &str;

    /// 이벤트 메타데이터 (timestamp, source_module, trace_id)
    fn metadata(&self) -> &EventMetadata;

    /// 이벤트 타입명 (로깅 및 라우팅에 사용)
    fn event_type(&self) -> &str;
}

/// 분류를 통과한 사망 이벤트
///
/// forward 모드에서 감시기가 외부 소비자에게 전달하는 이벤트입니다.
/// 원본 타임스탬프와 생존 시간은 레코드에서 그대로 전달됩니다.
#[derive(Debug, Clone)]
pub struct DeathEvent {
    /// 이벤트 고유 ID
    pub id: String,
    /// 이벤트 메타데이터
    pub metadata: EventMetadata,
    /// 이벤트를 발생시킨 서버 ID
    pub server_id: String,
    /// 디코딩된 사망 레코드
    pub record: DeathRecord,
}

impl DeathEvent {
    /// 새로운 trace를 시작하는 사망 이벤트를 생성합니다.
    pub fn new(server_id: impl Into<String>, record: DeathRecord) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            metadata: EventMetadata::with_new_trace(MODULE_WATCHER),
            server_id: server_id.into(),
            record,
        }
    }
}

impl Event for DeathEvent {
    fn event_id(&self) -> &str {
        &self.id
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }

    fn event_type(&self) -> &str {
        EVENT_TYPE_DEATH
    }
}

impl fmt::Display for DeathEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DeathEvent[{}] server={} subject={} alive_secs={}",
            &self.id[..8.min(self.id.len())],
            self.server_id,
            self.record.subject.steam_id,
            self.record
                .subject
                .alive_secs
                .map_or_else(|| "-".to_owned(), |s| s.to_string()),
        )
    }
}

/// 실행된 밴 액션 이벤트
///
/// self-managed 모드에서 밴 목록 파일에 대한 쓰기 시도가 끝날 때마다
/// 생성됩니다 (성공/실패 모두). 데몬이 감사 로그로 소비합니다.
#[derive(Debug, Clone)]
pub struct BanEvent {
    /// 이벤트 고유 ID
    pub id: String,
    /// 이벤트 메타데이터
    pub metadata: EventMetadata,
    /// 이벤트를 발생시킨 서버 ID
    pub server_id: String,
    /// 밴 목록 식별자 (파생 GUID)
    pub subject: String,
    /// 성공 여부
    pub success: bool,
}

impl BanEvent {
    /// 새로운 trace를 시작하는 밴 이벤트를 생성합니다.
    pub fn new(
        server_id: impl Into<String>,
        subject: impl Into<String>,
        success: bool,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            metadata: EventMetadata::with_new_trace(MODULE_SCHEDULER),
            server_id: server_id.into(),
            subject: subject.into(),
            success,
        }
    }

    /// 기존 trace에 연결된 밴 이벤트를 생성합니다.
    pub fn with_trace(
        server_id: impl Into<String>,
        subject: impl Into<String>,
        success: bool,
        trace_id: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            metadata: EventMetadata::new(MODULE_SCHEDULER, trace_id),
            server_id: server_id.into(),
            subject: subject.into(),
            success,
        }
    }
}

impl Event for BanEvent {
    fn event_id(&self) -> &str {
        &self.id
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }

    fn event_type(&self) -> &str {
        EVENT_TYPE_BAN
    }
}

impl fmt::Display for BanEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.success { "OK" } else { "FAILED" };
        write!(
            f,
            "BanEvent[{}] server={} subject={} status={}",
            &self.id[..8.min(self.id.len())],
            self.server_id,
            self.subject,
            status,
        )
    }
}

/// SystemTime을 사람이 읽을 수 있는 형태로 변환합니다.
fn unix_timestamp_str(time: SystemTime) -> String {
    match time.duration_since(SystemTime::UNIX_EPOCH) {
        Ok(duration) => {
            let secs = duration.as_secs();
            format!("{secs}")
        }
        Err(_) => "unknown".to_owned(),
    }
}
