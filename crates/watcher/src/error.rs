//! 감시 엔진 에러 타입
//!
//! [`WatcherError`]는 감시기 내부에서 발생하는 모든 에러를 표현합니다.
//! `From<WatcherError> for MoriError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.
//!
//! # 에러 분류 (운영 관점)
//! - `Startup`: Preparing 단계 실패 — 해당 감시기만 기동 중단
//! - `TransientIo`: 해당 폴링 사이클만 포기, 다음 사이클에 재시도
//! - `WriteContention`: 재시도 한도 소진 — 대기 작업은 유지되어 다음
//!   사이클에 다시 시도됨
//! - 그 외: 라인/이벤트 단위로 기록하고 루프는 계속 진행

use mori_core::error::{MoriError, PipelineError};

/// 감시 엔진 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum WatcherError {
    /// 기동(Preparing) 실패 — 해당 감시기에 한해 치명적
    #[error("startup error: {reason}")]
    Startup {
        /// 실패 사유
        reason: String,
    },

    /// 일시적 I/O 실패 (파일 잠김, 읽기 도중 삭제 등)
    #[error("transient io error: {context}: {source}")]
    TransientIo {
        /// 실패한 작업 설명
        context: String,
        /// 원인 에러
        #[source]
        source: std::io::Error,
    },

    /// 캐시 문서 읽기/쓰기 실패
    #[error("cache error: {path}: {reason}")]
    Cache {
        /// 캐시 파일 경로
        path: String,
        /// 실패 사유
        reason: String,
    },

    /// 쓰기 경합 — 재시도 한도 소진
    #[error("write failed after {attempts} attempts: {path}: {reason}")]
    WriteContention {
        /// 대상 파일 경로
        path: String,
        /// 시도 횟수
        attempts: u32,
        /// 마지막 실패 사유
        reason: String,
    },

    /// 유효하지 않은 대상 식별자
    #[error("invalid subject id '{id}': {reason}")]
    InvalidSubject {
        /// 문제가 된 식별자
        id: String,
        /// 사유
        reason: String,
    },

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 채널 통신 에러
    #[error("channel error: {0}")]
    Channel(String),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl WatcherError {
    /// 일시적 에러인지 확인합니다.
    ///
    /// 일시적 에러는 폴링 루프를 종료시키지 않고 백오프 후 재시도됩니다.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::TransientIo { .. } | Self::WriteContention { .. } | Self::Io(_)
        )
    }
}

impl From<WatcherError> for MoriError {
    fn from(err: WatcherError) -> Self {
        match err {
            WatcherError::Startup { reason } => {
                MoriError::Pipeline(PipelineError::StartupFailed(reason))
            }
            other => MoriError::Pipeline(PipelineError::InitFailed(other.to_string())),
        }
    }
}
