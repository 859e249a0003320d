//! 파이프라인 trait — 감시기 생명주기 정의
//!
//! [`Pipeline`]은 감시기가 구현하는 생명주기 인터페이스로,
//! `mori-daemon`의 슈퍼바이저가 모든 감시기를 동일한 방식으로 관리합니다.
//!
//! # 상태 전환
//! ```text
//! NotStarted → Preparing → Running → Stopping → Stopped
//! ```
//! Preparing 실패는 해당 감시기에 한해 치명적이며, Running에는 진입하지
//! 않습니다. Running 중의 에러는 루프 내부에서 처리되고 상태를 바꾸지
//! 않습니다.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::MoriError;

/// 감시기 생명주기 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WatcherState {
    /// 생성됨, 아직 시작하지 않음
    NotStarted,
    /// 경로 검증 및 상태 복원 중
    Preparing,
    /// 감시 루프 실행 중
    Running,
    /// 협조적 중지 신호 전파됨
    Stopping,
    /// 정지됨
    Stopped,
}

impl fmt::Display for WatcherState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not_started"),
            Self::Preparing => write!(f, "preparing"),
            Self::Running => write!(f, "running"),
            Self::Stopping => write!(f, "stopping"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// 모듈 건강 상태
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    /// 정상
    Healthy,
    /// 동작하지만 주의 필요 (사유 포함)
    Degraded(String),
    /// 비정상 (사유 포함)
    Unhealthy(String),
}

impl HealthStatus {
    /// 정상 상태인지 확인합니다.
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    /// 비정상 상태인지 확인합니다.
    pub fn is_unhealthy(&self) -> bool {
        matches!(self, Self::Unhealthy(_))
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded(reason) => write!(f, "degraded: {reason}"),
            Self::Unhealthy(reason) => write!(f, "unhealthy: {reason}"),
        }
    }
}

/// 감시기가 구현하는 생명주기 trait
///
/// `start()`는 Preparing 검증을 수행한 뒤 백그라운드 태스크를 스폰하고
/// 즉시 반환합니다. `stop()`은 협조적 취소 신호를 보내고 태스크 종료를
/// 기다립니다.
#[allow(async_fn_in_trait)]
pub trait Pipeline: Send {
    /// 감시기를 시작합니다.
    async fn start(&mut self) -> Result<(), MoriError>;

    /// 감시기를 중지합니다.
    async fn stop(&mut self) -> Result<(), MoriError>;

    /// 현재 건강 상태를 반환합니다.
    async fn health_check(&self) -> HealthStatus;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watcher_state_display() {
        assert_eq!(WatcherState::NotStarted.to_string(), "not_started");
        assert_eq!(WatcherState::Preparing.to_string(), "preparing");
        assert_eq!(WatcherState::Running.to_string(), "running");
        assert_eq!(WatcherState::Stopping.to_string(), "stopping");
        assert_eq!(WatcherState::Stopped.to_string(), "stopped");
    }

    #[test]
    fn health_status_predicates() {
        assert!(HealthStatus::Healthy.is_healthy());
        assert!(!HealthStatus::Healthy.is_unhealthy());
        assert!(!HealthStatus::Degraded("slow".to_owned()).is_healthy());
        assert!(!HealthStatus::Degraded("slow".to_owned()).is_unhealthy());
        assert!(HealthStatus::Unhealthy("stopped".to_owned()).is_unhealthy());
    }

    #[test]
    fn health_status_display() {
        assert_eq!(HealthStatus::Healthy.to_string(), "healthy");
        assert_eq!(
            HealthStatus::Degraded("buffer high".to_owned()).to_string(),
            "degraded: buffer high"
        );
        assert_eq!(
            HealthStatus::Unhealthy("not started".to_owned()).to_string(),
            "unhealthy: not started"
        );
    }

    #[test]
    fn health_status_serde_roundtrip() {
        let status = HealthStatus::Degraded("last poll failed".to_owned());
        let json = serde_json::to_string(&status).unwrap();
        let back: HealthStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(status, back);
    }
}
