//! 사망 분류기 — 판별자 비교 및 예외 규칙 평가
//!
//! [`DeathClassifier`]는 디코딩된 레코드가 추적 대상 사망인지 판정합니다.
//! 이벤트 타입이 설정된 판별자와 같을 때만 사망으로 인정하고, 이어서
//! 예외 규칙을 설정 순서대로 평가하여 하나라도 매칭되면 억제합니다.
//!
//! 예외 규칙은 레코드에 대해 읽기 전용으로 평가되며, 판정에 필요한
//! 필드가 없으면 "억제하지 않음" 쪽으로 fail open 합니다.

use std::fmt;

use mori_core::types::{DeathRecord, Position};

/// 자해 사망을 나타내는 하위 이벤트 값
const SUB_EVENT_SUICIDE: &str = "suicide";

/// killer/source 필드의 자해 표기
const SELF_MARKER: &str = "self";

/// 분류 결과
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    /// 판별자와 불일치 — 추적 대상 아님
    NotDeath,
    /// 사망이지만 예외 규칙으로 억제됨
    Suppressed {
        /// 매칭된 규칙 이름
        rule: &'static str,
        /// 판정 근거 (거리 등)
        detail: String,
    },
    /// 추적 대상 사망
    Death,
}

/// 예외 규칙 — 알려진 거짓 양성을 억제하는 이름 있는 술어
#[derive(Debug, Clone, PartialEq)]
pub enum ExceptionRule {
    /// 원점 부근 자살 억제
    ///
    /// 스폰 리셋 등으로 고정 좌표에서 발생하는 자해 사망은 실제 사망이
    /// 아니므로 억제합니다. tolerance가 0이면 좌표 완전 일치,
    /// 양수이면 유클리드 거리로 판정합니다.
    SuicideAtOrigin {
        /// 원점 좌표
        origin: Position,
        /// 허용 반경 (0 = 완전 일치)
        tolerance: f64,
    },
}

impl ExceptionRule {
    /// 규칙 이름을 반환합니다 (로그/진단용 고정 값).
    pub fn name(&self) -> &'static str {
        match self {
            Self::SuicideAtOrigin { .. } => "suicide_at_origin",
        }
    }

    /// 레코드가 이 규칙에 매칭되는지 평가합니다.
    ///
    /// 매칭되면 판정 근거 문자열을 반환합니다.
    fn matches(&self, record: &DeathRecord) -> Option<String> {
        match self {
            Self::SuicideAtOrigin { origin, tolerance } => {
                if record.sub_event.as_deref() != Some(SUB_EVENT_SUICIDE) {
                    return None;
                }
                if record.killer.as_deref() != Some(SELF_MARKER)
                    || record.source.as_deref() != Some(SELF_MARKER)
                {
                    return None;
                }
                // 위치가 없거나 해석 불가면 매칭하지 않음 (fail open)
                let position = record.subject.position?;

                if *tolerance > 0.0 {
                    let distance = position.distance_to(origin);
                    if distance <= *tolerance {
                        Some(format!(
                            "distance {distance:.2} within tolerance {tolerance:.2} of origin {origin}"
                        ))
                    } else {
                        None
                    }
                } else if position == *origin {
                    Some(format!("exact match at origin {origin}"))
                } else {
                    None
                }
            }
        }
    }
}

impl fmt::Display for ExceptionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SuicideAtOrigin { origin, tolerance } => {
                write!(f, "suicide_at_origin(origin={origin}, tolerance={tolerance})")
            }
        }
    }
}

/// 사망 분류기
///
/// 판별자 값과 예외 규칙 목록은 감시기 생성 시 확정되며 이후 불변입니다.
pub struct DeathClassifier {
    /// 사망 이벤트 판별자 값
    discriminator: String,
    /// 예외 규칙 (설정 순서대로 평가)
    exceptions: Vec<ExceptionRule>,
}

impl DeathClassifier {
    /// 새 분류기를 생성합니다.
    pub fn new(discriminator: impl Into<String>, exceptions: Vec<ExceptionRule>) -> Self {
        Self {
            discriminator: discriminator.into(),
            exceptions,
        }
    }

    /// 판별자 값을 반환합니다.
    pub fn discriminator(&self) -> &str {
        &self.discriminator
    }

    /// 등록된 예외 규칙 수를 반환합니다.
    pub fn exception_count(&self) -> usize {
        self.exceptions.len()
    }

    /// 레코드를 분류합니다.
    pub fn classify(&self, record: &DeathRecord) -> Classification {
        if record.event != self.discriminator {
            return Classification::NotDeath;
        }

        for rule in &self.exceptions {
            if let Some(detail) = rule.matches(record) {
                return Classification::Suppressed {
                    rule: rule.name(),
                    detail,
                };
            }
        }

        Classification::Death
    }
}
