//! 라인 디코더 — 원시 로그 라인을 구조화 레코드로 변환
//!
//! 로그 스트림의 각 라인은 자유 형식 진단 텍스트이거나, 라인 하나에
//! 완결된 JSON 객체 하나(camelCase 키)입니다:
//!
//! ```text
//! {"ts":"2024-05-01T12:00:00Z","event":"PLAYER_DEATH","subEvent":"suicide",
//!  "killer":"self","source":"self",
//!  "player":{"steamId":"76561198000000001","name":"Bob","aliveSec":120,
//!            "pos":[512.0,5.0,512.0]}}
//! ```
//!
//! 디코딩에 실패하는 라인은 에러가 아니라 `None`입니다 — 외부 진단
//! 라인이 스트림에 섞여 들어오는 것은 정상 상황입니다.
//!
//! 위치(`pos`) 필드는 관대하게 해석합니다: 숫자 3개 배열이 아니면
//! 레코드 전체를 버리는 대신 위치만 `None`으로 둡니다. 예외 규칙이
//! "억제하지 않음" 쪽으로 fail open 하도록 하기 위함입니다.

use serde::Deserialize;

use mori_core::types::{DeathRecord, Position, Subject};

/// 라인 JSON의 최상위 형태 (원본 로그 포맷의 camelCase 키)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLine {
    /// 이벤트 타입 — 필수; 없으면 구조화 레코드가 아님
    event: String,
    /// 하위 이벤트 타입
    #[serde(default)]
    sub_event: Option<String>,
    /// 가해 주체
    #[serde(default)]
    killer: Option<String>,
    /// 사망 원인
    #[serde(default)]
    source: Option<String>,
    /// 대상 플레이어 블록 — 필수
    player: RawPlayer,
    /// 원본 타임스탬프 문자열
    #[serde(default)]
    ts: Option<String>,
}

/// 대상 플레이어 블록
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPlayer {
    /// 플랫폼 식별자 — 필수
    steam_id: String,
    /// 표시 이름
    #[serde(default)]
    name: Option<String>,
    /// 생존 시간 (초)
    #[serde(default)]
    alive_sec: Option<u64>,
    /// 위치 — 형식이 맞지 않아도 레코드를 버리지 않도록 Value로 받음
    #[serde(default)]
    pos: Option<serde_json::Value>,
}

/// 한 라인을 구조화 레코드로 디코딩합니다.
///
/// 구조화 레코드가 아닌 라인(파싱 실패, 비객체, 필수 필드 누락)은
/// `None`을 반환하며 절대 에러를 내지 않습니다.
pub fn decode(line: &str) -> Option<DeathRecord> {
    let trimmed = line.trim();
    if !trimmed.starts_with('{') {
        return None;
    }

    let raw: RawLine = serde_json::from_str(trimmed).ok()?;
    if raw.player.steam_id.is_empty() {
        return None;
    }

    let position = raw.player.pos.as_ref().and_then(lenient_position);

    Some(DeathRecord {
        event: raw.event,
        sub_event: raw.sub_event,
        killer: raw.killer,
        source: raw.source,
        subject: Subject {
            steam_id: raw.player.steam_id,
            display_name: raw.player.name,
            alive_secs: raw.player.alive_sec,
            position,
        },
        timestamp: raw.ts,
    })
}

/// 위치 값을 관대하게 해석합니다.
///
/// 유한한 숫자 3개짜리 배열만 위치로 인정합니다.
fn lenient_position(value: &serde_json::Value) -> Option<Position> {
    let arr = value.as_array()?;
    if arr.len() != 3 {
        return None;
    }
    let mut coords = [0.0f64; 3];
    for (slot, item) in coords.iter_mut().zip(arr) {
        let num = item.as_f64()?;
        if !num.is_finite() {
            return None;
        }
        *slot = num;
    }
    Some(coords.into())
}
