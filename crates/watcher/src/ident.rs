//! 대상 식별자 — 플랫폼 ID 검증 및 밴 목록 GUID 파생
//!
//! 로그 스트림의 플랫폼 식별자는 17자리 Steam64 문자열입니다.
//! 밴 목록 파일은 44자 base64 GUID를 사용하므로, 순수 결정적 변환으로
//! 파생합니다: `base64(sha256(steam64))`.
//!
//! 파생 실패(형식 오류)는 타입 있는 에러로 반환되며, 호출측(감시 루프)은
//! 해당 이벤트를 사유와 함께 버리고 계속 진행합니다.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use sha2::{Digest, Sha256};

use crate::error::WatcherError;

/// Steam64 식별자 길이
const STEAM64_LEN: usize = 17;

/// 파생된 GUID 길이 (sha256 32바이트의 base64 인코딩)
pub const BAN_GUID_LEN: usize = 44;

/// 플랫폼 식별자의 형식을 검증합니다.
///
/// 17자리 숫자 문자열만 허용합니다.
pub fn validate_steam64(id: &str) -> Result<(), WatcherError> {
    if id.len() != STEAM64_LEN {
        return Err(WatcherError::InvalidSubject {
            id: id.to_owned(),
            reason: format!("expected {STEAM64_LEN} digits, got {} chars", id.len()),
        });
    }
    if !id.bytes().all(|b| b.is_ascii_digit()) {
        return Err(WatcherError::InvalidSubject {
            id: id.to_owned(),
            reason: "contains non-digit characters".to_owned(),
        });
    }
    Ok(())
}

/// 플랫폼 식별자에서 밴 목록 GUID를 파생합니다.
///
/// 순수 함수이며 같은 입력은 항상 같은 GUID를 돌려줍니다.
pub fn derive_ban_guid(steam64: &str) -> Result<String, WatcherError> {
    validate_steam64(steam64)?;
    let digest = Sha256::digest(steam64.as_bytes());
    Ok(STANDARD.encode(digest))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_ID: &str = "76561198000000001";

    #[test]
    fn valid_steam64_passes() {
        validate_steam64(SAMPLE_ID).unwrap();
    }

    #[test]
    fn too_short_id_rejected() {
        let err = validate_steam64("7656119800000").unwrap_err();
        assert!(matches!(err, WatcherError::InvalidSubject { .. }));
        assert!(err.to_string().contains("17"));
    }

    #[test]
    fn too_long_id_rejected() {
        assert!(validate_steam64("765611980000000012345").is_err());
    }

    #[test]
    fn non_digit_id_rejected() {
        let err = validate_steam64("76561198abc000001").unwrap_err();
        assert!(err.to_string().contains("non-digit"));
    }

    #[test]
    fn empty_id_rejected() {
        assert!(validate_steam64("").is_err());
    }

    #[test]
    fn derived_guid_has_expected_length() {
        let guid = derive_ban_guid(SAMPLE_ID).unwrap();
        // sha256(32바이트)의 base64는 항상 44자('=' 패딩 포함)
        assert_eq!(guid.len(), BAN_GUID_LEN);
        assert!(guid.ends_with('='));
    }

    #[test]
    fn derivation_is_deterministic() {
        let a = derive_ban_guid(SAMPLE_ID).unwrap();
        let b = derive_ban_guid(SAMPLE_ID).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn different_ids_produce_different_guids() {
        let a = derive_ban_guid("76561198000000001").unwrap();
        let b = derive_ban_guid("76561198000000002").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn derivation_rejects_malformed_id() {
        assert!(derive_ban_guid("not-a-steam-id").is_err());
    }
}
