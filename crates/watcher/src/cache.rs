//! 영속 캐시 — 서버별 테일 상태의 원자적 저장
//!
//! 캐시 문서는 JSON 파일 하나이며, 여러 서버의 상태를 `servers` 키 아래에
//! 담습니다:
//!
//! ```json
//! {
//!   "servers": {
//!     "alpha": {
//!       "active_file": "/srv/dayz/alpha/profiles/server_2.adm",
//!       "file_id": 123456,
//!       "byte_offset": 20,
//!       "last_seen_ts": "2024-05-01T12:00:00Z",
//!       "last_error": ""
//!     }
//!   }
//! }
//! ```
//!
//! 저장은 항상 문서 전체를 다시 기록합니다: 잠금 획득 → 현재 문서 읽기 →
//! 자기 서버 항목 갱신 → 임시 파일 + rename. 손상된 문서는 기본값으로
//! 복구됩니다 (테일이 처음부터 다시 시작될 뿐, 치명적이지 않습니다).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::WatcherError;
use crate::file_util;
use crate::pathlock::PathLocks;

/// 캐시 쓰기 재시도 횟수
const SAVE_ATTEMPTS: u32 = 3;

/// 캐시 쓰기 재시도 간격
const SAVE_RETRY_DELAY: Duration = Duration::from_millis(100);

/// 서버 하나의 테일 상태
///
/// 감시기가 재시작 후 정확히 이어서 읽기 위해 필요한 전부입니다.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TailState {
    /// 현재 테일 중인 파일 경로
    pub active_file: Option<PathBuf>,
    /// 파일 고유 식별자 (unix inode)
    pub file_id: Option<u64>,
    /// 다음 읽기를 시작할 바이트 오프셋
    pub byte_offset: u64,
    /// 마지막으로 본 이벤트 타임스탬프 (원본 문자열)
    pub last_seen_ts: Option<String>,
    /// 마지막 에러 메시지 (정상이면 빈 문자열)
    pub last_error: String,
}

/// 캐시 문서 전체
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct CacheDocument {
    /// 서버 ID -> 테일 상태
    servers: BTreeMap<String, TailState>,
}

/// 캐시 저장소
///
/// 하나의 캐시 파일을 여러 감시기가 공유할 수 있습니다.
/// 모든 read-modify-write는 경로 잠금 아래에서 수행됩니다.
pub struct CacheStore {
    /// 캐시 파일 경로
    path: PathBuf,
    /// 경로 잠금 레지스트리 (모든 감시기가 공유)
    locks: Arc<PathLocks>,
}

impl CacheStore {
    /// 새 캐시 저장소를 생성합니다.
    pub fn new(path: impl Into<PathBuf>, locks: Arc<PathLocks>) -> Self {
        Self {
            path: path.into(),
            locks,
        }
    }

    /// 캐시 파일 경로를 반환합니다.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 서버의 테일 상태를 읽습니다.
    ///
    /// 파일이 없거나 파싱할 수 없으면 기본 상태를 반환합니다 —
    /// 손상은 테일 재시작으로 복구되며 치명적이지 않습니다.
    pub async fn load(&self, server_id: &str) -> TailState {
        let lock = self.locks.lock_for(&self.path);
        let _guard = lock.lock().await;
        let document = self.read_document();
        document.servers.get(server_id).cloned().unwrap_or_default()
    }

    /// 서버의 테일 상태를 저장합니다.
    ///
    /// 문서 전체를 잠금 아래에서 다시 읽고, 해당 서버 항목만 바꾼 뒤
    /// 원자적으로 교체합니다. 다른 서버의 상태는 보존됩니다.
    pub async fn save(&self, server_id: &str, state: &TailState) -> Result<(), WatcherError> {
        let lock = self.locks.lock_for(&self.path);
        let _guard = lock.lock().await;

        let mut document = self.read_document();
        document.servers.insert(server_id.to_owned(), state.clone());

        let serialized =
            serde_json::to_vec_pretty(&document).map_err(|e| WatcherError::Cache {
                path: self.path.display().to_string(),
                reason: format!("serialize failed: {e}"),
            })?;

        let mut last_error: Option<std::io::Error> = None;
        for attempt in 0..SAVE_ATTEMPTS {
            if attempt > 0 {
                tokio::time::sleep(SAVE_RETRY_DELAY).await;
            }
            match file_util::atomic_write(&self.path, &serialized) {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!(
                        path = %self.path.display(),
                        attempt = attempt + 1,
                        error = %e,
                        "cache write failed, retrying"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(WatcherError::WriteContention {
            path: self.path.display().to_string(),
            attempts: SAVE_ATTEMPTS,
            reason: last_error.map_or_else(|| "unknown".to_owned(), |e| e.to_string()),
        })
    }

    /// 디스크의 캐시 문서를 읽습니다. 없거나 손상이면 기본 문서.
    fn read_document(&self) -> CacheDocument {
        let contents = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return CacheDocument::default(),
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "cache read failed, starting from empty state"
                );
                return CacheDocument::default();
            }
        };

        match serde_json::from_slice(&contents) {
            Ok(document) => document,
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "cache document corrupt, starting from empty state"
                );
                CacheDocument::default()
            }
        }
    }
}
