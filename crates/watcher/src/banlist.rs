//! 밴 목록 쓰기 — 중복 없는 추가, 원자적 교체, 제한된 재시도
//!
//! 밴 목록은 개행으로 구분된 식별자 파일입니다. 헤더 없음, 순서 무의미,
//! 어떤 쓰기 후에도 중복 없음이 보장됩니다.
//!
//! 외부 도구(게임 서버)가 같은 파일을 잡고 있을 수 있으므로, 일시적
//! 실패는 고정 간격으로 제한된 횟수만큼 재시도합니다. 한도를 소진하면
//! 타입 있는 에러를 반환하고 — 호출측은 대기 항목을 유지하여 다음
//! 플러시 사이클에 다시 시도합니다. 예약된 밴이 조용히 사라지는 일은
//! 없습니다.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::WatcherError;
use crate::file_util;
use crate::pathlock::PathLocks;

/// 밴 목록 기록기
pub struct BanListWriter {
    /// 밴 목록 파일 경로
    path: PathBuf,
    /// 경로 잠금 레지스트리 (모든 감시기가 공유)
    locks: Arc<PathLocks>,
    /// 재시도 횟수 한도
    max_attempts: u32,
    /// 재시도 간격
    retry_delay: Duration,
}

impl BanListWriter {
    /// 새 기록기를 생성합니다.
    pub fn new(
        path: impl Into<PathBuf>,
        locks: Arc<PathLocks>,
        max_attempts: u32,
        retry_delay: Duration,
    ) -> Self {
        Self {
            path: path.into(),
            locks,
            max_attempts: max_attempts.max(1),
            retry_delay,
        }
    }

    /// 밴 목록 파일 경로를 반환합니다.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 식별자를 밴 목록에 추가합니다.
    ///
    /// 이미 존재하면 쓰기 없이 `Ok(false)`를 반환합니다.
    /// 추가되면 `Ok(true)`, 재시도 한도 소진 시 `WriteContention` 에러.
    pub async fn add(&self, subject: &str) -> Result<bool, WatcherError> {
        let lock = self.locks.lock_for(&self.path);
        let _guard = lock.lock().await;

        let mut last_error: Option<std::io::Error> = None;
        for attempt in 0..self.max_attempts {
            if attempt > 0 {
                tokio::time::sleep(self.retry_delay).await;
            }

            match self.try_add(subject) {
                Ok(added) => {
                    if added {
                        debug!(
                            subject = subject,
                            path = %self.path.display(),
                            "subject appended to ban list"
                        );
                    } else {
                        debug!(
                            subject = subject,
                            path = %self.path.display(),
                            "subject already present in ban list"
                        );
                    }
                    return Ok(added);
                }
                Err(e) => {
                    warn!(
                        subject = subject,
                        path = %self.path.display(),
                        attempt = attempt + 1,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "ban list write failed"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(WatcherError::WriteContention {
            path: self.path.display().to_string(),
            attempts: self.max_attempts,
            reason: last_error.map_or_else(|| "unknown".to_owned(), |e| e.to_string()),
        })
    }

    /// 단일 추가 시도 (재시도 없음).
    ///
    /// 현재 목록을 읽고(없으면 빈 목록), 중복이면 건너뛰고,
    /// 아니면 덧붙여 원자적으로 교체합니다.
    fn try_add(&self, subject: &str) -> std::io::Result<bool> {
        let mut entries = file_util::read_lines(&self.path)?;
        if entries.iter().any(|existing| existing == subject) {
            return Ok(false);
        }
        entries.push(subject.to_owned());
        file_util::write_lines(&self.path, &entries)?;
        Ok(true)
    }
}
