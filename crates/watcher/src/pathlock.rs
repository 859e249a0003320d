//! 경로 단위 상호 배제 레지스트리
//!
//! 여러 감시기가 하나의 캐시 문서나 밴 목록 파일을 공유할 수 있으므로,
//! 해석된 파일 경로를 키로 하는 비동기 뮤텍스를 제공합니다.
//! read-modify-write 전체가 잠금 아래에서 수행되어야 동시 기록이
//! 서로의 변경을 덮어쓰지 않습니다.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::Mutex;

/// 경로별 잠금 레지스트리
///
/// 슈퍼바이저가 하나를 생성하여 모든 감시기에 `Arc`로 공유합니다.
/// 같은 파일을 가리키는 경로는 같은 뮤텍스를 돌려받습니다.
#[derive(Default)]
pub struct PathLocks {
    /// 해석된 경로 -> 뮤텍스
    inner: StdMutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl PathLocks {
    /// 새 레지스트리를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 주어진 경로에 대한 뮤텍스를 반환합니다 (없으면 생성).
    ///
    /// 경로는 가능하면 canonicalize하여 동일 파일을 가리키는 서로 다른
    /// 표기가 같은 잠금으로 수렴하도록 합니다. 파일이 아직 없으면
    /// 주어진 경로를 그대로 키로 사용합니다.
    pub fn lock_for(&self, path: &Path) -> Arc<Mutex<()>> {
        let key = resolve_key(path);
        let mut map = self.inner.lock().unwrap_or_else(|poisoned| {
            // 잠금을 쥔 스레드가 panic해도 맵 자체는 유효합니다.
            poisoned.into_inner()
        });
        Arc::clone(map.entry(key).or_default())
    }

    /// 현재 등록된 경로 수를 반환합니다.
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// 레지스트리가 비어 있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 잠금 키로 사용할 경로를 해석합니다.
fn resolve_key(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}
