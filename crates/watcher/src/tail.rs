//! 테일 커서 — 추가 전용 로그 파일의 증분 읽기
//!
//! `tail -f`에 해당하는 동작을 폴링 방식으로 구현합니다. 목표는 단순한
//! 계약입니다: 재시작과 로테이션을 가로질러, 추가된 모든 완결 라인을
//! 정확히 한 번, 순서대로 전달한다.
//!
//! # 로테이션/절단 감지
//! - 최신 파일은 "패턴에 맞는 파일 중 수정 시각이 가장 최근인 것"
//! - 파일 고유 식별자(unix inode) 불일치 → 새 파일
//! - 파일 크기 < 저장된 오프셋 → 절단 또는 교체
//!
//! 어느 경우든 오프셋을 0으로 되돌리고 새 파일을 처음부터 읽습니다.
//! 같은 파일 + 같은 오프셋으로 재개할 때만 이미 본 내용을 건너뜁니다.
//!
//! # 부분 라인
//! 종결자(`\n`) 없이 끝나는 꼬리 조각은 절대 방출하지 않습니다.
//! 오프셋은 마지막 종결자 다음까지만 전진하므로, 프로세스가 언제 죽어도
//! 조각은 다음 읽기에서 처음부터 다시 읽힙니다.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::cache::TailState;
use crate::error::WatcherError;

/// 옛 로그 파일을 옮겨 둘 하위 디렉토리 이름
const ARCHIVE_DIR: &str = "archived";

/// 완결 라인 하나와 그 직후의 바이트 오프셋
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TailedLine {
    /// 종결자를 제외한 라인 내용
    pub text: String,
    /// 이 라인의 종결자 직후 오프셋 (라인 단위 재개 지점)
    pub offset_after: u64,
}

/// 테일 커서
///
/// 로그 디렉토리 하나를 담당하며, 파일 선택과 증분 읽기를 수행합니다.
/// 읽기 위치는 호출자가 소유한 [`TailState`]에 기록됩니다.
pub struct TailCursor {
    /// 로그 디렉토리
    logs_dir: PathBuf,
    /// 파일 이름 패턴
    pattern: glob::Pattern,
    /// 로테이션 시 옛 파일을 archived/로 이동
    archive_old: bool,
}

impl TailCursor {
    /// 새 테일 커서를 생성합니다.
    pub fn new(
        logs_dir: impl Into<PathBuf>,
        pattern: &str,
        archive_old: bool,
    ) -> Result<Self, WatcherError> {
        let pattern = glob::Pattern::new(pattern).map_err(|e| WatcherError::Config {
            field: "log_file_pattern".to_owned(),
            reason: format!("invalid glob pattern '{pattern}': {e}"),
        })?;
        Ok(Self {
            logs_dir: logs_dir.into(),
            pattern,
            archive_old,
        })
    }

    /// 로그 디렉토리를 반환합니다.
    pub fn logs_dir(&self) -> &Path {
        &self.logs_dir
    }

    /// 패턴에 맞는 가장 최근 수정 파일을 찾습니다.
    ///
    /// 디렉토리가 없거나 후보가 없으면 `Ok(None)` — 호출자는 다음
    /// 폴링까지 대기합니다.
    pub fn latest_file(&self) -> Result<Option<PathBuf>, WatcherError> {
        let entries = match std::fs::read_dir(&self.logs_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(WatcherError::TransientIo {
                    context: format!("listing {}", self.logs_dir.display()),
                    source: e,
                });
            }
        };

        let mut best: Option<(std::time::SystemTime, PathBuf)> = None;
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(_) => continue,
            };
            let path = entry.path();
            if !self.matches_name(&path) {
                continue;
            }
            let Ok(meta) = entry.metadata() else { continue };
            if !meta.is_file() {
                continue;
            }
            let modified = meta.modified().unwrap_or(std::time::SystemTime::UNIX_EPOCH);
            let newer = match &best {
                Some((best_time, _)) => modified > *best_time,
                None => true,
            };
            if newer {
                best = Some((modified, path));
            }
        }

        Ok(best.map(|(_, path)| path))
    }

    /// 저장된 위치부터 새로 추가된 완결 라인을 읽습니다.
    ///
    /// `state`는 읽기 결과에 맞춰 변경됩니다 (파일 식별자, 오프셋).
    /// 로테이션 판정이 내려진 경우에도 라인이 없을 수 있으므로,
    /// 호출자는 반환 후 항상 상태를 영속화해야 합니다.
    pub fn read_new(
        &self,
        state: &mut TailState,
        path: &Path,
    ) -> Result<Vec<TailedLine>, WatcherError> {
        let meta = std::fs::metadata(path).map_err(|e| WatcherError::TransientIo {
            context: format!("stat {}", path.display()),
            source: e,
        })?;
        let file_id = file_identity(&meta);
        let size = meta.len();

        let same_file = state.active_file.as_deref() == Some(path)
            && state.file_id == file_id
            && size >= state.byte_offset;

        if !same_file {
            if state.active_file.is_some() {
                info!(
                    old = %state.active_file.as_deref().map_or_else(String::new, |p| p.display().to_string()),
                    new = %path.display(),
                    "log stream moved to a different file"
                );
            } else {
                info!(file = %path.display(), "starting to tail log file");
            }
            if self.archive_old {
                self.archive_stale(path);
            }
            state.active_file = Some(path.to_path_buf());
            state.file_id = file_id;
            state.byte_offset = 0;
        }

        let mut file = File::open(path).map_err(|e| WatcherError::TransientIo {
            context: format!("opening {}", path.display()),
            source: e,
        })?;
        file.seek(SeekFrom::Start(state.byte_offset))
            .map_err(|e| WatcherError::TransientIo {
                context: format!("seeking {}", path.display()),
                source: e,
            })?;

        let mut buf = Vec::new();
        file.read_to_end(&mut buf)
            .map_err(|e| WatcherError::TransientIo {
                context: format!("reading {}", path.display()),
                source: e,
            })?;

        let lines = split_complete_lines(&buf, state.byte_offset);
        if let Some(last) = lines.last() {
            state.byte_offset = last.offset_after;
        }

        if !lines.is_empty() {
            debug!(
                file = %path.display(),
                count = lines.len(),
                offset = state.byte_offset,
                "read new log lines"
            );
        }

        Ok(lines)
    }

    /// 현재 파일을 제외한 패턴 일치 파일을 archived/로 이동합니다.
    ///
    /// 최선 노력으로 수행되며, 실패는 경고로만 남기고 치명적이지 않습니다.
    fn archive_stale(&self, keep: &Path) {
        let entries = match std::fs::read_dir(&self.logs_dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(
                    dir = %self.logs_dir.display(),
                    error = %e,
                    "cannot list logs directory for archiving"
                );
                return;
            }
        };

        let archive_dir = self.logs_dir.join(ARCHIVE_DIR);
        if let Err(e) = std::fs::create_dir_all(&archive_dir) {
            warn!(
                dir = %archive_dir.display(),
                error = %e,
                "cannot create archive directory, skipping archiving"
            );
            return;
        }

        for entry in entries.flatten() {
            let path = entry.path();
            if path == keep || !self.matches_name(&path) {
                continue;
            }
            if !entry.metadata().map(|m| m.is_file()).unwrap_or(false) {
                continue;
            }
            let Some(name) = path.file_name() else { continue };
            let target = archive_dir.join(name);
            match std::fs::rename(&path, &target) {
                Ok(()) => info!(
                    file = %path.display(),
                    target = %target.display(),
                    "archived stale log file"
                ),
                Err(e) => warn!(
                    file = %path.display(),
                    error = %e,
                    "failed to archive stale log file"
                ),
            }
        }
    }

    /// 파일 이름이 패턴에 맞는지 확인합니다.
    fn matches_name(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| self.pattern.matches(name))
    }
}

/// 버퍼를 완결 라인 단위로 분할합니다.
///
/// `base_offset`은 버퍼의 시작이 파일에서 차지하는 오프셋입니다.
/// 종결자가 없는 꼬리 조각은 버립니다 (오프셋이 전진하지 않으므로
/// 다음 읽기에서 다시 나타납니다).
fn split_complete_lines(buf: &[u8], base_offset: u64) -> Vec<TailedLine> {
    let mut lines = Vec::new();
    let mut start = 0usize;

    for (i, byte) in buf.iter().enumerate() {
        if *byte != b'\n' {
            continue;
        }
        let mut end = i;
        if end > start && buf[end - 1] == b'\r' {
            end -= 1;
        }
        let text = String::from_utf8_lossy(&buf[start..end]).into_owned();
        lines.push(TailedLine {
            text,
            offset_after: base_offset + (i as u64) + 1,
        });
        start = i + 1;
    }

    lines
}

/// 파일 고유 식별자를 얻습니다 (unix inode).
#[cfg(unix)]
fn file_identity(meta: &std::fs::Metadata) -> Option<u64> {
    use std::os::unix::fs::MetadataExt;
    Some(meta.ino())
}

/// 파일 고유 식별자를 얻습니다 (비 unix: 식별자 없음, 경로/크기로 판정).
#[cfg(not(unix))]
fn file_identity(_meta: &std::fs::Metadata) -> Option<u64> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Write;

    fn cursor_for(dir: &Path) -> TailCursor {
        TailCursor::new(dir, "*.adm", false).unwrap()
    }

    fn append(path: &Path, data: &str) {
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .unwrap();
        file.write_all(data.as_bytes()).unwrap();
    }

    /// mtime 해상도 문제를 피하기 위해 수정 시각을 직접 지정합니다.
    fn set_mtime(path: &Path, secs_ago: u64) {
        let target = std::time::SystemTime::now() - std::time::Duration::from_secs(secs_ago);
        let file = fs::File::options().append(true).open(path).unwrap();
        file.set_modified(target).unwrap();
    }

    #[test]
    fn invalid_pattern_is_config_error() {
        let err = TailCursor::new("/tmp", "[bad", false).unwrap_err();
        assert!(matches!(err, WatcherError::Config { .. }));
    }

    #[test]
    fn missing_directory_yields_no_candidate() {
        let cursor = cursor_for(Path::new("/nonexistent/mori/logs"));
        assert!(cursor.latest_file().unwrap().is_none());
    }

    #[test]
    fn empty_directory_yields_no_candidate() {
        let dir = tempfile::tempdir().unwrap();
        let cursor = cursor_for(dir.path());
        assert!(cursor.latest_file().unwrap().is_none());
    }

    #[test]
    fn latest_file_ignores_non_matching_names() {
        let dir = tempfile::tempdir().unwrap();
        append(&dir.path().join("server_1.adm"), "x\n");
        append(&dir.path().join("notes.txt"), "y\n");

        let cursor = cursor_for(dir.path());
        let latest = cursor.latest_file().unwrap().unwrap();
        assert_eq!(latest.file_name().unwrap(), "server_1.adm");
    }

    #[test]
    fn latest_file_picks_most_recently_modified() {
        let dir = tempfile::tempdir().unwrap();
        let old = dir.path().join("server_1.adm");
        let new = dir.path().join("server_2.adm");
        append(&old, "old\n");
        append(&new, "new\n");
        set_mtime(&old, 100);
        set_mtime(&new, 10);

        let cursor = cursor_for(dir.path());
        let latest = cursor.latest_file().unwrap().unwrap();
        assert_eq!(latest.file_name().unwrap(), "server_2.adm");
    }

    #[test]
    fn first_read_returns_all_complete_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server_1.adm");
        append(&path, "header\nfirst line\n");

        let cursor = cursor_for(dir.path());
        let mut state = TailState::default();
        let lines = cursor.read_new(&mut state, &path).unwrap();

        let texts: Vec<_> = lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["header", "first line"]);
        assert_eq!(state.byte_offset, 18); // "header\nfirst line\n".len()
        assert_eq!(state.active_file.as_deref(), Some(path.as_path()));
    }

    #[test]
    fn subsequent_read_returns_only_new_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server_1.adm");
        append(&path, "one\n");

        let cursor = cursor_for(dir.path());
        let mut state = TailState::default();
        assert_eq!(cursor.read_new(&mut state, &path).unwrap().len(), 1);

        append(&path, "two\nthree\n");
        let lines = cursor.read_new(&mut state, &path).unwrap();
        let texts: Vec<_> = lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["two", "three"]);
    }

    #[test]
    fn read_with_no_growth_is_empty_and_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server_1.adm");
        append(&path, "one\n");

        let cursor = cursor_for(dir.path());
        let mut state = TailState::default();
        cursor.read_new(&mut state, &path).unwrap();
        let offset = state.byte_offset;

        assert!(cursor.read_new(&mut state, &path).unwrap().is_empty());
        assert_eq!(state.byte_offset, offset);
    }

    #[test]
    fn unterminated_tail_is_withheld_until_completed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server_1.adm");
        append(&path, "done\npartial");

        let cursor = cursor_for(dir.path());
        let mut state = TailState::default();
        let lines = cursor.read_new(&mut state, &path).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, "done");
        assert_eq!(state.byte_offset, 5); // "done\n"까지만 전진

        append(&path, " now\n");
        let lines = cursor.read_new(&mut state, &path).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, "partial now");
    }

    #[test]
    fn crlf_terminators_are_stripped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server_1.adm");
        append(&path, "one\r\ntwo\r\n");

        let cursor = cursor_for(dir.path());
        let mut state = TailState::default();
        let lines = cursor.read_new(&mut state, &path).unwrap();
        let texts: Vec<_> = lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["one", "two"]);
        assert_eq!(state.byte_offset, 10);
    }

    #[test]
    fn truncated_file_restarts_from_zero() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server_1.adm");
        append(&path, "a long line that will vanish\n");

        let cursor = cursor_for(dir.path());
        let mut state = TailState::default();
        cursor.read_new(&mut state, &path).unwrap();
        assert!(state.byte_offset > 0);

        // 파일이 우리 밑에서 더 짧게 다시 쓰임
        fs::write(&path, "fresh\n").unwrap();
        let lines = cursor.read_new(&mut state, &path).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, "fresh");
        assert_eq!(state.byte_offset, 6);
    }

    #[test]
    fn rotation_to_new_file_reads_from_start() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("server_1.adm");
        let second = dir.path().join("server_2.adm");
        append(&first, "old content\n");

        let cursor = cursor_for(dir.path());
        let mut state = TailState::default();
        cursor.read_new(&mut state, &first).unwrap();

        append(&second, "new header\nsecond line\n");
        let lines = cursor.read_new(&mut state, &second).unwrap();
        let texts: Vec<_> = lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["new header", "second line"]);
        assert_eq!(state.active_file.as_deref(), Some(second.as_path()));
    }

    /// 스펙의 로테이션 시나리오: 기존 파일의 꼬리를 마저 읽은 뒤 새 파일로
    /// 전환하면 두 파일의 라인이 순서대로 이어져야 한다.
    #[test]
    fn rotation_scenario_delivers_tail_then_new_file() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("server_1.adm");
        let second = dir.path().join("server_2.adm");
        append(&first, "header\nfirst line\n");

        let cursor = cursor_for(dir.path());
        let mut state = TailState::default();

        // 첫 폴링: 기존 내용 전체
        let lines = cursor.read_new(&mut state, &first).unwrap();
        let texts: Vec<_> = lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["header", "first line"]);
        assert_eq!(state.byte_offset, 18);

        // 기존 파일에 한 줄 추가된 뒤, 더 새로운 파일이 나타남
        append(&first, "tail line\n");
        append(&second, "new header\nsecond line\n");
        set_mtime(&first, 60);

        // 다음 폴링은 아직 active인 파일의 꼬리를 먼저 비움
        let mut collected: Vec<String> = Vec::new();
        if state.active_file.as_deref() == Some(first.as_path()) {
            collected.extend(
                cursor
                    .read_new(&mut state, &first)
                    .unwrap()
                    .into_iter()
                    .map(|l| l.text),
            );
        }
        // 그 후 최신 파일로 전환
        let latest = cursor.latest_file().unwrap().unwrap();
        assert_eq!(latest, second);
        collected.extend(
            cursor
                .read_new(&mut state, &latest)
                .unwrap()
                .into_iter()
                .map(|l| l.text),
        );

        assert_eq!(collected, vec!["tail line", "new header", "second line"]);
        assert_eq!(state.active_file.as_deref(), Some(second.as_path()));
        assert_eq!(state.byte_offset, 23); // "new header\nsecond line\n".len()
    }

    #[test]
    fn resuming_same_file_and_offset_yields_no_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server_1.adm");
        append(&path, "header\nfirst line\n");

        let cursor = cursor_for(dir.path());
        let mut state = TailState::default();
        cursor.read_new(&mut state, &path).unwrap();

        // 저장/복원을 흉내: 같은 상태로 새 커서를 만들어 다시 폴링
        let resumed_cursor = cursor_for(dir.path());
        let mut resumed = state.clone();
        let lines = resumed_cursor.read_new(&mut resumed, &path).unwrap();
        assert!(lines.is_empty());
        assert_eq!(resumed, state);
    }

    #[test]
    fn missing_file_mid_read_is_transient() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server_1.adm");
        let cursor = cursor_for(dir.path());
        let mut state = TailState::default();

        let err = cursor.read_new(&mut state, &path).unwrap_err();
        assert!(err.is_transient());
    }

    #[test]
    fn archive_moves_stale_matching_files() {
        let dir = tempfile::tempdir().unwrap();
        let old = dir.path().join("server_1.adm");
        let current = dir.path().join("server_2.adm");
        let unrelated = dir.path().join("keep.txt");
        append(&old, "old\n");
        append(&current, "new\n");
        append(&unrelated, "other\n");

        let cursor = TailCursor::new(dir.path(), "*.adm", true).unwrap();
        let mut state = TailState::default();
        cursor.read_new(&mut state, &current).unwrap();

        assert!(!old.exists());
        assert!(dir.path().join("archived").join("server_1.adm").exists());
        assert!(unrelated.exists());
        assert!(current.exists());
    }

    #[test]
    fn split_lines_empty_buffer() {
        assert!(split_complete_lines(b"", 0).is_empty());
    }

    #[test]
    fn split_lines_tracks_offsets_from_base() {
        let lines = split_complete_lines(b"ab\ncd\n", 100);
        assert_eq!(lines[0].offset_after, 103);
        assert_eq!(lines[1].offset_after, 106);
    }

    #[test]
    fn split_lines_preserves_empty_lines() {
        let lines = split_complete_lines(b"a\n\nb\n", 0);
        let texts: Vec<_> = lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "", "b"]);
    }

    #[test]
    fn split_lines_handles_invalid_utf8_lossily() {
        let lines = split_complete_lines(b"ok\n\xff\xfe\n", 0);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text, "ok");
        // 손상 바이트는 대체 문자로 바뀔 뿐 패닉하지 않음
        assert!(!lines[1].text.is_empty());
    }
}
