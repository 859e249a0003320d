//! 파일 헬퍼 — 원자적 쓰기 및 목록 읽기
//!
//! 캐시 문서와 밴 목록 파일은 모두 같은 기법으로 기록합니다:
//! 같은 디렉토리의 임시 파일에 전체 내용을 쓴 뒤 rename으로 교체.
//! rename은 같은 파일시스템 안에서 원자적이므로, 읽는 쪽은 절대
//! 부분 기록된 문서를 관찰하지 않습니다.

use std::fs;
use std::io::Write;
use std::path::Path;

/// 대상 경로의 부모 디렉토리를 생성합니다.
pub fn ensure_parent(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// 임시 파일 + rename으로 파일 전체를 원자적으로 교체합니다.
///
/// 임시 파일은 rename이 원자적이도록 대상과 같은 디렉토리에 만듭니다.
/// 쓰기와 rename 사이에 프로세스가 죽으면 이전 문서가 그대로 남습니다
/// (남은 `.tmp` 파일은 다음 쓰기에서 덮어씁니다).
pub fn atomic_write(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    ensure_parent(path)?;

    let tmp_path = temp_path_for(path);
    {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(contents)?;
        file.sync_all()?;
    }
    fs::rename(&tmp_path, path)?;
    Ok(())
}

/// 개행으로 구분된 목록 파일을 읽습니다.
///
/// 파일이 없으면 빈 목록으로 취급합니다. 공백뿐인 라인은 무시합니다.
pub fn read_lines(path: &Path) -> std::io::Result<Vec<String>> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok(contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_owned)
            .collect()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e),
    }
}

/// 개행으로 구분된 목록 파일을 원자적으로 기록합니다.
pub fn write_lines(path: &Path, lines: &[String]) -> std::io::Result<()> {
    let mut contents = lines.join("\n");
    if !lines.is_empty() {
        contents.push('\n');
    }
    atomic_write(path, contents.as_bytes())
}

/// 대상 경로에 대응하는 임시 파일 경로를 만듭니다.
fn temp_path_for(path: &Path) -> std::path::PathBuf {
    let mut name = path
        .file_name()
        .map_or_else(|| std::ffi::OsString::from("mori"), ToOwned::to_owned);
    name.push(".tmp");
    path.with_file_name(name)
}
