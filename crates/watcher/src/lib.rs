#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`tail`]: 파일 테일 커서 (최신 파일 선택, 로테이션/절단 감지, 오프셋 단위 라인 전달)
//! - [`decode`]: 라인 단위 구조화 레코드 디코더 (관대한 JSON 파싱)
//! - [`classify`]: 사망 분류기 및 예외 규칙 (원점 자살 억제)
//! - [`ident`]: 플랫폼 ID 검증 및 밴 목록 GUID 파생
//! - [`schedule`]: 지연/중복 제거/최소 간격 밴 스케줄러
//! - [`cache`]: 서버별 테일 상태의 원자적 영속화
//! - [`banlist`]: 중복 없는 밴 목록 파일 쓰기 (재시도 포함)
//! - [`pathlock`]: 경로 단위 상호 배제 레지스트리
//! - [`file_util`]: 원자적 쓰기 등 파일 헬퍼
//! - [`watch`]: 서버 감시기 (Pipeline 구현, 폴링 루프)
//! - [`config`]: 서버별 감시 설정 (core 설정에서 해석)
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! TailCursor -> decode -> DeathClassifier -> dispatch
//!     |                        |               |- Forward: mpsc<DeathEvent>
//!  CacheStore (offset)    exception rules      |- SelfManaged: BanScheduler -> BanListWriter
//! ```

pub mod banlist;
pub mod cache;
pub mod classify;
pub mod config;
pub mod decode;
pub mod error;
pub mod file_util;
pub mod ident;
pub mod pathlock;
pub mod schedule;
pub mod tail;
pub mod watch;

// --- 주요 타입 re-export ---

// 감시기
pub use watch::{Dispatch, ServerWatcher, ServerWatcherBuilder};

// 설정
pub use config::WatcherConfig;

// 에러
pub use error::WatcherError;

// 테일 커서
pub use tail::{TailCursor, TailedLine};

// 분류기
pub use classify::{Classification, DeathClassifier, ExceptionRule};

// 스케줄러
pub use schedule::{BanScheduler, PendingBan};

// 영속 캐시
pub use cache::{CacheStore, TailState};

// 밴 목록
pub use banlist::BanListWriter;

// 경로 잠금
pub use pathlock::PathLocks;
