//! 서버 감시기 — 테일/디코드/분류/디스패치의 전체 흐름 관리
//!
//! [`ServerWatcher`]는 core의 [`Pipeline`] trait을 구현하여
//! `mori-daemon`에서 서버마다 하나씩 독립된 생명주기로 관리됩니다.
//!
//! # 내부 아키텍처
//! ```text
//! poll loop (tokio task, 서버당 1개):
//!   latest_file -> TailCursor.read_new -> decode -> classify
//!       |                                             |
//!   CacheStore.save (라인/로테이션 단위)              |- Forward: mpsc<DeathEvent>
//!                                                     |- SelfManaged: BanScheduler
//!                                                          -> BanListWriter -> mpsc<BanEvent>
//! ```
//!
//! 루프 내부의 어떤 에러도 감시기를 종료시키지 않습니다. 일시적 에러는
//! `error_backoff` 만큼 쉬었다가 저장된 상태에서 재시도하고, 에러 내용은
//! 캐시 문서의 `last_error` 필드로 운영자에게 노출됩니다.
//!
//! 중지는 협조적입니다: 취소 토큰이 폴링 사이 sleep 안에서도 확인되므로
//! 종료 지연은 폴링 주기가 아니라 취소 전파 시간에 바인딩됩니다.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use mori_core::error::{MoriError, PipelineError};
use mori_core::event::{BanEvent, DeathEvent};
use mori_core::metrics as m;
use mori_core::pipeline::{HealthStatus, Pipeline, WatcherState};
use mori_core::types::DispatchKind;

use crate::banlist::BanListWriter;
use crate::cache::{CacheStore, TailState};
use crate::classify::{Classification, DeathClassifier};
use crate::config::WatcherConfig;
use crate::decode;
use crate::error::WatcherError;
use crate::ident;
use crate::pathlock::PathLocks;
use crate::schedule::BanScheduler;
use crate::tail::{TailCursor, TailedLine};

/// 사망 이벤트 디스패치 방식
pub enum Dispatch {
    /// 사망 이벤트를 채널로 전달 (후속 처리는 수신측 몫)
    Forward {
        /// 사망 이벤트 송신 채널
        death_tx: mpsc::Sender<DeathEvent>,
    },
    /// 감시기가 직접 밴 목록을 관리
    SelfManaged {
        /// 지연/중복 제거 스케줄러
        scheduler: BanScheduler,
        /// 밴 목록 기록기
        writer: BanListWriter,
        /// 감사 이벤트 송신 채널 (선택)
        ban_tx: Option<mpsc::Sender<BanEvent>>,
    },
}

/// 감시 태스크와 공유하는 카운터/상태
struct WatcherShared {
    /// 처리된 라인 수
    lines_processed: AtomicU64,
    /// 감지된 사망 수
    deaths_detected: AtomicU64,
    /// 억제된 사망 수
    suppressed: AtomicU64,
    /// 마지막 에러 (정상이면 빈 문자열)
    last_error: std::sync::Mutex<String>,
}

impl WatcherShared {
    fn new() -> Self {
        Self {
            lines_processed: AtomicU64::new(0),
            deaths_detected: AtomicU64::new(0),
            suppressed: AtomicU64::new(0),
            last_error: std::sync::Mutex::new(String::new()),
        }
    }

    fn set_last_error(&self, message: String) {
        let mut slot = self
            .last_error
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = message;
    }

    fn last_error(&self) -> String {
        self.last_error
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

/// 폴링 태스크로 이동되는 실행 컨텍스트
struct RunContext {
    config: WatcherConfig,
    cursor: TailCursor,
    classifier: DeathClassifier,
    cache: CacheStore,
    state: TailState,
    dispatch: Dispatch,
    cancel: CancellationToken,
    shared: Arc<WatcherShared>,
}

/// start() 시점에 소비되는 구성 요소 묶음
struct RunParts {
    cursor: TailCursor,
    classifier: DeathClassifier,
    cache: CacheStore,
    dispatch: Dispatch,
}

/// 서버 감시기 — 서버 하나의 로그 스트림을 담당합니다.
///
/// # 사용 예시
/// ```ignore
/// use mori_watcher::{ServerWatcherBuilder, PathLocks};
///
/// let mut watcher = ServerWatcherBuilder::new()
///     .config(config)
///     .locks(locks)
///     .ban_sender(ban_tx)
///     .build()?;
///
/// watcher.start().await?;
/// ```
pub struct ServerWatcher {
    /// 확정 설정
    config: WatcherConfig,
    /// 현재 생명주기 상태
    state: WatcherState,
    /// start()에서 소비되는 구성 요소 (stop 후 재시작은 재빌드 필요)
    parts: Option<RunParts>,
    /// 협조적 취소 토큰
    cancel: CancellationToken,
    /// 폴링 태스크 핸들
    task: Option<tokio::task::JoinHandle<()>>,
    /// 공유 카운터/상태
    shared: Arc<WatcherShared>,
}

impl ServerWatcher {
    /// 서버 ID를 반환합니다.
    pub fn server_id(&self) -> &str {
        &self.config.server_id
    }

    /// 현재 상태명을 반환합니다.
    pub fn state_name(&self) -> &str {
        match self.state {
            WatcherState::NotStarted => "not_started",
            WatcherState::Preparing => "preparing",
            WatcherState::Running => "running",
            WatcherState::Stopping => "stopping",
            WatcherState::Stopped => "stopped",
        }
    }

    /// 처리된 라인 수를 반환합니다.
    pub fn lines_processed(&self) -> u64 {
        self.shared.lines_processed.load(Ordering::Relaxed)
    }

    /// 감지된 사망 수를 반환합니다.
    pub fn deaths_detected(&self) -> u64 {
        self.shared.deaths_detected.load(Ordering::Relaxed)
    }

    /// 억제된 사망 수를 반환합니다.
    pub fn suppressed_count(&self) -> u64 {
        self.shared.suppressed.load(Ordering::Relaxed)
    }

    /// 마지막 에러 메시지를 반환합니다 (정상이면 빈 문자열).
    pub fn last_error(&self) -> String {
        self.shared.last_error()
    }

    /// Preparing 단계: 경로 검증 및 작업 디렉토리 준비.
    ///
    /// 로그 디렉토리가 없으면 치명적 기동 실패입니다. 캐시/밴 목록의
    /// 부모 디렉토리는 여기서 만들어 둡니다.
    fn prepare(&self) -> Result<(), WatcherError> {
        if !self.config.logs_dir.is_dir() {
            return Err(WatcherError::Startup {
                reason: format!(
                    "logs directory '{}' does not exist or is not a directory",
                    self.config.logs_dir.display()
                ),
            });
        }

        crate::file_util::ensure_parent(&self.config.cache_path).map_err(|e| {
            WatcherError::Startup {
                reason: format!(
                    "cannot create cache directory for '{}': {e}",
                    self.config.cache_path.display()
                ),
            }
        })?;

        if self.config.mode == DispatchKind::SelfManaged {
            crate::file_util::ensure_parent(&self.config.ban_list_path).map_err(|e| {
                WatcherError::Startup {
                    reason: format!(
                        "cannot create ban list directory for '{}': {e}",
                        self.config.ban_list_path.display()
                    ),
                }
            })?;
        }

        Ok(())
    }
}

impl Pipeline for ServerWatcher {
    async fn start(&mut self) -> Result<(), MoriError> {
        if self.state == WatcherState::Running {
            return Err(PipelineError::AlreadyRunning.into());
        }

        info!(server = %self.config.server_id, "starting server watcher");
        self.state = WatcherState::Preparing;

        if let Err(e) = self.prepare() {
            error!(
                server = %self.config.server_id,
                error = %e,
                "watcher preparation failed"
            );
            self.state = WatcherState::Stopped;
            return Err(e.into());
        }

        let parts = self.parts.take().ok_or(MoriError::Pipeline(
            PipelineError::InitFailed(
                "watcher components already consumed (rebuild the watcher to restart)".to_owned(),
            ),
        ))?;

        let state = parts.cache.load(&self.config.server_id).await;
        if state.byte_offset > 0 {
            info!(
                server = %self.config.server_id,
                file = %state.active_file.as_deref().map_or_else(String::new, |p| p.display().to_string()),
                offset = state.byte_offset,
                "resuming from persisted tail state"
            );
        }

        let ctx = RunContext {
            config: self.config.clone(),
            cursor: parts.cursor,
            classifier: parts.classifier,
            cache: parts.cache,
            state,
            dispatch: parts.dispatch,
            cancel: self.cancel.clone(),
            shared: Arc::clone(&self.shared),
        };

        self.task = Some(tokio::spawn(run_loop(ctx)));
        self.state = WatcherState::Running;
        info!(server = %self.config.server_id, "server watcher started");
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), MoriError> {
        if self.state != WatcherState::Running {
            return Err(PipelineError::NotRunning.into());
        }

        info!(server = %self.config.server_id, "stopping server watcher");
        self.state = WatcherState::Stopping;
        self.cancel.cancel();

        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(
                    server = %self.config.server_id,
                    error = %e,
                    "watcher task ended abnormally"
                );
            }
        }

        self.state = WatcherState::Stopped;
        info!(server = %self.config.server_id, "server watcher stopped");
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            WatcherState::Running => {
                let last_error = self.shared.last_error();
                if last_error.is_empty() {
                    HealthStatus::Healthy
                } else {
                    HealthStatus::Degraded(last_error)
                }
            }
            WatcherState::NotStarted | WatcherState::Preparing => {
                HealthStatus::Unhealthy("not started".to_owned())
            }
            WatcherState::Stopping | WatcherState::Stopped => {
                HealthStatus::Unhealthy("stopped".to_owned())
            }
        }
    }
}

/// 서버 감시기 빌더
///
/// 감시기를 구성하고 디스패치 모드에 맞는 채널/구성 요소를 조립합니다.
pub struct ServerWatcherBuilder {
    config: Option<WatcherConfig>,
    locks: Option<Arc<PathLocks>>,
    death_tx: Option<mpsc::Sender<DeathEvent>>,
    ban_tx: Option<mpsc::Sender<BanEvent>>,
}

impl ServerWatcherBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: None,
            locks: None,
            death_tx: None,
            ban_tx: None,
        }
    }

    /// 감시기 설정을 지정합니다.
    pub fn config(mut self, config: WatcherConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// 경로 잠금 레지스트리를 지정합니다.
    ///
    /// 여러 감시기가 캐시/밴 목록 파일을 공유한다면 같은 레지스트리를
    /// 전달해야 합니다. 지정하지 않으면 전용 레지스트리를 만듭니다.
    pub fn locks(mut self, locks: Arc<PathLocks>) -> Self {
        self.locks = Some(locks);
        self
    }

    /// forward 모드의 사망 이벤트 송신 채널을 지정합니다.
    pub fn death_sender(mut self, tx: mpsc::Sender<DeathEvent>) -> Self {
        self.death_tx = Some(tx);
        self
    }

    /// self-managed 모드의 감사 이벤트 송신 채널을 지정합니다 (선택).
    pub fn ban_sender(mut self, tx: mpsc::Sender<BanEvent>) -> Self {
        self.ban_tx = Some(tx);
        self
    }

    /// 감시기를 빌드합니다.
    pub fn build(self) -> Result<ServerWatcher, WatcherError> {
        let config = self.config.ok_or_else(|| WatcherError::Config {
            field: "config".to_owned(),
            reason: "watcher config must be provided".to_owned(),
        })?;
        config.validate()?;

        let locks = self.locks.unwrap_or_else(|| Arc::new(PathLocks::new()));

        let dispatch = match config.mode {
            DispatchKind::Forward => {
                let death_tx = self.death_tx.ok_or_else(|| WatcherError::Config {
                    field: "death_sender".to_owned(),
                    reason: "forward mode requires a death event channel".to_owned(),
                })?;
                Dispatch::Forward { death_tx }
            }
            DispatchKind::SelfManaged => Dispatch::SelfManaged {
                scheduler: BanScheduler::new(config.ban_delay, config.ban_min_spacing),
                writer: BanListWriter::new(
                    &config.ban_list_path,
                    Arc::clone(&locks),
                    config.write_retry_attempts,
                    config.write_retry_delay,
                ),
                ban_tx: self.ban_tx,
            },
        };

        let cursor = TailCursor::new(
            &config.logs_dir,
            &config.log_file_pattern,
            config.archive_old_logs,
        )?;
        let classifier = DeathClassifier::new(&config.death_event, config.exceptions.clone());
        let cache = CacheStore::new(&config.cache_path, locks);

        Ok(ServerWatcher {
            config,
            state: WatcherState::NotStarted,
            parts: Some(RunParts {
                cursor,
                classifier,
                cache,
                dispatch,
            }),
            cancel: CancellationToken::new(),
            task: None,
            shared: Arc::new(WatcherShared::new()),
        })
    }
}

impl Default for ServerWatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// 폴링 루프 본체.
///
/// 취소될 때까지: 폴링 → 밴 플러시 → 인터럽트 가능한 sleep.
/// 폴링 실패는 백오프로 이어질 뿐 루프를 끝내지 않습니다.
async fn run_loop(mut ctx: RunContext) {
    loop {
        let sleep_for = match ctx.poll_cycle().await {
            Ok(()) => ctx.config.poll_interval,
            Err(e) => {
                metrics::counter!(
                    m::WATCHER_POLL_ERRORS_TOTAL,
                    m::LABEL_SERVER => ctx.config.server_id.clone()
                )
                .increment(1);
                warn!(
                    server = %ctx.config.server_id,
                    error = %e,
                    "poll cycle failed, backing off"
                );
                ctx.record_error(e.to_string()).await;
                ctx.config.error_backoff
            }
        };

        ctx.flush_due_bans().await;

        tokio::select! {
            () = ctx.cancel.cancelled() => break,
            () = tokio::time::sleep(sleep_for) => {}
        }
    }

    // 종료 직전 상태를 한 번 더 영속화 (최선 노력)
    if let Err(e) = ctx.cache.save(&ctx.config.server_id, &ctx.state).await {
        warn!(
            server = %ctx.config.server_id,
            error = %e,
            "final cache save failed during shutdown"
        );
    }
    debug!(server = %ctx.config.server_id, "watcher loop exited");
}

impl RunContext {
    /// 폴링 사이클 하나: 최신 파일 탐색 → 증분 읽기 → 라인 처리 → 영속화.
    async fn poll_cycle(&mut self) -> Result<(), WatcherError> {
        let Some(latest) = self.cursor.latest_file()? else {
            debug!(
                server = %self.config.server_id,
                dir = %self.config.logs_dir.display(),
                "no candidate log file yet"
            );
            return Ok(());
        };

        // 로테이션 직전, 아직 active인 파일의 꼬리를 먼저 비웁니다.
        // 새 파일로 넘어가면서 기존 파일의 마지막 라인들을 잃지 않기 위함.
        if let Some(active) = self.state.active_file.clone()
            && active != latest
            && active.is_file()
        {
            let tail = self.cursor.read_new(&mut self.state, &active)?;
            self.process_lines(tail).await?;
        }

        let rotated = self.state.active_file.as_deref() != Some(latest.as_path());
        let lines = self.cursor.read_new(&mut self.state, &latest)?;
        if rotated {
            metrics::counter!(
                m::WATCHER_ROTATIONS_TOTAL,
                m::LABEL_SERVER => self.config.server_id.clone()
            )
            .increment(1);
            // 로테이션 판정 자체도 영속화 대상 (라인이 없어도)
            self.cache.save(&self.config.server_id, &self.state).await?;
        }

        self.process_lines(lines).await?;

        if !self.state.last_error.is_empty() {
            self.state.last_error.clear();
            self.shared.set_last_error(String::new());
        }
        self.cache.save(&self.config.server_id, &self.state).await?;
        Ok(())
    }

    /// 읽어 온 라인들을 순서대로 처리하고, 라인 단위로 오프셋을 영속화합니다.
    async fn process_lines(&mut self, lines: Vec<TailedLine>) -> Result<(), WatcherError> {
        if lines.is_empty() {
            return Ok(());
        }

        if self.config.verbose {
            info!(
                server = %self.config.server_id,
                count = lines.len(),
                "found new log lines"
            );
        }

        for line in lines {
            self.shared.lines_processed.fetch_add(1, Ordering::Relaxed);
            metrics::counter!(
                m::WATCHER_LINES_TOTAL,
                m::LABEL_SERVER => self.config.server_id.clone()
            )
            .increment(1);

            self.handle_line(&line.text).await;

            self.state.byte_offset = line.offset_after;
            self.cache.save(&self.config.server_id, &self.state).await?;
        }
        Ok(())
    }

    /// 라인 하나를 디코딩/분류/디스패치합니다. 루프를 절대 중단시키지 않습니다.
    async fn handle_line(&mut self, line: &str) {
        let Some(record) = decode::decode(line) else {
            metrics::counter!(
                m::WATCHER_DECODE_SKIPPED_TOTAL,
                m::LABEL_SERVER => self.config.server_id.clone()
            )
            .increment(1);
            if self.config.verbose {
                debug!(server = %self.config.server_id, line = line, "line skipped (not a structured record)");
            }
            return;
        };

        if let Some(ts) = &record.timestamp {
            self.state.last_seen_ts = Some(ts.clone());
        }

        match self.classifier.classify(&record) {
            Classification::NotDeath => {}
            Classification::Suppressed { rule, detail } => {
                self.shared.suppressed.fetch_add(1, Ordering::Relaxed);
                metrics::counter!(
                    m::WATCHER_SUPPRESSED_TOTAL,
                    m::LABEL_SERVER => self.config.server_id.clone()
                )
                .increment(1);
                if self.config.verbose {
                    info!(
                        server = %self.config.server_id,
                        subject = %record.subject.steam_id,
                        rule = rule,
                        detail = %detail,
                        "death suppressed by exception rule"
                    );
                } else {
                    debug!(
                        server = %self.config.server_id,
                        subject = %record.subject.steam_id,
                        rule = rule,
                        "death suppressed by exception rule"
                    );
                }
            }
            Classification::Death => {
                self.shared.deaths_detected.fetch_add(1, Ordering::Relaxed);
                metrics::counter!(
                    m::WATCHER_DEATHS_TOTAL,
                    m::LABEL_SERVER => self.config.server_id.clone()
                )
                .increment(1);
                self.dispatch_death(record).await;
            }
        }
    }

    /// 추적 대상 사망을 모드에 맞게 디스패치합니다.
    async fn dispatch_death(&mut self, record: mori_core::types::DeathRecord) {
        match &mut self.dispatch {
            Dispatch::Forward { death_tx } => {
                let event = DeathEvent::new(&self.config.server_id, record);
                info!(
                    server = %self.config.server_id,
                    subject = %event.record.subject.steam_id,
                    trace = %event.metadata.trace_id,
                    "forwarding death event"
                );
                // fire-and-forget: 수신측이 밀려 있으면 이벤트를 버리고
                // 경고만 남깁니다. 테일 루프가 막혀서는 안 됩니다.
                if let Err(e) = death_tx.try_send(event) {
                    warn!(
                        server = %self.config.server_id,
                        error = %e,
                        "death event dropped (channel unavailable)"
                    );
                }
            }
            Dispatch::SelfManaged { scheduler, .. } => {
                let guid = match ident::derive_ban_guid(&record.subject.steam_id) {
                    Ok(guid) => guid,
                    Err(e) => {
                        warn!(
                            server = %self.config.server_id,
                            error = %e,
                            "death event dropped (ban id derivation failed)"
                        );
                        return;
                    }
                };

                let trace_id = uuid::Uuid::new_v4().to_string();
                match scheduler.enqueue(guid.clone(), trace_id.clone(), Instant::now()) {
                    Some(due) => {
                        info!(
                            server = %self.config.server_id,
                            subject = %record.subject.steam_id,
                            ban_id = %guid,
                            trace = %trace_id,
                            due_in_secs = due.saturating_duration_since(Instant::now()).as_secs(),
                            "queued ban for subject"
                        );
                    }
                    None => {
                        debug!(
                            server = %self.config.server_id,
                            ban_id = %guid,
                            "subject already queued for ban"
                        );
                    }
                }
                metrics::gauge!(
                    m::SCHEDULER_PENDING_BANS,
                    m::LABEL_SERVER => self.config.server_id.clone()
                )
                .set(scheduler.pending_count() as f64);
            }
        }
    }

    /// 예약 시각이 지난 밴을 목록 파일로 플러시합니다.
    ///
    /// 쓰기 실패 시 실패 항목과 그 뒤 항목들을 큐 앞에 되돌려
    /// 다음 사이클에 다시 시도합니다 — 예약된 밴은 사라지지 않습니다.
    async fn flush_due_bans(&mut self) {
        let Dispatch::SelfManaged {
            scheduler,
            writer,
            ban_tx,
        } = &mut self.dispatch
        else {
            return;
        };

        let mut due = scheduler.flush_due(Instant::now());
        if due.is_empty() {
            return;
        }

        let mut completed = 0usize;
        let mut failure: Option<WatcherError> = None;
        for entry in &due {
            match writer.add(&entry.subject).await {
                Ok(added) => {
                    completed += 1;
                    metrics::counter!(
                        m::BANLIST_WRITES_TOTAL,
                        m::LABEL_SERVER => self.config.server_id.clone(),
                        m::LABEL_RESULT => "success"
                    )
                    .increment(1);
                    if added {
                        info!(
                            server = %self.config.server_id,
                            subject = %entry.subject,
                            trace = %entry.trace_id,
                            "subject added to ban list"
                        );
                    }
                    if let Some(tx) = ban_tx {
                        let event = BanEvent::with_trace(
                            &self.config.server_id,
                            &entry.subject,
                            true,
                            &entry.trace_id,
                        );
                        if let Err(e) = tx.try_send(event) {
                            debug!(error = %e, "ban audit event dropped");
                        }
                    }
                }
                Err(e) => {
                    metrics::counter!(
                        m::BANLIST_WRITES_TOTAL,
                        m::LABEL_SERVER => self.config.server_id.clone(),
                        m::LABEL_RESULT => "failure"
                    )
                    .increment(1);
                    error!(
                        server = %self.config.server_id,
                        subject = %entry.subject,
                        error = %e,
                        "ban list write failed, keeping ban queued"
                    );
                    if let Some(tx) = ban_tx {
                        let event = BanEvent::with_trace(
                            &self.config.server_id,
                            &entry.subject,
                            false,
                            &entry.trace_id,
                        );
                        if let Err(send_err) = tx.try_send(event) {
                            debug!(error = %send_err, "ban audit event dropped");
                        }
                    }
                    failure = Some(e);
                    break;
                }
            }
        }

        if completed < due.len() {
            let remaining = due.split_off(completed);
            scheduler.requeue_front(remaining);
        }
        metrics::gauge!(
            m::SCHEDULER_PENDING_BANS,
            m::LABEL_SERVER => self.config.server_id.clone()
        )
        .set(scheduler.pending_count() as f64);

        if let Some(e) = failure {
            self.record_error(e.to_string()).await;
        }
    }

    /// 에러를 공유 상태와 캐시 문서의 last_error 필드에 기록합니다.
    async fn record_error(&mut self, message: String) {
        self.shared.set_last_error(message.clone());
        self.state.last_error = message;
        if let Err(e) = self.cache.save(&self.config.server_id, &self.state).await {
            warn!(
                server = %self.config.server_id,
                error = %e,
                "failed to persist last_error to cache"
            );
        }
    }
}
