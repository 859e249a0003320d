//! 밴 스케줄러 — 지연/중복 제거/최소 간격이 적용된 대기 큐
//!
//! 추적 대상 사망은 즉시 밴 목록에 기록되지 않고 `ban_delay` 만큼
//! 지연됩니다. 같은 대상이 이미 대기 중이면 재등록은 no-op이며,
//! 연속 등록은 항상 `min_spacing` 이상 간격을 두고 예약됩니다 —
//! 대량 사망 이벤트가 외부 밴 파일에 대한 폭주 I/O로 이어지지 않게
//! 하기 위한 제한입니다.
//!
//! # 불변식
//! - 대상당 대기 항목은 최대 1개
//! - 예약 시각은 큐 순서상 단조 비감소
//! - 인접 예약 시각의 간격은 `min_spacing` 이상
//!
//! 시계는 호출자가 `Instant`로 전달합니다. 단조 시계이며 테스트에서
//! 잠들지 않고 검증할 수 있습니다.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// 대기 중인 밴 항목
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingBan {
    /// 밴 목록 식별자 (파생 GUID)
    pub subject: String,
    /// 실행 예정 시각
    pub due: Instant,
    /// 사망 이벤트의 trace_id (감사 로그 연결용)
    pub trace_id: String,
}

/// 밴 스케줄러
pub struct BanScheduler {
    /// 대기 큐 (예약 시각 순)
    queue: VecDeque<PendingBan>,
    /// 등록 후 실행까지의 지연
    ban_delay: Duration,
    /// 연속 실행 최소 간격
    min_spacing: Duration,
}

impl BanScheduler {
    /// 새 스케줄러를 생성합니다.
    pub fn new(ban_delay: Duration, min_spacing: Duration) -> Self {
        Self {
            queue: VecDeque::new(),
            ban_delay,
            min_spacing,
        }
    }

    /// 대상을 대기 큐에 등록합니다.
    ///
    /// 이미 대기 중인 대상이면 no-op으로 `None`을 반환합니다.
    /// 등록되면 예약 시각을 반환합니다.
    pub fn enqueue(
        &mut self,
        subject: impl Into<String>,
        trace_id: impl Into<String>,
        now: Instant,
    ) -> Option<Instant> {
        let subject = subject.into();
        if self.is_queued(&subject) {
            return None;
        }

        let mut due = now + self.ban_delay;
        if let Some(last) = self.queue.back() {
            let spaced = last.due + self.min_spacing;
            if due < spaced {
                due = spaced;
            }
        }

        self.queue.push_back(PendingBan {
            subject,
            due,
            trace_id: trace_id.into(),
        });
        Some(due)
    }

    /// 예약 시각이 지난 항목을 순서대로 꺼내 반환합니다.
    ///
    /// 큐는 시각 순으로 정렬되어 있으므로 앞에서부터의 접두사 스캔이며,
    /// 아직 시각이 되지 않은 첫 항목에서 멈춥니다.
    pub fn flush_due(&mut self, now: Instant) -> Vec<PendingBan> {
        let mut due = Vec::new();
        while let Some(front) = self.queue.front() {
            if front.due > now {
                break;
            }
            // 위에서 front 존재를 확인했으므로 pop은 항상 성공
            if let Some(entry) = self.queue.pop_front() {
                due.push(entry);
            }
        }
        due
    }

    /// 실행에 실패한 항목을 큐 앞에 그대로 되돌립니다.
    ///
    /// 예약 시각은 유지되므로 다음 flush에서 즉시 다시 시도됩니다.
    pub fn requeue_front(&mut self, entries: Vec<PendingBan>) {
        for entry in entries.into_iter().rev() {
            self.queue.push_front(entry);
        }
    }

    /// 대상이 이미 대기 중인지 확인합니다.
    pub fn is_queued(&self, subject: &str) -> bool {
        self.queue.iter().any(|p| p.subject == subject)
    }

    /// 대기 중인 항목 수를 반환합니다.
    pub fn pending_count(&self) -> usize {
        self.queue.len()
    }

    /// 큐가 비어 있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
