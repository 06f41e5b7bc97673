//! 실행 간격 경계 스케줄러.
//!
//! 루프는 interval 분의 정각 경계(예: 3분 간격이면 :00, :03, :06...)에
//! 맞춰 실행됩니다. 긴 대기는 청크로 나눠 진행 상황을 로그로 남깁니다.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::info;

/// 분할 대기의 최대 청크 (초).
const WAIT_CHUNK_SECS: u64 = 30;

/// 다음 interval 경계까지 남은 초.
pub fn seconds_until_next_boundary(now: DateTime<Utc>, interval_minutes: u64) -> u64 {
    let interval_secs = interval_minutes * 60;
    if interval_secs == 0 {
        return 0;
    }
    let since_epoch = now.timestamp().max(0) as u64;
    let remainder = since_epoch % interval_secs;
    if remainder == 0 {
        0
    } else {
        interval_secs - remainder
    }
}

/// 다음 경계까지 대기.
pub async fn wait_for_next_boundary(interval_minutes: u64) {
    let mut wait = seconds_until_next_boundary(Utc::now(), interval_minutes);
    if wait == 0 {
        return;
    }

    info!(wait_secs = wait, "다음 정각 경계까지 대기");
    while wait > 0 {
        let chunk = wait.min(WAIT_CHUNK_SECS);
        tokio::time::sleep(Duration::from_secs(chunk)).await;
        wait = wait.saturating_sub(chunk);
        if wait > 0 {
            info!(remaining_secs = wait, "경계 대기 중");
        }
    }
}
