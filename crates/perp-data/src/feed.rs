//! 캔들 리플레이 피드.
//!
//! 파일에 저장된 OHLCV 시계열을 한 캔들씩 전진하며 재생합니다.
//! 시뮬레이션 루프와 테스트가 실거래 데이터 수집 없이
//! 파이프라인 전체를 구동할 수 있게 합니다.

use std::fs;
use std::path::Path;

use tracing::info;

use perp_core::Candle;

use crate::error::DataError;

/// 파일 기반 캔들 리플레이 피드.
pub struct ReplayFeed {
    candles: Vec<Candle>,
    cursor: usize,
}

impl ReplayFeed {
    /// 캔들 벡터로 생성. `window`는 첫 재생 시점의 히스토리 길이입니다.
    pub fn new(candles: Vec<Candle>, window: usize) -> Self {
        let cursor = window.min(candles.len());
        Self { candles, cursor }
    }

    /// JSON 파일(캔들 배열)에서 로드.
    pub fn from_file(path: impl AsRef<Path>, window: usize) -> Result<Self, DataError> {
        let text = fs::read_to_string(path.as_ref())?;
        let candles: Vec<Candle> = serde_json::from_str(&text)?;
        info!(
            path = %path.as_ref().display(),
            candles = candles.len(),
            "리플레이 피드 로드"
        );
        Ok(Self::new(candles, window))
    }

    /// 다음 재생 시점의 히스토리 윈도우.
    ///
    /// 호출마다 한 캔들씩 전진하며, 시계열이 소진되면 `None`.
    pub fn next_window(&mut self) -> Option<Vec<Candle>> {
        if self.cursor > self.candles.len() || self.cursor == 0 {
            return None;
        }
        let window = self.candles[..self.cursor].to_vec();
        self.cursor += 1;
        Some(window)
    }

    /// 남은 재생 횟수.
    pub fn remaining(&self) -> usize {
        (self.candles.len() + 1).saturating_sub(self.cursor.max(1))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use rust_decimal_macros::dec;

    use super::*;

    fn candles(count: usize) -> Vec<Candle> {
        let base = Utc::now();
        (0..count)
            .map(|i| Candle {
                timestamp: base + Duration::minutes(i as i64),
                open: dec!(100),
                high: dec!(101),
                low: dec!(99),
                close: dec!(100.5),
                volume: dec!(1),
            })
            .collect()
    }

    #[test]
    fn test_window_advances_one_candle_per_call() {
        let mut feed = ReplayFeed::new(candles(5), 3);

        assert_eq!(feed.next_window().unwrap().len(), 3);
        assert_eq!(feed.next_window().unwrap().len(), 4);
        assert_eq!(feed.next_window().unwrap().len(), 5);
        assert!(feed.next_window().is_none());
    }

    #[test]
    fn test_file_roundtrip() {
        let path = std::env::temp_dir().join(format!("perp-feed-{}.json", uuid::Uuid::new_v4()));
        let data = candles(4);
        fs::write(&path, serde_json::to_string(&data).unwrap()).unwrap();

        let mut feed = ReplayFeed::from_file(&path, 2).unwrap();
        assert_eq!(feed.next_window().unwrap().len(), 2);

        fs::remove_file(path).ok();
    }

    #[test]
    fn test_empty_series_yields_nothing() {
        let mut feed = ReplayFeed::new(Vec::new(), 10);
        assert!(feed.next_window().is_none());
    }
}
