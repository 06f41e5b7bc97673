//! 에러 타입 정의.

use thiserror::Error;

/// 데이터 계층 에러.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("입출력 에러: {0}")]
    Io(#[from] std::io::Error),

    #[error("직렬화 에러: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("캔들 수 부족: {got}개 (최소 {min}개)")]
    NotEnoughCandles { got: usize, min: usize },

    #[error("지표 초기화 실패: {0}")]
    Indicator(String),
}
