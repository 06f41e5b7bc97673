//! 폴백 시그널 정책.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use perp_core::{Confidence, SignalAction, TradeSignal};

use crate::normalizer::FallbackReason;

/// 결정적 폴백 시그널 생성.
///
/// 같은 (가격, 시각) 입력에 대해 항상 같은 시그널을 만듭니다:
/// HOLD / LOW, 손절 −2%, 익절 +2%. `is_fallback` 플래그가 설정되어
/// 재시도 래퍼가 실제 판단과 안전 기본값을 구분할 수 있습니다.
pub fn create_fallback_signal(
    price: Decimal,
    timestamp: DateTime<Utc>,
    reason: &FallbackReason,
) -> TradeSignal {
    TradeSignal::new(
        SignalAction::Hold,
        Confidence::Low,
        format!("폴백 시그널: {}", reason),
        price * Decimal::new(98, 2),
        price * Decimal::new(102, 2),
        timestamp,
    )
    .as_fallback()
}
