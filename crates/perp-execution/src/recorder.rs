//! 거래 기록 생성.
//!
//! 재조정 결과를 감사 기록으로 변환하는 공통 빌더입니다.
//! open/add 기록은 항상 pnl = 0이고, 실현 손익은 close/reduce
//! 기록에만 실립니다. 방향 반전은 close와 open 두 기록을 따로 만듭니다.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use perp_core::{PositionAction, PositionSide, TradeMode, TradeRecord, TradeSignal};

fn base_record(
    signal: &TradeSignal,
    price: Decimal,
    amount: Decimal,
    pnl: Decimal,
    position_action: PositionAction,
    position_side: Option<PositionSide>,
    mode: TradeMode,
    timestamp: DateTime<Utc>,
) -> TradeRecord {
    TradeRecord {
        timestamp,
        signal: signal.action,
        price,
        amount,
        confidence: signal.confidence,
        reason: signal.reason.clone(),
        pnl,
        position_action,
        position_side,
        trade_type: position_action,
        mode,
    }
}

/// 개시 기록 생성.
pub fn build_open_record(
    signal: &TradeSignal,
    price: Decimal,
    amount: Decimal,
    side: PositionSide,
    mode: TradeMode,
    timestamp: DateTime<Utc>,
) -> TradeRecord {
    base_record(
        signal,
        price,
        amount,
        Decimal::ZERO,
        PositionAction::Open,
        Some(side),
        mode,
        timestamp,
    )
}

/// 평가 기록 생성 (전량 청산).
pub fn build_close_record(
    signal: &TradeSignal,
    price: Decimal,
    amount: Decimal,
    side: PositionSide,
    pnl: Decimal,
    mode: TradeMode,
    timestamp: DateTime<Utc>,
) -> TradeRecord {
    base_record(
        signal,
        price,
        amount,
        pnl,
        PositionAction::Close,
        Some(side),
        mode,
        timestamp,
    )
}

/// 추가 진입 기록 생성.
pub fn build_add_record(
    signal: &TradeSignal,
    price: Decimal,
    amount: Decimal,
    side: PositionSide,
    mode: TradeMode,
    timestamp: DateTime<Utc>,
) -> TradeRecord {
    base_record(
        signal,
        price,
        amount,
        Decimal::ZERO,
        PositionAction::Add,
        Some(side),
        mode,
        timestamp,
    )
}

/// 부분 축소 기록 생성.
pub fn build_reduce_record(
    signal: &TradeSignal,
    price: Decimal,
    amount: Decimal,
    side: PositionSide,
    pnl: Decimal,
    mode: TradeMode,
    timestamp: DateTime<Utc>,
) -> TradeRecord {
    base_record(
        signal,
        price,
        amount,
        pnl,
        PositionAction::Reduce,
        Some(side),
        mode,
        timestamp,
    )
}

/// 보유/무변동 감사 기록 생성 (시뮬레이션 전용).
pub fn build_hold_record(
    signal: &TradeSignal,
    price: Decimal,
    amount: Decimal,
    side: Option<PositionSide>,
    mode: TradeMode,
    timestamp: DateTime<Utc>,
) -> TradeRecord {
    base_record(
        signal,
        price,
        amount,
        Decimal::ZERO,
        PositionAction::Hold,
        side,
        mode,
        timestamp,
    )
}
