//! 감사용 거래 기록.
//!
//! 재조정(reconciliation) 결과마다 하나의 기록을 남기며,
//! 방향 반전은 평가(close) + 개시(open) 두 개의 기록을 남깁니다.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::position::PositionSide;
use super::signal::{Confidence, SignalAction};

/// 포지션 조작 유형.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionAction {
    /// 신규 개시
    Open,
    /// 전량 또는 부분 평가
    Close,
    /// 동방향 추가 진입
    Add,
    /// 동방향 부분 축소
    Reduce,
    /// 변동 없음 (시뮬레이션 감사용)
    Hold,
}

impl std::fmt::Display for PositionAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PositionAction::Open => write!(f, "open"),
            PositionAction::Close => write!(f, "close"),
            PositionAction::Add => write!(f, "add"),
            PositionAction::Reduce => write!(f, "reduce"),
            PositionAction::Hold => write!(f, "hold"),
        }
    }
}

/// 실행 모드.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeMode {
    Live,
    Simulation,
}

/// 불변 거래 기록.
///
/// # 불변조건
///
/// `pnl`은 기존 lot을 전부 또는 일부 평가하는 `close`/`reduce` 기록에서만
/// 0이 아닐 수 있으며, `open`/`add` 기록은 항상 `pnl = 0`입니다.
/// 방향 반전 한 번은 정확히 두 개의 기록(구방향 close, 신방향 open)을
/// 이 순서로 생성하며, 하나로 합치지 않습니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    /// 기록 시각
    pub timestamp: DateTime<Utc>,
    /// 이 기록을 유발한 시그널 액션
    pub signal: SignalAction,
    /// 체결 기준 가격
    pub price: Decimal,
    /// 거래 수량 (계약 단위)
    pub amount: Decimal,
    /// 시그널 신뢰도
    pub confidence: Confidence,
    /// 시그널 근거
    pub reason: String,
    /// 실현 손익 (close/reduce 외에는 0)
    pub pnl: Decimal,
    /// 포지션 조작 유형
    pub position_action: PositionAction,
    /// 조작 대상 포지션 방향 (flat 상태의 hold는 None)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position_side: Option<PositionSide>,
    /// 거래 유형 (대시보드 호환 필드, position_action과 동일)
    pub trade_type: PositionAction,
    /// 실행 모드
    pub mode: TradeMode,
}
