//! 포지션 및 FIFO lot 타입.
//!
//! `Position`은 Ledger가 소유하며 다른 구성 요소는 스냅샷만 읽습니다.
//! 포지션 부재(flat)는 `Option::None`으로 표현하며 size 0과 구분됩니다.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 포지션 방향.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionSide {
    Long,
    Short,
}

impl PositionSide {
    /// 반대 방향.
    pub fn opposite(&self) -> Self {
        match self {
            PositionSide::Long => PositionSide::Short,
            PositionSide::Short => PositionSide::Long,
        }
    }

    /// 이 방향으로 진입할 때의 주문 방향.
    pub fn entry_order_side(&self) -> OrderSide {
        match self {
            PositionSide::Long => OrderSide::Buy,
            PositionSide::Short => OrderSide::Sell,
        }
    }

    /// 이 방향을 청산할 때의 주문 방향.
    pub fn exit_order_side(&self) -> OrderSide {
        match self {
            PositionSide::Long => OrderSide::Sell,
            PositionSide::Short => OrderSide::Buy,
        }
    }
}

impl std::fmt::Display for PositionSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PositionSide::Long => write!(f, "long"),
            PositionSide::Short => write!(f, "short"),
        }
    }
}

/// 주문 방향.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "buy"),
            OrderSide::Sell => write!(f, "sell"),
        }
    }
}

/// 현재 포지션 스냅샷.
///
/// `entry_price`는 열린 lot들의 가중 평균으로 읽기 시점에 계산된 값입니다.
/// 심볼당 동시에 하나의 포지션만 존재합니다 (롱/숏 동시 보유 없음).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// 방향
    pub side: PositionSide,
    /// 보유 수량 (계약 단위, ≥ 0)
    pub size: Decimal,
    /// 가중 평균 진입가
    pub entry_price: Decimal,
    /// 레버리지
    pub leverage: u32,
}

impl Position {
    /// 열린 lot 집계로 현재 포지션 계산.
    ///
    /// 진입가는 lot들의 가중 평균으로 읽기 시점에 도출합니다.
    /// 정상 동작에서는 한 방향의 lot만 존재하며, 양쪽 모두 있으면
    /// (재조정 엔진의 계약 위반) 롱을 우선 보고합니다.
    pub fn from_lots(lots: &[Lot], leverage: u32) -> Option<Position> {
        let mut long_size = Decimal::ZERO;
        let mut long_value = Decimal::ZERO;
        let mut short_size = Decimal::ZERO;
        let mut short_value = Decimal::ZERO;

        for lot in lots {
            match lot.side {
                PositionSide::Long => {
                    long_size += lot.amount;
                    long_value += lot.amount * lot.entry_price;
                }
                PositionSide::Short => {
                    short_size += lot.amount;
                    short_value += lot.amount * lot.entry_price;
                }
            }
        }

        if long_size > Decimal::ZERO {
            Some(Position {
                side: PositionSide::Long,
                size: long_size,
                entry_price: long_value / long_size,
                leverage,
            })
        } else if short_size > Decimal::ZERO {
            Some(Position {
                side: PositionSide::Short,
                size: short_size,
                entry_price: short_value / short_size,
                leverage,
            })
        } else {
            None
        }
    }

    /// 미실현 손익 계산 (mark-to-market, 잔고에는 반영하지 않음).
    pub fn unrealized_pnl(&self, current_price: Decimal, contract_multiplier: Decimal) -> Decimal {
        match self.side {
            PositionSide::Long => {
                (current_price - self.entry_price) * self.size * contract_multiplier
            }
            PositionSide::Short => {
                (self.entry_price - current_price) * self.size * contract_multiplier
            }
        }
    }
}

/// 개별 진입 lot (시뮬레이션 전용).
///
/// 청산은 같은 방향의 lot을 `opened_at` 오름차순(FIFO)으로 소비합니다.
/// 부분 청산은 가장 오래된 lot의 잔량을 줄이거나, 소진 시 제거합니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lot {
    /// 저장소가 부여하는 고유 ID
    pub id: u64,
    /// 방향
    pub side: PositionSide,
    /// 잔량 (계약 단위)
    pub amount: Decimal,
    /// 진입가
    pub entry_price: Decimal,
    /// 진입 시각
    pub opened_at: DateTime<Utc>,
}
