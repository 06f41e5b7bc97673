//! 계좌 스냅샷.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 계좌 상태 스냅샷.
///
/// `equity = balance + 미실현 손익`, `available_cash = balance − used_margin`.
/// 실현 손익은 항상 가산 방식(`balance += pnl`)으로 반영하며
/// 잔고를 처음부터 다시 계산하지 않습니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    /// 잔고 (USDT)
    pub balance: Decimal,
    /// 평가 자산 (잔고 + 미실현 손익)
    pub equity: Decimal,
    /// 사용 중 증거금
    pub used_margin: Decimal,
}

impl AccountSnapshot {
    /// 잔고만으로 스냅샷 생성 (미실현 손익/증거금 0).
    pub fn from_balance(balance: Decimal) -> Self {
        Self {
            balance,
            equity: balance,
            used_margin: Decimal::ZERO,
        }
    }

    /// 가용 현금 (잔고 − 사용 중 증거금).
    pub fn available_cash(&self) -> Decimal {
        self.balance - self.used_margin
    }
}
