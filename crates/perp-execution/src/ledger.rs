//! 포지션 Ledger.
//!
//! 현재 포지션은 매 호출마다 새로 계산합니다. 시뮬레이션은 저장된
//! 열린 lot의 집계, 실거래는 거래소 포지션 조회가 그 출처입니다.
//! 두 변형 모두 `PositionLedger` trait을 구현하여 재조정 엔진이
//! 한 벌의 코드로 동작합니다.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{debug, warn};

use perp_core::{GatewayError, LotStore, OrderGateway, Position, PositionSide, StoreError};

/// Ledger 에러.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("저장소 에러: {0}")]
    Store(#[from] StoreError),

    #[error("거래소 조회 실패: {0}")]
    Gateway(#[from] GatewayError),
}

/// 청산 결과.
///
/// `shortfall`이 0보다 크면 열린 lot이 요청 수량보다 부족했음을
/// 의미합니다 (장부 불일치). 이 경우에도 가능한 만큼만 평가하며,
/// 손익을 지어내지 않습니다.
#[derive(Debug, Clone, PartialEq)]
pub struct CloseOutcome {
    /// 실제 평가된 수량
    pub closed_amount: Decimal,
    /// 실현 손익 (슬라이스 합계)
    pub realized_pnl: Decimal,
    /// 요청 대비 부족분
    pub shortfall: Decimal,
}

/// 포지션 Ledger trait.
#[async_trait]
pub trait PositionLedger: Send + Sync {
    /// 현재 포지션 조회 (flat이면 `None`). 매 호출 새로 계산합니다.
    async fn current_position(&self) -> Result<Option<Position>, LedgerError>;

    /// 개시 기록. 항상 새 lot을 추가하며 기존 lot과 병합하지 않습니다.
    async fn record_open(
        &self,
        side: PositionSide,
        amount: Decimal,
        entry_price: Decimal,
        timestamp: DateTime<Utc>,
    ) -> Result<(), LedgerError>;

    /// 청산 기록 및 실현 손익 계산.
    ///
    /// `avg_entry`는 호출 시점 포지션 스냅샷의 가중 평균 진입가입니다.
    /// 시뮬레이션 구현은 이를 무시하고 lot별 진입가로 FIFO 정산하며,
    /// 실거래 구현은 평균 진입가 기준으로 손익을 계산합니다.
    async fn record_close(
        &self,
        side: PositionSide,
        amount: Decimal,
        exit_price: Decimal,
        avg_entry: Decimal,
        timestamp: DateTime<Utc>,
    ) -> Result<CloseOutcome, LedgerError>;
}

// =============================================================================
// 시뮬레이션 Ledger (FIFO lot 회계)
// =============================================================================

/// 저장소 기반 FIFO Ledger.
///
/// 열린 lot이 단일 진실 공급원이므로, 프로세스 재시작 후에도
/// lot 집계만으로 포지션이 복원됩니다.
pub struct SimLedger {
    lots: Arc<dyn LotStore>,
    contract_multiplier: Decimal,
    leverage: u32,
}

impl SimLedger {
    /// 새 시뮬레이션 Ledger 생성.
    pub fn new(lots: Arc<dyn LotStore>, contract_multiplier: Decimal, leverage: u32) -> Self {
        Self {
            lots,
            contract_multiplier,
            leverage,
        }
    }

    /// 한 슬라이스의 실현 손익.
    fn slice_pnl(
        &self,
        side: PositionSide,
        entry_price: Decimal,
        exit_price: Decimal,
        amount: Decimal,
    ) -> Decimal {
        match side {
            PositionSide::Long => (exit_price - entry_price) * amount * self.contract_multiplier,
            PositionSide::Short => (entry_price - exit_price) * amount * self.contract_multiplier,
        }
    }
}

#[async_trait]
impl PositionLedger for SimLedger {
    async fn current_position(&self) -> Result<Option<Position>, LedgerError> {
        let lots = self.lots.all_open_lots()?;
        Ok(Position::from_lots(&lots, self.leverage))
    }

    async fn record_open(
        &self,
        side: PositionSide,
        amount: Decimal,
        entry_price: Decimal,
        timestamp: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        let lot = self
            .lots
            .append_open_lot(side, amount, entry_price, timestamp)?;
        debug!(
            lot_id = lot.id,
            side = %side,
            amount = %amount,
            entry_price = %entry_price,
            "lot 추가"
        );
        Ok(())
    }

    async fn record_close(
        &self,
        side: PositionSide,
        amount: Decimal,
        exit_price: Decimal,
        _avg_entry: Decimal,
        _timestamp: DateTime<Utc>,
    ) -> Result<CloseOutcome, LedgerError> {
        let open_lots = self.lots.open_lots(side)?;

        if open_lots.is_empty() {
            // 장부 불일치: 평가 요청이 왔지만 대응하는 개시 기록이 없음.
            // 손익을 지어내지 않고 건너뛴다.
            warn!(
                side = %side,
                amount = %amount,
                "평가 대상 lot 없음 - 장부 불일치, 평가 건너뜀"
            );
            return Ok(CloseOutcome {
                closed_amount: Decimal::ZERO,
                realized_pnl: Decimal::ZERO,
                shortfall: amount,
            });
        }

        let mut remaining = amount;
        let mut closed = Decimal::ZERO;
        let mut total_pnl = Decimal::ZERO;

        // 가장 오래된 lot부터 소비 (FIFO)
        for lot in open_lots {
            if remaining <= Decimal::ZERO {
                break;
            }

            let close_amount = lot.amount.min(remaining);
            let pnl = self.slice_pnl(side, lot.entry_price, exit_price, close_amount);

            if close_amount >= lot.amount {
                self.lots.remove_lot(lot.id)?;
            } else {
                self.lots.shrink_lot(lot.id, lot.amount - close_amount)?;
            }

            debug!(
                lot_id = lot.id,
                close_amount = %close_amount,
                entry_price = %lot.entry_price,
                exit_price = %exit_price,
                pnl = %pnl,
                "lot 평가"
            );

            remaining -= close_amount;
            closed += close_amount;
            total_pnl += pnl;
        }

        if remaining > Decimal::ZERO {
            warn!(
                requested = %amount,
                closed = %closed,
                shortfall = %remaining,
                "열린 lot이 요청 수량보다 부족 - 가능한 만큼만 평가"
            );
        }

        Ok(CloseOutcome {
            closed_amount: closed,
            realized_pnl: total_pnl,
            shortfall: remaining,
        })
    }
}

// =============================================================================
// 실거래 Ledger
// =============================================================================

/// 거래소 기반 Ledger.
///
/// 포지션 장부는 거래소가 관리하므로 개시 기록은 no-op이며,
/// 청산 손익은 평균 진입가 기준으로 계산합니다.
pub struct LiveLedger {
    gateway: Arc<dyn OrderGateway>,
    symbol: String,
    contract_multiplier: Decimal,
}

impl LiveLedger {
    /// 새 실거래 Ledger 생성.
    pub fn new(gateway: Arc<dyn OrderGateway>, symbol: impl Into<String>, contract_multiplier: Decimal) -> Self {
        Self {
            gateway,
            symbol: symbol.into(),
            contract_multiplier,
        }
    }
}

#[async_trait]
impl PositionLedger for LiveLedger {
    async fn current_position(&self) -> Result<Option<Position>, LedgerError> {
        Ok(self.gateway.fetch_position(&self.symbol).await?)
    }

    async fn record_open(
        &self,
        _side: PositionSide,
        _amount: Decimal,
        _entry_price: Decimal,
        _timestamp: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        // 거래소가 포지션 장부를 관리한다
        Ok(())
    }

    async fn record_close(
        &self,
        side: PositionSide,
        amount: Decimal,
        exit_price: Decimal,
        avg_entry: Decimal,
        _timestamp: DateTime<Utc>,
    ) -> Result<CloseOutcome, LedgerError> {
        let realized_pnl = match side {
            PositionSide::Long => (exit_price - avg_entry) * amount * self.contract_multiplier,
            PositionSide::Short => (avg_entry - exit_price) * amount * self.contract_multiplier,
        };

        Ok(CloseOutcome {
            closed_amount: amount,
            realized_pnl,
            shortfall: Decimal::ZERO,
        })
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use crate::testutil::MemoryLots;

    use super::*;

    fn ledger(lots: Arc<MemoryLots>) -> SimLedger {
        SimLedger::new(lots, dec!(0.01), 10)
    }

    #[tokio::test]
    async fn test_fifo_close_across_lots() {
        // lot A: 1.0 @ 100, lot B: 2.0 @ 110 → 1.5 평가
        let lots = Arc::new(MemoryLots::default());
        let ledger = ledger(lots.clone());
        let now = Utc::now();

        ledger
            .record_open(PositionSide::Long, dec!(1.0), dec!(100), now)
            .await
            .unwrap();
        ledger
            .record_open(
                PositionSide::Long,
                dec!(2.0),
                dec!(110),
                now + chrono::Duration::seconds(1),
            )
            .await
            .unwrap();

        let outcome = ledger
            .record_close(PositionSide::Long, dec!(1.5), dec!(120), dec!(0), Utc::now())
            .await
            .unwrap();

        // 1.0은 lot A(100) 기준, 0.5는 lot B(110) 기준
        let expected =
            (dec!(120) - dec!(100)) * dec!(1.0) * dec!(0.01) + (dec!(120) - dec!(110)) * dec!(0.5) * dec!(0.01);
        assert_eq!(outcome.realized_pnl, expected);
        assert_eq!(outcome.closed_amount, dec!(1.5));
        assert_eq!(outcome.shortfall, dec!(0));

        // 남은 lot은 B 하나, 잔량 1.5 @ 110
        let remaining = lots.all_open_lots().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].amount, dec!(1.5));
        assert_eq!(remaining[0].entry_price, dec!(110));
    }

    #[tokio::test]
    async fn test_short_close_pnl_sign() {
        let lots = Arc::new(MemoryLots::default());
        let ledger = ledger(lots);

        ledger
            .record_open(PositionSide::Short, dec!(2.0), dec!(100), Utc::now())
            .await
            .unwrap();

        // 숏: 가격 하락 시 이익
        let outcome = ledger
            .record_close(PositionSide::Short, dec!(2.0), dec!(90), dec!(0), Utc::now())
            .await
            .unwrap();
        assert_eq!(outcome.realized_pnl, dec!(0.20));
    }

    #[tokio::test]
    async fn test_close_without_lots_skips() {
        let lots = Arc::new(MemoryLots::default());
        let ledger = ledger(lots);

        let outcome = ledger
            .record_close(PositionSide::Long, dec!(1.0), dec!(100), dec!(0), Utc::now())
            .await
            .unwrap();

        // 손익을 지어내지 않고 건너뛴다
        assert_eq!(outcome.closed_amount, dec!(0));
        assert_eq!(outcome.realized_pnl, dec!(0));
        assert_eq!(outcome.shortfall, dec!(1.0));
    }

    #[tokio::test]
    async fn test_close_shortfall_closes_what_exists() {
        let lots = Arc::new(MemoryLots::default());
        let ledger = ledger(lots.clone());

        ledger
            .record_open(PositionSide::Long, dec!(1.0), dec!(100), Utc::now())
            .await
            .unwrap();

        let outcome = ledger
            .record_close(PositionSide::Long, dec!(3.0), dec!(110), dec!(0), Utc::now())
            .await
            .unwrap();

        assert_eq!(outcome.closed_amount, dec!(1.0));
        assert_eq!(outcome.shortfall, dec!(2.0));
        assert!(lots.all_open_lots().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_current_position_weighted_average() {
        let lots = Arc::new(MemoryLots::default());
        let ledger = ledger(lots);
        let now = Utc::now();

        ledger
            .record_open(PositionSide::Long, dec!(1.0), dec!(100), now)
            .await
            .unwrap();
        ledger
            .record_open(
                PositionSide::Long,
                dec!(1.0),
                dec!(120),
                now + chrono::Duration::seconds(1),
            )
            .await
            .unwrap();

        let position = ledger.current_position().await.unwrap().unwrap();
        assert_eq!(position.entry_price, dec!(110));
        assert_eq!(position.size, dec!(2.0));
    }

    #[tokio::test]
    async fn test_live_ledger_close_pnl_from_average_entry() {
        use crate::testutil::MockGateway;

        let gateway = Arc::new(MockGateway::new(dec!(1000)));
        let ledger = LiveLedger::new(gateway, "BTC-USDT-SWAP", dec!(0.01));

        // 실거래 변형은 평균 진입가 기준으로 손익 계산
        let outcome = ledger
            .record_close(PositionSide::Long, dec!(2.0), dec!(105), dec!(100), Utc::now())
            .await
            .unwrap();
        assert_eq!(outcome.realized_pnl, dec!(0.10));
        assert_eq!(outcome.shortfall, dec!(0));

        let outcome = ledger
            .record_close(PositionSide::Short, dec!(2.0), dec!(105), dec!(100), Utc::now())
            .await
            .unwrap();
        assert_eq!(outcome.realized_pnl, dec!(-0.10));
    }

    #[tokio::test]
    async fn test_live_ledger_position_from_gateway() {
        use crate::testutil::MockGateway;

        // MockGateway는 포지션 없음을 보고
        let gateway = Arc::new(MockGateway::new(dec!(1000)));
        let ledger = LiveLedger::new(gateway, "BTC-USDT-SWAP", dec!(0.01));

        assert!(ledger.current_position().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_open_never_merges_lots() {
        let lots = Arc::new(MemoryLots::default());
        let ledger = ledger(lots.clone());

        ledger
            .record_open(PositionSide::Long, dec!(1.0), dec!(100), Utc::now())
            .await
            .unwrap();
        ledger
            .record_open(PositionSide::Long, dec!(1.0), dec!(100), Utc::now())
            .await
            .unwrap();

        assert_eq!(lots.all_open_lots().unwrap().len(), 2);
    }
}
