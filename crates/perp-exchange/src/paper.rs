//! Paper 게이트웨이.
//!
//! 시뮬레이션 모드에서 사용하는 주문 게이트웨이입니다.
//! 거래소 API를 호출하지 않으며, 주문은 로그만 남기고 성공으로 처리합니다.
//! 포지션 장부 갱신은 재조정 엔진의 Ledger 호출이 담당하므로
//! 여기서는 reduce-only 주문의 "청산할 포지션 없음" 조건만 검증합니다.

use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
};

use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::{info, warn};

use perp_core::{
    AccountSnapshot, AccountStore, GatewayError, LotStore, OrderGateway, OrderRequest, Position,
    StoreError,
};

/// 시뮬레이션용 paper 게이트웨이.
#[derive(Clone)]
pub struct PaperGateway {
    lots: Arc<dyn LotStore>,
    account: Arc<dyn AccountStore>,
    /// 마지막으로 설정된 레버리지 (기록용, 체결에는 영향 없음)
    leverage: Arc<AtomicU32>,
}

impl PaperGateway {
    /// 새 paper 게이트웨이 생성.
    pub fn new(lots: Arc<dyn LotStore>, account: Arc<dyn AccountStore>, leverage: u32) -> Self {
        Self {
            lots,
            account,
            leverage: Arc::new(AtomicU32::new(leverage)),
        }
    }

    fn store_err(e: StoreError) -> GatewayError {
        GatewayError::Api(format!("모의 저장소 접근 실패: {}", e))
    }
}

#[async_trait]
impl OrderGateway for PaperGateway {
    async fn place_market_order(&self, request: &OrderRequest) -> Result<(), GatewayError> {
        if request.size <= Decimal::ZERO {
            return Err(GatewayError::Api(format!(
                "유효하지 않은 주문 수량: {}",
                request.size
            )));
        }

        if request.reduce_only {
            // 실거래소와 동일하게, 청산 대상이 없으면 주문을 거부한다
            let lots = self.lots.all_open_lots().map_err(Self::store_err)?;
            if lots.is_empty() {
                warn!(symbol = %request.symbol, "reduce-only 주문이지만 열린 lot 없음");
                return Err(GatewayError::NoPosition(request.symbol.clone()));
            }
        }

        info!(
            symbol = %request.symbol,
            side = %request.side,
            size = %request.size,
            reduce_only = request.reduce_only,
            "[모의] 시장가 주문 체결"
        );
        Ok(())
    }

    async fn fetch_balance(&self) -> Result<AccountSnapshot, GatewayError> {
        self.account.account().map_err(Self::store_err)
    }

    async fn fetch_position(&self, _symbol: &str) -> Result<Option<Position>, GatewayError> {
        let lots = self.lots.all_open_lots().map_err(Self::store_err)?;
        Ok(Position::from_lots(
            &lots,
            self.leverage.load(Ordering::Relaxed),
        ))
    }

    async fn set_leverage(&self, symbol: &str, leverage: u32) -> Result<(), GatewayError> {
        self.leverage.store(leverage, Ordering::Relaxed);
        info!(symbol = %symbol, leverage = leverage, "[모의] 레버리지 설정 (기록만)");
        Ok(())
    }

    fn gateway_name(&self) -> &str {
        "paper"
    }
}
