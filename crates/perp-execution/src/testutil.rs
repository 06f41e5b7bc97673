//! 테스트 전용 인메모리 저장소/게이트웨이 구현.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use perp_core::{
    AccountSnapshot, AccountStore, AnalysisRecord, GatewayError, Lot, LotStore, OrderGateway,
    OrderRequest, Position, PositionSide, StoreError, SystemStatus, TradeRecord, TradeStore,
};

/// 인메모리 lot 저장소.
#[derive(Default)]
pub struct MemoryLots {
    lots: Mutex<Vec<Lot>>,
    next_id: Mutex<u64>,
}

impl LotStore for MemoryLots {
    fn open_lots(&self, side: PositionSide) -> Result<Vec<Lot>, StoreError> {
        let mut lots: Vec<Lot> = self
            .lots
            .lock()
            .unwrap()
            .iter()
            .filter(|l| l.side == side)
            .cloned()
            .collect();
        lots.sort_by_key(|l| l.opened_at);
        Ok(lots)
    }

    fn all_open_lots(&self) -> Result<Vec<Lot>, StoreError> {
        Ok(self.lots.lock().unwrap().clone())
    }

    fn append_open_lot(
        &self,
        side: PositionSide,
        amount: Decimal,
        entry_price: Decimal,
        opened_at: DateTime<Utc>,
    ) -> Result<Lot, StoreError> {
        let mut next_id = self.next_id.lock().unwrap();
        *next_id += 1;
        let lot = Lot {
            id: *next_id,
            side,
            amount,
            entry_price,
            opened_at,
        };
        self.lots.lock().unwrap().push(lot.clone());
        Ok(lot)
    }

    fn shrink_lot(&self, id: u64, new_amount: Decimal) -> Result<(), StoreError> {
        let mut lots = self.lots.lock().unwrap();
        let lot = lots
            .iter_mut()
            .find(|l| l.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("lot {}", id)))?;
        lot.amount = new_amount;
        Ok(())
    }

    fn remove_lot(&self, id: u64) -> Result<(), StoreError> {
        self.lots.lock().unwrap().retain(|l| l.id != id);
        Ok(())
    }
}

/// 인메모리 계좌 저장소.
pub struct MemoryAccount {
    balance: Mutex<(Decimal, Decimal)>,
}

impl MemoryAccount {
    pub fn new(balance: Decimal) -> Self {
        Self {
            balance: Mutex::new((balance, balance)),
        }
    }
}

impl AccountStore for MemoryAccount {
    fn account(&self) -> Result<AccountSnapshot, StoreError> {
        let (balance, equity) = *self.balance.lock().unwrap();
        Ok(AccountSnapshot {
            balance,
            equity,
            used_margin: Decimal::ZERO,
        })
    }

    fn update_balance(&self, balance: Decimal, equity: Decimal) -> Result<(), StoreError> {
        *self.balance.lock().unwrap() = (balance, equity);
        Ok(())
    }
}

/// 인메모리 거래/분석 기록 저장소.
#[derive(Default)]
pub struct MemoryTrades {
    pub records: Mutex<Vec<TradeRecord>>,
    pub analyses: Mutex<Vec<AnalysisRecord>>,
}

impl TradeStore for MemoryTrades {
    fn save_trade_record(&self, record: &TradeRecord) -> Result<(), StoreError> {
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }

    fn save_analysis_record(&self, record: &AnalysisRecord) -> Result<(), StoreError> {
        self.analyses.lock().unwrap().push(record.clone());
        Ok(())
    }

    fn update_system_status(&self, _status: &SystemStatus) -> Result<(), StoreError> {
        Ok(())
    }
}

/// 호출 기록을 남기는 목 게이트웨이.
pub struct MockGateway {
    pub orders: Mutex<Vec<OrderRequest>>,
    pub balance: Decimal,
    /// n번째 주문 시도를 실패시키는 스크립트 (0-기반 시도 인덱스, 에러)
    pub fail_at: Mutex<Option<(usize, GatewayError)>>,
    pub attempts: Mutex<usize>,
    pub leverage_calls: Mutex<Vec<u32>>,
}

impl MockGateway {
    pub fn new(balance: Decimal) -> Self {
        Self {
            orders: Mutex::new(Vec::new()),
            balance,
            fail_at: Mutex::new(None),
            attempts: Mutex::new(0),
            leverage_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_order(&self, attempt: usize, error: GatewayError) {
        *self.fail_at.lock().unwrap() = Some((attempt, error));
    }

    pub fn order_count(&self) -> usize {
        self.orders.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl OrderGateway for MockGateway {
    async fn place_market_order(&self, request: &OrderRequest) -> Result<(), GatewayError> {
        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            let current = *attempts;
            *attempts += 1;
            current
        };
        if let Some((fail_index, error)) = self.fail_at.lock().unwrap().as_ref() {
            if *fail_index == attempt {
                return Err(error.clone());
            }
        }
        self.orders.lock().unwrap().push(request.clone());
        Ok(())
    }

    async fn fetch_balance(&self) -> Result<AccountSnapshot, GatewayError> {
        Ok(AccountSnapshot::from_balance(self.balance))
    }

    async fn fetch_position(&self, _symbol: &str) -> Result<Option<Position>, GatewayError> {
        Ok(None)
    }

    async fn set_leverage(&self, _symbol: &str, leverage: u32) -> Result<(), GatewayError> {
        self.leverage_calls.lock().unwrap().push(leverage);
        Ok(())
    }

    fn gateway_name(&self) -> &str {
        "mock"
    }
}
