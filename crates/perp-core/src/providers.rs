//! 거래소 및 저장소 공급자 추상화.
//!
//! 재조정 엔진은 `OrderGateway` + `LotStore`/`AccountStore`/`TradeStore`
//! 조합 위에서 한 번만 작성되며, 시뮬레이션과 실거래는 구현체 교체로
//! 전환합니다. 와이어 프로토콜/인증은 이 crate의 범위 밖입니다.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::account::AccountSnapshot;
use crate::domain::position::{Lot, OrderSide, Position, PositionSide};
use crate::domain::record::TradeRecord;
use crate::domain::status::{AnalysisRecord, SystemStatus};

// =============================================================================
// 에러 타입
// =============================================================================

/// 거래소 게이트웨이 에러.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// 네트워크 연결 실패 (재시도 가능)
    #[error("네트워크 에러: {0}")]
    Network(String),

    /// 요청 타임아웃 (재시도 가능)
    #[error("타임아웃: {0}")]
    Timeout(String),

    /// 거래소 API 에러
    #[error("거래소 API 에러: {0}")]
    Api(String),

    /// 청산 대상 포지션이 거래소에 존재하지 않음
    #[error("청산할 포지션 없음: {0}")]
    NoPosition(String),

    /// 레버리지 설정 실패
    #[error("레버리지 설정 실패: {0}")]
    Leverage(String),
}

impl GatewayError {
    /// 재시도 가능 여부.
    pub fn is_retryable(&self) -> bool {
        matches!(self, GatewayError::Network(_) | GatewayError::Timeout(_))
    }

    /// "청산할 포지션 없음" 조건 여부.
    ///
    /// 재조정 엔진은 이 조건에서 직접 개시 폴백을 시도합니다.
    pub fn is_no_position(&self) -> bool {
        matches!(self, GatewayError::NoPosition(_))
    }
}

/// 영속 저장소 에러.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("입출력 에러: {0}")]
    Io(#[from] std::io::Error),

    #[error("직렬화 에러: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("레코드 없음: {0}")]
    NotFound(String),
}

// =============================================================================
// 주문 요청
// =============================================================================

/// 시장가 주문 요청.
#[derive(Debug, Clone)]
pub struct OrderRequest {
    /// 심볼
    pub symbol: String,
    /// 주문 방향
    pub side: OrderSide,
    /// 수량 (계약 단위)
    pub size: Decimal,
    /// 청산 전용 주문 여부 (신규 진입 금지)
    pub reduce_only: bool,
}

impl OrderRequest {
    /// 진입 주문 생성.
    pub fn entry(symbol: impl Into<String>, side: OrderSide, size: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            size,
            reduce_only: false,
        }
    }

    /// 청산 전용 주문 생성.
    pub fn reduce(symbol: impl Into<String>, side: OrderSide, size: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            size,
            reduce_only: true,
        }
    }
}

// =============================================================================
// OrderGateway Trait
// =============================================================================

/// 거래소 주문 게이트웨이 trait.
///
/// 재조정 엔진이 결정한 주문을 실행하는 부수 효과 경계입니다.
/// 시뮬레이션은 lot 저장소만 갱신하는 paper 구현을,
/// 실거래는 거래소 연동 구현을 주입합니다.
#[async_trait]
pub trait OrderGateway: Send + Sync {
    /// 시장가 주문 제출.
    ///
    /// # Errors
    ///
    /// - `GatewayError::NoPosition`: reduce-only 주문인데 청산할 포지션 없음
    /// - `GatewayError::Network` / `Timeout`: 일시적 실패 (재시도 가능)
    /// - `GatewayError::Api`: 거래소가 주문을 거부함
    async fn place_market_order(&self, request: &OrderRequest) -> Result<(), GatewayError>;

    /// 계좌 잔고 조회.
    async fn fetch_balance(&self) -> Result<AccountSnapshot, GatewayError>;

    /// 현재 포지션 조회. flat이면 `None`.
    async fn fetch_position(&self, symbol: &str) -> Result<Option<Position>, GatewayError>;

    /// 레버리지 설정.
    async fn set_leverage(&self, symbol: &str, leverage: u32) -> Result<(), GatewayError>;

    /// 게이트웨이 이름 (로깅용).
    fn gateway_name(&self) -> &str;
}

// =============================================================================
// 저장소 Trait
// =============================================================================

/// 열린 lot 저장소 (시뮬레이션 Ledger의 단일 진실 공급원).
///
/// 프로세스 재시작 후에도 열린 lot 집계만으로 현재 포지션을
/// 복원할 수 있어야 합니다. 메모리 전용 포지션 상태는 허용하지 않습니다.
pub trait LotStore: Send + Sync {
    /// 특정 방향의 열린 lot을 `opened_at` 오름차순(FIFO)으로 반환.
    fn open_lots(&self, side: PositionSide) -> Result<Vec<Lot>, StoreError>;

    /// 모든 열린 lot 반환.
    fn all_open_lots(&self) -> Result<Vec<Lot>, StoreError>;

    /// 새 lot 추가. 기존 lot과 병합하지 않습니다.
    fn append_open_lot(
        &self,
        side: PositionSide,
        amount: Decimal,
        entry_price: Decimal,
        opened_at: DateTime<Utc>,
    ) -> Result<Lot, StoreError>;

    /// lot 잔량 축소 (부분 청산).
    fn shrink_lot(&self, id: u64, new_amount: Decimal) -> Result<(), StoreError>;

    /// lot 제거 (전량 청산).
    fn remove_lot(&self, id: u64) -> Result<(), StoreError>;
}

/// 계좌 저장소.
pub trait AccountStore: Send + Sync {
    /// 현재 계좌 스냅샷 조회.
    fn account(&self) -> Result<AccountSnapshot, StoreError>;

    /// 잔고/평가자산 갱신.
    fn update_balance(&self, balance: Decimal, equity: Decimal) -> Result<(), StoreError>;
}

/// 거래/분석 기록 저장소.
pub trait TradeStore: Send + Sync {
    /// 거래 기록 저장.
    fn save_trade_record(&self, record: &TradeRecord) -> Result<(), StoreError>;

    /// AI 분석 기록 저장.
    fn save_analysis_record(&self, record: &AnalysisRecord) -> Result<(), StoreError>;

    /// 시스템 상태 갱신.
    fn update_system_status(&self, status: &SystemStatus) -> Result<(), StoreError>;
}
