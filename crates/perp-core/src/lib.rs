//! 거래소 중립 도메인 타입과 공급자 추상화.
//!
//! 이 crate는 트레이딩 루프 전체에서 공유하는 타입을 정의합니다:
//! - 정규화된 트레이딩 시그널 (`TradeSignal`)
//! - 포지션 및 FIFO lot (`Position`, `Lot`)
//! - 감사용 거래 기록 (`TradeRecord`)
//! - 계좌/시장 스냅샷 (`AccountSnapshot`, `MarketSnapshot`)
//! - 거래소 및 저장소 공급자 trait (`OrderGateway`, `LotStore` 등)
//!
//! 실행 로직은 `perp-execution`, 시그널 정규화는 `perp-signal`에 있습니다.

pub mod domain;
pub mod providers;

pub use domain::account::AccountSnapshot;
pub use domain::market::{
    Candle, IndicatorSet, MacdDirection, MarketSnapshot, TrendAnalysis, TrendLabel,
};
pub use domain::position::{Lot, OrderSide, Position, PositionSide};
pub use domain::record::{PositionAction, TradeMode, TradeRecord};
pub use domain::signal::{Confidence, SignalAction, TradeSignal};
pub use domain::status::{AnalysisRecord, MarketStatusInfo, SignalSummary, SystemStatus};
pub use providers::{
    AccountStore, GatewayError, LotStore, OrderGateway, OrderRequest, StoreError, TradeStore,
};
