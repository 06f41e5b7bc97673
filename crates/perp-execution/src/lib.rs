//! 포지션 재조정 및 주문 사이징.
//!
//! 이 crate는 거래 루프의 핵심 상태 기계를 제공합니다:
//! - 시그널 + 잔고 + 시장 상황을 목표 수량으로 변환하는 사이저
//! - FIFO lot 회계와 실현 손익 계산을 담당하는 Ledger
//! - 목표 포지션과 현재 포지션을 비교해 최소 주문 집합을 결정하는
//!   재조정 엔진 (open/add/reduce/close/flip + 증거금 검증)
//! - 재조정 결과를 감사 기록으로 변환하는 레코더
//!
//! 엔진은 `PositionLedger` + `OrderGateway` 조합 위에 한 번만 작성되며,
//! 시뮬레이션과 실거래는 구현체 주입으로 전환합니다.
//!
//! # 예제
//!
//! ```rust,ignore
//! use perp_execution::{EngineConfig, ReconcileEngine, SimLedger};
//!
//! let ledger = Arc::new(SimLedger::new(lot_store, multiplier, leverage));
//! let engine = ReconcileEngine::new(config, sizer, gateway, ledger, account, trades);
//! let report = engine.execute(&signal, &snapshot).await?;
//! ```

pub mod engine;
pub mod ledger;
pub mod recorder;
pub mod sizer;

#[cfg(test)]
mod testutil;

pub use engine::{EngineConfig, EngineError, ReconcileEngine, ReconcileOutcome, ReconcileReport};
pub use ledger::{CloseOutcome, LedgerError, LiveLedger, PositionLedger, SimLedger};
pub use recorder::{
    build_add_record, build_close_record, build_hold_record, build_open_record,
    build_reduce_record,
};
pub use sizer::{size_target, BudgetSizing, SizedTarget, SizerConfig, SizingError, SizingStrategy};
