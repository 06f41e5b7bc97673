//! 주문 게이트웨이 구현.
//!
//! 이 crate는 다음을 제공합니다:
//! - 시뮬레이션용 paper 게이트웨이 (거래소 호출 없음)
//! - 고정 백오프 기반 재시도 유틸리티
//!
//! 실거래 게이트웨이는 `perp_core::OrderGateway` trait을 구현하여
//! 주입하는 통합 지점입니다. 거래소 와이어 프로토콜과 인증은
//! 이 저장소의 범위 밖입니다.

pub mod paper;
pub mod retry;

pub use paper::PaperGateway;
pub use retry::{with_retry, RetryConfig};
