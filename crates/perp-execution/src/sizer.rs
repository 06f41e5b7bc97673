//! 포지션 사이저.
//!
//! 시그널을 목표 수량(계약 단위)으로 변환합니다. 두 전략이 있습니다:
//!
//! - **AI 주도**: 시그널의 quantity(코인)/leverage를 그대로 신뢰하되
//!   엄격히 검증합니다. 검증 실패는 하드 스톱이며, 추정값으로
//!   대체하지 않습니다.
//! - **예산 기반**: 기본 USDT 투입액에 신뢰도/추세/RSI 배수를 적용하고
//!   잔고 비율로 상한을 둡니다.
//!
//! 두 전략 모두 최종 수량을 거래소 최소 단위(0.01장)로 반올림합니다.

use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{info, warn};

use perp_core::{Confidence, MarketSnapshot, TradeSignal};

/// 사이징 에러. 모두 하드 스톱이며 주문과 장부 변경을 금지합니다.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SizingError {
    #[error("AI 전략 무효: quantity 필드 누락")]
    MissingQuantity,

    #[error("AI 전략 무효: quantity 값 무효 ({0})")]
    InvalidQuantity(Decimal),

    #[error("AI 전략 무효: leverage 필드 누락")]
    MissingLeverage,

    #[error("AI 전략 무효: leverage 값이 유효 범위(1-20) 밖 ({0})")]
    LeverageOutOfRange(u32),

    #[error("AI 전략 무효: quantity({coins}코인) 변환 후 수량({contracts}장)이 상한({ceiling}장) 초과")]
    OversizedPosition {
        coins: Decimal,
        contracts: Decimal,
        ceiling: Decimal,
    },
}

/// 예산 기반 사이징 설정.
#[derive(Debug, Clone)]
pub struct BudgetSizing {
    /// USDT 투입 기준액
    pub base_usdt: Decimal,
    /// HIGH 신뢰도 배수
    pub high_confidence_multiplier: Decimal,
    /// MEDIUM 신뢰도 배수
    pub medium_confidence_multiplier: Decimal,
    /// LOW 신뢰도 배수
    pub low_confidence_multiplier: Decimal,
    /// 강한 추세 배수
    pub trend_strength_multiplier: Decimal,
    /// RSI 과열 구간(>75 또는 <25) 축소 배수
    pub rsi_extreme_multiplier: Decimal,
    /// 잔고 대비 단일 포지션 상한 비율
    pub max_position_ratio: Decimal,
    /// 이 전략에서 사용할 레버리지
    pub leverage: u32,
}

impl Default for BudgetSizing {
    fn default() -> Self {
        Self {
            base_usdt: Decimal::from(100),
            high_confidence_multiplier: Decimal::new(15, 1),  // 1.5
            medium_confidence_multiplier: Decimal::ONE,
            low_confidence_multiplier: Decimal::new(5, 1),    // 0.5
            trend_strength_multiplier: Decimal::new(12, 1),   // 1.2
            rsi_extreme_multiplier: Decimal::new(7, 1),       // 0.7
            max_position_ratio: Decimal::new(1, 1),           // 10%
            leverage: 10,
        }
    }
}

/// 사이징 전략.
#[derive(Debug, Clone)]
pub enum SizingStrategy {
    /// AI가 지시한 quantity/leverage를 검증 후 그대로 사용
    AiDirected,
    /// USDT 예산 공식 기반
    Budget(BudgetSizing),
}

/// 사이저 설정.
#[derive(Debug, Clone)]
pub struct SizerConfig {
    /// 계약 승수 (1장당 코인 수량, 예: 0.01 BTC)
    pub contract_multiplier: Decimal,
    /// 거래소 최소 수량 (장)
    pub min_contracts: Decimal,
    /// 단위 혼동 방어용 상한 (장)
    pub max_contracts: Decimal,
    /// 전략
    pub strategy: SizingStrategy,
}

impl Default for SizerConfig {
    fn default() -> Self {
        Self {
            contract_multiplier: Decimal::new(1, 2), // 0.01
            min_contracts: Decimal::new(1, 2),       // 0.01
            max_contracts: Decimal::from(1000),
            strategy: SizingStrategy::AiDirected,
        }
    }
}

/// 사이징 결과.
#[derive(Debug, Clone, PartialEq)]
pub struct SizedTarget {
    /// 목표 수량 (계약 단위)
    pub contracts: Decimal,
    /// 적용 레버리지
    pub leverage: u32,
}

/// 시그널을 목표 수량으로 변환.
pub fn size_target(
    config: &SizerConfig,
    signal: &TradeSignal,
    snapshot: &MarketSnapshot,
    balance: Decimal,
) -> Result<SizedTarget, SizingError> {
    match &config.strategy {
        SizingStrategy::AiDirected => size_ai_directed(config, signal),
        SizingStrategy::Budget(budget) => Ok(size_budget(config, budget, signal, snapshot, balance)),
    }
}

/// AI 주도 사이징.
///
/// quantity는 코인 수량이므로 계약 승수로 나눠 계약 단위로 변환합니다.
/// 변환 후 수량이 상한을 넘으면 상류 모델의 단위 혼동으로 간주하고
/// 하드 스톱합니다 (조용한 클램프 금지).
fn size_ai_directed(config: &SizerConfig, signal: &TradeSignal) -> Result<SizedTarget, SizingError> {
    let quantity = signal.quantity.ok_or(SizingError::MissingQuantity)?;
    if quantity <= Decimal::ZERO {
        return Err(SizingError::InvalidQuantity(quantity));
    }

    let leverage = signal.leverage.ok_or(SizingError::MissingLeverage)?;
    if !(1..=20).contains(&leverage) {
        return Err(SizingError::LeverageOutOfRange(leverage));
    }

    let contracts = quantity / config.contract_multiplier;
    if contracts > config.max_contracts {
        return Err(SizingError::OversizedPosition {
            coins: quantity,
            contracts: contracts.round_dp(2),
            ceiling: config.max_contracts,
        });
    }

    let mut contracts = contracts.round_dp(2);
    if contracts < config.min_contracts {
        warn!(
            contracts = %contracts,
            min = %config.min_contracts,
            "AI 수량이 최소 단위 미만 - 최소값으로 조정"
        );
        contracts = config.min_contracts;
    }

    info!(
        coins = %quantity,
        contracts = %contracts,
        leverage = leverage,
        "AI 지시 수량 사용"
    );

    Ok(SizedTarget {
        contracts,
        leverage,
    })
}

/// 예산 기반 사이징.
///
/// 목표 USDT = 기준액 × 신뢰도 배수 × 추세 배수 × RSI 배수를
/// 잔고 × 상한 비율로 캡한 뒤 계약 단위로 변환합니다.
fn size_budget(
    config: &SizerConfig,
    budget: &BudgetSizing,
    signal: &TradeSignal,
    snapshot: &MarketSnapshot,
    balance: Decimal,
) -> SizedTarget {
    let confidence_multiplier = match signal.confidence {
        Confidence::High => budget.high_confidence_multiplier,
        Confidence::Medium => budget.medium_confidence_multiplier,
        Confidence::Low => budget.low_confidence_multiplier,
    };

    let trend_multiplier = if snapshot.trend.overall.is_strong() {
        budget.trend_strength_multiplier
    } else {
        Decimal::ONE
    };

    let rsi = snapshot.indicators.rsi;
    let rsi_multiplier = if rsi > 75.0 || rsi < 25.0 {
        budget.rsi_extreme_multiplier
    } else {
        Decimal::ONE
    };

    let suggested_usdt =
        budget.base_usdt * confidence_multiplier * trend_multiplier * rsi_multiplier;
    let max_usdt = balance * budget.max_position_ratio;
    let final_usdt = suggested_usdt.min(max_usdt);

    // 계약 수량 = 투입 USDT / (가격 × 계약 승수)
    let mut contracts = (final_usdt / (snapshot.price * config.contract_multiplier)).round_dp(2);
    if contracts < config.min_contracts {
        contracts = config.min_contracts;
    }

    info!(
        suggested_usdt = %suggested_usdt,
        final_usdt = %final_usdt,
        confidence_multiplier = %confidence_multiplier,
        trend_multiplier = %trend_multiplier,
        rsi_multiplier = %rsi_multiplier,
        contracts = %contracts,
        "예산 기반 수량 계산"
    );

    SizedTarget {
        contracts,
        leverage: budget.leverage,
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use perp_core::{
        Confidence, IndicatorSet, MacdDirection, SignalAction, TradeSignal, TrendAnalysis,
        TrendLabel,
    };
    use rust_decimal_macros::dec;

    use super::*;

    fn snapshot(price: Decimal, rsi: f64, overall: TrendLabel) -> MarketSnapshot {
        MarketSnapshot {
            symbol: "BTC-USDT-SWAP".to_string(),
            price,
            high: price,
            low: price,
            volume: dec!(100),
            price_change_pct: 0.0,
            timestamp: Utc::now(),
            indicators: IndicatorSet {
                rsi,
                ema20: 0.0,
                ema50: 0.0,
                macd: 0.0,
                macd_signal: 0.0,
                macd_histogram: 0.0,
                bb_upper: 0.0,
                bb_middle: 0.0,
                bb_lower: 0.0,
                atr: 0.0,
            },
            trend: TrendAnalysis {
                overall,
                short_term: overall,
                macd_direction: MacdDirection::Flat,
            },
            recent_candles: Vec::new(),
        }
    }

    fn buy_signal(quantity: Option<Decimal>, leverage: Option<u32>) -> TradeSignal {
        TradeSignal::new(
            SignalAction::Buy,
            Confidence::High,
            "테스트",
            dec!(98000),
            dec!(102000),
            Utc::now(),
        )
        .with_ai_plan(quantity, leverage)
    }

    #[test]
    fn test_ai_directed_converts_coins_to_contracts() {
        let config = SizerConfig::default();
        let signal = buy_signal(Some(dec!(0.02)), Some(10));
        let snapshot = snapshot(dec!(100000), 50.0, TrendLabel::Range);

        let target = size_target(&config, &signal, &snapshot, dec!(1000)).unwrap();
        // 0.02 BTC / 0.01 = 2장
        assert_eq!(target.contracts, dec!(2));
        assert_eq!(target.leverage, 10);
    }

    #[test]
    fn test_ai_directed_missing_quantity_is_hard_stop() {
        let config = SizerConfig::default();
        let signal = buy_signal(None, Some(10));
        let snapshot = snapshot(dec!(100000), 50.0, TrendLabel::Range);

        assert_eq!(
            size_target(&config, &signal, &snapshot, dec!(1000)),
            Err(SizingError::MissingQuantity)
        );
    }

    #[test]
    fn test_ai_directed_negative_quantity_is_hard_stop() {
        let config = SizerConfig::default();
        let signal = buy_signal(Some(dec!(-5)), Some(10));
        let snapshot = snapshot(dec!(100000), 50.0, TrendLabel::Range);

        assert!(matches!(
            size_target(&config, &signal, &snapshot, dec!(1000)),
            Err(SizingError::InvalidQuantity(_))
        ));
    }

    #[test]
    fn test_ai_directed_leverage_range() {
        let config = SizerConfig::default();
        let snapshot = snapshot(dec!(100000), 50.0, TrendLabel::Range);

        let too_high = buy_signal(Some(dec!(0.02)), Some(25));
        assert_eq!(
            size_target(&config, &too_high, &snapshot, dec!(1000)),
            Err(SizingError::LeverageOutOfRange(25))
        );

        let zero = buy_signal(Some(dec!(0.02)), Some(0));
        assert_eq!(
            size_target(&config, &zero, &snapshot, dec!(1000)),
            Err(SizingError::LeverageOutOfRange(0))
        );

        let missing = buy_signal(Some(dec!(0.02)), None);
        assert_eq!(
            size_target(&config, &missing, &snapshot, dec!(1000)),
            Err(SizingError::MissingLeverage)
        );
    }

    #[test]
    fn test_ai_directed_oversize_guard() {
        // 단위 혼동 (코인 대신 장 수를 넘긴 경우): 15 / 0.01 = 1500장 > 1000장
        let config = SizerConfig::default();
        let signal = buy_signal(Some(dec!(15)), Some(10));
        let snapshot = snapshot(dec!(100000), 50.0, TrendLabel::Range);

        assert!(matches!(
            size_target(&config, &signal, &snapshot, dec!(1000)),
            Err(SizingError::OversizedPosition { .. })
        ));
    }

    #[test]
    fn test_ai_directed_below_minimum_raised() {
        let config = SizerConfig::default();
        let signal = buy_signal(Some(dec!(0.00003)), Some(10));
        let snapshot = snapshot(dec!(100000), 50.0, TrendLabel::Range);

        let target = size_target(&config, &signal, &snapshot, dec!(1000)).unwrap();
        assert_eq!(target.contracts, dec!(0.01));
    }

    #[test]
    fn test_budget_multipliers() {
        let config = SizerConfig {
            strategy: SizingStrategy::Budget(BudgetSizing::default()),
            ..Default::default()
        };
        // HIGH(1.5) × 강세(1.2) × RSI 정상(1.0) = 180 USDT, 잔고 10000의 10% 캡(1000) 미만
        let signal = buy_signal(None, None);
        let snapshot = snapshot(dec!(100000), 50.0, TrendLabel::StrongUp);

        let target = size_target(&config, &signal, &snapshot, dec!(10000)).unwrap();
        // 180 / (100000 × 0.01) = 0.18장
        assert_eq!(target.contracts, dec!(0.18));
        assert_eq!(target.leverage, 10);
    }

    #[test]
    fn test_budget_rsi_extreme_reduces_size() {
        let config = SizerConfig {
            strategy: SizingStrategy::Budget(BudgetSizing::default()),
            ..Default::default()
        };
        let signal = buy_signal(None, None);
        let snapshot = snapshot(dec!(100000), 80.0, TrendLabel::Range);

        let target = size_target(&config, &signal, &snapshot, dec!(10000)).unwrap();
        // 100 × 1.5 × 1.0 × 0.7 = 105 USDT → 0.105장 → 0.10장 (은행가 반올림)
        assert_eq!(target.contracts, dec!(0.10));
    }

    #[test]
    fn test_budget_balance_ratio_cap() {
        let config = SizerConfig {
            strategy: SizingStrategy::Budget(BudgetSizing::default()),
            ..Default::default()
        };
        // 잔고 500 → 캡 50 USDT < 제안 150 USDT
        let signal = buy_signal(None, None);
        let snapshot = snapshot(dec!(100000), 50.0, TrendLabel::Range);

        let target = size_target(&config, &signal, &snapshot, dec!(500)).unwrap();
        // 50 / 1000 = 0.05장
        assert_eq!(target.contracts, dec!(0.05));
    }
}
