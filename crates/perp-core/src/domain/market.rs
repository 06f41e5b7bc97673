//! 시장 데이터 스냅샷.
//!
//! 시장 데이터 수집과 지표 계산은 외부 협력자의 책임이며,
//! 코어 파이프라인은 이 스냅샷을 읽기 전용으로 소비합니다.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// OHLCV 캔들.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// 시작 시각
    pub timestamp: DateTime<Utc>,
    /// 시가
    pub open: Decimal,
    /// 고가
    pub high: Decimal,
    /// 저가
    pub low: Decimal,
    /// 종가
    pub close: Decimal,
    /// 거래량
    pub volume: Decimal,
}

impl Candle {
    /// 양봉 여부.
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    /// 시가 대비 등락률 (%).
    pub fn change_pct(&self) -> f64 {
        use rust_decimal::prelude::ToPrimitive;
        if self.open.is_zero() {
            return 0.0;
        }
        ((self.close - self.open) / self.open)
            .to_f64()
            .unwrap_or(0.0)
            * 100.0
    }
}

/// 사전 계산된 기술 지표 묶음.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSet {
    /// RSI(14)
    pub rsi: f64,
    /// EMA 20
    pub ema20: f64,
    /// EMA 50
    pub ema50: f64,
    /// MACD 라인
    pub macd: f64,
    /// MACD 시그널 라인
    pub macd_signal: f64,
    /// MACD 히스토그램
    pub macd_histogram: f64,
    /// 볼린저 상단
    pub bb_upper: f64,
    /// 볼린저 중심선
    pub bb_middle: f64,
    /// 볼린저 하단
    pub bb_lower: f64,
    /// ATR(14)
    pub atr: f64,
}

/// 추세 라벨.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendLabel {
    /// 강세 상승
    StrongUp,
    /// 강세 하락
    StrongDown,
    /// 횡보
    Range,
}

impl TrendLabel {
    /// 강한 방향성 여부 (포지션 사이징의 추세 배수에 사용).
    pub fn is_strong(&self) -> bool {
        matches!(self, TrendLabel::StrongUp | TrendLabel::StrongDown)
    }
}

impl std::fmt::Display for TrendLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrendLabel::StrongUp => write!(f, "강세 상승"),
            TrendLabel::StrongDown => write!(f, "강세 하락"),
            TrendLabel::Range => write!(f, "횡보"),
        }
    }
}

/// MACD 방향.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MacdDirection {
    Bullish,
    Bearish,
    Flat,
}

impl std::fmt::Display for MacdDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MacdDirection::Bullish => write!(f, "상승"),
            MacdDirection::Bearish => write!(f, "하락"),
            MacdDirection::Flat => write!(f, "중립"),
        }
    }
}

/// 추세 분석 결과.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendAnalysis {
    /// 전체 추세 (EMA 배열 기반)
    pub overall: TrendLabel,
    /// 단기 추세
    pub short_term: TrendLabel,
    /// MACD 방향
    pub macd_direction: MacdDirection,
}

/// 분석 주기마다 공급되는 시장 스냅샷.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSnapshot {
    /// 심볼 (예: "BTC-USDT-SWAP")
    pub symbol: String,
    /// 현재가
    pub price: Decimal,
    /// 현재 캔들 고가
    pub high: Decimal,
    /// 현재 캔들 저가
    pub low: Decimal,
    /// 현재 캔들 거래량
    pub volume: Decimal,
    /// 등락률 (%)
    pub price_change_pct: f64,
    /// 스냅샷 시각
    pub timestamp: DateTime<Utc>,
    /// 기술 지표
    pub indicators: IndicatorSet,
    /// 추세 분석
    pub trend: TrendAnalysis,
    /// 프롬프트용 최근 캔들 (최신이 마지막)
    pub recent_candles: Vec<Candle>,
}
