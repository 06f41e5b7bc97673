//! 지표 스냅샷 빌더.
//!
//! 캔들 시계열을 파이프라인이 소비하는 `MarketSnapshot`으로 변환합니다.
//! 코어 파이프라인은 이 스냅샷을 사전 계산된 읽기 전용 입력으로만
//! 취급하며, 지표를 재계산하지 않습니다.

use rust_decimal::prelude::ToPrimitive;
use ta::indicators::{
    AverageTrueRange, BollingerBands, ExponentialMovingAverage,
    MovingAverageConvergenceDivergence, RelativeStrengthIndex,
};
use ta::{DataItem, Next};

use perp_core::{
    Candle, IndicatorSet, MacdDirection, MarketSnapshot, TrendAnalysis, TrendLabel,
};

use crate::error::DataError;

/// 지표 워밍업에 필요한 최소 캔들 수.
pub const MIN_CANDLES: usize = 60;

/// 프롬프트에 포함할 최근 캔들 수.
const RECENT_CANDLES: usize = 5;

fn to_f64(value: rust_decimal::Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

fn indicator_err<E: std::fmt::Display>(e: E) -> DataError {
    DataError::Indicator(e.to_string())
}

/// 캔들 시계열로 시장 스냅샷 구성.
///
/// EMA 20/50, RSI(14), MACD(12,26,9), 볼린저(20,2), ATR(14)을
/// 계산하고 EMA 배열과 MACD 히스토그램으로 추세 라벨을 붙입니다.
/// 캔들은 오래된 것부터 정렬되어 있어야 합니다.
pub fn build_snapshot(symbol: &str, candles: &[Candle]) -> Result<MarketSnapshot, DataError> {
    if candles.len() < MIN_CANDLES {
        return Err(DataError::NotEnoughCandles {
            got: candles.len(),
            min: MIN_CANDLES,
        });
    }

    let mut ema20 = ExponentialMovingAverage::new(20).map_err(indicator_err)?;
    let mut ema50 = ExponentialMovingAverage::new(50).map_err(indicator_err)?;
    let mut rsi = RelativeStrengthIndex::new(14).map_err(indicator_err)?;
    let mut macd = MovingAverageConvergenceDivergence::new(12, 26, 9).map_err(indicator_err)?;
    let mut bollinger = BollingerBands::new(20, 2.0).map_err(indicator_err)?;
    let mut atr = AverageTrueRange::new(14).map_err(indicator_err)?;

    let mut ema20_value = 0.0;
    let mut ema50_value = 0.0;
    let mut rsi_value = 50.0;
    let mut macd_value = 0.0;
    let mut macd_signal = 0.0;
    let mut macd_histogram = 0.0;
    let mut bb_upper = 0.0;
    let mut bb_middle = 0.0;
    let mut bb_lower = 0.0;
    let mut atr_value = 0.0;

    for candle in candles {
        let close = to_f64(candle.close);

        ema20_value = ema20.next(close);
        ema50_value = ema50.next(close);
        rsi_value = rsi.next(close);

        let macd_out = macd.next(close);
        macd_value = macd_out.macd;
        macd_signal = macd_out.signal;
        macd_histogram = macd_out.histogram;

        let bb_out = bollinger.next(close);
        bb_upper = bb_out.upper;
        bb_middle = bb_out.average;
        bb_lower = bb_out.lower;

        // ATR은 고가/저가가 필요: 캔들 검증 실패 시 종가만으로 대체
        atr_value = match DataItem::builder()
            .open(to_f64(candle.open))
            .high(to_f64(candle.high))
            .low(to_f64(candle.low))
            .close(close)
            .volume(to_f64(candle.volume))
            .build()
        {
            Ok(item) => atr.next(&item),
            Err(_) => atr.next(close),
        };
    }

    // unwrap 불가: 길이는 위에서 검증됨
    let last = &candles[candles.len() - 1];
    let prev = &candles[candles.len() - 2];
    let price = to_f64(last.close);

    let price_change_pct = {
        let prev_close = to_f64(prev.close);
        if prev_close == 0.0 {
            0.0
        } else {
            (price - prev_close) / prev_close * 100.0
        }
    };

    // EMA 배열 기반 추세 라벨
    let overall = if price > ema20_value && ema20_value > ema50_value {
        TrendLabel::StrongUp
    } else if price < ema20_value && ema20_value < ema50_value {
        TrendLabel::StrongDown
    } else {
        TrendLabel::Range
    };

    let short_term = if price > ema20_value {
        TrendLabel::StrongUp
    } else if price < ema20_value {
        TrendLabel::StrongDown
    } else {
        TrendLabel::Range
    };

    let macd_direction = if macd_histogram > 0.0 {
        MacdDirection::Bullish
    } else if macd_histogram < 0.0 {
        MacdDirection::Bearish
    } else {
        MacdDirection::Flat
    };

    let recent_start = candles.len().saturating_sub(RECENT_CANDLES);

    Ok(MarketSnapshot {
        symbol: symbol.to_string(),
        price: last.close,
        high: last.high,
        low: last.low,
        volume: last.volume,
        price_change_pct,
        timestamp: last.timestamp,
        indicators: IndicatorSet {
            rsi: rsi_value,
            ema20: ema20_value,
            ema50: ema50_value,
            macd: macd_value,
            macd_signal,
            macd_histogram,
            bb_upper,
            bb_middle,
            bb_lower,
            atr: atr_value,
        },
        trend: TrendAnalysis {
            overall,
            short_term,
            macd_direction,
        },
        recent_candles: candles[recent_start..].to_vec(),
    })
}
