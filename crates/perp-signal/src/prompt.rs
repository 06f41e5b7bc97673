//! 프롬프트 구성.
//!
//! 시장 스냅샷과 포지션/계좌 컨텍스트를 LLM 프롬프트 텍스트로
//! 조립합니다. 템플릿 엔진 없이 `format!` 기반으로 구성합니다.

use rust_decimal::Decimal;

use perp_core::{AccountSnapshot, MarketSnapshot, Position, TradeSignal};

/// 프롬프트 구성 컨텍스트.
#[derive(Debug, Clone)]
pub struct PromptContext<'a> {
    /// 시장 스냅샷
    pub snapshot: &'a MarketSnapshot,
    /// 현재 포지션
    pub position: Option<&'a Position>,
    /// 계좌 스냅샷
    pub account: Option<&'a AccountSnapshot>,
    /// 직전 시그널
    pub last_signal: Option<&'a TradeSignal>,
    /// 데이터 주기 (예: "3m")
    pub timeframe: &'a str,
    /// 계약 승수 (미실현 손익 표기용)
    pub contract_multiplier: Decimal,
}

/// 렌더링된 프롬프트.
#[derive(Debug, Clone)]
pub struct RenderedPrompt {
    /// 시스템 메시지
    pub system: String,
    /// 사용자 메시지
    pub user: String,
}

/// 프롬프트 렌더링.
pub fn render_prompt(ctx: &PromptContext<'_>) -> RenderedPrompt {
    let snapshot = ctx.snapshot;

    // 최근 5개 캔들 요약
    let mut kline_text = format!("【최근 {}주기 캔들】\n", ctx.timeframe);
    let start = snapshot.recent_candles.len().saturating_sub(5);
    for (i, candle) in snapshot.recent_candles[start..].iter().enumerate() {
        let shape = if candle.is_bullish() { "양봉" } else { "음봉" };
        kline_text.push_str(&format!(
            "캔들{}: {} 시가 {:.2} 종가 {:.2} 등락 {:+.2}%\n",
            i + 1,
            shape,
            candle.open,
            candle.close,
            candle.change_pct()
        ));
    }

    let ind = &snapshot.indicators;
    let rsi_state = if ind.rsi > 70.0 {
        "과매수"
    } else if ind.rsi < 30.0 {
        "과매도"
    } else {
        "중립"
    };
    let technical_text = format!(
        "【기술 지표】\n\
         - RSI(14): {:.1} ({})\n\
         - EMA20: {:.2} / EMA50: {:.2}\n\
         - MACD: {:.2} / 시그널: {:.2} / 히스토그램: {:.2}\n\
         - 볼린저: 상단 {:.2} / 중심 {:.2} / 하단 {:.2}\n\
         - ATR(14): {:.2}\n\
         - 전체 추세: {} / 단기 추세: {} / MACD 방향: {}",
        ind.rsi,
        rsi_state,
        ind.ema20,
        ind.ema50,
        ind.macd,
        ind.macd_signal,
        ind.macd_histogram,
        ind.bb_upper,
        ind.bb_middle,
        ind.bb_lower,
        ind.atr,
        snapshot.trend.overall,
        snapshot.trend.short_term,
        snapshot.trend.macd_direction,
    );

    let signal_text = match ctx.last_signal {
        Some(last) => format!(
            "【직전 시그널】\n시그널: {} / 신뢰도: {}",
            last.action, last.confidence
        ),
        None => String::new(),
    };

    let position_text = match ctx.position {
        Some(p) => {
            let unrealized = p.unrealized_pnl(snapshot.price, ctx.contract_multiplier);
            format!(
                "{}포지션, 수량 {:.2}장, 진입가 {:.2}, 미실현 손익 {:+.2} USDT",
                p.side, p.size, p.entry_price, unrealized
            )
        }
        None => "무포지션".to_string(),
    };

    let account_text = match ctx.account {
        Some(a) => format!(
            "잔고 {:.2} USDT / 평가 자산 {:.2} USDT",
            a.balance, a.equity
        ),
        None => "조회 불가".to_string(),
    };

    let user = format!(
        "당신은 전문 암호화폐 트레이딩 분석가입니다. 아래 {symbol} {timeframe} 주기 데이터를 분석하세요.\n\
         \n\
         {kline_text}\n\
         {technical_text}\n\
         \n\
         {signal_text}\n\
         \n\
         【현재 시세】\n\
         - 현재가: ${price:.2}\n\
         - 시각: {timestamp}\n\
         - 캔들 고가: ${high:.2} / 저가: ${low:.2}\n\
         - 거래량: {volume:.2}\n\
         - 등락률: {change:+.2}%\n\
         - 현재 포지션: {position_text}\n\
         - 계좌: {account_text}\n\
         \n\
         【판단 원칙】\n\
         1. 기술 분석 주도: 추세, 지지/저항, 캔들 형태가 주 근거\n\
         2. 추세 지속성 우선: 단일 캔들이나 단기 변동으로 판단을 바꾸지 않음\n\
         3. 반전 확인: 2개 이상의 지표가 동시에 반전을 확인할 때만 방향 전환\n\
         4. 명확한 추세에는 즉시 행동, 좁은 횡보에서만 HOLD\n\
         \n\
         반드시 아래 JSON 형식으로만 답하세요:\n\
         {{\n\
             \"signal\": \"BUY|SELL|HOLD|CLOSE\",\n\
             \"reason\": \"추세 판단과 기술적 근거를 포함한 간결한 이유\",\n\
             \"stop_loss\": 구체적 가격,\n\
             \"take_profit\": 구체적 가격,\n\
             \"confidence\": \"HIGH|MEDIUM|LOW\",\n\
             \"quantity\": 코인 수량 (BUY/SELL 필수),\n\
             \"leverage\": 1-20 정수 (BUY/SELL 필수)\n\
         }}",
        symbol = snapshot.symbol,
        timeframe = ctx.timeframe,
        kline_text = kline_text,
        technical_text = technical_text,
        signal_text = signal_text,
        price = snapshot.price,
        timestamp = snapshot.timestamp.format("%Y-%m-%d %H:%M:%S"),
        high = snapshot.high,
        low = snapshot.low,
        volume = snapshot.volume,
        change = snapshot.price_change_pct,
        position_text = position_text,
        account_text = account_text,
    );

    let system = format!(
        "당신은 {} 주기 추세 분석에 특화된 전문 트레이더입니다. \
         캔들 형태와 기술 지표를 결합해 판단하고, JSON 형식 요구를 엄격히 지키세요.",
        ctx.timeframe
    );

    RenderedPrompt { system, user }
}
