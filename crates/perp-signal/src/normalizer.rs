//! 시그널 정규화.
//!
//! 불투명한 LLM 완성 텍스트를 canonical `TradeSignal`로 변환합니다.
//! 호출자 계약: 절대 실패하지 않으며, 파싱/검증이 불가능하면
//! 결정적 폴백 시그널을 반환합니다.
//!
//! 처리 순서:
//! 1. 첫 `{`부터 마지막 `}`까지를 JSON으로 파싱
//! 2. 확장 액션 어휘(`buy_to_enter` 등)를 canonical 액션으로 축소
//! 3. 수치 신뢰도([0,1])를 HIGH/MEDIUM/LOW 등급으로 변환
//! 4. 필드 동의어 수용 (`justification`→`reason`, `profit_target`→`take_profit`)
//! 5. 필수 필드 존재 검증
//! 6. 손절/익절 기하 검증 및 ±2% 결정적 복구

use chrono::{DateTime, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::warn;

use perp_core::{Confidence, SignalAction, TradeSignal};

use crate::fallback::create_fallback_signal;

/// −2% / +2% 복구 배수.
fn pct_down(price: Decimal) -> Decimal {
    price * Decimal::new(98, 2)
}

fn pct_up(price: Decimal) -> Decimal {
    price * Decimal::new(102, 2)
}

/// 폴백 사유.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackReason {
    /// 응답에 JSON 객체가 없음
    NoJsonObject,
    /// JSON 파싱 실패
    ParseFailed,
    /// 필수 필드 누락
    MissingField(&'static str),
    /// 알 수 없는 액션 어휘
    UnknownAction(String),
    /// 신뢰도 해석 불가
    InvalidConfidence(String),
    /// 손절/익절 기하 퇴화 (복구 불가)
    DegenerateGeometry,
    /// LLM 호출 실패
    LlmFailure(String),
}

impl std::fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FallbackReason::NoJsonObject => write!(f, "응답에 JSON 객체 없음"),
            FallbackReason::ParseFailed => write!(f, "JSON 파싱 실패"),
            FallbackReason::MissingField(field) => write!(f, "필수 필드 누락: {}", field),
            FallbackReason::UnknownAction(raw) => write!(f, "알 수 없는 액션: {}", raw),
            FallbackReason::InvalidConfidence(raw) => write!(f, "신뢰도 해석 불가: {}", raw),
            FallbackReason::DegenerateGeometry => write!(f, "손절/익절 기하 퇴화"),
            FallbackReason::LlmFailure(msg) => write!(f, "LLM 호출 실패: {}", msg),
        }
    }
}

/// 정규화 결과.
///
/// 호출자는 원본 필드를 재검사하지 않고 이 합 타입으로 분기합니다.
#[derive(Debug, Clone)]
pub enum Normalized {
    /// 검증을 통과한 시그널
    Valid(TradeSignal),
    /// 폴백 시그널과 그 사유
    Fallback(TradeSignal, FallbackReason),
}

impl Normalized {
    /// 시그널 참조 (유효/폴백 공통).
    pub fn signal(&self) -> &TradeSignal {
        match self {
            Normalized::Valid(signal) => signal,
            Normalized::Fallback(signal, _) => signal,
        }
    }

    /// 시그널 소유권 이동.
    pub fn into_signal(self) -> TradeSignal {
        match self {
            Normalized::Valid(signal) => signal,
            Normalized::Fallback(signal, _) => signal,
        }
    }

    /// 폴백 여부.
    pub fn is_fallback(&self) -> bool {
        matches!(self, Normalized::Fallback(..))
    }
}

/// LLM 완성 텍스트를 정규화.
///
/// 절대 panic하거나 에러를 반환하지 않습니다.
pub fn normalize(raw: &str, price: Decimal, timestamp: DateTime<Utc>) -> Normalized {
    match try_parse(raw, price, timestamp) {
        Ok(signal) => Normalized::Valid(signal),
        Err(reason) => {
            warn!(reason = %reason, "시그널 정규화 실패 - 폴백 사용");
            Normalized::Fallback(create_fallback_signal(price, timestamp, &reason), reason)
        }
    }
}

fn try_parse(
    raw: &str,
    price: Decimal,
    timestamp: DateTime<Utc>,
) -> Result<TradeSignal, FallbackReason> {
    // 1. JSON 객체 추출: 첫 '{' 부터 마지막 '}' 까지
    let start = raw.find('{').ok_or(FallbackReason::NoJsonObject)?;
    let end = raw.rfind('}').ok_or(FallbackReason::NoJsonObject)?;
    if end < start {
        return Err(FallbackReason::NoJsonObject);
    }

    let value: Value =
        serde_json::from_str(&raw[start..=end]).map_err(|_| FallbackReason::ParseFailed)?;
    let obj = value.as_object().ok_or(FallbackReason::ParseFailed)?;

    // 2. 필수 필드 (동의어 수용)
    let action_raw = obj
        .get("signal")
        .and_then(Value::as_str)
        .ok_or(FallbackReason::MissingField("signal"))?;
    let action = map_action(action_raw)
        .ok_or_else(|| FallbackReason::UnknownAction(action_raw.to_string()))?;

    let reason = obj
        .get("reason")
        .or_else(|| obj.get("justification"))
        .and_then(Value::as_str)
        .ok_or(FallbackReason::MissingField("reason"))?;

    let stop_loss = obj
        .get("stop_loss")
        .and_then(json_decimal)
        .ok_or(FallbackReason::MissingField("stop_loss"))?;

    let take_profit = obj
        .get("take_profit")
        .or_else(|| obj.get("profit_target"))
        .and_then(json_decimal)
        .ok_or(FallbackReason::MissingField("take_profit"))?;

    let confidence = parse_confidence(
        obj.get("confidence")
            .ok_or(FallbackReason::MissingField("confidence"))?,
    )?;

    // 3. 기하 검증 및 복구
    let (stop_loss, take_profit) = validate_geometry(action, stop_loss, take_profit, price)?;

    // 4. 선택 필드 (검증은 사이저의 계약)
    let quantity = obj.get("quantity").and_then(json_decimal);
    let leverage = obj
        .get("leverage")
        .and_then(Value::as_f64)
        .map(|f| if f < 0.0 { 0 } else { f.trunc() as u32 });

    Ok(
        TradeSignal::new(action, confidence, reason, stop_loss, take_profit, timestamp)
            .with_ai_plan(quantity, leverage),
    )
}

/// 확장 액션 어휘를 canonical 액션으로 축소.
fn map_action(raw: &str) -> Option<SignalAction> {
    match raw.trim().to_uppercase().as_str() {
        "BUY" | "BUY_TO_ENTER" => Some(SignalAction::Buy),
        "SELL" | "SELL_TO_ENTER" => Some(SignalAction::Sell),
        "HOLD" => Some(SignalAction::Hold),
        "CLOSE" => Some(SignalAction::Close),
        _ => None,
    }
}

/// 신뢰도 파싱: 범주형은 그대로, [0,1] 수치는 등급으로 변환.
fn parse_confidence(value: &Value) -> Result<Confidence, FallbackReason> {
    if let Some(s) = value.as_str() {
        return match s.trim().to_uppercase().as_str() {
            "HIGH" => Ok(Confidence::High),
            "MEDIUM" => Ok(Confidence::Medium),
            "LOW" => Ok(Confidence::Low),
            other => other
                .parse::<f64>()
                .ok()
                .filter(|score| (0.0..=1.0).contains(score))
                .map(Confidence::from_score)
                .ok_or_else(|| FallbackReason::InvalidConfidence(s.to_string())),
        };
    }

    if let Some(score) = value.as_f64() {
        if (0.0..=1.0).contains(&score) {
            return Ok(Confidence::from_score(score));
        }
        return Err(FallbackReason::InvalidConfidence(score.to_string()));
    }

    Err(FallbackReason::InvalidConfidence(value.to_string()))
}

/// 손절/익절 기하 검증.
///
/// BUY/SELL 불변조건: 손절/익절/현재가는 서로 모두 다르고
/// 방향이 액션과 일치해야 한다 (롱: stop < price < target,
/// 숏: target < price < stop).
///
/// 복구 정책 (순서대로):
/// 1. 퇴화(stop == target 또는 현재가와 일치) + CLOSE 액션:
///    평가 의도를 유지한 채 ±2%로 복구
/// 2. 퇴화 + 그 외 액션: 폴백
/// 3. BUY/SELL에서 방향만 반대인 경우: ∓2% 결정적 복구
fn validate_geometry(
    action: SignalAction,
    stop_loss: Decimal,
    take_profit: Decimal,
    price: Decimal,
) -> Result<(Decimal, Decimal), FallbackReason> {
    let degenerate = stop_loss == take_profit || stop_loss == price || take_profit == price;

    match action {
        SignalAction::Hold => Ok((stop_loss, take_profit)),
        SignalAction::Close => {
            if degenerate {
                warn!(
                    stop_loss = %stop_loss,
                    take_profit = %take_profit,
                    price = %price,
                    "CLOSE 시그널의 퇴화 기하 - ±2%로 복구"
                );
                Ok((pct_down(price), pct_up(price)))
            } else {
                Ok((stop_loss, take_profit))
            }
        }
        SignalAction::Buy => {
            if degenerate {
                return Err(FallbackReason::DegenerateGeometry);
            }
            if stop_loss < price && price < take_profit {
                Ok((stop_loss, take_profit))
            } else {
                warn!(
                    stop_loss = %stop_loss,
                    take_profit = %take_profit,
                    price = %price,
                    "롱 시그널의 역방향 기하 - -2%/+2%로 복구"
                );
                Ok((pct_down(price), pct_up(price)))
            }
        }
        SignalAction::Sell => {
            if degenerate {
                return Err(FallbackReason::DegenerateGeometry);
            }
            if take_profit < price && price < stop_loss {
                Ok((stop_loss, take_profit))
            } else {
                warn!(
                    stop_loss = %stop_loss,
                    take_profit = %take_profit,
                    price = %price,
                    "숏 시그널의 역방향 기하 - +2%/-2%로 복구"
                );
                Ok((pct_up(price), pct_down(price)))
            }
        }
    }
}

fn json_decimal(value: &Value) -> Option<Decimal> {
    if let Some(f) = value.as_f64() {
        Decimal::from_f64(f)
    } else if let Some(s) = value.as_str() {
        s.trim().parse().ok()
    } else {
        None
    }
}
