//! 정규화된 트레이딩 시그널.
//!
//! LLM 출력은 `perp-signal`에서 정규화를 거쳐 이 타입으로 변환됩니다.
//! 생성 후에는 불변이며, 분석 주기마다 하나씩 롤링 히스토리에 추가됩니다.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 시그널 액션.
///
/// LLM이 사용하는 확장 어휘(`buy_to_enter` 등)는 정규화 단계에서
/// 이 네 가지 canonical 액션으로 축소됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalAction {
    /// 롱 진입 또는 롱 목표 포지션
    Buy,
    /// 숏 진입 또는 숏 목표 포지션
    Sell,
    /// 관망 (주문 없음)
    Hold,
    /// 현재 포지션 전량 청산
    Close,
}

impl SignalAction {
    /// 진입성 액션 여부 (BUY/SELL).
    pub fn is_entry(&self) -> bool {
        matches!(self, SignalAction::Buy | SignalAction::Sell)
    }
}

impl std::fmt::Display for SignalAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalAction::Buy => write!(f, "BUY"),
            SignalAction::Sell => write!(f, "SELL"),
            SignalAction::Hold => write!(f, "HOLD"),
            SignalAction::Close => write!(f, "CLOSE"),
        }
    }
}

/// 신뢰도 등급.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    /// [0, 1] 범위의 수치 신뢰도를 등급으로 변환.
    ///
    /// HIGH ≥ 0.7, MEDIUM ≥ 0.4, 그 외 LOW.
    pub fn from_score(score: f64) -> Self {
        if score >= 0.7 {
            Confidence::High
        } else if score >= 0.4 {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    }
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Confidence::High => write!(f, "HIGH"),
            Confidence::Medium => write!(f, "MEDIUM"),
            Confidence::Low => write!(f, "LOW"),
        }
    }
}

/// 정규화된 트레이딩 시그널.
///
/// # 불변조건
///
/// `action`이 BUY/SELL인 경우 `stop_loss`, `take_profit`, 현재가는
/// 서로 모두 달라야 하며 방향이 액션과 일치해야 합니다
/// (롱: stop < price < target, 숏: target < price < stop).
/// 이 검증은 정규화 단계(`perp-signal`)가 보장합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeSignal {
    /// 고유 시그널 ID
    pub id: Uuid,
    /// 액션
    pub action: SignalAction,
    /// 신뢰도
    pub confidence: Confidence,
    /// 판단 근거
    pub reason: String,
    /// 손절가
    pub stop_loss: Decimal,
    /// 익절가
    pub take_profit: Decimal,
    /// AI가 지시한 코인 수량 (AI 주도 사이징 전용)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<Decimal>,
    /// AI가 지시한 레버리지 (AI 주도 사이징 전용)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leverage: Option<u32>,
    /// 시그널 생성 시각
    pub timestamp: DateTime<Utc>,
    /// 폴백 시그널 여부 (재시도 래퍼가 소프트 실패로 취급)
    #[serde(default)]
    pub is_fallback: bool,
}

impl TradeSignal {
    /// 새 시그널 생성.
    pub fn new(
        action: SignalAction,
        confidence: Confidence,
        reason: impl Into<String>,
        stop_loss: Decimal,
        take_profit: Decimal,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            action,
            confidence,
            reason: reason.into(),
            stop_loss,
            take_profit,
            quantity: None,
            leverage: None,
            timestamp,
            is_fallback: false,
        }
    }

    /// AI 지시 수량/레버리지 설정.
    pub fn with_ai_plan(mut self, quantity: Option<Decimal>, leverage: Option<u32>) -> Self {
        self.quantity = quantity;
        self.leverage = leverage;
        self
    }

    /// 폴백 플래그 설정.
    pub fn as_fallback(mut self) -> Self {
        self.is_fallback = true;
        self
    }
}
