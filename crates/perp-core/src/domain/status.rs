//! 대시보드용 시스템 상태 및 AI 분석 기록.
//!
//! 웹 대시보드 자체는 이 저장소의 범위 밖이며,
//! 여기서는 대시보드가 읽는 영속 shape만 정의합니다.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::account::AccountSnapshot;
use super::position::{Position, PositionSide};
use super::record::TradeMode;
use super::signal::{Confidence, SignalAction, TradeSignal};

/// 대시보드용 시그널 요약.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalSummary {
    pub signal: SignalAction,
    pub confidence: Confidence,
    pub reason: String,
    pub stop_loss: Decimal,
    pub take_profit: Decimal,
}

impl From<&TradeSignal> for SignalSummary {
    fn from(signal: &TradeSignal) -> Self {
        Self {
            signal: signal.action,
            confidence: signal.confidence,
            reason: signal.reason.clone(),
            stop_loss: signal.stop_loss,
            take_profit: signal.take_profit,
        }
    }
}

/// 대시보드용 시세 요약.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketStatusInfo {
    /// 현재가
    pub price: Decimal,
    /// 등락률 (%)
    pub change_pct: f64,
    /// 데이터 주기 (예: "3m")
    pub timeframe: String,
    /// 실행 모드
    pub mode: TradeMode,
}

/// 시스템 상태 (매 주기 덮어쓰기).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemStatus {
    /// 상태 문자열 ("running", "stopped")
    pub status: String,
    /// 마지막 갱신 시각
    pub last_update: DateTime<Utc>,
    /// 계좌 정보
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<AccountSnapshot>,
    /// 시세 정보
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market: Option<MarketStatusInfo>,
    /// 현재 포지션
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    /// 최근 AI 시그널
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal: Option<SignalSummary>,
}

/// AI 분석 기록 (주기당 1건).
///
/// 폴백으로 끝난 주기에도 프롬프트/응답 원문을 보존하여
/// 실패 원인을 사후 감사할 수 있게 합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRecord {
    /// 기록 시각
    pub timestamp: DateTime<Utc>,
    /// 시그널 액션
    pub signal: SignalAction,
    /// 신뢰도
    pub confidence: Confidence,
    /// 근거
    pub reason: String,
    /// 손절가
    pub stop_loss: Decimal,
    /// 익절가
    pub take_profit: Decimal,
    /// 분석 시점 가격
    pub price: Decimal,
    /// 등락률 (%)
    pub price_change_pct: f64,
    /// 분석 시점 포지션 보유 여부
    pub has_position: bool,
    /// 포지션 방향
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position_side: Option<PositionSide>,
    /// 포지션 수량 (flat이면 0)
    pub position_size: Decimal,
    /// 실행 모드
    pub mode: TradeMode,
    /// 시스템 프롬프트 원문
    #[serde(default)]
    pub system_prompt: String,
    /// 사용자 프롬프트 원문
    #[serde(default)]
    pub user_prompt: String,
    /// LLM 응답 원문
    #[serde(default)]
    pub ai_response: String,
}
