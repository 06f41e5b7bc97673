//! 분석 재시도 래퍼.
//!
//! 프롬프트 렌더링 → LLM 호출 → 정규화를 한 번의 시도로 보고,
//! 폴백 결과를 소프트 실패로 취급하여 고정 간격으로 재시도합니다.
//! 재시도 소진 시 마지막 폴백을 반환하되, 감사를 위해 프롬프트와
//! 응답 원문을 결과에 보존합니다.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{info, warn};

use perp_core::SignalAction;

use crate::history::SignalHistory;
use crate::normalizer::{normalize, FallbackReason, Normalized};
use crate::prompt::{render_prompt, PromptContext, RenderedPrompt};

/// LLM 호출 에러.
#[derive(Debug, Clone, Error)]
pub enum SignalError {
    #[error("LLM 요청 실패: {0}")]
    Llm(String),

    #[error("LLM 응답 타임아웃: {0}")]
    Timeout(String),

    #[error("LLM 응답 형식 오류: {0}")]
    Response(String),
}

/// LLM 클라이언트 trait.
///
/// 렌더링된 프롬프트를 전달하고 원문 텍스트를 돌려받습니다.
/// 반환 텍스트는 신뢰하지 않으며, JSON 객체 추출 외에는
/// 불투명하게 취급합니다.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 완성 요청.
    async fn complete(&self, system_prompt: &str, user_prompt: &str)
        -> Result<String, SignalError>;

    /// 클라이언트 이름 (로깅용).
    fn client_name(&self) -> &str;
}

/// 재시도 설정.
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// 최대 시도 횟수
    pub max_attempts: u32,
    /// 시도 간 고정 대기
    pub retry_delay: Duration,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            retry_delay: Duration::from_secs(1),
        }
    }
}

/// 분석 결과.
///
/// 폴백으로 끝난 경우에도 프롬프트/응답 원문을 보존합니다.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    /// 정규화 결과
    pub normalized: Normalized,
    /// 시스템 프롬프트 원문
    pub system_prompt: String,
    /// 사용자 프롬프트 원문
    pub user_prompt: String,
    /// LLM 응답 원문 (마지막 시도)
    pub raw_response: String,
    /// 수행된 시도 횟수
    pub attempts: u32,
    /// 관측용: 트레일링 윈도우 내 현재 액션의 (출현 횟수, 전체 수)
    pub action_frequency: (usize, usize),
    /// 관측용: 최근 3회 액션 동일 여부
    pub streak_of_three: bool,
}

/// 시그널 분석기.
///
/// 롤링 히스토리를 소유하며, 매 시도의 결과(폴백 포함)를
/// 히스토리에 추가합니다.
pub struct SignalAnalyzer {
    client: Arc<dyn LlmClient>,
    config: AnalyzerConfig,
    history: SignalHistory,
}

impl SignalAnalyzer {
    /// 새 분석기 생성.
    pub fn new(client: Arc<dyn LlmClient>, config: AnalyzerConfig) -> Self {
        Self {
            client,
            config,
            history: SignalHistory::default(),
        }
    }

    /// 히스토리 참조 (관측용).
    pub fn history(&self) -> &SignalHistory {
        &self.history
    }

    /// 한 주기의 분석 실행.
    ///
    /// 폴백 결과는 소프트 실패로 보고 고정 간격 후 재시도하며,
    /// 시도 소진 시 마지막 폴백을 그대로 반환합니다.
    pub async fn analyze(&mut self, ctx: &PromptContext<'_>) -> AnalysisOutcome {
        let prompt = render_prompt(ctx);
        let price = ctx.snapshot.price;

        let max_attempts = self.config.max_attempts.max(1);
        let mut attempts = 0;
        let mut last: Option<(Normalized, String)> = None;

        while attempts < max_attempts {
            attempts += 1;

            let normalized = self.attempt(&prompt, price).await;
            self.history.push(normalized.0.signal().clone());

            let is_fallback = normalized.0.is_fallback();
            last = Some(normalized);

            if !is_fallback {
                break;
            }

            if attempts < max_attempts {
                info!(
                    attempt = attempts,
                    max_attempts = max_attempts,
                    "폴백 시그널 - 재시도"
                );
                tokio::time::sleep(self.config.retry_delay).await;
            } else {
                warn!(attempts = attempts, "재시도 소진 - 마지막 폴백 사용");
            }
        }

        // max_attempts >= 1이므로 항상 Some
        let (normalized, raw_response) = last.expect("시도는 최소 1회 수행됨");

        let action = normalized.signal().action;
        let action_frequency = self.history.action_frequency(action);
        let streak_of_three = self.history.last_three_identical();

        log_signal_stats(action, action_frequency, streak_of_three);

        AnalysisOutcome {
            normalized,
            system_prompt: prompt.system,
            user_prompt: prompt.user,
            raw_response,
            attempts,
            action_frequency,
            streak_of_three,
        }
    }

    /// 단일 시도: LLM 호출 + 정규화.
    ///
    /// 전송 실패도 정규화 경로로 합류시켜 폴백으로 변환합니다.
    async fn attempt(&self, prompt: &RenderedPrompt, price: Decimal) -> (Normalized, String) {
        match self.client.complete(&prompt.system, &prompt.user).await {
            Ok(raw) => {
                let normalized = normalize(&raw, price, Utc::now());
                (normalized, raw)
            }
            Err(e) => {
                warn!(client = self.client.client_name(), error = %e, "LLM 호출 실패");
                let reason = FallbackReason::LlmFailure(e.to_string());
                let signal = crate::fallback::create_fallback_signal(price, Utc::now(), &reason);
                (Normalized::Fallback(signal, reason), String::new())
            }
        }
    }
}

fn log_signal_stats(action: SignalAction, frequency: (usize, usize), streak: bool) {
    info!(
        action = %action,
        occurrences = frequency.0,
        window = frequency.1,
        "시그널 통계"
    );
    if streak {
        warn!(action = %action, "연속 3회 동일 시그널");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::Utc;
    use perp_core::{IndicatorSet, MacdDirection, MarketSnapshot, TrendAnalysis, TrendLabel};
    use rust_decimal_macros::dec;

    use super::*;

    /// 시도 순서대로 응답을 돌려주는 스크립트 클라이언트.
    struct ScriptedClient {
        responses: Mutex<Vec<Result<String, SignalError>>>,
        calls: Mutex<u32>,
    }

    impl ScriptedClient {
        fn new(responses: Vec<Result<String, SignalError>>) -> Self {
            Self {
                responses: Mutex::new(responses),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedClient {
        async fn complete(
            &self,
            _system_prompt: &str,
            _user_prompt: &str,
        ) -> Result<String, SignalError> {
            *self.calls.lock().unwrap() += 1;
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                Ok(String::new())
            } else {
                responses.remove(0)
            }
        }

        fn client_name(&self) -> &str {
            "scripted"
        }
    }

    fn snapshot() -> MarketSnapshot {
        MarketSnapshot {
            symbol: "BTC-USDT-SWAP".to_string(),
            price: dec!(100000),
            high: dec!(100500),
            low: dec!(99500),
            volume: dec!(100),
            price_change_pct: 0.0,
            timestamp: Utc::now(),
            indicators: IndicatorSet {
                rsi: 50.0,
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
                overall: TrendLabel::Range,
                short_term: TrendLabel::Range,
                macd_direction: MacdDirection::Flat,
            },
            recent_candles: Vec::new(),
        }
    }

    fn config() -> AnalyzerConfig {
        AnalyzerConfig {
            max_attempts: 2,
            retry_delay: Duration::from_millis(10),
        }
    }

    fn valid_response() -> String {
        r#"{"signal": "BUY", "reason": "추세", "stop_loss": 98000,
            "take_profit": 104000, "confidence": "HIGH",
            "quantity": 0.02, "leverage": 10}"#
            .to_string()
    }

    fn ctx(snapshot: &MarketSnapshot) -> PromptContext<'_> {
        PromptContext {
            snapshot,
            position: None,
            account: None,
            last_signal: None,
            timeframe: "3m",
            contract_multiplier: dec!(0.01),
        }
    }

    #[tokio::test]
    async fn test_first_attempt_success_no_retry() {
        let client = Arc::new(ScriptedClient::new(vec![Ok(valid_response())]));
        let mut analyzer = SignalAnalyzer::new(client.clone(), config());
        let snapshot = snapshot();

        let outcome = analyzer.analyze(&ctx(&snapshot)).await;

        assert!(!outcome.normalized.is_fallback());
        assert_eq!(outcome.attempts, 1);
        assert_eq!(client.calls(), 1);
        assert_eq!(analyzer.history().len(), 1);
    }

    #[tokio::test]
    async fn test_fallback_triggers_retry() {
        // 1차: 잡음 응답 → 폴백, 2차: 정상 응답
        let client = Arc::new(ScriptedClient::new(vec![
            Ok("판단 보류".to_string()),
            Ok(valid_response()),
        ]));
        let mut analyzer = SignalAnalyzer::new(client.clone(), config());
        let snapshot = snapshot();

        let outcome = analyzer.analyze(&ctx(&snapshot)).await;

        assert!(!outcome.normalized.is_fallback());
        assert_eq!(outcome.attempts, 2);
        assert_eq!(client.calls(), 2);
        // 폴백 시도도 히스토리에 남는다
        assert_eq!(analyzer.history().len(), 2);
    }

    #[tokio::test]
    async fn test_exhausted_retries_return_last_fallback() {
        let client = Arc::new(ScriptedClient::new(vec![
            Ok("잡음 1".to_string()),
            Ok("잡음 2".to_string()),
        ]));
        let mut analyzer = SignalAnalyzer::new(client, config());
        let snapshot = snapshot();

        let outcome = analyzer.analyze(&ctx(&snapshot)).await;

        assert!(outcome.normalized.is_fallback());
        assert_eq!(outcome.attempts, 2);
        assert_eq!(outcome.raw_response, "잡음 2");
        // 감사용 프롬프트 원문 보존
        assert!(!outcome.user_prompt.is_empty());
        assert!(!outcome.system_prompt.is_empty());
    }

    #[tokio::test]
    async fn test_llm_error_becomes_fallback() {
        let client = Arc::new(ScriptedClient::new(vec![
            Err(SignalError::Timeout("10s".to_string())),
            Err(SignalError::Llm("503".to_string())),
        ]));
        let mut analyzer = SignalAnalyzer::new(client, config());
        let snapshot = snapshot();

        let outcome = analyzer.analyze(&ctx(&snapshot)).await;

        assert!(outcome.normalized.is_fallback());
        assert!(outcome.raw_response.is_empty());
        // 폴백 시그널은 HOLD
        assert_eq!(
            outcome.normalized.signal().action,
            perp_core::SignalAction::Hold
        );
    }

    #[tokio::test]
    async fn test_streak_observability() {
        let client = Arc::new(ScriptedClient::new(vec![
            Ok(valid_response()),
            Ok(valid_response()),
            Ok(valid_response()),
        ]));
        let mut analyzer = SignalAnalyzer::new(client, config());
        let snapshot = snapshot();

        analyzer.analyze(&ctx(&snapshot)).await;
        analyzer.analyze(&ctx(&snapshot)).await;
        let outcome = analyzer.analyze(&ctx(&snapshot)).await;

        assert!(outcome.streak_of_three);
        assert_eq!(outcome.action_frequency, (3, 3));
    }
}
