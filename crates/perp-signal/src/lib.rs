//! LLM 시그널 정규화.
//!
//! LLM 완성 텍스트를 검증된 canonical `TradeSignal`로 변환합니다.
//! 정규화는 호출자에게 절대 에러를 올리지 않으며, 어떤 입력이든
//! 유효 시그널 또는 결정적 폴백 시그널을 반환합니다.
//!
//! 구성 요소:
//! - `normalizer` - JSON 추출, 어휘/신뢰도 정규화, 손절/익절 기하 검증
//! - `fallback` - 결정적 폴백 시그널 정책
//! - `history` - 파이프라인이 소유하는 유계 롤링 시그널 히스토리
//! - `analyzer` - 폴백을 소프트 실패로 취급하는 유계 재시도 래퍼
//! - `deepseek` - DeepSeek chat-completions 클라이언트
//! - `prompt` - 시장/포지션 컨텍스트 기반 프롬프트 구성

pub mod analyzer;
pub mod deepseek;
pub mod fallback;
pub mod history;
pub mod normalizer;
pub mod prompt;

pub use analyzer::{AnalysisOutcome, AnalyzerConfig, LlmClient, SignalAnalyzer, SignalError};
pub use deepseek::{DeepSeekClient, DeepSeekConfig};
pub use fallback::create_fallback_signal;
pub use history::SignalHistory;
pub use normalizer::{normalize, FallbackReason, Normalized};
pub use prompt::{render_prompt, PromptContext, RenderedPrompt};
