//! 환경변수 기반 설정 모듈.

use std::path::PathBuf;

use anyhow::Context;
use rust_decimal::Decimal;

use perp_execution::{BudgetSizing, SizerConfig, SizingStrategy};

/// 트레이딩 봇 전체 설정.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// 거래 심볼 (OKX 스왑 형식)
    pub symbol: String,
    /// 캔들 주기 표기 (예: "3m")
    pub timeframe: String,
    /// 실행 간격 (분). 이 간격의 정각 경계에 실행
    pub interval_minutes: u64,
    /// 기본 레버리지 (예산 사이징과 Ledger 표기에 사용)
    pub leverage: u32,
    /// 계약 승수 (1장당 코인 수량)
    pub contract_multiplier: Decimal,
    /// 거래소 최소 수량 (장)
    pub min_contracts: Decimal,
    /// 모의 계좌 초기 잔고 (USDT)
    pub initial_balance: Decimal,
    /// 데이터 디렉터리
    pub data_dir: PathBuf,
    /// 리플레이 캔들 파일
    pub candle_file: PathBuf,
    /// 첫 재생 시점의 히스토리 길이
    pub candle_window: usize,
    /// AI 주도 사이징 사용 여부 (false면 예산 기반)
    pub ai_directed_sizing: bool,
    /// 예산 사이징 파라미터
    pub budget: BudgetSizing,
    /// LLM 분석 최대 시도 횟수
    pub max_attempts: u32,
    /// DeepSeek API 키
    pub deepseek_api_key: String,
}

impl BotConfig {
    /// 환경변수에서 설정 로드.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let deepseek_api_key = std::env::var("DEEPSEEK_API_KEY")
            .context("DEEPSEEK_API_KEY 환경변수가 설정되지 않았습니다")?;

        let leverage = env_var_parse("TRADE_LEVERAGE", 10u32);

        Ok(Self {
            symbol: std::env::var("TRADE_SYMBOL").unwrap_or_else(|_| "BTC-USDT-SWAP".to_string()),
            timeframe: std::env::var("TRADE_TIMEFRAME").unwrap_or_else(|_| "3m".to_string()),
            interval_minutes: env_var_parse("TRADE_INTERVAL_MINUTES", 3u64),
            leverage,
            contract_multiplier: env_var_decimal("TRADE_CONTRACT_SIZE", Decimal::new(1, 2)),
            min_contracts: env_var_decimal("TRADE_MIN_AMOUNT", Decimal::new(1, 2)),
            initial_balance: env_var_decimal("SIM_INITIAL_BALANCE", Decimal::from(1000)),
            data_dir: PathBuf::from(
                std::env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string()),
            ),
            candle_file: PathBuf::from(
                std::env::var("CANDLE_FILE").unwrap_or_else(|_| "data/candles.json".to_string()),
            ),
            candle_window: env_var_parse("CANDLE_WINDOW", 96usize),
            ai_directed_sizing: env_var_bool("AI_DIRECTED_SIZING", true),
            budget: BudgetSizing {
                base_usdt: env_var_decimal("POSITION_BASE_USDT", Decimal::from(100)),
                high_confidence_multiplier: env_var_decimal(
                    "POSITION_HIGH_CONFIDENCE_MULT",
                    Decimal::new(15, 1),
                ),
                medium_confidence_multiplier: env_var_decimal(
                    "POSITION_MEDIUM_CONFIDENCE_MULT",
                    Decimal::ONE,
                ),
                low_confidence_multiplier: env_var_decimal(
                    "POSITION_LOW_CONFIDENCE_MULT",
                    Decimal::new(5, 1),
                ),
                trend_strength_multiplier: env_var_decimal(
                    "POSITION_TREND_MULT",
                    Decimal::new(12, 1),
                ),
                rsi_extreme_multiplier: env_var_decimal(
                    "POSITION_RSI_EXTREME_MULT",
                    Decimal::new(7, 1),
                ),
                max_position_ratio: env_var_decimal("POSITION_MAX_RATIO", Decimal::new(1, 1)),
                leverage,
            },
            max_attempts: env_var_parse("AI_MAX_ATTEMPTS", 2u32),
            deepseek_api_key,
        })
    }

    /// 사이저 설정 구성.
    pub fn sizer_config(&self) -> SizerConfig {
        SizerConfig {
            contract_multiplier: self.contract_multiplier,
            min_contracts: self.min_contracts,
            max_contracts: Decimal::from(1000),
            strategy: if self.ai_directed_sizing {
                SizingStrategy::AiDirected
            } else {
                SizingStrategy::Budget(self.budget.clone())
            },
        }
    }
}

/// 환경변수에서 값을 파싱 (실패 시 기본값 사용).
fn env_var_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// 환경변수에서 Decimal 파싱.
fn env_var_decimal(key: &str, default: Decimal) -> Decimal {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// 환경변수에서 bool 파싱.
fn env_var_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| v == "true" || v == "1")
        .unwrap_or(default)
}
