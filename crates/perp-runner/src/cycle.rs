//! 트레이딩 주기 파이프라인.
//!
//! 한 주기는 순차 파이프라인입니다:
//! 스냅샷 → AI 분석(재시도 포함) → 분석 기록/상태 저장 → 재조정 → 기록.
//! 주기 내부에 동시성은 없으며, Ledger 읽기 → 결정 → Ledger 갱신의
//! 원자성은 단일 태스크 실행으로 보장됩니다.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};

use perp_core::{
    AccountStore, AnalysisRecord, MarketStatusInfo, OrderGateway, SystemStatus, TradeMode,
    TradeStore,
};
use perp_data::{build_snapshot, FileStore, ReplayFeed};
use perp_exchange::PaperGateway;
use perp_execution::{EngineConfig, PositionLedger, ReconcileEngine, SimLedger};
use perp_signal::{AnalyzerConfig, LlmClient, PromptContext, SignalAnalyzer};

use crate::config::BotConfig;

/// 한 주기의 실행 결과.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleResult {
    /// 정상 완료
    Completed,
    /// 데이터 문제로 건너뜀 (루프는 계속)
    Skipped,
    /// 리플레이 데이터 소진 (루프 종료)
    Exhausted,
}

/// 시뮬레이션 트레이딩 봇.
pub struct TradingBot {
    config: BotConfig,
    analyzer: SignalAnalyzer,
    engine: ReconcileEngine,
    ledger: Arc<dyn PositionLedger>,
    store: Arc<FileStore>,
    feed: ReplayFeed,
}

impl TradingBot {
    /// 시뮬레이션 모드로 구성.
    ///
    /// paper 게이트웨이 + 파일 저장소 FIFO Ledger 조합입니다.
    /// 실거래 모드는 같은 엔진에 거래소 게이트웨이/Ledger를
    /// 주입하는 통합 지점입니다.
    pub fn new_sim(config: BotConfig, client: Arc<dyn LlmClient>) -> anyhow::Result<Self> {
        let store = Arc::new(FileStore::new(&config.data_dir, config.initial_balance)?);
        let feed = ReplayFeed::from_file(&config.candle_file, config.candle_window)?;

        let gateway: Arc<dyn OrderGateway> = Arc::new(PaperGateway::new(
            store.clone(),
            store.clone(),
            config.leverage,
        ));
        let ledger: Arc<dyn PositionLedger> = Arc::new(SimLedger::new(
            store.clone(),
            config.contract_multiplier,
            config.leverage,
        ));

        let mut engine_config = EngineConfig::new(&config.symbol, TradeMode::Simulation);
        engine_config.contract_multiplier = config.contract_multiplier;
        engine_config.min_contracts = config.min_contracts;

        let engine = ReconcileEngine::new(
            engine_config,
            config.sizer_config(),
            gateway,
            ledger.clone(),
            store.clone(),
            store.clone(),
        );

        let analyzer = SignalAnalyzer::new(
            client,
            AnalyzerConfig {
                max_attempts: config.max_attempts,
                ..Default::default()
            },
        );

        Ok(Self {
            config,
            analyzer,
            engine,
            ledger,
            store,
            feed,
        })
    }

    /// 한 주기 실행.
    pub async fn run_cycle(&mut self) -> CycleResult {
        let window = match self.feed.next_window() {
            Some(window) => window,
            None => {
                info!("리플레이 데이터 소진");
                return CycleResult::Exhausted;
            }
        };

        // 1. 시장 스냅샷 (외부 협력자: 실패 시 주기 건너뜀)
        let snapshot = match build_snapshot(&self.config.symbol, &window) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "스냅샷 구성 실패 - 이번 주기 건너뜀");
                return CycleResult::Skipped;
            }
        };

        info!(
            price = %snapshot.price,
            change_pct = snapshot.price_change_pct,
            trend = %snapshot.trend.overall,
            "주기 시작"
        );

        // 2. 계좌/포지션 컨텍스트
        let account = match self.store.account() {
            Ok(account) => Some(account),
            Err(e) => {
                warn!(error = %e, "계좌 조회 실패");
                None
            }
        };
        let position = match self.ledger.current_position().await {
            Ok(position) => position,
            Err(e) => {
                warn!(error = %e, "포지션 조회 실패");
                None
            }
        };

        // 3. AI 분석 (재시도 포함, 항상 사용 가능한 시그널 반환)
        let last_signal = self.analyzer.history().last().cloned();
        let outcome = self
            .analyzer
            .analyze(&PromptContext {
                snapshot: &snapshot,
                position: position.as_ref(),
                account: account.as_ref(),
                last_signal: last_signal.as_ref(),
                timeframe: &self.config.timeframe,
                contract_multiplier: self.config.contract_multiplier,
            })
            .await;

        if outcome.normalized.is_fallback() {
            warn!("폴백 시그널 사용");
        }

        let signal = outcome.normalized.signal().clone();

        // 4. 분석 기록 저장 (실패해도 거래 결정은 계속)
        let analysis = AnalysisRecord {
            timestamp: Utc::now(),
            signal: signal.action,
            confidence: signal.confidence,
            reason: signal.reason.clone(),
            stop_loss: signal.stop_loss,
            take_profit: signal.take_profit,
            price: snapshot.price,
            price_change_pct: snapshot.price_change_pct,
            has_position: position.is_some(),
            position_side: position.as_ref().map(|p| p.side),
            position_size: position
                .as_ref()
                .map(|p| p.size)
                .unwrap_or(rust_decimal::Decimal::ZERO),
            mode: TradeMode::Simulation,
            system_prompt: outcome.system_prompt.clone(),
            user_prompt: outcome.user_prompt.clone(),
            ai_response: outcome.raw_response.clone(),
        };
        if let Err(e) = self.store.save_analysis_record(&analysis) {
            error!(error = %e, "분석 기록 저장 실패 - 감사 공백 발생");
        }

        // 5. 시스템 상태 갱신 (대시보드용)
        let status = SystemStatus {
            status: "running".to_string(),
            last_update: Utc::now(),
            account,
            market: Some(MarketStatusInfo {
                price: snapshot.price,
                change_pct: snapshot.price_change_pct,
                timeframe: self.config.timeframe.clone(),
                mode: TradeMode::Simulation,
            }),
            position: position.clone(),
            signal: Some((&signal).into()),
        };
        if let Err(e) = self.store.update_system_status(&status) {
            error!(error = %e, "시스템 상태 갱신 실패");
        }

        // 6. 재조정 실행
        match self.engine.execute(&signal, &snapshot).await {
            Ok(report) => {
                info!(
                    outcome = ?report.outcome,
                    records = report.records.len(),
                    "재조정 완료"
                );
            }
            Err(e) => {
                // 하드 스톱은 정상적인 보호 동작: 사유를 남기고 다음 주기로
                error!(error = %e, "재조정 중단");
            }
        }

        CycleResult::Completed
    }
}
