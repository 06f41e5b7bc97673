//! 포지션 재조정 엔진.
//!
//! 목표 포지션(시그널 + 사이저)과 현재 포지션(Ledger)을 비교하여
//! 최소한의 주문 집합을 결정합니다:
//!
//! | 현재 | 시그널 | 동작 |
//! |------|--------|------|
//! | 없음 | BUY/SELL | 신규 개시 |
//! | 롱   | BUY  | 목표 대비 추가/축소/유지 |
//! | 롱   | SELL | 전량 평가 후 숏 개시 (반전) |
//! | 숏   | SELL | 목표 대비 추가/축소/유지 |
//! | 숏   | BUY  | 전량 평가 후 롱 개시 (반전) |
//! | 임의 | HOLD | 주문 없음 |
//! | 임의 | CLOSE | 전량 평가 (flat이면 no-op) |
//!
//! 주문 전 증거금 검증: 증분 노출에 대해서만 증거금을 계산하고
//! 5% 안전 버퍼를 두며, 부족 시 비례 축소 → 축소분이 요청의 절반
//! 미만이면 전체 중단합니다. 하드 스톱은 Ledger와 기록을 건드리지
//! 않습니다.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{info, warn};

use perp_core::{
    AccountStore, GatewayError, MarketSnapshot, OrderGateway, OrderRequest, Position,
    PositionSide, StoreError, TradeMode, TradeRecord, TradeSignal, TradeStore,
};
use perp_exchange::{with_retry, RetryConfig};

use crate::ledger::{LedgerError, PositionLedger};
use crate::recorder::{
    build_add_record, build_close_record, build_hold_record, build_open_record,
    build_reduce_record,
};
use crate::sizer::{size_target, SizerConfig, SizingError};

/// 재조정 엔진 에러.
#[derive(Debug, Error)]
pub enum EngineError {
    /// AI 전략 검증 실패 (하드 스톱)
    #[error(transparent)]
    Sizing(#[from] SizingError),

    /// 증거금 부족으로 최소 수량조차 지원 불가 (하드 스톱)
    #[error("증거금 부족: 필요 {required} USDT, 가용 {available} USDT")]
    InsufficientMargin {
        required: Decimal,
        available: Decimal,
    },

    /// 축소 수량이 요청의 절반 미만 (하드 스톱, 부분 주문 금지)
    #[error("잔고 심각 부족: 요청 {requested}장 대비 지원 가능 {supported}장 (필요 증거금 {required} USDT, 가용 {available} USDT)")]
    ClampedBelowHalf {
        requested: Decimal,
        supported: Decimal,
        required: Decimal,
        available: Decimal,
    },

    /// 반전의 개시 주문 실패. 평가 기록은 이미 저장된 상태.
    #[error("반전 개시 주문 실패 (평가 기록은 저장됨): {source}")]
    FlipOpenLeg { source: GatewayError },

    #[error("게이트웨이 에러: {0}")]
    Gateway(#[from] GatewayError),

    #[error("장부 에러: {0}")]
    Ledger(#[from] LedgerError),

    #[error("저장소 에러: {0}")]
    Store(#[from] StoreError),
}

/// 재조정 결과.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    /// 신규 개시
    Opened { side: PositionSide, size: Decimal },
    /// 동방향 추가
    Added { side: PositionSide, size: Decimal },
    /// 동방향 축소
    Reduced {
        side: PositionSide,
        size: Decimal,
        pnl: Decimal,
    },
    /// 방향 반전 (평가 + 개시)
    Flipped {
        closed_side: PositionSide,
        closed_size: Decimal,
        pnl: Decimal,
        opened_side: PositionSide,
        opened_size: Decimal,
    },
    /// 전량 평가
    Closed {
        side: PositionSide,
        size: Decimal,
        pnl: Decimal,
    },
    /// 변동 없음
    Held,
}

/// 재조정 보고서.
#[derive(Debug, Clone)]
pub struct ReconcileReport {
    /// 결과
    pub outcome: ReconcileOutcome,
    /// 이번 주기에 저장된 거래 기록 (반전이면 정확히 2건)
    pub records: Vec<TradeRecord>,
}

impl ReconcileReport {
    fn new(outcome: ReconcileOutcome, records: Vec<TradeRecord>) -> Self {
        Self { outcome, records }
    }
}

/// 엔진 설정.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// 거래 심볼
    pub symbol: String,
    /// 계약 승수
    pub contract_multiplier: Decimal,
    /// 거래소 최소 수량
    pub min_contracts: Decimal,
    /// 동방향 조정의 무시 허용 오차 (장)
    pub size_tolerance: Decimal,
    /// 증거금 안전 배수 (1.05 = 5% 버퍼)
    pub margin_safety: Decimal,
    /// 축소 하한 비율 (요청 대비, 미만이면 전체 중단)
    pub min_fill_ratio: Decimal,
    /// 반전 시 평가-개시 사이 정산 대기 (ms)
    pub flip_settle_delay_ms: u64,
    /// 조회성 게이트웨이 호출의 재시도 설정.
    /// 주문 제출은 비멱등이므로 재시도하지 않는다.
    pub retry: RetryConfig,
    /// 실행 모드
    pub mode: TradeMode,
}

impl EngineConfig {
    /// 기본 설정 생성.
    pub fn new(symbol: impl Into<String>, mode: TradeMode) -> Self {
        Self {
            symbol: symbol.into(),
            contract_multiplier: Decimal::new(1, 2), // 0.01
            min_contracts: Decimal::new(1, 2),       // 0.01
            size_tolerance: Decimal::new(1, 2),      // 0.01
            margin_safety: Decimal::new(105, 2),     // 1.05
            min_fill_ratio: Decimal::new(5, 1),      // 0.5
            flip_settle_delay_ms: match mode {
                TradeMode::Live => 1000,
                TradeMode::Simulation => 100,
            },
            retry: RetryConfig::default(),
            mode,
        }
    }

    /// 시뮬레이션은 감사 연속성을 위해 hold 기록도 남긴다.
    fn record_holds(&self) -> bool {
        self.mode == TradeMode::Simulation
    }
}

/// 포지션 재조정 엔진.
///
/// `PositionLedger` + `OrderGateway` 조합 위에서 한 번만 작성되며,
/// 시뮬레이션(paper 게이트웨이 + FIFO 저장소 Ledger)과
/// 실거래(거래소 게이트웨이 + 거래소 Ledger)는 주입으로 전환합니다.
pub struct ReconcileEngine {
    config: EngineConfig,
    sizer: SizerConfig,
    gateway: Arc<dyn OrderGateway>,
    ledger: Arc<dyn PositionLedger>,
    account: Arc<dyn AccountStore>,
    trades: Arc<dyn TradeStore>,
}

impl ReconcileEngine {
    /// 새 엔진 생성.
    pub fn new(
        config: EngineConfig,
        sizer: SizerConfig,
        gateway: Arc<dyn OrderGateway>,
        ledger: Arc<dyn PositionLedger>,
        account: Arc<dyn AccountStore>,
        trades: Arc<dyn TradeStore>,
    ) -> Self {
        Self {
            config,
            sizer,
            gateway,
            ledger,
            account,
            trades,
        }
    }

    /// 한 주기의 재조정 실행.
    ///
    /// 시그널과 시장 스냅샷을 받아 주문을 결정/제출하고,
    /// Ledger 갱신과 거래 기록 저장까지 수행합니다.
    pub async fn execute(
        &self,
        signal: &TradeSignal,
        snapshot: &MarketSnapshot,
    ) -> Result<ReconcileReport, EngineError> {
        let position = self.ledger.current_position().await?;

        info!(
            signal = %signal.action,
            confidence = %signal.confidence,
            price = %snapshot.price,
            position = ?position,
            "재조정 시작"
        );

        match signal.action {
            perp_core::SignalAction::Hold => self.handle_hold(signal, snapshot, position),
            perp_core::SignalAction::Close => self.handle_close(signal, snapshot, position).await,
            perp_core::SignalAction::Buy => {
                self.handle_target(signal, snapshot, position, PositionSide::Long)
                    .await
            }
            perp_core::SignalAction::Sell => {
                self.handle_target(signal, snapshot, position, PositionSide::Short)
                    .await
            }
        }
    }

    // =========================================================================
    // HOLD / CLOSE
    // =========================================================================

    fn handle_hold(
        &self,
        signal: &TradeSignal,
        snapshot: &MarketSnapshot,
        position: Option<Position>,
    ) -> Result<ReconcileReport, EngineError> {
        info!("관망 - 주문 없음");

        let mut records = Vec::new();
        if self.config.record_holds() {
            let (amount, side) = match &position {
                Some(p) => (p.size, Some(p.side)),
                None => (Decimal::ZERO, None),
            };
            let record = build_hold_record(
                signal,
                snapshot.price,
                amount,
                side,
                self.config.mode,
                Utc::now(),
            );
            self.trades.save_trade_record(&record)?;
            records.push(record);
        }

        Ok(ReconcileReport::new(ReconcileOutcome::Held, records))
    }

    async fn handle_close(
        &self,
        signal: &TradeSignal,
        snapshot: &MarketSnapshot,
        position: Option<Position>,
    ) -> Result<ReconcileReport, EngineError> {
        let position = match position {
            Some(p) if p.size > Decimal::ZERO => p,
            _ => {
                info!("CLOSE 시그널 - 현재 포지션 없음, 조치 불필요");
                let mut records = Vec::new();
                if self.config.record_holds() {
                    let record = build_hold_record(
                        signal,
                        snapshot.price,
                        Decimal::ZERO,
                        None,
                        self.config.mode,
                        Utc::now(),
                    );
                    self.trades.save_trade_record(&record)?;
                    records.push(record);
                }
                return Ok(ReconcileReport::new(ReconcileOutcome::Held, records));
            }
        };

        info!(
            side = %position.side,
            size = %position.size,
            "CLOSE 시그널 - 전량 평가"
        );

        let request = OrderRequest::reduce(
            &self.config.symbol,
            position.side.exit_order_side(),
            position.size,
        );

        match self.gateway.place_market_order(&request).await {
            Ok(()) => {
                let outcome = self
                    .ledger
                    .record_close(
                        position.side,
                        position.size,
                        snapshot.price,
                        position.entry_price,
                        Utc::now(),
                    )
                    .await?;

                let record = build_close_record(
                    signal,
                    snapshot.price,
                    position.size,
                    position.side,
                    outcome.realized_pnl,
                    self.config.mode,
                    Utc::now(),
                );
                self.trades.save_trade_record(&record)?;
                self.apply_realized_pnl(outcome.realized_pnl)?;

                info!(pnl = %outcome.realized_pnl, "평가 완료");

                Ok(ReconcileReport::new(
                    ReconcileOutcome::Closed {
                        side: position.side,
                        size: position.size,
                        pnl: outcome.realized_pnl,
                    },
                    vec![record],
                ))
            }
            Err(e) if e.is_no_position() => {
                // 장부와 거래소의 불일치: 이미 flat이면 조치 불필요
                warn!(error = %e, "거래소에 청산할 포지션 없음 - 이미 flat으로 간주");
                Ok(ReconcileReport::new(ReconcileOutcome::Held, Vec::new()))
            }
            Err(e) => Err(e.into()),
        }
    }

    // =========================================================================
    // BUY / SELL
    // =========================================================================

    async fn handle_target(
        &self,
        signal: &TradeSignal,
        snapshot: &MarketSnapshot,
        position: Option<Position>,
        target_side: PositionSide,
    ) -> Result<ReconcileReport, EngineError> {
        // 1. 가용 잔고 조회 (일시적 실패는 고정 간격 재시도)
        let account = with_retry(&self.config.retry, || self.gateway.fetch_balance()).await?;
        let balance = account.balance;

        // 2. 목표 수량 결정 (검증 실패는 하드 스톱)
        let target = size_target(&self.sizer, signal, snapshot, balance)?;

        // 3. 증거금 검증 및 필요 시 비례 축소
        let final_size = self.enforce_margin(
            position.as_ref(),
            target_side,
            target.contracts,
            target.leverage,
            snapshot.price,
            balance,
        )?;

        // 4. 레버리지 설정 (실패는 하드 스톱)
        with_retry(&self.config.retry, || {
            self.gateway.set_leverage(&self.config.symbol, target.leverage)
        })
        .await?;

        // 5. 상태 기계 분기
        match position {
            None => self.open_new(signal, snapshot, target_side, final_size).await,
            Some(p) if p.side == target_side => {
                self.adjust_same_side(signal, snapshot, p, final_size).await
            }
            Some(p) => self.flip(signal, snapshot, p, target_side, final_size).await,
        }
    }

    /// 증분 노출에 대한 증거금 검증.
    ///
    /// 추가/개시는 delta에 대한 증거금, 축소는 0, 반전은 신규 방향의
    /// 전액 증거금이 필요합니다. 부족 시 목표 수량을 잔고가 지원하는
    /// 수준으로 축소하되, 최소 수량 미만이거나 요청의 절반 미만이면
    /// 전체를 중단합니다.
    fn enforce_margin(
        &self,
        position: Option<&Position>,
        target_side: PositionSide,
        target_size: Decimal,
        leverage: u32,
        price: Decimal,
        balance: Decimal,
    ) -> Result<Decimal, EngineError> {
        let leverage_dec = Decimal::from(leverage);

        let delta = match position {
            Some(p) if p.side == target_side => target_size - p.size,
            _ => target_size, // 무포지션 개시 또는 반전: 전액
        };

        if delta <= Decimal::ZERO {
            // 축소 또는 유지: 추가 증거금 불필요
            return Ok(target_size);
        }

        let contract_value = delta * price * self.config.contract_multiplier;
        let required_margin = contract_value / leverage_dec;
        let required_with_safety = required_margin * self.config.margin_safety;

        info!(
            balance = %balance.round_dp(2),
            contract_value = %contract_value.round_dp(2),
            required_margin = %required_margin.round_dp(2),
            required_with_safety = %required_with_safety.round_dp(2),
            leverage = leverage,
            "증거금 검증"
        );

        if balance >= required_with_safety {
            return Ok(target_size);
        }

        // 잔고가 지원하는 최대 수량으로 축소
        let max_contract_value = balance * leverage_dec / self.config.margin_safety;
        let max_size =
            (max_contract_value / (price * self.config.contract_multiplier)).round_dp(2);

        if max_size < self.config.min_contracts {
            return Err(EngineError::InsufficientMargin {
                required: required_margin.round_dp(2),
                available: balance.round_dp(2),
            });
        }

        if max_size < target_size * self.config.min_fill_ratio {
            return Err(EngineError::ClampedBelowHalf {
                requested: target_size,
                supported: max_size,
                required: required_margin.round_dp(2),
                available: balance.round_dp(2),
            });
        }

        warn!(
            requested = %target_size,
            clamped = %max_size,
            "잔고 부족 - 목표 수량 축소"
        );
        Ok(max_size)
    }

    async fn open_new(
        &self,
        signal: &TradeSignal,
        snapshot: &MarketSnapshot,
        side: PositionSide,
        size: Decimal,
    ) -> Result<ReconcileReport, EngineError> {
        info!(side = %side, size = %size, "신규 개시");

        let request = OrderRequest::entry(&self.config.symbol, side.entry_order_side(), size);
        self.gateway.place_market_order(&request).await?;

        self.ledger
            .record_open(side, size, snapshot.price, Utc::now())
            .await?;

        let record = build_open_record(
            signal,
            snapshot.price,
            size,
            side,
            self.config.mode,
            Utc::now(),
        );
        self.trades.save_trade_record(&record)?;

        Ok(ReconcileReport::new(
            ReconcileOutcome::Opened { side, size },
            vec![record],
        ))
    }

    async fn adjust_same_side(
        &self,
        signal: &TradeSignal,
        snapshot: &MarketSnapshot,
        position: Position,
        target_size: Decimal,
    ) -> Result<ReconcileReport, EngineError> {
        let diff = target_size - position.size;

        if diff.abs() < self.config.size_tolerance {
            info!(
                current = %position.size,
                target = %target_size,
                "수량 적정 - 현상 유지"
            );
            let mut records = Vec::new();
            if self.config.record_holds() {
                let record = build_hold_record(
                    signal,
                    snapshot.price,
                    position.size,
                    Some(position.side),
                    self.config.mode,
                    Utc::now(),
                );
                self.trades.save_trade_record(&record)?;
                records.push(record);
            }
            return Ok(ReconcileReport::new(ReconcileOutcome::Held, records));
        }

        if diff > Decimal::ZERO {
            // 추가 진입
            let add_size = diff.round_dp(2);
            info!(
                side = %position.side,
                add = %add_size,
                current = %position.size,
                target = %target_size,
                "동방향 추가"
            );

            let request = OrderRequest::entry(
                &self.config.symbol,
                position.side.entry_order_side(),
                add_size,
            );
            self.gateway.place_market_order(&request).await?;

            self.ledger
                .record_open(position.side, add_size, snapshot.price, Utc::now())
                .await?;

            let record = build_add_record(
                signal,
                snapshot.price,
                add_size,
                position.side,
                self.config.mode,
                Utc::now(),
            );
            self.trades.save_trade_record(&record)?;

            Ok(ReconcileReport::new(
                ReconcileOutcome::Added {
                    side: position.side,
                    size: add_size,
                },
                vec![record],
            ))
        } else {
            // 부분 축소
            let reduce_size = diff.abs().round_dp(2);
            info!(
                side = %position.side,
                reduce = %reduce_size,
                current = %position.size,
                target = %target_size,
                "동방향 축소"
            );

            let request = OrderRequest::reduce(
                &self.config.symbol,
                position.side.exit_order_side(),
                reduce_size,
            );
            self.gateway.place_market_order(&request).await?;

            let outcome = self
                .ledger
                .record_close(
                    position.side,
                    reduce_size,
                    snapshot.price,
                    position.entry_price,
                    Utc::now(),
                )
                .await?;

            let record = build_reduce_record(
                signal,
                snapshot.price,
                reduce_size,
                position.side,
                outcome.realized_pnl,
                self.config.mode,
                Utc::now(),
            );
            self.trades.save_trade_record(&record)?;
            self.apply_realized_pnl(outcome.realized_pnl)?;

            Ok(ReconcileReport::new(
                ReconcileOutcome::Reduced {
                    side: position.side,
                    size: reduce_size,
                    pnl: outcome.realized_pnl,
                },
                vec![record],
            ))
        }
    }

    /// 방향 반전: 전량 평가 후 신규 개시.
    ///
    /// 두 주문은 순차 제출하며 사이에 정산 대기를 둡니다.
    /// 평가 기록은 평가 주문 성공 즉시 저장하여, 개시 주문이 나중에
    /// 실패하더라도 감사 추적이 현실을 반영하게 합니다.
    async fn flip(
        &self,
        signal: &TradeSignal,
        snapshot: &MarketSnapshot,
        position: Position,
        target_side: PositionSide,
        target_size: Decimal,
    ) -> Result<ReconcileReport, EngineError> {
        if position.size <= Decimal::ZERO {
            warn!(
                side = %position.side,
                "반대 방향 포지션이 있으나 수량 0 - 직접 개시"
            );
            return self.open_new(signal, snapshot, target_side, target_size).await;
        }

        info!(
            close_side = %position.side,
            close_size = %position.size,
            open_side = %target_side,
            open_size = %target_size,
            "방향 반전"
        );

        let close_request = OrderRequest::reduce(
            &self.config.symbol,
            position.side.exit_order_side(),
            position.size,
        );

        match self.gateway.place_market_order(&close_request).await {
            Ok(()) => {}
            Err(e) if e.is_no_position() => {
                // 거래소가 이미 flat이라고 보고: 직접 개시 폴백
                warn!(error = %e, "청산할 포지션 없음 - 직접 개시 시도");
                return self.open_new(signal, snapshot, target_side, target_size).await;
            }
            // 평가 주문 실패: 개시 주문은 시도하지 않는다
            Err(e) => return Err(e.into()),
        }

        let close_outcome = self
            .ledger
            .record_close(
                position.side,
                position.size,
                snapshot.price,
                position.entry_price,
                Utc::now(),
            )
            .await?;

        // 부분 완료 위험: 평가 기록은 개시 주문 결과를 기다리지 않고 저장
        let close_record = build_close_record(
            signal,
            snapshot.price,
            position.size,
            position.side,
            close_outcome.realized_pnl,
            self.config.mode,
            Utc::now(),
        );
        self.trades.save_trade_record(&close_record)?;
        self.apply_realized_pnl(close_outcome.realized_pnl)?;

        // 거래소가 평가를 정산할 시간을 둔다
        tokio::time::sleep(std::time::Duration::from_millis(
            self.config.flip_settle_delay_ms,
        ))
        .await;

        let open_request = OrderRequest::entry(
            &self.config.symbol,
            target_side.entry_order_side(),
            target_size,
        );
        if let Err(e) = self.gateway.place_market_order(&open_request).await {
            warn!(error = %e, "반전 개시 주문 실패 - 평가 기록은 저장됨");
            return Err(EngineError::FlipOpenLeg { source: e });
        }

        self.ledger
            .record_open(target_side, target_size, snapshot.price, Utc::now())
            .await?;

        let open_record = build_open_record(
            signal,
            snapshot.price,
            target_size,
            target_side,
            self.config.mode,
            Utc::now(),
        );
        self.trades.save_trade_record(&open_record)?;

        info!(pnl = %close_outcome.realized_pnl, "반전 완료");

        Ok(ReconcileReport::new(
            ReconcileOutcome::Flipped {
                closed_side: position.side,
                closed_size: position.size,
                pnl: close_outcome.realized_pnl,
                opened_side: target_side,
                opened_size: target_size,
            },
            vec![close_record, open_record],
        ))
    }

    /// 실현 손익을 잔고에 가산 반영.
    ///
    /// 잔고는 항상 가산 방식으로만 갱신하며 처음부터 재계산하지 않습니다.
    fn apply_realized_pnl(&self, pnl: Decimal) -> Result<(), EngineError> {
        if pnl.is_zero() {
            return Ok(());
        }

        let account = self.account.account()?;
        let new_balance = account.balance + pnl;
        self.account.update_balance(new_balance, new_balance)?;

        info!(
            pnl = %pnl,
            old_balance = %account.balance.round_dp(2),
            new_balance = %new_balance.round_dp(2),
            "잔고 갱신"
        );
        Ok(())
    }
}
