//! JSON 파일 기반 저장소.
//!
//! 대시보드가 읽는 파일 집합을 관리합니다:
//! - `system_status.json` - 시스템 상태 (매 주기 덮어쓰기)
//! - `trades.json` - 거래 기록 (최근 100건)
//! - `performance.json` - 성과 집계 (승률, 일/월별 손익)
//! - `ai_analysis_history.json` - AI 분석 기록 (최근 50건)
//! - `sim_account.json` - 모의 계좌 잔고
//! - `sim_lots.json` - 열린 lot (재시작 시 포지션 복원의 근거)
//!
//! 파일 접근은 프로세스 내 Mutex로 직렬화합니다. 파이프라인은
//! 단일 스레드이므로 경합은 없지만, read-modify-write의 원자성을
//! 지키기 위한 안전장치입니다.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use perp_core::{
    AccountSnapshot, AccountStore, AnalysisRecord, Lot, LotStore, PositionAction, PositionSide,
    StoreError, SystemStatus, TradeRecord, TradeStore,
};

/// 거래 기록 보존 한도.
const MAX_TRADE_RECORDS: usize = 100;
/// AI 분석 기록 보존 한도.
const MAX_ANALYSIS_RECORDS: usize = 50;

/// 성과 집계.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Performance {
    /// 저장된 거래 기록 총수
    pub total_trades: u64,
    /// 이긴 완결 거래 수
    pub winning_trades: u64,
    /// 개시-평가 짝이 맞은 완결 거래 수
    pub completed_trades: u64,
    /// 누적 실현 손익
    pub total_pnl: Decimal,
    /// 일별 손익 (YYYY-MM-DD)
    pub daily_pnl: BTreeMap<String, Decimal>,
    /// 월별 손익 (YYYY-MM)
    pub monthly_pnl: BTreeMap<String, Decimal>,
    /// 승률 계산용 개시/평가 이벤트
    pub position_records: Vec<PositionEvent>,
}

impl Default for Performance {
    fn default() -> Self {
        Self {
            total_trades: 0,
            winning_trades: 0,
            completed_trades: 0,
            total_pnl: Decimal::ZERO,
            daily_pnl: BTreeMap::new(),
            monthly_pnl: BTreeMap::new(),
            position_records: Vec::new(),
        }
    }
}

/// 승률 계산용 포지션 이벤트.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionEvent {
    pub timestamp: DateTime<Utc>,
    pub action: PositionAction,
    pub side: Option<PositionSide>,
    pub price: Decimal,
    pub amount: Decimal,
    pub pnl: Decimal,
}

/// 모의 계좌 잔고 파일 shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SimAccount {
    balance: Decimal,
    equity: Decimal,
}

/// 열린 lot 파일 shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct LotBook {
    next_id: u64,
    lots: Vec<Lot>,
}

/// JSON 파일 저장소.
pub struct FileStore {
    data_dir: PathBuf,
    guard: Mutex<()>,
}

impl FileStore {
    /// 저장소 초기화.
    ///
    /// 데이터 디렉터리와 파일들이 없으면 생성합니다.
    /// 모의 계좌는 `initial_balance`로 부트스트랩합니다.
    pub fn new(data_dir: impl Into<PathBuf>, initial_balance: Decimal) -> Result<Self, StoreError> {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir)?;

        let store = Self {
            data_dir,
            guard: Mutex::new(()),
        };
        store.init_files(initial_balance)?;
        Ok(store)
    }

    fn init_files(&self, initial_balance: Decimal) -> Result<(), StoreError> {
        if !self.status_path().exists() {
            self.save_json(
                &self.status_path(),
                &SystemStatus {
                    status: "stopped".to_string(),
                    last_update: Utc::now(),
                    account: None,
                    market: None,
                    position: None,
                    signal: None,
                },
            )?;
        }
        if !self.trades_path().exists() {
            self.save_json(&self.trades_path(), &Vec::<TradeRecord>::new())?;
        }
        if !self.performance_path().exists() {
            self.save_json(&self.performance_path(), &Performance::default())?;
        }
        if !self.analysis_path().exists() {
            self.save_json(&self.analysis_path(), &Vec::<AnalysisRecord>::new())?;
        }
        if !self.account_path().exists() {
            self.save_json(
                &self.account_path(),
                &SimAccount {
                    balance: initial_balance,
                    equity: initial_balance,
                },
            )?;
        }
        if !self.lots_path().exists() {
            self.save_json(&self.lots_path(), &LotBook::default())?;
        }
        Ok(())
    }

    fn status_path(&self) -> PathBuf {
        self.data_dir.join("system_status.json")
    }

    fn trades_path(&self) -> PathBuf {
        self.data_dir.join("trades.json")
    }

    fn performance_path(&self) -> PathBuf {
        self.data_dir.join("performance.json")
    }

    fn analysis_path(&self) -> PathBuf {
        self.data_dir.join("ai_analysis_history.json")
    }

    fn account_path(&self) -> PathBuf {
        self.data_dir.join("sim_account.json")
    }

    fn lots_path(&self) -> PathBuf {
        self.data_dir.join("sim_lots.json")
    }

    fn load_json<T: DeserializeOwned>(&self, path: &Path) -> Result<T, StoreError> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    fn save_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<(), StoreError> {
        let text = serde_json::to_string_pretty(value)?;
        fs::write(path, text)?;
        Ok(())
    }

    /// 성과 조회 (대시보드/검증용).
    pub fn performance(&self) -> Result<Performance, StoreError> {
        let _guard = self.guard.lock().expect("store mutex poisoned");
        self.load_json(&self.performance_path())
    }

    /// 거래 기록 조회 (최신이 마지막).
    pub fn trade_history(&self) -> Result<Vec<TradeRecord>, StoreError> {
        let _guard = self.guard.lock().expect("store mutex poisoned");
        self.load_json(&self.trades_path())
    }

    /// AI 분석 기록 조회.
    pub fn analysis_history(&self) -> Result<Vec<AnalysisRecord>, StoreError> {
        let _guard = self.guard.lock().expect("store mutex poisoned");
        self.load_json(&self.analysis_path())
    }

    /// 거래 기록 반영으로 성과 집계 갱신.
    fn update_performance(&self, record: &TradeRecord) -> Result<(), StoreError> {
        let mut performance: Performance = self.load_json(&self.performance_path())?;

        performance.total_trades += 1;
        performance.total_pnl += record.pnl;

        // 개시/평가 이벤트만 승률 계산에 사용
        if matches!(
            record.position_action,
            PositionAction::Open | PositionAction::Close
        ) {
            performance.position_records.push(PositionEvent {
                timestamp: record.timestamp,
                action: record.position_action,
                side: record.position_side,
                price: record.price,
                amount: record.amount,
                pnl: record.pnl,
            });
        }

        recalculate_win_rate(&mut performance);

        let day = record.timestamp.format("%Y-%m-%d").to_string();
        *performance.daily_pnl.entry(day).or_insert(Decimal::ZERO) += record.pnl;

        let month = record.timestamp.format("%Y-%m").to_string();
        *performance
            .monthly_pnl
            .entry(month)
            .or_insert(Decimal::ZERO) += record.pnl;

        self.save_json(&self.performance_path(), &performance)
    }
}

/// 개시/평가 이벤트 짝짓기로 승률 재계산.
///
/// 같은 방향의 가장 오래된 개시 이벤트와 평가 이벤트를 짝지어
/// 완결 거래로 셉니다. 짝 없는 평가는 손익이 있을 때만 집계합니다.
fn recalculate_win_rate(performance: &mut Performance) {
    let mut completed = 0u64;
    let mut winning = 0u64;
    let mut open_events: BTreeMap<String, Vec<&PositionEvent>> = BTreeMap::new();

    for event in &performance.position_records {
        let side_key = match event.side {
            Some(side) => side.to_string(),
            None => continue,
        };

        match event.action {
            PositionAction::Open => {
                open_events.entry(side_key).or_default().push(event);
            }
            PositionAction::Close => {
                let matched = open_events
                    .get_mut(&side_key)
                    .map(|opens| {
                        if opens.is_empty() {
                            false
                        } else {
                            opens.remove(0);
                            true
                        }
                    })
                    .unwrap_or(false);

                if matched {
                    completed += 1;
                    if event.pnl > Decimal::ZERO {
                        winning += 1;
                    }
                } else if !event.pnl.is_zero() {
                    // 짝 없는 평가 (과거 데이터 또는 불일치): 손익이 있으면 집계
                    completed += 1;
                    if event.pnl > Decimal::ZERO {
                        winning += 1;
                    }
                }
            }
            _ => {}
        }
    }

    performance.completed_trades = completed;
    performance.winning_trades = winning;
}

impl TradeStore for FileStore {
    fn save_trade_record(&self, record: &TradeRecord) -> Result<(), StoreError> {
        let _guard = self.guard.lock().expect("store mutex poisoned");

        let mut trades: Vec<TradeRecord> = self.load_json(&self.trades_path())?;
        trades.push(record.clone());
        if trades.len() > MAX_TRADE_RECORDS {
            let excess = trades.len() - MAX_TRADE_RECORDS;
            trades.drain(..excess);
        }
        self.save_json(&self.trades_path(), &trades)?;

        self.update_performance(record)?;

        debug!(
            action = %record.position_action,
            pnl = %record.pnl,
            "거래 기록 저장"
        );
        Ok(())
    }

    fn save_analysis_record(&self, record: &AnalysisRecord) -> Result<(), StoreError> {
        let _guard = self.guard.lock().expect("store mutex poisoned");

        let mut history: Vec<AnalysisRecord> = self.load_json(&self.analysis_path())?;
        history.push(record.clone());
        if history.len() > MAX_ANALYSIS_RECORDS {
            let excess = history.len() - MAX_ANALYSIS_RECORDS;
            history.drain(..excess);
        }
        self.save_json(&self.analysis_path(), &history)
    }

    fn update_system_status(&self, status: &SystemStatus) -> Result<(), StoreError> {
        let _guard = self.guard.lock().expect("store mutex poisoned");
        self.save_json(&self.status_path(), status)
    }
}

impl AccountStore for FileStore {
    fn account(&self) -> Result<AccountSnapshot, StoreError> {
        let _guard = self.guard.lock().expect("store mutex poisoned");
        let account: SimAccount = self.load_json(&self.account_path())?;
        Ok(AccountSnapshot {
            balance: account.balance,
            equity: account.equity,
            used_margin: Decimal::ZERO,
        })
    }

    fn update_balance(&self, balance: Decimal, equity: Decimal) -> Result<(), StoreError> {
        let _guard = self.guard.lock().expect("store mutex poisoned");
        self.save_json(&self.account_path(), &SimAccount { balance, equity })
    }
}

impl LotStore for FileStore {
    fn open_lots(&self, side: PositionSide) -> Result<Vec<Lot>, StoreError> {
        let _guard = self.guard.lock().expect("store mutex poisoned");
        let book: LotBook = self.load_json(&self.lots_path())?;
        let mut lots: Vec<Lot> = book.lots.into_iter().filter(|l| l.side == side).collect();
        lots.sort_by_key(|l| l.opened_at);
        Ok(lots)
    }

    fn all_open_lots(&self) -> Result<Vec<Lot>, StoreError> {
        let _guard = self.guard.lock().expect("store mutex poisoned");
        let book: LotBook = self.load_json(&self.lots_path())?;
        Ok(book.lots)
    }

    fn append_open_lot(
        &self,
        side: PositionSide,
        amount: Decimal,
        entry_price: Decimal,
        opened_at: DateTime<Utc>,
    ) -> Result<Lot, StoreError> {
        let _guard = self.guard.lock().expect("store mutex poisoned");

        let mut book: LotBook = self.load_json(&self.lots_path())?;
        book.next_id += 1;
        let lot = Lot {
            id: book.next_id,
            side,
            amount,
            entry_price,
            opened_at,
        };
        book.lots.push(lot.clone());
        self.save_json(&self.lots_path(), &book)?;
        Ok(lot)
    }

    fn shrink_lot(&self, id: u64, new_amount: Decimal) -> Result<(), StoreError> {
        let _guard = self.guard.lock().expect("store mutex poisoned");

        let mut book: LotBook = self.load_json(&self.lots_path())?;
        let lot = book
            .lots
            .iter_mut()
            .find(|l| l.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("lot {}", id)))?;
        lot.amount = new_amount;
        self.save_json(&self.lots_path(), &book)
    }

    fn remove_lot(&self, id: u64) -> Result<(), StoreError> {
        let _guard = self.guard.lock().expect("store mutex poisoned");

        let mut book: LotBook = self.load_json(&self.lots_path())?;
        let before = book.lots.len();
        book.lots.retain(|l| l.id != id);
        if book.lots.len() == before {
            warn!(lot_id = id, "제거 대상 lot 없음");
        }
        self.save_json(&self.lots_path(), &book)
    }
}
