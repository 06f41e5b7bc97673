//! LLM 기반 무기한 선물 트레이딩 루프 CLI.

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use perp_core::AccountStore;
use perp_data::FileStore;
use perp_signal::{DeepSeekClient, DeepSeekConfig, LlmClient};

mod clock;
mod config;
mod cycle;

use config::BotConfig;
use cycle::{CycleResult, TradingBot};

/// 주기 성공 후 다음 경계 확인까지의 대기.
const IDLE_WAIT: Duration = Duration::from_secs(60);
/// 주기 실패 후 재시도까지의 대기.
const FAILURE_WAIT: Duration = Duration::from_secs(300);

#[derive(Parser)]
#[command(name = "perp-runner", about = "LLM 기반 무기한 선물 트레이딩 루프")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// 트레이딩 루프 실행
    Run {
        /// 실행 모드 (sim | live)
        #[arg(long, default_value = "sim")]
        mode: String,
        /// 한 주기만 실행하고 종료
        #[arg(long)]
        once: bool,
    },
    /// 저장된 시스템 상태와 성과 출력
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            tracing_subscriber::EnvFilter::new("info,perp_runner=info")
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run { mode, once } => run(&mode, once).await,
        Command::Status => status(),
    }
}

async fn run(mode: &str, once: bool) -> anyhow::Result<()> {
    let config = BotConfig::from_env()?;

    match mode {
        "sim" => {}
        "live" => {
            // 실거래 게이트웨이는 통합 지점: OrderGateway 구현을 주입해야 한다
            anyhow::bail!(
                "실거래 게이트웨이가 구성되지 않았습니다. \
                 OrderGateway 구현을 주입한 빌드가 필요합니다 (현재는 sim 모드만 지원)"
            );
        }
        other => anyhow::bail!("알 수 없는 모드: {} (sim | live)", other),
    }

    info!(
        symbol = %config.symbol,
        timeframe = %config.timeframe,
        interval_minutes = config.interval_minutes,
        ai_directed = config.ai_directed_sizing,
        "시뮬레이션 트레이딩 봇 시작"
    );

    let client: Arc<dyn LlmClient> = Arc::new(DeepSeekClient::new(DeepSeekConfig::new(
        config.deepseek_api_key.clone(),
    ))?);

    let interval_minutes = config.interval_minutes;
    let mut bot = TradingBot::new_sim(config, client)?;

    loop {
        clock::wait_for_next_boundary(interval_minutes).await;

        let result = bot.run_cycle().await;

        if once {
            info!("단일 주기 실행 완료");
            return Ok(());
        }

        match result {
            CycleResult::Completed => {
                info!("주기 완료 - 다음 경계 대기");
                tokio::time::sleep(IDLE_WAIT).await;
            }
            CycleResult::Skipped => {
                error!("주기 건너뜀 - {}초 후 재시도", FAILURE_WAIT.as_secs());
                tokio::time::sleep(FAILURE_WAIT).await;
            }
            CycleResult::Exhausted => {
                info!("리플레이 종료 - 루프 정지");
                return Ok(());
            }
        }
    }
}

fn status() -> anyhow::Result<()> {
    let config = BotConfig::from_env()?;
    let store = FileStore::new(&config.data_dir, config.initial_balance)?;

    let account = store.account()?;
    println!("잔고: {:.2} USDT / 평가 자산: {:.2} USDT", account.balance, account.equity);

    let performance = store.performance()?;
    println!(
        "총 기록 {}건 / 완결 거래 {}건 / 승리 {}건 / 누적 손익 {:+.2} USDT",
        performance.total_trades,
        performance.completed_trades,
        performance.winning_trades,
        performance.total_pnl,
    );

    let trades = store.trade_history()?;
    for record in trades.iter().rev().take(10) {
        println!(
            "{} | {} | {} | {:.2}장 @ {:.2} | 손익 {:+.2}",
            record.timestamp.format("%Y-%m-%d %H:%M:%S"),
            record.signal,
            record.position_action,
            record.amount,
            record.price,
            record.pnl,
        );
    }

    Ok(())
}
