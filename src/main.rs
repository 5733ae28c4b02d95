use anyhow::{Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use clap::{Parser, Subcommand};
use daytrader::backtest::{
    BacktestMetrics, BacktestReport, BacktestRunner, MarketScenario, SyntheticDataGenerator,
};
use daytrader::execution::paper::DEFAULT_FEE_RATE;
use daytrader::execution::{AgentParts, PaperGateway, RateLimitedGateway, TradingAgent};
use daytrader::models::PriceBar;
use daytrader::persistence::{StateStore, TradeJournal};
use daytrader::BotConfig;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "daytrader", about = "Intraday single-pair trading agent")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the polling loop against a paper account fed with synthetic bars
    Run {
        #[arg(long, default_value = "sideways")]
        scenario: String,
        #[arg(long, default_value_t = 42)]
        seed: u64,
        /// Starting quote balance of the paper account
        #[arg(long, default_value_t = 10_000.0)]
        balance: f64,
    },
    /// Smoke test (balance and market data) without trading
    Check {
        #[arg(long, default_value = "sideways")]
        scenario: String,
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
    /// Replay synthetic scenarios through the trading cycle
    Backtest {
        /// One scenario; all of them when omitted
        #[arg(long)]
        scenario: Option<String>,
        #[arg(long, default_value_t = 42)]
        seed: u64,
        #[arg(long, default_value_t = 960)]
        bars: usize,
        #[arg(long, default_value_t = 10_000.0)]
        balance: f64,
        /// Overrides RISK_PER_TRADE for this run
        #[arg(long)]
        risk_per_trade: Option<f64>,
        /// Write snapshots, markers, trades and metrics as JSON
        #[arg(long)]
        json: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging();

    let cli = Cli::parse();
    let config = BotConfig::load().context("Failed to load configuration")?;
    tracing::info!("Configuration: {}", config.digest());

    match cli.command {
        Command::Run {
            scenario,
            seed,
            balance,
        } => run(&config, &scenario, seed, balance).await,
        Command::Check { scenario, seed } => check(&config, &scenario, seed).await,
        Command::Backtest {
            scenario,
            seed,
            bars,
            balance,
            risk_per_trade,
            json,
        } => backtest(&config, scenario, seed, bars, balance, risk_per_trade, json).await,
    }
}

fn setup_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("daytrader=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn parse_scenario(name: &str) -> Result<MarketScenario> {
    MarketScenario::parse(name).with_context(|| {
        let known: Vec<&str> = MarketScenario::ALL.iter().map(|s| s.name()).collect();
        format!("Unknown scenario '{}', expected one of {}", name, known.join(", "))
    })
}

/// History ending at the current bar plus a week of bars still to come
fn paper_market(
    config: &BotConfig,
    scenario: MarketScenario,
    seed: u64,
    now: DateTime<Utc>,
) -> Result<(Vec<PriceBar>, usize)> {
    let minutes = config.timeframe_minutes()?;
    let history = config.history_bars;
    let ahead = (7 * 24 * 60 / minutes).max(1) as usize;

    let aligned = now.timestamp() / 60 / minutes * minutes * 60;
    let current = DateTime::from_timestamp(aligned, 0).context("Clock out of range")?;
    let start = current - ChronoDuration::minutes(minutes * (history as i64 - 1));

    let bars =
        SyntheticDataGenerator::new(seed).generate_from(start, scenario, history + ahead, minutes);
    Ok((bars, history - 1))
}

async fn run(config: &BotConfig, scenario: &str, seed: u64, balance: f64) -> Result<()> {
    let scenario = parse_scenario(scenario)?;
    let now = Utc::now();
    let (bars, cursor) = paper_market(config, scenario, seed, now)?;
    let bar_minutes = config.timeframe_minutes()?;

    tracing::info!(
        "🚀 Paper trading {} on a {} market ({} bars, {:.2} quote)",
        config.symbol,
        scenario.name(),
        bars.len(),
        balance
    );

    let paper = Arc::new(PaperGateway::new(bars, balance, DEFAULT_FEE_RATE, cursor));
    let gateway = RateLimitedGateway::new(Arc::clone(&paper), config.requests_per_minute);

    let parts = AgentParts::from_config(config)?;
    let journal = TradeJournal::in_dir(&config.state_dir)?;
    let store = StateStore::in_dir(&config.state_dir)?;
    let mut agent = TradingAgent::new(gateway, parts, now)
        .with_persistence(journal, store)
        .context("Failed to restore saved state")?;

    agent.start().await.context("Startup self-test failed")?;

    // The synthetic market moves on one bar per timeframe
    let market = {
        let paper = Arc::clone(&paper);
        tokio::spawn(async move {
            let period = std::time::Duration::from_secs(bar_minutes as u64 * 60);
            let mut ticker =
                tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                ticker.tick().await;
                if !paper.advance().await {
                    tracing::warn!("Synthetic market data exhausted");
                    break;
                }
            }
        })
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("⚠️  Received Ctrl+C, shutting down...");
            let _ = shutdown_tx.send(true);
        }
    });

    tracing::info!("Press Ctrl+C to stop...");
    let result = agent.run(shutdown_rx).await;
    market.abort();

    tracing::info!(
        "👋 Paper account equity {:.2} (fees {:.2})",
        paper.equity().await,
        paper.fees_paid().await
    );
    result.context("Trading loop halted")?;
    Ok(())
}

async fn check(config: &BotConfig, scenario: &str, seed: u64) -> Result<()> {
    let scenario = parse_scenario(scenario)?;
    let now = Utc::now();
    let (bars, cursor) = paper_market(config, scenario, seed, now)?;

    let paper = PaperGateway::new(bars, 10_000.0, DEFAULT_FEE_RATE, cursor);
    let gateway = RateLimitedGateway::new(paper, config.requests_per_minute);
    let mut agent = TradingAgent::new(gateway, AgentParts::from_config(config)?, now);

    agent.start().await.context("Self-test failed")?;
    println!("✅ Self-test passed ({} on {})", config.symbol, config.exchange_id);
    Ok(())
}

async fn backtest(
    config: &BotConfig,
    scenario: Option<String>,
    seed: u64,
    bars: usize,
    balance: f64,
    risk_per_trade: Option<f64>,
    json: Option<PathBuf>,
) -> Result<()> {
    let scenarios = match scenario {
        Some(name) => vec![parse_scenario(&name)?],
        None => MarketScenario::ALL.to_vec(),
    };

    let mut parts = AgentParts::from_config(config)?;
    if let Some(risk) = risk_per_trade {
        anyhow::ensure!(risk > 0.0 && risk <= 1.0, "--risk-per-trade must be in (0, 1]");
        parts.risk.risk_per_trade = risk;
    }
    let runner = BacktestRunner::new(parts, balance);
    let minutes = config.timeframe_minutes()?;

    let mut reports: Vec<(MarketScenario, BacktestReport)> = Vec::new();
    for scenario in scenarios {
        let series = SyntheticDataGenerator::new(seed).generate(scenario, bars, minutes);
        match runner.run_and_report(series, scenario.name()).await {
            Ok(report) => reports.push((scenario, report)),
            Err(e) => eprintln!("❌ Backtest failed for {}: {}", scenario.name(), e),
        }
    }

    let summary: Vec<(&str, &BacktestMetrics)> = reports
        .iter()
        .map(|(scenario, report)| (scenario.name(), &report.metrics))
        .collect();
    print_summary_comparison(&summary);

    if let Some(path) = json {
        let json = if reports.len() == 1 {
            reports[0].1.to_json()?
        } else {
            let all: Vec<&BacktestReport> = reports.iter().map(|(_, r)| r).collect();
            serde_json::to_string_pretty(&all)?
        };
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Report written to {}", path.display());
    }

    Ok(())
}

fn print_summary_comparison(results: &[(&str, &BacktestMetrics)]) {
    println!("\n=== SCENARIO COMPARISON ===\n");
    println!(
        "{:<12} {:>10} {:>10} {:>8} {:>8} {:>8}",
        "Scenario", "P&L", "Return%", "Trades", "Win%", "MaxDD%"
    );
    println!("{}", "-".repeat(62));

    for (name, metrics) in results {
        println!(
            "{:<12} {:>10.2} {:>10.2} {:>8} {:>8.1} {:>8.2}",
            name,
            metrics.total_pnl,
            metrics.total_return_pct,
            metrics.total_trades,
            metrics.win_rate,
            metrics.max_drawdown_pct
        );
    }
    println!();
}
