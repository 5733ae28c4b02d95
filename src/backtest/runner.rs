use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::backtest::metrics::{BacktestMetrics, EquityPoint, SignalMarker, TradeRecord};
use crate::error::DataError;
use crate::execution::paper::DEFAULT_FEE_RATE;
use crate::execution::{AgentParts, CycleOutcome, ExitReason, PaperGateway, TradingAgent};
use crate::indicators::IndicatorSnapshot;
use crate::models::{PriceBar, SignalDirection};
use crate::Result;

/// Everything a chart of the run needs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestReport {
    pub symbol: String,
    pub timeframe: String,
    pub bars: Vec<PriceBar>,
    pub snapshots: Vec<IndicatorSnapshot>,
    pub markers: Vec<SignalMarker>,
    pub trades: Vec<TradeRecord>,
    pub equity_curve: Vec<EquityPoint>,
    pub metrics: BacktestMetrics,
}

impl BacktestReport {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Replays a bar series through the live agent cycle against a paper
/// gateway. Each bar in turn is the forming bar; the cycle runs at its
/// timestamp.
pub struct BacktestRunner {
    parts: AgentParts,
    initial_quote: f64,
    fee_rate: f64,
}

impl BacktestRunner {
    pub fn new(mut parts: AgentParts, initial_quote: f64) -> Self {
        // An open position at the end of the data is always closed out
        parts.settings.flatten_on_shutdown = true;
        Self {
            parts,
            initial_quote,
            fee_rate: DEFAULT_FEE_RATE,
        }
    }

    pub fn with_fee_rate(mut self, fee_rate: f64) -> Self {
        self.fee_rate = fee_rate;
        self
    }

    pub fn parts(&self) -> &AgentParts {
        &self.parts
    }

    pub async fn run(&self, bars: Vec<PriceBar>) -> Result<BacktestReport> {
        // Warm-up plus a bar to trade on
        let need = self.parts.indicators.min_history() + 2;
        if bars.len() < need {
            return Err(DataError::InsufficientHistory {
                have: bars.len(),
                need,
            }
            .into());
        }

        tracing::info!(
            "Starting backtest: {} bars of {} {}",
            bars.len(),
            self.parts.settings.symbol,
            self.parts.settings.timeframe
        );

        let first = bars[0].timestamp;
        let gateway = Arc::new(PaperGateway::new(
            bars.clone(),
            self.initial_quote,
            self.fee_rate,
            0,
        ));
        let mut agent = TradingAgent::new(Arc::clone(&gateway), self.parts.clone(), first);
        let min_matches = self.parts.signals.min_matches;

        let mut snapshots = Vec::new();
        let mut markers = Vec::new();
        let mut trades = Vec::new();
        let mut equity_curve = Vec::with_capacity(bars.len());
        let mut circuit_breaker_hits = 0;
        let mut now = first;

        loop {
            let Some(bar_time) = gateway.now().await else {
                break;
            };
            now = bar_time;

            let report = agent.run_cycle(now).await?;
            snapshots.extend(report.snapshots);

            match report.outcome {
                CycleOutcome::Entered { price, .. } => markers.push(SignalMarker {
                    timestamp: now,
                    price,
                    direction: SignalDirection::Buy,
                }),
                CycleOutcome::Exited(ref trade) => {
                    markers.push(SignalMarker {
                        timestamp: now,
                        price: trade.exit_price,
                        direction: SignalDirection::Sell,
                    });
                    trades.push(TradeRecord::from(trade));
                }
                _ => {}
            }

            // A qualifying setup gated only by the daily cap
            if let Some(ref signal) = report.signal {
                if !signal.is_buy()
                    && signal.matched_condition_count >= min_matches
                    && agent.positions().is_flat()
                    && agent.clock().is_trading_allowed(now)
                    && agent.positions().check_limits().is_err()
                {
                    circuit_breaker_hits += 1;
                }
            }

            equity_curve.push(EquityPoint {
                timestamp: now,
                equity: gateway.equity().await,
            });

            if !gateway.advance().await {
                break;
            }
        }

        if let CycleOutcome::Exited(trade) = agent.flatten(ExitReason::Shutdown, now).await? {
            markers.push(SignalMarker {
                timestamp: now,
                price: trade.exit_price,
                direction: SignalDirection::Sell,
            });
            trades.push(TradeRecord::from(&trade));
            if let Some(last) = equity_curve.last_mut() {
                last.equity = gateway.equity().await;
            }
        }

        let final_equity = gateway.equity().await;
        let metrics = BacktestMetrics::calculate(
            &trades,
            &equity_curve,
            self.initial_quote,
            final_equity,
            gateway.fees_paid().await,
            circuit_breaker_hits,
        );

        tracing::info!(
            "Backtest complete: {} trades, P&L: ${:.2} ({:+.2}%)",
            metrics.total_trades,
            metrics.total_pnl,
            metrics.total_return_pct
        );

        Ok(BacktestReport {
            symbol: self.parts.settings.symbol.clone(),
            timeframe: self.parts.settings.timeframe.clone(),
            bars,
            snapshots,
            markers,
            trades,
            equity_curve,
            metrics,
        })
    }

    /// Run backtest and print report
    pub async fn run_and_report(
        &self,
        bars: Vec<PriceBar>,
        scenario_name: &str,
    ) -> Result<BacktestReport> {
        println!("\nRunning backtest: {}", scenario_name);
        println!("   Pair: {}", self.parts.settings.symbol);
        println!("   Bars: {}", bars.len());
        println!("   Initial Equity: ${:.2}", self.initial_quote);

        let report = self.run(bars).await?;
        report.metrics.print_report();
        Ok(report)
    }
}
