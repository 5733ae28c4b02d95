use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::execution::{ClosedTrade, ExitReason};
use crate::models::SignalDirection;

/// Record of a single round trip for analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub entry_price: f64,
    pub exit_price: f64,
    pub quantity: f64,
    pub pnl: f64,
    pub pnl_pct: f64,
    pub holding_period_minutes: i64,
    pub exit_reason: ExitReason,
}

impl From<&ClosedTrade> for TradeRecord {
    fn from(trade: &ClosedTrade) -> Self {
        Self {
            entry_time: trade.opened_at,
            exit_time: trade.closed_at,
            entry_price: trade.entry_price,
            exit_price: trade.exit_price,
            quantity: trade.quantity,
            pnl: trade.pnl,
            pnl_pct: trade.pnl_pct,
            holding_period_minutes: (trade.closed_at - trade.opened_at).num_minutes(),
            exit_reason: trade.exit_reason,
        }
    }
}

/// BUY or SELL marker for charting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalMarker {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    pub direction: SignalDirection,
}

/// Account value marked at a bar close
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub equity: f64,
}

/// Summary of a backtest run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestMetrics {
    // P&L
    pub total_pnl: f64,
    pub total_return_pct: f64,
    pub initial_equity: f64,
    pub final_equity: f64,
    pub fees_paid: f64,

    // Trade statistics
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub profit_factor: f64, // Total wins / total losses

    // Risk
    pub max_drawdown: f64,
    pub max_drawdown_pct: f64,

    pub avg_holding_period_minutes: f64,

    // Exit breakdown
    pub take_profit_exits: usize,
    pub stop_loss_exits: usize,
    pub signal_exits: usize,
    pub session_end_exits: usize,

    /// BUY signals skipped because the daily trade cap was reached
    pub circuit_breaker_hits: usize,
}

impl BacktestMetrics {
    /// `total_pnl` is realized PnL before fees; the return uses final equity,
    /// so fees show up there
    pub fn calculate(
        trades: &[TradeRecord],
        equity_curve: &[EquityPoint],
        initial_equity: f64,
        final_equity: f64,
        fees_paid: f64,
        circuit_breaker_hits: usize,
    ) -> Self {
        let total_trades = trades.len();
        let total_pnl: f64 = trades.iter().map(|t| t.pnl).sum();
        let total_return_pct = if initial_equity > 0.0 {
            (final_equity - initial_equity) / initial_equity * 100.0
        } else {
            0.0
        };

        let wins: Vec<f64> = trades.iter().map(|t| t.pnl).filter(|p| *p > 0.0).collect();
        let losses: Vec<f64> = trades
            .iter()
            .map(|t| t.pnl)
            .filter(|p| *p <= 0.0)
            .map(f64::abs)
            .collect();

        let total_wins: f64 = wins.iter().sum();
        let total_losses: f64 = losses.iter().sum();

        let win_rate = if total_trades > 0 {
            wins.len() as f64 / total_trades as f64 * 100.0
        } else {
            0.0
        };
        let avg_win = mean(&wins);
        let avg_loss = mean(&losses);

        let profit_factor = if total_losses > 0.0 {
            total_wins / total_losses
        } else if total_wins > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        let (max_drawdown, max_drawdown_pct) = Self::calculate_drawdown(equity_curve);

        let holding: Vec<f64> = trades
            .iter()
            .map(|t| t.holding_period_minutes as f64)
            .collect();

        let count = |reason: ExitReason| trades.iter().filter(|t| t.exit_reason == reason).count();

        Self {
            total_pnl,
            total_return_pct,
            initial_equity,
            final_equity,
            fees_paid,
            total_trades,
            winning_trades: wins.len(),
            losing_trades: losses.len(),
            win_rate,
            avg_win,
            avg_loss,
            profit_factor,
            max_drawdown,
            max_drawdown_pct,
            avg_holding_period_minutes: mean(&holding),
            take_profit_exits: count(ExitReason::TakeProfit),
            stop_loss_exits: count(ExitReason::StopLoss),
            signal_exits: count(ExitReason::Signal),
            session_end_exits: count(ExitReason::SessionEnd) + count(ExitReason::Shutdown),
            circuit_breaker_hits,
        }
    }

    /// Largest peak-to-trough fall of the marked equity curve
    fn calculate_drawdown(curve: &[EquityPoint]) -> (f64, f64) {
        let mut peak = f64::MIN;
        let mut max_dd = 0.0;
        let mut max_dd_pct = 0.0;

        for point in curve {
            if point.equity > peak {
                peak = point.equity;
            }
            let drawdown = peak - point.equity;
            if drawdown > max_dd {
                max_dd = drawdown;
                max_dd_pct = if peak > 0.0 { drawdown / peak * 100.0 } else { 0.0 };
            }
        }

        (max_dd, max_dd_pct)
    }

    /// Print a formatted report to stdout
    pub fn print_report(&self) {
        println!("\n=== BACKTEST PERFORMANCE REPORT ===\n");

        println!("P&L SUMMARY");
        println!("  Initial Equity:        ${:.2}", self.initial_equity);
        println!("  Final Equity:          ${:.2}", self.final_equity);
        println!(
            "  Realized P&L:          ${:.2} ({:+.2}% after fees)",
            self.total_pnl, self.total_return_pct
        );
        println!("  Fees Paid:             ${:.2}", self.fees_paid);

        println!("\nTRADE STATISTICS");
        println!("  Total Trades:          {}", self.total_trades);
        println!(
            "  Winning Trades:        {} ({:.1}%)",
            self.winning_trades, self.win_rate
        );
        println!("  Losing Trades:         {}", self.losing_trades);

        if self.total_trades > 0 {
            println!("  Average Win:           ${:.2}", self.avg_win);
            println!("  Average Loss:          ${:.2}", self.avg_loss);
            println!("  Profit Factor:         {:.2}", self.profit_factor);
            println!(
                "  Avg Holding Period:    {:.1} minutes",
                self.avg_holding_period_minutes
            );
            println!(
                "  Exits:                 {} TP / {} SL / {} signal / {} session",
                self.take_profit_exits,
                self.stop_loss_exits,
                self.signal_exits,
                self.session_end_exits
            );
        }

        println!("\nRISK");
        println!(
            "  Max Drawdown:          ${:.2} ({:.2}%)",
            self.max_drawdown, self.max_drawdown_pct
        );
        println!(
            "  Daily Cap Hits:        {}",
            self.circuit_breaker_hits
        );
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}
