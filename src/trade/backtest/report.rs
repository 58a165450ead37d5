use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    order::{OrderSide, Position},
    shared::Symbol,
};

/// One equity curve sample, taken after each processed bar.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EquityPoint {
    pub time: DateTime<Utc>,
    pub equity: f64,
}

/// One executed fill of the backtest, in execution order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeRecord {
    pub time: DateTime<Utc>,
    pub symbol: Symbol,
    pub side: OrderSide,
    pub quantity: u64,
    pub price: f64,
}

/// Aggregate statistics over one backtest run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestSummary {
    pub events_processed: u64,
    pub orders_submitted: u64,
    pub intents_suppressed: u64,
    pub fills: u64,
    pub fees_paid: f64,
    pub initial_equity: f64,
    pub final_equity: f64,
    /// Largest peak-to-trough equity decline, as a fraction of the peak.
    pub max_drawdown: f64,
}

/// Output of a backtest run: ordered trade list, equity curve, and summary
/// statistics.
#[derive(Debug, Clone, Serialize)]
pub struct BacktestReport {
    pub equity_curve: Vec<EquityPoint>,
    pub trades: Vec<TradeRecord>,
    pub final_positions: Vec<Position>,
    pub summary: BacktestSummary,
}

/// Accumulates report data while the replay runs.
pub(super) struct ReportBuilder {
    initial_equity: f64,
    equity_curve: Vec<EquityPoint>,
    trades: Vec<TradeRecord>,
    events_processed: u64,
    orders_submitted: u64,
    intents_suppressed: u64,
    fees_paid: f64,
}

impl ReportBuilder {
    pub fn new(initial_equity: f64) -> Self {
        Self {
            initial_equity,
            equity_curve: Vec::new(),
            trades: Vec::new(),
            events_processed: 0,
            orders_submitted: 0,
            intents_suppressed: 0,
            fees_paid: 0.0,
        }
    }

    pub fn event(&mut self) {
        self.events_processed += 1;
    }

    pub fn order_submitted(&mut self) {
        self.orders_submitted += 1;
    }

    pub fn intent_suppressed(&mut self) {
        self.intents_suppressed += 1;
    }

    pub fn fill(&mut self, trade: TradeRecord, fee: f64) {
        self.fees_paid += fee;
        self.trades.push(trade);
    }

    pub fn fees_paid(&self) -> f64 {
        self.fees_paid
    }

    pub fn equity_point(&mut self, time: DateTime<Utc>, equity: f64) {
        self.equity_curve.push(EquityPoint { time, equity });
    }

    pub fn finish(self, final_positions: Vec<Position>) -> BacktestReport {
        let final_equity = self
            .equity_curve
            .last()
            .map(|point| point.equity)
            .unwrap_or(self.initial_equity);

        let max_drawdown = max_drawdown(&self.equity_curve);

        BacktestReport {
            summary: BacktestSummary {
                events_processed: self.events_processed,
                orders_submitted: self.orders_submitted,
                intents_suppressed: self.intents_suppressed,
                fills: self.trades.len() as u64,
                fees_paid: self.fees_paid,
                initial_equity: self.initial_equity,
                final_equity,
                max_drawdown,
            },
            equity_curve: self.equity_curve,
            trades: self.trades,
            final_positions,
        }
    }
}

fn max_drawdown(curve: &[EquityPoint]) -> f64 {
    let mut peak = f64::MIN;
    let mut worst = 0.0_f64;

    for point in curve {
        peak = peak.max(point.equity);

        if peak > 0.0 {
            worst = worst.max((peak - point.equity) / peak);
        }
    }

    worst
}
