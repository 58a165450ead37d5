use std::{collections::HashMap, fmt};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::{
    event::{MarketBar, MergedEvent, NewsEvent},
    shared::{SentimentScore, Symbol},
};

pub(crate) mod config;
pub(crate) mod error;
mod state;

pub use config::{ScoringAlignment, StrategyConfig};

use error::StrategyConfigError;
use state::SymbolState;

/// Desired directional exposure for one symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Direction {
    Long,
    Short,
    Flat,
}

/// A strategy's desired directional exposure, prior to risk sizing.
///
/// Ephemeral: consumed (and possibly discarded) by the risk filter, never
/// persisted standalone.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalIntent {
    pub time: DateTime<Utc>,
    pub symbol: Symbol,
    pub direction: Direction,
    /// Conviction in `[0, 1]`, the absolute sentiment average capped at 1.
    pub strength: f64,
}

impl fmt::Display for SignalIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} strength={:.4}",
            self.time, self.symbol, self.direction, self.strength
        )
    }
}

/// Per-symbol signal state machine over the merged event stream.
///
/// States are {flat, long, short} per symbol. A transition fires only when
/// the exponentially-weighted sentiment average crosses the configured entry
/// threshold AND the short-term return over the configured bar window agrees
/// with the direction (dual confirmation; sentiment alone is noisy). Open
/// states revert to flat once the average decays inside the exit threshold.
/// Redundant re-signals are never emitted.
///
/// All state advances in event time only, so identical event sequences with
/// identical configuration produce bit-identical intent sequences in
/// backtest and live runs.
pub struct StrategyStateMachine {
    config: StrategyConfig,
    symbols: HashMap<Symbol, SymbolState>,
}

impl StrategyStateMachine {
    /// Creates a state machine, validating the configuration up front.
    pub fn new(config: StrategyConfig) -> Result<Self, StrategyConfigError> {
        config.validate()?;

        Ok(Self {
            config,
            symbols: HashMap::new(),
        })
    }

    fn symbol_state(&mut self, symbol: &Symbol) -> &mut SymbolState {
        let config = &self.config;

        self.symbols.entry(symbol.clone()).or_insert_with(|| {
            SymbolState::new(config.half_life(), config.return_window())
        })
    }

    /// Advances state with one merged event, returning an intent if a
    /// transition fired.
    pub fn on_event(&mut self, event: &MergedEvent) -> Option<SignalIntent> {
        match event {
            MergedEvent::Bar(bar) => self.on_bar(bar),
            MergedEvent::News(news) => self.on_news(news),
        }
    }

    fn on_bar(&mut self, bar: &MarketBar) -> Option<SignalIntent> {
        let symbol = bar.symbol.clone();
        let state = self.symbol_state(&symbol);
        state.push_close(bar.close);

        // Bars always re-evaluate: the average decays between news events,
        // which is what eventually flattens a stale open state.
        self.evaluate(&symbol, bar.time)
    }

    fn on_news(&mut self, news: &NewsEvent) -> Option<SignalIntent> {
        let score = match news.sentiment {
            Some(score) => score,
            // Upstream scoring guarantees a score; treat a gap as neutral
            // rather than crashing the pipeline.
            None => {
                warn!(symbol = %news.symbol, source = %news.source,
                    "news event reached strategy unscored, treating as neutral");
                SentimentScore::NEUTRAL
            }
        };

        let symbol = news.symbol.clone();
        self.symbol_state(&symbol).ewma.update(news.time, score);

        match self.config.scoring_alignment() {
            ScoringAlignment::SameBar => self.evaluate(&symbol, news.time),
            ScoringAlignment::NextBar => None,
        }
    }

    /// Applies the dual-confirmation transition rule at the given event time.
    fn evaluate(&mut self, symbol: &Symbol, time: DateTime<Utc>) -> Option<SignalIntent> {
        let buy = self.config.buy_threshold().as_f64();
        let sell = self.config.sell_threshold().as_f64();
        let exit = self.config.exit_threshold();

        let state = self.symbols.get_mut(symbol)?;
        let average = state.ewma.value_at(time);
        let window_return = state.window_return();

        let target = if average >= buy {
            Direction::Long
        } else if average <= -sell {
            Direction::Short
        } else if average.abs() < exit {
            Direction::Flat
        } else {
            // Between exit and entry levels: hold whatever is signaled.
            return None;
        };

        if target == state.signaled {
            return None;
        }

        // Entries need the price regime to agree; exits do not.
        let confirmed = match target {
            Direction::Long => window_return.is_some_and(|r| r >= 0.0),
            Direction::Short => window_return.is_some_and(|r| r <= 0.0),
            Direction::Flat => true,
        };

        if !confirmed {
            debug!(%symbol, %time, average, ?window_return,
                "sentiment crossed threshold without price confirmation");
            return None;
        }

        state.signaled = target;

        Some(SignalIntent {
            time,
            symbol: symbol.clone(),
            direction: target,
            strength: average.abs().min(1.0),
        })
    }
}

#[cfg(test)]
mod tests;
