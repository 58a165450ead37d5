use crate::shared::{HalfLife, SentimentThreshold};

use super::error::StrategyConfigError;

/// When a news event's effect on the sentiment average becomes eligible to
/// trigger a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoringAlignment {
    /// Evaluate against the bar state current at the news timestamp.
    SameBar,
    /// Defer evaluation until the symbol's next bar arrives.
    NextBar,
}

/// Configuration for the strategy state machine.
#[derive(Clone, Debug)]
pub struct StrategyConfig {
    buy_threshold: SentimentThreshold,
    sell_threshold: SentimentThreshold,
    exit_threshold: f64,
    half_life: HalfLife,
    return_window: usize,
    scoring_alignment: ScoringAlignment,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            buy_threshold: SentimentThreshold::try_from(0.5)
                .expect("default buy threshold is valid"),
            sell_threshold: SentimentThreshold::try_from(0.5)
                .expect("default sell threshold is valid"),
            exit_threshold: 0.1,
            half_life: HalfLife::try_from(chrono::Duration::minutes(30))
                .expect("default half-life is valid"),
            return_window: 3,
            scoring_alignment: ScoringAlignment::SameBar,
        }
    }
}

impl StrategyConfig {
    /// Returns the sentiment average level at or above which a long entry is
    /// considered.
    pub fn buy_threshold(&self) -> SentimentThreshold {
        self.buy_threshold
    }

    /// Returns the sentiment average level at or below whose negative a short
    /// entry is considered.
    pub fn sell_threshold(&self) -> SentimentThreshold {
        self.sell_threshold
    }

    /// Returns the absolute sentiment average level below which an open state
    /// reverts to flat.
    pub fn exit_threshold(&self) -> f64 {
        self.exit_threshold
    }

    /// Returns the half-life of the sentiment average.
    pub fn half_life(&self) -> HalfLife {
        self.half_life
    }

    /// Returns how many recent bars the short-term return confirmation spans.
    pub fn return_window(&self) -> usize {
        self.return_window
    }

    /// Returns the configured scoring alignment.
    pub fn scoring_alignment(&self) -> ScoringAlignment {
        self.scoring_alignment
    }

    /// Sets the long entry threshold.
    ///
    /// Default: `0.5`
    pub fn with_buy_threshold(mut self, threshold: SentimentThreshold) -> Self {
        self.buy_threshold = threshold;
        self
    }

    /// Sets the short entry threshold.
    ///
    /// Default: `0.5`
    pub fn with_sell_threshold(mut self, threshold: SentimentThreshold) -> Self {
        self.sell_threshold = threshold;
        self
    }

    /// Sets the exit threshold.
    ///
    /// Default: `0.1`
    pub fn with_exit_threshold(mut self, threshold: f64) -> Self {
        self.exit_threshold = threshold;
        self
    }

    /// Sets the sentiment average half-life.
    ///
    /// Default: `30` minutes
    pub fn with_half_life(mut self, half_life: HalfLife) -> Self {
        self.half_life = half_life;
        self
    }

    /// Sets the short-term return window, in bars.
    ///
    /// Default: `3`
    pub fn with_return_window(mut self, bars: usize) -> Self {
        self.return_window = bars;
        self
    }

    /// Sets the scoring alignment.
    ///
    /// Default: [`ScoringAlignment::SameBar`]
    pub fn with_scoring_alignment(mut self, alignment: ScoringAlignment) -> Self {
        self.scoring_alignment = alignment;
        self
    }

    /// Cross-field validation, run once at state machine construction so
    /// configuration errors never surface mid-stream.
    pub(crate) fn validate(&self) -> Result<(), StrategyConfigError> {
        if !self.exit_threshold.is_finite() || self.exit_threshold < 0.0 {
            return Err(StrategyConfigError::InvalidExitThreshold {
                value: self.exit_threshold,
            });
        }

        let min_entry = self
            .buy_threshold
            .as_f64()
            .min(self.sell_threshold.as_f64());

        if self.exit_threshold >= min_entry {
            return Err(StrategyConfigError::ExitAboveEntry {
                exit: self.exit_threshold,
                min_entry,
            });
        }

        if self.return_window == 0 {
            return Err(StrategyConfigError::ReturnWindowTooShort {
                value: self.return_window,
            });
        }

        Ok(())
    }
}
