use std::collections::VecDeque;

use chrono::{DateTime, Utc};

use crate::shared::{HalfLife, SentimentScore};

use super::Direction;

/// Exponentially-weighted sentiment average with a configurable half-life.
///
/// Decay is measured in event time, so the same event sequence produces the
/// same averages in backtest replay and live operation.
#[derive(Debug, Clone)]
pub(crate) struct SentimentEwma {
    half_life: HalfLife,
    value: f64,
    last_update: Option<DateTime<Utc>>,
}

impl SentimentEwma {
    pub fn new(half_life: HalfLife) -> Self {
        Self {
            half_life,
            value: 0.0,
            last_update: None,
        }
    }

    fn decay_factor(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
        let dt = (to - from).num_milliseconds() as f64 / 1_000.0;

        if dt <= 0.0 {
            // Same-timestamp scores blend with equal weight.
            return 0.5;
        }

        0.5_f64.powf(dt / self.half_life.as_secs_f64())
    }

    /// Folds a new score into the average at the given event time.
    pub fn update(&mut self, time: DateTime<Utc>, score: SentimentScore) {
        match self.last_update {
            None => self.value = score.as_f64(),
            Some(last) => {
                let w = self.decay_factor(last, time);
                self.value = w * self.value + (1.0 - w) * score.as_f64();
            }
        }

        self.last_update = Some(time);
    }

    /// Returns the average decayed toward neutral up to the given event time.
    pub fn value_at(&self, time: DateTime<Utc>) -> f64 {
        match self.last_update {
            None => 0.0,
            Some(last) if time <= last => self.value,
            Some(last) => self.value * self.decay_factor(last, time),
        }
    }
}

/// Per-symbol strategy state: the sentiment average, the recent close window
/// for the short-term return confirmation, and the last signaled direction.
#[derive(Debug, Clone)]
pub(crate) struct SymbolState {
    pub ewma: SentimentEwma,
    closes: VecDeque<f64>,
    window: usize,
    pub signaled: Direction,
}

impl SymbolState {
    pub fn new(half_life: HalfLife, window: usize) -> Self {
        Self {
            ewma: SentimentEwma::new(half_life),
            closes: VecDeque::with_capacity(window + 1),
            window,
            signaled: Direction::Flat,
        }
    }

    /// Records a bar close, keeping the oldest close needed to span the
    /// configured return window.
    pub fn push_close(&mut self, close: f64) {
        self.closes.push_back(close);

        while self.closes.len() > self.window + 1 {
            self.closes.pop_front();
        }
    }

    /// Short-term return over the window, latest close relative to the
    /// oldest retained close. `None` until at least two closes are recorded.
    pub fn window_return(&self) -> Option<f64> {
        if self.closes.len() < 2 {
            return None;
        }

        let oldest = *self.closes.front().expect("checked non-empty");
        let latest = *self.closes.back().expect("checked non-empty");

        if oldest == 0.0 {
            return Some(0.0);
        }

        Some((latest - oldest) / oldest)
    }
}
