use std::{
    fmt,
    panic::AssertUnwindSafe,
    sync::Arc,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::time;
use tracing::warn;

use crate::shared::{SentimentScore, Symbol};

pub mod error;

use error::{MarketDataError, ScoringError};

/// A single OHLCV market-data record for one time interval.
///
/// Immutable once produced. Ordered by `time`; ties within one producer are
/// broken by the producer-assigned sequence number `seq`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketBar {
    pub symbol: Symbol,
    pub time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub seq: u64,
}

impl MarketBar {
    /// Creates a validated bar. Rejects non-finite prices, negative volume,
    /// and OHLC values inconsistent with the `[low, high]` range.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        symbol: Symbol,
        time: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
        seq: u64,
    ) -> Result<Self, MarketDataError> {
        for (field, value) in [
            ("open", open),
            ("high", high),
            ("low", low),
            ("close", close),
            ("volume", volume),
        ] {
            if !value.is_finite() {
                return Err(MarketDataError::NotFinite { time, field });
            }

            if value < 0.0 {
                return Err(MarketDataError::Negative { time, field });
            }
        }

        if high < low {
            return Err(MarketDataError::HighBelowLow { time, high, low });
        }

        for (field, value) in [("open", open), ("close", close)] {
            if value < low || value > high {
                return Err(MarketDataError::PriceOutsideRange { time, field, value });
            }
        }

        Ok(Self {
            symbol,
            time,
            open,
            high,
            low,
            close,
            volume,
            seq,
        })
    }

    /// Short-term return of this bar, close relative to open.
    pub fn bar_return(&self) -> f64 {
        if self.open == 0.0 {
            return 0.0;
        }
        (self.close - self.open) / self.open
    }
}

impl fmt::Display for MarketBar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} o={} h={} l={} c={} v={}",
            self.symbol, self.time, self.open, self.high, self.low, self.close, self.volume
        )
    }
}

/// A timestamped news article record, optionally carrying a precomputed
/// sentiment score.
///
/// Immutable. A missing score is computed (with a bounded timeout) before the
/// event reaches the strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsEvent {
    pub source: String,
    pub symbol: Symbol,
    pub time: DateTime<Utc>,
    pub text: String,
    pub sentiment: Option<SentimentScore>,
    pub seq: u64,
}

impl fmt::Display for NewsEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.sentiment {
            Some(score) => write!(f, "{} {} [{}] score={}", self.symbol, self.time, self.source, score),
            None => write!(f, "{} {} [{}] unscored", self.symbol, self.time, self.source),
        }
    }
}

/// One event of the merged stream.
///
/// At equal timestamps bars sort before news, so price state is current when
/// sentiment is interpreted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MergedEvent {
    Bar(MarketBar),
    News(NewsEvent),
}

impl MergedEvent {
    /// Returns the event timestamp.
    pub fn time(&self) -> DateTime<Utc> {
        match self {
            Self::Bar(bar) => bar.time,
            Self::News(news) => news.time,
        }
    }

    /// Returns the producer-assigned sequence number.
    pub fn seq(&self) -> u64 {
        match self {
            Self::Bar(bar) => bar.seq,
            Self::News(news) => news.seq,
        }
    }

    /// Tie-break rank at equal timestamps: bars before news.
    pub(crate) fn kind_rank(&self) -> u8 {
        match self {
            Self::Bar(_) => 0,
            Self::News(_) => 1,
        }
    }
}

impl From<MarketBar> for MergedEvent {
    fn from(value: MarketBar) -> Self {
        Self::Bar(value)
    }
}

impl From<NewsEvent> for MergedEvent {
    fn from(value: NewsEvent) -> Self {
        Self::News(value)
    }
}

impl fmt::Display for MergedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bar(bar) => write!(f, "bar {bar}"),
            Self::News(news) => write!(f, "news {news}"),
        }
    }
}

/// Producer of timestamped market bars with monotonically non-decreasing
/// timestamps.
///
/// Returning `Ok(None)` signals end of stream (a finite recorded log in
/// backtest mode; never expected from a healthy live feed).
#[async_trait]
pub trait BarProducer: Send + Sync {
    /// A stable name identifying this producer, used for watermark
    /// persistence and degraded-mode reporting.
    fn name(&self) -> &str;

    /// Returns the next bar, or `None` at end of stream.
    async fn next_bar(&mut self) -> Result<Option<MarketBar>, MarketDataError>;

    /// Restarts the producer so that the next returned bar is strictly after
    /// `watermark`. Default implementation is a no-op for producers that are
    /// already resumable externally.
    async fn seek(&mut self, watermark: DateTime<Utc>) -> Result<(), MarketDataError> {
        let _ = watermark;
        Ok(())
    }
}

/// Producer of timestamped news events with monotonically non-decreasing
/// timestamps.
#[async_trait]
pub trait NewsProducer: Send + Sync {
    /// A stable name identifying this producer, used for watermark
    /// persistence and degraded-mode reporting.
    fn name(&self) -> &str;

    /// Returns the next news event, or `None` at end of stream.
    async fn next_event(&mut self) -> Result<Option<NewsEvent>, MarketDataError>;
}

/// Pure sentiment scoring function: article text to a score in `[-1, 1]`.
///
/// Implementations must be side-effect free; the engine treats the scorer as
/// a black box and never retries a scoring call.
#[async_trait]
pub trait SentimentScorer: Send + Sync {
    async fn score(&self, text: &str) -> Result<SentimentScore, String>;
}

/// Scorer wrapper enforcing the bounded scoring deadline and panic isolation.
///
/// A timeout, error, or panic downgrades the event to the neutral score and
/// logs degraded quality; it never crashes the pipeline.
pub(crate) struct WrappedSentimentScorer {
    scorer: Arc<dyn SentimentScorer>,
    timeout: time::Duration,
}

impl WrappedSentimentScorer {
    pub fn new(scorer: Arc<dyn SentimentScorer>, timeout: time::Duration) -> Self {
        Self { scorer, timeout }
    }

    async fn try_score(&self, text: &str) -> Result<SentimentScore, ScoringError> {
        let scoring = AssertUnwindSafe(self.scorer.score(text)).catch_unwind();

        match time::timeout(self.timeout, scoring).await {
            Ok(Ok(Ok(score))) => Ok(score),
            Ok(Ok(Err(e))) => Err(ScoringError::ScorerError(e)),
            Ok(Err(panic)) => Err(ScoringError::Panicked(panic.into())),
            Err(_) => Err(ScoringError::Timeout {
                timeout_ms: self.timeout.as_millis(),
            }),
        }
    }

    /// Ensures `news` carries a sentiment score, computing it if absent.
    pub async fn ensure_scored(&self, mut news: NewsEvent) -> NewsEvent {
        if news.sentiment.is_some() {
            return news;
        }

        let score = match self.try_score(&news.text).await {
            Ok(score) => score,
            Err(e) => {
                warn!(source = %news.source, symbol = %news.symbol, error = %e,
                    "sentiment scoring degraded, treating event as neutral");
                SentimentScore::NEUTRAL
            }
        };

        news.sentiment = Some(score);
        news
    }
}

#[cfg(test)]
mod tests;
