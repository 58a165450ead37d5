use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::util::PanicPayload;

#[derive(Error, Debug, PartialEq)]
pub enum MarketDataError {
    #[error("Invalid bar at {time}: high {high} is below low {low}")]
    HighBelowLow {
        time: DateTime<Utc>,
        high: f64,
        low: f64,
    },

    #[error("Invalid bar at {time}: {field} {value} is outside the [low, high] range")]
    PriceOutsideRange {
        time: DateTime<Utc>,
        field: &'static str,
        value: f64,
    },

    #[error("Invalid bar at {time}: {field} must be a finite number")]
    NotFinite {
        time: DateTime<Utc>,
        field: &'static str,
    },

    #[error("Invalid bar at {time}: {field} must not be negative")]
    Negative {
        time: DateTime<Utc>,
        field: &'static str,
    },
}

#[derive(Error, Debug)]
pub enum ScoringError {
    #[error("Sentiment scorer exceeded its {timeout_ms}ms deadline")]
    Timeout { timeout_ms: u128 },

    #[error("Sentiment scorer panicked: {0}")]
    Panicked(PanicPayload),

    #[error("Sentiment scorer error: {0}")]
    ScorerError(String),
}
