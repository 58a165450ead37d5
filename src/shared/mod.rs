use std::fmt;

use chrono::Duration;
use serde::{Deserialize, Serialize};

pub mod error;

use error::{
    HalfLifeValidationError, QuantityValidationError, SentimentScoreValidationError,
    SentimentThresholdValidationError, SymbolValidationError,
};

/// Validated instrument identifier.
///
/// Non-empty, at most [`Symbol::MAX_LEN`] characters, restricted to ASCII
/// alphanumerics plus `.`, `-` and `/`. Used as the key for positions,
/// per-symbol strategy state, and submission halts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol(String);

impl Symbol {
    /// Maximum symbol length: 24 characters.
    pub const MAX_LEN: usize = 24;

    /// Returns the symbol as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Symbol {
    type Error = SymbolValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.is_empty() {
            return Err(SymbolValidationError::Empty);
        }

        if value.len() > Self::MAX_LEN {
            return Err(SymbolValidationError::TooLong);
        }

        if !value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '/'))
        {
            return Err(SymbolValidationError::InvalidCharacter);
        }

        Ok(Self(value))
    }
}

impl TryFrom<&str> for Symbol {
    type Error = SymbolValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::try_from(value.to_string())
    }
}

impl From<Symbol> for String {
    fn from(value: Symbol) -> Self {
        value.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Validated sentiment score in `[-1, 1]`.
///
/// Scalar summarizing a news item's directional tone: `-1` maximally bearish,
/// `0` neutral, `1` maximally bullish.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct SentimentScore(f64);

impl SentimentScore {
    /// Minimum score: `-1.0`.
    pub const MIN: f64 = -1.0;

    /// Maximum score: `1.0`.
    pub const MAX: f64 = 1.0;

    /// The neutral score, used when scoring fails or times out.
    pub const NEUTRAL: Self = Self(0.0);

    /// Returns the score as an `f64`.
    pub fn as_f64(&self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for SentimentScore {
    type Error = SentimentScoreValidationError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if !value.is_finite() {
            return Err(SentimentScoreValidationError::NotFinite);
        }

        if !(Self::MIN..=Self::MAX).contains(&value) {
            return Err(SentimentScoreValidationError::OutOfRange);
        }

        Ok(Self(value))
    }
}

impl From<SentimentScore> for f64 {
    fn from(value: SentimentScore) -> Self {
        value.0
    }
}

impl fmt::Display for SentimentScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:+.4}", self.0)
    }
}

/// Validated sentiment threshold in `(0, 1]`.
///
/// Signal transitions fire only when the exponentially-weighted sentiment
/// average crosses a threshold of this type.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct SentimentThreshold(f64);

impl SentimentThreshold {
    /// Returns the threshold as an `f64`.
    pub fn as_f64(&self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for SentimentThreshold {
    type Error = SentimentThresholdValidationError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if !value.is_finite() || value <= 0.0 {
            return Err(SentimentThresholdValidationError::TooLow);
        }

        if value > 1.0 {
            return Err(SentimentThresholdValidationError::TooHigh);
        }

        Ok(Self(value))
    }
}

impl fmt::Display for SentimentThreshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}", self.0)
    }
}

/// Validated half-life for the exponentially-weighted sentiment average.
///
/// Measured in event time, so decay behaves identically in backtest replay
/// and live operation.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Eq, Ord)]
pub struct HalfLife(Duration);

impl HalfLife {
    /// Minimum half-life: 1 second.
    pub const MIN: Self = Self(Duration::seconds(1));

    /// Maximum half-life: 7 days.
    pub const MAX: Self = Self(Duration::days(7));

    /// Creates a half-life from a number of seconds.
    pub fn seconds(secs: u64) -> Result<Self, HalfLifeValidationError> {
        Self::try_from(Duration::seconds(secs as i64))
    }

    /// Returns the half-life as a [`Duration`].
    pub fn as_duration(&self) -> Duration {
        self.0
    }

    /// Returns the half-life in seconds as an `f64`.
    pub fn as_secs_f64(&self) -> f64 {
        self.0.num_milliseconds() as f64 / 1_000.0
    }
}

impl TryFrom<Duration> for HalfLife {
    type Error = HalfLifeValidationError;

    fn try_from(value: Duration) -> Result<Self, Self::Error> {
        if value < Self::MIN.0 {
            return Err(HalfLifeValidationError::TooShort);
        }

        if value > Self::MAX.0 {
            return Err(HalfLifeValidationError::TooLong);
        }

        Ok(Self(value))
    }
}

impl fmt::Display for HalfLife {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Validated order quantity in whole units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct Quantity(u64);

impl Quantity {
    /// Minimum quantity: 1 unit.
    pub const MIN: u64 = 1;

    /// Maximum quantity: 1 billion units.
    pub const MAX: u64 = 1_000_000_000;

    /// Returns the quantity as a `u64`.
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Returns the quantity as an `i64`.
    pub fn as_i64(&self) -> i64 {
        self.0 as i64
    }

    /// Returns the quantity as an `f64`.
    pub fn as_f64(&self) -> f64 {
        self.0 as f64
    }
}

impl TryFrom<u64> for Quantity {
    type Error = QuantityValidationError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value < Self::MIN {
            return Err(QuantityValidationError::TooLow);
        }

        if value > Self::MAX {
            return Err(QuantityValidationError::TooHigh);
        }

        Ok(Self(value))
    }
}

impl TryFrom<u32> for Quantity {
    type Error = QuantityValidationError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::try_from(value as u64)
    }
}

impl From<Quantity> for u64 {
    fn from(value: Quantity) -> Self {
        value.0
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
