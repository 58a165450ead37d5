use thiserror::Error;

use super::{HalfLife, Quantity, SentimentScore, Symbol};

#[derive(Error, Debug, PartialEq)]
pub enum SymbolValidationError {
    #[error("Invalid symbol, must not be empty")]
    Empty,

    #[error("Invalid symbol, must be at most {} characters", Symbol::MAX_LEN)]
    TooLong,

    #[error("Invalid symbol, must contain only ASCII alphanumerics, '.', '-' or '/'")]
    InvalidCharacter,
}

#[derive(Error, Debug, PartialEq)]
pub enum SentimentScoreValidationError {
    #[error(
        "Invalid sentiment score, must be within [{}, {}]",
        SentimentScore::MIN,
        SentimentScore::MAX
    )]
    OutOfRange,

    #[error("Invalid sentiment score, must be finite")]
    NotFinite,
}

#[derive(Error, Debug, PartialEq)]
pub enum SentimentThresholdValidationError {
    #[error("Invalid sentiment threshold, must be greater than zero")]
    TooLow,

    #[error("Invalid sentiment threshold, must be at most 1")]
    TooHigh,
}

#[derive(Error, Debug, PartialEq)]
pub enum HalfLifeValidationError {
    #[error("Invalid half-life, must be at least {}", HalfLife::MIN)]
    TooShort,

    #[error("Invalid half-life, must be at most {}", HalfLife::MAX)]
    TooLong,
}

#[derive(Error, Debug, PartialEq)]
pub enum QuantityValidationError {
    #[error("Invalid quantity, must be at least {}", Quantity::MIN)]
    TooLow,

    #[error("Invalid quantity, must be at most {}", Quantity::MAX)]
    TooHigh,
}
