use thiserror::Error;

/// Strategy configuration rejected at construction.
#[derive(Debug, Error, PartialEq)]
pub enum StrategyConfigError {
    #[error(
        "exit threshold must be finite and non-negative, got `{value}`"
    )]
    InvalidExitThreshold { value: f64 },
    #[error(
        "exit threshold `{exit}` must be below the lowest entry threshold `{min_entry}`"
    )]
    ExitAboveEntry { exit: f64, min_entry: f64 },
    #[error("return window must cover at least 1 bar, got `{value}`")]
    ReturnWindowTooShort { value: usize },
}
