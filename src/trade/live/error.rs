use std::{result, sync::Arc};

use thiserror::Error;

use crate::{risk::error::RiskConfigError, strategy::error::StrategyConfigError};

use super::{process::error::LiveProcessFatalError, state::LiveTradeStatus};

#[derive(Error, Debug)]
pub enum LiveError {
    #[error("[StrategyConfig] {0}")]
    StrategyConfig(#[from] StrategyConfigError),

    #[error("[RiskConfig] {0}")]
    RiskConfig(#[from] RiskConfigError),

    #[error("`bar_producers` vec can't be empty")]
    NoBarProducers,

    #[error("Live trade process was already shutdown")]
    LiveAlreadyShutdown,

    #[error("Live trade process was already terminated, status: {0}")]
    LiveAlreadyTerminated(LiveTradeStatus),

    #[error("Live trade process shutdown failed: {0}")]
    LiveShutdownFailed(Arc<LiveProcessFatalError>),
}

pub(super) type Result<T> = result::Result<T, LiveError>;
