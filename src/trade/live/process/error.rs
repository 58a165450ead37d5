use std::result;

use thiserror::Error;
use tokio::{
    sync::broadcast::error::{RecvError, SendError},
    task::JoinError,
};

use crate::{
    db::error::DbError,
    merge::error::MergeError,
    order::error::OrderError,
};

/// Errors the live process recovers from by restarting the event loop after
/// the configured restart interval.
#[derive(Error, Debug)]
pub enum LiveProcessRecoverableError {
    #[error("[Db] {0}")]
    Db(#[from] DbError),

    #[error("[Merge] {0}")]
    Merge(#[from] MergeError),

    #[error("[Order] {0}")]
    Order(#[from] OrderError),

    #[error("`FillRecvLagged` error, skipped: {skipped}")]
    FillRecvLagged { skipped: u64 },
}

/// Errors that terminate the live process.
#[derive(Error, Debug)]
pub enum LiveProcessFatalError {
    #[error("Startup order recovery error: {0}")]
    StartupRecovery(OrderError),

    #[error("Launch merger error: {0}")]
    LaunchMerger(MergeError),

    #[error("Event stream ended")]
    EventStreamEnded,

    #[error("[TaskJoin] {0}")]
    LiveProcessTaskJoin(JoinError),

    #[error("`FillRecvClosed` error")]
    FillRecvClosed,

    #[error("Failed to send live trade process shutdown signal error: {0}")]
    SendShutdownSignalFailed(SendError<()>),

    #[error("Shutdown signal channel recv error: {0}")]
    ShutdownSignalRecv(RecvError),

    #[error("Live shutdown process timeout error")]
    ShutdownTimeout,
}

pub(crate) type LiveProcessFatalResult<T> = result::Result<T, LiveProcessFatalError>;

#[derive(Error, Debug)]
pub enum LiveProcessError {
    #[error(transparent)]
    Recoverable(#[from] LiveProcessRecoverableError),

    #[error(transparent)]
    Fatal(#[from] LiveProcessFatalError),
}

pub(super) type Result<T> = result::Result<T, LiveProcessError>;
