use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard},
};

use tokio::sync::broadcast;

use crate::{
    order::{OrderUpdate, Position},
    risk::SuppressReason,
    strategy::SignalIntent,
};

use super::process::error::{LiveProcessFatalError, LiveProcessRecoverableError};

/// Represents the current status of a live trading process.
#[derive(Debug, Clone)]
pub enum LiveTradeStatus {
    /// Live trading process has been created but not yet started.
    NotInitiated,
    /// Live trading process is initializing.
    Starting,
    /// Live trading process is actively running.
    Running,
    /// Live trading process encountered a recoverable error.
    Failed(Arc<LiveProcessRecoverableError>),
    /// Live trading process is restarting after a recoverable error.
    Restarting,
    /// Shutdown has been initiated.
    ShutdownInitiated,
    /// Live trading process has been shut down.
    Shutdown,
    /// Live trading process encountered a fatal error and terminated.
    Terminated(Arc<LiveProcessFatalError>),
}

impl LiveTradeStatus {
    /// Returns `true` if the live trade process has stopped (either shut down
    /// or terminated).
    pub fn is_stopped(&self) -> bool {
        matches!(self, Self::Shutdown | Self::Terminated(_))
    }
}

impl fmt::Display for LiveTradeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotInitiated => write!(f, "Not initiated"),
            Self::Starting => write!(f, "Starting"),
            Self::Running => write!(f, "Running"),
            Self::Failed(error) => write!(f, "Failed: {error}"),
            Self::Restarting => write!(f, "Restarting"),
            Self::ShutdownInitiated => write!(f, "Shutdown initiated"),
            Self::Shutdown => write!(f, "Shutdown"),
            Self::Terminated(error) => write!(f, "Terminated: {error}"),
        }
    }
}

impl From<LiveProcessRecoverableError> for LiveTradeStatus {
    fn from(value: LiveProcessRecoverableError) -> Self {
        Self::Failed(Arc::new(value))
    }
}

impl From<Arc<LiveProcessFatalError>> for LiveTradeStatus {
    fn from(value: Arc<LiveProcessFatalError>) -> Self {
        Self::Terminated(value)
    }
}

impl From<LiveProcessFatalError> for LiveTradeStatus {
    fn from(value: LiveProcessFatalError) -> Self {
        Arc::new(value).into()
    }
}

/// Update events emitted during live trading including status changes, order
/// lifecycle transitions, position snapshots, and suppressed intents.
#[derive(Clone)]
pub enum LiveTradeUpdate {
    /// Live trading status changed.
    Status(LiveTradeStatus),
    /// An order transitioned state or filled.
    Order(OrderUpdate),
    /// The position book changed.
    Positions(Vec<Position>),
    /// The risk filter suppressed an intent.
    Suppressed {
        intent: SignalIntent,
        reason: SuppressReason,
    },
}

impl From<LiveTradeStatus> for LiveTradeUpdate {
    fn from(value: LiveTradeStatus) -> Self {
        Self::Status(value)
    }
}

impl From<OrderUpdate> for LiveTradeUpdate {
    fn from(value: OrderUpdate) -> Self {
        Self::Order(value)
    }
}

pub(super) type LiveTradeTransmitter = broadcast::Sender<LiveTradeUpdate>;

/// Receiver for subscribing to [`LiveTradeUpdate`]s including status changes,
/// orders, positions, and suppressed intents.
pub type LiveTradeReceiver = broadcast::Receiver<LiveTradeUpdate>;

/// Trait for reading live trading status and subscribing to updates.
pub trait LiveTradeReader: Send + Sync + 'static {
    /// Creates a new [`LiveTradeReceiver`] for subscribing to live trading
    /// updates.
    fn update_receiver(&self) -> LiveTradeReceiver;

    /// Returns the current [`LiveTradeStatus`] as a snapshot.
    fn status_snapshot(&self) -> LiveTradeStatus;
}

pub(crate) struct LiveTradeStatusManager {
    status: Mutex<LiveTradeStatus>,
    update_tx: LiveTradeTransmitter,
}

impl LiveTradeStatusManager {
    pub fn new(update_tx: LiveTradeTransmitter) -> Arc<Self> {
        let status = Mutex::new(LiveTradeStatus::NotInitiated);

        Arc::new(Self { status, update_tx })
    }

    fn update_status_guard(
        &self,
        mut status_guard: MutexGuard<'_, LiveTradeStatus>,
        new_status: LiveTradeStatus,
    ) {
        *status_guard = new_status.clone();
        drop(status_guard);

        // Ignore no-receivers errors
        let _ = self.update_tx.send(new_status.into());
    }

    fn lock_status(&self) -> MutexGuard<'_, LiveTradeStatus> {
        self.status
            .lock()
            .expect("`LiveTradeStatusManager` mutex can't be poisoned")
    }

    pub fn update(&self, new_status: LiveTradeStatus) {
        let status_guard = self.lock_status();

        self.update_status_guard(status_guard, new_status);
    }

    pub fn transmitter(&self) -> &LiveTradeTransmitter {
        &self.update_tx
    }
}

impl LiveTradeReader for LiveTradeStatusManager {
    fn update_receiver(&self) -> LiveTradeReceiver {
        self.update_tx.subscribe()
    }

    fn status_snapshot(&self) -> LiveTradeStatus {
        self.lock_status().clone()
    }
}
