use std::sync::{Arc, Mutex};

use tokio::{
    sync::broadcast::{self, error::RecvError},
    time,
};

use crate::{
    db::Database,
    event::{BarProducer, NewsProducer, SentimentScorer},
    order::Broker,
    risk::RiskFilter,
    strategy::StrategyStateMachine,
    util::AbortOnDropHandle,
};

use super::{
    config::{LiveTradeConfig, LiveTradeControllerConfig},
    error::{LiveError, Result},
    process::{
        LiveProcess,
        error::{LiveProcessFatalError, LiveProcessFatalResult},
    },
    state::{
        LiveTradeReader, LiveTradeReceiver, LiveTradeStatus, LiveTradeStatusManager,
        LiveTradeUpdate,
    },
};

/// Controller for managing and monitoring a running live trading process.
/// Provides an interface to monitor status, receive updates, and perform
/// graceful shutdown operations.
pub struct LiveTradeController {
    config: LiveTradeControllerConfig,
    process_handle: Mutex<Option<AbortOnDropHandle<LiveProcessFatalResult<()>>>>,
    shutdown_tx: broadcast::Sender<()>,
    status_manager: Arc<LiveTradeStatusManager>,
}

impl LiveTradeController {
    fn new(
        config: &LiveTradeConfig,
        process_handle: AbortOnDropHandle<LiveProcessFatalResult<()>>,
        shutdown_tx: broadcast::Sender<()>,
        status_manager: Arc<LiveTradeStatusManager>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config: config.into(),
            process_handle: Mutex::new(Some(process_handle)),
            shutdown_tx,
            status_manager,
        })
    }

    /// Returns a [`LiveTradeReader`] interface for accessing live status and
    /// updates.
    pub fn reader(&self) -> Arc<dyn LiveTradeReader> {
        self.status_manager.clone()
    }

    /// Creates a new [`LiveTradeReceiver`] for subscribing to live trading
    /// status and updates.
    pub fn update_receiver(&self) -> LiveTradeReceiver {
        self.status_manager.update_receiver()
    }

    /// Returns the current [`LiveTradeStatus`] as a snapshot.
    pub fn status_snapshot(&self) -> LiveTradeStatus {
        self.status_manager.status_snapshot()
    }

    fn try_consume_handle(&self) -> Option<AbortOnDropHandle<LiveProcessFatalResult<()>>> {
        self.process_handle
            .lock()
            .expect("`LiveTradeController` mutex can't be poisoned")
            .take()
    }

    /// Tries to perform a clean shutdown of the live trade process and
    /// consumes the task handle. If a clean shutdown fails, the process is
    /// aborted.
    ///
    /// This method can only be called once per controller instance.
    ///
    /// Returns an error if the process had to be aborted, or if the handle
    /// was already consumed.
    pub async fn shutdown(&self) -> Result<()> {
        let Some(mut handle) = self.try_consume_handle() else {
            return Err(LiveError::LiveAlreadyShutdown);
        };

        if handle.is_finished() {
            let status = self.status_manager.status_snapshot();
            return Err(LiveError::LiveAlreadyTerminated(status));
        }

        self.status_manager
            .update(LiveTradeStatus::ShutdownInitiated);

        let live_shutdown_send_res = self.shutdown_tx.send(()).map_err(|e| {
            handle.abort();
            LiveProcessFatalError::SendShutdownSignalFailed(e)
        });

        let live_shutdown_res = match live_shutdown_send_res {
            Ok(_) => {
                tokio::select! {
                    join_res = &mut handle => {
                        join_res.map_err(LiveProcessFatalError::LiveProcessTaskJoin).and_then(|r| r)
                    }
                    _ = time::sleep(self.config.shutdown_timeout()) => {
                        handle.abort();
                        Err(LiveProcessFatalError::ShutdownTimeout)
                    }
                }
            }
            Err(e) => Err(e),
        };

        if let Err(e) = live_shutdown_res {
            let e_ref = Arc::new(e);
            self.status_manager.update(e_ref.clone().into());

            return Err(LiveError::LiveShutdownFailed(e_ref));
        }

        self.status_manager.update(LiveTradeStatus::Shutdown);
        Ok(())
    }

    /// Waits until the live trade process has stopped and returns the final
    /// status.
    ///
    /// This method blocks until the live trade process reaches a stopped
    /// state, either through graceful shutdown or termination.
    pub async fn until_stopped(&self) -> LiveTradeStatus {
        let mut trade_rx = self.update_receiver();

        let status = self.status_snapshot();
        if status.is_stopped() {
            return status;
        }

        loop {
            match trade_rx.recv().await {
                Ok(trade_update) => {
                    if let LiveTradeUpdate::Status(status) = trade_update
                        && status.is_stopped()
                    {
                        return status;
                    }
                }
                Err(RecvError::Lagged(_)) => {
                    let status = self.status_snapshot();
                    if status.is_stopped() {
                        return status;
                    }
                }
                Err(RecvError::Closed) => return self.status_snapshot(),
            }
        }
    }
}

/// Builder for configuring and starting a live trading engine. Encapsulates
/// the configuration, database connection, broker, producers, and scorer. The
/// live trading process is started when [`start`](Self::start) is called,
/// returning a [`LiveTradeController`].
pub struct LiveTradeEngine {
    config: LiveTradeConfig,
    database: Database,
    broker: Arc<dyn Broker>,
    bar_producers: Vec<Box<dyn BarProducer>>,
    news_producers: Vec<Box<dyn NewsProducer>>,
    scorer: Option<Arc<dyn SentimentScorer>>,
    strategy: StrategyStateMachine,
    risk: RiskFilter,
    status_manager: Arc<LiveTradeStatusManager>,
}

impl LiveTradeEngine {
    /// Creates a new live trading engine over the given producers and broker.
    ///
    /// Strategy and risk configurations are validated here so a bad setup
    /// fails before any process is spawned.
    pub fn new(
        config: LiveTradeConfig,
        database: Database,
        broker: Arc<dyn Broker>,
        bar_producers: Vec<Box<dyn BarProducer>>,
        news_producers: Vec<Box<dyn NewsProducer>>,
    ) -> Result<Self> {
        if bar_producers.is_empty() {
            return Err(LiveError::NoBarProducers);
        }

        let strategy = StrategyStateMachine::new(config.strategy().clone())?;
        let risk = RiskFilter::new(config.risk().clone())?;

        let (update_tx, _) = broadcast::channel::<LiveTradeUpdate>(config.update_capacity());

        let status_manager = LiveTradeStatusManager::new(update_tx);

        Ok(Self {
            config,
            database,
            broker,
            bar_producers,
            news_producers,
            scorer: None,
            strategy,
            risk,
            status_manager,
        })
    }

    /// Attaches a sentiment scorer for news events that arrive unscored.
    pub fn with_scorer(mut self, scorer: Arc<dyn SentimentScorer>) -> Self {
        self.scorer = Some(scorer);
        self
    }

    /// Returns a [`LiveTradeReader`] interface for accessing live status and
    /// updates.
    pub fn reader(&self) -> Arc<dyn LiveTradeReader> {
        self.status_manager.clone()
    }

    /// Creates a new [`LiveTradeReceiver`] for subscribing to live trading
    /// status and updates.
    pub fn update_receiver(&self) -> LiveTradeReceiver {
        self.status_manager.update_receiver()
    }

    /// Returns the current [`LiveTradeStatus`] as a snapshot.
    pub fn status_snapshot(&self) -> LiveTradeStatus {
        self.status_manager.status_snapshot()
    }

    /// Starts the live trading process and returns a [`LiveTradeController`]
    /// for managing it. This consumes the engine and spawns the live trading
    /// task in the background.
    pub async fn start(self) -> Result<Arc<LiveTradeController>> {
        let (shutdown_tx, _) = broadcast::channel::<()>(1);

        let process_handle = LiveProcess::spawn(
            &self.config,
            shutdown_tx.clone(),
            self.database,
            self.broker,
            self.bar_producers,
            self.news_producers,
            self.scorer,
            self.strategy,
            self.risk,
            self.status_manager.clone(),
        );

        let controller = LiveTradeController::new(
            &self.config,
            process_handle,
            shutdown_tx,
            self.status_manager,
        );

        Ok(controller)
    }
}
