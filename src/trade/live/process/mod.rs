use std::sync::Arc;

use chrono::Utc;
use tokio::{
    sync::broadcast::{self, error::RecvError},
    time,
};

use crate::{
    db::Database,
    event::{BarProducer, MergedEvent, NewsProducer, SentimentScorer, WrappedSentimentScorer},
    merge::{EventStreamMerger, SourceFeed, spawn_bar_pump, spawn_news_pump},
    order::{Broker, FillNotice, OrderLifecycleManager, OrderUpdate},
    risk::RiskFilter,
    strategy::StrategyStateMachine,
    trade::core::{PipelineOutcome, TradePipeline},
    util::{AbortOnDropHandle, Never},
};

use super::{
    config::{LiveProcessConfig, LiveTradeConfig},
    state::{LiveTradeStatus, LiveTradeStatusManager, LiveTradeTransmitter, LiveTradeUpdate},
};

pub(crate) mod error;

use error::{
    LiveProcessError, LiveProcessFatalError, LiveProcessFatalResult, LiveProcessRecoverableError,
    Result,
};

pub(super) struct LiveProcess {
    config: LiveProcessConfig,
    shutdown_tx: broadcast::Sender<()>,
    merger: EventStreamMerger,
    pipeline: TradePipeline,
    scorer: Option<WrappedSentimentScorer>,
    fills_handle: AbortOnDropHandle<()>,
    orders_handle: AbortOnDropHandle<()>,
    pump_handles: Vec<AbortOnDropHandle<()>>,
    status_manager: Arc<LiveTradeStatusManager>,
    update_tx: LiveTradeTransmitter,
}

impl LiveProcess {
    #[allow(clippy::too_many_arguments)]
    pub fn spawn(
        config: &LiveTradeConfig,
        shutdown_tx: broadcast::Sender<()>,
        database: Database,
        broker: Arc<dyn Broker>,
        bar_producers: Vec<Box<dyn BarProducer>>,
        news_producers: Vec<Box<dyn NewsProducer>>,
        scorer: Option<Arc<dyn SentimentScorer>>,
        strategy: StrategyStateMachine,
        risk: RiskFilter,
        status_manager: Arc<LiveTradeStatusManager>,
    ) -> AbortOnDropHandle<LiveProcessFatalResult<()>> {
        let process_config = LiveProcessConfig::from(config);
        let merge_config = config.merge().clone();
        let manager_config = config.order_manager().clone();
        let scoring_timeout = config.scoring_timeout();

        tokio::spawn(async move {
            let manager = Arc::new(OrderLifecycleManager::new(
                broker.clone(),
                database.orders(),
                manager_config,
            ));

            // Positions must be rebuilt from the ledger and broker fill
            // history before the first event is processed.
            if let Err(e) = manager.recover(Utc::now()).await {
                status_manager.update(LiveProcessFatalError::StartupRecovery(e).into());
                return Ok(());
            }

            let update_tx = status_manager.transmitter().clone();

            let fills_handle = Self::spawn_fill_handler(
                status_manager.clone(),
                manager.clone(),
                broker.fill_notifications(),
            );

            let orders_handle =
                Self::spawn_order_update_handler(update_tx.clone(), manager.subscribe());

            let capacity = merge_config.queue_capacity();
            let mut pump_handles = Vec::new();
            let mut feeds = Vec::new();

            for producer in bar_producers {
                let (tx, feed) = SourceFeed::channel(producer.name(), capacity);
                pump_handles.push(spawn_bar_pump(producer, tx, shutdown_tx.subscribe()));
                feeds.push(feed);
            }

            for producer in news_producers {
                let (tx, feed) = SourceFeed::channel(producer.name(), capacity);
                pump_handles.push(spawn_news_pump(producer, tx, shutdown_tx.subscribe()));
                feeds.push(feed);
            }

            let merger =
                match EventStreamMerger::new(merge_config, feeds, database.watermarks()).await {
                    Ok(merger) => merger,
                    Err(e) => {
                        status_manager.update(LiveProcessFatalError::LaunchMerger(e).into());
                        return Ok(());
                    }
                };

            let scorer = scorer.map(|s| WrappedSentimentScorer::new(s, scoring_timeout));

            let pipeline = TradePipeline::new(strategy, risk, manager);

            let process = Self {
                config: process_config,
                shutdown_tx,
                merger,
                pipeline,
                scorer,
                fills_handle,
                orders_handle,
                pump_handles,
                status_manager,
                update_tx,
            };

            process.recovery_loop().await
        })
        .into()
    }

    fn spawn_fill_handler(
        status_manager: Arc<LiveTradeStatusManager>,
        manager: Arc<OrderLifecycleManager>,
        mut fills_rx: broadcast::Receiver<FillNotice>,
    ) -> AbortOnDropHandle<()> {
        tokio::spawn(async move {
            loop {
                match fills_rx.recv().await {
                    Ok(notice) => {
                        if let Err(e) = manager.apply_fill(&notice).await {
                            status_manager.update(LiveProcessRecoverableError::Order(e).into());
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        let e = LiveProcessRecoverableError::FillRecvLagged { skipped };
                        status_manager.update(e.into());
                    }
                    Err(RecvError::Closed) => {
                        status_manager.update(LiveProcessFatalError::FillRecvClosed.into());
                        return;
                    }
                }
            }
        })
        .into()
    }

    fn spawn_order_update_handler(
        update_tx: LiveTradeTransmitter,
        mut orders_rx: broadcast::Receiver<OrderUpdate>,
    ) -> AbortOnDropHandle<()> {
        tokio::spawn(async move {
            loop {
                match orders_rx.recv().await {
                    Ok(update) => {
                        // Ignore no-receivers errors
                        let _ = update_tx.send(update.into());
                    }
                    Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => return,
                }
            }
        })
        .into()
    }

    async fn recovery_loop(mut self) -> LiveProcessFatalResult<()> {
        self.status_manager.update(LiveTradeStatus::Starting);

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            let live_process_error = tokio::select! {
                Err(e) = self.run_iteration() => e,
                shutdown_res = shutdown_rx.recv() => {
                    let Err(e) = shutdown_res else {
                        break;
                    };

                    LiveProcessFatalError::ShutdownSignalRecv(e).into()
                }
            };

            match live_process_error {
                LiveProcessError::Fatal(e) => {
                    self.status_manager.update(e.into());
                    return Ok(());
                }
                LiveProcessError::Recoverable(e) => {
                    self.status_manager.update(e.into());
                }
            }

            tokio::select! {
                _ = time::sleep(self.config.restart_interval()) => {}
                shutdown_res = shutdown_rx.recv() => {
                    let Err(e) = shutdown_res else {
                        break;
                    };

                    let status = LiveProcessFatalError::ShutdownSignalRecv(e).into();
                    self.status_manager.update(status);

                    return Ok(());
                }
            }

            self.status_manager.update(LiveTradeStatus::Restarting);
        }

        self.shutdown()
    }

    /// Drives the merged event stream through the trade pipeline. Only
    /// returns on error; a healthy live stream never ends.
    async fn run_iteration(&mut self) -> Result<Never> {
        self.status_manager.update(LiveTradeStatus::Running);

        loop {
            let Some(event) = self
                .merger
                .next()
                .await
                .map_err(LiveProcessRecoverableError::Merge)?
            else {
                return Err(LiveProcessFatalError::EventStreamEnded.into());
            };

            let event = match event {
                MergedEvent::News(news) if news.sentiment.is_none() => match &self.scorer {
                    Some(scorer) => MergedEvent::News(scorer.ensure_scored(news).await),
                    None => MergedEvent::News(news),
                },
                event => event,
            };

            match self
                .pipeline
                .handle_event(&event)
                .await
                .map_err(LiveProcessRecoverableError::Order)?
            {
                Some(PipelineOutcome::Submitted { .. }) => {
                    let positions = self.pipeline.manager().positions().await.snapshot();
                    let _ = self.update_tx.send(LiveTradeUpdate::Positions(positions));
                }
                Some(PipelineOutcome::Suppressed { intent, reason }) => {
                    let _ = self
                        .update_tx
                        .send(LiveTradeUpdate::Suppressed { intent, reason });
                }
                None => {}
            }
        }
    }

    fn shutdown(self) -> LiveProcessFatalResult<()> {
        self.fills_handle.abort();
        self.orders_handle.abort();

        for handle in &self.pump_handles {
            handle.abort();
        }

        Ok(())
    }
}
