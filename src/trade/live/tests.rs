use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use crate::{
    Database,
    event::{
        BarProducer, MarketBar, NewsEvent, NewsProducer,
        error::MarketDataError,
    },
    trade::backtest::SimulatedBroker,
};

use super::{
    error::LiveError,
    process::error::LiveProcessFatalError,
    *,
};

fn bar(minute: u32, seq: u64) -> MarketBar {
    MarketBar::new(
        "WTI".try_into().unwrap(),
        Utc.with_ymd_and_hms(2024, 5, 1, 12, minute, 0).unwrap(),
        100.0,
        101.0,
        99.0,
        100.0,
        10.0,
        seq,
    )
    .unwrap()
}

struct FiniteBars(std::vec::IntoIter<MarketBar>);

#[async_trait]
impl BarProducer for FiniteBars {
    fn name(&self) -> &str {
        "finite-bars"
    }

    async fn next_bar(&mut self) -> Result<Option<MarketBar>, MarketDataError> {
        Ok(self.0.next())
    }
}

struct SilentNews;

#[async_trait]
impl NewsProducer for SilentNews {
    fn name(&self) -> &str {
        "silent-news"
    }

    async fn next_event(&mut self) -> Result<Option<NewsEvent>, MarketDataError> {
        Ok(None)
    }
}

struct PendingBars;

#[async_trait]
impl BarProducer for PendingBars {
    fn name(&self) -> &str {
        "pending-bars"
    }

    async fn next_bar(&mut self) -> Result<Option<MarketBar>, MarketDataError> {
        std::future::pending().await
    }
}

fn engine(bar_producers: Vec<Box<dyn BarProducer>>) -> Result<LiveTradeEngine, LiveError> {
    LiveTradeEngine::new(
        LiveTradeConfig::default(),
        Database::in_memory(),
        Arc::new(SimulatedBroker::new(0.0)),
        bar_producers,
        vec![Box::new(SilentNews)],
    )
}

#[tokio::test]
async fn rejects_empty_bar_producers() {
    let result = engine(vec![]);

    assert!(matches!(result, Err(LiveError::NoBarProducers)));
}

#[tokio::test]
async fn ended_event_stream_terminates_the_process() {
    let bars = vec![bar(0, 0), bar(1, 1), bar(2, 2)];
    let engine = engine(vec![Box::new(FiniteBars(bars.into_iter()))]).unwrap();

    let controller = engine.start().await.unwrap();

    let status = controller.until_stopped().await;

    match status {
        LiveTradeStatus::Terminated(e) => {
            assert!(matches!(*e, LiveProcessFatalError::EventStreamEnded));
        }
        other => panic!("expected terminated status, got {other}"),
    }
}

#[tokio::test]
async fn graceful_shutdown_stops_a_running_process() {
    let engine = engine(vec![Box::new(PendingBars)]).unwrap();

    let mut updates = engine.update_receiver();
    let controller = engine.start().await.unwrap();

    // The process listens for the shutdown signal once it reaches `Running`.
    loop {
        if let LiveTradeUpdate::Status(LiveTradeStatus::Running) = updates.recv().await.unwrap() {
            break;
        }
    }

    controller.shutdown().await.unwrap();

    assert!(matches!(
        controller.status_snapshot(),
        LiveTradeStatus::Shutdown
    ));

    // The handle is consumed by the first shutdown call.
    assert!(matches!(
        controller.shutdown().await,
        Err(LiveError::LiveAlreadyShutdown)
    ));
}
