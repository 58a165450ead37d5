use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::info;

use crate::{
    db::Database,
    event::{
        BarProducer, MarketBar, MergedEvent, NewsEvent, NewsProducer, SentimentScorer,
        WrappedSentimentScorer, error::MarketDataError,
    },
    merge::{EventStreamMerger, SourceFeed, spawn_bar_pump, spawn_news_pump},
    order::OrderLifecycleManager,
    risk::RiskFilter,
    shared::Symbol,
    strategy::StrategyStateMachine,
    trade::core::{PipelineOutcome, TradePipeline},
};

use super::{
    broker::SimulatedBroker,
    config::BacktestConfig,
    error::Result,
    report::{BacktestReport, ReportBuilder, TradeRecord},
};

/// Replays a recorded bar log as a producer.
struct ReplayBars {
    bars: std::vec::IntoIter<MarketBar>,
}

#[async_trait]
impl BarProducer for ReplayBars {
    fn name(&self) -> &str {
        "backtest-bars"
    }

    async fn next_bar(&mut self) -> std::result::Result<Option<MarketBar>, MarketDataError> {
        Ok(self.bars.next())
    }
}

/// Replays a recorded news log as a producer.
struct ReplayNews {
    news: std::vec::IntoIter<NewsEvent>,
}

#[async_trait]
impl NewsProducer for ReplayNews {
    fn name(&self) -> &str {
        "backtest-news"
    }

    async fn next_event(&mut self) -> std::result::Result<Option<NewsEvent>, MarketDataError> {
        Ok(self.news.next())
    }
}

/// Replays closed, finite recorded event logs through the identical
/// merger/strategy/risk/order-manager path the live engine drives, against
/// a [`SimulatedBroker`].
///
/// Only this engine knows it is a backtest; every downstream component is
/// mode-agnostic.
pub struct BacktestEngine {
    config: BacktestConfig,
    scorer: Option<Arc<dyn SentimentScorer>>,
}

impl BacktestEngine {
    pub fn new(config: BacktestConfig) -> Self {
        Self {
            config,
            scorer: None,
        }
    }

    /// Attaches a sentiment scorer for news events that arrive unscored.
    pub fn with_scorer(mut self, scorer: Arc<dyn SentimentScorer>) -> Self {
        self.scorer = Some(scorer);
        self
    }

    /// Runs the replay to completion and returns the performance report.
    pub async fn run(
        &self,
        bars: Vec<MarketBar>,
        news: Vec<NewsEvent>,
    ) -> Result<BacktestReport> {
        let strategy = StrategyStateMachine::new(self.config.strategy().clone())?;
        let risk = RiskFilter::new(self.config.risk().clone())?;

        let database = Database::in_memory();
        let broker = Arc::new(SimulatedBroker::new(self.config.slippage_bps()));
        let manager = Arc::new(OrderLifecycleManager::new(
            broker.clone(),
            database.orders(),
            self.config.order_manager().clone(),
        ));
        let mut pipeline = TradePipeline::new(strategy, risk, manager.clone());

        let scorer = self
            .scorer
            .clone()
            .map(|scorer| WrappedSentimentScorer::new(scorer, self.config.scoring_timeout()));

        let (shutdown_tx, _) = broadcast::channel::<()>(1);
        let capacity = self.config.merge().queue_capacity();

        let (bar_tx, bar_feed) = SourceFeed::channel("backtest-bars", capacity);
        let (news_tx, news_feed) = SourceFeed::channel("backtest-news", capacity);

        let _bar_pump = spawn_bar_pump(
            Box::new(ReplayBars {
                bars: bars.into_iter(),
            }),
            bar_tx,
            shutdown_tx.subscribe(),
        );
        let _news_pump = spawn_news_pump(
            Box::new(ReplayNews {
                news: news.into_iter(),
            }),
            news_tx,
            shutdown_tx.subscribe(),
        );

        let mut merger = EventStreamMerger::new(
            self.config.merge().clone(),
            vec![bar_feed, news_feed],
            database.watermarks(),
        )
        .await?;

        let mut report = ReportBuilder::new(self.config.initial_equity());
        let mut last_close: HashMap<Symbol, f64> = HashMap::new();
        let fee_rate = self.config.fee_bps() / 10_000.0;

        while let Some(event) = merger.next().await? {
            report.event();

            let event = match event {
                MergedEvent::News(news) if news.sentiment.is_none() => match &scorer {
                    Some(scorer) => MergedEvent::News(scorer.ensure_scored(news).await),
                    None => MergedEvent::News(news),
                },
                event => event,
            };

            // Working orders fill at this bar's open, before the strategy
            // sees the bar.
            if let MergedEvent::Bar(bar) = &event {
                for (side, notice) in broker.on_bar(bar) {
                    manager.apply_fill(&notice).await?;

                    let fee = notice.price * notice.quantity as f64 * fee_rate;

                    report.fill(
                        TradeRecord {
                            time: notice.time,
                            symbol: bar.symbol.clone(),
                            side,
                            quantity: notice.quantity,
                            price: notice.price,
                        },
                        fee,
                    );
                }

                last_close.insert(bar.symbol.clone(), bar.close);
            }

            match pipeline.handle_event(&event).await? {
                Some(PipelineOutcome::Submitted { .. }) => report.order_submitted(),
                Some(PipelineOutcome::Suppressed { .. }) => report.intent_suppressed(),
                None => {}
            }

            if let MergedEvent::Bar(bar) = &event {
                let equity = self.mark_to_market(&manager, &last_close, report.fees_paid()).await;
                report.equity_point(bar.time, equity);
            }
        }

        let final_positions = manager.positions().await.snapshot();

        let report = report.finish(final_positions);

        info!(
            events = report.summary.events_processed,
            orders = report.summary.orders_submitted,
            fills = report.summary.fills,
            final_equity = report.summary.final_equity,
            "backtest finished"
        );

        Ok(report)
    }

    /// Equity as cash plus open positions marked at each symbol's last
    /// close.
    async fn mark_to_market(
        &self,
        manager: &Arc<OrderLifecycleManager>,
        last_close: &HashMap<Symbol, f64>,
        fees_paid: f64,
    ) -> f64 {
        let book = manager.positions().await;

        let mut equity = self.config.initial_equity() + book.realized_pnl() - fees_paid;

        for position in book.snapshot() {
            let Some(close) = last_close.get(&position.symbol) else {
                continue;
            };

            equity += position.net_quantity as f64 * (close - position.average_entry_price);
        }

        equity
    }
}
