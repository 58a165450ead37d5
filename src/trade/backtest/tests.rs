use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use crate::{
    event::{MarketBar, NewsEvent, SentimentScorer},
    order::{Broker, OrderRequest, OrderSide},
    shared::{Quantity, SentimentScore, SentimentThreshold, Symbol},
    strategy::StrategyConfig,
};

use super::*;

fn symbol() -> Symbol {
    "WTI".try_into().unwrap()
}

fn bar(minute: u32, open: f64, close: f64, seq: u64) -> MarketBar {
    let low = open.min(close) - 1.0;
    let high = open.max(close) + 1.0;

    MarketBar::new(
        symbol(),
        Utc.with_ymd_and_hms(2024, 5, 1, 12, minute, 0).unwrap(),
        open,
        high,
        low,
        close,
        10.0,
        seq,
    )
    .unwrap()
}

fn news(minute: u32, second: u32, score: Option<f64>, seq: u64) -> NewsEvent {
    NewsEvent {
        source: "wire".to_string(),
        symbol: symbol(),
        time: Utc
            .with_ymd_and_hms(2024, 5, 1, 12, minute, second)
            .unwrap(),
        text: "inventories draw sharply".to_string(),
        sentiment: score.map(|s| s.try_into().unwrap()),
        seq,
    }
}

fn strategy_config() -> StrategyConfig {
    StrategyConfig::default()
        .with_buy_threshold(SentimentThreshold::try_from(0.5).unwrap())
        .with_sell_threshold(SentimentThreshold::try_from(0.5).unwrap())
        .with_exit_threshold(0.1)
}

fn config() -> BacktestConfig {
    BacktestConfig::default().with_strategy(strategy_config())
}

/// Flat prices, then strongly positive news: one long entry filled at the
/// next bar's open.
fn entry_scenario() -> (Vec<MarketBar>, Vec<NewsEvent>) {
    let bars = vec![
        bar(0, 100.0, 100.0, 0),
        bar(1, 100.0, 100.0, 1),
        bar(2, 100.0, 100.0, 2),
        bar(3, 101.0, 102.0, 3),
    ];
    let news = vec![news(2, 30, Some(0.9), 0)];

    (bars, news)
}

#[tokio::test]
async fn strong_news_opens_a_long_filled_at_next_bar_open() {
    let (bars, news) = entry_scenario();

    let report = BacktestEngine::new(config()).run(bars, news).await.unwrap();

    assert_eq!(report.summary.events_processed, 5);
    assert_eq!(report.summary.orders_submitted, 1);
    assert_eq!(report.summary.fills, 1);

    // Strength 0.9 against the default per-symbol cap of 100 sizes to 90.
    let trade = &report.trades[0];
    assert_eq!(trade.symbol, symbol());
    assert_eq!(trade.side, OrderSide::Buy);
    assert_eq!(trade.quantity, 90);
    assert_eq!(trade.price, 101.0);
    assert_eq!(
        trade.time,
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 3, 0).unwrap()
    );

    assert_eq!(report.final_positions.len(), 1);
    let position = &report.final_positions[0];
    assert_eq!(position.net_quantity, 90);
    assert_eq!(position.average_entry_price, 101.0);

    // Last bar closes at 102: 90 units up one point from entry.
    let last = report.equity_curve.last().unwrap();
    assert!((last.equity - 100_090.0).abs() < 1e-9);
    assert_eq!(report.summary.final_equity, last.equity);
}

#[tokio::test]
async fn identical_inputs_produce_identical_reports() {
    let engine = BacktestEngine::new(config());

    let (bars, news) = entry_scenario();
    let first = engine.run(bars, news).await.unwrap();

    let (bars, news) = entry_scenario();
    let second = engine.run(bars, news).await.unwrap();

    assert_eq!(first.trades, second.trades);
    assert_eq!(first.equity_curve, second.equity_curve);
    assert_eq!(first.summary, second.summary);
}

#[tokio::test]
async fn slippage_and_fees_are_charged_on_fills() {
    let config = config().with_slippage_bps(100.0).with_fee_bps(10.0);

    let (bars, news) = entry_scenario();
    let report = BacktestEngine::new(config).run(bars, news).await.unwrap();

    // Buys fill above the open: 101 * 1.01.
    let trade = &report.trades[0];
    assert!((trade.price - 102.01).abs() < 1e-9);

    let expected_fee = 102.01 * 90.0 * 0.001;
    assert!((report.summary.fees_paid - expected_fee).abs() < 1e-9);

    let last = report.equity_curve.last().unwrap();
    let expected_equity = 100_000.0 + 90.0 * (102.0 - 102.01) - expected_fee;
    assert!((last.equity - expected_equity).abs() < 1e-9);
}

#[tokio::test]
async fn working_orders_fill_in_submission_order() {
    let first = OrderRequest::market(symbol(), OrderSide::Sell, Quantity::try_from(5u64).unwrap());
    let second = OrderRequest::market(symbol(), OrderSide::Buy, Quantity::try_from(7u64).unwrap());

    // Two working orders for the same symbol must fill in the order they
    // were submitted, on every run.
    for _ in 0..32 {
        let broker = SimulatedBroker::new(0.0);
        broker.submit(&first).await.unwrap();
        broker.submit(&second).await.unwrap();

        let fills = broker.on_bar(&bar(0, 100.0, 100.0, 0));

        let ids: Vec<_> = fills
            .iter()
            .map(|(_, notice)| notice.client_order_id)
            .collect();
        assert_eq!(ids, vec![first.client_order_id, second.client_order_id]);
    }
}

struct FixedScorer(f64);

#[async_trait]
impl SentimentScorer for FixedScorer {
    async fn score(&self, _text: &str) -> Result<SentimentScore, String> {
        Ok(self.0.try_into().unwrap())
    }
}

#[tokio::test]
async fn unscored_news_is_scored_before_reaching_the_strategy() {
    let (bars, mut events) = entry_scenario();
    events[0].sentiment = None;

    let report = BacktestEngine::new(config())
        .with_scorer(Arc::new(FixedScorer(0.9)))
        .run(bars, events)
        .await
        .unwrap();

    assert_eq!(report.summary.orders_submitted, 1);
    assert_eq!(report.trades[0].side, OrderSide::Buy);
}

#[tokio::test]
async fn unscored_news_without_a_scorer_stays_neutral() {
    let (bars, mut events) = entry_scenario();
    events[0].sentiment = None;

    let report = BacktestEngine::new(config()).run(bars, events).await.unwrap();

    assert_eq!(report.summary.orders_submitted, 0);
    assert!(report.trades.is_empty());
    assert!(report.final_positions.is_empty());
}
