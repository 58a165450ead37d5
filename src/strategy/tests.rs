use chrono::{TimeZone, Utc};

use crate::{event::MarketBar, event::NewsEvent, shared::SentimentThreshold};

use super::*;

fn symbol() -> Symbol {
    "X".try_into().unwrap()
}

fn bar(minute: u32, close: f64, seq: u64) -> MergedEvent {
    let low = close.min(100.0) - 1.0;
    let high = close.max(100.0) + 1.0;

    MarketBar::new(
        symbol(),
        Utc.with_ymd_and_hms(2024, 5, 1, 12, minute, 0).unwrap(),
        100.0,
        high,
        low,
        close,
        10.0,
        seq,
    )
    .unwrap()
    .into()
}

fn news(minute: u32, score: f64, seq: u64) -> MergedEvent {
    NewsEvent {
        source: "wire".to_string(),
        symbol: symbol(),
        time: Utc.with_ymd_and_hms(2024, 5, 1, 12, minute, 0).unwrap(),
        text: "supply shock".to_string(),
        sentiment: Some(score.try_into().unwrap()),
        seq,
    }
    .into()
}

fn config() -> StrategyConfig {
    StrategyConfig::default()
        .with_buy_threshold(SentimentThreshold::try_from(0.5).unwrap())
        .with_sell_threshold(SentimentThreshold::try_from(0.5).unwrap())
        .with_exit_threshold(0.1)
}

fn run(config: StrategyConfig, events: &[MergedEvent]) -> Vec<SignalIntent> {
    let mut machine = StrategyStateMachine::new(config).unwrap();

    events
        .iter()
        .filter_map(|event| machine.on_event(event))
        .collect()
}

#[test]
fn flat_bars_then_strong_news_emit_one_long_intent() {
    let events = vec![
        bar(0, 100.0, 0),
        bar(1, 100.0, 1),
        bar(2, 100.0, 2),
        news(3, 0.9, 0),
    ];

    let intents = run(config(), &events);

    assert_eq!(intents.len(), 1);
    assert_eq!(intents[0].direction, Direction::Long);
    assert_eq!(intents[0].symbol, symbol());
    assert!((intents[0].strength - 0.9).abs() < 1e-12);
}

#[test]
fn negative_sentiment_with_falling_prices_emits_short() {
    let events = vec![
        bar(0, 100.0, 0),
        bar(1, 99.0, 1),
        bar(2, 98.0, 2),
        news(3, -0.8, 0),
    ];

    let intents = run(config(), &events);

    assert_eq!(intents.len(), 1);
    assert_eq!(intents[0].direction, Direction::Short);
}

#[test]
fn entry_requires_price_confirmation() {
    // Bullish sentiment against falling prices must not open a long.
    let events = vec![
        bar(0, 100.0, 0),
        bar(1, 99.0, 1),
        bar(2, 98.0, 2),
        news(3, 0.9, 0),
    ];

    let intents = run(config(), &events);

    assert!(intents.is_empty());
}

#[test]
fn no_redundant_resignal_while_already_long() {
    let events = vec![
        bar(0, 100.0, 0),
        bar(1, 100.0, 1),
        bar(2, 100.0, 2),
        news(3, 0.9, 0),
        news(4, 0.95, 1),
        bar(5, 100.0, 3),
    ];

    let intents = run(config(), &events);

    let longs = intents
        .iter()
        .filter(|i| i.direction == Direction::Long)
        .count();

    assert_eq!(longs, 1);
}

#[test]
fn decayed_average_flattens_an_open_state() {
    let config = config().with_half_life(crate::shared::HalfLife::seconds(60).unwrap());

    let mut events = vec![
        bar(0, 100.0, 0),
        bar(1, 100.0, 1),
        bar(2, 100.0, 2),
        news(3, 0.9, 0),
    ];

    // No further news; the average halves every minute and crosses the exit
    // threshold well within ten bars.
    for minute in 4..14 {
        events.push(bar(minute, 100.0, minute as u64));
    }

    let intents = run(config, &events);

    assert_eq!(intents.len(), 2);
    assert_eq!(intents[0].direction, Direction::Long);
    assert_eq!(intents[1].direction, Direction::Flat);
}

#[test]
fn next_bar_alignment_defers_evaluation() {
    let config = config().with_scoring_alignment(ScoringAlignment::NextBar);

    let mut machine = StrategyStateMachine::new(config).unwrap();

    assert!(machine.on_event(&bar(0, 100.0, 0)).is_none());
    assert!(machine.on_event(&bar(1, 100.0, 1)).is_none());
    assert!(machine.on_event(&bar(2, 100.0, 2)).is_none());

    // The news itself produces nothing under next-bar alignment.
    assert!(machine.on_event(&news(3, 0.9, 0)).is_none());

    let intent = machine.on_event(&bar(4, 100.0, 3)).unwrap();
    assert_eq!(intent.direction, Direction::Long);
}

#[test]
fn replay_is_bit_identical() {
    let events = vec![
        bar(0, 100.0, 0),
        news(1, 0.3, 0),
        bar(2, 100.5, 1),
        news(3, 0.7, 1),
        bar(4, 101.0, 2),
        news(5, -0.2, 2),
        bar(6, 100.0, 3),
        bar(7, 99.5, 4),
        news(8, -0.9, 3),
        bar(9, 99.0, 5),
    ];

    let first = run(config(), &events);
    let second = run(config(), &events);

    assert_eq!(first, second);
}

#[test]
fn rejects_exit_threshold_at_or_above_entry() {
    let config = config().with_exit_threshold(0.5);

    assert_eq!(
        StrategyStateMachine::new(config).err(),
        Some(StrategyConfigError::ExitAboveEntry {
            exit: 0.5,
            min_entry: 0.5
        })
    );
}
