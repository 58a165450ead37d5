use chrono::{TimeZone, Utc};

use super::*;

fn symbol() -> Symbol {
    "CL".try_into().unwrap()
}

fn intent(second: u32, direction: Direction, strength: f64) -> SignalIntent {
    SignalIntent {
        time: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, second).unwrap(),
        symbol: symbol(),
        direction,
        strength,
    }
}

fn config() -> RiskConfig {
    RiskConfig::default()
        .with_max_position_per_symbol(Quantity::try_from(10u64).unwrap())
        .with_max_gross_exposure(50)
        .with_bucket_capacity(5)
        .with_refill_interval(chrono::Duration::seconds(60))
}

/// Applies an approved order as an immediate full fill so position-dependent
/// checks see the book a live run would.
fn fill_into(book: &mut PositionBook, decision: &RiskDecision) {
    if let RiskDecision::Approved(request) = decision {
        book.apply_fill(&request.symbol, request.side, request.quantity.as_u64(), 100.0);
    }
}

#[test]
fn long_intent_becomes_a_sized_buy_order() {
    let mut filter = RiskFilter::new(config()).unwrap();
    let book = PositionBook::default();

    let decision = filter.evaluate(&intent(0, Direction::Long, 0.9), &book);

    let RiskDecision::Approved(request) = decision else {
        panic!("expected approval, got {decision}");
    };

    assert_eq!(request.side, OrderSide::Buy);
    assert_eq!(request.quantity.as_u64(), 9);
    assert_eq!(request.symbol, symbol());
}

#[test]
fn flat_intent_flattens_the_whole_position() {
    let mut filter = RiskFilter::new(config()).unwrap();
    let mut book = PositionBook::default();
    book.apply_fill(&symbol(), OrderSide::Buy, 7, 100.0);

    let decision = filter.evaluate(&intent(0, Direction::Flat, 0.0), &book);

    let RiskDecision::Approved(request) = decision else {
        panic!("expected approval, got {decision}");
    };

    assert_eq!(request.side, OrderSide::Sell);
    assert_eq!(request.quantity.as_u64(), 7);
}

#[test]
fn repeated_direction_is_suppressed_as_duplicate() {
    let mut filter = RiskFilter::new(config()).unwrap();
    let book = PositionBook::default();

    assert!(matches!(
        filter.evaluate(&intent(0, Direction::Long, 0.9), &book),
        RiskDecision::Approved(_)
    ));

    assert_eq!(
        filter.evaluate(&intent(1, Direction::Long, 0.95), &book),
        RiskDecision::Suppressed {
            reason: SuppressReason::DuplicateIntent
        }
    );
}

#[test]
fn failed_order_clears_the_duplicate_record() {
    let mut filter = RiskFilter::new(config()).unwrap();
    let book = PositionBook::default();

    assert!(matches!(
        filter.evaluate(&intent(0, Direction::Long, 0.9), &book),
        RiskDecision::Approved(_)
    ));

    // The approved order failed terminally, so nothing was opened and the
    // same intent must be allowed through again.
    filter.order_failed(&symbol());

    assert!(matches!(
        filter.evaluate(&intent(1, Direction::Long, 0.9), &book),
        RiskDecision::Approved(_)
    ));
}

#[test]
fn flip_without_flatten_is_suppressed_when_hedging_disabled() {
    let mut filter = RiskFilter::new(config()).unwrap();
    let mut book = PositionBook::default();
    book.apply_fill(&symbol(), OrderSide::Buy, 5, 100.0);

    assert_eq!(
        filter.evaluate(&intent(0, Direction::Short, 0.8), &book),
        RiskDecision::Suppressed {
            reason: SuppressReason::FlipWithoutFlatten
        }
    );
}

#[test]
fn flip_is_allowed_when_hedging_enabled() {
    let mut filter = RiskFilter::new(config().with_hedging_enabled(true)).unwrap();
    let mut book = PositionBook::default();
    book.apply_fill(&symbol(), OrderSide::Buy, 5, 100.0);

    assert!(matches!(
        filter.evaluate(&intent(0, Direction::Short, 0.8), &book),
        RiskDecision::Approved(_)
    ));
}

#[test]
fn position_cap_bounds_entry_size() {
    let mut filter = RiskFilter::new(config()).unwrap();
    let mut book = PositionBook::default();
    book.apply_fill(&symbol(), OrderSide::Buy, 8, 100.0);

    // Strength asks for 9 but only 2 units of headroom remain.
    let decision = filter.evaluate(&intent(0, Direction::Long, 0.9), &book);

    let RiskDecision::Approved(request) = decision else {
        panic!("expected approval, got {decision}");
    };

    assert_eq!(request.quantity.as_u64(), 2);
}

#[test]
fn exhausted_position_cap_suppresses() {
    let mut filter = RiskFilter::new(config()).unwrap();
    let mut book = PositionBook::default();
    book.apply_fill(&symbol(), OrderSide::Buy, 10, 100.0);

    assert_eq!(
        filter.evaluate(&intent(0, Direction::Long, 0.9), &book),
        RiskDecision::Suppressed {
            reason: SuppressReason::LimitExceeded
        }
    );
}

#[test]
fn gross_exposure_cap_spans_symbols() {
    let mut filter = RiskFilter::new(config().with_max_gross_exposure(12)).unwrap();
    let mut book = PositionBook::default();

    let other: Symbol = "NG".try_into().unwrap();
    book.apply_fill(&other, OrderSide::Buy, 10, 100.0);

    // 2 units of gross headroom remain across the book.
    let decision = filter.evaluate(&intent(0, Direction::Long, 0.9), &book);

    let RiskDecision::Approved(request) = decision else {
        panic!("expected approval, got {decision}");
    };

    assert_eq!(request.quantity.as_u64(), 2);
}

#[test]
fn oscillating_intents_are_rate_limited() {
    // Capacity 3, one token per minute, intents arriving every second.
    let config = config()
        .with_bucket_capacity(3)
        .with_refill_interval(chrono::Duration::seconds(60));

    let mut filter = RiskFilter::new(config).unwrap();
    let mut book = PositionBook::default();

    let mut approved = 0;
    let mut rate_limited = 0;

    for second in 0..20 {
        let direction = if second % 2 == 0 {
            Direction::Long
        } else {
            Direction::Flat
        };

        let decision = filter.evaluate(&intent(second, direction, 0.9), &book);
        fill_into(&mut book, &decision);

        match decision {
            RiskDecision::Approved(_) => approved += 1,
            RiskDecision::Suppressed {
                reason: SuppressReason::RateLimited,
            } => rate_limited += 1,
            RiskDecision::Suppressed { .. } => {}
        }
    }

    // The 20-second window refills no full token, so approvals are bounded
    // by the bucket capacity.
    assert_eq!(approved, 3);
    assert!(rate_limited > 0);
}

#[test]
fn rejects_invalid_configuration() {
    assert_eq!(
        RiskFilter::new(config().with_max_gross_exposure(0)).err(),
        Some(RiskConfigError::NonPositiveGrossExposure)
    );
    assert_eq!(
        RiskFilter::new(config().with_bucket_capacity(0)).err(),
        Some(RiskConfigError::NonPositiveBucketCapacity)
    );
    assert_eq!(
        RiskFilter::new(config().with_refill_interval(chrono::Duration::zero())).err(),
        Some(RiskConfigError::NonPositiveRefillInterval)
    );
}
