use super::*;

use chrono::TimeZone;

fn symbol(s: &str) -> Symbol {
    Symbol::try_from(s).unwrap()
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 14, 30, 0).unwrap()
}

#[test]
fn bar_validation_rejects_inconsistent_ohlc() {
    let sym = symbol("X");

    let err = MarketBar::new(sym.clone(), t0(), 10.0, 9.0, 11.0, 10.0, 1.0, 0).unwrap_err();
    assert!(matches!(err, MarketDataError::HighBelowLow { .. }));

    let err = MarketBar::new(sym.clone(), t0(), 12.0, 11.0, 9.0, 10.0, 1.0, 0).unwrap_err();
    assert!(matches!(
        err,
        MarketDataError::PriceOutsideRange { field: "open", .. }
    ));

    let err = MarketBar::new(sym.clone(), t0(), 10.0, 11.0, 9.0, f64::NAN, 1.0, 0).unwrap_err();
    assert!(matches!(err, MarketDataError::NotFinite { field: "close", .. }));

    let err = MarketBar::new(sym.clone(), t0(), 10.0, 11.0, 9.0, 10.0, -1.0, 0).unwrap_err();
    assert!(matches!(err, MarketDataError::Negative { field: "volume", .. }));

    assert!(MarketBar::new(sym, t0(), 10.0, 11.0, 9.0, 10.5, 1.0, 0).is_ok());
}

#[test]
fn bars_rank_before_news_at_equal_timestamps() {
    let bar: MergedEvent = MarketBar::new(symbol("X"), t0(), 1.0, 1.0, 1.0, 1.0, 0.0, 0)
        .unwrap()
        .into();
    let news: MergedEvent = NewsEvent {
        source: "wire".to_string(),
        symbol: symbol("X"),
        time: t0(),
        text: "flat".to_string(),
        sentiment: None,
        seq: 0,
    }
    .into();

    assert!(bar.kind_rank() < news.kind_rank());
}

struct FixedScorer(f64);

#[async_trait]
impl SentimentScorer for FixedScorer {
    async fn score(&self, _text: &str) -> Result<SentimentScore, String> {
        Ok(SentimentScore::try_from(self.0).unwrap())
    }
}

struct StallingScorer;

#[async_trait]
impl SentimentScorer for StallingScorer {
    async fn score(&self, _text: &str) -> Result<SentimentScore, String> {
        time::sleep(time::Duration::from_secs(60)).await;
        Ok(SentimentScore::NEUTRAL)
    }
}

fn unscored(text: &str) -> NewsEvent {
    NewsEvent {
        source: "wire".to_string(),
        symbol: symbol("X"),
        time: t0(),
        text: text.to_string(),
        sentiment: None,
        seq: 0,
    }
}

#[tokio::test]
async fn wrapped_scorer_fills_missing_score() {
    let wrapped = WrappedSentimentScorer::new(
        Arc::new(FixedScorer(0.7)),
        time::Duration::from_millis(200),
    );

    let scored = wrapped.ensure_scored(unscored("upgrade")).await;
    assert_eq!(scored.sentiment.unwrap().as_f64(), 0.7);
}

#[tokio::test]
async fn wrapped_scorer_keeps_precomputed_score() {
    let wrapped = WrappedSentimentScorer::new(
        Arc::new(FixedScorer(0.7)),
        time::Duration::from_millis(200),
    );

    let mut news = unscored("downgrade");
    news.sentiment = Some(SentimentScore::try_from(-0.4).unwrap());

    let scored = wrapped.ensure_scored(news).await;
    assert_eq!(scored.sentiment.unwrap().as_f64(), -0.4);
}

#[tokio::test]
async fn wrapped_scorer_timeout_yields_neutral() {
    let wrapped =
        WrappedSentimentScorer::new(Arc::new(StallingScorer), time::Duration::from_millis(20));

    let scored = wrapped.ensure_scored(unscored("slow model")).await;
    assert_eq!(scored.sentiment.unwrap(), SentimentScore::NEUTRAL);
}
