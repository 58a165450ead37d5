use chrono::{TimeZone, Timelike, Utc};

use crate::{
    db::memory::MemWatermarkRepo,
    event::{MarketBar, NewsEvent},
    shared::{SentimentScore, Symbol},
};

use super::*;

fn symbol() -> Symbol {
    "CL".to_string().try_into().unwrap()
}

fn bar_at(minute: u32, seq: u64) -> MergedEvent {
    MarketBar::new(
        symbol(),
        Utc.with_ymd_and_hms(2024, 5, 1, 12, minute, 0).unwrap(),
        100.0,
        101.0,
        99.0,
        100.5,
        10.0,
        seq,
    )
    .unwrap()
    .into()
}

fn news_at(minute: u32, seq: u64) -> MergedEvent {
    NewsEvent {
        source: "wire".to_string(),
        symbol: symbol(),
        time: Utc.with_ymd_and_hms(2024, 5, 1, 12, minute, 0).unwrap(),
        text: "opec cuts output".to_string(),
        sentiment: Some(SentimentScore::NEUTRAL),
        seq,
    }
    .into()
}

async fn drain(merger: &mut EventStreamMerger) -> Vec<MergedEvent> {
    let mut out = Vec::new();
    while let Some(event) = merger.next().await.unwrap() {
        out.push(event);
    }
    out
}

#[tokio::test]
async fn merges_two_sources_in_timestamp_order() {
    let (bar_tx, bar_feed) = SourceFeed::channel("bars", 16);
    let (news_tx, news_feed) = SourceFeed::channel("news", 16);

    bar_tx.send(bar_at(0, 0)).await.unwrap();
    bar_tx.send(bar_at(2, 1)).await.unwrap();
    bar_tx.send(bar_at(4, 2)).await.unwrap();
    news_tx.send(news_at(1, 0)).await.unwrap();
    news_tx.send(news_at(3, 1)).await.unwrap();
    drop(bar_tx);
    drop(news_tx);

    let mut merger = EventStreamMerger::new(
        MergeConfig::default(),
        vec![bar_feed, news_feed],
        Arc::new(MemWatermarkRepo::default()),
    )
    .await
    .unwrap();

    let merged = drain(&mut merger).await;
    let times: Vec<_> = merged.iter().map(|ev| ev.time().minute()).collect();

    assert_eq!(times, vec![0, 1, 2, 3, 4]);
}

#[tokio::test]
async fn bars_sort_before_news_at_equal_timestamps() {
    let (bar_tx, bar_feed) = SourceFeed::channel("bars", 16);
    let (news_tx, news_feed) = SourceFeed::channel("news", 16);

    // News queued first; the bar at the same timestamp must still come out
    // ahead of it.
    news_tx.send(news_at(1, 0)).await.unwrap();
    bar_tx.send(bar_at(1, 0)).await.unwrap();
    drop(bar_tx);
    drop(news_tx);

    let mut merger = EventStreamMerger::new(
        MergeConfig::default(),
        // News feed listed first so ordering can't come from source index.
        vec![news_feed, bar_feed],
        Arc::new(MemWatermarkRepo::default()),
    )
    .await
    .unwrap();

    let merged = drain(&mut merger).await;

    assert!(matches!(merged[0], MergedEvent::Bar(_)));
    assert!(matches!(merged[1], MergedEvent::News(_)));
}

#[tokio::test]
async fn waits_for_source_within_staleness_tolerance() {
    let (bar_tx, bar_feed) = SourceFeed::channel("bars", 16);
    let (news_tx, news_feed) = SourceFeed::channel("news", 16);

    bar_tx.send(bar_at(0, 0)).await.unwrap();
    bar_tx.send(bar_at(5, 1)).await.unwrap();
    news_tx.send(news_at(0, 0)).await.unwrap();

    let mut merger = EventStreamMerger::new(
        MergeConfig::default().with_staleness_tolerance(60),
        vec![bar_feed, news_feed],
        Arc::new(MemWatermarkRepo::default()),
    )
    .await
    .unwrap();

    assert_eq!(merger.next().await.unwrap().unwrap().time().minute(), 0);
    assert_eq!(merger.next().await.unwrap().unwrap().time().minute(), 0);

    // The bar at minute 5 is more than the tolerance past the news
    // watermark at minute 0, so the merger must block on news. Deliver a
    // late news event and check it comes out before the bar.
    let next = tokio::spawn(async move {
        let first = merger.next().await.unwrap().unwrap();
        let second = merger.next().await.unwrap().unwrap();
        (first, second)
    });

    news_tx.send(news_at(4, 1)).await.unwrap();
    drop(news_tx);
    drop(bar_tx);

    let (first, second) = next.await.unwrap();

    assert!(matches!(first, MergedEvent::News(_)));
    assert_eq!(first.time().minute(), 4);
    assert_eq!(second.time().minute(), 5);
}

#[tokio::test(start_paused = true)]
async fn stalled_source_times_out_and_merging_proceeds() {
    let (bar_tx, bar_feed) = SourceFeed::channel("bars", 16);
    let (_news_tx, news_feed) = SourceFeed::channel("news", 16);

    bar_tx.send(bar_at(0, 0)).await.unwrap();
    bar_tx.send(bar_at(1, 1)).await.unwrap();
    drop(bar_tx);

    // News never delivers anything. With paused time the wait bound elapses
    // instantly, the source is declared timed out, and the bars flow.
    let mut merger = EventStreamMerger::new(
        MergeConfig::default().with_source_wait_timeout(5),
        vec![bar_feed, news_feed],
        Arc::new(MemWatermarkRepo::default()),
    )
    .await
    .unwrap();

    assert_eq!(merger.next().await.unwrap().unwrap().time().minute(), 0);
    assert_eq!(merger.next().await.unwrap().unwrap().time().minute(), 1);
}

#[tokio::test(start_paused = true)]
async fn timed_out_source_is_reinstated_when_it_delivers_again() {
    let (bar_tx, bar_feed) = SourceFeed::channel("bars", 16);
    let (news_tx, news_feed) = SourceFeed::channel("news", 16);

    bar_tx.send(bar_at(0, 0)).await.unwrap();
    bar_tx.send(bar_at(2, 1)).await.unwrap();

    let mut merger = EventStreamMerger::new(
        MergeConfig::default().with_source_wait_timeout(5),
        vec![bar_feed, news_feed],
        Arc::new(MemWatermarkRepo::default()),
    )
    .await
    .unwrap();

    // News times out; both bars emit without it.
    assert_eq!(merger.next().await.unwrap().unwrap().time().minute(), 0);
    assert_eq!(merger.next().await.unwrap().unwrap().time().minute(), 2);

    // The source recovers. Once it delivers, it gates emission again.
    news_tx.send(news_at(3, 0)).await.unwrap();
    bar_tx.send(bar_at(10, 2)).await.unwrap();
    drop(bar_tx);
    drop(news_tx);

    let merged = drain(&mut merger).await;
    let times: Vec<_> = merged.iter().map(|ev| ev.time().minute()).collect();

    assert_eq!(times, vec![3, 10]);
}

#[tokio::test]
async fn resume_skips_events_at_or_before_persisted_watermark() {
    let watermarks = Arc::new(MemWatermarkRepo::default());
    watermarks
        .set("bars", Utc.with_ymd_and_hms(2024, 5, 1, 12, 2, 0).unwrap())
        .await
        .unwrap();

    let (bar_tx, bar_feed) = SourceFeed::channel("bars", 16);

    // Replay from the start; everything up to and including minute 2 was
    // already processed before the crash.
    for (minute, seq) in [(0, 0), (1, 1), (2, 2), (3, 3), (4, 4)] {
        bar_tx.send(bar_at(minute, seq)).await.unwrap();
    }
    drop(bar_tx);

    let mut merger =
        EventStreamMerger::new(MergeConfig::default(), vec![bar_feed], watermarks.clone())
            .await
            .unwrap();

    let merged = drain(&mut merger).await;
    let times: Vec<_> = merged.iter().map(|ev| ev.time().minute()).collect();

    assert_eq!(times, vec![3, 4]);

    // The watermark advanced with the new emissions.
    let persisted = watermarks.get("bars").await.unwrap().unwrap();
    assert_eq!(persisted.minute(), 4);
}

#[tokio::test]
async fn out_of_order_events_within_a_source_are_dropped() {
    let (bar_tx, bar_feed) = SourceFeed::channel("bars", 16);

    bar_tx.send(bar_at(5, 0)).await.unwrap();
    bar_tx.send(bar_at(3, 1)).await.unwrap();
    bar_tx.send(bar_at(6, 2)).await.unwrap();
    drop(bar_tx);

    let mut merger = EventStreamMerger::new(
        MergeConfig::default(),
        vec![bar_feed],
        Arc::new(MemWatermarkRepo::default()),
    )
    .await
    .unwrap();

    let merged = drain(&mut merger).await;
    let times: Vec<_> = merged.iter().map(|ev| ev.time().minute()).collect();

    assert_eq!(times, vec![5, 6]);
}

#[tokio::test]
async fn rejects_empty_source_list() {
    let result = EventStreamMerger::new(
        MergeConfig::default(),
        Vec::new(),
        Arc::new(MemWatermarkRepo::default()),
    )
    .await;

    assert!(matches!(result, Err(MergeError::NoSources)));
}
