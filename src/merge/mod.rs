use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::{
    sync::{broadcast, mpsc},
    time,
};
use tracing::{debug, info, warn};

use crate::{
    db::repositories::WatermarkRepository,
    event::{BarProducer, MergedEvent, NewsProducer},
    util::AbortOnDropHandle,
};

pub(crate) mod config;
pub(crate) mod error;

pub use config::MergeConfig;

use error::{MergeError, Result};

/// Receiving half of a per-source queue feeding the merger.
pub struct SourceFeed {
    name: String,
    rx: mpsc::Receiver<MergedEvent>,
}

impl SourceFeed {
    /// Creates a bounded queue for one source, returning the sending half for
    /// a producer worker and the feed for the merger.
    pub fn channel(name: impl Into<String>, capacity: usize) -> (mpsc::Sender<MergedEvent>, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));

        (
            tx,
            Self {
                name: name.into(),
                rx,
            },
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceState {
    Active,
    TimedOut,
    Ended,
}

struct SourceSlot {
    name: String,
    rx: mpsc::Receiver<MergedEvent>,
    buffered: Option<MergedEvent>,
    /// Last timestamp emitted from (or observed on) this source.
    watermark: Option<DateTime<Utc>>,
    /// Persisted watermark; events at or before it are skipped on resume.
    resume_from: Option<DateTime<Utc>>,
    state: SourceState,
}

impl SourceSlot {
    /// Moves one queued event into the buffer if possible. Drops
    /// non-monotonic events and already-processed resume duplicates.
    fn try_fill(&mut self) {
        while self.buffered.is_none() && self.state != SourceState::Ended {
            match self.rx.try_recv() {
                Ok(event) => self.accept(event),
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    self.state = SourceState::Ended;
                }
            }
        }
    }

    fn accept(&mut self, event: MergedEvent) {
        let time = event.time();

        if let Some(resume_from) = self.resume_from
            && time <= resume_from
        {
            debug!(source = %self.name, %time, "skipping already-processed event on resume");
            return;
        }

        if let Some(watermark) = self.watermark
            && time < watermark
        {
            warn!(source = %self.name, %time, %watermark,
                "dropping out-of-order event behind source watermark");
            return;
        }

        if self.state == SourceState::TimedOut {
            info!(source = %self.name, "timed-out source delivered again, reinstating");
            self.state = SourceState::Active;
        }

        self.watermark = Some(time);
        self.buffered = Some(event);
    }

    /// A source gates emission while it is active, has nothing buffered, and
    /// its last known timestamp plus the staleness tolerance lies behind the
    /// candidate.
    fn gates(&self, candidate_time: DateTime<Utc>, tolerance: chrono::Duration) -> bool {
        if self.state != SourceState::Active || self.buffered.is_some() {
            return false;
        }

        match self.watermark {
            Some(watermark) => candidate_time > watermark + tolerance,
            // No event observed yet: nothing is known about this source,
            // so it always gates until it delivers or times out.
            None => true,
        }
    }
}

/// Merges N independently-timestamped producer sequences into one sequence
/// with non-decreasing timestamps.
///
/// Ties at identical timestamps resolve deterministically: market bars before
/// news events, then source index, then producer sequence number. If one
/// source stalls, emission never runs past that source's last known timestamp
/// plus the configured staleness tolerance; once the wall-clock wait bound
/// expires the source is declared timed out and merging proceeds without it
/// (degraded mode, not fatal).
///
/// Merging is resumable: the last emitted timestamp per source is persisted
/// through the watermark repository, and events at or before the persisted
/// watermark are skipped after a restart.
pub struct EventStreamMerger {
    config: MergeConfig,
    sources: Vec<SourceSlot>,
    watermarks: Arc<dyn WatermarkRepository>,
}

impl EventStreamMerger {
    /// Creates a merger over the given source feeds, loading persisted
    /// watermarks so replay after a crash does not reprocess events.
    pub async fn new(
        config: MergeConfig,
        feeds: Vec<SourceFeed>,
        watermarks: Arc<dyn WatermarkRepository>,
    ) -> Result<Self> {
        if feeds.is_empty() {
            return Err(MergeError::NoSources);
        }

        let mut sources = Vec::with_capacity(feeds.len());

        for feed in feeds {
            let resume_from = watermarks.get(&feed.name).await?;

            sources.push(SourceSlot {
                name: feed.name,
                rx: feed.rx,
                buffered: None,
                watermark: resume_from,
                resume_from,
                state: SourceState::Active,
            });
        }

        Ok(Self {
            config,
            sources,
            watermarks,
        })
    }

    /// Index of the best buffered candidate: minimum by (time, bars before
    /// news, source index, sequence number).
    fn candidate_idx(&self) -> Option<usize> {
        self.sources
            .iter()
            .enumerate()
            .filter_map(|(idx, slot)| {
                slot.buffered
                    .as_ref()
                    .map(|ev| ((ev.time(), ev.kind_rank(), idx, ev.seq()), idx))
            })
            .min_by_key(|(key, _)| *key)
            .map(|(_, idx)| idx)
    }

    /// Index of the first source gating the candidate, if any.
    fn gating_idx(&self, candidate_time: DateTime<Utc>) -> Option<usize> {
        let tolerance = self.config.staleness_tolerance();

        self.sources
            .iter()
            .position(|slot| slot.gates(candidate_time, tolerance))
    }

    /// Waits on one stalled source until it delivers, closes, or exceeds the
    /// wall-clock wait bound (in which case it is declared timed out).
    async fn wait_on(&mut self, idx: usize) {
        let timeout = self.config.source_wait_timeout();
        let slot = &mut self.sources[idx];

        tokio::select! {
            received = slot.rx.recv() => match received {
                Some(event) => slot.accept(event),
                None => slot.state = SourceState::Ended,
            },
            _ = time::sleep(timeout) => {
                warn!(source = %slot.name, wait_secs = timeout.as_secs(),
                    "source stalled beyond wait bound, proceeding without it (degraded)");
                slot.state = SourceState::TimedOut;
            }
        }
    }

    async fn emit(&mut self, idx: usize) -> Result<MergedEvent> {
        let slot = &mut self.sources[idx];
        let event = slot
            .buffered
            .take()
            .expect("candidate index always points at a buffered event");

        self.watermarks.set(&slot.name, event.time()).await?;

        Ok(event)
    }

    /// Returns the next merged event, or `None` once every source has reached
    /// end of stream and all buffers are drained.
    pub async fn next(&mut self) -> Result<Option<MergedEvent>> {
        loop {
            for slot in &mut self.sources {
                slot.try_fill();
            }

            let Some(idx) = self.candidate_idx() else {
                if self.sources.iter().all(|s| s.state == SourceState::Ended) {
                    return Ok(None);
                }

                // Nothing buffered anywhere: wait on the first source that
                // could still deliver.
                let waiting_idx = self
                    .sources
                    .iter()
                    .position(|s| s.state == SourceState::Active)
                    .or_else(|| {
                        self.sources
                            .iter()
                            .position(|s| s.state == SourceState::TimedOut)
                    })
                    .expect("at least one source is not ended");

                self.wait_on(waiting_idx).await;
                continue;
            };

            let candidate_time = self.sources[idx]
                .buffered
                .as_ref()
                .map(|ev| ev.time())
                .expect("candidate is buffered");

            match self.gating_idx(candidate_time) {
                Some(gating_idx) => self.wait_on(gating_idx).await,
                None => return self.emit(idx).await.map(Some),
            }
        }
    }
}

/// Spawns a worker pumping a bar producer into a merger queue.
///
/// Data-quality failures are dropped and logged; they never stop the worker.
/// The worker exits on end of stream or shutdown, dropping the sender so the
/// merger sees the source as ended.
pub(crate) fn spawn_bar_pump(
    mut producer: Box<dyn BarProducer>,
    tx: mpsc::Sender<MergedEvent>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> AbortOnDropHandle<()> {
    tokio::spawn(async move {
        loop {
            let produced = tokio::select! {
                produced = producer.next_bar() => produced,
                _ = shutdown_rx.recv() => return,
            };

            match produced {
                Ok(Some(bar)) => {
                    if tx.send(bar.into()).await.is_err() {
                        return;
                    }
                }
                Ok(None) => return,
                Err(e) => {
                    warn!(producer = producer.name(), error = %e,
                        "dropping malformed bar");
                }
            }
        }
    })
    .into()
}

/// Spawns a worker pumping a news producer into a merger queue.
pub(crate) fn spawn_news_pump(
    mut producer: Box<dyn NewsProducer>,
    tx: mpsc::Sender<MergedEvent>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> AbortOnDropHandle<()> {
    tokio::spawn(async move {
        loop {
            let produced = tokio::select! {
                produced = producer.next_event() => produced,
                _ = shutdown_rx.recv() => return,
            };

            match produced {
                Ok(Some(news)) => {
                    if tx.send(news.into()).await.is_err() {
                        return;
                    }
                }
                Ok(None) => return,
                Err(e) => {
                    warn!(producer = producer.name(), error = %e,
                        "dropping malformed news event");
                }
            }
        }
    })
    .into()
}

#[cfg(test)]
mod tests;
