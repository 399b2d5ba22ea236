use crate::error::Result;
use crate::model::Snapshot;
use crate::provider::ProcessInfoProvider;
use std::time::{Duration, Instant};

/// The two most recent snapshots. Always replaced as a whole.
#[derive(Debug, Clone)]
pub struct SnapshotPair {
    pub previous: Option<Snapshot>,
    pub latest: Snapshot,
}

/// Polls a [`ProcessInfoProvider`] and keeps the previous/latest snapshots.
///
/// Timestamps are milliseconds since the source was created.
pub struct SnapshotSource<P> {
    provider: P,
    minimum_interval: Duration,
    epoch: Instant,
    pair: Option<SnapshotPair>,
}

impl<P: ProcessInfoProvider> SnapshotSource<P> {
    pub fn new(provider: P, minimum_interval: Duration) -> Self {
        Self {
            provider,
            minimum_interval,
            epoch: Instant::now(),
            pair: None,
        }
    }

    /// Milliseconds elapsed on the source's clock.
    pub fn now_ms(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64() * 1000.0
    }

    /// Fetch a new snapshot if forced, if none exists yet, or if the latest
    /// one is older than the minimum sampling interval.
    ///
    /// Returns whether a snapshot was fetched. Provider failures propagate
    /// and leave the stored snapshots untouched.
    pub fn update(&mut self, force: bool) -> Result<bool> {
        let now_ms = self.now_ms();
        self.update_at(force, now_ms)
    }

    /// [`update`](Self::update) with an explicit clock reading.
    pub fn update_at(&mut self, force: bool, now_ms: f64) -> Result<bool> {
        let stale = match &self.pair {
            None => true,
            Some(pair) => {
                now_ms - pair.latest.taken_at_ms > self.minimum_interval.as_secs_f64() * 1000.0
            }
        };
        if !force && !stale {
            log::debug!("SnapshotSource: latest snapshot still fresh, skipping fetch");
            return Ok(false);
        }

        let samples = self.provider.request_snapshot()?;
        let latest = Snapshot::from_samples(samples, now_ms);
        log::debug!(
            "SnapshotSource: fetched {} processes at {:.0}ms",
            latest.len(),
            now_ms
        );
        let previous = self.pair.take().map(|pair| pair.latest);
        self.pair = Some(SnapshotPair { previous, latest });
        Ok(true)
    }

    pub fn latest(&self) -> Option<&Snapshot> {
        self.pair.as_ref().map(|pair| &pair.latest)
    }

    pub fn previous(&self) -> Option<&Snapshot> {
        self.pair.as_ref().and_then(|pair| pair.previous.as_ref())
    }

    pub fn pair(&self) -> Option<&SnapshotPair> {
        self.pair.as_ref()
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn provider_mut(&mut self) -> &mut P {
        &mut self.provider
    }
}
