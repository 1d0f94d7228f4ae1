//! Periodic sync driver
//!
//! Polls every catalog source on a fixed tick and lets each source's refresh
//! policy decide whether anything actually happens. Goes through the same
//! per-source serialisation as on-demand syncs.

use crate::syncer::SnapshotSyncer;
use crate::types::SyncState;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

/// What one pass over the catalog did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub refreshed: usize,
    /// Refresh failed but an older copy was served
    pub fell_back: usize,
    pub unchanged: usize,
    /// Nothing usable exists for the source
    pub unavailable: usize,
}

pub struct SyncDriver {
    syncer: Arc<SnapshotSyncer>,
    poll_interval: Duration,
}

impl SyncDriver {
    pub fn new(syncer: Arc<SnapshotSyncer>, poll_interval: Duration) -> Self {
        Self {
            syncer,
            poll_interval,
        }
    }

    /// Sync every source once
    pub async fn tick(&self) -> TickSummary {
        let mut summary = TickSummary::default();

        for (source_id, outcome) in self.syncer.sync_all().await {
            match outcome {
                Ok(resolution) => match resolution.state() {
                    SyncState::DownloadOk => summary.refreshed += 1,
                    SyncState::DownloadFailed => summary.fell_back += 1,
                    _ => summary.unchanged += 1,
                },
                Err(e) => {
                    error!(source_id = %source_id, error = %e, "Sync failed");
                    summary.unavailable += 1;
                }
            }
        }

        if summary.refreshed + summary.fell_back + summary.unavailable > 0 {
            info!(
                refreshed = summary.refreshed,
                fell_back = summary.fell_back,
                unchanged = summary.unchanged,
                unavailable = summary.unavailable,
                "Sync tick complete"
            );
        } else {
            debug!(unchanged = summary.unchanged, "Sync tick complete, nothing due");
        }

        summary
    }

    /// Tick forever
    pub async fn run(self) {
        info!(
            poll_interval_secs = self.poll_interval.as_secs(),
            sources = self.syncer.catalog().len(),
            "Sync driver started"
        );

        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            self.tick().await;
        }
    }
}
