//! Snapshot synchronisation
//!
//! [`SnapshotSyncer::sync`] runs one attempt for a source: short-circuit on
//! non-trading days, skip when not due, otherwise back up the current copy,
//! fetch, write, and record the refresh. A failed fetch falls back to the
//! backup, then to the stale cache, and only errors when neither exists.
//!
//! At most one attempt per source runs at a time. Callers that arrive while an
//! attempt is in flight wait for it and share its outcome instead of fetching
//! again. Different sources sync independently.

use crate::catalog::{DataSource, SourceCatalog};
use crate::clock::{Clock, SystemClock};
use crate::error::{CacheError, Result};
use crate::files;
use crate::policy;
use crate::registry::CacheRegistry;
use crate::types::{CacheEntry, Resolution, ServedFrom, SourceStatus, SyncState, SyncStats};
use chrono::{DateTime, Utc};
use market_calendar::TradingCalendar;
use snapshot_fetcher::BlobFetcher;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Minimum gap between a failed attempt and a background retry from `cache_path`
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(60);

/// Per-source serialisation point
#[derive(Default)]
struct SourceSlot {
    /// Held for the duration of an attempt; stores the latest outcome
    last_outcome: Mutex<Option<Result<Resolution>>>,
    /// Number of attempts that have finished
    completed: AtomicU64,
    in_flight: AtomicBool,
    /// When the latest attempt finished without fresh data
    last_failure: std::sync::Mutex<Option<DateTime<Utc>>>,
}

impl SourceSlot {
    fn record_outcome(&self, outcome: &Result<Resolution>, at: DateTime<Utc>) {
        let failed = match outcome {
            Ok(resolution) => resolution.state() == SyncState::DownloadFailed,
            Err(_) => true,
        };
        let mut last_failure = self.last_failure.lock().unwrap_or_else(|e| e.into_inner());
        *last_failure = failed.then_some(at);
    }

    fn failed_since(&self, since: DateTime<Utc>) -> bool {
        let last_failure = self.last_failure.lock().unwrap_or_else(|e| e.into_inner());
        last_failure.is_some_and(|at| at > since)
    }
}

/// Clears `in_flight` even if the attempt future is dropped
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn enter(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::Release);
        Self(flag)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Default)]
struct Counters {
    attempts: AtomicU64,
    fetches: AtomicU64,
    downloads_ok: AtomicU64,
    downloads_failed: AtomicU64,
    short_circuits: AtomicU64,
    not_due: AtomicU64,
    coalesced: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> SyncStats {
        SyncStats {
            attempts: self.attempts.load(Ordering::Relaxed),
            fetches: self.fetches.load(Ordering::Relaxed),
            downloads_ok: self.downloads_ok.load(Ordering::Relaxed),
            downloads_failed: self.downloads_failed.load(Ordering::Relaxed),
            short_circuits: self.short_circuits.load(Ordering::Relaxed),
            not_due: self.not_due.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
        }
    }
}

/// State trace of a single attempt
struct Attempt<'a> {
    source: &'a DataSource,
    trace: Vec<SyncState>,
}

impl<'a> Attempt<'a> {
    fn new(source: &'a DataSource) -> Self {
        Self {
            source,
            trace: Vec::with_capacity(4),
        }
    }

    fn enter(&mut self, state: SyncState) {
        debug!(
            source_id = %self.source.id,
            policy = %self.source.refresh_policy,
            state = %state,
            "Sync state"
        );
        self.trace.push(state);
    }

    fn resolve(mut self, path: PathBuf, served_from: ServedFrom) -> Resolution {
        self.enter(SyncState::Resolved);
        Resolution {
            source_id: self.source.id.clone(),
            path,
            served_from,
            trace: self.trace,
        }
    }
}

/// Keeps cached snapshots fresh and resolves the file consumers should read
pub struct SnapshotSyncer {
    catalog: SourceCatalog,
    registry: CacheRegistry,
    fetcher: Arc<dyn BlobFetcher>,
    calendar: TradingCalendar,
    clock: Arc<dyn Clock>,
    fetch_timeout: Duration,
    retry_backoff: Duration,
    slots: HashMap<String, SourceSlot>,
    counters: Counters,
}

impl SnapshotSyncer {
    pub fn new(
        catalog: SourceCatalog,
        registry: CacheRegistry,
        fetcher: Arc<dyn BlobFetcher>,
        calendar: TradingCalendar,
    ) -> Self {
        let slots = catalog
            .iter()
            .map(|source| (source.id.clone(), SourceSlot::default()))
            .collect();

        Self {
            catalog,
            registry,
            fetcher,
            calendar,
            clock: Arc::new(SystemClock),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            slots,
            counters: Counters::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// How long `cache_path` waits after a failed attempt before retrying in the background
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    pub fn catalog(&self) -> &SourceCatalog {
        &self.catalog
    }

    pub fn registry(&self) -> &CacheRegistry {
        &self.registry
    }

    pub fn calendar(&self) -> &TradingCalendar {
        &self.calendar
    }

    pub fn stats(&self) -> SyncStats {
        self.counters.snapshot()
    }

    fn lookup(&self, source_id: &str) -> Result<(&DataSource, &SourceSlot)> {
        self.catalog
            .get(source_id)
            .zip(self.slots.get(source_id))
            .ok_or_else(|| CacheError::UnknownSource(source_id.to_string()))
    }

    /// Bring one source up to date and resolve the path consumers should read
    pub async fn sync(&self, source_id: &str) -> Result<Resolution> {
        let (source, slot) = self.lookup(source_id)?;

        let seen = slot.completed.load(Ordering::Acquire);
        let mut last_outcome = slot.last_outcome.lock().await;

        // An attempt finished while we waited: its outcome is ours
        if slot.completed.load(Ordering::Acquire) != seen {
            if let Some(outcome) = last_outcome.as_ref() {
                Counters::bump(&self.counters.coalesced);
                debug!(source_id, "Joined in-flight sync");
                return outcome.clone();
            }
        }

        let outcome = {
            let _in_flight = InFlight::enter(&slot.in_flight);
            let outcome = self.attempt(source).await;
            slot.record_outcome(&outcome, self.clock.now());
            outcome
        };

        *last_outcome = Some(outcome.clone());
        slot.completed.fetch_add(1, Ordering::Release);
        outcome
    }

    /// Sync every catalog source concurrently
    pub async fn sync_all(&self) -> Vec<(String, Result<Resolution>)> {
        let syncs = self
            .catalog
            .iter()
            .map(|source| async move { (source.id.clone(), self.sync(&source.id).await) });
        futures::future::join_all(syncs).await
    }

    async fn attempt(&self, source: &DataSource) -> Result<Resolution> {
        Counters::bump(&self.counters.attempts);
        let now = self.clock.now();
        let mut attempt = Attempt::new(source);
        let cache_path = source.cache_path();
        let backup_path = source.backup_path();

        if self.calendar.is_non_trading_day(now) {
            for (path, served_from) in [
                (&cache_path, ServedFrom::Cache),
                (&backup_path, ServedFrom::Backup),
            ] {
                if files::is_usable(path).await {
                    Counters::bump(&self.counters.short_circuits);
                    attempt.enter(SyncState::NonTradingDayShortCircuit);
                    return Ok(attempt.resolve(path.clone(), served_from));
                }
            }
            info!(source_id = %source.id, "Non-trading day with nothing cached, fetching anyway");
        }

        let last_updated = self
            .registry
            .get(&source.id)
            .await
            .map(|entry| entry.last_updated);

        if !policy::is_due(&source.refresh_policy, last_updated, now, &self.calendar) {
            if files::is_usable(&cache_path).await {
                Counters::bump(&self.counters.not_due);
                attempt.enter(SyncState::NotDue);
                return Ok(attempt.resolve(cache_path, ServedFrom::Cache));
            }
            info!(source_id = %source.id, "Not due but cache file is missing or empty, refreshing");
        }

        self.refresh(attempt, now).await
    }

    async fn refresh(&self, mut attempt: Attempt<'_>, now: DateTime<Utc>) -> Result<Resolution> {
        let source = attempt.source;
        let cache_path = source.cache_path();
        let backup_path = source.backup_path();
        attempt.enter(SyncState::Downloading);

        if files::is_usable(&cache_path).await {
            if let Err(e) = files::copy_atomic(&cache_path, &backup_path).await {
                warn!(source_id = %source.id, error = %e, "Failed to back up cache, refreshing anyway");
            }
        }

        match self.download(source, &cache_path, &backup_path, now).await {
            Ok(bytes) => {
                Counters::bump(&self.counters.downloads_ok);
                attempt.enter(SyncState::DownloadOk);
                info!(source_id = %source.id, bytes, path = ?cache_path, "Snapshot refreshed");
                Ok(attempt.resolve(cache_path, ServedFrom::Cache))
            }
            Err(e) => {
                Counters::bump(&self.counters.downloads_failed);
                attempt.enter(SyncState::DownloadFailed);
                warn!(
                    source_id = %source.id,
                    policy = %source.refresh_policy,
                    error = %e,
                    "Snapshot refresh failed, falling back"
                );

                if files::is_usable(&backup_path).await {
                    return Ok(attempt.resolve(backup_path, ServedFrom::Backup));
                }
                if files::is_usable(&cache_path).await {
                    return Ok(attempt.resolve(cache_path, ServedFrom::Cache));
                }

                error!(source_id = %source.id, "No cached, backup or fresh snapshot available");
                Err(CacheError::NoAvailableData(source.id.clone()))
            }
        }
    }

    /// Fetch, write and record; returns the on-disk size
    async fn download(
        &self,
        source: &DataSource,
        cache_path: &Path,
        backup_path: &Path,
        now: DateTime<Utc>,
    ) -> Result<u64> {
        Counters::bump(&self.counters.fetches);

        let fetch = self.fetcher.fetch_blob(&source.remote_locator);
        let data = match tokio::time::timeout(self.fetch_timeout, fetch).await {
            Ok(result) => result?,
            Err(_) => return Err(CacheError::Timeout(self.fetch_timeout)),
        };

        if data.is_empty() {
            return Err(CacheError::EmptyResponse);
        }

        files::write_atomic(cache_path, &data)
            .await
            .map_err(|e| CacheError::Write(format!("{}: {}", cache_path.display(), e)))?;

        let size = files::file_size(cache_path).await.unwrap_or(0);
        if size == 0 {
            return Err(CacheError::Write(format!(
                "{}: empty after write",
                cache_path.display()
            )));
        }

        let entry = CacheEntry {
            cache_path: cache_path.to_path_buf(),
            backup_path: backup_path.to_path_buf(),
            last_updated: now,
        };
        if let Err(e) = self.registry.put(&source.id, entry).await {
            warn!(source_id = %source.id, error = %e, "Failed to persist registry");
        }

        Ok(size)
    }

    /// Path of the freshest usable copy of a source's snapshot.
    ///
    /// Never waits on the network. If the source wants refreshing and no sync
    /// is running for it, one is started in the background.
    pub async fn cache_path(self: &Arc<Self>, source_id: &str) -> Result<PathBuf> {
        let (source, slot) = self.lookup(source_id)?;
        let cache_path = source.cache_path();
        let backup_path = source.backup_path();
        let cache_usable = files::is_usable(&cache_path).await;
        let backup_usable = files::is_usable(&backup_path).await;

        if !slot.in_flight.load(Ordering::Acquire)
            && self
                .refresh_wanted(source, cache_usable, backup_usable)
                .await
        {
            if self.backing_off(slot) {
                debug!(source_id, "Recent attempt failed, not retrying yet");
            } else {
                self.spawn_sync(source_id);
            }
        }

        if cache_usable {
            Ok(cache_path)
        } else if backup_usable {
            Ok(backup_path)
        } else {
            Err(CacheError::NotYetAvailable(source_id.to_string()))
        }
    }

    async fn refresh_wanted(
        &self,
        source: &DataSource,
        cache_usable: bool,
        backup_usable: bool,
    ) -> bool {
        let now = self.clock.now();
        if self.calendar.is_non_trading_day(now) && (cache_usable || backup_usable) {
            return false;
        }
        if !cache_usable {
            return true;
        }
        let last_updated = self
            .registry
            .get(&source.id)
            .await
            .map(|entry| entry.last_updated);
        policy::is_due(&source.refresh_policy, last_updated, now, &self.calendar)
    }

    fn backing_off(&self, slot: &SourceSlot) -> bool {
        let Ok(backoff) = chrono::Duration::from_std(self.retry_backoff) else {
            return false;
        };
        slot.failed_since(self.clock.now() - backoff)
    }

    fn spawn_sync(self: &Arc<Self>, source_id: &str) {
        let syncer = Arc::clone(self);
        let source_id = source_id.to_string();
        debug!(source_id = %source_id, "Starting background sync");
        tokio::spawn(async move {
            if let Err(e) = syncer.sync(&source_id).await {
                warn!(source_id = %source_id, error = %e, "Background sync failed");
            }
        });
    }

    /// Current state of every source
    pub async fn source_status(&self) -> Vec<SourceStatus> {
        let now = self.clock.now();
        let mut statuses = Vec::with_capacity(self.catalog.len());

        for source in self.catalog.iter() {
            let last_updated = self
                .registry
                .get(&source.id)
                .await
                .map(|entry| entry.last_updated);
            let cache_path = source.cache_path();

            statuses.push(SourceStatus {
                id: source.id.clone(),
                policy: source.refresh_policy,
                last_updated,
                due: policy::is_due(&source.refresh_policy, last_updated, now, &self.calendar),
                cache_usable: files::is_usable(&cache_path).await,
                backup_usable: files::is_usable(&source.backup_path()).await,
                cache_path,
            });
        }

        statuses
    }
}
