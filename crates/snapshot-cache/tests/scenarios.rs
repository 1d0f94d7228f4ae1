//! End-to-end sync scenarios against a stub blob store and a manual clock

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use market_calendar::{NonTradingDayRule, TradingCalendar, TradingSession};
use snapshot_cache::policy::is_due;
use snapshot_cache::{
    CacheEntry, CacheError, CacheRegistry, DataSource, ManualClock, RefreshPolicy,
    SnapshotSyncer, SourceCatalog, SyncState,
};
use snapshot_fetcher::{BlobFetcher, FetchError};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::{tempdir, TempDir};

const SOURCE_ID: &str = "1Qx_reference_data";

struct CountingFetcher {
    body: Vec<u8>,
    calls: AtomicUsize,
}

impl CountingFetcher {
    fn new(body: Vec<u8>) -> Arc<Self> {
        Arc::new(Self {
            body,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BlobFetcher for CountingFetcher {
    async fn fetch_blob(&self, _locator: &str) -> snapshot_fetcher::Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.body.clone())
    }
}

struct UnreachableStore;

#[async_trait]
impl BlobFetcher for UnreachableStore {
    async fn fetch_blob(&self, locator: &str) -> snapshot_fetcher::Result<Vec<u8>> {
        Err(FetchError::Status {
            status: 503,
            url: locator.to_string(),
        })
    }
}

fn calendar() -> TradingCalendar {
    TradingCalendar::new(
        chrono_tz::UTC,
        TradingSession::default(),
        NonTradingDayRule::Weekend,
    )
}

/// 2026-10-19 is a Monday
fn monday(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 19, h, m, 0).unwrap()
}

fn catalog(dir: &Path, policy: RefreshPolicy) -> SourceCatalog {
    SourceCatalog::new(vec![DataSource {
        id: SOURCE_ID.to_string(),
        remote_locator: SOURCE_ID.to_string(),
        local_folder: dir.join("reference"),
        file_name: "reference.csv".to_string(),
        refresh_policy: policy,
    }])
    .unwrap()
}

fn registry_path(dir: &TempDir) -> std::path::PathBuf {
    dir.path().join("last_update.json")
}

fn syncer(
    dir: &TempDir,
    policy: RefreshPolicy,
    fetcher: Arc<dyn BlobFetcher>,
    now: DateTime<Utc>,
) -> SnapshotSyncer {
    SnapshotSyncer::new(
        catalog(dir.path(), policy),
        CacheRegistry::open(registry_path(dir)),
        fetcher,
        calendar(),
    )
    .with_clock(Arc::new(ManualClock::new(now)))
}

const DAILY: RefreshPolicy = RefreshPolicy::Scheduled {
    hour: 17,
    minute: 50,
};

#[tokio::test]
async fn scheduled_refresh_on_empty_registry() {
    let dir = tempdir().unwrap();
    let fetcher = CountingFetcher::new(vec![b'x'; 1200]);
    let syncer = syncer(&dir, DAILY, fetcher.clone(), monday(18, 0));

    let resolution = syncer.sync(SOURCE_ID).await.unwrap();

    assert_eq!(resolution.state(), SyncState::DownloadOk);
    assert_eq!(std::fs::metadata(&resolution.path).unwrap().len(), 1200);
    let entry = syncer.registry().get(SOURCE_ID).await.unwrap();
    assert_eq!(entry.last_updated, monday(18, 0));
    assert_eq!(fetcher.calls(), 1);
}

#[tokio::test]
async fn empty_response_with_no_prior_copy_is_unavailable() {
    let dir = tempdir().unwrap();
    let fetcher = CountingFetcher::new(Vec::new());
    let syncer = syncer(&dir, DAILY, fetcher.clone(), monday(18, 0));

    let err = syncer.sync(SOURCE_ID).await.unwrap_err();

    assert_eq!(err, CacheError::NoAvailableData(SOURCE_ID.to_string()));
    assert!(syncer.registry().get(SOURCE_ID).await.is_none());
}

#[tokio::test]
async fn market_window_within_interval_serves_existing_cache() {
    let dir = tempdir().unwrap();
    let policy = RefreshPolicy::MarketWindow {
        start_hour: 9,
        start_minute: 0,
        end_hour: 16,
        end_minute: 0,
        interval_minutes: 10,
    };
    let fetcher = CountingFetcher::new(b"fresh".to_vec());
    let now = monday(11, 0);
    let syncer = syncer(&dir, policy, fetcher.clone(), now);

    let source = syncer.catalog().get(SOURCE_ID).unwrap().clone();
    std::fs::create_dir_all(&source.local_folder).unwrap();
    std::fs::write(source.cache_path(), b"nine minutes old").unwrap();
    syncer
        .registry()
        .put(
            SOURCE_ID,
            CacheEntry {
                cache_path: source.cache_path(),
                backup_path: source.backup_path(),
                last_updated: now - ChronoDuration::minutes(9),
            },
        )
        .await
        .unwrap();

    let resolution = syncer.sync(SOURCE_ID).await.unwrap();

    assert_eq!(resolution.state(), SyncState::NotDue);
    assert_eq!(
        std::fs::read(&resolution.path).unwrap(),
        b"nine minutes old"
    );
    assert_eq!(fetcher.calls(), 0);
}

#[tokio::test]
async fn non_trading_day_with_valid_cache_makes_no_fetch() {
    let dir = tempdir().unwrap();
    let fetcher = CountingFetcher::new(b"weekend".to_vec());
    let saturday = Utc.with_ymd_and_hms(2026, 10, 17, 12, 0, 0).unwrap();
    let syncer = syncer(&dir, DAILY, fetcher.clone(), saturday);

    let source = syncer.catalog().get(SOURCE_ID).unwrap().clone();
    std::fs::create_dir_all(&source.local_folder).unwrap();
    std::fs::write(source.cache_path(), vec![b'y'; 500]).unwrap();

    let resolution = syncer.sync(SOURCE_ID).await.unwrap();

    assert_eq!(resolution.path, source.cache_path());
    assert_eq!(resolution.state(), SyncState::NonTradingDayShortCircuit);
    assert_eq!(fetcher.calls(), 0);
}

#[tokio::test]
async fn registry_survives_restart() {
    let dir = tempdir().unwrap();
    let now = monday(18, 0);

    {
        let fetcher = CountingFetcher::new(b"close".to_vec());
        let first_run = syncer(&dir, DAILY, fetcher, now);
        first_run.sync(SOURCE_ID).await.unwrap();
    }

    // Fresh process: new registry instance reading the same file
    let fetcher = CountingFetcher::new(b"close".to_vec());
    let second_run = syncer(&dir, DAILY, fetcher.clone(), now);

    let entry = second_run.registry().get(SOURCE_ID).await.unwrap();
    assert!(!is_due(&DAILY, Some(entry.last_updated), now, &calendar()));

    let resolution = second_run.sync(SOURCE_ID).await.unwrap();
    assert_eq!(resolution.state(), SyncState::NotDue);
    assert_eq!(fetcher.calls(), 0);
}

#[tokio::test]
async fn failed_refresh_retries_on_next_due_check() {
    let dir = tempdir().unwrap();
    let now = monday(18, 0);

    let failing = syncer(&dir, DAILY, Arc::new(UnreachableStore), now);
    assert!(failing.sync(SOURCE_ID).await.is_err());

    // Nothing was recorded, so the source is still due for the next attempt
    let fetcher = CountingFetcher::new(b"close".to_vec());
    let retry = syncer(&dir, DAILY, fetcher.clone(), now + ChronoDuration::minutes(1));
    let resolution = retry.sync(SOURCE_ID).await.unwrap();

    assert_eq!(resolution.state(), SyncState::DownloadOk);
    assert_eq!(fetcher.calls(), 1);
}
