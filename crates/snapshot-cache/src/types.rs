//! Cache types

use crate::policy::RefreshPolicy;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Registry record for one data source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub cache_path: PathBuf,
    pub backup_path: PathBuf,
    /// Time of the last successful fetch that replaced `cache_path`
    pub last_updated: DateTime<Utc>,
}

/// States a sync attempt passes through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncState {
    NonTradingDayShortCircuit,
    NotDue,
    Downloading,
    DownloadOk,
    DownloadFailed,
    Resolved,
}

impl SyncState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncState::NonTradingDayShortCircuit => "NON_TRADING_DAY_SHORT_CIRCUIT",
            SyncState::NotDue => "NOT_DUE",
            SyncState::Downloading => "DOWNLOADING",
            SyncState::DownloadOk => "DOWNLOAD_OK",
            SyncState::DownloadFailed => "DOWNLOAD_FAILED",
            SyncState::Resolved => "RESOLVED",
        }
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which copy of the snapshot a resolved path points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServedFrom {
    Cache,
    Backup,
}

/// Outcome of a sync attempt that produced a usable file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub source_id: String,
    pub path: PathBuf,
    pub served_from: ServedFrom,
    /// Every state the attempt passed through, ending in `Resolved`
    pub trace: Vec<SyncState>,
}

impl Resolution {
    /// The state that decided the outcome (the last one before `Resolved`)
    pub fn state(&self) -> SyncState {
        self.trace
            .iter()
            .rev()
            .copied()
            .find(|s| *s != SyncState::Resolved)
            .unwrap_or(SyncState::Resolved)
    }
}

/// Counters across all sync attempts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStats {
    pub attempts: u64,
    pub fetches: u64,
    pub downloads_ok: u64,
    pub downloads_failed: u64,
    pub short_circuits: u64,
    pub not_due: u64,
    /// Callers that received another caller's in-flight result
    pub coalesced: u64,
}

/// Point-in-time view of one source
#[derive(Debug, Clone, Serialize)]
pub struct SourceStatus {
    pub id: String,
    pub policy: RefreshPolicy,
    pub last_updated: Option<DateTime<Utc>>,
    pub due: bool,
    pub cache_path: PathBuf,
    pub cache_usable: bool,
    pub backup_usable: bool,
}
