//! Error types for the snapshot sync service

use std::fmt;

#[derive(Debug)]
pub enum SnapshotSyncError {
    Cache(snapshot_cache::CacheError),
    Fetch(snapshot_fetcher::FetchError),
    Calendar(market_calendar::CalendarError),
    Io(Box<std::io::Error>),
    Config(String),
}

impl fmt::Display for SnapshotSyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotSyncError::Cache(err) => write!(f, "Cache error: {}", err),
            SnapshotSyncError::Fetch(err) => write!(f, "Fetcher error: {}", err),
            SnapshotSyncError::Calendar(err) => write!(f, "Calendar error: {}", err),
            SnapshotSyncError::Io(err) => write!(f, "IO error: {}", err),
            SnapshotSyncError::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for SnapshotSyncError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SnapshotSyncError::Cache(err) => Some(err),
            SnapshotSyncError::Fetch(err) => Some(err),
            SnapshotSyncError::Calendar(err) => Some(err),
            SnapshotSyncError::Io(err) => Some(err.as_ref()),
            SnapshotSyncError::Config(_) => None,
        }
    }
}

impl From<snapshot_cache::CacheError> for SnapshotSyncError {
    fn from(err: snapshot_cache::CacheError) -> Self {
        SnapshotSyncError::Cache(err)
    }
}

impl From<snapshot_fetcher::FetchError> for SnapshotSyncError {
    fn from(err: snapshot_fetcher::FetchError) -> Self {
        SnapshotSyncError::Fetch(err)
    }
}

impl From<market_calendar::CalendarError> for SnapshotSyncError {
    fn from(err: market_calendar::CalendarError) -> Self {
        SnapshotSyncError::Calendar(err)
    }
}

impl From<std::io::Error> for SnapshotSyncError {
    fn from(err: std::io::Error) -> Self {
        SnapshotSyncError::Io(Box::new(err))
    }
}

impl From<tracing_subscriber::filter::ParseError> for SnapshotSyncError {
    fn from(err: tracing_subscriber::filter::ParseError) -> Self {
        SnapshotSyncError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SnapshotSyncError>;
