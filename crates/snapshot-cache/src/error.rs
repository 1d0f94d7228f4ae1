//! Error types for the snapshot cache

use std::fmt;
use std::time::Duration;

/// Errors raised while resolving or refreshing a snapshot.
///
/// Cloneable so callers coalesced onto one in-flight attempt can all
/// receive its outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// Remote fetch failed
    Fetch(String),
    /// Remote fetch succeeded but returned no bytes
    EmptyResponse,
    /// Remote fetch did not complete in time
    Timeout(Duration),
    /// Writing the cache file failed
    Write(String),
    /// Persisted registry could not be parsed
    RegistryCorrupt(String),
    /// Persisting the registry failed
    Registry(String),
    Io(String),
    Catalog(String),
    UnknownSource(String),
    /// No path has been resolved for the source yet
    NotYetAvailable(String),
    /// Cache, backup and a fresh fetch have all failed or never existed
    NoAvailableData(String),
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::Fetch(msg) => write!(f, "Fetch error: {}", msg),
            CacheError::EmptyResponse => write!(f, "Fetch returned an empty blob"),
            CacheError::Timeout(after) => write!(f, "Fetch timed out after {:?}", after),
            CacheError::Write(msg) => write!(f, "Write error: {}", msg),
            CacheError::RegistryCorrupt(msg) => write!(f, "Registry is corrupt: {}", msg),
            CacheError::Registry(msg) => write!(f, "Registry error: {}", msg),
            CacheError::Io(msg) => write!(f, "IO error: {}", msg),
            CacheError::Catalog(msg) => write!(f, "Catalog error: {}", msg),
            CacheError::UnknownSource(id) => write!(f, "Unknown data source: {}", id),
            CacheError::NotYetAvailable(id) => write!(f, "No snapshot available yet for {}", id),
            CacheError::NoAvailableData(id) => write!(f, "No data available for {}", id),
        }
    }
}

impl std::error::Error for CacheError {}

impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        CacheError::Io(err.to_string())
    }
}

impl From<snapshot_fetcher::FetchError> for CacheError {
    fn from(err: snapshot_fetcher::FetchError) -> Self {
        CacheError::Fetch(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CacheError>;
