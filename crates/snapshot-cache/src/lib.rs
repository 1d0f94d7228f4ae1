//! Market data snapshot cache
//!
//! Keeps locally cached copies of remotely hosted snapshot files fresh and
//! hands consumers a path they can open without waiting on the network.
//!
//! - [`SourceCatalog`]: the known data sources and their refresh policies
//! - [`policy::is_due`]: decides whether a source needs refreshing
//! - [`CacheRegistry`]: durable `source id -> CacheEntry` mapping
//! - [`SnapshotSyncer`]: download-with-fallback coordination, one attempt per source at a time
//! - [`SyncDriver`]: periodic driver that syncs every source on a fixed tick

pub mod catalog;
pub mod clock;
pub mod driver;
pub mod error;
mod files;
pub mod policy;
pub mod registry;
pub mod syncer;
pub mod types;

pub use catalog::{DataSource, SourceCatalog};
pub use clock::{Clock, ManualClock, SystemClock};
pub use driver::SyncDriver;
pub use error::{CacheError, Result};
pub use policy::RefreshPolicy;
pub use registry::{CacheRegistry, Registry, RegistryStore};
pub use syncer::SnapshotSyncer;
pub use types::{CacheEntry, Resolution, ServedFrom, SourceStatus, SyncState, SyncStats};
