//! Snapshot Blob Fetcher
//!
//! The remote side of snapshot synchronisation: a single capability,
//! "give me the bytes behind this locator". Any transport that satisfies
//! [`BlobFetcher`] can back the cache; [`HttpBlobFetcher`] is the one the
//! service ships with.

pub mod error;
pub mod fetcher;

pub use error::{FetchError, Result};
pub use fetcher::{BlobFetcher, HttpBlobFetcher};
