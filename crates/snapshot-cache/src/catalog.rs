//! Known data sources
//!
//! The catalog is fixed at startup. Each source names a remote blob, the
//! local file it is cached to, and the policy that decides when to refresh.

use crate::error::{CacheError, Result};
use crate::files;
use crate::policy::RefreshPolicy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

/// One externally sourced snapshot file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSource {
    pub id: String,
    /// Opaque handle passed to the blob fetcher
    pub remote_locator: String,
    pub local_folder: PathBuf,
    pub file_name: String,
    pub refresh_policy: RefreshPolicy,
}

impl DataSource {
    /// Primary cached copy: `<localFolder>/<fileName>`
    pub fn cache_path(&self) -> PathBuf {
        self.local_folder.join(&self.file_name)
    }

    /// Previous good copy: `<localFolder>/<fileName>.backup`
    pub fn backup_path(&self) -> PathBuf {
        files::sibling(&self.cache_path(), "backup")
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("source id is empty".to_string());
        }
        if self.remote_locator.trim().is_empty() {
            return Err(format!("{}: remote locator is empty", self.id));
        }
        if self.file_name.trim().is_empty() || self.file_name.contains(['/', '\\']) {
            return Err(format!("{}: invalid file name {:?}", self.id, self.file_name));
        }
        self.refresh_policy
            .validate()
            .map_err(|msg| format!("{}: {}", self.id, msg))
    }
}

/// Immutable list of data sources, in declaration order
#[derive(Debug, Clone, Default)]
pub struct SourceCatalog {
    sources: Vec<DataSource>,
}

impl SourceCatalog {
    pub fn new(sources: Vec<DataSource>) -> Result<Self> {
        let mut seen = HashSet::new();
        for source in &sources {
            source.validate().map_err(CacheError::Catalog)?;
            if !seen.insert(source.id.as_str()) {
                return Err(CacheError::Catalog(format!(
                    "duplicate source id {}",
                    source.id
                )));
            }
        }
        Ok(Self { sources })
    }

    /// Parse a JSON array of sources
    pub fn from_json(json: &str) -> Result<Self> {
        let sources: Vec<DataSource> =
            serde_json::from_str(json).map_err(|e| CacheError::Catalog(e.to_string()))?;
        Self::new(sources)
    }

    /// Load a catalog file, resolving relative folders against `data_root`
    pub async fn load(path: &Path, data_root: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .await
            .map_err(|e| CacheError::Catalog(format!("{}: {}", path.display(), e)))?;
        let catalog = Self::from_json(&json)?.rooted_at(data_root);
        info!(path = ?path, sources = catalog.len(), "Source catalog loaded");
        Ok(catalog)
    }

    /// Resolve every relative `local_folder` against `root`
    pub fn rooted_at(mut self, root: &Path) -> Self {
        for source in &mut self.sources {
            if source.local_folder.is_relative() {
                source.local_folder = root.join(&source.local_folder);
            }
        }
        self
    }

    pub fn get(&self, source_id: &str) -> Option<&DataSource> {
        self.sources.iter().find(|s| s.id == source_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DataSource> {
        self.sources.iter()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const CATALOG: &str = r#"[
        {
            "id": "1Qx_kospi_close",
            "remoteLocator": "1Qx_kospi_close",
            "localFolder": "market",
            "fileName": "kospi_close.csv",
            "refreshPolicy": { "kind": "scheduled", "hour": 17, "minute": 50 }
        },
        {
            "id": "1Qx_intraday",
            "remoteLocator": "https://blobs.example.com/intraday.csv",
            "localFolder": "/var/lib/snapshots/intraday",
            "fileName": "intraday.csv",
            "refreshPolicy": {
                "kind": "market_window",
                "startHour": 9, "startMinute": 0,
                "endHour": 16, "endMinute": 0,
                "intervalMinutes": 10
            }
        }
    ]"#;

    #[test]
    fn test_from_json() {
        let catalog = SourceCatalog::from_json(CATALOG).unwrap();
        assert_eq!(catalog.len(), 2);

        let close = catalog.get("1Qx_kospi_close").unwrap();
        assert_eq!(
            close.refresh_policy,
            RefreshPolicy::Scheduled {
                hour: 17,
                minute: 50
            }
        );
        assert!(catalog.get("missing").is_none());
    }

    #[test]
    fn test_paths() {
        let catalog = SourceCatalog::from_json(CATALOG)
            .unwrap()
            .rooted_at(Path::new("/srv/data"));

        let close = catalog.get("1Qx_kospi_close").unwrap();
        assert_eq!(
            close.cache_path(),
            PathBuf::from("/srv/data/market/kospi_close.csv")
        );
        assert_eq!(
            close.backup_path(),
            PathBuf::from("/srv/data/market/kospi_close.csv.backup")
        );

        // Absolute folders are left alone
        let intraday = catalog.get("1Qx_intraday").unwrap();
        assert_eq!(
            intraday.cache_path(),
            PathBuf::from("/var/lib/snapshots/intraday/intraday.csv")
        );
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let source = DataSource {
            id: "dup".to_string(),
            remote_locator: "dup".to_string(),
            local_folder: PathBuf::from("market"),
            file_name: "dup.csv".to_string(),
            refresh_policy: RefreshPolicy::Scheduled { hour: 8, minute: 0 },
        };
        let err = SourceCatalog::new(vec![source.clone(), source]).unwrap_err();
        assert_eq!(err, CacheError::Catalog("duplicate source id dup".to_string()));
    }

    #[test]
    fn test_invalid_sources_rejected() {
        let base = DataSource {
            id: "kospi".to_string(),
            remote_locator: "kospi".to_string(),
            local_folder: PathBuf::from("market"),
            file_name: "kospi.csv".to_string(),
            refresh_policy: RefreshPolicy::Scheduled { hour: 8, minute: 0 },
        };

        let mut bad_name = base.clone();
        bad_name.file_name = "../escape.csv".to_string();
        assert!(SourceCatalog::new(vec![bad_name]).is_err());

        let mut bad_policy = base.clone();
        bad_policy.refresh_policy = RefreshPolicy::AfternoonOnce {
            hour: 15,
            minute: 60,
        };
        assert!(SourceCatalog::new(vec![bad_policy]).is_err());

        let mut no_locator = base;
        no_locator.remote_locator = " ".to_string();
        assert!(SourceCatalog::new(vec![no_locator]).is_err());
    }

    #[test]
    fn test_unknown_policy_kind_rejected() {
        let json = r#"[{
            "id": "x", "remoteLocator": "x", "localFolder": "m", "fileName": "x.csv",
            "refreshPolicy": { "kind": "hourly" }
        }]"#;
        assert!(matches!(
            SourceCatalog::from_json(json),
            Err(CacheError::Catalog(_))
        ));
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sources.json");
        std::fs::write(&path, CATALOG).unwrap();

        let catalog = SourceCatalog::load(&path, dir.path()).await.unwrap();
        let close = catalog.get("1Qx_kospi_close").unwrap();
        assert!(close.cache_path().starts_with(dir.path()));
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let result = SourceCatalog::load(&dir.path().join("nope.json"), dir.path()).await;
        assert!(matches!(result, Err(CacheError::Catalog(_))));
    }
}
