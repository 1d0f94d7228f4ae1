//! Configuration and response types for the snapshot sync service

use crate::error::{Result, SnapshotSyncError};
use chrono::NaiveDate;
use chrono_tz::Tz;
use market_calendar::{
    MarketActivitySignal, NonTradingDayRule, TradingCalendar, TradingSession,
};
use serde::{Deserialize, Serialize};
use snapshot_cache::SyncStats;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Configuration for the snapshot sync service
#[derive(Debug, Clone)]
pub struct SnapshotSyncConfig {
    pub port: u16,
    pub catalog_path: PathBuf,
    pub data_root: PathBuf,
    pub registry_path: PathBuf,
    pub blob_base_url: String,
    pub fetch_timeout: Duration,
    pub poll_interval: Duration,
    pub timezone: Tz,
    pub session: TradingSession,
    pub non_trading_day_rule: String,
    pub holidays: BTreeSet<NaiveDate>,
}

impl Default for SnapshotSyncConfig {
    fn default() -> Self {
        Self {
            port: 3005,
            catalog_path: PathBuf::from("./sources.json"),
            data_root: PathBuf::from("./data"),
            registry_path: PathBuf::from("./data/last_update.json"),
            blob_base_url: "http://localhost:9000/blobs".to_string(),
            fetch_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_secs(60),
            timezone: chrono_tz::UTC,
            session: TradingSession::default(),
            non_trading_day_rule: "weekend".to_string(),
            holidays: BTreeSet::new(),
        }
    }
}

impl SnapshotSyncConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let port = parse_var::<u16>(&lookup, "PORT")?.unwrap_or(defaults.port);

        let catalog_path = lookup("CATALOG_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.catalog_path);

        let data_root = lookup("DATA_ROOT")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_root);

        let registry_path = lookup("REGISTRY_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_root.join("last_update.json"));

        let blob_base_url = lookup("BLOB_BASE_URL").unwrap_or(defaults.blob_base_url);

        let fetch_timeout =
            parse_secs(&lookup, "FETCH_TIMEOUT_SECS")?.unwrap_or(defaults.fetch_timeout);

        let poll_interval =
            parse_secs(&lookup, "POLL_INTERVAL_SECS")?.unwrap_or(defaults.poll_interval);

        let timezone = match lookup("MARKET_TIMEZONE") {
            Some(name) => TradingCalendar::parse_timezone(&name)?,
            None => defaults.timezone,
        };

        let session = match lookup("TRADING_HOURS") {
            Some(hours) => TradingSession::parse(&hours)?,
            None => defaults.session,
        };

        let non_trading_day_rule = lookup("NON_TRADING_DAY_RULE")
            .map(|s| s.trim().to_lowercase())
            .unwrap_or(defaults.non_trading_day_rule);

        let holidays = match lookup("MARKET_HOLIDAYS") {
            Some(list) => NonTradingDayRule::parse_holidays(&list)?,
            None => defaults.holidays,
        };

        if blob_base_url.trim().is_empty() {
            return Err(SnapshotSyncError::Config(
                "BLOB_BASE_URL must not be empty".to_string(),
            ));
        }

        Ok(Self {
            port,
            catalog_path,
            data_root,
            registry_path,
            blob_base_url,
            fetch_timeout,
            poll_interval,
            timezone,
            session,
            non_trading_day_rule,
            holidays,
        })
    }

    /// Assemble the trading calendar, wiring `signal` in for the market-signal rule
    pub fn build_calendar(&self, signal: Arc<dyn MarketActivitySignal>) -> Result<TradingCalendar> {
        let rule =
            NonTradingDayRule::from_name(&self.non_trading_day_rule, self.holidays.clone(), signal)?;
        Ok(TradingCalendar::new(self.timezone, self.session, rule))
    }
}

/// Parse an optional variable; present but malformed is an error
fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>> {
    lookup(key)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|_| {
                SnapshotSyncError::Config(format!("{} has an invalid value {:?}", key, raw))
            })
        })
        .transpose()
}

/// A positive number of seconds
fn parse_secs(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<Duration>> {
    match parse_var::<u64>(lookup, key)? {
        Some(0) => Err(SnapshotSyncError::Config(format!(
            "{} must be at least 1 second",
            key
        ))),
        secs => Ok(secs.map(Duration::from_secs)),
    }
}

/// Body of `POST /market-signal`
#[derive(Debug, Deserialize)]
pub struct MarketSignalReading {
    pub date: NaiveDate,
    pub volume: u64,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
    pub sources: usize,
    pub sync: SyncStats,
}
