//! Non-trading-day rules
//!
//! Two families of rule are in use depending on the deployment: a static
//! calendar (weekends, optionally plus an exchange holiday list) and a market
//! signal (the reference index traded nothing today, so the exchange was shut).
//! Neither supersedes the other; the deployment picks one.

use crate::error::{CalendarError, Result};
use chrono::{Datelike, NaiveDate, Weekday};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, RwLock};

/// Source of per-day market activity readings
pub trait MarketActivitySignal: Send + Sync {
    /// Traded volume of the reference index on `date`, if a reading exists
    fn traded_volume(&self, date: NaiveDate) -> Option<u64>;
}

/// In-memory volume readings fed by the host application
#[derive(Debug, Default)]
pub struct VolumeLedger {
    readings: RwLock<HashMap<NaiveDate, u64>>,
}

impl VolumeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the reference index volume observed for `date`
    pub fn record(&self, date: NaiveDate, volume: u64) {
        let mut readings = self.readings.write().unwrap_or_else(|e| e.into_inner());
        readings.insert(date, volume);
    }
}

impl MarketActivitySignal for VolumeLedger {
    fn traded_volume(&self, date: NaiveDate) -> Option<u64> {
        let readings = self.readings.read().unwrap_or_else(|e| e.into_inner());
        readings.get(&date).copied()
    }
}

/// Strategy used to recognise non-trading days
#[derive(Clone)]
pub enum NonTradingDayRule {
    /// Saturdays and Sundays
    Weekend,
    /// Weekends plus an explicit exchange holiday list
    Holidays(BTreeSet<NaiveDate>),
    /// Zero traded volume means closed; without a reading, fall back to weekends
    MarketSignal(Arc<dyn MarketActivitySignal>),
}

impl NonTradingDayRule {
    /// Build a rule from its configuration name
    pub fn from_name(
        name: &str,
        holidays: BTreeSet<NaiveDate>,
        signal: Arc<dyn MarketActivitySignal>,
    ) -> Result<Self> {
        match name.trim() {
            "weekend" => Ok(NonTradingDayRule::Weekend),
            "holidays" => Ok(NonTradingDayRule::Holidays(holidays)),
            "market-signal" => Ok(NonTradingDayRule::MarketSignal(signal)),
            other => Err(CalendarError::UnknownRule(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            NonTradingDayRule::Weekend => "weekend",
            NonTradingDayRule::Holidays(_) => "holidays",
            NonTradingDayRule::MarketSignal(_) => "market-signal",
        }
    }

    pub fn is_weekend(date: NaiveDate) -> bool {
        matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
    }

    /// Whether `date` (exchange-local) is a non-trading day under this rule
    pub fn is_non_trading_day(&self, date: NaiveDate) -> bool {
        match self {
            NonTradingDayRule::Weekend => Self::is_weekend(date),
            NonTradingDayRule::Holidays(holidays) => {
                Self::is_weekend(date) || holidays.contains(&date)
            }
            NonTradingDayRule::MarketSignal(signal) => match signal.traded_volume(date) {
                Some(volume) => volume == 0,
                None => Self::is_weekend(date),
            },
        }
    }

    /// Parse a comma-separated list of ISO dates ("2026-01-01,2026-02-16")
    pub fn parse_holidays(list: &str) -> Result<BTreeSet<NaiveDate>> {
        list.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                NaiveDate::parse_from_str(s, "%Y-%m-%d")
                    .map_err(|_| CalendarError::InvalidDate(s.to_string()))
            })
            .collect()
    }
}

impl fmt::Debug for NonTradingDayRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NonTradingDayRule::Weekend => write!(f, "Weekend"),
            NonTradingDayRule::Holidays(days) => f.debug_tuple("Holidays").field(days).finish(),
            NonTradingDayRule::MarketSignal(_) => write!(f, "MarketSignal(..)"),
        }
    }
}
