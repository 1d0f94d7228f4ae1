//! Refresh policies and the due-check
//!
//! [`is_due`] is a pure function of the policy, the last successful refresh
//! and the current instant. Wall-clock comparisons happen in the trading
//! calendar's timezone.

use chrono::{DateTime, NaiveTime, Utc};
use market_calendar::TradingCalendar;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How often a data source should be refreshed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum RefreshPolicy {
    /// Once per day, at or after `hour:minute`
    Scheduled { hour: u32, minute: u32 },
    /// Every `interval_minutes` while inside the window on a trading day
    MarketWindow {
        start_hour: u32,
        start_minute: u32,
        end_hour: u32,
        end_minute: u32,
        interval_minutes: u32,
    },
    /// Once per day at or after `hour:minute`; used for end-of-session snapshots
    AfternoonOnce { hour: u32, minute: u32 },
}

impl RefreshPolicy {
    /// Check field ranges; returns a description of the first problem found
    pub fn validate(&self) -> Result<(), String> {
        match *self {
            RefreshPolicy::Scheduled { hour, minute }
            | RefreshPolicy::AfternoonOnce { hour, minute } => {
                wall_time(hour, minute)
                    .map(|_| ())
                    .ok_or_else(|| format!("invalid trigger time {:02}:{:02}", hour, minute))
            }
            RefreshPolicy::MarketWindow {
                start_hour,
                start_minute,
                end_hour,
                end_minute,
                interval_minutes,
            } => {
                let start = wall_time(start_hour, start_minute).ok_or_else(|| {
                    format!("invalid window start {:02}:{:02}", start_hour, start_minute)
                })?;
                let end = wall_time(end_hour, end_minute).ok_or_else(|| {
                    format!("invalid window end {:02}:{:02}", end_hour, end_minute)
                })?;
                if start >= end {
                    return Err(format!("window start {} is not before end {}", start, end));
                }
                if interval_minutes == 0 {
                    return Err("refresh interval must be at least one minute".to_string());
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for RefreshPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefreshPolicy::Scheduled { hour, minute } => {
                write!(f, "scheduled {:02}:{:02}", hour, minute)
            }
            RefreshPolicy::MarketWindow {
                start_hour,
                start_minute,
                end_hour,
                end_minute,
                interval_minutes,
            } => write!(
                f,
                "market_window {:02}:{:02}-{:02}:{:02} every {}m",
                start_hour, start_minute, end_hour, end_minute, interval_minutes
            ),
            RefreshPolicy::AfternoonOnce { hour, minute } => {
                write!(f, "afternoon_once {:02}:{:02}", hour, minute)
            }
        }
    }
}

fn wall_time(hour: u32, minute: u32) -> Option<NaiveTime> {
    NaiveTime::from_hms_opt(hour, minute, 0)
}

/// Whether a source governed by `policy` needs refreshing at `now`.
///
/// A source that was never refreshed, or last refreshed on an earlier
/// exchange-local day, is always due. Otherwise:
/// - `Scheduled` / `AfternoonOnce`: due once `now` has reached today's trigger
///   time and the last refresh happened before it.
/// - `MarketWindow`: due while inside the window on a trading day and at least
///   one interval has passed since the last refresh. Never due outside the window.
pub fn is_due(
    policy: &RefreshPolicy,
    last_updated: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    calendar: &TradingCalendar,
) -> bool {
    let Some(last_updated) = last_updated else {
        return true;
    };

    if !calendar.same_local_day(last_updated, now) {
        return true;
    }

    match *policy {
        RefreshPolicy::Scheduled { hour, minute }
        | RefreshPolicy::AfternoonOnce { hour, minute } => {
            let Some(trigger) = wall_time(hour, minute) else {
                return false;
            };
            // Same local day, so wall-clock times order the two instants
            calendar.local(now).time() >= trigger && calendar.local(last_updated).time() < trigger
        }
        RefreshPolicy::MarketWindow {
            start_hour,
            start_minute,
            end_hour,
            end_minute,
            interval_minutes,
        } => {
            let (Some(start), Some(end)) = (
                wall_time(start_hour, start_minute),
                wall_time(end_hour, end_minute),
            ) else {
                return false;
            };
            if !calendar.is_within_window(now, start, end) || calendar.is_non_trading_day(now) {
                return false;
            }
            now - last_updated >= chrono::Duration::minutes(i64::from(interval_minutes))
        }
    }
}
