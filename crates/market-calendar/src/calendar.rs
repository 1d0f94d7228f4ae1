//! Exchange-local trading hours

use crate::error::{CalendarError, Result};
use crate::rule::NonTradingDayRule;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;
use tracing::debug;

/// Daily trading window in exchange-local wall-clock time (both ends inclusive)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TradingSession {
    pub open: NaiveTime,
    pub close: NaiveTime,
}

impl TradingSession {
    pub fn new(open: NaiveTime, close: NaiveTime) -> Result<Self> {
        if open >= close {
            return Err(CalendarError::InvalidSession(format!(
                "open {} is not before close {}",
                open, close
            )));
        }
        Ok(Self { open, close })
    }

    pub fn from_hm(
        open_hour: u32,
        open_minute: u32,
        close_hour: u32,
        close_minute: u32,
    ) -> Result<Self> {
        let open = NaiveTime::from_hms_opt(open_hour, open_minute, 0).ok_or_else(|| {
            CalendarError::InvalidSession(format!("{}:{}", open_hour, open_minute))
        })?;
        let close = NaiveTime::from_hms_opt(close_hour, close_minute, 0).ok_or_else(|| {
            CalendarError::InvalidSession(format!("{}:{}", close_hour, close_minute))
        })?;
        Self::new(open, close)
    }

    /// Parse "HH:MM-HH:MM"
    pub fn parse(hours: &str) -> Result<Self> {
        let (open, close) = hours
            .split_once('-')
            .ok_or_else(|| CalendarError::InvalidSession(hours.to_string()))?;
        let parse_time = |s: &str| {
            NaiveTime::parse_from_str(s.trim(), "%H:%M")
                .map_err(|_| CalendarError::InvalidSession(hours.to_string()))
        };
        Self::new(parse_time(open)?, parse_time(close)?)
    }

    pub fn contains(&self, time: NaiveTime) -> bool {
        time >= self.open && time <= self.close
    }
}

impl Default for TradingSession {
    fn default() -> Self {
        Self {
            open: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            close: NaiveTime::from_hms_opt(16, 0, 0).unwrap(),
        }
    }
}

/// Trading calendar for one exchange
#[derive(Debug, Clone)]
pub struct TradingCalendar {
    timezone: Tz,
    session: TradingSession,
    rule: NonTradingDayRule,
}

impl TradingCalendar {
    pub fn new(timezone: Tz, session: TradingSession, rule: NonTradingDayRule) -> Self {
        Self {
            timezone,
            session,
            rule,
        }
    }

    /// Look up an IANA timezone name ("Asia/Seoul", "America/New_York", "UTC")
    pub fn parse_timezone(name: &str) -> Result<Tz> {
        name.trim()
            .parse::<Tz>()
            .map_err(|_| CalendarError::InvalidTimezone(name.to_string()))
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn session(&self) -> TradingSession {
        self.session
    }

    pub fn rule(&self) -> &NonTradingDayRule {
        &self.rule
    }

    /// Convert an instant to exchange-local time
    pub fn local(&self, now: DateTime<Utc>) -> DateTime<Tz> {
        now.with_timezone(&self.timezone)
    }

    /// Exchange-local calendar date of an instant
    pub fn local_date(&self, now: DateTime<Utc>) -> NaiveDate {
        self.local(now).date_naive()
    }

    /// True iff `now` falls inside the configured session on a weekday
    pub fn is_trading_hours(&self, now: DateTime<Utc>) -> bool {
        self.is_within_window(now, self.session.open, self.session.close)
    }

    /// True iff `now` falls inside `[start, end]` on a weekday
    pub fn is_within_window(&self, now: DateTime<Utc>, start: NaiveTime, end: NaiveTime) -> bool {
        let local = self.local(now);
        if NonTradingDayRule::is_weekend(local.date_naive()) {
            return false;
        }
        let time = local.time();
        time >= start && time <= end
    }

    /// True iff `now`'s exchange-local day is a non-trading day under the configured rule
    pub fn is_non_trading_day(&self, now: DateTime<Utc>) -> bool {
        let date = self.local_date(now);
        let closed = self.rule.is_non_trading_day(date);
        if closed {
            debug!(date = %date, rule = self.rule.name(), "Non-trading day");
        }
        closed
    }

    /// Whether two instants fall on the same exchange-local calendar day
    pub fn same_local_day(&self, a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
        self.local_date(a) == self.local_date(b)
    }
}
