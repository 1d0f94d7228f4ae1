//! Error types for the market calendar

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalendarError {
    InvalidSession(String),
    InvalidTimezone(String),
    InvalidDate(String),
    UnknownRule(String),
}

impl fmt::Display for CalendarError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CalendarError::InvalidSession(msg) => write!(f, "Invalid trading session: {}", msg),
            CalendarError::InvalidTimezone(tz) => write!(f, "Unknown timezone: {}", tz),
            CalendarError::InvalidDate(date) => write!(f, "Invalid date: {}", date),
            CalendarError::UnknownRule(rule) => write!(f, "Unknown non-trading-day rule: {}", rule),
        }
    }
}

impl std::error::Error for CalendarError {}

pub type Result<T> = std::result::Result<T, CalendarError>;
