//! Market Calendar
//!
//! Answers "is the market open" and "is today a non-trading day" for a
//! single exchange. Pure functions of wall-clock time; the only pluggable
//! part is the rule used to recognise non-trading days.

mod calendar;
mod error;
mod rule;

pub use calendar::{TradingCalendar, TradingSession};
pub use error::{CalendarError, Result};
pub use rule::{MarketActivitySignal, NonTradingDayRule, VolumeLedger};
