//! Date parsing for the mixed formats DMS exports use.
//!
//! Slash dates are ambiguous. With no locale in the files, month-first is the
//! default: "03/04/2024" is 4 March. Callers that know the dealer writes
//! day-first pass `DateOrder::DayFirst`.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum DateOrder {
    #[default]
    MonthFirst,
    DayFirst,
}

const MONTH_FIRST: &[&str] = &["%m/%d/%Y", "%d/%m/%Y", "%Y-%m-%d", "%-d/%-m/%Y", "%-m/%-d/%Y"];
const DAY_FIRST: &[&str] = &["%d/%m/%Y", "%m/%d/%Y", "%Y-%m-%d", "%-m/%-d/%Y", "%-d/%-m/%Y"];

const MIN_YEAR: i32 = 1900;

impl DateOrder {
    fn formats(&self) -> &'static [&'static str] {
        match self {
            DateOrder::MonthFirst => MONTH_FIRST,
            DateOrder::DayFirst => DAY_FIRST,
        }
    }
}

/// Parse a raw date, ignoring anything after the first whitespace (time of
/// day). Formats are tried in a fixed order and the first success wins.
pub fn normalize_date(raw: &str, order: DateOrder) -> Option<NaiveDate> {
    let date_part = raw.split_whitespace().next()?;

    order
        .formats()
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(date_part, fmt).ok())
        .filter(|date| date.year() >= MIN_YEAR)
}

/// Canonical `yyyy-MM-dd` text, or `None` when unparseable.
pub fn normalize_date_str(raw: &str, order: DateOrder) -> Option<String> {
    normalize_date(raw, order).map(|d| d.format("%Y-%m-%d").to_string())
}

/// Month bucket used for month-over-month grouping, e.g. "2024-03".
pub fn year_month(date: NaiveDate) -> String {
    format!("{:04}-{:02}", date.year(), date.month())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    #[test]
    fn test_month_first_and_day_first_paths() {
        let us = normalize_date_str("03/15/2024", DateOrder::MonthFirst);
        assert_eq!(us.as_deref(), Some("2024-03-15"));
        let eu = normalize_date_str("15/03/2024", DateOrder::MonthFirst);
        assert_eq!(eu.as_deref(), Some("2024-03-15"));
    }

    #[test]
    fn test_ambiguous_defaults_to_month_first() {
        assert_eq!(normalize_date("03/04/2024", DateOrder::MonthFirst), ymd(2024, 3, 4));
        assert_eq!(normalize_date("03/04/2024", DateOrder::DayFirst), ymd(2024, 4, 3));
    }

    #[test]
    fn test_iso() {
        assert_eq!(normalize_date("2024-03-15", DateOrder::MonthFirst), ymd(2024, 3, 15));
    }

    #[test]
    fn test_single_digit_parts() {
        assert_eq!(normalize_date("3/5/2024", DateOrder::MonthFirst), ymd(2024, 3, 5));
        assert_eq!(normalize_date("25/3/2024", DateOrder::MonthFirst), ymd(2024, 3, 25));
    }

    #[test]
    fn test_time_component_dropped() {
        assert_eq!(
            normalize_date("03/15/2024 10:42:00 AM", DateOrder::MonthFirst),
            ymd(2024, 3, 15)
        );
        assert_eq!(normalize_date("  2024-03-15 23:59", DateOrder::MonthFirst), ymd(2024, 3, 15));
    }

    #[test]
    fn test_unparseable() {
        assert_eq!(normalize_date("", DateOrder::MonthFirst), None);
        assert_eq!(normalize_date("   ", DateOrder::MonthFirst), None);
        assert_eq!(normalize_date("next tuesday", DateOrder::MonthFirst), None);
        assert_eq!(normalize_date("31/31/2024", DateOrder::MonthFirst), None);
        assert_eq!(normalize_date("02/30/2024", DateOrder::DayFirst), None);
    }

    #[test]
    fn test_two_digit_year_rejected() {
        assert_eq!(normalize_date("03/04/24", DateOrder::MonthFirst), None);
    }

    #[test]
    fn test_year_month() {
        assert_eq!(year_month(NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()), "2024-03");
    }
}
