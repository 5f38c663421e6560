use anyhow::Context;
use chrono::{Datelike, NaiveDate};

/// Parses a `YYYY-MM` report month into the first day of that month.
pub fn parse_report_month(s: &str) -> anyhow::Result<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(&format!("{s}-01"), "%Y-%m-%d")
        .with_context(|| format!("invalid report month {s:?} (expected YYYY-MM)"))
}

/// Whole calendar months from `from` to `to` (negative if `to` is earlier).
pub fn months_between(from: NaiveDate, to: NaiveDate) -> i32 {
    (to.year() - from.year()) * 12 + (to.month() as i32 - from.month() as i32)
}
