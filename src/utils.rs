use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use num_format::{Locale, ToFormattedString};

use crate::error::MetricsError;
use crate::types::DateWindow;

#[derive(Clone)]
pub struct NumberFormatOptions {
    pub use_comma: bool,
    pub use_human: bool,
    pub locale: String,
    pub decimal_places: usize,
}

/// Format a number for display. Accepts both u32 and u64.
pub fn format_number(n: impl Into<u64>, options: &NumberFormatOptions) -> String {
    let n: u64 = n.into();
    let locale = match options.locale.as_str() {
        "de" => Locale::de,
        "fr" => Locale::fr,
        "es" => Locale::es,
        "it" => Locale::it,
        "ja" => Locale::ja,
        "ko" => Locale::ko,
        "zh" => Locale::zh,
        _ => Locale::en,
    };

    if options.use_human {
        const UNITS: [(u64, &str); 4] = [
            (1_000_000_000_000, "t"),
            (1_000_000_000, "b"),
            (1_000_000, "m"),
            (1_000, "k"),
        ];
        for (scale, suffix) in UNITS {
            if n >= scale {
                return format!(
                    "{:.prec$}{suffix}",
                    n as f64 / scale as f64,
                    prec = options.decimal_places
                );
            }
        }
        n.to_string()
    } else if options.use_comma {
        n.to_formatted_string(&locale)
    } else {
        n.to_string()
    }
}

/// Parse a `YYYY-MM-DD` calendar date.
pub fn parse_date(value: &str) -> Result<NaiveDate, MetricsError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|e| MetricsError::InvalidDate(format!("{value:?}: {e}")))
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

fn end_of_day(date: NaiveDate) -> DateTime<Utc> {
    // 23:59:59 always exists in UTC.
    date.and_hms_opt(23, 59, 59)
        .map(|dt| dt.and_utc())
        .unwrap_or_else(|| start_of_day(date) + Duration::seconds(86_399))
}

/// Window from the start of `from` through 23:59:59 UTC on `to`.
pub fn parse_date_window(from: &str, to: &str) -> Result<DateWindow, MetricsError> {
    let from_date = parse_date(from)?;
    let to_date = parse_date(to)?;
    if from_date > to_date {
        return Err(MetricsError::InvalidDate(format!(
            "from ({from_date}) is after to ({to_date})"
        )));
    }
    Ok(DateWindow::new(start_of_day(from_date), end_of_day(to_date)))
}

/// From midnight `days` days before today through the end of today, so
/// `days + 1` calendar days in all.
pub fn trailing_window(days: u32, now: DateTime<Utc>) -> DateWindow {
    let today = now.date_naive();
    let first = today - Duration::days(i64::from(days));
    DateWindow::new(start_of_day(first), end_of_day(today))
}

#[cfg(test)]
mod tests;
