//! Period selectors and simulation window resolution.

use std::fmt;
use std::str::FromStr;

use chrono::{FixedOffset, NaiveDate, NaiveTime, Offset, Utc};

use crate::domain::error::GridError;
use crate::domain::price_series::PriceSeries;

pub const SECONDS_PER_DAY: i64 = 24 * 3600;

/// Which slice of history a run simulates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Period {
    Last3Months,
    Last6Months,
    Last1Year,
    Last3Years,
    Last5Years,
    SinceEstablished,
    /// Relative lookback of a raw number of days.
    LookbackDays(i64),
    /// Whole history up to (excluding) an absolute cutoff; `timestamp` is
    /// midnight of `date` at the offset the selector was parsed with.
    Until { date: NaiveDate, timestamp: i64 },
}

impl Period {
    pub const STANDARD: [Period; 6] = [
        Period::Last3Months,
        Period::Last6Months,
        Period::Last1Year,
        Period::Last3Years,
        Period::Last5Years,
        Period::SinceEstablished,
    ];

    /// Seconds measured back from the latest timestamp, `None` for whole-history selectors.
    pub fn lookback_seconds(&self) -> Option<i64> {
        match self {
            Period::Last3Months => Some(90 * SECONDS_PER_DAY),
            Period::Last6Months => Some(180 * SECONDS_PER_DAY),
            Period::Last1Year => Some(365 * SECONDS_PER_DAY),
            Period::Last3Years => Some(3 * 365 * SECONDS_PER_DAY),
            Period::Last5Years => Some(5 * 365 * SECONDS_PER_DAY),
            Period::LookbackDays(days) => Some(days.saturating_mul(SECONDS_PER_DAY)),
            Period::SinceEstablished | Period::Until { .. } => None,
        }
    }

    /// Identifier written to reports and the result store.
    ///
    /// Standard selectors keep their numeric codes so stored rows stay
    /// comparable with existing data.
    pub fn code(&self) -> String {
        match self {
            Period::Last3Months => "0".into(),
            Period::Last6Months => "1".into(),
            Period::Last1Year => "2".into(),
            Period::Last3Years => "3".into(),
            Period::Last5Years => "4".into(),
            Period::SinceEstablished => "5".into(),
            Period::LookbackDays(days) => format!("{days}d"),
            Period::Until { date, .. } => format!("until:{}", date.format("%Y-%m-%d")),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Period::Last3Months => "last 3 months",
            Period::Last6Months => "last 6 months",
            Period::Last1Year => "last 1 year",
            Period::Last3Years => "last 3 years",
            Period::Last5Years => "last 5 years",
            Period::SinceEstablished => "since established",
            Period::LookbackDays(_) => "custom lookback",
            Period::Until { .. } => "until cutoff",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code())
    }
}

impl FromStr for Period {
    type Err = GridError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_period(s, Utc.fix())
    }
}

/// Parses a period token. `until:YYYY-MM-DD` is taken as midnight at `offset`.
pub fn parse_period(token: &str, offset: FixedOffset) -> Result<Period, GridError> {
    let token = token.trim();
    let invalid = |reason: String| GridError::invalid("universe", "periods", reason);

    let period = match token.to_lowercase().as_str() {
        "0" | "3m" => Period::Last3Months,
        "1" | "6m" => Period::Last6Months,
        "2" | "1y" => Period::Last1Year,
        "3" | "3y" => Period::Last3Years,
        "4" | "5y" => Period::Last5Years,
        "5" | "all" => Period::SinceEstablished,
        lower => {
            if let Some(date_str) = lower.strip_prefix("until:") {
                let date = NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d")
                    .map_err(|_| invalid(format!("invalid cutoff date in '{token}'")))?;
                let timestamp = date.and_time(NaiveTime::MIN).and_utc().timestamp()
                    - i64::from(offset.local_minus_utc());
                Period::Until { date, timestamp }
            } else if let Some(days) = lower.strip_suffix('d') {
                let days: i64 = days
                    .parse()
                    .map_err(|_| invalid(format!("invalid lookback '{token}'")))?;
                if days <= 0 {
                    return Err(invalid(format!("lookback must be positive in '{token}'")));
                }
                Period::LookbackDays(days)
            } else {
                return Err(invalid(format!("unknown period '{token}'")));
            }
        }
    };
    Ok(period)
}

/// Resolves `period` against `series` into `[start_index, end_index)`.
pub fn resolve_window(series: &PriceSeries, period: Period) -> Result<(usize, usize), GridError> {
    let empty = || GridError::EmptyWindow {
        period: period.code(),
    };
    let latest = series.last().ok_or_else(empty)?.timestamp;

    let (start, end) = match period {
        Period::SinceEstablished => (0, series.len()),
        Period::Until { timestamp, .. } => (0, series.lower_bound(timestamp)),
        relative => {
            let lookback = relative.lookback_seconds().unwrap_or(0);
            (series.lower_bound(latest.saturating_sub(lookback)), series.len())
        }
    };

    if start >= end {
        return Err(empty());
    }
    Ok((start, end))
}
