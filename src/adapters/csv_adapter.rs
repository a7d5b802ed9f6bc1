//! CSV price series adapter.
//!
//! Files are named `<code>.csv` with a `date,net_value` header. Dates are
//! calendar days at a fixed UTC offset; the timestamp of a row is midnight
//! of that day at the offset.

use crate::domain::error::GridError;
use crate::domain::price_series::{PricePoint, PriceSeries};
use crate::ports::price_source_port::PriceSourcePort;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime};
use std::fs;
use std::path::{Path, PathBuf};

pub struct CsvAdapter {
    base_path: PathBuf,
    offset: FixedOffset,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf, offset: FixedOffset) -> Self {
        Self { base_path, offset }
    }

    pub fn csv_path(&self, code: &str) -> PathBuf {
        csv_path(&self.base_path, code)
    }
}

fn csv_path(dir: &Path, code: &str) -> PathBuf {
    dir.join(format!("{}.csv", code))
}

fn date_to_timestamp(date: NaiveDate, offset: FixedOffset) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp() - i64::from(offset.local_minus_utc())
}

/// Formats a timestamp as a calendar date at `offset`.
pub fn format_date(timestamp: i64, offset: FixedOffset) -> String {
    match DateTime::from_timestamp(timestamp, 0) {
        Some(dt) => dt.with_timezone(&offset).format("%Y-%m-%d").to_string(),
        None => timestamp.to_string(),
    }
}

/// Writes `series` as `<dir>/<code>.csv`, creating `dir` if needed.
pub fn write_series(
    dir: &Path,
    code: &str,
    series: &PriceSeries,
    offset: FixedOffset,
) -> Result<PathBuf, GridError> {
    fs::create_dir_all(dir)?;
    let path = csv_path(dir, code);
    let mut writer = csv::Writer::from_path(&path).map_err(|e| GridError::Report {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    let csv_err = |e: csv::Error| GridError::Report {
        path: path.display().to_string(),
        reason: e.to_string(),
    };
    writer.write_record(["date", "net_value"]).map_err(csv_err)?;
    for point in series.points() {
        writer
            .write_record([format_date(point.timestamp, offset), point.price.to_string()])
            .map_err(csv_err)?;
    }
    writer.flush()?;
    Ok(path)
}

impl PriceSourcePort for CsvAdapter {
    fn fetch_series(&self, code: &str) -> Result<PriceSeries, GridError> {
        let path = self.csv_path(code);
        let content = fs::read_to_string(&path).map_err(|e| GridError::SourceUnavailable {
            code: code.to_string(),
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let malformed = |reason: String| GridError::MalformedSource {
            code: code.to_string(),
            reason,
        };

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut points = Vec::new();

        for result in rdr.records() {
            let record = result.map_err(|e| malformed(format!("CSV parse error: {}", e)))?;

            let date_str = record
                .get(0)
                .ok_or_else(|| malformed("missing date column".into()))?;
            let date = NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d")
                .map_err(|e| malformed(format!("invalid date '{}': {}", date_str, e)))?;

            let price: f64 = record
                .get(1)
                .ok_or_else(|| malformed("missing net_value column".into()))?
                .trim()
                .parse()
                .map_err(|e| malformed(format!("invalid net_value on {}: {}", date_str, e)))?;

            points.push(PricePoint::new(date_to_timestamp(date, self.offset), price));
        }

        if points.is_empty() {
            return Err(GridError::SourceUnavailable {
                code: code.to_string(),
                reason: format!("{} has no rows", path.display()),
            });
        }

        PriceSeries::from_points(code, points)
    }
}
