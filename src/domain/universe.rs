//! Fund universe: which codes are backtested over which periods.
//!
//! Codes come from `[universe] fund_codes` and, optionally, a listing file
//! named by `[universe] codes_file` with one `code, name` pair per line.

use crate::domain::error::GridError;
use crate::domain::period::{Period, parse_period};
use crate::ports::config_port::ConfigPort;
use chrono::FixedOffset;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq)]
pub struct Universe {
    pub codes: Vec<String>,
    pub periods: Vec<Period>,
}

impl Universe {
    pub fn count(&self) -> usize {
        self.codes.len()
    }

    /// Number of fund x period runs.
    pub fn run_count(&self) -> usize {
        self.codes.len() * self.periods.len()
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in code list")]
    EmptyToken,

    #[error("duplicate code: {0}")]
    DuplicateCode(String),

    #[error("no fund codes configured")]
    Empty,
}

/// Validates a code list. Codes are kept verbatim; fund codes are numeric
/// and leading zeros are significant.
pub fn parse_codes<S: AsRef<str>>(tokens: &[S]) -> Result<Vec<String>, UniverseError> {
    let mut codes = Vec::with_capacity(tokens.len());
    let mut seen = HashSet::new();

    for token in tokens {
        let code = token.as_ref().trim();
        if code.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        if !seen.insert(code.to_string()) {
            return Err(UniverseError::DuplicateCode(code.to_string()));
        }
        codes.push(code.to_string());
    }

    if codes.is_empty() {
        return Err(UniverseError::Empty);
    }
    Ok(codes)
}

/// Extracts codes from a `code, name` listing. Blank lines and `#` comments
/// are ignored.
pub fn parse_codes_listing(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split(',').next())
        .map(|code| code.trim().to_string())
        .filter(|code| !code.is_empty())
        .collect()
}

pub fn load_codes_file(path: &Path) -> Result<Vec<String>, GridError> {
    let content = fs::read_to_string(path).map_err(|e| {
        GridError::invalid(
            "universe",
            "codes_file",
            format!("cannot read {}: {}", path.display(), e),
        )
    })?;
    Ok(parse_codes_listing(&content))
}

/// Parses period tokens. A missing key selects every standard period.
pub fn parse_periods<S: AsRef<str>>(
    tokens: Option<&[S]>,
    offset: FixedOffset,
) -> Result<Vec<Period>, GridError> {
    let Some(tokens) = tokens else {
        return Ok(Period::STANDARD.to_vec());
    };
    if tokens.is_empty() {
        return Err(GridError::invalid("universe", "periods", "no periods listed"));
    }

    let mut periods = Vec::with_capacity(tokens.len());
    for token in tokens {
        let period = parse_period(token.as_ref(), offset)?;
        if !periods.contains(&period) {
            periods.push(period);
        }
    }
    Ok(periods)
}

fn period_tokens(config: &dyn ConfigPort) -> Option<Vec<String>> {
    // `period` is the key used by the flat config layout.
    config
        .get_list("universe", "periods")
        .or_else(|| config.get_list("universe", "period"))
}

/// Reads codes and periods from config.
pub fn load_universe(config: &dyn ConfigPort, offset: FixedOffset) -> Result<Universe, GridError> {
    let mut tokens = config.get_list("universe", "fund_codes").unwrap_or_default();
    if let Some(file) = config.get_string("universe", "codes_file") {
        tokens.extend(load_codes_file(Path::new(&file))?);
    }

    let codes = parse_codes(&tokens)
        .map_err(|e| GridError::invalid("universe", "fund_codes", e.to_string()))?;
    let periods = parse_periods(period_tokens(config).as_deref(), offset)?;

    Ok(Universe { codes, periods })
}
