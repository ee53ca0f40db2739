//! Command handlers and shared helpers

pub mod booking;
pub mod ledger;
pub mod pending;
pub mod stock;
pub mod sync;

use std::env;
use std::fs;
use std::path::PathBuf;

use till_core::{Hub, RecordId};

use crate::error::CliError;

/// Resolve the data directory: flag, then env, then a local default
pub fn data_dir(flag: Option<PathBuf>) -> PathBuf {
    flag.or_else(|| env::var_os("TILL_DATA_DIR").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("till-data"))
}

/// Open the hub inside the data directory, creating it on first use
pub fn open_hub(flag: Option<PathBuf>) -> Result<Hub, CliError> {
    let dir = data_dir(flag);
    fs::create_dir_all(&dir)?;
    Ok(Hub::open(dir.join("till.db"), dir.join("till-fallback.json"))?)
}

pub fn parse_record_id(raw: &str) -> Result<RecordId, CliError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(CliError::EmptyRecordId);
    }
    trimmed
        .parse()
        .map_err(|_| CliError::InvalidRecordId(trimmed.to_string()))
}

/// Parse a currency-unit amount like "50" or "8.99" into cents
#[allow(clippy::cast_possible_truncation)]
pub fn parse_amount_cents(raw: &str) -> Result<i64, CliError> {
    let units: f64 = raw
        .trim()
        .parse()
        .map_err(|_| CliError::InvalidAmount(raw.to_string()))?;
    if !units.is_finite() {
        return Err(CliError::InvalidAmount(raw.to_string()));
    }
    Ok((units * 100.0).round() as i64)
}

/// Cents rendered as a currency-unit string
#[must_use]
pub fn format_cents(cents: i64) -> String {
    format!("{}.{:02}", cents / 100, (cents % 100).abs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_amount_cents() {
        assert_eq!(parse_amount_cents("50").unwrap(), 5000);
        assert_eq!(parse_amount_cents("8.99").unwrap(), 899);
        assert_eq!(parse_amount_cents(" 0.5 ").unwrap(), 50);
        assert!(parse_amount_cents("lots").is_err());
    }

    #[test]
    fn test_format_cents() {
        assert_eq!(format_cents(5000), "50.00");
        assert_eq!(format_cents(899), "8.99");
        assert_eq!(format_cents(5), "0.05");
    }

    #[test]
    fn test_parse_record_id_rejects_garbage() {
        assert!(matches!(parse_record_id("  "), Err(CliError::EmptyRecordId)));
        assert!(matches!(
            parse_record_id("not-a-uuid"),
            Err(CliError::InvalidRecordId(_))
        ));
    }
}
