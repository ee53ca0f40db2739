//! Record models shared by every domain type

mod booking;
mod inventory;
mod ledger;
mod order;

pub use booking::{Booking, BookingFilter, BookingPatch};
pub use inventory::{InventoryFilter, InventoryItem, InventoryPatch};
pub use ledger::{LedgerEntry, LedgerFilter, LedgerKind, LedgerPatch};
pub use order::{Order, OrderLine, OrderPatch, PaymentMethod};

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// A unique identifier for a record, using UUID v7 (time-sortable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId(Uuid);

impl RecordId {
    /// Create a new unique record ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RecordId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Provenance of records entered at the point of sale
pub const SOURCE_POS: &str = "pos";
/// Provenance of records written by seed/import tooling
pub const SOURCE_SEED: &str = "seed";

/// A mutable business record that participates in offline-first sync.
///
/// Domain types differ only in field validation and in how they translate
/// to/from the Remote Authority's row shape; queue and store mechanics are
/// shared. The legacy row mapping exists because deployed remotes may still
/// carry an older column naming; push falls back to it when the canonical
/// shape is rejected, and `from_remote_row` tolerates both.
pub trait Syncable: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Durable table name for this record type (also the remote row set name)
    const RECORD_TYPE: &'static str;

    /// Partial update applied by [`crate::RecordRepository::update`]
    type Patch: Send + Sync;

    /// Stable client-generated identifier, assigned at creation
    fn id(&self) -> RecordId;

    /// Last local mutation timestamp (Unix ms)
    fn updated_at(&self) -> i64;

    /// Last confirmed sync against the Remote Authority, if any
    fn synced_at(&self) -> Option<i64>;

    /// Stamp (or clear) the confirmed-sync marker
    fn set_synced_at(&mut self, synced_at: Option<i64>);

    /// Re-stamp `updated_at` after a local mutation
    fn touch(&mut self, now: i64);

    /// Reject missing or semantically invalid fields
    fn validate(&self) -> Result<()>;

    /// Merge a patch onto this record (validation happens afterwards)
    fn apply_patch(&mut self, patch: Self::Patch);

    /// Canonical remote row shape
    fn to_remote_row(&self) -> serde_json::Value;

    /// Older remote row shape, used when the canonical push is rejected
    fn to_legacy_row(&self) -> serde_json::Value;

    /// Parse a remote row, tolerating canonical and legacy field names
    fn from_remote_row(row: &serde_json::Value) -> Result<Self>;
}

/// Current wall-clock time in Unix milliseconds
#[must_use]
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Reject blank or whitespace-only required text fields
pub(crate) fn require_text(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::Validation(format!("{field} must not be blank")));
    }
    Ok(())
}

/// Reject non-positive monetary amounts
pub(crate) fn require_positive_cents(value: i64, field: &str) -> Result<()> {
    if value <= 0 {
        return Err(Error::Validation(format!("{field} must be positive")));
    }
    Ok(())
}

/// First present string value among the given keys
pub(crate) fn row_str(row: &serde_json::Value, keys: &[&str]) -> Result<String> {
    row_opt_str(row, keys)
        .ok_or_else(|| Error::Validation(format!("remote row is missing {}", keys[0])))
}

pub(crate) fn row_opt_str(row: &serde_json::Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| row.get(*key).and_then(serde_json::Value::as_str))
        .map(str::to_string)
}

/// First present integer value among the given keys
pub(crate) fn row_i64(row: &serde_json::Value, keys: &[&str]) -> Result<i64> {
    keys.iter()
        .find_map(|key| row.get(*key).and_then(serde_json::Value::as_i64))
        .ok_or_else(|| Error::Validation(format!("remote row is missing {}", keys[0])))
}

/// Monetary amount in cents: canonical integer column, or a legacy
/// float column expressed in currency units.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn row_cents(
    row: &serde_json::Value,
    cents_key: &str,
    legacy_key: &str,
) -> Result<i64> {
    if let Some(cents) = row.get(cents_key).and_then(serde_json::Value::as_i64) {
        return Ok(cents);
    }
    if let Some(units) = row.get(legacy_key).and_then(serde_json::Value::as_f64) {
        return Ok((units * 100.0).round() as i64);
    }
    Err(Error::Validation(format!(
        "remote row is missing {cents_key}"
    )))
}

pub(crate) fn row_id(row: &serde_json::Value) -> Result<RecordId> {
    let raw = row_str(row, &["id"])?;
    raw.parse()
        .map_err(|_| Error::Validation(format!("remote row has invalid id: {raw}")))
}

/// Cents rendered as a legacy float amount in currency units
#[allow(clippy::cast_precision_loss)]
pub(crate) fn cents_to_units(cents: i64) -> f64 {
    cents as f64 / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_id_unique() {
        let id1 = RecordId::new();
        let id2 = RecordId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_record_id_parse() {
        let id = RecordId::new();
        let parsed: RecordId = id.as_str().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_record_id_time_sortable() {
        let earlier = RecordId::new();
        let later = RecordId::new();
        assert!(earlier <= later);
    }

    #[test]
    fn test_row_cents_canonical_and_legacy() {
        let canonical = serde_json::json!({ "amount_cents": 1250 });
        assert_eq!(row_cents(&canonical, "amount_cents", "amount").unwrap(), 1250);

        let legacy = serde_json::json!({ "amount": 12.5 });
        assert_eq!(row_cents(&legacy, "amount_cents", "amount").unwrap(), 1250);
    }

    #[test]
    fn test_row_str_alternatives() {
        let legacy = serde_json::json!({ "customer_name": "Ada" });
        let value = row_str(&legacy, &["customer", "customer_name"]).unwrap();
        assert_eq!(value, "Ada");
    }
}
