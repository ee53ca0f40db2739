//! Cash-drawer / expense ledger entry

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{
    cents_to_units, now_ms, require_positive_cents, require_text, row_cents, row_i64, row_id,
    row_opt_str, row_str, RecordId, Syncable, SOURCE_POS,
};
use crate::error::{Error, Result};

/// Direction/kind of a ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerKind {
    /// Money into the drawer
    Sale,
    /// Money out of the drawer
    Expense,
    /// Manual correction
    Adjustment,
}

impl LedgerKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sale => "sale",
            Self::Expense => "expense",
            Self::Adjustment => "adjustment",
        }
    }

    fn parse(raw: &str) -> Result<Self> {
        match raw {
            "sale" => Ok(Self::Sale),
            "expense" => Ok(Self::Expense),
            "adjustment" => Ok(Self::Adjustment),
            other => Err(Error::Validation(format!("unknown ledger kind: {other}"))),
        }
    }
}

/// One cash-drawer movement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: RecordId,
    /// What the money moved for
    pub description: String,
    /// Reporting category (e.g. "supplies", "services")
    pub category: String,
    /// Absolute amount in cents; direction comes from `kind`
    pub amount_cents: i64,
    pub kind: LedgerKind,
    /// When the movement happened (Unix ms)
    pub occurred_at: i64,
    pub source: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub synced_at: Option<i64>,
}

impl LedgerEntry {
    /// Create a new ledger entry dated now
    #[must_use]
    pub fn new(
        description: impl Into<String>,
        category: impl Into<String>,
        amount_cents: i64,
        kind: LedgerKind,
    ) -> Self {
        let now = now_ms();
        Self {
            id: RecordId::new(),
            description: description.into(),
            category: category.into(),
            amount_cents,
            kind,
            occurred_at: now,
            source: SOURCE_POS.to_string(),
            created_at: now,
            updated_at: now,
            synced_at: None,
        }
    }
}

/// Partial update for a ledger entry
#[derive(Debug, Clone, Default)]
pub struct LedgerPatch {
    pub description: Option<String>,
    pub category: Option<String>,
    pub amount_cents: Option<i64>,
    pub kind: Option<LedgerKind>,
    pub occurred_at: Option<i64>,
}

/// Range/category filter for ledger lists
#[derive(Debug, Clone, Default)]
pub struct LedgerFilter {
    pub from: Option<i64>,
    pub to: Option<i64>,
    pub category: Option<String>,
    pub kind: Option<LedgerKind>,
}

impl LedgerFilter {
    #[must_use]
    pub fn matches(&self, entry: &LedgerEntry) -> bool {
        if self.from.is_some_and(|from| entry.occurred_at < from) {
            return false;
        }
        if self.to.is_some_and(|to| entry.occurred_at > to) {
            return false;
        }
        if let Some(category) = &self.category {
            if !entry.category.eq_ignore_ascii_case(category) {
                return false;
            }
        }
        if self.kind.is_some_and(|kind| entry.kind != kind) {
            return false;
        }
        true
    }
}

impl Syncable for LedgerEntry {
    const RECORD_TYPE: &'static str = "ledger_entries";

    type Patch = LedgerPatch;

    fn id(&self) -> RecordId {
        self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn synced_at(&self) -> Option<i64> {
        self.synced_at
    }

    fn set_synced_at(&mut self, synced_at: Option<i64>) {
        self.synced_at = synced_at;
    }

    fn touch(&mut self, now: i64) {
        self.updated_at = now;
    }

    fn validate(&self) -> Result<()> {
        require_text(&self.description, "description")?;
        require_text(&self.category, "category")?;
        require_positive_cents(self.amount_cents, "amount_cents")?;
        Ok(())
    }

    fn apply_patch(&mut self, patch: Self::Patch) {
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(category) = patch.category {
            self.category = category;
        }
        if let Some(amount_cents) = patch.amount_cents {
            self.amount_cents = amount_cents;
        }
        if let Some(kind) = patch.kind {
            self.kind = kind;
        }
        if let Some(occurred_at) = patch.occurred_at {
            self.occurred_at = occurred_at;
        }
    }

    fn to_remote_row(&self) -> serde_json::Value {
        json!({
            "id": self.id.as_str(),
            "description": self.description,
            "category": self.category,
            "amount_cents": self.amount_cents,
            "kind": self.kind.as_str(),
            "occurred_at": self.occurred_at,
            "source": self.source,
            "created_at": self.created_at,
            "updated_at": self.updated_at,
        })
    }

    fn to_legacy_row(&self) -> serde_json::Value {
        json!({
            "id": self.id.as_str(),
            "label": self.description,
            "category": self.category,
            "amount": cents_to_units(self.amount_cents),
            "entry_type": self.kind.as_str(),
            "recorded_at": self.occurred_at,
            "source": self.source,
            "created_at": self.created_at,
            "updated_at": self.updated_at,
        })
    }

    fn from_remote_row(row: &serde_json::Value) -> Result<Self> {
        let kind = row_str(row, &["kind", "entry_type"])?;
        Ok(Self {
            id: row_id(row)?,
            description: row_str(row, &["description", "label"])?,
            category: row_str(row, &["category"])?,
            amount_cents: row_cents(row, "amount_cents", "amount")?,
            kind: LedgerKind::parse(&kind)?,
            occurred_at: row_i64(row, &["occurred_at", "recorded_at"])?,
            source: row_opt_str(row, &["source"]).unwrap_or_else(|| SOURCE_POS.to_string()),
            created_at: row_i64(row, &["created_at"]).unwrap_or_else(|_| now_ms()),
            updated_at: row_i64(row, &["updated_at"]).unwrap_or_else(|_| now_ms()),
            synced_at: None,
        })
    }
}
