//! Completed sale (order) record

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{
    cents_to_units, now_ms, require_positive_cents, require_text, row_i64, row_id, row_opt_str,
    row_str, RecordId, Syncable, SOURCE_POS,
};
use crate::error::{Error, Result};

/// How a sale was paid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Cash,
    Card,
    Transfer,
}

impl PaymentMethod {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::Card => "card",
            Self::Transfer => "transfer",
        }
    }

    fn parse(raw: &str) -> Result<Self> {
        match raw {
            "cash" => Ok(Self::Cash),
            "card" => Ok(Self::Card),
            "transfer" => Ok(Self::Transfer),
            other => Err(Error::Validation(format!("unknown payment method: {other}"))),
        }
    }
}

/// One line of a completed sale
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub name: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
}

impl OrderLine {
    #[must_use]
    pub fn new(name: impl Into<String>, quantity: i64, unit_price_cents: i64) -> Self {
        Self {
            name: name.into(),
            quantity,
            unit_price_cents,
        }
    }

    #[must_use]
    pub const fn total_cents(&self) -> i64 {
        self.quantity * self.unit_price_cents
    }
}

/// A completed sale rung up at the counter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: RecordId,
    pub lines: Vec<OrderLine>,
    pub payment: PaymentMethod,
    /// When the sale completed (Unix ms)
    pub placed_at: i64,
    pub source: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub synced_at: Option<i64>,
}

impl Order {
    #[must_use]
    pub fn new(lines: Vec<OrderLine>, payment: PaymentMethod) -> Self {
        let now = now_ms();
        Self {
            id: RecordId::new(),
            lines,
            payment,
            placed_at: now,
            source: SOURCE_POS.to_string(),
            created_at: now,
            updated_at: now,
            synced_at: None,
        }
    }

    /// Sum of all line totals in cents
    #[must_use]
    pub fn total_cents(&self) -> i64 {
        self.lines.iter().map(OrderLine::total_cents).sum()
    }
}

/// Partial update for an order
#[derive(Debug, Clone, Default)]
pub struct OrderPatch {
    pub lines: Option<Vec<OrderLine>>,
    pub payment: Option<PaymentMethod>,
    pub placed_at: Option<i64>,
}

impl Syncable for Order {
    const RECORD_TYPE: &'static str = "orders";

    type Patch = OrderPatch;

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
        if self.lines.is_empty() {
            return Err(Error::Validation("order must have at least one line".to_string()));
        }
        for line in &self.lines {
            require_text(&line.name, "line name")?;
            require_positive_cents(line.unit_price_cents, "line unit_price_cents")?;
            if line.quantity <= 0 {
                return Err(Error::Validation("line quantity must be positive".to_string()));
            }
        }
        Ok(())
    }

    fn apply_patch(&mut self, patch: Self::Patch) {
        if let Some(lines) = patch.lines {
            self.lines = lines;
        }
        if let Some(payment) = patch.payment {
            self.payment = payment;
        }
        if let Some(placed_at) = patch.placed_at {
            self.placed_at = placed_at;
        }
    }

    fn to_remote_row(&self) -> serde_json::Value {
        json!({
            "id": self.id.as_str(),
            "lines": self.lines,
            "total_cents": self.total_cents(),
            "payment": self.payment.as_str(),
            "placed_at": self.placed_at,
            "source": self.source,
            "created_at": self.created_at,
            "updated_at": self.updated_at,
        })
    }

    fn to_legacy_row(&self) -> serde_json::Value {
        let items: Vec<serde_json::Value> = self
            .lines
            .iter()
            .map(|line| {
                json!({
                    "name": line.name,
                    "qty": line.quantity,
                    "price": cents_to_units(line.unit_price_cents),
                })
            })
            .collect();
        json!({
            "id": self.id.as_str(),
            "items": items,
            "total": cents_to_units(self.total_cents()),
            "payment_method": self.payment.as_str(),
            "sold_at": self.placed_at,
            "source": self.source,
            "created_at": self.created_at,
            "updated_at": self.updated_at,
        })
    }

    fn from_remote_row(row: &serde_json::Value) -> Result<Self> {
        let payment = row_str(row, &["payment", "payment_method"])?;
        let lines = parse_lines(row)?;
        Ok(Self {
            id: row_id(row)?,
            lines,
            payment: PaymentMethod::parse(&payment)?,
            placed_at: row_i64(row, &["placed_at", "sold_at"])?,
            source: row_opt_str(row, &["source"]).unwrap_or_else(|| SOURCE_POS.to_string()),
            created_at: row_i64(row, &["created_at"]).unwrap_or_else(|_| now_ms()),
            updated_at: row_i64(row, &["updated_at"]).unwrap_or_else(|_| now_ms()),
            synced_at: None,
        })
    }
}

/// Order lines from either the canonical `lines` array or the legacy
/// `items` array (`{name, qty, price}` with a float price).
#[allow(clippy::cast_possible_truncation)]
fn parse_lines(row: &serde_json::Value) -> Result<Vec<OrderLine>> {
    if let Some(lines) = row.get("lines") {
        return serde_json::from_value(lines.clone()).map_err(Into::into);
    }

    let items = row
        .get("items")
        .and_then(serde_json::Value::as_array)
        .ok_or_else(|| Error::Validation("remote row is missing lines".to_string()))?;

    items
        .iter()
        .map(|item| {
            let name = row_str(item, &["name"])?;
            let quantity = row_i64(item, &["qty", "quantity"])?;
            let price = item
                .get("price")
                .and_then(serde_json::Value::as_f64)
                .ok_or_else(|| Error::Validation("legacy item is missing price".to_string()))?;
            Ok(OrderLine::new(name, quantity, (price * 100.0).round() as i64))
        })
        .collect()
}
