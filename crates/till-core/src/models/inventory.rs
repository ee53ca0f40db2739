//! Inventory stock row

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{
    cents_to_units, now_ms, require_positive_cents, require_text, row_cents, row_i64, row_id,
    row_opt_str, row_str, RecordId, Syncable, SOURCE_POS,
};
use crate::error::{Error, Result};

/// A stocked product line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: RecordId,
    pub name: String,
    /// Optional stock-keeping unit code
    pub sku: Option<String>,
    pub category: String,
    /// Units on hand; never negative
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub source: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub synced_at: Option<i64>,
}

impl InventoryItem {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        category: impl Into<String>,
        quantity: i64,
        unit_price_cents: i64,
    ) -> Self {
        let now = now_ms();
        Self {
            id: RecordId::new(),
            name: name.into(),
            sku: None,
            category: category.into(),
            quantity,
            unit_price_cents,
            source: SOURCE_POS.to_string(),
            created_at: now,
            updated_at: now,
            synced_at: None,
        }
    }

    #[must_use]
    pub fn with_sku(mut self, sku: impl Into<String>) -> Self {
        self.sku = Some(sku.into());
        self
    }
}

/// Partial update for an inventory row
#[derive(Debug, Clone, Default)]
pub struct InventoryPatch {
    pub name: Option<String>,
    pub sku: Option<String>,
    pub category: Option<String>,
    pub quantity: Option<i64>,
    pub unit_price_cents: Option<i64>,
}

/// Category/stock filter for inventory lists
#[derive(Debug, Clone, Default)]
pub struct InventoryFilter {
    pub category: Option<String>,
    /// Only rows with at least one unit on hand
    pub in_stock_only: bool,
}

impl InventoryFilter {
    #[must_use]
    pub fn matches(&self, item: &InventoryItem) -> bool {
        if let Some(category) = &self.category {
            if !item.category.eq_ignore_ascii_case(category) {
                return false;
            }
        }
        if self.in_stock_only && item.quantity <= 0 {
            return false;
        }
        true
    }
}

impl Syncable for InventoryItem {
    const RECORD_TYPE: &'static str = "inventory_items";

    type Patch = InventoryPatch;

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
        require_text(&self.name, "name")?;
        require_text(&self.category, "category")?;
        require_positive_cents(self.unit_price_cents, "unit_price_cents")?;
        if self.quantity < 0 {
            return Err(Error::Validation("quantity must not be negative".to_string()));
        }
        Ok(())
    }

    fn apply_patch(&mut self, patch: Self::Patch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(sku) = patch.sku {
            self.sku = Some(sku);
        }
        if let Some(category) = patch.category {
            self.category = category;
        }
        if let Some(quantity) = patch.quantity {
            self.quantity = quantity;
        }
        if let Some(unit_price_cents) = patch.unit_price_cents {
            self.unit_price_cents = unit_price_cents;
        }
    }

    fn to_remote_row(&self) -> serde_json::Value {
        json!({
            "id": self.id.as_str(),
            "name": self.name,
            "sku": self.sku,
            "category": self.category,
            "quantity": self.quantity,
            "unit_price_cents": self.unit_price_cents,
            "source": self.source,
            "created_at": self.created_at,
            "updated_at": self.updated_at,
        })
    }

    fn to_legacy_row(&self) -> serde_json::Value {
        json!({
            "id": self.id.as_str(),
            "item_name": self.name,
            "sku": self.sku,
            "category": self.category,
            "stock": self.quantity,
            "price": cents_to_units(self.unit_price_cents),
            "source": self.source,
            "created_at": self.created_at,
            "updated_at": self.updated_at,
        })
    }

    fn from_remote_row(row: &serde_json::Value) -> Result<Self> {
        Ok(Self {
            id: row_id(row)?,
            name: row_str(row, &["name", "item_name"])?,
            sku: row_opt_str(row, &["sku"]),
            category: row_str(row, &["category"])?,
            quantity: row_i64(row, &["quantity", "stock"])?,
            unit_price_cents: row_cents(row, "unit_price_cents", "price")?,
            source: row_opt_str(row, &["source"]).unwrap_or_else(|| SOURCE_POS.to_string()),
            created_at: row_i64(row, &["created_at"]).unwrap_or_else(|_| now_ms()),
            updated_at: row_i64(row, &["updated_at"]).unwrap_or_else(|_| now_ms()),
            synced_at: None,
        })
    }
}
