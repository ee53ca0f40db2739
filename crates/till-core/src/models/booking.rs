//! Service booking record

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{
    cents_to_units, now_ms, require_positive_cents, require_text, row_cents, row_i64, row_id,
    row_opt_str, row_str, RecordId, Syncable, SOURCE_POS,
};
use crate::error::{Error, Result};

/// A service booking (appointment) taken at the counter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    /// Unique identifier
    pub id: RecordId,
    /// Customer display name
    pub customer: String,
    /// Booked service name
    pub service: String,
    /// Agreed price in cents
    pub amount_cents: i64,
    /// When the service is scheduled for (Unix ms)
    pub scheduled_at: i64,
    /// Free-form notes
    pub notes: Option<String>,
    /// Provenance ("pos", "seed", ...)
    pub source: String,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last local mutation timestamp (Unix ms)
    pub updated_at: i64,
    /// Last confirmed sync timestamp; `None` until the remote confirms
    pub synced_at: Option<i64>,
}

impl Booking {
    /// Create a new booking entered at the point of sale
    #[must_use]
    pub fn new(
        customer: impl Into<String>,
        service: impl Into<String>,
        amount_cents: i64,
        scheduled_at: i64,
    ) -> Self {
        let now = now_ms();
        Self {
            id: RecordId::new(),
            customer: customer.into(),
            service: service.into(),
            amount_cents,
            scheduled_at,
            notes: None,
            source: SOURCE_POS.to_string(),
            created_at: now,
            updated_at: now,
            synced_at: None,
        }
    }

    /// Attach notes to the booking
    #[must_use]
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// Partial update for a booking; `None` fields are left untouched
#[derive(Debug, Clone, Default)]
pub struct BookingPatch {
    pub customer: Option<String>,
    pub service: Option<String>,
    pub amount_cents: Option<i64>,
    pub scheduled_at: Option<i64>,
    pub notes: Option<String>,
}

/// Range/category filter for booking lists
#[derive(Debug, Clone, Default)]
pub struct BookingFilter {
    /// Earliest `scheduled_at` (inclusive, Unix ms)
    pub from: Option<i64>,
    /// Latest `scheduled_at` (inclusive, Unix ms)
    pub to: Option<i64>,
    /// Exact service name (case-insensitive)
    pub service: Option<String>,
}

impl BookingFilter {
    #[must_use]
    pub fn matches(&self, booking: &Booking) -> bool {
        if self.from.is_some_and(|from| booking.scheduled_at < from) {
            return false;
        }
        if self.to.is_some_and(|to| booking.scheduled_at > to) {
            return false;
        }
        if let Some(service) = &self.service {
            if !booking.service.eq_ignore_ascii_case(service) {
                return false;
            }
        }
        true
    }
}

impl Syncable for Booking {
    const RECORD_TYPE: &'static str = "bookings";

    type Patch = BookingPatch;

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
        require_text(&self.customer, "customer")?;
        require_text(&self.service, "service")?;
        require_positive_cents(self.amount_cents, "amount_cents")?;
        if self.scheduled_at <= 0 {
            return Err(Error::Validation(
                "scheduled_at must be a valid timestamp".to_string(),
            ));
        }
        Ok(())
    }

    fn apply_patch(&mut self, patch: Self::Patch) {
        if let Some(customer) = patch.customer {
            self.customer = customer;
        }
        if let Some(service) = patch.service {
            self.service = service;
        }
        if let Some(amount_cents) = patch.amount_cents {
            self.amount_cents = amount_cents;
        }
        if let Some(scheduled_at) = patch.scheduled_at {
            self.scheduled_at = scheduled_at;
        }
        if let Some(notes) = patch.notes {
            self.notes = Some(notes);
        }
    }

    fn to_remote_row(&self) -> serde_json::Value {
        json!({
            "id": self.id.as_str(),
            "customer": self.customer,
            "service": self.service,
            "amount_cents": self.amount_cents,
            "scheduled_at": self.scheduled_at,
            "notes": self.notes,
            "source": self.source,
            "created_at": self.created_at,
            "updated_at": self.updated_at,
        })
    }

    fn to_legacy_row(&self) -> serde_json::Value {
        json!({
            "id": self.id.as_str(),
            "customer_name": self.customer,
            "service_name": self.service,
            "amount": cents_to_units(self.amount_cents),
            "booked_for": self.scheduled_at,
            "note": self.notes,
            "source": self.source,
            "created_at": self.created_at,
            "updated_at": self.updated_at,
        })
    }

    fn from_remote_row(row: &serde_json::Value) -> Result<Self> {
        Ok(Self {
            id: row_id(row)?,
            customer: row_str(row, &["customer", "customer_name"])?,
            service: row_str(row, &["service", "service_name"])?,
            amount_cents: row_cents(row, "amount_cents", "amount")?,
            scheduled_at: row_i64(row, &["scheduled_at", "booked_for"])?,
            notes: row_opt_str(row, &["notes", "note"]),
            source: row_opt_str(row, &["source"]).unwrap_or_else(|| SOURCE_POS.to_string()),
            created_at: row_i64(row, &["created_at"]).unwrap_or_else(|_| now_ms()),
            updated_at: row_i64(row, &["updated_at"]).unwrap_or_else(|_| now_ms()),
            synced_at: None,
        })
    }
}
