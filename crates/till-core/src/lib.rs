//! till-core - Core library for Till
//!
//! Offline-first persistence and synchronization engine for mutable
//! point-of-sale records: a durable local store with a transparent
//! key-value fallback, per-type pending-mutation queues, typed record
//! repositories, and a push-then-pull sync engine gated on connectivity
//! and an authenticated session.

pub mod error;
pub mod hub;
pub mod models;
pub mod notify;
pub mod queue;
pub mod repository;
pub mod store;
pub mod sync;

pub use error::{Error, Result};
pub use hub::Hub;
pub use models::{Booking, InventoryItem, LedgerEntry, Order, RecordId, Syncable};
pub use repository::RecordRepository;
