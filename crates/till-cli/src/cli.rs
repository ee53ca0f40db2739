use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "till")]
#[command(about = "Offline-first point-of-sale records from the command line")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory holding the local database and fallback file
    #[arg(long, global = true, value_name = "PATH")]
    pub data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage service bookings
    Booking {
        #[command(subcommand)]
        command: BookingCommands,
    },
    /// Manage cash-drawer ledger entries
    Ledger {
        #[command(subcommand)]
        command: LedgerCommands,
    },
    /// Manage inventory rows
    Stock {
        #[command(subcommand)]
        command: StockCommands,
    },
    /// Show pending (not-yet-synced) mutations and their last errors
    Pending {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Push pending mutations and pull recent remote changes
    Sync,
}

#[derive(Subcommand)]
pub enum BookingCommands {
    /// Create a new booking
    Add {
        /// Customer display name
        customer: String,
        /// Booked service name
        service: String,
        /// Price in currency units, e.g. 50.00
        #[arg(long)]
        amount: String,
        /// Scheduled time (Unix ms; defaults to now)
        #[arg(long)]
        at: Option<i64>,
        /// Free-form notes
        #[arg(long)]
        notes: Option<String>,
    },
    /// List bookings
    List {
        /// Filter by service name
        #[arg(long)]
        service: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a booking
    Rm {
        /// Booking ID
        id: String,
    },
}

#[derive(Subcommand)]
pub enum LedgerCommands {
    /// Record a cash-drawer movement
    Add {
        /// What the money moved for
        description: String,
        /// Reporting category
        #[arg(long)]
        category: String,
        /// Amount in currency units, e.g. 8.99
        #[arg(long)]
        amount: String,
        /// Movement kind
        #[arg(long, value_enum, default_value = "sale")]
        kind: LedgerKindArg,
    },
    /// List ledger entries
    List {
        /// Filter by category
        #[arg(long)]
        category: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum StockCommands {
    /// Add an inventory row
    Add {
        /// Product name
        name: String,
        /// Reporting category
        #[arg(long)]
        category: String,
        /// Units on hand
        #[arg(long, default_value = "0")]
        qty: i64,
        /// Unit price in currency units, e.g. 15.99
        #[arg(long)]
        price: String,
        /// Optional SKU code
        #[arg(long)]
        sku: Option<String>,
    },
    /// List inventory rows
    List {
        /// Only rows with stock on hand
        #[arg(long)]
        in_stock: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum LedgerKindArg {
    Sale,
    Expense,
    Adjustment,
}

impl From<LedgerKindArg> for till_core::models::LedgerKind {
    fn from(kind: LedgerKindArg) -> Self {
        match kind {
            LedgerKindArg::Sale => Self::Sale,
            LedgerKindArg::Expense => Self::Expense,
            LedgerKindArg::Adjustment => Self::Adjustment,
        }
    }
}
