use std::path::PathBuf;

use serde_json::json;
use till_core::models::{Booking, InventoryItem, LedgerEntry, Order};
use till_core::{Hub, Syncable};

use super::open_hub;
use crate::error::CliError;

pub fn run(as_json: bool, data_dir: Option<PathBuf>) -> Result<(), CliError> {
    let hub = open_hub(data_dir)?;

    let reports = vec![
        type_report::<Booking>(&hub)?,
        type_report::<LedgerEntry>(&hub)?,
        type_report::<InventoryItem>(&hub)?,
        type_report::<Order>(&hub)?,
    ];

    if as_json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
        return Ok(());
    }

    let mut total = 0;
    for report in &reports {
        let pending = report["pending"].as_u64().unwrap_or(0);
        total += pending;
        println!("{}: {} pending", report["record_type"].as_str().unwrap_or(""), pending);
        for failure in report["errors"].as_array().into_iter().flatten() {
            println!(
                "  {}  last error: {}",
                failure["id"].as_str().unwrap_or(""),
                failure["error"].as_str().unwrap_or("")
            );
        }
    }
    if total == 0 {
        println!("Everything is synced.");
    }
    Ok(())
}

fn type_report<T: Syncable>(hub: &Hub) -> Result<serde_json::Value, CliError> {
    let repo = hub.repository::<T>();
    let errors: Vec<serde_json::Value> = repo
        .pending_entries()?
        .into_iter()
        .filter_map(|entry| {
            entry
                .last_error
                .map(|error| json!({ "id": entry.id, "error": error }))
        })
        .collect();

    Ok(json!({
        "record_type": T::RECORD_TYPE,
        "pending": repo.pending_count()?,
        "errors": errors,
    }))
}
