use std::path::PathBuf;

use till_core::models::{InventoryFilter, InventoryItem};

use super::{format_cents, open_hub, parse_amount_cents};
use crate::cli::StockCommands;
use crate::error::CliError;

pub fn run(command: StockCommands, data_dir: Option<PathBuf>) -> Result<(), CliError> {
    let hub = open_hub(data_dir)?;
    let repo = hub.repository::<InventoryItem>();

    match command {
        StockCommands::Add {
            name,
            category,
            qty,
            price,
            sku,
        } => {
            let mut item = InventoryItem::new(name, category, qty, parse_amount_cents(&price)?);
            if let Some(sku) = sku {
                item = item.with_sku(sku);
            }
            let created = repo.create(item)?;
            println!("Added stock row {}", created.id);
        }
        StockCommands::List { in_stock, json } => {
            let filter = InventoryFilter {
                in_stock_only: in_stock,
                ..InventoryFilter::default()
            };
            let items = repo.list_filtered(|i| filter.matches(i))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&items)?);
                return Ok(());
            }
            if items.is_empty() {
                println!("No inventory rows.");
                return Ok(());
            }
            for item in items {
                println!(
                    "{}  {:>5} x {:>8}  [{}] {}",
                    item.id,
                    item.quantity,
                    format_cents(item.unit_price_cents),
                    item.category,
                    item.name
                );
            }
        }
    }
    Ok(())
}
