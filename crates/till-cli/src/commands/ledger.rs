use std::path::PathBuf;

use till_core::models::{LedgerEntry, LedgerFilter};

use super::{format_cents, open_hub, parse_amount_cents};
use crate::cli::LedgerCommands;
use crate::error::CliError;

pub fn run(command: LedgerCommands, data_dir: Option<PathBuf>) -> Result<(), CliError> {
    let hub = open_hub(data_dir)?;
    let repo = hub.repository::<LedgerEntry>();

    match command {
        LedgerCommands::Add {
            description,
            category,
            amount,
            kind,
        } => {
            let entry = LedgerEntry::new(
                description,
                category,
                parse_amount_cents(&amount)?,
                kind.into(),
            );
            let created = repo.create(entry)?;
            println!("Recorded {} {}", created.kind.as_str(), created.id);
        }
        LedgerCommands::List { category, json } => {
            let filter = LedgerFilter {
                category,
                ..LedgerFilter::default()
            };
            let entries = repo.list_filtered(|e| filter.matches(e))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
                return Ok(());
            }
            if entries.is_empty() {
                println!("No ledger entries.");
                return Ok(());
            }
            for entry in entries {
                println!(
                    "{}  {:>10}  {}  [{}] {}",
                    entry.id,
                    format_cents(entry.amount_cents),
                    entry.kind.as_str(),
                    entry.category,
                    entry.description
                );
            }
        }
    }
    Ok(())
}
