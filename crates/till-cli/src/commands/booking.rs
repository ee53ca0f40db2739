use std::path::PathBuf;

use till_core::models::{now_ms, Booking, BookingFilter};

use super::{format_cents, open_hub, parse_amount_cents, parse_record_id};
use crate::cli::BookingCommands;
use crate::error::CliError;

pub fn run(command: BookingCommands, data_dir: Option<PathBuf>) -> Result<(), CliError> {
    let hub = open_hub(data_dir)?;
    let repo = hub.repository::<Booking>();

    match command {
        BookingCommands::Add {
            customer,
            service,
            amount,
            at,
            notes,
        } => {
            let mut booking = Booking::new(
                customer,
                service,
                parse_amount_cents(&amount)?,
                at.unwrap_or_else(now_ms),
            );
            if let Some(notes) = notes {
                booking = booking.with_notes(notes);
            }
            let created = repo.create(booking)?;
            println!("Created booking {}", created.id);
        }
        BookingCommands::List { service, json } => {
            let filter = BookingFilter {
                service,
                ..BookingFilter::default()
            };
            let bookings = repo.list_filtered(|b| filter.matches(b))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&bookings)?);
                return Ok(());
            }
            if bookings.is_empty() {
                println!("No bookings.");
                return Ok(());
            }
            for booking in bookings {
                let synced = if booking.synced_at.is_some() { "" } else { " (pending)" };
                println!(
                    "{}  {}  {} - {}{}",
                    booking.id,
                    format_cents(booking.amount_cents),
                    booking.customer,
                    booking.service,
                    synced
                );
            }
        }
        BookingCommands::Rm { id } => {
            let id = parse_record_id(&id)?;
            repo.delete(id)?;
            println!("Deleted booking {id}");
        }
    }
    Ok(())
}
