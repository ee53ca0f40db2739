use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use till_core::models::{Booking, InventoryItem, LedgerEntry, Order};
use till_core::sync::{
    BlockedReason, HttpRemoteAuthority, StaticConnectivity, StaticSession, SyncConfig, SyncEngine,
};
use till_core::Syncable;

use super::open_hub;
use crate::error::CliError;

pub async fn run(data_dir: Option<PathBuf>) -> Result<(), CliError> {
    let hub = open_hub(data_dir)?;

    let (Ok(url), Ok(key)) = (env::var("TILL_REMOTE_URL"), env::var("TILL_REMOTE_KEY")) else {
        return Err(CliError::SyncNotConfigured);
    };
    let token = env::var("TILL_ACCESS_TOKEN").unwrap_or_else(|_| key.clone());

    let remote =
        HttpRemoteAuthority::new(url, key).map_err(|e| CliError::Remote(e.to_string()))?;
    let engine = hub.sync_engine(
        Arc::new(remote),
        Arc::new(StaticConnectivity::new(true)),
        Arc::new(StaticSession::with_token(token)),
        SyncConfig::default(),
    );

    drain::<Booking>(&engine).await;
    drain::<LedgerEntry>(&engine).await;
    drain::<InventoryItem>(&engine).await;
    drain::<Order>(&engine).await;
    Ok(())
}

async fn drain<T: Syncable>(engine: &SyncEngine) {
    let result = engine.sync::<T>().await;
    match result.blocked_reason {
        Some(BlockedReason::AuthRequired) => {
            println!("{}: blocked (authentication required)", T::RECORD_TYPE);
        }
        None => {
            println!(
                "{}: {} pushed, {} failed",
                T::RECORD_TYPE,
                result.succeeded,
                result.failed
            );
        }
    }
}
