//! `pass-deposit status`: resolve and record a deposit's remote status

use super::Runtime;
use crate::error::Result;
use crate::model::{Deposit, Repository};
use crate::service::refresh_deposit_status;
use pass_deposit_core_critical::{CriticalRepositoryInteraction, ResourceStore};
use std::sync::Arc;

/// Refresh the status of `deposit_id`
///
/// The packager defaults to the one registered under the name of the
/// deposit's repository. Returns the deposit as stored afterwards.
pub fn run(runtime: &Runtime, deposit_id: &str, packager: Option<&str>) -> Result<Deposit> {
    let deposit: Deposit = runtime.store.fetch(deposit_id)?;
    let packager = match packager {
        Some(name) => runtime.packager(name)?,
        None => {
            let repository: Repository = runtime.store.fetch(&deposit.repository)?;
            runtime.packager(&repository.name)?
        }
    };

    let critical = CriticalRepositoryInteraction::new(Arc::clone(&runtime.store));
    match refresh_deposit_status(&critical, &runtime.status, &packager, deposit_id)? {
        Some(updated) => Ok(updated),
        None => Ok(runtime.store.fetch(deposit_id)?),
    }
}

pub fn print(deposit: &Deposit) {
    println!(
        "Deposit {}: {}",
        deposit.id,
        deposit
            .deposit_status
            .map(|s| s.to_string())
            .unwrap_or_else(|| "pending".to_string())
    );
    if let Some(reference) = &deposit.deposit_status_ref {
        println!("  status reference: {}", reference);
    }
}
