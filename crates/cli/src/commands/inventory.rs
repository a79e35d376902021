// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `e2epool import-inventory` — upsert YAML inventory into the registry.

use ep_core::Settings;
use ep_store::load_inventory_file;

use crate::exit_error::ExitError;

pub async fn import(path: &str, dry_run: bool) -> Result<(), ExitError> {
    let inventory =
        load_inventory_file(path).map_err(|e| ExitError::operation(e.to_string()))?;

    if dry_run {
        println!("Would import {} runner(s):", inventory.len());
        let mut ids = inventory.runner_ids();
        ids.sort_unstable();
        for runner_id in ids {
            println!("  {runner_id}");
        }
        return Ok(());
    }

    let settings = Settings::from_env();
    let pool = ep_store::connect(&settings).map_err(|e| ExitError::operation(e.to_string()))?;
    ep_store::migrate(&pool)
        .await
        .map_err(|e| ExitError::operation(e.to_string()))?;

    let mut imported = 0usize;
    let mut ids = inventory.runner_ids();
    ids.sort_unstable();
    for runner_id in ids {
        let Some(config) = inventory.get_runner(runner_id) else {
            continue;
        };
        ep_store::runners::upsert(&pool, config)
            .await
            .map_err(|e| ExitError::operation(format!("runner '{runner_id}': {e}")))?;
        imported += 1;
    }

    println!("Imported {imported} runner(s)");
    Ok(())
}
