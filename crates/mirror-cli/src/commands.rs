//! Subcommands and their execution against a `MirrorApi`.

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use mirror_core::{MirrorApi, MirrorError, ScanOptions};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Discover model files and index new versions
    Scan {
        /// Ignore the last-scan watermark
        #[arg(long)]
        full: bool,
    },

    /// Report drift between index, manifests and disk
    Check {
        /// Only list versions that need repair
        #[arg(long)]
        drifted_only: bool,
    },

    /// Re-sync drifted index rows from their manifests
    Repair,

    /// Delete versions of a model (preview only unless --yes)
    Delete {
        model_id: i64,

        #[arg(required = true)]
        version_ids: Vec<i64>,

        /// Actually delete instead of printing what would be removed
        #[arg(short, long)]
        yes: bool,
    },

    /// Show index and watermark status
    Stats,
}

fn to_value<T: Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).context("Failed to serialize output")
}

/// Run one command and return its JSON output.
pub async fn run(api: &MirrorApi, command: Command) -> Result<Value> {
    match command {
        Command::Scan { full } => {
            let options = if full {
                ScanOptions::full()
            } else {
                ScanOptions::incremental()
            };
            to_value(&api.perform_incremental_scan(options).await)
        }

        Command::Check { drifted_only } => {
            let mut reports = api.perform_consistency_check().await?;
            if drifted_only {
                reports.retain(|r| r.needs_repair());
            }
            to_value(&reports)
        }

        Command::Repair => to_value(&api.repair_database_records().await?),

        Command::Delete {
            model_id,
            version_ids,
            yes,
        } => delete(api, model_id, &version_ids, yes).await,

        Command::Stats => to_value(&api.get_stats().await?),
    }
}

async fn delete(api: &MirrorApi, model_id: i64, version_ids: &[i64], yes: bool) -> Result<Value> {
    let confirmation = match version_ids {
        [] => bail!("No version ids given"),
        [version_id] => {
            api.create_deletion_confirmation_by_id(model_id, *version_id)
                .await?
        }
        many => {
            let ids: Vec<(i64, i64)> = many.iter().map(|v| (model_id, *v)).collect();
            api.create_batch_deletion_confirmation_by_ids(&ids).await?
        }
    };

    if !yes {
        // Tokens do not outlive the process.
        api.cancel_deletion(&confirmation.token);
        info!("Preview only, re-run with --yes to delete");
        return Ok(json!({
            "deleted": false,
            "items": to_value(&confirmation.items)?,
        }));
    }

    if confirmation.batch {
        match api.confirm_and_delete_batch(&confirmation.token).await {
            Ok(summary) => to_value(&summary),
            Err(MirrorError::BatchDelete {
                total,
                succeeded,
                failed,
                results,
                ..
            }) => {
                warn!("{} of {} deletions failed", failed, total);
                Ok(json!({
                    "total": total,
                    "succeeded": succeeded,
                    "failed": failed,
                    "results": to_value(&results)?,
                }))
            }
            Err(e) => Err(e.into()),
        }
    } else {
        to_value(&api.confirm_and_delete(&confirmation.token).await?)
    }
}
