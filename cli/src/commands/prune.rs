use super::{format_size, open_repository};
use crate::config::Settings;
use anyhow::Result;
use backuptool_core::SnapshotID;
use clap::Args;
use std::process::ExitCode;

#[derive(Args)]
pub struct PruneCommand {
    #[arg(long, help = "Prune all snapshots with id <= this number")]
    snapshot: SnapshotID,

    #[arg(long, help = "Show what would be removed without removing it")]
    dry_run: bool,
}

impl PruneCommand {
    pub fn run(&self, settings: &Settings) -> Result<ExitCode> {
        let mut repo = open_repository(settings)?;

        let report = if self.dry_run {
            backuptool_core::plan_prune(&mut repo, self.snapshot)?
        } else {
            backuptool_core::prune(&mut repo, self.snapshot)?
        };

        if report.is_noop() {
            println!("No snapshots to prune.");
            return Ok(ExitCode::SUCCESS);
        }

        let verb = if report.dry_run { "Would prune" } else { "Pruned" };
        println!("{} snapshots: {:?}", verb, report.snapshots);
        println!(
            "Blobs removed: {} ({})",
            report.blobs_removed,
            format_size(report.bytes_reclaimed)
        );
        Ok(ExitCode::SUCCESS)
    }
}
