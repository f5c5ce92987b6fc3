use super::{format_size, open_repository, progress_bar};
use crate::config::Settings;
use anyhow::Result;
use backuptool_core::{Error, SnapshotID};
use clap::Args;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Args)]
pub struct RestoreCommand {
    #[arg(long, help = "Snapshot number to restore")]
    snapshot_number: SnapshotID,

    #[arg(long, help = "Directory to restore files into")]
    output_directory: PathBuf,
}

impl RestoreCommand {
    pub async fn run(&self, settings: &Settings) -> Result<ExitCode> {
        let repo = open_repository(settings)?;

        let total = repo.index().file_count(self.snapshot_number)?;
        let pb = progress_bar(settings, total);
        let result = backuptool_core::restore_with_progress(
            &repo,
            self.snapshot_number,
            &self.output_directory,
            |path| {
                pb.set_message(path.to_string());
                pb.inc(1);
            },
        )
        .await;
        pb.finish_and_clear();

        let report = match result {
            Ok(report) => report,
            Err(e @ Error::SnapshotNotFound { .. }) => {
                println!("{e}");
                return Ok(ExitCode::FAILURE);
            }
            Err(e) => return Err(e.into()),
        };

        for failure in &report.failures {
            println!("Error: {}", failure);
        }
        println!(
            "Snapshot {} restored to {}",
            report.snapshot.id,
            report.output.display()
        );
        println!(
            "Restored {} files ({})",
            report.restored,
            format_size(report.bytes_written)
        );

        if report.is_complete() {
            Ok(ExitCode::SUCCESS)
        } else {
            println!("Failed: {}", report.failures.len());
            Ok(ExitCode::FAILURE)
        }
    }
}
