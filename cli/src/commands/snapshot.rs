use super::{format_size, open_repository, spinner};
use crate::config::Settings;
use anyhow::Result;
use clap::Args;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;

#[derive(Args)]
pub struct SnapshotCommand {
    #[arg(long, help = "Directory to snapshot")]
    target_directory: PathBuf,
}

impl SnapshotCommand {
    pub async fn run(&self, settings: &Settings) -> Result<ExitCode> {
        let mut repo = open_repository(settings)?;

        info!("Starting snapshot of {}", self.target_directory.display());
        let pb = spinner(settings, "Scanning files...");
        let report = backuptool_core::snapshot_with_progress(&mut repo, &self.target_directory, |path| {
            pb.inc(1);
            pb.set_message(path.to_string());
        })
        .await;
        pb.finish_and_clear();
        let report = report?;

        println!("{}", report.snapshot.summary());
        println!(
            "Files: {} ({} new blobs, {} reused, {} added)",
            report.files,
            report.new_blobs,
            report.reused_blobs,
            format_size(report.bytes_added)
        );

        if report.is_complete() {
            return Ok(ExitCode::SUCCESS);
        }
        for failure in &report.failures {
            println!("Skipped {}", failure);
        }
        println!("{} files could not be captured", report.failures.len());
        Ok(ExitCode::FAILURE)
    }
}
