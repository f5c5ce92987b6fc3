use super::open_repository;
use crate::config::Settings;
use anyhow::Result;
use backuptool_core::SnapshotID;
use clap::Args;
use std::process::ExitCode;

#[derive(Args)]
pub struct FilesCommand {
    #[arg(long, help = "Snapshot number to list")]
    snapshot_number: SnapshotID,
}

impl FilesCommand {
    pub fn run(&self, settings: &Settings) -> Result<ExitCode> {
        let repo = open_repository(settings)?;
        let index = repo.index();

        if !index.snapshot_exists(self.snapshot_number)? {
            println!("Snapshot {} not found.", self.snapshot_number);
            return Ok(ExitCode::FAILURE);
        }

        let blobs = repo.blobs();
        println!("{:<10} {:>12}  PATH", "BLOB", "SIZE");
        for entry in index.entries_for(self.snapshot_number)? {
            let size = blobs
                .size_of(&entry.digest)?
                .map(|s| s.to_string())
                .unwrap_or_else(|| "missing".to_string());
            println!("{:<10} {:>12}  {}", entry.digest.short_string(), size, entry.path);
        }
        Ok(ExitCode::SUCCESS)
    }
}
