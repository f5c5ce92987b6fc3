use super::{format_size, open_repository};
use crate::config::Settings;
use anyhow::Result;
use clap::Args;
use std::process::ExitCode;

#[derive(Args)]
pub struct StatsCommand {
    #[arg(long, help = "Print statistics as JSON")]
    json: bool,
}

impl StatsCommand {
    pub fn run(&self, settings: &Settings) -> Result<ExitCode> {
        let repo = open_repository(settings)?;
        let stats = repo.stats()?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&stats)?);
            return Ok(ExitCode::SUCCESS);
        }

        println!("Snapshots:     {}", stats.snapshots);
        println!("File entries:  {}", stats.file_entries);
        println!("Blobs:         {}", stats.blobs);
        println!("Stored size:   {}", format_size(stats.stored_bytes));
        println!("Logical size:  {}", format_size(stats.logical_bytes));
        println!("Dedup ratio:   {:.2}x", stats.dedup_ratio());
        Ok(ExitCode::SUCCESS)
    }
}
