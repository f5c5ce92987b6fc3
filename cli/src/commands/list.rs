use super::open_repository;
use crate::config::Settings;
use anyhow::Result;
use clap::{Args, ValueEnum};
use std::process::ExitCode;

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum Format {
    #[default]
    Table,
    Json,
}

#[derive(Args)]
pub struct ListCommand {
    #[arg(long, value_enum, default_value_t = Format::Table, help = "Output format")]
    format: Format,
}

impl ListCommand {
    pub fn run(&self, settings: &Settings) -> Result<ExitCode> {
        let repo = open_repository(settings)?;
        let snapshots = repo.index().list_snapshots()?;

        match self.format {
            Format::Table => {
                if snapshots.is_empty() {
                    println!("No snapshots found.");
                    return Ok(ExitCode::SUCCESS);
                }
                println!("{:<9} TIMESTAMP", "SNAPSHOT");
                for snapshot in &snapshots {
                    println!("{:<9} {}", snapshot.id, snapshot.display_time());
                }
            }
            Format::Json => {
                println!("{}", serde_json::to_string_pretty(&snapshots)?);
            }
        }

        Ok(ExitCode::SUCCESS)
    }
}
