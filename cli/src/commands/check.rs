use super::open_repository;
use crate::config::Settings;
use anyhow::Result;
use clap::Args;
use std::process::ExitCode;

#[derive(Args)]
pub struct CheckCommand {}

impl CheckCommand {
    pub fn run(&self, settings: &Settings) -> Result<ExitCode> {
        let repo = open_repository(settings)?;
        let report = backuptool_core::check(&repo)?;

        println!(
            "Checked {} snapshots and {} blobs",
            report.snapshots_checked, report.blobs_checked
        );
        if report.is_healthy() {
            println!("No problems found.");
            return Ok(ExitCode::SUCCESS);
        }

        for problem in &report.problems {
            println!("Problem: {}", problem);
        }
        println!("{} problems found.", report.problems.len());
        Ok(ExitCode::FAILURE)
    }
}
