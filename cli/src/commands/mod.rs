pub mod check;
pub mod files;
pub mod list;
pub mod prune;
pub mod restore;
pub mod snapshot;
pub mod stats;

use crate::config::Settings;
use anyhow::{Context, Result};
use backuptool_core::Repository;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tracing::info;

pub fn open_repository(settings: &Settings) -> Result<Repository> {
    info!("Opening store at: {}", settings.db.display());
    Repository::open(&settings.db)
        .with_context(|| format!("Failed to open store {}", settings.db.display()))
}

pub fn spinner(settings: &Settings, message: &str) -> ProgressBar {
    if !settings.progress {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {pos} files {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

pub fn progress_bar(settings: &Settings, len: u64) -> ProgressBar {
    if !settings.progress {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(len);
    if let Ok(style) = ProgressStyle::default_bar().template("{bar:40.cyan/blue} {pos:>7}/{len:7} {msg}") {
        pb.set_style(style);
    }
    pb
}

pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.2} {}", size, UNITS[unit])
    }
}
