use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_DB: &str = ".backuptool.db";

/// Optional settings read from `config.toml`.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub db: Option<PathBuf>,
    pub progress: Option<bool>,
}

impl FileConfig {
    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Loads `explicit` if given (it must exist), otherwise the per-user
    /// config file if there is one.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let (path, required) = match explicit {
            Some(path) => (path.to_path_buf(), true),
            None => match default_config_path() {
                Some(path) => (path, false),
                None => return Ok(Self::default()),
            },
        };

        if !required && !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Invalid config file {}", path.display()))
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "backuptool").map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Effective settings after merging flags, environment and config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub db: PathBuf,
    pub progress: bool,
}

impl Settings {
    /// `db_flag` already carries the environment fallback from clap.
    pub fn resolve(db_flag: Option<&Path>, quiet: bool, file: FileConfig) -> Self {
        let db = db_flag
            .map(Path::to_path_buf)
            .or(file.db)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB));
        let progress = !quiet && file.progress.unwrap_or(true);
        Self { db, progress }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::resolve(None, false, FileConfig::default());
        assert_eq!(settings.db, PathBuf::from(".backuptool.db"));
        assert!(settings.progress);
    }

    #[test]
    fn test_flag_beats_config_file() {
        let file = FileConfig::parse("db = \"/backups/from-file.db\"\nprogress = false\n").unwrap();
        let settings = Settings::resolve(Some(Path::new("flag.db")), false, file);
        assert_eq!(settings.db, PathBuf::from("flag.db"));
        assert!(!settings.progress);

        let file = FileConfig::parse("db = \"/backups/from-file.db\"").unwrap();
        let settings = Settings::resolve(None, false, file);
        assert_eq!(settings.db, PathBuf::from("/backups/from-file.db"));
    }

    #[test]
    fn test_quiet_disables_progress() {
        let settings = Settings::resolve(None, true, FileConfig::default());
        assert!(!settings.progress);
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        assert!(FileConfig::parse("database = \"x\"").is_err());
    }

    #[test]
    fn test_explicit_config_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        assert!(FileConfig::load(Some(&dir.path().join("missing.toml"))).is_err());

        let path = dir.path().join("config.toml");
        std::fs::write(&path, "progress = false").unwrap();
        let file = FileConfig::load(Some(&path)).unwrap();
        assert_eq!(file.progress, Some(false));
        assert!(file.db.is_none());
    }
}
