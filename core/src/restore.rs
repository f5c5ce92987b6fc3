use crate::{Error, FileEntry, FileFailure, Repository, Result, Snapshot, SnapshotID};
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

#[derive(Debug)]
pub struct RestoreReport {
    pub snapshot: Snapshot,
    pub output: PathBuf,
    pub restored: u64,
    pub bytes_written: u64,
    pub failures: Vec<FileFailure>,
}

impl RestoreReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Recreates the files of `snapshot_id` under `output`.
///
/// Fails with [`Error::SnapshotNotFound`] before touching the filesystem if
/// the snapshot does not exist. Per-file problems (a missing blob, a write
/// error) are collected in [`RestoreReport::failures`] and the remaining
/// files are still restored.
pub async fn restore(repo: &Repository, snapshot_id: SnapshotID, output: &Path) -> Result<RestoreReport> {
    restore_with_progress(repo, snapshot_id, output, |_| {}).await
}

pub async fn restore_with_progress<F>(
    repo: &Repository,
    snapshot_id: SnapshotID,
    output: &Path,
    mut on_file: F,
) -> Result<RestoreReport>
where
    F: FnMut(&str),
{
    let index = repo.index();
    let blobs = repo.blobs();

    let snapshot = index
        .get_snapshot(snapshot_id)?
        .ok_or(Error::SnapshotNotFound { id: snapshot_id })?;
    let entries = index.entries_for(snapshot_id)?;

    fs::create_dir_all(output).await?;
    info!(
        "Restoring snapshot {} ({} files) to {}",
        snapshot_id,
        entries.len(),
        output.display()
    );

    let mut report = RestoreReport {
        snapshot,
        output: output.to_path_buf(),
        restored: 0,
        bytes_written: 0,
        failures: Vec::new(),
    };

    for entry in &entries {
        let result = match blobs.get(&entry.digest)? {
            Some(content) => restore_file(output, entry, &content).await,
            None => Err(Error::MissingBlob {
                digest: entry.digest,
                path: entry.path.clone(),
            }),
        };

        match result {
            Ok(written) => {
                report.restored += 1;
                report.bytes_written += written;
                debug!("Restored {} ({} bytes)", entry.path, written);
                on_file(&entry.path);
            }
            Err(error) => {
                warn!("Failed to restore {}: {}", entry.path, error);
                report.failures.push(FileFailure {
                    path: PathBuf::from(&entry.path),
                    error,
                });
            }
        }
    }

    info!(
        "Snapshot {} restored: {} files, {} failed",
        snapshot_id,
        report.restored,
        report.failures.len()
    );
    Ok(report)
}

async fn restore_file(output: &Path, entry: &FileEntry, content: &[u8]) -> Result<u64> {
    let relative = safe_relative_path(&entry.path)?;
    reject_symlinks(output, relative, &entry.path).await?;

    let target = output.join(relative);
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::write(&target, content).await?;
    Ok(content.len() as u64)
}

/// Fails if any existing component of `relative` under `output`, the file
/// itself included, is a symlink. Writes would otherwise follow it.
async fn reject_symlinks(output: &Path, relative: &Path, entry_path: &str) -> Result<()> {
    let mut current = output.to_path_buf();
    for component in relative.components() {
        current.push(component);
        match fs::symlink_metadata(&current).await {
            Ok(metadata) if metadata.file_type().is_symlink() => {
                return Err(Error::InvalidPath {
                    path: entry_path.to_string(),
                });
            }
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

/// Accepts only plain relative paths so a restore never escapes `output`.
fn safe_relative_path(path: &str) -> Result<&Path> {
    let candidate = Path::new(path);
    let plain = !path.is_empty()
        && candidate
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
    if plain {
        Ok(candidate)
    } else {
        Err(Error::InvalidPath {
            path: path.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_safe_relative_path() {
        assert!(safe_relative_path("a/b/c.txt").is_ok());
        assert!(safe_relative_path("file").is_ok());
        assert!(safe_relative_path("").is_err());
        assert!(safe_relative_path("../escape").is_err());
        assert!(safe_relative_path("a/../../escape").is_err());
        assert!(safe_relative_path("/etc/passwd").is_err());
    }

    #[tokio::test]
    async fn test_unknown_snapshot_has_no_side_effects() {
        let repo = Repository::in_memory().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out");

        let err = restore(&repo, 3, &output).await.unwrap_err();
        assert!(matches!(err, Error::SnapshotNotFound { id: 3 }));
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn test_shared_blob_restores_to_independent_files() {
        let repo = Repository::in_memory().unwrap();
        let digest = repo.blobs().put(b"twin").unwrap().digest;
        let id = repo.index().create_snapshot(Utc::now()).unwrap();
        repo.index().add_file_entry(id, "one.txt", &digest).unwrap();
        repo.index().add_file_entry(id, "nested/two.txt", &digest).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let report = restore(&repo, id, dir.path()).await.unwrap();
        assert_eq!(report.restored, 2);
        assert_eq!(report.bytes_written, 8);

        std::fs::write(dir.path().join("one.txt"), b"changed").unwrap();
        assert_eq!(std::fs::read(dir.path().join("nested/two.txt")).unwrap(), b"twin");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlinked_directory_in_output_is_not_followed() {
        let repo = Repository::in_memory().unwrap();
        let digest = repo.blobs().put(b"payload").unwrap().digest;
        let id = repo.index().create_snapshot(Utc::now()).unwrap();
        repo.index().add_file_entry(id, "sub/f.txt", &digest).unwrap();
        repo.index().add_file_entry(id, "link.txt", &digest).unwrap();
        repo.index().add_file_entry(id, "plain.txt", &digest).unwrap();

        let out = tempfile::tempdir().unwrap();
        let elsewhere = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(elsewhere.path(), out.path().join("sub")).unwrap();
        let victim = elsewhere.path().join("victim.txt");
        std::fs::write(&victim, b"original").unwrap();
        std::os::unix::fs::symlink(&victim, out.path().join("link.txt")).unwrap();

        let report = restore(&repo, id, out.path()).await.unwrap();

        assert_eq!(report.restored, 1);
        assert_eq!(report.failures.len(), 2);
        assert!(
            report
                .failures
                .iter()
                .all(|f| matches!(f.error, Error::InvalidPath { .. }))
        );
        assert!(!elsewhere.path().join("f.txt").exists());
        assert_eq!(std::fs::read(&victim).unwrap(), b"original");
        assert_eq!(std::fs::read(out.path().join("plain.txt")).unwrap(), b"payload");
    }

    #[tokio::test]
    async fn test_unsafe_entry_is_reported_and_others_restored() {
        let repo = Repository::in_memory().unwrap();
        let digest = repo.blobs().put(b"data").unwrap().digest;
        let id = repo.index().create_snapshot(Utc::now()).unwrap();
        repo.index().add_file_entry(id, "../outside.txt", &digest).unwrap();
        repo.index().add_file_entry(id, "inside.txt", &digest).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out");
        let report = restore(&repo, id, &output).await.unwrap();

        assert_eq!(report.restored, 1);
        assert_eq!(report.failures.len(), 1);
        assert!(matches!(report.failures[0].error, Error::InvalidPath { .. }));
        assert!(output.join("inside.txt").exists());
        assert!(!dir.path().join("outside.txt").exists());
    }
}
