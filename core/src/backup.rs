use crate::blob::BlobStore;
use crate::index::SnapshotIndex;
use crate::{Error, FileFailure, Repository, Result, Snapshot};
use chrono::Utc;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// What a snapshot run captured.
#[derive(Debug)]
pub struct SnapshotReport {
    pub snapshot: Snapshot,
    pub root: PathBuf,
    pub files: u64,
    pub new_blobs: u64,
    pub reused_blobs: u64,
    /// Bytes of content that were not already in the store.
    pub bytes_added: u64,
    pub bytes_scanned: u64,
    pub failures: Vec<FileFailure>,
}

impl SnapshotReport {
    fn new(snapshot: Snapshot, root: PathBuf) -> Self {
        Self {
            snapshot,
            root,
            files: 0,
            new_blobs: 0,
            reused_blobs: 0,
            bytes_added: 0,
            bytes_scanned: 0,
            failures: Vec::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Captures every regular file under `target` into a new snapshot.
pub async fn snapshot(repo: &mut Repository, target: &Path) -> Result<SnapshotReport> {
    snapshot_with_progress(repo, target, |_| {}).await
}

/// Like [`snapshot`], calling `on_file` with each relative path once it has
/// been stored.
///
/// The snapshot record, its file entries and any new blobs are written in one
/// transaction: readers see the whole snapshot or nothing. Files that cannot
/// be read are reported in [`SnapshotReport::failures`] and left out.
pub async fn snapshot_with_progress<F>(
    repo: &mut Repository,
    target: &Path,
    mut on_file: F,
) -> Result<SnapshotReport>
where
    F: FnMut(&str),
{
    let root = resolve_target(target).await?;
    info!("Taking snapshot of {}", root.display());

    let store_file = match repo.path() {
        Some(path) => fs::canonicalize(path).await.ok(),
        None => None,
    };

    let tx = repo.transaction()?;
    let index = SnapshotIndex::new(&tx);
    let blobs = BlobStore::new(&tx);

    let timestamp = Utc::now();
    let snapshot_id = index.create_snapshot(timestamp)?;
    let mut report = SnapshotReport::new(Snapshot::new(snapshot_id, timestamp), root.clone());

    for entry in WalkDir::new(&root).follow_links(false).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.clone());
                warn!("Skipping {}: {}", path.display(), e);
                report.failures.push(FileFailure {
                    path,
                    error: Error::Io(e.into()),
                });
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        if store_file.as_deref().is_some_and(|store| is_store_file(store, entry.path())) {
            debug!("Skipping store file {}", entry.path().display());
            continue;
        }

        let file_path = entry.path();
        let rel_path = match relative_path(&root, file_path) {
            Ok(rel_path) => rel_path,
            Err(error) => {
                warn!("Skipping {}: {}", file_path.display(), error);
                report.failures.push(FileFailure {
                    path: file_path.to_path_buf(),
                    error,
                });
                continue;
            }
        };

        let content = match fs::read(file_path).await {
            Ok(content) => content,
            Err(source) => {
                warn!("Error reading {}: {}", file_path.display(), source);
                report.failures.push(FileFailure {
                    path: file_path.to_path_buf(),
                    error: Error::FileRead {
                        path: file_path.to_path_buf(),
                        source,
                    },
                });
                continue;
            }
        };

        let stored = blobs.put(&content)?;
        match index.add_file_entry(snapshot_id, &rel_path, &stored.digest) {
            Ok(()) => {}
            Err(error @ Error::DuplicatePath { .. }) => {
                warn!("Skipping {}: {}", file_path.display(), error);
                report.failures.push(FileFailure {
                    path: file_path.to_path_buf(),
                    error,
                });
                continue;
            }
            Err(e) => return Err(e),
        }

        report.files += 1;
        report.bytes_scanned += content.len() as u64;
        if stored.inserted {
            report.new_blobs += 1;
            report.bytes_added += content.len() as u64;
        } else {
            report.reused_blobs += 1;
        }
        debug!("{} -> {}", rel_path, stored.digest.short_string());
        on_file(&rel_path);
    }

    tx.commit()?;

    info!(
        "Snapshot {} committed: {} files, {} new blobs, {} skipped",
        snapshot_id,
        report.files,
        report.new_blobs,
        report.failures.len()
    );
    Ok(report)
}

async fn resolve_target(target: &Path) -> Result<PathBuf> {
    let invalid = || Error::InvalidTarget {
        path: target.to_path_buf(),
    };
    let root = fs::canonicalize(target).await.map_err(|_| invalid())?;
    let metadata = fs::metadata(&root).await.map_err(|_| invalid())?;
    if !metadata.is_dir() {
        return Err(invalid());
    }
    Ok(root)
}

/// The database itself and its SQLite side files are never captured.
fn is_store_file(store: &Path, path: &Path) -> bool {
    if path == store {
        return true;
    }
    let (Some(store_name), Some(name)) = (store.file_name(), path.file_name()) else {
        return false;
    };
    if store.parent() != path.parent() {
        return false;
    }
    let (store_name, name) = (store_name.to_string_lossy(), name.to_string_lossy());
    ["-journal", "-wal", "-shm"]
        .iter()
        .any(|suffix| name == format!("{store_name}{suffix}"))
}

/// Path of `file` relative to `root`, with components joined by `/`.
fn relative_path(root: &Path, file: &Path) -> Result<String> {
    let invalid = || Error::InvalidPath {
        path: file.display().to_string(),
    };
    let rel = file.strip_prefix(root).map_err(|_| invalid())?;

    let mut parts = Vec::new();
    for component in rel.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str().ok_or_else(invalid)?),
            _ => return Err(invalid()),
        }
    }
    if parts.is_empty() {
        return Err(invalid());
    }
    Ok(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_path_uses_forward_slashes() {
        let root = Path::new("/data/src");
        let file = root.join("a").join("b").join("c.txt");
        assert_eq!(relative_path(root, &file).unwrap(), "a/b/c.txt");
        assert_eq!(relative_path(root, &root.join("top.txt")).unwrap(), "top.txt");
    }

    #[test]
    fn test_relative_path_outside_root_is_rejected() {
        let root = Path::new("/data/src");
        assert!(relative_path(root, Path::new("/elsewhere/file")).is_err());
        assert!(relative_path(root, root).is_err());
    }

    #[test]
    fn test_store_files_are_recognised() {
        let store = Path::new("/data/.backuptool.db");
        assert!(is_store_file(store, store));
        assert!(is_store_file(store, Path::new("/data/.backuptool.db-journal")));
        assert!(!is_store_file(store, Path::new("/data/sub/.backuptool.db")));
        assert!(!is_store_file(store, Path::new("/data/notes.txt")));
    }

    #[tokio::test]
    async fn test_store_inside_target_is_not_captured() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("data.txt"), b"payload").unwrap();
        let mut repo = Repository::open(dir.path().join(".backuptool.db")).unwrap();

        let report = snapshot(&mut repo, dir.path()).await.unwrap();
        let entries = repo.index().entries_for(report.snapshot.id).unwrap();
        let paths: Vec<_> = entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["data.txt"]);
    }

    #[tokio::test]
    async fn test_missing_target_is_invalid() {
        let mut repo = Repository::in_memory().unwrap();
        let dir = tempfile::tempdir().unwrap();

        let err = snapshot(&mut repo, &dir.path().join("absent")).await.unwrap_err();
        assert!(matches!(err, Error::InvalidTarget { .. }));

        let file = dir.path().join("file.txt");
        std::fs::write(&file, b"not a directory").unwrap();
        let err = snapshot(&mut repo, &file).await.unwrap_err();
        assert!(matches!(err, Error::InvalidTarget { .. }));

        assert!(repo.index().list_snapshots().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_counts_new_and_reused_blobs() {
        let mut repo = Repository::in_memory().unwrap();
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"same").unwrap();
        std::fs::write(dir.path().join("b.txt"), b"same").unwrap();
        std::fs::write(dir.path().join("c.txt"), b"different").unwrap();

        let mut seen = Vec::new();
        let report = snapshot_with_progress(&mut repo, dir.path(), |path| seen.push(path.to_string()))
            .await
            .unwrap();

        assert_eq!(report.snapshot.id, 1);
        assert_eq!(report.files, 3);
        assert_eq!(report.new_blobs, 2);
        assert_eq!(report.reused_blobs, 1);
        assert_eq!(report.bytes_added, 13);
        assert_eq!(report.bytes_scanned, 17);
        assert!(report.is_complete());
        assert_eq!(seen, vec!["a.txt", "b.txt", "c.txt"]);
    }

    #[tokio::test]
    async fn test_empty_directory_gives_empty_snapshot() {
        let mut repo = Repository::in_memory().unwrap();
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("empty")).unwrap();

        let report = snapshot(&mut repo, dir.path()).await.unwrap();
        assert_eq!(report.files, 0);
        assert!(repo.index().snapshot_exists(report.snapshot.id).unwrap());
        assert!(repo.index().entries_for(report.snapshot.id).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_file_is_skipped() {
        let mut repo = Repository::in_memory().unwrap();
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"first").unwrap();
        std::fs::write(dir.path().join("b.txt"), b"vanishes").unwrap();
        std::fs::write(dir.path().join("c.txt"), b"last").unwrap();

        // b.txt is already listed by the walk when a.txt is stored.
        let vanishing = dir.path().join("b.txt");
        let report = snapshot_with_progress(&mut repo, dir.path(), |path| {
            if path == "a.txt" {
                std::fs::remove_file(&vanishing).unwrap();
            }
        })
        .await
        .unwrap();

        assert_eq!(report.files, 2);
        assert_eq!(report.failures.len(), 1);
        assert!(matches!(report.failures[0].error, Error::FileRead { .. }));
        assert!(report.failures[0].path.ends_with("b.txt"));

        let entries = repo.index().entries_for(report.snapshot.id).unwrap();
        let paths: Vec<_> = entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["a.txt", "c.txt"]);
    }
}
