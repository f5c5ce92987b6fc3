use crate::{Digest, Repository, Result, SnapshotID};
use std::fmt;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Problem {
    /// A file entry points to a blob that is not stored.
    MissingBlob {
        snapshot_id: SnapshotID,
        path: String,
        digest: Digest,
    },
    /// Stored content no longer hashes to its key.
    DigestMismatch { digest: Digest, actual: Digest },
    SizeMismatch { digest: Digest, recorded: u64, actual: u64 },
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Problem::MissingBlob {
                snapshot_id,
                path,
                digest,
            } => write!(f, "snapshot {snapshot_id}: {path} references missing blob {digest}"),
            Problem::DigestMismatch { digest, actual } => {
                write!(f, "blob {digest} content hashes to {actual}")
            }
            Problem::SizeMismatch {
                digest,
                recorded,
                actual,
            } => write!(f, "blob {digest} records {recorded} bytes but holds {actual}"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CheckReport {
    pub snapshots_checked: u64,
    pub blobs_checked: u64,
    pub problems: Vec<Problem>,
}

impl CheckReport {
    pub fn is_healthy(&self) -> bool {
        self.problems.is_empty()
    }
}

/// Verifies that every file entry resolves to a stored blob and that every
/// blob still matches its digest and recorded size. Read-only.
pub fn check(repo: &Repository) -> Result<CheckReport> {
    let index = repo.index();
    let blobs = repo.blobs();
    let mut report = CheckReport {
        snapshots_checked: index.list_snapshots()?.len() as u64,
        ..Default::default()
    };

    for (snapshot_id, entry) in index.dangling_entries()? {
        report.problems.push(Problem::MissingBlob {
            snapshot_id,
            path: entry.path,
            digest: entry.digest,
        });
    }

    for digest in blobs.digests()? {
        let (Some(content), Some(recorded)) = (blobs.get(&digest)?, blobs.size_of(&digest)?) else {
            continue;
        };
        report.blobs_checked += 1;

        let actual = Digest::from_data(&content);
        if actual != digest {
            report.problems.push(Problem::DigestMismatch { digest, actual });
        }
        if recorded != content.len() as u64 {
            report.problems.push(Problem::SizeMismatch {
                digest,
                recorded,
                actual: content.len() as u64,
            });
        }
    }

    for problem in &report.problems {
        warn!("{}", problem);
    }
    info!(
        "Checked {} snapshots and {} blobs: {} problems",
        report.snapshots_checked,
        report.blobs_checked,
        report.problems.len()
    );
    Ok(report)
}
