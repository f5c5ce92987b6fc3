use crate::blob::BlobStore;
use crate::index::SnapshotIndex;
use crate::{Repository, Result, SnapshotID};
use tracing::{debug, info};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneReport {
    /// Snapshot ids removed (or that would be removed), ascending.
    pub snapshots: Vec<SnapshotID>,
    pub blobs_removed: u64,
    pub bytes_reclaimed: u64,
    pub dry_run: bool,
}

impl PruneReport {
    pub fn is_noop(&self) -> bool {
        self.snapshots.is_empty()
    }
}

/// Deletes every snapshot with id ≤ `threshold` and reclaims the blobs no
/// surviving snapshot references.
///
/// Snapshot deletion and the blob sweep share one write transaction, so the
/// set of referenced digests is computed after the deletions and nothing can
/// add a reference in between. A threshold matching no snapshot is a no-op.
pub fn prune(repo: &mut Repository, threshold: SnapshotID) -> Result<PruneReport> {
    let tx = repo.transaction()?;
    let index = SnapshotIndex::new(&tx);
    let blobs = BlobStore::new(&tx);

    let removed = index.delete_snapshots_at_or_below(threshold)?;
    if removed.is_empty() {
        info!("No snapshots at or below {} to prune", threshold);
        return Ok(PruneReport::default());
    }
    debug!("Deleted snapshots {:?}", removed);

    let referenced = index.all_referenced_digests()?;
    let sweep = blobs.delete_unreferenced(&referenced)?;

    tx.commit()?;

    info!(
        "Pruned {} snapshots, removed {} blobs ({} bytes)",
        removed.len(),
        sweep.removed.len(),
        sweep.bytes_reclaimed
    );
    Ok(PruneReport {
        snapshots: removed,
        blobs_removed: sweep.removed.len() as u64,
        bytes_reclaimed: sweep.bytes_reclaimed,
        dry_run: false,
    })
}

/// Computes what [`prune`] would remove without writing anything.
pub fn plan_prune(repo: &mut Repository, threshold: SnapshotID) -> Result<PruneReport> {
    let tx = repo.transaction()?;
    let index = SnapshotIndex::new(&tx);
    let blobs = BlobStore::new(&tx);

    let snapshots = index.delete_snapshots_at_or_below(threshold)?;
    let doomed = if snapshots.is_empty() {
        Vec::new()
    } else {
        blobs.unreferenced(&index.all_referenced_digests()?)?
    };

    // Dropping the transaction rolls the deletions back.
    drop(tx);

    Ok(PruneReport {
        snapshots,
        blobs_removed: doomed.len() as u64,
        bytes_reclaimed: doomed.iter().map(|(_, size)| size).sum(),
        dry_run: true,
    })
}
