use crate::{Digest, Error, FileEntry, Result, Snapshot, SnapshotID};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, ErrorCode, OptionalExtension, params};
use std::collections::{BTreeSet, HashSet};

/// Records snapshots and the path→blob mappings each one contains.
///
/// Referential integrity is checked here rather than left to the storage
/// engine: an entry can only be added under an existing snapshot and must
/// point to a stored blob.
pub struct SnapshotIndex<'c> {
    conn: &'c Connection,
}

impl<'c> SnapshotIndex<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Allocates the next snapshot id. Ids start at 1 and are never reused.
    pub fn create_snapshot(&self, timestamp: DateTime<Utc>) -> Result<SnapshotID> {
        self.conn.execute(
            "INSERT INTO snapshots (timestamp) VALUES (?1)",
            params![timestamp],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn add_file_entry(&self, snapshot_id: SnapshotID, path: &str, digest: &Digest) -> Result<()> {
        if !self.snapshot_exists(snapshot_id)? {
            return Err(Error::SnapshotNotFound { id: snapshot_id });
        }
        let blob_present = self
            .conn
            .query_row(
                "SELECT 1 FROM blobs WHERE digest = ?1",
                params![digest],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        if !blob_present {
            return Err(Error::MissingBlob {
                digest: *digest,
                path: path.to_string(),
            });
        }

        let inserted = self.conn.execute(
            "INSERT INTO files (snapshot_id, path, digest) VALUES (?1, ?2, ?3)",
            params![snapshot_id, path, digest],
        );
        match inserted {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                Err(Error::DuplicatePath {
                    snapshot_id,
                    path: path.to_string(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// All snapshots, ascending by id.
    pub fn list_snapshots(&self) -> Result<Vec<Snapshot>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, timestamp FROM snapshots ORDER BY id")?;
        let snapshots = stmt
            .query_map([], |row| Ok(Snapshot::new(row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(snapshots)
    }

    pub fn get_snapshot(&self, snapshot_id: SnapshotID) -> Result<Option<Snapshot>> {
        let snapshot = self
            .conn
            .query_row(
                "SELECT id, timestamp FROM snapshots WHERE id = ?1",
                params![snapshot_id],
                |row| Ok(Snapshot::new(row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        Ok(snapshot)
    }

    pub fn snapshot_exists(&self, snapshot_id: SnapshotID) -> Result<bool> {
        Ok(self.get_snapshot(snapshot_id)?.is_some())
    }

    /// Entries of one snapshot ordered by path; empty if the snapshot is unknown.
    pub fn entries_for(&self, snapshot_id: SnapshotID) -> Result<BTreeSet<FileEntry>> {
        let mut stmt = self
            .conn
            .prepare("SELECT path, digest FROM files WHERE snapshot_id = ?1")?;
        let entries = stmt
            .query_map(params![snapshot_id], |row| {
                Ok(FileEntry {
                    path: row.get(0)?,
                    digest: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<BTreeSet<_>>>()?;
        Ok(entries)
    }

    pub fn snapshot_ids_at_or_below(&self, threshold: SnapshotID) -> Result<Vec<SnapshotID>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM snapshots WHERE id <= ?1 ORDER BY id")?;
        let ids = stmt
            .query_map(params![threshold], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<SnapshotID>>>()?;
        Ok(ids)
    }

    /// Removes every snapshot with id ≤ `threshold` together with its file
    /// entries. Returns the removed ids in ascending order.
    pub fn delete_snapshots_at_or_below(&self, threshold: SnapshotID) -> Result<Vec<SnapshotID>> {
        let ids = self.snapshot_ids_at_or_below(threshold)?;
        if ids.is_empty() {
            return Ok(ids);
        }
        self.conn
            .execute("DELETE FROM files WHERE snapshot_id <= ?1", params![threshold])?;
        self.conn
            .execute("DELETE FROM snapshots WHERE id <= ?1", params![threshold])?;
        Ok(ids)
    }

    /// Digests referenced by any file entry of any remaining snapshot.
    pub fn all_referenced_digests(&self) -> Result<HashSet<Digest>> {
        let mut stmt = self.conn.prepare("SELECT DISTINCT digest FROM files")?;
        let digests = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<HashSet<Digest>>>()?;
        Ok(digests)
    }

    /// File entries whose blob is absent. Empty in a healthy store.
    pub fn dangling_entries(&self) -> Result<Vec<(SnapshotID, FileEntry)>> {
        let mut stmt = self.conn.prepare(
            "SELECT f.snapshot_id, f.path, f.digest
             FROM files f LEFT JOIN blobs b ON b.digest = f.digest
             WHERE b.digest IS NULL
             ORDER BY f.snapshot_id, f.path",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get(0)?,
                    FileEntry {
                        path: row.get(1)?,
                        digest: row.get(2)?,
                    },
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn file_count(&self, snapshot_id: SnapshotID) -> Result<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM files WHERE snapshot_id = ?1",
            params![snapshot_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}
