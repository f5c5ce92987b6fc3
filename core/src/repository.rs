use crate::blob::BlobStore;
use crate::index::SnapshotIndex;
use crate::{RepoStats, Result};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Handle to the persisted backup store.
///
/// A repository is a single SQLite database holding three tables:
///
/// ```text
/// snapshots(id, timestamp)             -- one row per snapshot, ids never reused
/// blobs(digest, content, size)         -- unique file contents
/// files(snapshot_id, path, digest)     -- path -> blob mappings per snapshot
/// ```
///
/// The handle is opened once per command and dropped when the command ends.
/// [`BlobStore`] and [`SnapshotIndex`] are borrowed views over it; mutations
/// that span several steps go through [`Repository::transaction`] so they
/// either commit as a whole or leave no trace.
///
/// # Examples
///
/// ```no_run
/// use backuptool_core::Repository;
///
/// # fn main() -> backuptool_core::Result<()> {
/// let repo = Repository::open(".backuptool.db")?;
/// for snapshot in repo.index().list_snapshots()? {
///     println!("{}", snapshot.summary());
/// }
/// # Ok(())
/// # }
/// ```
pub struct Repository {
    path: Option<PathBuf>,
    conn: Connection,
}

impl Repository {
    /// Opens the database at `path`, creating the file and schema if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        debug!("Opening store at {}", path.display());
        let conn = Connection::open(&path)?;
        Self::with_connection(Some(path), conn)
    }

    /// Opens a throwaway in-memory store.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(None, conn)
    }

    fn with_connection(path: Option<PathBuf>, conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", true)?;
        init_schema(&conn)?;
        Ok(Self { path, conn })
    }

    /// Location of the database file, `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn blobs(&self) -> BlobStore<'_> {
        BlobStore::new(&self.conn)
    }

    pub fn index(&self) -> SnapshotIndex<'_> {
        SnapshotIndex::new(&self.conn)
    }

    /// Starts a write transaction that holds the database write lock until it
    /// is committed or dropped. Dropping without commit rolls back.
    pub fn transaction(&mut self) -> Result<Transaction<'_>> {
        Ok(self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?)
    }

    pub fn stats(&self) -> Result<RepoStats> {
        let stats = self.conn.query_row(
            "SELECT
                (SELECT COUNT(*) FROM snapshots),
                (SELECT COUNT(*) FROM files),
                (SELECT COUNT(*) FROM blobs),
                (SELECT COALESCE(SUM(size), 0) FROM blobs),
                (SELECT COALESCE(SUM(b.size), 0) FROM files f JOIN blobs b ON b.digest = f.digest)",
            [],
            |row| {
                Ok(RepoStats {
                    snapshots: row.get::<_, i64>(0)? as u64,
                    file_entries: row.get::<_, i64>(1)? as u64,
                    blobs: row.get::<_, i64>(2)? as u64,
                    stored_bytes: row.get::<_, i64>(3)? as u64,
                    logical_bytes: row.get::<_, i64>(4)? as u64,
                })
            },
        )?;
        Ok(stats)
    }
}

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS snapshots (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS blobs (
            digest TEXT PRIMARY KEY,
            content BLOB NOT NULL,
            size INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS files (
            snapshot_id INTEGER NOT NULL,
            path TEXT NOT NULL,
            digest TEXT NOT NULL,
            PRIMARY KEY (snapshot_id, path),
            FOREIGN KEY (snapshot_id) REFERENCES snapshots(id),
            FOREIGN KEY (digest) REFERENCES blobs(digest)
        );

        CREATE INDEX IF NOT EXISTS idx_files_digest ON files(digest);",
    )?;
    Ok(())
}
