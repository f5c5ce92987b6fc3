use crate::{Digest, Result};
use bytes::Bytes;
use rusqlite::{Connection, OptionalExtension, params};
use std::collections::HashSet;
use tracing::debug;

/// Outcome of storing one payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PutOutcome {
    pub digest: Digest,
    /// `false` when identical content was already present.
    pub inserted: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepOutcome {
    pub removed: Vec<Digest>,
    pub bytes_reclaimed: u64,
}

/// Content-addressed storage of unique byte payloads.
///
/// Every payload is keyed by its [`Digest`]; storing the same bytes twice
/// keeps a single copy.
pub struct BlobStore<'c> {
    conn: &'c Connection,
}

impl<'c> BlobStore<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    pub fn put(&self, data: &[u8]) -> Result<PutOutcome> {
        let digest = Digest::from_data(data);
        let changed = self.conn.execute(
            "INSERT OR IGNORE INTO blobs (digest, content, size) VALUES (?1, ?2, ?3)",
            params![digest, data, data.len() as i64],
        )?;
        if changed > 0 {
            debug!("Stored blob {} ({} bytes)", digest.short_string(), data.len());
        }
        Ok(PutOutcome {
            digest,
            inserted: changed > 0,
        })
    }

    /// Returns the stored bytes, or `None` when no blob has this digest.
    pub fn get(&self, digest: &Digest) -> Result<Option<Bytes>> {
        let content = self
            .conn
            .query_row(
                "SELECT content FROM blobs WHERE digest = ?1",
                params![digest],
                |row| row.get::<_, Vec<u8>>(0),
            )
            .optional()?;
        Ok(content.map(Bytes::from))
    }

    pub fn contains(&self, digest: &Digest) -> Result<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM blobs WHERE digest = ?1",
                params![digest],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn size_of(&self, digest: &Digest) -> Result<Option<u64>> {
        let size = self
            .conn
            .query_row(
                "SELECT size FROM blobs WHERE digest = ?1",
                params![digest],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        Ok(size.map(|s| s as u64))
    }

    pub fn count(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM blobs", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    pub fn digests(&self) -> Result<Vec<Digest>> {
        let mut stmt = self.conn.prepare("SELECT digest FROM blobs ORDER BY digest")?;
        let digests = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<Digest>>>()?;
        Ok(digests)
    }

    /// Blobs that a sweep with `referenced` would remove, with their sizes.
    pub fn unreferenced(&self, referenced: &HashSet<Digest>) -> Result<Vec<(Digest, u64)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT digest, size FROM blobs ORDER BY digest")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, Digest>(0)?, row.get::<_, i64>(1)? as u64)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows
            .into_iter()
            .filter(|(digest, _)| !referenced.contains(digest))
            .collect())
    }

    /// Removes every blob whose digest is not in `referenced`.
    ///
    /// A blob that some file entry still points to is never removed, even if
    /// the caller left it out of `referenced`.
    pub fn delete_unreferenced(&self, referenced: &HashSet<Digest>) -> Result<SweepOutcome> {
        let mut stmt = self.conn.prepare(
            "DELETE FROM blobs
             WHERE digest = ?1
               AND NOT EXISTS (SELECT 1 FROM files WHERE files.digest = ?1)",
        )?;

        let mut outcome = SweepOutcome::default();
        for (digest, size) in self.unreferenced(referenced)? {
            if stmt.execute(params![digest])? > 0 {
                debug!("Removed blob {}", digest.short_string());
                outcome.removed.push(digest);
                outcome.bytes_reclaimed += size;
            }
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Repository;
    use chrono::Utc;

    #[test]
    fn test_put_is_idempotent() {
        let repo = Repository::in_memory().unwrap();
        let blobs = repo.blobs();

        let first = blobs.put(b"Hello World").unwrap();
        let second = blobs.put(b"Hello World").unwrap();

        assert!(first.inserted);
        assert!(!second.inserted);
        assert_eq!(first.digest, second.digest);
        assert_eq!(blobs.count().unwrap(), 1);
        assert_eq!(blobs.size_of(&first.digest).unwrap(), Some(11));
    }

    #[test]
    fn test_get_returns_exact_bytes() {
        let repo = Repository::in_memory().unwrap();
        let blobs = repo.blobs();

        let data: Vec<u8> = (0..=255).collect();
        let digest = blobs.put(&data).unwrap().digest;
        assert_eq!(blobs.get(&digest).unwrap().unwrap().as_ref(), data.as_slice());

        let empty = blobs.put(b"").unwrap().digest;
        assert_eq!(blobs.get(&empty).unwrap().unwrap().len(), 0);

        let absent = Digest::from_data(b"never stored");
        assert!(blobs.get(&absent).unwrap().is_none());
        assert!(!blobs.contains(&absent).unwrap());
    }

    #[test]
    fn test_delete_unreferenced_keeps_listed_blobs() {
        let repo = Repository::in_memory().unwrap();
        let blobs = repo.blobs();

        let keep = blobs.put(b"keep").unwrap().digest;
        let stale = blobs.put(b"drop!").unwrap().digest;

        let referenced = HashSet::from([keep]);
        let outcome = blobs.delete_unreferenced(&referenced).unwrap();

        assert_eq!(outcome.removed, vec![stale]);
        assert_eq!(outcome.bytes_reclaimed, 5);
        assert!(blobs.contains(&keep).unwrap());
        assert!(!blobs.contains(&stale).unwrap());
    }

    #[test]
    fn test_delete_unreferenced_never_removes_blob_in_use() {
        let repo = Repository::in_memory().unwrap();
        let blobs = repo.blobs();
        let index = repo.index();

        let digest = blobs.put(b"in use").unwrap().digest;
        let id = index.create_snapshot(Utc::now()).unwrap();
        index.add_file_entry(id, "file.txt", &digest).unwrap();

        let outcome = blobs.delete_unreferenced(&HashSet::new()).unwrap();
        assert!(outcome.removed.is_empty());
        assert!(blobs.contains(&digest).unwrap());
    }
}
