use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest as _, Sha256};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Content address of a blob: SHA-256 over the exact bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest([u8; 32]);

impl Digest {
    pub fn from_data(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn short_string(&self) -> String {
        self.to_hex().chars().take(8).collect()
    }
}

impl FromStr for Digest {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut array = [0u8; 32];
        hex::decode_to_slice(s, &mut array)?;
        Ok(Self(array))
    }
}

impl Serialize for Digest {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Digest::from_str(&s).map_err(serde::de::Error::custom)
    }
}

impl ToSql for Digest {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.to_hex()))
    }
}

impl FromSql for Digest {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        Digest::from_str(s).map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

pub type SnapshotID = i64;

/// One path→blob mapping inside a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileEntry {
    pub path: String,
    pub digest: Digest,
}

/// A single file that could not be captured or restored. The surrounding
/// operation carries on without it.
#[derive(Debug)]
pub struct FileFailure {
    pub path: PathBuf,
    pub error: crate::Error,
}

impl fmt::Display for FileFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.error)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepoStats {
    pub snapshots: u64,
    pub file_entries: u64,
    pub blobs: u64,
    /// Bytes actually stored in the blob table.
    pub stored_bytes: u64,
    /// Bytes the file entries would occupy without deduplication.
    pub logical_bytes: u64,
}

impl RepoStats {
    pub fn dedup_ratio(&self) -> f64 {
        if self.stored_bytes == 0 {
            1.0
        } else {
            self.logical_bytes as f64 / self.stored_bytes as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_is_sha256_hex() {
        let digest = Digest::from_data(b"Hello World");
        assert_eq!(
            digest.to_hex(),
            "a591a6d40bf420404a011733cfb7b190d62c65bf0bcda32b57b277d9ad9f146e"
        );
        assert_eq!(digest.short_string(), "a591a6d4");
    }

    #[test]
    fn test_digest_parse() {
        let digest = Digest::from_data(b"content");
        let parsed: Digest = digest.to_hex().parse().unwrap();
        assert_eq!(parsed, digest);

        assert!("not-hex".parse::<Digest>().is_err());
        assert!("abcd".parse::<Digest>().is_err());
    }

    #[test]
    fn test_dedup_ratio() {
        let stats = RepoStats {
            stored_bytes: 100,
            logical_bytes: 300,
            ..Default::default()
        };
        assert!((stats.dedup_ratio() - 3.0).abs() < f64::EPSILON);
        assert_eq!(RepoStats::default().dedup_ratio(), 1.0);
    }
}
