use crate::{Digest, SnapshotID};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Invalid target directory: {path}")]
    InvalidTarget { path: PathBuf },

    #[error("Error reading {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid path: {path}")]
    InvalidPath { path: String },

    #[error("Snapshot {id} not found.")]
    SnapshotNotFound { id: SnapshotID },

    #[error("Missing blob {digest} for file {path}")]
    MissingBlob { digest: Digest, path: String },

    #[error("Duplicate path {path} in snapshot {snapshot_id}")]
    DuplicatePath { snapshot_id: SnapshotID, path: String },
}

pub type Result<T> = std::result::Result<T, Error>;
