//! Artifact cache with collision-free filename reservation.
//!
//! Filenames are partitioned by `(chat_id, message_id)` and suffixed with a
//! sequence number equal to the count of prior artifacts for that pair, so
//! repeated renders of the same message never overwrite each other.
//! Reservation creates the entry with `create_new`, which also closes the
//! scan-then-write race between concurrent writers: the loser of a create
//! race re-scans and lands on the next sequence.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use meshforge_core::{ArtifactFormat, StageError};
use thiserror::Error;

/// A reserved cache entry for one rendered artifact.
///
/// Written once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedArtifact {
    /// Final filename, `{chat_id}-model-{message_id}-{seq}.{ext}`.
    pub filename: String,
    /// Path relative to the cache root (`models/<filename>`).
    pub relative_path: PathBuf,
    /// Sequence number within the `(chat_id, message_id)` partition.
    pub sequence: u32,
}

/// Reserves filenames and persists artifact bytes under the cache root.
#[derive(Debug, Clone)]
pub struct ArtifactCache {
    models_dir: PathBuf,
    extension: &'static str,
}

impl ArtifactCache {
    /// Creates a cache rooted at `cache_root` for artifacts of the given
    /// format.
    pub fn new(cache_root: impl Into<PathBuf>, format: ArtifactFormat) -> Self {
        Self {
            models_dir: cache_root.into().join("models"),
            extension: format.extension(),
        }
    }

    /// The directory artifacts are written to.
    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    /// Absolute location of a reserved artifact.
    pub fn absolute_path(&self, artifact: &CachedArtifact) -> PathBuf {
        self.models_dir.join(&artifact.filename)
    }

    /// Reserves the next free filename for `(chat_id, message_id)`.
    ///
    /// The sequence number is the count of existing entries with the same
    /// prefix at reservation time; the entry itself is created with
    /// `create_new` so a racing reservation observes it and advances.
    pub fn reserve(
        &self,
        chat_id: &str,
        message_id: &str,
    ) -> Result<CachedArtifact, CacheError> {
        fs::create_dir_all(&self.models_dir).map_err(|e| CacheError::CreateDir {
            path: self.models_dir.clone(),
            source: e,
        })?;

        let prefix = format!("{}-model-{}", chat_id, message_id);
        loop {
            let sequence = self.count_existing(&prefix)?;
            let filename = format!("{}-{}.{}", prefix, sequence, self.extension);
            let path = self.models_dir.join(&filename);

            match fs::OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(_) => {
                    tracing::debug!(filename = %filename, sequence, "reserved cache entry");
                    return Ok(CachedArtifact {
                        relative_path: PathBuf::from("models").join(&filename),
                        filename,
                        sequence,
                    });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    // Lost a reservation race; the new entry raises the
                    // count on the next scan.
                    continue;
                }
                Err(e) => {
                    return Err(CacheError::Reserve { path, source: e });
                }
            }
        }
    }

    /// Writes artifact bytes over the reserved entry.
    ///
    /// Bytes go to a temporary file in the same directory first and are
    /// renamed into place, so a reader never observes a half-written
    /// artifact. A failed write removes the reserved placeholder.
    pub fn write(&self, artifact: &CachedArtifact, bytes: &[u8]) -> Result<(), CacheError> {
        let final_path = self.absolute_path(artifact);
        let result = self.write_atomic(&final_path, bytes);
        if result.is_err() {
            let _ = fs::remove_file(&final_path);
        }
        result
    }

    fn write_atomic(&self, final_path: &Path, bytes: &[u8]) -> Result<(), CacheError> {
        let mut tmp = tempfile::Builder::new()
            .prefix(".meshforge-write-")
            .tempfile_in(&self.models_dir)
            .map_err(|e| write_error(final_path, e))?;
        tmp.write_all(bytes).map_err(|e| write_error(final_path, e))?;
        tmp.flush().map_err(|e| write_error(final_path, e))?;
        tmp.persist(final_path)
            .map_err(|e| write_error(final_path, e.error))?;

        tracing::debug!(path = %final_path.display(), len = bytes.len(), "artifact written");
        Ok(())
    }

    /// Counts entries matching the partition prefix and our extension.
    fn count_existing(&self, prefix: &str) -> Result<u32, CacheError> {
        let suffix = format!(".{}", self.extension);
        let mut count = 0;
        let entries = fs::read_dir(&self.models_dir).map_err(|e| CacheError::Scan {
            path: self.models_dir.clone(),
            source: e,
        })?;
        for entry in entries {
            let entry = entry.map_err(|e| CacheError::Scan {
                path: self.models_dir.clone(),
                source: e,
            })?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with(prefix) && name.ends_with(&suffix) {
                count += 1;
            }
        }
        Ok(count)
    }
}

fn write_error(path: &Path, source: std::io::Error) -> CacheError {
    CacheError::Write {
        path: path.to_path_buf(),
        source,
    }
}

/// Errors raised by cache operations. All are fatal to the invocation.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The cache directory could not be created.
    #[error("failed to create cache directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The cache directory could not be scanned for sequence assignment.
    #[error("failed to scan cache directory {path}: {source}")]
    Scan {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A cache entry could not be reserved.
    #[error("failed to reserve cache entry {path}: {source}")]
    Reserve {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Artifact bytes could not be persisted.
    #[error("failed to write cache entry {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StageError for CacheError {
    fn code(&self) -> &'static str {
        match self {
            CacheError::CreateDir { .. } => "CACHE_001",
            CacheError::Scan { .. } => "CACHE_002",
            CacheError::Reserve { .. } => "CACHE_003",
            CacheError::Write { .. } => "CACHE_004",
        }
    }

    fn category(&self) -> &'static str {
        "cache"
    }
}
