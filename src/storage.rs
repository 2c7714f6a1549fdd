use std::path::PathBuf;

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tokio::fs;
use tracing::debug;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to read blob {key:?}: {source}")]
    Read {
        key: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write blob {key:?}: {source}")]
    Write {
        key: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode blob {key:?}: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode blob {key:?}: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Durable key-value store of small JSON blobs, one file per key.
///
/// Writes go to `{key}.json.tmp` first and are renamed into place, so a
/// crashed or abandoned write never leaves a partially written blob behind.
/// Callers that read-modify-write a blob must serialise around their own
/// lock; the store itself only guarantees each write lands atomically.
#[derive(Debug, Clone)]
pub struct KvStore {
    dir: PathBuf,
}

impl KvStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    /// Read and decode the blob stored under `key`.
    ///
    /// Returns `Ok(None)` when the key has never been written.
    pub async fn read<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        let path = self.path(key);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StorageError::Read {
                    key: key.to_owned(),
                    source: e,
                })
            }
        };

        let value = serde_json::from_slice(&bytes).map_err(|e| StorageError::Decode {
            key: key.to_owned(),
            source: e,
        })?;
        Ok(Some(value))
    }

    /// Serialise `value` and atomically replace the blob stored under `key`.
    pub async fn write<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec(value).map_err(|e| StorageError::Encode {
            key: key.to_owned(),
            source: e,
        })?;

        let write_err = |source| StorageError::Write {
            key: key.to_owned(),
            source,
        };

        fs::create_dir_all(&self.dir).await.map_err(write_err)?;

        let path = self.path(key);
        let tmp = self.dir.join(format!("{key}.json.tmp"));
        fs::write(&tmp, &bytes).await.map_err(|e| StorageError::Write {
            key: key.to_owned(),
            source: e,
        })?;
        fs::rename(&tmp, &path).await.map_err(|e| StorageError::Write {
            key: key.to_owned(),
            source: e,
        })?;

        debug!(key = %key, bytes = bytes.len(), "blob persisted");
        Ok(())
    }
}
