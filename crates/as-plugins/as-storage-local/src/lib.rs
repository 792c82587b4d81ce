//! # as-storage-local
//! autosync/crates/as-plugins/as-storage-local/src/lib.rs
//! Local filesystem implementation of `BlobStore`.
//! Features: id-prefixed storage names, write-then-rename publication,
//! whole-directory teardown.

use std::io;
use std::path::{Path, PathBuf};

use as_core::error::{AppError, Result};
use as_core::models::StoredBlob;
use as_core::traits::{BlobReader, BlobStore};
use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use uuid::Uuid;

/// In-progress writes live under this prefix and are never resolvable.
const TEMP_PREFIX: &str = ".part-";
/// Upper bound, in characters, on the sanitized part of a storage name.
const MAX_NAME_CHARS: usize = 120;

pub struct LocalBlobStore {
    /// Scratch root for all blobs (e.g., "./temp_shared")
    root_path: PathBuf,
    /// Puts share the read side; `clear` takes the write side.
    gate: RwLock<()>,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root_path: root.into(),
            gate: RwLock::new(()),
        }
    }

    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    async fn ensure_root(&self) -> io::Result<()> {
        if fs::try_exists(&self.root_path).await.unwrap_or(false) {
            return Ok(());
        }
        fs::create_dir_all(&self.root_path).await?;
        tracing::info!(root = %self.root_path.display(), "scratch root created");
        Ok(())
    }

    /// Joins a storage name onto the root, refusing anything that could point
    /// outside it or at an unfinished write.
    fn path_for(&self, storage_name: &str) -> Option<PathBuf> {
        let valid = !storage_name.is_empty()
            && !storage_name.starts_with('.')
            && !storage_name.contains(['/', '\\', '\0']);
        valid.then(|| self.root_path.join(storage_name))
    }
}

/// Reduces a client-supplied filename to a safe single path component.
pub fn sanitize_filename(original: &str) -> String {
    let last = original
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or_default();

    let cleaned: String = last
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| match c {
            ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            other => other,
        })
        .collect();

    let trimmed = cleaned.trim().trim_start_matches('.');
    let out: String = trimmed.chars().take(MAX_NAME_CHARS).collect();
    if out.is_empty() {
        "file".to_string()
    } else {
        out
    }
}

async fn write_fully(path: &Path, data: &[u8]) -> io::Result<()> {
    let mut file = fs::File::create(path).await?;
    file.write_all(data).await?;
    file.flush().await?;
    Ok(())
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, original_name: &str, data: Bytes) -> Result<StoredBlob> {
        let _gate = self.gate.read().await;

        self.ensure_root()
            .await
            .map_err(|e| AppError::StorageWrite(format!("cannot create scratch root: {e}")))?;

        let storage_name = format!(
            "{}_{}",
            Uuid::now_v7().simple(),
            sanitize_filename(original_name)
        );
        let final_path = self.root_path.join(&storage_name);
        let temp_path = self.root_path.join(format!("{TEMP_PREFIX}{storage_name}"));

        // 1. Write the whole payload under a name nobody can resolve
        if let Err(e) = write_fully(&temp_path, &data).await {
            let _ = fs::remove_file(&temp_path).await;
            tracing::error!(storage_name = %storage_name, error = %e, "blob write failed");
            return Err(AppError::StorageWrite(e.to_string()));
        }

        // 2. Publish it
        if let Err(e) = fs::rename(&temp_path, &final_path).await {
            let _ = fs::remove_file(&temp_path).await;
            tracing::error!(storage_name = %storage_name, error = %e, "blob publish failed");
            return Err(AppError::StorageWrite(e.to_string()));
        }

        tracing::debug!(storage_name = %storage_name, size_bytes = data.len(), "blob stored");
        Ok(StoredBlob {
            storage_name,
            size_bytes: data.len() as u64,
        })
    }

    async fn resolve(&self, storage_name: &str) -> Result<PathBuf> {
        let path = self
            .path_for(storage_name)
            .ok_or_else(|| AppError::not_found(storage_name))?;
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(path),
            _ => Err(AppError::not_found(storage_name)),
        }
    }

    async fn exists(&self, storage_name: &str) -> bool {
        self.resolve(storage_name).await.is_ok()
    }

    async fn open(&self, storage_name: &str) -> Result<BlobReader> {
        let path = self.resolve(storage_name).await?;
        let file = fs::File::open(&path).await.map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => AppError::not_found(storage_name),
            _ => AppError::Internal(e.to_string()),
        })?;
        let size_bytes = file
            .metadata()
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?
            .len();

        Ok(BlobReader {
            size_bytes,
            reader: Box::pin(file),
        })
    }

    async fn clear(&self) -> Result<()> {
        let _gate = self.gate.write().await;

        match fs::remove_dir_all(&self.root_path).await {
            Ok(()) => {
                tracing::info!(root = %self.root_path.display(), "scratch root removed");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(root = %self.root_path.display(), "scratch root already absent");
                Ok(())
            }
            Err(e) => Err(AppError::Internal(format!(
                "cannot remove {}: {e}",
                self.root_path.display()
            ))),
        }
    }
}
