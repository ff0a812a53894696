// src/clients/storage.rs

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("url is not managed by this storage: {0}")]
    ForeignUrl(String),
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        AppError::External(err.to_string())
    }
}

/// An uploaded audio file as received from the client.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Binary object storage collaborator.
#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Stores `file` under `domain` and returns its public URL.
    async fn upload(&self, file: &UploadFile, domain: &str) -> Result<String, StorageError>;

    /// Removes the object behind `url`. Missing objects are not an error.
    async fn delete(&self, url: &str) -> Result<(), StorageError>;
}

/// Stores objects on the local disk as `<root>/<domain>/<uuid>.<ext>`.
#[derive(Debug, Clone)]
pub struct LocalFileStorage {
    root: PathBuf,
    public_url: String,
}

impl LocalFileStorage {
    pub fn new(root: impl Into<PathBuf>, public_url: &str) -> Self {
        Self {
            root: root.into(),
            public_url: public_url.trim_end_matches('/').to_string(),
        }
    }

    fn object_path(&self, url: &str) -> Result<PathBuf, StorageError> {
        let key = url
            .strip_prefix(&self.public_url)
            .and_then(|rest| rest.strip_prefix('/'))
            .ok_or_else(|| StorageError::ForeignUrl(url.to_string()))?;

        let relative = Path::new(key);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(StorageError::ForeignUrl(url.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    async fn upload(&self, file: &UploadFile, domain: &str) -> Result<String, StorageError> {
        let extension = Path::new(&file.file_name)
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| e.chars().all(|c| c.is_ascii_alphanumeric()))
            .map(|e| format!(".{}", e.to_ascii_lowercase()))
            .unwrap_or_default();
        let key = format!("{}/{}{}", domain, Uuid::new_v4(), extension);

        let path = self.root.join(&key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &file.bytes).await?;

        tracing::debug!(key = %key, size = file.bytes.len(), "Stored upload");
        Ok(format!("{}/{}", self.public_url, key))
    }

    async fn delete(&self, url: &str) -> Result<(), StorageError> {
        let path = self.object_path(url)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
