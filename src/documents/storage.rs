//! File-system collaborator rooted at one storage directory.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::error::DocumentError;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("path '{0}' escapes the storage root")]
    OutsideRoot(String),

    #[error("file '{0}' does not exist")]
    Missing(String),

    #[error("file '{0}' already exists")]
    AlreadyExists(String),

    #[error("I/O error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl From<StorageError> for DocumentError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::OutsideRoot(path) => {
                DocumentError::access(format!("'{}' resolves outside the storage root", path))
            }
            StorageError::Missing(path) => DocumentError::not_found(format!("file '{}' is missing", path)),
            StorageError::AlreadyExists(path) => {
                DocumentError::storage(format!("stored file '{}' is already taken", path))
            }
            StorageError::Io { path, source } => {
                tracing::error!("Storage I/O failure on {}: {}", path, source);
                DocumentError::storage(format!("could not access stored file '{}'", path))
            }
        }
    }
}

/// Raw file operations, every path relative to the storage root
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Absolute location of `relative`, or `OutsideRoot` if it would leave the root
    fn resolve(&self, relative: &str) -> Result<PathBuf, StorageError>;

    /// Create a new file holding `content`. Never replaces an existing file:
    /// fails with `AlreadyExists` instead, also across processes.
    async fn create(&self, relative: &str, content: &[u8]) -> Result<(), StorageError>;

    async fn read(&self, relative: &str) -> Result<Vec<u8>, StorageError>;

    /// Delete the file; a missing file is not an error. Returns whether it existed.
    async fn delete_if_exists(&self, relative: &str) -> Result<bool, StorageError>;

    /// Delete a directory and everything below it; returns whether it existed.
    async fn remove_tree(&self, relative: &str) -> Result<bool, StorageError>;
}

/// `FileStore` on the local disk
#[derive(Debug, Clone)]
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    /// `root` is expected to be absolute and normalized already
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the root directory if needed
    pub async fn create_directories(&self) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root).await.map_err(|source| StorageError::Io {
            path: self.root.display().to_string(),
            source,
        })
    }

    fn io_error(relative: &str, source: std::io::Error) -> StorageError {
        StorageError::Io {
            path: relative.to_string(),
            source,
        }
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    fn resolve(&self, relative: &str) -> Result<PathBuf, StorageError> {
        let mut resolved = self.root.clone();
        let mut depth = 0usize;

        for component in Path::new(relative).components() {
            match component {
                Component::Normal(part) => {
                    resolved.push(part);
                    depth += 1;
                }
                Component::CurDir => {}
                Component::ParentDir if depth > 0 => {
                    resolved.pop();
                    depth -= 1;
                }
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(StorageError::OutsideRoot(relative.to_string()));
                }
            }
        }

        if depth == 0 || !resolved.starts_with(&self.root) {
            return Err(StorageError::OutsideRoot(relative.to_string()));
        }
        Ok(resolved)
    }

    async fn create(&self, relative: &str, content: &[u8]) -> Result<(), StorageError> {
        let path = self.resolve(relative)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| Self::io_error(relative, e))?;
        }

        let mut file = match fs::OpenOptions::new().write(true).create_new(true).open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(StorageError::AlreadyExists(relative.to_string()))
            }
            Err(e) => return Err(Self::io_error(relative, e)),
        };

        let written = match file.write_all(content).await {
            Ok(()) => file.flush().await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            // The file is ours alone, so a partial write can go.
            drop(file);
            let _ = fs::remove_file(&path).await;
            return Err(Self::io_error(relative, e));
        }
        Ok(())
    }

    async fn read(&self, relative: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.resolve(relative)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StorageError::Missing(relative.to_string())),
            Err(e) => Err(Self::io_error(relative, e)),
        }
    }

    async fn delete_if_exists(&self, relative: &str) -> Result<bool, StorageError> {
        let path = self.resolve(relative)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Self::io_error(relative, e)),
        }
    }

    async fn remove_tree(&self, relative: &str) -> Result<bool, StorageError> {
        let path = self.resolve(relative)?;
        match fs::remove_dir_all(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Self::io_error(relative, e)),
        }
    }
}
