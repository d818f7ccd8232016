use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::database::models::{DocumentVersion, Validity};

use super::error::DocumentError;
use super::locks::KeyLocks;
use super::naming::{parse_physical_key, to_physical_key, PhysicalKey};
use super::storage::{FileStore, StorageError};
use super::versions::VersionStore;

/// Taken slots skipped before a write gives up
const MAX_SLOT_PROBES: i32 = 64;

/// One logical document in an owner's listing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentSummary {
    pub name: String,
    pub storage_key: String,
    pub current_version: i32,
    pub version_count: usize,
    pub valid_from: Option<chrono::NaiveDate>,
    pub valid_until: Option<chrono::NaiveDate>,
}

/// Current version content returned by `download`
#[derive(Debug, Clone)]
pub struct DownloadedDocument {
    pub file_name: String,
    pub version: DocumentVersion,
    pub content: Vec<u8>,
}

/// Result of a fully successful delete
#[derive(Debug, Clone, Serialize)]
pub struct DeleteReport {
    pub name: String,
    pub versions_removed: usize,
}

/// Orchestrates file writes and version metadata for every document operation.
///
/// Files are written or deleted before the matching metadata change is
/// committed, so an interrupted call leaves an untracked file rather than a
/// row pointing at nothing. Every write goes to a file slot nobody holds yet,
/// so no stored file is ever overwritten. Mutations on one storage key are
/// serialized.
pub struct DocumentEngine {
    versions: VersionStore,
    files: Arc<dyn FileStore>,
    locks: KeyLocks,
}

impl DocumentEngine {
    pub fn new(versions: VersionStore, files: Arc<dyn FileStore>) -> Self {
        Self {
            versions,
            files,
            locks: KeyLocks::new(),
        }
    }

    /// Create-only upload of version 1.
    pub async fn upload(
        &self,
        name: &str,
        owner: &str,
        content: &[u8],
        validity: Validity,
    ) -> Result<DocumentVersion, DocumentError> {
        let key = to_physical_key(name, owner)?;
        let _guard = self.locks.acquire(&key.base_name()).await;

        if !self.versions.list_versions(&key.base_name()).await?.is_empty() {
            return Err(DocumentError::DuplicateName(key.logical_name()));
        }

        let file_path = self.store_in_free_slot(&key, 1, content).await?;
        let version = self.record_upload(&key, validity, file_path).await?;

        info!("Uploaded {} ({} bytes) for {}", key, content.len(), owner);
        Ok(version)
    }

    /// Store `content` as the next version. Earlier version files are kept.
    pub async fn update(
        &self,
        name: &str,
        owner: &str,
        content: &[u8],
        validity: Option<Validity>,
    ) -> Result<DocumentVersion, DocumentError> {
        let key = to_physical_key(name, owner)?;
        let _guard = self.locks.acquire(&key.base_name()).await;

        let previous = self.versions.current_version(&key.base_name()).await.map_err(|e| match e {
            DocumentError::NotFound(_) => DocumentError::not_found(format!("no document named '{}'", name)),
            other => other,
        })?;

        let validity = match validity {
            Some(v) if !v.is_empty() => v,
            _ => previous.validity(),
        };

        // A failed insert leaves the file untracked; delete sweeps it.
        let file_path = self.store_in_free_slot(&key, previous.version + 1, content).await?;
        let version = self
            .versions
            .append_version(&key, Some(&previous), validity, file_path)
            .await?;

        info!("Stored {} version {} in {} for {}", key, version.version, version.file_path, owner);
        Ok(version)
    }

    /// Drop the current version's metadata so the previous one becomes current.
    /// The dropped version's file stays on disk.
    pub async fn use_previous_version(&self, name: &str, owner: &str) -> Result<DocumentVersion, DocumentError> {
        let key = to_physical_key(name, owner)?;
        let _guard = self.locks.acquire(&key.base_name()).await;

        let mut versions = self.versions.list_versions(&key.base_name()).await?;
        if versions.len() < 2 {
            return Err(DocumentError::not_found(format!(
                "'{}' has no previous version to revert to",
                name
            )));
        }

        let current = versions.pop().ok_or_else(|| DocumentError::not_found(name.to_string()))?;
        self.versions.remove_version(current.id).await?;

        let restored = versions
            .pop()
            .ok_or_else(|| DocumentError::not_found(name.to_string()))?;
        info!("Reverted {} from version {} to {}", key, current.version, restored.version);
        Ok(restored)
    }

    /// Remove every version, file first, then metadata. A version whose file
    /// cannot be deleted keeps its metadata; the remaining versions are still
    /// processed and the failures are reported together. Once no version is
    /// left, files of reverted versions are swept as well.
    pub async fn delete(&self, name: &str, owner: &str) -> Result<DeleteReport, DocumentError> {
        let key = to_physical_key(name, owner)?;
        let _guard = self.locks.acquire(&key.base_name()).await;

        let versions = self.versions.list_versions(&key.base_name()).await?;
        if versions.is_empty() {
            return Err(DocumentError::not_found(format!("no document named '{}'", name)));
        }

        let mut removed = 0;
        let mut failures = Vec::new();

        for version in &versions {
            if let Err(e) = self.files.delete_if_exists(&version.file_path).await {
                warn!("Could not delete {} (version {}): {}", version.file_path, version.version, e);
                failures.push(format!("version {} (file)", version.version));
                continue;
            }

            match self.versions.remove_version(version.id).await {
                Ok(()) => removed += 1,
                Err(e) => {
                    warn!("Could not delete metadata for {} version {}: {}", key, version.version, e);
                    failures.push(format!("version {} (metadata)", version.version));
                }
            }
        }

        if !failures.is_empty() {
            return Err(DocumentError::storage(format!(
                "removed {} of {} versions of '{}'; failed: {}",
                removed,
                versions.len(),
                name,
                failures.join("; ")
            )));
        }

        self.sweep_untracked_files(&key).await;

        info!("Deleted {} ({} versions)", key, removed);
        Ok(DeleteReport {
            name: key.logical_name(),
            versions_removed: removed,
        })
    }

    /// Read the current version of a document.
    pub async fn download(&self, name: &str, owner: &str) -> Result<DownloadedDocument, DocumentError> {
        let key = to_physical_key(name, owner)?;
        let current = self.versions.current_version(&key.base_name()).await?;

        // Stored paths are checked too, not only freshly derived ones.
        self.files.resolve(&current.file_path)?;
        debug!("Serving {} version {}", current.file_path, current.version);

        let content = self.files.read(&current.file_path).await?;
        Ok(DownloadedDocument {
            file_name: key.logical_name(),
            version: current,
            content,
        })
    }

    /// One summary per logical document owned by `owner`.
    pub async fn list(&self, owner: &str) -> Result<Vec<DocumentSummary>, DocumentError> {
        let rows = self.versions.list_for_owner(owner).await?;

        let mut grouped: BTreeMap<String, Vec<DocumentVersion>> = BTreeMap::new();
        for row in rows {
            let storage_key = format!("{}.{}", row.base_name, row.extension);
            grouped.entry(storage_key).or_default().push(row);
        }

        let summaries = grouped
            .into_iter()
            .filter_map(|(storage_key, mut versions)| {
                // The owner comes from the key itself, not from the row.
                let key = match parse_physical_key(&storage_key) {
                    Some(key) if key.owner == owner => key,
                    _ => {
                        warn!("Skipping '{}' while listing documents of {}", storage_key, owner);
                        return None;
                    }
                };

                versions.sort_by_key(|v| v.version);
                let count = versions.len();
                let current = versions.pop()?;
                Some(DocumentSummary {
                    name: key.logical_name(),
                    storage_key,
                    current_version: current.version,
                    version_count: count,
                    valid_from: current.valid_from,
                    valid_until: current.valid_until,
                })
            })
            .collect();

        Ok(summaries)
    }

    /// Every version of one document, oldest first.
    pub async fn list_by_name(&self, name: &str, owner: &str) -> Result<Vec<DocumentVersion>, DocumentError> {
        let key = to_physical_key(name, owner)?;
        self.versions.list_versions(&key.base_name()).await
    }

    /// Write `content` to the first slot from `first` on that holds no file.
    /// Slots are claimed with an exclusive create, so a file left behind by a
    /// reverted version or written by another instance is skipped, never replaced.
    async fn store_in_free_slot(&self, key: &PhysicalKey, first: i32, content: &[u8]) -> Result<String, DocumentError> {
        for slot in first..first + MAX_SLOT_PROBES {
            let file_path = key.file_slot(slot);
            match self.files.create(&file_path, content).await {
                Ok(()) => return Ok(file_path),
                Err(StorageError::AlreadyExists(_)) => debug!("{} is taken, trying the next slot", file_path),
                Err(e) => return Err(e.into()),
            }
        }
        Err(DocumentError::storage(format!("no free file slot left for '{}'", key.logical_name())))
    }

    /// Append version 1 for a freshly created file, removing the file again
    /// if the row cannot be stored. The file was created exclusively by this
    /// call, so no other version can depend on it.
    async fn record_upload(
        &self,
        key: &PhysicalKey,
        validity: Validity,
        file_path: String,
    ) -> Result<DocumentVersion, DocumentError> {
        match self.versions.append_version(key, None, validity, file_path.clone()).await {
            Ok(version) => Ok(version),
            Err(e) => {
                warn!("Metadata insert failed for {}, removing {}: {}", key, file_path, e);
                if let Err(cleanup) = self.files.delete_if_exists(&file_path).await {
                    error!("Rollback of {} failed: {}", file_path, cleanup);
                }
                Err(e)
            }
        }
    }

    /// Best effort removal of files no version row points at any more.
    async fn sweep_untracked_files(&self, key: &PhysicalKey) {
        if let Err(e) = self.files.delete_if_exists(&key.file_slot(1)).await {
            warn!("Could not remove leftover {}: {}", key.file_slot(1), e);
        }
        match self.files.remove_tree(&key.history_dir()).await {
            Ok(true) => debug!("Removed history of {}", key),
            Ok(false) => {}
            Err(e) => warn!("Could not remove history of {}: {}", key, e),
        }
    }
}
