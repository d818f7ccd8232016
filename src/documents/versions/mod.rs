//! Ordered version metadata per physical base name.
//!
//! The store never touches the file system; the engine coordinates files.

mod memory;
mod postgres;

pub use memory::MemoryVersionRepository;
pub use postgres::PgVersionRepository;

use async_trait::async_trait;
use std::sync::Arc;

use crate::database::manager::DatabaseError;
use crate::database::models::{DocumentVersion, NewDocumentVersion, Validity};

use super::error::DocumentError;
use super::naming::PhysicalKey;

/// Metadata persistence for document versions
#[async_trait]
pub trait VersionRepository: Send + Sync {
    /// All versions for one base name, ascending by version number
    async fn find_by_base_name(&self, base_name: &str) -> Result<Vec<DocumentVersion>, DatabaseError>;

    /// All versions owned by `owner`, ordered by base name then version
    async fn find_by_owner(&self, owner: &str) -> Result<Vec<DocumentVersion>, DatabaseError>;

    /// Insert a row. Fails with `UniqueViolation` if `(base_name, version)` exists.
    async fn insert(&self, version: NewDocumentVersion) -> Result<DocumentVersion, DatabaseError>;

    /// Delete by id; returns whether a row was removed
    async fn delete(&self, id: i64) -> Result<bool, DatabaseError>;
}

#[derive(Clone)]
pub struct VersionStore {
    repository: Arc<dyn VersionRepository>,
}

impl VersionStore {
    pub fn new(repository: Arc<dyn VersionRepository>) -> Self {
        Self { repository }
    }

    pub async fn list_versions(&self, base_name: &str) -> Result<Vec<DocumentVersion>, DocumentError> {
        let mut versions = self.repository.find_by_base_name(base_name).await?;
        versions.sort_by_key(|v| v.version);
        Ok(versions)
    }

    pub async fn list_for_owner(&self, owner: &str) -> Result<Vec<DocumentVersion>, DocumentError> {
        Ok(self.repository.find_by_owner(owner).await?)
    }

    pub async fn current_version(&self, base_name: &str) -> Result<DocumentVersion, DocumentError> {
        self.list_versions(base_name)
            .await?
            .pop()
            .ok_or_else(|| DocumentError::not_found(format!("no versions stored for '{}'", base_name)))
    }

    /// Record the version after `previous` for `key`, or version 1 when there
    /// is none, stored in the already written `file_path`.
    pub async fn append_version(
        &self,
        key: &PhysicalKey,
        previous: Option<&DocumentVersion>,
        validity: Validity,
        file_path: String,
    ) -> Result<DocumentVersion, DocumentError> {
        let next = previous.map(|v| v.version + 1).unwrap_or(1);
        self.insert_version(key, next, validity, file_path).await
    }

    async fn insert_version(
        &self,
        key: &PhysicalKey,
        version: i32,
        validity: Validity,
        file_path: String,
    ) -> Result<DocumentVersion, DocumentError> {
        let record = NewDocumentVersion {
            name: key.name.clone(),
            owner: key.owner.clone(),
            base_name: key.base_name(),
            extension: key.extension.clone(),
            version,
            validity,
            file_path,
        };

        match self.repository.insert(record).await {
            Ok(stored) => Ok(stored),
            Err(DatabaseError::UniqueViolation(_)) => Err(DocumentError::DuplicateName(key.logical_name())),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn remove_version(&self, id: i64) -> Result<(), DocumentError> {
        if self.repository.delete(id).await? {
            Ok(())
        } else {
            Err(DocumentError::not_found(format!("version record {} does not exist", id)))
        }
    }
}
