use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::RwLock;

use crate::database::manager::DatabaseError;
use crate::database::models::{DocumentVersion, NewDocumentVersion};

use super::VersionRepository;

/// Process-local version table
#[derive(Default)]
pub struct MemoryVersionRepository {
    rows: RwLock<Vec<DocumentVersion>>,
    next_id: AtomicI64,
}

impl MemoryVersionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VersionRepository for MemoryVersionRepository {
    async fn find_by_base_name(&self, base_name: &str) -> Result<Vec<DocumentVersion>, DatabaseError> {
        let rows = self.rows.read().await;
        let mut found: Vec<DocumentVersion> = rows.iter().filter(|v| v.base_name == base_name).cloned().collect();
        found.sort_by_key(|v| v.version);
        Ok(found)
    }

    async fn find_by_owner(&self, owner: &str) -> Result<Vec<DocumentVersion>, DatabaseError> {
        let rows = self.rows.read().await;
        let mut found: Vec<DocumentVersion> = rows.iter().filter(|v| v.owner == owner).cloned().collect();
        found.sort_by(|a, b| a.base_name.cmp(&b.base_name).then(a.version.cmp(&b.version)));
        Ok(found)
    }

    async fn insert(&self, version: NewDocumentVersion) -> Result<DocumentVersion, DatabaseError> {
        let mut rows = self.rows.write().await;

        if rows.iter().any(|v| v.base_name == version.base_name && v.version == version.version) {
            return Err(DatabaseError::UniqueViolation(format!(
                "{} version {}",
                version.base_name, version.version
            )));
        }

        let stored = DocumentVersion {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            name: version.name,
            owner: version.owner,
            base_name: version.base_name,
            extension: version.extension,
            version: version.version,
            valid_from: version.validity.valid_from,
            valid_until: version.validity.valid_until,
            file_path: version.file_path,
            created_at: Utc::now(),
        };
        rows.push(stored.clone());
        Ok(stored)
    }

    async fn delete(&self, id: i64) -> Result<bool, DatabaseError> {
        let mut rows = self.rows.write().await;
        let before = rows.len();
        rows.retain(|v| v.id != id);
        Ok(rows.len() != before)
    }
}
