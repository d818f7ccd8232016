use async_trait::async_trait;
use sqlx::PgPool;

use crate::database::manager::DatabaseError;
use crate::database::models::{DocumentVersion, NewDocumentVersion};

use super::VersionRepository;

const COLUMNS: &str =
    "id, name, owner, base_name, extension, version, valid_from, valid_until, file_path, created_at";

/// `document_versions` table; `(base_name, version)` is unique
pub struct PgVersionRepository {
    pool: PgPool,
}

impl PgVersionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VersionRepository for PgVersionRepository {
    async fn find_by_base_name(&self, base_name: &str) -> Result<Vec<DocumentVersion>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM document_versions WHERE base_name = $1 ORDER BY version ASC",
            COLUMNS
        );
        let rows = sqlx::query_as::<_, DocumentVersion>(&sql)
            .bind(base_name)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn find_by_owner(&self, owner: &str) -> Result<Vec<DocumentVersion>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM document_versions WHERE owner = $1 ORDER BY base_name ASC, version ASC",
            COLUMNS
        );
        let rows = sqlx::query_as::<_, DocumentVersion>(&sql)
            .bind(owner)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn insert(&self, version: NewDocumentVersion) -> Result<DocumentVersion, DatabaseError> {
        let sql = format!(
            r#"
            INSERT INTO document_versions
                (name, owner, base_name, extension, version, valid_from, valid_until, file_path)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            COLUMNS
        );
        let row = sqlx::query_as::<_, DocumentVersion>(&sql)
            .bind(&version.name)
            .bind(&version.owner)
            .bind(&version.base_name)
            .bind(&version.extension)
            .bind(version.version)
            .bind(version.validity.valid_from)
            .bind(version.validity.valid_until)
            .bind(&version.file_path)
            .fetch_one(&self.pool)
            .await?;
        Ok(row)
    }

    async fn delete(&self, id: i64) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM document_versions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
