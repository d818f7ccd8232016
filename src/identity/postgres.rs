use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::models::{OwnerLink, Principal, PrincipalRow};

use super::{IdentityStore, NewPrincipal};

/// `principals` and `owner_links` tables
pub struct PgIdentityStore {
    pool: PgPool,
}

impl PgIdentityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdentityStore for PgIdentityStore {
    async fn find_principal_by_username(&self, username: &str) -> Result<Option<Principal>, DatabaseError> {
        let row = sqlx::query_as::<_, PrincipalRow>(
            "SELECT id, username, password_hash, excluded, roles, created_at FROM principals WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Principal::from))
    }

    async fn create_principal(&self, principal: NewPrincipal) -> Result<Principal, DatabaseError> {
        let roles: Vec<String> = principal.roles.iter().map(|r| r.as_str().to_string()).collect();
        let row = sqlx::query_as::<_, PrincipalRow>(
            r#"
            INSERT INTO principals (id, username, password_hash, excluded, roles)
            VALUES ($1, $2, $3, false, $4)
            RETURNING id, username, password_hash, excluded, roles, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&principal.username)
        .bind(&principal.password_hash)
        .bind(&roles)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn set_excluded(&self, username: &str, excluded: bool) -> Result<bool, DatabaseError> {
        let result = sqlx::query("UPDATE principals SET excluded = $2 WHERE username = $1")
            .bind(username)
            .bind(excluded)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_link_by_principal(&self, employee: &str) -> Result<Option<OwnerLink>, DatabaseError> {
        let link = sqlx::query_as::<_, OwnerLink>(
            "SELECT id, client_username, employee_username, allowed, created_at FROM owner_links WHERE employee_username = $1",
        )
        .bind(employee)
        .fetch_optional(&self.pool)
        .await?;
        Ok(link)
    }

    async fn find_links_by_owner(&self, client: &str) -> Result<Vec<OwnerLink>, DatabaseError> {
        let links = sqlx::query_as::<_, OwnerLink>(
            r#"
            SELECT id, client_username, employee_username, allowed, created_at
            FROM owner_links
            WHERE client_username = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(client)
        .fetch_all(&self.pool)
        .await?;
        Ok(links)
    }

    async fn create_link(&self, client: &str, employee: &str) -> Result<OwnerLink, DatabaseError> {
        let link = sqlx::query_as::<_, OwnerLink>(
            r#"
            INSERT INTO owner_links (client_username, employee_username, allowed)
            VALUES ($1, $2, false)
            RETURNING id, client_username, employee_username, allowed, created_at
            "#,
        )
        .bind(client)
        .bind(employee)
        .fetch_one(&self.pool)
        .await?;
        Ok(link)
    }

    async fn allow_link(&self, client: &str, employee: &str) -> Result<Option<OwnerLink>, DatabaseError> {
        let link = sqlx::query_as::<_, OwnerLink>(
            r#"
            UPDATE owner_links SET allowed = true
            WHERE client_username = $1 AND employee_username = $2
            RETURNING id, client_username, employee_username, allowed, created_at
            "#,
        )
        .bind(client)
        .bind(employee)
        .fetch_optional(&self.pool)
        .await?;
        Ok(link)
    }
}
