use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Relation between one employee and the client whose documents they act on.
/// `allowed` stays false until the client approves the request.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OwnerLink {
    pub id: i64,
    pub client_username: String,
    pub employee_username: String,
    pub allowed: bool,
    pub created_at: DateTime<Utc>,
}
