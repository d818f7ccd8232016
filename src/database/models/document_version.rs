use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Optional validity window attached to a version
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validity {
    pub valid_from: Option<NaiveDate>,
    pub valid_until: Option<NaiveDate>,
}

impl Validity {
    pub fn is_empty(&self) -> bool {
        self.valid_from.is_none() && self.valid_until.is_none()
    }
}

/// One row of `document_versions`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct DocumentVersion {
    pub id: i64,
    /// Logical base name without extension
    pub name: String,
    pub owner: String,
    /// `{name}-{owner}`, shared by all versions of one document
    pub base_name: String,
    pub extension: String,
    pub version: i32,
    pub valid_from: Option<NaiveDate>,
    pub valid_until: Option<NaiveDate>,
    /// Path relative to the storage root
    pub file_path: String,
    pub created_at: DateTime<Utc>,
}

impl DocumentVersion {
    pub fn validity(&self) -> Validity {
        Validity {
            valid_from: self.valid_from,
            valid_until: self.valid_until,
        }
    }
}

/// Values needed to insert a version; id and timestamp come from the store
#[derive(Debug, Clone)]
pub struct NewDocumentVersion {
    pub name: String,
    pub owner: String,
    pub base_name: String,
    pub extension: String,
    pub version: i32,
    pub validity: Validity,
    pub file_path: String,
}
