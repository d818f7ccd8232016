//! Who is calling, and whose documents they act on.

mod memory;
mod postgres;

pub use memory::MemoryIdentityStore;
pub use postgres::PgIdentityStore;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::database::manager::DatabaseError;
use crate::database::models::{OwnerLink, Principal, Role};
use crate::documents::DocumentError;

/// Fields needed to register a principal
#[derive(Debug, Clone)]
pub struct NewPrincipal {
    pub username: String,
    pub password_hash: String,
    pub roles: Vec<Role>,
}

/// Principal and link lookups backing the resolver and the account service
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn find_principal_by_username(&self, username: &str) -> Result<Option<Principal>, DatabaseError>;

    /// Fails with `UniqueViolation` when the username is taken
    async fn create_principal(&self, principal: NewPrincipal) -> Result<Principal, DatabaseError>;

    /// Set the soft-delete flag; returns whether the principal exists
    async fn set_excluded(&self, username: &str, excluded: bool) -> Result<bool, DatabaseError>;

    /// The link (pending or allowed) for an employee
    async fn find_link_by_principal(&self, employee: &str) -> Result<Option<OwnerLink>, DatabaseError>;

    /// Every link (pending or allowed) naming `client`
    async fn find_links_by_owner(&self, client: &str) -> Result<Vec<OwnerLink>, DatabaseError>;

    /// Fails with `UniqueViolation` when the employee already has a link
    async fn create_link(&self, client: &str, employee: &str) -> Result<OwnerLink, DatabaseError>;

    /// Mark the employee's pending link to `client` as allowed
    async fn allow_link(&self, client: &str, employee: &str) -> Result<Option<OwnerLink>, DatabaseError>;
}

/// An authenticated, non-excluded caller together with its effective owner
#[derive(Debug, Clone)]
pub struct Caller {
    pub principal: Principal,
    pub owner: String,
}

impl Caller {
    /// Write operations are reserved for client accounts
    pub fn require_client(&self) -> Result<(), DocumentError> {
        if self.principal.has_role(Role::Client) {
            Ok(())
        } else {
            Err(DocumentError::access(format!(
                "'{}' is not allowed to modify documents",
                self.principal.username
            )))
        }
    }
}

#[derive(Clone)]
pub struct IdentityResolver {
    store: Arc<dyn IdentityStore>,
}

impl IdentityResolver {
    pub fn new(store: Arc<dyn IdentityStore>) -> Self {
        Self { store }
    }

    /// Load the caller and reject unknown or soft-deleted accounts
    pub async fn authorize(&self, username: &str) -> Result<Principal, DocumentError> {
        let principal = self
            .store
            .find_principal_by_username(username)
            .await?
            .ok_or_else(|| DocumentError::access(format!("unknown account '{}'", username)))?;

        if principal.excluded {
            warn!("Rejected request from excluded account '{}'", username);
            return Err(DocumentError::AccountExcluded);
        }
        Ok(principal)
    }

    /// Employees act in their linked client's namespace; everyone else in their own.
    pub async fn resolve_effective_owner(&self, principal: &Principal) -> Result<String, DocumentError> {
        if !principal.is_employee() {
            return Ok(principal.username.clone());
        }

        let link = self
            .store
            .find_link_by_principal(&principal.username)
            .await?
            .filter(|link| link.allowed)
            .ok_or_else(|| DocumentError::LinkNotFound(principal.username.clone()))?;

        // A deleted client takes its employees' access with it.
        let client = self.store.find_principal_by_username(&link.client_username).await?;
        if client.map_or(true, |client| client.excluded) {
            warn!(
                "Rejected '{}': linked client '{}' is deleted",
                principal.username, link.client_username
            );
            return Err(DocumentError::AccountExcluded);
        }

        debug!("Employee '{}' acts for client '{}'", principal.username, link.client_username);
        Ok(link.client_username)
    }

    pub async fn resolve_caller(&self, username: &str) -> Result<Caller, DocumentError> {
        let principal = self.authorize(username).await?;
        let owner = self.resolve_effective_owner(&principal).await?;
        Ok(Caller { principal, owner })
    }
}
