use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::auth::{hash_password, verify_password, JwtError, TokenService};
use crate::database::manager::DatabaseError;
use crate::database::models::{OwnerLink, Principal, Role};
use crate::documents::naming::is_valid_owner;
use crate::identity::{IdentityStore, NewPrincipal};

#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
    #[error("Token error: {0}")]
    Token(#[from] JwtError),
    #[error("Username already exists: {0}")]
    AlreadyExists(String),
    #[error("Invalid username: {0}")]
    InvalidName(String),
    #[error("Invalid registration: {0}")]
    InvalidRequest(String),
    #[error("Invalid username or password")]
    InvalidCredentials,
    #[error("This user has been deleted")]
    Excluded,
    #[error("Not found: {0}")]
    NotFound(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub role: Role,
    /// Client an employee asks to be linked to
    pub client: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccountInfo {
    pub username: String,
    pub roles: Vec<Role>,
    pub excluded: bool,
    /// Linked client for employees, with whether the client allowed it
    pub client: Option<String>,
    pub link_allowed: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

/// Registration, login, linking and soft deletion of principals
pub struct AccountService {
    store: Arc<dyn IdentityStore>,
    tokens: TokenService,
}

impl AccountService {
    pub fn new(store: Arc<dyn IdentityStore>, tokens: TokenService) -> Self {
        Self { store, tokens }
    }

    pub async fn register(&self, request: RegisterRequest) -> Result<AccountInfo, AccountError> {
        self.validate_username(&request.username)?;
        if request.password.len() < 8 {
            return Err(AccountError::InvalidRequest("password must be at least 8 characters".to_string()));
        }

        let client = match (request.role, request.client.as_deref()) {
            (Role::Client, Some(_)) => {
                return Err(AccountError::InvalidRequest("only employees can name a client".to_string()))
            }
            (Role::Employee, Some(client)) => Some(self.find_active_client(client).await?),
            _ => None,
        };

        let principal = match self
            .store
            .create_principal(NewPrincipal {
                username: request.username.clone(),
                password_hash: hash_password(&request.password),
                roles: vec![request.role],
            })
            .await
        {
            Ok(p) => p,
            Err(DatabaseError::UniqueViolation(_)) => return Err(AccountError::AlreadyExists(request.username)),
            Err(e) => return Err(e.into()),
        };

        let link = match client {
            Some(client) => Some(self.store.create_link(&client.username, &principal.username).await?),
            None => None,
        };

        info!("Registered {} account '{}'", request.role, principal.username);
        Ok(Self::info(principal, link))
    }

    pub async fn authenticate(&self, username: &str, password: &str) -> Result<IssuedToken, AccountError> {
        let principal = self
            .store
            .find_principal_by_username(username)
            .await?
            .filter(|p| verify_password(password, &p.password_hash))
            .ok_or(AccountError::InvalidCredentials)?;

        if principal.excluded {
            return Err(AccountError::Excluded);
        }

        let (token, claims) = self.tokens.issue(&principal.username, principal.roles.clone())?;
        info!("Issued token for '{}'", principal.username);
        Ok(IssuedToken {
            token,
            expires_at: claims.expires_at(),
        })
    }

    pub async fn find(&self, username: &str) -> Result<AccountInfo, AccountError> {
        let principal = self
            .store
            .find_principal_by_username(username)
            .await?
            .ok_or_else(|| AccountError::NotFound(format!("user '{}'", username)))?;
        let link = self.store.find_link_by_principal(username).await?;
        Ok(Self::info(principal, link))
    }

    /// Employees waiting for `client` to allow linking
    pub async fn pending_links(&self, client: &Principal) -> Result<Vec<AccountInfo>, AccountError> {
        let mut pending = Vec::new();
        for link in self.store.find_links_by_owner(&client.username).await? {
            if link.allowed {
                continue;
            }
            if let Some(employee) = self.store.find_principal_by_username(&link.employee_username).await? {
                if !employee.excluded {
                    pending.push(Self::info(employee, Some(link)));
                }
            }
        }
        Ok(pending)
    }

    pub async fn allow_link(&self, client: &Principal, employee: &str) -> Result<AccountInfo, AccountError> {
        let link = self
            .store
            .allow_link(&client.username, employee)
            .await?
            .ok_or_else(|| AccountError::NotFound(format!("no link request from '{}'", employee)))?;
        let principal = self
            .store
            .find_principal_by_username(employee)
            .await?
            .ok_or_else(|| AccountError::NotFound(format!("user '{}'", employee)))?;

        info!("Client '{}' allowed link from '{}'", client.username, employee);
        Ok(Self::info(principal, Some(link)))
    }

    /// Soft delete: the account stays so its documents keep their owner
    pub async fn delete_account(&self, principal: &Principal) -> Result<AccountInfo, AccountError> {
        if !self.store.set_excluded(&principal.username, true).await? {
            return Err(AccountError::NotFound(format!("user '{}'", principal.username)));
        }
        let mut principal = principal.clone();
        principal.excluded = true;

        info!("Excluded account '{}'", principal.username);
        let link = self.store.find_link_by_principal(&principal.username).await?;
        Ok(Self::info(principal, link))
    }

    fn validate_username(&self, name: &str) -> Result<(), AccountError> {
        if name.len() < 3 || name.len() > 64 {
            return Err(AccountError::InvalidName("username must be 3 to 64 characters".to_string()));
        }
        if !is_valid_owner(name) {
            return Err(AccountError::InvalidName(
                "username can only contain letters, numbers, and underscores".to_string(),
            ));
        }
        Ok(())
    }

    async fn find_active_client(&self, username: &str) -> Result<Principal, AccountError> {
        self.store
            .find_principal_by_username(username)
            .await?
            .filter(|p| p.has_role(Role::Client) && !p.excluded)
            .ok_or_else(|| AccountError::NotFound(format!("client '{}'", username)))
    }

    fn info(principal: Principal, link: Option<OwnerLink>) -> AccountInfo {
        AccountInfo {
            username: principal.username,
            roles: principal.roles,
            excluded: principal.excluded,
            client: link.as_ref().map(|l| l.client_username.clone()),
            link_allowed: link.map(|l| l.allowed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::MemoryIdentityStore;

    fn service() -> AccountService {
        AccountService::new(Arc::new(MemoryIdentityStore::new()), TokenService::new("secret", 1))
    }

    fn request(username: &str, role: Role, client: Option<&str>) -> RegisterRequest {
        RegisterRequest {
            username: username.to_string(),
            password: "correct-horse".to_string(),
            role,
            client: client.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn register_and_authenticate() {
        let service = service();
        let info = service.register(request("acme", Role::Client, None)).await.unwrap();
        assert_eq!(info.roles, vec![Role::Client]);

        let token = service.authenticate("acme", "correct-horse").await.unwrap();
        assert!(!token.token.is_empty());
        assert!(matches!(
            service.authenticate("acme", "wrong-password").await,
            Err(AccountError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn duplicate_and_malformed_usernames_are_rejected() {
        let service = service();
        service.register(request("acme", Role::Client, None)).await.unwrap();
        assert!(matches!(
            service.register(request("acme", Role::Client, None)).await,
            Err(AccountError::AlreadyExists(_))
        ));
        for bad in ["ac", "acme-corp", "acme.corp", "a/b"] {
            assert!(matches!(
                service.register(request(bad, Role::Client, None)).await,
                Err(AccountError::InvalidName(_))
            ));
        }
    }

    #[tokio::test]
    async fn employee_link_needs_client_approval() {
        let service = service();
        let client = service.register(request("acme", Role::Client, None)).await.unwrap();
        let employee = service.register(request("bob", Role::Employee, Some("acme"))).await.unwrap();
        assert_eq!(employee.client.as_deref(), Some("acme"));
        assert_eq!(employee.link_allowed, Some(false));

        let acme = service.store.find_principal_by_username(&client.username).await.unwrap().unwrap();
        let pending = service.pending_links(&acme).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].username, "bob");

        let allowed = service.allow_link(&acme, "bob").await.unwrap();
        assert_eq!(allowed.link_allowed, Some(true));
        assert!(service.pending_links(&acme).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn employee_cannot_link_to_unknown_client() {
        let service = service();
        assert!(matches!(
            service.register(request("bob", Role::Employee, Some("ghost"))).await,
            Err(AccountError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn deleted_account_cannot_log_in() {
        let service = service();
        service.register(request("acme", Role::Client, None)).await.unwrap();
        let acme = service.store.find_principal_by_username("acme").await.unwrap().unwrap();

        let info = service.delete_account(&acme).await.unwrap();
        assert!(info.excluded);
        assert!(matches!(
            service.authenticate("acme", "correct-horse").await,
            Err(AccountError::Excluded)
        ));
    }
}
