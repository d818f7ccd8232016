use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::models::{OwnerLink, Principal};

use super::{IdentityStore, NewPrincipal};

/// Process-local principals and links
#[derive(Default)]
pub struct MemoryIdentityStore {
    principals: RwLock<HashMap<String, Principal>>,
    links: RwLock<Vec<OwnerLink>>,
    next_link_id: AtomicI64,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn find_principal_by_username(&self, username: &str) -> Result<Option<Principal>, DatabaseError> {
        Ok(self.principals.read().await.get(username).cloned())
    }

    async fn create_principal(&self, principal: NewPrincipal) -> Result<Principal, DatabaseError> {
        let mut principals = self.principals.write().await;
        if principals.contains_key(&principal.username) {
            return Err(DatabaseError::UniqueViolation(format!("username {}", principal.username)));
        }

        let stored = Principal {
            id: Uuid::new_v4(),
            username: principal.username,
            password_hash: principal.password_hash,
            excluded: false,
            roles: principal.roles,
            created_at: Utc::now(),
        };
        principals.insert(stored.username.clone(), stored.clone());
        Ok(stored)
    }

    async fn set_excluded(&self, username: &str, excluded: bool) -> Result<bool, DatabaseError> {
        let mut principals = self.principals.write().await;
        match principals.get_mut(username) {
            Some(principal) => {
                principal.excluded = excluded;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn find_link_by_principal(&self, employee: &str) -> Result<Option<OwnerLink>, DatabaseError> {
        let links = self.links.read().await;
        Ok(links.iter().find(|l| l.employee_username == employee).cloned())
    }

    async fn find_links_by_owner(&self, client: &str) -> Result<Vec<OwnerLink>, DatabaseError> {
        let links = self.links.read().await;
        Ok(links.iter().filter(|l| l.client_username == client).cloned().collect())
    }

    async fn create_link(&self, client: &str, employee: &str) -> Result<OwnerLink, DatabaseError> {
        let mut links = self.links.write().await;
        if links.iter().any(|l| l.employee_username == employee) {
            return Err(DatabaseError::UniqueViolation(format!("link for {}", employee)));
        }

        let link = OwnerLink {
            id: self.next_link_id.fetch_add(1, Ordering::SeqCst) + 1,
            client_username: client.to_string(),
            employee_username: employee.to_string(),
            allowed: false,
            created_at: Utc::now(),
        };
        links.push(link.clone());
        Ok(link)
    }

    async fn allow_link(&self, client: &str, employee: &str) -> Result<Option<OwnerLink>, DatabaseError> {
        let mut links = self.links.write().await;
        Ok(links
            .iter_mut()
            .find(|l| l.client_username == client && l.employee_username == employee)
            .map(|link| {
                link.allowed = true;
                link.clone()
            }))
    }
}
