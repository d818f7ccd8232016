use anyhow::Context;
use std::sync::Arc;
use tracing::info;

use crate::auth::TokenService;
use crate::config::{AppConfig, StoreBackend};
use crate::database::manager::DatabaseManager;
use crate::documents::{
    DocumentEngine, LocalFileStore, MemoryVersionRepository, PgVersionRepository, VersionRepository, VersionStore,
};
use crate::identity::{IdentityResolver, IdentityStore, MemoryIdentityStore, PgIdentityStore};
use crate::services::AccountService;

/// Everything a handler needs, wired once at startup
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<DocumentEngine>,
    pub identity: IdentityResolver,
    pub accounts: Arc<AccountService>,
    pub tokens: TokenService,
    pub database: Option<DatabaseManager>,
}

impl AppState {
    /// Build the state for the configured backend, creating the storage root
    /// and applying migrations as needed.
    pub async fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let tokens = TokenService::new(config.security.jwt_secret.clone(), config.security.jwt_expiry_hours);

        let files = LocalFileStore::new(config.storage.root.clone());
        files
            .create_directories()
            .await
            .with_context(|| format!("failed to create storage root {}", config.storage.root.display()))?;

        let versions: Arc<dyn VersionRepository>;
        let identities: Arc<dyn IdentityStore>;
        let mut database = None;

        match config.database.backend {
            StoreBackend::Memory => {
                info!("Using in-memory metadata stores");
                versions = Arc::new(MemoryVersionRepository::new());
                identities = Arc::new(MemoryIdentityStore::new());
            }
            StoreBackend::Postgres => {
                let manager = DatabaseManager::connect(config.database.url.as_deref(), config.database.max_connections)
                    .await
                    .context("failed to connect to database")?;
                manager.migrate().await.context("failed to apply migrations")?;
                versions = Arc::new(PgVersionRepository::new(manager.pool()));
                identities = Arc::new(PgIdentityStore::new(manager.pool()));
                database = Some(manager);
            }
        }

        info!("Storing documents under {}", files.root().display());
        Ok(Self::assemble(files, versions, identities, tokens, database))
    }

    fn assemble(
        files: LocalFileStore,
        versions: Arc<dyn VersionRepository>,
        identities: Arc<dyn IdentityStore>,
        tokens: TokenService,
        database: Option<DatabaseManager>,
    ) -> Self {
        let engine = DocumentEngine::new(VersionStore::new(versions), Arc::new(files));

        Self {
            engine: Arc::new(engine),
            identity: IdentityResolver::new(identities.clone()),
            accounts: Arc::new(AccountService::new(identities, tokens.clone())),
            tokens,
            database,
        }
    }
}
