// handlers/protected/mod.rs - Handlers behind jwt_auth_middleware
//
// Every handler receives the AuthUser extension and resolves it through the
// identity resolver before touching any store.
pub mod documents;
pub mod users;

use crate::error::ApiError;
use crate::identity::Caller;
use crate::middleware::AuthUser;
use crate::state::AppState;

/// Soft-delete guard plus effective owner resolution, once per request
pub(crate) async fn resolve_caller(state: &AppState, auth_user: &AuthUser) -> Result<Caller, ApiError> {
    Ok(state.identity.resolve_caller(&auth_user.username).await?)
}
