use axum::{
    extract::{Path, State},
    Extension,
};

use crate::database::models::Role;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::AccountInfo;
use crate::state::AppState;

/// GET /api/users/me - The calling account
pub async fn whoami(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> ApiResult<AccountInfo> {
    let principal = state.identity.authorize(&auth_user.username).await?;
    Ok(ApiResponse::success(state.accounts.find(&principal.username).await?))
}

/// GET /api/users/:username - Public profile of any account
pub async fn find(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(username): Path<String>,
) -> ApiResult<AccountInfo> {
    state.identity.authorize(&auth_user.username).await?;
    Ok(ApiResponse::success(state.accounts.find(&username).await?))
}

/// DELETE /api/users/me - Soft delete the calling account
pub async fn delete_me(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> ApiResult<AccountInfo> {
    let principal = state.identity.authorize(&auth_user.username).await?;
    Ok(ApiResponse::success(state.accounts.delete_account(&principal).await?))
}

/// GET /api/links/pending - Employees waiting for the calling client to allow linking
pub async fn pending_links(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> ApiResult<Vec<AccountInfo>> {
    let principal = state.identity.authorize(&auth_user.username).await?;
    if !principal.has_role(Role::Client) {
        return Err(ApiError::forbidden("Only client accounts have link requests"));
    }
    Ok(ApiResponse::success(state.accounts.pending_links(&principal).await?))
}

/// PUT /api/links/:employee - Allow an employee to act on the calling client's documents
pub async fn allow_link(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(employee): Path<String>,
) -> ApiResult<AccountInfo> {
    let principal = state.identity.authorize(&auth_user.username).await?;
    if !principal.has_role(Role::Client) {
        return Err(ApiError::forbidden("Only client accounts can allow linking"));
    }
    Ok(ApiResponse::success(state.accounts.allow_link(&principal, &employee).await?))
}
