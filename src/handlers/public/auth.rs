use axum::{extract::State, Json};
use serde::Deserialize;

use crate::middleware::{ApiResponse, ApiResult};
use crate::services::{AccountInfo, IssuedToken, RegisterRequest};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub username: String,
    pub password: String,
}

/// POST /auth/register - Create a client or employee account
///
/// Expected Input:
/// ```json
/// { "username": "acme", "password": "secret123", "role": "CLIENT" }
/// { "username": "bob", "password": "secret123", "role": "EMPLOYEE", "client": "acme" }
/// ```
///
/// An employee naming a client starts a link request the client must allow.
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> ApiResult<AccountInfo> {
    let info = state.accounts.register(request).await?;
    Ok(ApiResponse::created(info))
}

/// POST /auth/token - Exchange credentials for a bearer token
///
/// Expected Output:
/// ```json
/// { "success": true, "data": { "token": "eyJhbGciOiJIUzI1NiI...", "expires_at": "2025-01-01T12:00:00Z" } }
/// ```
pub async fn token(
    State(state): State<AppState>,
    Json(request): Json<TokenRequest>,
) -> ApiResult<IssuedToken> {
    let issued = state.accounts.authenticate(&request.username, &request.password).await?;
    Ok(ApiResponse::success(issued))
}
