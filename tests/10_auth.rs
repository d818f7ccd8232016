mod common;

use anyhow::Result;
use docstore_api::auth::{Claims, TokenService};
use docstore_api::database::models::Role;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

#[tokio::test]
async fn health_endpoint_responds() -> Result<()> {
    let server = common::ensure_server().await?;

    let res = Client::new().get(server.url("/health")).send().await?;
    assert_eq!(res.status(), StatusCode::OK);

    let body: Value = res.json().await?;
    assert_eq!(body["data"]["database"], "memory");
    Ok(())
}

#[tokio::test]
async fn register_then_login() -> Result<()> {
    let server = common::ensure_server().await?;
    let username = common::unique_name("acme");

    let res = common::register(server, &username, "CLIENT", None).await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await?;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["username"], username.as_str());
    assert_eq!(body["data"]["roles"], json!(["CLIENT"]));

    let token = common::token(server, &username).await?;
    let res = Client::new()
        .get(server.url("/api/users/me"))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn duplicate_and_malformed_registrations_are_rejected() -> Result<()> {
    let server = common::ensure_server().await?;
    let username = common::unique_name("dup");

    assert_eq!(common::register(server, &username, "CLIENT", None).await?.status(), StatusCode::CREATED);
    assert_eq!(common::register(server, &username, "CLIENT", None).await?.status(), StatusCode::CONFLICT);

    // `-` would make storage keys ambiguous
    let res = common::register(server, "bad-name", "CLIENT", None).await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn wrong_password_is_unauthorized() -> Result<()> {
    let server = common::ensure_server().await?;
    let (username, _) = common::client_account(server).await?;

    let res = Client::new()
        .post(server.url("/auth/token"))
        .json(&json!({ "username": username, "password": "not-the-password" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn missing_or_forged_token_is_unauthorized() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = Client::new();

    let res = client.get(server.url("/api/documents")).send().await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let forged = TokenService::new("some-other-secret", 1).issue("acme", vec![Role::Client])?.0;
    let res = client
        .get(server.url("/api/documents"))
        .bearer_auth(forged)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn expired_token_asks_for_new_login() -> Result<()> {
    let server = common::ensure_server().await?;
    let (username, _) = common::client_account(server).await?;

    let mut claims = Claims::new(username, vec![Role::Client], 1);
    claims.exp = claims.iat - 60;
    let expired = TokenService::new(common::JWT_SECRET, 1).encode(&claims)?;

    let res = Client::new()
        .get(server.url("/api/documents"))
        .bearer_auth(expired)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let body: Value = res.json().await?;
    assert_eq!(body["message"], "Your token has run out of time, please log in again");
    Ok(())
}

#[tokio::test]
async fn deleted_account_is_locked_out() -> Result<()> {
    let server = common::ensure_server().await?;
    let (_, token) = common::client_account(server).await?;
    let client = Client::new();

    let res = client.delete(server.url("/api/users/me")).bearer_auth(&token).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["data"]["excluded"], true);

    // The token is still valid, the account is not
    let res = client.get(server.url("/api/documents")).bearer_auth(&token).send().await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    Ok(())
}
