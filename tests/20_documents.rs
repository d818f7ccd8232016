mod common;

use anyhow::Result;
use reqwest::{header, Client, StatusCode};
use serde_json::Value;

#[tokio::test]
async fn document_lifecycle() -> Result<()> {
    let server = common::ensure_server().await?;
    let (owner, token) = common::client_account(server).await?;
    let client = Client::new();

    // Version 1
    let res = common::upload(server, &token, "report.txt", b"first draft").await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await?;
    assert_eq!(body["data"]["version"], 1);
    assert_eq!(body["data"]["owner"], owner.as_str());
    assert!(server.storage_root().join(format!("report-{}.txt", owner)).exists());

    // Upload is create-only
    let res = common::upload(server, &token, "report.txt", b"again").await?;
    assert_eq!(res.status(), StatusCode::CONFLICT);

    // Version 2 keeps version 1 on disk
    let res = common::update(server, &token, "report.txt", b"second draft").await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["data"]["version"], 2);
    assert!(server.storage_root().join(format!("report-{}.txt", owner)).exists());
    let history = server.storage_root().join("_versions").join(format!("report-{}.txt", owner));
    assert!(history.join("v2.txt").exists());

    let res = client
        .get(server.url("/api/documents/report.txt/versions"))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    let versions: Vec<i64> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v["version"].as_i64().unwrap())
        .collect();
    assert_eq!(versions, vec![1, 2]);

    // Download serves the current version as an attachment
    let res = client
        .get(server.url("/api/documents/report.txt/download"))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()[header::CONTENT_TYPE], "application/octet-stream");
    assert_eq!(
        res.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"report.txt\""
    );
    assert_eq!(res.bytes().await?.as_ref(), b"second draft");

    // Revert makes version 1 current again
    let res = client
        .post(server.url("/api/documents/report.txt/revert"))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["data"]["version"], 1);

    let res = client
        .get(server.url("/api/documents/report.txt/download"))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(res.bytes().await?.as_ref(), b"first draft");

    // Nothing left to revert to
    let res = client
        .post(server.url("/api/documents/report.txt/revert"))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = client.get(server.url("/api/documents")).bearer_auth(&token).send().await?;
    let body: Value = res.json().await?;
    let listing = body["data"].as_array().unwrap();
    assert_eq!(listing.len(), 1);
    assert_eq!(listing[0]["name"], "report.txt");
    assert_eq!(listing[0]["current_version"], 1);

    // Delete removes every version
    let res = client
        .delete(server.url("/api/documents/report.txt"))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["data"]["versions_removed"], 1);
    assert!(!server.storage_root().join(format!("report-{}.txt", owner)).exists());
    // The reverted version's file goes with the document
    assert!(!history.join("v2.txt").exists());

    let res = client
        .get(server.url("/api/documents/report.txt/download"))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn validity_is_inherited_by_updates() -> Result<()> {
    let server = common::ensure_server().await?;
    let (_, token) = common::client_account(server).await?;
    let client = Client::new();

    let form = common::document_form(
        "contract.pdf",
        b"v1",
        &[("valid_from", "2024-01-01"), ("valid_until", "2024-12-31")],
    );
    let res = client
        .post(server.url("/api/documents"))
        .bearer_auth(&token)
        .multipart(form)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = common::update(server, &token, "contract.pdf", b"v2").await?;
    let body: Value = res.json().await?;
    assert_eq!(body["data"]["version"], 2);
    assert_eq!(body["data"]["valid_from"], "2024-01-01");
    assert_eq!(body["data"]["valid_until"], "2024-12-31");

    let form = common::document_form("contract.pdf", b"v3", &[("valid_from", "2025-01-01")]);
    let res = client
        .put(server.url("/api/documents"))
        .bearer_auth(&token)
        .multipart(form)
        .send()
        .await?;
    let body: Value = res.json().await?;
    assert_eq!(body["data"]["version"], 3);
    assert_eq!(body["data"]["valid_from"], "2025-01-01");
    assert!(body["data"]["valid_until"].is_null());
    Ok(())
}

#[tokio::test]
async fn malformed_requests_are_rejected() -> Result<()> {
    let server = common::ensure_server().await?;
    let (_, token) = common::client_account(server).await?;
    let client = Client::new();

    let res = common::upload(server, &token, "no_extension", b"x").await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = common::update(server, &token, "missing.txt", b"x").await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let form = reqwest::multipart::Form::new().text("valid_from", "2024-01-01");
    let res = client
        .post(server.url("/api/documents"))
        .bearer_auth(&token)
        .multipart(form)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let form = common::document_form("dated.txt", b"x", &[("valid_from", "next tuesday")]);
    let res = client
        .post(server.url("/api/documents"))
        .bearer_auth(&token)
        .multipart(form)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn traversal_attempts_are_forbidden() -> Result<()> {
    let server = common::ensure_server().await?;
    let (_, token) = common::client_account(server).await?;
    let client = Client::new();

    let res = client
        .get(server.url("/api/documents/..%2F..%2Fetc%2Fpasswd.txt/download"))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = common::upload(server, &token, "../escape.txt", b"x").await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn owners_do_not_see_each_other() -> Result<()> {
    let server = common::ensure_server().await?;
    let (_, alice) = common::client_account(server).await?;
    let (_, bob) = common::client_account(server).await?;

    assert_eq!(common::upload(server, &alice, "notes.txt", b"alice").await?.status(), StatusCode::CREATED);
    // Same logical name, different owner, different key
    assert_eq!(common::upload(server, &bob, "notes.txt", b"bob").await?.status(), StatusCode::CREATED);

    let res = Client::new()
        .get(server.url("/api/documents/notes.txt/download"))
        .bearer_auth(&bob)
        .send()
        .await?;
    assert_eq!(res.bytes().await?.as_ref(), b"bob");
    Ok(())
}

#[tokio::test]
async fn linked_employee_reads_client_documents() -> Result<()> {
    let server = common::ensure_server().await?;
    let (owner, owner_token) = common::client_account(server).await?;
    let client = Client::new();

    assert_eq!(
        common::upload(server, &owner_token, "handbook.md", b"welcome").await?.status(),
        StatusCode::CREATED
    );

    let employee = common::unique_name("staff");
    let res = common::register(server, &employee, "EMPLOYEE", Some(&owner)).await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    let employee_token = common::token(server, &employee).await?;

    // Pending link: no effective owner yet
    let res = client
        .get(server.url("/api/documents"))
        .bearer_auth(&employee_token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = client
        .get(server.url("/api/links/pending"))
        .bearer_auth(&owner_token)
        .send()
        .await?;
    let body: Value = res.json().await?;
    assert!(body["data"]
        .as_array()
        .unwrap()
        .iter()
        .any(|info| info["username"] == employee.as_str()));

    // Employees cannot approve links
    let res = client
        .put(server.url(&format!("/api/links/{}", employee)))
        .bearer_auth(&employee_token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = client
        .put(server.url(&format!("/api/links/{}", employee)))
        .bearer_auth(&owner_token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .get(server.url("/api/documents/handbook.md/download"))
        .bearer_auth(&employee_token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.bytes().await?.as_ref(), b"welcome");

    // Writes stay with the client
    let res = common::update(server, &employee_token, "handbook.md", b"edited").await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    Ok(())
}
