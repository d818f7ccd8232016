#![allow(dead_code)]

use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::{multipart, Client, Response, StatusCode};
use serde_json::{json, Value};

pub const JWT_SECRET: &str = "integration-test-secret";
pub const PASSWORD: &str = "correct-horse";

static SERVER: OnceLock<TestServer> = OnceLock::new();
static COUNTER: AtomicUsize = AtomicUsize::new(0);

pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    child: Child,
    storage: tempfile::TempDir,
}

impl TestServer {
    fn spawn() -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);
        let storage = tempfile::tempdir().context("failed to create storage root")?;

        // Cargo builds the binary for integration tests
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_docstore-api"));
        cmd.arg("serve")
            .env("DOCSTORE_PORT", port.to_string())
            .env("APP_ENV", "development")
            .env("DATABASE_BACKEND", "memory")
            .env("STORAGE_ROOT", storage.path())
            .env("JWT_SECRET", JWT_SECRET)
            .env("RUST_LOG", "warn")
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        let child = cmd.spawn().context("failed to spawn server binary")?;

        Ok(Self {
            port,
            base_url,
            child,
            storage,
        })
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = Client::new();
        let deadline = Instant::now() + timeout;
        loop {
            if Instant::now() > deadline {
                break;
            }
            let url = format!("{}/health", self.base_url);
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status() == StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(150)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn storage_root(&self) -> &std::path::Path {
        self.storage.path()
    }
}

pub async fn ensure_server() -> Result<&'static TestServer> {
    let server = SERVER.get_or_init(|| TestServer::spawn().expect("failed to spawn server binary"));
    server.wait_ready(Duration::from_secs(10)).await?;
    Ok(server)
}

/// Username unique across the tests sharing one server
pub fn unique_name(prefix: &str) -> String {
    let n = COUNTER.fetch_add(1, Ordering::SeqCst);
    format!("{}_{}_{}", prefix, std::process::id(), n)
}

pub async fn register(server: &TestServer, username: &str, role: &str, client: Option<&str>) -> Result<Response> {
    let mut body = json!({ "username": username, "password": PASSWORD, "role": role });
    if let Some(client) = client {
        body["client"] = json!(client);
    }
    Ok(Client::new().post(server.url("/auth/register")).json(&body).send().await?)
}

pub async fn token(server: &TestServer, username: &str) -> Result<String> {
    let res = Client::new()
        .post(server.url("/auth/token"))
        .json(&json!({ "username": username, "password": PASSWORD }))
        .send()
        .await?;
    anyhow::ensure!(res.status() == StatusCode::OK, "token request failed: {}", res.status());

    let body: Value = res.json().await?;
    body["data"]["token"]
        .as_str()
        .map(str::to_string)
        .context("token missing from response")
}

/// Register a client and return its name with a fresh token
pub async fn client_account(server: &TestServer) -> Result<(String, String)> {
    let username = unique_name("client");
    let res = register(server, &username, "CLIENT", None).await?;
    anyhow::ensure!(res.status() == StatusCode::CREATED, "register failed: {}", res.status());
    let token = token(server, &username).await?;
    Ok((username, token))
}

pub fn document_form(file_name: &str, content: &[u8], validity: &[(&str, &str)]) -> multipart::Form {
    let part = multipart::Part::bytes(content.to_vec()).file_name(file_name.to_string());
    let mut form = multipart::Form::new().part("document", part);
    for (name, value) in validity {
        form = form.text(name.to_string(), value.to_string());
    }
    form
}

pub async fn upload(server: &TestServer, token: &str, file_name: &str, content: &[u8]) -> Result<Response> {
    Ok(Client::new()
        .post(server.url("/api/documents"))
        .bearer_auth(token)
        .multipart(document_form(file_name, content, &[]))
        .send()
        .await?)
}

pub async fn update(server: &TestServer, token: &str, file_name: &str, content: &[u8]) -> Result<Response> {
    Ok(Client::new()
        .put(server.url("/api/documents"))
        .bearer_auth(token)
        .multipart(document_form(file_name, content, &[]))
        .send()
        .await?)
}
