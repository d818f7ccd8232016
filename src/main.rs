use anyhow::Context;
use axum::{
    extract::{DefaultBodyLimit, State},
    http::{HeaderValue, StatusCode},
    middleware::from_fn_with_state,
    response::{IntoResponse, Json},
    routing::{get, post, put},
    Router,
};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::EnvFilter;

use docstore_api::config::{config, AppConfig, StoreBackend};
use docstore_api::database::manager::DatabaseManager;
use docstore_api::handlers::{protected, public};
use docstore_api::is_production;
use docstore_api::middleware::jwt_auth_middleware;
use docstore_api::state::AppState;

#[derive(Parser)]
#[command(name = "docstore-api")]
#[command(about = "Versioned document storage API")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve {
        /// Port to listen on (falls back to DOCSTORE_PORT, PORT, then 3000)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Apply database migrations and exit
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = config();
    tracing::info!("Starting docstore API in {:?} mode", config.environment);

    match cli.command.unwrap_or(Command::Serve { port: None }) {
        Command::Serve { port } => serve(config, port).await,
        Command::Migrate => migrate(config).await,
    }
}

async fn serve(config: &AppConfig, port: Option<u16>) -> anyhow::Result<()> {
    if config.security.jwt_secret.is_empty() {
        anyhow::bail!("JWT_SECRET must be set");
    }

    let state = AppState::from_config(config).await?;
    let database = state.database.clone();
    let app = app(state, config);

    // Allow tests or deployments to override port via env
    let port = port
        .or_else(|| std::env::var("DOCSTORE_PORT").ok().and_then(|s| s.parse().ok()))
        .or_else(|| std::env::var("PORT").ok().and_then(|s| s.parse().ok()))
        .unwrap_or(3000);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("Docstore API listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    if let Some(database) = database {
        database.close().await;
    }
    Ok(())
}

async fn migrate(config: &AppConfig) -> anyhow::Result<()> {
    if config.database.backend != StoreBackend::Postgres {
        anyhow::bail!("migrate requires DATABASE_BACKEND=postgres");
    }

    let manager = DatabaseManager::connect(config.database.url.as_deref(), config.database.max_connections).await?;
    manager.migrate().await?;
    manager.close().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

fn app(state: AppState, config: &AppConfig) -> Router {
    let router = Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        // Public auth routes
        .merge(auth_public_routes())
        // Protected API
        .merge(protected_routes(state.clone()))
        .with_state(state);

    let router = router.layer(
        ServiceBuilder::new()
            .layer(cors_layer(config))
            .layer(DefaultBodyLimit::max(config.api.max_request_size_bytes)),
    );

    if config.api.enable_request_logging {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    if !is_production!() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .security
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    CorsLayer::new().allow_origin(AllowOrigin::list(origins))
}

fn auth_public_routes() -> Router<AppState> {
    use public::auth;

    Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/token", post(auth::token))
}

fn protected_routes(state: AppState) -> Router<AppState> {
    use protected::{documents, users};

    Router::new()
        // Documents of the effective owner
        .route(
            "/api/documents",
            get(documents::list).post(documents::upload).put(documents::update),
        )
        .route("/api/documents/:name", axum::routing::delete(documents::delete))
        .route("/api/documents/:name/versions", get(documents::versions))
        .route("/api/documents/:name/revert", post(documents::revert))
        .route("/api/documents/:name/download", get(documents::download))
        // Accounts and linking
        .route("/api/users/me", get(users::whoami).delete(users::delete_me))
        .route("/api/users/:username", get(users::find))
        .route("/api/links/pending", get(users::pending_links))
        .route("/api/links/:employee", put(users::allow_link))
        .route_layer(from_fn_with_state(state, jwt_auth_middleware))
}

async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "success": true,
        "data": {
            "name": "Docstore API",
            "version": version,
            "description": "Versioned document storage for clients and their employees",
            "endpoints": {
                "home": "/ (public)",
                "health": "/health (public)",
                "public_auth": "/auth/register, /auth/token (public - token acquisition)",
                "documents": "/api/documents[/:name[/versions|/revert|/download]] (protected)",
                "users": "/api/users/me, /api/users/:username (protected)",
                "links": "/api/links/pending, /api/links/:employee (protected, clients only)",
            }
        }
    }))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    let Some(database) = state.database.as_ref() else {
        return (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": { "status": "ok", "timestamp": now, "database": "memory" }
            })),
        );
    };

    match database.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": { "status": "ok", "timestamp": now, "database": "ok" }
            })),
        ),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "error": "database unavailable",
                    "data": { "status": "degraded", "timestamp": now }
                })),
            )
        }
    }
}
