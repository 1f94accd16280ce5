use std::io::{self, Write};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use axum::routing::{get, post, put};
use axum::{Json, Router, extract::State};
use clap::{Args, Parser};
use log::info;
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use studyvault_core::{Config, Database, PathRebaser, RepetitionScheduler, WorkspaceLocks};

mod error;
mod files;
mod routes;

fn main() {
    if let Err(err) = try_main() {
        let _ = writeln!(io::stderr(), "{err:?}");
        std::process::exit(1);
    }
}

#[tokio::main]
async fn try_main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let config_path = cli
        .common
        .config
        .unwrap_or_else(Config::default_config_path);
    let config = Config::ensure_at(&config_path)?;
    let port = cli.common.port.unwrap_or(config.api.port);

    let db = Database::open(&config.database).await?;
    let state = AppState::new(config, db);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    info!("Starting API server on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state)).await?;

    Ok(())
}

#[derive(Debug, Parser)]
#[command(author, version, about = "HTTP API server for studyvault")]
struct Cli {
    #[command(flatten)]
    common: CommonOpts,
}

#[derive(Debug, Clone, Args)]
struct CommonOpts {
    /// Override the config file path
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Port to listen on (default: from config)
    #[arg(short, long)]
    port: Option<u16>,
}

#[derive(Clone)]
pub(crate) struct AppState {
    config: Arc<Config>,
    db: Database,
    scheduler: RepetitionScheduler,
    rebaser: PathRebaser,
    locks: WorkspaceLocks,
}

impl AppState {
    fn new(config: Config, db: Database) -> Self {
        let rebaser = PathRebaser::new(db.clone()).with_debounce(config.usage.debounce());
        Self {
            scheduler: RepetitionScheduler::new(db.clone()),
            rebaser,
            locks: WorkspaceLocks::new(),
            config: Arc::new(config),
            db,
        }
    }
}

fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/config", get(get_config))
        .route(
            "/repetitions",
            get(routes::list_repetitions).post(routes::create_repetition),
        )
        .route("/repetitions/due", get(routes::due_repetitions))
        .route(
            "/repetitions/{id}",
            get(routes::get_repetition)
                .patch(routes::update_repetition)
                .delete(routes::delete_repetition),
        )
        .route(
            "/repetitions/{id}/complete",
            post(routes::complete_repetition),
        )
        .route("/repetitions/{id}/mute", put(routes::mute_repetition))
        .route("/usage/access", post(routes::record_access))
        .route("/usage/recent", get(routes::recent_files))
        .route("/usage/frequent", get(routes::frequent_files))
        .route("/files/rename", post(files::rename))
        .route("/files/move", post(files::move_entry))
        .route("/files/delete", post(files::delete))
        .route(
            "/settings/notifications",
            get(routes::get_notification_settings).put(routes::update_notification_settings),
        )
        .route("/stats", get(routes::stats))
        .route("/reset", post(routes::reset))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct RootResponse {
    name: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn get_config(State(state): State<AppState>) -> Json<Config> {
    Json((*state.config).clone())
}

#[cfg(test)]
#[path = "router_tests.rs"]
mod tests;
