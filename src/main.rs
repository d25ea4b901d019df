use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use axum_prometheus::PrometheusMetricLayer;
use clap::{Args, Parser, Subcommand};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use superapp::config::AppConfig;
use superapp::error::AppError;
use superapp::kyc::face::HeuristicFaceEngine;
use superapp::kyc::upi::OpenRegistry;
use superapp::kyc::{kyc_router, KycService, MemoryKycRepository};
use superapp::search::service::MemoryWishlist;
use superapp::search::{
    search_router, HashedTextEmbedder, JsonCatalog, SearchService, TracingAnalytics, VectorIndex,
};
use superapp::security::AesFieldCipher;
use superapp::telemetry;
use tracing::{info, warn};

const DEFAULT_CATALOG_PATH: &str = "data/products.json";

#[derive(Clone)]
struct AppState {
    readiness: Arc<AtomicBool>,
    metrics: PrometheusHandle,
}

#[derive(Parser, Debug)]
#[command(
    name = "SuperApp Core",
    about = "Run the identity verification and product search service",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Manage the product search index
    Index {
        #[command(subcommand)]
        command: IndexCommand,
    },
}

#[derive(Args, Debug, Default)]
struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    port: Option<u16>,
}

#[derive(Subcommand, Debug)]
enum IndexCommand {
    /// Rebuild the search index from the catalog and persist the snapshot
    Rebuild(RebuildArgs),
}

#[derive(Args, Debug)]
struct RebuildArgs {
    /// Override the configured catalog file
    #[arg(long)]
    catalog: Option<PathBuf>,
    /// Override the configured snapshot file
    #[arg(long)]
    snapshot: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run_cli().await {
        eprintln!("application error: {err}");
        std::process::exit(1);
    }
}

async fn run_cli() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => run_server(args).await,
        Command::Index {
            command: IndexCommand::Rebuild(args),
        } => run_index_rebuild(args),
    }
}

async fn run_server(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let repository = Arc::new(MemoryKycRepository::open());
    let cipher = Arc::new(AesFieldCipher::new(&config.security.encryption_key));
    let faces = Arc::new(HeuristicFaceEngine::default());
    let registry = Arc::new(OpenRegistry);
    let kyc_service = Arc::new(KycService::new(repository, cipher, faces, registry));

    let embedder = HashedTextEmbedder::new(config.search.embedding_dim);
    let index = Arc::new(match &config.search.index_path {
        Some(path) => VectorIndex::with_snapshot_path(embedder, path.clone()),
        None => VectorIndex::new(embedder),
    });
    let catalog_path = config
        .search
        .catalog_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CATALOG_PATH));
    let catalog = Arc::new(JsonCatalog::new(catalog_path));

    // Snapshot first, full build second; the service starts either way and
    // serves empty search results until an index exists.
    if index.load().is_err() {
        match index.build(catalog.as_ref()) {
            Ok(indexed) => info!(indexed, "search index built at startup"),
            Err(error) => warn!(%error, "search index unavailable at startup"),
        }
    }

    let search_service = Arc::new(SearchService::new(
        index,
        catalog,
        Arc::new(TracingAnalytics),
        Arc::new(MemoryWishlist::default()),
    ));

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let state = AppState {
        readiness: readiness_flag.clone(),
        metrics: prometheus_handle,
    };

    let app = Router::new()
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .with_state(state)
        .merge(kyc_router(kyc_service))
        .merge(search_router(search_service))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "superapp core service ready");

    axum::serve(listener, app).await?;
    Ok(())
}

fn run_index_rebuild(args: RebuildArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;

    let snapshot_path = args
        .snapshot
        .or_else(|| config.search.index_path.clone())
        .ok_or_else(|| {
            AppError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no snapshot path configured (set APP_INDEX_PATH or pass --snapshot)",
            ))
        })?;
    let catalog_path = args
        .catalog
        .or_else(|| config.search.catalog_path.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CATALOG_PATH));

    let embedder = HashedTextEmbedder::new(config.search.embedding_dim);
    let index = VectorIndex::with_snapshot_path(embedder, snapshot_path.clone());
    let catalog = JsonCatalog::new(catalog_path.clone());

    let indexed = index.build(&catalog)?;
    println!(
        "Indexed {indexed} products from {} into {}",
        catalog_path.display(),
        snapshot_path.display()
    );
    Ok(())
}

async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn readiness_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

async fn metrics_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
