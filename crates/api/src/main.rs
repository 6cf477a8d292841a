use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use coedit_api::background;
use coedit_api::config::ServerConfig;
use coedit_api::router::build_app_router;
use coedit_api::state::AppState;
use coedit_db::{HistoryStore, LockStore, PgHistoryStore, PgLockStore};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    init_tracing();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = %config.port,
        lock_ttl_secs = config.locks.lock_ttl_secs,
        "Loaded server configuration"
    );

    // --- Stores ---
    let (lock_store, history_store) = open_stores(&config).await;

    // --- App state ---
    let state = AppState::new(config.clone(), lock_store, history_store);

    // --- Background tasks ---
    let cancel = CancellationToken::new();
    let handles = background::spawn_all(&state, &cancel);
    tracing::info!(
        count = handles.len(),
        "Background tasks started (room router, heartbeat, sweeps, retention)"
    );

    let ws_manager = Arc::clone(&state.ws_manager);
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    let ws_count = ws_manager.connection_count().await;
    tracing::info!(ws_count, "Closing remaining WebSocket connections");
    ws_manager.shutdown_all().await;

    cancel.cancel();
    let drain = futures::future::join_all(handles);
    if tokio::time::timeout(Duration::from_secs(config.shutdown_timeout_secs), drain)
        .await
        .is_err()
    {
        tracing::warn!("Background tasks did not stop within the shutdown timeout");
    }

    tracing::info!("Graceful shutdown complete");
}

/// `RUST_LOG` filter with a `fmt` layer; `LOG_FORMAT=json` switches to
/// JSON lines.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "coedit_api=debug,coedit_locks=debug,coedit_db=info,tower_http=debug".into()
    });
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// PostgreSQL stores when `DATABASE_URL` is set, process memory otherwise.
async fn open_stores(config: &ServerConfig) -> (Arc<dyn LockStore>, Arc<dyn HistoryStore>) {
    let Some(database_url) = config.database_url.as_deref() else {
        tracing::warn!("DATABASE_URL not set, locks and history are kept in memory");
        return (
            Arc::new(coedit_db::InMemoryLockStore::new()),
            Arc::new(coedit_db::InMemoryHistoryStore::new()),
        );
    };

    let pool = coedit_db::create_pool(database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    coedit_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    coedit_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    (
        Arc::new(PgLockStore::new(pool.clone())),
        Arc::new(PgHistoryStore::new(pool)),
    )
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
