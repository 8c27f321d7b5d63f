//! eqres-api - Equipment reservation service entry point

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use eqres_common::config::{resolve_root_folder, RootFolder, ROOT_FOLDER_ENV};
use eqres_common::db::{get_i64_setting, init_database, LOGIN_ATTEMPTS_PER_MINUTE};
use eqres_api::bootstrap::{self, ADMIN_PASSWORD_ENV, SESSION_PURGE_INTERVAL};
use eqres_api::{build_router, AppState};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for eqres-api
#[derive(Parser, Debug)]
#[command(name = "eqres-api")]
#[command(about = "Equipment reservation service")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "5780", env = "EQRES_PORT")]
    port: u16,

    /// Address to bind
    #[arg(short, long, default_value = "127.0.0.1", env = "EQRES_BIND")]
    bind: IpAddr,

    /// Folder holding the database
    #[arg(short, long, env = "EQRES_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Username of the administrator created on first start
    #[arg(long, default_value = "admin", env = "EQRES_ADMIN_USERNAME")]
    admin_username: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "eqres_api=info,eqres_common=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting eqres-api v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let args = Args::parse();

    let root = RootFolder::new(resolve_root_folder(
        args.root_folder.as_deref(),
        ROOT_FOLDER_ENV,
    ));
    root.ensure_directory_exists()
        .context("Failed to create root folder")?;

    let db_path = root.database_path();
    info!("Database path: {}", db_path.display());

    let pool = init_database(&db_path)
        .await
        .context("Failed to initialize database")?;

    let login_attempts = get_i64_setting(&pool, LOGIN_ATTEMPTS_PER_MINUTE)
        .await
        .context("Failed to read login rate limit")?;
    let login_attempts = u32::try_from(login_attempts).unwrap_or(u32::MAX);

    let admin_password = std::env::var(ADMIN_PASSWORD_ENV).ok();
    bootstrap::ensure_admin(&pool, &args.admin_username, admin_password)
        .await
        .context("Failed to create administrator account")?;

    let state = AppState::new(pool, login_attempts);
    bootstrap::spawn_session_purge(state.clone(), SESSION_PURGE_INTERVAL);

    let app = build_router(state);

    let addr = SocketAddr::new(args.bind, args.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("eqres-api listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
