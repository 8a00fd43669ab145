use clap::Parser;
use devcamper_core::config;
use devcamper_core::model::ensure_collections;
use devcamper_core::storage::{open_database, snapshot_database, Database};
use devcamper_server::api::auth::AuthConfig;
use devcamper_server::api::create_router;
use devcamper_server::api::handlers::{AppState, UploadConfig};
use devcamper_server::api::metrics;
use devcamper_server::geocoder::GeocoderArgs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "devcamper", about = "DevCamper bootcamp directory API")]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = config::DEFAULT_PORT)]
    port: u16,

    /// Runtime environment; `production` marks the session cookie Secure
    #[arg(long, env = "NODE_ENV", default_value = "development")]
    node_env: String,

    /// Data directory for snapshots and the write-ahead log
    #[arg(short, long, env = "DATA_DIR", default_value = config::DEFAULT_DATA_DIR)]
    data_dir: PathBuf,

    /// Secret used to sign session tokens
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    jwt_secret: String,

    /// Session token lifetime, e.g. 30d, 12h
    #[arg(long, env = "JWT_EXPIRE", default_value = config::DEFAULT_JWT_EXPIRE)]
    jwt_expire: String,

    /// Session cookie lifetime in days
    #[arg(long, env = "JWT_COOKIE_EXPIRE", default_value_t = config::DEFAULT_JWT_COOKIE_EXPIRE_DAYS)]
    jwt_cookie_expire: u64,

    /// Directory for uploaded bootcamp photos, served under /uploads
    #[arg(long, env = "FILE_UPLOAD_PATH", default_value = config::DEFAULT_UPLOAD_DIR)]
    file_upload_path: PathBuf,

    /// Maximum photo size in bytes
    #[arg(long, env = "MAX_FILE_UPLOAD", default_value_t = config::DEFAULT_MAX_FILE_UPLOAD)]
    max_file_upload: usize,

    #[command(flatten)]
    geocoder: GeocoderArgs,

    /// Snapshot interval in seconds (0 = disabled)
    #[arg(long, default_value_t = config::DEFAULT_SNAPSHOT_INTERVAL_SECS)]
    snapshot_interval: u64,

    /// TLS certificate file path
    #[arg(long)]
    tls_cert: Option<String>,

    /// TLS private key file path
    #[arg(long)]
    tls_key: Option<String>,

    /// Graceful shutdown timeout in seconds
    #[arg(long, default_value_t = config::DEFAULT_SHUTDOWN_TIMEOUT_SECS)]
    shutdown_timeout: u64,

    /// Fail startup if WAL replay encounters errors (strict mode)
    #[arg(long, default_value_t = false)]
    wal_strict: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::from_path("config/config.env").ok();
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(
                    "devcamper_server=info"
                        .parse()
                        .expect("valid directive literal"),
                )
                .add_directive(
                    "devcamper_core=info"
                        .parse()
                        .expect("valid directive literal"),
                ),
        )
        .init();

    let args = Args::parse();

    if args.port == 0 {
        eprintln!("Error: port must be > 0");
        std::process::exit(1);
    }
    if args.jwt_secret.len() < 16 {
        tracing::warn!("JWT_SECRET is shorter than 16 bytes");
    }
    if args.data_dir.exists() && !args.data_dir.is_dir() {
        eprintln!(
            "Error: data_dir '{}' exists but is not a directory",
            args.data_dir.display()
        );
        std::process::exit(1);
    }

    let (db, stats) = open_database(&args.data_dir)?;
    let replay_errors = stats.skipped > 0 || stats.crc_errors > 0 || stats.truncated;
    if replay_errors {
        tracing::warn!(
            "WAL replay stats: {} ok, {} skipped, {} CRC errors, truncated={}",
            stats.success,
            stats.skipped,
            stats.crc_errors,
            stats.truncated
        );
        if args.wal_strict {
            eprintln!(
                "Error: WAL replay encountered errors (strict mode). \
                 {} CRC errors, {} skipped, truncated={}. \
                 Fix the WAL or restart without --wal-strict.",
                stats.crc_errors, stats.skipped, stats.truncated
            );
            std::process::exit(1);
        }
    }
    ensure_collections(&db)?;

    let auth = AuthConfig::new(
        args.jwt_secret.clone(),
        &args.jwt_expire,
        args.jwt_cookie_expire,
        args.node_env == "production",
    )?;
    let geocoder = args.geocoder.build()?;
    std::fs::create_dir_all(&args.file_upload_path)?;

    let prometheus_handle =
        metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()?;

    let state = AppState {
        db: db.clone(),
        geocoder,
        auth: Arc::new(auth),
        uploads: UploadConfig {
            dir: args.file_upload_path.clone(),
            max_bytes: args.max_file_upload,
        },
        prometheus_handle,
        start_time: Instant::now(),
    };

    let app = create_router(state);
    let addr = format!("0.0.0.0:{}", args.port);
    let collections_count = db.collections.read().len();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        port = args.port,
        env = %args.node_env,
        data_dir = %args.data_dir.display(),
        snapshot_interval_secs = args.snapshot_interval,
        geocoder = ?args.geocoder.geocoder_provider,
        tls = args.tls_cert.is_some(),
        collections = collections_count,
        "DevCamper API ready"
    );

    // Spawn collection metrics background task
    let metrics_db = db.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(15));
        loop {
            interval.tick().await;
            metrics::update_collection_metrics(&metrics_db);
            metrics::update_wal_metrics(&metrics_db);
        }
    });

    // Spawn auto-snapshot background task
    if args.snapshot_interval > 0 {
        let snap_db = db.clone();
        let snap_dir = args.data_dir.clone();
        let snap_interval = args.snapshot_interval;
        tracing::info!("Auto-snapshots enabled every {}s", snap_interval);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(snap_interval));
            interval.tick().await;
            loop {
                interval.tick().await;
                let db = snap_db.clone();
                let dir = snap_dir.clone();
                match tokio::task::spawn_blocking(move || snapshot_database(&db, &dir)).await {
                    Ok(Ok(saved)) => {
                        tracing::info!("Periodic snapshot complete ({saved} collections), WAL truncated")
                    }
                    Ok(Err(e)) => tracing::error!("Periodic snapshot failed: {}", e),
                    Err(e) => tracing::error!("Snapshot task panicked: {}", e),
                }
            }
        });
    }

    let shutdown_timeout = args.shutdown_timeout;
    match (args.tls_cert, args.tls_key) {
        (Some(cert), Some(key)) => {
            tracing::info!("TLS enabled");
            let tls_config =
                axum_server::tls_rustls::RustlsConfig::from_pem_file(&cert, &key).await?;
            let handle = axum_server::Handle::new();
            let shutdown_handle = handle.clone();
            tokio::spawn(async move {
                wait_for_signal().await;
                shutdown_handle.graceful_shutdown(Some(Duration::from_secs(shutdown_timeout)));
            });
            axum_server::bind_rustls(addr.parse()?, tls_config)
                .handle(handle)
                .serve(app.into_make_service())
                .await?;
        }
        (None, None) => {
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            axum::serve(listener, app)
                .with_graceful_shutdown(wait_for_signal())
                .await?;
        }
        _ => {
            eprintln!("Error: Both --tls-cert and --tls-key must be provided together");
            std::process::exit(1);
        }
    }

    flush_and_shutdown(&db, &args.data_dir, shutdown_timeout).await;

    Ok(())
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT"),
        _ = terminate => tracing::info!("Received SIGTERM"),
    }

    tracing::info!("Shutting down gracefully, draining in-flight requests...");
}

/// Snapshot every collection before exit. The WAL is truncated only when
/// every save succeeded, so a failed or timed-out flush still recovers.
async fn flush_and_shutdown(db: &Database, data_dir: &Path, timeout_secs: u64) {
    tracing::info!("All requests drained, flushing data...");

    let db = db.clone();
    let dir = data_dir.to_path_buf();
    let flush = tokio::task::spawn_blocking(move || snapshot_database(&db, &dir));
    match tokio::time::timeout(Duration::from_secs(timeout_secs), flush).await {
        Ok(Ok(Ok(saved))) => tracing::info!("Saved {saved} collections on shutdown, WAL truncated"),
        Ok(Ok(Err(e))) => {
            tracing::error!("Shutdown flush failed, WAL preserved for recovery: {}", e)
        }
        Ok(Err(e)) => tracing::error!("Shutdown flush task panicked: {}", e),
        Err(_) => tracing::error!(
            "Shutdown flush timeout ({}s) exceeded, WAL preserved for recovery",
            timeout_secs
        ),
    }
}
