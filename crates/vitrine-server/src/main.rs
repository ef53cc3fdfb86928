#![forbid(unsafe_code)]

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use vitrine_server::{
    build_router, validate_startup_config_contract, AppState, ServerConfig, TracingMailer,
};
use vitrine_store::Store;

fn env_string(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_bool(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .and_then(|v| match v.as_str() {
            "1" | "true" | "TRUE" | "yes" | "YES" => Some(true),
            "0" | "false" | "FALSE" | "no" | "NO" => Some(false),
            _ => None,
        })
        .unwrap_or(default)
}

fn env_usize(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(default)
}

fn env_i64(name: &str, default: i64) -> i64 {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(default)
}

fn config_from_env() -> ServerConfig {
    let mut config = ServerConfig::default();
    if let Some(addr) = env_string("VITRINE_ADDR") {
        config.bind_addr = addr;
    }
    if let Some(path) = env_string("VITRINE_DB_PATH") {
        config.db_path = PathBuf::from(path);
    }
    if let Some(dir) = env_string("VITRINE_PUBLIC_DIR") {
        config.public_dir = PathBuf::from(dir);
    }
    if let Some(key) = env_string("VITRINE_SESSION_KEY") {
        config.session_key = key;
    }
    if let Some(key) = env_string("VITRINE_ACTIVATION_KEY") {
        config.activation_key = key;
    }
    if let Some(url) = env_string("VITRINE_ACTIVATION_URL") {
        config.activation_url_base = url;
    }
    if let Some(from) = env_string("VITRINE_SMTP_FROM") {
        config.smtp_from = from;
    }
    if let Some(origins) = env_string("VITRINE_CORS_ORIGINS") {
        config.cors_allowed_origins = origins
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect();
    }
    config.max_body_bytes = env_usize("VITRINE_MAX_BODY_BYTES", config.max_body_bytes);
    config.upload_max_bytes = env_usize("VITRINE_UPLOAD_MAX_BYTES", config.upload_max_bytes);
    config.max_page_limit = env_i64("VITRINE_MAX_PAGE_LIMIT", config.max_page_limit);
    config.log_json = env_bool("VITRINE_LOG_JSON", config.log_json);
    config
}

fn init_tracing(log_json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("register SIGTERM");
        let mut sigint = signal(SignalKind::interrupt()).expect("register SIGINT");
        tokio::select! {
            _ = sigterm.recv() => {}
            _ = sigint.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[tokio::main]
async fn main() -> Result<(), String> {
    let config = config_from_env();
    init_tracing(config.log_json);
    validate_startup_config_contract(&config)
        .map_err(|e| format!("invalid startup config: {e}"))?;

    let store = Store::open(&config.db_path).map_err(|e| {
        format!(
            "could not open store at {}: {e}",
            config.db_path.display()
        )
    })?;

    let bind_addr = config.bind_addr.clone();
    let addr: std::net::SocketAddr = bind_addr
        .parse()
        .map_err(|e| format!("invalid bind addr {bind_addr}: {e}"))?;

    let state = AppState::new(store, config, Arc::new(TracingMailer));
    let app = build_router(state);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| format!("bind failed: {e}"))?;
    info!("vitrine-server listening on {bind_addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            wait_for_shutdown_signal().await;
            info!("shutdown signal received, draining connections");
        })
        .await
        .map_err(|e| format!("server failed: {e}"))
}
