mod api;
mod app;
mod auth;
mod config;
mod error;
mod middleware;
mod model;
mod ops;
mod repo;
mod service;
mod util;

use anyhow::Context;
use std::{net::SocketAddr, path::Path, sync::OnceLock};
use tokio::net::TcpListener;
use tracing_appender::{
    non_blocking::{NonBlocking, WorkerGuard},
    rolling::RollingFileAppender,
};
use tracing_subscriber::{
    filter::filter_fn, fmt::layer as fmt_layer, prelude::*, EnvFilter, Registry,
};

const CRATE_TARGET: &str = "thesis_tracker";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = config::AppConfig::from_env().context("failed to load configuration")?;
    setup_tracing(&config)?;
    let addr: SocketAddr = config
        .server
        .bind
        .parse()
        .context("invalid SERVER_BIND address")?;

    tracing::info!(
        %addr,
        default_threshold = config.analysis.default_threshold.value(),
        "starting thesis tracker"
    );

    let app = app::build_router(&config).await?;
    let listener = TcpListener::bind(addr).await?;

    axum::serve(listener, app).await.context("server failed")?;

    Ok(())
}

/// Crate events go to stdout with source locations and to the rolling log
/// file; everything else (sqlx, hyper, tower) only to stdout.
fn setup_tracing(config: &config::AppConfig) -> anyhow::Result<()> {
    let level = config.logging.level.as_deref().unwrap_or("info");
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let (log_writer, guard) = log_file_writer(&config.logging)?;
    static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();
    let _ = FILE_GUARD.set(guard);

    let ours = filter_fn(|meta| meta.target().starts_with(CRATE_TARGET));
    let theirs = filter_fn(|meta| !meta.target().starts_with(CRATE_TARGET));

    Registry::default()
        .with(env_filter)
        .with(
            fmt_layer()
                .with_file(true)
                .with_line_number(true)
                .with_filter(ours.clone()),
        )
        .with(fmt_layer().with_filter(theirs))
        .with(
            fmt_layer()
                .with_writer(log_writer)
                .with_ansi(false)
                .with_file(true)
                .with_line_number(true)
                .with_filter(ours),
        )
        .try_init()
        .context("failed to init tracing subscriber")?;

    tracing::debug!(
        file = %config.logging.file,
        rotation = ?config.logging.rotation,
        "file logging enabled"
    );
    Ok(())
}

fn log_file_writer(logging: &config::LoggingConfig) -> anyhow::Result<(NonBlocking, WorkerGuard)> {
    let log_path = Path::new(&logging.file);
    let file_name = log_path
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("log file path `{}` has no file name", logging.file))?;
    let directory = match log_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(directory)
        .with_context(|| format!("failed to create log directory {}", directory.display()))?;

    let appender = RollingFileAppender::new(logging.rotation.as_rotation(), directory, file_name);
    Ok(tracing_appender::non_blocking(appender))
}
