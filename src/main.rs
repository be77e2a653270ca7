//! Application entry point for the `digester-monitor` service.
//!
//! This binary orchestrates the full startup sequence for the dashboard's
//! aggregation core, including:
//! - Loading configuration from environment variables or `.env`
//! - Initializing structured logging/tracing
//! - Starting the session (initial fetch, poll timer, reducer)
//! - Opening the push channel for the session
//! - Mounting the snapshot API via the `routes` gateway (EMBP pattern)
//! - Serving until Ctrl-C, then tearing the session down exactly once
//!
//! # Environment Variables
//! - `SENSOR_API_URL`, `SENSOR_PUSH_URL` (optional) – channel endpoints
//! - `MONITOR_LOG_LEVEL` (optional) – log verbosity (default: `debug`)
//! - `MONITOR_SPAN_EVENTS` (optional) – span event mode for tracing
//!
//! See `config.rs` for the full list.
use std::env;

use anyhow::Result;
use axum::Router;
use dotenvy::dotenv;
use is_terminal::IsTerminal;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use digester_monitor::{config, routes, session, HttpPullChannel, PushChannel, SessionOptions};

// ---

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // ---
    dotenv().ok();
    init_tracing();

    let cfg = config::load_from_env()?;
    cfg.log_config();

    let pull = HttpPullChannel::new(&cfg.api_url)?;
    let push = PushChannel::new(&cfg.push_url, cfg.push_retry_max())?;

    let options = SessionOptions {
        poll_interval: cfg.poll_interval(),
        initial_range: cfg.initial_range,
    };
    let mut session = session::start(pull, options);
    session.attach_push(push);

    // Build app from routes gateway (EMBP)
    let app: Router = routes::router(session.client());

    tracing::info!("Listening on {}", cfg.listen_addr);

    let listener = tokio::net::TcpListener::bind(cfg.listen_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    session.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    // ---
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
    }
    tracing::info!("Shutdown requested");
}

// ---

/// Initialize the global tracing subscriber for structured logging.
///
/// This function configures the [`tracing_subscriber`] with:
/// - Log target, file, and line number output enabled
/// - Color output controlled by TTY detection and `FORCE_COLOR` env var:
///   - `FORCE_COLOR=1|true|yes`: force colors on
///   - `FORCE_COLOR=0|false|no`: force colors off
///   - unset or other values: auto-detect TTY
/// - Span event emission mode controlled by the `MONITOR_SPAN_EVENTS` env var:
///   - `"full"`       : emit ENTER, EXIT, and CLOSE events with timing
///   - `"enter_exit"` : emit ENTER and EXIT only
///   - unset or other values: emit CLOSE events only (default)
/// - Log level controlled by `RUST_LOG`, else the `MONITOR_LOG_LEVEL` env var
///
/// Call once at startup, before any logging macros run.
fn init_tracing() {
    // ---
    let span_events = match env::var("MONITOR_SPAN_EVENTS").as_deref() {
        Ok("full") => FmtSpan::FULL,
        Ok("enter_exit") => FmtSpan::ENTER | FmtSpan::EXIT,
        _ => FmtSpan::CLOSE,
    };

    let use_color = match env::var("FORCE_COLOR").as_deref() {
        Ok("1") | Ok("true") | Ok("yes") => true,
        Ok("0") | Ok("false") | Ok("no") => false,
        _ => std::io::stdout().is_terminal(),
    };

    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match env::var("MONITOR_LOG_LEVEL").ok().as_deref() {
            Some("trace") => "trace",
            Some("debug") => "debug",
            Some("info") => "info",
            Some("warn") => "warn",
            Some("error") => "error",
            _ => "debug",
        };
        EnvFilter::new(format!("{level},reqwest=warn,hyper=warn,hyper_util=warn"))
    };

    tracing_subscriber::fmt()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(span_events)
        .with_env_filter(env_filter)
        .with_ansi(use_color)
        .compact()
        .init();
}
