mod audio;
mod cleanup;
mod config;
mod handlers;
mod metrics;
mod models;
mod provider;
mod rate_limit;
mod state;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use axum::routing::{get, post};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cleanup::Janitor;
use crate::config::Args;
use crate::handlers::{
    health_handler, metrics_handler, translate_text_handler, translate_voice_handler,
};
use crate::provider::Provider;
use crate::rate_limit::RateLimiter;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let janitor = Janitor::new(
        PathBuf::from(&args.temp_dir),
        Duration::from_secs(args.retention),
        args.sweep_after,
    );
    janitor
        .ensure_workspace()
        .with_context(|| format!("cannot create staging directory {}", args.temp_dir))?;

    let state = Arc::new(AppState {
        rate_limiter: RateLimiter::new(args.rate_limit, Duration::from_secs(args.rate_window)),
        janitor,
        provider: Provider::new(
            reqwest::Client::new(),
            args.provider_url.clone(),
            args.model.clone(),
            args.api_key.clone(),
        ),
        max_audio_secs: args.max_audio_secs,
    });

    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/api/translate/text", post(translate_text_handler))
        .route("/api/translate/voice", post(translate_voice_handler))
        .with_state(state.clone());

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(port = args.port, "voicebridge listening");
    info!(model = %args.model, url = %args.provider_url, "translation provider configured");
    info!(
        "rate limit: {} requests per {} seconds per user",
        args.rate_limit, args.rate_window
    );
    info!(
        "staging dir {:?}, retention {}s, sweep every {} messages",
        args.temp_dir, args.retention, args.sweep_after
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    // administrative sweep on the way out
    let removed = state.janitor.sweep().await;
    info!(removed, "final sweep complete");

    Ok(())
}
