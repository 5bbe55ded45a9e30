use anyhow::Context as _;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use heraldbot::config::Config;
use heraldbot::discord::DiscordClient;
use heraldbot::handlers::{self, Event};
use heraldbot::schedule::ScheduleEngine;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;
    let api = Arc::new(DiscordClient::new_from_env());

    let engine = ScheduleEngine::new(api.clone(), config.registry_path.clone());
    engine.initialize().await;

    let ctx = Arc::new(handlers::Context {
        api,
        bot_user_id: config.bot_user_id,
        guild_id: config.guild_id,
    });

    let app = Router::new()
        .route("/", get(|| async { "heraldbot is running" }))
        .route("/event", post(event))
        .with_state(ctx);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("listening on {addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("failed to install ctrl-c handler: {e}");
            }
        })
        .await?;

    engine.stop();
    Ok(())
}

/// Intake for the gateway layer delivering platform events. Handling
/// runs detached so a slow enrollment does not hold the delivery
/// connection open, and overlapping events stay independent.
async fn event(
    State(ctx): State<Arc<handlers::Context>>,
    Json(event): Json<Event>,
) -> StatusCode {
    tokio::spawn(async move {
        handlers::handle(&ctx, &event).await;
    });
    StatusCode::ACCEPTED
}
