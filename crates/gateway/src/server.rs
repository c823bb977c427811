use std::net::SocketAddr;

use {
    axum::{
        Router,
        response::{IntoResponse, Json},
        routing::{get, post},
    },
    tracing::info,
};

use herald_config::HeraldConfig;

use crate::{ingest::ingest_handler, state::AppState};

// ── Router ───────────────────────────────────────────────────────────────────

/// Build the bridge router (shared between production startup and tests).
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/api/message", post(ingest_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

// ── Server startup ───────────────────────────────────────────────────────────

/// Bind and serve until the process exits.
pub async fn start_server(config: &HeraldConfig, state: AppState) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port).parse()?;
    let app = build_app(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let addr = listener.local_addr()?;

    // Startup banner.
    let pipeline = match (
        config.pipeline.max_in_flight,
        config.pipeline.serialize_per_message,
    ) {
        (None, false) => "unbounded".to_string(),
        (Some(n), false) => format!("bounded, {n} in flight"),
        (None, true) => "serialized per message".to_string(),
        (Some(n), true) => format!("bounded, {n} in flight, serialized per message"),
    };
    let lines = vec![
        format!("herald bridge v{}", env!("CARGO_PKG_VERSION")),
        format!("listening on http://{addr}"),
        format!("model: {}", config.completion.model),
        format!("generation: {}", config.completion.base_url),
        format!(
            "delivery: {}",
            config.delivery.base_url.as_deref().unwrap_or("unset")
        ),
        format!("pipeline: {pipeline}"),
    ];
    let width = lines.iter().map(|l| l.len()).max().unwrap_or(0) + 4;
    info!("┌{}┐", "─".repeat(width));
    for line in &lines {
        info!("│  {:<w$}│", line, w = width - 2);
    }
    info!("└{}┘", "─".repeat(width));

    axum::serve(listener, app).await?;
    Ok(())
}

// ── Handlers ─────────────────────────────────────────────────────────────────

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
