use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use relaybot_slack::SlackBot;
use serde::Serialize;
use tracing::{error, info};

#[derive(Clone)]
pub struct HealthState {
    bot: Arc<SlackBot>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub handler: HealthCheck,
    pub checked_at: String,
}

pub fn router(bot: Arc<SlackBot>) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { bot })
}

pub async fn spawn(bind_address: &str, port: u16, bot: Arc<SlackBot>) -> std::io::Result<()> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(
        event_name = "system.health.start",
        correlation_id = "bootstrap",
        bind_address = %address,
        "health endpoint started"
    );

    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, router(bot)).await {
            error!(
                event_name = "system.health.error",
                correlation_id = "bootstrap",
                error = %error,
                "health endpoint server terminated unexpectedly"
            );
        }
    });

    Ok(())
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let handler = handler_check(&state.bot);
    let ready = handler.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "relaybot-server runtime initialized".to_string(),
        },
        handler,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

fn handler_check(bot: &SlackBot) -> HealthCheck {
    if bot.has_handler() {
        HealthCheck { status: "ready", detail: "message handler registered".to_string() }
    } else {
        HealthCheck { status: "degraded", detail: "no message handler registered".to_string() }
    }
}
