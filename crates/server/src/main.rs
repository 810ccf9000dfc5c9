mod bootstrap;
mod health;

use std::sync::Arc;

use anyhow::Result;
use relaybot_core::config::{AppConfig, LoadOptions};

fn init_logging(config: &AppConfig) {
    use relaybot_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config)?;
    let bot = Arc::new(app.bot);

    health::spawn(&app.config.server.bind_address, app.config.server.health_check_port, bot.clone())
        .await?;

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        "relaybot-server started"
    );

    tokio::select! {
        result = bot.listen(app.listen) => {
            result?;
            tracing::info!(
                event_name = "system.server.session_ended",
                correlation_id = "shutdown",
                "slack session ended"
            );
        }
        signal = tokio::signal::ctrl_c() => {
            signal?;
            tracing::info!(
                event_name = "system.server.stopping",
                correlation_id = "shutdown",
                "relaybot-server stopping"
            );
        }
    }

    Ok(())
}
