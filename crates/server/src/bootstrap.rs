use relaybot_core::config::{AppConfig, ConfigError};
use relaybot_core::{BlockKind, DataType, IncomingMessage, MessageData};
use relaybot_slack::{CommandHook, ListenOptions, SlackBot};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub bot: SlackBot,
    pub listen: ListenOptions,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", correlation_id = "bootstrap", "starting application bootstrap");
    config.validate()?;

    let bot = SlackBot::from_config(&config);
    bot.register_handler(echo_hook());
    let listen = ListenOptions::from(&config.listen);

    info!(
        event_name = "system.bootstrap.bot_ready",
        correlation_id = "bootstrap",
        bot_user_id = %config.slack.bot_user_id,
        direct_message = listen.direct_message,
        mention = listen.mention,
        "slack bot configured"
    );

    Ok(Application { config, bot, listen })
}

/// Replies in-thread with the cleaned message text rendered from markdown.
pub fn echo_hook() -> CommandHook {
    CommandHook::reply(DataType::Markdown, |message: IncomingMessage| async move {
        if message.message.is_empty() {
            return anyhow::Ok(None);
        }
        anyhow::Ok(Some(MessageData::Text(message.message)))
    })
    .with_block(BlockKind::Section)
}

#[cfg(test)]
mod tests {
    use relaybot_core::config::{AppConfig, ConfigOverrides, LoadOptions};
    use relaybot_core::{BlockKind, DataType, IncomingMessage, MessageData};

    use crate::bootstrap::{bootstrap_with_config, echo_hook, BootstrapError};

    fn message(text: &str) -> IncomingMessage {
        IncomingMessage {
            message_id: "1700000000.000100".to_string(),
            channel_id: "C1".to_string(),
            thread_id: None,
            raw: format!("<@UBOT> {text}"),
            message: text.to_string(),
        }
    }

    fn valid_config() -> AppConfig {
        AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                slack_app_token: Some("xapp-1-test".to_string()),
                slack_bot_token: Some("xoxb-test".to_string()),
                slack_bot_user_id: Some("UBOT".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .expect("overrides should produce a valid config")
    }

    #[test]
    fn bootstrap_fails_fast_without_required_slack_tokens() {
        let result = bootstrap_with_config(AppConfig::default());

        let error = result.err().expect("error");
        assert!(matches!(error, BootstrapError::Config(_)));
        assert!(error.to_string().contains("slack.app_token"));
    }

    #[test]
    fn bootstrap_registers_the_echo_hook() {
        let app = bootstrap_with_config(valid_config()).expect("bootstrap should succeed");

        assert!(app.bot.has_handler());
        assert!(app.listen.direct_message);
        assert!(app.listen.mention);
        assert!(!app.listen.command);
    }

    #[tokio::test]
    async fn echo_hook_replies_with_markdown_section() {
        let hook = echo_hook();
        assert!(hook.is_sync());
        assert_eq!(hook.data_type, DataType::Markdown);
        assert_eq!(hook.block, Some(BlockKind::Section));

        let reply = hook.handler.handle(message("**deploy** done")).await.expect("echo succeeds");
        assert_eq!(reply, Some(MessageData::Text("**deploy** done".to_string())));

        let empty = hook.handler.handle(message("")).await.expect("echo succeeds");
        assert_eq!(empty, None);
    }
}
