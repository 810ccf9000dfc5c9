use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::message::{
    normalize_reaction_token, Reactions, DEFAULT_FAILED_REACTION, DEFAULT_LOADING_REACTION,
    DEFAULT_SUCCESS_REACTION,
};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub slack: SlackConfig,
    pub reactions: Reactions,
    pub listen: ListenConfig,
    pub socket: SocketConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct SlackConfig {
    pub app_token: SecretString,
    pub bot_token: SecretString,
    pub bot_user_id: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ListenConfig {
    pub direct_message: bool,
    pub mention: bool,
    pub command: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SocketConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub health_check_port: u16,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub slack_app_token: Option<String>,
    pub slack_bot_token: Option<String>,
    pub slack_bot_user_id: Option<String>,
    pub reaction_loading: Option<String>,
    pub reaction_success: Option<String>,
    pub reaction_failed: Option<String>,
    pub listen_direct_message: Option<bool>,
    pub listen_mention: Option<bool>,
    pub listen_command: Option<bool>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            slack: SlackConfig {
                app_token: String::new().into(),
                bot_token: String::new().into(),
                bot_user_id: String::new(),
            },
            reactions: Reactions::default(),
            listen: ListenConfig { direct_message: true, mention: true, command: false },
            socket: SocketConfig { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                health_check_port: 8080,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("relaybot.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(slack) = patch.slack {
            if let Some(slack_app_token_value) = slack.app_token {
                self.slack.app_token = secret_value(slack_app_token_value);
            }
            if let Some(slack_bot_token_value) = slack.bot_token {
                self.slack.bot_token = secret_value(slack_bot_token_value);
            }
            if let Some(bot_user_id) = slack.bot_user_id {
                self.slack.bot_user_id = bot_user_id;
            }
        }

        if let Some(reactions) = patch.reactions {
            if let Some(loading) = reactions.loading {
                self.reactions.loading = normalize_reaction_token(&loading);
            }
            if let Some(success) = reactions.success {
                self.reactions.success = normalize_reaction_token(&success);
            }
            if let Some(failed) = reactions.failed {
                self.reactions.failed = normalize_reaction_token(&failed);
            }
        }

        if let Some(listen) = patch.listen {
            if let Some(direct_message) = listen.direct_message {
                self.listen.direct_message = direct_message;
            }
            if let Some(mention) = listen.mention {
                self.listen.mention = mention;
            }
            if let Some(command) = listen.command {
                self.listen.command = command;
            }
        }

        if let Some(socket) = patch.socket {
            if let Some(max_retries) = socket.max_retries {
                self.socket.max_retries = max_retries;
            }
            if let Some(base_delay_ms) = socket.base_delay_ms {
                self.socket.base_delay_ms = base_delay_ms;
            }
            if let Some(max_delay_ms) = socket.max_delay_ms {
                self.socket.max_delay_ms = max_delay_ms;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(health_check_port) = server.health_check_port {
                self.server.health_check_port = health_check_port;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("RELAYBOT_SLACK_APP_TOKEN") {
            self.slack.app_token = secret_value(value);
        }
        if let Some(value) = read_env("RELAYBOT_SLACK_BOT_TOKEN") {
            self.slack.bot_token = secret_value(value);
        }
        if let Some(value) = read_env("RELAYBOT_SLACK_BOT_USER_ID") {
            self.slack.bot_user_id = value;
        }

        if let Some(value) = read_env("RELAYBOT_REACTION_LOADING") {
            self.reactions.loading = normalize_reaction_token(&value);
        }
        if let Some(value) = read_env("RELAYBOT_REACTION_SUCCESS") {
            self.reactions.success = normalize_reaction_token(&value);
        }
        if let Some(value) = read_env("RELAYBOT_REACTION_FAILED") {
            self.reactions.failed = normalize_reaction_token(&value);
        }

        if let Some(value) = read_env("RELAYBOT_LISTEN_DIRECT_MESSAGE") {
            self.listen.direct_message = parse_bool("RELAYBOT_LISTEN_DIRECT_MESSAGE", &value)?;
        }
        if let Some(value) = read_env("RELAYBOT_LISTEN_MENTION") {
            self.listen.mention = parse_bool("RELAYBOT_LISTEN_MENTION", &value)?;
        }
        if let Some(value) = read_env("RELAYBOT_LISTEN_COMMAND") {
            self.listen.command = parse_bool("RELAYBOT_LISTEN_COMMAND", &value)?;
        }

        if let Some(value) = read_env("RELAYBOT_SOCKET_MAX_RETRIES") {
            self.socket.max_retries = parse_u32("RELAYBOT_SOCKET_MAX_RETRIES", &value)?;
        }
        if let Some(value) = read_env("RELAYBOT_SOCKET_BASE_DELAY_MS") {
            self.socket.base_delay_ms = parse_u64("RELAYBOT_SOCKET_BASE_DELAY_MS", &value)?;
        }
        if let Some(value) = read_env("RELAYBOT_SOCKET_MAX_DELAY_MS") {
            self.socket.max_delay_ms = parse_u64("RELAYBOT_SOCKET_MAX_DELAY_MS", &value)?;
        }

        if let Some(value) = read_env("RELAYBOT_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("RELAYBOT_SERVER_HEALTH_CHECK_PORT") {
            self.server.health_check_port =
                parse_u16("RELAYBOT_SERVER_HEALTH_CHECK_PORT", &value)?;
        }

        let log_level =
            read_env("RELAYBOT_LOGGING_LEVEL").or_else(|| read_env("RELAYBOT_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("RELAYBOT_LOGGING_FORMAT").or_else(|| read_env("RELAYBOT_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(slack_app_token) = overrides.slack_app_token {
            self.slack.app_token = secret_value(slack_app_token);
        }
        if let Some(slack_bot_token) = overrides.slack_bot_token {
            self.slack.bot_token = secret_value(slack_bot_token);
        }
        if let Some(bot_user_id) = overrides.slack_bot_user_id {
            self.slack.bot_user_id = bot_user_id;
        }

        if let Some(loading) = overrides.reaction_loading {
            self.reactions.loading = normalize_reaction_token(&loading);
        }
        if let Some(success) = overrides.reaction_success {
            self.reactions.success = normalize_reaction_token(&success);
        }
        if let Some(failed) = overrides.reaction_failed {
            self.reactions.failed = normalize_reaction_token(&failed);
        }

        if let Some(direct_message) = overrides.listen_direct_message {
            self.listen.direct_message = direct_message;
        }
        if let Some(mention) = overrides.listen_mention {
            self.listen.mention = mention;
        }
        if let Some(command) = overrides.listen_command {
            self.listen.command = command;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_slack(&self.slack)?;
        validate_reactions(&self.reactions)?;
        validate_listen(&self.listen)?;
        validate_socket(&self.socket)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

/// Reaction defaults, for config reporting.
pub fn default_reaction(step: &str) -> Option<&'static str> {
    match step {
        "loading" => Some(DEFAULT_LOADING_REACTION),
        "success" => Some(DEFAULT_SUCCESS_REACTION),
        "failed" => Some(DEFAULT_FAILED_REACTION),
        _ => None,
    }
}

pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("relaybot.toml"), PathBuf::from("config/relaybot.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_slack(slack: &SlackConfig) -> Result<(), ConfigError> {
    let app_token = slack.app_token.expose_secret();
    if app_token.is_empty() {
        return Err(ConfigError::Validation(
            "slack.app_token is required. Get it from https://api.slack.com/apps > Your App > Basic Information > App-Level Tokens".to_string()
        ));
    }
    if !app_token.starts_with("xapp-") {
        let hint = if app_token.starts_with("xoxb-") {
            " (hint: you may have used the bot token instead of the app token)"
        } else {
            ""
        };
        return Err(ConfigError::Validation(format!(
            "slack.app_token must start with `xapp-`{hint}. Get it from https://api.slack.com/apps"
        )));
    }

    let bot_token = slack.bot_token.expose_secret();
    if bot_token.is_empty() {
        return Err(ConfigError::Validation(
            "slack.bot_token is required. Get it from https://api.slack.com/apps > Your App > OAuth & Permissions > Bot User OAuth Token".to_string()
        ));
    }
    if !bot_token.starts_with("xoxb-") {
        let hint = if bot_token.starts_with("xapp-") {
            " (hint: you may have used the app token instead of the bot token)"
        } else {
            ""
        };
        return Err(ConfigError::Validation(format!(
            "slack.bot_token must start with `xoxb-`{hint}. Get it from https://api.slack.com/apps"
        )));
    }

    let bot_user_id = slack.bot_user_id.trim();
    if bot_user_id.is_empty() {
        return Err(ConfigError::Validation(
            "slack.bot_user_id is required to recognise mentions (the `U...` id returned by auth.test)"
                .to_string(),
        ));
    }
    if bot_user_id.starts_with("<@") || bot_user_id.chars().any(char::is_whitespace) {
        return Err(ConfigError::Validation(format!(
            "slack.bot_user_id must be a bare user id such as `U012ABCDEF`, got `{bot_user_id}`"
        )));
    }

    Ok(())
}

fn validate_reactions(reactions: &Reactions) -> Result<(), ConfigError> {
    let configured = [
        ("reactions.loading", &reactions.loading),
        ("reactions.success", &reactions.success),
        ("reactions.failed", &reactions.failed),
    ];
    for (key, value) in configured {
        let Some(name) = value else {
            continue;
        };
        let valid = name.chars().all(|ch| ch.is_ascii_alphanumeric() || "_-+'".contains(ch));
        if !valid {
            return Err(ConfigError::Validation(format!(
                "{key} must be an emoji name such as `thinking_face`, got `{name}`"
            )));
        }
    }
    Ok(())
}

fn validate_listen(listen: &ListenConfig) -> Result<(), ConfigError> {
    if !listen.direct_message && !listen.mention {
        return Err(ConfigError::Validation(
            "at least one of listen.direct_message or listen.mention must be enabled".to_string(),
        ));
    }
    Ok(())
}

fn validate_socket(socket: &SocketConfig) -> Result<(), ConfigError> {
    if socket.base_delay_ms > socket.max_delay_ms {
        return Err(ConfigError::Validation(
            "socket.base_delay_ms must not exceed socket.max_delay_ms".to_string(),
        ));
    }
    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.health_check_port == 0 {
        return Err(ConfigError::Validation(
            "server.health_check_port must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    slack: Option<SlackPatch>,
    reactions: Option<ReactionsPatch>,
    listen: Option<ListenPatch>,
    socket: Option<SocketPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct SlackPatch {
    app_token: Option<String>,
    bot_token: Option<String>,
    bot_user_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ReactionsPatch {
    loading: Option<String>,
    success: Option<String>,
    failed: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ListenPatch {
    direct_message: Option<bool>,
    mention: Option<bool>,
    command: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct SocketPatch {
    max_retries: Option<u32>,
    base_delay_ms: Option<u64>,
    max_delay_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    health_check_port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
