use chrono::NaiveDate;
use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;

use crate::chatbase::{DEFAULT_BASE_URL, DEFAULT_MODEL};

/// Prefix of layered environment overrides, e.g. `WORLD_HELPER__SERVER__PORT`.
const ENV_PREFIX: &str = "WORLD_HELPER";

/// Config file picked up from the working directory when none is given.
const CWD_CONFIG: &str = "config.yaml";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<String>,

    /// Port to listen on
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Chatbase API base URL
    #[arg(long, env = "CHATBASE_BASE_URL")]
    pub base_url: Option<String>,

    /// Chatbase API key, used for both chat and history requests
    #[arg(long, env = "CHATBASE_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Chatbase bot identifier
    #[arg(long, env = "CHATBASE_BOT_ID")]
    pub chatbot_id: Option<String>,

    /// Emit logs as JSON
    #[arg(long, env = "LOG_JSON")]
    pub log_json: Option<bool>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub chatbase: ChatbaseConfig,
    pub history: HistoryConfig,
    pub widget: WidgetConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub log_json: bool,
}

#[derive(Deserialize, Clone)]
pub struct ChatbaseConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    pub chatbot_id: String,
    pub model: String,
    pub temperature: f32,
}

impl std::fmt::Debug for ChatbaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatbaseConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("chatbot_id", &self.chatbot_id)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .finish()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HistoryConfig {
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    pub page: u32,
    pub size: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WidgetConfig {
    pub greeting: String,
    pub notice_ms: u64,
    pub idle_timeout_secs: u64,
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from_args(std::env::args())
    }

    pub fn load_from_args<I, T>(args: I) -> Result<Self, config::ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli =
            Cli::try_parse_from(args).map_err(|e| config::ConfigError::Message(e.to_string()))?;

        let mut builder = Config::builder();

        // 1. Defaults
        builder = builder
            .set_default("server.port", 3000)?
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.log_json", false)?
            .set_default("chatbase.base_url", DEFAULT_BASE_URL)?
            .set_default("chatbase.chatbot_id", "")?
            .set_default("chatbase.model", DEFAULT_MODEL)?
            .set_default("chatbase.temperature", 0.0)?
            .set_default("history.page", 1)?
            .set_default("history.size", 10)?
            .set_default("widget.greeting", "Hello! How can I help you?")?
            .set_default("widget.notice_ms", 2000)?
            .set_default("widget.idle_timeout_secs", 30 * 60)?;

        // 2. Config file: explicit path, else ./config.yaml if present
        if let Some(path) = &cli.config {
            builder = builder.add_source(File::with_name(path));
        } else if Path::new(CWD_CONFIG).exists() {
            builder = builder.add_source(File::with_name(CWD_CONFIG));
        }

        // 3. Prefixed environment variables
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        // 4. CLI flags (and the env vars clap reads for them)
        if let Some(port) = cli.port {
            builder = builder.set_override("server.port", port)?;
        }
        if let Some(log_json) = cli.log_json {
            builder = builder.set_override("server.log_json", log_json)?;
        }
        if let Some(url) = cli.base_url {
            builder = builder.set_override("chatbase.base_url", url)?;
        }
        if let Some(key) = cli.api_key {
            builder = builder.set_override("chatbase.api_key", key)?;
        }
        if let Some(id) = cli.chatbot_id {
            builder = builder.set_override("chatbase.chatbot_id", id)?;
        }

        let cfg = builder.build()?;
        cfg.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_flags_override_defaults() {
        let config = AppConfig::load_from_args([
            "world-helper",
            "--port",
            "4100",
            "--chatbot-id",
            "bot-from-cli",
        ])
        .unwrap();
        assert_eq!(config.server.port, 4100);
        assert_eq!(config.chatbase.chatbot_id, "bot-from-cli");
    }

    #[test]
    fn test_unknown_flag_is_an_error() {
        let err = AppConfig::load_from_args(["world-helper", "--nope"]).unwrap_err();
        assert!(matches!(err, config::ConfigError::Message(_)));
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = AppConfig::load_from_args(["world-helper", "--api-key", "sk-hidden"]).unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-hidden"));
    }
}
