//! Chatbase API clients.
//!
//! This module provides thin HTTP clients for the two hosted endpoints the
//! widget talks to: the streaming chat endpoint and the conversation listing
//! endpoint. Both are reached through traits so the widget can be driven by
//! canned fakes in tests.
//!
//! # Clients
//!
//! - [`ChatClient`]: `POST /api/v1/chat` with a streamed plain-text body
//! - [`HistoryClient`]: `GET /api/v1/get-conversations`
//!
//! # Example
//!
//! ```rust,ignore
//! use world_helper::chatbase::{ChatBackend, ChatClient, ChatbaseSettings};
//!
//! let settings = ChatbaseSettings::new("https://www.chatbase.co", "bot-id")?;
//! let client = ChatClient::new(settings);
//! let mut chunks = client.stream(messages).await?;
//! ```

pub mod chat;
pub mod decode;
pub mod error;
pub mod history;

pub use chat::ChatClient;
pub use error::ChatbaseError;
pub use history::{
    ConversationMessage, ConversationPreview, ConversationQuery, ConversationRecord,
    ConversationsResponse, HistoryClient, HistorySource,
};

use std::pin::Pin;

use futures::Stream;
use url::Url;

use crate::config::AppConfig;

/// Model requested when none is configured.
pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet";

/// Base URL of the hosted API.
pub const DEFAULT_BASE_URL: &str = "https://www.chatbase.co";

/// Connection settings shared by the chat and history clients.
///
/// Both endpoints authenticate with the same bearer token and address the
/// same bot, so there is exactly one place credentials come from.
#[derive(Clone)]
pub struct ChatbaseSettings {
    /// Base URL of the API (e.g., `https://www.chatbase.co`).
    pub base_url: Url,
    /// Bearer token. Requests are sent unauthenticated when absent.
    pub api_key: Option<String>,
    /// Identifier of the bot both endpoints address.
    pub chatbot_id: String,
    /// Model identifier sent with chat requests.
    pub model: String,
    /// Sampling temperature sent with chat requests.
    pub temperature: f32,
}

impl std::fmt::Debug for ChatbaseSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatbaseSettings")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("chatbot_id", &self.chatbot_id)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .finish()
    }
}

impl ChatbaseSettings {
    /// Create settings with default model and temperature.
    pub fn new(base_url: &str, chatbot_id: impl Into<String>) -> Result<Self, ChatbaseError> {
        let chatbot_id = chatbot_id.into();
        if chatbot_id.trim().is_empty() {
            return Err(ChatbaseError::Config("chatbot id cannot be empty".to_string()));
        }

        let mut base_url = Url::parse(base_url)?;
        // Endpoint paths are relative, so a path prefix must end in '/' to survive the join.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            base_url,
            api_key: None,
            chatbot_id,
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.0,
        })
    }

    /// Set the bearer token.
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Build settings from the loaded application configuration.
    pub fn from_config(config: &AppConfig) -> Result<Self, ChatbaseError> {
        let mut settings = Self::new(&config.chatbase.base_url, config.chatbase.chatbot_id.clone())?;
        settings.api_key = config
            .chatbase
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty());
        if !config.chatbase.model.trim().is_empty() {
            settings.model.clone_from(&config.chatbase.model);
        }
        settings.temperature = config.chatbase.temperature;
        Ok(settings)
    }

    /// Resolve a relative API path against the base URL.
    pub(crate) fn endpoint(&self, path: &str) -> Result<Url, ChatbaseError> {
        Ok(self.base_url.join(path)?)
    }
}

/// Role of a message in the chat request schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiRole {
    /// Message typed by the user.
    User,
    /// Reply produced by the bot.
    Assistant,
}

/// A message as the chat endpoint expects it.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ApiMessage {
    pub role: ApiRole,
    pub content: String,
}

impl ApiMessage {
    /// Create a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ApiRole::User,
            content: content.into(),
        }
    }

    /// Create an assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ApiRole::Assistant,
            content: content.into(),
        }
    }
}

/// Lazy, finite sequence of decoded text chunks from one chat response.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, ChatbaseError>> + Send>>;

/// Trait for streaming chat backends.
///
/// Implementations send the whole conversation and return the reply as a
/// stream of text chunks in arrival order. Chunks carry no framing; callers
/// concatenate them verbatim.
#[async_trait::async_trait]
pub trait ChatBackend: Send + Sync {
    /// Start a streamed reply for the given conversation.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be sent or the endpoint answers
    /// with a non-success status.
    async fn stream(&self, messages: Vec<ApiMessage>) -> Result<TextStream, ChatbaseError>;
}
