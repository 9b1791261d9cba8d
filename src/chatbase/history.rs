//! Chatbase conversation listing client.

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};

use super::{ChatbaseError, ChatbaseSettings};
use crate::config::HistoryConfig;

const CONVERSATIONS_PATH: &str = "api/v1/get-conversations";

/// Number of messages shown per conversation in the history panel.
const PREVIEW_MESSAGES: usize = 2;

/// Characters kept from each previewed message.
const PREVIEW_CHARS: usize = 100;

/// A message inside a stored conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: String,
    pub content: String,
}

/// A conversation as returned by the listing endpoint. Read-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub id: String,
    pub created_at: String,
    #[serde(default)]
    pub messages: Vec<ConversationMessage>,
    pub chatbot_id: String,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub source: String,
}

/// Envelope of the listing endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationsResponse {
    pub data: Vec<ConversationRecord>,
}

/// Query parameters of the listing endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationQuery {
    pub chatbot_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    pub page: u32,
    pub size: u32,
}

impl ConversationQuery {
    /// First page of ten conversations, no date range.
    #[must_use]
    pub fn new(chatbot_id: impl Into<String>) -> Self {
        Self {
            chatbot_id: chatbot_id.into(),
            start_date: None,
            end_date: None,
            page: 1,
            size: 10,
        }
    }

    /// Query for the configured bot using the `history` config section.
    #[must_use]
    pub fn from_config(settings: &ChatbaseSettings, history: &HistoryConfig) -> Self {
        Self {
            chatbot_id: settings.chatbot_id.clone(),
            start_date: history.start_date,
            end_date: history.end_date,
            page: history.page,
            size: history.size,
        }
    }
}

/// Source of past conversations.
#[async_trait::async_trait]
pub trait HistorySource: Send + Sync {
    /// Fetch one page of conversations.
    async fn fetch(&self, query: &ConversationQuery) -> Result<ConversationsResponse, ChatbaseError>;
}

/// Client for the conversation listing endpoint.
#[derive(Debug, Clone)]
pub struct HistoryClient {
    http: reqwest::Client,
    settings: ChatbaseSettings,
}

impl HistoryClient {
    #[must_use]
    pub fn new(settings: ChatbaseSettings) -> Self {
        Self::with_client(settings, reqwest::Client::new())
    }

    #[must_use]
    pub fn with_client(settings: ChatbaseSettings, http: reqwest::Client) -> Self {
        Self { http, settings }
    }
}

#[async_trait::async_trait]
impl HistorySource for HistoryClient {
    async fn fetch(&self, query: &ConversationQuery) -> Result<ConversationsResponse, ChatbaseError> {
        let url = self.settings.endpoint(CONVERSATIONS_PATH)?;

        let mut rb = self.http.get(url).query(query);
        if let Some(k) = &self.settings.api_key {
            rb = rb.bearer_auth(k);
        }

        let resp = rb.send().await?;
        if !resp.status().is_success() {
            return Err(ChatbaseError::from_response(resp).await);
        }

        let bytes = resp.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Condensed form of a conversation for the history panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationPreview {
    pub id: String,
    /// Creation date, or the raw timestamp when it does not parse.
    pub date: String,
    pub source: String,
    pub messages: Vec<ConversationMessage>,
    /// Messages not shown in the preview.
    pub more: usize,
}

impl ConversationRecord {
    /// Build the panel preview: first two messages, each cut to 100 chars.
    #[must_use]
    pub fn preview(&self) -> ConversationPreview {
        let messages = self
            .messages
            .iter()
            .take(PREVIEW_MESSAGES)
            .map(|m| ConversationMessage {
                role: m.role.clone(),
                content: truncate_chars(&m.content, PREVIEW_CHARS),
            })
            .collect();

        ConversationPreview {
            id: self.id.clone(),
            date: display_date(&self.created_at),
            source: self.source.clone(),
            messages,
            more: self.messages.len().saturating_sub(PREVIEW_MESSAGES),
        }
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

fn display_date(created_at: &str) -> String {
    DateTime::parse_from_rfc3339(created_at)
        .map(|dt| dt.date_naive().to_string())
        .unwrap_or_else(|_| created_at.to_string())
}
