//! Chatbase chat endpoint client.
//!
//! This module implements the [`ChatBackend`] trait for `POST /api/v1/chat`
//! with streaming enabled. The response body is plain text with no framing,
//! so every received chunk is decoded and handed on as-is.

use futures::StreamExt;
use serde::Serialize;

use super::decode::Utf8ChunkDecoder;
use super::{ApiMessage, ChatBackend, ChatbaseError, ChatbaseSettings, TextStream};

const CHAT_PATH: &str = "api/v1/chat";

/// Request body of the chat endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatRequestBody<'a> {
    messages: &'a [ApiMessage],
    chatbot_id: &'a str,
    stream: bool,
    temperature: f32,
    model: &'a str,
}

/// Client for the streaming chat endpoint.
#[derive(Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    settings: ChatbaseSettings,
}

impl std::fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient")
            .field("settings", &self.settings)
            .finish()
    }
}

impl ChatClient {
    /// Create a new chat client with the given settings.
    #[must_use]
    pub fn new(settings: ChatbaseSettings) -> Self {
        Self::with_client(settings, reqwest::Client::new())
    }

    /// Create a chat client with a custom reqwest client.
    #[must_use]
    pub fn with_client(settings: ChatbaseSettings, http: reqwest::Client) -> Self {
        Self { http, settings }
    }
}

#[async_trait::async_trait]
impl ChatBackend for ChatClient {
    async fn stream(&self, messages: Vec<ApiMessage>) -> Result<TextStream, ChatbaseError> {
        let url = self.settings.endpoint(CHAT_PATH)?;

        let body = ChatRequestBody {
            messages: &messages,
            chatbot_id: &self.settings.chatbot_id,
            stream: true,
            temperature: self.settings.temperature,
            model: &self.settings.model,
        };

        tracing::debug!(
            name: "chatbase.chat.request",
            url = %url,
            message_count = messages.len(),
            model = %self.settings.model,
            "Sending chat request"
        );

        let mut rb = self.http.post(url).json(&body);
        if let Some(k) = &self.settings.api_key {
            rb = rb.bearer_auth(k);
        }

        let resp = rb.send().await?;
        if !resp.status().is_success() {
            return Err(ChatbaseError::from_response(resp).await);
        }
        let byte_stream = resp.bytes_stream();

        let out = async_stream::try_stream! {
            let mut decoder = Utf8ChunkDecoder::new();

            futures::pin_mut!(byte_stream);
            while let Some(chunk) = byte_stream.next().await {
                let chunk = chunk?;
                let text = decoder.decode(&chunk);
                if !text.is_empty() {
                    yield text;
                }
            }

            let rest = decoder.finish();
            if !rest.is_empty() {
                yield rest;
            }
        };

        Ok(Box::pin(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let messages = vec![ApiMessage::assistant("Hello!"), ApiMessage::user("hi")];
        let body = ChatRequestBody {
            messages: &messages,
            chatbot_id: "bot-1",
            stream: true,
            temperature: 0.0,
            model: "claude-3-5-sonnet",
        };

        let v = serde_json::to_value(&body).unwrap();
        assert_eq!(v["chatbotId"], "bot-1");
        assert_eq!(v["stream"], true);
        assert_eq!(v["temperature"], 0.0);
        assert_eq!(v["model"], "claude-3-5-sonnet");
        assert_eq!(v["messages"][0]["role"], "assistant");
        assert_eq!(v["messages"][1]["content"], "hi");
    }
}
