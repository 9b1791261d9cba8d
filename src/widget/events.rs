//! Events emitted while a reply streams in.
//!
//! A submitted message produces one exchange, reported to the page as a
//! sequence of [`WidgetEvent`]s:
//! - `stream.start` once the request is under way
//! - `message.partial` after every received chunk, carrying the full text so far
//!   and its rendered HTML
//! - `message.appended` when the reply (or the fallback) joins the conversation
//! - `error` when the request failed
//! - `done` last, once the widget accepts input again
//!
//! # Example
//!
//! ```rust
//! use world_helper::widget::events::{WidgetEvent, sse_event};
//!
//! let event = WidgetEvent::Partial {
//!     delta: "lo!".to_string(),
//!     text: "Hello!".to_string(),
//!     html: "<p>Hello!</p>\n".to_string(),
//! };
//! let sse = sse_event(&event);
//! assert!(sse.contains("message.partial"));
//! ```

use serde::{Deserialize, Serialize};

use super::Message;

/// Progress of one exchange.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data")]
pub enum WidgetEvent {
    /// The request was accepted and is being sent.
    #[serde(rename = "stream.start")]
    StreamStart {
        /// Unique identifier for this request/response pair.
        request_id: String,
    },

    /// A chunk arrived.
    #[serde(rename = "message.partial")]
    Partial {
        /// The chunk just received.
        delta: String,
        /// Everything received so far.
        text: String,
        /// `text` rendered as HTML.
        html: String,
    },

    /// A bot message was appended to the conversation.
    #[serde(rename = "message.appended")]
    MessageAppended {
        /// Position of the message in the conversation.
        index: usize,
        message: Message,
    },

    /// The request failed; a fallback message was appended instead.
    #[serde(rename = "error")]
    Error {
        /// Error message.
        message: String,
    },

    /// The exchange is over.
    #[serde(rename = "done")]
    Done,
}

/// Convert a [`WidgetEvent`] to an SSE-formatted string.
///
/// The output carries both an `event:` line (for `EventSource` listeners)
/// and a `data:` line with the JSON payload.
pub fn sse_event(evt: &WidgetEvent) -> String {
    let json = serde_json::to_string(evt).unwrap_or_else(|e| {
        serde_json::json!({ "type": "error", "data": { "message": e.to_string() } }).to_string()
    });

    let event_name = event_name(evt);

    format!("event: {event_name}\ndata: {json}\n\n")
}

/// Get the SSE event name for a [`WidgetEvent`].
pub fn event_name(evt: &WidgetEvent) -> &'static str {
    match evt {
        WidgetEvent::StreamStart { .. } => "stream.start",
        WidgetEvent::Partial { .. } => "message.partial",
        WidgetEvent::MessageAppended { .. } => "message.appended",
        WidgetEvent::Error { .. } => "error",
        WidgetEvent::Done => "done",
    }
}
