//! World Helper
//!
//! A chat widget that streams replies from a Chatbase chatbot into a
//! server-rendered page, with a history panel of past conversations and
//! copy helpers for links and replies.
//!
//! # Architecture
//!
//! - **Server**: Axum-based HTTP server with SSE streaming
//! - **Chatbase**: Streaming chat client and conversation listing client
//! - **Widget**: Per-page-load conversation, view state and notifications
//! - **Page**: HTML rendering of a widget snapshot
//!
//! # Modules
//!
//! - [`chatbase`]: Chatbase API clients and wire types
//! - [`config`]: Layered configuration
//! - [`markdown`]: Rendering of bot replies
//! - [`widget`]: Widget controller and store
//! - [`server`]: Router and handlers

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::implicit_hasher)]
#![allow(clippy::assigning_clones)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::cargo_common_metadata)]
#![allow(clippy::multiple_crate_versions)]
#![allow(clippy::default_trait_access)]
#![allow(clippy::unused_async)]

pub mod chatbase;
pub mod config;
pub mod markdown;
pub mod page;
pub mod server;
pub mod widget;

use std::sync::Arc;
use std::time::Duration;

use crate::chatbase::{ChatClient, ChatbaseError, ChatbaseSettings, ConversationQuery, HistoryClient};
use crate::config::AppConfig;
use crate::widget::{WidgetContext, WidgetStore};

/// Application state shared across all handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Live widgets, one per page load.
    pub widgets: WidgetStore,
}

/// Build the Chatbase clients and widget settings from configuration.
///
/// # Errors
///
/// Fails when the chatbot id is missing or the base URL does not parse.
pub fn widget_context(config: &AppConfig) -> Result<WidgetContext, ChatbaseError> {
    let settings = ChatbaseSettings::from_config(config)?;
    let history_query = ConversationQuery::from_config(&settings, &config.history);

    Ok(WidgetContext::new(
        Arc::new(ChatClient::new(settings.clone())),
        Arc::new(HistoryClient::new(settings)),
        history_query,
    )
    .with_greeting(config.widget.greeting.clone())
    .with_notice_ttl(Duration::from_millis(config.widget.notice_ms)))
}
