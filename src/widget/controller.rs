//! The widget controller.

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt};
use serde::Serialize;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::clipboard::{LINK_COPIED, LINK_COPY_FAILED};
use super::notice::{DEFAULT_NOTICE_TTL, Transient};
use super::{
    Clipboard, Conversation, Message, Sender, ViewAction, ViewState, WidgetError, WidgetEvent,
    read_lock, strip_markdown, write_lock,
};
use crate::chatbase::{
    ApiMessage, ChatBackend, ConversationPreview, ConversationQuery, ConversationRecord,
    HistorySource,
};
use crate::markdown::render_markdown;

/// Bot message appended when a reply could not be fetched.
pub const FALLBACK_REPLY: &str = "Sorry, I encountered an error. Please try again.";

/// Shown in the history panel when the listing request failed.
pub const HISTORY_ERROR: &str = "Failed to load conversations";

/// Greeting a new widget opens with unless configured otherwise.
pub const DEFAULT_GREETING: &str = "Hello! How can I help you?";

/// Events of one exchange, produced lazily as the reply streams in.
pub type ExchangeStream = Pin<Box<dyn Stream<Item = WidgetEvent> + Send>>;

/// Load state of the history panel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum HistoryState {
    #[default]
    Idle,
    Loading,
    Loaded {
        conversations: Vec<ConversationRecord>,
    },
    Failed {
        error: String,
    },
}

impl HistoryState {
    /// Panel previews of the loaded conversations.
    #[must_use]
    pub fn previews(&self) -> Vec<ConversationPreview> {
        match self {
            Self::Loaded { conversations } => {
                conversations.iter().map(ConversationRecord::preview).collect()
            }
            _ => Vec::new(),
        }
    }
}

/// Result of copying a link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CopyOutcome {
    /// Text placed on the clipboard, if the write succeeded.
    pub text: Option<String>,
    /// Notification shown to the user.
    pub notice: &'static str,
}

/// Serializable view of a widget.
#[derive(Debug, Clone, Serialize)]
pub struct WidgetSnapshot {
    pub id: String,
    pub messages: Vec<Message>,
    pub streaming_text: String,
    pub busy: bool,
    pub view: ViewState,
    pub backdrop: bool,
    pub history: HistoryState,
    pub link_notice: Option<String>,
    pub copied_message: Option<usize>,
}

/// Collaborators and settings shared by every widget.
#[derive(Clone)]
pub struct WidgetContext {
    pub chat: Arc<dyn ChatBackend>,
    pub history: Arc<dyn HistorySource>,
    pub history_query: ConversationQuery,
    pub greeting: String,
    pub notice_ttl: Duration,
}

impl std::fmt::Debug for WidgetContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WidgetContext")
            .field("history_query", &self.history_query)
            .field("greeting", &self.greeting)
            .field("notice_ttl", &self.notice_ttl)
            .finish()
    }
}

impl WidgetContext {
    /// Create a context with the default greeting and notice lifetime.
    #[must_use]
    pub fn new(
        chat: Arc<dyn ChatBackend>,
        history: Arc<dyn HistorySource>,
        history_query: ConversationQuery,
    ) -> Self {
        Self {
            chat,
            history,
            history_query,
            greeting: DEFAULT_GREETING.to_string(),
            notice_ttl: DEFAULT_NOTICE_TTL,
        }
    }

    #[must_use]
    pub fn with_greeting(mut self, greeting: impl Into<String>) -> Self {
        self.greeting = greeting.into();
        self
    }

    #[must_use]
    pub fn with_notice_ttl(mut self, ttl: Duration) -> Self {
        self.notice_ttl = ttl;
        self
    }
}

/// State of one page load of the chat widget.
///
/// Cloning is cheap and yields a handle to the same widget.
#[derive(Clone)]
pub struct ChatWidget {
    inner: Arc<WidgetInner>,
}

struct WidgetInner {
    id: String,
    chat: Arc<dyn ChatBackend>,
    history: Arc<dyn HistorySource>,
    history_query: ConversationQuery,
    clipboard: Arc<dyn Clipboard>,
    conversation: RwLock<Conversation>,
    /// Reply text received so far while an exchange is running.
    streaming_text: RwLock<String>,
    /// Set while an exchange is outstanding; input is refused meanwhile.
    busy: AtomicBool,
    view: RwLock<ViewState>,
    history_state: RwLock<HistoryState>,
    mounted: AtomicBool,
    link_notice: Transient<String>,
    copied_message: Transient<usize>,
    last_activity: RwLock<DateTime<Utc>>,
}

impl std::fmt::Debug for ChatWidget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatWidget")
            .field("id", &self.inner.id)
            .field("messages", &read_lock(&self.inner.conversation).len())
            .field("busy", &self.is_busy())
            .finish()
    }
}

impl WidgetInner {
    fn append(&self, message: Message) -> (usize, Message) {
        let index = write_lock(&self.conversation).push(message.clone());
        self.touch();
        (index, message)
    }

    fn touch(&self) {
        *write_lock(&self.last_activity) = Utc::now();
    }
}

/// Clears the busy flag and the streaming text when an exchange ends,
/// including when its stream is dropped before completion.
struct BusyGuard {
    inner: Arc<WidgetInner>,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        write_lock(&self.inner.streaming_text).clear();
        self.inner.busy.store(false, Ordering::Release);
    }
}

impl ChatWidget {
    /// Create a widget opened by the context's greeting.
    #[must_use]
    pub fn new(id: impl Into<String>, context: &WidgetContext, clipboard: Arc<dyn Clipboard>) -> Self {
        Self {
            inner: Arc::new(WidgetInner {
                id: id.into(),
                chat: Arc::clone(&context.chat),
                history: Arc::clone(&context.history),
                history_query: context.history_query.clone(),
                clipboard,
                conversation: RwLock::new(Conversation::with_greeting(context.greeting.clone())),
                streaming_text: RwLock::new(String::new()),
                busy: AtomicBool::new(false),
                view: RwLock::new(ViewState::default()),
                history_state: RwLock::new(HistoryState::Idle),
                mounted: AtomicBool::new(false),
                link_notice: Transient::new(context.notice_ttl),
                copied_message: Transient::new(context.notice_ttl),
                last_activity: RwLock::new(Utc::now()),
            }),
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// Messages exchanged so far.
    #[must_use]
    pub fn messages(&self) -> Vec<Message> {
        read_lock(&self.inner.conversation).messages().to_vec()
    }

    /// Reply text received so far, empty when nothing is streaming.
    #[must_use]
    pub fn streaming_text(&self) -> String {
        read_lock(&self.inner.streaming_text).clone()
    }

    /// Whether an exchange is outstanding.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.inner.busy.load(Ordering::Acquire)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Messaging
    // ─────────────────────────────────────────────────────────────────────

    /// Submit user input and start streaming the reply.
    ///
    /// On success the user message is already appended and the returned
    /// stream drives the request; the widget stays busy until the stream
    /// finishes or is dropped.
    ///
    /// # Errors
    ///
    /// Refused with no state change when the input is blank, when another
    /// exchange is outstanding, or when it repeats the previous user message.
    pub fn submit(&self, input: &str) -> Result<ExchangeStream, WidgetError> {
        if input.trim().is_empty() {
            return Err(WidgetError::EmptyMessage);
        }

        if self
            .inner
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!(widget_id = %self.inner.id, "Submit refused while busy");
            return Err(WidgetError::Busy);
        }
        let guard = BusyGuard {
            inner: Arc::clone(&self.inner),
        };

        let messages = {
            let mut conversation = write_lock(&self.inner.conversation);
            if conversation.repeats_last_user(input) {
                tracing::debug!(widget_id = %self.inner.id, "Ignoring repeated message");
                return Err(WidgetError::DuplicateMessage);
            }
            let messages = conversation.api_messages_with(input);
            conversation.push(Message::user(input));
            messages
        };
        self.inner.touch();

        Ok(self.exchange(messages, guard))
    }

    /// Submit input and drive the exchange to completion.
    pub async fn send_message(&self, input: &str) -> Result<Vec<WidgetEvent>, WidgetError> {
        let stream = self.submit(input)?;
        Ok(stream.collect().await)
    }

    fn exchange(&self, messages: Vec<ApiMessage>, guard: BusyGuard) -> ExchangeStream {
        let inner = Arc::clone(&self.inner);
        let request_id = Uuid::new_v4().to_string();

        Box::pin(async_stream::stream! {
            tracing::info!(
                name: "widget.exchange.started",
                widget_id = %inner.id,
                request_id = %request_id,
                message_count = messages.len(),
                "Exchange started"
            );
            yield WidgetEvent::StreamStart { request_id: request_id.clone() };

            let mut accumulated = String::new();
            let mut failure = None;

            match inner.chat.stream(messages).await {
                Ok(mut chunks) => {
                    while let Some(chunk) = chunks.next().await {
                        match chunk {
                            Ok(delta) => {
                                accumulated.push_str(&delta);
                                write_lock(&inner.streaming_text).clone_from(&accumulated);
                                tracing::trace!(request_id = %request_id, delta_length = delta.len(), "Reply chunk");
                                let html = render_markdown(&accumulated);
                                yield WidgetEvent::Partial { delta, text: accumulated.clone(), html };
                            }
                            Err(e) => {
                                failure = Some(e);
                                break;
                            }
                        }
                    }
                }
                Err(e) => failure = Some(e),
            }

            if let Some(e) = failure {
                tracing::error!(
                    request_id = %request_id,
                    widget_id = %inner.id,
                    error = %e,
                    "Error sending message"
                );
                let (index, message) = inner.append(Message::bot(FALLBACK_REPLY));
                yield WidgetEvent::MessageAppended { index, message };
                yield WidgetEvent::Error { message: e.to_string() };
            } else if accumulated.is_empty() {
                tracing::warn!(request_id = %request_id, "Reply stream ended without text");
            } else {
                let content_length = accumulated.len();
                let (index, message) = inner.append(Message::bot(accumulated));
                tracing::info!(
                    name: "widget.exchange.completed",
                    request_id = %request_id,
                    widget_id = %inner.id,
                    content_length,
                    "Reply appended"
                );
                yield WidgetEvent::MessageAppended { index, message };
            }

            drop(guard);
            yield WidgetEvent::Done;
        })
    }

    // ─────────────────────────────────────────────────────────────────────
    // History
    // ─────────────────────────────────────────────────────────────────────

    /// Start the one-shot history load the first time the widget is shown.
    ///
    /// Returns `None` when the widget was already mounted.
    pub fn mount(&self) -> Option<JoinHandle<()>> {
        if self.inner.mounted.swap(true, Ordering::AcqRel) {
            return None;
        }
        let widget = self.clone();
        Some(tokio::spawn(async move { widget.load_history().await }))
    }

    /// Fetch past conversations and store the result or an error.
    pub async fn load_history(&self) {
        *write_lock(&self.inner.history_state) = HistoryState::Loading;

        let state = match self.inner.history.fetch(&self.inner.history_query).await {
            Ok(resp) => {
                tracing::info!(
                    name: "chatbase.history.loaded",
                    widget_id = %self.inner.id,
                    count = resp.data.len(),
                    "Conversations loaded"
                );
                HistoryState::Loaded {
                    conversations: resp.data,
                }
            }
            Err(e) => {
                tracing::error!(widget_id = %self.inner.id, error = %e, "Error loading conversations");
                HistoryState::Failed {
                    error: HISTORY_ERROR.to_string(),
                }
            }
        };

        *write_lock(&self.inner.history_state) = state;
    }

    #[must_use]
    pub fn history(&self) -> HistoryState {
        read_lock(&self.inner.history_state).clone()
    }

    // ─────────────────────────────────────────────────────────────────────
    // View
    // ─────────────────────────────────────────────────────────────────────

    #[must_use]
    pub fn view(&self) -> ViewState {
        *read_lock(&self.inner.view)
    }

    /// Apply a view action and return the resulting state.
    pub fn apply_view(&self, action: ViewAction) -> ViewState {
        let mut view = write_lock(&self.inner.view);
        view.apply(action);
        *view
    }

    // ─────────────────────────────────────────────────────────────────────
    // Copy
    // ─────────────────────────────────────────────────────────────────────

    /// Copy a clicked link's URL instead of navigating to it.
    pub async fn copy_link(&self, url: &str) -> CopyOutcome {
        match self.inner.clipboard.write_text(url).await {
            Ok(()) => {
                self.inner.link_notice.show(LINK_COPIED.to_string());
                CopyOutcome {
                    text: Some(url.to_string()),
                    notice: LINK_COPIED,
                }
            }
            Err(e) => {
                tracing::error!(widget_id = %self.inner.id, error = %e, "Failed to copy link");
                self.inner.link_notice.show(LINK_COPY_FAILED.to_string());
                CopyOutcome {
                    text: None,
                    notice: LINK_COPY_FAILED,
                }
            }
        }
    }

    /// Copy a bot message as plain text.
    pub async fn copy_message(&self, index: usize) -> Result<String, WidgetError> {
        let text = {
            let conversation = read_lock(&self.inner.conversation);
            match conversation.get(index) {
                Some(m) if m.sender == Sender::Bot => strip_markdown(&m.text),
                _ => return Err(WidgetError::NotCopyable(index)),
            }
        };

        if let Err(e) = self.inner.clipboard.write_text(&text).await {
            tracing::error!(widget_id = %self.inner.id, error = %e, "Failed to copy text");
            return Err(e.into());
        }

        self.inner.copied_message.show(index);
        Ok(text)
    }

    /// Current link notification.
    #[must_use]
    pub fn link_notice(&self) -> Option<String> {
        self.inner.link_notice.current()
    }

    /// Index of the message whose "Copied!" marker is showing.
    #[must_use]
    pub fn copied_message(&self) -> Option<usize> {
        self.inner.copied_message.current()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────

    #[must_use]
    pub fn snapshot(&self) -> WidgetSnapshot {
        let view = self.view();
        WidgetSnapshot {
            id: self.inner.id.clone(),
            messages: self.messages(),
            streaming_text: self.streaming_text(),
            busy: self.is_busy(),
            view,
            backdrop: view.backdrop_visible(),
            history: self.history(),
            link_notice: self.link_notice(),
            copied_message: self.copied_message(),
        }
    }

    /// Record activity so the widget is not expired.
    pub fn touch(&self) {
        self.inner.touch();
    }

    /// Whether the widget has been idle longer than `timeout`.
    ///
    /// A widget with an outstanding exchange never expires.
    #[must_use]
    pub fn is_expired_with_timeout(&self, timeout: Duration) -> bool {
        if self.is_busy() {
            return false;
        }
        let last = *read_lock(&self.inner.last_activity);
        (Utc::now() - last)
            .to_std()
            .is_ok_and(|idle| idle > timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chatbase::{ChatbaseError, ConversationsResponse, TextStream};
    use crate::widget::{ClipboardError, DeferredClipboard};

    struct Canned(Vec<&'static str>);

    #[async_trait::async_trait]
    impl ChatBackend for Canned {
        async fn stream(&self, _messages: Vec<ApiMessage>) -> Result<TextStream, ChatbaseError> {
            let chunks: Vec<Result<String, ChatbaseError>> =
                self.0.iter().map(|c| Ok((*c).to_string())).collect();
            Ok(Box::pin(futures::stream::iter(chunks)))
        }
    }

    struct NoHistory;

    #[async_trait::async_trait]
    impl HistorySource for NoHistory {
        async fn fetch(&self, _query: &ConversationQuery) -> Result<ConversationsResponse, ChatbaseError> {
            Ok(ConversationsResponse { data: Vec::new() })
        }
    }

    struct BrokenClipboard;

    #[async_trait::async_trait]
    impl Clipboard for BrokenClipboard {
        async fn write_text(&self, _text: &str) -> Result<(), ClipboardError> {
            Err(ClipboardError("denied".to_string()))
        }
    }

    fn widget(chunks: Vec<&'static str>) -> ChatWidget {
        let context = WidgetContext::new(
            Arc::new(Canned(chunks)),
            Arc::new(NoHistory),
            ConversationQuery::new("bot"),
        );
        ChatWidget::new("w1", &context, Arc::new(DeferredClipboard::new()))
    }

    #[tokio::test]
    async fn test_send_message_appends_reply() {
        let widget = widget(vec!["Hel", "lo!"]);
        let events = widget.send_message("hi").await.unwrap();

        let messages = widget.messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].text, "hi");
        assert_eq!(messages[2].text, "Hello!");
        assert_eq!(messages[2].sender, Sender::Bot);
        assert!(!widget.is_busy());
        assert!(widget.streaming_text().is_empty());
        assert_eq!(events.last(), Some(&WidgetEvent::Done));
    }

    #[tokio::test]
    async fn test_empty_reply_appends_nothing() {
        let widget = widget(vec![]);
        widget.send_message("hi").await.unwrap();
        assert_eq!(widget.messages().len(), 2);
    }

    #[tokio::test]
    async fn test_dropped_stream_releases_busy() {
        let widget = widget(vec!["x"]);
        let stream = widget.submit("hi").unwrap();
        assert!(widget.is_busy());
        drop(stream);
        assert!(!widget.is_busy());
    }

    #[tokio::test]
    async fn test_copy_user_message_refused() {
        let widget = widget(vec!["**ok**"]);
        widget.send_message("hi").await.unwrap();
        assert_eq!(widget.copy_message(1).await, Err(WidgetError::NotCopyable(1)));
        assert_eq!(widget.copy_message(9).await, Err(WidgetError::NotCopyable(9)));
        assert_eq!(widget.copy_message(2).await.unwrap(), "ok");
        assert_eq!(widget.copied_message(), Some(2));
    }

    #[tokio::test]
    async fn test_copy_link_failure_notice() {
        let context = WidgetContext::new(
            Arc::new(Canned(vec![])),
            Arc::new(NoHistory),
            ConversationQuery::new("bot"),
        );
        let widget = ChatWidget::new("w2", &context, Arc::new(BrokenClipboard));

        let outcome = widget.copy_link("https://world.org").await;
        assert_eq!(outcome.text, None);
        assert_eq!(outcome.notice, LINK_COPY_FAILED);
        assert_eq!(widget.link_notice().as_deref(), Some(LINK_COPY_FAILED));

        assert!(matches!(
            widget.copy_message(0).await,
            Err(WidgetError::Clipboard(_))
        ));
        assert_eq!(widget.copied_message(), None);
    }

    #[tokio::test]
    async fn test_mount_only_once() {
        let widget = widget(vec![]);
        let handle = widget.mount().unwrap();
        handle.await.unwrap();
        assert!(widget.mount().is_none());
        assert_eq!(
            widget.history(),
            HistoryState::Loaded {
                conversations: Vec::new()
            }
        );
    }

    #[test]
    fn test_expiry() {
        let widget = widget(vec![]);
        assert!(!widget.is_expired_with_timeout(Duration::from_secs(60)));
        std::thread::sleep(Duration::from_millis(5));
        assert!(widget.is_expired_with_timeout(Duration::from_millis(1)));
    }
}
