//! Clipboard seam and copy helpers.

use std::sync::{LazyLock, Mutex};

use regex::Regex;
use thiserror::Error;

use super::lock;

/// Shown after a link was copied.
pub const LINK_COPIED: &str = "Link copied!";

/// Shown when copying a link failed.
pub const LINK_COPY_FAILED: &str = "Failed to copy link";

static MARKDOWN_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(.*?)\]\((.*?)\)").expect("link pattern is valid"));

static EMPHASIS_MARKERS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[*_~`]").expect("emphasis pattern is valid"));

/// Failed clipboard write.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("clipboard write failed: {0}")]
pub struct ClipboardError(pub String);

/// Destination of copy actions.
#[async_trait::async_trait]
pub trait Clipboard: Send + Sync {
    /// Replace the clipboard contents with `text`.
    async fn write_text(&self, text: &str) -> Result<(), ClipboardError>;
}

/// Clipboard that holds text for the page to write.
///
/// The browser owns the real clipboard; the server records the text here and
/// returns it in the copy response.
#[derive(Debug, Default)]
pub struct DeferredClipboard {
    last: Mutex<Option<String>>,
}

impl DeferredClipboard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recently written text.
    #[must_use]
    pub fn last(&self) -> Option<String> {
        lock(&self.last).clone()
    }
}

#[async_trait::async_trait]
impl Clipboard for DeferredClipboard {
    async fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        *lock(&self.last) = Some(text.to_string());
        Ok(())
    }
}

/// Reduce a markdown reply to plain text for copying.
///
/// Links keep only their label; emphasis, strike-through and code markers
/// are dropped.
#[must_use]
pub fn strip_markdown(text: &str) -> String {
    let unlinked = MARKDOWN_LINK.replace_all(text, "$1");
    EMPHASIS_MARKERS.replace_all(&unlinked, "").into_owned()
}
