//! Chat widget state.
//!
//! One [`ChatWidget`] holds everything a single page load of the widget
//! knows: the conversation, the text of a reply still streaming in, which
//! popups are open, the loaded conversation history, and the transient copy
//! notifications. All of it lives in memory and is dropped with the widget.
//!
//! # Architecture
//!
//! - [`Conversation`]: append-only message log
//! - [`ViewState`]: popup/panel visibility
//! - [`ChatWidget`]: controller tying the clients and state together
//! - [`WidgetStore`]: one widget per page load, with idle expiry
//!
//! # Example
//!
//! ```rust,ignore
//! use world_helper::widget::{ChatWidget, WidgetContext};
//!
//! let widget = ChatWidget::new("page-1", &context, clipboard);
//! let events = widget.send_message("hi").await?;
//! assert_eq!(widget.messages().len(), 3);
//! ```

pub mod clipboard;
mod controller;
mod conversation;
mod error;
pub mod events;
pub mod notice;
mod store;
pub mod view;

pub use clipboard::{Clipboard, ClipboardError, DeferredClipboard, strip_markdown};
pub use controller::{
    ChatWidget, CopyOutcome, ExchangeStream, FALLBACK_REPLY, HISTORY_ERROR, HistoryState,
    WidgetContext, WidgetSnapshot,
};
pub use conversation::{Conversation, Message, Sender};
pub use error::WidgetError;
pub use events::WidgetEvent;
pub use store::WidgetStore;
pub use view::{Popup, ViewAction, ViewState};

use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

// State behind these locks is plain data with no cross-field invariants that
// a panicking writer could break, so poisoned guards are recovered.

pub(crate) fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
