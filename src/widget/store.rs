//! Widget storage: one widget per page load.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use uuid::Uuid;

use super::{ChatWidget, DeferredClipboard, WidgetContext, read_lock, write_lock};

/// Thread-safe store for widgets.
///
/// Provides methods for creating, retrieving, and cleaning up widgets.
#[derive(Debug, Clone)]
pub struct WidgetStore {
    inner: Arc<WidgetStoreInner>,
}

#[derive(Debug)]
struct WidgetStoreInner {
    widgets: RwLock<HashMap<String, ChatWidget>>,
    context: WidgetContext,
}

impl WidgetStore {
    /// Create a store whose widgets share `context`.
    #[must_use]
    pub fn new(context: WidgetContext) -> Self {
        Self {
            inner: Arc::new(WidgetStoreInner {
                widgets: RwLock::new(HashMap::new()),
                context,
            }),
        }
    }

    /// Create a new widget and return it.
    #[must_use]
    pub fn create(&self) -> ChatWidget {
        let id = Uuid::new_v4().to_string();
        self.create_with_id(id)
    }

    /// Create a new widget with a specific ID, replacing any existing one.
    #[must_use]
    pub fn create_with_id(&self, id: impl Into<String>) -> ChatWidget {
        let id = id.into();
        let widget = ChatWidget::new(
            id.clone(),
            &self.inner.context,
            Arc::new(DeferredClipboard::new()),
        );
        write_lock(&self.inner.widgets).insert(id, widget.clone());
        widget
    }

    /// Get a widget by ID.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<ChatWidget> {
        read_lock(&self.inner.widgets).get(id).cloned()
    }

    /// Remove a widget by ID.
    pub fn remove(&self, id: &str) -> Option<ChatWidget> {
        write_lock(&self.inner.widgets).remove(id)
    }

    /// Get the number of live widgets.
    #[must_use]
    pub fn len(&self) -> usize {
        read_lock(&self.inner.widgets).len()
    }

    /// Check if there are no widgets.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove widgets that have been idle longer than the timeout.
    ///
    /// Returns the number of widgets removed.
    pub fn cleanup_expired_with_timeout(&self, timeout: Duration) -> usize {
        let mut guard = write_lock(&self.inner.widgets);
        let before = guard.len();
        guard.retain(|_, widget| !widget.is_expired_with_timeout(timeout));
        before - guard.len()
    }

    /// List all widget IDs.
    #[must_use]
    pub fn list_ids(&self) -> Vec<String> {
        read_lock(&self.inner.widgets).keys().cloned().collect()
    }

    /// Periodically drop idle widgets until the returned task is aborted.
    pub fn spawn_sweeper(&self, timeout: Duration) -> tokio::task::JoinHandle<()> {
        let store = self.clone();
        let period = (timeout / 4).max(Duration::from_secs(1));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                let removed = store.cleanup_expired_with_timeout(timeout);
                if removed > 0 {
                    tracing::info!(removed, remaining = store.len(), "Expired idle widgets");
                }
            }
        })
    }
}
