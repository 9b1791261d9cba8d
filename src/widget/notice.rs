//! Timer-dismissed notifications.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::lock;

/// How long a notification stays up unless configured otherwise.
pub const DEFAULT_NOTICE_TTL: Duration = Duration::from_secs(2);

/// A value that clears itself a fixed time after being shown.
///
/// Each `show` starts its own timer. A timer only clears the value it was
/// started for, so a newer notification keeps its full lifetime.
#[derive(Debug, Clone)]
pub struct Transient<T> {
    slot: Arc<Mutex<Slot<T>>>,
    ttl: Duration,
}

#[derive(Debug)]
struct Slot<T> {
    value: Option<T>,
    generation: u64,
}

impl<T> Transient<T>
where
    T: Clone + Send + 'static,
{
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Slot {
                value: None,
                generation: 0,
            })),
            ttl,
        }
    }

    /// Show `value` and schedule its removal.
    ///
    /// Must be called from within a tokio runtime.
    pub fn show(&self, value: T) {
        let generation = {
            let mut slot = lock(&self.slot);
            slot.generation += 1;
            slot.value = Some(value);
            slot.generation
        };

        let slot = Arc::clone(&self.slot);
        let ttl = self.ttl;
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            let mut slot = lock(&slot);
            if slot.generation == generation {
                slot.value = None;
            }
        });
    }

    /// The value currently shown.
    #[must_use]
    pub fn current(&self) -> Option<T> {
        lock(&self.slot).value.clone()
    }
}
