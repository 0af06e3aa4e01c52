//! Ordered multicast callback registry.

use crate::types::Source;
use parking_lot::RwLock;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::error;

/// Callback invoked with a found or lost source.
pub type SourceCallback = Arc<dyn Fn(&Source) + Send + Sync>;

static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

/// Handle returned when registering a callback, used to remove it again.
/// Ids are unique across all registries in the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Callbacks for one notification channel, kept in registration order.
pub struct Listeners {
    channel: &'static str,
    entries: RwLock<Vec<(ListenerId, SourceCallback)>>,
}

impl Listeners {
    pub fn new(channel: &'static str) -> Self {
        Self {
            channel,
            entries: RwLock::new(Vec::new()),
        }
    }

    pub fn add<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(&Source) + Send + Sync + 'static,
    {
        let id = ListenerId(NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed));
        self.entries.write().push((id, Arc::new(callback)));
        id
    }

    /// Returns whether a callback with this id was registered.
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        entries.len() != before
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Invokes every callback with `source`, in registration order, on the
    /// calling thread.
    ///
    /// The registry lock is released before any callback runs, so callbacks
    /// may register or remove listeners. A panicking callback is logged and
    /// skipped; the remaining callbacks still run. Returns the number of
    /// callbacks that panicked.
    pub fn notify(&self, source: &Source) -> usize {
        let callbacks: Vec<SourceCallback> = self
            .entries
            .read()
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();

        let mut failures = 0;
        for callback in callbacks {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| callback(source))) {
                failures += 1;
                error!(
                    channel = self.channel,
                    source = source.name(),
                    panic = %panic_message(&*panic),
                    "Source listener panicked"
                );
            }
        }
        failures
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
