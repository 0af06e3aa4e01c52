//! In-process backend whose source list is set directly by the caller.
//!
//! Useful for demos, for embedding sources known from elsewhere, and for
//! exercising the engine without a network. Fault injection hooks make each
//! backend call fail on demand.

use super::{BackendSession, BackendSettings, DiscoveryBackend};
use crate::error::{DiscoveryError, Result};
use crate::types::RawSource;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::Duration;

/// Shared, cloneable in-memory backend. Clones control the same state.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    state: Mutex<State>,
    changed: Condvar,
}

#[derive(Default)]
struct State {
    sources: Vec<RawSource>,
    generation: u64,
    signal_every_wait: bool,
    open_error: Option<String>,
    wait_error: Option<String>,
    snapshot_error: Option<String>,
    close_error: Option<String>,
    calls: u64,
    open_sessions: usize,
    closed_sessions: usize,
    last_settings: Option<BackendSettings>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the source list and wakes any waiting session.
    pub fn set_sources<I>(&self, sources: I)
    where
        I: IntoIterator<Item = RawSource>,
    {
        self.update(|list| *list = sources.into_iter().collect());
    }

    pub fn add_source(&self, source: RawSource) {
        self.update(|list| list.push(source));
    }

    /// Removes every record with this name.
    pub fn remove_source(&self, name: &str) {
        self.update(|list| list.retain(|source| source.name != name));
    }

    pub fn clear(&self) {
        self.update(Vec::clear);
    }

    fn update(&self, change: impl FnOnce(&mut Vec<RawSource>)) {
        let mut state = self.inner.state.lock();
        change(&mut state.sources);
        state.generation += 1;
        self.inner.changed.notify_all();
    }

    /// When enabled, `wait` reports a possible change on every return,
    /// including timeouts, like a backend that cannot tell the difference.
    pub fn signal_every_wait(&self, enabled: bool) {
        self.inner.state.lock().signal_every_wait = enabled;
    }

    /// Makes every subsequent `open` fail with `reason`.
    pub fn fail_open(&self, reason: impl Into<String>) {
        self.inner.state.lock().open_error = Some(reason.into());
    }

    /// Makes the next `wait` call fail.
    pub fn fail_next_wait(&self, reason: impl Into<String>) {
        self.inner.state.lock().wait_error = Some(reason.into());
    }

    /// Makes the next `snapshot` call fail.
    pub fn fail_next_snapshot(&self, reason: impl Into<String>) {
        self.inner.state.lock().snapshot_error = Some(reason.into());
    }

    /// Makes the next `close` call fail. The session is released regardless.
    pub fn fail_next_close(&self, reason: impl Into<String>) {
        self.inner.state.lock().close_error = Some(reason.into());
    }

    /// Number of `wait` and `snapshot` calls made by all sessions.
    pub fn call_count(&self) -> u64 {
        self.inner.state.lock().calls
    }

    pub fn open_sessions(&self) -> usize {
        self.inner.state.lock().open_sessions
    }

    pub fn closed_sessions(&self) -> usize {
        self.inner.state.lock().closed_sessions
    }

    /// Settings passed to the most recent successful `open`.
    pub fn last_settings(&self) -> Option<BackendSettings> {
        self.inner.state.lock().last_settings.clone()
    }
}

impl DiscoveryBackend for MemoryBackend {
    fn open(&self, settings: &BackendSettings) -> Result<Box<dyn BackendSession>> {
        let mut state = self.inner.state.lock();
        if let Some(reason) = &state.open_error {
            return Err(DiscoveryError::BackendUnavailable(reason.clone()));
        }

        state.open_sessions += 1;
        state.last_settings = Some(settings.clone());

        Ok(Box::new(MemorySession {
            inner: Arc::clone(&self.inner),
            seen_generation: 0,
            closed: false,
        }))
    }
}

struct MemorySession {
    inner: Arc<Inner>,
    seen_generation: u64,
    closed: bool,
}

impl BackendSession for MemorySession {
    fn wait(&mut self, timeout: Duration) -> Result<bool> {
        let mut state = self.inner.state.lock();
        state.calls += 1;

        if let Some(reason) = state.wait_error.take() {
            return Err(DiscoveryError::backend("wait", reason));
        }

        if state.generation == self.seen_generation {
            self.inner.changed.wait_for(&mut state, timeout);
        }

        let changed = state.generation != self.seen_generation;
        self.seen_generation = state.generation;
        Ok(changed || state.signal_every_wait)
    }

    fn snapshot(&mut self) -> Result<Vec<RawSource>> {
        let mut state = self.inner.state.lock();
        state.calls += 1;

        if let Some(reason) = state.snapshot_error.take() {
            return Err(DiscoveryError::backend("snapshot", reason));
        }

        Ok(state.sources.clone())
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let mut state = self.inner.state.lock();
        state.open_sessions -= 1;
        state.closed_sessions += 1;

        match state.close_error.take() {
            Some(reason) => Err(DiscoveryError::backend("close", reason)),
            None => Ok(()),
        }
    }
}
