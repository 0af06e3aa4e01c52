//! The discovery engine.
//!
//! A [`Finder`] owns one backend session and one worker thread. The worker
//! waits on the backend, rebuilds the source snapshot, notifies listeners
//! about what was found and lost, and then publishes the new snapshot.
//! Readers get the published snapshot through an `ArcSwap` and never block
//! the worker.

use crate::backend::{BackendSettings, DiscoveryBackend, MdnsBackend, SessionGuard};
use crate::error::{DiscoveryError, Result};
use crate::listeners::{ListenerId, Listeners};
use crate::snapshot::Snapshot;
use crate::types::{Source, SourceEvent, SourceEventKind};
use arc_swap::ArcSwap;
use async_channel::{Receiver, Sender, TrySendError};
use ndifind_core::FinderConfig;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Upper bound on a single backend wait; the stop flag is checked at least
/// this often.
pub const WAIT_TIMEOUT: Duration = Duration::from_millis(500);

const WORKER_THREAD_NAME: &str = "ndi-find";

/// Granularity of the back-off after a failed wait.
const BACKOFF_STEP: Duration = Duration::from_millis(25);

/// Discovers sources and keeps a live snapshot of them.
///
/// # Example
///
/// ```no_run
/// use ndifind_core::FinderConfig;
/// use ndifind_discovery::Finder;
///
/// let finder = Finder::new(FinderConfig::default())?;
/// finder.on_source_found(|source| println!("found {}", source))?;
/// finder.on_source_lost(|source| println!("lost {}", source))?;
///
/// std::thread::sleep(std::time::Duration::from_secs(2));
/// for source in finder.sources().iter() {
///     println!("{} at {}", source.name(), source.address());
/// }
///
/// finder.close();
/// # Ok::<(), ndifind_discovery::DiscoveryError>(())
/// ```
pub struct Finder {
    config: FinderConfig,
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<SessionGuard>>>,
    closed: AtomicBool,
}

/// State shared between the finder handle and its worker.
struct Shared {
    snapshot: ArcSwap<Snapshot>,
    refresh_requested: AtomicBool,
    exit: AtomicBool,
    found: Listeners,
    lost: Listeners,
    subscribers: Mutex<Vec<Sender<SourceEvent>>>,
    event_buffer: usize,
}

impl Finder {
    /// Creates a finder backed by multicast DNS.
    pub fn new(config: FinderConfig) -> Result<Self> {
        Self::with_backend(config, &MdnsBackend::new())
    }

    /// Creates a finder on top of `backend`.
    ///
    /// Opens exactly one backend session and starts the worker, which begins
    /// polling (and invoking listeners) immediately. If the session cannot be
    /// opened, no worker is started and the error is returned.
    pub fn with_backend<B>(config: FinderConfig, backend: &B) -> Result<Self>
    where
        B: DiscoveryBackend + ?Sized,
    {
        config.validate()?;

        let settings = BackendSettings::from(&config);
        let session = SessionGuard::new(backend.open(&settings)?);

        let shared = Arc::new(Shared {
            snapshot: ArcSwap::from_pointee(Snapshot::empty()),
            refresh_requested: AtomicBool::new(true),
            exit: AtomicBool::new(false),
            found: Listeners::new("found"),
            lost: Listeners::new("lost"),
            subscribers: Mutex::new(Vec::new()),
            event_buffer: config.event_buffer,
        });

        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || run(worker_shared, session))?;

        info!(
            show_local_sources = config.show_local_sources,
            groups = settings.groups.as_deref().unwrap_or("-"),
            extra_ips = settings.extra_ips.as_deref().unwrap_or("-"),
            "Finder started"
        );

        Ok(Self {
            config,
            shared,
            worker: Mutex::new(Some(worker)),
            closed: AtomicBool::new(false),
        })
    }

    /// The configuration this finder was created with
    pub fn config(&self) -> &FinderConfig {
        &self.config
    }

    /// The currently published snapshot.
    ///
    /// Never blocks and never fails. After [`Finder::close`] the snapshot is
    /// empty.
    pub fn sources(&self) -> Arc<Snapshot> {
        self.shared.snapshot.load_full()
    }

    /// Clears the published snapshot without raising lost notifications.
    ///
    /// The backend session is kept. The worker re-reads the backend on its
    /// next cycle and reports every source it sees as found again.
    pub fn force_refresh(&self) -> Result<()> {
        self.ensure_open()?;

        self.shared.snapshot.store(Arc::new(Snapshot::empty()));
        self.shared.refresh_requested.store(true, Ordering::Release);

        info!("Source snapshot cleared, waiting for rediscovery");
        Ok(())
    }

    /// Registers a callback for sources that appear.
    ///
    /// Callbacks run on the worker thread in registration order; a slow
    /// callback delays the next poll cycle and shutdown.
    pub fn on_source_found<F>(&self, callback: F) -> Result<ListenerId>
    where
        F: Fn(&Source) + Send + Sync + 'static,
    {
        self.ensure_open()?;
        Ok(self.shared.found.add(callback))
    }

    /// Registers a callback for sources that disappear.
    pub fn on_source_lost<F>(&self, callback: F) -> Result<ListenerId>
    where
        F: Fn(&Source) + Send + Sync + 'static,
    {
        self.ensure_open()?;
        Ok(self.shared.lost.add(callback))
    }

    /// Removes a found or lost callback. Returns whether it was registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.shared.found.remove(id) || self.shared.lost.remove(id)
    }

    /// Returns a channel receiving every found and lost event from now on.
    ///
    /// Each subscriber has its own bounded queue (`event_buffer`); events for
    /// a subscriber whose queue is full are dropped. The channel closes when
    /// the finder is closed.
    pub fn subscribe(&self) -> Result<Receiver<SourceEvent>> {
        self.ensure_open()?;

        let (tx, rx) = async_channel::bounded(self.shared.event_buffer);
        self.shared.subscribers.lock().push(tx);
        Ok(rx)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Stops the worker and releases the backend session.
    ///
    /// Blocks until the worker has exited, which takes at most about one
    /// [`WAIT_TIMEOUT`] plus the time spent in a running callback. Calling it
    /// again is a no-op. When called from a listener, the worker is only
    /// signalled and releases the session itself when it exits.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        self.shared.exit.store(true, Ordering::Release);

        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            if worker.thread().id() == thread::current().id() {
                debug!("Finder closed from its own worker");
            } else {
                match worker.join() {
                    Ok(mut session) => session.close(),
                    Err(_) => error!("Finder worker panicked"),
                }
            }
        }

        self.shared.snapshot.store(Arc::new(Snapshot::empty()));
        self.shared.subscribers.lock().clear();
        self.shared.found.clear();
        self.shared.lost.clear();

        info!("Finder closed");
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            Err(DiscoveryError::Closed)
        } else {
            Ok(())
        }
    }
}

impl Drop for Finder {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for Finder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Finder")
            .field("config", &self.config)
            .field("sources", &self.shared.snapshot.load().len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Worker loop. Returns the session so the closing thread can release it
/// after the join; if the loop unwinds, the guard releases it instead.
fn run(shared: Arc<Shared>, mut session: SessionGuard) -> SessionGuard {
    debug!("Finder worker started");

    while !shared.exit.load(Ordering::Acquire) {
        let signalled = match session.wait(WAIT_TIMEOUT) {
            Ok(signalled) => signalled,
            Err(e) => {
                warn!(error = %e, "Backend wait failed, skipping cycle");
                back_off(&shared.exit);
                continue;
            }
        };

        let refresh = shared.refresh_requested.swap(false, Ordering::AcqRel);
        if !signalled && !refresh {
            continue;
        }

        if shared.exit.load(Ordering::Acquire) {
            break;
        }

        let records = match session.snapshot() {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "Backend snapshot failed, keeping previous sources");
                if refresh {
                    shared.refresh_requested.store(true, Ordering::Release);
                }
                continue;
            }
        };

        shared.apply(Snapshot::from_raw(records));
    }

    debug!("Finder worker stopped");
    session
}

/// Sleeps for one wait timeout, returning early once `exit` is set.
fn back_off(exit: &AtomicBool) {
    let deadline = Instant::now() + WAIT_TIMEOUT;
    while !exit.load(Ordering::Acquire) {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        thread::sleep(BACKOFF_STEP.min(deadline - now));
    }
}

impl Shared {
    /// Notifies found sources, then lost sources, then publishes `next`.
    fn apply(&self, next: Snapshot) {
        let previous = self.snapshot.load_full();
        if *previous == next {
            return;
        }

        let diff = previous.diff(&next);

        for source in &diff.found {
            info!(source = source.name(), address = source.address(), "Source found");
            self.found.notify(source);
            self.broadcast(SourceEventKind::Found, source);
        }

        for source in &diff.lost {
            info!(source = source.name(), "Source lost");
            self.lost.notify(source);
            self.broadcast(SourceEventKind::Lost, source);
        }

        // A listener may have closed the finder
        if self.exit.load(Ordering::Acquire) {
            return;
        }

        let (found, lost, total) = (diff.found.len(), diff.lost.len(), next.len());

        // Only replace the snapshot this cycle was diffed against; a forced
        // refresh in between wins and the next cycle diffs against empty.
        let replaced = self.snapshot.compare_and_swap(&previous, Arc::new(next));
        if Arc::ptr_eq(&*replaced, &previous) {
            debug!(found, lost, total, "Published source snapshot");
        } else {
            debug!("Snapshot cleared during cycle, deferring to next cycle");
        }
    }

    fn broadcast(&self, kind: SourceEventKind, source: &Source) {
        let mut subscribers = self.subscribers.lock();
        if subscribers.is_empty() {
            return;
        }

        let event = SourceEvent::new(kind, source.clone());
        subscribers.retain(|tx| match tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(source = source.name(), "Event subscriber is full, dropping event");
                true
            }
            Err(TrySendError::Closed(_)) => false,
        });
    }
}
