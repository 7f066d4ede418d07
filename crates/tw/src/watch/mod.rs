//! Debounced refresh loop driven by store file changes.
//!
//! A `notify` watcher on the store's directory forwards matching change
//! events into a channel. Two independent pieces then decide when to redraw:
//!
//! - [`Debouncer`] collapses a burst of events into one trailing signal
//!   once no event has arrived for [`DEBOUNCE`]
//! - [`IdleGate`] holds a pending redraw back until the user has been idle
//!   for [`IDLE_THRESHOLD`]
//!
//! Independently of file events, a redraw is also due every polling
//! interval. If the watcher cannot be installed the loop logs a warning and
//! relies on polling alone.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::storage::WatchTarget;

/// Quiet period that ends a burst of file events.
pub const DEBOUNCE: Duration = Duration::from_millis(100);

/// How long the user must be idle before a pending redraw is shown.
pub const IDLE_THRESHOLD: Duration = Duration::from_secs(2);

/// How often the loop re-checks the idle gate and the polling deadline.
const TICK: Duration = Duration::from_millis(500);

/// Upper bound on waiting for the watcher thread to stop.
const STOP_TIMEOUT: Duration = Duration::from_secs(2);

/// Redraw callback for [`WatchLoop`].
///
/// Errors are logged by the loop, which then keeps going.
#[async_trait]
pub trait Refresh: Send {
    /// Re-read the store and redraw.
    async fn refresh(&mut self) -> Result<()>;
}

// ========== Debouncer ==========

/// Trailing-edge debouncer: every [`arm`](Debouncer::arm) pushes the
/// deadline out, and [`fire`](Debouncer::fire) reports it once it passes.
#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    /// Debouncer with the given quiet window.
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            deadline: None,
        }
    }

    /// Record a raw event at `now`.
    pub fn arm(&mut self, now: Instant) {
        self.deadline = Some(now + self.window);
    }

    /// When the pending signal will fire, if armed.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// True exactly once per burst, at or after the deadline.
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

// ========== Idle gate ==========

/// Tracks user activity; open once nothing has happened for the threshold.
#[derive(Debug, Clone)]
pub struct IdleGate {
    threshold: Duration,
    last_activity: Option<Instant>,
}

impl IdleGate {
    /// Gate with the given idle threshold. Starts open.
    pub fn new(threshold: Duration) -> Self {
        Self {
            threshold,
            last_activity: None,
        }
    }

    /// Record user activity at `now`.
    pub fn touch(&mut self, now: Instant) {
        self.last_activity = Some(now);
    }

    /// Whether the user has been idle long enough at `now`.
    pub fn is_open(&self, now: Instant) -> bool {
        self.last_activity
            .is_none_or(|last| now.saturating_duration_since(last) >= self.threshold)
    }
}

// ========== Loop ==========

/// Timing for [`WatchLoop`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchOptions {
    /// Redraw at least this often, file events or not
    pub interval: Duration,

    /// Quiet window for [`Debouncer`]
    pub debounce: Duration,

    /// Threshold for [`IdleGate`]
    pub idle_threshold: Duration,
}

impl WatchOptions {
    /// Default debounce and idle threshold with a polling interval in
    /// seconds.
    ///
    /// # Errors
    ///
    /// `Error::Validation` when `interval_secs` is zero.
    pub fn every(interval_secs: u64) -> Result<Self> {
        if interval_secs == 0 {
            return Err(Error::Validation(
                "watch interval must be at least one second".to_string(),
            ));
        }
        Ok(Self {
            interval: Duration::from_secs(interval_secs),
            debounce: DEBOUNCE,
            idle_threshold: IDLE_THRESHOLD,
        })
    }
}

/// Forward matching change events from a `notify` watcher into `tx`.
fn install_watcher(target: &WatchTarget, tx: mpsc::Sender<()>) -> notify::Result<RecommendedWatcher> {
    let filter = target.clone();
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| {
            let Ok(event) = res else {
                return;
            };
            let relevant = matches!(
                event.kind,
                EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
            ) && event.paths.iter().any(|p| filter.matches(p));
            if relevant {
                // A full channel already holds a wake-up.
                let _ = tx.try_send(());
            }
        },
        Config::default(),
    )?;
    watcher.watch(&target.dir, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}

/// Stop the watcher off the async runtime, waiting at most [`STOP_TIMEOUT`].
async fn stop_watcher(watcher: RecommendedWatcher) {
    let stop = tokio::task::spawn_blocking(move || drop(watcher));
    match tokio::time::timeout(STOP_TIMEOUT, stop).await {
        Ok(Ok(())) => debug!("file watcher stopped"),
        Ok(Err(e)) => warn!(error = %e, "file watcher panicked while stopping"),
        Err(_) => warn!("file watcher did not stop within {STOP_TIMEOUT:?}"),
    }
}

/// The refresh loop.
#[derive(Debug)]
pub struct WatchLoop {
    options: WatchOptions,
    target: Option<WatchTarget>,
    events: Option<mpsc::Receiver<()>>,
    activity: Option<mpsc::Receiver<()>>,
}

impl WatchLoop {
    /// Loop watching `target`, or polling only when `None`.
    pub fn new(target: Option<WatchTarget>, options: WatchOptions) -> Self {
        Self {
            options,
            target,
            events: None,
            activity: None,
        }
    }

    /// Feed user activity (keystrokes, ...) into the idle gate.
    #[must_use]
    pub fn with_activity(mut self, activity: mpsc::Receiver<()>) -> Self {
        self.activity = Some(activity);
        self
    }

    /// Redraw once immediately, then whenever due, until `shutdown`
    /// completes.
    ///
    /// Refresh failures are logged and never end the loop.
    pub async fn run<R, S>(mut self, refresher: &mut R, shutdown: S) -> Result<()>
    where
        R: Refresh + ?Sized,
        S: Future<Output = ()>,
    {
        let watcher = match (&self.target, self.events.is_some()) {
            (Some(target), false) => {
                let (tx, rx) = mpsc::channel(16);
                match install_watcher(target, tx) {
                    Ok(watcher) => {
                        debug!(dir = %target.dir.display(), "watching for changes");
                        self.events = Some(rx);
                        Some(watcher)
                    }
                    Err(e) => {
                        warn!(error = %e, "file watching unavailable, polling only");
                        None
                    }
                }
            }
            _ => None,
        };

        let mut debouncer = Debouncer::new(self.options.debounce);
        let mut gate = IdleGate::new(self.options.idle_threshold);
        let mut ticker = tokio::time::interval(TICK);
        let mut next_poll = Instant::now();
        let mut pending = true;
        tokio::pin!(shutdown);

        loop {
            let now = Instant::now();
            if now >= next_poll {
                pending = true;
            }
            if pending && gate.is_open(now) {
                if let Err(e) = refresher.refresh().await {
                    warn!(error = %e, "refresh failed, waiting for next update");
                }
                pending = false;
                next_poll = Instant::now() + self.options.interval;
            }

            let deadline = debouncer.deadline();
            tokio::select! {
                () = &mut shutdown => break,
                Some(()) = recv(&mut self.events) => debouncer.arm(Instant::now()),
                Some(()) = recv(&mut self.activity) => gate.touch(Instant::now()),
                () = tokio::time::sleep_until(deadline.unwrap_or(now)), if deadline.is_some() => {
                    if debouncer.fire(Instant::now()) {
                        pending = true;
                    }
                }
                () = tokio::time::sleep_until(next_poll), if !pending => {}
                _ = ticker.tick() => {}
            }
        }

        if let Some(watcher) = watcher {
            stop_watcher(watcher).await;
        }
        Ok(())
    }
}

/// Receive from an optional channel; `None` when absent or closed.
async fn recv(rx: &mut Option<mpsc::Receiver<()>>) -> Option<()> {
    match rx {
        Some(rx) => rx.recv().await,
        None => None,
    }
}
