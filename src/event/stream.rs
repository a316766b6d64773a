//! Live event delivery with automatic reconnection.
//!
//! Each watched contract (the curve, or every DEX pool) runs its own task
//! holding one log watch. A task that loses its watch reconnects after
//! `base_delay * 2^(attempt-1)`; after `max_reconnect_attempts` consecutive
//! failures it reports `StreamError::ReconnectExhausted` and gives up, leaving
//! the stream running but the target dead. `health()` tells the two apart.

use std::any::Any;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use alloy::primitives::Address;
use alloy::rpc::types::{Filter, Log};
use futures::StreamExt;
use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::indexer::LogFamily;
use super::retry::RetryPolicy;
use super::types::{DomainEvent, EventFilter, EventKind, LogId};
use crate::config::StreamConfig;
use crate::repository::LogSource;

/// Recently delivered logs remembered per target for de-duplication.
const SEEN_WINDOW: usize = 4096;

pub type EventCallback = Arc<dyn Fn(&DomainEvent) -> anyhow::Result<()> + Send + Sync>;
pub type ErrorCallback = Arc<dyn Fn(&StreamError) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ListenerId(u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Failures reported to error listeners.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    /// An event listener returned an error or panicked.
    #[error("listener {listener} failed: {message}")]
    Listener { listener: ListenerId, message: String },

    /// The watch on `address` failed or ended; a reconnect follows.
    #[error("log watch on {address} failed: {message}")]
    Transport { address: Address, message: String },

    /// The watch on `address` is given up.
    #[error("gave up on {address} after {attempts} reconnect attempts")]
    ReconnectExhausted { address: Address, attempts: u32 },
}

/// Lifecycle of one watched contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TargetState {
    Idle,
    Connecting,
    Running,
    Reconnecting,
    /// Reconnect attempts exhausted
    Dead,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TargetStatus {
    pub address: Address,
    pub state: TargetState,
    /// Consecutive failed (re)connects, never above `max_attempts`
    pub attempts: u32,
    pub max_attempts: u32,
}

impl TargetStatus {
    pub fn is_reconnecting(&self) -> bool {
        self.state == TargetState::Reconnecting
    }
}

/// Aggregate liveness, independent of whether `start` was called.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StreamHealth {
    /// Not started, or stopped
    Stopped,
    /// Every target is connected or connecting
    Healthy,
    /// Some targets are reconnecting or dead
    Degraded,
    /// Every target is dead; no events will arrive
    Dead,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}

#[derive(Default)]
struct Listeners {
    events: Vec<(ListenerId, EventCallback)>,
    errors: Vec<(ListenerId, ErrorCallback)>,
}

/// Bounded memory of delivered log ids.
struct SeenWindow {
    ids: HashSet<LogId>,
    order: VecDeque<LogId>,
    capacity: usize,
}

impl SeenWindow {
    fn new(capacity: usize) -> Self {
        Self {
            ids: HashSet::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Returns false when `id` was already seen.
    fn insert(&mut self, id: LogId) -> bool {
        if !self.ids.insert(id) {
            return false;
        }
        self.order.push_back(id);
        if self.order.len() > self.capacity
            && let Some(oldest) = self.order.pop_front()
        {
            self.ids.remove(&oldest);
        }
        true
    }
}

struct Shared {
    source: Arc<dyn LogSource>,
    family: LogFamily,
    policy: RetryPolicy,
    running: AtomicBool,
    next_id: AtomicU64,
    filter: RwLock<EventFilter>,
    listeners: Mutex<Listeners>,
    targets: Mutex<HashMap<Address, TargetStatus>>,
}

impl Shared {
    fn set_state(&self, address: Address, state: TargetState, attempts: u32) {
        if let Some(status) = lock(&self.targets).get_mut(&address) {
            status.state = state;
            status.attempts = attempts.min(status.max_attempts);
        }
    }

    fn report(&self, error: StreamError) {
        let listeners: Vec<ErrorCallback> = lock(&self.listeners)
            .errors
            .iter()
            .map(|(_, cb)| cb.clone())
            .collect();
        if listeners.is_empty() {
            tracing::warn!("Unhandled stream error: {error}");
        }
        for callback in listeners {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| callback(&error))) {
                tracing::error!("Error listener {}", panic_message(panic));
            }
        }
    }

    /// Parses, de-duplicates, filters and delivers one batch. Returns false if
    /// cancelled part way.
    fn dispatch_batch(
        &self,
        logs: &[Log],
        seen: &mut SeenWindow,
        cancel: &CancellationToken,
    ) -> bool {
        for log in logs {
            if cancel.is_cancelled() {
                return false;
            }
            let Some(event) = self.family.parse(log) else {
                continue;
            };
            if !seen.insert(event.log_id()) {
                tracing::debug!("Skipping already delivered log {:?}", event.log_id());
                continue;
            }
            let matches = self
                .filter
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .matches(&event);
            if matches && !self.dispatch(&event, cancel) {
                return false;
            }
        }
        true
    }

    /// Calls every event listener in registration order. A failing listener
    /// is reported and the rest still run.
    fn dispatch(&self, event: &DomainEvent, cancel: &CancellationToken) -> bool {
        let listeners: Vec<(ListenerId, EventCallback)> = lock(&self.listeners).events.clone();
        for (id, callback) in listeners {
            if cancel.is_cancelled() {
                return false;
            }
            let message = match catch_unwind(AssertUnwindSafe(|| callback(event))) {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => format!("{e:#}"),
                Err(panic) => panic_message(panic),
            };
            tracing::warn!("Listener {id} failed on {} event: {message}", event.kind());
            self.report(StreamError::Listener {
                listener: id,
                message,
            });
        }
        true
    }
}

/// Watch loop for one target; returns when cancelled or when reconnects are
/// exhausted.
async fn run_target(shared: Arc<Shared>, address: Address, cancel: CancellationToken) {
    let signatures = shared.family.signatures(&EventFilter::all());
    let log_filter = Filter::new().address(address).event_signature(signatures);
    let max_attempts = shared.policy.max_retries;

    let mut attempts: u32 = 0;
    let mut seen = SeenWindow::new(SEEN_WINDOW);

    loop {
        shared.set_state(address, TargetState::Connecting, attempts);
        let opened = tokio::select! {
            _ = cancel.cancelled() => return,
            opened = shared.source.watch_logs(&log_filter) => opened,
        };

        let failure = match opened {
            Ok(mut logs) => {
                attempts = 0;
                shared.set_state(address, TargetState::Running, attempts);
                tracing::info!("Watching {:?} logs on {address}", shared.family);
                loop {
                    let next = tokio::select! {
                        _ = cancel.cancelled() => return,
                        next = logs.next() => next,
                    };
                    match next {
                        Some(Ok(batch)) => {
                            if !shared.dispatch_batch(&batch, &mut seen, &cancel) {
                                return;
                            }
                        }
                        Some(Err(e)) => break e.to_string(),
                        None => break "log watch ended".to_string(),
                    }
                }
            }
            Err(e) => e.to_string(),
        };

        if cancel.is_cancelled() {
            return;
        }
        shared.report(StreamError::Transport {
            address,
            message: failure.clone(),
        });

        attempts += 1;
        if attempts > max_attempts {
            tracing::error!("Giving up on {address} after {max_attempts} reconnect attempts: {failure}");
            shared.set_state(address, TargetState::Dead, max_attempts);
            shared.report(StreamError::ReconnectExhausted {
                address,
                attempts: max_attempts,
            });
            return;
        }

        let delay = shared.policy.delay_for(attempts);
        tracing::warn!(
            "Watch on {address} failed ({failure}), reconnect {attempts}/{max_attempts} in {delay:?}"
        );
        shared.set_state(address, TargetState::Reconnecting, attempts);
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

struct TargetTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// A live feed of launchpad events pushed to registered listeners.
///
/// Listeners run sequentially on the target's task, in transport order; a
/// listener that blocks stalls delivery for its target. Filter changes apply
/// to logs arriving afterwards.
///
/// # Examples
///
/// ```ignore
/// let stream = sdk.curve_stream().await?;
/// stream.on_event(|event| {
///     println!("{}", serde_json::to_string(event)?);
///     Ok(())
/// });
/// stream.start();
/// // ...
/// stream.stop().await;
/// ```
pub struct EventStream {
    shared: Arc<Shared>,
    tasks: Mutex<HashMap<Address, TargetTask>>,
}

impl EventStream {
    fn new(
        source: Arc<dyn LogSource>,
        family: LogFamily,
        addresses: Vec<Address>,
        config: &StreamConfig,
    ) -> Self {
        let policy = RetryPolicy::for_stream(config);
        let targets = addresses
            .into_iter()
            .map(|address| (address, idle_status(address, policy.max_retries)))
            .collect();

        Self {
            shared: Arc::new(Shared {
                source,
                family,
                policy,
                running: AtomicBool::new(false),
                next_id: AtomicU64::new(1),
                filter: RwLock::new(EventFilter::all()),
                listeners: Mutex::new(Listeners::default()),
                targets: Mutex::new(targets),
            }),
            tasks: Mutex::new(HashMap::new()),
        }
    }

    /// Bonding-curve events emitted by `curve`.
    pub fn curve(source: Arc<dyn LogSource>, curve: Address, config: &StreamConfig) -> Self {
        Self::new(source, LogFamily::Curve, vec![curve], config)
    }

    /// Swaps across `pools`, each watched and reconnected independently.
    pub fn dex(source: Arc<dyn LogSource>, pools: Vec<Address>, config: &StreamConfig) -> Self {
        Self::new(source, LogFamily::Dex, pools, config)
    }

    /// Opens the watches. No-op while running.
    ///
    /// Must be called within a Tokio runtime.
    pub fn start(&self) {
        // The running flag and the task map change together under this lock.
        let mut tasks = lock(&self.tasks);
        if self.shared.running.swap(true, Ordering::SeqCst) {
            tracing::debug!("Stream already running");
            return;
        }

        let addresses: Vec<Address> = lock(&self.shared.targets).keys().copied().collect();
        for address in addresses {
            tasks.insert(address, self.spawn_target(address));
        }
        tracing::info!("Started {:?} stream on {} targets", self.shared.family, tasks.len());
    }

    fn spawn_target(&self, address: Address) -> TargetTask {
        self.shared.set_state(address, TargetState::Connecting, 0);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_target(self.shared.clone(), address, cancel.clone()));
        TargetTask { cancel, handle }
    }

    /// Closes every watch, clears all listeners and resets the counters.
    /// Idempotent. Once this returns no listener is invoked again.
    pub async fn stop(&self) {
        let tasks: Vec<TargetTask> = {
            let mut tasks = lock(&self.tasks);
            if !self.shared.running.swap(false, Ordering::SeqCst) {
                return;
            }
            tasks.drain().map(|(_, task)| task).collect()
        };
        for task in &tasks {
            task.cancel.cancel();
        }
        for task in tasks {
            if let Err(e) = task.handle.await
                && e.is_panic()
            {
                tracing::error!("Stream task panicked: {e}");
            }
        }

        *lock(&self.shared.listeners) = Listeners::default();
        for status in lock(&self.shared.targets).values_mut() {
            status.state = TargetState::Stopped;
            status.attempts = 0;
        }
        tracing::info!("Stopped {:?} stream", self.shared.family);
    }

    /// Whether `start` was called without a matching `stop`. Stays true when
    /// targets die; see [`EventStream::health`].
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    pub fn health(&self) -> StreamHealth {
        if !self.is_running() {
            return StreamHealth::Stopped;
        }
        let targets = lock(&self.shared.targets);
        let dead = targets
            .values()
            .filter(|s| s.state == TargetState::Dead)
            .count();
        let reconnecting = targets.values().filter(|s| s.is_reconnecting()).count();

        if !targets.is_empty() && dead == targets.len() {
            StreamHealth::Dead
        } else if dead > 0 || reconnecting > 0 {
            StreamHealth::Degraded
        } else {
            StreamHealth::Healthy
        }
    }

    /// Per-target reconnect state, ordered by address.
    pub fn reconnection_status(&self) -> Vec<TargetStatus> {
        let mut statuses: Vec<TargetStatus> =
            lock(&self.shared.targets).values().copied().collect();
        statuses.sort_by_key(|s| s.address);
        statuses
    }

    pub fn targets(&self) -> Vec<Address> {
        self.reconnection_status()
            .into_iter()
            .map(|s| s.address)
            .collect()
    }

    /// Adds a target; it is watched right away when the stream is running.
    pub fn add_target(&self, address: Address) {
        let mut tasks = lock(&self.tasks);
        {
            let mut targets = lock(&self.shared.targets);
            if targets.contains_key(&address) {
                return;
            }
            targets.insert(address, idle_status(address, self.shared.policy.max_retries));
        }
        if self.is_running() {
            tasks.insert(address, self.spawn_target(address));
        }
    }

    /// Stops watching `address`. Returns false if it was not a target.
    pub async fn remove_target(&self, address: Address) -> bool {
        if lock(&self.shared.targets).remove(&address).is_none() {
            return false;
        }
        let task = lock(&self.tasks).remove(&address);
        if let Some(task) = task {
            task.cancel.cancel();
            if let Err(e) = task.handle.await
                && e.is_panic()
            {
                tracing::error!("Stream task for {address} panicked: {e}");
            }
        }
        tracing::info!("Removed stream target {address}");
        true
    }

    pub fn on_event<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(&DomainEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = self.next_listener_id();
        lock(&self.shared.listeners)
            .events
            .push((id, Arc::new(callback)));
        id
    }

    pub fn on_error<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(&StreamError) + Send + Sync + 'static,
    {
        let id = self.next_listener_id();
        lock(&self.shared.listeners)
            .errors
            .push((id, Arc::new(callback)));
        id
    }

    /// Removes an event or error listener. Returns false if `id` is unknown.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = lock(&self.shared.listeners);
        let before = listeners.events.len() + listeners.errors.len();
        listeners.events.retain(|(listener, _)| *listener != id);
        listeners.errors.retain(|(listener, _)| *listener != id);
        before != listeners.events.len() + listeners.errors.len()
    }

    fn next_listener_id(&self) -> ListenerId {
        ListenerId(self.shared.next_id.fetch_add(1, Ordering::Relaxed))
    }

    pub fn filter(&self) -> EventFilter {
        self.shared
            .filter
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replaces the filter for logs arriving from now on.
    pub fn set_filter(&self, filter: EventFilter) {
        *self
            .shared
            .filter
            .write()
            .unwrap_or_else(PoisonError::into_inner) = filter;
    }

    pub fn set_token_filter(&self, tokens: impl IntoIterator<Item = Address>) {
        self.set_filter(self.filter().with_tokens(tokens));
    }

    pub fn set_event_types(&self, kinds: impl IntoIterator<Item = EventKind>) {
        self.set_filter(self.filter().with_kinds(kinds));
    }

    pub fn clear_filters(&self) {
        self.set_filter(EventFilter::all());
    }
}

fn idle_status(address: Address, max_attempts: u32) -> TargetStatus {
    TargetStatus {
        address,
        state: TargetState::Idle,
        attempts: 0,
        max_attempts,
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        for task in lock(&self.tasks).values() {
            task.cancel.cancel();
        }
    }
}
