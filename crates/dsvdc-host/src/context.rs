//! Shared plumbing handed to every entity at construction.
//!
//! Entities do not hold references to their parents. Instead they get
//! a cheap clonable [`HostContext`] that can schedule the debounced
//! auto-save and spawn cancellable timers which re-enter the entity
//! tree by path. This keeps the tree singly owned (host → vDC →
//! device → vdSD → components) without reference cycles.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, Weak};
use std::time::Duration;

use log::{debug, warn};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use dsvdc_proto::DsUid;

use crate::host::HostState;
use crate::store::{PropertyStore, StoreError};

pub(crate) type SharedState = Arc<Mutex<HostState>>;
pub(crate) type WeakState = Weak<Mutex<HostState>>;

/// Default debounce delay for auto-save.
pub const DEFAULT_AUTO_SAVE_DELAY: Duration = Duration::from_secs(1);

/// Which input collection of a vdSD a timer belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InputKind {
    Binary,
    Sensor,
    Button,
}

/// Addresses one input inside the entity tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct InputPath {
    pub vdsd: DsUid,
    pub kind: InputKind,
    pub index: u8,
}

/// Click-detector timer discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ClickTimerKind {
    Tip,
    MultiClick,
    HoldRepeat,
}

/// A timer fire routed back into the entity tree.
#[derive(Debug, Clone)]
pub(crate) enum TimerEvent {
    /// Alive-sign heartbeat for a binary/sensor input.
    AlivePush(InputPath),
    /// Deferred (rate-limited) push for a binary/sensor input.
    DeferredPush(InputPath),
    /// Click detector timer for a button input.
    Click(InputPath, ClickTimerKind),
}

/// Cancellable handle for a scheduled timer. Dropping the handle
/// cancels the timer.
#[derive(Debug)]
pub(crate) struct TimerHandle {
    task: JoinHandle<()>,
}

impl TimerHandle {
    pub fn cancel(self) {
        self.task.abort();
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Handle shared by all entities of one host.
#[derive(Clone)]
pub struct HostContext {
    pub(crate) state: WeakState,
    pub(crate) saves: SaveScheduler,
}

impl HostContext {
    pub(crate) fn new(state: WeakState, saves: SaveScheduler) -> Self {
        Self { state, saves }
    }

    /// Trigger the debounced auto-save.
    pub fn schedule_save(&self) {
        self.saves.schedule(self.state.clone());
    }

    /// Schedule `event` to re-enter the tree after `delay`.
    ///
    /// Timer tasks run only while the host is alive; once the state
    /// has been dropped the fire is a no-op.
    pub(crate) fn spawn_timer(&self, delay: Duration, event: TimerEvent) -> TimerHandle {
        let state = self.state.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(state) = state.upgrade() {
                let mut guard = state.lock().await;
                guard.handle_timer(event).await;
            }
        });
        TimerHandle { task }
    }
}

/// Debounced persistence scheduler owned by the host.
///
/// Tracked mutations call [`SaveScheduler::schedule`]; rapid edits
/// within the debounce window coalesce into one write. The actual
/// file I/O runs on a blocking worker with an immutable snapshot.
#[derive(Clone)]
pub struct SaveScheduler {
    inner: Arc<SaveInner>,
}

struct SaveInner {
    store: Option<PropertyStore>,
    delay: Duration,
    timer: StdMutex<Option<JoinHandle<()>>>,
    enabled: AtomicBool,
}

impl SaveScheduler {
    pub fn new(store: Option<PropertyStore>, delay: Duration) -> Self {
        Self {
            inner: Arc::new(SaveInner {
                store,
                delay,
                timer: StdMutex::new(None),
                enabled: AtomicBool::new(false),
            }),
        }
    }

    pub fn store(&self) -> Option<&PropertyStore> {
        self.inner.store.as_ref()
    }

    /// Enable or suppress auto-save (suppressed during construction
    /// and state restoration).
    pub fn set_enabled(&self, enabled: bool) {
        self.inner.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::SeqCst)
    }

    /// (Re)start the debounce timer.
    pub(crate) fn schedule(&self, state: WeakState) {
        if !self.is_enabled() || self.inner.store.is_none() {
            return;
        }
        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            tokio::time::sleep(inner.delay).await;
            let Some(state) = state.upgrade() else {
                return;
            };
            let Some(store) = inner.store.clone() else {
                return;
            };
            let snapshot = {
                let guard = state.lock().await;
                guard.state_file()
            };
            debug!("auto-saving host state");
            let result = tokio::task::spawn_blocking(move || store.save(&snapshot)).await;
            match result {
                Ok(Ok(())) => {}
                Ok(Err(err)) => warn!("auto-save failed: {err}"),
                Err(err) => warn!("auto-save worker failed: {err}"),
            }
        });
        let mut slot = self.inner.timer.lock().expect("save timer lock poisoned");
        if let Some(old) = slot.replace(task) {
            old.abort();
        }
    }

    /// Cancel the pending debounce timer without saving.
    pub(crate) fn cancel(&self) {
        let mut slot = self.inner.timer.lock().expect("save timer lock poisoned");
        if let Some(old) = slot.take() {
            old.abort();
        }
    }

    /// Cancel the debounce and save synchronously.
    pub(crate) async fn flush(&self, state: &SharedState) -> Result<(), StoreError> {
        self.cancel();
        let Some(store) = self.inner.store.clone() else {
            return Ok(());
        };
        let snapshot = {
            let guard = state.lock().await;
            guard.state_file()
        };
        tokio::task::spawn_blocking(move || store.save(&snapshot))
            .await
            .expect("save worker panicked")
    }
}
