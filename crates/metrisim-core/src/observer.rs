//! ObserverRegistry: typed, synchronous, ordered listener dispatch.
//!
//! Listeners are keyed by a closed event-kind enum. `notify` snapshots the
//! listener list for the kind before calling anything, so a listener may
//! subscribe or unsubscribe (any kind) while a dispatch is running. A
//! listener removed mid-dispatch still receives the in-flight payload.

use std::any::Any;
use std::fmt;
use std::hash::Hash;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use crate::error::{Result, SimError};

type Listener<P> = Arc<dyn Fn(&P) -> Result<()> + Send + Sync>;
type ErrorHook<K> = Box<dyn Fn(K, &SimError) + Send + Sync>;

/// Handle returned by `subscribe`; pass it to `unsubscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription<K> {
    kind: K,
    id: u64,
}

impl<K: Copy> Subscription<K> {
    pub fn kind(&self) -> K {
        self.kind
    }
}

/// Outcome of one `notify` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failed: usize,
}

struct Entry<P> {
    id: u64,
    listener: Listener<P>,
}

pub struct ObserverRegistry<K, P> {
    listeners: DashMap<K, Vec<Entry<P>>>,
    next_id: AtomicU64,
    on_listener_error: ErrorHook<K>,
}

impl<K, P> fmt::Debug for ObserverRegistry<K, P>
where
    K: Copy + Eq + Hash + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: Vec<(K, usize)> = self.listeners.iter().map(|e| (*e.key(), e.value().len())).collect();
        f.debug_struct("ObserverRegistry").field("listeners", &counts).finish()
    }
}

impl<K, P> Default for ObserverRegistry<K, P>
where
    K: Copy + Eq + Hash + fmt::Debug,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, P> ObserverRegistry<K, P>
where
    K: Copy + Eq + Hash + fmt::Debug,
{
    pub fn new() -> Self {
        Self {
            listeners: DashMap::new(),
            next_id: AtomicU64::new(1),
            on_listener_error: Box::new(|_, _| {}),
        }
    }

    /// Replace the listener-error hook (default: no-op).
    pub fn set_error_hook<F>(&mut self, hook: F)
    where
        F: Fn(K, &SimError) + Send + Sync + 'static,
    {
        self.on_listener_error = Box::new(hook);
    }

    /// Append `listener` to `kind`'s ordered list.
    pub fn subscribe<F>(&self, kind: K, listener: F) -> Subscription<K>
    where
        F: Fn(&P) -> Result<()> + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.entry(kind).or_insert_with(Vec::new).push(Entry {
            id,
            listener: Arc::new(listener),
        });
        tracing::debug!(kind = ?kind, id, "listener subscribed");
        Subscription { kind, id }
    }

    /// Remove a listener. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, sub: &Subscription<K>) -> bool {
        let Some(mut list) = self.listeners.get_mut(&sub.kind) else {
            return false;
        };
        let before = list.len();
        list.retain(|e| e.id != sub.id);
        let removed = list.len() != before;
        if removed {
            tracing::debug!(kind = ?sub.kind, id = sub.id, "listener unsubscribed");
        }
        removed
    }

    pub fn listener_count(&self, kind: K) -> usize {
        self.listeners.get(&kind).map(|l| l.len()).unwrap_or(0)
    }

    /// Call every listener of `kind` in subscription order.
    ///
    /// A failing or panicking listener is reported through the error hook and
    /// skipped; the remaining listeners still run and nothing propagates.
    pub fn notify(&self, kind: K, payload: &P) -> DispatchReport {
        let targets: Vec<Listener<P>> = match self.listeners.get(&kind) {
            Some(list) => list.iter().map(|e| Arc::clone(&e.listener)).collect(),
            None => return DispatchReport::default(),
        };

        let mut report = DispatchReport::default();
        for listener in targets {
            let outcome = catch_unwind(AssertUnwindSafe(|| (*listener)(payload)))
                .unwrap_or_else(|panic| Err(SimError::Listener(panic_message(&*panic))));
            match outcome {
                Ok(()) => report.delivered += 1,
                Err(err) => {
                    report.failed += 1;
                    tracing::warn!(kind = ?kind, error = %err, "listener failed");
                    (self.on_listener_error)(kind, &err);
                }
            }
        }
        report
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("listener panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("listener panicked: {s}")
    } else {
        "listener panicked".to_string()
    }
}
