//! Host lifecycle wiring.
//!
//! The [`LifecycleCoordinator`] listens on
//! [`HostSignals`](stockpile_system::signal::HostSignals) and drives the
//! [`PoolManager`]:
//!
//! | Signal | Effect |
//! |--------|--------|
//! | `ScopeBegin(s)` | scope state for `s` is created |
//! | `ScopeEnd(s)` | `s` is torn down, then the reclamation hook runs |
//! | `Shutdown` | every scope is torn down and the coordinator unsubscribes |

use core::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use stockpile_system::resource::GlobalResource;
use stockpile_system::signal::{HostSignals, LifecycleSignal, SignalError};

use crate::engine::{PoolManager, TeardownReport};
use crate::factory::ResourceFactory;

// ─────────────────────────────────────────────────────────────────────────────
// ReclaimHook
// ─────────────────────────────────────────────────────────────────────────────

/// Advisory host hook asking to release idle backing memory.
///
/// Implemented for closures, so `Arc::new(|| allocator.trim())` works.
pub trait ReclaimHook: Send + Sync + 'static {
    /// Reclaims whatever the host can.
    fn reclaim(&self);
}

impl<T: Fn() + Send + Sync + 'static> ReclaimHook for T {
    fn reclaim(&self) {
        self();
    }
}

/// A [`ReclaimHook`] that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopReclaim;

impl ReclaimHook for NoopReclaim {
    fn reclaim(&self) {}
}

// ─────────────────────────────────────────────────────────────────────────────
// LifecycleCoordinator
// ─────────────────────────────────────────────────────────────────────────────

/// Name under which the coordinator subscribes to [`HostSignals`].
pub const SUBSCRIBER_NAME: &str = "stockpile::pool";

struct CoordinatorInner<F: ResourceFactory> {
    manager: PoolManager<F>,
    subscribed: AtomicBool,
    signals: Mutex<Option<HostSignals>>,
}

/// Connects host lifecycle signals to a [`PoolManager`].
pub struct LifecycleCoordinator<F: ResourceFactory> {
    inner: Arc<CoordinatorInner<F>>,
}

impl<F: ResourceFactory> Clone for LifecycleCoordinator<F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<F: ResourceFactory> GlobalResource for LifecycleCoordinator<F> {}

impl<F: ResourceFactory> LifecycleCoordinator<F> {
    /// Creates an unsubscribed coordinator for `manager`.
    #[must_use]
    pub fn new(manager: PoolManager<F>) -> Self {
        Self {
            inner: Arc::new(CoordinatorInner {
                manager,
                subscribed: AtomicBool::new(false),
                signals: Mutex::new(None),
            }),
        }
    }

    /// Returns the manager this coordinator drives.
    #[must_use]
    pub fn manager(&self) -> &PoolManager<F> {
        &self.inner.manager
    }

    /// Subscribes to `signals`. Idempotent: returns `false` if already
    /// subscribed.
    ///
    /// A stale subscription left on the bus under the same name (from an
    /// earlier coordinator) is replaced.
    pub fn subscribe(&self, signals: &HostSignals) -> bool {
        if self.inner.subscribed.swap(true, Ordering::SeqCst) {
            return false;
        }

        let weak = Arc::downgrade(&self.inner);
        let handler = move |signal: &LifecycleSignal| Self::dispatch(&weak, signal);

        if let Err(SignalError::DuplicateSubscriber { name }) =
            signals.subscribe(SUBSCRIBER_NAME, handler.clone())
        {
            tracing::debug!(subscriber = %name, "replacing stale pool subscription");
            signals.unsubscribe(&name);
            if let Err(error) = signals.subscribe(SUBSCRIBER_NAME, handler) {
                tracing::error!(%error, "pool lifecycle subscription failed");
                self.inner.subscribed.store(false, Ordering::SeqCst);
                return false;
            }
        }

        *self.inner.signals.lock() = Some(signals.clone());
        tracing::debug!(subscriber = SUBSCRIBER_NAME, "pool lifecycle subscribed");
        true
    }

    /// Removes the subscription. Returns `false` if there was none.
    pub fn unsubscribe(&self) -> bool {
        if !self.inner.subscribed.swap(false, Ordering::SeqCst) {
            return false;
        }
        if let Some(signals) = self.inner.signals.lock().take() {
            signals.unsubscribe(SUBSCRIBER_NAME);
        }
        true
    }

    /// Returns `true` while subscribed.
    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.inner.subscribed.load(Ordering::SeqCst)
    }

    /// Applies one lifecycle signal to the manager.
    pub fn handle(&self, signal: &LifecycleSignal) {
        Self::apply(&self.inner, signal);
    }

    /// Tears down every scope and unsubscribes.
    pub fn shutdown(&self) -> Vec<TeardownReport> {
        let reports = self.inner.manager.teardown_all();
        self.unsubscribe();
        tracing::info!(scopes = reports.len(), "pool subsystem shut down");
        reports
    }

    fn dispatch(weak: &Weak<CoordinatorInner<F>>, signal: &LifecycleSignal) {
        if let Some(inner) = weak.upgrade() {
            Self::apply(&inner, signal);
        }
    }

    fn apply(inner: &Arc<CoordinatorInner<F>>, signal: &LifecycleSignal) {
        match signal {
            LifecycleSignal::ScopeBegin(scope) => {
                tracing::debug!(%scope, "scope begin");
                inner.manager.begin_scope(scope);
            }
            LifecycleSignal::ScopeEnd(scope) => {
                tracing::debug!(%scope, "scope end");
                inner.manager.teardown_scope(scope);
            }
            LifecycleSignal::Shutdown => {
                let coordinator = Self {
                    inner: Arc::clone(inner),
                };
                coordinator.shutdown();
            }
        }
    }
}
