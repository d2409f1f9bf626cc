//! Host lifecycle signals.
//!
//! [`HostSignals`] is the event bus through which the host announces scope
//! transitions and process shutdown. Subscribers are named; a name can only be
//! registered once, and handlers run synchronously in subscription order on
//! the thread that emitted the signal.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use stockpile_system::signal::{HostSignals, LifecycleSignal};
//!
//! let signals = HostSignals::new();
//! let ended = Arc::new(AtomicUsize::new(0));
//!
//! let counter = Arc::clone(&ended);
//! signals
//!     .subscribe("scene-audit", move |signal: &LifecycleSignal| {
//!         if let LifecycleSignal::ScopeEnd(_) = signal {
//!             counter.fetch_add(1, Ordering::SeqCst);
//!         }
//!     })
//!     .unwrap();
//!
//! let menu = signals.begin_scope("menu");
//! signals.end_scope(&menu);
//! assert_eq!(ended.load(Ordering::SeqCst), 1);
//! ```

use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::RwLock;

use crate::api::API;
use crate::scope::ScopeId;

// ─────────────────────────────────────────────────────────────────────────────
// LifecycleSignal
// ─────────────────────────────────────────────────────────────────────────────

/// A lifecycle transition announced by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleSignal {
    /// A scope became live.
    ScopeBegin(ScopeId),
    /// A scope ended; everything bound to it should be released.
    ScopeEnd(ScopeId),
    /// The host is shutting down.
    Shutdown,
}

impl LifecycleSignal {
    /// Returns the scope this signal refers to, if any.
    #[must_use]
    pub fn scope(&self) -> Option<&ScopeId> {
        match self {
            Self::ScopeBegin(scope) | Self::ScopeEnd(scope) => Some(scope),
            Self::Shutdown => None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SignalError
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can occur while managing signal subscriptions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignalError {
    /// A subscriber with this name is already registered.
    #[error("signal subscriber '{name}' is already registered")]
    DuplicateSubscriber {
        /// The duplicate subscriber name.
        name: String,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// HostSignals
// ─────────────────────────────────────────────────────────────────────────────

type Handler = Arc<dyn Fn(&LifecycleSignal) + Send + Sync>;

struct Subscriber {
    name: String,
    handler: Handler,
}

#[derive(Default)]
struct SignalsInner {
    subscribers: RwLock<Vec<Subscriber>>,
    live: RwLock<HashMap<u64, ScopeId>>,
    next_handle: AtomicU64,
    shut_down: AtomicBool,
}

/// Lifecycle event bus shared between the host and its plugins.
///
/// Cloning is cheap and yields a handle to the same bus, so a plugin can keep
/// a copy after looking it up with
/// [`Server::api`](crate::server::Server::api).
///
/// Handlers are invoked outside the subscriber lock, so a handler may itself
/// subscribe or unsubscribe without deadlocking.
#[derive(Clone, Default)]
pub struct HostSignals {
    inner: Arc<SignalsInner>,
}

impl API for HostSignals {}

impl HostSignals {
    /// Creates a bus with no subscribers and no live scopes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a named handler.
    ///
    /// # Errors
    ///
    /// Returns [`SignalError::DuplicateSubscriber`] if `name` is taken.
    pub fn subscribe<F>(&self, name: impl Into<String>, handler: F) -> Result<(), SignalError>
    where
        F: Fn(&LifecycleSignal) + Send + Sync + 'static,
    {
        let name = name.into();
        let mut subscribers = self.inner.subscribers.write();
        if subscribers.iter().any(|s| s.name == name) {
            return Err(SignalError::DuplicateSubscriber { name });
        }

        tracing::debug!(subscriber = %name, "signal subscriber registered");
        subscribers.push(Subscriber {
            name,
            handler: Arc::new(handler),
        });
        Ok(())
    }

    /// Removes a handler by name. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, name: &str) -> bool {
        let mut subscribers = self.inner.subscribers.write();
        let before = subscribers.len();
        subscribers.retain(|s| s.name != name);
        let removed = subscribers.len() != before;
        if removed {
            tracing::debug!(subscriber = %name, "signal subscriber removed");
        }
        removed
    }

    /// Returns `true` if a handler with this name is registered.
    #[must_use]
    pub fn is_subscribed(&self, name: &str) -> bool {
        self.inner.subscribers.read().iter().any(|s| s.name == name)
    }

    /// Returns the number of registered handlers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.read().len()
    }

    /// Delivers a signal to every handler, in subscription order.
    pub fn emit(&self, signal: &LifecycleSignal) {
        let handlers: Vec<Handler> = self
            .inner
            .subscribers
            .read()
            .iter()
            .map(|s| Arc::clone(&s.handler))
            .collect();

        tracing::trace!(?signal, handlers = handlers.len(), "emitting lifecycle signal");
        for handler in handlers {
            handler(signal);
        }
    }

    /// Allocates a fresh scope, marks it live and emits
    /// [`LifecycleSignal::ScopeBegin`].
    pub fn begin_scope(&self, label: impl Into<Arc<str>>) -> ScopeId {
        let handle = self.inner.next_handle.fetch_add(1, Ordering::Relaxed) + 1;
        let scope = ScopeId::new(handle, label);
        self.inner.live.write().insert(handle, scope.clone());

        self.emit(&LifecycleSignal::ScopeBegin(scope.clone()));
        scope
    }

    /// Ends a live scope and emits [`LifecycleSignal::ScopeEnd`].
    ///
    /// Returns `false` without emitting if the scope is not live, so ending a
    /// scope twice is harmless.
    pub fn end_scope(&self, scope: &ScopeId) -> bool {
        let Some(scope) = self.inner.live.write().remove(&scope.handle()) else {
            return false;
        };
        self.emit(&LifecycleSignal::ScopeEnd(scope));
        true
    }

    /// Returns the scopes begun through this bus and not yet ended.
    #[must_use]
    pub fn live_scopes(&self) -> Vec<ScopeId> {
        let mut scopes: Vec<ScopeId> = self.inner.live.read().values().cloned().collect();
        scopes.sort_by_key(ScopeId::handle);
        scopes
    }

    /// Emits [`LifecycleSignal::Shutdown`]. Only the first call emits.
    pub fn shutdown(&self) -> bool {
        if self.inner.shut_down.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.emit(&LifecycleSignal::Shutdown);
        true
    }

    /// Returns `true` once [`shutdown()`](Self::shutdown) has been called.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.inner.shut_down.load(Ordering::Acquire)
    }
}
