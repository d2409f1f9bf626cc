//! Pooled instance handles.
//!
//! An [`Instance`] is a cheap clone of a shared handle. The host toggles its
//! active flag the same way it would toggle visibility on a scene object;
//! turning it off is what returns the instance to its pool. The engine wires
//! that up by registering a deactivation notifier on every instance it
//! constructs.

use core::fmt;
use core::ops::Deref;
use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use stockpile_system::scope::ScopeId;

use crate::key::PoolKey;

/// Process-unique identifier of a constructed instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(u64);

impl InstanceId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw numeric id.
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Event an instance reports when it goes from active to inactive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deactivation {
    /// Scope the instance belongs to.
    pub scope: ScopeId,
    /// Key of the pool that owns the instance.
    pub key: PoolKey,
    /// The instance that was deactivated.
    pub instance: InstanceId,
}

pub(crate) type Notifier = Box<dyn Fn(&Deactivation) + Send + Sync>;

struct InstanceInner<R> {
    id: InstanceId,
    scope: ScopeId,
    key: PoolKey,
    resource: R,
    active: AtomicBool,
    destroyed: AtomicBool,
    notifier: Notifier,
}

/// Shared handle to a pooled resource.
///
/// Dereferences to the resource. Clones refer to the same instance and share
/// its flags.
pub struct Instance<R> {
    inner: Arc<InstanceInner<R>>,
}

impl<R> Clone for Instance<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R> Instance<R> {
    /// Creates an inactive instance.
    pub(crate) fn new(scope: ScopeId, key: PoolKey, resource: R, notifier: Notifier) -> Self {
        Self {
            inner: Arc::new(InstanceInner {
                id: InstanceId::next(),
                scope,
                key,
                resource,
                active: AtomicBool::new(false),
                destroyed: AtomicBool::new(false),
                notifier,
            }),
        }
    }

    /// Returns the instance id.
    #[must_use]
    pub fn id(&self) -> InstanceId {
        self.inner.id
    }

    /// Returns the scope the instance belongs to.
    #[must_use]
    pub fn scope(&self) -> &ScopeId {
        &self.inner.scope
    }

    /// Returns the key of the owning pool.
    #[must_use]
    pub fn key(&self) -> &PoolKey {
        &self.inner.key
    }

    /// Returns the pooled resource.
    #[must_use]
    pub fn resource(&self) -> &R {
        &self.inner.resource
    }

    /// Returns `true` while the instance is checked out.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::SeqCst)
    }

    /// Returns `true` once the instance was invalidated.
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::SeqCst)
    }

    /// Mirrors the host's activation state onto the instance.
    ///
    /// Setting it to `false` is equivalent to [`deactivate`](Self::deactivate).
    /// Setting it to `true` on an instance that is still pooled keeps the
    /// engine from handing it out until it is deactivated again.
    pub fn set_active(&self, active: bool) {
        if active {
            self.inner.active.store(true, Ordering::SeqCst);
        } else {
            self.deactivate();
        }
    }

    /// Returns the instance to its pool.
    ///
    /// Only the transition from active to inactive is reported, so calling
    /// this twice is harmless. Returns whether a report was sent.
    pub fn deactivate(&self) -> bool {
        if !self.inner.active.swap(false, Ordering::SeqCst) {
            return false;
        }
        (self.inner.notifier)(&Deactivation {
            scope: self.inner.scope.clone(),
            key: self.inner.key.clone(),
            instance: self.inner.id,
        });
        true
    }

    /// Marks the backing resource as gone.
    ///
    /// The engine drops destroyed instances at its next scan and never passes
    /// them to the factory's `destroy`.
    pub fn mark_destroyed(&self) {
        self.inner.destroyed.store(true, Ordering::SeqCst);
        self.deactivate();
    }

    /// Returns `true` if both handles refer to the same instance.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn activate(&self) {
        self.inner.active.store(true, Ordering::SeqCst);
    }

    /// Invalidates the instance during teardown without reporting back.
    pub(crate) fn retire(&self) {
        self.inner.destroyed.store(true, Ordering::SeqCst);
        self.inner.active.store(false, Ordering::SeqCst);
    }
}

impl<R> Deref for Instance<R> {
    type Target = R;

    fn deref(&self) -> &R {
        &self.inner.resource
    }
}

impl<R> fmt::Debug for Instance<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("id", &self.inner.id)
            .field("scope", &self.inner.scope)
            .field("key", &self.inner.key)
            .field("active", &self.is_active())
            .field("destroyed", &self.is_destroyed())
            .finish_non_exhaustive()
    }
}
