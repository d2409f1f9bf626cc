//! A single (scope, key) pool.
//!
//! The pool keeps its instances in two places: a FIFO queue of idle
//! instances and a map of checked-out ones. Every mutation of either happens
//! under the pool's [`KeyLock`]. Deactivation reports, which arrive from host
//! callbacks at arbitrary times, are queued on the side and applied by
//! whoever holds the lock next.
//!
//! An instance is in exactly one of {idle queue, active map} until it is
//! destroyed, so `total == idle + active` at every lock release.

use core::ops::AddAssign;
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::collections::VecDeque;
use std::sync::Arc;

use hashbrown::HashMap;
use stockpile_system::scope::ScopeId;

use crate::error::PoolError;
use crate::factory::ResourceFactory;
use crate::instance::{Deactivation, Instance, InstanceId};
use crate::key::PoolKey;
use crate::lock::{KeyLock, KeyLockGuard};

// ─────────────────────────────────────────────────────────────────────────────
// PoolStats
// ─────────────────────────────────────────────────────────────────────────────

/// Instance counts of a pool or an aggregate of pools.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Instances alive in the pool, idle or checked out.
    pub total: usize,
    /// Instances currently checked out.
    pub active: usize,
}

impl PoolStats {
    /// Creates stats from raw counts.
    #[must_use]
    pub const fn new(total: usize, active: usize) -> Self {
        Self { total, active }
    }

    /// Returns the number of idle instances.
    #[must_use]
    pub const fn idle(&self) -> usize {
        self.total.saturating_sub(self.active)
    }
}

impl AddAssign for PoolStats {
    fn add_assign(&mut self, rhs: Self) {
        self.total += rhs.total;
        self.active += rhs.active;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Slots
// ─────────────────────────────────────────────────────────────────────────────

/// The lock-protected contents of a pool.
pub(crate) struct Slots<R> {
    idle: VecDeque<Instance<R>>,
    active: HashMap<InstanceId, Instance<R>>,
}

impl<R> Default for Slots<R> {
    fn default() -> Self {
        Self {
            idle: VecDeque::new(),
            active: HashMap::new(),
        }
    }
}

impl<R> Slots<R> {
    /// Number of instances the pool owns right now.
    pub(crate) fn len(&self) -> usize {
        self.idle.len() + self.active.len()
    }
}

pub(crate) type SlotsGuard<'a, F> = KeyLockGuard<'a, Slots<<F as ResourceFactory>::Resource>>;

/// Outcome of destroying every instance of a pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Sweep {
    pub(crate) destroyed: usize,
    pub(crate) failed: usize,
}

// ─────────────────────────────────────────────────────────────────────────────
// Pool
// ─────────────────────────────────────────────────────────────────────────────

/// Instances of one key within one scope.
pub(crate) struct Pool<F: ResourceFactory> {
    factory: Arc<F>,
    scope: ScopeId,
    key: PoolKey,
    slots: KeyLock<Slots<F::Resource>>,
    /// Deactivations reported but not yet applied.
    released: parking_lot::Mutex<Vec<InstanceId>>,
    total: AtomicUsize,
    active: AtomicUsize,
    /// Set by [`abandon`](Self::abandon): sweeps forget instead of destroy.
    abandoned: AtomicBool,
}

impl<F: ResourceFactory> Pool<F> {
    pub(crate) fn new(factory: Arc<F>, scope: ScopeId, key: PoolKey) -> Self {
        Self {
            factory,
            scope,
            key,
            slots: KeyLock::new(Slots::default()),
            released: parking_lot::Mutex::new(Vec::new()),
            total: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            abandoned: AtomicBool::new(false),
        }
    }

    /// Returns the key this pool serves.
    #[must_use]
    pub fn key(&self) -> &PoolKey {
        &self.key
    }

    /// Returns `true` once the pool's scope was torn down.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.slots.is_disposed()
    }

    /// Current counts. Reports queued but not yet applied already count as
    /// released.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let pending = self.released.lock().len();
        PoolStats {
            total: self.total.load(Ordering::SeqCst),
            active: self.active.load(Ordering::SeqCst).saturating_sub(pending),
        }
    }

    pub(crate) async fn lock(&self) -> SlotsGuard<'_, F> {
        self.slots.lock().await
    }

    pub(crate) fn try_lock(&self) -> Option<SlotsGuard<'_, F>> {
        self.slots.try_lock()
    }

    pub(crate) fn dispose(&self) -> bool {
        self.slots.dispose()
    }

    /// Disposes the pool so that its instances are forgotten, never passed
    /// to the factory's `destroy`, by whoever sweeps it.
    pub(crate) fn abandon(&self) -> bool {
        self.abandoned.store(true, Ordering::SeqCst);
        self.dispose()
    }

    /// Fails with [`PoolError::LockDisposed`] after sweeping if the pool was
    /// torn down while the caller waited for or held the lock.
    pub(crate) fn ensure_live(&self, slots: &mut SlotsGuard<'_, F>) -> Result<(), PoolError> {
        if !slots.is_disposed() {
            return Ok(());
        }
        let sweep = self.sweep(slots);
        tracing::debug!(
            scope = %self.scope,
            key = %self.key,
            destroyed = sweep.destroyed,
            "swept pool of a torn-down scope"
        );
        Err(PoolError::LockDisposed {
            scope: self.scope.clone(),
            key: self.key.clone(),
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Construction
    // ─────────────────────────────────────────────────────────────────────────

    /// Builds one new, inactive instance through the factory.
    ///
    /// The instance reports its deactivation back to this pool for as long as
    /// the pool is alive.
    pub(crate) async fn construct(self: &Arc<Self>) -> Result<Instance<F::Resource>, PoolError> {
        let resource = match self.factory.construct(&self.key).await {
            Ok(resource) => resource,
            Err(source) => {
                tracing::error!(
                    scope = %self.scope,
                    key = %self.key,
                    error = %source,
                    "resource construction failed"
                );
                return Err(PoolError::ConstructionFailed {
                    key: self.key.clone(),
                    source: Some(source),
                });
            }
        };

        let pool = Arc::downgrade(self);
        let instance = Instance::new(
            self.scope.clone(),
            self.key.clone(),
            resource,
            Box::new(move |event: &Deactivation| {
                if let Some(pool) = pool.upgrade() {
                    pool.report_deactivation(event.instance);
                }
            }),
        );
        tracing::trace!(scope = %self.scope, key = %self.key, instance = %instance.id(), "constructed");
        Ok(instance)
    }

    /// Adds a fresh instance to the back of the idle queue.
    pub(crate) fn push_idle(&self, slots: &mut Slots<F::Resource>, instance: Instance<F::Resource>) {
        slots.idle.push_back(instance);
        self.total.fetch_add(1, Ordering::SeqCst);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Checkout
    // ─────────────────────────────────────────────────────────────────────────

    /// Scans the idle queue once and checks out the first reusable instance.
    ///
    /// The scan is bounded by the queue length at its start. Destroyed
    /// instances are dropped for good; instances the host re-activated behind
    /// the pool's back stay queued.
    pub(crate) fn take_reusable(
        &self,
        slots: &mut Slots<F::Resource>,
    ) -> Option<Instance<F::Resource>> {
        for _ in 0..slots.idle.len() {
            let instance = slots.idle.pop_front()?;

            if instance.is_destroyed() {
                self.total.fetch_sub(1, Ordering::SeqCst);
                tracing::trace!(key = %self.key, instance = %instance.id(), "dropped destroyed instance");
                continue;
            }

            if !instance.is_active() && !slots.active.contains_key(&instance.id()) {
                instance.activate();
                slots.active.insert(instance.id(), instance.clone());
                self.active.fetch_add(1, Ordering::SeqCst);
                return Some(instance);
            }

            slots.idle.push_back(instance);
        }
        None
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Release
    // ─────────────────────────────────────────────────────────────────────────

    /// Queues a deactivation and applies it right away if the lock is free.
    pub(crate) fn report_deactivation(&self, instance: InstanceId) {
        self.released.lock().push(instance);
        self.settle();
    }

    /// Moves every reported instance from the active map back to the idle
    /// queue. Destroyed instances leave the pool instead.
    pub(crate) fn apply_releases(&self, slots: &mut Slots<F::Resource>) {
        let reported = core::mem::take(&mut *self.released.lock());
        for id in reported {
            let Some(instance) = slots.active.remove(&id) else {
                continue;
            };
            self.active.fetch_sub(1, Ordering::SeqCst);
            if instance.is_destroyed() {
                self.total.fetch_sub(1, Ordering::SeqCst);
            } else {
                slots.idle.push_back(instance);
            }
        }
    }

    /// Finishes work left behind by concurrent callers.
    ///
    /// Must be called after every lock release. If the lock is busy the
    /// current holder settles on its own release, so nothing is lost:
    /// pending deactivations get applied, and a pool whose scope was torn
    /// down while it was busy gets swept.
    pub(crate) fn settle(&self) {
        loop {
            let pending = !self.released.lock().is_empty();
            if !pending && !self.is_disposed() {
                return;
            }
            let Some(mut slots) = self.try_lock() else {
                return;
            };
            if slots.is_disposed() {
                self.sweep(&mut slots);
                return;
            }
            self.apply_releases(&mut slots);
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Teardown
    // ─────────────────────────────────────────────────────────────────────────

    /// Destroys every instance still owned by the pool and empties it.
    ///
    /// Best effort: a failing destroy is logged and the sweep moves on.
    /// Instances already marked destroyed are dropped without calling the
    /// factory. An abandoned pool drops everything without calling it.
    pub(crate) fn sweep(&self, slots: &mut Slots<F::Resource>) -> Sweep {
        self.released.lock().clear();
        let idle = core::mem::take(&mut slots.idle);
        let active = core::mem::take(&mut slots.active);
        self.total.store(0, Ordering::SeqCst);
        self.active.store(0, Ordering::SeqCst);

        let mut sweep = Sweep::default();
        if self.abandoned.load(Ordering::SeqCst) {
            tracing::debug!(
                scope = %self.scope,
                key = %self.key,
                forgotten = idle.len() + active.len(),
                "dropped instances of an abandoned pool"
            );
            return sweep;
        }
        for instance in idle.into_iter().chain(active.into_values()) {
            if instance.is_destroyed() {
                continue;
            }
            instance.retire();
            match self.factory.destroy(&self.key, instance.resource()) {
                Ok(()) => sweep.destroyed += 1,
                Err(error) => {
                    sweep.failed += 1;
                    tracing::warn!(
                        scope = %self.scope,
                        key = %self.key,
                        instance = %instance.id(),
                        %error,
                        "failed to destroy pooled instance"
                    );
                }
            }
        }
        sweep
    }
}

impl<F: ResourceFactory> core::fmt::Debug for Pool<F> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Pool")
            .field("scope", &self.scope)
            .field("key", &self.key)
            .field("stats", &self.stats())
            .field("disposed", &self.is_disposed())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ConstructionError, DestroyError};
    use async_trait::async_trait;
    use core::sync::atomic::AtomicU32;

    #[derive(Default)]
    struct Counting {
        built: AtomicU32,
        destroyed: AtomicU32,
    }

    #[async_trait]
    impl ResourceFactory for Counting {
        type Resource = u32;

        async fn construct(&self, _key: &PoolKey) -> Result<u32, ConstructionError> {
            Ok(self.built.fetch_add(1, Ordering::SeqCst))
        }

        fn destroy(&self, _key: &PoolKey, _resource: &u32) -> Result<(), DestroyError> {
            self.destroyed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn pool() -> Arc<Pool<Counting>> {
        Arc::new(Pool::new(
            Arc::new(Counting::default()),
            ScopeId::new(1, "unit"),
            PoolKey::from("crate"),
        ))
    }

    async fn checkout(pool: &Arc<Pool<Counting>>) -> Instance<u32> {
        let mut slots = pool.lock().await;
        if let Some(instance) = pool.take_reusable(&mut slots) {
            return instance;
        }
        let instance = pool.construct().await.expect("construct");
        pool.push_idle(&mut slots, instance);
        pool.take_reusable(&mut slots).expect("fresh instance is reusable")
    }

    #[tokio::test]
    async fn checkout_then_deactivate_returns_to_idle() {
        let pool = pool();

        let instance = checkout(&pool).await;
        assert!(instance.is_active());
        assert_eq!(pool.stats(), PoolStats::new(1, 1));

        // Lock is free, so the report is applied immediately.
        instance.deactivate();
        assert_eq!(pool.stats(), PoolStats::new(1, 0));
        assert!(pool.released.lock().is_empty());

        let again = checkout(&pool).await;
        assert!(again.ptr_eq(&instance));
        assert_eq!(pool.factory.built.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn report_while_locked_is_applied_by_holder() {
        let pool = pool();
        let instance = checkout(&pool).await;

        let mut slots = pool.lock().await;
        instance.deactivate();
        assert_eq!(pool.released.lock().len(), 1);
        assert_eq!(pool.stats().active, 0, "pending reports count as released");

        pool.apply_releases(&mut slots);
        assert_eq!(slots.idle.len(), 1);
        assert!(slots.active.is_empty());
        drop(slots);
        pool.settle();

        assert_eq!(pool.stats(), PoolStats::new(1, 0));
    }

    #[tokio::test]
    async fn scan_skips_reactivated_and_drops_destroyed() {
        let pool = pool();
        let a = checkout(&pool).await;
        let b = checkout(&pool).await;
        a.deactivate();
        b.deactivate();

        // Host flips `a` back on while it is pooled; `b` is invalidated.
        a.set_active(true);
        b.mark_destroyed();

        let mut slots = pool.lock().await;
        assert!(pool.take_reusable(&mut slots).is_none());
        assert_eq!(slots.idle.len(), 1);
        assert_eq!(slots.len(), 1);
        drop(slots);

        assert_eq!(pool.stats().total, 1);
    }

    #[tokio::test]
    async fn destroyed_while_active_leaves_pool_on_release() {
        let pool = pool();
        let instance = checkout(&pool).await;

        instance.mark_destroyed();
        assert_eq!(pool.stats(), PoolStats::new(0, 0));
    }

    #[tokio::test]
    async fn sweep_destroys_everything_once() {
        let pool = pool();
        let a = checkout(&pool).await;
        let _b = checkout(&pool).await;
        a.deactivate();
        let c = checkout(&pool).await;
        c.mark_destroyed();

        let mut slots = pool.lock().await;
        let sweep = pool.sweep(&mut slots);
        assert_eq!(slots.len(), 0);
        drop(slots);

        // `c` reused `a` and was invalidated, so only `_b` is left to destroy.
        assert!(c.ptr_eq(&a));
        assert_eq!(sweep, Sweep { destroyed: 1, failed: 0 });
        assert_eq!(pool.stats(), PoolStats::default());
    }

    #[tokio::test]
    async fn disposed_pool_is_swept_by_settle() {
        let pool = pool();
        let instance = checkout(&pool).await;

        let held = pool.lock().await;
        pool.dispose();
        assert!(pool.try_lock().is_none());
        drop(held);
        pool.settle();

        assert!(instance.is_destroyed());
        assert_eq!(pool.factory.destroyed.load(Ordering::SeqCst), 1);
        assert_eq!(pool.stats(), PoolStats::default());
    }

    #[tokio::test]
    async fn abandoned_pool_is_emptied_without_destroy() {
        let pool = pool();
        let held = checkout(&pool).await;
        let idle = checkout(&pool).await;
        idle.deactivate();

        let slots = pool.lock().await;
        assert!(pool.abandon());
        drop(slots);
        pool.settle();

        assert_eq!(pool.stats(), PoolStats::default());
        assert_eq!(pool.factory.destroyed.load(Ordering::SeqCst), 0);
        assert!(!held.is_destroyed());

        // The old holder's release finds nothing to return to.
        assert!(held.deactivate());
        assert_eq!(pool.stats(), PoolStats::default());
    }

    #[test]
    fn stats_arithmetic() {
        let mut sum = PoolStats::new(3, 1);
        sum += PoolStats::new(2, 2);
        assert_eq!(sum, PoolStats::new(5, 3));
        assert_eq!(sum.idle(), 2);
    }
}
