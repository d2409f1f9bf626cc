//! The pool manager: acquisition, warm-up, statistics and teardown.
//!
//! Every operation naming a (scope, key) resolves the scope state (creating
//! it if needed), then the pool and its key lock, and runs its mutating
//! section under that lock. Different keys and different scopes never
//! contend.
//!
//! ```text
//! acquire(scope, key)
//!   └─ registry.scope_state(scope) ─ state.pool(key) ─ pool.lock().await
//!        ├─ disposed?            → sweep, LockDisposed
//!        ├─ apply queued releases
//!        ├─ take_reusable        → Ok(instance)
//!        └─ construct, enqueue, take_reusable again
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use stockpile_system::resource::GlobalResource;
use stockpile_system::scope::ScopeId;

use crate::config::PoolConfig;
use crate::error::PoolError;
use crate::factory::ResourceFactory;
use crate::instance::Instance;
use crate::key::PoolKey;
use crate::lifecycle::{NoopReclaim, ReclaimHook};
use crate::pool::{Pool, PoolStats, Sweep};
use crate::registry::ScopeRegistry;
use crate::scope::ScopeState;

// ─────────────────────────────────────────────────────────────────────────────
// TeardownReport
// ─────────────────────────────────────────────────────────────────────────────

/// What a scope teardown did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeardownReport {
    /// The scope that was torn down.
    pub scope: ScopeId,
    /// Instances handed to the factory's `destroy` successfully.
    pub destroyed: usize,
    /// Instances whose `destroy` failed.
    pub failed: usize,
    /// Pools busy with an in-flight operation at teardown time. Their holder
    /// sweeps them when it releases the lock.
    pub deferred: usize,
}

impl TeardownReport {
    fn new(scope: ScopeId) -> Self {
        Self {
            scope,
            destroyed: 0,
            failed: 0,
            deferred: 0,
        }
    }

    fn record(&mut self, sweep: Sweep) {
        self.destroyed += sweep.destroyed;
        self.failed += sweep.failed;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// PoolManager
// ─────────────────────────────────────────────────────────────────────────────

struct ManagerInner<F: ResourceFactory> {
    factory: Arc<F>,
    registry: ScopeRegistry<F>,
    config: PoolConfig,
    reclaim: Arc<dyn ReclaimHook>,
}

/// Keyed object pools, grouped by scope.
///
/// Cheap to clone; clones share all pools. Registered as a global resource by
/// [`PoolPlugin`](crate::plugin::PoolPlugin).
///
/// # Example
///
/// ```
/// use async_trait::async_trait;
/// use stockpile_pool::prelude::*;
/// use stockpile_system::scope::ScopeId;
///
/// struct Numbers;
///
/// #[async_trait]
/// impl ResourceFactory for Numbers {
///     type Resource = u64;
///
///     async fn construct(&self, _key: &PoolKey) -> Result<u64, ConstructionError> {
///         Ok(7)
///     }
/// }
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let manager = PoolManager::new(Numbers);
/// let scope = ScopeId::new(1, "level-1");
///
/// let first = manager.acquire(&scope, "seven").await?;
/// assert_eq!(*first, 7);
/// first.deactivate();
///
/// let again = manager.acquire(&scope, "seven").await?;
/// assert!(again.ptr_eq(&first));
/// assert_eq!(manager.stats(&scope, "seven"), PoolStats::new(1, 1));
///
/// let report = manager.teardown_scope(&scope);
/// assert_eq!(report.destroyed, 1);
/// # Ok::<(), PoolError>(())
/// # }).unwrap();
/// ```
pub struct PoolManager<F: ResourceFactory> {
    inner: Arc<ManagerInner<F>>,
}

impl<F: ResourceFactory> Clone for PoolManager<F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<F: ResourceFactory> GlobalResource for PoolManager<F> {}

impl<F: ResourceFactory> PoolManager<F> {
    /// Creates a manager with the default configuration and no reclamation
    /// hook.
    #[must_use]
    pub fn new(factory: F) -> Self {
        Self::with_settings(Arc::new(factory), PoolConfig::default(), Arc::new(NoopReclaim))
    }

    /// Creates a manager with explicit configuration and reclamation hook.
    #[must_use]
    pub fn with_settings(
        factory: Arc<F>,
        config: PoolConfig,
        reclaim: Arc<dyn ReclaimHook>,
    ) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                registry: ScopeRegistry::new(Arc::clone(&factory)),
                factory,
                config,
                reclaim,
            }),
        }
    }

    /// Returns the factory.
    #[must_use]
    pub fn factory(&self) -> &F {
        &self.inner.factory
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    pub(crate) fn factory_handle(&self) -> Arc<F> {
        Arc::clone(&self.inner.factory)
    }

    pub(crate) fn reclaim_hook(&self) -> Arc<dyn ReclaimHook> {
        Arc::clone(&self.inner.reclaim)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Scopes
    // ─────────────────────────────────────────────────────────────────────────

    /// Makes sure state exists for `scope`. Idempotent.
    pub fn begin_scope(&self, scope: &ScopeId) {
        self.inner.registry.scope_state(scope);
    }

    /// Returns `true` if the scope has live state.
    #[must_use]
    pub fn has_scope(&self, scope: &ScopeId) -> bool {
        self.inner.registry.get(scope).is_some()
    }

    /// Returns the scopes with live state, ordered by handle.
    #[must_use]
    pub fn scopes(&self) -> Vec<ScopeId> {
        self.inner.registry.scopes()
    }

    /// Returns the number of scopes with live state.
    #[must_use]
    pub fn scope_count(&self) -> usize {
        self.inner.registry.len()
    }

    fn pool_for(&self, scope: &ScopeId, key: &PoolKey) -> Result<Arc<Pool<F>>, PoolError> {
        self.inner.registry.scope_state(scope).pool(key)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Warm-up
    // ─────────────────────────────────────────────────────────────────────────

    /// Grows the pool for (scope, key) to at least `count` instances.
    ///
    /// Constructs `count - current_total` inactive instances, or none if the
    /// pool is already that large, so calling it twice constructs only once.
    /// Returns how many instances were constructed.
    ///
    /// # Errors
    ///
    /// - [`PoolError::ConstructionFailed`] if the factory fails; instances
    ///   built before the failure stay in the pool.
    /// - [`PoolError::LockDisposed`] if the scope was torn down meanwhile.
    pub async fn create_pool(
        &self,
        scope: &ScopeId,
        key: impl Into<PoolKey>,
        count: usize,
    ) -> Result<usize, PoolError> {
        let key = key.into();
        let pool = self.pool_for(scope, &key)?;
        let result = Self::warm(&pool, count).await;
        pool.settle();

        if let Ok(created) = &result {
            tracing::debug!(%scope, %key, count, created = *created, "pool warmed");
        }
        result
    }

    async fn warm(pool: &Arc<Pool<F>>, count: usize) -> Result<usize, PoolError> {
        let mut slots = pool.lock().await;
        pool.ensure_live(&mut slots)?;
        pool.apply_releases(&mut slots);

        let missing = count.saturating_sub(slots.len());
        for created in 0..missing {
            match pool.construct().await {
                Ok(instance) => pool.push_idle(&mut slots, instance),
                Err(error) => {
                    pool.ensure_live(&mut slots)?;
                    tracing::warn!(key = %pool.key(), created, missing, "warm-up stopped early");
                    return Err(error);
                }
            }
            pool.ensure_live(&mut slots)?;
        }
        Ok(missing)
    }

    /// Applies the configured warm-up table to `scope`.
    ///
    /// Returns the number of instances constructed across all keys.
    ///
    /// # Errors
    ///
    /// Stops at the first key whose warm-up fails and returns that error.
    pub async fn warm_scope(&self, scope: &ScopeId) -> Result<usize, PoolError> {
        let mut created = 0;
        for target in self.inner.config.warm_up() {
            created += self.create_pool(scope, target.key.clone(), target.count).await?;
        }
        Ok(created)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Acquisition
    // ─────────────────────────────────────────────────────────────────────────

    /// Checks out an instance for (scope, key), constructing one if no idle
    /// instance is available.
    ///
    /// Concurrent callers for the same (scope, key) are served one at a time.
    /// The returned instance is active; deactivating it returns it to the
    /// pool.
    ///
    /// # Errors
    ///
    /// - [`PoolError::ConstructionFailed`] if a new instance was needed and
    ///   the factory could not build it. Nothing is retried.
    /// - [`PoolError::LockDisposed`] if the scope was torn down while the
    ///   call was in flight. Anything built for it has been destroyed.
    pub async fn acquire(
        &self,
        scope: &ScopeId,
        key: impl Into<PoolKey>,
    ) -> Result<Instance<F::Resource>, PoolError> {
        let key = key.into();
        let pool = self.pool_for(scope, &key)?;
        let result = Self::checkout(&pool).await;
        pool.settle();
        result
    }

    async fn checkout(pool: &Arc<Pool<F>>) -> Result<Instance<F::Resource>, PoolError> {
        let mut slots = pool.lock().await;
        pool.ensure_live(&mut slots)?;
        pool.apply_releases(&mut slots);

        if let Some(instance) = pool.take_reusable(&mut slots) {
            return Ok(instance);
        }

        match pool.construct().await {
            Ok(instance) => {
                pool.push_idle(&mut slots, instance);
                pool.ensure_live(&mut slots)?;
            }
            Err(error) => {
                pool.ensure_live(&mut slots)?;
                return Err(error);
            }
        }

        pool.apply_releases(&mut slots);
        pool.take_reusable(&mut slots)
            .ok_or_else(|| PoolError::ConstructionFailed {
                key: pool.key().clone(),
                source: None,
            })
    }

    /// Blocking variant of [`acquire`](Self::acquire).
    ///
    /// Takes the same key lock as the async path, so the two never run their
    /// sections concurrently. The factory always runs inside a tokio runtime:
    /// on a multi-thread runtime the current worker is handed over with
    /// `block_in_place`, anywhere else a scoped thread drives the call on its
    /// own current-thread runtime with timers and I/O enabled.
    ///
    /// Blocks the calling thread until done. From a current-thread runtime
    /// this stalls every other task on it, including one that holds the same
    /// key lock.
    ///
    /// # Errors
    ///
    /// Same as [`acquire`](Self::acquire), plus [`PoolError::Runtime`] when
    /// the private runtime cannot be started.
    #[deprecated(note = "blocks the calling thread; use `acquire` instead")]
    pub fn acquire_blocking(
        &self,
        scope: &ScopeId,
        key: impl Into<PoolKey>,
    ) -> Result<Instance<F::Resource>, PoolError> {
        let key = key.into();

        if let Ok(handle) = tokio::runtime::Handle::try_current()
            && handle.runtime_flavor() == tokio::runtime::RuntimeFlavor::MultiThread
        {
            return tokio::task::block_in_place(|| handle.block_on(self.acquire(scope, key)));
        }

        std::thread::scope(|s| {
            s.spawn(|| {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .map_err(|source| PoolError::Runtime { source })?;
                runtime.block_on(self.acquire(scope, key))
            })
            .join()
            .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
        })
    }

    /// Returns an instance to its pool by forcing it inactive.
    #[deprecated(note = "call `Instance::deactivate` instead")]
    pub fn release(&self, instance: &Instance<F::Resource>) {
        instance.set_active(false);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statistics
    // ─────────────────────────────────────────────────────────────────────────

    /// Returns the counts of one pool; zero for pools that do not exist.
    #[must_use]
    pub fn stats(&self, scope: &ScopeId, key: impl Into<PoolKey>) -> PoolStats {
        let key = key.into();
        self.inner
            .registry
            .get(scope)
            .and_then(|state| state.get(&key))
            .map(|pool| pool.stats())
            .unwrap_or_default()
    }

    /// Returns the counts of every pool of a scope, ordered by key.
    #[must_use]
    pub fn scope_stats(&self, scope: &ScopeId) -> Vec<(PoolKey, PoolStats)> {
        self.inner
            .registry
            .get(scope)
            .map(|state| {
                state
                    .pools()
                    .into_iter()
                    .map(|pool| (pool.key().clone(), pool.stats()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Returns aggregated counts per live scope, keyed by the scope's display
    /// form (`label#handle`).
    #[must_use]
    pub fn all_stats(&self) -> BTreeMap<String, PoolStats> {
        self.inner
            .registry
            .entries()
            .into_iter()
            .map(|(scope, state)| {
                let mut sum = PoolStats::default();
                for pool in state.pools() {
                    sum += pool.stats();
                }
                (scope.to_string(), sum)
            })
            .collect()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Teardown
    // ─────────────────────────────────────────────────────────────────────────

    /// Destroys every instance of `scope` and forgets the scope.
    ///
    /// Active and idle instances alike go to the factory's `destroy`; a
    /// failure is logged and counted, and the rest are still destroyed. Every
    /// key lock of the scope is disposed, so in-flight and later calls that
    /// still hold it fail with [`PoolError::LockDisposed`]. A later
    /// operation naming the same scope starts from an empty state.
    ///
    /// Runs the reclamation hook afterwards unless disabled in
    /// [`PoolConfig`].
    pub fn teardown_scope(&self, scope: &ScopeId) -> TeardownReport {
        let report = match self.inner.registry.remove(scope) {
            Some(state) => Self::teardown_state(scope.clone(), &state),
            None => TeardownReport::new(scope.clone()),
        };
        self.reclaim();
        report
    }

    /// Tears down every live scope, then reclaims once.
    pub fn teardown_all(&self) -> Vec<TeardownReport> {
        let reports: Vec<_> = self
            .inner
            .registry
            .drain()
            .into_iter()
            .map(|(scope, state)| Self::teardown_state(scope, &state))
            .collect();
        self.reclaim();
        reports
    }

    /// Forgets every scope without destroying anything.
    ///
    /// Meant for subsystem start, to clear state left over from an earlier
    /// session. No instance is passed to the factory's `destroy`, not even
    /// by an operation still in flight on a cleared scope: its key lock is
    /// disposed, so it fails with [`PoolError::LockDisposed`] and drops what
    /// the pool held. Handles already given out stay valid but are no longer
    /// pooled. Returns the number of scopes cleared.
    pub fn reset(&self) -> usize {
        let drained = self.inner.registry.drain();
        for (_, state) in &drained {
            for pool in state.take_pools() {
                pool.abandon();
                pool.settle();
            }
        }
        if !drained.is_empty() {
            tracing::info!(scopes = drained.len(), "pool state reset");
        }
        drained.len()
    }

    fn teardown_state(scope: ScopeId, state: &ScopeState<F>) -> TeardownReport {
        let mut report = TeardownReport::new(scope);

        for pool in state.take_pools() {
            pool.dispose();
            if let Some(mut slots) = pool.try_lock() {
                report.record(pool.sweep(&mut slots));
            } else {
                report.deferred += 1;
                tracing::debug!(
                    scope = %report.scope,
                    key = %pool.key(),
                    "pool busy at teardown; the current holder sweeps it"
                );
            }
            pool.settle();
        }

        if report.failed > 0 {
            tracing::warn!(
                scope = %report.scope,
                destroyed = report.destroyed,
                failed = report.failed,
                "scope torn down with destroy failures"
            );
        } else {
            tracing::info!(
                scope = %report.scope,
                destroyed = report.destroyed,
                deferred = report.deferred,
                "scope torn down"
            );
        }
        report
    }

    fn reclaim(&self) {
        if self.inner.config.reclaim_after_teardown() {
            self.inner.reclaim.reclaim();
        }
    }
}

impl<F: ResourceFactory> core::fmt::Debug for PoolManager<F> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PoolManager")
            .field("scopes", &self.inner.registry.scopes())
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}
