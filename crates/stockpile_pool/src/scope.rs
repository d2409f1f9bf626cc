//! Per-scope pool table.

use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::RwLock;
use stockpile_system::scope::ScopeId;

use crate::error::PoolError;
use crate::factory::ResourceFactory;
use crate::key::PoolKey;
use crate::pool::Pool;

/// All pools (and therefore all key locks) of one scope.
///
/// Pools are created on first use and only go away with the whole scope.
/// Once [`take_pools`](Self::take_pools) has run the table is closed, so an
/// operation that resolved this state just before teardown cannot create a
/// pool nobody would ever sweep.
pub(crate) struct ScopeState<F: ResourceFactory> {
    scope: ScopeId,
    factory: Arc<F>,
    pools: RwLock<Table<F>>,
}

struct Table<F: ResourceFactory> {
    pools: HashMap<PoolKey, Arc<Pool<F>>>,
    closed: bool,
}

impl<F: ResourceFactory> ScopeState<F> {
    pub(crate) fn new(scope: ScopeId, factory: Arc<F>) -> Self {
        Self {
            scope,
            factory,
            pools: RwLock::new(Table {
                pools: HashMap::new(),
                closed: false,
            }),
        }
    }

    /// Returns the pool for `key`, creating it with its lock on first use.
    pub(crate) fn pool(&self, key: &PoolKey) -> Result<Arc<Pool<F>>, PoolError> {
        if let Some(pool) = self.pools.read().pools.get(key) {
            return Ok(Arc::clone(pool));
        }

        let mut table = self.pools.write();
        if table.closed {
            return Err(PoolError::LockDisposed {
                scope: self.scope.clone(),
                key: key.clone(),
            });
        }
        let pool = table.pools.entry(key.clone()).or_insert_with(|| {
            tracing::trace!(scope = %self.scope, %key, "pool created");
            Arc::new(Pool::new(
                Arc::clone(&self.factory),
                self.scope.clone(),
                key.clone(),
            ))
        });
        Ok(Arc::clone(pool))
    }

    /// Returns the pool for `key` without creating it.
    pub(crate) fn get(&self, key: &PoolKey) -> Option<Arc<Pool<F>>> {
        self.pools.read().pools.get(key).cloned()
    }

    /// Returns every pool, ordered by key.
    pub(crate) fn pools(&self) -> Vec<Arc<Pool<F>>> {
        let mut pools: Vec<_> = self.pools.read().pools.values().cloned().collect();
        pools.sort_by(|a, b| a.key().cmp(b.key()));
        pools
    }

    /// Closes the table and hands out every pool for teardown.
    pub(crate) fn take_pools(&self) -> Vec<Arc<Pool<F>>> {
        let mut table = self.pools.write();
        table.closed = true;
        let mut pools: Vec<_> = table.pools.drain().map(|(_, pool)| pool).collect();
        pools.sort_by(|a, b| a.key().cmp(b.key()));
        pools
    }
}
