//! Shared test utilities for `stockpile_pool` integration tests.
//!
//! Import via `mod common;` in test files.

#![allow(
    dead_code,
    missing_docs,
    reason = "shared test utilities; not all items used in every test binary"
)]

use core::sync::atomic::{AtomicU64, Ordering};
use core::time::Duration;
use std::sync::Arc;

use async_trait::async_trait;
use hashbrown::{HashMap, HashSet};
use parking_lot::Mutex;
use stockpile_pool::prelude::*;
use stockpile_system::scope::ScopeId;
use tokio::sync::{Notify, Semaphore};

// ═══════════════════════════════════════════════════════════════════════════════
// PROBE RESOURCE
// ═══════════════════════════════════════════════════════════════════════════════

/// Resource produced by [`TestFactory`]. `serial` is unique per construction.
#[derive(Debug)]
pub struct Token {
    pub key: PoolKey,
    pub serial: u64,
}

// ═══════════════════════════════════════════════════════════════════════════════
// TEST FACTORY
// ═══════════════════════════════════════════════════════════════════════════════

/// Factory that records everything it is asked to do.
///
/// - per-key construct attempts, successes and destroys
/// - the highest number of overlapping `construct` calls per key
/// - optional delay, failing keys and gated keys
pub struct TestFactory {
    serial: AtomicU64,
    delay: Option<Duration>,
    attempts: Mutex<HashMap<PoolKey, usize>>,
    constructed: Mutex<HashMap<PoolKey, usize>>,
    destroyed: Mutex<HashMap<PoolKey, usize>>,
    in_flight: Mutex<HashMap<PoolKey, usize>>,
    max_in_flight: Mutex<HashMap<PoolKey, usize>>,
    failing: Mutex<HashSet<PoolKey>>,
    failing_destroy: Mutex<HashSet<PoolKey>>,
    gated: Mutex<HashSet<PoolKey>>,
    gate: Arc<Semaphore>,
    entered: Arc<Notify>,
}

impl TestFactory {
    pub fn new() -> Self {
        Self {
            serial: AtomicU64::new(0),
            delay: None,
            attempts: Mutex::default(),
            constructed: Mutex::default(),
            destroyed: Mutex::default(),
            in_flight: Mutex::default(),
            max_in_flight: Mutex::default(),
            failing: Mutex::default(),
            failing_destroy: Mutex::default(),
            gated: Mutex::default(),
            gate: Arc::new(Semaphore::new(0)),
            entered: Arc::new(Notify::new()),
        }
    }

    /// Every construction sleeps for `delay` first.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Construction for `key` fails.
    pub fn failing(self, key: impl Into<PoolKey>) -> Self {
        self.failing.lock().insert(key.into());
        self
    }

    /// Destroy for `key` fails.
    pub fn failing_destroy(self, key: impl Into<PoolKey>) -> Self {
        self.failing_destroy.lock().insert(key.into());
        self
    }

    /// Construction for `key` waits until [`open_gate`](Self::open_gate).
    pub fn gated(self, key: impl Into<PoolKey>) -> Self {
        self.gated.lock().insert(key.into());
        self
    }

    /// Lets `n` gated constructions proceed.
    pub fn open_gate(&self, n: usize) {
        self.gate.add_permits(n);
    }

    /// Resolves once a gated construction is waiting at the gate.
    pub async fn wait_gated(&self) {
        self.entered.notified().await;
    }

    pub fn attempts(&self, key: impl Into<PoolKey>) -> usize {
        count(&self.attempts, &key.into())
    }

    pub fn constructed(&self, key: impl Into<PoolKey>) -> usize {
        count(&self.constructed, &key.into())
    }

    pub fn destroyed(&self, key: impl Into<PoolKey>) -> usize {
        count(&self.destroyed, &key.into())
    }

    pub fn max_in_flight(&self, key: impl Into<PoolKey>) -> usize {
        count(&self.max_in_flight, &key.into())
    }

    pub fn total_constructed(&self) -> usize {
        self.constructed.lock().values().sum()
    }

    pub fn total_destroyed(&self) -> usize {
        self.destroyed.lock().values().sum()
    }
}

fn count(map: &Mutex<HashMap<PoolKey, usize>>, key: &PoolKey) -> usize {
    map.lock().get(key).copied().unwrap_or(0)
}

fn bump(map: &Mutex<HashMap<PoolKey, usize>>, key: &PoolKey) -> usize {
    let mut map = map.lock();
    let slot = map.entry(key.clone()).or_insert(0);
    *slot += 1;
    *slot
}

#[async_trait]
impl ResourceFactory for TestFactory {
    type Resource = Token;

    async fn construct(&self, key: &PoolKey) -> Result<Token, ConstructionError> {
        bump(&self.attempts, key);
        let overlapping = bump(&self.in_flight, key);
        {
            let mut max = self.max_in_flight.lock();
            let slot = max.entry(key.clone()).or_insert(0);
            *slot = (*slot).max(overlapping);
        }

        if self.gated.lock().contains(key) {
            self.entered.notify_one();
            if let Ok(permit) = self.gate.acquire().await {
                permit.forget();
            }
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(slot) = self.in_flight.lock().get_mut(key) {
            *slot -= 1;
        }

        if self.failing.lock().contains(key) {
            return Err(ConstructionError::new(format!("no template for {key}")));
        }

        bump(&self.constructed, key);
        Ok(Token {
            key: key.clone(),
            serial: self.serial.fetch_add(1, Ordering::SeqCst),
        })
    }

    fn destroy(&self, key: &PoolKey, _resource: &Token) -> Result<(), DestroyError> {
        if self.failing_destroy.lock().contains(key) {
            return Err(DestroyError::new(format!("cannot free {key}")));
        }
        bump(&self.destroyed, key);
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

pub fn manager(factory: TestFactory) -> PoolManager<TestFactory> {
    PoolManager::new(factory)
}

pub fn scope(handle: u64, label: &str) -> ScopeId {
    ScopeId::new(handle, label)
}

/// Asserts that no two handles refer to the same instance.
pub fn assert_distinct(instances: &[Instance<Token>]) {
    let ids: HashSet<InstanceId> = instances.iter().map(Instance::id).collect();
    assert_eq!(ids.len(), instances.len(), "an instance was handed out twice");
}
