//! Concurrent keyed object pools for Stockpile (Layer 2).
//!
//! `stockpile_pool` hands out instances of a keyed resource type, recycles
//! instances the host deactivates, and builds new ones through a
//! [`ResourceFactory`](factory::ResourceFactory) when nothing is idle. Pools
//! are grouped by scope and torn down with it.
//!
//! - [`key`] - Pool keys (`Asset` or `Name`)
//! - [`instance`] - Pooled instance handles and deactivation events
//! - [`lock`] - Per-key async lock with disposal
//! - [`pool`] - A single (scope, key) pool and its statistics
//! - [`engine`] - [`PoolManager`](engine::PoolManager): acquire, warm-up,
//!   stats, teardown
//! - [`lifecycle`] - Host signal wiring and the reclamation hook
//! - [`plugin`] - [`PoolPlugin`](plugin::PoolPlugin) for the server
//!
//! # Concurrency
//!
//! For a fixed (scope, key) at most one mutating section runs at a time,
//! whether it comes from [`acquire`](engine::PoolManager::acquire), the
//! blocking path, warm-up or a deactivation report. Different keys and
//! scopes proceed in parallel.
//!
//! # Example
//!
//! ```
//! use async_trait::async_trait;
//! use stockpile_pool::prelude::*;
//! use stockpile_system::scope::ScopeId;
//!
//! struct Particles;
//!
//! #[async_trait]
//! impl ResourceFactory for Particles {
//!     type Resource = Vec<[f32; 3]>;
//!
//!     async fn construct(&self, _key: &PoolKey) -> Result<Self::Resource, ConstructionError> {
//!         Ok(Vec::with_capacity(256))
//!     }
//! }
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let manager = PoolManager::new(Particles);
//! let scope = ScopeId::new(1, "arena");
//!
//! manager.create_pool(&scope, "sparks", 3).await?;
//! let burst = manager.acquire(&scope, "sparks").await?;
//! assert_eq!(manager.stats(&scope, "sparks"), PoolStats::new(3, 1));
//!
//! burst.deactivate();
//! assert_eq!(manager.stats(&scope, "sparks"), PoolStats::new(3, 0));
//! # Ok::<(), PoolError>(())
//! # }).unwrap();
//! ```

/// Pool configuration resource.
pub mod config;

/// The pool manager.
pub mod engine;

/// Error types.
pub mod error;

/// Resource construction seam.
pub mod factory;

/// Pooled instance handles.
pub mod instance;

/// Pool keys.
pub mod key;

/// Host lifecycle wiring.
pub mod lifecycle;

/// Per-key locks.
pub mod lock;

/// Server plugin.
pub mod plugin;

/// Pool statistics.
pub mod pool;

mod registry;
mod scope;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use crate::config::{PoolConfig, WarmUp};
    pub use crate::engine::{PoolManager, TeardownReport};
    pub use crate::error::{ConstructionError, DestroyError, PoolError};
    pub use crate::factory::ResourceFactory;
    pub use crate::instance::{Deactivation, Instance, InstanceId};
    pub use crate::key::{AssetRef, PoolKey};
    pub use crate::lifecycle::{LifecycleCoordinator, NoopReclaim, ReclaimHook};
    pub use crate::plugin::PoolPlugin;
    pub use crate::pool::PoolStats;
}
