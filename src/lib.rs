//! Concurrent keyed object pools whose lifetimes follow host scopes.
//!
//! ```
//! use async_trait::async_trait;
//! use stockpile::prelude::*;
//!
//! struct Meshes;
//!
//! #[async_trait]
//! impl ResourceFactory for Meshes {
//!     type Resource = Vec<[f32; 3]>;
//!
//!     async fn construct(&self, _key: &PoolKey) -> Result<Self::Resource, ConstructionError> {
//!         Ok(Vec::new())
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), PoolError> {
//! let mut server = Server::new();
//! server
//!     .add_plugins(SignalsPlugin)
//!     .add_plugins(PoolPlugin::new(Meshes));
//! server.finish();
//!
//! let signals = server.api::<HostSignals>().unwrap().clone();
//! let pools = server.get_global::<PoolManager<Meshes>>().unwrap().clone();
//!
//! let level = signals.begin_scope("level-1");
//! let rock = pools.acquire(&level, "rock").await?;
//! rock.deactivate();
//!
//! signals.end_scope(&level);
//! assert!(rock.is_destroyed());
//! # Ok(())
//! # }
//! ```

pub use stockpile_internal::*;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use stockpile_internal::prelude::*;
}
