//! The host runtime for Stockpile (Layer 1).
//!
//! `stockpile_system` provides the pieces a pooling subsystem plugs into:
//!
//! - [`api`] - API trait for build-time capability registries
//! - [`plugin`] - Plugin trait and plugin groups
//! - [`resource`] - Type-keyed storage for server resources
//! - [`scope`] - Lifetime boundary identifiers
//! - [`signal`] - Host lifecycle signals (scope begin/end, shutdown)
//! - [`server`] - Server runtime for plugin orchestration
//!
//! # Architecture
//!
//! - **Layer 1** (`stockpile_system`): host primitives (this crate)
//! - **Layer 2** (`stockpile_pool`): the keyed pool engine
//! - **Layer 3** (applications): factories and scene code
//!
//! # Example
//!
//! ```
//! use stockpile_system::plugin::Plugin;
//! use stockpile_system::resource::GlobalResource;
//! use stockpile_system::server::Server;
//! use stockpile_system::signal::HostSignals;
//!
//! #[derive(Default)]
//! struct SceneBudget { max_sprites: usize }
//! impl GlobalResource for SceneBudget {}
//!
//! struct ScenePlugin;
//!
//! impl Plugin for ScenePlugin {
//!     fn build(&self, server: &mut Server) {
//!         server.insert_global(SceneBudget { max_sprites: 256 });
//!         server.insert_api(HostSignals::new());
//!     }
//! }
//!
//! let mut server = Server::new();
//! server.add_plugins(ScenePlugin);
//! server.finish();
//!
//! let signals = server.api::<HostSignals>().unwrap();
//! let level = signals.begin_scope("level-1");
//! assert!(signals.end_scope(&level));
//! ```

/// API trait for capability registration.
pub mod api;

/// Plugin trait for extensible functionality.
pub mod plugin;

/// Resource container management.
pub mod resource;

/// Lifetime boundary identifiers.
pub mod scope;

/// Server runtime for plugin orchestration.
pub mod server;

/// Host lifecycle signals.
pub mod signal;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use crate::api::*;
    pub use crate::plugin::*;
    pub use crate::resource::*;
    pub use crate::scope::*;
    pub use crate::server::*;
    pub use crate::signal::*;
}
