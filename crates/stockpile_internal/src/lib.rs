//! # Stockpile Internal Library
//!
//! Re-exports the Stockpile crates for convenience.

/// Layer 1: plugins, resources, scopes and lifecycle signals.
pub use stockpile_system;

/// Layer 1: tracing and signal plugins.
pub use stockpile_core_plugins;

/// Layer 2: keyed object pools.
pub use stockpile_pool;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use stockpile_core_plugins::{DefaultPlugins, SignalsPlugin, TracingFormat, TracingPlugin};
    pub use stockpile_pool::prelude::*;
    pub use stockpile_system::prelude::*;
}
