//! Core infrastructure plugins for Stockpile.
//!
//! - [`SignalsPlugin`] - Registers the host lifecycle bus
//! - [`TracingPlugin`] - Logging via the `tracing` crate
//! - [`DefaultPlugins`] - Both of the above
//!
//! # Example
//!
//! ```
//! use stockpile_core_plugins::DefaultPlugins;
//! use stockpile_system::plugin::PluginGroup;
//! use stockpile_system::server::Server;
//! use stockpile_system::signal::HostSignals;
//!
//! let mut server = Server::new();
//! server.add_plugins(DefaultPlugins.build());
//! server.finish();
//!
//! assert!(server.contains_api::<HostSignals>());
//! server.cleanup();
//! ```
//!
//! # Architecture
//!
//! Part of Layer 1, next to `stockpile_system`. Pooling itself
//! (`stockpile_pool`) sits on top and works with or without these plugins.

mod signals;
mod tracing_plugin;

pub use signals::SignalsPlugin;
pub use tracing_plugin::{TracingConfig, TracingFormat, TracingPlugin};

use stockpile_system::plugin::{PluginGroup, PluginGroupBuilder};

/// Default plugins for a Stockpile host.
///
/// Includes:
/// - [`SignalsPlugin`]
/// - [`TracingPlugin`] with default settings
///
/// Swap the tracing settings by disabling the default and adding your own:
///
/// ```
/// use stockpile_core_plugins::{DefaultPlugins, TracingFormat, TracingPlugin};
/// use stockpile_system::plugin::PluginGroup;
/// use stockpile_system::server::Server;
///
/// let mut server = Server::new();
/// server
///     .add_plugins(DefaultPlugins.build().disable::<TracingPlugin>())
///     .add_plugins(TracingPlugin::new().with_format(TracingFormat::Json));
/// server.finish();
/// ```
pub struct DefaultPlugins;

impl PluginGroup for DefaultPlugins {
    fn build(self) -> PluginGroupBuilder {
        PluginGroupBuilder::new()
            .add(SignalsPlugin)
            .add(TracingPlugin::default())
    }
}
