//! Plugin system for extensible server functionality.
//!
//! Plugins are the unit of composition: the pooling engine, the tracing
//! setup and any application-specific wiring all arrive as plugins.
//!
//! # Example
//!
//! ```
//! use stockpile_system::plugin::{Plugin, PluginId};
//! use stockpile_system::server::Server;
//!
//! # struct TracingPlugin;
//! # impl Plugin for TracingPlugin {
//! #     fn build(&self, _server: &mut Server) {}
//! # }
//! struct SpritePlugin;
//!
//! impl Plugin for SpritePlugin {
//!     fn build(&self, _server: &mut Server) {}
//!
//!     fn dependencies(&self) -> Vec<PluginId> {
//!         vec![PluginId::of::<TracingPlugin>()]
//!     }
//! }
//!
//! let mut server = Server::new();
//! server.add_plugins(TracingPlugin).add_plugins(SpritePlugin);
//! server.finish();
//! ```

use core::any::TypeId;

use crate::server::Server;

// ─────────────────────────────────────────────────────────────────────────────
// PluginId
// ─────────────────────────────────────────────────────────────────────────────

/// Unique identifier for a plugin type.
///
/// Used for dependency resolution and duplicate detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PluginId {
    type_id: TypeId,
    type_name: &'static str,
}

impl PluginId {
    /// Creates a `PluginId` for the given plugin type.
    #[must_use]
    pub fn of<P: Plugin>() -> Self {
        Self {
            type_id: TypeId::of::<P>(),
            type_name: core::any::type_name::<P>(),
        }
    }

    /// Returns the underlying `TypeId`.
    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Returns the type name for debugging.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Plugin Trait
// ─────────────────────────────────────────────────────────────────────────────

/// A unit of server functionality with a managed lifecycle.
///
/// 1. **Build** - `build()` in dependency order
/// 2. **Ready** - `ready()` in dependency order, once everything is built
/// 3. **Cleanup** - `cleanup()` in reverse dependency order at shutdown
///
/// Cleanup is where plugins release what they own. The pooling plugin, for
/// instance, tears down every live scope there.
pub trait Plugin: Send + Sync + 'static {
    /// Configures the server. Called once when the plugin is built.
    fn build(&self, server: &mut Server);

    /// Called after all plugins have been built.
    fn ready(&self, _server: &mut Server) {}

    /// Called when the server shuts down, in reverse dependency order.
    fn cleanup(&self, _server: &mut Server) {}

    /// Returns the plugin's name for debugging and error messages.
    fn name(&self) -> &str {
        core::any::type_name::<Self>()
    }

    /// Declares plugins that must be built before this one.
    ///
    /// The server panics in [`finish()`](Server::finish) if a dependency
    /// was never added.
    fn dependencies(&self) -> Vec<PluginId> {
        Vec::new()
    }

    /// Returns true if this plugin can only be added once.
    fn is_unique(&self) -> bool {
        true
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Plugins / PluginGroup
// ─────────────────────────────────────────────────────────────────────────────

/// Types that can be passed to [`Server::add_plugins`].
///
/// Implemented for every [`Plugin`] and for [`PluginGroupBuilder`].
pub trait Plugins {
    /// Adds these plugins to the server.
    fn add_to_server(self, server: &mut Server);
}

impl<P: Plugin> Plugins for P {
    fn add_to_server(self, server: &mut Server) {
        server.add_plugin_boxed(PluginId::of::<P>(), Box::new(self));
    }
}

impl Plugins for PluginGroupBuilder {
    fn add_to_server(self, server: &mut Server) {
        for boxed in self.plugins {
            server.add_plugin_boxed(boxed.id, boxed.plugin);
        }
    }
}

/// A bundle of plugins that can be added together.
pub trait PluginGroup {
    /// Returns the plugins in this group.
    fn build(self) -> PluginGroupBuilder;
}

/// A boxed plugin with the [`PluginId`] captured before type erasure.
pub(crate) struct BoxedPlugin {
    pub(crate) id: PluginId,
    pub(crate) plugin: Box<dyn Plugin>,
}

/// Builder for customizing plugin groups.
#[derive(Default)]
pub struct PluginGroupBuilder {
    pub(crate) plugins: Vec<BoxedPlugin>,
}

impl PluginGroupBuilder {
    /// Creates an empty group.
    #[must_use]
    pub fn new() -> Self {
        Self {
            plugins: Vec::new(),
        }
    }

    /// Adds a plugin to the end of the group.
    #[must_use]
    #[expect(
        clippy::should_implement_trait,
        reason = "This is a builder method, not std::ops::Add"
    )]
    pub fn add<P: Plugin>(mut self, plugin: P) -> Self {
        self.plugins.push(BoxedPlugin {
            id: PluginId::of::<P>(),
            plugin: Box::new(plugin),
        });
        self
    }

    /// Removes a plugin from the group by type. No-op if absent.
    #[must_use]
    pub fn disable<P: Plugin>(mut self) -> Self {
        let target = PluginId::of::<P>();
        self.plugins.retain(|p| p.id != target);
        self
    }

    /// Returns the number of plugins in the group.
    #[must_use]
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// Returns true if the group contains no plugins.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}
