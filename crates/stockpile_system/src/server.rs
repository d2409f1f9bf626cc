//! Server runtime for plugin orchestration.
//!
//! The [`Server`] owns plugins, global resources and APIs. It builds plugins
//! in dependency order, readies them once everything is registered, and
//! cleans them up in reverse order at shutdown.
//!
//! ```text
//! NotStarted ──finish()──▶ Built ──cleanup()──▶ Stopped
//! ```
//!
//! # Example
//!
//! ```
//! use stockpile_system::plugin::Plugin;
//! use stockpile_system::resource::GlobalResource;
//! use stockpile_system::server::Server;
//!
//! struct PoolDefaults { warm: usize }
//! impl GlobalResource for PoolDefaults {}
//!
//! struct DefaultsPlugin;
//!
//! impl Plugin for DefaultsPlugin {
//!     fn build(&self, server: &mut Server) {
//!         server.insert_global(PoolDefaults { warm: 4 });
//!     }
//! }
//!
//! let mut server = Server::new();
//! server.add_plugins(DefaultsPlugin);
//! server.finish();
//!
//! assert_eq!(server.get_global::<PoolDefaults>().map(|d| d.warm), Some(4));
//! server.cleanup();
//! ```

use core::any::{Any, TypeId};

use hashbrown::{HashMap, HashSet};

use crate::api::API;
use crate::plugin::{Plugin, PluginId, Plugins};
use crate::resource::{GlobalResource, Resources};

type BoxedAPI = Box<dyn Any + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum BuildState {
    #[default]
    NotStarted,
    /// `finish()` is executing; newly added plugins are built immediately.
    Building,
    Built,
    /// `cleanup()` has run. Further cleanup calls are no-ops.
    Stopped,
}

/// The runtime that orchestrates plugins and manages resources.
pub struct Server {
    /// Server-lifetime resources registered via
    /// [`insert_global()`](Self::insert_global).
    global: Resources,

    /// Capability registries, looked up by type.
    apis: HashMap<TypeId, BoxedAPI>,

    pending_plugins: Vec<PluginEntry>,

    /// Built plugins, in dependency order.
    built_plugins: Vec<PluginEntry>,

    plugin_ids: HashSet<PluginId>,

    build_state: BuildState,
}

struct PluginEntry {
    id: PluginId,
    plugin: Box<dyn Plugin>,
    name: String,
}

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}

impl Server {
    /// Creates a new empty server.
    #[must_use]
    pub fn new() -> Self {
        Self {
            global: Resources::new(),
            apis: HashMap::new(),
            pending_plugins: Vec::new(),
            built_plugins: Vec::new(),
            plugin_ids: HashSet::new(),
            build_state: BuildState::NotStarted,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Plugin Management
    // ─────────────────────────────────────────────────────────────────────────

    /// Adds one or more plugins to the server.
    ///
    /// # Panics
    ///
    /// Panics if a unique plugin is added twice.
    pub fn add_plugins<P: Plugins>(&mut self, plugins: P) -> &mut Self {
        plugins.add_to_server(self);
        self
    }

    pub(crate) fn add_plugin_boxed(&mut self, id: PluginId, plugin: Box<dyn Plugin>) {
        let name = plugin.name().to_string();

        if plugin.is_unique() && self.plugin_ids.contains(&id) {
            panic!(
                "Plugin '{name}' is unique and was already added.\n\
                 If you intended to add this plugin multiple times, \
                 set `is_unique()` to return `false`."
            );
        }
        self.plugin_ids.insert(id);

        let entry = PluginEntry { id, plugin, name };

        if self.build_state == BuildState::Building {
            entry.plugin.build(self);
            self.built_plugins.push(entry);
        } else {
            self.pending_plugins.push(entry);
        }
    }

    /// Returns true if a plugin of the given type has been added.
    #[must_use]
    pub fn has_plugin<P: Plugin>(&self) -> bool {
        self.plugin_ids.contains(&PluginId::of::<P>())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Resources
    // ─────────────────────────────────────────────────────────────────────────

    /// Inserts a global resource, returning the previous value if present.
    pub fn insert_global<R: GlobalResource>(&mut self, resource: R) -> Option<R> {
        self.global.insert(resource)
    }

    /// Returns true if a global resource of type `R` exists.
    #[must_use]
    pub fn contains_global<R: GlobalResource>(&self) -> bool {
        self.global.contains::<R>()
    }

    /// Returns a shared reference to a global resource.
    #[must_use]
    pub fn get_global<R: GlobalResource>(&self) -> Option<&R> {
        self.global.get::<R>()
    }

    /// Returns the global resource container.
    #[must_use]
    pub fn global_resources(&self) -> &Resources {
        &self.global
    }

    // ─────────────────────────────────────────────────────────────────────────
    // APIs
    // ─────────────────────────────────────────────────────────────────────────

    /// Registers an API, returning the previous instance if one existed.
    pub fn insert_api<A: API>(&mut self, api: A) -> Option<A> {
        self.apis
            .insert(TypeId::of::<A>(), Box::new(api))
            .and_then(|old| old.downcast::<A>().ok())
            .map(|boxed| *boxed)
    }

    /// Returns a reference to a registered API.
    #[must_use]
    pub fn api<A: API>(&self) -> Option<&A> {
        self.apis
            .get(&TypeId::of::<A>())
            .and_then(|boxed| boxed.downcast_ref::<A>())
    }

    /// Returns true if an API of type `A` is registered.
    #[must_use]
    pub fn contains_api<A: API>(&self) -> bool {
        self.apis.contains_key(&TypeId::of::<A>())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Returns true once [`finish()`](Self::finish) has completed.
    #[must_use]
    pub fn is_built(&self) -> bool {
        matches!(self.build_state, BuildState::Built | BuildState::Stopped)
    }

    /// Builds all plugins and prepares the server.
    ///
    /// 1. Topologically sorts plugins by their declared dependencies
    /// 2. Calls `build()` on each plugin in order
    /// 3. Calls `ready()` on each plugin in order
    ///
    /// # Panics
    ///
    /// - If a plugin's dependency was never added
    /// - If plugins depend on each other circularly
    /// - If called more than once
    pub fn finish(&mut self) {
        if self.build_state != BuildState::NotStarted {
            panic!("Server::finish() was already called. Cannot build twice.");
        }

        let sorted = self.sort_plugins_by_dependencies();

        self.build_state = BuildState::Building;
        for entry in sorted {
            entry.plugin.build(self);
            self.built_plugins.push(entry);
        }
        self.build_state = BuildState::Built;

        // Plugins are moved out while `ready()` borrows the server mutably.
        let built = core::mem::take(&mut self.built_plugins);
        for entry in &built {
            tracing::trace!(plugin = %entry.name, "ready");
            entry.plugin.ready(self);
        }
        let late = core::mem::replace(&mut self.built_plugins, built);
        self.built_plugins.extend(late);
    }

    /// Cleans up all plugins in reverse dependency order.
    ///
    /// Idempotent: only the first call after [`finish()`](Self::finish)
    /// reaches the plugins.
    pub fn cleanup(&mut self) {
        if self.build_state != BuildState::Built {
            return;
        }
        self.build_state = BuildState::Stopped;

        let built = core::mem::take(&mut self.built_plugins);
        for entry in built.iter().rev() {
            tracing::trace!(plugin = %entry.name, "cleanup");
            entry.plugin.cleanup(self);
        }
        self.built_plugins = built;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internal: Dependency Resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn sort_plugins_by_dependencies(&mut self) -> Vec<PluginEntry> {
        let pending = core::mem::take(&mut self.pending_plugins);
        let n = pending.len();

        let mut index_of: HashMap<PluginId, usize> = HashMap::with_capacity(n);
        for (i, entry) in pending.iter().enumerate() {
            index_of.entry(entry.id).or_insert(i);
        }

        let mut in_degree = vec![0usize; n];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];

        for (i, entry) in pending.iter().enumerate() {
            for dep in entry.plugin.dependencies() {
                match index_of.get(&dep) {
                    Some(&dep_idx) => {
                        dependents[dep_idx].push(i);
                        in_degree[i] += 1;
                    }
                    None => panic!(
                        "Plugin '{}' requires '{}' which was not added.\n\
                         Add {} before {}, or use a plugin group that includes it.",
                        entry.name,
                        dep.type_name(),
                        dep.type_name(),
                        entry.name
                    ),
                }
            }
        }

        // Kahn's algorithm; lowest index first keeps insertion order stable.
        let mut ready: Vec<usize> = (0..n).filter(|&i| in_degree[i] == 0).rev().collect();
        let mut order: Vec<usize> = Vec::with_capacity(n);

        while let Some(idx) = ready.pop() {
            order.push(idx);
            for &dependent in dependents[idx].iter().rev() {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    ready.push(dependent);
                }
            }
        }

        if order.len() != n {
            let in_cycle: Vec<&str> = (0..n)
                .filter(|&i| in_degree[i] > 0)
                .map(|i| pending[i].name.as_str())
                .collect();
            panic!(
                "Circular dependency detected among plugins: {in_cycle:?}\n\
                 Break the cycle by extracting shared functionality into a separate plugin."
            );
        }

        let mut slots: Vec<Option<PluginEntry>> = pending.into_iter().map(Some).collect();
        order
            .into_iter()
            .filter_map(|idx| slots[idx].take())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Default, Clone)]
    struct Journal(Arc<Mutex<Vec<String>>>);

    impl Journal {
        fn push(&self, entry: impl Into<String>) {
            self.0.lock().push(entry.into());
        }

        fn entries(&self) -> Vec<String> {
            self.0.lock().clone()
        }
    }

    struct Base(Journal);
    impl Plugin for Base {
        fn build(&self, _server: &mut Server) {
            self.0.push("build:base");
        }
        fn ready(&self, _server: &mut Server) {
            self.0.push("ready:base");
        }
        fn cleanup(&self, _server: &mut Server) {
            self.0.push("cleanup:base");
        }
    }

    struct Dependent(Journal);
    impl Plugin for Dependent {
        fn build(&self, _server: &mut Server) {
            self.0.push("build:dependent");
        }
        fn ready(&self, _server: &mut Server) {
            self.0.push("ready:dependent");
        }
        fn cleanup(&self, _server: &mut Server) {
            self.0.push("cleanup:dependent");
        }
        fn dependencies(&self) -> Vec<PluginId> {
            vec![PluginId::of::<Base>()]
        }
    }

    #[test]
    fn plugins_run_in_dependency_order() {
        let journal = Journal::default();
        let mut server = Server::new();
        // Added out of order on purpose.
        server
            .add_plugins(Dependent(journal.clone()))
            .add_plugins(Base(journal.clone()));

        server.finish();
        server.cleanup();

        assert_eq!(
            journal.entries(),
            vec![
                "build:base",
                "build:dependent",
                "ready:base",
                "ready:dependent",
                "cleanup:dependent",
                "cleanup:base",
            ]
        );
    }

    #[test]
    fn cleanup_is_idempotent() {
        let journal = Journal::default();
        let mut server = Server::new();
        server.add_plugins(Base(journal.clone()));

        server.cleanup();
        assert!(journal.entries().is_empty(), "cleanup before finish is a no-op");

        server.finish();
        server.cleanup();
        server.cleanup();

        let cleanups = journal
            .entries()
            .iter()
            .filter(|e| e.starts_with("cleanup"))
            .count();
        assert_eq!(cleanups, 1);
        assert!(server.is_built());
    }

    #[test]
    #[should_panic(expected = "which was not added")]
    fn missing_dependency_panics() {
        let mut server = Server::new();
        server.add_plugins(Dependent(Journal::default()));
        server.finish();
    }

    #[test]
    #[should_panic(expected = "already added")]
    fn duplicate_unique_plugin_panics() {
        let mut server = Server::new();
        server.add_plugins(Base(Journal::default()));
        server.add_plugins(Base(Journal::default()));
    }

    #[test]
    #[should_panic(expected = "already called")]
    fn finish_twice_panics() {
        let mut server = Server::new();
        server.finish();
        server.finish();
    }

    struct CycleA;
    struct CycleB;
    impl Plugin for CycleA {
        fn build(&self, _server: &mut Server) {}
        fn dependencies(&self) -> Vec<PluginId> {
            vec![PluginId::of::<CycleB>()]
        }
    }
    impl Plugin for CycleB {
        fn build(&self, _server: &mut Server) {}
        fn dependencies(&self) -> Vec<PluginId> {
            vec![PluginId::of::<CycleA>()]
        }
    }

    #[test]
    #[should_panic(expected = "Circular dependency")]
    fn circular_dependency_panics() {
        let mut server = Server::new();
        server.add_plugins(CycleA).add_plugins(CycleB);
        server.finish();
    }

    struct Registry(Mutex<Vec<&'static str>>);
    impl API for Registry {}

    struct Counter(u32);
    impl GlobalResource for Counter {}

    struct Registrar;
    impl Plugin for Registrar {
        fn build(&self, server: &mut Server) {
            server.insert_api(Registry(Mutex::new(Vec::new())));
            server.insert_global(Counter(1));
        }
        fn ready(&self, server: &mut Server) {
            if let Some(registry) = server.api::<Registry>() {
                registry.0.lock().push("registrar");
            }
        }
    }

    #[test]
    fn apis_and_globals_are_reachable_after_finish() {
        let mut server = Server::new();
        server.add_plugins(Registrar);
        server.finish();

        assert!(server.contains_api::<Registry>());
        let registry = server.api::<Registry>().expect("registry inserted in build");
        assert_eq!(*registry.0.lock(), vec!["registrar"]);

        assert!(server.contains_global::<Counter>());
        assert_eq!(server.get_global::<Counter>().map(|c| c.0), Some(1));
        assert_eq!(server.global_resources().len(), 1);

        // A later insert replaces the global and hands back the old value.
        assert_eq!(server.insert_global(Counter(2)).map(|c| c.0), Some(1));
        assert_eq!(server.get_global::<Counter>().map(|c| c.0), Some(2));
    }
}
