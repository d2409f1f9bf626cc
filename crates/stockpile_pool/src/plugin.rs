//! Server integration.
//!
//! [`PoolPlugin`] owns the pooling subsystem's lifetime inside a
//! [`Server`]:
//!
//! - **`build()`** registers [`HostSignals`] (unless another plugin already
//!   did) and the [`PoolConfig`] global.
//! - **`ready()`** picks the [`PoolManager`] (the one handed to
//!   [`PoolPlugin::from_manager`], else one the host already registered as a
//!   global, else a new one), clears any scope state left over from an
//!   earlier session, and subscribes a [`LifecycleCoordinator`] to the host
//!   signals. Both are registered as globals.
//! - **`cleanup()`** tears down every scope and unsubscribes.
//!
//! # Example
//!
//! ```
//! use async_trait::async_trait;
//! use stockpile_pool::prelude::*;
//! use stockpile_system::server::Server;
//! use stockpile_system::signal::HostSignals;
//!
//! struct Bullets;
//!
//! #[async_trait]
//! impl ResourceFactory for Bullets {
//!     type Resource = [f32; 2];
//!
//!     async fn construct(&self, _key: &PoolKey) -> Result<[f32; 2], ConstructionError> {
//!         Ok([0.0, 0.0])
//!     }
//! }
//!
//! let mut server = Server::new();
//! server.add_plugins(PoolPlugin::new(Bullets).with_config(PoolConfig::new().with_warm_up("bullet", 16)));
//! server.finish();
//!
//! let signals = server.api::<HostSignals>().unwrap().clone();
//! let manager = server.get_global::<PoolManager<Bullets>>().unwrap().clone();
//!
//! let level = signals.begin_scope("level-1");
//! assert!(manager.has_scope(&level));
//!
//! signals.end_scope(&level);
//! assert!(!manager.has_scope(&level));
//! server.cleanup();
//! ```

use std::sync::Arc;

use stockpile_system::plugin::Plugin;
use stockpile_system::server::Server;
use stockpile_system::signal::HostSignals;

use crate::config::PoolConfig;
use crate::engine::PoolManager;
use crate::factory::ResourceFactory;
use crate::lifecycle::{LifecycleCoordinator, NoopReclaim, ReclaimHook};

/// Adds a [`PoolManager`] for factory `F` to the server.
///
/// # Resources Provided
///
/// | Resource | Kind | Description |
/// |----------|------|-------------|
/// | [`HostSignals`] | API | Lifecycle bus (shared if already present) |
/// | [`PoolConfig`] | Global | Configuration this plugin was built with |
/// | [`PoolManager<F>`] | Global | The pools |
/// | [`LifecycleCoordinator<F>`] | Global | Signal subscription |
pub struct PoolPlugin<F: ResourceFactory> {
    factory: Arc<F>,
    config: PoolConfig,
    reclaim: Arc<dyn ReclaimHook>,
    /// Manager that outlives this server, e.g. across a hot reload.
    shared: Option<PoolManager<F>>,
}

impl<F: ResourceFactory> PoolPlugin<F> {
    /// Creates the plugin with default configuration.
    #[must_use]
    pub fn new(factory: F) -> Self {
        Self::from_arc(Arc::new(factory))
    }

    /// Creates the plugin around a factory that is shared elsewhere.
    #[must_use]
    pub fn from_arc(factory: Arc<F>) -> Self {
        Self {
            factory,
            config: PoolConfig::default(),
            reclaim: Arc::new(NoopReclaim),
            shared: None,
        }
    }

    /// Creates the plugin around a manager that outlives the server.
    ///
    /// The manager keeps its own factory, configuration and reclamation
    /// hook; [`with_config`](Self::with_config) and
    /// [`with_reclaim_hook`](Self::with_reclaim_hook) do not apply to it.
    /// Whatever scopes it still holds from an earlier session are cleared in
    /// `ready()`.
    #[must_use]
    pub fn from_manager(manager: PoolManager<F>) -> Self {
        Self {
            factory: manager.factory_handle(),
            config: manager.config().clone(),
            reclaim: manager.reclaim_hook(),
            shared: Some(manager),
        }
    }

    /// Replaces the configuration.
    #[must_use]
    pub fn with_config(mut self, config: PoolConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the host reclamation hook run after teardown.
    #[must_use]
    pub fn with_reclaim_hook(mut self, hook: impl ReclaimHook) -> Self {
        self.reclaim = Arc::new(hook);
        self
    }
}

impl<F: ResourceFactory> PoolPlugin<F> {
    /// The manager from an earlier session, if there is one.
    fn existing(&self, server: &Server) -> Option<PoolManager<F>> {
        self.shared
            .clone()
            .or_else(|| server.get_global::<PoolManager<F>>().cloned())
    }
}

impl<F: ResourceFactory> Plugin for PoolPlugin<F> {
    fn build(&self, server: &mut Server) {
        if !server.contains_api::<HostSignals>() {
            server.insert_api(HostSignals::new());
        }
        let config = match self.existing(server) {
            Some(manager) => manager.config().clone(),
            None => self.config.clone(),
        };
        server.insert_global(config);
    }

    fn ready(&self, server: &mut Server) {
        let manager = self.existing(server).unwrap_or_else(|| {
            PoolManager::with_settings(
                Arc::clone(&self.factory),
                self.config.clone(),
                Arc::clone(&self.reclaim),
            )
        });
        let cleared = manager.reset();
        if cleared > 0 {
            tracing::warn!(scopes = cleared, "cleared scopes left over from an earlier session");
        }

        let coordinator = LifecycleCoordinator::new(manager.clone());
        if let Some(signals) = server.api::<HostSignals>() {
            coordinator.subscribe(signals);
        } else {
            tracing::warn!("HostSignals missing; scopes must be torn down manually");
        }

        let warm_up = manager.config().warm_up().len();
        server.insert_global(manager);
        server.insert_global(coordinator);
        tracing::info!(
            factory = core::any::type_name::<F>(),
            warm_up,
            "PoolPlugin ready"
        );
    }

    fn cleanup(&self, server: &mut Server) {
        if let Some(coordinator) = server.get_global::<LifecycleCoordinator<F>>() {
            coordinator.shutdown();
        }
    }
}
