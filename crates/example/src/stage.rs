//! Scene playback: one scope per scene, waves of concurrent spawns.

use stockpile_core_plugins::SignalsPlugin;
use stockpile_pool::prelude::*;
use stockpile_system::scope::ScopeId;
use stockpile_system::server::Server;
use stockpile_system::signal::HostSignals;
use thiserror::Error;

use crate::sprites::{Sprite, SpriteFactory};

/// Errors from playing a scene.
#[derive(Debug, Error)]
pub enum StageError {
    /// A pool operation failed.
    #[error(transparent)]
    Pool(#[from] PoolError),
    /// A spawn task panicked or was cancelled.
    #[error("spawn task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    /// The server was built without the pooling plugin.
    #[error("stage is missing {0}")]
    Missing(&'static str),
}

/// A batch of sprites spawned at once, then cleared.
#[derive(Debug, Clone)]
pub struct Wave {
    /// Which sprite to spawn.
    pub key: PoolKey,
    /// How many at once.
    pub count: usize,
}

impl Wave {
    /// Creates a wave of `count` sprites of `key`.
    pub fn new(key: impl Into<PoolKey>, count: usize) -> Self {
        Self {
            key: key.into(),
            count,
        }
    }
}

/// What happened while a scene played.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneSummary {
    /// Display form of the scene's scope.
    pub scope: String,
    /// Sprites handed out across all waves.
    pub spawned: usize,
    /// Largest pool footprint seen at the end of any wave.
    pub peak: PoolStats,
}

/// A server with pooling wired to host signals.
pub struct Stage {
    server: Server,
    signals: HostSignals,
    manager: PoolManager<SpriteFactory>,
}

impl Stage {
    /// Builds the server around `factory` with the given warm-up table.
    ///
    /// # Errors
    ///
    /// Returns [`StageError::Missing`] if plugin setup did not register the
    /// expected globals.
    pub fn new(factory: SpriteFactory, config: PoolConfig) -> Result<Self, StageError> {
        let mut server = Server::new();
        server
            .add_plugins(SignalsPlugin)
            .add_plugins(PoolPlugin::new(factory).with_config(config));
        server.finish();

        let signals = server
            .api::<HostSignals>()
            .ok_or(StageError::Missing("HostSignals"))?
            .clone();
        let manager = server
            .get_global::<PoolManager<SpriteFactory>>()
            .ok_or(StageError::Missing("PoolManager"))?
            .clone();

        Ok(Self {
            server,
            signals,
            manager,
        })
    }

    /// Returns the pool manager.
    pub fn manager(&self) -> &PoolManager<SpriteFactory> {
        &self.manager
    }

    /// Plays one scene: begins its scope, warms it, runs every wave, and
    /// ends the scope, which destroys everything the scene built.
    ///
    /// # Errors
    ///
    /// Fails on the first pool error; the scope is ended regardless.
    pub async fn play(&self, label: &str, waves: &[Wave]) -> Result<SceneSummary, StageError> {
        let scope = self.signals.begin_scope(label);
        let result = self.run_waves(&scope, waves).await;
        self.signals.end_scope(&scope);
        result
    }

    async fn run_waves(&self, scope: &ScopeId, waves: &[Wave]) -> Result<SceneSummary, StageError> {
        let warmed = self.manager.warm_scope(scope).await?;
        tracing::info!(%scope, warmed, "scene loaded");

        let mut summary = SceneSummary {
            scope: scope.to_string(),
            spawned: 0,
            peak: PoolStats::default(),
        };

        for wave in waves {
            let sprites = self.spawn_wave(scope, wave).await?;
            summary.spawned += sprites.len();

            let stats = self.manager.stats(scope, wave.key.clone());
            if stats.total > summary.peak.total {
                summary.peak = stats;
            }
            tracing::info!(
                %scope,
                key = %wave.key,
                total = stats.total,
                active = stats.active,
                "wave spawned"
            );

            for sprite in &sprites {
                sprite.deactivate();
            }
        }
        Ok(summary)
    }

    async fn spawn_wave(
        &self,
        scope: &ScopeId,
        wave: &Wave,
    ) -> Result<Vec<Instance<Sprite>>, StageError> {
        let tasks: Vec<_> = (0..wave.count)
            .map(|_| {
                let manager = self.manager.clone();
                let scope = scope.clone();
                let key = wave.key.clone();
                tokio::spawn(async move { manager.acquire(&scope, key).await })
            })
            .collect();

        let mut sprites = Vec::with_capacity(tasks.len());
        for task in tasks {
            sprites.push(task.await??);
        }
        Ok(sprites)
    }

    /// Shuts the server down, tearing down any scope still alive.
    pub fn shutdown(mut self) -> SpriteFactoryStats {
        self.server.cleanup();
        SpriteFactoryStats {
            built: self.manager.factory().built(),
            freed: self.manager.factory().freed(),
        }
    }
}

/// Construction and destruction counts at shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpriteFactoryStats {
    /// Sprites built over the stage's lifetime.
    pub built: usize,
    /// Sprites freed over the stage's lifetime.
    pub freed: usize,
}
