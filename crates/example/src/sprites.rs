//! A toy sprite factory backed by an in-memory atlas.

use core::sync::atomic::{AtomicUsize, Ordering};
use core::time::Duration;

use async_trait::async_trait;
use hashbrown::HashMap;
use stockpile_pool::prelude::*;

/// A pooled sprite: a handful of animation frames cut from the atlas.
#[derive(Debug)]
pub struct Sprite {
    /// Atlas entry the sprite was cut from.
    pub name: String,
    /// Frame indices into the atlas texture.
    pub frames: Vec<u32>,
}

/// Builds sprites from named atlas entries.
///
/// Asset keys are resolved by GUID with the sub-asset naming the animation;
/// name keys are looked up directly.
pub struct SpriteFactory {
    atlas: HashMap<String, u32>,
    load_time: Duration,
    built: AtomicUsize,
    freed: AtomicUsize,
}

impl SpriteFactory {
    /// Creates a factory that knows the given `(entry, frame count)` pairs.
    pub fn new<'a>(entries: impl IntoIterator<Item = (&'a str, u32)>) -> Self {
        Self {
            atlas: entries
                .into_iter()
                .map(|(name, frames)| (name.to_string(), frames))
                .collect(),
            load_time: Duration::ZERO,
            built: AtomicUsize::new(0),
            freed: AtomicUsize::new(0),
        }
    }

    /// Simulates texture upload latency on every construction.
    #[must_use]
    pub fn with_load_time(mut self, load_time: Duration) -> Self {
        self.load_time = load_time;
        self
    }

    /// Number of sprites built so far.
    pub fn built(&self) -> usize {
        self.built.load(Ordering::Relaxed)
    }

    /// Number of sprites freed so far.
    pub fn freed(&self) -> usize {
        self.freed.load(Ordering::Relaxed)
    }

    fn entry_name(key: &PoolKey) -> String {
        match key {
            PoolKey::Name(name) => name.to_string(),
            PoolKey::Asset(asset) => match asset.sub_asset() {
                Some(sub) => format!("{}/{}", asset.guid(), sub),
                None => asset.guid().to_string(),
            },
        }
    }
}

#[async_trait]
impl ResourceFactory for SpriteFactory {
    type Resource = Sprite;

    async fn construct(&self, key: &PoolKey) -> Result<Sprite, ConstructionError> {
        let name = Self::entry_name(key);
        let Some(&frame_count) = self.atlas.get(&name) else {
            return Err(ConstructionError::new(format!("atlas has no entry `{name}`")));
        };

        if !self.load_time.is_zero() {
            tokio::time::sleep(self.load_time).await;
        }

        self.built.fetch_add(1, Ordering::Relaxed);
        Ok(Sprite {
            name,
            frames: (0..frame_count).collect(),
        })
    }

    fn destroy(&self, _key: &PoolKey, sprite: &Sprite) -> Result<(), DestroyError> {
        tracing::trace!(sprite = %sprite.name, "sprite freed");
        self.freed.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
