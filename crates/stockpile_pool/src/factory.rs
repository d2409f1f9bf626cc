//! Resource construction seam.
//!
//! The engine never knows how an instance is built. Applications implement
//! [`ResourceFactory`] for their resource type and hand it to the
//! [`PoolManager`](crate::engine::PoolManager).

use async_trait::async_trait;

use crate::error::{ConstructionError, DestroyError};
use crate::key::PoolKey;

/// Builds and destroys pooled resources.
///
/// # Example
///
/// ```
/// use async_trait::async_trait;
/// use stockpile_pool::error::ConstructionError;
/// use stockpile_pool::factory::ResourceFactory;
/// use stockpile_pool::key::PoolKey;
///
/// struct Sprite { template: String }
///
/// struct SpriteFactory;
///
/// #[async_trait]
/// impl ResourceFactory for SpriteFactory {
///     type Resource = Sprite;
///
///     async fn construct(&self, key: &PoolKey) -> Result<Sprite, ConstructionError> {
///         Ok(Sprite { template: key.to_string() })
///     }
/// }
/// ```
#[async_trait]
pub trait ResourceFactory: Send + Sync + 'static {
    /// The pooled resource type.
    type Resource: Send + Sync + 'static;

    /// Produces one new instance for `key`.
    ///
    /// Called with the key lock held; concurrent calls for the same
    /// (scope, key) never overlap.
    async fn construct(&self, key: &PoolKey) -> Result<Self::Resource, ConstructionError>;

    /// Releases whatever backs `resource`. Called once per instance at scope
    /// teardown, never for instances already marked destroyed.
    fn destroy(&self, _key: &PoolKey, _resource: &Self::Resource) -> Result<(), DestroyError> {
        Ok(())
    }
}
