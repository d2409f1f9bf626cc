//! Pool configuration resource.

use stockpile_system::resource::GlobalResource;

use crate::key::PoolKey;

/// Number of idle instances to prepare for a key when a scope is warmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarmUp {
    /// Key to warm.
    pub key: PoolKey,
    /// Target pool size.
    pub count: usize,
}

/// Configuration of the pooling subsystem.
///
/// Registered as a global resource by
/// [`PoolPlugin`](crate::plugin::PoolPlugin) so other plugins can read it.
///
/// # Example
///
/// ```
/// use stockpile_pool::config::PoolConfig;
///
/// let config = PoolConfig::default()
///     .with_warm_up("bullet", 32)
///     .with_warm_up("spark", 8)
///     .with_warm_up("bullet", 64)
///     .with_reclaim_after_teardown(false);
///
/// assert_eq!(config.warm_up().len(), 2);
/// assert_eq!(config.warm_up()[0].count, 64);
/// assert!(!config.reclaim_after_teardown());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    warm_up: Vec<WarmUp>,
    reclaim_after_teardown: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            warm_up: Vec::new(),
            reclaim_after_teardown: true,
        }
    }
}

impl GlobalResource for PoolConfig {}

impl PoolConfig {
    /// Creates the default configuration: no warm-up, reclaim after teardown.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a warm-up target. A later call for the same key replaces the
    /// earlier count.
    #[must_use]
    pub fn with_warm_up(mut self, key: impl Into<PoolKey>, count: usize) -> Self {
        let key = key.into();
        match self.warm_up.iter_mut().find(|w| w.key == key) {
            Some(existing) => existing.count = count,
            None => self.warm_up.push(WarmUp { key, count }),
        }
        self
    }

    /// Sets whether the host reclamation hook runs after each teardown.
    #[must_use]
    pub fn with_reclaim_after_teardown(mut self, enabled: bool) -> Self {
        self.reclaim_after_teardown = enabled;
        self
    }

    /// Returns the warm-up targets in insertion order.
    #[must_use]
    pub fn warm_up(&self) -> &[WarmUp] {
        &self.warm_up
    }

    /// Returns whether the reclamation hook runs after teardown.
    #[must_use]
    pub fn reclaim_after_teardown(&self) -> bool {
        self.reclaim_after_teardown
    }
}
