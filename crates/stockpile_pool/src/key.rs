//! Pool keys.
//!
//! A [`PoolKey`] names the template a pool produces instances of. Hosts that
//! address templates through an asset database use [`PoolKey::Asset`]; hosts
//! that register templates by name use [`PoolKey::Name`]. Both forms share one
//! pool table, so the same engine serves either addressing scheme.

use core::fmt;
use std::sync::Arc;

/// Reference to a template stored in the host's asset database.
///
/// Identity is the asset GUID plus an optional sub-asset name (a single
/// sprite inside an atlas, for instance).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssetRef {
    guid: Arc<str>,
    sub_asset: Option<Arc<str>>,
}

impl AssetRef {
    /// Creates a reference to a top-level asset.
    #[must_use]
    pub fn new(guid: impl Into<Arc<str>>) -> Self {
        Self {
            guid: guid.into(),
            sub_asset: None,
        }
    }

    /// Narrows the reference to a named sub-asset.
    #[must_use]
    pub fn with_sub_asset(mut self, name: impl Into<Arc<str>>) -> Self {
        self.sub_asset = Some(name.into());
        self
    }

    /// Returns the asset GUID.
    #[must_use]
    pub fn guid(&self) -> &str {
        &self.guid
    }

    /// Returns the sub-asset name, if any.
    #[must_use]
    pub fn sub_asset(&self) -> Option<&str> {
        self.sub_asset.as_deref()
    }
}

impl fmt::Display for AssetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.sub_asset {
            Some(sub) => write!(f, "{}[{}]", self.guid, sub),
            None => f.write_str(&self.guid),
        }
    }
}

/// Identifies the template a pool produces.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PoolKey {
    /// A template addressed through the asset database.
    Asset(AssetRef),
    /// A template registered under a plain name.
    Name(Arc<str>),
}

impl PoolKey {
    /// Creates a name key.
    #[must_use]
    pub fn name(name: impl Into<Arc<str>>) -> Self {
        Self::Name(name.into())
    }

    /// Creates an asset key.
    #[must_use]
    pub fn asset(asset: AssetRef) -> Self {
        Self::Asset(asset)
    }
}

impl From<&str> for PoolKey {
    fn from(name: &str) -> Self {
        Self::Name(name.into())
    }
}

impl From<String> for PoolKey {
    fn from(name: String) -> Self {
        Self::Name(name.into())
    }
}

impl From<AssetRef> for PoolKey {
    fn from(asset: AssetRef) -> Self {
        Self::Asset(asset)
    }
}

impl fmt::Display for PoolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Asset(asset) => write!(f, "asset:{asset}"),
            Self::Name(name) => write!(f, "name:{name}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hashbrown::HashSet;

    #[test]
    fn name_and_asset_keys_never_collide() {
        let by_name = PoolKey::from("enemy");
        let by_asset = PoolKey::from(AssetRef::new("enemy"));

        assert_ne!(by_name, by_asset);

        let keys: HashSet<PoolKey> = [by_name.clone(), by_asset, PoolKey::name("enemy")]
            .into_iter()
            .collect();
        assert_eq!(keys.len(), 2);
        assert!(keys.contains(&by_name));
    }

    #[test]
    fn sub_asset_is_part_of_identity() {
        let atlas = AssetRef::new("5f1e");
        let frame = AssetRef::new("5f1e").with_sub_asset("walk_0");

        assert_ne!(PoolKey::from(atlas.clone()), PoolKey::from(frame.clone()));
        assert_eq!(frame.guid(), "5f1e");
        assert_eq!(frame.sub_asset(), Some("walk_0"));
        assert_eq!(atlas.sub_asset(), None);
    }

    #[test]
    fn display_forms() {
        assert_eq!(PoolKey::from("bullet").to_string(), "name:bullet");
        assert_eq!(PoolKey::from(String::from("bullet")).to_string(), "name:bullet");
        assert_eq!(
            PoolKey::asset(AssetRef::new("9a0c").with_sub_asset("idle")).to_string(),
            "asset:9a0c[idle]"
        );
    }
}
