//! Lifetime boundary identifiers.
//!
//! A scope is whatever the host treats as a unit of lifetime: a loaded scene,
//! a user session, a test fixture. Everything pooled inside a scope is torn
//! down together when the scope ends.

use core::fmt;
use core::hash::{Hash, Hasher};
use std::sync::Arc;

/// Opaque identifier for a scope.
///
/// Equality and hashing use the numeric handle only; the label is carried for
/// logs and statistics. Two `ScopeId`s with the same handle but different
/// labels refer to the same scope.
#[derive(Clone)]
pub struct ScopeId {
    handle: u64,
    label: Arc<str>,
}

impl ScopeId {
    /// Creates a scope identifier from a host handle and a display label.
    #[must_use]
    pub fn new(handle: u64, label: impl Into<Arc<str>>) -> Self {
        Self {
            handle,
            label: label.into(),
        }
    }

    /// Returns the numeric handle.
    #[must_use]
    pub fn handle(&self) -> u64 {
        self.handle
    }

    /// Returns the display label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl PartialEq for ScopeId {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle
    }
}

impl Eq for ScopeId {}

impl Hash for ScopeId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.handle.hash(state);
    }
}

impl fmt::Debug for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ScopeId")
            .field(&self.handle)
            .field(&self.label)
            .finish()
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.label, self.handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hashbrown::HashSet;

    #[test]
    fn equality_ignores_label() {
        let a = ScopeId::new(7, "menu");
        let b = ScopeId::new(7, "menu (reloaded)");
        let c = ScopeId::new(8, "menu");

        assert_eq!(a, b);
        assert_ne!(a, c);

        let set: HashSet<ScopeId> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn display_includes_label_and_handle() {
        let scope = ScopeId::new(3, "level-1");
        assert_eq!(scope.to_string(), "level-1#3");
        assert_eq!(scope.label(), "level-1");
        assert_eq!(scope.handle(), 3);
    }
}
