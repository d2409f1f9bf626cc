//! Scope registry.

use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::RwLock;
use stockpile_system::scope::ScopeId;

use crate::factory::ResourceFactory;
use crate::scope::ScopeState;

/// Maps live scopes to their pool tables.
pub(crate) struct ScopeRegistry<F: ResourceFactory> {
    factory: Arc<F>,
    scopes: RwLock<HashMap<ScopeId, Arc<ScopeState<F>>>>,
}

impl<F: ResourceFactory> ScopeRegistry<F> {
    pub(crate) fn new(factory: Arc<F>) -> Self {
        Self {
            factory,
            scopes: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the state of `scope`, creating it if the scope is unseen.
    pub(crate) fn scope_state(&self, scope: &ScopeId) -> Arc<ScopeState<F>> {
        if let Some(state) = self.scopes.read().get(scope) {
            return Arc::clone(state);
        }

        let mut scopes = self.scopes.write();
        let state = scopes.entry(scope.clone()).or_insert_with(|| {
            tracing::debug!(%scope, "scope state created");
            Arc::new(ScopeState::new(scope.clone(), Arc::clone(&self.factory)))
        });
        Arc::clone(state)
    }

    pub(crate) fn get(&self, scope: &ScopeId) -> Option<Arc<ScopeState<F>>> {
        self.scopes.read().get(scope).cloned()
    }

    pub(crate) fn remove(&self, scope: &ScopeId) -> Option<Arc<ScopeState<F>>> {
        self.scopes.write().remove(scope)
    }

    /// Removes every scope, ordered by handle.
    pub(crate) fn drain(&self) -> Vec<(ScopeId, Arc<ScopeState<F>>)> {
        let mut drained: Vec<_> = self.scopes.write().drain().collect();
        drained.sort_by_key(|(scope, _)| scope.handle());
        drained
    }

    /// Returns the live scopes, ordered by handle.
    pub(crate) fn scopes(&self) -> Vec<ScopeId> {
        let mut scopes: Vec<ScopeId> = self.scopes.read().keys().cloned().collect();
        scopes.sort_by_key(ScopeId::handle);
        scopes
    }

    /// Returns the live scopes with their states, ordered by handle.
    pub(crate) fn entries(&self) -> Vec<(ScopeId, Arc<ScopeState<F>>)> {
        let mut entries: Vec<_> = self
            .scopes
            .read()
            .iter()
            .map(|(scope, state)| (scope.clone(), Arc::clone(state)))
            .collect();
        entries.sort_by_key(|(scope, _)| scope.handle());
        entries
    }

    pub(crate) fn len(&self) -> usize {
        self.scopes.read().len()
    }
}
