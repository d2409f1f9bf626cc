//! Error types for the pool engine.

use stockpile_system::scope::ScopeId;
use thiserror::Error;

use crate::key::PoolKey;

type BoxError = Box<dyn core::error::Error + Send + Sync>;

/// Errors returned by acquisition and warm-up.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The factory could not produce an instance, so none was handed out.
    ///
    /// Never retried by the engine.
    #[error("failed to construct an instance for {key}")]
    ConstructionFailed {
        /// Key whose construction failed.
        key: PoolKey,
        /// The factory's error, if it reported one.
        #[source]
        source: Option<ConstructionError>,
    },

    /// The key lock belongs to a scope that has been torn down.
    ///
    /// Happens when an operation races the teardown of its scope, or when a
    /// caller keeps using a scope after it ended.
    #[error("pool {key} in scope {scope} was disposed")]
    LockDisposed {
        /// Scope that was torn down.
        scope: ScopeId,
        /// Key whose lock was disposed.
        key: PoolKey,
    },

    /// A blocking acquire could not start the runtime that drives it.
    #[error("could not start a runtime for a blocking acquire")]
    Runtime {
        /// The runtime builder's error.
        #[source]
        source: std::io::Error,
    },
}

/// Error reported by [`ResourceFactory::construct`](crate::factory::ResourceFactory::construct).
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ConstructionError {
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl ConstructionError {
    /// Creates an error with a message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Attaches an underlying cause.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Returns the message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Error reported by [`ResourceFactory::destroy`](crate::factory::ResourceFactory::destroy).
///
/// Teardown logs these and moves on to the next instance.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct DestroyError {
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl DestroyError {
    /// Creates an error with a message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Attaches an underlying cause.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Returns the message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}
