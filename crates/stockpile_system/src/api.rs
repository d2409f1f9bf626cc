//! API trait for capability registration.
//!
//! APIs are registries that plugins insert during `build()` and that other
//! plugins (or application code holding the server) look up by type. Unlike
//! global resources, APIs are expected to use interior mutability so that
//! `server.api::<A>()` can hand out a shared reference that still accepts
//! registrations.
//!
//! | Aspect | API | Global resource |
//! |--------|-----|-----------------|
//! | **Purpose** | Capability registry / event bus | Shared runtime state |
//! | **Access** | `server.api::<A>()` | `server.get_global::<R>()` |
//! | **Mutation** | Interior (`RwLock`, atomics) | Replaced wholesale |
//!
//! [`HostSignals`](crate::signal::HostSignals) is the canonical example: the
//! pooling plugin subscribes to it in `ready()`, while the host emits scope
//! transitions through it at runtime.
//!
//! # Example
//!
//! ```
//! use parking_lot::RwLock;
//! use stockpile_system::api::API;
//!
//! #[derive(Default)]
//! pub struct AssetCatalog {
//!     names: RwLock<Vec<String>>,
//! }
//!
//! impl API for AssetCatalog {}
//!
//! impl AssetCatalog {
//!     pub fn register(&self, name: impl Into<String>) {
//!         self.names.write().push(name.into());
//!     }
//! }
//! ```

/// Marker trait for capability APIs.
///
/// Implement it for any registry type that plugins should be able to look
/// up through [`Server::api`](crate::server::Server::api).
pub trait API: Send + Sync + 'static {}
