//! Type-keyed resource storage.
//!
//! The server keeps its global resources (read by application code, e.g. the
//! pool manager handle) in a [`Resources`] container.

use core::any::{Any, TypeId};
use hashbrown::HashMap;

/// A value that can be stored in [`Resources`].
///
/// Blanket-implemented for every `Send + Sync + 'static` type.
pub trait Resource: Send + Sync + 'static {
    /// Returns the type name for debugging purposes.
    fn type_name(&self) -> &'static str {
        core::any::type_name::<Self>()
    }
}

impl<T: Send + Sync + 'static> Resource for T {}

/// Marker trait for resources registered with
/// [`Server::insert_global`](crate::server::Server::insert_global).
///
/// Global resources live as long as the server. Types that need to change at
/// runtime should be cheap handles over shared state (the pool manager is an
/// `Arc` inside), so a clone can be taken out of the server and used freely.
pub trait GlobalResource: Resource {}

/// Unique identifier for a resource type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceId(TypeId);

impl ResourceId {
    /// Creates a `ResourceId` for the given type.
    #[must_use]
    pub fn of<T: Resource>() -> Self {
        Self(TypeId::of::<T>())
    }

    /// Returns the underlying `TypeId`.
    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.0
    }
}

/// Container mapping a type to at most one value of that type.
///
/// # Example
///
/// ```
/// use stockpile_system::resource::Resources;
///
/// struct FrameBudget { micros: u64 }
///
/// let mut resources = Resources::new();
/// resources.insert(FrameBudget { micros: 16_000 });
///
/// if let Some(budget) = resources.get_mut::<FrameBudget>() {
///     budget.micros = 8_000;
/// }
/// assert_eq!(resources.get::<FrameBudget>().map(|b| b.micros), Some(8_000));
/// ```
#[derive(Default)]
pub struct Resources {
    storage: HashMap<ResourceId, Box<dyn Any + Send + Sync>>,
}

impl Resources {
    /// Creates a new empty container.
    #[must_use]
    pub fn new() -> Self {
        Self {
            storage: HashMap::new(),
        }
    }

    /// Inserts a resource, returning the previous value of the same type.
    pub fn insert<T: Resource>(&mut self, resource: T) -> Option<T> {
        self.storage
            .insert(ResourceId::of::<T>(), Box::new(resource))
            .and_then(|old| old.downcast::<T>().ok())
            .map(|boxed| *boxed)
    }

    /// Returns `true` if a resource of type `T` exists.
    #[must_use]
    pub fn contains<T: Resource>(&self) -> bool {
        self.storage.contains_key(&ResourceId::of::<T>())
    }

    /// Returns a shared reference to the resource of type `T`.
    #[must_use]
    pub fn get<T: Resource>(&self) -> Option<&T> {
        self.storage
            .get(&ResourceId::of::<T>())
            .and_then(|boxed| boxed.downcast_ref::<T>())
    }

    /// Returns a mutable reference to the resource of type `T`.
    #[must_use]
    pub fn get_mut<T: Resource>(&mut self) -> Option<&mut T> {
        self.storage
            .get_mut(&ResourceId::of::<T>())
            .and_then(|boxed| boxed.downcast_mut::<T>())
    }

    /// Removes and returns the resource of type `T`.
    pub fn remove<T: Resource>(&mut self) -> Option<T> {
        self.storage
            .remove(&ResourceId::of::<T>())
            .and_then(|boxed| boxed.downcast::<T>().ok())
            .map(|boxed| *boxed)
    }

    /// Removes all resources.
    pub fn clear(&mut self) {
        self.storage.clear();
    }

    /// Returns the number of resources stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    /// Returns `true` if no resources are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }
}
