//! Object model for Meridian.
//!
//! This is the minimal object surface the dispatch protocol needs:
//!
//! - [`Object`] - Base trait that all reflected objects implement
//! - [`ObjectBase`] - Helper struct embedded in object types; registers the
//!   instance and owns its change-event hub
//! - [`ObjectId`] - Unique stable identifier for each live instance
//! - [`ObjectRegistry`] - Central registry of live instances
//! - [`object_cast`] / [`object_cast_mut`] - Safe downcasting
//!
//! # Example
//!
//! ```ignore
//! use meridian_core::{Object, ObjectBase, ObjectId, init_global_registry};
//!
//! init_global_registry();
//!
//! struct Sensor {
//!     base: ObjectBase,
//!     reading: f64,
//! }
//!
//! impl Sensor {
//!     fn new() -> Self {
//!         Self { base: ObjectBase::new::<Self>(), reading: 0.0 }
//!     }
//! }
//!
//! impl Object for Sensor {
//!     fn object_id(&self) -> ObjectId {
//!         self.base.id()
//!     }
//! }
//! ```
//!
//! # Related Modules
//!
//! - [`crate::meta`] - Runtime type information for objects
//! - [`crate::signal`] - The change hub each [`ObjectBase`] owns

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::OnceLock;

use parking_lot::RwLock;
use slotmap::{SlotMap, new_key_type};

use crate::logging::targets;
use crate::meta::MetaObject;
use crate::signal::ChangeHub;

new_key_type! {
    /// A unique identifier for a live object instance.
    ///
    /// `ObjectId`s are stable handles; they become invalid when the object is
    /// destroyed.
    pub struct ObjectId;
}

/// Errors that can occur during object operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectError {
    /// The object ID is invalid or has been destroyed.
    InvalidObjectId,
    /// The object registry is not initialized.
    RegistryNotInitialized,
}

impl fmt::Display for ObjectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidObjectId => write!(f, "Invalid or destroyed object ID"),
            Self::RegistryNotInitialized => write!(f, "Object registry not initialized"),
        }
    }
}

impl std::error::Error for ObjectError {}

/// Result type for object operations.
pub type ObjectResult<T> = std::result::Result<T, ObjectError>;

/// Internal data stored in the registry for each object.
struct ObjectData {
    /// Human-readable name for debugging and lookup.
    name: String,
    /// The type ID of the concrete Object implementation.
    type_id: TypeId,
    /// The type name for debugging.
    type_name: &'static str,
}

/// The central registry of live object instances.
///
/// Uses arena-based storage via SlotMap for stable object IDs.
pub struct ObjectRegistry {
    objects: SlotMap<ObjectId, ObjectData>,
}

impl ObjectRegistry {
    /// Create a new empty object registry.
    pub fn new() -> Self {
        Self {
            objects: SlotMap::with_key(),
        }
    }

    /// Register a new object and return its ID.
    pub fn register<T: Object + 'static>(&mut self) -> ObjectId {
        let data = ObjectData {
            name: String::new(),
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
        };
        let id = self.objects.insert(data);
        tracing::trace!(target: targets::OBJECT, ?id, type_name = std::any::type_name::<T>(), "registered object");
        id
    }

    /// Remove an object from the registry.
    pub fn destroy(&mut self, id: ObjectId) -> ObjectResult<()> {
        self.objects
            .remove(id)
            .map(|_| {
                tracing::trace!(target: targets::OBJECT, ?id, "destroyed object");
            })
            .ok_or(ObjectError::InvalidObjectId)
    }

    /// Check if an object exists in the registry.
    pub fn contains(&self, id: ObjectId) -> bool {
        self.objects.contains_key(id)
    }

    /// Get the object's name.
    pub fn object_name(&self, id: ObjectId) -> ObjectResult<&str> {
        self.objects
            .get(id)
            .map(|d| d.name.as_str())
            .ok_or(ObjectError::InvalidObjectId)
    }

    /// Set the object's name.
    pub fn set_object_name(&mut self, id: ObjectId, name: String) -> ObjectResult<()> {
        self.objects
            .get_mut(id)
            .map(|d| d.name = name)
            .ok_or(ObjectError::InvalidObjectId)
    }

    /// Get the type ID of an object.
    pub fn type_id(&self, id: ObjectId) -> ObjectResult<TypeId> {
        self.objects
            .get(id)
            .map(|d| d.type_id)
            .ok_or(ObjectError::InvalidObjectId)
    }

    /// Get the type name of an object.
    pub fn type_name(&self, id: ObjectId) -> ObjectResult<&'static str> {
        self.objects
            .get(id)
            .map(|d| d.type_name)
            .ok_or(ObjectError::InvalidObjectId)
    }

    /// Get the number of registered objects.
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }
}

impl Default for ObjectRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// A thread-safe wrapper around [`ObjectRegistry`].
pub struct SharedObjectRegistry {
    inner: RwLock<ObjectRegistry>,
}

impl SharedObjectRegistry {
    /// Create a new shared object registry.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(ObjectRegistry::new()),
        }
    }

    /// Register a new object.
    pub fn register<T: Object + 'static>(&self) -> ObjectId {
        self.inner.write().register::<T>()
    }

    /// Destroy an object.
    pub fn destroy(&self, id: ObjectId) -> ObjectResult<()> {
        self.inner.write().destroy(id)
    }

    /// Check if an object exists.
    pub fn contains(&self, id: ObjectId) -> bool {
        self.inner.read().contains(id)
    }

    /// Get the object's name.
    pub fn object_name(&self, id: ObjectId) -> ObjectResult<String> {
        self.inner.read().object_name(id).map(str::to_string)
    }

    /// Set the object's name.
    pub fn set_object_name(&self, id: ObjectId, name: String) -> ObjectResult<()> {
        self.inner.write().set_object_name(id, name)
    }

    /// Get the type name of an object.
    pub fn type_name(&self, id: ObjectId) -> ObjectResult<&'static str> {
        self.inner.read().type_name(id)
    }

    /// Get the number of registered objects.
    pub fn object_count(&self) -> usize {
        self.inner.read().object_count()
    }

    /// Access the registry with a read lock for complex operations.
    pub fn with_read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&ObjectRegistry) -> R,
    {
        f(&self.inner.read())
    }
}

impl Default for SharedObjectRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Global object registry (lazy initialized).
static GLOBAL_REGISTRY: OnceLock<SharedObjectRegistry> = OnceLock::new();

/// Initialize the global object registry.
///
/// Idempotent; typically called once during application startup, before the
/// first object is constructed.
pub fn init_global_registry() {
    GLOBAL_REGISTRY.get_or_init(SharedObjectRegistry::new);
}

/// Get a reference to the global object registry.
///
/// Returns an error if the registry hasn't been initialized.
pub fn global_registry() -> ObjectResult<&'static SharedObjectRegistry> {
    GLOBAL_REGISTRY
        .get()
        .ok_or(ObjectError::RegistryNotInitialized)
}

/// The base trait that all reflected objects implement.
///
/// Types deriving `Object` get the full implementation generated, including
/// [`meta_object`](Self::meta_object) and [`change_hub`](Self::change_hub);
/// hand-written implementors without meta-object support can rely on the
/// defaults.
///
/// # Related Types
///
/// - [`ObjectBase`] - Helper for implementing this trait
/// - [`crate::meta::MetaObject`] - Runtime type information
/// - [`object_cast`] - Safe downcasting function
pub trait Object: Any + Send + Sync {
    /// Get this object's unique identifier.
    fn object_id(&self) -> ObjectId;

    /// Get the static meta-object for this type.
    ///
    /// Returns `Some(&MetaObject)` for types with meta-object information
    /// (typically generated by `#[derive(Object)]`), or `None` otherwise.
    fn meta_object(&self) -> Option<&'static MetaObject> {
        None
    }

    /// Get this instance's change-event hub.
    ///
    /// Returns `None` for types that cannot deliver change events.
    fn change_hub(&self) -> Option<&ChangeHub> {
        None
    }
}

/// Helper for implementing the [`Object`] trait.
///
/// Include this as a field named `base` in your object types (the derive
/// macro requires it). On construction it registers the object with the
/// [`global_registry`]; on drop it unregisters. It also owns the instance's
/// [`ChangeHub`], through which all of the object's change events are
/// delivered.
pub struct ObjectBase {
    id: ObjectId,
    hub: ChangeHub,
}

impl ObjectBase {
    /// Create a new ObjectBase, registering the object in the global registry.
    ///
    /// # Panics
    ///
    /// Panics if the global registry is not initialized.
    pub fn new<T: Object + 'static>() -> Self {
        let registry = global_registry().expect("Object registry not initialized");
        let id = registry.register::<T>();
        Self {
            id,
            hub: ChangeHub::new(),
        }
    }

    /// Get the object's ID.
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Get the instance's change-event hub.
    pub fn hub(&self) -> &ChangeHub {
        &self.hub
    }

    /// Get the object's name from the registry.
    pub fn name(&self) -> String {
        global_registry()
            .and_then(|r| r.object_name(self.id))
            .unwrap_or_default()
    }

    /// Set the object's name in the registry.
    pub fn set_name(&self, name: impl Into<String>) {
        if let Ok(registry) = global_registry() {
            let _ = registry.set_object_name(self.id, name.into());
        }
    }
}

impl Drop for ObjectBase {
    fn drop(&mut self) {
        // Automatically unregister from the global registry when dropped.
        if let Ok(registry) = global_registry() {
            let _ = registry.destroy(self.id);
        }
    }
}

/// Safe downcast function for [`Object`] trait objects.
///
/// Returns `Some(&T)` if the object is of type `T`, otherwise `None`.
pub fn object_cast<T: Object + 'static>(obj: &dyn Object) -> Option<&T> {
    (obj as &dyn Any).downcast_ref::<T>()
}

/// Safe mutable downcast function for [`Object`] trait objects.
pub fn object_cast_mut<T: Object + 'static>(obj: &mut dyn Object) -> Option<&mut T> {
    (obj as &mut dyn Any).downcast_mut::<T>()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestObject {
        base: ObjectBase,
        value: i32,
    }

    impl TestObject {
        fn new(value: i32) -> Self {
            Self {
                base: ObjectBase::new::<Self>(),
                value,
            }
        }
    }

    impl Object for TestObject {
        fn object_id(&self) -> ObjectId {
            self.base.id()
        }

        fn change_hub(&self) -> Option<&ChangeHub> {
            Some(self.base.hub())
        }
    }

    struct OtherObject {
        base: ObjectBase,
    }

    impl OtherObject {
        fn new() -> Self {
            Self {
                base: ObjectBase::new::<Self>(),
            }
        }
    }

    impl Object for OtherObject {
        fn object_id(&self) -> ObjectId {
            self.base.id()
        }
    }

    fn setup() {
        init_global_registry();
    }

    #[test]
    fn test_object_creation_and_destruction() {
        setup();
        let registry = global_registry().unwrap();

        let id = {
            let obj = TestObject::new(42);
            let id = obj.object_id();
            assert!(registry.contains(id));
            id
        };

        // Dropped - unregistered.
        assert!(!registry.contains(id));
    }

    #[test]
    fn test_object_name() {
        setup();
        let obj = TestObject::new(1);
        obj.base.set_name("test_object");
        assert_eq!(obj.base.name(), "test_object");
    }

    #[test]
    fn test_registry_type_info() {
        setup();
        let obj = TestObject::new(1);
        let registry = global_registry().unwrap();

        let type_name = registry.type_name(obj.object_id()).unwrap();
        assert!(type_name.ends_with("TestObject"));

        let type_id = registry.with_read(|r| r.type_id(obj.object_id())).unwrap();
        assert_eq!(type_id, TypeId::of::<TestObject>());
    }

    #[test]
    fn test_destroy_unknown_id_fails() {
        setup();
        let registry = global_registry().unwrap();
        let obj = TestObject::new(1);
        let id = obj.object_id();
        drop(obj);

        assert_eq!(registry.destroy(id), Err(ObjectError::InvalidObjectId));
    }

    #[test]
    fn test_object_cast() {
        setup();
        let obj = TestObject::new(42);
        let obj_ref: &dyn Object = &obj;

        let casted = object_cast::<TestObject>(obj_ref);
        assert!(casted.is_some());
        assert_eq!(casted.unwrap().value, 42);

        // Wrong type cast returns None
        let wrong_cast = object_cast::<OtherObject>(obj_ref);
        assert!(wrong_cast.is_none());
    }

    #[test]
    fn test_object_cast_mut() {
        setup();
        let mut obj = TestObject::new(1);
        let obj_ref: &mut dyn Object = &mut obj;

        if let Some(casted) = object_cast_mut::<TestObject>(obj_ref) {
            casted.value = 99;
        }
        assert_eq!(obj.value, 99);
    }

    #[test]
    fn test_default_trait_methods() {
        setup();
        let obj = OtherObject::new();
        assert!(obj.meta_object().is_none());
        assert!(obj.change_hub().is_none());
    }
}
