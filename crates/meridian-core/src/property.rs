//! Property slots.
//!
//! A [`Property<T>`] is the per-instance state slot behind a reflected
//! member: it owns the value and detects changes, while everything shared
//! (name, label, capabilities, accessors) lives in the owning type's member
//! table. When `set()` reports a change, the caller raises the member's
//! change event - the generated setters do this automatically.
//!
//! # Example
//!
//! ```ignore
//! use meridian_core::property::Property;
//!
//! let text = Property::new("hello".to_string());
//! assert_eq!(text.get(), "hello");
//!
//! // Setting the same value reports no change
//! assert!(!text.set("hello".to_string()));
//!
//! // Setting a different value reports a change
//! assert!(text.set("world".to_string()));
//! ```

use std::fmt;

use parking_lot::RwLock;

/// A state slot with change detection.
///
/// `Property<T>` wraps a value and compares on assignment: `set()` returns
/// whether the value actually changed, which is what drives "notify exactly
/// once, and only on real changes" semantics upstream.
///
/// # Thread Safety
///
/// Uses interior mutability with `RwLock`; `Send + Sync` when `T` allows.
/// This is also why the type-erased write path can work through `&dyn`
/// references: mutation never needs `&mut self`.
pub struct Property<T> {
    value: RwLock<T>,
}

impl<T: Clone> Property<T> {
    /// Create a new property with an initial value.
    pub fn new(value: T) -> Self {
        Self {
            value: RwLock::new(value),
        }
    }

    /// Get the current value.
    ///
    /// This clones the value. For large types, consider using `with()` instead.
    pub fn get(&self) -> T {
        self.value.read().clone()
    }

    /// Access the value through a closure without cloning.
    pub fn with<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        f(&self.value.read())
    }

    /// Set the value without change detection.
    ///
    /// Useful during construction or batch updates where notifications are
    /// deferred or unwanted.
    pub fn set_silent(&self, value: T) {
        *self.value.write() = value;
    }
}

impl<T: Clone + PartialEq> Property<T> {
    /// Set the value, returning `true` if the value changed.
    ///
    /// The caller should raise the member's change event exactly when this
    /// returns `true`.
    pub fn set(&self, value: T) -> bool {
        let mut current = self.value.write();
        if *current != value {
            *current = value;
            true
        } else {
            false
        }
    }

    /// Set the value, returning the old value if it changed.
    pub fn replace(&self, value: T) -> Option<T> {
        let mut current = self.value.write();
        if *current != value {
            let old = std::mem::replace(&mut *current, value);
            Some(old)
        } else {
            None
        }
    }
}

impl<T: Clone> Clone for Property<T> {
    fn clone(&self) -> Self {
        Self::new(self.get())
    }
}

impl<T: Clone + Default> Default for Property<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Clone + fmt::Debug> fmt::Debug for Property<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("value", &self.get())
            .finish()
    }
}

/// Error types for property operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyError {
    /// The property was not found.
    NotFound {
        /// The name of the property that was not found.
        name: String,
    },
    /// The property type did not match.
    TypeMismatch {
        /// The expected type name.
        expected: &'static str,
        /// The actual type name.
        got: &'static str,
    },
    /// The property is read-only and cannot be modified.
    ReadOnly {
        /// The name of the read-only property.
        name: String,
    },
}

impl fmt::Display for PropertyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { name } => write!(f, "Property '{name}' not found"),
            Self::TypeMismatch { expected, got } => {
                write!(f, "Property type mismatch: expected {expected}, got {got}")
            }
            Self::ReadOnly { name } => write!(f, "Property '{name}' is read-only"),
        }
    }
}

impl std::error::Error for PropertyError {}
