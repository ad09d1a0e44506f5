//! Prelude module for Meridian.
//!
//! This module re-exports the most commonly used types for convenient importing:
//!
//! ```ignore
//! use meridian::prelude::*;
//! ```
//!
//! This provides access to:
//! - The `Object` trait and derive macro, plus `ObjectBase`
//! - The property system (`Property`)
//! - Change notification (`ChangeSignal`, `ConnectionId`)
//! - The meta-object surface (`MetaObject`, `MetaCall`, `TypeRegistry`)

// ============================================================================
// Object System
// ============================================================================

pub use meridian_core::object::{
    Object, ObjectBase, ObjectId, init_global_registry, object_cast, object_cast_mut,
};
pub use meridian_macros::Object;

// ============================================================================
// Property System and Change Notification
// ============================================================================

pub use meridian_core::property::Property;
pub use meridian_core::signal::{ChangeSignal, ConnectionId};

// ============================================================================
// Meta-Object System
// ============================================================================

pub use meridian_core::label::Label;
pub use meridian_core::member::{Feature, FeatureSet, MemberInfo, MemberKind, SignalToken};
pub use meridian_core::meta::{
    MetaCall, MetaCallReply, MetaError, MetaObject, MetaObjectBuilder, MetaResult, TypeRegistry,
};

// ============================================================================
// Errors
// ============================================================================

pub use meridian_core::error::{MeridianError, Result};
