//! Core systems for Meridian.
//!
//! This crate provides the runtime half of the Meridian meta-object system:
//!
//! - **Member Descriptors**: Immutable records of each reflectable member's
//!   name, label, value type, capabilities, offset, and accessors
//! - **Meta-Objects**: Per-type descriptor tables with validated ordering,
//!   built lazily exactly once, driving generic read/write/reset dispatch
//!   and event-identity lookup
//! - **Property System**: Per-instance state slots with change detection
//! - **Change Notification**: Per-instance hubs delivering member change
//!   events, plus typed signal façades
//! - **Object Model**: The base trait, instance registry, and downcasting
//! - **Type Registry**: Name-keyed lookup and dynamic instantiation
//!
//! The compile-time half - member discovery, label allocation, accessor and
//! offset-resolver generation - lives in the `meridian-macros` crate's
//! `#[derive(Object)]`.
//!
//! # Reflection Example
//!
//! ```ignore
//! use meridian_core::meta::{MetaCall, MetaCallReply};
//! use meridian_core::{Object, ObjectBase, Property, init_global_registry};
//! use meridian_macros::Object;
//!
//! init_global_registry();
//!
//! #[derive(Object)]
//! struct Dial {
//!     base: ObjectBase,
//!
//!     #[property(write)]
//!     level: Property<i32>,
//! }
//!
//! let dial = Dial { base: ObjectBase::new::<Dial>(), level: Property::new(0) };
//! let meta = Dial::static_meta();
//!
//! // Named access
//! meta.set_property(&dial, "level", Box::new(7i32))?;
//!
//! // Positional dispatch, as a host framework would drive it
//! let reply = meta.meta_call(&dial, MetaCall::ReadProperty { index: 0 });
//! ```
//!
//! # Change Notification Example
//!
//! ```ignore
//! let connection = Dial::level_changed().connect(&dial, |level: &i32| {
//!     println!("level is now {level}");
//! })?;
//!
//! dial.set_level(8);  // slot runs once
//! dial.set_level(8);  // unchanged value: slot does not run
//! ```

pub mod error;
pub mod label;
pub mod logging;
pub mod member;
pub mod meta;
pub mod object;
pub mod property;
pub mod signal;

pub use error::{MeridianError, Result};
pub use label::Label;
pub use member::{
    Feature, FeatureSet, InterfaceCaster, MemberInfo, MemberKind, SignalToken, canonical,
};
pub use meta::{
    MetaCall, MetaCallReply, MetaError, MetaObject, MetaObjectBuilder, MetaResult, TypeRegistry,
};
pub use object::{
    Object, ObjectBase, ObjectError, ObjectId, ObjectRegistry, ObjectResult,
    SharedObjectRegistry, global_registry, init_global_registry, object_cast, object_cast_mut,
};
pub use property::{Property, PropertyError};
pub use signal::{ChangeHub, ChangeSignal, ConnectionId, emit_change};
