//! Meridian - compile-time meta-object reflection for Rust object frameworks.
//!
//! This is the main umbrella crate that re-exports all public APIs.
//!
//! # Example
//!
//! ```no_run
//! use meridian::prelude::*;
//!
//! init_global_registry();
//!
//! #[derive(Object)]
//! #[object(no_factory)]
//! struct Dial {
//!     base: ObjectBase,
//!
//!     #[property(write)]
//!     level: Property<i32>,
//! }
//!
//! let dial = Dial {
//!     base: ObjectBase::new::<Dial>(),
//!     level: Property::new(0),
//! };
//!
//! dial.set_level(7);
//! assert_eq!(dial.level.get(), 7);
//! ```

pub use meridian_core::*;
pub use meridian_macros::*;

pub mod prelude;
