//! Logging and debugging facilities for Meridian.
//!
//! This module provides:
//! - Target and span-name constants for the `tracing` instrumentation used
//!   throughout the crate
//! - A debug formatter for a type's member table
//!
//! # Tracing Integration
//!
//! Meridian uses the `tracing` crate for instrumentation. To see logs,
//! install a tracing subscriber in your application:
//!
//! ```ignore
//! use tracing_subscriber;
//!
//! fn main() {
//!     tracing_subscriber::fmt::init();
//!
//!     // Your application code...
//! }
//! ```
//!
//! Table construction logs each emplaced member at `debug` level under
//! [`targets::META`]; lookup misses and unsupported dispatch operations log
//! at `warn`; ordering violations log at `error` immediately before the
//! fatal panic.

use std::fmt::{self, Write as FmtWrite};

use crate::meta::MetaObject;

/// Span names used throughout Meridian for tracing.
///
/// These constants can be used to filter traces for specific subsystems.
pub mod span_names {
    /// Meta-object construction span.
    pub const META_BUILD: &str = "meridian::meta_build";
    /// Generic dispatch span.
    pub const DISPATCH: &str = "meridian::dispatch";
    /// Change-event delivery span.
    pub const SIGNAL: &str = "meridian::signal";
}

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Core framework target.
    pub const CORE: &str = "meridian_core";
    /// Meta-object system target (table build, lookups, dispatch).
    pub const META: &str = "meridian_core::meta";
    /// Type registry target.
    pub const REGISTRY: &str = "meridian_core::meta::registry";
    /// Property system target.
    pub const PROPERTY: &str = "meridian_core::property";
    /// Change-notification target.
    pub const SIGNAL: &str = "meridian_core::signal";
    /// Object model target.
    pub const OBJECT: &str = "meridian_core::object";
}

/// Debug utility that renders a type's member table.
///
/// One line per member: label, kind, name, capability set, and the notify
/// signal where present. Useful when diagnosing label-ordering problems or
/// verifying what the derive registered.
///
/// # Example
///
/// ```ignore
/// use meridian_core::logging::MetaObjectDebug;
///
/// println!("{}", MetaObjectDebug::new(Widget::static_meta()));
/// ```
pub struct MetaObjectDebug {
    meta: &'static MetaObject,
}

impl MetaObjectDebug {
    /// Create a formatter for `meta`'s member table.
    pub fn new(meta: &'static MetaObject) -> Self {
        Self { meta }
    }
}

impl fmt::Display for MetaObjectDebug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} ({} members, {} properties, {} signals)",
            self.meta.type_name(),
            self.meta.members().len(),
            self.meta.property_count(),
            self.meta.signal_count()
        )?;

        for member in self.meta.members() {
            let mut line = format!(
                "  [{}] {:?} \"{}\" features={}",
                member.label, member.kind, member.name, member.features
            );
            if let Some(signal) = member.notify_signal {
                write!(line, " notify={signal}")?;
            }
            if !member.value.is_empty() {
                write!(line, " value=\"{}\"", member.value)?;
            }
            writeln!(f, "{line}")?;
        }

        Ok(())
    }
}
