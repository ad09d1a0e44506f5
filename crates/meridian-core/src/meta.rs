//! Meta-object system: descriptor tables, generic dispatch, type registry.
//!
//! A [`MetaObject`] is the runtime type descriptor of one reflected type: an
//! ordered, validated table of [`MemberInfo`] records plus the sub-indexes
//! and function-pointer plumbing a host object framework needs to drive the
//! type generically. It is built exactly once per type - lazily, on first
//! access, behind the `OnceLock` in the generated `static_meta()` - and is
//! immutable and shared afterwards.
//!
//! # Construction
//!
//! [`MetaObjectBuilder`] collects member descriptors in declaration order
//! (the derive macro emits them that way) and freezes them with
//! [`build`](MetaObjectBuilder::build). Build-time validation enforces the
//! one invariant every later lookup depends on: member labels must be
//! strictly increasing. A violation is a configuration error in the authored
//! type, not a runtime condition, and aborts construction with a diagnostic
//! naming both offending members.
//!
//! # Dispatch
//!
//! The host framework addresses properties *positionally*: a zero-based
//! index into the property sub-index, in registration order. The single
//! generic entry point is [`MetaObject::meta_call`]:
//!
//! - [`MetaCall::ReadProperty`] / [`WriteProperty`](MetaCall::WriteProperty)
//!   / [`ResetProperty`](MetaCall::ResetProperty) - positional access
//! - [`MetaCall::IndexOfMethod`] - maps a change-event identity back to its
//!   position among the type's notifying members
//! - anything else is logged and ignored, so a host framework growing new
//!   operation kinds degrades gracefully
//!
//! Lookup misses are warnings, not errors: the host framework probes
//! speculatively. Nothing panics across the dispatch boundary.
//!
//! # Example
//!
//! ```ignore
//! let meta = Widget::static_meta();
//!
//! // Named access
//! let title = meta.get_property(&widget, "title")?;
//!
//! // Positional dispatch, as the host framework would drive it
//! let reply = meta.meta_call(&widget, MetaCall::ReadProperty { index: 0 });
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

use parking_lot::RwLock;

use crate::label::Label;
use crate::logging::targets;
use crate::member::{
    Feature, InterfaceCaster, MemberInfo, MemberKind, SignalToken, canonical,
};
use crate::object::Object;

/// Errors reported by the meta-object system's named access layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetaError {
    /// No property with the given name exists on the type or its ancestors.
    PropertyNotFound {
        /// The requested property name.
        name: String,
    },
    /// A value of the wrong type was supplied or requested.
    PropertyTypeMismatch {
        /// The property's value type.
        expected: &'static str,
        /// The offered type.
        got: &'static str,
    },
    /// The property does not accept generic writes.
    PropertyReadOnly {
        /// The property name.
        name: String,
    },
    /// The property has no declared default to reset to.
    PropertyNotResettable {
        /// The property name.
        name: String,
    },
    /// No notifying member exists at the given label.
    SignalNotFound {
        /// The requested label.
        label: Label,
    },
    /// The object passed in is not an instance of the descriptor's type.
    ObjectTypeMismatch {
        /// The descriptor's type name.
        expected: &'static str,
    },
}

impl fmt::Display for MetaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PropertyNotFound { name } => write!(f, "Property '{name}' not found"),
            Self::PropertyTypeMismatch { expected, got } => {
                write!(f, "Property type mismatch: expected {expected}, got {got}")
            }
            Self::PropertyReadOnly { name } => write!(f, "Property '{name}' is read-only"),
            Self::PropertyNotResettable { name } => {
                write!(f, "Property '{name}' is not resettable")
            }
            Self::SignalNotFound { label } => {
                write!(f, "No notifying member at label {label}")
            }
            Self::ObjectTypeMismatch { expected } => {
                write!(f, "Object is not an instance of {expected}")
            }
        }
    }
}

impl std::error::Error for MetaError {}

/// A specialized Result type for meta-object operations.
pub type MetaResult<T> = std::result::Result<T, MetaError>;

/// The operations of the generic dispatch protocol.
///
/// `index` is always a zero-based position into the *property sub-index*,
/// the order in which properties were registered - not a label and not a
/// position in the full member table.
pub enum MetaCall {
    /// Read the property at `index`.
    ReadProperty {
        /// Position in the property sub-index.
        index: usize,
    },
    /// Replace the value of the property at `index`.
    WriteProperty {
        /// Position in the property sub-index.
        index: usize,
        /// The new value; must be the property's value type.
        value: Box<dyn Any + Send>,
    },
    /// Restore the property at `index` to its declared default.
    ResetProperty {
        /// Position in the property sub-index.
        index: usize,
    },
    /// Map a change-event identity to its notifying-member position.
    IndexOfMethod {
        /// The event identity to look up.
        token: SignalToken,
    },
    /// Dynamic method invocation; not supported by this descriptor.
    InvokeMethod {
        /// Method position, in the host framework's numbering.
        index: usize,
    },
    /// Bindable-property access; not supported by this descriptor.
    BindableProperty {
        /// Position in the property sub-index.
        index: usize,
    },
}

impl MetaCall {
    /// The operation's name, for diagnostics.
    pub fn operation_name(&self) -> &'static str {
        match self {
            Self::ReadProperty { .. } => "ReadProperty",
            Self::WriteProperty { .. } => "WriteProperty",
            Self::ResetProperty { .. } => "ResetProperty",
            Self::IndexOfMethod { .. } => "IndexOfMethod",
            Self::InvokeMethod { .. } => "InvokeMethod",
            Self::BindableProperty { .. } => "BindableProperty",
        }
    }
}

/// What a [`MetaObject::meta_call`] produced.
pub enum MetaCallReply {
    /// The operation completed with nothing to return.
    Done,
    /// The property's current value.
    Value(Box<dyn Any + Send>),
    /// The notifying-member position for an [`MetaCall::IndexOfMethod`]
    /// lookup; `None` when the identity matched nothing.
    MethodIndex(Option<usize>),
    /// The operation did not apply; details were logged.
    Ignored,
}

impl MetaCallReply {
    /// Extract the read value, if this reply carries one.
    pub fn into_value(self) -> Option<Box<dyn Any + Send>> {
        match self {
            Self::Value(value) => Some(value),
            _ => None,
        }
    }

    /// Extract the method index, if this reply carries one.
    pub fn method_index(&self) -> Option<usize> {
        match self {
            Self::MethodIndex(index) => *index,
            _ => None,
        }
    }
}

impl fmt::Debug for MetaCallReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Done => f.write_str("Done"),
            Self::Value(_) => f.write_str("Value(..)"),
            Self::MethodIndex(index) => f.debug_tuple("MethodIndex").field(index).finish(),
            Self::Ignored => f.write_str("Ignored"),
        }
    }
}

/// The ordered member table plus its derived positional sub-indexes.
struct MemberTable {
    /// All members, in emplacement order (== strictly increasing labels).
    members: Vec<MemberInfo>,
    /// Positions of property members, registration order.
    property_positions: Vec<usize>,
    /// Positions of notifying members, registration order.
    signal_positions: Vec<usize>,
    /// Positions of interface members.
    interface_positions: Vec<usize>,
}

impl MemberTable {
    fn new() -> Self {
        Self {
            members: Vec::new(),
            property_positions: Vec::new(),
            signal_positions: Vec::new(),
            interface_positions: Vec::new(),
        }
    }

    /// Append a descriptor, canonicalizing its capability set and indexing
    /// it into the positional sub-lists. The invalid marker is ignored.
    fn emplace(&mut self, mut member: MemberInfo) {
        if !member.is_valid() {
            return;
        }

        member.features = canonical(member.features);

        match member.kind {
            MemberKind::Property => {
                if member.features.contains(Feature::Notify) {
                    self.signal_positions.push(self.members.len());
                }
                self.property_positions.push(self.members.len());
            }
            MemberKind::Interface => {
                self.interface_positions.push(self.members.len());
            }
            MemberKind::ClassInfo | MemberKind::Invalid => {}
        }

        self.members.push(member);
    }

    /// Check the strict label ordering every binary search depends on.
    ///
    /// # Panics
    ///
    /// Panics - naming both offending members - when two adjacent members
    /// are not in strictly increasing label order. This indicates a label
    /// allocation bug in the authored type and is unrecoverable.
    fn validate(&self, type_name: &str) {
        for member in &self.members {
            tracing::debug!(
                target: targets::META,
                label = %member.label,
                kind = ?member.kind,
                name = member.name,
                "registered member"
            );
        }

        for (position, pair) in self.members.windows(2).enumerate() {
            let (first, second) = (&pair[0], &pair[1]);
            if first.label >= second.label {
                tracing::error!(
                    target: targets::META,
                    type_name,
                    first = first.name,
                    first_label = %first.label,
                    second = second.name,
                    second_label = %second.label,
                    position,
                    "member labels are not in strict order"
                );
                panic!(
                    "members of {type_name} are not in strictly increasing label order: \
                     '{}' (label {}) is followed by '{}' (label {}); \
                     binary member search is impossible",
                    first.name, first.label, second.name, second.label,
                );
            }
        }
    }

    /// Binary-search the table by label.
    fn member(&self, label: Label) -> Option<&MemberInfo> {
        self.members
            .binary_search_by_key(&label, |member| member.label)
            .ok()
            .map(|position| &self.members[position])
    }

    /// The property at a position in the property sub-index.
    fn property_at(&self, index: usize) -> Option<&MemberInfo> {
        self.property_positions
            .get(index)
            .map(|&position| &self.members[position])
    }

    /// Position of `token`'s member among the notifying members.
    fn signal_index(&self, token: SignalToken) -> Option<usize> {
        self.signal_positions
            .iter()
            .position(|&position| self.members[position].token == Some(token))
    }

    /// Position of the member at `label` among the notifying members.
    fn signal_index_for_label(&self, label: Label) -> Option<usize> {
        self.signal_positions
            .iter()
            .position(|&position| self.members[position].label == label)
    }
}

/// The runtime type descriptor of one reflected type.
///
/// Holds the validated member table, the positional sub-indexes, the parent
/// type link, and the optional instance factory. Obtained from the generated
/// `static_meta()` accessor or through [`Object::meta_object`].
pub struct MetaObject {
    type_name: &'static str,
    type_id: TypeId,
    parent: Option<fn() -> &'static MetaObject>,
    create: Option<fn() -> Box<dyn Object>>,
    table: MemberTable,
}

impl MetaObject {
    /// The described type's name.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// The described type's identity.
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// The parent type's meta-object, if a parent link was registered.
    pub fn parent(&self) -> Option<&'static MetaObject> {
        self.parent.map(|meta| meta())
    }

    /// Whether this type can be instantiated dynamically.
    pub fn has_factory(&self) -> bool {
        self.create.is_some()
    }

    /// Create a fresh instance through the registered factory.
    pub fn create(&self) -> Option<Box<dyn Object>> {
        self.create.map(|factory| factory())
    }

    /// All members, in label order.
    pub fn members(&self) -> &[MemberInfo] {
        &self.table.members
    }

    /// The property members, in registration order.
    pub fn properties(&self) -> impl Iterator<Item = &MemberInfo> {
        self.table
            .property_positions
            .iter()
            .map(|&position| &self.table.members[position])
    }

    /// Number of property members.
    pub fn property_count(&self) -> usize {
        self.table.property_positions.len()
    }

    /// Number of notifying members.
    pub fn signal_count(&self) -> usize {
        self.table.signal_positions.len()
    }

    /// Find the member at `label` (binary search).
    pub fn member(&self, label: Label) -> Option<&MemberInfo> {
        self.table.member(label)
    }

    /// The property at a position in the property sub-index.
    pub fn property_at(&self, index: usize) -> Option<&MemberInfo> {
        self.table.property_at(index)
    }

    /// Find a property by name, searching this type then its ancestors.
    pub fn property(&self, name: &str) -> Option<&MemberInfo> {
        self.properties()
            .find(|member| member.name == name)
            .or_else(|| self.parent().and_then(|parent| parent.property(name)))
    }

    /// Names of all properties, including inherited ones.
    pub fn property_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.properties().map(|member| member.name).collect();
        if let Some(parent) = self.parent() {
            names.extend(parent.property_names());
        }
        names
    }

    /// Names of all synthesized change signals, including inherited ones.
    pub fn signal_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self
            .table
            .signal_positions
            .iter()
            .filter_map(|&position| self.table.members[position].notify_signal)
            .collect();
        if let Some(parent) = self.parent() {
            names.extend(parent.signal_names());
        }
        names
    }

    /// Look up a class-info value by name, searching ancestors too.
    pub fn class_info(&self, name: &str) -> Option<&'static str> {
        self.table
            .members
            .iter()
            .find(|member| member.kind == MemberKind::ClassInfo && member.name == name)
            .map(|member| member.value)
            .or_else(|| self.parent().and_then(|parent| parent.class_info(name)))
    }

    /// All class-info pairs declared directly on this type.
    pub fn class_infos(&self) -> impl Iterator<Item = (&'static str, &'static str)> {
        self.table
            .members
            .iter()
            .filter(|member| member.kind == MemberKind::ClassInfo)
            .map(|member| (member.name, member.value))
    }

    /// Resolve the byte offset of the member at `label` within its owning
    /// struct.
    ///
    /// Misses are logged at `warn` and answered with `None`: the host
    /// framework probes speculatively, so an unknown label is not an error
    /// here. Callers that require existence should have validated it.
    pub fn member_offset(&self, label: Label) -> Option<usize> {
        match self.table.member(label) {
            Some(member) => member.resolve_offset(),
            None => {
                tracing::warn!(
                    target: targets::META,
                    type_name = self.type_name,
                    %label,
                    "could not find a member with this label"
                );
                None
            }
        }
    }

    /// The change-event identity of the notifying member at `label`.
    pub fn signal_token(&self, label: Label) -> Option<SignalToken> {
        self.table.member(label).and_then(|member| member.token)
    }

    /// Position of `token`'s member among this type's notifying members.
    pub fn signal_index(&self, token: SignalToken) -> Option<usize> {
        self.table.signal_index(token)
    }

    /// Position of the member at `label` among this type's notifying members.
    pub fn signal_index_for_label(&self, label: Label) -> Option<usize> {
        self.table.signal_index_for_label(label)
    }

    /// Cast `object` to a registered interface of this type.
    ///
    /// `I` is the interface's trait-object type, e.g.
    /// `interface_cast::<dyn Describe>(&widget)`. Returns `None` when the
    /// interface was not registered for this type (or any ancestor), or when
    /// `object` is not an instance of the type.
    pub fn interface_cast<'a, I: ?Sized + 'static>(&self, object: &'a dyn Object) -> Option<&'a I> {
        for &position in &self.table.interface_positions {
            let member = &self.table.members[position];
            let Some(caster) = member.caster else { continue };
            if let Some(cast) = caster.downcast_ref::<InterfaceCaster<I>>() {
                return cast(object);
            }
        }
        self.parent()
            .and_then(|parent| parent.interface_cast::<I>(object))
    }

    // =========================================================================
    // Named access
    // =========================================================================

    /// Read a property by name.
    pub fn get_property(&self, object: &dyn Object, name: &str) -> MetaResult<Box<dyn Any + Send>> {
        let member = self.property(name).ok_or_else(|| MetaError::PropertyNotFound {
            name: name.to_string(),
        })?;
        let read = member.read.ok_or_else(|| MetaError::PropertyNotFound {
            name: name.to_string(),
        })?;
        read(object)
    }

    /// Write a property by name.
    ///
    /// Fails with [`MetaError::PropertyReadOnly`] for members without the
    /// `Write` capability and [`MetaError::PropertyTypeMismatch`] when the
    /// boxed value is not the property's value type. A successful write of a
    /// changed value raises the member's change event exactly once.
    pub fn set_property(
        &self,
        object: &dyn Object,
        name: &str,
        value: Box<dyn Any + Send>,
    ) -> MetaResult<()> {
        let member = self.property(name).ok_or_else(|| MetaError::PropertyNotFound {
            name: name.to_string(),
        })?;
        let write = member.write.ok_or_else(|| MetaError::PropertyReadOnly {
            name: name.to_string(),
        })?;
        write(object, value)
    }

    /// Reset a property to its declared default, by name.
    pub fn reset_property(&self, object: &dyn Object, name: &str) -> MetaResult<()> {
        let member = self.property(name).ok_or_else(|| MetaError::PropertyNotFound {
            name: name.to_string(),
        })?;
        let reset = member.reset.ok_or_else(|| MetaError::PropertyNotResettable {
            name: name.to_string(),
        })?;
        reset(object)
    }

    // =========================================================================
    // Generic dispatch
    // =========================================================================

    /// The single generic dispatch entry point.
    ///
    /// Non-throwing: misses and unsupported operations are logged and
    /// answered with [`MetaCallReply::Ignored`]. See the module docs for the
    /// operation semantics.
    pub fn meta_call(&self, object: &dyn Object, call: MetaCall) -> MetaCallReply {
        match call {
            MetaCall::ReadProperty { index } => match self.read_at(object, index) {
                Some(value) => MetaCallReply::Value(value),
                None => MetaCallReply::Ignored,
            },
            MetaCall::WriteProperty { index, value } => {
                if self.write_at(object, index, value) {
                    MetaCallReply::Done
                } else {
                    MetaCallReply::Ignored
                }
            }
            MetaCall::ResetProperty { index } => {
                if self.reset_at(object, index) {
                    MetaCallReply::Done
                } else {
                    MetaCallReply::Ignored
                }
            }
            MetaCall::IndexOfMethod { token } => {
                MetaCallReply::MethodIndex(self.table.signal_index(token))
            }
            // The dispatch protocol grows operation kinds over time; an
            // unhandled one must not take the process down.
            other => {
                tracing::warn!(
                    target: targets::META,
                    operation = other.operation_name(),
                    type_name = self.type_name,
                    "unsupported meta-call"
                );
                MetaCallReply::Ignored
            }
        }
    }

    fn read_at(&self, object: &dyn Object, index: usize) -> Option<Box<dyn Any + Send>> {
        let Some(read) = self.table.property_at(index).and_then(|member| member.read) else {
            tracing::warn!(
                target: targets::META,
                index,
                type_name = self.type_name,
                "no readable property at this offset"
            );
            return None;
        };
        match read(object) {
            Ok(value) => Some(value),
            Err(error) => {
                tracing::warn!(
                    target: targets::META,
                    index,
                    type_name = self.type_name,
                    %error,
                    "property read failed"
                );
                None
            }
        }
    }

    fn write_at(&self, object: &dyn Object, index: usize, value: Box<dyn Any + Send>) -> bool {
        let Some(write) = self.table.property_at(index).and_then(|member| member.write) else {
            tracing::warn!(
                target: targets::META,
                index,
                type_name = self.type_name,
                "no writable property at this offset"
            );
            return false;
        };
        match write(object, value) {
            Ok(()) => true,
            Err(error) => {
                tracing::warn!(
                    target: targets::META,
                    index,
                    type_name = self.type_name,
                    %error,
                    "property write failed"
                );
                false
            }
        }
    }

    fn reset_at(&self, object: &dyn Object, index: usize) -> bool {
        let Some(reset) = self.table.property_at(index).and_then(|member| member.reset) else {
            tracing::warn!(
                target: targets::META,
                index,
                type_name = self.type_name,
                "no resettable property at this offset"
            );
            return false;
        };
        match reset(object) {
            Ok(()) => true,
            Err(error) => {
                tracing::warn!(
                    target: targets::META,
                    index,
                    type_name = self.type_name,
                    %error,
                    "property reset failed"
                );
                false
            }
        }
    }
}

impl fmt::Debug for MetaObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetaObject")
            .field("type_name", &self.type_name)
            .field("member_count", &self.table.members.len())
            .field("property_count", &self.property_count())
            .field("signal_count", &self.signal_count())
            .finish()
    }
}

/// Collects member descriptors and freezes them into a [`MetaObject`].
///
/// Descriptors must be added in strictly increasing label order - the derive
/// macro emits them in declaration order, which satisfies this by
/// construction. [`build`](Self::build) validates the invariant and panics
/// on violation, naming both offending members.
pub struct MetaObjectBuilder {
    type_name: &'static str,
    type_id: TypeId,
    parent: Option<fn() -> &'static MetaObject>,
    create: Option<fn() -> Box<dyn Object>>,
    members: Vec<MemberInfo>,
}

impl MetaObjectBuilder {
    /// Start a descriptor for type `T`.
    pub fn new<T: Object>(type_name: &'static str) -> Self {
        Self {
            type_name,
            type_id: TypeId::of::<T>(),
            parent: None,
            create: None,
            members: Vec::new(),
        }
    }

    /// Link the parent type's meta-object.
    pub fn parent(mut self, parent: fn() -> &'static MetaObject) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Register a factory for dynamic instantiation.
    pub fn factory(mut self, create: fn() -> Box<dyn Object>) -> Self {
        self.create = Some(create);
        self
    }

    /// Append a member descriptor. The invalid marker is accepted and
    /// ignored, so generated emitters need no special casing.
    pub fn member(mut self, member: MemberInfo) -> Self {
        self.members.push(member);
        self
    }

    /// Append a class-info name/value pair.
    pub fn class_info(self, label: Label, name: &'static str, value: &'static str) -> Self {
        self.member(MemberInfo::class_info(label, name, value))
    }

    /// Append an interface registration.
    pub fn interface(
        self,
        label: Label,
        name: &'static str,
        caster: &'static (dyn Any + Send + Sync),
    ) -> Self {
        self.member(MemberInfo::interface(label, name, caster))
    }

    /// Validate and freeze the table.
    ///
    /// # Panics
    ///
    /// Panics when member labels are not strictly increasing; this is a
    /// label-allocation bug in the authored type (see module docs).
    pub fn build(self) -> MetaObject {
        let span = tracing::debug_span!("meridian::meta_build", type_name = self.type_name);
        let _guard = span.enter();

        let mut table = MemberTable::new();
        for member in self.members {
            table.emplace(member);
        }
        table.validate(self.type_name);

        MetaObject {
            type_name: self.type_name,
            type_id: self.type_id,
            parent: self.parent,
            create: self.create,
            table,
        }
    }
}

/// Process-wide registry of meta-objects, keyed by type name and `TypeId`.
///
/// Types opt in by calling their generated `register_type()`, after which
/// they can be looked up - and, with a factory, instantiated - by name.
pub struct TypeRegistry;

struct TypeRegistryInner {
    by_name: HashMap<&'static str, &'static MetaObject>,
    by_id: HashMap<TypeId, &'static MetaObject>,
}

static TYPE_REGISTRY: OnceLock<RwLock<TypeRegistryInner>> = OnceLock::new();

fn type_registry() -> &'static RwLock<TypeRegistryInner> {
    TYPE_REGISTRY.get_or_init(|| {
        RwLock::new(TypeRegistryInner {
            by_name: HashMap::new(),
            by_id: HashMap::new(),
        })
    })
}

impl TypeRegistry {
    /// Register a type's meta-object.
    ///
    /// Re-registering the same type is idempotent.
    pub fn register(meta: &'static MetaObject) {
        let mut inner = type_registry().write();
        inner.by_name.insert(meta.type_name(), meta);
        inner.by_id.insert(meta.type_id(), meta);
        tracing::debug!(
            target: targets::REGISTRY,
            type_name = meta.type_name(),
            "registered type"
        );
    }

    /// Whether a type with this name is registered.
    pub fn contains(name: &str) -> bool {
        type_registry().read().by_name.contains_key(name)
    }

    /// Look up a meta-object by type name.
    pub fn get_by_name(name: &str) -> Option<&'static MetaObject> {
        type_registry().read().by_name.get(name).copied()
    }

    /// Look up a meta-object by type.
    pub fn get<T: 'static>() -> Option<&'static MetaObject> {
        type_registry().read().by_id.get(&TypeId::of::<T>()).copied()
    }

    /// Create an instance of a registered type by name.
    ///
    /// Returns `None` when the type is unknown or has no factory.
    pub fn create(name: &str) -> Option<Box<dyn Object>> {
        Self::get_by_name(name)?.create()
    }

    /// Number of registered types.
    pub fn type_count() -> usize {
        type_registry().read().by_name.len()
    }

    /// Remove every registration. Intended for tests.
    pub fn clear() {
        let mut inner = type_registry().write();
        inner.by_name.clear();
        inner.by_id.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::offset_of;
    use std::sync::OnceLock;

    use crate::label::Label;
    use crate::member::{Feature, FeatureSet};
    use crate::object::{ObjectBase, ObjectId, init_global_registry, object_cast};
    use crate::property::Property;
    use crate::signal::{ChangeHub, emit_change};

    // A hand-assembled reflected type, wired the same way the derive macro
    // wires generated ones. Three members: a read-only constant, an
    // observable value, and a writable value.
    struct Probe {
        base: ObjectBase,
        constant: Property<String>,
        notifying: Property<String>,
        writable: Property<String>,
    }

    impl Probe {
        fn new() -> Self {
            Self {
                base: ObjectBase::new::<Self>(),
                constant: Property::new("I am constant".to_string()),
                notifying: Property::new("I am observing".to_string()),
                writable: Property::new("I am modifiable".to_string()),
            }
        }

        fn update_notifying(&self, value: String) {
            if self.notifying.set(value.clone()) {
                emit_change(self, Label(2), &value);
            }
        }

        fn set_writable(&self, value: String) {
            if self.writable.set(value.clone()) {
                emit_change(self, Label(3), &value);
            }
        }

        fn reset_writable(&self) {
            self.set_writable("I am modifiable".to_string());
        }

        fn static_meta() -> &'static MetaObject {
            static META: OnceLock<MetaObject> = OnceLock::new();
            META.get_or_init(|| {
                MetaObjectBuilder::new::<Probe>("Probe")
                    .member(MemberInfo {
                        kind: MemberKind::Property,
                        label: Label(1),
                        name: "constant",
                        type_name: "String",
                        type_id: Some(TypeId::of::<String>()),
                        features: FeatureSet::of(Feature::Read),
                        offset: Some(|| offset_of!(Probe, constant)),
                        read: Some(|object| {
                            let probe = cast(object)?;
                            Ok(Box::new(probe.constant.get()))
                        }),
                        ..MemberInfo::invalid()
                    })
                    .member(MemberInfo {
                        kind: MemberKind::Property,
                        label: Label(2),
                        name: "notifying",
                        type_name: "String",
                        type_id: Some(TypeId::of::<String>()),
                        features: FeatureSet::of(Feature::Notify),
                        notify_signal: Some("notifying_changed"),
                        offset: Some(|| offset_of!(Probe, notifying)),
                        read: Some(|object| {
                            let probe = cast(object)?;
                            Ok(Box::new(probe.notifying.get()))
                        }),
                        token: Some(SignalToken::new::<Probe>(Label(2))),
                        ..MemberInfo::invalid()
                    })
                    .member(MemberInfo {
                        kind: MemberKind::Property,
                        label: Label(3),
                        name: "writable",
                        type_name: "String",
                        type_id: Some(TypeId::of::<String>()),
                        features: FeatureSet::of(Feature::Write).with(Feature::Reset),
                        notify_signal: Some("writable_changed"),
                        offset: Some(|| offset_of!(Probe, writable)),
                        read: Some(|object| {
                            let probe = cast(object)?;
                            Ok(Box::new(probe.writable.get()))
                        }),
                        write: Some(|object, value| {
                            let probe = cast(object)?;
                            let value = value.downcast::<String>().map_err(|_| {
                                MetaError::PropertyTypeMismatch {
                                    expected: "String",
                                    got: "unknown",
                                }
                            })?;
                            probe.set_writable(*value);
                            Ok(())
                        }),
                        reset: Some(|object| {
                            let probe = cast(object)?;
                            probe.reset_writable();
                            Ok(())
                        }),
                        token: Some(SignalToken::new::<Probe>(Label(3))),
                        ..MemberInfo::invalid()
                    })
                    .class_info(Label(4), "URL", "https://example.org/probe")
                    .build()
            })
        }
    }

    fn cast(object: &dyn Object) -> MetaResult<&Probe> {
        object_cast::<Probe>(object).ok_or(MetaError::ObjectTypeMismatch { expected: "Probe" })
    }

    impl Object for Probe {
        fn object_id(&self) -> ObjectId {
            self.base.id()
        }

        fn meta_object(&self) -> Option<&'static MetaObject> {
            Some(Self::static_meta())
        }

        fn change_hub(&self) -> Option<&ChangeHub> {
            Some(self.base.hub())
        }
    }

    fn setup() {
        init_global_registry();
    }

    #[test]
    fn test_table_shape() {
        setup();
        let meta = Probe::static_meta();

        assert_eq!(meta.type_name(), "Probe");
        assert_eq!(meta.type_id(), TypeId::of::<Probe>());
        assert_eq!(meta.property_count(), 3);
        assert_eq!(meta.signal_count(), 2);
        assert_eq!(meta.members().len(), 4);
        assert!(meta.parent().is_none());
    }

    #[test]
    fn test_labels_strictly_increasing() {
        setup();
        let meta = Probe::static_meta();
        let labels: Vec<_> = meta.members().iter().map(|member| member.label).collect();

        let mut sorted = labels.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(labels, sorted);
    }

    #[test]
    fn test_member_offsets_match_real_layout() {
        setup();
        let meta = Probe::static_meta();
        let probe = Probe::new();
        let object_address = std::ptr::from_ref(&probe) as usize;

        let expected = [
            (Label(1), std::ptr::from_ref(&probe.constant) as usize),
            (Label(2), std::ptr::from_ref(&probe.notifying) as usize),
            (Label(3), std::ptr::from_ref(&probe.writable) as usize),
        ];
        for (label, member_address) in expected {
            assert_eq!(
                meta.member_offset(label),
                Some(member_address - object_address),
            );
        }

        // Three distinct members, three distinct offsets.
        let mut offsets: Vec<_> = (1..=3).map(|n| meta.member_offset(Label(n))).collect();
        offsets.sort();
        offsets.dedup();
        assert_eq!(offsets.len(), 3);
    }

    #[test]
    fn test_member_offset_miss_is_non_fatal() {
        setup();
        let meta = Probe::static_meta();
        assert_eq!(meta.member_offset(Label(99)), None);
    }

    #[test]
    fn test_signal_index_lookups_agree() {
        setup();
        let meta = Probe::static_meta();

        for label in [Label(2), Label(3)] {
            let token = meta.signal_token(label).unwrap();
            assert_eq!(meta.signal_index(token), meta.signal_index_for_label(label));
        }

        assert_eq!(meta.signal_index_for_label(Label(2)), Some(0));
        assert_eq!(meta.signal_index_for_label(Label(3)), Some(1));

        // Non-notifying and unknown labels resolve to nothing.
        assert_eq!(meta.signal_index_for_label(Label(1)), None);
        assert_eq!(meta.signal_index(SignalToken::new::<Probe>(Label(1))), None);
    }

    #[test]
    fn test_named_get_set() {
        setup();
        let probe = Probe::new();
        let meta = Probe::static_meta();

        let value = meta.get_property(&probe, "constant").unwrap();
        assert_eq!(value.downcast_ref::<String>().unwrap(), "I am constant");

        meta.set_property(&probe, "writable", Box::new("changed".to_string()))
            .unwrap();
        assert_eq!(probe.writable.get(), "changed");

        assert!(matches!(
            meta.set_property(&probe, "constant", Box::new("nope".to_string())),
            Err(MetaError::PropertyReadOnly { .. })
        ));
        assert!(matches!(
            meta.get_property(&probe, "missing"),
            Err(MetaError::PropertyNotFound { .. })
        ));
        assert!(matches!(
            meta.set_property(&probe, "writable", Box::new(17i32)),
            Err(MetaError::PropertyTypeMismatch { .. })
        ));
    }

    #[test]
    fn test_dispatch_write_then_read_round_trip() {
        setup();
        let probe = Probe::new();
        let meta = Probe::static_meta();

        // "writable" is property index 2 (registration order).
        let reply = meta.meta_call(
            &probe,
            MetaCall::WriteProperty {
                index: 2,
                value: Box::new("via dispatch".to_string()),
            },
        );
        assert!(matches!(reply, MetaCallReply::Done));

        let value = meta
            .meta_call(&probe, MetaCall::ReadProperty { index: 2 })
            .into_value()
            .unwrap();
        assert_eq!(value.downcast_ref::<String>().unwrap(), "via dispatch");
    }

    #[test]
    fn test_dispatch_misses_are_ignored() {
        setup();
        let probe = Probe::new();
        let meta = Probe::static_meta();

        // Out-of-range offset.
        assert!(matches!(
            meta.meta_call(&probe, MetaCall::ReadProperty { index: 9 }),
            MetaCallReply::Ignored
        ));
        // "constant" (index 0) accepts neither writes nor resets.
        assert!(matches!(
            meta.meta_call(
                &probe,
                MetaCall::WriteProperty { index: 0, value: Box::new(String::new()) }
            ),
            MetaCallReply::Ignored
        ));
        assert!(matches!(
            meta.meta_call(&probe, MetaCall::ResetProperty { index: 0 }),
            MetaCallReply::Ignored
        ));
        // Unsupported operations are logged and ignored, never fatal.
        assert!(matches!(
            meta.meta_call(&probe, MetaCall::InvokeMethod { index: 0 }),
            MetaCallReply::Ignored
        ));
        assert!(matches!(
            meta.meta_call(&probe, MetaCall::BindableProperty { index: 1 }),
            MetaCallReply::Ignored
        ));
    }

    #[test]
    fn test_dispatch_index_of_method() {
        setup();
        let probe = Probe::new();
        let meta = Probe::static_meta();

        let token = meta.signal_token(Label(3)).unwrap();
        let reply = meta.meta_call(&probe, MetaCall::IndexOfMethod { token });
        assert_eq!(reply.method_index(), Some(1));

        let foreign = SignalToken::new::<String>(Label(3));
        let reply = meta.meta_call(&probe, MetaCall::IndexOfMethod { token: foreign });
        assert!(matches!(reply, MetaCallReply::MethodIndex(None)));
    }

    #[test]
    fn test_reset_restores_declared_default() {
        setup();
        let probe = Probe::new();
        let meta = Probe::static_meta();

        probe.set_writable("dirty".to_string());
        let reply = meta.meta_call(&probe, MetaCall::ResetProperty { index: 2 });
        assert!(matches!(reply, MetaCallReply::Done));
        assert_eq!(probe.writable.get(), "I am modifiable");

        // Named layer agrees.
        probe.set_writable("dirty again".to_string());
        meta.reset_property(&probe, "writable").unwrap();
        assert_eq!(probe.writable.get(), "I am modifiable");

        assert!(matches!(
            meta.reset_property(&probe, "notifying"),
            Err(MetaError::PropertyNotResettable { .. })
        ));
    }

    #[test]
    fn test_change_event_fires_once_per_actual_change() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicUsize, Ordering};

        setup();
        let probe = Probe::new();
        let meta = Probe::static_meta();

        let notifying_hits = Arc::new(AtomicUsize::new(0));
        let writable_hits = Arc::new(AtomicUsize::new(0));

        let sink = notifying_hits.clone();
        let index = meta.signal_index_for_label(Label(2)).unwrap();
        probe
            .base
            .hub()
            .connect(index, Arc::new(move |_| { sink.fetch_add(1, Ordering::SeqCst); }));

        let sink = writable_hits.clone();
        let index = meta.signal_index_for_label(Label(3)).unwrap();
        probe
            .base
            .hub()
            .connect(index, Arc::new(move |_| { sink.fetch_add(1, Ordering::SeqCst); }));

        // Rewriting the current value is not a change.
        probe.set_writable("I am modifiable".to_string());
        assert_eq!(writable_hits.load(Ordering::SeqCst), 0);

        // A real change fires exactly once, on the right lane.
        probe.set_writable("X".to_string());
        assert_eq!(writable_hits.load(Ordering::SeqCst), 1);
        assert_eq!(notifying_hits.load(Ordering::SeqCst), 0);

        // Method-style modification goes through the same path.
        probe.update_notifying("I have been changed per method".to_string());
        assert_eq!(notifying_hits.load(Ordering::SeqCst), 1);
        assert_eq!(writable_hits.load(Ordering::SeqCst), 1);

        // The generic dispatch write path notifies too, and only on change.
        meta.meta_call(
            &probe,
            MetaCall::WriteProperty { index: 2, value: Box::new("X".to_string()) },
        );
        assert_eq!(writable_hits.load(Ordering::SeqCst), 1);
        meta.meta_call(
            &probe,
            MetaCall::WriteProperty { index: 2, value: Box::new("Y".to_string()) },
        );
        assert_eq!(writable_hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_class_info() {
        setup();
        let meta = Probe::static_meta();
        assert_eq!(meta.class_info("URL"), Some("https://example.org/probe"));
        assert_eq!(meta.class_info("Vendor"), None);
        assert_eq!(meta.class_infos().count(), 1);
    }

    #[test]
    fn test_invalid_members_are_ignored() {
        setup();
        struct Empty {
            base: ObjectBase,
        }
        impl Object for Empty {
            fn object_id(&self) -> ObjectId {
                self.base.id()
            }
        }

        let meta = MetaObjectBuilder::new::<Empty>("Empty")
            .member(MemberInfo::invalid())
            .member(MemberInfo::class_info(Label(1), "Vendor", "meridian"))
            .member(MemberInfo::invalid())
            .build();

        assert_eq!(meta.members().len(), 1);
        assert_eq!(meta.property_count(), 0);
    }

    #[test]
    #[should_panic(expected = "'twin_a' (label 7) is followed by 'twin_b' (label 7)")]
    fn test_duplicate_labels_abort_validation() {
        setup();
        struct Collider {
            base: ObjectBase,
        }
        impl Object for Collider {
            fn object_id(&self) -> ObjectId {
                self.base.id()
            }
        }

        MetaObjectBuilder::new::<Collider>("Collider")
            .class_info(Label(7), "twin_a", "first")
            .class_info(Label(7), "twin_b", "second")
            .build();
    }

    #[test]
    #[should_panic(expected = "not in strictly increasing label order")]
    fn test_decreasing_labels_abort_validation() {
        setup();
        struct Backwards {
            base: ObjectBase,
        }
        impl Object for Backwards {
            fn object_id(&self) -> ObjectId {
                self.base.id()
            }
        }

        MetaObjectBuilder::new::<Backwards>("Backwards")
            .class_info(Label(5), "late", "x")
            .class_info(Label(2), "early", "y")
            .build();
    }

    #[test]
    fn test_rebuild_is_deterministic() {
        setup();

        let build = || {
            MetaObjectBuilder::new::<Probe>("Probe")
                .member(MemberInfo {
                    kind: MemberKind::Property,
                    label: Label(1),
                    name: "constant",
                    offset: Some(|| offset_of!(Probe, constant)),
                    features: FeatureSet::of(Feature::Read),
                    ..MemberInfo::invalid()
                })
                .member(MemberInfo {
                    kind: MemberKind::Property,
                    label: Label(2),
                    name: "notifying",
                    offset: Some(|| offset_of!(Probe, notifying)),
                    features: FeatureSet::of(Feature::Notify),
                    ..MemberInfo::invalid()
                })
                .build()
        };

        let first = build();
        let second = build();

        let labels = |meta: &MetaObject| -> Vec<Label> {
            meta.members().iter().map(|member| member.label).collect()
        };
        let offsets = |meta: &MetaObject| -> Vec<Option<usize>> {
            meta.members()
                .iter()
                .map(MemberInfo::resolve_offset)
                .collect()
        };

        assert_eq!(labels(&first), labels(&second));
        assert_eq!(offsets(&first), offsets(&second));
    }

    #[test]
    fn test_features_are_canonicalized_in_table() {
        setup();
        let meta = Probe::static_meta();

        // "writable" was declared Write|Reset; the stored set carries the
        // implied Notify and Read.
        let member = meta.property("writable").unwrap();
        assert!(member.features.contains(Feature::Read));
        assert!(member.features.contains(Feature::Notify));
        assert!(member.is_writable());
        assert!(member.is_resettable());

        // "notifying" was declared Notify; Read is implied, Write is not.
        let member = meta.property("notifying").unwrap();
        assert!(member.features.contains(Feature::Read));
        assert!(!member.is_writable());
    }

    #[test]
    fn test_meta_object_debug_dump() {
        setup();
        let dump = crate::logging::MetaObjectDebug::new(Probe::static_meta()).to_string();
        assert!(dump.contains("Probe"));
        assert!(dump.contains("\"writable\""));
        assert!(dump.contains("notify=writable_changed"));
        assert!(dump.contains("value=\"https://example.org/probe\""));
    }

    #[test]
    fn test_concurrent_first_access_builds_once() {
        setup();

        struct Racy {
            base: ObjectBase,
        }
        impl Object for Racy {
            fn object_id(&self) -> ObjectId {
                self.base.id()
            }
        }
        impl Racy {
            fn static_meta() -> &'static MetaObject {
                static META: OnceLock<MetaObject> = OnceLock::new();
                META.get_or_init(|| {
                    MetaObjectBuilder::new::<Racy>("Racy")
                        .class_info(Label(1), "Vendor", "meridian")
                        .build()
                })
            }
        }

        let handles: Vec<_> = (0..16)
            .map(|_| std::thread::spawn(|| std::ptr::from_ref(Racy::static_meta()) as usize))
            .collect();

        let addresses: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(addresses.windows(2).all(|pair| pair[0] == pair[1]));
    }

    // =========================================================================
    // TypeRegistry
    // =========================================================================

    use std::sync::Mutex;

    // Serializes tests that mutate the global type registry.
    static REGISTRY_TEST_MUTEX: Mutex<()> = Mutex::new(());

    #[test]
    fn test_type_registry_roundtrip() {
        setup();
        let _guard = REGISTRY_TEST_MUTEX.lock().unwrap();
        TypeRegistry::clear();

        assert!(!TypeRegistry::contains("Probe"));
        TypeRegistry::register(Probe::static_meta());

        assert!(TypeRegistry::contains("Probe"));
        assert_eq!(TypeRegistry::type_count(), 1);
        assert_eq!(
            TypeRegistry::get_by_name("Probe").map(MetaObject::type_id),
            Some(TypeId::of::<Probe>())
        );
        assert_eq!(
            TypeRegistry::get::<Probe>().map(MetaObject::type_name),
            Some("Probe")
        );

        // Probe has no factory, so dynamic creation fails.
        assert!(TypeRegistry::create("Probe").is_none());
        assert!(TypeRegistry::create("Unknown").is_none());
    }
}
