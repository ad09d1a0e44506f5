//! Member descriptors.
//!
//! A [`MemberInfo`] is the immutable, plain-data record describing one
//! reflectable member of an object type: its label, name, value type,
//! capability set, offset resolver, and type-erased accessor functions.
//! Descriptors are produced by `#[derive(Object)]`-generated code, collected
//! by [`crate::meta::MetaObjectBuilder`], and owned by the resulting
//! [`crate::meta::MetaObject`] for the lifetime of the process.
//!
//! # Capabilities
//!
//! Member capabilities are a small flag set over [`Feature`]. Some
//! combinations only make sense together, so every stored or consulted set is
//! first passed through [`canonical`]:
//!
//! - `Write` implies `Notify` (a mutable member must announce its changes)
//! - `Reset` implies `Notify`
//! - `Notify` implies `Read` (observers need something to read)
//!
//! Downstream code can therefore never observe, say, a writable member
//! without change notification.

use std::any::{Any, TypeId};

use crate::label::Label;
use crate::meta::MetaResult;
use crate::object::Object;

/// A single member capability.
///
/// Combine with [`FeatureSet`]; the discriminants are bit values.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Feature {
    /// The member's value can be read through the generic dispatch path.
    Read = 1 << 0,
    /// The member can be restored to its declared default.
    Reset = 1 << 1,
    /// The member raises a change event when its value actually changes.
    Notify = 1 << 2,
    /// The member's value can be replaced through the generic dispatch path.
    Write = 1 << 3,
}

/// A structural set of [`Feature`] flags.
///
/// All operations are `const fn` so capability sets can be composed in
/// generated code and checked with `static_assertions`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FeatureSet(u8);

impl FeatureSet {
    /// The empty capability set.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// A set containing exactly one capability.
    pub const fn of(feature: Feature) -> Self {
        Self(feature as u8)
    }

    /// This set with `feature` added.
    pub const fn with(self, feature: Feature) -> Self {
        Self(self.0 | feature as u8)
    }

    /// Whether `feature` is in this set.
    pub const fn contains(self, feature: Feature) -> bool {
        self.0 & feature as u8 != 0
    }

    /// The raw bit value.
    pub const fn bits(self) -> u8 {
        self.0
    }
}

impl From<Feature> for FeatureSet {
    fn from(feature: Feature) -> Self {
        Self::of(feature)
    }
}

impl std::fmt::Display for FeatureSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        const NAMES: [(Feature, &str); 4] = [
            (Feature::Read, "Read"),
            (Feature::Write, "Write"),
            (Feature::Reset, "Reset"),
            (Feature::Notify, "Notify"),
        ];

        let mut first = true;
        for (feature, name) in NAMES {
            if self.contains(feature) {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        if first {
            f.write_str("-")?;
        }
        Ok(())
    }
}

/// Complete a capability set with the features its members imply.
///
/// The engine applies this before a set is stored in a descriptor and before
/// one is consulted, so the implication rules hold everywhere downstream.
pub const fn canonical(features: FeatureSet) -> FeatureSet {
    let mut features = features;
    if features.contains(Feature::Write) {
        features = features.with(Feature::Notify);
    }
    if features.contains(Feature::Reset) {
        features = features.with(Feature::Notify);
    }
    if features.contains(Feature::Notify) {
        features = features.with(Feature::Read);
    }
    features
}

// The implication rules are part of the public contract.
const _: () = {
    use static_assertions::const_assert_eq;

    const READ: FeatureSet = FeatureSet::of(Feature::Read);
    const_assert_eq!(canonical(READ).bits(), READ.bits());
    const_assert_eq!(
        canonical(FeatureSet::of(Feature::Notify)).bits(),
        READ.with(Feature::Notify).bits()
    );
    const_assert_eq!(
        canonical(FeatureSet::of(Feature::Reset)).bits(),
        READ.with(Feature::Notify).with(Feature::Reset).bits()
    );
    const_assert_eq!(
        canonical(FeatureSet::of(Feature::Write)).bits(),
        READ.with(Feature::Notify).with(Feature::Write).bits()
    );
};

/// Opaque identity of one notifying member's change event.
///
/// Tokens compare equal exactly when they identify the same member of the
/// same type. The dispatch bridge maps a token back to the member's position
/// among its type's notifying members (see
/// [`crate::meta::MetaObject::signal_index`]).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SignalToken {
    owner: TypeId,
    label: Label,
}

impl SignalToken {
    /// Create the token for the member at `label` of type `T`.
    pub fn new<T: 'static>(label: Label) -> Self {
        Self {
            owner: TypeId::of::<T>(),
            label,
        }
    }

    /// The label of the member this token identifies.
    pub fn label(self) -> Label {
        self.label
    }
}

/// What kind of member a descriptor describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemberKind {
    /// The absent marker; ignored by the member table.
    Invalid,
    /// A state slot with read/write/reset/notify capabilities.
    Property,
    /// A name/value metadata pair attached to the type.
    ClassInfo,
    /// An interface the type can be dynamically cast to.
    Interface,
}

/// Resolves a member's byte offset within its owning struct.
///
/// Generated as `|| core::mem::offset_of!(Type, field)`, so the offset comes
/// straight from the language's layout facilities; no instance is involved.
pub type OffsetFn = fn() -> usize;

/// Type-erased member read access.
pub type ReadFn = fn(&dyn Object) -> MetaResult<Box<dyn Any + Send>>;

/// Type-erased member write access. Present iff the member is writable.
pub type WriteFn = fn(&dyn Object, Box<dyn Any + Send>) -> MetaResult<()>;

/// Type-erased member reset. Present iff the member is resettable.
pub type ResetFn = fn(&dyn Object) -> MetaResult<()>;

/// A thunk casting an object to one of its registered interfaces.
///
/// Stored type-erased in [`MemberInfo::caster`] and recovered by exact type
/// in [`crate::meta::MetaObject::interface_cast`]; using this alias on both
/// sides guarantees the type identities line up.
pub type InterfaceCaster<I> = for<'a> fn(&'a dyn Object) -> Option<&'a I>;

/// Immutable description of one member of an object type.
///
/// Built once per member by generated code, stored in the owning type's
/// member table, never mutated afterwards. Fields that do not apply to the
/// member's kind hold their inert defaults (see [`MemberInfo::invalid`]).
#[derive(Clone, Copy)]
pub struct MemberInfo {
    /// What kind of member this describes.
    pub kind: MemberKind,
    /// The member's unique-per-type label.
    pub label: Label,
    /// The member's declared name.
    pub name: &'static str,
    /// Class-info payload value (class-info members only).
    pub value: &'static str,
    /// The value type's name, for diagnostics (property members only).
    pub type_name: &'static str,
    /// The value type's identity (property members only).
    pub type_id: Option<TypeId>,
    /// The member's canonicalized capability set.
    pub features: FeatureSet,
    /// Name of the synthesized change signal (notifying members only).
    pub notify_signal: Option<&'static str>,
    /// Byte-offset resolver (property members only).
    pub offset: Option<OffsetFn>,
    /// Read accessor.
    pub read: Option<ReadFn>,
    /// Write accessor, present iff writable.
    pub write: Option<WriteFn>,
    /// Reset accessor, present iff resettable.
    pub reset: Option<ResetFn>,
    /// Change-event identity, present iff notifying.
    pub token: Option<SignalToken>,
    /// Type-erased [`InterfaceCaster`] (interface members only).
    pub caster: Option<&'static (dyn Any + Send + Sync)>,
}

impl MemberInfo {
    /// The absent marker. [`crate::meta::MetaObjectBuilder`] ignores it.
    pub const fn invalid() -> Self {
        Self {
            kind: MemberKind::Invalid,
            label: Label(0),
            name: "",
            value: "",
            type_name: "",
            type_id: None,
            features: FeatureSet::empty(),
            notify_signal: None,
            offset: None,
            read: None,
            write: None,
            reset: None,
            token: None,
            caster: None,
        }
    }

    /// Describe a class-info name/value pair.
    pub fn class_info(label: Label, name: &'static str, value: &'static str) -> Self {
        Self {
            kind: MemberKind::ClassInfo,
            label,
            name,
            value,
            ..Self::invalid()
        }
    }

    /// Describe a castable interface.
    ///
    /// `caster` must be a static [`InterfaceCaster`] for the interface's
    /// trait-object type.
    pub fn interface(
        label: Label,
        name: &'static str,
        caster: &'static (dyn Any + Send + Sync),
    ) -> Self {
        Self {
            kind: MemberKind::Interface,
            label,
            name,
            caster: Some(caster),
            ..Self::invalid()
        }
    }

    /// Whether this descriptor describes anything at all.
    pub fn is_valid(&self) -> bool {
        self.kind != MemberKind::Invalid
    }

    /// Whether this is a property descriptor.
    pub fn is_property(&self) -> bool {
        self.kind == MemberKind::Property
    }

    /// Whether this member raises a change event.
    pub fn is_notifying(&self) -> bool {
        canonical(self.features).contains(Feature::Notify)
    }

    /// Whether this member accepts generic writes.
    pub fn is_writable(&self) -> bool {
        canonical(self.features).contains(Feature::Write)
    }

    /// Whether this member can be reset to its declared default.
    pub fn is_resettable(&self) -> bool {
        canonical(self.features).contains(Feature::Reset)
    }

    /// Resolve this member's byte offset within its owning struct.
    pub fn resolve_offset(&self) -> Option<usize> {
        self.offset.map(|resolve| resolve())
    }
}

impl std::fmt::Debug for MemberInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemberInfo")
            .field("kind", &self.kind)
            .field("label", &self.label)
            .field("name", &self.name)
            .field("features", &self.features)
            .field("notify_signal", &self.notify_signal)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_set_compose() {
        let set = FeatureSet::of(Feature::Read).with(Feature::Write);
        assert!(set.contains(Feature::Read));
        assert!(set.contains(Feature::Write));
        assert!(!set.contains(Feature::Reset));
    }

    #[test]
    fn test_canonical_write_implies_notify_and_read() {
        let set = canonical(FeatureSet::of(Feature::Write));
        assert!(set.contains(Feature::Write));
        assert!(set.contains(Feature::Notify));
        assert!(set.contains(Feature::Read));
        assert!(!set.contains(Feature::Reset));
    }

    #[test]
    fn test_canonical_is_idempotent() {
        let once = canonical(FeatureSet::of(Feature::Reset));
        assert_eq!(canonical(once), once);
    }

    #[test]
    fn test_invalid_marker() {
        let member = MemberInfo::invalid();
        assert!(!member.is_valid());
        assert!(!member.is_property());
        assert!(!member.is_notifying());
    }

    #[test]
    fn test_signal_token_identity() {
        struct A;
        struct B;

        assert_eq!(SignalToken::new::<A>(Label(1)), SignalToken::new::<A>(Label(1)));
        assert_ne!(SignalToken::new::<A>(Label(1)), SignalToken::new::<A>(Label(2)));
        assert_ne!(SignalToken::new::<A>(Label(1)), SignalToken::new::<B>(Label(1)));
    }

    #[test]
    fn test_class_info_member() {
        let member = MemberInfo::class_info(Label(9), "URL", "https://example.org/");
        assert!(member.is_valid());
        assert_eq!(member.kind, MemberKind::ClassInfo);
        assert_eq!(member.name, "URL");
        assert_eq!(member.value, "https://example.org/");
    }
}
