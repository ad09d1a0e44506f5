//! Change notification.
//!
//! Notifying members do not carry their own signal objects; their change
//! events are synthesized from the member table. This module provides the two
//! runtime pieces of that design:
//!
//! - [`ChangeHub`] - the per-instance connection table, owned by
//!   [`crate::object::ObjectBase`]. Slots are registered and invoked by the
//!   member's position among its type's notifying members, the same
//!   zero-based index the dispatch bridge reports for
//!   [`crate::meta::MetaCall::IndexOfMethod`].
//! - [`ChangeSignal`] - a typed façade over one notifying member. Generated
//!   `<field>_changed()` constructors produce these, so calling code can
//!   connect to a member's change event without ever hand-writing the
//!   event identity.
//!
//! Delivery is direct and synchronous in the emitting thread. Queued and
//! cross-thread delivery belong to the host framework's event loop, which is
//! outside this crate.
//!
//! # Example
//!
//! ```ignore
//! let button = Button::new();
//! let seen = Arc::new(Mutex::new(Vec::new()));
//!
//! let sink = seen.clone();
//! Button::text_changed().connect(&button, move |text: &String| {
//!     sink.lock().push(text.clone());
//! })?;
//!
//! button.set_text("hello".into()); // slot runs once
//! ```

use std::any::{Any, TypeId};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use slotmap::{SlotMap, new_key_type};

use crate::label::Label;
use crate::logging::targets;
use crate::member::SignalToken;
use crate::meta::{MetaError, MetaObject, MetaResult};
use crate::object::Object;

new_key_type! {
    /// A unique identifier for a change-event connection.
    ///
    /// Use this ID to disconnect a specific slot via [`ChangeHub::disconnect`]
    /// or [`ChangeSignal::disconnect`].
    pub struct ConnectionId;
}

/// A registered slot; receives the member's new value, type-erased.
type Slot = Arc<dyn Fn(&dyn Any) + Send + Sync>;

/// Per-instance connection table for change events.
///
/// One lane per notifying member, indexed by the member's position among its
/// type's notifying members (declaration order). Lanes are created on first
/// use; activating a lane with no connections is free.
///
/// # Thread Safety
///
/// `ChangeHub` is `Send + Sync`; connections and activations may come from
/// any thread, and slots run in the activating thread.
pub struct ChangeHub {
    lanes: Mutex<Vec<SlotMap<ConnectionId, Slot>>>,
    /// Whether event delivery is temporarily suppressed.
    blocked: AtomicBool,
}

impl ChangeHub {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self {
            lanes: Mutex::new(Vec::new()),
            blocked: AtomicBool::new(false),
        }
    }

    /// Connect a type-erased slot to the notifying member at `index`.
    pub fn connect(&self, index: usize, slot: Slot) -> ConnectionId {
        let mut lanes = self.lanes.lock();
        if lanes.len() <= index {
            lanes.resize_with(index + 1, SlotMap::with_key);
        }
        lanes[index].insert(slot)
    }

    /// Disconnect a slot by its connection ID.
    ///
    /// Returns `true` if the connection was found and removed.
    pub fn disconnect(&self, id: ConnectionId) -> bool {
        let mut lanes = self.lanes.lock();
        lanes.iter_mut().any(|lane| lane.remove(id).is_some())
    }

    /// Disconnect every slot on every lane.
    pub fn disconnect_all(&self) {
        self.lanes.lock().clear();
    }

    /// Number of slots connected to the member at `index`.
    pub fn connection_count(&self, index: usize) -> usize {
        self.lanes.lock().get(index).map_or(0, SlotMap::len)
    }

    /// Suppress or restore event delivery.
    ///
    /// While blocked, [`activate`](Self::activate) does nothing. Useful
    /// during construction or batch updates.
    pub fn set_blocked(&self, blocked: bool) {
        self.blocked.store(blocked, Ordering::SeqCst);
    }

    /// Whether event delivery is currently suppressed.
    pub fn is_blocked(&self) -> bool {
        self.blocked.load(Ordering::SeqCst)
    }

    /// Invoke every slot connected to the member at `index`.
    ///
    /// `payload` is the member's new value. Slots registered through the
    /// typed [`ChangeSignal::connect`] downcast it back themselves.
    pub fn activate(&self, index: usize, payload: &dyn Any) {
        if self.is_blocked() {
            tracing::trace!(target: targets::SIGNAL, index, "hub blocked, skipping activation");
            return;
        }

        // Snapshot the lane so slots may connect/disconnect reentrantly.
        let slots: Vec<Slot> = {
            let lanes = self.lanes.lock();
            match lanes.get(index) {
                Some(lane) => lane.values().cloned().collect(),
                None => return,
            }
        };

        tracing::trace!(target: targets::SIGNAL, index, slot_count = slots.len(), "activating change event");
        for slot in slots {
            slot(payload);
        }
    }
}

impl Default for ChangeHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Raise the change event of the member at `label` on `object`.
///
/// This is the single notification path: the generated typed setters and the
/// generic dispatch write/reset accessors all end up here after a property
/// slot reports an actual change. The member's notifying index is resolved
/// through the object's meta-object; unresolvable combinations are logged and
/// ignored rather than escalated, since the value change itself has already
/// happened.
pub fn emit_change(object: &dyn Object, label: Label, payload: &dyn Any) {
    let Some(meta) = object.meta_object() else {
        tracing::warn!(target: targets::SIGNAL, %label, "cannot emit change: object has no meta-object");
        return;
    };
    let Some(index) = meta.signal_index_for_label(label) else {
        tracing::warn!(
            target: targets::SIGNAL,
            %label,
            type_name = meta.type_name(),
            "cannot emit change: label is not a notifying member"
        );
        return;
    };
    let Some(hub) = object.change_hub() else {
        tracing::warn!(
            target: targets::SIGNAL,
            %label,
            type_name = meta.type_name(),
            "cannot emit change: object has no change hub"
        );
        return;
    };
    hub.activate(index, payload);
}

/// A typed handle to one notifying member's change event.
///
/// `ChangeSignal` is a pair of (label, meta-object accessor); everything else
/// - the event identity, the notifying index, the value type - is resolved
/// through the member table on demand. Instances come from the
/// `<field>_changed()` constructors that `#[derive(Object)]` generates.
///
/// # Related
///
/// - [`SignalToken`] - The event identity this façade resolves to
/// - [`crate::meta::MetaObject::signal_index`] - The reverse mapping
#[derive(Clone, Copy)]
pub struct ChangeSignal {
    label: Label,
    meta: fn() -> &'static MetaObject,
}

impl ChangeSignal {
    /// Create a façade for the member at `label` of the type whose
    /// meta-object `meta` returns.
    ///
    /// Generated code calls this; there is rarely a reason to call it by
    /// hand.
    pub fn new(label: Label, meta: fn() -> &'static MetaObject) -> Self {
        Self { label, meta }
    }

    /// The label of the member this signal belongs to.
    pub fn label(&self) -> Label {
        self.label
    }

    /// The meta-object of the owning type.
    pub fn meta_object(&self) -> &'static MetaObject {
        (self.meta)()
    }

    /// The event identity of this member's change event.
    ///
    /// Returns `None` if the label does not name a notifying member (which
    /// indicates a mismatch between the façade and the table; generated
    /// constructors never produce one).
    pub fn token(&self) -> Option<SignalToken> {
        self.meta_object().signal_token(self.label)
    }

    /// This member's zero-based position among its type's notifying members.
    pub fn index(&self) -> Option<usize> {
        self.meta_object().signal_index_for_label(self.label)
    }

    /// Connect a typed slot to this change event on `object`.
    ///
    /// The slot receives the member's new value after each actual change.
    /// Fails if `object` is not an instance of the signal's type, if the
    /// slot's argument type does not match the member's value type, or if the
    /// object cannot receive connections.
    pub fn connect<V, F>(&self, object: &dyn Object, slot: F) -> MetaResult<ConnectionId>
    where
        V: Any,
        F: Fn(&V) + Send + Sync + 'static,
    {
        let meta = self.meta_object();
        let member = meta
            .member(self.label)
            .ok_or(MetaError::SignalNotFound { label: self.label })?;

        if member.type_id != Some(TypeId::of::<V>()) {
            return Err(MetaError::PropertyTypeMismatch {
                expected: member.type_name,
                got: std::any::type_name::<V>(),
            });
        }
        if object.meta_object().map(MetaObject::type_id) != Some(meta.type_id()) {
            return Err(MetaError::ObjectTypeMismatch {
                expected: meta.type_name(),
            });
        }

        let index = self
            .index()
            .ok_or(MetaError::SignalNotFound { label: self.label })?;
        let hub = object.change_hub().ok_or(MetaError::ObjectTypeMismatch {
            expected: meta.type_name(),
        })?;

        Ok(hub.connect(
            index,
            Arc::new(move |payload: &dyn Any| {
                if let Some(value) = payload.downcast_ref::<V>() {
                    slot(value);
                }
            }),
        ))
    }

    /// Disconnect a slot previously connected to this event on `object`.
    pub fn disconnect(&self, object: &dyn Object, id: ConnectionId) -> bool {
        object.change_hub().is_some_and(|hub| hub.disconnect(id))
    }
}

impl std::fmt::Debug for ChangeSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeSignal")
            .field("label", &self.label)
            .field("type_name", &self.meta_object().type_name())
            .finish()
    }
}
