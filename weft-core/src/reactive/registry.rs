//! Raw↔observed registry.
//!
//! [`reactive`] and [`readonly`] turn raw targets into observed views.
//! Because a view is a typed handle over the same target (not a distinct
//! object), the bidirectional raw/observed maps of a proxy-based design
//! collapse structurally: `to_raw` is a field read, and calling `reactive`
//! twice on one target yields views that compare equal. What remains as
//! real registry state are the opt-out flags set by [`mark_readonly`] and
//! [`mark_non_reactive`], kept per target identity and purged when the
//! target's last handle drops.

use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

use crate::value::{Target, TargetId, Value};

use super::observed::{Mode, Observed};

#[derive(Debug, Clone, Copy, Default)]
struct TargetFlags {
    readonly_marked: bool,
    non_reactive: bool,
}

static FLAGS: OnceLock<RwLock<HashMap<TargetId, TargetFlags>>> = OnceLock::new();

fn flags_table() -> &'static RwLock<HashMap<TargetId, TargetFlags>> {
    FLAGS.get_or_init(|| RwLock::new(HashMap::new()))
}

fn flags_of(id: TargetId) -> TargetFlags {
    flags_table()
        .read()
        .expect("flags table lock poisoned")
        .get(&id)
        .copied()
        .unwrap_or_default()
}

fn update_flags(id: TargetId, f: impl FnOnce(&mut TargetFlags)) {
    let mut table = flags_table().write().expect("flags table lock poisoned");
    f(table.entry(id).or_default());
}

/// Drop the opt-out flags for a reclaimed target.
pub(crate) fn purge_target(id: TargetId) {
    flags_table()
        .write()
        .expect("flags table lock poisoned")
        .remove(&id);
}

/// Wrap a value in a mutable observed view.
///
/// Readonly views pass through unchanged, as do values already observed
/// mutably. A target the user pre-marked with [`mark_readonly`] comes back
/// as a readonly view instead. Values that cannot be observed (primitives,
/// refs, non-reactive-marked targets) are returned unchanged with a
/// warning.
pub fn reactive(value: Value) -> Value {
    match value {
        Value::Observed(view) => {
            // Already observed; a readonly view stays readonly.
            Value::Observed(view)
        }
        Value::Target(target) => {
            let flags = flags_of(target.id());
            if flags.readonly_marked {
                return readonly(Value::Target(target));
            }
            if flags.non_reactive {
                tracing::warn!(
                    id = target.id().raw(),
                    "value is marked non-reactive and cannot be observed"
                );
                return Value::Target(target);
            }
            Value::Observed(Observed::new(target, Mode::Mutable))
        }
        other => {
            tracing::warn!(value = ?other, "value cannot be observed");
            other
        }
    }
}

/// Wrap a value in a readonly observed view.
///
/// A mutable view is first resolved back to its raw target, so readonly
/// and mutable views share the underlying data.
pub fn readonly(value: Value) -> Value {
    match value {
        Value::Observed(view) => {
            if view.mode() == Mode::Readonly {
                return Value::Observed(view);
            }
            Value::Observed(Observed::new(view.target().clone(), Mode::Readonly))
        }
        Value::Target(target) => {
            if flags_of(target.id()).non_reactive {
                tracing::warn!(
                    id = target.id().raw(),
                    "value is marked non-reactive and cannot be observed"
                );
                return Value::Target(target);
            }
            Value::Observed(Observed::new(target, Mode::Readonly))
        }
        other => {
            tracing::warn!(value = ?other, "value cannot be observed");
            other
        }
    }
}

/// Whether the value is a mutable observed view.
pub fn is_reactive(value: &Value) -> bool {
    matches!(value, Value::Observed(view) if view.mode() == Mode::Mutable)
}

/// Whether the value is a readonly observed view.
pub fn is_readonly(value: &Value) -> bool {
    matches!(value, Value::Observed(view) if view.mode() == Mode::Readonly)
}

/// The raw target behind an observed view; any other value unchanged.
pub fn to_raw(value: Value) -> Value {
    match value {
        Value::Observed(view) => Value::Target(view.target().clone()),
        other => other,
    }
}

/// Mark a target so that [`reactive`] produces readonly views of it.
/// Returns the value for chaining; non-targets are unaffected.
pub fn mark_readonly(value: Value) -> Value {
    if let Some(target) = target_of(&value) {
        update_flags(target.id(), |flags| flags.readonly_marked = true);
    }
    value
}

/// Mark a target as never observable. Returns the value for chaining;
/// non-targets are unaffected.
pub fn mark_non_reactive(value: Value) -> Value {
    if let Some(target) = target_of(&value) {
        update_flags(target.id(), |flags| flags.non_reactive = true);
    }
    value
}

fn target_of(value: &Value) -> Option<&Target> {
    match value {
        Value::Target(target) => Some(target),
        Value::Observed(view) => Some(view.target()),
        _ => None,
    }
}
