//! Observed views.
//!
//! An [`Observed`] is the tracked face of a target: every operation on it
//! participates in dependency collection and trigger fan-out. Operations
//! dispatch on the target's kind — records and sequences go through the
//! base accessors, key-value/set containers through the instrumented
//! collection accessors — so each family keeps its own read/write
//! semantics while sharing one dependency registry.
//!
//! A view is mutable or readonly. Readonly views wrap the values they
//! yield as readonly, and their mutating operations consult the
//! per-thread readonly lock: engaged, the mutation is dropped with a
//! warning and a success-looking return value; disengaged, it forwards to
//! the mutable implementation.

use crate::error::Error;
use crate::value::{Key, Target, TargetKind, Value};

use super::{base, collection, context, registry};

/// Whether a view permits mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Reads wrap mutably; writes mutate and trigger.
    Mutable,
    /// Reads wrap readonly; writes are gated by the readonly lock.
    Readonly,
}

/// An observed view over a target.
///
/// Cloning a view clones the handle. Two views are equal when they share
/// a target and a mode, which is what makes `reactive` memoized up to
/// identity.
#[derive(Clone)]
pub struct Observed {
    target: Target,
    mode: Mode,
}

impl Observed {
    pub(crate) fn new(target: Target, mode: Mode) -> Self {
        Self { target, mode }
    }

    /// The raw target behind this view.
    pub fn target(&self) -> &Target {
        &self.target
    }

    /// The view's mode.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// The underlying target's runtime shape.
    pub fn kind(&self) -> TargetKind {
        self.target.kind()
    }

    /// Keyed read. Tracks GET; unwraps refs; wraps compound results in the
    /// view's mode. Absent entries read as `Null`.
    pub fn get(&self, key: impl Into<Key>) -> Result<Value, Error> {
        let key = key.into();
        match self.kind() {
            TargetKind::Object | TargetKind::List => base::get(self, key),
            TargetKind::Map | TargetKind::WeakMap => collection::get(self, key),
            kind => Err(Error::UnsupportedOperation { kind, op: "get" }),
        }
    }

    /// Keyed write. Triggers SET when overwriting with a different value,
    /// ADD when the key is new; forwards into a ref when one occupies the
    /// key.
    pub fn set(&self, key: impl Into<Key>, value: impl Into<Value>) -> Result<(), Error> {
        let key = key.into();
        let value = value.into();
        if self.write_gated("set") {
            return Ok(());
        }
        match self.kind() {
            TargetKind::Object | TargetKind::List => base::set(self, key, value),
            TargetKind::Map | TargetKind::WeakMap => collection::set(self, key, value),
            kind => Err(Error::UnsupportedOperation { kind, op: "set" }),
        }
    }

    /// Keyed removal. Triggers DELETE only when the key was present.
    /// Returns whether it was.
    pub fn delete(&self, key: impl Into<Key>) -> Result<bool, Error> {
        let key = key.into();
        if self.write_gated("delete") {
            return Ok(false);
        }
        match self.kind() {
            TargetKind::Object | TargetKind::List => base::delete(self, key),
            kind if kind.is_collection() => collection::delete(self, key),
            kind => Err(Error::UnsupportedOperation { kind, op: "delete" }),
        }
    }

    /// Key-presence test. Tracks HAS.
    pub fn has(&self, key: impl Into<Key>) -> Result<bool, Error> {
        let key = key.into();
        match self.kind() {
            TargetKind::Object | TargetKind::List => base::has(self, key),
            kind if kind.is_collection() => collection::has(self, key),
            kind => Err(Error::UnsupportedOperation { kind, op: "has" }),
        }
    }

    /// Set-member insertion. Triggers ADD only when the member is new.
    pub fn add(&self, value: impl Into<Value>) -> Result<(), Error> {
        let value = value.into();
        if self.write_gated("add") {
            return Ok(());
        }
        match self.kind() {
            TargetKind::Set | TargetKind::WeakSet => collection::add(self, value),
            kind => Err(Error::UnsupportedOperation { kind, op: "add" }),
        }
    }

    /// Append to an ordered sequence; sugar for a write one past the end.
    pub fn push(&self, value: impl Into<Value>) -> Result<(), Error> {
        match self.kind() {
            TargetKind::List => {
                let value: Value = value.into();
                let index = self.target.raw_len();
                self.set(Key::from(index), value)
            }
            kind => Err(Error::UnsupportedOperation { kind, op: "push" }),
        }
    }

    /// Empty a key-value or set container. Triggers CLEAR when it was
    /// non-empty, firing every effect that read any part of it.
    pub fn clear(&self) -> Result<(), Error> {
        if self.write_gated("clear") {
            return Ok(());
        }
        match self.kind() {
            TargetKind::Map | TargetKind::Set => collection::clear(self),
            kind => Err(Error::UnsupportedOperation { kind, op: "clear" }),
        }
    }

    /// Element count. Tracks `"length"` on sequences, ITERATE on
    /// key-value and set containers.
    pub fn len(&self) -> Result<usize, Error> {
        match self.kind() {
            TargetKind::List => {
                let length = base::get(self, Key::length())?;
                Ok(length.as_int().unwrap_or(0) as usize)
            }
            TargetKind::Map | TargetKind::Set => collection::size(self),
            kind => Err(Error::UnsupportedOperation { kind, op: "len" }),
        }
    }

    /// Whether the container is empty. Tracks like [`len`](Observed::len).
    pub fn is_empty(&self) -> Result<bool, Error> {
        Ok(self.len()? == 0)
    }

    /// The container's keys (indices for sequences, members for sets), in
    /// insertion order. Tracks ITERATE.
    pub fn keys(&self) -> Result<Vec<Key>, Error> {
        match self.kind() {
            TargetKind::Object | TargetKind::List => base::keys(self),
            TargetKind::Map | TargetKind::Set => collection::keys(self),
            kind => Err(Error::UnsupportedOperation { kind, op: "keys" }),
        }
    }

    /// The container's values, wrapped in the view's mode.
    ///
    /// Sequences track `"length"` plus a GET per slot (the element-wise
    /// reads a `for … of` performs); records track ITERATE plus a GET per
    /// key; key-value and set containers track ITERATE.
    pub fn values(&self) -> Result<Vec<Value>, Error> {
        match self.kind() {
            TargetKind::Object => {
                let keys = self.keys()?;
                keys.into_iter().map(|key| self.get(key)).collect()
            }
            TargetKind::List => {
                let len = self.len()?;
                (0..len).map(|index| self.get(index)).collect()
            }
            TargetKind::Map | TargetKind::Set => collection::values(self),
            kind => Err(Error::UnsupportedOperation { kind, op: "values" }),
        }
    }

    /// `(key, value)` pairs with both sides wrapped in the view's mode.
    /// Set containers yield each member twice, matching their key-less
    /// shape.
    pub fn entries(&self) -> Result<Vec<(Value, Value)>, Error> {
        match self.kind() {
            TargetKind::Object => {
                let keys = self.keys()?;
                keys.into_iter()
                    .map(|key| {
                        let value = self.get(key.clone())?;
                        Ok((key.to_value(), value))
                    })
                    .collect()
            }
            TargetKind::Map | TargetKind::Set => collection::entries(self),
            kind => Err(Error::UnsupportedOperation { kind, op: "entries" }),
        }
    }

    /// Visit each entry as `(value, key)`, both wrapped in the view's
    /// mode. Tracks ITERATE. Set containers pass the member as both.
    pub fn for_each(&self, f: impl FnMut(Value, Value)) -> Result<(), Error> {
        match self.kind() {
            TargetKind::Map | TargetKind::Set => collection::for_each(self, f),
            kind => Err(Error::UnsupportedOperation { kind, op: "for_each" }),
        }
    }

    /// Whether a readonly-locked view swallowed the mutation.
    fn write_gated(&self, op: &'static str) -> bool {
        if self.mode == Mode::Readonly && context::is_readonly_locked() {
            tracing::warn!(
                id = self.target.id().raw(),
                op,
                "mutation through readonly view ignored while the readonly lock is engaged"
            );
            return true;
        }
        false
    }

    /// Wrap a compound value read out of this view: children observe in
    /// the same mode as the parent, lazily, through the registry rules.
    pub(crate) fn wrap(&self, value: Value) -> Value {
        match value {
            Value::Target(_) | Value::Observed(_) => match self.mode {
                Mode::Mutable => registry::reactive(value),
                Mode::Readonly => registry::readonly(value),
            },
            other => other,
        }
    }
}

impl PartialEq for Observed {
    fn eq(&self, other: &Self) -> bool {
        self.target.ptr_eq(&other.target) && self.mode == other.mode
    }
}

impl std::fmt::Debug for Observed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observed")
            .field("id", &self.target.id().raw())
            .field("kind", &self.kind())
            .field("mode", &self.mode)
            .finish()
    }
}
