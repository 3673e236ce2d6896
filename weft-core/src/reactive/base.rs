//! Base accessors for records and ordered sequences.
//!
//! These are the handlers behind keyed access on Object and List targets:
//! reads track GET, presence tests track HAS, enumeration tracks ITERATE,
//! and writes classify themselves as SET (existing key, different value),
//! ADD (new key), or DELETE before triggering.
//!
//! Three behaviors are specific to this family:
//!
//! - **recursive wrapping**: a compound value read through a view comes
//!   back observed in the same mode, lazily;
//! - **ref unwrap on read**: a ref stored under a key reads as the ref's
//!   current value (tracking through the ref), not as the cell itself;
//! - **ref forward on write**: overwriting a ref-valued key with a
//!   non-ref writes into the cell — triggering through the ref — and
//!   leaves the outer key untouched.
//!
//! Sequences add the `"length"` pseudo-key: reading it tracks like any
//! key, assigning it resizes (new slots read as `Null`), and ADD/DELETE
//! fan out to its observers. A deleted slot becomes a `Null` hole; later
//! indices keep their positions.

use crate::error::Error;
use crate::value::{Key, Store, Value};

use super::observed::Observed;
use super::operation::OperationKind;
use super::runtime::{self, Source, TriggerInfo};

/// What a write turned out to be, decided under the store lock and acted
/// on after it is released.
enum WriteOutcome {
    /// The key held a ref and the incoming value is not one: write into
    /// the cell instead.
    Forward(super::reference::Ref),
    /// A new key (or a filled hole).
    Added,
    /// An existing key overwritten with a different value.
    Updated(Value),
    /// An existing key assigned an identical value. No trigger.
    Unchanged,
}

pub(crate) fn get(view: &Observed, key: Key) -> Result<Value, Error> {
    let target = view.target();

    let found = {
        let store = target.store();
        match &*store {
            Store::Entries(map) => map.get(&key).cloned(),
            Store::Slots(items) => {
                if key.is_length() {
                    Some(Value::Int(items.len() as i64))
                } else {
                    key.as_index().and_then(|index| items.get(index).cloned())
                }
            }
            Store::Members(_) => None,
        }
    };

    runtime::track(&Source::from(target), OperationKind::Get, key);

    let value = found.unwrap_or(Value::Null);
    if let Value::Ref(cell) = value {
        return Ok(cell.get());
    }
    Ok(view.wrap(value))
}

pub(crate) fn set(view: &Observed, key: Key, value: Value) -> Result<(), Error> {
    let target = view.target();

    let outcome = {
        let mut store = target.store_mut();
        match &mut *store {
            Store::Entries(map) => {
                let previous = map.get(&key).cloned();
                match previous {
                    Some(Value::Ref(cell)) if !value.is_ref() => WriteOutcome::Forward(cell),
                    Some(old) => {
                        if old.same(&value) {
                            WriteOutcome::Unchanged
                        } else {
                            map.insert(key.clone(), value.clone());
                            WriteOutcome::Updated(old)
                        }
                    }
                    None => {
                        map.insert(key.clone(), value.clone());
                        WriteOutcome::Added
                    }
                }
            }
            Store::Slots(items) => {
                if key.is_length() {
                    let new_len = match value.as_int().and_then(|n| usize::try_from(n).ok()) {
                        Some(len) => len,
                        None => return Err(Error::InvalidLength { value }),
                    };
                    let old_len = items.len();
                    if new_len == old_len {
                        WriteOutcome::Unchanged
                    } else {
                        items.resize(new_len, Value::Null);
                        WriteOutcome::Updated(Value::Int(old_len as i64))
                    }
                } else {
                    let index = match key.as_index() {
                        Some(index) => index,
                        None => return Err(Error::InvalidListKey { key }),
                    };
                    if index < items.len() {
                        let old = items[index].clone();
                        match old {
                            Value::Ref(cell) if !value.is_ref() => WriteOutcome::Forward(cell),
                            // A Null slot is a hole; filling it is an ADD.
                            Value::Null if !value.is_null() => {
                                items[index] = value.clone();
                                WriteOutcome::Added
                            }
                            old => {
                                if old.same(&value) {
                                    WriteOutcome::Unchanged
                                } else {
                                    items[index] = value.clone();
                                    WriteOutcome::Updated(old)
                                }
                            }
                        }
                    } else {
                        // Writing past the end grows the sequence, holes
                        // in between reading as Null.
                        if index > items.len() {
                            items.resize(index, Value::Null);
                        }
                        items.push(value.clone());
                        WriteOutcome::Added
                    }
                }
            }
            Store::Members(_) => WriteOutcome::Unchanged,
        }
    };

    let source = Source::from(target);
    match outcome {
        WriteOutcome::Forward(cell) => {
            cell.set(value);
            Ok(())
        }
        WriteOutcome::Added => {
            runtime::trigger(
                &source,
                OperationKind::Add,
                Some(key),
                TriggerInfo {
                    new_value: Some(value),
                    ..Default::default()
                },
            );
            Ok(())
        }
        WriteOutcome::Updated(old) => {
            runtime::trigger(
                &source,
                OperationKind::Set,
                Some(key),
                TriggerInfo {
                    old_value: Some(old),
                    new_value: Some(value),
                    ..Default::default()
                },
            );
            Ok(())
        }
        WriteOutcome::Unchanged => Ok(()),
    }
}

pub(crate) fn delete(view: &Observed, key: Key) -> Result<bool, Error> {
    let target = view.target();

    let removed = {
        let mut store = target.store_mut();
        match &mut *store {
            Store::Entries(map) => map.shift_remove(&key),
            Store::Slots(items) => {
                if key.is_length() {
                    None
                } else {
                    match key.as_index() {
                        Some(index) if index < items.len() && !items[index].is_null() => {
                            // Leave a hole; later indices keep their spots.
                            Some(std::mem::replace(&mut items[index], Value::Null))
                        }
                        _ => None,
                    }
                }
            }
            Store::Members(_) => None,
        }
    };

    match removed {
        Some(old) => {
            runtime::trigger(
                &Source::from(target),
                OperationKind::Delete,
                Some(key),
                TriggerInfo {
                    old_value: Some(old),
                    ..Default::default()
                },
            );
            Ok(true)
        }
        None => Ok(false),
    }
}

pub(crate) fn has(view: &Observed, key: Key) -> Result<bool, Error> {
    let target = view.target();

    let present = {
        let store = target.store();
        match &*store {
            Store::Entries(map) => map.contains_key(&key),
            Store::Slots(items) => {
                if key.is_length() {
                    true
                } else {
                    key.as_index()
                        .map(|index| index < items.len() && !items[index].is_null())
                        .unwrap_or(false)
                }
            }
            Store::Members(_) => false,
        }
    };

    runtime::track(&Source::from(target), OperationKind::Has, key);
    Ok(present)
}

pub(crate) fn keys(view: &Observed) -> Result<Vec<Key>, Error> {
    let target = view.target();

    let keys = {
        let store = target.store();
        match &*store {
            Store::Entries(map) => map.keys().cloned().collect(),
            Store::Slots(items) => (0..items.len()).map(Key::from).collect(),
            Store::Members(_) => Vec::new(),
        }
    };

    runtime::track(&Source::from(target), OperationKind::Iterate, Key::Iterate);
    Ok(keys)
}
