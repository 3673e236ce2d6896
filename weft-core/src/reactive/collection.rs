//! Collection accessors for key-value and set containers.
//!
//! Map and Set targets keep their state behind a method surface rather
//! than keyed slots, so observation instruments the methods themselves:
//! `get`/`has` track per key, `size` and every iterating method track
//! ITERATE, and the mutators classify their triggers by whether the key
//! set actually changed (`add` and `set` only ADD when the entry is new,
//! `delete` only fires when the entry existed, `clear` only when the
//! container held anything).
//!
//! Keys are [`Key`]s and therefore already normalized: an observed view
//! used as a key collides with its raw target in the dependency table.
//! Yielded values (and yielded keys, for the pair-producing methods) come
//! back wrapped in the view's mode.
//!
//! The weak kinds (`WeakMap`, `WeakSet`) take only identity keys and
//! support none of the enumerating methods, so they never carry ITERATE
//! deps. Their entries are owned like any other value; what is "weak"
//! about them here is the restricted surface.

use crate::error::Error;
use crate::value::{Key, Store, Value};

use super::observed::Observed;
use super::operation::OperationKind;
use super::runtime::{self, Source, TriggerInfo};

fn check_weak_key(view: &Observed, key: &Key) -> Result<(), Error> {
    if view.kind().is_weak() && !key.is_identity() {
        return Err(Error::InvalidWeakKey);
    }
    Ok(())
}

pub(crate) fn get(view: &Observed, key: Key) -> Result<Value, Error> {
    check_weak_key(view, &key)?;
    let target = view.target();

    let found = {
        let store = target.store();
        match &*store {
            Store::Entries(map) => map.get(&key).cloned(),
            _ => None,
        }
    };

    runtime::track(&Source::from(target), OperationKind::Get, key);
    Ok(view.wrap(found.unwrap_or(Value::Null)))
}

pub(crate) fn has(view: &Observed, key: Key) -> Result<bool, Error> {
    check_weak_key(view, &key)?;
    let target = view.target();

    let present = {
        let store = target.store();
        match &*store {
            Store::Entries(map) => map.contains_key(&key),
            Store::Members(set) => set.contains(&key),
            Store::Slots(_) => false,
        }
    };

    runtime::track(&Source::from(target), OperationKind::Has, key);
    Ok(present)
}

pub(crate) fn size(view: &Observed) -> Result<usize, Error> {
    let target = view.target();

    let size = {
        let store = target.store();
        match &*store {
            Store::Entries(map) => map.len(),
            Store::Members(set) => set.len(),
            Store::Slots(items) => items.len(),
        }
    };

    runtime::track(&Source::from(target), OperationKind::Iterate, Key::Iterate);
    Ok(size)
}

pub(crate) fn add(view: &Observed, value: Value) -> Result<(), Error> {
    let key = Key::from_value(&value);
    check_weak_key(view, &key)?;
    let target = view.target();

    let inserted = {
        let mut store = target.store_mut();
        match &mut *store {
            Store::Members(set) => set.insert(key.clone()),
            _ => false,
        }
    };

    if inserted {
        runtime::trigger(
            &Source::from(target),
            OperationKind::Add,
            Some(key),
            TriggerInfo {
                new_value: Some(value),
                ..Default::default()
            },
        );
    }
    Ok(())
}

pub(crate) fn set(view: &Observed, key: Key, value: Value) -> Result<(), Error> {
    check_weak_key(view, &key)?;
    let target = view.target();

    let previous = {
        let mut store = target.store_mut();
        match &mut *store {
            Store::Entries(map) => Some(map.insert(key.clone(), value.clone())),
            _ => None,
        }
    };

    let source = Source::from(target);
    match previous {
        Some(None) => {
            runtime::trigger(
                &source,
                OperationKind::Add,
                Some(key),
                TriggerInfo {
                    new_value: Some(value),
                    ..Default::default()
                },
            );
        }
        Some(Some(old)) => {
            if !old.same(&value) {
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
            }
        }
        None => {}
    }
    Ok(())
}

pub(crate) fn delete(view: &Observed, key: Key) -> Result<bool, Error> {
    check_weak_key(view, &key)?;
    let target = view.target();

    enum Removed {
        Entry(Value),
        Member,
        Absent,
    }

    let removed = {
        let mut store = target.store_mut();
        match &mut *store {
            Store::Entries(map) => match map.shift_remove(&key) {
                Some(old) => Removed::Entry(old),
                None => Removed::Absent,
            },
            Store::Members(set) => {
                if set.shift_remove(&key) {
                    Removed::Member
                } else {
                    Removed::Absent
                }
            }
            Store::Slots(_) => Removed::Absent,
        }
    };

    let source = Source::from(target);
    match removed {
        Removed::Entry(old) => {
            runtime::trigger(
                &source,
                OperationKind::Delete,
                Some(key),
                TriggerInfo {
                    old_value: Some(old),
                    ..Default::default()
                },
            );
            Ok(true)
        }
        Removed::Member => {
            runtime::trigger(
                &source,
                OperationKind::Delete,
                Some(key),
                TriggerInfo::default(),
            );
            Ok(true)
        }
        Removed::Absent => Ok(false),
    }
}

pub(crate) fn clear(view: &Observed) -> Result<(), Error> {
    let target = view.target();

    // Snapshot before emptying so debug observers can see what was lost.
    let old_target = if cfg!(debug_assertions) {
        Some(target.snapshot())
    } else {
        None
    };

    // Emptied entries are held past the store lock: dropping them can drop
    // targets, whose cleanup re-enters the registries.
    let mut drained_entries: Vec<(Key, Value)> = Vec::new();
    let mut drained_members: Vec<Key> = Vec::new();

    {
        let mut store = target.store_mut();
        match &mut *store {
            Store::Entries(map) => drained_entries = map.drain(..).collect(),
            Store::Members(set) => drained_members = set.drain(..).collect(),
            Store::Slots(_) => {}
        }
    }

    if !drained_entries.is_empty() || !drained_members.is_empty() {
        runtime::trigger(
            &Source::from(target),
            OperationKind::Clear,
            None,
            TriggerInfo {
                old_target,
                ..Default::default()
            },
        );
    }
    drop(drained_entries);
    drop(drained_members);
    Ok(())
}

pub(crate) fn keys(view: &Observed) -> Result<Vec<Key>, Error> {
    let target = view.target();

    let keys = {
        let store = target.store();
        match &*store {
            Store::Entries(map) => map.keys().cloned().collect(),
            Store::Members(set) => set.iter().cloned().collect(),
            Store::Slots(_) => Vec::new(),
        }
    };

    runtime::track(&Source::from(target), OperationKind::Iterate, Key::Iterate);
    Ok(keys)
}

pub(crate) fn values(view: &Observed) -> Result<Vec<Value>, Error> {
    let target = view.target();

    let values: Vec<Value> = {
        let store = target.store();
        match &*store {
            Store::Entries(map) => map.values().cloned().collect(),
            Store::Members(set) => set.iter().map(Key::to_value).collect(),
            Store::Slots(_) => Vec::new(),
        }
    };

    runtime::track(&Source::from(target), OperationKind::Iterate, Key::Iterate);
    Ok(values.into_iter().map(|value| view.wrap(value)).collect())
}

pub(crate) fn entries(view: &Observed) -> Result<Vec<(Value, Value)>, Error> {
    let target = view.target();

    let pairs: Vec<(Value, Value)> = {
        let store = target.store();
        match &*store {
            Store::Entries(map) => map
                .iter()
                .map(|(key, value)| (key.to_value(), value.clone()))
                .collect(),
            Store::Members(set) => set
                .iter()
                .map(|member| (member.to_value(), member.to_value()))
                .collect(),
            Store::Slots(_) => Vec::new(),
        }
    };

    runtime::track(&Source::from(target), OperationKind::Iterate, Key::Iterate);
    Ok(pairs
        .into_iter()
        .map(|(key, value)| (view.wrap(key), view.wrap(value)))
        .collect())
}

pub(crate) fn for_each(view: &Observed, mut f: impl FnMut(Value, Value)) -> Result<(), Error> {
    let pairs = entries(view)?;
    for (key, value) in pairs {
        f(value, key);
    }
    Ok(())
}
