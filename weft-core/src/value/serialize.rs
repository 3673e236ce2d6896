//! Untracked serialization of raw data.
//!
//! [`Value`] and [`Key`] serialize structurally: record and key-value
//! targets become maps, sequences and sets become sequences, observed
//! views read through to their raw target, and refs to their current
//! slot. Nothing tracks — serializing inside an effect records no
//! dependencies, so snapshots never subscribe the snapshotter to the
//! data.
//!
//! Cycles are not detected; snapshots are for acyclic data.

use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

use super::{Key, Store, Target, Value};

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(n) => serializer.serialize_i64(*n),
            Value::Float(x) => serializer.serialize_f64(*x),
            Value::Str(s) => serializer.serialize_str(s),
            Value::Target(target) => serialize_target(target, serializer),
            Value::Observed(view) => serialize_target(view.target(), serializer),
            Value::Ref(cell) => {
                let value = crate::reactive::untracked(|| cell.get());
                value.serialize(serializer)
            }
        }
    }
}

impl Serialize for Key {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Key::Null => serializer.serialize_unit(),
            Key::Bool(b) => serializer.serialize_bool(*b),
            Key::Int(n) => serializer.serialize_i64(*n),
            Key::Float(bits) => serializer.serialize_f64(f64::from_bits(*bits)),
            Key::Str(s) => serializer.serialize_str(s),
            Key::Target(target) => serialize_target(target, serializer),
            Key::Ref(cell) => {
                let value = crate::reactive::untracked(|| cell.get());
                value.serialize(serializer)
            }
            // Never a user key; nothing meaningful to emit.
            Key::Iterate => serializer.serialize_unit(),
        }
    }
}

fn serialize_target<S>(target: &Target, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    // Shallow snapshot so the store lock is not held while recursing into
    // children.
    let store = target.store().clone();
    match store {
        Store::Entries(entries) => {
            let mut map = serializer.serialize_map(Some(entries.len()))?;
            for (key, value) in &entries {
                map.serialize_entry(key, value)?;
            }
            map.end()
        }
        Store::Slots(items) => {
            let mut seq = serializer.serialize_seq(Some(items.len()))?;
            for item in &items {
                seq.serialize_element(item)?;
            }
            seq.end()
        }
        Store::Members(members) => {
            let mut seq = serializer.serialize_seq(Some(members.len()))?;
            for member in &members {
                seq.serialize_element(member)?;
            }
            seq.end()
        }
    }
}
