//! Dep sets and the target map.
//!
//! The dependency registry is a two-level map: target identity to a
//! per-key table, and key to a [`Dep`] — the set of effects that read that
//! `(target, key)` pair. The reverse direction lives on each effect as its
//! `deps` list, and the two sides are kept symmetric: an effect is in a
//! dep exactly when that dep is in the effect's list.
//!
//! Deps hold weak references (the registry must never keep an effect
//! alive), keyed by effect ID so membership survives the weak/strong
//! distinction. Entry order is insertion order, which is what makes
//! trigger fan-out deterministic.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock, Weak};

use indexmap::IndexMap;

use crate::value::{Key, TargetId};

use super::effect::{Effect, EffectId, EffectInner};

struct DepInner {
    entries: Vec<(EffectId, Weak<EffectInner>)>,
}

/// A set of effects subscribed to one `(target, key)` pair.
#[derive(Clone)]
pub(crate) struct Dep {
    inner: Arc<RwLock<DepInner>>,
}

impl Dep {
    fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(DepInner {
                entries: Vec::new(),
            })),
        }
    }

    /// Whether the effect is a member.
    pub(crate) fn contains(&self, id: EffectId) -> bool {
        self.inner
            .read()
            .expect("dep lock poisoned")
            .entries
            .iter()
            .any(|(member, _)| *member == id)
    }

    /// Insert an effect. Returns `false` if it was already a member.
    pub(crate) fn insert(&self, id: EffectId, effect: Weak<EffectInner>) -> bool {
        let mut inner = self.inner.write().expect("dep lock poisoned");
        if inner.entries.iter().any(|(member, _)| *member == id) {
            return false;
        }
        inner.entries.push((id, effect));
        true
    }

    /// Remove an effect, if present.
    pub(crate) fn remove(&self, id: EffectId) {
        self.inner
            .write()
            .expect("dep lock poisoned")
            .entries
            .retain(|(member, _)| *member != id);
    }

    /// The live members, in insertion order. Entries whose effect has been
    /// dropped are pruned on the way out.
    pub(crate) fn effects(&self) -> Vec<Effect> {
        let mut inner = self.inner.write().expect("dep lock poisoned");
        inner.entries.retain(|(_, weak)| weak.strong_count() > 0);
        inner
            .entries
            .iter()
            .filter_map(|(_, weak)| weak.upgrade().map(Effect::from_inner))
            .collect()
    }
}

impl PartialEq for Dep {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

// Global dependency table. Keys of the inner table include user keys, the
// Iterate sentinel, and the "length" pseudo-key of lists. Values (deps)
// hold no reference to the target itself, so the table never keeps user
// data alive; entries are purged when the target's last handle drops.
static TARGET_MAP: OnceLock<RwLock<HashMap<TargetId, IndexMap<Key, Dep>>>> = OnceLock::new();

fn target_map() -> &'static RwLock<HashMap<TargetId, IndexMap<Key, Dep>>> {
    TARGET_MAP.get_or_init(|| RwLock::new(HashMap::new()))
}

/// The dep for `(target, key)`, allocating map and set entries lazily.
pub(crate) fn dep_for(target: TargetId, key: Key) -> Dep {
    target_map()
        .write()
        .expect("target map lock poisoned")
        .entry(target)
        .or_default()
        .entry(key)
        .or_insert_with(Dep::new)
        .clone()
}

/// The dep for `(target, key)` if one was ever tracked.
pub(crate) fn existing_dep(target: TargetId, key: &Key) -> Option<Dep> {
    target_map()
        .read()
        .expect("target map lock poisoned")
        .get(&target)
        .and_then(|keys| keys.get(key))
        .cloned()
}

/// Every dep recorded for the target, in key insertion order. CLEAR fans
/// out to all of them.
pub(crate) fn all_deps(target: TargetId) -> Vec<Dep> {
    target_map()
        .read()
        .expect("target map lock poisoned")
        .get(&target)
        .map(|keys| keys.values().cloned().collect())
        .unwrap_or_default()
}

/// Drop every dep recorded for the target. Called when the target's last
/// handle is dropped.
pub(crate) fn purge_target(target: TargetId) {
    let removed = {
        target_map()
            .write()
            .expect("target map lock poisoned")
            .remove(&target)
    };
    // Removed keys may own targets of their own; dropping them can
    // re-enter this function, so it must happen after the lock is
    // released.
    drop(removed);
}
