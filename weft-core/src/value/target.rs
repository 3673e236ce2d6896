//! Raw compound targets.
//!
//! A [`Target`] is an application-owned container: a record, an ordered
//! sequence, a key-value container, or a set. Targets are the raw side of
//! the raw/observed split — holding a `Target` gives direct, untracked
//! access to the data. Observation happens through
//! [`Observed`](crate::reactive::Observed) views produced by
//! [`reactive`](crate::reactive::reactive) and
//! [`readonly`](crate::reactive::readonly).
//!
//! # Identity
//!
//! Every target draws a unique [`TargetId`] from an atomic counter at
//! construction. All engine registries key by that id, never by address, so
//! identity is stable for the life of the target and can never be confused
//! with a later allocation. Single-slot ref cells draw from the same
//! counter: as far as the dependency table is concerned, a ref is a
//! one-slot target.
//!
//! # Reclamation
//!
//! The registries hold no strong reference to a target. When the last
//! handle drops, the target's dependency-table entry and opt-out flags are
//! purged, so the engine never extends the life of user data.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use indexmap::{IndexMap, IndexSet};

use super::{Key, Value};

/// Counter for generating unique target IDs.
///
/// Shared with ref cells, which occupy the same identity space in the
/// dependency table.
static TARGET_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Unique identifier for a target (or ref cell) in the dependency table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetId(u64);

impl TargetId {
    /// Generate a new unique target ID.
    pub(crate) fn next() -> Self {
        Self(TARGET_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// The runtime shape of a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    /// A record with arbitrary hashable field keys.
    Object,

    /// An ordered sequence indexed by non-negative integers, with a
    /// `"length"` pseudo-key.
    List,

    /// A key-value container.
    Map,

    /// A set container.
    Set,

    /// A key-value container restricted to identity keys, with no
    /// enumerating operations. See the module docs of
    /// [`collection`](crate::reactive) for what "weak" buys here.
    WeakMap,

    /// A set container restricted to identity members, with no
    /// enumerating operations.
    WeakSet,
}

impl TargetKind {
    /// Whether this kind is an ordered sequence.
    pub fn is_list(&self) -> bool {
        matches!(self, TargetKind::List)
    }

    /// Whether this kind routes through the collection accessors
    /// (instrumented method table) rather than the base accessors.
    pub fn is_collection(&self) -> bool {
        matches!(
            self,
            TargetKind::Map | TargetKind::Set | TargetKind::WeakMap | TargetKind::WeakSet
        )
    }

    /// Whether this kind only accepts identity keys and refuses every
    /// enumerating operation.
    pub fn is_weak(&self) -> bool {
        matches!(self, TargetKind::WeakMap | TargetKind::WeakSet)
    }
}

/// Backing storage for a target. Insertion order is preserved so iteration
/// and trigger fan-out are deterministic.
#[derive(Debug, Clone)]
pub(crate) enum Store {
    /// Object, Map, WeakMap.
    Entries(IndexMap<Key, Value>),
    /// List.
    Slots(Vec<Value>),
    /// Set, WeakSet.
    Members(IndexSet<Key>),
}

pub(crate) struct TargetInner {
    id: TargetId,
    kind: TargetKind,
    store: RwLock<Store>,
}

impl Drop for TargetInner {
    fn drop(&mut self) {
        // The last handle is gone; nothing can read or mutate this target
        // again, so its dep sets and opt-out flags are unreachable too.
        crate::reactive::purge_target(self.id);
    }
}

/// A raw compound container with identity.
///
/// Cloning a `Target` clones the handle, not the data; all clones share
/// one store and one identity.
///
/// # Example
///
/// ```rust,ignore
/// let todo = Target::object();
/// let state = reactive(todo.into());
/// ```
#[derive(Clone)]
pub struct Target {
    inner: Arc<TargetInner>,
}

impl Target {
    fn with_kind(kind: TargetKind, store: Store) -> Self {
        Self {
            inner: Arc::new(TargetInner {
                id: TargetId::next(),
                kind,
                store: RwLock::new(store),
            }),
        }
    }

    /// Create an empty record target.
    pub fn object() -> Self {
        Self::with_kind(TargetKind::Object, Store::Entries(IndexMap::new()))
    }

    /// Create a record target from `(key, value)` pairs.
    pub fn object_with<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (Key, Value)>,
    {
        Self::with_kind(TargetKind::Object, Store::Entries(entries.into_iter().collect()))
    }

    /// Create an empty ordered-sequence target.
    pub fn list() -> Self {
        Self::with_kind(TargetKind::List, Store::Slots(Vec::new()))
    }

    /// Create an ordered-sequence target from values.
    pub fn list_with<I>(items: I) -> Self
    where
        I: IntoIterator<Item = Value>,
    {
        Self::with_kind(TargetKind::List, Store::Slots(items.into_iter().collect()))
    }

    /// Create an empty key-value target.
    pub fn map() -> Self {
        Self::with_kind(TargetKind::Map, Store::Entries(IndexMap::new()))
    }

    /// Create a key-value target from `(key, value)` pairs.
    pub fn map_with<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (Key, Value)>,
    {
        Self::with_kind(TargetKind::Map, Store::Entries(entries.into_iter().collect()))
    }

    /// Create an empty set target.
    pub fn set() -> Self {
        Self::with_kind(TargetKind::Set, Store::Members(IndexSet::new()))
    }

    /// Create a set target from member keys.
    pub fn set_with<I>(members: I) -> Self
    where
        I: IntoIterator<Item = Key>,
    {
        Self::with_kind(TargetKind::Set, Store::Members(members.into_iter().collect()))
    }

    /// Create an empty weak key-value target.
    pub fn weak_map() -> Self {
        Self::with_kind(TargetKind::WeakMap, Store::Entries(IndexMap::new()))
    }

    /// Create an empty weak set target.
    pub fn weak_set() -> Self {
        Self::with_kind(TargetKind::WeakSet, Store::Members(IndexSet::new()))
    }

    /// Get the target's unique ID.
    pub fn id(&self) -> TargetId {
        self.inner.id
    }

    /// Get the target's runtime shape.
    pub fn kind(&self) -> TargetKind {
        self.inner.kind
    }

    /// Whether two handles refer to the same target.
    pub fn ptr_eq(&self, other: &Target) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Read access to the backing store.
    ///
    /// Accessors must release this guard before tracking, triggering, or
    /// calling back into user code.
    pub(crate) fn store(&self) -> RwLockReadGuard<'_, Store> {
        self.inner.store.read().expect("target store lock poisoned")
    }

    /// Write access to the backing store. Same discipline as [`store`].
    ///
    /// [`store`]: Target::store
    pub(crate) fn store_mut(&self) -> RwLockWriteGuard<'_, Store> {
        self.inner.store.write().expect("target store lock poisoned")
    }

    /// Shallow copy of the current contents into a fresh target of the
    /// same kind. Used for the `old_target` observer payload on CLEAR.
    pub(crate) fn snapshot(&self) -> Target {
        let store = self.store().clone();
        Self::with_kind(self.inner.kind, store)
    }

    /// Untracked keyed read straight from the store. Neither tracks,
    /// wraps, nor unwraps; observed reads go through the accessor layer.
    pub fn raw_get(&self, key: &Key) -> Option<Value> {
        match &*self.store() {
            Store::Entries(map) => map.get(key).cloned(),
            Store::Slots(items) => key.as_index().and_then(|index| items.get(index).cloned()),
            Store::Members(set) => set.get(key).map(Key::to_value),
        }
    }

    /// Untracked element count. Diagnostic only; observed reads go through
    /// the accessor layer.
    pub fn raw_len(&self) -> usize {
        match &*self.store() {
            Store::Entries(map) => map.len(),
            Store::Slots(items) => items.len(),
            Store::Members(set) => set.len(),
        }
    }
}

impl PartialEq for Target {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl std::fmt::Debug for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Target")
            .field("id", &self.id().raw())
            .field("kind", &self.kind())
            .field("len", &self.raw_len())
            .finish()
    }
}
