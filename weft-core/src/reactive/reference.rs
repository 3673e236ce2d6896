//! Ref cells.
//!
//! A [`Ref`] is a single-slot reactive box. It participates in the same
//! dependency table as containers — its identity comes from the shared
//! target counter, and its one slot is keyed by the empty-string sentinel
//! — so an effect that reads `ref.get()` re-runs when the cell is
//! written, exactly like a keyed container read.
//!
//! Compound values are converted on the way in: assigning a raw target
//! into a ref stores its mutable observed view, so `ref.get()` hands back
//! something already tracked.
//!
//! [`to_refs`] projects a record's fields into link refs: ref-shaped
//! handles that read and write through the underlying observed record
//! with no tracking of their own (the record's accessors already track).

use std::sync::{Arc, RwLock};

use crate::error::Error;
use crate::value::{Key, TargetId, TargetKind, Value};

use super::observed::Observed;
use super::operation::OperationKind;
use super::registry;
use super::runtime::{self, Source, TriggerInfo};

/// The sentinel key a ref's single slot occupies.
fn slot_key() -> Key {
    Key::from("")
}

struct CellInner {
    id: TargetId,
    value: RwLock<Value>,
}

impl Drop for CellInner {
    fn drop(&mut self) {
        crate::reactive::purge_target(self.id);
    }
}

struct LinkInner {
    id: TargetId,
    source: Observed,
    key: Key,
}

#[derive(Clone)]
enum RefImpl {
    Cell(Arc<CellInner>),
    Link(Arc<LinkInner>),
}

/// A single-slot reactive cell.
///
/// Cloning a `Ref` clones the handle; all clones share one slot and one
/// identity.
#[derive(Clone)]
pub struct Ref {
    imp: RefImpl,
}

impl Ref {
    /// Allocate a cell holding the value. Compound values are stored as
    /// their mutable observed view; a value that is already a ref comes
    /// back as-is rather than nested.
    pub fn new(value: impl Into<Value>) -> Self {
        match value.into() {
            Value::Ref(existing) => existing,
            value => Self {
                imp: RefImpl::Cell(Arc::new(CellInner {
                    id: TargetId::next(),
                    value: RwLock::new(convert(value)),
                })),
            },
        }
    }

    fn link(source: Observed, key: Key) -> Self {
        Self {
            imp: RefImpl::Link(Arc::new(LinkInner {
                id: TargetId::next(),
                source,
                key,
            })),
        }
    }

    /// Identity of this cell in the dependency table.
    pub fn id(&self) -> TargetId {
        match &self.imp {
            RefImpl::Cell(cell) => cell.id,
            RefImpl::Link(link) => link.id,
        }
    }

    /// Whether two handles refer to the same cell.
    pub fn ptr_eq(&self, other: &Ref) -> bool {
        self.id() == other.id()
    }

    /// Whether this ref reads through a record field rather than owning
    /// its slot.
    pub fn is_link(&self) -> bool {
        matches!(self.imp, RefImpl::Link(_))
    }

    /// Read the cell. Tracks GET on the cell's slot; link refs read
    /// through their record, which tracks there instead.
    pub fn get(&self) -> Value {
        match &self.imp {
            RefImpl::Cell(cell) => {
                runtime::track(&Source::from(self), OperationKind::Get, slot_key());
                cell.value.read().expect("ref value lock poisoned").clone()
            }
            RefImpl::Link(link) => link
                .source
                .get(link.key.clone())
                .unwrap_or(Value::Null),
        }
    }

    /// Write the cell and trigger SET on its slot. Compound values are
    /// converted like at construction; link refs write through their
    /// record instead.
    pub fn set(&self, value: impl Into<Value>) {
        let value = convert(value.into());
        match &self.imp {
            RefImpl::Cell(cell) => {
                let old = {
                    let mut slot = cell.value.write().expect("ref value lock poisoned");
                    std::mem::replace(&mut *slot, value.clone())
                };
                runtime::trigger(
                    &Source::from(self),
                    OperationKind::Set,
                    Some(slot_key()),
                    TriggerInfo {
                        old_value: Some(old),
                        new_value: Some(value),
                        ..Default::default()
                    },
                );
            }
            RefImpl::Link(link) => {
                let _ = link.source.set(link.key.clone(), value);
            }
        }
    }
}

impl PartialEq for Ref {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl std::fmt::Debug for Ref {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ref")
            .field("id", &self.id().raw())
            .field("link", &self.is_link())
            .finish()
    }
}

/// Whether the value is a ref cell.
pub fn is_ref(value: &Value) -> bool {
    matches!(value, Value::Ref(_))
}

/// Project each field of an observed record into a link ref that reads
/// and writes through the record. The projection itself tracks nothing;
/// tracking happens when the links are used.
pub fn to_refs(view: &Observed) -> Result<Vec<(Key, Ref)>, Error> {
    if view.kind() != TargetKind::Object {
        return Err(Error::UnsupportedOperation {
            kind: view.kind(),
            op: "to_refs",
        });
    }

    let keys: Vec<Key> = {
        let store = view.target().store();
        match &*store {
            crate::value::Store::Entries(map) => map.keys().cloned().collect(),
            _ => Vec::new(),
        }
    };

    Ok(keys
        .into_iter()
        .map(|key| (key.clone(), Ref::link(view.clone(), key)))
        .collect())
}

fn convert(value: Value) -> Value {
    match value {
        Value::Target(_) => registry::reactive(value),
        other => other,
    }
}
