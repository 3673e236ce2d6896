//! Computed cells.
//!
//! A computed is a lazy derived value: a getter wrapped in an effect that
//! never re-runs by itself. Its scheduler only flips a dirty flag, so a
//! dependency change costs one bit until somebody actually reads the
//! value — at which point the getter re-evaluates under tracking and the
//! result is cached again.
//!
//! Because the runner is in the computed priority class, a trigger flips
//! every affected computed's dirty flag before any ordinary effect
//! re-runs. An ordinary effect reading through a computed therefore
//! always sees a value consistent with the post-trigger state.
//!
//! # Bridge tracking
//!
//! The getter runs inside the runner's tracking frame, so the raw deps it
//! collects attach to the runner, not to whoever read the computed. After
//! every read, the reading effect is copied into each of the runner's
//! deps. That is what makes chains work: a mutation three computeds deep
//! still invalidates the outermost reader directly.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use crate::value::Value;

use super::context;
use super::effect::{Effect, EffectOptions};

/// Setter callback of a writable computed.
pub type ComputedSetter = dyn Fn(Value) + Send + Sync;

struct ComputedInner {
    runner: Effect,
    dirty: Arc<AtomicBool>,
    value: RwLock<Value>,
    setter: Option<Arc<ComputedSetter>>,
}

/// A lazy, self-invalidating derived cell.
///
/// Cloning a `Computed` clones the handle; all clones share the cache,
/// the dirty flag, and the runner.
///
/// # Example
///
/// ```rust,ignore
/// let doubled = computed(move || {
///     Value::from(state.get("n").unwrap().as_int().unwrap_or(0) * 2)
/// });
///
/// doubled.value(); // evaluates the getter
/// doubled.value(); // cached until a dependency changes
/// ```
#[derive(Clone)]
pub struct Computed {
    inner: Arc<ComputedInner>,
}

/// Create a readonly computed from a getter. Writing it warns and does
/// nothing.
pub fn computed(getter: impl Fn() -> Value + Send + Sync + 'static) -> Computed {
    build(getter, None)
}

/// Create a writable computed from a getter/setter pair. The setter is
/// expected to write the sources the getter reads.
pub fn computed_writable(
    getter: impl Fn() -> Value + Send + Sync + 'static,
    setter: impl Fn(Value) + Send + Sync + 'static,
) -> Computed {
    build(getter, Some(Arc::new(setter)))
}

fn build(
    getter: impl Fn() -> Value + Send + Sync + 'static,
    setter: Option<Arc<ComputedSetter>>,
) -> Computed {
    let dirty = Arc::new(AtomicBool::new(true));

    let dirty_clone = dirty.clone();
    let runner = Effect::with_options(
        getter,
        EffectOptions {
            lazy: true,
            computed: true,
            // Invalidate instead of re-running; evaluation waits for the
            // next read.
            scheduler: Some(Arc::new(move |_runner| {
                dirty_clone.store(true, Ordering::SeqCst);
            })),
            ..Default::default()
        },
    );

    Computed {
        inner: Arc::new(ComputedInner {
            runner,
            dirty,
            value: RwLock::new(Value::Null),
            setter,
        }),
    }
}

impl Computed {
    /// Read the computed, re-evaluating the getter first if a dependency
    /// changed since the last read. Bridges the runner's deps onto the
    /// reading effect.
    pub fn value(&self) -> Value {
        if self.inner.dirty.load(Ordering::SeqCst) {
            let fresh = self.inner.runner.run();
            *self
                .inner
                .value
                .write()
                .expect("computed value lock poisoned") = fresh;
            self.inner.dirty.store(false, Ordering::SeqCst);
        }

        // Bridge: the raw deps collected by the runner also invalidate
        // whoever is reading right now.
        if let Some((reader_id, reader)) = context::current() {
            if let Some(reader_inner) = reader.upgrade() {
                for dep in self.inner.runner.inner().deps_snapshot() {
                    if !dep.contains(reader_id) {
                        dep.insert(reader_id, reader.clone());
                        reader_inner.push_dep(dep);
                    }
                }
            }
        }

        self.inner
            .value
            .read()
            .expect("computed value lock poisoned")
            .clone()
    }

    /// Write the computed through its setter. Readonly computeds warn and
    /// ignore the write.
    pub fn set_value(&self, value: impl Into<Value>) {
        match &self.inner.setter {
            Some(setter) => setter(value.into()),
            None => {
                tracing::warn!("write to a readonly computed ignored");
            }
        }
    }

    /// Whether the next read will re-evaluate the getter.
    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.load(Ordering::SeqCst)
    }

    /// The effect backing this computed, for [`Effect::stop`] and
    /// introspection.
    pub fn effect(&self) -> &Effect {
        &self.inner.runner
    }
}

impl PartialEq for Computed {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for Computed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Computed")
            .field("dirty", &self.is_dirty())
            .field("runner", &self.inner.runner.id().raw())
            .finish()
    }
}
