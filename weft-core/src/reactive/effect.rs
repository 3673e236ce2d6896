//! Effects.
//!
//! An effect wraps a user function so that every read it performs is
//! recorded, and any later mutation of what it read schedules a re-run.
//!
//! # Run protocol
//!
//! One invocation of an effect:
//!
//! 1. If the effect has been stopped, the raw function runs as a plain
//!    call — no tracking, no bookkeeping.
//! 2. If the effect is already on the active stack (it triggered itself
//!    by writing a cell it reads), the raw function runs without being
//!    re-pushed. The nested call collects no separate frame, which is what
//!    prevents unbounded self-recursion.
//! 3. Otherwise the effect's previous dependencies are cleared, the effect
//!    is pushed, the raw function runs, and the stack is popped in a drop
//!    guard that survives panics.
//!
//! Clearing before every run means that after a run completes, the deps
//! attached to the effect are exactly the reads that run performed —
//! conditional reads from a previous run do not linger.
//!
//! # Options
//!
//! [`EffectOptions`] carries the scheduling knobs: `lazy` suppresses the
//! first run, `computed` moves the effect into the priority class that
//! fires before ordinary effects, `scheduler` replaces direct re-runs
//! with a callback, and the observer hooks report track/trigger/stop
//! events for devtools-style introspection.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};

use crate::value::{Key, Target, Value};

use super::context;
use super::dep::Dep;
use super::operation::OperationKind;
use super::runtime::Source;

/// Counter for generating unique effect IDs.
static EFFECT_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Unique identifier for an effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EffectId(u64);

impl EffectId {
    /// Generate a new unique effect ID.
    pub(crate) fn next() -> Self {
        Self(EFFECT_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Scheduler callback: called with the effect in place of a direct re-run.
pub type SchedulerFn = dyn Fn(&Effect) + Send + Sync;

/// Observer hook for track and trigger events.
pub type ObserverHook = dyn Fn(&ObserverEvent) + Send + Sync;

/// Hook invoked when an effect is stopped.
pub type StopHook = dyn Fn() + Send + Sync;

/// Payload delivered to `on_track` and `on_trigger` observers.
#[derive(Clone, Debug)]
pub struct ObserverEvent {
    /// The effect the event is about.
    pub effect: Effect,
    /// The container or ref cell the operation touched.
    pub target: Source,
    /// What kind of operation it was.
    pub op: OperationKind,
    /// The key involved, absent for CLEAR.
    pub key: Option<Key>,
    /// Previous value, where the operation had one.
    pub old_value: Option<Value>,
    /// New value, where the operation had one.
    pub new_value: Option<Value>,
    /// Pre-CLEAR snapshot of the container. Populated in debug builds.
    pub old_target: Option<Target>,
}

/// Options accepted by [`Effect::with_options`].
#[derive(Default)]
pub struct EffectOptions {
    /// Suppress the first run.
    pub lazy: bool,
    /// Put the effect in the computed priority class: within one trigger
    /// it fires before every ordinary effect.
    pub computed: bool,
    /// Called at trigger time in place of a direct re-run.
    pub scheduler: Option<Arc<SchedulerFn>>,
    /// Observer: a dependency link was newly established.
    pub on_track: Option<Arc<ObserverHook>>,
    /// Observer: the effect was fired by a trigger.
    pub on_trigger: Option<Arc<ObserverHook>>,
    /// Observer: the effect was stopped.
    pub on_stop: Option<Arc<StopHook>>,
}

pub(crate) struct EffectInner {
    pub(crate) id: EffectId,
    pub(crate) active: AtomicBool,
    pub(crate) computed: bool,
    pub(crate) raw: Box<dyn Fn() -> Value + Send + Sync>,
    pub(crate) scheduler: Option<Arc<SchedulerFn>>,
    pub(crate) on_track: Option<Arc<ObserverHook>>,
    pub(crate) on_trigger: Option<Arc<ObserverHook>>,
    pub(crate) on_stop: Option<Arc<StopHook>>,
    pub(crate) deps: RwLock<Vec<Dep>>,
    pub(crate) runs: AtomicU64,
}

impl EffectInner {
    /// Record a dep on the reverse side of the registry.
    pub(crate) fn push_dep(&self, dep: Dep) {
        self.deps.write().expect("effect deps lock poisoned").push(dep);
    }

    /// Snapshot of the effect's current deps.
    pub(crate) fn deps_snapshot(&self) -> Vec<Dep> {
        self.deps.read().expect("effect deps lock poisoned").clone()
    }
}

/// A reactive effect.
///
/// Cloning an `Effect` clones the handle; all clones share one identity,
/// one dep list, and one active flag. The registry holds only weak
/// references — dropping every handle without calling [`stop`](Effect::stop)
/// silently retires the effect.
///
/// # Example
///
/// ```rust,ignore
/// let state = reactive(Target::object().into());
/// let state = state.as_observed().unwrap().clone();
///
/// let effect = Effect::new(move || {
///     println!("n is now {:?}", state.get("n"));
/// });
///
/// // Mutating a tracked key re-runs the effect.
/// ```
#[derive(Clone)]
pub struct Effect {
    inner: Arc<EffectInner>,
}

impl Effect {
    /// Wrap a side-effecting closure and run it immediately to collect its
    /// initial dependencies.
    pub fn new(f: impl Fn() + Send + Sync + 'static) -> Self {
        Self::with_options(
            move || {
                f();
                Value::Null
            },
            EffectOptions::default(),
        )
    }

    /// Wrap a value-returning closure with explicit options. Runs
    /// immediately unless `options.lazy` is set.
    pub fn with_options(
        f: impl Fn() -> Value + Send + Sync + 'static,
        options: EffectOptions,
    ) -> Self {
        let effect = Self {
            inner: Arc::new(EffectInner {
                id: EffectId::next(),
                active: AtomicBool::new(true),
                computed: options.computed,
                raw: Box::new(f),
                scheduler: options.scheduler,
                on_track: options.on_track,
                on_trigger: options.on_trigger,
                on_stop: options.on_stop,
                deps: RwLock::new(Vec::new()),
                runs: AtomicU64::new(0),
            }),
        };

        if !options.lazy {
            effect.run();
        }

        effect
    }

    pub(crate) fn from_inner(inner: Arc<EffectInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> Weak<EffectInner> {
        Arc::downgrade(&self.inner)
    }

    pub(crate) fn inner(&self) -> &EffectInner {
        &self.inner
    }

    /// Get the effect's unique ID.
    pub fn id(&self) -> EffectId {
        self.inner.id
    }

    /// Whether the effect is in the computed priority class.
    pub fn is_computed(&self) -> bool {
        self.inner.computed
    }

    /// Whether the effect has not been stopped.
    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::SeqCst)
    }

    /// How many times the raw function has been invoked, pass-throughs
    /// included.
    pub fn run_count(&self) -> u64 {
        self.inner.runs.load(Ordering::SeqCst)
    }

    /// How many dep sets currently list this effect.
    pub fn dep_count(&self) -> usize {
        self.inner
            .deps
            .read()
            .expect("effect deps lock poisoned")
            .len()
    }

    /// Run the effect once. See the module docs for the full protocol.
    pub fn run(&self) -> Value {
        self.inner.runs.fetch_add(1, Ordering::Relaxed);

        if !self.is_active() {
            return (self.inner.raw)();
        }

        // Re-entrant invocation: an effect triggered by its own write runs
        // the raw function without a new tracking frame.
        if context::is_running(self.inner.id) {
            return (self.inner.raw)();
        }

        self.cleanup();
        let _scope = context::ScopeGuard::enter(self.inner.id, self.downgrade());
        (self.inner.raw)()
    }

    /// Remove this effect from every dep that lists it.
    fn cleanup(&self) {
        let deps: Vec<Dep> = {
            let mut guard = self.inner.deps.write().expect("effect deps lock poisoned");
            guard.drain(..).collect()
        };
        for dep in deps {
            dep.remove(self.inner.id);
        }
    }

    /// Stop the effect: detach it from every dep, invoke `on_stop`, and
    /// mark it inactive. Subsequent `run` calls are untracked
    /// pass-throughs.
    pub fn stop(&self) {
        if self.inner.active.swap(false, Ordering::SeqCst) {
            self.cleanup();
            if let Some(hook) = &self.inner.on_stop {
                hook();
            }
        }
    }
}

impl PartialEq for Effect {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.id().raw())
            .field("active", &self.is_active())
            .field("computed", &self.is_computed())
            .field("run_count", &self.run_count())
            .field("dep_count", &self.dep_count())
            .finish()
    }
}
