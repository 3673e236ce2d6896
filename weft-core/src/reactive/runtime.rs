//! Track/trigger engine.
//!
//! `track` records "the current effect read `(target, key)`" in the
//! dependency registry; `trigger` looks up everything that read a mutated
//! `(target, key)` and fires it.
//!
//! # Trigger fan-out
//!
//! One trigger collects from up to three places:
//!
//! - the dep at the mutated key;
//! - on ADD and DELETE, the dep at the shape sentinel — the key set
//!   changed, so effects that enumerated the container (and, for lists,
//!   effects that read `length`) must re-check;
//! - on CLEAR, every dep of the target.
//!
//! The collected effects are partitioned into the computed class and the
//! ordinary class, and the computed class fires first. A computed's
//! scheduler only flips its dirty flag, so by the time any ordinary
//! effect re-runs and reads through a computed, the computed knows it is
//! stale and re-evaluates — consumers never observe a cached value from
//! before the trigger.

use crate::value::{Key, Target, TargetId, Value};

use super::context;
use super::dep::{self, Dep};
use super::effect::{Effect, EffectId, ObserverEvent};
use super::operation::OperationKind;
use super::reference::Ref;

/// The raw thing an operation touched: a compound container or a
/// single-slot ref cell. Both occupy the same identity space in the
/// dependency table.
#[derive(Clone, Debug)]
pub enum Source {
    /// A compound container.
    Container(Target),
    /// A ref cell.
    Cell(Ref),
}

impl Source {
    /// Identity of the underlying target or cell.
    pub fn id(&self) -> TargetId {
        match self {
            Source::Container(target) => target.id(),
            Source::Cell(cell) => cell.id(),
        }
    }

    /// Whether the source is an ordered sequence (whose shape sentinel is
    /// the `"length"` pseudo-key in addition to the iterate sentinel).
    fn is_list(&self) -> bool {
        match self {
            Source::Container(target) => target.kind().is_list(),
            Source::Cell(_) => false,
        }
    }

    /// The container, if the source is one.
    pub fn as_container(&self) -> Option<&Target> {
        match self {
            Source::Container(target) => Some(target),
            Source::Cell(_) => None,
        }
    }

    /// The ref cell, if the source is one.
    pub fn as_cell(&self) -> Option<&Ref> {
        match self {
            Source::Container(_) => None,
            Source::Cell(cell) => Some(cell),
        }
    }
}

impl From<&Target> for Source {
    fn from(target: &Target) -> Self {
        Source::Container(target.clone())
    }
}

impl From<&Ref> for Source {
    fn from(cell: &Ref) -> Self {
        Source::Cell(cell.clone())
    }
}

/// Extra payload forwarded to `on_trigger` observers.
#[derive(Default)]
pub(crate) struct TriggerInfo {
    pub(crate) old_value: Option<Value>,
    pub(crate) new_value: Option<Value>,
    pub(crate) old_target: Option<Target>,
}

/// Record that the current effect read `(source, key)`.
///
/// No-op when tracking is paused or no effect is running. ITERATE
/// operations substitute the iterate sentinel for the key. The effect is
/// added to the dep and the dep to the effect, keeping the two sides of
/// the registry symmetric; `on_track` fires only when the link is new.
pub(crate) fn track(source: &Source, op: OperationKind, key: Key) {
    if !context::is_tracking() {
        return;
    }
    let (id, weak) = match context::current() {
        Some(top) => top,
        None => return,
    };
    let inner = match weak.upgrade() {
        Some(inner) => inner,
        None => return,
    };

    let key = if op == OperationKind::Iterate {
        Key::Iterate
    } else {
        key
    };

    let dep = dep::dep_for(source.id(), key.clone());
    if dep.insert(id, weak) {
        inner.push_dep(dep);

        if let Some(hook) = &inner.on_track {
            let event = ObserverEvent {
                effect: Effect::from_inner(inner.clone()),
                target: source.clone(),
                op,
                key: Some(key),
                old_value: None,
                new_value: None,
                old_target: None,
            };
            hook(&event);
        }
    }
}

/// Fire everything that depends on a mutation of `(source, key)`.
///
/// Collects the relevant dep sets (see the module docs for which),
/// partitions members into computed runners and ordinary effects, and
/// fires the computed class first. Effects with a scheduler get the
/// scheduler call instead of a direct re-run.
pub(crate) fn trigger(source: &Source, op: OperationKind, key: Option<Key>, info: TriggerInfo) {
    let target_id = source.id();

    let mut seen: Vec<EffectId> = Vec::new();
    let mut computed_runners: Vec<Effect> = Vec::new();
    let mut ordinary: Vec<Effect> = Vec::new();

    if op == OperationKind::Clear {
        // Everything that read any part of this target must re-check.
        for dep in dep::all_deps(target_id) {
            add_runners(&dep, &mut seen, &mut computed_runners, &mut ordinary);
        }
    } else {
        if let Some(key) = &key {
            if let Some(dep) = dep::existing_dep(target_id, key) {
                add_runners(&dep, &mut seen, &mut computed_runners, &mut ordinary);
            }
        }

        // ADD and DELETE change the key set, so shape observers fire too
        // (CLEAR, the third shape changer, took the branch above).
        if op.changes_shape() {
            if let Some(dep) = dep::existing_dep(target_id, &Key::Iterate) {
                add_runners(&dep, &mut seen, &mut computed_runners, &mut ordinary);
            }
            if source.is_list() {
                if let Some(dep) = dep::existing_dep(target_id, &Key::length()) {
                    add_runners(&dep, &mut seen, &mut computed_runners, &mut ordinary);
                }
            }
        }
    }

    // Computed runners invalidate themselves before any consumer runs.
    for effect in &computed_runners {
        run_effect(effect, source, op, &key, &info);
    }
    for effect in &ordinary {
        run_effect(effect, source, op, &key, &info);
    }
}

fn add_runners(
    dep: &Dep,
    seen: &mut Vec<EffectId>,
    computed_runners: &mut Vec<Effect>,
    ordinary: &mut Vec<Effect>,
) {
    for effect in dep.effects() {
        if seen.contains(&effect.id()) {
            continue;
        }
        seen.push(effect.id());
        if effect.is_computed() {
            computed_runners.push(effect);
        } else {
            ordinary.push(effect);
        }
    }
}

fn run_effect(
    effect: &Effect,
    source: &Source,
    op: OperationKind,
    key: &Option<Key>,
    info: &TriggerInfo,
) {
    if let Some(hook) = &effect.inner().on_trigger {
        let event = ObserverEvent {
            effect: effect.clone(),
            target: source.clone(),
            op,
            key: key.clone(),
            old_value: info.old_value.clone(),
            new_value: info.new_value.clone(),
            old_target: info.old_target.clone(),
        };
        hook(&event);
    }

    let scheduler = effect.inner().scheduler.clone();
    match scheduler {
        Some(scheduler) => scheduler(effect),
        None => {
            effect.run();
        }
    }
}
