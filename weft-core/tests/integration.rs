//! Integration tests for the reactive engine.
//!
//! These exercise the public surface end to end: observed views, effects,
//! refs, computeds, the readonly lock, and the interplay between them.

use std::sync::atomic::{AtomicI32, AtomicI64, Ordering};
use std::sync::{Arc, RwLock};

use weft_core::reactive::{
    computed, computed_writable, is_reactive, is_readonly, lock_readonly, mark_non_reactive,
    mark_readonly, pause_tracking, reactive, readonly, resume_tracking, to_raw, to_refs,
    unlock_readonly, untracked, Effect, EffectOptions, Observed, OperationKind, Ref,
};
use weft_core::value::{Key, Target, Value};

fn observe(target: Target) -> Observed {
    match reactive(Value::Target(target)) {
        Value::Observed(view) => view,
        other => panic!("expected an observed view, got {other:?}"),
    }
}

fn observe_readonly(target: Target) -> Observed {
    match readonly(Value::Target(target)) {
        Value::Observed(view) => view,
        other => panic!("expected an observed view, got {other:?}"),
    }
}

/// Plain tracking: an effect re-runs when a key it read is written, and
/// stops re-running after `stop`.
#[test]
fn plain_tracking_and_stop() {
    let state = observe(Target::object_with(vec![(Key::from("n"), Value::Int(1))]));
    let seen = Arc::new(AtomicI64::new(0));

    let seen_clone = seen.clone();
    let state_clone = state.clone();
    let effect = Effect::new(move || {
        seen_clone.store(
            state_clone.get("n").unwrap().as_int().unwrap_or(-1),
            Ordering::SeqCst,
        );
    });

    assert_eq!(seen.load(Ordering::SeqCst), 1);

    state.set("n", 2).unwrap();
    assert_eq!(seen.load(Ordering::SeqCst), 2);

    effect.stop();
    assert_eq!(effect.dep_count(), 0);

    state.set("n", 3).unwrap();
    assert_eq!(seen.load(Ordering::SeqCst), 2);
}

/// Iteration tracking on a key-value container: size observers fire on
/// add, delete, and clear.
#[test]
fn map_size_follows_mutations() {
    let map = observe(Target::map());
    let count = Arc::new(AtomicI64::new(-1));

    let count_clone = count.clone();
    let map_clone = map.clone();
    let _effect = Effect::new(move || {
        count_clone.store(map_clone.len().unwrap() as i64, Ordering::SeqCst);
    });

    assert_eq!(count.load(Ordering::SeqCst), 0);

    map.set("a", 1).unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 1);

    map.delete("a").unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 0);

    map.set("x", 1).unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 1);
    map.clear().unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 0);
}

/// With the readonly lock engaged (the default), writes through a
/// readonly view neither mutate nor trigger.
#[test]
fn readonly_lock_blocks_writes() {
    lock_readonly();
    let target = Target::object_with(vec![(Key::from("a"), Value::Int(1))]);
    let view = observe_readonly(target);

    let runs = Arc::new(AtomicI32::new(0));
    let runs_clone = runs.clone();
    let view_clone = view.clone();
    let _effect = Effect::new(move || {
        runs_clone.fetch_add(1, Ordering::SeqCst);
        view_clone.get("a").unwrap();
    });

    assert_eq!(runs.load(Ordering::SeqCst), 1);

    view.set("a", 2).unwrap();
    assert_eq!(view.get("a").unwrap(), Value::Int(1));
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    assert!(!view.delete("a").unwrap());
    assert!(view.has("a").unwrap());
}

/// With the lock disengaged, readonly views forward writes to the mutable
/// implementation: state changes and effects fire.
#[test]
fn readonly_unlock_forwards_writes() {
    let view = observe_readonly(Target::object_with(vec![(Key::from("a"), Value::Int(1))]));

    let seen = Arc::new(AtomicI64::new(0));
    let seen_clone = seen.clone();
    let view_clone = view.clone();
    let _effect = Effect::new(move || {
        seen_clone.store(
            view_clone.get("a").unwrap().as_int().unwrap_or(-1),
            Ordering::SeqCst,
        );
    });

    unlock_readonly();
    view.set("a", 2).unwrap();
    lock_readonly();

    assert_eq!(view.get("a").unwrap(), Value::Int(2));
    assert_eq!(seen.load(Ordering::SeqCst), 2);
}

/// Computed chain: a mutation deep under two computeds reaches the outer
/// effect, and the inner computed is re-evaluated before the effect
/// completes.
#[test]
fn computed_chain_stays_fresh() {
    let state = observe(Target::object_with(vec![(Key::from("x"), Value::Int(1))]));

    let state_clone = state.clone();
    let c1 = computed(move || {
        Value::Int(state_clone.get("x").unwrap().as_int().unwrap_or(0) + 1)
    });

    let c1_clone = c1.clone();
    let c2 = computed(move || Value::Int(c1_clone.value().as_int().unwrap_or(0) * 10));

    let out = Arc::new(AtomicI64::new(0));
    let out_clone = out.clone();
    let c2_clone = c2.clone();
    let _effect = Effect::new(move || {
        out_clone.store(c2_clone.value().as_int().unwrap_or(-1), Ordering::SeqCst);
    });

    assert_eq!(out.load(Ordering::SeqCst), 20);

    state.set("x", 4).unwrap();
    assert_eq!(out.load(Ordering::SeqCst), 50);
    assert!(!c1.is_dirty());
    assert!(!c2.is_dirty());
}

/// Ref unwrap on read and ref forward on write: reading a ref-valued key
/// yields the cell's value; overwriting it with a non-ref goes into the
/// cell and leaves the outer key holding the ref.
#[test]
fn ref_unwrap_and_forward() {
    let cell = Ref::new(1);
    let target = Target::object_with(vec![(Key::from("r"), Value::Ref(cell.clone()))]);
    let record = observe(target.clone());

    let seen = Arc::new(AtomicI64::new(0));
    let seen_clone = seen.clone();
    let record_clone = record.clone();
    let _effect = Effect::new(move || {
        seen_clone.store(
            record_clone.get("r").unwrap().as_int().unwrap_or(-1),
            Ordering::SeqCst,
        );
    });

    assert_eq!(seen.load(Ordering::SeqCst), 1);

    record.set("r", 5).unwrap();
    assert_eq!(cell.get(), Value::Int(5));
    assert_eq!(seen.load(Ordering::SeqCst), 5);

    // The outer key still holds the ref itself.
    assert!(matches!(target.raw_get(&Key::from("r")), Some(Value::Ref(_))));

    // A ref written over a ref replaces the outer key.
    let replacement = Ref::new(9);
    record.set("r", Value::Ref(replacement.clone())).unwrap();
    match target.raw_get(&Key::from("r")) {
        Some(Value::Ref(now)) => assert!(now.ptr_eq(&replacement)),
        other => panic!("expected the replacement ref, got {other:?}"),
    }
}

/// Self-write guard: an effect that writes a key it reads does not
/// recurse unboundedly.
#[test]
fn self_write_terminates() {
    let state = observe(Target::object_with(vec![(Key::from("n"), Value::Int(0))]));
    let runs = Arc::new(AtomicI32::new(0));

    let runs_clone = runs.clone();
    let state_clone = state.clone();
    let _effect = Effect::new(move || {
        runs_clone.fetch_add(1, Ordering::SeqCst);
        let n = state_clone.get("n").unwrap().as_int().unwrap_or(0);
        if n < 1 {
            state_clone.set("n", 1).unwrap();
        }
    });

    let after_creation = runs.load(Ordering::SeqCst);
    assert!(
        (1..=2).contains(&after_creation),
        "expected 1 or 2 runs, got {after_creation}"
    );
    assert_eq!(state.get("n").unwrap(), Value::Int(1));
}

/// Registry identities: memoization up to handle equality, raw
/// resolution, and the opt-out marks.
#[test]
fn registry_identities() {
    let target = Target::object();

    let p1 = reactive(Value::Target(target.clone()));
    let p2 = reactive(Value::Target(target.clone()));
    assert_eq!(p1, p2);
    assert!(is_reactive(&p1));
    assert_eq!(to_raw(p1.clone()), Value::Target(target.clone()));

    let ro = readonly(p1.clone());
    assert!(is_readonly(&ro));
    assert_eq!(to_raw(ro), Value::Target(target));

    let opted_out = Target::object();
    let raw = mark_non_reactive(Value::Target(opted_out.clone()));
    assert_eq!(reactive(raw), Value::Target(opted_out));

    let pre_marked = Target::object();
    mark_readonly(Value::Target(pre_marked.clone()));
    assert!(is_readonly(&reactive(Value::Target(pre_marked))));
}

/// ADD and DELETE on a list fire both iteration observers and `"length"`
/// observers.
#[test]
fn list_shape_observers() {
    let list = observe(Target::list());
    let length_runs = Arc::new(AtomicI32::new(0));
    let keys_runs = Arc::new(AtomicI32::new(0));

    let length_clone = length_runs.clone();
    let list_clone = list.clone();
    let _length_effect = Effect::new(move || {
        length_clone.fetch_add(1, Ordering::SeqCst);
        list_clone.len().unwrap();
    });

    let keys_clone = keys_runs.clone();
    let list_clone = list.clone();
    let _keys_effect = Effect::new(move || {
        keys_clone.fetch_add(1, Ordering::SeqCst);
        list_clone.keys().unwrap();
    });

    list.push("first").unwrap();
    assert_eq!(length_runs.load(Ordering::SeqCst), 2);
    assert_eq!(keys_runs.load(Ordering::SeqCst), 2);

    // In-place overwrite is not a shape change.
    list.set(0, "again").unwrap();
    assert_eq!(length_runs.load(Ordering::SeqCst), 2);
    assert_eq!(keys_runs.load(Ordering::SeqCst), 2);

    list.delete(0).unwrap();
    assert_eq!(length_runs.load(Ordering::SeqCst), 3);
    assert_eq!(keys_runs.load(Ordering::SeqCst), 3);
}

/// CLEAR reaches every effect that read any key of the container.
#[test]
fn clear_reaches_all_readers() {
    let map = observe(Target::map_with(vec![
        (Key::from("a"), Value::Int(1)),
        (Key::from("b"), Value::Int(2)),
    ]));

    let a_runs = Arc::new(AtomicI32::new(0));
    let b_runs = Arc::new(AtomicI32::new(0));

    let a_clone = a_runs.clone();
    let map_clone = map.clone();
    let _a_effect = Effect::new(move || {
        a_clone.fetch_add(1, Ordering::SeqCst);
        map_clone.get("a").unwrap();
    });

    let b_clone = b_runs.clone();
    let map_clone = map.clone();
    let _b_effect = Effect::new(move || {
        b_clone.fetch_add(1, Ordering::SeqCst);
        map_clone.get("b").unwrap();
    });

    map.clear().unwrap();
    assert_eq!(a_runs.load(Ordering::SeqCst), 2);
    assert_eq!(b_runs.load(Ordering::SeqCst), 2);
}

/// Writes during a paused-tracking window still trigger; reads during it
/// record nothing.
#[test]
fn pause_affects_tracking_not_triggering() {
    let state = observe(Target::object_with(vec![
        (Key::from("tracked"), Value::Int(0)),
        (Key::from("ignored"), Value::Int(0)),
    ]));
    let runs = Arc::new(AtomicI32::new(0));

    let runs_clone = runs.clone();
    let state_clone = state.clone();
    let _effect = Effect::new(move || {
        runs_clone.fetch_add(1, Ordering::SeqCst);
        state_clone.get("tracked").unwrap();
        pause_tracking();
        state_clone.get("ignored").unwrap();
        resume_tracking();
    });

    assert_eq!(runs.load(Ordering::SeqCst), 1);

    // The untracked read left no dep behind.
    state.set("ignored", 1).unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    // A write while paused still fires its consequences.
    pause_tracking();
    state.set("tracked", 1).unwrap();
    resume_tracking();
    assert_eq!(runs.load(Ordering::SeqCst), 2);
}

/// `untracked` is the scoped form of pause/resume.
#[test]
fn untracked_scopes_reads() {
    let state = observe(Target::object_with(vec![(Key::from("n"), Value::Int(0))]));
    let runs = Arc::new(AtomicI32::new(0));

    let runs_clone = runs.clone();
    let state_clone = state.clone();
    let effect = Effect::new(move || {
        runs_clone.fetch_add(1, Ordering::SeqCst);
        untracked(|| state_clone.get("n").unwrap());
    });

    assert_eq!(effect.dep_count(), 0);
    state.set("n", 1).unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

/// A user scheduler replaces direct re-runs and receives the runner.
#[test]
fn scheduler_defers_re_runs() {
    let state = observe(Target::object_with(vec![(Key::from("n"), Value::Int(0))]));
    let queue: Arc<RwLock<Vec<Effect>>> = Arc::new(RwLock::new(Vec::new()));
    let seen = Arc::new(AtomicI64::new(-1));

    let seen_clone = seen.clone();
    let state_clone = state.clone();
    let queue_clone = queue.clone();
    let _effect = Effect::with_options(
        move || {
            seen_clone.store(
                state_clone.get("n").unwrap().as_int().unwrap_or(-1),
                Ordering::SeqCst,
            );
            Value::Null
        },
        EffectOptions {
            scheduler: Some(Arc::new(move |runner| {
                queue_clone.write().unwrap().push(runner.clone());
            })),
            ..Default::default()
        },
    );

    assert_eq!(seen.load(Ordering::SeqCst), 0);

    state.set("n", 7).unwrap();
    // Deferred: nothing re-ran yet.
    assert_eq!(seen.load(Ordering::SeqCst), 0);

    let queued: Vec<Effect> = queue.write().unwrap().drain(..).collect();
    assert_eq!(queued.len(), 1);
    for runner in queued {
        runner.run();
    }
    assert_eq!(seen.load(Ordering::SeqCst), 7);
}

/// Observer hooks see the link being formed and the mutation payload.
#[test]
fn observer_hooks_fire() {
    let state = observe(Target::object_with(vec![(Key::from("n"), Value::Int(1))]));

    let tracks: Arc<RwLock<Vec<(OperationKind, Option<Key>)>>> =
        Arc::new(RwLock::new(Vec::new()));
    let triggers: Arc<RwLock<Vec<(OperationKind, Option<Value>, Option<Value>)>>> =
        Arc::new(RwLock::new(Vec::new()));

    let tracks_clone = tracks.clone();
    let triggers_clone = triggers.clone();
    let state_clone = state.clone();
    let _effect = Effect::with_options(
        move || {
            state_clone.get("n").unwrap();
            Value::Null
        },
        EffectOptions {
            on_track: Some(Arc::new(move |event| {
                tracks_clone
                    .write()
                    .unwrap()
                    .push((event.op, event.key.clone()));
            })),
            on_trigger: Some(Arc::new(move |event| {
                triggers_clone.write().unwrap().push((
                    event.op,
                    event.old_value.clone(),
                    event.new_value.clone(),
                ));
            })),
            ..Default::default()
        },
    );

    assert_eq!(
        *tracks.read().unwrap(),
        vec![(OperationKind::Get, Some(Key::from("n")))]
    );

    state.set("n", 2).unwrap();
    assert_eq!(
        *triggers.read().unwrap(),
        vec![(
            OperationKind::Set,
            Some(Value::Int(1)),
            Some(Value::Int(2))
        )]
    );
}

/// `to_refs` projects fields into link refs that stay wired to the
/// record.
#[test]
fn to_refs_projection() {
    let record = observe(Target::object_with(vec![
        (Key::from("a"), Value::Int(1)),
        (Key::from("b"), Value::Int(2)),
    ]));

    let refs = to_refs(&record).unwrap();
    assert_eq!(refs.len(), 2);

    let seen = Arc::new(AtomicI64::new(0));
    let seen_clone = seen.clone();
    let record_clone = record.clone();
    let _effect = Effect::new(move || {
        seen_clone.store(
            record_clone.get("a").unwrap().as_int().unwrap_or(-1),
            Ordering::SeqCst,
        );
    });

    let (_, a) = &refs[0];
    a.set(10);
    assert_eq!(seen.load(Ordering::SeqCst), 10);
    assert_eq!(record.get("a").unwrap(), Value::Int(10));
}

/// A writable computed pushes writes back through its setter into the
/// sources, which invalidates it in turn.
#[test]
fn writable_computed_round_trip() {
    let state = observe(Target::object_with(vec![(Key::from("n"), Value::Int(3))]));

    let getter_state = state.clone();
    let setter_state = state.clone();
    let plus_one = computed_writable(
        move || Value::Int(getter_state.get("n").unwrap().as_int().unwrap_or(0) + 1),
        move |value| {
            setter_state
                .set("n", value.as_int().unwrap_or(0) - 1)
                .unwrap();
        },
    );

    assert_eq!(plus_one.value(), Value::Int(4));

    plus_one.set_value(10);
    assert_eq!(state.get("n").unwrap(), Value::Int(9));
    assert_eq!(plus_one.value(), Value::Int(10));
}

/// Nested observed children wrap lazily and propagate triggers from deep
/// mutations.
#[test]
fn deep_mutations_reach_effects() {
    let inner = Target::object_with(vec![(Key::from("leaf"), Value::Int(1))]);
    let outer = observe(Target::object_with(vec![(
        Key::from("inner"),
        Value::Target(inner),
    )]));

    let seen = Arc::new(AtomicI64::new(0));
    let seen_clone = seen.clone();
    let outer_clone = outer.clone();
    let _effect = Effect::new(move || {
        let child = outer_clone.get("inner").unwrap();
        let child = child.as_observed().expect("child wraps on read");
        seen_clone.store(
            child.get("leaf").unwrap().as_int().unwrap_or(-1),
            Ordering::SeqCst,
        );
    });

    assert_eq!(seen.load(Ordering::SeqCst), 1);

    // Mutate through a fresh wrap of the same raw child.
    let child = outer.get("inner").unwrap();
    child.as_observed().unwrap().set("leaf", 2).unwrap();
    assert_eq!(seen.load(Ordering::SeqCst), 2);
}

/// Readonly views of the same raw see mutations made through the mutable
/// view, and their readers re-run.
#[test]
fn readonly_views_share_the_raw() {
    let target = Target::object_with(vec![(Key::from("n"), Value::Int(1))]);
    let mutable = observe(target.clone());
    let ro = observe_readonly(target);

    let seen = Arc::new(AtomicI64::new(0));
    let seen_clone = seen.clone();
    let ro_clone = ro.clone();
    let _effect = Effect::new(move || {
        seen_clone.store(
            ro_clone.get("n").unwrap().as_int().unwrap_or(-1),
            Ordering::SeqCst,
        );
    });

    mutable.set("n", 5).unwrap();
    assert_eq!(seen.load(Ordering::SeqCst), 5);
}

/// Readonly views wrap children readonly, and the readonly lock protects
/// them too.
#[test]
fn readonly_wraps_children_readonly() {
    let inner = Target::object_with(vec![(Key::from("leaf"), Value::Int(1))]);
    let outer = observe_readonly(Target::object_with(vec![(
        Key::from("inner"),
        Value::Target(inner),
    )]));

    let child = outer.get("inner").unwrap();
    assert!(is_readonly(&child));

    lock_readonly();
    let child = child.as_observed().unwrap();
    child.set("leaf", 2).unwrap();
    assert_eq!(child.get("leaf").unwrap(), Value::Int(1));
}

/// An effect dropped without `stop` never fires again; one stopped twice
/// reports its stop hook once.
#[test]
fn effect_lifecycle_edges() {
    let state = observe(Target::object_with(vec![(Key::from("n"), Value::Int(0))]));
    let runs = Arc::new(AtomicI32::new(0));

    {
        let runs_clone = runs.clone();
        let state_clone = state.clone();
        let _dropped = Effect::new(move || {
            runs_clone.fetch_add(1, Ordering::SeqCst);
            state_clone.get("n").unwrap();
        });
    }

    state.set("n", 1).unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    let stops = Arc::new(AtomicI32::new(0));
    let stops_clone = stops.clone();
    let state_clone = state.clone();
    let effect = Effect::with_options(
        move || {
            state_clone.get("n").unwrap();
            Value::Null
        },
        EffectOptions {
            on_stop: Some(Arc::new(move || {
                stops_clone.fetch_add(1, Ordering::SeqCst);
            })),
            ..Default::default()
        },
    );

    effect.stop();
    effect.stop();
    assert_eq!(stops.load(Ordering::SeqCst), 1);
}

/// Per-run dep cleanup: a conditional read from an earlier run does not
/// keep triggering the effect once the condition flips away from it.
#[test]
fn stale_branch_deps_are_cleaned() {
    let state = observe(Target::object_with(vec![
        (Key::from("use_a"), Value::Bool(true)),
        (Key::from("a"), Value::Int(0)),
        (Key::from("b"), Value::Int(0)),
    ]));
    let runs = Arc::new(AtomicI32::new(0));

    let runs_clone = runs.clone();
    let state_clone = state.clone();
    let _effect = Effect::new(move || {
        runs_clone.fetch_add(1, Ordering::SeqCst);
        let use_a = state_clone
            .get("use_a")
            .unwrap()
            .as_bool()
            .unwrap_or(false);
        if use_a {
            state_clone.get("a").unwrap();
        } else {
            state_clone.get("b").unwrap();
        }
    });

    assert_eq!(runs.load(Ordering::SeqCst), 1);

    // Flip to the `b` branch.
    state.set("use_a", false).unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 2);

    // `a` is no longer a dependency.
    state.set("a", 99).unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 2);

    // `b` is.
    state.set("b", 1).unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 3);
}
