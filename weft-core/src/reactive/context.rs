//! Tracking context.
//!
//! The context answers one question for the track engine: which effect is
//! currently collecting reads? It is a thread-local stack — the top entry
//! is the current effect, and nested effect runs (an effect that reads a
//! computed, whose runner is itself an effect) push and pop around their
//! run.
//!
//! Two thread-local switches live alongside the stack:
//!
//! - the tracking flag, flipped by [`pause_tracking`] / [`resume_tracking`]
//!   and consulted by `track` (triggers are unaffected — writes during a
//!   paused window still fire their consequences);
//! - the readonly lock, which decides whether a write through a readonly
//!   view is demoted to a warning or forwarded to the mutable path.
//!
//! All three are per-thread, so every test thread is an independent
//! reactivity context.

use std::cell::{Cell, RefCell};
use std::sync::Weak;

use super::effect::{EffectId, EffectInner};

struct ScopeEntry {
    id: EffectId,
    effect: Weak<EffectInner>,
}

thread_local! {
    static ACTIVE_STACK: RefCell<Vec<ScopeEntry>> = RefCell::new(Vec::new());
    static TRACKING: Cell<bool> = Cell::new(true);
    static READONLY_LOCKED: Cell<bool> = Cell::new(true);
}

/// Guard that pops the active-effect stack when dropped.
///
/// The pop runs even if the effect's function panics, so a failed run
/// never leaves the stack misaligned.
pub(crate) struct ScopeGuard {
    id: EffectId,
}

impl ScopeGuard {
    /// Push an effect onto the active stack for the duration of one run.
    pub(crate) fn enter(id: EffectId, effect: Weak<EffectInner>) -> Self {
        ACTIVE_STACK.with(|stack| {
            stack.borrow_mut().push(ScopeEntry { id, effect });
        });
        Self { id }
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        ACTIVE_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();

            // Catch mismatched enter/exit pairs early.
            if let Some(entry) = popped {
                debug_assert_eq!(
                    entry.id, self.id,
                    "active-effect stack mismatch: expected {:?}, got {:?}",
                    self.id, entry.id
                );
            }
        });
    }
}

/// The effect currently collecting reads, if any.
pub(crate) fn current() -> Option<(EffectId, Weak<EffectInner>)> {
    ACTIVE_STACK.with(|stack| {
        stack
            .borrow()
            .last()
            .map(|entry| (entry.id, entry.effect.clone()))
    })
}

/// Whether the given effect is anywhere on the active stack. Used by the
/// run protocol to turn re-entrant invocations into non-tracking
/// pass-throughs.
pub(crate) fn is_running(id: EffectId) -> bool {
    ACTIVE_STACK.with(|stack| stack.borrow().iter().any(|entry| entry.id == id))
}

/// Whether reads are currently being tracked.
pub(crate) fn is_tracking() -> bool {
    TRACKING.with(|flag| flag.get())
}

/// Stop recording dependencies on this thread until
/// [`resume_tracking`] is called. Triggers still fire.
pub fn pause_tracking() {
    TRACKING.with(|flag| flag.set(false));
}

/// Resume recording dependencies on this thread.
pub fn resume_tracking() {
    TRACKING.with(|flag| flag.set(true));
}

/// Run a closure with tracking paused, restoring the previous tracking
/// state afterwards (unlike the bare pause/resume pair, this nests).
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    let previous = TRACKING.with(|flag| flag.replace(false));
    let result = f();
    TRACKING.with(|flag| flag.set(previous));
    result
}

/// Whether readonly views currently reject writes.
pub fn is_readonly_locked() -> bool {
    READONLY_LOCKED.with(|flag| flag.get())
}

/// Engage the readonly lock: writes through readonly views warn and do
/// nothing. This is the default state.
pub fn lock_readonly() {
    READONLY_LOCKED.with(|flag| flag.set(true));
}

/// Disengage the readonly lock: writes through readonly views forward to
/// the mutable implementation.
pub fn unlock_readonly() {
    READONLY_LOCKED.with(|flag| flag.set(false));
}
