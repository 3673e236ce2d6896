//! Weft Core
//!
//! This crate implements a fine-grained reactivity engine: application
//! code expresses computations (effects) whose re-execution is scheduled
//! automatically when any data they previously read is later mutated.
//!
//! The engine is responsible for:
//!
//! - intercepting read/write/iteration/deletion operations on observed
//!   data through typed views;
//! - maintaining a bipartite dependency graph between data cells and
//!   effects;
//! - re-running the right effects — and only those — when data changes,
//!   with derived (computed) values invalidated before ordinary effects
//!   run.
//!
//! # Architecture
//!
//! The crate is organized into two modules:
//!
//! - `value`: the dynamic data model — [`Value`](value::Value),
//!   [`Key`](value::Key), and identity-bearing [`Target`](value::Target)
//!   containers
//! - `reactive`: observed views, the dependency registry, effects, refs,
//!   and computed cells
//!
//! # Example
//!
//! ```rust,ignore
//! use weft_core::reactive::{computed, reactive, Effect};
//! use weft_core::value::{Target, Value};
//!
//! // Observe a record.
//! let state = reactive(Target::object().into());
//! let state = state.as_observed().unwrap().clone();
//! state.set("n", 1).unwrap();
//!
//! // A derived value over it.
//! let state_for_computed = state.clone();
//! let doubled = computed(move || {
//!     Value::from(state_for_computed.get("n").unwrap().as_int().unwrap_or(0) * 2)
//! });
//!
//! // An effect that reads through the computed.
//! let effect = Effect::new(move || {
//!     println!("doubled: {:?}", doubled.value());
//! });
//!
//! // Mutating the record invalidates the computed and re-runs the effect.
//! state.set("n", 5).unwrap();
//! ```

pub mod error;
pub mod reactive;
pub mod value;

pub use error::Error;
