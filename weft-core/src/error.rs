//! Error types for the observation layer.
//!
//! The engine surfaces very few errors: reads of absent entries return
//! [`Value::Null`](crate::value::Value::Null) rather than failing, and
//! readonly violations are demoted to warnings. What remains fallible is
//! asking a container for an operation its kind does not support.

use crate::value::{Key, TargetKind, Value};

/// Errors produced by operations on observed containers.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// The operation exists on some container kinds, but not this one.
    #[error("operation `{op}` is not supported on {kind:?} targets")]
    UnsupportedOperation {
        /// Kind of the target the operation was attempted on.
        kind: TargetKind,
        /// Name of the rejected operation.
        op: &'static str,
    },

    /// Ordered sequences are indexed by non-negative integers and the
    /// `"length"` pseudo-key; any other key is rejected.
    #[error("invalid list key: {key:?}")]
    InvalidListKey {
        /// The offending key.
        key: Key,
    },

    /// `"length"` can only be assigned a non-negative integer.
    #[error("invalid list length: {value:?}")]
    InvalidLength {
        /// The offending value.
        value: Value,
    },

    /// Weak containers key by identity; primitives have none.
    #[error("weak containers require identity keys (targets or refs)")]
    InvalidWeakKey,
}
