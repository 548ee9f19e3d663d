//! Caller-supplied deadlines.
//!
//! None of the core operations are long-running; a deadline is simply
//! checked before mutation. An exceeded deadline aborts the operation with
//! `DeadlineExceeded` and leaves all state unchanged.

use std::time::{Duration, Instant};

use divvy_core::error::EngineError;

/// A point in time after which an operation must not start mutating.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Deadline(Instant);

impl Deadline {
    pub fn at(instant: Instant) -> Self {
        Self(instant)
    }

    /// A deadline `timeout` from now.
    pub fn within(timeout: Duration) -> Self {
        Self(Instant::now() + timeout)
    }

    pub fn expired(&self) -> bool {
        Instant::now() >= self.0
    }
}

/// Abort with `DeadlineExceeded` if the (optional) deadline has passed.
pub(crate) fn check(deadline: Option<Deadline>) -> Result<(), EngineError> {
    match deadline {
        Some(d) if d.expired() => Err(EngineError::DeadlineExceeded),
        _ => Ok(()),
    }
}
