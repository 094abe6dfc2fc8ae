// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use crate::TaskError;
use std::time::Duration;

/// Outcome of a bounded wait that did not yield a value
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WaitError {
    /// The awaited task completed with a failure
    #[error(transparent)]
    Task(#[from] TaskError),

    /// The deadline passed first. The awaited futures are left untouched.
    #[error("timed out after {0:?}")]
    TimedOut(Duration),
}

impl WaitError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, WaitError::TimedOut(_))
    }
}
