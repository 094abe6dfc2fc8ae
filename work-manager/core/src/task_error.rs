// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use serde::{Deserialize, Serialize};
use std::any::Any;

/// Failure payload stored in a future by `set_failure`.
///
/// Cloneable and serializable so one failure can be handed to every reader
/// and shipped back from a remote worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum TaskError {
    /// The task ran and reported an error
    #[error("task failed: {0}")]
    Failed(String),

    /// The task panicked while running
    #[error("task panicked: {0}")]
    Panicked(String),

    /// The worker executing the task went away before reporting an outcome
    #[error("worker lost: {0}")]
    WorkerLost(String),

    /// The task was never run
    #[error("task cancelled: {0}")]
    Cancelled(String),
}

impl TaskError {
    pub fn failed(message: impl Into<String>) -> Self {
        TaskError::Failed(message.into())
    }

    /// Converts a payload caught by `catch_unwind` into a failure
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        TaskError::Panicked(panic_message(payload.as_ref()))
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
