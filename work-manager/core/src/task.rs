// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use crate::TaskError;
use std::panic::{self, AssertUnwindSafe};

/// A unit of work that eventually yields a value or a failure
pub trait Task: Send + 'static {
    type Output: Clone + Send + Sync + 'static;

    fn run(self) -> Result<Self::Output, TaskError>;
}

impl<F, T> Task for F
where
    F: FnOnce() -> Result<T, TaskError> + Send + 'static,
    T: Clone + Send + Sync + 'static,
{
    type Output = T;

    fn run(self) -> Result<T, TaskError> {
        self()
    }
}

/// Type-erased closure task, for managers that accept heterogeneous closures
pub type BoxedTask<T> = Box<dyn FnOnce() -> Result<T, TaskError> + Send>;

/// Runs a task, turning a panic into `TaskError::Panicked`
pub fn execute<K: Task>(task: K) -> Result<K::Output, TaskError> {
    panic::catch_unwind(AssertUnwindSafe(|| task.run()))
        .unwrap_or_else(|payload| Err(TaskError::from_panic(payload)))
}
