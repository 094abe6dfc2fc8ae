// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use crate::{execute, Task, TaskError, TaskFuture, TaskId};
use tracing::debug;

/// A submitted task paired with the future its outcome resolves
pub struct PendingTask<K: Task> {
    task: K,
    future: TaskFuture<K::Output>,
}

impl<K: Task> PendingTask<K> {
    pub fn new(task: K, future: TaskFuture<K::Output>) -> Self {
        Self { task, future }
    }

    pub fn task_id(&self) -> TaskId {
        self.future.task_id()
    }

    /// Runs the task on the current thread and completes the future
    pub fn run(self) {
        let task_id = self.task_id();
        debug!(%task_id, "running task");
        let outcome = execute(self.task);
        if let Err(error) = &outcome {
            debug!(%task_id, %error, "task failed");
        }
        self.future.set_outcome(outcome);
    }

    /// Resolves the future with `TaskError::Cancelled` without running the task
    pub fn cancel(self, reason: &str) {
        debug!(task_id = %self.task_id(), reason, "cancelling task");
        self.future.set_failure(TaskError::Cancelled(reason.to_string()));
    }

    pub fn into_parts(self) -> (K, TaskFuture<K::Output>) {
        (self.task, self.future)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_completes_future() {
        let future = TaskFuture::new();
        PendingTask::new(|| Ok::<_, TaskError>(5), future.clone()).run();
        assert_eq!(future.get_result(), Ok(5));
    }

    #[test]
    fn test_cancel_fails_future() {
        let future = TaskFuture::new();
        PendingTask::new(|| Ok::<_, TaskError>(5), future.clone()).cancel("shutting down");
        assert_eq!(
            future.get_result(),
            Err(TaskError::Cancelled("shutting down".to_string()))
        );
    }
}
