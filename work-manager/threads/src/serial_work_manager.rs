// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use tracing::info;
use work_manager_core::{
    Lifecycle, PendingTask, Task, TaskFuture, WorkManager, WorkManagerError, WorkManagerMode,
};

/// Runs every task inline on the submitting thread.
///
/// Futures returned by `submit` are already done.
#[derive(Debug, Default)]
pub struct SerialWorkManager {
    lifecycle: Lifecycle,
}

impl SerialWorkManager {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<K: Task> WorkManager<K> for SerialWorkManager {
    fn startup(&mut self) -> Result<WorkManagerMode, WorkManagerError> {
        let mode = self.lifecycle.start(WorkManagerMode::Master)?;
        info!("serial work manager started");
        Ok(mode)
    }

    fn shutdown(&mut self, exit_code: i32) {
        if self.lifecycle.mark_shutdown() {
            info!(exit_code, "serial work manager shut down");
        }
    }

    fn mode(&self) -> Option<WorkManagerMode> {
        self.lifecycle.mode()
    }

    fn submit(&self, task: K) -> Result<TaskFuture<K::Output>, WorkManagerError> {
        self.lifecycle.ensure_master()?;
        let future = TaskFuture::new();
        PendingTask::new(task, future.clone()).run();
        Ok(future)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use work_manager_core::{BoxedTask, TaskError};

    #[test]
    fn test_submit_returns_done_future() {
        let mut manager = SerialWorkManager::new();
        assert_eq!(
            WorkManager::<BoxedTask<u32>>::startup(&mut manager).unwrap(),
            WorkManagerMode::Master
        );

        let task: BoxedTask<u32> = Box::new(|| Ok(6 * 7));
        let future = manager.submit(task).unwrap();
        assert!(future.is_done());
        assert_eq!(future.get_result(), Ok(42));
    }

    #[test]
    fn test_failure_and_panic_are_captured() {
        let mut manager = SerialWorkManager::new();
        WorkManager::<BoxedTask<u32>>::startup(&mut manager).unwrap();

        let failing: BoxedTask<u32> = Box::new(|| Err(TaskError::failed("boom")));
        let panicking: BoxedTask<u32> =
            Box::new(|| -> Result<u32, TaskError> { panic!("kaboom") });
        let futures = manager.submit_many([failing, panicking]).unwrap();

        assert_eq!(futures[0].get_result(), Err(TaskError::failed("boom")));
        assert_eq!(
            futures[1].get_result(),
            Err(TaskError::Panicked("kaboom".to_string()))
        );
    }

    #[test]
    fn test_submit_requires_startup_and_rejects_after_shutdown() {
        let mut manager = SerialWorkManager::new();
        let task: BoxedTask<u32> = Box::new(|| Ok(1));
        assert!(matches!(
            manager.submit(task),
            Err(WorkManagerError::NotStarted)
        ));

        WorkManager::<BoxedTask<u32>>::startup(&mut manager).unwrap();
        WorkManager::<BoxedTask<u32>>::shutdown(&mut manager, 0);
        let task: BoxedTask<u32> = Box::new(|| Ok(1));
        assert!(matches!(manager.submit(task), Err(WorkManagerError::ShutDown)));
    }
}
