// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use crate::ThreadConfig;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};
use work_manager_core::{
    Lifecycle, PendingTask, Task, TaskFuture, TaskQueue, WorkManager, WorkManagerError,
    WorkManagerMode,
};

/// Executes tasks on a fixed pool of local threads.
///
/// Tasks are queued in submission order and picked up by whichever thread
/// is free. A panicking task fails its own future and leaves the thread
/// running. Shutdown lets in-flight tasks finish and cancels queued ones.
pub struct ThreadWorkManager<K: Task> {
    config: ThreadConfig,
    lifecycle: Lifecycle,
    queue: Arc<TaskQueue<PendingTask<K>>>,
    workers: Vec<JoinHandle<()>>,
}

impl<K: Task> ThreadWorkManager<K> {
    pub fn new(config: ThreadConfig) -> Self {
        Self {
            config,
            lifecycle: Lifecycle::new(),
            queue: Arc::new(TaskQueue::new()),
            workers: Vec::new(),
        }
    }

    pub fn n_workers(&self) -> usize {
        self.config.n_workers
    }

    /// Tasks submitted but not yet picked up by a worker thread
    pub fn queued(&self) -> usize {
        self.queue.len()
    }
}

fn worker_loop<K: Task>(worker_id: usize, queue: Arc<TaskQueue<PendingTask<K>>>) {
    debug!(worker_id, "worker thread started");
    while let Some(pending) = queue.pop() {
        debug!(worker_id, task_id = %pending.task_id(), "picked up task");
        pending.run();
    }
    debug!(worker_id, "worker thread exiting");
}

impl<K: Task> WorkManager<K> for ThreadWorkManager<K> {
    fn startup(&mut self) -> Result<WorkManagerMode, WorkManagerError> {
        if self.config.n_workers == 0 {
            return Err(WorkManagerError::Config(
                "n_workers must be at least 1".to_string(),
            ));
        }
        let mode = self.lifecycle.start(WorkManagerMode::Master)?;

        for worker_id in 0..self.config.n_workers {
            let queue = Arc::clone(&self.queue);
            let handle = thread::Builder::new()
                .name(format!("{}-{}", self.config.thread_name, worker_id))
                .spawn(move || worker_loop(worker_id, queue))?;
            self.workers.push(handle);
        }

        info!(n_workers = self.config.n_workers, "thread work manager started");
        Ok(mode)
    }

    fn shutdown(&mut self, exit_code: i32) {
        if !self.lifecycle.mark_shutdown() {
            return;
        }

        let cancelled = self.queue.close();
        if !cancelled.is_empty() {
            warn!(count = cancelled.len(), "cancelling queued tasks");
        }
        for pending in cancelled {
            pending.cancel("work manager shut down");
        }

        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                warn!("worker thread panicked");
            }
        }
        info!(exit_code, "thread work manager shut down");
    }

    fn mode(&self) -> Option<WorkManagerMode> {
        self.lifecycle.mode()
    }

    fn submit(&self, task: K) -> Result<TaskFuture<K::Output>, WorkManagerError> {
        self.lifecycle.ensure_master()?;
        let future = TaskFuture::new();
        self.queue
            .push(PendingTask::new(task, future.clone()))
            .map_err(|_| WorkManagerError::ShutDown)?;
        Ok(future)
    }
}

impl<K: Task> Drop for ThreadWorkManager<K> {
    fn drop(&mut self) {
        if self.lifecycle.mode().is_some() {
            self.shutdown(0);
        }
    }
}
