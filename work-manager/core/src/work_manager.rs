// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use crate::composition::{self, AsCompleted};
use crate::{Task, TaskError, TaskFuture, WaitError, WorkManagerError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Role a process plays, decided once by [`WorkManager::startup`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkManagerMode {
    /// Submits and distributes tasks
    Master,
    /// Only executes tasks handed to it by a master
    Worker,
}

impl fmt::Display for WorkManagerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkManagerMode::Master => write!(f, "master"),
            WorkManagerMode::Worker => write!(f, "worker"),
        }
    }
}

/// Contract every task transport implements.
///
/// A transport owns how a task reaches an executor. It must resolve every
/// future it hands out with exactly one outcome, including when the
/// executor dies or the manager shuts down. The waiting idioms are provided
/// methods and do not depend on the transport.
pub trait WorkManager<K: Task> {
    /// Performs startup work and reports the role of this process.
    /// Must be called exactly once.
    fn startup(&mut self) -> Result<WorkManagerMode, WorkManagerError>;

    /// Shuts down active workers. Futures that will never run are failed.
    fn shutdown(&mut self, exit_code: i32);

    fn mode(&self) -> Option<WorkManagerMode>;

    /// Hands `task` to an executor, returning the future of its outcome
    fn submit(&self, task: K) -> Result<TaskFuture<K::Output>, WorkManagerError>;

    /// Consumes transport-specific command line arguments, returning the
    /// ones left over
    fn parse_aux_args(&mut self, aux_args: Vec<String>) -> Vec<String> {
        aux_args
    }

    fn is_master(&self) -> bool {
        self.mode() == Some(WorkManagerMode::Master)
    }

    fn submit_many<I>(&self, tasks: I) -> Result<Vec<TaskFuture<K::Output>>, WorkManagerError>
    where
        I: IntoIterator<Item = K>,
        Self: Sized,
    {
        tasks.into_iter().map(|task| self.submit(task)).collect()
    }

    fn as_completed(&self, futures: &[TaskFuture<K::Output>]) -> AsCompleted<K::Output> {
        composition::as_completed(futures)
    }

    fn as_completed_timeout(
        &self,
        futures: &[TaskFuture<K::Output>],
        timeout: Duration,
    ) -> AsCompleted<K::Output> {
        composition::as_completed_timeout(futures, timeout)
    }

    fn wait_any(&self, futures: &[TaskFuture<K::Output>]) -> Option<TaskFuture<K::Output>> {
        composition::wait_any(futures)
    }

    fn wait_any_timeout(
        &self,
        futures: &[TaskFuture<K::Output>],
        timeout: Duration,
    ) -> Result<Option<TaskFuture<K::Output>>, WaitError> {
        composition::wait_any_timeout(futures, timeout)
    }

    fn wait_all(&self, futures: &[TaskFuture<K::Output>]) -> Result<Vec<K::Output>, TaskError> {
        composition::wait_all(futures)
    }

    fn wait_all_timeout(
        &self,
        futures: &[TaskFuture<K::Output>],
        timeout: Duration,
    ) -> Result<Vec<K::Output>, WaitError> {
        composition::wait_all_timeout(futures, timeout)
    }
}
