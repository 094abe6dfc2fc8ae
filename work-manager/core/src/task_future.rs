// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use crate::task_error::panic_message;
use crate::watcher::{WeakWatcher, Watcher};
use crate::{TaskError, TaskId, WaitError};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::fmt;
use std::future::Future;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::error;

pub(crate) type Callback<T> = Box<dyn FnOnce(TaskId, Result<&T, &TaskError>) + Send>;

/// Registrations guarded by a future's lock
pub(crate) struct FutureState<T> {
    watchers: Vec<WeakWatcher<T>>,
    callbacks: Vec<Callback<T>>,
}

struct FutureShared<T> {
    task_id: TaskId,
    /// Written once, under `state`; readable without the lock afterwards
    outcome: OnceLock<Result<T, TaskError>>,
    state: Mutex<FutureState<T>>,
    condition: Condvar,
}

/// Single-assignment, thread-safe container for the outcome of one task.
///
/// Handles are cheap to clone and all refer to the same outcome. A future
/// moves from pending to done exactly once, through either [`set_result`]
/// or [`set_failure`]; completing it a second time is a programming error
/// and panics.
///
/// Completion stores the outcome, wakes every blocked reader, then runs the
/// registered callbacks in registration order, then signals every
/// registered [`Watcher`] once. All of this happens under the future's
/// lock, so a concurrent registration either lands before completion and
/// is notified by it, or observes the future as done and is notified on
/// the spot.
///
/// Once done, reads and registrations never take the lock. A callback may
/// therefore read, wait on, or register against its own future.
///
/// [`set_result`]: TaskFuture::set_result
/// [`set_failure`]: TaskFuture::set_failure
pub struct TaskFuture<T> {
    shared: Arc<FutureShared<T>>,
}

impl<T> Clone for TaskFuture<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> TaskFuture<T> {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(FutureShared {
                task_id: TaskId::new(),
                outcome: OnceLock::new(),
                state: Mutex::new(FutureState {
                    watchers: Vec::new(),
                    callbacks: Vec::new(),
                }),
                condition: Condvar::new(),
            }),
        }
    }

    /// A future that is already done with `value`
    pub fn completed(value: T) -> Self {
        let future = Self::new();
        future.set_result(value);
        future
    }

    /// A future that is already done with `error`
    pub fn failed(error: TaskError) -> Self {
        let future = Self::new();
        future.set_failure(error);
        future
    }

    pub fn task_id(&self) -> TaskId {
        self.shared.task_id
    }

    /// Completes the future with a value.
    ///
    /// # Panics
    /// If the future is already done.
    pub fn set_result(&self, value: T) {
        self.complete(Ok(value));
    }

    /// Completes the future with a failure.
    ///
    /// # Panics
    /// If the future is already done.
    pub fn set_failure(&self, error: TaskError) {
        self.complete(Err(error));
    }

    /// Completes the future with either payload
    pub fn set_outcome(&self, outcome: Result<T, TaskError>) {
        self.complete(outcome);
    }

    fn complete(&self, outcome: Result<T, TaskError>) {
        let task_id = self.task_id();
        if self.is_done() {
            panic!("task future {} completed more than once", task_id);
        }

        let mut state = self.shared.state.lock();
        if self.shared.outcome.set(outcome).is_err() {
            drop(state);
            panic!("task future {} completed more than once", task_id);
        }
        let callbacks = mem::take(&mut state.callbacks);
        let watchers = mem::take(&mut state.watchers);
        self.shared.condition.notify_all();

        if let Some(outcome) = self.shared.outcome.get() {
            for callback in callbacks {
                run_callback(task_id, outcome, callback);
            }
        }
        for watcher in watchers.iter().filter_map(WeakWatcher::upgrade) {
            watcher.signal(self.clone());
        }
    }

    /// Non-blocking snapshot of the completion state
    pub fn is_done(&self) -> bool {
        self.shared.outcome.get().is_some()
    }

    /// Blocks until the future is done, then returns its value or its failure
    pub fn get_result(&self) -> Result<T, TaskError>
    where
        T: Clone,
    {
        self.read_blocking(Clone::clone)
    }

    /// Like [`get_result`](Self::get_result), giving up after `timeout`
    pub fn get_result_timeout(&self, timeout: Duration) -> Result<T, WaitError>
    where
        T: Clone,
    {
        match self.read_until(Instant::now() + timeout, Clone::clone) {
            Some(outcome) => outcome.map_err(WaitError::Task),
            None => Err(WaitError::TimedOut(timeout)),
        }
    }

    /// Non-blocking read; `None` while pending
    pub fn try_get_result(&self) -> Option<Result<T, TaskError>>
    where
        T: Clone,
    {
        self.shared.outcome.get().cloned()
    }

    /// Blocks until the future is done, then returns its failure, if any
    pub fn get_error(&self) -> Option<TaskError> {
        self.read_blocking(|outcome| outcome.as_ref().err().cloned())
    }

    /// Non-blocking; `Some` only if the future is done with a failure
    pub fn try_get_error(&self) -> Option<TaskError> {
        match self.shared.outcome.get() {
            Some(Err(error)) => Some(error.clone()),
            _ => None,
        }
    }

    /// Blocks until the future is done
    pub fn wait(&self) {
        self.read_blocking(|_| ());
    }

    pub fn wait_timeout(&self, timeout: Duration) -> Result<(), WaitError> {
        self.read_until(Instant::now() + timeout, |_| ())
            .ok_or(WaitError::TimedOut(timeout))
    }

    /// Registers a callback to run once on completion.
    ///
    /// If the future is already done the callback runs immediately on the
    /// calling thread. A panicking callback is logged and discarded.
    pub fn add_callback<F>(&self, callback: F)
    where
        F: FnOnce(TaskId, Result<&T, &TaskError>) + Send + 'static,
    {
        if let Some(outcome) = self.shared.outcome.get() {
            run_callback(self.task_id(), outcome, Box::new(callback));
            return;
        }

        let mut state = self.shared.state.lock();
        match self.shared.outcome.get() {
            Some(outcome) => {
                drop(state);
                run_callback(self.task_id(), outcome, Box::new(callback));
            }
            None => state.callbacks.push(Box::new(callback)),
        }
    }

    /// Resolves when the future completes, for callers living on an async
    /// runtime. Resolves to `Cancelled` if every handle is dropped while
    /// the future is still pending.
    pub fn completion(&self) -> impl Future<Output = Result<T, TaskError>> + Send + 'static
    where
        T: Clone + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.add_callback(move |_, outcome| {
            let _ = tx.send(outcome.cloned().map_err(Clone::clone));
        });
        async move {
            rx.await.unwrap_or_else(|_| {
                Err(TaskError::Cancelled(
                    "future dropped before completion".to_string(),
                ))
            })
        }
    }

    pub(crate) fn add_watcher(&self, watcher: &Watcher<T>) {
        if self.is_done() {
            watcher.signal(self.clone());
            return;
        }
        let mut state = self.shared.state.lock();
        self.attach_watcher(&mut state, watcher);
    }

    /// Registers `watcher` against an already-locked state
    pub(crate) fn attach_watcher(&self, state: &mut FutureState<T>, watcher: &Watcher<T>) {
        if self.is_done() {
            watcher.signal(self.clone());
            return;
        }
        state.watchers.retain(WeakWatcher::is_alive);
        if !state.watchers.iter().any(|existing| existing.is(watcher)) {
            state.watchers.push(watcher.downgrade());
        }
    }

    pub(crate) fn lock_state(&self) -> MutexGuard<'_, FutureState<T>> {
        self.shared.state.lock()
    }

    /// Global acquisition order: task id, then address as a tie-breaker
    pub(crate) fn lock_order(&self) -> (TaskId, usize) {
        (self.task_id(), Arc::as_ptr(&self.shared) as usize)
    }

    pub(crate) fn same_future(&self, other: &TaskFuture<T>) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    fn read_blocking<R>(&self, read: impl FnOnce(&Result<T, TaskError>) -> R) -> R {
        if let Some(outcome) = self.shared.outcome.get() {
            return read(outcome);
        }
        let mut state = self.shared.state.lock();
        loop {
            if let Some(outcome) = self.shared.outcome.get() {
                return read(outcome);
            }
            self.shared.condition.wait(&mut state);
        }
    }

    fn read_until<R>(
        &self,
        deadline: Instant,
        read: impl FnOnce(&Result<T, TaskError>) -> R,
    ) -> Option<R> {
        if let Some(outcome) = self.shared.outcome.get() {
            return Some(read(outcome));
        }
        let mut state = self.shared.state.lock();
        loop {
            if let Some(outcome) = self.shared.outcome.get() {
                return Some(read(outcome));
            }
            if self
                .shared
                .condition
                .wait_until(&mut state, deadline)
                .timed_out()
            {
                return self.shared.outcome.get().map(read);
            }
        }
    }
}

impl<T> Default for TaskFuture<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for TaskFuture<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<TaskFuture {}>", self.task_id())
    }
}

impl<T> fmt::Display for TaskFuture<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<TaskFuture {}>", self.task_id())
    }
}

fn run_callback<T>(task_id: TaskId, outcome: &Result<T, TaskError>, callback: Callback<T>) {
    let result = panic::catch_unwind(AssertUnwindSafe(|| callback(task_id, outcome.as_ref())));
    if let Err(payload) = result {
        error!(
            %task_id,
            reason = %panic_message(payload.as_ref()),
            "ignoring panic in completion callback"
        );
    }
}
