// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Waiting idioms over collections of futures.
//!
//! Each entry point snapshots the supplied futures under
//! [`AcquiredFutures`](crate::AcquiredFutures) and watches the pending ones
//! in the same step, so a completion racing with the call is observed
//! either by the snapshot or by the watcher.

use crate::{with_all_acquired, TaskError, TaskFuture, TaskId, WaitError, Watcher};
use std::collections::{HashSet, VecDeque};
use std::iter::FusedIterator;
use std::time::{Duration, Instant};

/// Futures in completion order, as produced by [`as_completed`].
///
/// Futures already done when the sequence was created come first. Each
/// distinct future is yielded exactly once. With a deadline, iteration ends
/// early once the deadline passes and [`timed_out`](Self::timed_out)
/// reports it.
pub struct AsCompleted<T> {
    ready: VecDeque<TaskFuture<T>>,
    pending: HashSet<TaskId>,
    watcher: Option<Watcher<T>>,
    deadline: Option<Instant>,
    timed_out: bool,
}

impl<T> AsCompleted<T> {
    fn start(futures: &[TaskFuture<T>], deadline: Option<Instant>) -> Self {
        let (ready, pending, watcher) = with_all_acquired(futures, |acquired| {
            let ready = acquired.done();
            let pending = acquired.pending();
            let watcher = (!pending.is_empty()).then(|| acquired.watch_pending(1));
            (ready, pending, watcher)
        });

        Self {
            ready: ready.into(),
            pending: pending.iter().map(TaskFuture::task_id).collect(),
            watcher,
            deadline,
            timed_out: false,
        }
    }

    /// Futures not yielded yet
    pub fn remaining(&self) -> usize {
        self.ready.len() + self.pending.len()
    }

    pub fn timed_out(&self) -> bool {
        self.timed_out
    }
}

impl<T> Iterator for AsCompleted<T> {
    type Item = TaskFuture<T>;

    fn next(&mut self) -> Option<TaskFuture<T>> {
        loop {
            if let Some(future) = self.ready.pop_front() {
                return Some(future);
            }
            if self.pending.is_empty() || self.timed_out {
                self.watcher = None;
                return None;
            }

            let watcher = self.watcher.as_ref()?;
            match self.deadline {
                None => watcher.wait(),
                Some(deadline) => {
                    if !watcher.wait_until(deadline) {
                        self.timed_out = true;
                        return None;
                    }
                }
            }
            for future in watcher.reset() {
                if self.pending.remove(&future.task_id()) {
                    self.ready.push_back(future);
                }
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.ready.len(), Some(self.remaining()))
    }
}

impl<T> FusedIterator for AsCompleted<T> {}

/// Yields `futures` as they complete
pub fn as_completed<T>(futures: &[TaskFuture<T>]) -> AsCompleted<T> {
    AsCompleted::start(futures, None)
}

/// Like [`as_completed`], but stops yielding once `timeout` has elapsed
pub fn as_completed_timeout<T>(futures: &[TaskFuture<T>], timeout: Duration) -> AsCompleted<T> {
    AsCompleted::start(futures, Some(Instant::now() + timeout))
}

enum AnySnapshot<T> {
    Empty,
    Done(TaskFuture<T>),
    Watching(Watcher<T>),
}

fn snapshot_any<T>(futures: &[TaskFuture<T>]) -> AnySnapshot<T> {
    with_all_acquired(futures, |acquired| {
        if acquired.is_empty() {
            AnySnapshot::Empty
        } else if let Some(done) = acquired.first_done() {
            AnySnapshot::Done(done)
        } else {
            AnySnapshot::Watching(acquired.watch_pending(1))
        }
    })
}

/// Returns a done future from `futures`, blocking only if none is done yet.
/// `None` for an empty slice.
pub fn wait_any<T>(futures: &[TaskFuture<T>]) -> Option<TaskFuture<T>> {
    match snapshot_any(futures) {
        AnySnapshot::Empty => None,
        AnySnapshot::Done(future) => Some(future),
        AnySnapshot::Watching(watcher) => {
            watcher.wait();
            watcher.reset().into_iter().next()
        }
    }
}

pub fn wait_any_timeout<T>(
    futures: &[TaskFuture<T>],
    timeout: Duration,
) -> Result<Option<TaskFuture<T>>, WaitError> {
    match snapshot_any(futures) {
        AnySnapshot::Empty => Ok(None),
        AnySnapshot::Done(future) => Ok(Some(future)),
        AnySnapshot::Watching(watcher) => {
            if watcher.wait_timeout(timeout) {
                Ok(watcher.reset().into_iter().next())
            } else {
                Err(WaitError::TimedOut(timeout))
            }
        }
    }
}

fn watch_all_pending<T>(futures: &[TaskFuture<T>]) -> Option<Watcher<T>> {
    with_all_acquired(futures, |acquired| match acquired.pending_count() {
        0 => None,
        pending => Some(acquired.watch_pending(pending)),
    })
}

fn collect_results<T: Clone>(futures: &[TaskFuture<T>]) -> Result<Vec<T>, TaskError> {
    futures.iter().map(TaskFuture::get_result).collect()
}

/// Blocks until every future is done, then returns their values in input
/// order.
///
/// If any future failed, the failure of the earliest failed future in input
/// order is returned, regardless of which future completed last.
pub fn wait_all<T: Clone>(futures: &[TaskFuture<T>]) -> Result<Vec<T>, TaskError> {
    if let Some(watcher) = watch_all_pending(futures) {
        watcher.wait();
    }
    collect_results(futures)
}

pub fn wait_all_timeout<T: Clone>(
    futures: &[TaskFuture<T>],
    timeout: Duration,
) -> Result<Vec<T>, WaitError> {
    if let Some(watcher) = watch_all_pending(futures) {
        if !watcher.wait_timeout(timeout) {
            return Err(WaitError::TimedOut(timeout));
        }
    }
    Ok(collect_results(futures)?)
}
