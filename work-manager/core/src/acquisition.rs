// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use crate::task_future::FutureState;
use crate::{TaskFuture, Watcher};
use parking_lot::MutexGuard;

/// The locks of a whole set of futures, held together.
///
/// While an `AcquiredFutures` is alive no future in the set can complete,
/// so "which of these are done" and "watch the rest" form one indivisible
/// step. Locks are taken in ascending task id order whatever order the
/// caller supplies, so overlapping acquisitions on different threads cannot
/// deadlock. Duplicate handles are acquired once. Futures that are already
/// done can no longer change and are not locked, which also lets a
/// completion callback acquire a set containing its own future. Every lock
/// is released when the value is dropped, including during unwinding.
pub struct AcquiredFutures<'a, T> {
    entries: Vec<(&'a TaskFuture<T>, Option<MutexGuard<'a, FutureState<T>>>)>,
}

impl<'a, T> AcquiredFutures<'a, T> {
    pub fn acquire<I>(futures: I) -> Self
    where
        I: IntoIterator<Item = &'a TaskFuture<T>>,
    {
        let mut targets: Vec<&'a TaskFuture<T>> = futures.into_iter().collect();
        targets.sort_by_key(|future| future.lock_order());
        targets.dedup_by(|a, b| a.same_future(b));

        let entries = targets
            .into_iter()
            .map(|future| {
                let guard = (!future.is_done()).then(|| future.lock_state());
                (future, guard)
            })
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Futures that are done, in lock order
    pub fn done(&self) -> Vec<TaskFuture<T>> {
        self.entries
            .iter()
            .filter(|(future, _)| future.is_done())
            .map(|(future, _)| (*future).clone())
            .collect()
    }

    pub fn first_done(&self) -> Option<TaskFuture<T>> {
        self.entries
            .iter()
            .find(|(future, _)| future.is_done())
            .map(|(future, _)| (*future).clone())
    }

    /// Futures that are still pending, in lock order
    pub fn pending(&self) -> Vec<TaskFuture<T>> {
        self.entries
            .iter()
            .filter(|(future, _)| !future.is_done())
            .map(|(future, _)| (*future).clone())
            .collect()
    }

    pub fn pending_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|(future, _)| !future.is_done())
            .count()
    }

    /// Builds a watcher over the futures that are still pending.
    ///
    /// # Panics
    /// If `threshold` is zero.
    pub fn watch_pending(&mut self, threshold: usize) -> Watcher<T> {
        let watcher = Watcher::unregistered(threshold);
        for (future, guard) in self.entries.iter_mut() {
            if let Some(state) = guard {
                if !future.is_done() {
                    future.attach_watcher(state, &watcher);
                }
            }
        }
        watcher
    }
}

/// Runs `scope` with every future in `futures` locked
pub fn with_all_acquired<'a, T, I, R>(
    futures: I,
    scope: impl FnOnce(&mut AcquiredFutures<'a, T>) -> R,
) -> R
where
    I: IntoIterator<Item = &'a TaskFuture<T>>,
    T: 'a,
{
    let mut acquired = AcquiredFutures::acquire(futures);
    scope(&mut acquired)
}
