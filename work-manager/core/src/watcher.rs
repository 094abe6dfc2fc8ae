// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use crate::TaskFuture;
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::mem;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

struct WatcherShared<T> {
    threshold: usize,
    completed: Mutex<Vec<TaskFuture<T>>>,
    ready: Condvar,
}

/// Threshold-triggered aggregator over a fixed set of futures.
///
/// The watcher is ready exactly while at least `threshold` futures have
/// signaled it since the last [`reset`](Watcher::reset). Futures only hold
/// weak references to their watchers, so dropping every handle to a watcher
/// unregisters it.
///
/// The watcher lock is independent from any future lock and is never held
/// while taking one.
pub struct Watcher<T> {
    shared: Arc<WatcherShared<T>>,
}

impl<T> Clone for Watcher<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> Watcher<T> {
    /// Watches `futures`, registering with each of them in turn.
    ///
    /// Futures that are already done signal the watcher during construction.
    /// Registration is not atomic across the set; use
    /// [`AcquiredFutures::watch_pending`](crate::AcquiredFutures::watch_pending)
    /// when the caller also needs a consistent snapshot.
    ///
    /// # Panics
    /// If `threshold` is zero.
    pub fn new<'a, I>(futures: I, threshold: usize) -> Self
    where
        I: IntoIterator<Item = &'a TaskFuture<T>>,
        T: 'a,
    {
        let watcher = Self::unregistered(threshold);
        for future in futures {
            future.add_watcher(&watcher);
        }
        watcher
    }

    pub(crate) fn unregistered(threshold: usize) -> Self {
        assert!(threshold >= 1, "watcher threshold must be at least 1");
        Self {
            shared: Arc::new(WatcherShared {
                threshold,
                completed: Mutex::new(Vec::new()),
                ready: Condvar::new(),
            }),
        }
    }

    pub fn threshold(&self) -> usize {
        self.shared.threshold
    }

    /// Records that `future` is done. Called by the completing future.
    pub fn signal(&self, future: TaskFuture<T>) {
        let mut completed = self.shared.completed.lock();
        completed.push(future);
        if completed.len() == self.shared.threshold {
            self.shared.ready.notify_all();
        }
    }

    pub fn completed_count(&self) -> usize {
        self.shared.completed.lock().len()
    }

    pub fn is_ready(&self) -> bool {
        self.completed_count() >= self.shared.threshold
    }

    /// Blocks until the watcher is ready
    pub fn wait(&self) {
        let mut completed = self.shared.completed.lock();
        while completed.len() < self.shared.threshold {
            self.shared.ready.wait(&mut completed);
        }
    }

    /// Returns whether the watcher became ready before `timeout` elapsed
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.wait_until(Instant::now() + timeout)
    }

    pub fn wait_until(&self, deadline: Instant) -> bool {
        let mut completed = self.shared.completed.lock();
        while completed.len() < self.shared.threshold {
            if self
                .shared
                .ready
                .wait_until(&mut completed, deadline)
                .timed_out()
            {
                return completed.len() >= self.shared.threshold;
            }
        }
        true
    }

    /// Takes every future that signaled since the last reset, clearing the
    /// ready state
    pub fn reset(&self) -> Vec<TaskFuture<T>> {
        mem::take(&mut *self.shared.completed.lock())
    }

    pub(crate) fn downgrade(&self) -> WeakWatcher<T> {
        WeakWatcher(Arc::downgrade(&self.shared))
    }
}

impl<T> fmt::Debug for Watcher<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watcher")
            .field("threshold", &self.shared.threshold)
            .field("completed", &self.completed_count())
            .finish()
    }
}

/// Back-reference from a future to an interested watcher
pub(crate) struct WeakWatcher<T>(Weak<WatcherShared<T>>);

impl<T> WeakWatcher<T> {
    pub(crate) fn upgrade(&self) -> Option<Watcher<T>> {
        self.0.upgrade().map(|shared| Watcher { shared })
    }

    /// False once every handle to the watcher is dropped
    pub(crate) fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }

    pub(crate) fn is(&self, watcher: &Watcher<T>) -> bool {
        std::ptr::eq(self.0.as_ptr(), Arc::as_ptr(&watcher.shared))
    }
}
