// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::mem;

struct QueueState<J> {
    jobs: VecDeque<J>,
    closed: bool,
}

/// Blocking FIFO shared between the submitting side of a work manager and
/// the threads that drain it
pub struct TaskQueue<J> {
    state: Mutex<QueueState<J>>,
    available: Condvar,
}

impl<J> TaskQueue<J> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                jobs: VecDeque::new(),
                closed: false,
            }),
            available: Condvar::new(),
        }
    }

    /// Enqueues `job`, handing it back if the queue is closed
    pub fn push(&self, job: J) -> Result<(), J> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(job);
        }
        state.jobs.push_back(job);
        self.available.notify_one();
        Ok(())
    }

    /// Blocks until a job is available. `None` once the queue is closed.
    pub fn pop(&self) -> Option<J> {
        let mut state = self.state.lock();
        loop {
            if state.closed {
                return None;
            }
            if let Some(job) = state.jobs.pop_front() {
                return Some(job);
            }
            self.available.wait(&mut state);
        }
    }

    /// Closes the queue, returning the jobs nobody picked up
    pub fn close(&self) -> Vec<J> {
        let mut state = self.state.lock();
        state.closed = true;
        self.available.notify_all();
        mem::take(&mut state.jobs).into()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn len(&self) -> usize {
        self.state.lock().jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<J> Default for TaskQueue<J> {
    fn default() -> Self {
        Self::new()
    }
}
