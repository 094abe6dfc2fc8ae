// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use serde::{Deserialize, Serialize};
use work_manager_core::{TaskError, TaskId};

/// Messages sent by the master to a connected worker
#[derive(Serialize, Deserialize, Debug)]
pub enum MasterMessage<K> {
    /// Run `task` and report its outcome under `task_id`
    Assign { task_id: TaskId, task: K },
    /// No more work; the worker should exit with `exit_code`
    Shutdown { exit_code: i32 },
}

/// Messages sent by a worker to the master
#[derive(Serialize, Deserialize, Debug)]
pub enum WorkerMessage<T> {
    /// First message on every connection
    Ready { name: String },
    /// Outcome of the task most recently assigned
    Outcome {
        task_id: TaskId,
        outcome: Result<T, TaskError>,
    },
}
