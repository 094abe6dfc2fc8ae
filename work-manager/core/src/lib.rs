// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

mod task_id;
pub use task_id::TaskId;

mod task_error;
pub use task_error::TaskError;

mod wait_error;
pub use wait_error::WaitError;

mod work_manager_error;
pub use work_manager_error::WorkManagerError;

mod task;
pub use task::{execute, BoxedTask, Task};

mod task_future;
pub use task_future::TaskFuture;

mod watcher;
pub use watcher::Watcher;

mod acquisition;
pub use acquisition::{with_all_acquired, AcquiredFutures};

pub mod composition;
pub use composition::AsCompleted;

mod pending_task;
pub use pending_task::PendingTask;

mod task_queue;
pub use task_queue::TaskQueue;

mod lifecycle;
pub use lifecycle::Lifecycle;

mod work_manager;
pub use work_manager::{WorkManager, WorkManagerMode};

pub mod shutdown_signal;
pub use shutdown_signal::{AtomicShutdownSignal, ShutdownSignal};
