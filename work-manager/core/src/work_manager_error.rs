// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

/// Errors raised by work manager lifecycle and transport operations
#[derive(Debug, thiserror::Error)]
pub enum WorkManagerError {
    #[error("work manager has not been started")]
    NotStarted,

    #[error("work manager was already started")]
    AlreadyStarted,

    #[error("work manager is running in worker mode and cannot submit tasks")]
    WorkerMode,

    #[error("work manager has been shut down")]
    ShutDown,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("codec error: {0}")]
    Codec(String),
}
