// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use crate::{WorkManagerError, WorkManagerMode};

/// Mode and shutdown bookkeeping shared by every work manager
#[derive(Debug, Default)]
pub struct Lifecycle {
    mode: Option<WorkManagerMode>,
    shutdown_called: bool,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fixes the mode. The mode can only be chosen once.
    pub fn start(&mut self, mode: WorkManagerMode) -> Result<WorkManagerMode, WorkManagerError> {
        if self.mode.is_some() {
            return Err(WorkManagerError::AlreadyStarted);
        }
        self.mode = Some(mode);
        Ok(mode)
    }

    pub fn mode(&self) -> Option<WorkManagerMode> {
        self.mode
    }

    /// Checks that tasks may be submitted
    pub fn ensure_master(&self) -> Result<(), WorkManagerError> {
        if self.shutdown_called {
            return Err(WorkManagerError::ShutDown);
        }
        match self.mode {
            None => Err(WorkManagerError::NotStarted),
            Some(WorkManagerMode::Worker) => Err(WorkManagerError::WorkerMode),
            Some(WorkManagerMode::Master) => Ok(()),
        }
    }

    /// Records the shutdown. Returns false if it was already recorded.
    pub fn mark_shutdown(&mut self) -> bool {
        !std::mem::replace(&mut self.shutdown_called, true)
    }

    pub fn shutdown_called(&self) -> bool {
        self.shutdown_called
    }
}
