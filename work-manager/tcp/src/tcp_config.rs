// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use work_manager_core::WorkManagerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TcpRole {
    Master,
    Worker,
}

impl FromStr for TcpRole {
    type Err = WorkManagerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "master" => Ok(TcpRole::Master),
            "worker" => Ok(TcpRole::Worker),
            other => Err(WorkManagerError::Config(format!(
                "unknown role '{}', expected master or worker",
                other
            ))),
        }
    }
}

impl fmt::Display for TcpRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TcpRole::Master => write!(f, "master"),
            TcpRole::Worker => write!(f, "worker"),
        }
    }
}

/// Configuration of a [`TcpWorkManager`](crate::TcpWorkManager)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TcpConfig {
    pub role: TcpRole,
    /// Address the master listens on and workers connect to
    pub address: String,
    /// Name a worker announces to the master
    pub worker_name: String,
    /// How long a worker keeps retrying to reach the master
    pub connect_timeout_ms: u64,
    pub retry_interval_ms: u64,
    /// How often the master's accept loop checks for shutdown
    pub poll_interval_ms: u64,
    /// How long the master waits for one task's outcome before giving the
    /// worker up. 0 waits forever.
    pub task_timeout_ms: u64,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            role: TcpRole::Master,
            address: "127.0.0.1:23811".to_string(),
            worker_name: format!("worker-{}", std::process::id()),
            connect_timeout_ms: 10_000,
            retry_interval_ms: 100,
            poll_interval_ms: 10,
            task_timeout_ms: 300_000,
        }
    }
}

impl TcpConfig {
    pub fn master(address: impl Into<String>) -> Self {
        Self {
            role: TcpRole::Master,
            address: address.into(),
            ..Self::default()
        }
    }

    pub fn worker(address: impl Into<String>) -> Self {
        Self {
            role: TcpRole::Worker,
            address: address.into(),
            ..Self::default()
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn task_timeout(&self) -> Option<Duration> {
        (self.task_timeout_ms > 0).then(|| Duration::from_millis(self.task_timeout_ms))
    }
}
