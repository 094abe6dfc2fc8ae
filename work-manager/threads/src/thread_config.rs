// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use serde::Deserialize;
use std::thread;

/// Configuration of a [`ThreadWorkManager`](crate::ThreadWorkManager)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ThreadConfig {
    /// Number of worker threads
    pub n_workers: usize,
    /// Prefix of worker thread names
    pub thread_name: String,
}

impl Default for ThreadConfig {
    fn default() -> Self {
        Self {
            n_workers: thread::available_parallelism().map_or(1, |n| n.get()),
            thread_name: "work-manager-worker".to_string(),
        }
    }
}

impl ThreadConfig {
    pub fn with_workers(n_workers: usize) -> Self {
        Self {
            n_workers,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_use_defaults() {
        let config: ThreadConfig = serde_json::from_str(r#"{"n_workers": 3}"#).unwrap();
        assert_eq!(config.n_workers, 3);
        assert_eq!(config.thread_name, "work-manager-worker");
    }
}
