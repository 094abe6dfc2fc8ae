// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

mod serial_work_manager;
pub use serial_work_manager::SerialWorkManager;

mod thread_config;
pub use thread_config::ThreadConfig;

mod thread_work_manager;
pub use thread_work_manager::ThreadWorkManager;
