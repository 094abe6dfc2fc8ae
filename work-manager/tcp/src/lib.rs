// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

pub mod frame;
pub use frame::{read_frame, write_frame};

mod messages;
pub use messages::{MasterMessage, WorkerMessage};

mod tcp_config;
pub use tcp_config::{TcpConfig, TcpRole};

mod worker;
pub use worker::run_worker;

mod tcp_work_manager;
pub use tcp_work_manager::TcpWorkManager;
