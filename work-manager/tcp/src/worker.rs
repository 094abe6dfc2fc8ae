// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use crate::{read_frame, write_frame, MasterMessage, WorkerMessage};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::BufReader;
use std::net::TcpStream;
use tracing::{debug, info, warn};
use work_manager_core::{execute, Task, WorkManagerError};

/// Serves tasks from the master on `stream` until told to stop.
///
/// Returns the exit code sent by the master, or 0 if the master went away
/// without saying goodbye.
pub fn run_worker<K>(stream: TcpStream, name: &str) -> Result<i32, WorkManagerError>
where
    K: Task + DeserializeOwned,
    K::Output: Serialize,
{
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut writer = stream;
    write_frame(
        &mut writer,
        &WorkerMessage::<K::Output>::Ready {
            name: name.to_string(),
        },
    )?;

    let mut completed = 0usize;
    loop {
        match read_frame::<_, MasterMessage<K>>(&mut reader)? {
            Some(MasterMessage::Assign { task_id, task }) => {
                debug!(%task_id, "executing task");
                let outcome = execute(task);
                write_frame(&mut writer, &WorkerMessage::Outcome { task_id, outcome })?;
                completed += 1;
            }
            Some(MasterMessage::Shutdown { exit_code }) => {
                info!(completed, exit_code, "master requested shutdown");
                return Ok(exit_code);
            }
            None => {
                warn!(completed, "master closed the connection");
                return Ok(0);
            }
        }
    }
}
