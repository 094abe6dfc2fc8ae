// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Length-prefixed JSON framing: a 4-byte big-endian body length followed
//! by the serialized message.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::{ErrorKind, Read, Write};
use work_manager_core::WorkManagerError;

pub const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

fn codec_error(error: serde_json::Error) -> WorkManagerError {
    WorkManagerError::Codec(error.to_string())
}

pub fn write_frame<W: Write, M: Serialize>(
    writer: &mut W,
    message: &M,
) -> Result<(), WorkManagerError> {
    let body = serde_json::to_vec(message).map_err(codec_error)?;
    if body.len() > MAX_FRAME_LEN {
        return Err(WorkManagerError::Codec(format!(
            "frame of {} bytes exceeds the {} byte limit",
            body.len(),
            MAX_FRAME_LEN
        )));
    }
    let len = body.len() as u32;
    writer.write_all(&len.to_be_bytes())?;
    writer.write_all(&body)?;
    writer.flush()?;
    Ok(())
}

/// Reads one frame. Returns `None` if the peer closed the stream before a
/// new frame started.
pub fn read_frame<R: Read, M: DeserializeOwned>(
    reader: &mut R,
) -> Result<Option<M>, WorkManagerError> {
    let mut len_bytes = [0u8; 4];
    match reader.read_exact(&mut len_bytes) {
        Ok(()) => {}
        Err(error) if error.kind() == ErrorKind::UnexpectedEof => return Ok(None),
        Err(error) => return Err(error.into()),
    }

    let len = u32::from_be_bytes(len_bytes) as usize;
    if len > MAX_FRAME_LEN {
        return Err(WorkManagerError::Codec(format!(
            "incoming frame of {} bytes exceeds the {} byte limit",
            len, MAX_FRAME_LEN
        )));
    }
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body)?;
    serde_json::from_slice(&body).map(Some).map_err(codec_error)
}
