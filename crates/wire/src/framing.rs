// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Length-prefixed JSON framing.
//!
//! Async halves are used by the agent's IPC server; the blocking halves
//! by the CLI client, which has no runtime of its own.

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Frames larger than this are rejected before any payload is read.
pub const MAX_FRAME_LEN: usize = 1_048_576; // 1 MiB

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("frame of {len} bytes exceeds maximum {MAX_FRAME_LEN}")]
    TooLarge { len: usize },

    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),
}

/// Serialize a message to raw JSON bytes (no length prefix).
pub fn encode<T: Serialize>(msg: &T) -> Result<Vec<u8>, ProtocolError> {
    Ok(serde_json::to_vec(msg)?)
}

/// Deserialize a message from raw JSON bytes.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ProtocolError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Write one frame: 4-byte big-endian length, then the payload.
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    payload: &[u8],
) -> Result<(), ProtocolError> {
    if payload.len() > MAX_FRAME_LEN {
        return Err(ProtocolError::TooLarge { len: payload.len() });
    }
    writer.write_all(&(payload.len() as u32).to_be_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one frame. Fails deterministically when the advertised length
/// exceeds [`MAX_FRAME_LEN`], without consuming the payload.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Vec<u8>, ProtocolError> {
    let mut header = [0u8; 4];
    reader.read_exact(&mut header).await?;
    let len = u32::from_be_bytes(header) as usize;
    if len > MAX_FRAME_LEN {
        return Err(ProtocolError::TooLarge { len });
    }
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(payload)
}

/// Write one JSON message as a frame.
pub async fn write_message<W: AsyncWrite + Unpin, T: Serialize>(
    writer: &mut W,
    msg: &T,
) -> Result<(), ProtocolError> {
    let payload = encode(msg)?;
    write_frame(writer, &payload).await
}

/// Read one JSON message from a frame.
pub async fn read_message<R: AsyncRead + Unpin, T: DeserializeOwned>(
    reader: &mut R,
) -> Result<T, ProtocolError> {
    let payload = read_frame(reader).await?;
    decode(&payload)
}

/// Blocking send for the CLI side.
pub fn send_message_blocking<W: std::io::Write, T: Serialize>(
    writer: &mut W,
    msg: &T,
) -> Result<(), ProtocolError> {
    let payload = encode(msg)?;
    if payload.len() > MAX_FRAME_LEN {
        return Err(ProtocolError::TooLarge { len: payload.len() });
    }
    writer.write_all(&(payload.len() as u32).to_be_bytes())?;
    writer.write_all(&payload)?;
    writer.flush()?;
    Ok(())
}

/// Blocking receive for the CLI side.
pub fn recv_message_blocking<R: std::io::Read, T: DeserializeOwned>(
    reader: &mut R,
) -> Result<T, ProtocolError> {
    let mut header = [0u8; 4];
    reader.read_exact(&mut header)?;
    let len = u32::from_be_bytes(header) as usize;
    if len > MAX_FRAME_LEN {
        return Err(ProtocolError::TooLarge { len });
    }
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload)?;
    decode(&payload)
}

#[cfg(test)]
#[path = "framing_tests.rs"]
mod tests;
