//! Length-prefixed framing for protocol messages.
//!
//! Every message on the stream is a 4-byte big-endian body length followed by
//! the bincode encoding of a [`Request`](crate::Request) or
//! [`Response`](crate::Response). The explicit length keeps message boundaries
//! intact no matter how the transport splits or coalesces reads.

use bincode::{deserialize, serialize};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Upper bound on a single message body.
pub const MAX_FRAME_SIZE: usize = 64 * 1024;

const LENGTH_PREFIX: usize = 4;

#[derive(Debug, Error)]
pub enum CodecError {
    /// The frame arrived intact but its body is not a valid message.
    #[error("malformed message: {0}")]
    Protocol(#[from] bincode::Error),
    #[error("frame of {len} bytes exceeds the {max} byte limit")]
    FrameTooLarge { len: usize, max: usize },
    #[error("connection error: {0}")]
    Connection(#[from] io::Error),
    #[error("connection closed by peer")]
    Closed,
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

impl CodecError {
    /// Protocol errors leave the stream positioned at the next frame, so the
    /// connection can keep going. Everything else ends it.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, CodecError::Protocol(_))
    }
}

/// Serializes `message` into a complete frame, prefix included.
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>, CodecError> {
    let body = serialize(message)?;
    if body.len() > MAX_FRAME_SIZE {
        return Err(CodecError::FrameTooLarge {
            len: body.len(),
            max: MAX_FRAME_SIZE,
        });
    }

    let mut frame = Vec::with_capacity(LENGTH_PREFIX + body.len());
    frame.extend_from_slice(&(body.len() as u32).to_be_bytes());
    frame.extend_from_slice(&body);
    Ok(frame)
}

/// Decodes a frame body (without its length prefix).
pub fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, CodecError> {
    Ok(deserialize(body)?)
}

/// Reads one frame body. A clean end of stream before the prefix is reported as
/// [`CodecError::Closed`].
pub async fn read_frame<R>(reader: &mut R) -> Result<Vec<u8>, CodecError>
where
    R: AsyncRead + Unpin,
{
    let len = match reader.read_u32().await {
        Ok(len) => len as usize,
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Err(CodecError::Closed),
        Err(e) => return Err(e.into()),
    };

    if len > MAX_FRAME_SIZE {
        return Err(CodecError::FrameTooLarge {
            len,
            max: MAX_FRAME_SIZE,
        });
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    Ok(body)
}

pub async fn write_frame<W>(writer: &mut W, frame: &[u8]) -> Result<(), CodecError>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(frame).await?;
    writer.flush().await?;
    Ok(())
}

pub async fn read_message<R, T>(reader: &mut R) -> Result<T, CodecError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let body = read_frame(reader).await?;
    decode(&body)
}

pub async fn write_message<W, T>(writer: &mut W, message: &T) -> Result<(), CodecError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let frame = encode(message)?;
    write_frame(writer, &frame).await
}
