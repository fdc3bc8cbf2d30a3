//! Length-delimited packet framing over async byte streams.
//!
//! A frame is a 4-byte big-endian length followed by a bincode-encoded
//! [`Packet`]. Drawings travel as link payloads, so the size limit is set
//! well above anything a word would need.

use crate::Packet;
use bincode::{deserialize, serialize};
use std::io;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest frame accepted in either direction (8 MiB).
pub const MAX_FRAME_SIZE: u32 = 8 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),
    #[error("frame too large: {0} bytes (max {MAX_FRAME_SIZE})")]
    TooLarge(usize),
}

/// Encodes `packet` and writes it as one frame.
pub async fn write_packet<W>(writer: &mut W, packet: &Packet) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
{
    let data = serialize(packet)?;
    if data.len() > MAX_FRAME_SIZE as usize {
        return Err(FrameError::TooLarge(data.len()));
    }

    writer.write_all(&(data.len() as u32).to_be_bytes()).await?;
    writer.write_all(&data).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one frame and decodes it.
///
/// Returns `Ok(None)` when the stream ends cleanly at a frame boundary. A
/// stream that ends inside the length prefix is an error.
pub async fn read_packet<R>(reader: &mut R) -> Result<Option<Packet>, FrameError>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    // Only an EOF before the first prefix byte is a clean close.
    if reader.read(&mut len_buf[..1]).await? == 0 {
        return Ok(None);
    }
    reader.read_exact(&mut len_buf[1..]).await?;

    let len = u32::from_be_bytes(len_buf);
    if len > MAX_FRAME_SIZE {
        return Err(FrameError::TooLarge(len as usize));
    }

    let mut buf = vec![0u8; len as usize];
    reader.read_exact(&mut buf).await?;
    Ok(Some(deserialize(&buf)?))
}
