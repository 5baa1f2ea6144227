//! Message encoding and TCP framing.
//!
//! A frame is a `u32` big-endian body length followed by the body. The
//! body is whatever the [`MessageCodec`] produces; [`BincodeCodec`] uses
//! bincode's standard configuration.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::error::GossipError;
use super::message::PeerMessage;

/// Encode/decode hooks for [`PeerMessage`] bodies.
pub trait MessageCodec: Send + Sync + 'static {
    fn encode(&self, msg: &PeerMessage) -> Result<Vec<u8>, GossipError>;
    fn decode(&self, bytes: &[u8]) -> Result<PeerMessage, GossipError>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct BincodeCodec;

impl MessageCodec for BincodeCodec {
    fn encode(&self, msg: &PeerMessage) -> Result<Vec<u8>, GossipError> {
        bincode::serde::encode_to_vec(msg, bincode::config::standard())
            .map_err(|e| GossipError::Encode(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<PeerMessage, GossipError> {
        let (msg, read) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map_err(|e| GossipError::Decode(e.to_string()))?;
        if read != bytes.len() {
            return Err(GossipError::Decode(format!(
                "{} trailing bytes after message",
                bytes.len() - read
            )));
        }
        Ok(msg)
    }
}

/// Writes `body` as one frame and flushes.
pub async fn write_frame<W>(writer: &mut W, body: &[u8], max_bytes: usize) -> Result<(), GossipError>
where
    W: AsyncWrite + Unpin,
{
    let len = u32::try_from(body.len())
        .ok()
        .filter(|_| body.len() <= max_bytes)
        .ok_or_else(|| {
            GossipError::Encode(format!(
                "message of {} bytes exceeds limit of {max_bytes}",
                body.len()
            ))
        })?;
    writer.write_u32(len).await?;
    writer.write_all(body).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one frame body, rejecting lengths above `max_bytes` before
/// allocating.
pub async fn read_frame<R>(reader: &mut R, max_bytes: usize) -> Result<Vec<u8>, GossipError>
where
    R: AsyncRead + Unpin,
{
    let len = reader.read_u32().await.map_err(truncated)? as usize;
    if len > max_bytes {
        return Err(GossipError::Decode(format!(
            "frame of {len} bytes exceeds limit of {max_bytes}"
        )));
    }
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await.map_err(truncated)?;
    Ok(body)
}

fn truncated(e: std::io::Error) -> GossipError {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        GossipError::Decode("truncated frame".to_string())
    } else {
        GossipError::Io(e)
    }
}
