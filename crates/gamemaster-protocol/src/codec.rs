//! Length-prefixed JSON framing
//!
//! Every frame is a 4-byte big-endian payload length followed by the
//! serde_json encoding of the message.

use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest payload accepted on either side (1 MiB)
pub const MAX_FRAME_LEN: u32 = 1024 * 1024;

#[derive(Debug, Error)]
pub enum ProtoError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("frame of {0} bytes exceeds the {MAX_FRAME_LEN} byte limit")]
    FrameTooLarge(usize),
}

impl ProtoError {
    /// True when the peer closed the stream between frames
    pub fn is_eof(&self) -> bool {
        matches!(self, ProtoError::Io(e) if e.kind() == std::io::ErrorKind::UnexpectedEof)
    }
}

/// Encode `msg` as a complete frame, length prefix included.
///
/// Fails with `FrameTooLarge` before anything reaches the wire, so a writer
/// shared by several callers never has to give up on a half-sent frame.
pub fn encode_frame<T: Serialize>(msg: &T) -> Result<Vec<u8>, ProtoError> {
    let payload = serde_json::to_vec(msg)?;
    let len = u32::try_from(payload.len())
        .ok()
        .filter(|len| *len <= MAX_FRAME_LEN)
        .ok_or(ProtoError::FrameTooLarge(payload.len()))?;

    let mut frame = Vec::with_capacity(4 + payload.len());
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Write a frame produced by `encode_frame`
pub async fn write_encoded<W>(w: &mut W, frame: &[u8]) -> Result<(), ProtoError>
where
    W: AsyncWrite + Unpin,
{
    w.write_all(frame).await?;
    w.flush().await?;
    Ok(())
}

pub async fn write_frame<W, T>(w: &mut W, msg: &T) -> Result<(), ProtoError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    write_encoded(w, &encode_frame(msg)?).await
}

pub async fn read_frame<R, T>(r: &mut R) -> Result<T, ProtoError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let len = r.read_u32().await?;
    if len > MAX_FRAME_LEN {
        return Err(ProtoError::FrameTooLarge(len as usize));
    }
    let mut payload = vec![0u8; len as usize];
    r.read_exact(&mut payload).await?;
    Ok(serde_json::from_slice(&payload)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ReplyFrame, Request, RequestFrame, Response};

    #[tokio::test]
    async fn test_frames_over_duplex() {
        let (mut a, mut b) = tokio::io::duplex(4096);

        let sent = RequestFrame {
            id: 1,
            request: Request::Echo {
                message: "hello".to_string(),
            },
        };
        write_frame(&mut a, &sent).await.unwrap();
        write_frame(&mut a, &ReplyFrame::ok(2, Response::Attached))
            .await
            .unwrap();

        let first: RequestFrame = read_frame(&mut b).await.unwrap();
        let second: ReplyFrame = read_frame(&mut b).await.unwrap();
        assert_eq!(first, sent);
        assert_eq!(second.id, 2);
        assert_eq!(second.outcome, Ok(Response::Attached));
    }

    #[tokio::test]
    async fn test_oversized_length_is_rejected() {
        let (mut a, mut b) = tokio::io::duplex(64);
        a.write_u32(MAX_FRAME_LEN + 1).await.unwrap();

        let err = read_frame::<_, RequestFrame>(&mut b).await.unwrap_err();
        assert!(matches!(err, ProtoError::FrameTooLarge(_)));
    }

    #[test]
    fn test_encode_checks_size_up_front() {
        let small = encode_frame(&ReplyFrame::ok(1, Response::Detached)).unwrap();
        let payload_len = u32::from_be_bytes([small[0], small[1], small[2], small[3]]);
        assert_eq!(payload_len as usize, small.len() - 4);

        let big = RequestFrame {
            id: 1,
            request: Request::Echo {
                message: "x".repeat(MAX_FRAME_LEN as usize),
            },
        };
        assert!(matches!(
            encode_frame(&big),
            Err(ProtoError::FrameTooLarge(len)) if len > MAX_FRAME_LEN as usize
        ));
    }

    #[tokio::test]
    async fn test_closed_stream_reports_eof() {
        let (a, mut b) = tokio::io::duplex(64);
        drop(a);

        let err = read_frame::<_, RequestFrame>(&mut b).await.unwrap_err();
        assert!(err.is_eof());
    }
}
