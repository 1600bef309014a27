//! Fixed-width ASCII wire framing shared by `ServerSession` and `Client`.
//!
//! Every header on the wire is exactly [`COMMANDLENGTH`] bytes: right
//! padded with ASCII spaces on write, trimmed on read. This is the style
//! the original engine's `GAsioTCPConsumer`/`GAsioTCPClient` use for
//! `assembleQueryString`/command parsing; reimplemented here over
//! `tokio::io::AsyncRead`/`AsyncWrite` so both the server and client
//! share one codec instead of hand-rolling framing twice.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::constants::COMMANDLENGTH;
use crate::error::WireError;

/// Pads `s` to exactly [`COMMANDLENGTH`] bytes with trailing spaces.
/// Errors if `s` itself is already too long to fit.
pub fn pad_frame(s: &str) -> Result<[u8; COMMANDLENGTH], WireError> {
    if s.len() > COMMANDLENGTH {
        return Err(WireError::Protocol(format!(
            "frame body {s:?} exceeds COMMANDLENGTH ({COMMANDLENGTH})"
        )));
    }
    let mut buf = [b' '; COMMANDLENGTH];
    buf[..s.len()].copy_from_slice(s.as_bytes());
    Ok(buf)
}

/// Writes one padded `COMMANDLENGTH` header frame.
pub async fn write_frame<W: AsyncWrite + Unpin>(w: &mut W, s: &str) -> Result<(), WireError> {
    let buf = pad_frame(s)?;
    w.write_all(&buf).await?;
    Ok(())
}

/// Reads exactly `COMMANDLENGTH` bytes and trims trailing ASCII
/// whitespace. Returns `Ok(None)` on a clean EOF at a frame boundary
/// (the peer closed normally) and `Err(WireError::Io(_))` for any other
/// I/O failure — these two outcomes are indistinguishable in the
/// original engine's `getSingleCommand`, which returns the literal
/// string `"empty"` for both; here they are typed separately.
pub async fn read_frame<R: AsyncRead + Unpin>(r: &mut R) -> Result<Option<String>, WireError> {
    let mut buf = [0u8; COMMANDLENGTH];
    match r.read_exact(&mut buf).await {
        Ok(_) => {
            let s = String::from_utf8_lossy(&buf).trim_end().to_string();
            Ok(Some(s))
        }
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(None),
        Err(e) => Err(WireError::Io(e)),
    }
}

/// Writes a `COMMANDLENGTH` size header followed by `payload` itself.
pub async fn write_sized_payload<W: AsyncWrite + Unpin>(
    w: &mut W,
    payload: &[u8],
) -> Result<(), WireError> {
    write_frame(w, &payload.len().to_string()).await?;
    w.write_all(payload).await?;
    Ok(())
}

/// Reads a `COMMANDLENGTH` size header then exactly that many raw
/// bytes.
pub async fn read_sized_payload<R: AsyncRead + Unpin>(r: &mut R) -> Result<Vec<u8>, WireError> {
    let size_frame = read_frame(r)
        .await?
        .ok_or_else(|| WireError::Protocol("connection closed while reading payload size".into()))?;
    let size: usize = size_frame
        .parse()
        .map_err(|_| WireError::Protocol(format!("invalid payload size frame {size_frame:?}")))?;
    let mut payload = vec![0u8; size];
    r.read_exact(&mut payload).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            WireError::ShortPayload {
                expected: size,
                got: 0,
            }
        } else {
            WireError::Io(e)
        }
    })?;
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pad_frame_is_exactly_commandlength() {
        let frame = pad_frame("ready").unwrap();
        assert_eq!(frame.len(), COMMANDLENGTH);
        assert_eq!(&frame[..5], b"ready");
        assert!(frame[5..].iter().all(|&b| b == b' '));
    }

    #[test]
    fn test_pad_frame_rejects_oversized_body() {
        let too_long = "x".repeat(COMMANDLENGTH + 1);
        assert!(pad_frame(&too_long).is_err());
    }

    #[tokio::test]
    async fn test_write_then_read_frame_round_trips() {
        let mut buf = Vec::new();
        write_frame(&mut buf, "ready").await.unwrap();
        assert_eq!(buf.len(), COMMANDLENGTH);

        let mut cursor = std::io::Cursor::new(buf);
        let frame = read_frame(&mut cursor).await.unwrap();
        assert_eq!(frame, Some("ready".to_string()));
    }

    #[tokio::test]
    async fn test_read_frame_on_clean_eof_is_none() {
        let mut cursor = std::io::Cursor::new(Vec::<u8>::new());
        let frame = read_frame(&mut cursor).await.unwrap();
        assert_eq!(frame, None);
    }

    #[tokio::test]
    async fn test_sized_payload_round_trips() {
        let mut buf = Vec::new();
        write_sized_payload(&mut buf, b"hello").await.unwrap();
        // One size header, then the raw bytes.
        assert_eq!(buf.len(), COMMANDLENGTH + 5);

        let mut cursor = std::io::Cursor::new(buf);
        let payload = read_sized_payload(&mut cursor).await.unwrap();
        assert_eq!(payload, b"hello");
    }

    #[tokio::test]
    async fn test_read_sized_payload_detects_short_body() {
        let mut buf = Vec::new();
        write_frame(&mut buf, "7").await.unwrap();
        buf.extend_from_slice(b"abc"); // announced 7 bytes, only 3 follow
        let mut cursor = std::io::Cursor::new(buf);
        let err = read_sized_payload(&mut cursor).await.unwrap_err();
        assert!(matches!(err, WireError::ShortPayload { expected: 7, .. }));
    }
}
