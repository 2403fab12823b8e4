//! Newline-delimited JSON framing
//!
//! Wire format: `<UTF-8 JSON object>\n`, in both directions. There is no
//! length prefix; the delimiter is the only framing, so an encoded frame
//! must never contain a raw newline. `serde_json` escapes newlines inside
//! strings and its compact writer emits no whitespace, which keeps that true
//! for every value it can encode.

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Frame delimiter
pub const FRAME_DELIMITER: u8 = b'\n';

/// Largest frame accepted from the game, delimiter excluded
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Errors produced while encoding or decoding a frame
#[derive(Debug, Error)]
pub enum FrameError {
    /// Value could not be serialized
    #[error("failed to encode frame: {0}")]
    Encode(#[source] serde_json::Error),

    /// Frame body is not valid JSON for the expected shape
    #[error("failed to decode frame: {0}")]
    Decode(#[source] serde_json::Error),

    /// Frame exceeded [`MAX_FRAME_SIZE`]
    #[error("frame too large: more than {max} bytes")]
    TooLarge { max: usize },
}

/// Serialize a value into a delimited frame
pub fn encode_frame<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, FrameError> {
    let mut frame = serde_json::to_vec(value).map_err(FrameError::Encode)?;
    debug_assert!(!frame.contains(&FRAME_DELIMITER));
    frame.push(FRAME_DELIMITER);
    Ok(frame)
}

/// Decode one frame. A trailing delimiter (and `\r`) is tolerated.
pub fn decode_frame<T: DeserializeOwned>(frame: &[u8]) -> Result<T, FrameError> {
    let body = frame.strip_suffix(&[FRAME_DELIMITER]).unwrap_or(frame);
    let body = body.strip_suffix(b"\r").unwrap_or(body);
    serde_json::from_slice(body).map_err(FrameError::Decode)
}

/// Write a complete frame and flush it
pub async fn write_frame<W>(writer: &mut W, frame: &[u8]) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(frame).await?;
    writer.flush().await
}

/// Read bytes up to and including the next delimiter.
///
/// A clean end of stream, or one in the middle of a frame, is reported as
/// `UnexpectedEof` since the peer went away. A frame longer than
/// [`MAX_FRAME_SIZE`] is reported as `InvalidData`.
pub async fn read_frame<R>(reader: &mut R) -> std::io::Result<Vec<u8>>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let limit = (MAX_FRAME_SIZE + 1) as u64;
    let read = (&mut *reader).take(limit).read_until(FRAME_DELIMITER, &mut buf).await?;

    if buf.last() == Some(&FRAME_DELIMITER) {
        return Ok(buf);
    }

    if read as u64 >= limit {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            FrameError::TooLarge { max: MAX_FRAME_SIZE },
        ));
    }

    Err(std::io::Error::new(
        std::io::ErrorKind::UnexpectedEof,
        "stream closed before a full frame arrived",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use tokio::io::BufReader;

    #[test]
    fn test_items_payload_round_trip() {
        let payload = json!({ "items": [800, 500, 300] });
        let frame = encode_frame(&payload).unwrap();

        assert_eq!(frame.last(), Some(&b'\n'));
        assert_eq!(frame.iter().filter(|b| **b == b'\n').count(), 1);

        let decoded: Value = decode_frame(&frame).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_embedded_newline_is_escaped() {
        let payload = json!({ "Name": "line one\nline two" });
        let frame = encode_frame(&payload).unwrap();
        assert_eq!(frame.iter().filter(|b| **b == b'\n').count(), 1);

        let decoded: Value = decode_frame(&frame).unwrap();
        assert_eq!(decoded["Name"], "line one\nline two");
    }

    #[test]
    fn test_decode_tolerates_crlf() {
        let decoded: Value = decode_frame(b"{\"Name\":\"Samus\"}\r\n").unwrap();
        assert_eq!(decoded["Name"], "Samus");
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let result: Result<Value, _> = decode_frame(b"{not json\n");
        assert!(matches!(result, Err(FrameError::Decode(_))));
    }

    #[tokio::test]
    async fn test_frames_through_mock_stream() {
        let payload = json!({ "items": [800, 500, 300] });
        let frame = encode_frame(&payload).unwrap();

        let mut mock = tokio_test::io::Builder::new()
            .write(&frame)
            .read(b"{\"Name\":\"Samus\",\"hp\":99}\n")
            .build();

        write_frame(&mut mock, &frame).await.unwrap();

        let mut reader = BufReader::new(mock);
        let response = read_frame(&mut reader).await.unwrap();
        let decoded: Value = decode_frame(&response).unwrap();
        assert_eq!(decoded["Name"], "Samus");
        assert_eq!(decoded["hp"], 99);
    }

    #[tokio::test]
    async fn test_read_frame_split_across_reads() {
        let mock = tokio_test::io::Builder::new()
            .read(b"{\"Name\":")
            .read(b"\"Samus\"}\n")
            .build();

        let mut reader = BufReader::new(mock);
        let frame = read_frame(&mut reader).await.unwrap();
        assert_eq!(frame, b"{\"Name\":\"Samus\"}\n");
    }

    #[tokio::test]
    async fn test_read_frame_eof_is_unexpected() {
        let mock = tokio_test::io::Builder::new().read(b"{\"Name\"").build();
        let mut reader = BufReader::new(mock);

        let err = read_frame(&mut reader).await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::UnexpectedEof);
    }

    #[tokio::test]
    async fn test_read_frame_too_large() {
        let oversized = vec![b'a'; MAX_FRAME_SIZE + 16];
        let mut reader = BufReader::new(&oversized[..]);

        let err = read_frame(&mut reader).await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }
}
