use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::command::{MAX_LINE, MAX_USER_ID};

const MAX_CHAR_BYTES: usize = 4;

/// Bytes read per receive. Lengths are checked in characters, so this holds
/// the longest legal reply (`<id>: <message>`) with every character at its
/// widest UTF-8 encoding. Requests are shorter.
pub const FRAME_CAPACITY: usize = (MAX_USER_ID + ": ".len() + MAX_LINE) * MAX_CHAR_BYTES;

/// Reads one frame: whatever a single receive returns, trimmed.
///
/// Requests and replies strictly alternate, so each receive carries exactly
/// one of them. Returns `None` once the peer closes the stream.
pub async fn read_frame<R>(reader: &mut R) -> io::Result<Option<String>>
where
    R: AsyncRead + Unpin,
{
    let mut buffer = [0u8; FRAME_CAPACITY];
    let bytes = reader.read(&mut buffer).await?;
    if bytes == 0 {
        return Ok(None);
    }

    let text = String::from_utf8_lossy(&buffer[..bytes]);
    Ok(Some(text.trim().to_string()))
}

/// Writes `text` as a single frame, without a delimiter, and flushes.
pub async fn write_frame<W>(writer: &mut W, text: &str) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(text.as_bytes()).await?;
    writer.flush().await
}
