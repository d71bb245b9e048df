//! Length-prefixed framing: a 10 byte, left-justified, space-padded ASCII
//! decimal header followed by exactly that many bytes of UTF-8 payload.
use crate::{constants::HEADER_SIZE, error::TransportError};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub fn encode_header(len: usize) -> Result<[u8; HEADER_SIZE], TransportError> {
    let digits = len.to_string();
    if digits.len() > HEADER_SIZE {
        return Err(TransportError::FrameTooLarge {
            len,
            max: 10usize.pow(HEADER_SIZE as u32) - 1,
        });
    }
    let mut header = [b' '; HEADER_SIZE];
    header[..digits.len()].copy_from_slice(digits.as_bytes());
    Ok(header)
}

pub fn decode_header(header: &[u8; HEADER_SIZE]) -> Result<usize, TransportError> {
    let text = String::from_utf8_lossy(header);
    text.trim()
        .parse()
        .map_err(|_| TransportError::BadHeader(text.into_owned()))
}

pub async fn write_frame<W>(writer: &mut W, payload: &str) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    let header = encode_header(payload.len())?;
    writer.write_all(&header).await?;
    writer.write_all(payload.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one whole frame. Frames announcing more than `max_len` bytes are
/// refused before any payload is read.
pub async fn read_frame<R>(reader: &mut R, max_len: usize) -> Result<String, TransportError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header).await?;
    let len = decode_header(&header)?;
    if len > max_len {
        return Err(TransportError::FrameTooLarge { len, max: max_len });
    }
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    String::from_utf8(payload).map_err(|_| TransportError::NotUtf8)
}
