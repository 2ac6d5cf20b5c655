use std::io;

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::frame::ArtifactFrame;

/// Receives a whole artifact buffer, the sender closing the connection marks its end.
///
/// # Arguments
/// * `rx` - The underlying reader.
///
/// # Returns
/// The received bytes, or an `io::Error` if reading failed or the buffer
/// ended before the length it declares.
pub async fn recv_artifact<R>(rx: &mut R) -> io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    rx.read_to_end(&mut buf).await?;

    let declared = ArtifactFrame::declared_len(&buf)?;
    if declared != buf.len() {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("received {} bytes of a {declared} bytes artifact", buf.len()),
        ));
    }

    Ok(buf)
}
