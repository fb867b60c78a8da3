use std::io::{self, ErrorKind};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::ChildStdin;

/// Where collected output is mirrored while it is buffered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Tee {
    None,
    Stdout,
    Stderr,
}

async fn mirror<W: AsyncWrite + Unpin>(out: &mut W, chunk: &[u8]) {
    // Forwarding is best-effort; the buffer is what matters.
    if out.write_all(chunk).await.is_ok() {
        let _ = out.flush().await;
    }
}

/// Read `reader` to EOF, optionally mirroring each chunk.
pub(crate) async fn collect<R>(mut reader: R, tee: Tee) -> io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut stdout = tokio::io::stdout();
    let mut stderr = tokio::io::stderr();
    let mut collected = Vec::new();
    let mut buf = vec![0u8; 8_192];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                collected.extend_from_slice(&buf[..n]);
                match tee {
                    Tee::None => {}
                    Tee::Stdout => mirror(&mut stdout, &buf[..n]).await,
                    Tee::Stderr => mirror(&mut stderr, &buf[..n]).await,
                }
            }
            Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(collected)
}

/// Write `data` to a child's stdin and close it.
///
/// A child that exits without reading everything is not an error.
pub(crate) async fn feed(mut stdin: ChildStdin, data: Vec<u8>) -> io::Result<()> {
    match stdin.write_all(&data).await {
        Err(e) if e.kind() == ErrorKind::BrokenPipe => Ok(()),
        Err(e) => Err(e),
        Ok(()) => match stdin.shutdown().await {
            Err(e) if e.kind() == ErrorKind::BrokenPipe => Ok(()),
            other => other,
        },
    }
}
