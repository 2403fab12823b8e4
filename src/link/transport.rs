//! Transport seam for the game link
//!
//! The supervisor only needs to dial, write a frame, read a frame and close.
//! Timeouts are applied by the supervisor around these calls, so an
//! implementation may block for as long as the underlying I/O does.

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::trace;

use crate::protocol::{read_frame, write_frame};

/// Opens connections to the game
#[async_trait]
pub trait Transport: Send + Sync {
    /// Connection type produced by a successful dial
    type Conn: FrameConnection;

    /// Open a connection to `host:port`
    async fn connect(&self, host: &str, port: u16) -> std::io::Result<Self::Conn>;
}

/// One open, framed connection
#[async_trait]
pub trait FrameConnection: Send {
    /// Write a fully encoded frame and flush it
    async fn send(&mut self, frame: &[u8]) -> std::io::Result<()>;

    /// Receive one frame, delimiter included
    async fn recv(&mut self) -> std::io::Result<Vec<u8>>;

    /// Close the connection. Errors are swallowed; the connection is gone
    /// either way.
    async fn close(&mut self);
}

// ─────────────────────────────────────────────────────────────────
// TCP Transport
// ─────────────────────────────────────────────────────────────────

/// Plain TCP transport, used against the loopback game socket
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpTransport;

#[async_trait]
impl Transport for TcpTransport {
    type Conn = LineConnection<TcpStream>;

    async fn connect(&self, host: &str, port: u16) -> std::io::Result<Self::Conn> {
        let stream = TcpStream::connect((host, port)).await?;
        stream.set_nodelay(true)?;
        Ok(LineConnection::new(stream))
    }
}

/// Newline-framed connection over any byte stream
#[derive(Debug)]
pub struct LineConnection<S> {
    stream: BufReader<S>,
}

impl<S> LineConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wrap a connected stream
    pub fn new(stream: S) -> Self {
        Self {
            stream: BufReader::new(stream),
        }
    }
}

#[async_trait]
impl<S> FrameConnection for LineConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn send(&mut self, frame: &[u8]) -> std::io::Result<()> {
        write_frame(self.stream.get_mut(), frame).await
    }

    async fn recv(&mut self) -> std::io::Result<Vec<u8>> {
        read_frame(&mut self.stream).await
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.get_mut().shutdown().await {
            trace!(error = %e, "Ignoring error while closing game socket");
        }
    }
}
