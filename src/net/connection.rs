use bytes::BytesMut;
use std::io;
use std::net::SocketAddr;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, lookup_host};
use tracing::error;

use crate::wire::utils::{FrameError, MAX_MESSAGE_LEN, peek_message_within, peek_startup};

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

/// Standard single-read size.
pub const RECEIVE_BUFFER_SIZE: usize = 4 * 1024;

// -----------------------------------------------------------------------------
// ----- Connection ------------------------------------------------------------

/// Byte-stream connection to a client or backend. Bytes read past the end of
/// a frame stay buffered for the next receive.
#[derive(Debug)]
pub struct Connection {
    stream: TcpStream,
    peer: SocketAddr,
    inbox: BytesMut,
}

// -----------------------------------------------------------------------------
// ----- Connection: Static ----------------------------------------------------

impl Connection {
    /// Resolve `host_port` and open a TCP connection to the first address.
    pub async fn connect(host_port: &str) -> Result<Self, ConnectError> {
        let addr = resolve(host_port).await?;

        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;

        Ok(Self::from_parts(stream, addr))
    }

    /// Wrap an accepted stream.
    pub fn from_stream(stream: TcpStream) -> io::Result<Self> {
        let peer = stream.peer_addr()?;
        Ok(Self::from_parts(stream, peer))
    }

    fn from_parts(stream: TcpStream, peer: SocketAddr) -> Self {
        Self {
            stream,
            peer,
            inbox: BytesMut::with_capacity(RECEIVE_BUFFER_SIZE),
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Connection: Public ----------------------------------------------------

impl Connection {
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// One write call; returns how many bytes the socket took.
    pub async fn send(&mut self, bytes: &[u8]) -> io::Result<usize> {
        self.stream.write(bytes).await
    }

    /// Write a whole frame, however many write calls it takes.
    pub async fn send_message(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.stream.write_all(bytes).await
    }

    /// One read of at most `buffer_size` bytes. Already-buffered bytes are
    /// returned first without touching the socket. End-of-stream is an
    /// `UnexpectedEof` error.
    pub async fn receive(&mut self, buffer_size: usize) -> io::Result<BytesMut> {
        if !self.inbox.is_empty() {
            let take = buffer_size.min(self.inbox.len());
            return Ok(self.inbox.split_to(take));
        }

        let mut buffer = BytesMut::zeroed(buffer_size);
        let n = self.stream.read(&mut buffer).await?;
        if n == 0 && buffer_size > 0 {
            return Err(end_of_stream());
        }

        buffer.truncate(n);
        Ok(buffer)
    }

    /// Read exactly one typed message (tag, length, payload).
    pub async fn receive_message(&mut self) -> io::Result<BytesMut> {
        self.receive_message_within(MAX_MESSAGE_LEN).await
    }

    /// Like `receive_message`, refusing any frame whose length field exceeds
    /// `max_len` before buffering its payload.
    pub async fn receive_message_within(&mut self, max_len: usize) -> io::Result<BytesMut> {
        loop {
            let peeked = peek_message_within(&self.inbox, max_len).map_err(invalid_frame)?;
            if let Some(total_len) = peeked {
                return Ok(self.inbox.split_to(total_len));
            }
            self.fill_inbox().await?;
        }
    }

    /// Read exactly one untagged startup-family packet (startup, SSLRequest,
    /// GSSENCRequest, CancelRequest).
    pub async fn receive_startup(&mut self) -> io::Result<BytesMut> {
        loop {
            if let Some(total_len) = peek_startup(&self.inbox).map_err(invalid_frame)? {
                return Ok(self.inbox.split_to(total_len));
            }
            self.fill_inbox().await?;
        }
    }

    /// Shut down the write side and drop the socket.
    pub async fn close(mut self) -> io::Result<()> {
        self.stream.shutdown().await
    }

    /// Hand back the socket together with any bytes read but not yet consumed.
    pub fn into_parts(self) -> (TcpStream, BytesMut) {
        (self.stream, self.inbox)
    }
}

// -----------------------------------------------------------------------------
// ----- Connection: Private ---------------------------------------------------

impl Connection {
    async fn fill_inbox(&mut self) -> io::Result<()> {
        self.inbox.reserve(RECEIVE_BUFFER_SIZE);
        let n = self.stream.read_buf(&mut self.inbox).await?;
        if n == 0 {
            return Err(end_of_stream());
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn buffered(&self) -> &[u8] {
        &self.inbox
    }
}

// -----------------------------------------------------------------------------
// ----- Internal: Helpers -----------------------------------------------------

async fn resolve(host_port: &str) -> Result<SocketAddr, ConnectError> {
    let mut addrs = lookup_host(host_port).await.map_err(|source| {
        error!("failed to resolve {host_port}: {source}");
        ConnectError::Resolve {
            host_port: host_port.to_string(),
            source,
        }
    })?;

    addrs.next().ok_or_else(|| {
        error!("{host_port} resolved to no addresses");
        ConnectError::Unresolved {
            host_port: host_port.to_string(),
        }
    })
}

fn end_of_stream() -> io::Error {
    io::Error::new(io::ErrorKind::UnexpectedEof, "connection closed by peer")
}

fn invalid_frame(err: FrameError) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, err)
}

// -----------------------------------------------------------------------------
// ----- Errors ----------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("failed to resolve {host_port}: {source}")]
    Resolve {
        host_port: String,
        source: io::Error,
    },

    #[error("{host_port} resolved to no addresses")]
    Unresolved { host_port: String },

    #[error("connect failed: {0}")]
    Io(#[from] io::Error),
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn pair() -> (Connection, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let host_port = addr.to_string();
        let (connected, accepted) =
            tokio::join!(Connection::connect(&host_port), listener.accept());

        (connected.unwrap(), accepted.unwrap().0)
    }

    #[tokio::test]
    async fn receive_message_splits_coalesced_frames() {
        let (mut conn, mut peer) = pair().await;

        peer.write_all(&[b'R', 0, 0, 0, 8, 0, 0, 0, 0, b'Z', 0, 0, 0, 5, b'I'])
            .await
            .unwrap();

        let first = conn.receive_message().await.unwrap();
        assert_eq!(&first[..], &[b'R', 0, 0, 0, 8, 0, 0, 0, 0]);

        let second = conn.receive_message().await.unwrap();
        assert_eq!(&second[..], &[b'Z', 0, 0, 0, 5, b'I']);
        assert!(conn.buffered().is_empty());
    }

    #[tokio::test]
    async fn receive_message_waits_for_split_frames() {
        let (mut conn, mut peer) = pair().await;

        let writer = tokio::spawn(async move {
            peer.write_all(&[b'S', 0, 0]).await.unwrap();
            tokio::task::yield_now().await;
            peer.write_all(&[0, 8, b'a', 0, b'b', 0]).await.unwrap();
            peer
        });

        let msg = conn.receive_message().await.unwrap();
        assert_eq!(&msg[..], b"S\0\0\0\x08a\0b\0");
        drop(writer.await.unwrap());
    }

    #[tokio::test]
    async fn receive_startup_reads_declared_length() {
        let (mut conn, mut peer) = pair().await;

        peer.write_all(&[0, 0, 0, 8, 0x04, 0xD2, 0x16, 0x2F, 0, 0])
            .await
            .unwrap();

        let packet = conn.receive_startup().await.unwrap();
        assert_eq!(packet.len(), 8);

        // Trailing bytes stay buffered for the next receive.
        let rest = conn.receive(RECEIVE_BUFFER_SIZE).await.unwrap();
        assert_eq!(&rest[..], &[0, 0]);
    }

    #[tokio::test]
    async fn end_of_stream_is_unexpected_eof() {
        let (mut conn, peer) = pair().await;
        drop(peer);

        let err = conn.receive_message().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);

        let err = conn.receive(RECEIVE_BUFFER_SIZE).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[tokio::test]
    async fn invalid_length_is_invalid_data() {
        let (mut conn, mut peer) = pair().await;
        peer.write_all(&[b'R', 0, 0, 0, 2]).await.unwrap();

        let err = conn.receive_message().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn receive_message_within_refuses_long_frames_early() {
        let (mut conn, mut peer) = pair().await;

        // Header only: the declared payload never arrives.
        peer.write_all(&[b'p', 0, 1, 0, 0]).await.unwrap();

        let err = conn.receive_message_within(1024).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn unresolvable_host_is_an_error() {
        let err = Connection::connect("definitely-not-a-host.invalid:5432")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ConnectError::Resolve { .. } | ConnectError::Unresolved { .. }
        ));
    }

    #[tokio::test]
    async fn send_and_single_read_receive() {
        let (mut conn, mut peer) = pair().await;

        let n = conn.send(b"X\0\0\0\x04").await.unwrap();
        assert_eq!(n, 5);

        let mut got = [0u8; 5];
        peer.read_exact(&mut got).await.unwrap();
        assert_eq!(&got, b"X\0\0\0\x04");

        peer.write_all(b"hello").await.unwrap();
        let buf = conn.receive(RECEIVE_BUFFER_SIZE).await.unwrap();
        assert_eq!(&buf[..], b"hello");
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
