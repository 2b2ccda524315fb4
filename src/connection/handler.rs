//! Connection Handler Module
//!
//! Each client gets its own task that loops: read a request, execute it, and
//! write the reply.
//!
//! ## Connection Lifecycle
//!
//! ```text
//! 1. Client connects, ConnectionHandler spawned
//!        │
//!        ▼
//! 2. ┌──────────────────────────────┐
//!    │  Read request (two lines per │
//!    │  element)                    │
//!    │              │               │
//!    │              ▼               │
//!    │  Execute command ──error──> log, no reply
//!    │              │               │
//!    │              ▼               │
//!    │  Send reply                  │
//!    │              │               │
//!    │         [Loop back]          │
//!    └──────────────────────────────┘
//!        │
//!        ▼
//! 3. Peer closes / read fails, task ends
//! ```
//!
//! Requests on one connection are handled strictly in arrival order. A bad
//! line or a failed command never closes the connection; only a failed read
//! or write does.

use crate::commands::CommandHandler;
use crate::protocol::{LineReader, ProtocolError, Reply};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncWriteExt, BufReader, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, trace, warn};

/// Statistics for connection handling
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Total number of connections accepted
    pub connections_accepted: AtomicU64,
    /// Currently active connections
    pub active_connections: AtomicU64,
    /// Commands that produced a reply
    pub commands_processed: AtomicU64,
    /// Requests that failed and were dropped without a reply
    pub commands_dropped: AtomicU64,
    /// Total bytes written
    pub bytes_written: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn command_processed(&self) {
        self.commands_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn command_dropped(&self) {
        self.commands_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_written(&self, count: usize) {
        self.bytes_written
            .fetch_add(count as u64, Ordering::Relaxed);
    }
}

/// Errors that end a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// I/O error writing to the client
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Unrecoverable error reading from the client
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

/// Handles a single client connection.
pub struct ConnectionHandler {
    reader: LineReader<BufReader<OwnedReadHalf>>,
    writer: BufWriter<OwnedWriteHalf>,

    /// Client's address (for logging)
    addr: SocketAddr,

    command_handler: CommandHandler,

    /// Connection statistics (shared)
    stats: Arc<ConnectionStats>,
}

impl ConnectionHandler {
    /// Creates a new connection handler.
    pub fn new(
        stream: TcpStream,
        addr: SocketAddr,
        command_handler: CommandHandler,
        stats: Arc<ConnectionStats>,
    ) -> Self {
        stats.connection_opened();

        let (read_half, write_half) = stream.into_split();
        Self {
            reader: LineReader::new(BufReader::new(read_half)),
            writer: BufWriter::new(write_half),
            addr,
            command_handler,
            stats,
        }
    }

    /// Runs the connection until the client disconnects or a read fails.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        info!(client = %self.addr, "Client connected");

        let result = self.main_loop().await;

        match &result {
            Ok(()) => info!(client = %self.addr, "Client disconnected"),
            Err(ConnectionError::Protocol(ProtocolError::UnexpectedEof)) => {
                debug!(client = %self.addr, "Client disconnected mid-request")
            }
            Err(
                ConnectionError::Io(io_err)
                | ConnectionError::Protocol(ProtocolError::Io(io_err)),
            ) if io_err.kind() == std::io::ErrorKind::ConnectionReset => {
                debug!(client = %self.addr, "Connection reset by client")
            }
            Err(e) => warn!(client = %self.addr, error = %e, "Connection error"),
        }

        self.stats.connection_closed();
        result
    }

    /// The main read-execute-respond loop.
    async fn main_loop(&mut self) -> Result<(), ConnectionError> {
        loop {
            let request = match self.reader.read_request().await {
                Ok(Some(request)) => request,
                Ok(None) => return Ok(()),
                Err(e) if e.is_recoverable() => {
                    warn!(client = %self.addr, error = %e, "Dropping malformed request");
                    self.stats.command_dropped();
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            debug!(client = %self.addr, request = ?request, "Received request");

            match self.command_handler.execute(&request) {
                Ok(reply) => {
                    self.stats.command_processed();
                    debug!(client = %self.addr, reply = %reply, "Sending reply");
                    self.send_reply(&reply).await?;
                }
                Err(e) => {
                    // Failed commands get no reply on the wire.
                    warn!(client = %self.addr, error = %e, "Command failed");
                    self.stats.command_dropped();
                }
            }
        }
    }

    async fn send_reply(&mut self, reply: &Reply) -> Result<(), ConnectionError> {
        let bytes = reply.serialize();
        self.writer.write_all(&bytes).await?;
        self.writer.flush().await?;
        self.stats.bytes_written(bytes.len());
        trace!(client = %self.addr, bytes = bytes.len(), "Sent reply");
        Ok(())
    }
}

/// Handles a client connection to completion.
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    command_handler: CommandHandler,
    stats: Arc<ConnectionStats>,
) {
    let handler = ConnectionHandler::new(stream, addr, command_handler, stats);
    // `run` has already logged the outcome.
    let _ = handler.run().await;
}

/// Accepts connections forever, spawning one task per client.
///
/// Accept errors are logged and the loop continues.
pub async fn accept_loop(
    listener: TcpListener,
    command_handler: CommandHandler,
    stats: Arc<ConnectionStats>,
) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let handler = command_handler.clone();
                let stats = Arc::clone(&stats);

                tokio::spawn(async move {
                    handle_connection(stream, addr, handler, stats).await;
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::snapshot::testutil::SnapshotBuilder;
    use crate::storage::StorageEngine;
    use std::time::Duration;
    use tokio::io::AsyncReadExt;

    struct TestServer {
        addr: SocketAddr,
        stats: Arc<ConnectionStats>,
        _dir: tempfile::TempDir,
    }

    async fn create_test_server() -> TestServer {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = SnapshotBuilder::new()
            .database(0)
            .entry("foo", "bar")
            .entry("fruit", "apple")
            .finish();
        std::fs::write(dir.path().join("dump.rdb"), snapshot).unwrap();

        let config = ServerConfig {
            dir: dir.path().to_string_lossy().into_owned(),
            ..Default::default()
        };

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let stats = Arc::new(ConnectionStats::new());
        let handler = CommandHandler::new(Arc::new(StorageEngine::new()), Arc::new(config));

        tokio::spawn(accept_loop(listener, handler, Arc::clone(&stats)));

        TestServer {
            addr,
            stats,
            _dir: dir,
        }
    }

    /// Reads exactly `expected.len()` bytes and compares them.
    async fn expect_reply(client: &mut TcpStream, expected: &[u8]) {
        let mut buf = vec![0u8; expected.len()];
        tokio::time::timeout(Duration::from_secs(2), client.read_exact(&mut buf))
            .await
            .expect("timed out waiting for reply")
            .unwrap();
        assert_eq!(
            String::from_utf8_lossy(&buf),
            String::from_utf8_lossy(expected)
        );
    }

    /// Asserts nothing arrives within a short window.
    async fn expect_silence(client: &mut TcpStream) {
        let mut buf = [0u8; 64];
        let result =
            tokio::time::timeout(Duration::from_millis(100), client.read(&mut buf)).await;
        assert!(result.is_err(), "unexpected reply: {:?}", result);
    }

    #[tokio::test]
    async fn test_ping_pong() {
        let server = create_test_server().await;
        let mut client = TcpStream::connect(server.addr).await.unwrap();

        client.write_all(b"*1\r\n$4\r\nPING\r\n").await.unwrap();
        expect_reply(&mut client, b"+PONG\r\n").await;
    }

    #[tokio::test]
    async fn test_set_get() {
        let server = create_test_server().await;
        let mut client = TcpStream::connect(server.addr).await.unwrap();

        client
            .write_all(b"*3\r\n$3\r\nSET\r\n$4\r\nkey1\r\n$4\r\nval1\r\n")
            .await
            .unwrap();
        expect_reply(&mut client, b"+OK\r\n").await;

        client
            .write_all(b"*2\r\n$3\r\nGET\r\n$4\r\nkey1\r\n")
            .await
            .unwrap();
        expect_reply(&mut client, b"$4\r\nval1\r\n").await;

        client
            .write_all(b"*2\r\n$3\r\nGET\r\n$7\r\nmissing\r\n")
            .await
            .unwrap();
        expect_reply(&mut client, b"$-1\r\n").await;
    }

    #[tokio::test]
    async fn test_snapshot_backed_commands() {
        let server = create_test_server().await;
        let mut client = TcpStream::connect(server.addr).await.unwrap();

        client
            .write_all(b"*2\r\n$3\r\nGET\r\n$5\r\nfruit\r\n")
            .await
            .unwrap();
        expect_reply(&mut client, b"$5\r\napple\r\n").await;

        client
            .write_all(b"*2\r\n$4\r\nKEYS\r\n$1\r\n*\r\n")
            .await
            .unwrap();
        expect_reply(&mut client, b"*2\r\n$3\r\nfoo\r\n$5\r\nfruit\r\n").await;
    }

    #[tokio::test]
    async fn test_pipelined_commands_in_order() {
        let server = create_test_server().await;
        let mut client = TcpStream::connect(server.addr).await.unwrap();

        client
            .write_all(
                b"*3\r\n$3\r\nSET\r\n$2\r\nk1\r\n$2\r\nv1\r\n\
                  *3\r\n$3\r\nSET\r\n$2\r\nk1\r\n$2\r\nv2\r\n\
                  *2\r\n$3\r\nGET\r\n$2\r\nk1\r\n\
                  *2\r\n$4\r\nECHO\r\n$2\r\nHi\r\n",
            )
            .await
            .unwrap();

        expect_reply(&mut client, b"+OK\r\n+OK\r\n$2\r\nv2\r\n+hi\r\n").await;
    }

    #[tokio::test]
    async fn test_errors_keep_connection_open() {
        let server = create_test_server().await;
        let mut client = TcpStream::connect(server.addr).await.unwrap();

        // Not an array, unknown command, unknown config key: no reply for any
        client.write_all(b"HELLO\r\n").await.unwrap();
        client
            .write_all(b"*1\r\n$8\r\nFLUSHALL\r\n")
            .await
            .unwrap();
        client
            .write_all(b"*3\r\n$6\r\nCONFIG\r\n$3\r\nGET\r\n$5\r\nbogus\r\n")
            .await
            .unwrap();
        expect_silence(&mut client).await;

        client.write_all(b"*1\r\n$4\r\nPING\r\n").await.unwrap();
        expect_reply(&mut client, b"+PONG\r\n").await;

        assert_eq!(server.stats.commands_dropped.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn test_connections_share_store() {
        let server = create_test_server().await;
        let mut writer = TcpStream::connect(server.addr).await.unwrap();
        let mut reader = TcpStream::connect(server.addr).await.unwrap();

        writer
            .write_all(b"*3\r\n$3\r\nSET\r\n$6\r\nshared\r\n$3\r\nyes\r\n")
            .await
            .unwrap();
        expect_reply(&mut writer, b"+OK\r\n").await;

        reader
            .write_all(b"*2\r\n$3\r\nGET\r\n$6\r\nshared\r\n")
            .await
            .unwrap();
        expect_reply(&mut reader, b"$3\r\nyes\r\n").await;
    }

    #[tokio::test]
    async fn test_connection_stats() {
        let server = create_test_server().await;
        let stats = &server.stats;

        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 0);

        let mut client = TcpStream::connect(server.addr).await.unwrap();
        client.write_all(b"*1\r\n$4\r\nPING\r\n").await.unwrap();
        expect_reply(&mut client, b"+PONG\r\n").await;

        assert_eq!(stats.connections_accepted.load(Ordering::Relaxed), 1);
        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 1);
        assert_eq!(stats.commands_processed.load(Ordering::Relaxed), 1);
        assert_eq!(stats.bytes_written.load(Ordering::Relaxed), 7);

        drop(client);

        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 0);
    }
}
