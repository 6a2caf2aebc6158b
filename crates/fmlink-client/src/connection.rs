use std::fmt;
use std::io::ErrorKind;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use bytes::BytesMut;
use fmlink_frame::{Command, FrameError};
use fmlink_transport::Endpoint;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::config::{ClientConfig, FramingPolicy};
use crate::dispatch::Dispatcher;
use crate::error::{ClientError, Result};
use crate::handler::EventHandler;

/// Lifecycle of a [`Connection`]. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    Idle = 0,
    Connecting = 1,
    Open = 2,
    Closed = 3,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ConnectionState::Idle,
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Open,
            _ => ConnectionState::Closed,
        }
    }
}

/// Why a connection reached [`ConnectionState::Closed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The device ended the stream.
    EndOfStream,
    /// The transport failed.
    Transport(String),
    /// A framing error under [`FramingPolicy::FailFast`].
    Framing(FrameError),
    /// Closed by the owner (or dropped).
    Local,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::EndOfStream => write!(f, "end of stream"),
            CloseReason::Transport(err) => write!(f, "transport failure: {err}"),
            CloseReason::Framing(err) => write!(f, "framing error: {err}"),
            CloseReason::Local => write!(f, "closed locally"),
        }
    }
}

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;
type BoxedHandler = Box<dyn EventHandler>;

/// State shared between the owner and the read loop.
struct Shared {
    state: AtomicU8,
    closed: CancellationToken,
    reason: OnceLock<CloseReason>,
}

impl Shared {
    fn new() -> Self {
        Self {
            state: AtomicU8::new(ConnectionState::Idle as u8),
            closed: CancellationToken::new(),
            reason: OnceLock::new(),
        }
    }

    fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn transition(&self, from: ConnectionState, to: ConnectionState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Record `reason` and wake everything waiting on the connection.
    ///
    /// Only the first call takes effect.
    fn close(&self, reason: CloseReason) -> bool {
        let first = self.reason.set(reason).is_ok();
        self.state
            .store(ConnectionState::Closed as u8, Ordering::Release);
        self.closed.cancel();
        if first {
            if let Some(reason) = self.reason.get() {
                info!(%reason, "connection closed");
            }
        }
        first
    }
}

/// One client connection to the tuner service.
///
/// Inbound frames are reassembled and dispatched to the handler on a
/// background task. Commands are written from the caller's task. All
/// methods take `&self`, so the connection can be shared behind an `Arc`.
pub struct Connection {
    shared: Arc<Shared>,
    writer: tokio::sync::Mutex<Option<BoxedWriter>>,
    handler: Mutex<Option<BoxedHandler>>,
    config: ClientConfig,
}

impl Connection {
    /// Create an idle connection with default configuration.
    pub fn new(handler: impl EventHandler + 'static) -> Self {
        Self::with_config(handler, ClientConfig::default())
    }

    pub fn with_config(handler: impl EventHandler + 'static, config: ClientConfig) -> Self {
        Self {
            shared: Arc::new(Shared::new()),
            writer: tokio::sync::Mutex::new(None),
            handler: Mutex::new(Some(Box::new(handler))),
            config,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Connect over TCP and start processing inbound events.
    ///
    /// Only valid from [`ConnectionState::Idle`]; there is no reconnect.
    /// A failed attempt leaves the connection closed.
    pub async fn connect(&self, endpoint: &Endpoint) -> Result<()> {
        self.begin_connect()?;

        match fmlink_transport::connect(endpoint, self.config.connect_timeout).await {
            Ok(stream) => self.open(stream).await,
            Err(err) => {
                self.shared.close(CloseReason::Transport(err.to_string()));
                Err(err.into())
            }
        }
    }

    /// Open over an already connected stream.
    ///
    /// Same lifecycle as [`connect`](Connection::connect); useful for
    /// transports other than plain TCP.
    pub async fn attach<S>(&self, stream: S) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        self.begin_connect()?;
        self.open(stream).await
    }

    fn begin_connect(&self) -> Result<()> {
        if self
            .shared
            .transition(ConnectionState::Idle, ConnectionState::Connecting)
        {
            debug!("connecting");
            Ok(())
        } else {
            Err(ClientError::InvalidState(self.state()))
        }
    }

    async fn open<S>(&self, stream: S) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let handler = self
            .handler
            .lock()
            .ok()
            .and_then(|mut slot| slot.take())
            .ok_or(ClientError::InvalidState(self.state()))?;

        let (reader, writer) = tokio::io::split(stream);
        *self.writer.lock().await = Some(Box::new(writer));

        if !self
            .shared
            .transition(ConnectionState::Connecting, ConnectionState::Open)
        {
            // Closed while connecting: release the socket now.
            if let Some(mut writer) = self.writer.lock().await.take() {
                if let Err(err) = writer.shutdown().await {
                    debug!(error = %err, "shutdown after close failed");
                }
            }
            return Err(ClientError::InvalidState(self.state()));
        }

        let dispatcher = Dispatcher::with_capacity(handler, self.config.buffer_capacity);
        tokio::spawn(read_loop(
            reader,
            dispatcher,
            Arc::clone(&self.shared),
            self.config.framing_policy,
        ));

        debug!("connection open");
        Ok(())
    }

    /// Ask the device to change its volume. Only the low 8 bits are sent.
    pub async fn set_volume(&self, level: u32) -> Result<()> {
        self.send(Command::set_volume(level)).await
    }

    /// Ask the device to tune to `channel`. Only the low 16 bits are sent.
    pub async fn set_channel(&self, channel: u32) -> Result<()> {
        self.send(Command::set_channel(channel)).await
    }

    /// Write one command frame.
    ///
    /// Resolves once the bytes are handed to the transport. Fails with
    /// [`ClientError::NotConnected`] before the connection opens and with
    /// [`ClientError::TransportClosed`] if it closes first.
    pub async fn send(&self, command: Command) -> Result<()> {
        match self.state() {
            ConnectionState::Open => {}
            ConnectionState::Closed => return Err(ClientError::TransportClosed),
            ConnectionState::Idle | ConnectionState::Connecting => {
                return Err(ClientError::NotConnected)
            }
        }

        let mut frame = BytesMut::with_capacity(command.wire_size());
        command.encode(&mut frame);

        let closed = self.shared.closed.clone();
        tokio::select! {
            biased;
            _ = closed.cancelled() => Err(ClientError::TransportClosed),
            result = self.write_frame(&frame) => result,
        }?;

        trace!(?command, "command sent");
        Ok(())
    }

    async fn write_frame(&self, frame: &[u8]) -> Result<()> {
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(ClientError::TransportClosed)?;

        let write = async {
            writer.write_all(frame).await?;
            writer.flush().await
        };
        let result = match self.config.write_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, write).await {
                Ok(result) => result,
                Err(_) => {
                    // A partial frame may be on the wire; the stream is unusable.
                    self.shared
                        .close(CloseReason::Transport("write timed out".to_string()));
                    return Err(ClientError::Timeout(timeout));
                }
            },
            None => write.await,
        };

        result.map_err(|err| {
            self.shared.close(CloseReason::Transport(err.to_string()));
            ClientError::Io(err)
        })
    }

    /// Wait until the connection closes and report why.
    pub async fn closed(&self) -> CloseReason {
        self.shared.closed.cancelled().await;
        self.shared
            .reason
            .get()
            .cloned()
            .unwrap_or(CloseReason::Local)
    }

    /// Close the connection. Idempotent.
    ///
    /// Pending writes fail with [`ClientError::TransportClosed`] and the
    /// read loop stops before processing another chunk.
    pub async fn close(&self) {
        self.shared.close(CloseReason::Local);
        if let Some(mut writer) = self.writer.lock().await.take() {
            if let Err(err) = writer.shutdown().await {
                debug!(error = %err, "shutdown after close failed");
            }
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("state", &self.state())
            .field("config", &self.config)
            .finish()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.shared.close(CloseReason::Local);
    }
}

async fn read_loop<R>(
    mut reader: R,
    mut dispatcher: Dispatcher<BoxedHandler>,
    shared: Arc<Shared>,
    policy: FramingPolicy,
) where
    R: AsyncRead + Unpin,
{
    let mut chunk = vec![0u8; dispatcher.capacity().max(1)];

    loop {
        // Never read more than the working buffer can take, so batched
        // traffic can't overflow just because of how the socket chunked it.
        let limit = dispatcher.free_space().clamp(1, chunk.len());
        let read = tokio::select! {
            biased;
            _ = shared.closed.cancelled() => return,
            read = reader.read(&mut chunk[..limit]) => read,
        };

        match read {
            Ok(0) => {
                shared.close(CloseReason::EndOfStream);
                return;
            }
            Ok(n) => {
                if let Err(err) = dispatcher.feed(&chunk[..n]) {
                    match policy {
                        FramingPolicy::ResetAndContinue => {
                            warn!(error = %err, "framing error, buffered bytes discarded");
                        }
                        FramingPolicy::FailFast => {
                            warn!(error = %err, "framing error, closing connection");
                            shared.close(CloseReason::Framing(err));
                            return;
                        }
                    }
                }
            }
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => {
                shared.close(CloseReason::Transport(err.to_string()));
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use fmlink_frame::Event;
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt, DuplexStream};
    use tokio::sync::mpsc::UnboundedReceiver;

    use super::*;
    use crate::handler::{EventForwarder, LoggingHandler};

    async fn open_pair(config: ClientConfig) -> (Connection, DuplexStream, UnboundedReceiver<Event>) {
        let (forwarder, events) = EventForwarder::channel();
        let conn = Connection::with_config(forwarder, config);
        let (client, device) = duplex(256);
        conn.attach(client).await.unwrap();
        (conn, device, events)
    }

    async fn next_event(events: &mut UnboundedReceiver<Event>) -> Event {
        tokio::time::timeout(Duration::from_secs(2), events.recv())
            .await
            .expect("event should arrive")
            .expect("channel should stay open")
    }

    #[tokio::test]
    async fn write_before_connect_is_not_connected() {
        let conn = Connection::new(LoggingHandler);
        assert_eq!(conn.state(), ConnectionState::Idle);
        assert!(matches!(
            conn.set_volume(3).await,
            Err(ClientError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn write_while_connecting_is_not_connected() {
        let conn = Connection::new(LoggingHandler);
        conn.begin_connect().unwrap();
        assert_eq!(conn.state(), ConnectionState::Connecting);
        assert!(matches!(
            conn.set_channel(931).await,
            Err(ClientError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn close_during_connect_releases_the_stream() {
        let conn = Connection::new(LoggingHandler);
        conn.begin_connect().unwrap();
        conn.close().await;

        let (client, mut device) = duplex(16);
        let result = conn.open(client).await;
        assert!(matches!(
            result,
            Err(ClientError::InvalidState(ConnectionState::Closed))
        ));
        assert!(conn.writer.lock().await.is_none());

        let mut buf = [0u8; 1];
        let read = tokio::time::timeout(Duration::from_secs(2), device.read(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(read, 0);
    }

    #[tokio::test]
    async fn commands_reach_the_device() {
        let (conn, mut device, _events) = open_pair(ClientConfig::default()).await;
        assert_eq!(conn.state(), ConnectionState::Open);

        conn.set_volume(300).await.unwrap();
        conn.set_channel(978).await.unwrap();

        let mut buf = [0u8; 7];
        device.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, [0x03, 0x01, 0x2C, 0x04, 0x02, 0x03, 0xD2]);
    }

    #[tokio::test]
    async fn concurrent_commands_do_not_interleave() {
        let (conn, mut device, _events) = open_pair(ClientConfig::default()).await;

        let (volume, channel) = tokio::join!(conn.set_volume(1), conn.set_channel(931));
        volume.unwrap();
        channel.unwrap();

        let mut buf = [0u8; 7];
        device.read_exact(&mut buf).await.unwrap();
        let volume_first = [0x03, 0x01, 0x01, 0x04, 0x02, 0x03, 0xA3];
        let channel_first = [0x04, 0x02, 0x03, 0xA3, 0x03, 0x01, 0x01];
        assert!(buf == volume_first || buf == channel_first, "got {buf:?}");
    }

    #[tokio::test]
    async fn inbound_batch_is_dispatched_in_order() {
        let (_conn, mut device, mut events) = open_pair(ClientConfig::default()).await;

        device
            .write_all(&[0x03, 0x01, 0x05, 0x04, 0x02, 0x03, 0xBA, 0x06, 0x05, 0x03])
            .await
            .unwrap();
        device.write_all(b"ABC").await.unwrap();

        assert_eq!(next_event(&mut events).await, Event::Volume(5));
        assert_eq!(next_event(&mut events).await, Event::Channel(954));
        assert_eq!(
            next_event(&mut events).await,
            Event::RadioName("ABC".to_string())
        );
    }

    #[tokio::test]
    async fn batch_larger_than_buffer_is_read_in_pieces() {
        let (_conn, mut device, mut events) = open_pair(ClientConfig::default()).await;

        // 60 volume frames, 180 bytes in one write.
        let wire: Vec<u8> = (0..60u8).flat_map(|v| [0x03, 0x01, v]).collect();
        device.write_all(&wire).await.unwrap();

        for expected in 0..60u8 {
            assert_eq!(next_event(&mut events).await, Event::Volume(expected));
        }
    }

    #[tokio::test]
    async fn device_end_of_stream_closes() {
        let (conn, device, _events) = open_pair(ClientConfig::default()).await;
        drop(device);

        let reason = tokio::time::timeout(Duration::from_secs(2), conn.closed())
            .await
            .unwrap();
        assert_eq!(reason, CloseReason::EndOfStream);
        assert_eq!(conn.state(), ConnectionState::Closed);
        assert!(matches!(
            conn.set_volume(1).await,
            Err(ClientError::TransportClosed)
        ));
    }

    #[tokio::test]
    async fn framing_error_resets_and_continues_by_default() {
        let (conn, mut device, mut events) = open_pair(ClientConfig::default()).await;

        device.write_all(&[0x02, 0xFF]).await.unwrap();
        device.write_all(&[0x03, 0x01, 0x09]).await.unwrap();

        assert_eq!(next_event(&mut events).await, Event::Volume(9));
        assert_eq!(conn.state(), ConnectionState::Open);
    }

    #[tokio::test]
    async fn framing_error_closes_under_fail_fast() {
        let config = ClientConfig {
            framing_policy: FramingPolicy::FailFast,
            ..ClientConfig::default()
        };
        let (conn, mut device, _events) = open_pair(config).await;

        device.write_all(&[0x02, 0xFF]).await.unwrap();

        let reason = tokio::time::timeout(Duration::from_secs(2), conn.closed())
            .await
            .unwrap();
        assert_eq!(reason, CloseReason::Framing(FrameError::UnknownEventType(0xFF)));
    }

    #[tokio::test]
    async fn pending_write_fails_when_connection_closes() {
        let (forwarder, _events) = EventForwarder::channel();
        let conn = Arc::new(Connection::with_config(
            forwarder,
            ClientConfig {
                write_timeout: None,
                ..ClientConfig::default()
            },
        ));
        // One byte of buffering: the 4-byte frame can't complete until the
        // device reads, which it never does.
        let (client, _device) = duplex(1);
        conn.attach(client).await.unwrap();

        let pending = tokio::spawn({
            let conn = Arc::clone(&conn);
            async move { conn.set_channel(931).await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!pending.is_finished());

        conn.close().await;
        let result = tokio::time::timeout(Duration::from_secs(2), pending)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(result, Err(ClientError::TransportClosed)));
    }

    #[tokio::test]
    async fn stalled_write_times_out() {
        let (forwarder, _events) = EventForwarder::channel();
        let conn = Connection::with_config(
            forwarder,
            ClientConfig {
                write_timeout: Some(Duration::from_millis(20)),
                ..ClientConfig::default()
            },
        );
        let (client, _device) = duplex(1);
        conn.attach(client).await.unwrap();

        let result = conn.set_channel(931).await;
        assert!(matches!(result, Err(ClientError::Timeout(_))));
        assert_eq!(conn.state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn close_is_idempotent_and_terminal() {
        let (conn, _device, _events) = open_pair(ClientConfig::default()).await;

        conn.close().await;
        conn.close().await;
        assert_eq!(conn.closed().await, CloseReason::Local);
        assert_eq!(conn.state(), ConnectionState::Closed);

        let (client, _other) = duplex(16);
        assert!(matches!(
            conn.attach(client).await,
            Err(ClientError::InvalidState(ConnectionState::Closed))
        ));
    }

    #[tokio::test]
    async fn close_reason_is_recorded_once() {
        let (conn, device, _events) = open_pair(ClientConfig::default()).await;
        conn.close().await;
        drop(device);
        tokio::task::yield_now().await;

        assert_eq!(conn.closed().await, CloseReason::Local);
    }

    #[tokio::test]
    async fn connect_failure_leaves_connection_closed() {
        let port = {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let conn = Connection::new(LoggingHandler);
        let err = conn
            .connect(&Endpoint::new("127.0.0.1", port))
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::Transport(_)));
        assert_eq!(conn.state(), ConnectionState::Closed);
        assert!(matches!(
            conn.closed().await,
            CloseReason::Transport(_)
        ));
    }

    #[tokio::test]
    async fn connect_over_tcp() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let device = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 3];
            socket.read_exact(&mut buf).await.unwrap();
            socket.write_all(&[0x03, 0x01, buf[2]]).await.unwrap();
            socket
        });

        let (forwarder, mut events) = EventForwarder::channel();
        let conn = Connection::new(forwarder);
        conn.connect(&Endpoint::new("127.0.0.1", port)).await.unwrap();
        conn.set_volume(7).await.unwrap();

        assert_eq!(next_event(&mut events).await, Event::Volume(7));
        drop(device.await.unwrap());
    }
}
