//! Connection management.
//!
//! A [`Connection`] owns at most one TCP session with the controller. Each
//! session runs as a background task combining the framing read loop with the
//! status poll schedule. Transport errors tear the session down and schedule a
//! single reconnect after a cooldown; a clean close by the controller leaves
//! the connection dormant until [`Connection::connect`] is called again.

use crate::error::ClientError;
use crate::event::StatusEvent;
use airtouch_protocol::{
    Decoder, Encoder, Frame, ProtocolError, StatusMessage, StatusReport, SubMessage,
    SubMessageType,
};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Default read buffer size (1 KiB).
pub const DEFAULT_READ_BUFFER_SIZE: usize = 1024;

/// Minimum read buffer size.
pub const MIN_READ_BUFFER_SIZE: usize = 64;

/// Maximum read buffer size (64 KiB).
pub const MAX_READ_BUFFER_SIZE: usize = 64 * 1024;

/// Shortest accepted group poll period.
pub const MIN_GROUP_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Default capacity of the status event channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Controller hostname or IP address.
    pub host: String,
    /// Controller TCP port.
    pub port: u16,
    /// Connect timeout.
    pub connect_timeout: Duration,
    /// Read buffer size for socket reads.
    pub read_buffer_size: usize,
    /// Delay between the AC status poll and the first group status poll.
    pub group_poll_delay: Duration,
    /// Period of the recurring group status poll, measured from connect.
    pub group_poll_interval: Duration,
    /// Wait before each reconnect attempt.
    pub reconnect_cooldown: Duration,
    /// Status events buffered per subscriber.
    pub event_capacity: usize,
}

impl ConnectionConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: airtouch_protocol::DEFAULT_PORT,
            connect_timeout: Duration::from_secs(10),
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            group_poll_delay: Duration::from_secs(2),
            group_poll_interval: Duration::from_secs(285),
            reconnect_cooldown: Duration::from_secs(10),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.clamp(MIN_READ_BUFFER_SIZE, MAX_READ_BUFFER_SIZE);
        self
    }

    pub fn with_group_poll_delay(mut self, delay: Duration) -> Self {
        self.group_poll_delay = delay;
        self
    }

    pub fn with_group_poll_interval(mut self, interval: Duration) -> Self {
        self.group_poll_interval = interval.max(MIN_GROUP_POLL_INTERVAL);
        self
    }

    pub fn with_reconnect_cooldown(mut self, cooldown: Duration) -> Self {
        self.reconnect_cooldown = cooldown;
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }
}

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Connected,
            _ => ConnectionState::Disconnected,
        }
    }
}

/// Connection counters.
#[derive(Debug, Default)]
pub struct ConnectionStats {
    pub connects: AtomicU64,
    pub reconnect_attempts: AtomicU64,
    pub frames_received: AtomicU64,
    pub checksum_failures: AtomicU64,
    pub messages_sent: AtomicU64,
}

/// A managed connection to an Airtouch2+ controller.
pub struct Connection {
    config: ConnectionConfig,
    /// Write half of the current session.
    writer: Mutex<Option<OwnedWriteHalf>>,
    /// Background task of the current session.
    session: parking_lot::Mutex<Option<JoinHandle<()>>>,
    state: AtomicU8,
    /// Incremented on every connect attempt; identifies the current session.
    generation: AtomicU64,
    next_id: AtomicU8,
    /// Set while a reconnect task is pending.
    reconnecting: AtomicBool,
    /// Set by `close()`; suppresses reconnects.
    closed: AtomicBool,
    shutdown: broadcast::Sender<()>,
    events: broadcast::Sender<StatusEvent>,
    stats: ConnectionStats,
}

impl Connection {
    /// Creates a new connection (not yet connected).
    pub fn new(config: ConnectionConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let (shutdown, _) = broadcast::channel(1);
        Self {
            config,
            writer: Mutex::new(None),
            session: parking_lot::Mutex::new(None),
            state: AtomicU8::new(ConnectionState::Disconnected as u8),
            generation: AtomicU64::new(0),
            next_id: AtomicU8::new(1),
            reconnecting: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            shutdown,
            events,
            stats: ConnectionStats::default(),
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Returns whether a session is established.
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn stats(&self) -> &ConnectionStats {
        &self.stats
    }

    /// Subscribes to decoded status events.
    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.events.subscribe()
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    /// Returns the next message id, cycling through 1..=255.
    fn next_message_id(&self) -> u8 {
        self.next_id
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |id| {
                Some(if id == u8::MAX { 1 } else { id + 1 })
            })
            .unwrap_or_else(|id| id)
    }

    /// Connects to the controller and starts the session task.
    ///
    /// Clears a previous `close()`.
    pub async fn connect(self: &Arc<Self>) -> Result<(), ClientError> {
        self.closed.store(false, Ordering::SeqCst);
        self.establish().await
    }

    async fn establish(self: &Arc<Self>) -> Result<(), ClientError> {
        if self
            .state
            .compare_exchange(
                ConnectionState::Disconnected as u8,
                ConnectionState::Connecting as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_err()
        {
            return Err(ClientError::AlreadyConnected);
        }

        // Claimed before connecting so that errors from the previous session
        // are recognised as stale while this attempt is in flight.
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let host = self.config.host.as_str();
        let port = self.config.port;
        tracing::debug!("Connecting to {}:{} (session {})...", host, port, generation);

        let stream = match tokio::time::timeout(
            self.config.connect_timeout,
            TcpStream::connect((host, port)),
        )
        .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                tracing::debug!("Connection failed: {}", e);
                self.set_state(ConnectionState::Disconnected);
                return Err(ClientError::Io(e));
            }
            Err(_) => {
                tracing::debug!("Connection timeout");
                self.set_state(ConnectionState::Disconnected);
                return Err(ClientError::Timeout);
            }
        };

        stream.set_nodelay(true).ok();

        // `close()` takes the writer lock before cancelling the session, so
        // the session is either installed before it or never started.
        let mut writer_guard = self.writer.lock().await;
        if self.closed.load(Ordering::SeqCst)
            || self.generation.load(Ordering::SeqCst) != generation
        {
            tracing::debug!("Connect attempt {} cancelled, dropping stream", generation);
            self.set_state(ConnectionState::Disconnected);
            return Err(ClientError::ConnectionClosed);
        }

        let (reader, writer) = stream.into_split();
        *writer_guard = Some(writer);
        self.set_state(ConnectionState::Connected);
        self.stats.connects.fetch_add(1, Ordering::Relaxed);
        tracing::info!("Connected to Airtouch controller at {}:{}", host, port);

        let handle = tokio::spawn(Arc::clone(self).run_session(reader, generation));
        if let Some(previous) = self.session.lock().replace(handle) {
            previous.abort();
        }

        Ok(())
    }

    /// Runs one session until it closes, fails, or is shut down.
    async fn run_session(self: Arc<Self>, reader: OwnedReadHalf, generation: u64) {
        let mut shutdown_rx = self.shutdown.subscribe();

        let outcome = tokio::select! {
            result = self.read_loop(reader) => result,
            result = self.poll_loop(generation) => result,
            _ = shutdown_rx.recv() => {
                tracing::debug!("Session {} shutting down", generation);
                return;
            }
        };

        match outcome {
            Ok(()) => self.handle_close(generation).await,
            Err(e) => self.handle_transport_error(generation, e).await,
        }
    }

    /// Reads frames until the peer closes the stream.
    ///
    /// Returns `Ok(())` on a clean close and `Err` on a transport error.
    /// Corrupt frames are logged and skipped.
    pub(crate) async fn read_loop<R>(&self, mut reader: R) -> Result<(), ClientError>
    where
        R: AsyncRead + Unpin,
    {
        tracing::debug!("read_loop started");
        let mut decoder = Decoder::new();
        let mut buf = vec![0u8; self.config.read_buffer_size];

        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                if decoder.is_mid_frame() || decoder.buffered() > 0 {
                    tracing::debug!(
                        "read_loop: discarding {} bytes of incomplete frame",
                        decoder.buffered()
                    );
                }
                tracing::debug!("read_loop: connection closed by controller");
                return Ok(());
            }

            tracing::trace!("read_loop: received {} bytes", n);
            decoder.extend(&buf[..n]);

            loop {
                match decoder.decode_frame() {
                    Ok(Some(frame)) => self.dispatch(frame),
                    Ok(None) => break,
                    Err(e @ ProtocolError::CrcMismatch { .. }) => {
                        self.stats.checksum_failures.fetch_add(1, Ordering::Relaxed);
                        tracing::warn!("Discarding frame: {}", e);
                    }
                    Err(e) => tracing::warn!("Discarding frame: {}", e),
                }
            }
        }
    }

    /// Decodes a frame body and publishes the status it carries.
    fn dispatch(&self, frame: Frame) {
        self.stats.frames_received.fetch_add(1, Ordering::Relaxed);

        if !frame.has_controller_header() {
            tracing::warn!(
                "Unexpected frame header: magic={} address={}",
                hex::encode(frame.magic),
                hex::encode(frame.address)
            );
        }
        tracing::debug!(
            "Received message id={} body={}",
            frame.message_id,
            hex::encode(&frame.body)
        );

        match StatusMessage::from_frame(&frame) {
            Ok(StatusMessage::Ac(report)) => {
                log_report("AC", frame.message_id, &report);
                self.publish(StatusEvent::Ac(report.records));
            }
            Ok(StatusMessage::Groups(report)) => {
                log_report("group", frame.message_id, &report);
                self.publish(StatusEvent::Groups(report.records));
            }
            Ok(StatusMessage::Unknown(sub_type)) => {
                tracing::info!(
                    "Ignoring message id={} with sub-message type {:#04x}",
                    frame.message_id,
                    sub_type.code()
                );
            }
            Err(e) => {
                tracing::warn!("Failed to decode message id={}: {}", frame.message_id, e);
            }
        }
    }

    fn publish(&self, event: StatusEvent) {
        // No receivers is not an error.
        let _ = self.events.send(event);
    }

    /// Polls AC status immediately, group status after the configured delay,
    /// then group status on a fixed period. Returns only on a send failure.
    async fn poll_loop(&self, generation: u64) -> Result<(), ClientError> {
        let started = Instant::now();
        let period = self.config.group_poll_interval.max(MIN_GROUP_POLL_INTERVAL);

        self.poll(generation, SubMessageType::AcStatus).await?;
        tokio::time::sleep(self.config.group_poll_delay).await;
        self.poll(generation, SubMessageType::GroupStatus).await?;

        let mut ticker = tokio::time::interval_at(started + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.poll(generation, SubMessageType::GroupStatus).await?;
        }
    }

    /// Sends a status request, unless the session is no longer current.
    async fn poll(&self, generation: u64, sub_type: SubMessageType) -> Result<(), ClientError> {
        if !self.is_current(generation) {
            tracing::debug!("Skipping {:?} poll for stale session {}", sub_type, generation);
            return Ok(());
        }
        self.send(&SubMessage::status_request(sub_type)).await
    }

    fn is_current(&self, generation: u64) -> bool {
        self.is_connected() && self.generation.load(Ordering::SeqCst) == generation
    }

    /// Frames and writes a sub-message.
    pub async fn send(&self, message: &SubMessage) -> Result<(), ClientError> {
        if !self.is_connected() {
            return Err(ClientError::NotConnected);
        }

        let id = self.next_message_id();
        let encoded = Encoder::encode_sub_message(id, message)?;
        tracing::debug!(
            "Sending message id={} sub-message type {:#04x} ({} bytes): {}",
            id,
            message.sub_type.code(),
            encoded.len(),
            hex::encode(&encoded)
        );

        let mut writer_guard = self.writer.lock().await;
        let writer = writer_guard.as_mut().ok_or(ClientError::NotConnected)?;
        writer.write_all(&encoded).await?;
        self.stats.messages_sent.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Handles a clean close by the controller. No reconnect follows.
    async fn handle_close(&self, generation: u64) {
        if self.generation.load(Ordering::SeqCst) != generation {
            return;
        }
        tracing::info!("Disconnected from Airtouch controller");
        self.teardown(generation).await;
    }

    /// Tears down the session that failed and schedules a reconnect.
    ///
    /// Errors from superseded sessions are ignored, and at most one reconnect
    /// is pending at a time.
    async fn handle_transport_error(self: &Arc<Self>, generation: u64, error: ClientError) {
        if self.closed.load(Ordering::SeqCst) {
            tracing::debug!("Ignoring error after close: {}", error);
            return;
        }
        if self.generation.load(Ordering::SeqCst) != generation {
            tracing::debug!("Ignoring error from stale session {}: {}", generation, error);
            return;
        }

        tracing::warn!("Connection error: {}", error);
        self.teardown(generation).await;
        self.schedule_reconnect();
    }

    /// Spawns the reconnect task unless one is already pending.
    pub(crate) fn schedule_reconnect(self: &Arc<Self>) {
        if self.reconnecting.swap(true, Ordering::SeqCst) {
            tracing::debug!("Reconnect already scheduled");
            return;
        }
        tracing::info!("Reconnecting in {:?}", self.config.reconnect_cooldown);
        tokio::spawn(Arc::clone(self).reconnect_loop());
    }

    fn reconnect_loop(self: Arc<Self>) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        Box::pin(async move {
            let mut shutdown_rx = self.shutdown.subscribe();

            loop {
                tokio::select! {
                    _ = tokio::time::sleep(self.config.reconnect_cooldown) => {}
                    _ = shutdown_rx.recv() => break,
                }

                if self.closed.load(Ordering::SeqCst) {
                    tracing::debug!("Connection closed, abandoning reconnect");
                    break;
                }
                if self.state() != ConnectionState::Disconnected {
                    tracing::debug!("Already reconnected, skipping");
                    break;
                }

                self.stats.reconnect_attempts.fetch_add(1, Ordering::Relaxed);
                tracing::info!(
                    "Attempting reconnect to {}:{}",
                    self.config.host,
                    self.config.port
                );

                // A session established below may fail straight away and must
                // be able to schedule its own reconnect.
                self.reconnecting.store(false, Ordering::SeqCst);
                match self.establish().await {
                    Ok(()) | Err(ClientError::AlreadyConnected) => return,
                    Err(_) if self.closed.load(Ordering::SeqCst) => {
                        tracing::debug!("Connection closed during reconnect");
                        break;
                    }
                    Err(e) => {
                        tracing::warn!("Reconnect failed: {}", e);
                        if self.reconnecting.swap(true, Ordering::SeqCst) {
                            return;
                        }
                    }
                }
            }

            self.reconnecting.store(false, Ordering::SeqCst);
        })
    }

    /// Drops the writer of the given session and marks the connection
    /// disconnected. No-op if a newer session or attempt has started.
    async fn teardown(&self, generation: u64) {
        let mut writer_guard = self.writer.lock().await;
        self.teardown_locked(&mut writer_guard, generation).await;
    }

    async fn teardown_locked(&self, writer: &mut Option<OwnedWriteHalf>, generation: u64) {
        if self.generation.load(Ordering::SeqCst) != generation {
            return;
        }
        // An attempt in `Connecting` resolves its own state.
        let _ = self.state.compare_exchange(
            ConnectionState::Connected as u8,
            ConnectionState::Disconnected as u8,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
        if let Some(mut writer) = writer.take() {
            tracing::debug!("Shutting down writer");
            let _ = writer.shutdown().await;
        }
    }

    /// Closes the connection and cancels any pending reconnect or connect
    /// attempt.
    pub async fn close(&self) -> Result<(), ClientError> {
        tracing::debug!("Closing connection...");
        self.closed.store(true, Ordering::SeqCst);
        let _ = self.shutdown.send(());

        let mut writer_guard = self.writer.lock().await;
        let session = self.session.lock().take();
        if let Some(handle) = session {
            handle.abort();
        }

        self.teardown_locked(&mut writer_guard, self.generation.load(Ordering::SeqCst))
            .await;
        tracing::debug!("Connection closed");
        Ok(())
    }
}

fn log_report<T>(kind: &str, message_id: u8, report: &StatusReport<T>) {
    if !report.is_consistent() {
        tracing::warn!(
            "{} status id={} announced {} units but carried {} bytes ({} discarded)",
            kind,
            message_id,
            report.declared_count,
            report.repeat_data_len,
            report.discarded_bytes()
        );
    }
    tracing::debug!(
        "{} status id={}: {} records",
        kind,
        message_id,
        report.records.len()
    );
}
