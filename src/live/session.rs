//! Live session builder and read loop.
//!
//! The [`LiveSessionBuilder`] collects a [`LiveConfig`] through a fluent API.
//! A [`LiveSession`] owns two tasks:
//! 1. Read task: reads chunks, reassembles frames, decodes each frame as one
//!    cycle and forwards the entries
//! 2. Heartbeat task: writes the marker on a fixed interval
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use rlog_engine::live::{LiveEvent, LiveSession};
//!
//! # async fn run() -> rlog_engine::Result<()> {
//! let mut session = LiveSession::builder()
//!     .idle_timeout(Duration::from_secs(3))
//!     .connect("10.0.0.2:5800")
//!     .await?;
//!
//! while let Some(event) = session.recv().await {
//!     match event {
//!         LiveEvent::Entries(entries) => println!("{} entries", entries.len()),
//!         other => println!("session ended: {:?}", other),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::net::ToSocketAddrs;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::heartbeat::spawn_heartbeat_task;
use super::{CloseReason, LiveEvent, LiveStatus};
use crate::config::{DecoderConfig, LiveConfig};
use crate::error::{RlogError, Result};
use crate::protocol::{DecodeMode, FrameBuffer, WireDecoder};
use crate::transport;

/// Read buffer size for socket reads.
const READ_BUFFER_SIZE: usize = 16 * 1024;

/// Whole milliseconds, rounding any sub-millisecond remainder up so that a
/// non-zero duration never becomes zero.
fn millis_rounded_up(duration: Duration) -> u64 {
    let mut millis = duration.as_millis();
    if duration.subsec_nanos() % 1_000_000 != 0 {
        millis += 1;
    }
    u64::try_from(millis).unwrap_or(u64::MAX)
}

/// Builder for configuring and opening a live session.
#[derive(Debug, Clone, Default)]
pub struct LiveSessionBuilder {
    config: LiveConfig,
}

impl LiveSessionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a full configuration (e.g. loaded from JSON).
    pub fn from_config(config: LiveConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LiveConfig {
        &self.config
    }

    /// Port used by [`connect_host`](Self::connect_host).
    ///
    /// Default: 5800
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Bound on a single connect attempt.
    ///
    /// Default: 3 seconds
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout_ms = millis_rounded_up(timeout);
        self
    }

    /// Close the session when no bytes arrive for this long.
    ///
    /// Default: 3 seconds
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.idle_timeout_ms = millis_rounded_up(timeout);
        self
    }

    /// Delay between heartbeats. Zero disables the heartbeat.
    ///
    /// Default: 500 ms
    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.config.heartbeat_interval_ms = millis_rounded_up(interval);
        self
    }

    /// Marker bytes written on each heartbeat. Empty disables the heartbeat.
    ///
    /// Default: `[6, 3, 2, 8]`
    pub fn heartbeat_data(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.config.heartbeat_data = data.into();
        self
    }

    /// Largest accepted frame payload.
    ///
    /// Default: 64 MiB
    pub fn max_frame_payload(mut self, max: u32) -> Self {
        self.config.max_frame_payload = max;
        self
    }

    /// Capacity of the event channel. The read task waits when it is full.
    ///
    /// Default: 256
    pub fn event_channel_capacity(mut self, capacity: usize) -> Self {
        self.config.event_channel_capacity = capacity;
        self
    }

    pub fn decoder_config(mut self, decoder: DecoderConfig) -> Self {
        self.config.decoder = decoder;
        self
    }

    /// Connect over TCP and start the session.
    ///
    /// # Errors
    ///
    /// [`RlogError::TransportTimeout`] if the connect attempt exceeds the
    /// configured bound, [`RlogError::Io`] if it fails. Not retried.
    pub async fn connect(self, addr: impl ToSocketAddrs) -> Result<LiveSession> {
        let stream = transport::connect(addr, self.config.connect_timeout()).await?;
        Ok(self.attach(stream))
    }

    /// Connect to `host` on the configured port.
    pub async fn connect_host(self, host: &str) -> Result<LiveSession> {
        let addr = format!("{}:{}", host, self.config.port);
        self.connect(addr).await
    }

    /// Start a session over an already-connected duplex stream.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn attach<S>(self, stream: S) -> LiveSession
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        LiveSession::start(stream, self.config)
    }
}

/// A running live session.
///
/// Dropping the session (or calling [`stop`](Self::stop)) cancels both tasks.
pub struct LiveSession {
    events: mpsc::Receiver<LiveEvent>,
    status: watch::Receiver<LiveStatus>,
    read_task: JoinHandle<()>,
    heartbeat_task: Option<JoinHandle<()>>,
}

impl LiveSession {
    pub fn builder() -> LiveSessionBuilder {
        LiveSessionBuilder::new()
    }

    fn start<S>(stream: S, config: LiveConfig) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        let (event_tx, event_rx) = mpsc::channel(config.event_channel_capacity.max(1));
        let (status_tx, status_rx) = watch::channel(LiveStatus::Connecting);
        let (failure_tx, failure_rx) = mpsc::channel(1);

        let heartbeat_enabled =
            config.heartbeat_interval_ms > 0 && !config.heartbeat_data.is_empty();
        let heartbeat_task = if heartbeat_enabled {
            Some(spawn_heartbeat_task(
                writer,
                Bytes::from(config.heartbeat_data.clone()),
                config.heartbeat_interval(),
                failure_tx,
            ))
        } else {
            None
        };
        let heartbeat_abort = heartbeat_task.as_ref().map(JoinHandle::abort_handle);

        let read_loop = ReadLoop {
            frames: FrameBuffer::with_max_payload(config.max_frame_payload),
            decoder: WireDecoder::with_config(config.decoder.clone()),
            events: event_tx,
            idle_timeout: config.idle_timeout(),
        };

        let read_task = tokio::spawn(async move {
            let _ = status_tx.send(LiveStatus::Active);
            read_loop.run(reader, failure_rx, &status_tx).await;
            if let Some(handle) = heartbeat_abort {
                handle.abort();
            }
        });

        Self {
            events: event_rx,
            status: status_rx,
            read_task,
            heartbeat_task,
        }
    }

    /// Next event, or `None` once the terminal event has been received.
    pub async fn recv(&mut self) -> Option<LiveEvent> {
        self.events.recv().await
    }

    pub fn status(&self) -> LiveStatus {
        *self.status.borrow()
    }

    /// Watch handle for status changes.
    pub fn status_receiver(&self) -> watch::Receiver<LiveStatus> {
        self.status.clone()
    }

    /// Cancel the session. No event is delivered after this returns.
    pub fn stop(self) {
        tracing::debug!("Live session stopped");
        // Drop aborts both tasks and closes the channel.
    }

    fn abort_tasks(&self) {
        self.read_task.abort();
        if let Some(task) = &self.heartbeat_task {
            task.abort();
        }
    }
}

impl Drop for LiveSession {
    fn drop(&mut self) {
        self.abort_tasks();
    }
}

struct ReadLoop {
    frames: FrameBuffer,
    decoder: WireDecoder,
    events: mpsc::Sender<LiveEvent>,
    idle_timeout: Duration,
}

impl ReadLoop {
    /// Run until the session ends, then publish the status and send the
    /// terminal event.
    async fn run<R>(
        mut self,
        mut reader: R,
        mut failures: mpsc::Receiver<RlogError>,
        status: &watch::Sender<LiveStatus>,
    ) where
        R: AsyncRead + Unpin,
    {
        let terminal = match self.read_until_end(&mut reader, &mut failures).await {
            Ok(Some(reason)) => {
                tracing::info!(?reason, "Live session closed");
                LiveEvent::Closed(reason)
            }
            Ok(None) => return,
            Err(e) => {
                tracing::error!("Live session error: {}", e);
                LiveEvent::Error(e)
            }
        };

        if !self.frames.is_empty() {
            tracing::debug!(bytes = self.frames.len(), "Discarding partial frame");
            self.frames.clear();
        }
        let _ = status.send(match terminal {
            LiveEvent::Error(_) => LiveStatus::Error,
            _ => LiveStatus::Closed,
        });
        let _ = self.events.send(terminal).await;
    }

    /// `Ok(None)` means the event receiver was dropped.
    async fn read_until_end<R>(
        &mut self,
        reader: &mut R,
        failures: &mut mpsc::Receiver<RlogError>,
    ) -> Result<Option<CloseReason>>
    where
        R: AsyncRead + Unpin,
    {
        let mut buf = vec![0u8; READ_BUFFER_SIZE];
        let idle = tokio::time::sleep(self.idle_timeout);
        tokio::pin!(idle);

        loop {
            tokio::select! {
                biased;

                read = reader.read(&mut buf) => {
                    let n = read?;
                    if n == 0 {
                        return Ok(Some(CloseReason::PeerClosed));
                    }
                    if !self.handle_chunk(&buf[..n]).await? {
                        return Ok(None);
                    }
                    // Time spent waiting on a full event channel is not idle time
                    idle.as_mut().reset(Instant::now() + self.idle_timeout);
                }
                _ = &mut idle => {
                    tracing::warn!(timeout = ?self.idle_timeout, "No data from live peer");
                    return Ok(Some(CloseReason::IdleTimeout));
                }
                Some(e) = failures.recv() => return Err(e),
            }
        }
    }

    /// Decode every frame the chunk completes. Returns `false` if the event
    /// receiver is gone.
    async fn handle_chunk(&mut self, chunk: &[u8]) -> Result<bool> {
        let mut entries = Vec::new();
        for frame in self.frames.push(chunk)? {
            if frame.is_empty() {
                continue;
            }
            entries.extend(self.decoder.decode(frame.payload(), DecodeMode::Incremental)?);
            entries.extend(self.decoder.flush());
        }
        if entries.is_empty() {
            return Ok(true);
        }
        tracing::trace!(count = entries.len(), "Decoded live entries");
        Ok(self.events.send(LiveEvent::Entries(entries)).await.is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Entry, Value};
    use crate::protocol::{build_frame, EntryEncoder};
    use tokio::io::{AsyncReadExt as _, AsyncWriteExt};

    fn quiet_builder() -> LiveSessionBuilder {
        LiveSession::builder().heartbeat_interval(Duration::ZERO)
    }

    #[test]
    fn test_builder_configuration() {
        let builder = LiveSession::builder()
            .port(5810)
            .connect_timeout(Duration::from_millis(100))
            .idle_timeout(Duration::from_millis(200))
            .heartbeat_interval(Duration::from_millis(50))
            .heartbeat_data(vec![9])
            .max_frame_payload(1024)
            .event_channel_capacity(8);

        let config = builder.config();
        assert_eq!(config.port, 5810);
        assert_eq!(config.connect_timeout(), Duration::from_millis(100));
        assert_eq!(config.idle_timeout(), Duration::from_millis(200));
        assert_eq!(config.heartbeat_interval(), Duration::from_millis(50));
        assert_eq!(config.heartbeat_data, vec![9]);
        assert_eq!(config.max_frame_payload, 1024);
        assert_eq!(config.event_channel_capacity, 8);
    }

    #[test]
    fn test_sub_millisecond_durations_round_up() {
        let builder = LiveSession::builder()
            .idle_timeout(Duration::from_micros(500))
            .connect_timeout(Duration::from_micros(1_200))
            .heartbeat_interval(Duration::ZERO);

        let config = builder.config();
        assert_eq!(config.idle_timeout_ms, 1);
        assert_eq!(config.connect_timeout_ms, 2);
        assert_eq!(config.heartbeat_interval_ms, 0);
    }

    #[tokio::test]
    async fn test_frames_become_entries() {
        let (client, mut server) = tokio::io::duplex(4096);
        let mut session = quiet_builder().attach(client);

        let mut encoder = EntryEncoder::new();
        for t in [1.0, 2.0] {
            let payload = encoder
                .encode_entry(&Entry::new(t).with("/V", Value::Integer(t as i32)))
                .unwrap();
            server.write_all(&build_frame(&payload).unwrap()).await.unwrap();
        }

        let mut received = Vec::new();
        while received.len() < 2 {
            match session.recv().await.unwrap() {
                LiveEvent::Entries(entries) => received.extend(entries),
                other => panic!("unexpected event {:?}", other),
            }
        }
        assert_eq!(received[0].timestamp, 1.0);
        assert_eq!(received[1].updates[0].value, Some(Value::Integer(2)));
        assert_eq!(session.status(), LiveStatus::Active);
    }

    #[tokio::test]
    async fn test_peer_close_is_terminal() {
        let (client, server) = tokio::io::duplex(64);
        let mut session = quiet_builder().attach(client);
        drop(server);

        assert!(matches!(
            session.recv().await,
            Some(LiveEvent::Closed(CloseReason::PeerClosed))
        ));
        assert!(session.recv().await.is_none());
        assert_eq!(session.status(), LiveStatus::Closed);
    }

    #[tokio::test]
    async fn test_incompatible_revision_is_error() {
        let (client, mut server) = tokio::io::duplex(64);
        let mut session = quiet_builder().attach(client);
        server.write_all(&build_frame(&[9, 0]).unwrap()).await.unwrap();

        match session.recv().await {
            Some(LiveEvent::Error(RlogError::FormatIncompatible { revision })) => {
                assert_eq!(revision, 9)
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert!(session.recv().await.is_none());
        assert_eq!(session.status(), LiveStatus::Error);
    }

    #[tokio::test]
    async fn test_oversized_frame_is_error() {
        let (client, mut server) = tokio::io::duplex(64);
        let mut session = quiet_builder().max_frame_payload(8).attach(client);
        server.write_all(&100u32.to_be_bytes()).await.unwrap();

        assert!(matches!(
            session.recv().await,
            Some(LiveEvent::Error(RlogError::Protocol(_)))
        ));
    }

    #[tokio::test]
    async fn test_stop_releases_connection() {
        let (client, mut server) = tokio::io::duplex(64);
        let session = quiet_builder().attach(client);

        session.stop();

        // both halves dropped once the read task is aborted
        let mut buf = [0u8; 4];
        assert_eq!(server.read(&mut buf).await.unwrap(), 0);
    }
}
