//! Heartbeat task: writes a fixed marker to the peer on an interval.
//!
//! Outbound only. A failed write is reported once to the read task, which
//! ends the session.

use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::error::RlogError;

/// Spawn the heartbeat loop. The first marker is sent one `period` after
/// start.
pub(crate) fn spawn_heartbeat_task<W>(
    mut writer: W,
    marker: Bytes,
    period: Duration,
    failures: mpsc::Sender<RlogError>,
) -> JoinHandle<()>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticks = interval_at(Instant::now() + period, period);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticks.tick().await;
            if let Err(e) = write_marker(&mut writer, &marker).await {
                tracing::debug!("Heartbeat write failed: {}", e);
                let _ = failures.try_send(RlogError::Io(e));
                return;
            }
            tracing::trace!(len = marker.len(), "Heartbeat sent");
        }
    })
}

async fn write_marker<W: AsyncWrite + Unpin>(writer: &mut W, marker: &[u8]) -> std::io::Result<()> {
    writer.write_all(marker).await?;
    writer.flush().await
}
