//! TCP connect with a bounded connect timeout.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use rlog_engine::transport::connect;
//!
//! # async fn run() -> rlog_engine::Result<()> {
//! let stream = connect("10.0.0.2:5800", Duration::from_secs(3)).await?;
//! # drop(stream);
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::io;
use std::time::Duration;

use tokio::net::{TcpStream, ToSocketAddrs};

use crate::error::{RlogError, Result};

/// Connect to a live server.
///
/// The attempt is abandoned after `timeout` and never retried.
///
/// # Errors
///
/// - [`RlogError::TransportTimeout`] if the attempt did not complete in time
/// - [`RlogError::Io`] if it was refused or otherwise failed
pub async fn connect(addr: impl ToSocketAddrs, timeout: Duration) -> Result<TcpStream> {
    let stream = with_connect_timeout(TcpStream::connect(addr), timeout).await?;
    if let Err(e) = stream.set_nodelay(true) {
        tracing::warn!("Failed to set TCP_NODELAY: {}", e);
    }
    tracing::debug!(peer = ?stream.peer_addr().ok(), "Connected");
    Ok(stream)
}

/// Bound any connect future by `timeout`.
pub(crate) async fn with_connect_timeout<F, T>(attempt: F, timeout: Duration) -> Result<T>
where
    F: Future<Output = io::Result<T>>,
{
    match tokio::time::timeout(timeout, attempt).await {
        Ok(result) => Ok(result?),
        Err(_) => {
            tracing::warn!(?timeout, "Connect attempt timed out");
            Err(RlogError::TransportTimeout(timeout))
        }
    }
}
