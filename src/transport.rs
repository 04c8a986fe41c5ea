//! TCP bring-up for the two session roles.
//!
//! Context mode listens and accepts exactly one peer; frame mode dials out,
//! retrying until the bounded wait elapses so the two processes may start in
//! either order. Steady-state socket handling lives with the engine's
//! service loop, not here.

use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::time::{sleep, timeout, timeout_at, Instant};

use crate::error::{RemoteError, Result};

/// Delay between connect attempts in frame mode.
const CONNECT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Bind `port` and accept exactly one inbound connection within `wait`.
pub(crate) async fn accept_one(port: u16, wait: Duration) -> Result<TcpStream> {
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::debug!(port, "waiting for debugger frame to connect");

    match timeout(wait, listener.accept()).await {
        Ok(Ok((stream, peer))) => {
            tracing::debug!(%peer, "accepted connection");
            stream.set_nodelay(true)?;
            Ok(stream)
        }
        Ok(Err(e)) => Err(RemoteError::Io(e)),
        Err(_) => Err(RemoteError::ConnectionTimeout),
    }
}

/// Connect to `host:port`, retrying until `wait` elapses.
///
/// The context may not be listening yet when the frame starts, so refusals
/// are retried. At the deadline the failure is reported as
/// `ConnectionRefused` if the last attempt was actively refused, otherwise
/// `ConnectionTimeout`.
pub(crate) async fn connect_retry(host: &str, port: u16, wait: Duration) -> Result<TcpStream> {
    let deadline = Instant::now() + wait;
    let mut last_refused = false;

    loop {
        match timeout_at(deadline, TcpStream::connect((host, port))).await {
            Ok(Ok(stream)) => {
                tracing::debug!(host, port, "connected to debuggee context");
                stream.set_nodelay(true)?;
                return Ok(stream);
            }
            Ok(Err(e)) => {
                last_refused = e.kind() == std::io::ErrorKind::ConnectionRefused;
                tracing::debug!(host, port, error = %e, "connect attempt failed, retrying");
            }
            Err(_) => break,
        }

        if Instant::now() + CONNECT_RETRY_DELAY >= deadline {
            break;
        }
        sleep(CONNECT_RETRY_DELAY).await;
    }

    if last_refused {
        Err(RemoteError::ConnectionRefused)
    } else {
        Err(RemoteError::ConnectionTimeout)
    }
}
