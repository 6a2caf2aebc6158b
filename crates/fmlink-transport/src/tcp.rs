use std::time::Duration;

use tokio::net::TcpStream;
use tracing::{debug, info};

use crate::endpoint::Endpoint;
use crate::error::{Result, TransportError};

/// Connect to a tuner service.
///
/// With `timeout` set, the attempt (name resolution included) fails with
/// [`TransportError::ConnectTimeout`] once it elapses. `None` waits for the
/// operating system to give up on its own.
pub async fn connect(endpoint: &Endpoint, timeout: Option<Duration>) -> Result<TcpStream> {
    debug!(%endpoint, ?timeout, "connecting");

    let attempt = TcpStream::connect((endpoint.host.as_str(), endpoint.port));
    let result = match timeout {
        Some(timeout) => tokio::time::timeout(timeout, attempt).await.map_err(|_| {
            TransportError::ConnectTimeout {
                endpoint: endpoint.clone(),
                timeout,
            }
        })?,
        None => attempt.await,
    };

    let stream = result.map_err(|source| TransportError::Connect {
        endpoint: endpoint.clone(),
        source,
    })?;
    // Device events are a few bytes each; don't let Nagle hold commands back.
    stream.set_nodelay(true)?;

    info!(%endpoint, "connected to tuner service");
    Ok(stream)
}
