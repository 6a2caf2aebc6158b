use crate::connection::ConnectionState;

/// Errors that can occur in client operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] fmlink_transport::TransportError),

    /// A command was issued before the connection opened.
    #[error("not connected")]
    NotConnected,

    /// The connection closed before or while the operation ran.
    #[error("transport closed")]
    TransportClosed,

    /// Operation timed out.
    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The operation is not allowed in the current lifecycle state.
    #[error("invalid connection state: {0:?}")]
    InvalidState(ConnectionState),

    /// I/O error on the open stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ClientError>;
