use std::fmt;
use std::io;

use fmlink_client::{ClientError, CloseReason};
use fmlink_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe => TRANSPORT_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::InvalidEndpoint { .. } => CliError::new(USAGE, format!("{context}: {err}")),
        TransportError::ConnectTimeout { .. } => {
            CliError::new(TIMEOUT, format!("{context}: {err}"))
        }
        TransportError::Connect { .. } => {
            CliError::new(TRANSPORT_ERROR, format!("{context}: {err}"))
        }
        TransportError::Io(source) => io_error(context, source),
    }
}

pub fn client_error(context: &str, err: ClientError) -> CliError {
    match err {
        ClientError::Transport(err) => transport_error(context, err),
        ClientError::Io(source) => io_error(context, source),
        ClientError::Timeout(_) => CliError::new(TIMEOUT, format!("{context}: {err}")),
        ClientError::NotConnected | ClientError::TransportClosed => {
            CliError::new(FAILURE, format!("{context}: {err}"))
        }
        ClientError::InvalidState(_) => CliError::new(INTERNAL, format!("{context}: {err}")),
    }
}

/// Map an unrequested close to the code the process exits with.
pub fn close_error(reason: &CloseReason) -> CliError {
    let code = match reason {
        CloseReason::EndOfStream => FAILURE,
        CloseReason::Transport(_) => TRANSPORT_ERROR,
        CloseReason::Framing(_) => DATA_INVALID,
        CloseReason::Local => INTERNAL,
    };
    CliError::new(code, format!("connection lost: {reason}"))
}
