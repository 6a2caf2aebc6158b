use std::time::Duration;

use fmlink_frame::DEFAULT_BUFFER_CAPACITY;
use fmlink_transport::Endpoint;

/// Address the tuner service listens on out of the box.
pub const DEFAULT_HOST: &str = "192.168.7.2";
pub const DEFAULT_PORT: u16 = 9502;

/// Volume and channel applied by the runner right after connecting.
pub const DEFAULT_VOLUME: u32 = 1;
pub const DEFAULT_CHANNEL: u32 = 931;

/// Connect and write timeout used unless configured otherwise.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

pub fn default_endpoint() -> Endpoint {
    Endpoint::new(DEFAULT_HOST, DEFAULT_PORT)
}

/// What the read loop does after a framing or decoding error.
///
/// Either way the working buffer has already been emptied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FramingPolicy {
    /// Log the error and keep reading from the next chunk.
    #[default]
    ResetAndContinue,
    /// Close the connection with [`CloseReason::Framing`](crate::CloseReason::Framing).
    FailFast,
}

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Working buffer capacity for frame reassembly.
    pub buffer_capacity: usize,
    /// Bound on the TCP connect. `None` waits for the OS.
    pub connect_timeout: Option<Duration>,
    /// Bound on a single command write. `None` waits indefinitely.
    pub write_timeout: Option<Duration>,
    pub framing_policy: FramingPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            connect_timeout: Some(DEFAULT_TIMEOUT),
            write_timeout: Some(DEFAULT_TIMEOUT),
            framing_policy: FramingPolicy::default(),
        }
    }
}
