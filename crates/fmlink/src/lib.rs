//! Client for the FM tuner service.
//!
//! The device streams volume, channel and RDS updates over TCP as
//! length-prefixed frames and accepts volume and channel commands on the same
//! stream.
//!
//! # Crate Structure
//!
//! - [`transport`]: endpoint parsing and TCP connect
//! - [`frame`]: frame reassembly, event decoding and command encoding
//! - [`client`]: connection lifecycle, event handlers and pub/sub fan-out

/// Re-export transport types.
pub mod transport {
    pub use fmlink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use fmlink_frame::*;
}

/// Re-export client types.
pub mod client {
    pub use fmlink_client::*;
}
