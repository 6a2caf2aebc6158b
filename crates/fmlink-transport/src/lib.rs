//! TCP transport for the tuner service.
//!
//! The device speaks over a single bidirectional TCP stream with no handshake
//! beyond the transport's own connect. This is the lowest layer of fmlink:
//! it resolves an [`Endpoint`] and yields a connected stream. Everything else
//! builds on top of the stream returned here.

pub mod endpoint;
pub mod error;
pub mod tcp;

pub use endpoint::Endpoint;
pub use error::{Result, TransportError};
pub use tcp::connect;
