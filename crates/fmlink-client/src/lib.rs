//! Async client for the tuner service.
//!
//! Connect to the device, send volume and channel commands, and receive the
//! events it reports through an [`EventHandler`]. Decoded radio name and text
//! can additionally be fanned out to a [`Publisher`].

pub mod config;
pub mod connection;
pub mod dispatch;
pub mod error;
pub mod handler;
pub mod publish;

pub use config::{
    default_endpoint, ClientConfig, FramingPolicy, DEFAULT_CHANNEL, DEFAULT_HOST, DEFAULT_PORT,
    DEFAULT_TIMEOUT, DEFAULT_VOLUME,
};
pub use connection::{CloseReason, Connection, ConnectionState};
pub use dispatch::{dispatch_payload, Dispatcher};
pub use error::{ClientError, Result};
pub use handler::{EventForwarder, EventHandler, HandlerRegistry, LoggingHandler};
pub use publish::{BroadcastPublisher, Fanout, Publication, Publisher, RadioField};
