//! Fan-out of decoded radio name and text to a publish/subscribe sink.
//!
//! The sink only ever sees values that were already decoded and handled;
//! it has no say in protocol processing.

use fmlink_frame::Event;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::trace;

use crate::handler::EventHandler;

/// Which RDS field a publication carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RadioField {
    Name,
    Text,
}

/// One message on the configured topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Publication {
    pub topic: String,
    pub field: RadioField,
    pub value: String,
}

/// A publish/subscribe sink.
pub trait Publisher: Send {
    fn publish(&mut self, publication: Publication);
}

impl<F> Publisher for F
where
    F: FnMut(Publication) + Send,
{
    fn publish(&mut self, publication: Publication) {
        self(publication);
    }
}

/// In-process bus backed by a `tokio` broadcast channel.
///
/// Publishing with no subscriber is not an error; slow subscribers lag and
/// lose the oldest messages.
#[derive(Debug, Clone)]
pub struct BroadcastPublisher {
    tx: broadcast::Sender<Publication>,
}

impl BroadcastPublisher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Publication> {
        self.tx.subscribe()
    }
}

impl Publisher for BroadcastPublisher {
    fn publish(&mut self, publication: Publication) {
        if self.tx.send(publication).is_err() {
            trace!("no subscribers for publication");
        }
    }
}

/// Wraps a handler and republishes radio name and text on `topic`.
///
/// The inner handler always runs first.
#[derive(Debug)]
pub struct Fanout<H, P> {
    inner: H,
    publisher: P,
    topic: String,
}

impl<H, P> Fanout<H, P>
where
    H: EventHandler,
    P: Publisher,
{
    pub fn new(inner: H, publisher: P, topic: impl Into<String>) -> Self {
        Self {
            inner,
            publisher,
            topic: topic.into(),
        }
    }

    fn publish(&mut self, field: RadioField, value: String) {
        self.publisher.publish(Publication {
            topic: self.topic.clone(),
            field,
            value,
        });
    }
}

impl<H, P> EventHandler for Fanout<H, P>
where
    H: EventHandler,
    P: Publisher,
{
    fn on_volume(&mut self, volume: u8) {
        self.inner.on_volume(volume);
    }

    fn on_channel(&mut self, channel: u16) {
        self.inner.on_channel(channel);
    }

    fn on_radio_name(&mut self, name: &str) {
        self.inner.on_radio_name(name);
        self.publish(RadioField::Name, name.to_string());
    }

    fn on_radio_text(&mut self, text: &str) {
        self.inner.on_radio_text(text);
        self.publish(RadioField::Text, text.to_string());
    }

    fn on_event(&mut self, event: Event) {
        let published = match &event {
            Event::RadioName(name) => Some((RadioField::Name, name.clone())),
            Event::RadioText(text) => Some((RadioField::Text, text.clone())),
            Event::Volume(_) | Event::Channel(_) => None,
        };
        self.inner.on_event(event);
        if let Some((field, value)) = published {
            self.publish(field, value);
        }
    }
}
