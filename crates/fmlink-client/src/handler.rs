//! Event handler capability.
//!
//! A handler has one method per event kind. Every method defaults to logging
//! the value, so an implementation only overrides what it cares about.

use fmlink_frame::Event;
use tokio::sync::mpsc;
use tracing::{info, trace};

fn log_volume(volume: u8) {
    info!(volume, "volume");
}

fn log_channel(channel: u16) {
    info!(channel, "channel");
}

fn log_radio_name(name: &str) {
    info!(name, "radio name");
}

fn log_radio_text(text: &str) {
    info!(text, "radio text");
}

/// Receives decoded device events.
///
/// Called synchronously from the connection's read loop, one event at a
/// time and in wire order. Implementations should not block.
pub trait EventHandler: Send {
    fn on_volume(&mut self, volume: u8) {
        log_volume(volume);
    }

    fn on_channel(&mut self, channel: u16) {
        log_channel(channel);
    }

    fn on_radio_name(&mut self, name: &str) {
        log_radio_name(name);
    }

    fn on_radio_text(&mut self, text: &str) {
        log_radio_text(text);
    }

    /// Route one decoded event to the matching method.
    fn on_event(&mut self, event: Event) {
        match event {
            Event::Volume(volume) => self.on_volume(volume),
            Event::Channel(channel) => self.on_channel(channel),
            Event::RadioName(name) => self.on_radio_name(&name),
            Event::RadioText(text) => self.on_radio_text(&text),
        }
    }
}

impl<H: EventHandler + ?Sized> EventHandler for Box<H> {
    fn on_volume(&mut self, volume: u8) {
        (**self).on_volume(volume);
    }

    fn on_channel(&mut self, channel: u16) {
        (**self).on_channel(channel);
    }

    fn on_radio_name(&mut self, name: &str) {
        (**self).on_radio_name(name);
    }

    fn on_radio_text(&mut self, text: &str) {
        (**self).on_radio_text(text);
    }

    fn on_event(&mut self, event: Event) {
        (**self).on_event(event);
    }
}

/// Logs every event at `info` level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingHandler;

impl EventHandler for LoggingHandler {}

type Callback<T> = Box<dyn FnMut(T) + Send>;
type TextCallback = Box<dyn for<'a> FnMut(&'a str) + Send>;

/// Closure-per-event handler.
///
/// Events without a registered callback are logged.
///
/// ```
/// use fmlink_client::HandlerRegistry;
///
/// let handler = HandlerRegistry::new()
///     .on_volume(|volume| println!("volume is now {volume}"))
///     .on_radio_name(|name| println!("tuned to {name}"));
/// # drop(handler);
/// ```
#[derive(Default)]
pub struct HandlerRegistry {
    volume: Option<Callback<u8>>,
    channel: Option<Callback<u16>>,
    radio_name: Option<TextCallback>,
    radio_text: Option<TextCallback>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_volume(mut self, callback: impl FnMut(u8) + Send + 'static) -> Self {
        self.volume = Some(Box::new(callback));
        self
    }

    pub fn on_channel(mut self, callback: impl FnMut(u16) + Send + 'static) -> Self {
        self.channel = Some(Box::new(callback));
        self
    }

    pub fn on_radio_name(mut self, callback: impl FnMut(&str) + Send + 'static) -> Self {
        self.radio_name = Some(Box::new(callback));
        self
    }

    pub fn on_radio_text(mut self, callback: impl FnMut(&str) + Send + 'static) -> Self {
        self.radio_text = Some(Box::new(callback));
        self
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("volume", &self.volume.is_some())
            .field("channel", &self.channel.is_some())
            .field("radio_name", &self.radio_name.is_some())
            .field("radio_text", &self.radio_text.is_some())
            .finish()
    }
}

impl EventHandler for HandlerRegistry {
    fn on_volume(&mut self, volume: u8) {
        match &mut self.volume {
            Some(callback) => callback(volume),
            None => log_volume(volume),
        }
    }

    fn on_channel(&mut self, channel: u16) {
        match &mut self.channel {
            Some(callback) => callback(channel),
            None => log_channel(channel),
        }
    }

    fn on_radio_name(&mut self, name: &str) {
        match &mut self.radio_name {
            Some(callback) => callback(name),
            None => log_radio_name(name),
        }
    }

    fn on_radio_text(&mut self, text: &str) {
        match &mut self.radio_text {
            Some(callback) => callback(text),
            None => log_radio_text(text),
        }
    }
}

/// Forwards events into an unbounded channel for async consumers.
#[derive(Debug, Clone)]
pub struct EventForwarder {
    tx: mpsc::UnboundedSender<Event>,
}

impl EventForwarder {
    pub fn new(tx: mpsc::UnboundedSender<Event>) -> Self {
        Self { tx }
    }

    /// Create a forwarder together with the receiving end.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    fn forward(&self, event: Event) {
        if self.tx.send(event).is_err() {
            trace!("event receiver dropped");
        }
    }
}

impl EventHandler for EventForwarder {
    fn on_volume(&mut self, volume: u8) {
        self.forward(Event::Volume(volume));
    }

    fn on_channel(&mut self, channel: u16) {
        self.forward(Event::Channel(channel));
    }

    fn on_radio_name(&mut self, name: &str) {
        self.forward(Event::RadioName(name.to_string()));
    }

    fn on_radio_text(&mut self, text: &str) {
        self.forward(Event::RadioText(text.to_string()));
    }

    fn on_event(&mut self, event: Event) {
        self.forward(event);
    }
}
