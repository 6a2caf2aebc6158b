use fmlink_frame::{decode_events, FrameError, FrameReassembler};
use tracing::trace;

use crate::handler::EventHandler;

/// Decode one frame payload, invoking `handler` for each event as it is read.
///
/// Returns the number of events dispatched. An unknown tag or a truncated
/// event aborts the rest of the payload; events already handed to `handler`
/// stay handled.
pub fn dispatch_payload<H>(payload: &[u8], handler: &mut H) -> Result<usize, FrameError>
where
    H: EventHandler + ?Sized,
{
    decode_events(payload, |event| {
        trace!(event = event.tag().name(), "dispatching");
        handler.on_event(event);
    })
}

/// Frame reassembly and event dispatch for one connection.
///
/// Owns the working buffer and the handler; the read loop pushes every
/// transport read through [`feed`](Dispatcher::feed).
#[derive(Debug)]
pub struct Dispatcher<H> {
    reassembler: FrameReassembler,
    handler: H,
}

impl<H: EventHandler> Dispatcher<H> {
    pub fn new(handler: H) -> Self {
        Self {
            reassembler: FrameReassembler::new(),
            handler,
        }
    }

    pub fn with_capacity(handler: H, capacity: usize) -> Self {
        Self {
            reassembler: FrameReassembler::with_capacity(capacity),
            handler,
        }
    }

    /// Push one transport read through reassembly and dispatch.
    ///
    /// Returns the number of complete frames processed. On error the working
    /// buffer is empty and the next call starts from a clean state.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<usize, FrameError> {
        let handler = &mut self.handler;
        self.reassembler.feed(chunk, |frame| {
            dispatch_payload(&frame.payload, &mut *handler).map(|_| ())
        })
    }

    pub fn reset(&mut self) {
        self.reassembler.reset();
    }

    pub fn capacity(&self) -> usize {
        self.reassembler.capacity()
    }

    /// See [`FrameReassembler::free_space`].
    pub fn free_space(&self) -> usize {
        self.reassembler.free_space()
    }

    pub fn buffered(&self) -> usize {
        self.reassembler.len()
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

}

#[cfg(test)]
mod tests {
    use fmlink_frame::Event;

    use super::*;

    #[derive(Debug, Default)]
    struct Recorder {
        events: Vec<Event>,
    }

    impl EventHandler for Recorder {
        fn on_event(&mut self, event: Event) {
            self.events.push(event);
        }
    }

    #[test]
    fn dispatches_each_event_kind() {
        let mut recorder = Recorder::default();
        dispatch_payload(&[0x01, 0x05], &mut recorder).unwrap();
        dispatch_payload(&[0x02, 0x03, 0xBA], &mut recorder).unwrap();
        dispatch_payload(&[0x05, 0x03, b'A', b'B', b'C'], &mut recorder).unwrap();

        assert_eq!(
            recorder.events,
            vec![
                Event::Volume(5),
                Event::Channel(954),
                Event::RadioName("ABC".to_string()),
            ]
        );
    }

    #[test]
    fn unknown_tag_keeps_earlier_dispatch() {
        let mut recorder = Recorder::default();
        let result = dispatch_payload(&[0x01, 0x05, 0xFF], &mut recorder);
        assert_eq!(result, Err(FrameError::UnknownEventType(0xFF)));
        assert_eq!(recorder.events, vec![Event::Volume(5)]);
    }

    #[test]
    fn feed_reassembles_across_chunks() {
        let mut dispatcher = Dispatcher::new(Recorder::default());
        assert_eq!(dispatcher.feed(&[0x04]), Ok(0));
        assert_eq!(dispatcher.buffered(), 1);
        assert_eq!(dispatcher.feed(&[0x02, 0x03, 0xBA, 0x03, 0x01]), Ok(1));
        assert_eq!(dispatcher.feed(&[0x05]), Ok(1));

        assert_eq!(
            dispatcher.handler().events,
            vec![Event::Channel(954), Event::Volume(5)]
        );
    }

    #[test]
    fn feed_error_resets_and_recovers() {
        let mut dispatcher = Dispatcher::new(Recorder::default());
        let result = dispatcher.feed(&[0x02, 0xFF, 0x03, 0x01]);
        assert_eq!(result, Err(FrameError::UnknownEventType(0xFF)));
        assert_eq!(dispatcher.buffered(), 0);

        assert_eq!(dispatcher.feed(&[0x03, 0x01, 0x02]), Ok(1));
        assert_eq!(dispatcher.handler().events, vec![Event::Volume(2)]);
    }

    #[test]
    fn overflow_leaves_buffer_empty() {
        let mut dispatcher = Dispatcher::with_capacity(Recorder::default(), 8);
        assert_eq!(dispatcher.free_space(), 7);
        let result = dispatcher.feed(&[0x07, 0x06, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06]);
        assert_eq!(
            result,
            Err(FrameError::BufferOverflow {
                size: 8,
                capacity: 8
            })
        );
        assert_eq!(dispatcher.buffered(), 0);
        assert!(dispatcher.handler().events.is_empty());
    }
}
