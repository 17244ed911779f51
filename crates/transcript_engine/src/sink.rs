use std::sync::mpsc;

use engine_logging::engine_trace;
use transcript_core::Event;

/// Destination for run events. Implementations must never block the caller.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: Event);
}

/// Unbounded FIFO sink backed by a std channel.
pub struct ChannelEventSink {
    tx: mpsc::Sender<Event>,
}

impl ChannelEventSink {
    pub fn new(tx: mpsc::Sender<Event>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelEventSink {
    fn emit(&self, event: Event) {
        engine_trace!("event {:?}", event);
        // A dropped receiver means nobody is listening any more.
        let _ = self.tx.send(event);
    }
}
