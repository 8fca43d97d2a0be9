//! A4: archive writer trait boundary. A real HDF5 backend stays out of
//! scope (wiring an HDF5 C library is orthogonal to the decoder); this
//! module provides the trait plus two in-tree test doubles.

use std::sync::Mutex;

use crate::event::Event;

/// Consumes fully-decoded events. Implementations must tolerate
/// out-of-order delivery (§5): the worker pool does not restore file order.
pub trait ArchiveWriter: Send + Sync {
    fn write(&self, event: Event);
    fn finish(&self) {}
}

/// Discards every event. Useful for throughput measurement or when only
/// side effects (logging, counters) matter.
#[derive(Default)]
pub struct NullWriter;

impl ArchiveWriter for NullWriter {
    fn write(&self, _event: Event) {}
}

/// Buffers every written event in memory, for test assertions.
#[derive(Default)]
pub struct RecordingWriter {
    events: Mutex<Vec<Event>>,
}

impl RecordingWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().expect("recording writer mutex poisoned").clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().expect("recording writer mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ArchiveWriter for RecordingWriter {
    fn write(&self, event: Event) {
        self.events
            .lock()
            .expect("recording writer mutex poisoned")
            .push(event);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn null_writer_accepts_and_discards() {
        let writer = NullWriter;
        writer.write(Event::new(1, 1));
    }

    #[test]
    fn recording_writer_buffers_every_written_event() {
        let writer = RecordingWriter::new();
        writer.write(Event::new(1, 1));
        writer.write(Event::new(1, 2));
        assert_eq!(writer.len(), 2);
        assert_eq!(writer.events()[0].event_id, 1);
    }
}
