//! Two-slot output buffer.
//!
//! One slot holds the bytes of the write currently in flight; the other
//! accumulates everything produced meanwhile. At most one write is
//! outstanding, so bursts of records coalesce into one transport write.

#[derive(Debug, Default)]
pub struct Outbox {
    in_flight: Vec<u8>,
    accumulating: Vec<u8>,
    writing: bool,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer new output is appended to.
    pub fn buffer_mut(&mut self) -> &mut Vec<u8> {
        &mut self.accumulating
    }

    /// Start a write if none is in flight and output is waiting.
    ///
    /// Returns the bytes to hand to the transport.
    pub fn begin_write(&mut self) -> Option<&[u8]> {
        if self.writing || self.accumulating.is_empty() {
            return None;
        }
        core::mem::swap(&mut self.in_flight, &mut self.accumulating);
        self.writing = true;
        Some(&self.in_flight)
    }

    /// The in-flight write finished. Returns false if there was none.
    pub fn write_complete(&mut self) -> bool {
        if !self.writing {
            return false;
        }
        self.in_flight.clear();
        self.writing = false;
        true
    }

    pub fn is_writing(&self) -> bool {
        self.writing
    }

    /// Nothing in flight and nothing waiting.
    pub fn is_idle(&self) -> bool {
        !self.writing && self.accumulating.is_empty()
    }

    /// Bytes waiting behind the in-flight write.
    pub fn pending_len(&self) -> usize {
        self.accumulating.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_outbox_has_nothing_to_write() {
        let mut outbox = Outbox::new();
        assert!(outbox.begin_write().is_none());
        assert!(outbox.is_idle());
        assert!(!outbox.write_complete());
    }

    #[test]
    fn coalesces_while_in_flight() {
        let mut outbox = Outbox::new();
        outbox.buffer_mut().extend_from_slice(b"one");
        assert_eq!(outbox.begin_write(), Some(&b"one"[..]));

        outbox.buffer_mut().extend_from_slice(b"two");
        outbox.buffer_mut().extend_from_slice(b"three");
        assert!(outbox.begin_write().is_none());
        assert_eq!(outbox.pending_len(), 8);

        assert!(outbox.write_complete());
        assert_eq!(outbox.begin_write(), Some(&b"twothree"[..]));
        assert!(outbox.write_complete());
        assert!(outbox.is_idle());
    }

    #[test]
    fn output_during_write_waits_for_completion() {
        let mut outbox = Outbox::new();
        outbox.buffer_mut().push(1);
        outbox.begin_write();
        outbox.buffer_mut().push(2);
        assert!(outbox.is_writing());
        assert!(!outbox.is_idle());
        outbox.write_complete();
        assert!(!outbox.is_idle());
        assert_eq!(outbox.begin_write(), Some(&[2u8][..]));
    }
}
