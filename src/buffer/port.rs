//! `BufferPort<T>` — the pair of queues a producer or consumer enrolls
//! with a broker: one for raw (unprocessed) items flowing out, one for
//! processed items flowing back in.

use std::sync::Arc;

use super::bounded::BoundedBufferWithId;
use crate::constants::DEFAULT_BUFFER_SIZE;

/// A matched pair of bounded buffers, sharing one port id once enrolled.
pub struct BufferPort<T> {
    pub raw: Arc<BoundedBufferWithId<T>>,
    pub processed: Arc<BoundedBufferWithId<T>>,
}

impl<T> BufferPort<T> {
    /// Creates a port with both halves at [`DEFAULT_BUFFER_SIZE`].
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUFFER_SIZE)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            raw: Arc::new(BoundedBufferWithId::new(capacity)),
            processed: Arc::new(BoundedBufferWithId::new(capacity)),
        }
    }

    /// The port id, once a broker has enrolled this port (both halves
    /// are always tagged together, so either one answers).
    pub fn id(&self) -> Option<u64> {
        self.raw.id()
    }

    pub(crate) fn set_id(&self, id: u64) {
        self.raw.set_id(id);
        self.processed.set_id(id);
    }
}

impl<T> Default for BufferPort<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_port_has_no_id_until_set() {
        let port: BufferPort<i32> = BufferPort::new();
        assert_eq!(port.id(), None);
        port.set_id(5);
        assert_eq!(port.id(), Some(5));
        assert_eq!(port.raw.id(), port.processed.id());
    }
}
