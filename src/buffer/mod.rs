//! Bounded, id-tagged buffer primitives shared by the broker and its
//! ports.

pub mod bounded;
pub mod port;

pub use bounded::BoundedBufferWithId;
pub use port::BufferPort;
