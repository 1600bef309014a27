//! Consumer abstraction: a worker that pulls raw carriers from the
//! broker, processes them, and returns results. Two variants share the
//! same capability set (init, process-loop, shutdown): an in-process
//! thread pool and a networked TCP server.

pub mod thread_pool;
pub mod tcp;

pub use thread_pool::ThreadPoolConsumer;
pub use tcp::TcpServerConsumer;

/// Lifecycle hooks every consumer implements.
pub trait Consumer {
    /// Starts the consumer's worker thread(s)/reactor. Idempotent.
    fn start(&self);
    /// Signals shutdown and blocks until every worker has finished its
    /// in-flight item and exited. Pending (not yet started) items are
    /// dropped.
    fn shutdown(&self);
}
