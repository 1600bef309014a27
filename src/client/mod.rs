//! Networked counterpart to `TcpServerConsumer`: connects, pulls work,
//! processes it locally, returns results.

pub mod network;

pub use network::Client;
