//! `evoengine_hub` — a distributed evolutionary-optimization engine.
//!
//! A [`population::Population`] drives the generational loop
//! (mark-generation → recombine → mutate-children → select → report →
//! halt-check); the `mutate-children` phase runs serially, on an
//! in-process thread pool, or against a [`broker::Broker`]-mediated pool
//! of networked [`client::Client`]s talking the wire protocol in
//! [`wire`]/[`serialize`].

pub mod broker;
pub mod buffer;
pub mod carrier;
pub mod cli;
pub mod client;
pub mod config;
pub mod constants;
pub mod consumer;
pub mod engine;
pub mod error;
pub mod individual;
pub mod population;
pub mod random;
pub mod serialize;
pub mod server;
pub mod wire;

pub use carrier::{Carrier, Command};
pub use config::EngineConfig;
pub use individual::{FitnessFunction, Individual, Operators, ParameterAdaptor, Payload, Role};
pub use population::{ExecutionMode, Population, RecombinationMode, SortMode};
pub use random::RandomFactory;
