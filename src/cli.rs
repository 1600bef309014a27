//! Command-line surface: `evoengine server|client|run`, flags mirroring
//! the original engine's `GCommandLineParser` options. Any flag the user
//! actually passes overrides the loaded [`EngineConfig`]; unset flags
//! leave the config/env/default value alone.

use clap::{Args, Parser, Subcommand};

use crate::population::{RecombinationMode, SortMode};

#[derive(Parser, Debug)]
#[command(name = "evoengine", about = "Distributed evolutionary optimization engine", version)]
pub struct Cli {
    /// Overrides the `RUST_LOG` default of `info` for every target.
    #[arg(long = "log-level", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Runs the broker and accepts networked consumers.
    Server(ServerArgs),
    /// Connects to a running server and processes work until told to stop.
    Client(ClientArgs),
    /// Single-process optimization: serial or in-process thread pool, no networking.
    Run(RunArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ServerArgs {
    #[arg(long)]
    pub ip: Option<String>,
    #[arg(long)]
    pub port: Option<u16>,
    #[arg(long = "nConsumerThreads")]
    pub n_consumer_threads: Option<usize>,
    #[arg(long = "popSize")]
    pub pop_size: Option<usize>,
    #[arg(long = "nParents")]
    pub n_parents: Option<usize>,
    #[arg(long = "maxGen")]
    pub max_gen: Option<u64>,
    #[arg(long = "maxMinutes")]
    pub max_minutes: Option<u64>,
    #[arg(long = "reportGen")]
    pub report_gen: Option<u64>,
    #[arg(long, value_enum)]
    pub recombine: Option<RecombinationMode>,
    #[arg(long, value_enum)]
    pub sort: Option<SortMode>,
    #[arg(long = "waitFactor")]
    pub wait_factor: Option<u32>,
    #[arg(long = "maxWaitFactor")]
    pub max_wait_factor: Option<u32>,
    /// Milliseconds to wait for the first individual of a generation.
    #[arg(long = "firstTimeOut")]
    pub first_timeout: Option<u64>,
}

#[derive(Args, Debug, Clone)]
pub struct ClientArgs {
    #[arg(long)]
    pub ip: Option<String>,
    #[arg(long)]
    pub port: Option<u16>,
    #[arg(long = "nProducerThreads")]
    pub n_producer_threads: Option<usize>,
    /// Stop after processing this many items; 0 = unlimited.
    #[arg(long, default_value_t = 0)]
    pub process_max: u64,
    /// Stop after this many consecutive `timeout` replies; 0 = infinite.
    #[arg(long, default_value_t = 0)]
    pub max_stalls: u16,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[arg(long = "nConsumerThreads")]
    pub n_consumer_threads: Option<usize>,
    #[arg(long = "popSize")]
    pub pop_size: Option<usize>,
    #[arg(long = "nParents")]
    pub n_parents: Option<usize>,
    #[arg(long = "maxGen")]
    pub max_gen: Option<u64>,
    #[arg(long = "maxMinutes")]
    pub max_minutes: Option<u64>,
    #[arg(long = "reportGen")]
    pub report_gen: Option<u64>,
    #[arg(long, value_enum)]
    pub recombine: Option<RecombinationMode>,
    #[arg(long, value_enum)]
    pub sort: Option<SortMode>,
    /// Serial execution instead of the in-process thread pool.
    #[arg(long)]
    pub serial: bool,
}
