//! Evoengine CLI — binds the `evoengine_hub` library's `Cli` parser to a
//! running server, client, or single-process optimization.

use std::process::ExitCode;

use clap::Parser;
use evoengine_hub::cli::{Cli, Commands};
use evoengine_hub::config::EngineConfig;
use evoengine_hub::engine;
use mimalloc::MiMalloc;

/// mimalloc provides better multi-threaded performance than the system
/// allocator, which matters once worker pools start contending on
/// allocation under load.
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let default_level = cli.log_level.clone().unwrap_or_else(|| "info".to_string());
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    let config = match EngineConfig::load() {
        Ok(config) => config,
        Err(e) => {
            log::error!("failed to load configuration: {e}");
            return ExitCode::from(2);
        }
    };

    let result = match &cli.command {
        Commands::Server(args) => engine::server(config, args).await,
        Commands::Client(args) => engine::client(config, args).await,
        Commands::Run(args) => engine::run(config, args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}
