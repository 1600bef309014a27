//! CLI-facing wiring: turns an [`EngineConfig`] plus a [`Cli`] subcommand
//! into a running server, client, or single-process optimization.
//!
//! The engine itself is problem-agnostic (see `individual::ParameterAdaptor`/
//! `FitnessFunction`); this module supplies the one built-in problem the
//! binary ships with, a continuous sphere-function minimization, the same
//! role the original engine's bundled `GSimpleSwarm`/`GBrokerExample`
//! executables play for its library.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use log::info;

use crate::broker::engine::Broker;
use crate::buffer::BufferPort;
use crate::carrier::Carrier;
use crate::cli::{ClientArgs, RunArgs, ServerArgs};
use crate::config::EngineConfig;
use crate::consumer::{Consumer, TcpServerConsumer, ThreadPoolConsumer};
use crate::individual::{FitnessFunction, Individual, Operators, ParameterAdaptor, Payload, Role};
use crate::population::{ExecutionMode, GenerationInfo, Population};
use crate::random::RandomFactory;

const DIMENSIONS: usize = 10;
const STEP_SIZE: f64 = 0.1;

/// Gaussian-ish perturbation: each component nudged by a random step drawn
/// from the shared factory. Not a cryptographic or statistically exact
/// normal draw, just enough spread for the bundled demo problem to
/// converge visibly generation over generation.
#[derive(Debug)]
struct RandomWalkAdaptor {
    random: Arc<RandomFactory>,
    step_size: f64,
}

impl ParameterAdaptor for RandomWalkAdaptor {
    fn mutate_doubles(&self, values: &mut [f64]) {
        for v in values.iter_mut() {
            let step = (self.random.next_f64() - 0.5) * 2.0 * self.step_size;
            *v += step;
        }
    }

    fn mutate_ints(&self, values: &mut [i64]) {
        for v in values.iter_mut() {
            if self.random.next_f64() < 0.1 {
                *v += if self.random.next_f64() < 0.5 { 1 } else { -1 };
            }
        }
    }
}

/// Sum of squares: minimized at the origin. The bundled demo fitness
/// function, standing in for a user-supplied `FitnessFunction`.
#[derive(Debug)]
struct SphereFitness;

impl FitnessFunction for SphereFitness {
    fn evaluate(&self, payload: &Payload) -> f64 {
        match payload {
            Payload::DoubleVec(v) => v.iter().map(|x| x * x).sum(),
            Payload::IntVec(v) => v.iter().map(|x| (*x * *x) as f64).sum(),
            Payload::BoundedDoubleVec { values, .. } => values.iter().map(|x| x * x).sum(),
        }
    }
}

fn demo_operators(random: Arc<RandomFactory>) -> Operators {
    Operators {
        adaptor: Arc::new(RandomWalkAdaptor { random, step_size: STEP_SIZE }),
        fitness: Arc::new(SphereFitness),
        maximize: false,
    }
}

fn seed_individuals(random: &RandomFactory, count: usize) -> Vec<Individual> {
    (0..count)
        .map(|_| {
            let values = (0..DIMENSIONS).map(|_| (random.next_f64() - 0.5) * 10.0).collect();
            Individual::new(Payload::DoubleVec(values), Role::Parent)
        })
        .collect()
}

fn report_progress(report_every: u64) -> impl FnMut(&GenerationInfo) {
    move |info: &GenerationInfo| {
        if report_every != 0 && info.generation % report_every == 0 {
            info!("generation {}: best fitness {:.6}", info.generation, info.best_fitness);
        }
    }
}

fn merge_server(config: &mut EngineConfig, args: &ServerArgs) {
    if let Some(v) = &args.ip { config.ip = v.clone(); }
    if let Some(v) = args.port { config.port = v; }
    if let Some(v) = args.n_consumer_threads { config.n_consumer_threads = v; }
    if let Some(v) = args.pop_size { config.pop_size = v; }
    if let Some(v) = args.n_parents { config.n_parents = v; }
    if let Some(v) = args.max_gen { config.max_generation = v; }
    if let Some(v) = args.max_minutes { config.max_minutes = v; }
    if let Some(v) = args.report_gen { config.report_generation = v; }
    if let Some(v) = args.recombine { config.recombine = v; }
    if let Some(v) = args.sort { config.sort = v; }
    if let Some(v) = args.wait_factor { config.wait_factor = v; }
    if let Some(v) = args.max_wait_factor { config.max_wait_factor = v; }
    if let Some(v) = args.first_timeout { config.first_timeout_ms = v; }
}

fn merge_run(config: &mut EngineConfig, args: &RunArgs) {
    if let Some(v) = args.n_consumer_threads { config.n_consumer_threads = v; }
    if let Some(v) = args.pop_size { config.pop_size = v; }
    if let Some(v) = args.n_parents { config.n_parents = v; }
    if let Some(v) = args.max_gen { config.max_generation = v; }
    if let Some(v) = args.max_minutes { config.max_minutes = v; }
    if let Some(v) = args.report_gen { config.report_generation = v; }
    if let Some(v) = args.recombine { config.recombine = v; }
    if let Some(v) = args.sort { config.sort = v; }
}

fn merge_client(config: &mut EngineConfig, args: &ClientArgs) {
    if let Some(v) = &args.ip { config.ip = v.clone(); }
    if let Some(v) = args.port { config.port = v; }
    if let Some(v) = args.n_producer_threads { config.n_producer_threads = v; }
}

fn build_population(
    config: &EngineConfig,
    random: Arc<RandomFactory>,
    mode: ExecutionMode,
) -> Result<Population> {
    let individuals = seed_individuals(&random, config.pop_size);
    let mut population = Population::new(
        individuals,
        config.n_parents,
        config.pop_size.saturating_sub(config.n_parents),
        config.sort,
        config.recombine,
        demo_operators(Arc::clone(&random)),
        random,
        mode,
    )
    .context("constructing population")?;

    if config.max_generation != 0 {
        population = population.with_max_generation(config.max_generation);
    }
    if config.max_minutes != 0 {
        population = population.with_max_duration(Duration::from_secs(config.max_minutes * 60));
    }
    population = population.on_info(report_progress(config.report_generation));

    Ok(population)
}

/// Single-process run: serial or in-process thread pool, no networking.
pub fn run(mut config: EngineConfig, args: &RunArgs) -> Result<()> {
    merge_run(&mut config, args);
    let random = RandomFactory::new();
    let mode = if args.serial {
        ExecutionMode::Serial
    } else {
        ExecutionMode::ThreadPool { workers: config.n_consumer_threads.max(1) }
    };
    let mut population = build_population(&config, random, mode)?;
    population.optimize().context("optimization loop failed")?;
    report_result(&population);
    Ok(())
}

/// Server mode: binds a broker-backed TCP consumer pool, then drives the
/// generational loop against it.
pub async fn server(mut config: EngineConfig, args: &ServerArgs) -> Result<()> {
    merge_server(&mut config, args);
    let random = RandomFactory::new();
    let broker: Arc<Broker<Carrier>> = Broker::new();
    let port = Arc::new(BufferPort::new());
    broker.enrol(Arc::clone(&port)).context("enrolling population port with broker")?;

    let tcp = TcpServerConsumer::bind(&format!("{}:{}", config.ip, config.port), Arc::clone(&broker), Arc::clone(&random))
        .await
        .with_context(|| format!("binding {}:{}", config.ip, config.port))?;
    tcp.start();
    info!("server listening on {}:{}", config.ip, config.port);

    let local_pool = (config.n_consumer_threads > 0).then(|| {
        let pool = ThreadPoolConsumer::new(Arc::clone(&broker), demo_operators(Arc::clone(&random)), config.n_consumer_threads);
        pool.start();
        pool
    });

    let mode = ExecutionMode::Broker {
        broker: Arc::clone(&broker),
        port,
        wait_factor: config.wait_factor,
        max_wait_factor: config.max_wait_factor,
        loop_time: Duration::from_secs(1),
        first_timeout: if config.first_timeout_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(config.first_timeout_ms))
        },
    };
    let mut population = build_population(&config, random, mode)?;

    let result = tokio::task::spawn_blocking(move || -> Result<Population> {
        population.optimize().context("optimization loop failed")?;
        Ok(population)
    })
    .await
    .context("optimization task panicked")??;

    tcp.shutdown();
    if let Some(pool) = local_pool {
        pool.shutdown();
    }
    report_result(&result);
    Ok(())
}

/// Client mode: connects to a running server and processes work until a
/// stop condition fires.
pub async fn client(mut config: EngineConfig, args: &ClientArgs) -> Result<()> {
    merge_client(&mut config, args);
    let addr = format!("{}:{}", config.ip, config.port)
        .parse()
        .with_context(|| format!("invalid server address {}:{}", config.ip, config.port))?;
    let random = RandomFactory::new();
    let operators = demo_operators(Arc::clone(&random));
    let mut client = crate::client::network::Client::new(addr, random, operators);
    client.process_max = args.process_max;
    client.max_stalls = args.max_stalls;

    let processed = client.run().await.context("client run loop failed")?;
    info!("client processed {processed} items");
    Ok(())
}

fn report_result(population: &Population) {
    let best = population.individuals().iter().take(population.n_parents()).min_by(|a, b| {
        a.cached_fitness().partial_cmp(&b.cached_fitness()).unwrap_or(std::cmp::Ordering::Equal)
    });
    if let Some(best) = best {
        info!(
            "optimization finished after {} generations, best fitness {:.6}: {}",
            population.generation(),
            best.cached_fitness(),
            PayloadDisplay(best.payload())
        );
    }
}

struct PayloadDisplay<'a>(&'a Payload);

impl fmt::Display for PayloadDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Payload::DoubleVec(v) => write!(f, "{v:?}"),
            Payload::IntVec(v) => write!(f, "{v:?}"),
            Payload::BoundedDoubleVec { values, .. } => write!(f, "{values:?}"),
        }
    }
}
