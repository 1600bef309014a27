//! Broker-backed `mutateChildren`: children are pushed onto a
//! [`BufferPort`]'s raw queue as [`Carrier`]s for a pool of consumers
//! (thread-pool or networked) to mutate and evaluate, then collected
//! back off the processed queue.
//!
//! The wait strategy has three phases, grounded on
//! `original_source/include/GBrokerPopulation.hpp`'s submission/retrieval
//! cycle:
//!
//! - wait-loop-A: block for the *first* item of the generation to come
//!   back, bounded by `firstTimeOut`. Nothing home by then means the
//!   consumer pool is unreachable or far too slow, and the generation
//!   fails outright rather than silently degrading.
//! - wait-loop-B: once timing is known from the first arrival, keep
//!   collecting for `waitFactor * first_arrival` before giving up on
//!   the stragglers.
//! - fill-up-by-cloning: any child that missed the deadline is replaced
//!   with a clone of the best individual that did come home, so the
//!   population is always back to nominal size going into `select`.
//!
//! `waitFactor` then auto-adapts: rounds that run long relative to
//! `loopTime` raise it (more patience next time), rounds that finish
//! quickly lower it back down, bounded by `maxWaitFactor`.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use log::warn;

use crate::carrier::{Carrier, Command};
use crate::error::EngineError;

use super::{ExecutionMode, Population};

const ATTR_KEY: &str = "__broker_mode_key";

pub(super) fn mutate_children(pop: &mut Population) -> Result<(), EngineError> {
    let (port, mut wait_factor, max_wait_factor, loop_time, first_timeout) = match &pop.mode {
        ExecutionMode::Broker {
            port,
            wait_factor,
            max_wait_factor,
            loop_time,
            first_timeout,
            ..
        } => (port.clone(), *wait_factor, *max_wait_factor, *loop_time, *first_timeout),
        _ => unreachable!("broker_mode::mutate_children called outside ExecutionMode::Broker"),
    };

    let port_id = port
        .id()
        .ok_or_else(|| EngineError::InvalidPopulation("broker population's port was never enrolled".into()))?;
    let n_parents = pop.n_parents;
    let generation = pop.generation;

    let mut pending: HashMap<u64, usize> = HashMap::new();
    let mut next_key: u64 = 0;
    let mut submit = |slot: usize, command: Command, individual: crate::individual::Individual| {
        let key = next_key;
        next_key += 1;
        pending.insert(key, slot);
        let mut carrier = Carrier::new(command, generation, port_id, individual);
        carrier.individual.attributes.insert(ATTR_KEY.to_string(), key.to_string());
        port.raw.push_front(carrier);
    };

    for slot in n_parents..pop.individuals.len() {
        submit(slot, Command::MutateAndEvaluate, pop.individuals[slot].clone());
    }
    for slot in 0..n_parents {
        if pop.individuals[slot].is_dirty() {
            submit(slot, Command::Evaluate, pop.individuals[slot].clone());
        }
    }

    let expected = pending.len();
    if expected == 0 {
        return Ok(());
    }

    let round_start = Instant::now();
    let mut received: HashMap<u64, Carrier> = HashMap::new();

    let first_deadline = first_timeout.unwrap_or(Duration::from_secs(3600));
    match port.processed.pop_back_timeout(first_deadline) {
        Ok(carrier) => insert_received(&mut received, carrier),
        Err(_) => {
            return Err(EngineError::InvalidPopulation(format!(
                "no individuals returned from the broker within firstTimeOut ({first_deadline:?}) at generation {generation}"
            )));
        }
    }
    let first_arrival = round_start.elapsed();

    let budget = first_arrival * wait_factor.max(1);
    let round_deadline = round_start + budget;
    while received.len() < expected {
        let remaining = round_deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        match port.processed.pop_back_timeout(remaining) {
            Ok(carrier) => insert_received(&mut received, carrier),
            Err(_) => break,
        }
    }

    let missing = expected - received.len();
    if missing > 0 {
        warn!(
            "broker population: {missing}/{expected} individuals missed generation {generation}'s deadline, filling up by cloning"
        );
    }

    for carrier in received.values() {
        let key: u64 = carrier.individual.attributes[ATTR_KEY].parse().expect("key attribute set at submission");
        let slot = pending[&key];
        let mut individual = carrier.individual.clone();
        individual.attributes.remove(ATTR_KEY);
        individual.position = slot;
        pop.individuals[slot] = individual;
    }

    if missing > 0 {
        let maximize = pop.operators.maximize;
        let filler = received
            .values()
            .map(|c| &c.individual)
            .min_by(|a, b| {
                let (fa, fb) = (a.cached_fitness(), b.cached_fitness());
                if maximize {
                    fb.partial_cmp(&fa).unwrap_or(std::cmp::Ordering::Equal)
                } else {
                    fa.partial_cmp(&fb).unwrap_or(std::cmp::Ordering::Equal)
                }
            })
            .cloned();
        if let Some(filler) = filler {
            for (key, slot) in pending.iter() {
                if !received.contains_key(key) {
                    let mut clone = filler.clone();
                    clone.attributes.remove(ATTR_KEY);
                    clone.position = *slot;
                    pop.individuals[*slot] = clone;
                }
            }
        }
    }

    let elapsed = round_start.elapsed();
    if !loop_time.is_zero() {
        if elapsed > loop_time && wait_factor < max_wait_factor {
            wait_factor += 1;
        } else if elapsed < loop_time / 2 && wait_factor > 1 {
            wait_factor -= 1;
        }
    }
    if let ExecutionMode::Broker { wait_factor: wf, .. } = &mut pop.mode {
        *wf = wait_factor;
    }

    Ok(())
}

fn insert_received(received: &mut HashMap<u64, Carrier>, carrier: Carrier) {
    let key: u64 = carrier.individual.attributes[ATTR_KEY].parse().expect("key attribute set at submission");
    received.insert(key, carrier);
}
