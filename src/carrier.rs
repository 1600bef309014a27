//! `Carrier` — the transport envelope wrapping an `Individual` while it
//! is in flight between a population and a consumer.
//!
//! Grounded on `original_source/include/GMemberCarrier.hpp`: the carrier
//! tags the wrapped individual with the command that should be applied
//! to it (`mutate` or `evaluate`), the generation it was pushed under,
//! the port id it belongs to, and which half of the population
//! (`parent`/`child`) it came from. The wrapped payload is the one place
//! the role is authoritative while the individual itself is detached
//! from its owning population's vector.

use serde::{Deserialize, Serialize};

use crate::individual::{Individual, Operators, Role};

/// Action a consumer should apply to the carried individual.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    Mutate,
    Evaluate,
    /// Mutate then evaluate in one round trip — what a population's
    /// broker-backed `mutateChildren` phase submits for its children, so
    /// a child only crosses the wire once per generation.
    MutateAndEvaluate,
}

/// Transport envelope around an `Individual`. Not copyable: a carrier
/// represents one in-flight message, never duplicated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Carrier {
    pub command: Command,
    pub generation: u64,
    pub role: Role,
    pub port_id: u64,
    pub individual: Individual,
}

impl Carrier {
    pub fn new(command: Command, generation: u64, port_id: u64, individual: Individual) -> Self {
        let role = individual.role();
        Self {
            command,
            generation,
            role,
            port_id,
            individual,
        }
    }

    /// Applies `self.command` to the wrapped individual in place, using
    /// the operators a consumer (thread-pool worker or networked
    /// client) was configured with. Shared by every consumer variant so
    /// "what does processing an item mean" has exactly one definition.
    pub fn process(&mut self, operators: &Operators) {
        match self.command {
            Command::Mutate => self.individual.mutate(operators.adaptor.as_ref()),
            Command::Evaluate => {
                self.individual.fitness(operators.fitness.as_ref());
            }
            Command::MutateAndEvaluate => {
                self.individual.mutate(operators.adaptor.as_ref());
                self.individual.fitness(operators.fitness.as_ref());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::individual::{FitnessFunction, Payload, ParameterAdaptor};
    use std::sync::Arc;

    #[derive(Debug)]
    struct Identity;
    impl ParameterAdaptor for Identity {
        fn mutate_doubles(&self, values: &mut [f64]) {
            for v in values.iter_mut() {
                *v += 1.0;
            }
        }
    }
    #[derive(Debug)]
    struct SumOfSquares;
    impl FitnessFunction for SumOfSquares {
        fn evaluate(&self, payload: &Payload) -> f64 {
            match payload {
                Payload::DoubleVec(v) => v.iter().map(|x| x * x).sum(),
                _ => 0.0,
            }
        }
    }

    fn operators() -> Operators {
        Operators {
            adaptor: Arc::new(Identity),
            fitness: Arc::new(SumOfSquares),
            maximize: false,
        }
    }

    #[test]
    fn test_carrier_captures_individual_role() {
        let ind = Individual::new(Payload::DoubleVec(vec![1.0]), Role::Child);
        let carrier = Carrier::new(Command::Mutate, 3, 7, ind);
        assert_eq!(carrier.role, Role::Child);
        assert_eq!(carrier.generation, 3);
        assert_eq!(carrier.port_id, 7);
    }

    #[test]
    fn test_process_mutate_dirties_and_flips_role() {
        let ind = Individual::new(Payload::DoubleVec(vec![1.0, 2.0]), Role::Parent);
        let mut carrier = Carrier::new(Command::Mutate, 0, 0, ind);
        carrier.process(&operators());
        assert!(carrier.individual.is_dirty());
        assert_eq!(carrier.individual.role(), Role::Child);
    }

    #[test]
    fn test_process_mutate_and_evaluate_does_both_in_one_pass() {
        let ind = Individual::new(Payload::DoubleVec(vec![3.0, 4.0]), Role::Parent);
        let mut carrier = Carrier::new(Command::MutateAndEvaluate, 0, 0, ind);
        carrier.process(&operators());
        // Identity adaptor adds 1.0 to each component: (4,5) -> fitness 41.
        assert_eq!(carrier.individual.cached_fitness(), 41.0);
        assert_eq!(carrier.individual.role(), Role::Child);
    }

    #[test]
    fn test_process_evaluate_computes_fitness() {
        let ind = Individual::new(Payload::DoubleVec(vec![3.0, 4.0]), Role::Child);
        let mut carrier = Carrier::new(Command::Evaluate, 0, 0, ind);
        carrier.process(&operators());
        assert_eq!(carrier.individual.cached_fitness(), 25.0);
        assert!(!carrier.individual.is_dirty());
    }
}
