//! `Individual` — a candidate solution: an opaque parameter payload plus
//! a cached fitness value, a role tag and the generation it was last
//! stamped with.
//!
//! The payload itself is a tagged variant rather than an open class
//! hierarchy (the original engine's `GObject` → `GParameterBase` → ...
//! chain collapses here into [`Payload`] plus the
//! [`ParameterAdaptor`]/[`FitnessFunction`] trait objects an `Individual`
//! carries). Adding a new parameter kind means adding a `Payload`
//! variant, not a new class in a hierarchy.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Role an individual plays within the current generation. Flipping
/// this is the exclusive responsibility of `Population::select` —
/// nothing else in the engine changes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Parent,
    Child,
}

/// Opaque candidate-solution payload. `DoubleVec` covers the common
/// continuous-optimization case; `IntVec` and `BoundedDoubleVec` are the
/// two other variants a tagged-payload design needs to stand in for the
/// original's wider adaptor hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Payload {
    DoubleVec(Vec<f64>),
    IntVec(Vec<i64>),
    BoundedDoubleVec { values: Vec<f64>, lower: f64, upper: f64 },
}

impl Payload {
    fn mutate_in_place(&mut self, adaptor: &dyn ParameterAdaptor) {
        match self {
            Payload::DoubleVec(v) => adaptor.mutate_doubles(v),
            Payload::IntVec(v) => adaptor.mutate_ints(v),
            Payload::BoundedDoubleVec { values, lower, upper } => {
                adaptor.mutate_doubles(values);
                for x in values.iter_mut() {
                    *x = x.clamp(*lower, *upper);
                }
            }
        }
    }
}

/// User-supplied mutation strategy. Kept out of scope functionally (the
/// engine ships no numeric adaptor of its own) but the trait boundary is
/// part of the engine's surface.
pub trait ParameterAdaptor: fmt::Debug + Send + Sync {
    fn mutate_doubles(&self, values: &mut [f64]);
    fn mutate_ints(&self, values: &mut [i64]) {
        let _ = values;
    }
}

/// User-supplied fitness evaluator.
pub trait FitnessFunction: fmt::Debug + Send + Sync {
    fn evaluate(&self, payload: &Payload) -> f64;
}

/// A candidate solution in flight through the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Individual {
    payload: Payload,
    fitness: f64,
    dirty: bool,
    role: Role,
    generation: u64,
    /// Index this individual last occupied within its population's
    /// vector. Not meaningful while in flight through the broker.
    pub position: usize,
    /// String attribute map, used at minimum to carry the port id while
    /// an individual is serialized across the network.
    pub attributes: HashMap<String, String>,
}

impl Individual {
    pub fn new(payload: Payload, role: Role) -> Self {
        Self {
            payload,
            fitness: 0.0,
            dirty: true,
            role,
            generation: 0,
            position: 0,
            attributes: HashMap::new(),
        }
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Last computed fitness without triggering re-evaluation. Prefer
    /// [`Individual::fitness`] unless you specifically need the stale
    /// cached value (e.g. reporting before a re-evaluation pass).
    pub fn cached_fitness(&self) -> f64 {
        self.fitness
    }

    /// Stamps this individual with the current generation. Called by
    /// `Population::mark_generation` at the top of every generation.
    pub fn mark_generation(&mut self, generation: u64) {
        self.generation = generation;
    }

    pub(crate) fn set_role(&mut self, role: Role) {
        self.role = role;
    }

    /// Applies `adaptor` to the payload, marks the individual dirty and
    /// transitions its role to `Child`.
    pub fn mutate(&mut self, adaptor: &dyn ParameterAdaptor) {
        self.payload.mutate_in_place(adaptor);
        self.dirty = true;
        self.role = Role::Child;
    }

    /// Returns the cached fitness if clean, otherwise invokes
    /// `fitness_fn` and caches the result. Idempotent while `dirty`
    /// stays false.
    pub fn fitness(&mut self, fitness_fn: &dyn FitnessFunction) -> f64 {
        if self.dirty {
            self.fitness = fitness_fn.evaluate(&self.payload);
            self.dirty = false;
        }
        self.fitness
    }

    /// Deep-copies `other`'s state into `self` in place, used by
    /// recombination instead of assignment so callers never need to
    /// replace the whole value.
    pub fn load(&mut self, other: &Individual) {
        self.payload = other.payload.clone();
        self.fitness = other.fitness;
        self.dirty = other.dirty;
        // role and generation are set by the caller (recombine tags the
        // freshly-loaded child explicitly); attributes/position are
        // transit-only and reset here.
        self.attributes.clear();
    }
}

/// Shared, user-provided operators an `Individual` needs to mutate and
/// evaluate itself. Bundled so `Population` can pass one handle around
/// instead of two trait objects.
#[derive(Clone)]
pub struct Operators {
    pub adaptor: Arc<dyn ParameterAdaptor>,
    pub fitness: Arc<dyn FitnessFunction>,
    pub maximize: bool,
}

impl fmt::Debug for Operators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operators").field("maximize", &self.maximize).finish_non_exhaustive()
    }
}

/// Raised when an operation is attempted on a population/individual that
/// violates an invariant checked only at construction boundaries.
pub fn require_non_empty(payload: &Payload) -> Result<(), EngineError> {
    let empty = match payload {
        Payload::DoubleVec(v) => v.is_empty(),
        Payload::IntVec(v) => v.is_empty(),
        Payload::BoundedDoubleVec { values, .. } => values.is_empty(),
    };
    if empty {
        Err(EngineError::EmptyIndividual)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct NoopAdaptor;
    impl ParameterAdaptor for NoopAdaptor {
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

    #[test]
    fn test_mutate_sets_dirty_and_role_child() {
        let mut ind = Individual::new(Payload::DoubleVec(vec![1.0, 2.0]), Role::Parent);
        ind.mutate(&NoopAdaptor);
        assert!(ind.is_dirty());
        assert_eq!(ind.role(), Role::Child);
        assert_eq!(ind.payload(), &Payload::DoubleVec(vec![2.0, 3.0]));
    }

    #[test]
    fn test_fitness_is_idempotent_while_clean() {
        let mut ind = Individual::new(Payload::DoubleVec(vec![3.0, 4.0]), Role::Child);
        let f1 = ind.fitness(&SumOfSquares);
        assert_eq!(f1, 25.0);
        assert!(!ind.is_dirty());
        // Calling again without mutating must not re-trigger evaluation
        // (mutate would have to run first to dirty it again).
        let f2 = ind.fitness(&SumOfSquares);
        assert_eq!(f2, 25.0);
    }

    #[test]
    fn test_load_deep_copies_state() {
        let src = Individual::new(Payload::DoubleVec(vec![9.0]), Role::Parent);
        let mut dst = Individual::new(Payload::DoubleVec(vec![0.0]), Role::Child);
        dst.load(&src);
        assert_eq!(dst.payload(), src.payload());
    }

    #[test]
    fn test_require_non_empty_rejects_empty_payload() {
        let err = require_non_empty(&Payload::DoubleVec(vec![])).unwrap_err();
        assert!(matches!(err, EngineError::EmptyIndividual));
    }
}
