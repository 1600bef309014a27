//! `Population` — the generational loop and its three execution-mode
//! specializations.
//!
//! One `optimize()` loop drives `markGeneration` → `recombine` →
//! `mutateChildren` → `select` → `doInfo` → halt-check; only the
//! `mutateChildren` phase differs across [`ExecutionMode`] — serial, a
//! fixed thread pool, or a broker-backed network of consumers. Keeping
//! them as one enum dispatched from a single loop (rather than three
//! parallel vtables) is the idiomatic counterpart to the original's
//! inheritance-based specialization, consistent with how `Individual`'s
//! payload hierarchy collapses into a tagged variant.

mod broker_mode;
mod serial;
mod threaded;

use std::time::{Duration, Instant};

use crate::broker::engine::Broker;
use crate::buffer::BufferPort;
use crate::carrier::Carrier;
use crate::error::EngineError;
use crate::individual::{require_non_empty, Individual, Operators, Role};
use crate::random::RandomFactory;
use std::sync::Arc;

/// Selection policy applied at the end of every generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum SortMode {
    /// Parents compete with children for the next generation's parent
    /// slots.
    MuPlusNu,
    /// Only children compete; parents are discarded outright.
    MuCommaNu,
    /// Like `MuCommaNu`, but the single best parent is always retained.
    MuCommaNuElitist,
}

/// How parents are chosen to seed each child during recombination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum RecombinationMode {
    Random,
    /// Parent `k` is chosen with probability proportional to `1/(k+2)`.
    Value,
}

/// Execution strategy for the `mutateChildren` phase.
pub enum ExecutionMode {
    Serial,
    ThreadPool { workers: usize },
    Broker {
        broker: Arc<Broker<Carrier>>,
        port: Arc<BufferPort<Carrier>>,
        wait_factor: u32,
        max_wait_factor: u32,
        loop_time: Duration,
        first_timeout: Option<Duration>,
    },
}

/// Report handed to the user-registered `on_info` callback after every
/// generation's mutate/select phase.
pub struct GenerationInfo<'a> {
    pub generation: u64,
    pub best_fitness: f64,
    pub individuals: &'a [Individual],
}

/// The generational loop and every piece of state it needs across
/// generations.
pub struct Population {
    individuals: Vec<Individual>,
    n_parents: usize,
    default_n_children: usize,
    generation: u64,
    max_generation: u64,
    max_duration: Option<Duration>,
    start_time: Option<Instant>,
    sort_mode: SortMode,
    recombination_mode: RecombinationMode,
    operators: Operators,
    random: Arc<RandomFactory>,
    mode: ExecutionMode,
    on_info: Option<Box<dyn FnMut(&GenerationInfo) + Send>>,
    custom_halt: Option<Box<dyn FnMut(&Population) -> bool + Send>>,
}

impl std::fmt::Debug for Population {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Population")
            .field("individuals", &self.individuals)
            .field("n_parents", &self.n_parents)
            .field("default_n_children", &self.default_n_children)
            .field("generation", &self.generation)
            .field("max_generation", &self.max_generation)
            .field("max_duration", &self.max_duration)
            .field("start_time", &self.start_time)
            .field("sort_mode", &self.sort_mode)
            .field("recombination_mode", &self.recombination_mode)
            .field("operators", &self.operators)
            .field("random", &self.random)
            .field(
                "mode",
                &match &self.mode {
                    ExecutionMode::Serial => "Serial",
                    ExecutionMode::ThreadPool { .. } => "ThreadPool",
                    ExecutionMode::Broker { .. } => "Broker",
                },
            )
            .field("on_info", &self.on_info.is_some())
            .field("custom_halt", &self.custom_halt.is_some())
            .finish()
    }
}

impl Population {
    /// Builds a population. `individuals` must be non-empty; if it has
    /// fewer than `n_parents + default_n_children` entries, the
    /// remainder is filled by cloning position 0.
    pub fn new(
        mut individuals: Vec<Individual>,
        n_parents: usize,
        default_n_children: usize,
        sort_mode: SortMode,
        recombination_mode: RecombinationMode,
        operators: Operators,
        random: Arc<RandomFactory>,
        mode: ExecutionMode,
    ) -> Result<Self, EngineError> {
        if individuals.is_empty() {
            return Err(EngineError::InvalidPopulation("population must be seeded with at least one individual".into()));
        }
        require_non_empty(individuals[0].payload())?;

        match sort_mode {
            SortMode::MuPlusNu => {
                if n_parents + default_n_children <= n_parents {
                    return Err(EngineError::InvalidPopulation("popSize must exceed nParents in mu+nu".into()));
                }
            }
            SortMode::MuCommaNu | SortMode::MuCommaNuElitist => {
                if default_n_children < n_parents {
                    return Err(EngineError::InvalidPopulation(
                        "popSize must be at least 2*nParents in mu,nu".into(),
                    ));
                }
            }
        }

        let total = n_parents + default_n_children;
        while individuals.len() < total {
            individuals.push(individuals[0].clone());
        }
        individuals.truncate(total);

        for (i, ind) in individuals.iter_mut().enumerate() {
            ind.position = i;
            ind.set_role(if i < n_parents { Role::Parent } else { Role::Child });
        }

        Ok(Self {
            individuals,
            n_parents,
            default_n_children,
            generation: 0,
            max_generation: 0,
            max_duration: None,
            start_time: None,
            sort_mode,
            recombination_mode,
            operators,
            random,
            mode,
            on_info: None,
            custom_halt: None,
        })
    }

    pub fn with_max_generation(mut self, max_generation: u64) -> Self {
        self.max_generation = max_generation;
        self
    }

    pub fn with_max_duration(mut self, max_duration: Duration) -> Self {
        self.max_duration = Some(max_duration);
        self
    }

    pub fn on_info(mut self, f: impl FnMut(&GenerationInfo) + Send + 'static) -> Self {
        self.on_info = Some(Box::new(f));
        self
    }

    pub fn with_custom_halt(mut self, f: impl FnMut(&Population) -> bool + Send + 'static) -> Self {
        self.custom_halt = Some(Box::new(f));
        self
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn individuals(&self) -> &[Individual] {
        &self.individuals
    }

    pub fn n_parents(&self) -> usize {
        self.n_parents
    }

    /// Best fitness among the current parent range, assuming `select`
    /// has already run at least once (or generation 0 before any
    /// selection, in which case this reflects whatever was evaluated).
    pub fn best_fitness(&self) -> f64 {
        self.individuals[..self.n_parents]
            .iter()
            .map(Individual::cached_fitness)
            .fold(f64::NAN, |acc, f| {
                if acc.is_nan() {
                    f
                } else if self.operators.maximize {
                    acc.max(f)
                } else {
                    acc.min(f)
                }
            })
    }

    /// Runs generations until a halt condition fires. Resets the
    /// generation counter to 0 on entry.
    pub fn optimize(&mut self) -> Result<(), EngineError> {
        self.generation = 0;
        self.start_time = Some(Instant::now());

        loop {
            self.mark_generation();
            self.recombine();
            self.mutate_children()?;
            self.select();
            self.do_info();

            self.generation += 1;
            if self.should_halt() {
                break;
            }
        }
        Ok(())
    }

    fn mark_generation(&mut self) {
        for ind in self.individuals.iter_mut() {
            ind.mark_generation(self.generation);
        }
    }

    fn recombine(&mut self) {
        let mode = if self.generation == 0 {
            RecombinationMode::Random
        } else {
            self.recombination_mode
        };

        let n_parents = self.n_parents;
        for i in n_parents..self.individuals.len() {
            let j = match mode {
                RecombinationMode::Random => self.random.next_below(n_parents),
                // Parent k (0 = best) is picked with weight 1/(k+2), so
                // better-ranked parents recombine more often without
                // excluding the rest outright.
                RecombinationMode::Value => {
                    let weights: Vec<f64> = (0..n_parents).map(|k| 1.0 / (k as f64 + 2.0)).collect();
                    let total: f64 = weights.iter().sum();
                    let mut r = self.random.next_f64() * total;
                    let mut chosen = n_parents - 1;
                    for (k, w) in weights.iter().enumerate() {
                        if r < *w {
                            chosen = k;
                            break;
                        }
                        r -= w;
                    }
                    chosen
                }
            };
            let parent = self.individuals[j].clone();
            let child = &mut self.individuals[i];
            child.load(&parent);
            child.set_role(Role::Child);
            child.mark_generation(self.generation);
        }
    }

    fn mutate_children(&mut self) -> Result<(), EngineError> {
        match &self.mode {
            ExecutionMode::Serial => serial::mutate_children(self),
            ExecutionMode::ThreadPool { .. } => threaded::mutate_children(self),
            ExecutionMode::Broker { .. } => broker_mode::mutate_children(self),
        }
    }

    fn select(&mut self) {
        let n_parents = self.n_parents;
        let maximize = self.operators.maximize;
        let total = n_parents + self.default_n_children;

        let range_start = match self.sort_mode {
            SortMode::MuPlusNu => 0,
            SortMode::MuCommaNu | SortMode::MuCommaNuElitist => n_parents,
        };

        // Elitist variant: remember the current best parent before the
        // comma-selection would otherwise discard it.
        let elite = if self.sort_mode == SortMode::MuCommaNuElitist {
            self.individuals[..n_parents]
                .iter()
                .cloned()
                .min_by(|a, b| {
                    let (fa, fb) = (a.cached_fitness(), b.cached_fitness());
                    if maximize {
                        fb.partial_cmp(&fa).unwrap_or(std::cmp::Ordering::Equal)
                    } else {
                        fa.partial_cmp(&fb).unwrap_or(std::cmp::Ordering::Equal)
                    }
                })
        } else {
            None
        };

        let range = &mut self.individuals[range_start..];
        range.sort_by(|a, b| {
            let (fa, fb) = (a.cached_fitness(), b.cached_fitness());
            if maximize {
                fb.partial_cmp(&fa).unwrap_or(std::cmp::Ordering::Equal)
            } else {
                fa.partial_cmp(&fb).unwrap_or(std::cmp::Ordering::Equal)
            }
        });

        if range_start != 0 {
            // mu,nu: swap the best children into the parent slots.
            for i in 0..n_parents {
                self.individuals.swap(i, range_start + i);
            }
        }

        if let Some(mut elite) = elite {
            let worst_new_parent_is_better = {
                let worst = &self.individuals[n_parents - 1];
                if maximize {
                    worst.cached_fitness() >= elite.cached_fitness()
                } else {
                    worst.cached_fitness() <= elite.cached_fitness()
                }
            };
            if !worst_new_parent_is_better {
                elite.set_role(Role::Parent);
                self.individuals[n_parents - 1] = elite;
                self.individuals[..n_parents].sort_by(|a, b| {
                    let (fa, fb) = (a.cached_fitness(), b.cached_fitness());
                    if maximize {
                        fb.partial_cmp(&fa).unwrap_or(std::cmp::Ordering::Equal)
                    } else {
                        fa.partial_cmp(&fb).unwrap_or(std::cmp::Ordering::Equal)
                    }
                });
            }
        }

        debug_assert_eq!(self.individuals.len(), total);
        for (i, ind) in self.individuals.iter_mut().enumerate() {
            ind.position = i;
            ind.set_role(if i < n_parents { Role::Parent } else { Role::Child });
        }
    }

    fn do_info(&mut self) {
        if self.on_info.is_none() {
            return;
        }
        let info = GenerationInfo {
            generation: self.generation,
            best_fitness: self.best_fitness(),
            individuals: &self.individuals,
        };
        (self.on_info.as_mut().unwrap())(&info);
    }

    fn should_halt(&mut self) -> bool {
        if self.max_generation != 0 && self.generation > self.max_generation {
            return true;
        }
        if let (Some(max_duration), Some(start)) = (self.max_duration, self.start_time) {
            if start.elapsed() >= max_duration {
                return true;
            }
        }
        if let Some(custom) = self.custom_halt.take() {
            let mut custom = custom;
            let halt = custom(self);
            self.custom_halt = Some(custom);
            return halt;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::individual::{FitnessFunction, ParameterAdaptor, Payload};

    #[derive(Debug)]
    struct Identity;
    impl ParameterAdaptor for Identity {
        fn mutate_doubles(&self, values: &mut [f64]) {
            for v in values.iter_mut() {
                *v += 0.0;
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

    fn seed() -> Individual {
        Individual::new(Payload::DoubleVec(vec![1.0, 2.0]), Role::Parent)
    }

    #[test]
    fn test_population_fills_missing_slots_by_cloning_first() {
        let pop = Population::new(
            vec![seed()],
            2,
            3,
            SortMode::MuPlusNu,
            RecombinationMode::Random,
            operators(),
            RandomFactory::with_seed(1),
            ExecutionMode::Serial,
        )
        .unwrap();
        assert_eq!(pop.individuals().len(), 5);
    }

    #[test]
    fn test_mu_plus_nu_requires_popsize_greater_than_nparents() {
        let err = Population::new(
            vec![seed()],
            2,
            0,
            SortMode::MuPlusNu,
            RecombinationMode::Random,
            operators(),
            RandomFactory::with_seed(1),
            ExecutionMode::Serial,
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::InvalidPopulation(_)));
    }

    #[test]
    fn test_mu_comma_nu_requires_popsize_at_least_twice_nparents() {
        let err = Population::new(
            vec![seed()],
            3,
            2,
            SortMode::MuCommaNu,
            RecombinationMode::Random,
            operators(),
            RandomFactory::with_seed(1),
            ExecutionMode::Serial,
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::InvalidPopulation(_)));
    }

    #[test]
    fn test_optimize_converges_on_parabola_s1() {
        let individuals: Vec<Individual> = (0..10)
            .map(|i| Individual::new(Payload::DoubleVec(vec![i as f64, -(i as f64)]), Role::Parent))
            .collect();
        let mut pop = Population::new(
            individuals,
            2,
            8,
            SortMode::MuPlusNu,
            RecombinationMode::Random,
            operators(),
            RandomFactory::with_seed(42),
            ExecutionMode::Serial,
        )
        .unwrap()
        .with_max_generation(100);

        pop.optimize().unwrap();

        assert_eq!(pop.generation(), 101);
        assert!(pop.best_fitness() < 1e-4, "best fitness was {}", pop.best_fitness());
        assert_eq!(pop.individuals()[0].role(), Role::Parent);
    }

    #[test]
    fn test_select_truncates_to_nominal_size() {
        let individuals: Vec<Individual> = (0..6)
            .map(|i| Individual::new(Payload::DoubleVec(vec![i as f64]), Role::Parent))
            .collect();
        let mut pop = Population::new(
            individuals,
            2,
            4,
            SortMode::MuPlusNu,
            RecombinationMode::Random,
            operators(),
            RandomFactory::with_seed(7),
            ExecutionMode::Serial,
        )
        .unwrap();
        pop.mark_generation();
        pop.recombine();
        pop.mutate_children().unwrap();
        pop.select();
        assert_eq!(pop.individuals().len(), 6);
        assert_eq!(pop.individuals()[..2].iter().filter(|i| i.role() == Role::Parent).count(), 2);
    }
}
