//! Thread-pool `mutateChildren`: splits the child slice into `workers`
//! contiguous chunks and mutates/evaluates each chunk on its own scoped
//! thread. No broker, no serialization — just borrowed slices, since
//! everything stays in one process.

use crate::error::EngineError;

use super::{ExecutionMode, Population};

pub(super) fn mutate_children(pop: &mut Population) -> Result<(), EngineError> {
    let workers = match pop.mode {
        ExecutionMode::ThreadPool { workers } => workers.max(1),
        _ => unreachable!("threaded::mutate_children called outside ExecutionMode::ThreadPool"),
    };

    let n_parents = pop.n_parents;
    let operators = pop.operators.clone();
    let children = &mut pop.individuals[n_parents..];

    if !children.is_empty() {
        let chunk_size = children.len().div_ceil(workers).max(1);
        std::thread::scope(|scope| {
            for chunk in children.chunks_mut(chunk_size) {
                let operators = operators.clone();
                scope.spawn(move || {
                    for child in chunk.iter_mut() {
                        child.mutate(operators.adaptor.as_ref());
                        child.fitness(operators.fitness.as_ref());
                    }
                });
            }
        });
    }

    for parent in pop.individuals[..n_parents].iter_mut() {
        if parent.is_dirty() {
            parent.fitness(pop.operators.fitness.as_ref());
        }
    }

    Ok(())
}
