//! Serial `mutateChildren`: no threads, no wire traffic, just a direct
//! loop over the child slice. The baseline every other execution mode
//! is checked against.

use crate::error::EngineError;

use super::Population;

pub(super) fn mutate_children(pop: &mut Population) -> Result<(), EngineError> {
    let n_parents = pop.n_parents;

    for child in pop.individuals[n_parents..].iter_mut() {
        child.mutate(pop.operators.adaptor.as_ref());
        child.fitness(pop.operators.fitness.as_ref());
    }

    // Only the very first generation's parents can still be dirty (seed
    // individuals that were never evaluated); every later generation's
    // parents were already evaluated children promoted by `select`, so
    // this is a cheap no-op most of the time.
    for parent in pop.individuals[..n_parents].iter_mut() {
        if parent.is_dirty() {
            parent.fitness(pop.operators.fitness.as_ref());
        }
    }

    Ok(())
}
