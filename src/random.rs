//! Shared random number factory.
//!
//! A single `RandomFactory` owns a small pool of producer threads, each of
//! which keeps a bounded ring of pre-generated `u64` values filled ahead of
//! demand. Individuals and populations pull from a cheap per-call handle
//! instead of contending on one shared RNG lock, which matters once
//! mutation is happening on many worker threads at once.
//!
//! Reseeding via [`RandomFactory::seed_from`] stops and restarts every
//! producer with a derived seed, which is what lets a `Client` feed the
//! seed value the server handed it into its own local factory before
//! starting a compute cycle (see `client::network`).

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::constants::{RANDOM_FACTORY_RING_SIZE, RANDOM_FACTORY_THREADS};

struct Ring {
    values: Mutex<Vec<u64>>,
}

impl Ring {
    fn new() -> Self {
        Self {
            values: Mutex::new(Vec::with_capacity(RANDOM_FACTORY_RING_SIZE)),
        }
    }

    fn fill(&self, rng: &mut StdRng) {
        let mut guard = self.values.lock().expect("random ring mutex poisoned");
        while guard.len() < RANDOM_FACTORY_RING_SIZE {
            guard.push(rng.random());
        }
    }

    fn take(&self) -> Option<u64> {
        self.values.lock().expect("random ring mutex poisoned").pop()
    }
}

struct Producer {
    ring: Arc<Ring>,
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

fn spawn_producer(seed: u64) -> Producer {
    let ring = Arc::new(Ring::new());
    let shutdown = Arc::new(AtomicBool::new(false));
    let ring_clone = Arc::clone(&ring);
    let shutdown_clone = Arc::clone(&shutdown);

    let handle = thread::spawn(move || {
        let mut rng = StdRng::seed_from_u64(seed);
        while !shutdown_clone.load(Ordering::SeqCst) {
            ring_clone.fill(&mut rng);
            thread::sleep(std::time::Duration::from_millis(5));
        }
    });

    Producer {
        ring,
        shutdown,
        handle: Some(handle),
    }
}

impl Drop for Producer {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

/// Singleton-style pool of producer threads backing random draws.
pub struct RandomFactory {
    producers: Mutex<Vec<Producer>>,
    next: AtomicU64,
    seed: AtomicU64,
}

impl std::fmt::Debug for RandomFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RandomFactory")
            .field("seed", &self.seed.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl RandomFactory {
    /// Builds a factory seeded from OS entropy, with
    /// [`RANDOM_FACTORY_THREADS`] producer threads running.
    pub fn new() -> Arc<Self> {
        Self::with_seed(rand::random())
    }

    /// Builds a factory whose producers are all deterministically derived
    /// from `seed` (each producer gets `seed.wrapping_add(index)` so they
    /// don't all emit identical sequences).
    pub fn with_seed(seed: u64) -> Arc<Self> {
        let producers = (0..RANDOM_FACTORY_THREADS)
            .map(|i| spawn_producer(seed.wrapping_add(i as u64)))
            .collect();

        Arc::new(Self {
            producers: Mutex::new(producers),
            next: AtomicU64::new(0),
            seed: AtomicU64::new(seed),
        })
    }

    /// The seed this factory was last (re)started with. Sent to clients so
    /// they can derive their own local factory from the same stream.
    pub fn seed(&self) -> u64 {
        self.seed.load(Ordering::SeqCst)
    }

    /// Stops every producer thread and restarts them from `seed`.
    pub fn seed_from(&self, seed: u64) {
        let mut guard = self.producers.lock().expect("random factory mutex poisoned");
        guard.clear(); // drops join the old threads
        for i in 0..RANDOM_FACTORY_THREADS {
            guard.push(spawn_producer(seed.wrapping_add(i as u64)));
        }
        self.seed.store(seed, Ordering::SeqCst);
    }

    /// Draws the next `u64`, round-robining across producers. Falls back
    /// to a direct draw if every ring is momentarily empty, so callers
    /// never block on factory startup.
    pub fn next_u64(&self) -> u64 {
        let producers = self.producers.lock().expect("random factory mutex poisoned");
        if producers.is_empty() {
            return rand::random();
        }
        let start = self.next.fetch_add(1, Ordering::Relaxed) as usize % producers.len();
        for offset in 0..producers.len() {
            let idx = (start + offset) % producers.len();
            if let Some(v) = producers[idx].ring.take() {
                return v;
            }
        }
        rand::random()
    }

    /// Draws a uniform `f64` in `[0, 1)`.
    pub fn next_f64(&self) -> f64 {
        (self.next_u64() >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Draws a uniform `usize` in `[0, bound)`. `bound` must be non-zero.
    pub fn next_below(&self, bound: usize) -> usize {
        assert!(bound > 0, "next_below requires a non-zero bound");
        (self.next_u64() % bound as u64) as usize
    }
}
