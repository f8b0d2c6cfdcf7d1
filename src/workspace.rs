//! Worker pool used by [`crate::orchestrator::draw_gaussian`] and friends to run realization
//! tasks.
//!
//! Each realization is a pure function of an immutable [`crate::engine::Artifact`], so there's
//! no mutable per-thread scratch buffer worth caching here; what matters is having a
//! dedicated, explicitly sized pool rather than relying on rayon's ambient global pool, so
//! concurrent callers don't contend over the same thread budget.

use std::sync::Arc;

/// A dedicated rayon thread pool scoped to one or more `draw_*` calls.
#[derive(Clone)]
pub struct WorkerPool {
    pool: Arc<rayon::ThreadPool>,
}

impl WorkerPool {
    /// Builds a pool with the given number of threads.
    pub fn new(num_threads: usize) -> Result<Self, anyhow::Error> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build()?;
        Ok(Self { pool: Arc::new(pool) })
    }

    pub fn num_threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Runs `op` on this pool, blocking the caller until it completes.
    pub fn install<T: Send>(&self, op: impl FnOnce() -> T + Send) -> T {
        self.pool.install(op)
    }

    /// Fires `task` onto this pool without waiting for it to complete.
    pub fn spawn(&self, task: impl FnOnce() + Send + 'static) {
        self.pool.spawn(task);
    }
}

/// Initializes the ambient global rayon pool used when a `draw_*` call has no explicit
/// [`WorkerPool`]. Can only be called once per process.
pub fn initialize_global_pool(num_threads: usize) -> Result<(), anyhow::Error> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build_global()?;
    Ok(())
}
