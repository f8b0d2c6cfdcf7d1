//!
//! Engine for generating random realizations of spatial stochastic processes: Gaussian
//! field processes and indicator (categorical) field processes, over regular grids or
//! point-set domains, via dense LU factorization, sequential neighborhood-Kriging, and
//! spectral (FFT-MA) simulation. Entry points are the `draw_*` functions in
//! [`orchestrator`].
//!

/// Re-export of the version of nalgebra used by this crate.
pub use nalgebra;

pub mod data;
pub mod distributions;
pub mod engine;
pub mod ensemble;
pub mod error;
pub mod function;
pub mod geometry;
pub mod kriging;
pub mod neighborhood;
mod numeric_types;
pub mod orchestrator;
pub mod process;
pub mod rng;
pub mod scaling;
pub mod workspace;

pub use error::{Result, SimulationError};
pub use numeric_types::{Real, ThreadSafe};
pub use workspace::{initialize_global_pool, WorkerPool};
