//! Error taxonomy for the simulation engine.

use thiserror::Error as ThisError;

/// Error returned by the public entry points of the engine.
///
/// Preprocess failures (everything except [`SimulationError::WorkerFailure`])
/// abort the whole call before any realization work is dispatched; a
/// [`SimulationError::WorkerFailure`] is attached to a single ensemble slot and does not
/// cancel its peers.
#[non_exhaustive]
#[derive(Debug, ThisError)]
pub enum SimulationError {
    /// `|mean| != variate_count(func)` or `variable_count != variate_count(func)`.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),
    /// Requested method/process combination is not implemented by any engine.
    #[error("unsupported method: {0}")]
    UnsupportedMethod(String),
    /// LU/FFT requested with a non-stationary covariance function.
    #[error("function is not stationary, required by the chosen method")]
    NotStationary,
    /// Cholesky factorization failed inside the LU or Lindgren engine.
    #[error("covariance matrix is not positive definite")]
    NotPositiveDefinite,
    /// Kriging normal equations were singular during a SEQ step.
    ///
    /// This variant is only ever produced internally and immediately recovered from
    /// (falls back to drawing from the prior); it is exposed so callers inspecting a
    /// [`crate::ensemble::Ensemble`] slot failure can distinguish the cause.
    #[error("kriging system singular")]
    KrigingSystemSingular,
    /// Fewer than `min_neigh` neighbors were available for a SEQ step.
    ///
    /// Like [`SimulationError::KrigingSystemSingular`], this is immediately recovered from
    /// inside the SEQ engine (logged, then the draw falls back to the prior); it surfaces
    /// only to direct callers of the Kriging predictor.
    #[error("empty neighborhood")]
    EmptyNeighborhood,
    /// `ExplicitInit` source/destination index arrays have different lengths.
    #[error("length mismatch: {0} vs {1}")]
    LengthMismatch(usize, usize),
    /// `async_mode = true` with the calling worker included in the worker pool.
    #[error("invalid worker pool: calling worker must not be a member when async_mode is set")]
    InvalidWorkerPool,
    /// A worker task failed while producing one realization.
    #[error("worker failed to produce realization {index}: {source}")]
    WorkerFailure { index: usize, source: anyhow::Error },
    /// Catch-all for errors surfaced by a collaborator (geometry, function, Kriging).
    #[error("unknown error")]
    Unknown(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, SimulationError>;
