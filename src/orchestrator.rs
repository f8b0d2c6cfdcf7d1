//! Top-level entry points: method selection, worker-pool dispatch, one `draw_*`
//! function per process kind.

use crate::data::{AttrTable, InitMethod};
use crate::engine::{self, seq::SeqOptions, Artifact, EngineOptions};
use crate::ensemble::{Ensemble, RealizationFuture};
use crate::error::{Result, SimulationError};
use crate::geometry::Domain;
use crate::numeric_types::Real;
use crate::process::{ExternalBackend, GaussianProcess, IndicatorProcess, LindgrenProcess, Process};
use crate::rng::child_rng;
use crate::workspace::WorkerPool;
use log::debug;
use nalgebra::DVector;
use rayon::prelude::*;
use std::sync::mpsc;
use std::sync::Arc;

/// Simulation method.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    Lu,
    Seq,
    Fft,
    Lindgren,
    External,
}

/// Receives a completion event for each finished realization. The engine ships no terminal
/// rendering; callers wanting a progress display implement this and hand it to
/// [`DrawOptions::progress`].
pub trait ProgressReporter: Send + Sync {
    fn realization_done(&self, index: usize, total: usize);
}

/// Tunable parameters shared by every `draw_*` entry point.
#[derive(Clone)]
pub struct DrawOptions<R: Real> {
    /// Overrides method auto-selection; `None` defers to `Process::default_method`.
    pub method: Option<Method>,
    pub init: InitMethod,
    pub seq: SeqOptions<R>,
    /// Explicit bivariate cross-correlation for LU co-simulation.
    pub rho: Option<R>,
    pub n_realizations: usize,
    pub seed: u64,
    /// Explicit worker pool; `None` runs on the ambient rayon global pool.
    pub pool: Option<WorkerPool>,
    /// Returns immediately with pending [`RealizationFuture`]s instead of blocking until
    /// every realization finishes. Requires an explicit `pool` with
    /// at least one dedicated thread, since the calling thread must not itself be a worker.
    pub async_mode: bool,
    /// When `false`, one realization's failure is isolated to its own ensemble slot instead
    /// of aborting the whole call.
    pub fail_fast: bool,
    /// Per-realization progress sink; `None` reports nothing.
    pub progress: Option<Arc<dyn ProgressReporter>>,
}

impl<R: Real> Default for DrawOptions<R> {
    fn default() -> Self {
        Self {
            method: None,
            init: InitMethod::default(),
            seq: SeqOptions::default(),
            rho: None,
            n_realizations: 1,
            seed: 0,
            pool: None,
            async_mode: false,
            fail_fast: true,
            progress: None,
        }
    }
}

fn validate_async<R: Real>(opts: &DrawOptions<R>) -> Result<()> {
    if !opts.async_mode {
        return Ok(());
    }
    match &opts.pool {
        Some(pool) if pool.num_threads() > 0 => Ok(()),
        _ => Err(SimulationError::InvalidWorkerPool),
    }
}

/// Draws realizations of a Gaussian field process.
pub fn draw_gaussian<R: Real>(
    process: &GaussianProcess<R>,
    domain: &dyn Domain<R>,
    data: Option<(&AttrTable<R>, &[DVector<R>])>,
    opts: &DrawOptions<R>,
) -> Result<Ensemble<R>> {
    validate_async(opts)?;
    let method = opts
        .method
        .unwrap_or_else(|| process.default_method(domain, data.is_some()));
    debug!(
        "gaussian draw: method {method:?}, {} elements, {} realizations",
        domain.element_count(),
        opts.n_realizations
    );
    let engine_opts = EngineOptions {
        init: opts.init.clone(),
        seq: opts.seq.clone(),
        rho: opts.rho,
        seed: opts.seed,
    };
    let artifact = engine::preprocess_gaussian(process, domain, data, method, &engine_opts)?;
    realize_many(Arc::new(artifact), domain.element_count(), opts)
}

/// Draws realizations of an indicator (categorical) process.
pub fn draw_indicator<R: Real>(
    process: &IndicatorProcess<R>,
    domain: &dyn Domain<R>,
    data: Option<(&AttrTable<R>, &[DVector<R>])>,
    opts: &DrawOptions<R>,
) -> Result<Ensemble<R>> {
    validate_async(opts)?;
    let method = opts
        .method
        .unwrap_or_else(|| process.default_method(domain, data.is_some()));
    debug!(
        "indicator draw: method {method:?}, {} elements, {} realizations",
        domain.element_count(),
        opts.n_realizations
    );
    let engine_opts = EngineOptions {
        init: opts.init.clone(),
        seq: opts.seq.clone(),
        rho: opts.rho,
        seed: opts.seed,
    };
    let artifact = engine::preprocess_indicator(process, domain, data, method, &engine_opts)?;
    realize_many(Arc::new(artifact), domain.element_count(), opts)
}

/// Draws realizations of a Lindgren/SPDE process.
pub fn draw_lindgren<R: Real>(
    process: &LindgrenProcess<R>,
    domain: &dyn Domain<R>,
    opts: &DrawOptions<R>,
) -> Result<Ensemble<R>> {
    validate_async(opts)?;
    let method = opts.method.unwrap_or(Method::Lindgren);
    let artifact = engine::preprocess_lindgren(process, domain, method)?;
    realize_many(Arc::new(artifact), domain.element_count(), opts)
}

/// Draws realizations of a `Method::External` process through its own
/// [`ExternalBackend`] implementation, bypassing
/// [`crate::engine::Artifact`] entirely since this crate carries no concrete third-party
/// back-end to preprocess on the process's behalf.
///
/// `P` must be `'static` because a true `async_mode` dispatch would need to hand the process
/// to a detached worker thread; since that's not actually needed here (every
/// [`ExternalBackend`] currently in this crate is either stateless or immediately errors),
/// `async_mode` for external processes runs eagerly on the calling thread (optionally inside
/// `opts.pool`) and reports results as already-resolved futures.
pub fn draw_external<R: Real, P: ExternalBackend<R> + Process<R>>(
    process: &P,
    domain: &dyn Domain<R>,
    opts: &DrawOptions<R>,
) -> Result<Ensemble<R>> {
    validate_async(opts)?;
    process.check(domain)?;
    let n = domain.element_count();
    let seed = opts.seed;
    let n_realizations = opts.n_realizations;

    let progress = opts.progress.clone();
    let run = || -> Vec<std::result::Result<AttrTable<R>, SimulationError>> {
        (0..n_realizations)
            .into_par_iter()
            .map(|index| {
                let mut rng = child_rng(seed, index as u64);
                let table = process.single(&mut rng, n);
                if let Some(p) = &progress {
                    p.realization_done(index, n_realizations);
                }
                Ok(table)
            })
            .collect()
    };
    let results = match &opts.pool {
        Some(pool) => pool.install(run),
        None => run(),
    };

    if opts.async_mode {
        let futures = results
            .into_iter()
            .map(|r| {
                let (tx, rx) = mpsc::channel();
                let _ = tx.send(r);
                RealizationFuture::new(rx)
            })
            .collect();
        return Ok(Ensemble::from_futures(futures));
    }
    finish(results, opts.fail_fast)
}

fn realize_many<R: Real>(
    artifact: Arc<Artifact<R>>,
    n_elements: usize,
    opts: &DrawOptions<R>,
) -> Result<Ensemble<R>> {
    let seed = opts.seed;
    let n_realizations = opts.n_realizations;

    if opts.async_mode {
        let pool = opts.pool.as_ref().expect("validated by validate_async");
        let mut futures = Vec::with_capacity(n_realizations);
        for index in 0..n_realizations {
            let (tx, rx) = mpsc::channel();
            futures.push(RealizationFuture::new(rx));
            let artifact = Arc::clone(&artifact);
            let progress = opts.progress.clone();
            pool.spawn(move || {
                let mut rng = child_rng(seed, index as u64);
                let result = artifact.single(&mut rng, n_elements);
                if let Some(p) = &progress {
                    p.realization_done(index, n_realizations);
                }
                let _ = tx.send(result);
            });
        }
        return Ok(Ensemble::from_futures(futures));
    }

    let progress = opts.progress.clone();
    let run = || -> Vec<std::result::Result<AttrTable<R>, SimulationError>> {
        (0..n_realizations)
            .into_par_iter()
            .map(|index| {
                let mut rng = child_rng(seed, index as u64);
                let result = artifact.single(&mut rng, n_elements);
                if let Some(p) = &progress {
                    p.realization_done(index, n_realizations);
                }
                result
            })
            .collect()
    };
    let results = match &opts.pool {
        Some(pool) => pool.install(run),
        None => run(),
    };
    finish(results, opts.fail_fast)
}

fn finish<R: Real>(
    results: Vec<std::result::Result<AttrTable<R>, SimulationError>>,
    fail_fast: bool,
) -> Result<Ensemble<R>> {
    if !fail_fast {
        return Ok(Ensemble::from_results(results));
    }
    if let Some(index) = results.iter().position(|r| r.is_err()) {
        let err = match results.into_iter().nth(index) {
            Some(Err(e)) => e,
            _ => unreachable!(),
        };
        return Err(SimulationError::WorkerFailure {
            index,
            source: anyhow::anyhow!(err.to_string()),
        });
    }
    let ready: Vec<AttrTable<R>> = results.into_iter().map(|r| r.unwrap()).collect();
    Ok(Ensemble::from_ready(ready))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::AttrTable;
    use crate::function::{spherical_covariance, FormKind, LinearModelOfCoregionalization, SphericalStructure};
    use crate::geometry::CartesianGrid;
    use nalgebra::DMatrix;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn async_mode_without_a_pool_is_rejected() {
        let opts: DrawOptions<f64> = DrawOptions {
            async_mode: true,
            ..Default::default()
        };
        assert!(matches!(validate_async(&opts), Err(SimulationError::InvalidWorkerPool)));
    }

    #[test]
    fn async_mode_with_a_dedicated_pool_is_accepted() {
        let opts: DrawOptions<f64> = DrawOptions {
            async_mode: true,
            pool: Some(WorkerPool::new(1).unwrap()),
            ..Default::default()
        };
        assert!(validate_async(&opts).is_ok());
    }

    #[test]
    fn finish_fail_fast_surfaces_the_first_error() {
        let results: Vec<std::result::Result<AttrTable<f64>, SimulationError>> = vec![
            Ok(AttrTable::empty(&["z"], 1)),
            Err(SimulationError::NotPositiveDefinite),
        ];
        let err = finish(results, true).unwrap_err();
        assert!(matches!(err, SimulationError::WorkerFailure { index: 1, .. }));
    }

    #[test]
    fn finish_without_fail_fast_isolates_failures_per_slot() {
        let results: Vec<std::result::Result<AttrTable<f64>, SimulationError>> = vec![
            Ok(AttrTable::empty(&["z"], 1)),
            Err(SimulationError::NotPositiveDefinite),
        ];
        let mut ensemble = finish(results, false).unwrap();
        assert!(ensemble.fetch(0).is_ok());
        assert!(ensemble.fetch(1).is_err());
    }

    #[test]
    fn draw_gaussian_smoke_test_on_a_small_grid() {
        let grid: CartesianGrid<f64> = CartesianGrid::new(vec![5]);
        let func = spherical_covariance(10.0f64);
        let process = GaussianProcess::new(Box::new(func), vec![0.0]).unwrap();
        let opts: DrawOptions<f64> = DrawOptions {
            n_realizations: 3,
            seed: 11,
            ..Default::default()
        };
        let mut ensemble = draw_gaussian(&process, &grid, None, &opts).unwrap();
        assert_eq!(ensemble.len(), 3);
        for i in 0..3 {
            assert!(ensemble.fetch(i).unwrap().mask("z").unwrap().iter().all(|&k| k));
        }
    }

    #[test]
    fn draw_indicator_produces_categories_in_the_declared_alphabet() {
        let grid: CartesianGrid<f64> = CartesianGrid::new(vec![15]);
        let sill = DMatrix::from_diagonal(&DVector::from_vec(vec![1.0, 1.0, 1.0]));
        let structure = SphericalStructure::new(4.0f64, 1.0, FormKind::Covariance);
        let func = LinearModelOfCoregionalization::new(structure, sill);
        let process = IndicatorProcess::new(Box::new(func), vec![0.2, 0.3, 0.5]).unwrap();
        let opts: DrawOptions<f64> = DrawOptions {
            n_realizations: 2,
            seed: 21,
            ..Default::default()
        };
        let mut ensemble = draw_indicator(&process, &grid, None, &opts).unwrap();
        for r in 0..2 {
            for &v in ensemble.fetch(r).unwrap().column("category").unwrap() {
                assert!((1.0..=3.0).contains(&v));
            }
        }
    }

    #[test]
    fn lu_conditioning_data_is_reproduced_in_every_realization() {
        let grid: CartesianGrid<f64> = CartesianGrid::new(vec![100]);
        let func = spherical_covariance(10.0f64);
        let process = GaussianProcess::new(Box::new(func), vec![0.0]).unwrap();

        let mut data: AttrTable<f64> = AttrTable::raw_rows(&["z"], 5);
        let values = [0.0, 1.0, 0.0, 1.0, 0.0];
        let positions = [0.0, 25.0, 50.0, 75.0, 99.0];
        for (row, &v) in values.iter().enumerate() {
            data.set("z", row, v);
        }
        let locations: Vec<DVector<f64>> =
            positions.iter().map(|&p| DVector::from_vec(vec![p])).collect();

        let opts: DrawOptions<f64> = DrawOptions {
            method: Some(Method::Lu),
            n_realizations: 3,
            seed: 123,
            ..Default::default()
        };
        let mut ensemble = draw_gaussian(&process, &grid, Some((&data, &locations)), &opts).unwrap();
        for r in 0..3 {
            let table = ensemble.fetch(r).unwrap();
            let col = table.column("z").unwrap();
            for (k, &p) in positions.iter().enumerate() {
                assert_eq!(col[p as usize], values[k]);
            }
        }
    }

    #[test]
    fn lu_bivariate_cosimulation_honors_the_cross_correlation() {
        let grid: CartesianGrid<f64> = CartesianGrid::new(vec![500]);
        let structure = SphericalStructure::new(10.0f64, 1.0, FormKind::Covariance);
        let sill = DMatrix::from_row_slice(2, 2, &[1.0, 0.95, 0.95, 1.0]);
        let func = LinearModelOfCoregionalization::new(structure, sill);
        let process = GaussianProcess::new(Box::new(func), vec![0.0, 0.0]).unwrap();

        let opts: DrawOptions<f64> = DrawOptions {
            method: Some(Method::Lu),
            seed: 99,
            ..Default::default()
        };
        let mut ensemble = draw_gaussian(&process, &grid, None, &opts).unwrap();
        let table = ensemble.fetch(0).unwrap();
        let z1 = table.column("z1").unwrap();
        let z2 = table.column("z2").unwrap();
        assert_eq!(z1.len(), 500);
        assert_eq!(z2.len(), 500);

        let n = z1.len() as f64;
        let m1 = z1.iter().sum::<f64>() / n;
        let m2 = z2.iter().sum::<f64>() / n;
        let cov: f64 = z1.iter().zip(z2).map(|(a, b)| (a - m1) * (b - m2)).sum::<f64>() / n;
        let s1: f64 = (z1.iter().map(|a| (a - m1).powi(2)).sum::<f64>() / n).sqrt();
        let s2: f64 = (z2.iter().map(|b| (b - m2).powi(2)).sum::<f64>() / n).sqrt();
        let corr = cov / (s1 * s2);
        assert!(corr > 0.85 && corr <= 1.0, "sample correlation was {corr}");
    }

    #[test]
    fn ensemble_content_is_independent_of_worker_count() {
        let grid: CartesianGrid<f64> = CartesianGrid::new(vec![30]);
        let func = spherical_covariance(5.0f64);
        let process = GaussianProcess::new(Box::new(func), vec![0.0]).unwrap();

        let base: DrawOptions<f64> = DrawOptions {
            method: Some(Method::Lu),
            n_realizations: 4,
            seed: 77,
            ..Default::default()
        };
        let pooled = DrawOptions {
            pool: Some(WorkerPool::new(2).unwrap()),
            ..base.clone()
        };

        let mut a = draw_gaussian(&process, &grid, None, &base).unwrap();
        let mut b = draw_gaussian(&process, &grid, None, &pooled).unwrap();
        for i in 0..4 {
            assert_eq!(
                a.fetch(i).unwrap().column("z"),
                b.fetch(i).unwrap().column("z")
            );
        }
    }

    #[test]
    fn async_realizations_match_the_synchronous_result() {
        let grid: CartesianGrid<f64> = CartesianGrid::new(vec![20]);
        let func = spherical_covariance(5.0f64);
        let process = GaussianProcess::new(Box::new(func), vec![0.0]).unwrap();

        let sync_opts: DrawOptions<f64> = DrawOptions {
            method: Some(Method::Lu),
            n_realizations: 3,
            seed: 31,
            ..Default::default()
        };
        let async_opts = DrawOptions {
            pool: Some(WorkerPool::new(2).unwrap()),
            async_mode: true,
            ..sync_opts.clone()
        };

        let mut sync_ensemble = draw_gaussian(&process, &grid, None, &sync_opts).unwrap();
        let mut async_ensemble = draw_gaussian(&process, &grid, None, &async_opts).unwrap();
        async_ensemble.resolve_all();
        for i in 0..3 {
            assert_eq!(
                sync_ensemble.fetch(i).unwrap().column("z"),
                async_ensemble.fetch(i).unwrap().column("z")
            );
        }
    }

    #[test]
    fn draw_lindgren_runs_on_point_sets_and_rejects_grids() {
        use crate::geometry::PointSet;

        let set = PointSet::new(vec![
            DVector::from_vec(vec![0.0, 0.0]),
            DVector::from_vec(vec![1.0, 2.0]),
        ]);
        let process = LindgrenProcess::new(1.0f64, 1.0).unwrap();
        let opts: DrawOptions<f64> = DrawOptions {
            n_realizations: 2,
            seed: 4,
            ..Default::default()
        };
        let mut ensemble = draw_lindgren(&process, &set, &opts).unwrap();
        assert_eq!(ensemble.len(), 2);
        assert_eq!(ensemble.fetch(0).unwrap().len(), 2);

        let grid: CartesianGrid<f64> = CartesianGrid::new(vec![3, 3]);
        assert!(draw_lindgren(&process, &grid, &opts).is_err());
    }

    #[test]
    fn progress_reporter_sees_every_realization() {
        struct Counter(AtomicUsize);
        impl ProgressReporter for Counter {
            fn realization_done(&self, _index: usize, _total: usize) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let grid: CartesianGrid<f64> = CartesianGrid::new(vec![10]);
        let func = spherical_covariance(5.0f64);
        let process = GaussianProcess::new(Box::new(func), vec![0.0]).unwrap();
        let counter = Arc::new(Counter(AtomicUsize::new(0)));
        let opts: DrawOptions<f64> = DrawOptions {
            method: Some(Method::Lu),
            n_realizations: 5,
            seed: 1,
            progress: Some(counter.clone()),
            ..Default::default()
        };
        draw_gaussian(&process, &grid, None, &opts).unwrap();
        assert_eq!(counter.0.load(Ordering::SeqCst), 5);
    }
}
