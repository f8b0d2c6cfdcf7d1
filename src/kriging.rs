//! Minimal Kriging predictor collaborator.
//!
//! Implements ordinary Kriging for a Gaussian process (mean + covariance) and a simplex
//! predictor for an indicator process (per-category probability), backed by the dense
//! normal-equations solve from `nalgebra`. Fitting a variogram/covariance *from data* is
//! explicitly out of scope; this module only predicts given an already-specified
//! function.

use crate::error::{Result, SimulationError};
use crate::function::GeospatialFunction;
use crate::numeric_types::Real;
use nalgebra::{DMatrix, DVector};

/// The model a [`Kriging`] predictor targets: a Gaussian mean/covariance pair, or a
/// categorical simplex of class probabilities.
pub enum KrigingTarget<R: Real> {
    Gaussian { mean: R },
    Indicator { prior: Vec<R> },
}

/// A Kriging predictor bound to a geospatial function and a target (mean or prior
/// probabilities); `fit` solves the local normal equations for a specific neighborhood.
pub struct Kriging<'f, R: Real> {
    func: &'f dyn GeospatialFunction<R>,
    target: KrigingTarget<R>,
}

/// Result of fitting the Kriging system to one local neighborhood.
pub struct FitResult<R: Real> {
    weights: DVector<R>,
    local_values: DVector<R>,
    local_mean: R,
    variance: R,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FitStatus {
    Ok,
    Singular,
}

impl<'f, R: Real> Kriging<'f, R> {
    pub fn new(func: &'f dyn GeospatialFunction<R>, mean: R) -> Self {
        Self {
            func,
            target: KrigingTarget::Gaussian { mean },
        }
    }

    pub fn new_indicator(func: &'f dyn GeospatialFunction<R>, prior: Vec<R>) -> Self {
        Self {
            func,
            target: KrigingTarget::Indicator { prior },
        }
    }

    /// Fits simple Kriging (known, constant mean) to a local neighborhood: neighbor
    /// centroid distances from the target point (`dists_to_target`), the pairwise distance
    /// matrix between neighbors (`neighbor_dists`), and neighbor values.
    ///
    /// Returns `Err(EmptyNeighborhood)` when no neighbors are given and
    /// `Err(KrigingSystemSingular)` when the local covariance matrix cannot be solved;
    /// the SEQ engine recovers from both by drawing from the prior.
    pub fn fit(
        &self,
        j: usize,
        neighbor_dists: &DMatrix<R>,
        dists_to_target: &DVector<R>,
        neighbor_values: &DVector<R>,
    ) -> Result<FitResult<R>> {
        let n = neighbor_values.len();
        assert_eq!(neighbor_dists.nrows(), n);
        assert_eq!(dists_to_target.len(), n);
        if n == 0 {
            return Err(SimulationError::EmptyNeighborhood);
        }

        let mean = match &self.target {
            KrigingTarget::Gaussian { mean } => *mean,
            KrigingTarget::Indicator { prior } => prior[j],
        };

        let mut k_matrix = DMatrix::zeros(n, n);
        for r in 0..n {
            for c in 0..n {
                k_matrix[(r, c)] = self.func.covariance(j, neighbor_dists[(r, c)]);
            }
        }
        let k0: DVector<R> = dists_to_target.map(|h| self.func.covariance(j, h));

        let chol = nalgebra::linalg::Cholesky::new(k_matrix.clone())
            .ok_or(SimulationError::KrigingSystemSingular)?;
        let weights = chol.solve(&k0);

        let sill = self.func.sill(j);
        let variance_reduction = weights.dot(&k0);
        let variance = (sill - variance_reduction).max(R::zero());

        Ok(FitResult {
            weights,
            local_values: neighbor_values.clone(),
            local_mean: mean,
            variance,
        })
    }

    pub fn status(fit: &Result<FitResult<R>>) -> FitStatus {
        match fit {
            Ok(_) => FitStatus::Ok,
            Err(_) => FitStatus::Singular,
        }
    }
}

impl<R: Real> FitResult<R> {
    /// Kriging-predicted mean at the target point.
    pub fn predicted_mean(&self) -> R {
        let residuals = &self.local_values - DVector::from_element(self.local_values.len(), self.local_mean);
        self.local_mean + self.weights.dot(&residuals)
    }

    /// Kriging variance at the target point.
    pub fn variance(&self) -> R {
        self.variance
    }
}

/// Batch Kriging prediction of the mean field at a set of target points from a fixed set of
/// data points (`fit_predict(model, data, domain, …)`), used by the FFT engine to
/// compute the conditional mean field over the whole grid without going
/// through the SEQ engine's local-neighborhood machinery.
pub fn fit_predict<R: Real>(
    func: &dyn GeospatialFunction<R>,
    j: usize,
    data_points: &[DVector<R>],
    data_values: &DVector<R>,
    mean: R,
    targets: &[DVector<R>],
) -> Result<Vec<R>> {
    let n = data_points.len();
    let mut c_dd = DMatrix::zeros(n, n);
    for r in 0..n {
        for c in 0..n {
            let h = (&data_points[r] - &data_points[c]).norm();
            c_dd[(r, c)] = func.covariance(j, h);
        }
    }
    let chol = nalgebra::linalg::Cholesky::new(c_dd).ok_or(SimulationError::NotPositiveDefinite)?;
    let residual = data_values - DVector::from_element(n, mean);
    let w = chol.solve(&residual);

    let mut out = Vec::with_capacity(targets.len());
    for t in targets {
        let mut pred = mean;
        for i in 0..n {
            let h = (t - &data_points[i]).norm();
            pred = pred + func.covariance(j, h) * w[i];
        }
        out.push(pred);
    }
    Ok(out)
}

/// Predicts the per-category probability vector at a target point from a set of already
/// one-hot-encoded indicator neighbor values: clamps
/// each category's Kriging mean to `[0, 1]` and renormalizes across categories.
pub fn predict_prob<R: Real>(
    func: &dyn GeospatialFunction<R>,
    prior: &[R],
    neighbor_dists: &DMatrix<R>,
    dists_to_target: &DVector<R>,
    one_hot_values: &[DVector<R>],
) -> Result<Vec<R>> {
    let k = prior.len();
    let mut probs = vec![R::zero(); k];
    for (cat, values) in one_hot_values.iter().enumerate().take(k) {
        let kr = Kriging::new_indicator(func, prior.to_vec());
        let fit = kr.fit(cat, neighbor_dists, dists_to_target, values)?;
        probs[cat] = fit.predicted_mean().max(R::zero()).min(R::one());
    }
    let total: R = probs.iter().cloned().fold(R::zero(), |a, b| a + b);
    if total > R::zero() {
        for p in probs.iter_mut() {
            *p = *p / total;
        }
    } else {
        probs = prior.to_vec();
    }
    Ok(probs)
}
