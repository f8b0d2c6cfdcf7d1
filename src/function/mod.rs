//! Minimal geostatistics-function collaborator: covariance/variogram kernels.
//!
//! Out of scope is a full variogram-fitting or modeling package; what this
//! module provides is the dual covariance/variogram evaluation contract the engines need:
//! `sill`, `range`, `is_stationary`, `is_symmetric`, `is_banded`, `variate_count`, pairwise
//! evaluation, and scaling.

mod multivariate;
mod structures;

pub use multivariate::LinearModelOfCoregionalization;
pub use structures::{ExponentialStructure, GaussianStructure, SphericalStructure};

use crate::geometry::Domain;
use crate::numeric_types::Real;
use nalgebra::{DMatrix, DVector};

/// Whether a kernel is expressed as a covariance (`C(0) = sill`, decaying to zero) or as a
/// variogram (`gamma(h) = sill - C(h)`, growing from zero to the sill).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FormKind {
    Covariance,
    Variogram,
}

/// A single stationary covariance/variogram structure (one nested structure of a model).
pub trait Structure<R: Real>: Send + Sync {
    /// Value of the structure's covariance form at lag distance `h` (always in covariance
    /// form regardless of `form()`, so callers of [`Structure::evaluate`] never need to
    /// branch on it themselves).
    fn covariance(&self, h: R) -> R;
    fn sill(&self) -> R;
    fn range(&self) -> R;
    fn form(&self) -> FormKind;
    fn is_stationary(&self) -> bool {
        true
    }
    fn is_symmetric(&self) -> bool {
        true
    }
    /// "Banded" here means `C(0) = sill` and `C(h) -> 0` as `h -> infinity`.
    fn is_banded(&self) -> bool {
        true
    }
}

/// A (possibly multivariate) geospatial function usable as a process kernel.
///
/// `sill` for a multivariate function is the `(variate_count, variate_count)` marginal/
/// cross sill matrix; for a univariate function it is a 1x1 matrix.
pub trait GeospatialFunction<R: Real>: Send + Sync {
    fn variate_count(&self) -> usize;
    fn sill_matrix(&self) -> DMatrix<R>;
    fn range(&self) -> R;
    fn is_stationary(&self) -> bool;
    fn is_symmetric(&self) -> bool;
    fn is_banded(&self) -> bool;

    /// Evaluates the covariance (always in covariance form) between variate `j`
    /// at lag distance `h`.
    fn covariance(&self, j: usize, h: R) -> R;

    /// Returns a rescaled copy of this function with every range scaled by `alpha`.
    fn scale(&self, alpha: R) -> Box<dyn GeospatialFunction<R>>;

    /// Marginal sill of variate `j`.
    fn sill(&self, j: usize) -> R {
        self.sill_matrix()[(j, j)]
    }
}

/// Evaluates the pairwise covariance matrix of variate `j` between two index sets of a
/// domain (`pairwise(func, dom_a, dom_b)`).
pub fn pairwise<R: Real>(
    func: &dyn GeospatialFunction<R>,
    j: usize,
    dom: &dyn Domain<R>,
    idx_a: &[usize],
    idx_b: &[usize],
) -> DMatrix<R> {
    let mut m = DMatrix::zeros(idx_a.len(), idx_b.len());
    let centroids_a: Vec<DVector<R>> = idx_a.iter().map(|&i| dom.centroid(i)).collect();
    let centroids_b: Vec<DVector<R>> = idx_b.iter().map(|&i| dom.centroid(i)).collect();
    for (row, ca) in centroids_a.iter().enumerate() {
        for (col, cb) in centroids_b.iter().enumerate() {
            let h = (ca - cb).norm();
            m[(row, col)] = func.covariance(j, h);
        }
    }
    m
}

/// Univariate wrapper around a single [`Structure`], the common case (`SphericalCovariance`,
/// `GaussianVariogram`, ...).
#[derive(Clone)]
pub struct UnivariateFunction<S> {
    structure: S,
}

impl<S> UnivariateFunction<S> {
    pub fn new(structure: S) -> Self {
        Self { structure }
    }
}

impl<R: Real, S: Structure<R> + Clone + Scalable<R> + 'static> GeospatialFunction<R> for UnivariateFunction<S> {
    fn variate_count(&self) -> usize {
        1
    }

    fn sill_matrix(&self) -> DMatrix<R> {
        DMatrix::from_element(1, 1, self.structure.sill())
    }

    fn range(&self) -> R {
        self.structure.range()
    }

    fn is_stationary(&self) -> bool {
        self.structure.is_stationary()
    }

    fn is_symmetric(&self) -> bool {
        self.structure.is_symmetric()
    }

    fn is_banded(&self) -> bool {
        self.structure.is_banded()
    }

    fn covariance(&self, _j: usize, h: R) -> R {
        self.structure.covariance(h)
    }

    fn scale(&self, alpha: R) -> Box<dyn GeospatialFunction<R>> {
        Box::new(UnivariateFunction::new(scale_structure(&self.structure, alpha)))
    }
}

/// Scales a structure's range by `alpha`, keeping its sill fixed.
fn scale_structure<R: Real, S: Structure<R> + Clone + Scalable<R>>(s: &S, alpha: R) -> S {
    s.scaled(alpha)
}

/// Per-structure range rescaling, implemented alongside each concrete [`Structure`].
pub trait Scalable<R: Real> {
    fn scaled(&self, alpha: R) -> Self;
}

/// Convenience constructors for commonly used covariance/variogram shapes.
/// `GeospatialFunction::covariance` always returns `sill - gamma(h)` internally for a
/// variogram-form structure, so the rest of the engine never branches on form.
pub type SphericalCovariance<R> = UnivariateFunction<SphericalStructure<R>>;
pub type GaussianCovariance<R> = UnivariateFunction<GaussianStructure<R>>;
pub type ExponentialCovariance<R> = UnivariateFunction<ExponentialStructure<R>>;
pub type SphericalVariogram<R> = UnivariateFunction<SphericalStructure<R>>;
pub type GaussianVariogram<R> = UnivariateFunction<GaussianStructure<R>>;
pub type ExponentialVariogram<R> = UnivariateFunction<ExponentialStructure<R>>;

/// Builds a unit-sill spherical covariance with the given range.
pub fn spherical_covariance<R: Real>(range: R) -> SphericalCovariance<R> {
    UnivariateFunction::new(SphericalStructure::new(range, R::one(), FormKind::Covariance))
}

/// Builds a unit-sill spherical variogram with the given range.
pub fn spherical_variogram<R: Real>(range: R) -> SphericalVariogram<R> {
    UnivariateFunction::new(SphericalStructure::new(range, R::one(), FormKind::Variogram))
}

/// Builds a unit-sill Gaussian covariance with the given range.
pub fn gaussian_covariance<R: Real>(range: R) -> GaussianCovariance<R> {
    UnivariateFunction::new(GaussianStructure::new(range, R::one(), FormKind::Covariance))
}

/// Builds a unit-sill Gaussian variogram with the given range.
pub fn gaussian_variogram<R: Real>(range: R) -> GaussianVariogram<R> {
    UnivariateFunction::new(GaussianStructure::new(range, R::one(), FormKind::Variogram))
}

/// Builds a unit-sill exponential covariance with the given range.
pub fn exponential_covariance<R: Real>(range: R) -> ExponentialCovariance<R> {
    UnivariateFunction::new(ExponentialStructure::new(range, R::one(), FormKind::Covariance))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::CartesianGrid;
    use nalgebra::DMatrix;

    #[test]
    fn spherical_covariance_is_sill_at_zero_and_zero_past_the_range() {
        let func = spherical_covariance(10.0f64);
        assert_eq!(func.covariance(0, 0.0), 1.0);
        assert_eq!(func.covariance(0, 10.0), 0.0);
        assert_eq!(func.covariance(0, 25.0), 0.0);
        assert!(func.covariance(0, 5.0) > 0.0 && func.covariance(0, 5.0) < 1.0);
    }

    #[test]
    fn variogram_and_covariance_forms_describe_the_same_kernel() {
        let cov = spherical_covariance(10.0f64);
        let vario = spherical_variogram(10.0f64);
        for h in [0.0, 2.5, 5.0, 9.9, 15.0] {
            assert_eq!(cov.covariance(0, h), vario.covariance(0, h));
        }
    }

    #[test]
    fn gaussian_and_exponential_decay_monotonically() {
        let g = gaussian_covariance(4.0f64);
        let e = exponential_covariance(4.0f64);
        assert!((g.covariance(0, 0.0) - 1.0).abs() < 1e-12);
        assert!((e.covariance(0, 0.0) - 1.0).abs() < 1e-12);
        assert!(g.covariance(0, 1.0) > g.covariance(0, 2.0));
        assert!(e.covariance(0, 1.0) > e.covariance(0, 2.0));
        // Both drop to (nearly) nothing at the effective range.
        assert!(g.covariance(0, 4.0) < 0.06);
        assert!(e.covariance(0, 4.0) < 0.06);
    }

    #[test]
    fn scaling_rescales_the_range_and_keeps_the_sill() {
        let func = spherical_covariance(10.0f64);
        let scaled = func.scale(0.5);
        assert_eq!(scaled.range(), 5.0);
        assert_eq!(scaled.sill(0), 1.0);
        assert_eq!(scaled.covariance(0, 5.0), 0.0);
    }

    #[test]
    fn pairwise_evaluates_covariance_between_index_sets() {
        let grid: CartesianGrid<f64> = CartesianGrid::new(vec![5]);
        let func = spherical_covariance(10.0f64);
        let m = pairwise(&func, 0, &grid, &[0, 1], &[0, 4]);
        assert_eq!(m.nrows(), 2);
        assert_eq!(m.ncols(), 2);
        assert_eq!(m[(0, 0)], 1.0);
        assert!(m[(0, 1)] < m[(1, 1)]);
    }

    #[test]
    fn coregionalization_derives_cross_correlation_from_the_sill_matrix() {
        let structure = SphericalStructure::new(10.0f64, 1.0, FormKind::Covariance);
        let sill = DMatrix::from_row_slice(2, 2, &[4.0, 1.0, 1.0, 1.0]);
        let lmc = LinearModelOfCoregionalization::new(structure, sill);
        assert_eq!(lmc.variate_count(), 2);
        assert_eq!(lmc.cross_correlation(0, 1), 0.5);
        // Marginal covariance at lag zero equals the marginal sill.
        assert_eq!(lmc.covariance(0, 0.0), 4.0);
        assert_eq!(lmc.covariance(1, 0.0), 1.0);
    }
}
