//! Multivariate geospatial function: a linear model of coregionalization over one shared
//! stationary structure, used by the LU engine's bivariate co-simulation.

use super::{GeospatialFunction, Scalable, Structure};
use crate::numeric_types::Real;
use nalgebra::DMatrix;

/// A multivariate function built from a single structure and a cross/marginal sill matrix.
///
/// The `(j, j)` entry of `sill` is the marginal sill of variate `j`; `(j, k)` for `j != k`
/// is the cross-sill, from which the LU engine derives the cross-correlation `rho` when no
/// explicit correlation parameter is given.
pub struct LinearModelOfCoregionalization<R: Real, S> {
    structure: S,
    sill: DMatrix<R>,
}

impl<R: Real, S: Structure<R>> LinearModelOfCoregionalization<R, S> {
    pub fn new(structure: S, sill: DMatrix<R>) -> Self {
        assert!(sill.is_square(), "sill must be a square matrix");
        Self { structure, sill }
    }

    /// Cross-correlation between variates `j` and `k` implied by the sill matrix.
    pub fn cross_correlation(&self, j: usize, k: usize) -> R {
        let cross = self.sill[(j, k)];
        let denom = (self.sill[(j, j)] * self.sill[(k, k)]).sqrt();
        if denom > R::zero() {
            cross / denom
        } else {
            R::zero()
        }
    }
}

impl<R: Real, S: Structure<R> + Scalable<R> + Clone + 'static> GeospatialFunction<R>
    for LinearModelOfCoregionalization<R, S>
{
    fn variate_count(&self) -> usize {
        self.sill.nrows()
    }

    fn sill_matrix(&self) -> DMatrix<R> {
        self.sill.clone()
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

    fn covariance(&self, j: usize, h: R) -> R {
        // The shared structure's correlation shape, scaled to variate j's marginal sill.
        let base_sill = self.structure.sill();
        let corr = if base_sill > R::zero() {
            self.structure.covariance(h) / base_sill
        } else {
            R::zero()
        };
        self.sill[(j, j)] * corr
    }

    fn scale(&self, alpha: R) -> Box<dyn GeospatialFunction<R>> {
        Box::new(LinearModelOfCoregionalization {
            structure: self.structure.scaled(alpha),
            sill: self.sill.clone(),
        })
    }
}
