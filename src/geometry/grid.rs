//! Regular lattice domain and index-subset views onto it.

use super::aabb::AxisAlignedBoundingBox;
use super::Domain;
use crate::numeric_types::Real;
use nalgebra::DVector;

/// A regular n-dimensional lattice: a shape tuple, an origin, and per-axis cell spacing.
#[derive(Clone, Debug)]
pub struct CartesianGrid<R: Real> {
    shape: Vec<usize>,
    origin: Vec<R>,
    step: Vec<R>,
}

impl<R: Real> CartesianGrid<R> {
    /// Builds a grid with unit spacing and zero origin, one entry per axis of `shape`.
    pub fn new(shape: Vec<usize>) -> Self {
        let dim = shape.len();
        Self::with_origin_and_step(shape, vec![R::zero(); dim], vec![R::one(); dim])
    }

    pub fn with_origin_and_step(shape: Vec<usize>, origin: Vec<R>, step: Vec<R>) -> Self {
        assert!(!shape.is_empty(), "grid shape must not be empty");
        assert!(shape.iter().all(|&s| s > 0), "grid axes must be non-empty");
        assert_eq!(shape.len(), origin.len());
        assert_eq!(shape.len(), step.len());
        Self { shape, origin, step }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn dim(&self) -> usize {
        self.shape.len()
    }

    /// Converts a flat linear index to per-axis multi-index (row-major, last axis fastest).
    pub fn multi_index(&self, linear: usize) -> Vec<usize> {
        let mut idx = vec![0usize; self.shape.len()];
        let mut rem = linear;
        for d in (0..self.shape.len()).rev() {
            idx[d] = rem % self.shape[d];
            rem /= self.shape[d];
        }
        idx
    }

    /// Converts a per-axis multi-index into a flat linear index (row-major).
    pub fn linear_index(&self, multi: &[usize]) -> usize {
        assert_eq!(multi.len(), self.shape.len());
        let mut linear = 0usize;
        for d in 0..self.shape.len() {
            linear = linear * self.shape[d] + multi[d];
        }
        linear
    }

    /// The reference cell at `shape / 2`, used by the FFT engine.
    pub fn reference_cell(&self) -> usize {
        let multi: Vec<usize> = self.shape.iter().map(|&s| s / 2).collect();
        self.linear_index(&multi)
    }

    /// Builds a view exposing only the given subset of indices into this grid.
    pub fn view(self, indices: Vec<usize>) -> GridView<R>
    where
        Self: Sized,
    {
        GridView::new(self, indices)
    }
}

impl<R: Real> Domain<R> for CartesianGrid<R> {
    fn element_count(&self) -> usize {
        self.shape.iter().product()
    }

    fn centroid(&self, i: usize) -> DVector<R> {
        let multi = self.multi_index(i);
        let coords: Vec<R> = multi
            .iter()
            .enumerate()
            .map(|(d, &m)| self.origin[d] + self.step[d] * R::from_usize(m).unwrap())
            .collect();
        DVector::from_vec(coords)
    }

    fn bounding_box(&self) -> AxisAlignedBoundingBox<R> {
        let n = self.element_count();
        let points: Vec<DVector<R>> = (0..n).map(|i| self.centroid(i)).collect();
        AxisAlignedBoundingBox::from_points(&points)
    }

    fn dims(&self) -> Option<Vec<usize>> {
        Some(self.shape.clone())
    }

    /// A bare grid is its own parent (the identity view): the FFT applicability check and
    /// method auto-selection rule only need `parent(domain)` to resolve to a grid,
    /// whether `domain` is a full `CartesianGrid` or a `GridView` subset of one.
    fn parent(&self) -> Option<&CartesianGrid<R>> {
        Some(self)
    }
}

/// A subset of indices into a parent [`CartesianGrid`].
///
/// Invariant: `parent(view(grid, indices))` reproduces the originating grid,
/// and the view is non-empty.
#[derive(Clone, Debug)]
pub struct GridView<R: Real> {
    parent: CartesianGrid<R>,
    indices: Vec<usize>,
}

impl<R: Real> GridView<R> {
    pub fn new(parent: CartesianGrid<R>, indices: Vec<usize>) -> Self {
        assert!(!indices.is_empty(), "grid views must be non-empty");
        Self { parent, indices }
    }
}

impl<R: Real> Domain<R> for GridView<R> {
    fn element_count(&self) -> usize {
        self.indices.len()
    }

    fn centroid(&self, i: usize) -> DVector<R> {
        self.parent.centroid(self.indices[i])
    }

    fn bounding_box(&self) -> AxisAlignedBoundingBox<R> {
        let points: Vec<DVector<R>> = self.indices.iter().map(|&p| self.parent.centroid(p)).collect();
        AxisAlignedBoundingBox::from_points(&points)
    }

    fn parent(&self) -> Option<&CartesianGrid<R>> {
        Some(&self.parent)
    }

    fn parent_indices(&self) -> Option<&[usize]> {
        Some(&self.indices)
    }

    fn dims(&self) -> Option<Vec<usize>> {
        Some(self.parent.shape.clone())
    }
}
