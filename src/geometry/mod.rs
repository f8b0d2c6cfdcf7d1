//! Minimal geometry collaborator: domains, grids, views.
//!
//! Geometry primitives are treated as an external concern the engines depend on through a
//! narrow contract (`element_count`, `centroid`, `parent`, `parent_indices`, `dims`,
//! `bounding_box`); this module provides just enough of a real implementation, regular
//! grids, point sets, and grid views, to exercise and test the simulation engines against
//! that contract.

mod aabb;
mod grid;
mod point_set;

pub use aabb::AxisAlignedBoundingBox;
pub use grid::{CartesianGrid, GridView};
pub use point_set::PointSet;

use crate::numeric_types::Real;
use nalgebra::DVector;

/// A geospatial domain: an ordered, non-empty sequence of elements with centroids.
pub trait Domain<R: Real>: Send + Sync {
    /// Number of elements (cells/points) in the domain.
    fn element_count(&self) -> usize;

    /// Centroid of element `i` in n-dimensional space.
    fn centroid(&self, i: usize) -> DVector<R>;

    /// Axis-aligned bounding box enclosing every element centroid.
    fn bounding_box(&self) -> AxisAlignedBoundingBox<R>;

    /// If this domain is a view into a parent grid, the parent grid; otherwise `None`.
    fn parent(&self) -> Option<&CartesianGrid<R>> {
        None
    }

    /// If this domain is a view, the indices into the parent grid it exposes.
    fn parent_indices(&self) -> Option<&[usize]> {
        None
    }

    /// Regular-grid shape, if this domain (or its parent) is a grid.
    fn dims(&self) -> Option<Vec<usize>> {
        None
    }

    /// Whether this domain is (a view of) a regular grid.
    fn is_grid(&self) -> bool {
        self.dims().is_some()
    }
}

/// Largest centroid-to-centroid extent of a domain's bounding box, used to derive the
/// numerical scaling factor.
pub fn extent<R: Real, D: Domain<R> + ?Sized>(domain: &D) -> R {
    domain.bounding_box().max_side()
}
