//! Unstructured point-set domain.

use super::aabb::AxisAlignedBoundingBox;
use super::Domain;
use crate::numeric_types::Real;
use nalgebra::DVector;

/// A domain given directly as a list of point centroids, with no lattice structure.
#[derive(Clone, Debug)]
pub struct PointSet<R: Real> {
    points: Vec<DVector<R>>,
}

impl<R: Real> PointSet<R> {
    pub fn new(points: Vec<DVector<R>>) -> Self {
        assert!(!points.is_empty(), "point set domains must not be empty");
        Self { points }
    }
}

impl<R: Real> Domain<R> for PointSet<R> {
    fn element_count(&self) -> usize {
        self.points.len()
    }

    fn centroid(&self, i: usize) -> DVector<R> {
        self.points[i].clone()
    }

    fn bounding_box(&self) -> AxisAlignedBoundingBox<R> {
        AxisAlignedBoundingBox::from_points(&self.points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centroid_returns_the_stored_point() {
        let points = vec![
            DVector::from_vec(vec![1.0, 2.0]),
            DVector::from_vec(vec![3.0, 4.0]),
        ];
        let set = PointSet::new(points);
        assert_eq!(set.element_count(), 2);
        assert_eq!(set.centroid(1), DVector::from_vec(vec![3.0, 4.0]));
    }
}
