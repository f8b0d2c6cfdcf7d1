//! Axis-aligned bounding box, generic over dimension (n-d) rather than fixed to 3d.

use crate::numeric_types::Real;
use nalgebra::DVector;

/// An axis-aligned bounding box in n-dimensional space.
#[derive(Clone, Debug)]
pub struct AxisAlignedBoundingBox<R: Real> {
    min: DVector<R>,
    max: DVector<R>,
}

impl<R: Real> AxisAlignedBoundingBox<R> {
    pub fn new(min: DVector<R>, max: DVector<R>) -> Self {
        assert_eq!(min.len(), max.len(), "min/max dimension mismatch");
        Self { min, max }
    }

    /// Computes the smallest enclosing AABB of a set of points; panics on an empty set.
    pub fn from_points(points: &[DVector<R>]) -> Self {
        let mut iter = points.iter();
        let first = iter.next().expect("cannot bound an empty point set");
        let mut min = first.clone();
        let mut max = first.clone();
        for p in iter {
            for d in 0..p.len() {
                if p[d] < min[d] {
                    min[d] = p[d];
                }
                if p[d] > max[d] {
                    max[d] = p[d];
                }
            }
        }
        Self { min, max }
    }

    pub fn min(&self) -> &DVector<R> {
        &self.min
    }

    pub fn max(&self) -> &DVector<R> {
        &self.max
    }

    pub fn dim(&self) -> usize {
        self.min.len()
    }

    /// Extent of the box along each axis.
    pub fn extents(&self) -> DVector<R> {
        &self.max - &self.min
    }

    /// Largest axis extent.
    pub fn max_side(&self) -> R {
        self.extents().iter().cloned().fold(R::zero(), |a, b| if b > a { b } else { a })
    }

    /// Smallest axis extent.
    pub fn min_side(&self) -> R {
        self.extents()
            .iter()
            .cloned()
            .fold(R::max_value().unwrap(), |a, b| if b < a { b } else { a })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_points_bounds_exactly() {
        let points = vec![
            DVector::from_vec(vec![0.0, 5.0]),
            DVector::from_vec(vec![3.0, -2.0]),
            DVector::from_vec(vec![1.0, 1.0]),
        ];
        let aabb = AxisAlignedBoundingBox::from_points(&points);
        assert_eq!(aabb.min(), &DVector::from_vec(vec![0.0, -2.0]));
        assert_eq!(aabb.max(), &DVector::from_vec(vec![3.0, 5.0]));
    }

    #[test]
    fn max_and_min_side_pick_extreme_axes() {
        let aabb = AxisAlignedBoundingBox::new(
            DVector::from_vec(vec![0.0, 0.0]),
            DVector::from_vec(vec![10.0, 2.0]),
        );
        assert_eq!(aabb.max_side(), 10.0);
        assert_eq!(aabb.min_side(), 2.0);
    }
}
