//! Numerical scaling to unit extent.
//!
//! Every engine first derives `alpha = 1 / max(extent(domain), extent(data), range(func))`
//! and applies it uniformly to the domain, the data, the function, and any metric ball, to
//! avoid covariance-matrix ill-conditioning from large absolute coordinates.

use crate::geometry::{extent, Domain};
use crate::neighborhood::MetricBall;
use crate::numeric_types::Real;
use nalgebra::DVector;

/// Computes the scaling factor for a domain, optional data locations, and a function range.
pub fn scale_factor<R: Real>(
    domain: &dyn Domain<R>,
    data_locations: Option<&[DVector<R>]>,
    func_range: R,
) -> R {
    let mut max_extent = extent(domain);
    if let Some(locs) = data_locations {
        if locs.len() > 1 {
            let aabb = crate::geometry::AxisAlignedBoundingBox::from_points(locs);
            let data_extent = aabb.max_side();
            if data_extent > max_extent {
                max_extent = data_extent;
            }
        }
    }
    if func_range > max_extent {
        max_extent = func_range;
    }
    if max_extent <= R::zero() {
        R::one()
    } else {
        R::one() / max_extent
    }
}

/// Scales a slice of point locations by `alpha` in place.
pub fn scale_points<R: Real>(points: &mut [DVector<R>], alpha: R) {
    for p in points.iter_mut() {
        *p *= alpha;
    }
}

/// Scales a metric ball's radius by `alpha`.
pub fn scale_ball<R: Real>(ball: &MetricBall<R>, alpha: R) -> MetricBall<R> {
    ball.scale(alpha)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::CartesianGrid;

    #[test]
    fn scale_factor_uses_domain_extent_alone() {
        let grid: CartesianGrid<f64> = CartesianGrid::new(vec![5]);
        let alpha = scale_factor(&grid, None, 0.0);
        assert_eq!(alpha, 1.0 / 4.0);
    }

    #[test]
    fn scale_factor_widens_for_larger_data_extent() {
        let grid: CartesianGrid<f64> = CartesianGrid::new(vec![5]);
        let locations = vec![
            DVector::from_vec(vec![0.0]),
            DVector::from_vec(vec![20.0]),
        ];
        let alpha = scale_factor(&grid, Some(&locations), 0.0);
        assert_eq!(alpha, 1.0 / 20.0);
    }

    #[test]
    fn scale_factor_widens_for_larger_func_range() {
        let grid: CartesianGrid<f64> = CartesianGrid::new(vec![5]);
        let alpha = scale_factor(&grid, None, 100.0);
        assert_eq!(alpha, 1.0 / 100.0);
    }

    #[test]
    fn scale_factor_falls_back_to_one_when_degenerate() {
        let grid: CartesianGrid<f64> = CartesianGrid::new(vec![1]);
        let alpha = scale_factor(&grid, None, 0.0);
        assert_eq!(alpha, 1.0);
    }

    #[test]
    fn scale_points_applies_uniformly() {
        let mut points = vec![DVector::from_vec(vec![2.0, 4.0])];
        scale_points(&mut points, 0.5);
        assert_eq!(points[0], DVector::from_vec(vec![1.0, 2.0]));
    }

    #[test]
    fn scale_ball_shrinks_radius() {
        let ball = MetricBall::isotropic(4.0, 1);
        let scaled = scale_ball(&ball, 0.5);
        assert_eq!(scaled.radius, 2.0);
    }
}
