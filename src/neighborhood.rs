//! Spatial index over a domain with per-call availability masking, backed by
//! `rstar`'s R*-tree.

use crate::geometry::Domain;
use crate::numeric_types::Real;
use nalgebra::DVector;
use num::ToPrimitive;
use rstar::{PointDistance, RTree, RTreeObject, AABB};

/// An anisotropic (or plain Euclidean, when `axes` is all-ones) metric ball restriction.
#[derive(Clone, Debug)]
pub struct MetricBall<R: Real> {
    pub radius: R,
    /// Per-axis scale applied before computing distance; `[1, 1, ...]` for an isotropic ball.
    pub axes: Vec<R>,
}

impl<R: Real> MetricBall<R> {
    pub fn isotropic(radius: R, dim: usize) -> Self {
        Self {
            radius,
            axes: vec![R::one(); dim],
        }
    }

    fn metric_distance(&self, a: &DVector<R>, b: &DVector<R>) -> R {
        let mut acc = R::zero();
        for d in 0..a.len() {
            let diff = (a[d] - b[d]) / self.axes[d];
            acc = acc + diff * diff;
        }
        acc.sqrt()
    }

    fn contains(&self, a: &DVector<R>, b: &DVector<R>) -> bool {
        self.metric_distance(a, b) <= self.radius
    }

    /// Scales the ball's radius by `alpha`.
    pub fn scale(&self, alpha: R) -> Self {
        Self {
            radius: self.radius * alpha,
            axes: self.axes.clone(),
        }
    }
}

/// Neighborhood restriction sentinel.
#[derive(Clone, Debug)]
pub enum Neighborhood<R: Real> {
    /// Pure k-nearest, no radius restriction.
    None,
    /// `MetricBall(range(func))`, resolved at preprocess time.
    AutoFromRange,
    /// An explicit ball restriction.
    Ball(MetricBall<R>),
}

impl<R: Real> Default for Neighborhood<R> {
    fn default() -> Self {
        Neighborhood::None
    }
}

struct IndexedPoint<R: Real> {
    index: usize,
    coords: Vec<f64>,
    original: DVector<R>,
}

impl<R: Real> RTreeObject for IndexedPoint<R> {
    type Envelope = AABB<[f64; 8]>;

    fn envelope(&self) -> Self::Envelope {
        let mut padded = [0.0; 8];
        for (i, v) in self.coords.iter().enumerate() {
            padded[i] = *v;
        }
        AABB::from_point(padded)
    }
}

impl<R: Real> PointDistance for IndexedPoint<R> {
    fn distance_2(&self, point: &[f64; 8]) -> f64 {
        let mut acc = 0.0;
        for i in 0..self.coords.len() {
            let diff = self.coords[i] - point[i];
            acc += diff * diff;
        }
        acc
    }
}

/// Immutable spatial index over a domain; supports `k`-nearest queries subject
/// to an availability mask and an optional metric-ball bound.
///
/// Dimension is capped at 8 (the `rstar` envelope width used here); every domain this
/// engine targets (2d/3d grids, low-dimensional point sets) fits comfortably.
pub struct NeighborhoodIndex<R: Real> {
    tree: RTree<IndexedPoint<R>>,
    dim: usize,
}

impl<R: Real> NeighborhoodIndex<R> {
    pub fn build(domain: &dyn Domain<R>) -> Self {
        let n = domain.element_count();
        let dim = domain.centroid(0).len();
        assert!(dim <= 8, "neighborhood index supports at most 8 dimensions");
        let points: Vec<IndexedPoint<R>> = (0..n)
            .map(|i| {
                let c = domain.centroid(i);
                let coords: Vec<f64> = (0..dim).map(|d| c[d].to_f64().unwrap()).collect();
                IndexedPoint {
                    index: i,
                    coords,
                    original: c,
                }
            })
            .collect();
        Self {
            tree: RTree::bulk_load(points),
            dim,
        }
    }

    /// Returns up to `k` indices of unmasked cells nearest to `point`, ascending by
    /// distance, ties broken by ascending index, optionally restricted by `ball`.
    pub fn search(
        &self,
        point: &DVector<R>,
        k: usize,
        available: impl Fn(usize) -> bool,
        ball: Option<&MetricBall<R>>,
    ) -> Vec<usize> {
        let mut padded = [0.0; 8];
        for d in 0..self.dim {
            padded[d] = point[d].to_f64().unwrap();
        }

        let mut candidates: Vec<(R, usize)> = Vec::new();
        for p in self.tree.nearest_neighbor_iter(&padded) {
            if !available(p.index) {
                continue;
            }
            if let Some(ball) = ball {
                if !ball.contains(&p.original, point) {
                    // R*-tree nearest-neighbor iteration is monotonic in Euclidean distance,
                    // not in the (possibly anisotropic) ball metric, so candidates outside the
                    // ball are skipped rather than used to terminate the scan early.
                    continue;
                }
            }
            let dist = (&p.original - point).norm();
            candidates.push((dist, p.index));
            // Bound the scan: once we have well more than k candidates within a generously
            // expanded window we can stop, since nearest_neighbor_iter is distance-sorted.
            if candidates.len() >= k.saturating_mul(4).max(64) {
                break;
            }
        }

        candidates.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap().then(a.1.cmp(&b.1)));
        candidates.truncate(k);
        candidates.into_iter().map(|(_, i)| i).collect()
    }
}
