//! Sequential Gaussian / indicator simulation engine.

use super::path::{build_path, Path};
use crate::data::{bind, AttrTable, InitMethod};
use crate::distributions::{categorical, normal};
use crate::error::Result;
use crate::function::GeospatialFunction;
use crate::geometry::Domain;
use crate::kriging::{predict_prob, Kriging};
use crate::neighborhood::{MetricBall, Neighborhood, NeighborhoodIndex};
use crate::numeric_types::Real;
use crate::process::{GaussianProcess, IndicatorProcess};
use crate::rng::child_rng;
use crate::scaling;
use log::warn;
use nalgebra::{DMatrix, DVector};
use num::ToPrimitive;
use rand::Rng;

/// Default cap on neighborhood size when a caller doesn't set `max_neigh` explicitly.
pub const DEFAULT_MAX_NEIGH: usize = 26;

/// Stream index reserved for deriving the traversal path's RNG, distinct from any
/// realization index (which starts at 0), so the path is deterministic for a given seed
/// independent of how many realizations are later drawn.
const PATH_RNG_INDEX: u64 = u64::MAX;

/// Tunable parameters for the SEQ engine.
#[derive(Clone, Debug)]
pub struct SeqOptions<R: Real> {
    pub neighborhood: Neighborhood<R>,
    pub min_neigh: usize,
    pub max_neigh: usize,
    pub path: Path,
}

impl<R: Real> Default for SeqOptions<R> {
    fn default() -> Self {
        Self {
            neighborhood: Neighborhood::None,
            min_neigh: 1,
            max_neigh: DEFAULT_MAX_NEIGH,
            path: Path::default(),
        }
    }
}

enum SeqKind<R: Real> {
    Gaussian { mean: R },
    Indicator { prior: Vec<R> },
}

/// Shared-immutable artifact produced once by [`preprocess`] and consumed by every
/// realization's [`single`] call.
pub struct SeqArtifact<R: Real> {
    index: NeighborhoodIndex<R>,
    centroids: Vec<DVector<R>>,
    func: Box<dyn GeospatialFunction<R>>,
    min_neigh: usize,
    max_neigh: usize,
    ball: Option<MetricBall<R>>,
    path: Vec<usize>,
    init_mask: Vec<bool>,
    init_gaussian: Vec<R>,
    init_category: Vec<Option<usize>>,
    kind: SeqKind<R>,
    output_names: Vec<&'static str>,
}

fn resolve_ball<R: Real>(neighborhood: &Neighborhood<R>, range: R, dim: usize) -> Option<MetricBall<R>> {
    match neighborhood {
        Neighborhood::None => None,
        Neighborhood::AutoFromRange => Some(MetricBall::isotropic(range, dim)),
        Neighborhood::Ball(b) => Some(b.clone()),
    }
}

/// Preprocess for a Gaussian SEQ simulation.
pub fn preprocess_gaussian<R: Real>(
    process: &GaussianProcess<R>,
    domain: &dyn Domain<R>,
    data: Option<(&AttrTable<R>, &[DVector<R>])>,
    init: &InitMethod,
    opts: &SeqOptions<R>,
    seed: u64,
    output_names: Vec<&'static str>,
) -> Result<SeqArtifact<R>> {
    let func = process.func.as_ref();
    let dim = domain.centroid(0).len();
    let locs = data.map(|(_, locs)| locs);
    let alpha = scaling::scale_factor(domain, locs, func.range());
    let scaled_func = func.scale(alpha);

    let centroids: Vec<DVector<R>> = (0..domain.element_count())
        .map(|i| domain.centroid(i) * alpha)
        .collect();
    let index = NeighborhoodIndex::build(&ScaledCentroids(&centroids));

    let ball = resolve_ball(&opts.neighborhood, scaled_func.range(), dim)
        .map(|b| scaling::scale_ball(&b, alpha));
    let max_neigh = opts.max_neigh.clamp(1, domain.element_count());
    let min_neigh = opts.min_neigh.clamp(1, max_neigh);

    // Binding is a geometric identification, so it uses the original coordinates; only
    // covariance evaluation happens in the scaled frame.
    let bound = if let Some((data, locs)) = data {
        bind(domain, data, Some(locs), init, |_, row| {
            data.mask(output_names[0]).map(|m| !m[row]).unwrap_or(false)
        })?
    } else {
        AttrTable::empty(&output_names, domain.element_count())
    };

    let name = output_names[0];
    let mask: Vec<bool> = bound.mask(name).map(|m| m.to_vec()).unwrap_or_else(|| vec![false; domain.element_count()]);
    let values: Vec<R> = bound.column(name).map(|c| c.to_vec()).unwrap_or_else(|| vec![R::zero(); domain.element_count()]);

    let conditioning: Vec<usize> = (0..domain.element_count()).filter(|&i| mask[i]).collect();
    let mut rng = child_rng(seed, PATH_RNG_INDEX);
    let path = build_path(&opts.path, &ScaledCentroids(&centroids), &conditioning, &mut rng);

    Ok(SeqArtifact {
        index,
        centroids,
        func: scaled_func,
        min_neigh,
        max_neigh,
        ball,
        path,
        init_mask: mask,
        init_gaussian: values,
        init_category: Vec::new(),
        kind: SeqKind::Gaussian { mean: process.mean[0] },
        output_names,
    })
}

/// Preprocess for an indicator SEQ simulation.
pub fn preprocess_indicator<R: Real>(
    process: &IndicatorProcess<R>,
    domain: &dyn Domain<R>,
    data: Option<(&AttrTable<R>, &[DVector<R>])>,
    init: &InitMethod,
    opts: &SeqOptions<R>,
    seed: u64,
    output_names: Vec<&'static str>,
) -> Result<SeqArtifact<R>> {
    let func = process.func.as_ref();
    let dim = domain.centroid(0).len();
    let locs = data.map(|(_, locs)| locs);
    let alpha = scaling::scale_factor(domain, locs, func.range());
    let scaled_func = func.scale(alpha);

    let centroids: Vec<DVector<R>> = (0..domain.element_count())
        .map(|i| domain.centroid(i) * alpha)
        .collect();
    let index = NeighborhoodIndex::build(&ScaledCentroids(&centroids));

    let ball = resolve_ball(&opts.neighborhood, scaled_func.range(), dim)
        .map(|b| scaling::scale_ball(&b, alpha));
    let max_neigh = opts.max_neigh.clamp(1, domain.element_count());
    let min_neigh = opts.min_neigh.clamp(1, max_neigh);

    let n = domain.element_count();
    let mut mask = vec![false; n];
    let mut init_category: Vec<Option<usize>> = vec![None; n];

    if let Some((data, locs)) = data {
        // Conditioning data carries a single "category" column with a 1-based category index.
        // Binding happens in the original coordinates, like the Gaussian preprocess.
        let bound = bind(domain, data, Some(locs), init, |_, row| {
            data.mask("category").map(|m| !m[row]).unwrap_or(false)
        })?;
        if let (Some(col), Some(m)) = (bound.column("category"), bound.mask("category")) {
            for i in 0..n {
                if m[i] {
                    mask[i] = true;
                    let cat = col[i].to_usize().unwrap().saturating_sub(1);
                    init_category[i] = Some(cat);
                }
            }
        }
    }

    let conditioning: Vec<usize> = (0..n).filter(|&i| mask[i]).collect();
    let mut rng = child_rng(seed, PATH_RNG_INDEX);
    let path = build_path(&opts.path, &ScaledCentroids(&centroids), &conditioning, &mut rng);

    Ok(SeqArtifact {
        index,
        centroids,
        func: scaled_func,
        min_neigh,
        max_neigh,
        ball,
        path,
        init_mask: mask,
        init_gaussian: Vec::new(),
        init_category,
        kind: SeqKind::Indicator { prior: process.prob.clone() },
        output_names,
    })
}

/// Thin `Domain` adapter exposing only centroid lookups over a pre-scaled point buffer, so
/// the neighborhood index and path builder work uniformly over already-scaled coordinates.
struct ScaledCentroids<'a, R: Real>(&'a [DVector<R>]);

impl<'a, R: Real> Domain<R> for ScaledCentroids<'a, R> {
    fn element_count(&self) -> usize {
        self.0.len()
    }

    fn centroid(&self, i: usize) -> DVector<R> {
        self.0[i].clone()
    }

    fn bounding_box(&self) -> crate::geometry::AxisAlignedBoundingBox<R> {
        crate::geometry::AxisAlignedBoundingBox::from_points(self.0)
    }
}

/// Draws one realization.
pub fn single<R: Real>(rng: &mut impl Rng, artifact: &SeqArtifact<R>) -> AttrTable<R> {
    let n = artifact.centroids.len();
    let mut done = artifact.init_mask.clone();

    match &artifact.kind {
        SeqKind::Gaussian { mean } => {
            let mut values = artifact.init_gaussian.clone();
            if values.len() != n {
                values = vec![R::zero(); n];
            }
            let prior_std = artifact.func.sill(0).sqrt();

            for &i in &artifact.path {
                if done[i] {
                    continue;
                }
                let center = &artifact.centroids[i];
                let neighbors = artifact.index.search(
                    center,
                    artifact.max_neigh,
                    |j| done[j] && j != i,
                    artifact.ball.as_ref(),
                );

                let draw = if neighbors.len() < artifact.min_neigh {
                    warn!("fewer than min_neigh neighbors at cell {i}, falling back to prior");
                    normal(rng, *mean, prior_std)
                } else {
                    let dists_to_target =
                        DVector::from_iterator(neighbors.len(), neighbors.iter().map(|&j| (&artifact.centroids[j] - center).norm()));
                    let neighbor_dists = pairwise_dists(&artifact.centroids, &neighbors);
                    let neighbor_values = DVector::from_iterator(neighbors.len(), neighbors.iter().map(|&j| values[j]));

                    let kriging = Kriging::new(artifact.func.as_ref(), *mean);
                    match kriging.fit(0, &neighbor_dists, &dists_to_target, &neighbor_values) {
                        Ok(fit) => normal(rng, fit.predicted_mean(), fit.variance().max(R::zero()).sqrt()),
                        Err(_) => {
                            warn!("kriging system singular at cell {i}, falling back to prior");
                            normal(rng, *mean, prior_std)
                        }
                    }
                };

                values[i] = draw;
                done[i] = true;
            }

            let mut out = AttrTable::empty(&artifact.output_names, n);
            let name = artifact.output_names[0];
            for i in 0..n {
                out.set(name, i, values[i]);
            }
            out
        }
        SeqKind::Indicator { prior } => {
            let k = prior.len();
            let mut category = vec![0usize; n];
            let mut one_hot: Vec<Vec<R>> = vec![vec![R::zero(); n]; k];

            for i in 0..n {
                if done[i] {
                    if let Some(c) = artifact.init_category[i] {
                        category[i] = c;
                        one_hot[c][i] = R::one();
                    }
                }
            }

            for &i in &artifact.path {
                if done[i] {
                    continue;
                }
                let center = &artifact.centroids[i];
                let neighbors = artifact.index.search(
                    center,
                    artifact.max_neigh,
                    |j| done[j] && j != i,
                    artifact.ball.as_ref(),
                );

                let cat = if neighbors.len() < artifact.min_neigh {
                    warn!("fewer than min_neigh neighbors at cell {i}, falling back to prior");
                    categorical(rng, prior)
                } else {
                    let dists_to_target =
                        DVector::from_iterator(neighbors.len(), neighbors.iter().map(|&j| (&artifact.centroids[j] - center).norm()));
                    let neighbor_dists = pairwise_dists(&artifact.centroids, &neighbors);
                    let one_hot_values: Vec<DVector<R>> = (0..k)
                        .map(|c| DVector::from_iterator(neighbors.len(), neighbors.iter().map(|&j| one_hot[c][j])))
                        .collect();

                    match predict_prob(artifact.func.as_ref(), prior, &neighbor_dists, &dists_to_target, &one_hot_values) {
                        Ok(probs) => categorical(rng, &probs),
                        Err(_) => {
                            warn!("kriging system singular at cell {i}, falling back to prior");
                            categorical(rng, prior)
                        }
                    }
                };

                category[i] = cat;
                one_hot[cat][i] = R::one();
                done[i] = true;
            }

            let mut out = AttrTable::empty(&artifact.output_names, n);
            let name = artifact.output_names[0];
            for i in 0..n {
                out.set(name, i, R::from_usize(category[i] + 1).unwrap());
            }
            out
        }
    }
}

fn pairwise_dists<R: Real>(centroids: &[DVector<R>], indices: &[usize]) -> DMatrix<R> {
    let n = indices.len();
    let mut m = DMatrix::zeros(n, n);
    for r in 0..n {
        for c in 0..n {
            m[(r, c)] = (&centroids[indices[r]] - &centroids[indices[c]]).norm();
        }
    }
    m
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::spherical_covariance;
    use crate::function::{LinearModelOfCoregionalization, SphericalStructure};
    use crate::geometry::CartesianGrid;
    use crate::process::IndicatorProcess;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn unconditional_gaussian_seq_fills_every_cell() {
        let grid: CartesianGrid<f64> = CartesianGrid::new(vec![12]);
        let func = spherical_covariance(3.0f64);
        let process = GaussianProcess::new(Box::new(func), vec![1.0]).unwrap();
        let artifact = preprocess_gaussian(
            &process,
            &grid,
            None,
            &InitMethod::default(),
            &SeqOptions::default(),
            5,
            vec!["z"],
        )
        .unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let table = single(&mut rng, &artifact);
        assert_eq!(table.mask("z"), Some(&[true; 12][..]));
    }

    #[test]
    fn gaussian_seq_is_deterministic_for_the_same_seed() {
        let grid: CartesianGrid<f64> = CartesianGrid::new(vec![10]);
        let func = spherical_covariance(3.0f64);
        let process = GaussianProcess::new(Box::new(func), vec![0.0]).unwrap();
        let artifact = preprocess_gaussian(
            &process,
            &grid,
            None,
            &InitMethod::default(),
            &SeqOptions::default(),
            9,
            vec!["z"],
        )
        .unwrap();
        let mut rng_a = ChaCha8Rng::seed_from_u64(9);
        let mut rng_b = ChaCha8Rng::seed_from_u64(9);
        let a = single(&mut rng_a, &artifact);
        let b = single(&mut rng_b, &artifact);
        assert_eq!(a.column("z"), b.column("z"));
    }

    #[test]
    fn unconditional_indicator_seq_assigns_a_valid_category_to_every_cell() {
        let grid: CartesianGrid<f64> = CartesianGrid::new(vec![10]);
        let sill = DMatrix::from_diagonal(&DVector::from_vec(vec![1.0, 1.0, 1.0]));
        let structure = SphericalStructure::new(3.0f64, 1.0, crate::function::FormKind::Covariance);
        let func = LinearModelOfCoregionalization::new(structure, sill);
        let process = IndicatorProcess::new(Box::new(func), vec![0.2, 0.3, 0.5]).unwrap();
        let artifact = preprocess_indicator(
            &process,
            &grid,
            None,
            &InitMethod::default(),
            &SeqOptions::default(),
            1,
            vec!["category"],
        )
        .unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let table = single(&mut rng, &artifact);
        for &v in table.column("category").unwrap() {
            assert!((1.0..=3.0).contains(&v));
        }
    }

    #[test]
    fn conditioning_anchors_are_reproduced_in_a_2d_simulation() {
        let grid: CartesianGrid<f64> = CartesianGrid::with_origin_and_step(
            vec![50, 50],
            vec![0.5, 0.5],
            vec![1.0, 1.0],
        );
        let func = crate::function::spherical_variogram(18.0f64);
        let process = GaussianProcess::new(Box::new(func), vec![0.0]).unwrap();

        let anchors = [((12usize, 12usize), 1.0), ((25, 37), 0.0), ((37, 25), 1.0)];
        let mut data: AttrTable<f64> = AttrTable::raw_rows(&["z"], anchors.len());
        let mut locations = Vec::new();
        for (row, &((i, j), v)) in anchors.iter().enumerate() {
            data.set("z", row, v);
            locations.push(DVector::from_vec(vec![i as f64 + 0.5, j as f64 + 0.5]));
        }

        let opts = SeqOptions {
            max_neigh: 3,
            ..SeqOptions::default()
        };
        let artifact = preprocess_gaussian(
            &process,
            &grid,
            Some((&data, &locations)),
            &InitMethod::default(),
            &opts,
            2017,
            vec!["z"],
        )
        .unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(2017);
        let table = single(&mut rng, &artifact);
        let col = table.column("z").unwrap();
        for &((i, j), v) in &anchors {
            assert_eq!(col[grid.linear_index(&[i, j])], v);
        }
    }

    #[test]
    fn random_shuffle_path_is_a_pure_function_of_the_seed() {
        let grid: CartesianGrid<f64> = CartesianGrid::new(vec![20]);
        let func = spherical_covariance(3.0f64);
        let process = GaussianProcess::new(Box::new(func), vec![0.0]).unwrap();
        let opts = SeqOptions {
            path: Path::RandomShuffle,
            ..SeqOptions::default()
        };
        let a = preprocess_gaussian(&process, &grid, None, &InitMethod::default(), &opts, 123, vec!["z"]).unwrap();
        let b = preprocess_gaussian(&process, &grid, None, &InitMethod::default(), &opts, 123, vec!["z"]).unwrap();
        assert_eq!(a.path, b.path);
    }
}
