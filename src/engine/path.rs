//! Sequential-simulation traversal orders.

use crate::geometry::Domain;
use crate::numeric_types::Real;
use rand::seq::SliceRandom;
use rand::Rng;

/// The order in which a SEQ realization visits domain cells.
///
/// The traversal itself is a pure function of the domain and options; only [`Path::RandomShuffle`] additionally consumes RNG state, and it does so
/// deterministically from the same child RNG used for the realization's draws.
#[derive(Clone, Debug, Default)]
pub enum Path {
    #[default]
    RasterLinear,
    DilationExpanding,
    RandomShuffle,
    /// Orders elements by increasing distance to the nearest conditioning datum.
    SourcePath,
}

/// Builds the visiting order for one realization.
///
/// `conditioning` is the set of domain indices already bound from data, required for
/// [`Path::SourcePath`] and ignored otherwise.
pub fn build_path<R: Real>(
    path: &Path,
    domain: &dyn Domain<R>,
    conditioning: &[usize],
    rng: &mut impl Rng,
) -> Vec<usize> {
    let n = domain.element_count();
    match path {
        Path::RasterLinear => (0..n).collect(),
        Path::DilationExpanding => dilation_expanding(domain),
        Path::RandomShuffle => {
            let mut order: Vec<usize> = (0..n).collect();
            order.shuffle(rng);
            order
        }
        Path::SourcePath => source_path(domain, conditioning),
    }
}

/// Visits the domain in powers-of-two dilation order: first every `n/2`-th cell, then fills
/// in every remaining `n/4`-th cell, and so on, down to a full linear scan.
fn dilation_expanding<R: Real>(domain: &dyn Domain<R>) -> Vec<usize> {
    let n = domain.element_count();
    let mut visited = vec![false; n];
    let mut order = Vec::with_capacity(n);
    let mut stride = n.next_power_of_two() / 2;
    if stride == 0 {
        stride = 1;
    }
    while stride >= 1 {
        let mut i = 0;
        while i < n {
            if !visited[i] {
                visited[i] = true;
                order.push(i);
            }
            i += stride;
        }
        if stride == 1 {
            break;
        }
        stride /= 2;
    }
    for i in 0..n {
        if !visited[i] {
            order.push(i);
        }
    }
    order
}

/// Orders every domain index by ascending Euclidean distance to the nearest conditioning
/// datum; ties broken by ascending index.
fn source_path<R: Real>(domain: &dyn Domain<R>, conditioning: &[usize]) -> Vec<usize> {
    let n = domain.element_count();
    if conditioning.is_empty() {
        return (0..n).collect();
    }
    let anchors: Vec<_> = conditioning.iter().map(|&c| domain.centroid(c)).collect();
    let mut keyed: Vec<(R, usize)> = (0..n)
        .map(|i| {
            let c = domain.centroid(i);
            let dist = anchors
                .iter()
                .map(|a| (a - &c).norm())
                .fold(R::max_value().unwrap(), |acc, d| if d < acc { d } else { acc });
            (dist, i)
        })
        .collect();
    keyed.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap().then(a.1.cmp(&b.1)));
    keyed.into_iter().map(|(_, i)| i).collect()
}
