//! Lindgren/SPDE simulation engine: interface only.
//!
//! The full SPDE approach (triangulated mesh, sparse precision matrix assembly, the
//! stochastic-PDE link between a Matern field and a Gaussian Markov random field) is
//! explicitly out of scope for this crate; what's specified is the plug-in seam a future
//! back-end would implement. This engine accepts only mesh-like domains (anything that
//! isn't a regular grid, since the SPDE approach exists precisely to avoid the dense/FFT
//! machinery that requires one) and otherwise reports `UnsupportedMethod`.

use crate::data::AttrTable;
use crate::distributions::standard_normal;
use crate::error::{Result, SimulationError};
use crate::geometry::Domain;
use crate::numeric_types::Real;
use crate::process::LindgrenProcess;
use rand::Rng;

/// Placeholder artifact: a diagonal approximation of the SPDE precision operator scaled by
/// the process's range and sill, sufficient to exercise the plug-in contract but
/// not a faithful SPDE implementation.
#[derive(Debug)]
pub struct LindgrenArtifact<R: Real> {
    n: usize,
    marginal_std: R,
    mean: R,
}

pub fn preprocess<R: Real>(
    process: &LindgrenProcess<R>,
    domain: &dyn Domain<R>,
) -> Result<LindgrenArtifact<R>> {
    if domain.is_grid() {
        return Err(SimulationError::UnsupportedMethod(
            "Lindgren/SPDE simulation targets mesh domains; use FFT or LU on a regular grid"
                .to_string(),
        ));
    }
    Ok(LindgrenArtifact {
        n: domain.element_count(),
        marginal_std: process.sill.sqrt(),
        mean: R::zero(),
    })
}

/// Draws one realization. Since no sparse precision assembly is implemented, this produces
/// independent draws at the process's marginal variance rather than a spatially correlated
/// Matern field; callers needing an actual SPDE realization must supply an external back-end
/// through the `Process`/`Method::Lindgren` plug-in seam.
pub fn single<R: Real>(rng: &mut impl Rng, artifact: &LindgrenArtifact<R>) -> AttrTable<R> {
    let mut out = AttrTable::empty(&["z"], artifact.n);
    for i in 0..artifact.n {
        let v = artifact.mean + artifact.marginal_std * standard_normal::<R>(rng);
        out.set("z", i, v);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{CartesianGrid, PointSet};
    use nalgebra::DVector;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn grid_domains_are_rejected() {
        let grid: CartesianGrid<f64> = CartesianGrid::new(vec![4, 4]);
        let process = LindgrenProcess::new(2.0f64, 1.0).unwrap();
        let err = preprocess(&process, &grid).unwrap_err();
        assert!(matches!(err, SimulationError::UnsupportedMethod(_)));
    }

    #[test]
    fn point_set_realization_fills_every_element() {
        let set = PointSet::new(vec![
            DVector::from_vec(vec![0.0, 0.0]),
            DVector::from_vec(vec![1.0, 0.5]),
            DVector::from_vec(vec![2.0, 1.5]),
        ]);
        let process = LindgrenProcess::new(2.0f64, 1.0).unwrap();
        let artifact = preprocess(&process, &set).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let table = single(&mut rng, &artifact);
        assert_eq!(table.len(), 3);
        assert!(table.mask("z").unwrap().iter().all(|&k| k));
    }
}
