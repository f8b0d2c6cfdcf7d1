//! LU (dense-covariance Cholesky) Gaussian simulation engine.

use crate::data::AttrTable;
use crate::distributions::standard_normal;
use crate::error::{Result, SimulationError};
use crate::function::GeospatialFunction;
use crate::geometry::Domain;
use crate::numeric_types::Real;
use crate::process::GaussianProcess;
use crate::scaling;
use nalgebra::{linalg::Cholesky, DMatrix, DVector};
use rand::Rng;

/// Per-variable preprocessed LU state.
#[derive(Debug)]
struct VariableArtifact<R: Real> {
    z_d: DVector<R>,
    d_s: DVector<R>,
    l_ss: DMatrix<R>,
    mean: R,
    indices_d: Vec<usize>,
    indices_s: Vec<usize>,
}

/// Shared-immutable artifact produced once by [`preprocess`] and consumed by every
/// realization's [`single`] call.
#[derive(Debug)]
pub struct LuArtifact<R: Real> {
    variables: Vec<VariableArtifact<R>>,
    /// Cross-correlation used for bivariate co-simulation, `None` for univariate.
    rho: Option<R>,
    output_names: Vec<&'static str>,
}

/// Checks applicability and builds the per-variable LU
/// factorizations.
pub fn preprocess<R: Real>(
    process: &GaussianProcess<R>,
    domain: &dyn Domain<R>,
    mask: &dyn Fn(usize) -> bool,
    data_value: &dyn Fn(usize, usize) -> R,
    explicit_rho: Option<R>,
    output_names: Vec<&'static str>,
) -> Result<LuArtifact<R>> {
    let func = process.func.as_ref();
    if !func.is_stationary() {
        return Err(SimulationError::NotStationary);
    }
    if !(func.is_symmetric() && func.is_banded()) {
        return Err(SimulationError::UnsupportedMethod(
            "LU requires a symmetric, banded covariance function".to_string(),
        ));
    }
    let variate_count = func.variate_count();
    if !(variate_count == 1 || variate_count == 2) {
        return Err(SimulationError::UnsupportedMethod(
            "LU bivariate co-simulation supports at most 2 variates".to_string(),
        ));
    }
    if output_names.len() != variate_count {
        return Err(SimulationError::ShapeMismatch(format!(
            "variable_count {} != variate_count(func) {}",
            output_names.len(),
            variate_count
        )));
    }

    let n = domain.element_count();
    let alpha = scaling::scale_factor(domain, None, func.range());
    let scaled_func = func.scale(alpha);

    let mut variables = Vec::with_capacity(variate_count);
    for j in 0..variate_count {
        let indices_d: Vec<usize> = (0..n).filter(|&i| mask(i)).collect();
        let indices_s: Vec<usize> = (0..n).filter(|&i| !mask(i)).collect();

        let dists = |a: &[usize], b: &[usize]| -> DMatrix<R> {
            let mut m = DMatrix::zeros(a.len(), b.len());
            for (r, &ia) in a.iter().enumerate() {
                let ca = domain.centroid(ia) * alpha;
                for (c, &ib) in b.iter().enumerate() {
                    let cb = domain.centroid(ib) * alpha;
                    let h = (ca.clone() - cb).norm();
                    m[(r, c)] = scaled_func.covariance(j, h);
                }
            }
            m
        };

        let c_dd = dists(&indices_d, &indices_d);
        let c_ds = dists(&indices_d, &indices_s);
        let c_ss = dists(&indices_s, &indices_s);

        let z_d = DVector::from_iterator(
            indices_d.len(),
            indices_d.iter().map(|&i| data_value(j, i)),
        );

        let (d_s, l_ss) = if indices_d.is_empty() {
            let chol = Cholesky::new(c_ss.clone()).ok_or(SimulationError::NotPositiveDefinite)?;
            (DVector::zeros(indices_s.len()), chol.l())
        } else {
            let chol_dd = Cholesky::new(c_dd).ok_or(SimulationError::NotPositiveDefinite)?;
            let l_dd = chol_dd.l();
            // B = L_DD^-1 . C_DS
            let b = l_dd
                .clone()
                .lu()
                .solve(&c_ds)
                .ok_or(SimulationError::NotPositiveDefinite)?;
            let schur = c_ss - b.transpose() * &b;
            let chol_ss = Cholesky::new(schur).ok_or(SimulationError::NotPositiveDefinite)?;
            // d_S = B^T . (L_DD^-1 . z_D)
            let l_dd_inv_z = l_dd.lu().solve(&z_d).ok_or(SimulationError::NotPositiveDefinite)?;
            let d_s = b.transpose() * l_dd_inv_z;
            (d_s, chol_ss.l())
        };

        variables.push(VariableArtifact {
            z_d,
            d_s,
            l_ss,
            mean: process.mean[j],
            indices_d,
            indices_s,
        });
    }

    let rho = if variate_count == 2 {
        Some(explicit_rho.unwrap_or_else(|| cross_correlation(func)))
    } else {
        None
    };

    Ok(LuArtifact {
        variables,
        rho,
        output_names,
    })
}

/// Derives rho from the off-diagonal of the multivariate sill, when no explicit
/// correlation parameter is given.
fn cross_correlation<R: Real>(func: &dyn GeospatialFunction<R>) -> R {
    let sill = func.sill_matrix();
    if sill.nrows() < 2 {
        return R::zero();
    }
    let denom = (sill[(0, 0)] * sill[(1, 1)]).sqrt();
    if denom > R::zero() {
        sill[(0, 1)] / denom
    } else {
        R::zero()
    }
}

/// Draws one realization.
pub fn single<R: Real>(rng: &mut impl Rng, artifact: &LuArtifact<R>, n_elements: usize) -> AttrTable<R> {
    let mut out = AttrTable::empty(&artifact.output_names, n_elements);
    let mut w1: Option<DVector<R>> = None;

    for (j, var) in artifact.variables.iter().enumerate() {
        let n_s = var.indices_s.len();
        let mut w = DVector::from_iterator(n_s, (0..n_s).map(|_| standard_normal::<R>(rng)));

        if j == 1 {
            if let (Some(rho), Some(w0)) = (artifact.rho, &w1) {
                let one_minus_rho2 = (R::one() - rho * rho).max(R::zero()).sqrt();
                let w0_s = w0.clone();
                w = w0_s * rho + w * one_minus_rho2;
            }
        }
        if j == 0 {
            w1 = Some(w.clone());
        }

        let y_s = &var.d_s + &var.l_ss * &w;

        let name = artifact.output_names[j];
        for (k, &i) in var.indices_d.iter().enumerate() {
            out.set(name, i, var.z_d[k]);
        }
        let unconditional = var.indices_d.is_empty();
        for (k, &i) in var.indices_s.iter().enumerate() {
            let v = if unconditional { y_s[k] + var.mean } else { y_s[k] };
            out.set(name, i, v);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::spherical_covariance;
    use crate::geometry::CartesianGrid;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn unconditional_realization_fills_every_cell() {
        let grid: CartesianGrid<f64> = CartesianGrid::new(vec![6]);
        let func = spherical_covariance(10.0f64);
        let process = GaussianProcess::new(Box::new(func), vec![2.0]).unwrap();
        let artifact = preprocess(&process, &grid, &|_| false, &|_, _| 0.0, None, vec!["z"]).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let table = single(&mut rng, &artifact, grid.element_count());
        assert_eq!(table.mask("z"), Some(&[true; 6][..]));
    }

    #[test]
    fn conditioning_values_are_honored_exactly() {
        let grid: CartesianGrid<f64> = CartesianGrid::new(vec![6]);
        let func = spherical_covariance(10.0f64);
        let process = GaussianProcess::new(Box::new(func), vec![0.0]).unwrap();
        let data = |_j: usize, i: usize| if i == 0 { 5.0 } else { 0.0 };
        let artifact = preprocess(&process, &grid, &|i| i == 0, &data, None, vec!["z"]).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let table = single(&mut rng, &artifact, grid.element_count());
        assert_eq!(table.column("z").unwrap()[0], 5.0);
    }

    #[test]
    fn unconditional_1d_realization_has_plausible_moments() {
        let grid: CartesianGrid<f64> = CartesianGrid::new(vec![100]);
        let func = spherical_covariance(10.0f64);
        let process = GaussianProcess::new(Box::new(func), vec![0.0]).unwrap();
        let artifact = preprocess(&process, &grid, &|_| false, &|_, _| 0.0, None, vec!["z"]).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(123);
        let table = single(&mut rng, &artifact, grid.element_count());
        let col = table.column("z").unwrap();
        assert_eq!(col.len(), 100);

        // A single correlated realization of this size only pins the moments loosely.
        let n = col.len() as f64;
        let mean: f64 = col.iter().sum::<f64>() / n;
        let var: f64 = col.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        assert!(mean.abs() < 1.0, "empirical mean was {mean}");
        assert!(var > 0.2 && var < 2.5, "empirical variance was {var}");
    }

    #[test]
    fn same_seed_reproduces_the_same_realization() {
        let grid: CartesianGrid<f64> = CartesianGrid::new(vec![8]);
        let func = spherical_covariance(10.0f64);
        let process = GaussianProcess::new(Box::new(func), vec![1.0]).unwrap();
        let artifact = preprocess(&process, &grid, &|_| false, &|_, _| 0.0, None, vec!["z"]).unwrap();
        let mut rng_a = ChaCha8Rng::seed_from_u64(42);
        let mut rng_b = ChaCha8Rng::seed_from_u64(42);
        let a = single(&mut rng_a, &artifact, grid.element_count());
        let b = single(&mut rng_b, &artifact, grid.element_count());
        assert_eq!(a.column("z"), b.column("z"));
    }

    #[test]
    fn non_banded_function_is_rejected() {
        struct NonBanded;
        impl GeospatialFunction<f64> for NonBanded {
            fn variate_count(&self) -> usize {
                1
            }
            fn sill_matrix(&self) -> DMatrix<f64> {
                DMatrix::from_element(1, 1, 1.0)
            }
            fn range(&self) -> f64 {
                1.0
            }
            fn is_stationary(&self) -> bool {
                true
            }
            fn is_symmetric(&self) -> bool {
                true
            }
            fn is_banded(&self) -> bool {
                false
            }
            fn covariance(&self, _j: usize, _h: f64) -> f64 {
                1.0
            }
            fn scale(&self, _alpha: f64) -> Box<dyn GeospatialFunction<f64>> {
                Box::new(NonBanded)
            }
        }
        let grid: CartesianGrid<f64> = CartesianGrid::new(vec![4]);
        let process = GaussianProcess::new(Box::new(NonBanded), vec![0.0]).unwrap();
        let err = preprocess(&process, &grid, &|_| false, &|_, _| 0.0, None, vec!["z"]).unwrap_err();
        assert!(matches!(err, SimulationError::UnsupportedMethod(_)));
    }
}
