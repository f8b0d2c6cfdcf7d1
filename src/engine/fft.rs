//! Spectral (FFT-MA) Gaussian simulation engine.

use super::fft_backend;
use crate::data::{nearest_index, AttrTable};
use crate::error::{Result, SimulationError};
use crate::function::GeospatialFunction;
use crate::geometry::Domain;
use crate::kriging::fit_predict;
use crate::numeric_types::Real;
use crate::process::GaussianProcess;
use crate::scaling;
use log::warn;
use nalgebra::DVector;
use ndarray::{ArrayD, IxDyn};
use num::ToPrimitive;
use num_complex::Complex64;
use rand::Rng;

/// Conditioning state recorded at preprocess time when data is present.
#[derive(Debug)]
struct Conditioning<R: Real> {
    /// Conditional mean field over every cell of the *full* parent grid.
    z_bar: Vec<R>,
    /// Index, into the full parent grid, of the cell nearest each datum.
    mirror_indices: Vec<usize>,
    /// Scaled data locations, reused when fitting Kriging to the unconditional residuals.
    data_points: Vec<DVector<R>>,
    /// Scaled centroids of every cell of the full parent grid, indexed the same as `z_bar`.
    grid_centroids: Vec<DVector<R>>,
    mean: R,
}

/// Shared-immutable artifact produced once by [`preprocess`] and consumed by every
/// realization's [`single`] call.
pub struct FftArtifact<R: Real> {
    shape: Vec<usize>,
    /// `sqrt(|fft(fftshift(C))|)` with the DC bin zeroed.
    magnitude: ArrayD<f64>,
    sill: R,
    mean: R,
    /// Scaled covariance function, reused at realization time for residual substitution.
    scaled_func: Box<dyn GeospatialFunction<R>>,
    conditioning: Option<Conditioning<R>>,
    /// Active index subset for a grid view domain; `None` means the full grid.
    active_indices: Option<Vec<usize>>,
    output_names: Vec<&'static str>,
}

impl<R: Real> std::fmt::Debug for FftArtifact<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FftArtifact")
            .field("shape", &self.shape)
            .field("magnitude", &self.magnitude)
            .field("sill", &self.sill)
            .field("mean", &self.mean)
            .field("scaled_func", &"<dyn GeospatialFunction>")
            .field("conditioning", &self.conditioning)
            .field("active_indices", &self.active_indices)
            .field("output_names", &self.output_names)
            .finish()
    }
}

/// Checks applicability and builds the spectral filter.
pub fn preprocess<R: Real>(
    process: &GaussianProcess<R>,
    domain: &dyn Domain<R>,
    data: Option<(&AttrTable<R>, &[DVector<R>])>,
    output_names: Vec<&'static str>,
) -> Result<FftArtifact<R>> {
    let func = process.func.as_ref();
    if func.variate_count() != 1 {
        return Err(SimulationError::UnsupportedMethod(
            "FFT simulation is univariate only".to_string(),
        ));
    }
    if !func.is_stationary() {
        return Err(SimulationError::NotStationary);
    }
    let grid = domain
        .parent()
        .ok_or_else(|| SimulationError::UnsupportedMethod("FFT requires a regular grid domain".to_string()))?;
    let shape = grid.dims().ok_or_else(|| {
        SimulationError::UnsupportedMethod("FFT requires a regular grid domain".to_string())
    })?;
    let n_full: usize = shape.iter().product();

    let alpha = scaling::scale_factor(grid, data.map(|(_, l)| l), func.range());
    let scaled_func = func.scale(alpha);

    let ref_cell = grid.reference_cell();
    let ref_centroid = grid.centroid(ref_cell) * alpha;

    let mut c_values = ArrayD::<f64>::zeros(IxDyn(&shape));
    for (linear, c) in c_values.iter_mut().enumerate() {
        let centroid = grid.centroid(linear) * alpha;
        let h = (&centroid - &ref_centroid).norm();
        *c = scaled_func.covariance(0, h).to_f64().unwrap();
    }
    let c_complex = c_values.mapv(|v| Complex64::new(v, 0.0));
    let shifted = fft_backend::fftshift(&c_complex);
    let spectrum = fft_backend::fftn(&shifted);
    let mut magnitude = fft_backend::modulus(&spectrum).mapv(f64::sqrt);
    // Zero the DC bin to subtract the constant mean.
    if let Some(dc) = magnitude.iter_mut().next() {
        *dc = 0.0;
    }

    let grid_centroids: Vec<DVector<R>> = (0..n_full).map(|i| grid.centroid(i) * alpha).collect();

    let conditioning = if let Some((data_table, locs)) = data {
        // Rows whose value was never set carry no conditioning information.
        let name = output_names[0];
        let column = data_table.column(name).unwrap();
        let present: Vec<usize> = (0..data_table.len())
            .filter(|&row| data_table.mask(name).map(|m| m[row]).unwrap_or(false))
            .collect();
        let scaled_locs: Vec<DVector<R>> = present.iter().map(|&row| &locs[row] * alpha).collect();
        let values: DVector<R> =
            DVector::from_iterator(present.len(), present.iter().map(|&row| column[row]));
        let z_bar = fit_predict(
            scaled_func.as_ref(),
            0,
            &scaled_locs,
            &values,
            process.mean[0],
            &grid_centroids,
        )?;
        // Mirror cells are identified in the original coordinates; the scaled locations
        // only feed the covariance evaluations.
        let mirror_indices: Vec<usize> =
            present.iter().map(|&row| nearest_index(grid, &locs[row])).collect();
        Some(Conditioning {
            z_bar,
            mirror_indices,
            data_points: scaled_locs,
            grid_centroids: grid_centroids.clone(),
            mean: process.mean[0],
        })
    } else {
        None
    };

    let active_indices = domain.parent_indices().map(|idx| idx.to_vec());

    Ok(FftArtifact {
        shape,
        magnitude,
        sill: func.sill(0),
        mean: process.mean[0],
        scaled_func,
        conditioning,
        active_indices,
        output_names,
    })
}

/// Draws one realization.
pub fn single<R: Real>(rng: &mut impl Rng, artifact: &FftArtifact<R>) -> Result<AttrTable<R>> {
    let n_full: usize = artifact.shape.iter().product();

    let noise = ArrayD::<Complex64>::from_shape_fn(IxDyn(&artifact.shape), |_| {
        Complex64::new(rng.sample(rand_distr::StandardNormal), 0.0)
    });
    let noise_fft = fft_backend::fftn(&noise);
    let phase = fft_backend::angle(&noise_fft);

    let mut p = ArrayD::<Complex64>::zeros(IxDyn(&artifact.shape));
    for (dst, (&mag, &ph)) in p.iter_mut().zip(artifact.magnitude.iter().zip(phase.iter())) {
        *dst = Complex64::from_polar(mag, ph);
    }
    let z_complex = fft_backend::ifftn(&p);
    let z_real: Vec<f64> = z_complex.iter().map(|c| c.re).collect();

    let mean_emp: f64 = z_real.iter().sum::<f64>() / n_full as f64;
    let var_emp: f64 = z_real.iter().map(|&v| (v - mean_emp).powi(2)).sum::<f64>() / n_full as f64;
    let sill_f64 = artifact.sill.to_f64().unwrap();
    let mean_f64 = artifact.mean.to_f64().unwrap();
    let scale = if var_emp > 0.0 { (sill_f64 / var_emp).sqrt() } else { 1.0 };
    let z_final: Vec<R> = z_real
        .iter()
        .map(|&v| R::from_f64((v - mean_emp) * scale + mean_f64).unwrap())
        .collect();

    let active: Vec<usize> = artifact
        .active_indices
        .clone()
        .unwrap_or_else(|| (0..n_full).collect());

    let values: Vec<R> = match &artifact.conditioning {
        Some(cond) => {
            let mirror_values = DVector::from_iterator(
                cond.mirror_indices.len(),
                cond.mirror_indices.iter().map(|&i| z_final[i]),
            );
            let active_centroids: Vec<DVector<R>> =
                active.iter().map(|&i| cond.grid_centroids[i].clone()).collect();
            match fit_predict(
                artifact.scaled_func.as_ref(),
                0,
                &cond.data_points,
                &mirror_values,
                cond.mean,
                &active_centroids,
            ) {
                Ok(z_bar_u) => active
                    .iter()
                    .zip(z_bar_u.iter())
                    .map(|(&i, &zu)| cond.z_bar[i] + (z_final[i] - zu))
                    .collect(),
                Err(_) => {
                    warn!("FFT residual-substitution kriging failed, returning unconditional field");
                    active.iter().map(|&i| z_final[i]).collect()
                }
            }
        }
        None => active.iter().map(|&i| z_final[i]).collect(),
    };

    let mut out = AttrTable::empty(&artifact.output_names, active.len());
    let name = artifact.output_names[0];
    for (k, v) in values.into_iter().enumerate() {
        out.set(name, k, v);
    }
    Ok(out)
}
