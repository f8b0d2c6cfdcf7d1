//! Engine dispatch.
//!
//! Each simulation method (LU, SEQ, FFT, Lindgren) lives in its own module with its own
//! `preprocess`/`single` pair and its own artifact type; [`Artifact`] is the closed enum that
//! lets [`crate::orchestrator`] hold "whichever one preprocessing picked" without boxing
//! every engine behind one shared trait.

pub mod fft;
pub mod fft_backend;
pub mod lindgren;
pub mod lu;
pub mod path;
pub mod seq;

use crate::data::{bind, AttrTable, InitMethod};
use crate::error::Result;
use crate::geometry::Domain;
use crate::numeric_types::Real;
use crate::orchestrator::Method;
use crate::process::{GaussianProcess, IndicatorProcess, LindgrenProcess, Process};
use nalgebra::DVector;
use rand::Rng;

/// Tuning knobs that vary per call but aren't part of `Process`/`Method` themselves.
#[derive(Clone, Debug, Default)]
pub struct EngineOptions<R: Real> {
    pub init: InitMethod,
    pub seq: seq::SeqOptions<R>,
    /// Explicit bivariate cross-correlation for LU co-simulation.
    pub rho: Option<R>,
    /// Parent seed used to derive the SEQ traversal path's RNG, so the path is a pure
    /// function of `(seed, domain, options)` rather than depending on call order.
    pub seed: u64,
}

/// One preprocessed artifact, tagged by which engine produced it.
pub enum Artifact<R: Real> {
    Lu(lu::LuArtifact<R>),
    Seq(seq::SeqArtifact<R>),
    Fft(fft::FftArtifact<R>),
    Lindgren(lindgren::LindgrenArtifact<R>),
}

impl<R: Real> Artifact<R> {
    /// Draws one realization from whichever engine produced this artifact.
    pub fn single(&self, rng: &mut impl Rng, n_elements: usize) -> Result<AttrTable<R>> {
        match self {
            Artifact::Lu(a) => Ok(lu::single(rng, a, n_elements)),
            Artifact::Seq(a) => Ok(seq::single(rng, a)),
            Artifact::Fft(a) => fft::single(rng, a),
            Artifact::Lindgren(a) => Ok(lindgren::single(rng, a)),
        }
    }
}

/// Preprocesses a Gaussian process for the given method.
pub fn preprocess_gaussian<R: Real>(
    process: &GaussianProcess<R>,
    domain: &dyn Domain<R>,
    data: Option<(&AttrTable<R>, &[DVector<R>])>,
    method: Method,
    opts: &EngineOptions<R>,
) -> Result<Artifact<R>> {
    let output_names = Process::output_schema(process);
    match method {
        Method::Lu => {
            let bound = match data {
                Some((table, locs)) => bind(domain, table, Some(locs), &opts.init, |name, row| {
                    table.mask(name).map(|m| !m[row]).unwrap_or(false)
                })?,
                None => AttrTable::empty(&output_names, domain.element_count()),
            };
            let primary = output_names[0];
            let mask = |i: usize| bound.mask(primary).map(|m| m[i]).unwrap_or(false);
            let data_value = |j: usize, i: usize| {
                bound
                    .column(output_names[j])
                    .map(|c| c[i])
                    .unwrap_or(R::zero())
            };
            let artifact =
                lu::preprocess(process, domain, &mask, &data_value, opts.rho, output_names.clone())?;
            Ok(Artifact::Lu(artifact))
        }
        Method::Seq => {
            let artifact =
                seq::preprocess_gaussian(process, domain, data, &opts.init, &opts.seq, opts.seed, output_names)?;
            Ok(Artifact::Seq(artifact))
        }
        Method::Fft => {
            let artifact = fft::preprocess(process, domain, data, output_names)?;
            Ok(Artifact::Fft(artifact))
        }
        other => Err(crate::error::SimulationError::UnsupportedMethod(format!(
            "{other:?} does not apply to a Gaussian process"
        ))),
    }
}

/// Preprocesses an indicator (categorical) process; only SEQ is supported.
pub fn preprocess_indicator<R: Real>(
    process: &IndicatorProcess<R>,
    domain: &dyn Domain<R>,
    data: Option<(&AttrTable<R>, &[DVector<R>])>,
    method: Method,
    opts: &EngineOptions<R>,
) -> Result<Artifact<R>> {
    if !matches!(method, Method::Seq) {
        return Err(crate::error::SimulationError::UnsupportedMethod(
            "indicator processes only support the SEQ method".to_string(),
        ));
    }
    let output_names = Process::output_schema(process);
    let artifact =
        seq::preprocess_indicator(process, domain, data, &opts.init, &opts.seq, opts.seed, output_names)?;
    Ok(Artifact::Seq(artifact))
}

/// Preprocesses a Lindgren/SPDE process.
pub fn preprocess_lindgren<R: Real>(
    process: &LindgrenProcess<R>,
    domain: &dyn Domain<R>,
    method: Method,
) -> Result<Artifact<R>> {
    if !matches!(method, Method::Lindgren) {
        return Err(crate::error::SimulationError::UnsupportedMethod(
            "Lindgren processes only support the Lindgren method".to_string(),
        ));
    }
    Ok(Artifact::Lindgren(lindgren::preprocess(process, domain)?))
}
