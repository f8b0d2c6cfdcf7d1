//! Process descriptors and the plug-in contract back-ends implement.

mod external;

pub use external::{ExternalBackend, ExternalProcess, WhiteNoiseProcess};

use crate::error::{Result, SimulationError};
use crate::function::GeospatialFunction;
use crate::geometry::Domain;
use crate::numeric_types::Real;
use crate::orchestrator::Method;

/// A Gaussian field process: a geospatial function plus a (possibly multivariate) mean.
pub struct GaussianProcess<R: Real> {
    pub func: Box<dyn GeospatialFunction<R>>,
    pub mean: Vec<R>,
}

impl<R: Real> GaussianProcess<R> {
    pub fn new(func: Box<dyn GeospatialFunction<R>>, mean: Vec<R>) -> Result<Self> {
        if mean.len() != func.variate_count() {
            return Err(SimulationError::ShapeMismatch(format!(
                "|mean| = {} but variate_count(func) = {}",
                mean.len(),
                func.variate_count()
            )));
        }
        Ok(Self { func, mean })
    }
}

impl<R: Real> std::fmt::Debug for GaussianProcess<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GaussianProcess")
            .field("func", &"<dyn GeospatialFunction>")
            .field("mean", &self.mean)
            .finish()
    }
}

/// An indicator (categorical) field process: a geospatial function plus a simplex of
/// category probabilities.
pub struct IndicatorProcess<R: Real> {
    pub func: Box<dyn GeospatialFunction<R>>,
    pub prob: Vec<R>,
}

impl<R: Real> IndicatorProcess<R> {
    pub fn new(func: Box<dyn GeospatialFunction<R>>, prob: Vec<R>) -> Result<Self> {
        if prob.len() != func.variate_count() {
            return Err(SimulationError::ShapeMismatch(format!(
                "|prob| = {} but variate_count(func) = {}",
                prob.len(),
                func.variate_count()
            )));
        }
        let total: R = prob.iter().cloned().fold(R::zero(), |a, b| a + b);
        let one = R::one();
        let eps = R::from_f64(1e-6).unwrap();
        if (total - one).abs() > eps {
            return Err(SimulationError::ShapeMismatch(
                "prob must sum to 1 (simplex constraint)".to_string(),
            ));
        }
        Ok(Self { func, prob })
    }
}

impl<R: Real> std::fmt::Debug for IndicatorProcess<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndicatorProcess")
            .field("func", &"<dyn GeospatialFunction>")
            .field("prob", &self.prob)
            .finish()
    }
}

/// The Lindgren/SPDE process descriptor (mesh-only field process): a sparse
/// precision matrix on a mesh parameterized by a Matern-like range and sill. Its engine is
/// a plug-in seam rather than part of the core; see `engine::lindgren`.
pub struct LindgrenProcess<R: Real> {
    pub range: R,
    pub sill: R,
}

impl<R: Real> LindgrenProcess<R> {
    pub fn new(range: R, sill: R) -> Result<Self> {
        if range <= R::zero() || sill <= R::zero() {
            return Err(SimulationError::ShapeMismatch(
                "LindgrenProcess requires range > 0 and sill > 0".to_string(),
            ));
        }
        Ok(Self { range, sill })
    }
}

/// The process-back-end plug-in contract: a process declares its default method
/// and output schema; `SimulationMethod` (one per engine) supplies `preprocess`/`single`.
pub trait Process<R: Real>: Send + Sync {
    /// Variable names this process writes into an [`crate::data::AttrTable`].
    fn output_schema(&self) -> Vec<&'static str>;

    /// Chooses a default simulation method given the process, domain, and optional data.
    fn default_method(&self, domain: &dyn Domain<R>, data_present: bool) -> Method;
}

impl<R: Real> Process<R> for GaussianProcess<R> {
    fn output_schema(&self) -> Vec<&'static str> {
        match self.func.variate_count() {
            1 => vec!["z"],
            2 => vec!["z1", "z2"],
            _ => vec!["z"],
        }
    }

    fn default_method(&self, domain: &dyn Domain<R>, data_present: bool) -> Method {
        let func = self.func.as_ref();
        let univariate = func.variate_count() == 1;

        if domain.parent().is_some() && univariate && func.is_stationary() && !data_present {
            let bbox = domain.bounding_box();
            if func.range() <= bbox.min_side() / R::from_f64(3.0).unwrap() {
                return Method::Fft;
            }
        }

        if domain.element_count() < 10_000
            && func.is_stationary()
            && func.is_symmetric()
            && func.is_banded()
        {
            return Method::Lu;
        }

        Method::Seq
    }
}

impl<R: Real> Process<R> for IndicatorProcess<R> {
    fn output_schema(&self) -> Vec<&'static str> {
        vec!["category"]
    }

    fn default_method(&self, _domain: &dyn Domain<R>, _data_present: bool) -> Method {
        Method::Seq
    }
}

impl<R: Real> Process<R> for LindgrenProcess<R> {
    fn output_schema(&self) -> Vec<&'static str> {
        vec!["z"]
    }

    fn default_method(&self, _domain: &dyn Domain<R>, _data_present: bool) -> Method {
        Method::Lindgren
    }
}
