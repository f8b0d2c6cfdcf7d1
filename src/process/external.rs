//! Opaque-process plug-in shape.
//!
//! Image-quilting, Turing-pattern, and stratigraphic-record processes are thin adapters
//! onto third-party texture-synthesis engines that are explicitly out of scope for this
//! crate. What *is* in scope is the shape of the plug-in
//! contract they attach to (`Process` + a `SimulationMethod` pair); `WhiteNoiseProcess`
//! exercises that contract end-to-end with a trivial in-crate back-end so the seam is
//! tested without depending on an external engine.

use crate::data::AttrTable;
use crate::error::{Result, SimulationError};
use crate::geometry::Domain;
use crate::numeric_types::Real;
use crate::orchestrator::Method;
use crate::process::Process;
use rand::RngCore;
use rand_distr::{Distribution, StandardNormal};

/// An opaque descriptor for a third-party back-end process (quilting/turing/strata). This
/// crate does not implement any concrete opaque back-end; it only carries the name and a
/// byte payload of adapter-specific configuration.
pub struct ExternalProcess {
    pub backend_name: &'static str,
    pub config: Vec<u8>,
}

impl<R: Real> Process<R> for ExternalProcess {
    fn output_schema(&self) -> Vec<&'static str> {
        vec!["z"]
    }

    fn default_method(&self, _domain: &dyn Domain<R>, _data_present: bool) -> Method {
        Method::External
    }
}

/// A minimal in-crate demonstration back-end: every cell is drawn i.i.d. standard normal,
/// ignoring any conditioning data. Used only to exercise the `Process`/`SimulationMethod`
/// plug-in seam in tests; not a stand-in for image-quilting/Turing/strata.
pub struct WhiteNoiseProcess;

impl<R: Real> Process<R> for WhiteNoiseProcess {
    fn output_schema(&self) -> Vec<&'static str> {
        vec!["z"]
    }

    fn default_method(&self, _domain: &dyn Domain<R>, _data_present: bool) -> Method {
        Method::External
    }
}

/// The seam a `Method::External` process implements directly:
/// the orchestrator has no generic way to preprocess or draw from a third-party engine, so
/// the process type supplies both steps itself instead of going through [`crate::engine`].
pub trait ExternalBackend<R: Real>: Send + Sync {
    /// Validates the process/domain combination before any realization work starts.
    fn check(&self, domain: &dyn Domain<R>) -> Result<()>;
    /// Draws one realization over a domain of `n` elements.
    fn single(&self, rng: &mut dyn RngCore, n: usize) -> AttrTable<R>;
}

impl<R: Real> ExternalBackend<R> for ExternalProcess {
    fn check(&self, _domain: &dyn Domain<R>) -> Result<()> {
        Err(SimulationError::UnsupportedMethod(format!(
            "no concrete back-end registered for external process '{}'",
            self.backend_name
        )))
    }

    fn single(&self, _rng: &mut dyn RngCore, _n: usize) -> AttrTable<R> {
        unreachable!("check() always fails for ExternalProcess before single() would run")
    }
}

impl<R: Real> ExternalBackend<R> for WhiteNoiseProcess {
    fn check(&self, _domain: &dyn Domain<R>) -> Result<()> {
        Ok(())
    }

    fn single(&self, rng: &mut dyn RngCore, n: usize) -> AttrTable<R> {
        let mut out = AttrTable::empty(&["z"], n);
        for i in 0..n {
            let x: f64 = StandardNormal.sample(rng);
            out.set("z", i, R::from_f64(x).unwrap());
        }
        out
    }
}
