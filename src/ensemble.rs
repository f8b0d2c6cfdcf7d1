//! Multi-realization results and reductions.

use crate::data::AttrTable;
use crate::error::{Result, SimulationError};
use crate::numeric_types::Real;
use num::ToPrimitive;
use std::sync::mpsc::Receiver;

/// A still-running realization, produced when [`crate::orchestrator::DrawOptions::async_mode`]
/// is set: the calling thread gets this back immediately instead of blocking on the worker.
pub struct RealizationFuture<R: Real> {
    rx: Receiver<std::result::Result<AttrTable<R>, SimulationError>>,
}

impl<R: Real> RealizationFuture<R> {
    pub(crate) fn new(rx: Receiver<std::result::Result<AttrTable<R>, SimulationError>>) -> Self {
        Self { rx }
    }

    /// Blocks until the realization finishes.
    pub fn wait(self) -> Result<AttrTable<R>> {
        self.rx
            .recv()
            .unwrap_or_else(|_| Err(SimulationError::Unknown(anyhow::anyhow!("worker dropped"))))
    }

    /// Non-blocking poll: `None` if the realization hasn't finished yet.
    pub fn try_get(&self) -> Option<Result<AttrTable<R>>> {
        self.rx.try_recv().ok()
    }
}

enum Slot<R: Real> {
    Ready(AttrTable<R>),
    Pending(RealizationFuture<R>),
    Failed(SimulationError),
}

/// A collection of realizations over the same domain, produced by one
/// `draw_*` call. Slots may still be pending if the call used `async_mode`.
pub struct Ensemble<R: Real> {
    slots: Vec<Slot<R>>,
}

impl<R: Real> std::fmt::Debug for Ensemble<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kinds: Vec<&'static str> = self
            .slots
            .iter()
            .map(|s| match s {
                Slot::Ready(_) => "Ready",
                Slot::Pending(_) => "Pending",
                Slot::Failed(_) => "Failed",
            })
            .collect();
        f.debug_struct("Ensemble").field("slots", &kinds).finish()
    }
}

impl<R: Real> Ensemble<R> {
    pub(crate) fn from_ready(realizations: Vec<AttrTable<R>>) -> Self {
        Self {
            slots: realizations.into_iter().map(Slot::Ready).collect(),
        }
    }

    pub(crate) fn from_results(results: Vec<std::result::Result<AttrTable<R>, SimulationError>>) -> Self {
        Self {
            slots: results
                .into_iter()
                .map(|r| match r {
                    Ok(t) => Slot::Ready(t),
                    Err(e) => Slot::Failed(e),
                })
                .collect(),
        }
    }

    pub(crate) fn from_futures(futures: Vec<RealizationFuture<R>>) -> Self {
        Self {
            slots: futures.into_iter().map(Slot::Pending).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Resolves every still-pending slot, blocking on each worker in turn.
    pub fn resolve_all(&mut self) {
        for slot in self.slots.iter_mut() {
            let placeholder = Slot::Failed(SimulationError::Unknown(anyhow::anyhow!("unresolved")));
            match std::mem::replace(slot, placeholder) {
                Slot::Pending(fut) => {
                    *slot = match fut.wait() {
                        Ok(t) => Slot::Ready(t),
                        Err(e) => Slot::Failed(e),
                    };
                }
                other => *slot = other,
            }
        }
    }

    /// Returns realization `i`, blocking if it's still pending.
    pub fn fetch(&mut self, i: usize) -> Result<&AttrTable<R>> {
        let placeholder = Slot::Failed(SimulationError::Unknown(anyhow::anyhow!("unresolved")));
        match std::mem::replace(&mut self.slots[i], placeholder) {
            Slot::Pending(fut) => {
                self.slots[i] = match fut.wait() {
                    Ok(t) => Slot::Ready(t),
                    Err(e) => Slot::Failed(e),
                };
            }
            other => self.slots[i] = other,
        }
        match &self.slots[i] {
            Slot::Ready(t) => Ok(t),
            Slot::Failed(e) => Err(SimulationError::WorkerFailure {
                index: i,
                source: anyhow::anyhow!(e.to_string()),
            }),
            Slot::Pending(_) => unreachable!(),
        }
    }

    /// Ready realizations only, skipping any that are still pending or failed; resolve with
    /// [`Ensemble::resolve_all`] first if pending slots should be included.
    fn ready_values(&self, name: &str) -> Vec<Vec<R>> {
        self.slots
            .iter()
            .filter_map(|s| match s {
                Slot::Ready(t) => t.column(name).map(|c| c.to_vec()),
                _ => None,
            })
            .collect()
    }

    /// Per-cell mean across realizations.
    pub fn mean(&self, name: &str) -> Vec<R> {
        let cols = self.ready_values(name);
        reduce_per_cell(&cols, |values| {
            let n = R::from_usize(values.len()).unwrap();
            values.iter().cloned().fold(R::zero(), |a, b| a + b) / n
        })
    }

    /// Per-cell sample variance across realizations; zero when fewer than two
    /// realizations are ready.
    pub fn var(&self, name: &str) -> Vec<R> {
        let cols = self.ready_values(name);
        reduce_per_cell(&cols, |values| {
            if values.len() < 2 {
                return R::zero();
            }
            let n = R::from_usize(values.len()).unwrap();
            let mean = values.iter().cloned().fold(R::zero(), |a, b| a + b) / n;
            let ss = values
                .iter()
                .map(|&v| (v - mean) * (v - mean))
                .fold(R::zero(), |a, b| a + b);
            ss / (n - R::one())
        })
    }

    /// Per-cell empirical CDF at `x`: fraction of realizations with value `<= x`.
    pub fn cdf(&self, name: &str, x: R) -> Vec<R> {
        let cols = self.ready_values(name);
        reduce_per_cell(&cols, |values| {
            let count = values.iter().filter(|&&v| v <= x).count();
            R::from_usize(count).unwrap() / R::from_usize(values.len()).unwrap()
        })
    }

    /// Per-cell empirical quantile at probability `q` in `[0, 1]`.
    pub fn quantile(&self, name: &str, q: R) -> Vec<R> {
        let cols = self.ready_values(name);
        reduce_per_cell(&cols, |values| {
            let mut sorted = values.to_vec();
            sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
            let n = sorted.len();
            let pos = (q.to_f64().unwrap() * (n - 1).max(0) as f64).round() as usize;
            sorted[pos.min(n - 1)]
        })
    }
}

/// Transposes `realizations x cells` into `cells x realizations` and applies `f` per cell.
fn reduce_per_cell<R: Real>(columns: &[Vec<R>], f: impl Fn(&[R]) -> R) -> Vec<R> {
    if columns.is_empty() {
        return Vec::new();
    }
    let n_cells = columns[0].len();
    (0..n_cells)
        .map(|cell| {
            let values: Vec<R> = columns.iter().map(|c| c[cell]).collect();
            f(&values)
        })
        .collect()
}
