//! Attribute tables, realization buffers, and conditioning-data binding.

use crate::error::{Result, SimulationError};
use crate::geometry::Domain;
use crate::numeric_types::Real;
use nalgebra::DVector;
use std::collections::HashMap;

/// A dense table of named variable columns over a domain's elements, plus (for conditioning
/// data) a per-column mask of which cells are "known".
///
/// Invariant: at return time every buffer cell of every declared variable has
/// been written exactly once; cells whose mask bit was set during [`bind`] are left
/// untouched by the simulation engines.
#[derive(Clone, Debug)]
pub struct AttrTable<R: Real> {
    columns: HashMap<String, Vec<R>>,
    masks: HashMap<String, Vec<bool>>,
    len: usize,
}

impl<R: Real> AttrTable<R> {
    /// Builds an all-unknown table of the given length for the named variables.
    pub fn empty(variable_names: &[&str], len: usize) -> Self {
        let mut columns = HashMap::new();
        let mut masks = HashMap::new();
        for &name in variable_names {
            columns.insert(name.to_string(), vec![R::zero(); len]);
            masks.insert(name.to_string(), vec![false; len]);
        }
        Self { columns, masks, len }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn variable_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(|s| s.as_str())
    }

    pub fn column(&self, name: &str) -> Option<&[R]> {
        self.columns.get(name).map(|v| v.as_slice())
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut [R]> {
        self.columns.get_mut(name).map(|v| v.as_mut_slice())
    }

    pub fn mask(&self, name: &str) -> Option<&[bool]> {
        self.masks.get(name).map(|v| v.as_slice())
    }

    pub fn mask_mut(&mut self, name: &str) -> Option<&mut Vec<bool>> {
        self.masks.get_mut(name)
    }

    pub fn set(&mut self, name: &str, i: usize, value: R) {
        self.columns.get_mut(name).expect("unknown variable")[i] = value;
        self.masks.get_mut(name).expect("unknown variable")[i] = true;
    }

    /// A raw data table with no domain binding yet: one un-masked row per sample, with an
    /// explicit location per row used by [`bind`].
    pub fn raw_rows(variable_names: &[&str], rows: usize) -> Self {
        Self::empty(variable_names, rows)
    }
}

/// Index of the domain element nearest to `point`; ties broken by ascending index
/// (used by `NearestInit`).
pub fn nearest_index<R: Real>(domain: &dyn Domain<R>, point: &DVector<R>) -> usize {
    let mut best_idx = 0usize;
    let mut best_dist = R::max_value().unwrap();
    for i in 0..domain.element_count() {
        let d = (domain.centroid(i) - point).norm();
        if d < best_dist {
            best_dist = d;
            best_idx = i;
        }
    }
    best_idx
}

/// How conditioning data is bound onto the simulation domain.
#[derive(Clone, Debug)]
pub enum InitMethod {
    /// For each data row, bind to the nearest domain element (ties -> lowest index).
    Nearest,
    /// Explicit row -> destination index mapping.
    Explicit {
        source_indices: Option<Vec<usize>>,
        dest_indices: Vec<usize>,
    },
}

impl Default for InitMethod {
    fn default() -> Self {
        InitMethod::Nearest
    }
}

/// Binds `data` (one row per sample, with `locations` giving each row's point in the same
/// space as the domain) onto `domain`, producing the `(real, mask)` realization buffer
/// initial state described above.
pub fn bind<R: Real>(
    domain: &dyn Domain<R>,
    data: &AttrTable<R>,
    locations: Option<&[DVector<R>]>,
    init: &InitMethod,
    missing: impl Fn(&str, usize) -> bool,
) -> Result<AttrTable<R>> {
    let variable_names: Vec<&str> = data.variable_names().collect();
    let mut out = AttrTable::empty(&variable_names, domain.element_count());

    match init {
        InitMethod::Nearest => {
            let locations = locations.ok_or_else(|| {
                SimulationError::Unknown(anyhow::anyhow!("NearestInit requires sample locations"))
            })?;
            for row in 0..data.len() {
                let loc = &locations[row];
                let best_idx = nearest_index(domain, loc);
                for &name in &variable_names {
                    if missing(name, row) {
                        continue;
                    }
                    let value = data.column(name).unwrap()[row];
                    out.set(name, best_idx, value);
                }
            }
        }
        InitMethod::Explicit {
            source_indices,
            dest_indices,
        } => {
            let source_indices: Vec<usize> = source_indices
                .clone()
                .unwrap_or_else(|| (0..data.len()).collect());
            if source_indices.len() != dest_indices.len() {
                return Err(SimulationError::LengthMismatch(
                    source_indices.len(),
                    dest_indices.len(),
                ));
            }
            for (src, &dst) in source_indices.iter().zip(dest_indices.iter()) {
                for &name in &variable_names {
                    if missing(name, *src) {
                        continue;
                    }
                    let value = data.column(name).unwrap()[*src];
                    out.set(name, dst, value);
                }
            }
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::CartesianGrid;

    #[test]
    fn set_marks_the_cell_known() {
        let mut table: AttrTable<f64> = AttrTable::empty(&["z"], 3);
        assert_eq!(table.mask("z"), Some(&[false, false, false][..]));
        table.set("z", 1, 2.5);
        assert_eq!(table.column("z"), Some(&[0.0, 2.5, 0.0][..]));
        assert_eq!(table.mask("z"), Some(&[false, true, false][..]));
    }

    #[test]
    fn nearest_index_breaks_ties_low() {
        let grid: CartesianGrid<f64> = CartesianGrid::new(vec![3]);
        let point = DVector::from_vec(vec![0.5]);
        assert_eq!(nearest_index(&grid, &point), 0);
    }

    #[test]
    fn bind_nearest_writes_only_unmasked_rows() {
        let grid: CartesianGrid<f64> = CartesianGrid::new(vec![4]);
        let mut data: AttrTable<f64> = AttrTable::raw_rows(&["z"], 2);
        data.set("z", 0, 9.0);
        data.set("z", 1, 4.0);
        let locations = vec![
            DVector::from_vec(vec![0.0]),
            DVector::from_vec(vec![3.0]),
        ];
        let bound = bind(&grid, &data, Some(&locations), &InitMethod::Nearest, |_, _| false).unwrap();
        assert_eq!(bound.column("z").unwrap()[0], 9.0);
        assert_eq!(bound.column("z").unwrap()[3], 4.0);
        assert_eq!(bound.mask("z").unwrap(), &[true, false, false, true]);
    }

    #[test]
    fn bind_explicit_rejects_length_mismatch() {
        let grid: CartesianGrid<f64> = CartesianGrid::new(vec![4]);
        let data: AttrTable<f64> = AttrTable::raw_rows(&["z"], 2);
        let init = InitMethod::Explicit {
            source_indices: Some(vec![0]),
            dest_indices: vec![0, 1],
        };
        let err = bind(&grid, &data, None, &init, |_, _| false).unwrap_err();
        assert!(matches!(err, SimulationError::LengthMismatch(1, 2)));
    }
}
