// Copyright 2025 The Bugs Engine Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::common::{canonicalize, Ident, Result};
use crate::comp_err;
use crate::value::{ArrayValue, Scalar, Value};
use crate::variable::VarId;

/// One entry of the user-supplied data mapping.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DataEntry {
    Scalar(Scalar),
    Array(ArrayValue),
}

#[derive(Clone, Debug, PartialEq)]
pub enum EnvCell {
    Scalar(Option<Scalar>),
    Array(ArrayValue),
}

/// Env is the evaluation environment: one cell per identifier, each holding
/// a concrete value or the undetermined sentinel (`None`).  It is seeded
/// from data; the variable collector adds undetermined cells for every
/// model variable (growing non-data arrays until shapes freeze); after that
/// only the data-transformation pass writes to it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Env {
    cells: HashMap<Ident, EnvCell>,
    data: HashSet<Ident>,
    // observed mask of each data array at seed time; transformation writes
    // into missing cells must not blur what the user actually provided
    data_masks: HashMap<Ident, Vec<bool>>,
    frozen: bool,
}

impl Env {
    pub fn from_data(data: &HashMap<Ident, DataEntry>) -> Result<Env> {
        let mut env = Env::default();
        for (name, entry) in data {
            let name = canonicalize(name)?;
            match entry {
                DataEntry::Scalar(s) => {
                    env.cells.insert(name.clone(), EnvCell::Scalar(Some(*s)));
                }
                DataEntry::Array(a) => {
                    if a.shape.iter().any(|&d| d == 0) {
                        return comp_err!(
                            ShapeMismatch,
                            format!("data array {} has an empty axis", name)
                        );
                    }
                    let mask: Vec<bool> = a.cells.iter().map(|c| c.is_some()).collect();
                    env.data_masks.insert(name.clone(), mask);
                    env.cells.insert(name.clone(), EnvCell::Array(a.clone()));
                }
            }
            env.data.insert(name);
        }
        Ok(env)
    }

    pub fn is_data(&self, name: &str) -> bool {
        self.data.contains(name)
    }

    /// is_data_cell reports whether this exact cell was provided (observed)
    /// in the user data.
    pub fn is_data_cell(&self, name: &str, indices: &[i64]) -> bool {
        if !self.data.contains(name) {
            return false;
        }
        match self.cells.get(name) {
            Some(EnvCell::Scalar(_)) => indices.is_empty(),
            Some(EnvCell::Array(a)) => match a.offset(indices) {
                Some(off) => self.data_masks[name][off],
                None => false,
            },
            None => false,
        }
    }

    pub(crate) fn cell(&self, name: &str) -> Option<&EnvCell> {
        self.cells.get(name)
    }

    pub fn scalar(&self, name: &str) -> Option<Scalar> {
        match self.cells.get(name) {
            Some(EnvCell::Scalar(s)) => *s,
            _ => None,
        }
    }

    pub fn array(&self, name: &str) -> Option<&ArrayValue> {
        match self.cells.get(name) {
            Some(EnvCell::Array(a)) => Some(a),
            _ => None,
        }
    }

    pub(crate) fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub(crate) fn freeze(&mut self) {
        self.frozen = true;
    }

    /// declare_scalar adds an undetermined scalar cell for a non-data name.
    pub(crate) fn declare_scalar(&mut self, name: &str) -> Result<()> {
        match self.cells.get(name) {
            None => {
                self.cells
                    .insert(name.to_owned(), EnvCell::Scalar(None));
                Ok(())
            }
            Some(EnvCell::Scalar(_)) => Ok(()),
            Some(EnvCell::Array(_)) => comp_err!(
                ShapeMismatch,
                format!("{} used both as a scalar and as an array", name)
            ),
        }
    }

    /// ensure_array makes sure an array cell of the given rank exists,
    /// creating an empty growable one for non-data names.
    pub(crate) fn ensure_array(&mut self, name: &str, rank: usize) -> Result<()> {
        match self.cells.get(name) {
            None => {
                assert!(!self.frozen, "array {} introduced after shape freeze", name);
                self.cells.insert(
                    name.to_owned(),
                    EnvCell::Array(ArrayValue::undetermined(vec![0; rank])),
                );
                Ok(())
            }
            Some(EnvCell::Array(a)) if a.rank() == rank => Ok(()),
            Some(EnvCell::Array(a)) => comp_err!(
                ShapeMismatch,
                format!(
                    "{} referenced with {} subscripts but has {} axes",
                    name,
                    rank,
                    a.rank()
                )
            ),
            Some(EnvCell::Scalar(_)) => comp_err!(
                ShapeMismatch,
                format!("{} used both as a scalar and as an array", name)
            ),
        }
    }

    /// grow_array extends a non-data array so the given footprint fits.
    /// Shapes only grow while unfrozen.
    pub(crate) fn grow_array(&mut self, name: &str, min_shape: &[usize]) {
        assert!(!self.frozen);
        assert!(!self.is_data(name));
        if let Some(EnvCell::Array(a)) = self.cells.get_mut(name) {
            a.grow_to(min_shape);
        }
    }

    pub(crate) fn write_scalar(&mut self, name: &str, value: Scalar) {
        self.cells
            .insert(name.to_owned(), EnvCell::Scalar(Some(value)));
    }

    pub(crate) fn write_element(
        &mut self,
        name: &str,
        indices: &[i64],
        value: Scalar,
    ) -> Result<()> {
        match self.cells.get_mut(name) {
            Some(EnvCell::Array(a)) => {
                if a.set(indices, value) {
                    Ok(())
                } else {
                    comp_err!(
                        ShapeMismatch,
                        format!(
                            "index {:?} out of bounds for {} with shape {:?}",
                            indices, name, a.shape
                        )
                    )
                }
            }
            Some(EnvCell::Scalar(_)) if indices.is_empty() => {
                self.write_scalar(name, value);
                Ok(())
            }
            _ => comp_err!(ShapeMismatch, format!("{} is not an array", name)),
        }
    }

    /// var_determined reports whether every cell in the variable's
    /// footprint holds a value.
    pub fn var_determined(&self, var: &VarId) -> bool {
        match self.cells.get(&var.name) {
            Some(EnvCell::Scalar(s)) => var.is_scalar() && s.is_some(),
            Some(EnvCell::Array(a)) => {
                if var.is_scalar() {
                    return false;
                }
                var.scalarize()
                    .iter()
                    .all(|idx| matches!(a.cell(idx), Some(Some(_))))
            }
            None => false,
        }
    }

    /// var_value reads a determined variable (scalar, element, or slice)
    /// out of the environment.
    pub fn var_value(&self, var: &VarId) -> Option<Value> {
        match self.cells.get(&var.name) {
            Some(EnvCell::Scalar(s)) if var.is_scalar() => s.map(Value::Scalar),
            Some(EnvCell::Array(a)) if !var.is_scalar() => {
                if var.is_slice() {
                    let cells: Option<Vec<Scalar>> = var
                        .scalarize()
                        .iter()
                        .map(|idx| a.cell(idx).flatten())
                        .collect();
                    cells.map(|cells| {
                        Value::Array(crate::value::DenseArray {
                            shape: var.selected_shape(),
                            cells,
                        })
                    })
                } else {
                    let idx = var.element_index().unwrap();
                    a.cell(&idx).flatten().map(Value::Scalar)
                }
            }
            _ => None,
        }
    }

    /// write_var stores a value over the variable's footprint: a scalar
    /// into a scalar or element, an array of the selected shape into a
    /// slice.
    pub fn write_var(&mut self, var: &VarId, value: &Value) -> Result<()> {
        match value {
            Value::Scalar(s) => {
                if var.is_slice() {
                    return comp_err!(
                        ShapeMismatch,
                        format!("{}: scalar assigned to a slice", var)
                    );
                }
                if var.is_scalar() {
                    self.write_scalar(&var.name, *s);
                    Ok(())
                } else {
                    let idx = var.element_index().unwrap();
                    self.write_element(&var.name, &idx, *s)
                }
            }
            Value::Array(a) => {
                if !var.is_slice() || a.shape != var.selected_shape() {
                    return comp_err!(
                        ShapeMismatch,
                        format!("{}: value shape {:?} does not fit", var, a.shape)
                    );
                }
                for (idx, cell) in var.scalarize().iter().zip(a.cells.iter()) {
                    self.write_element(&var.name, idx, *cell)?;
                }
                Ok(())
            }
        }
    }

    /// materialize reads a whole identifier as a value, if complete.
    pub fn materialize(&self, name: &str) -> Option<Value> {
        match self.cells.get(name) {
            Some(EnvCell::Scalar(s)) => s.map(Value::Scalar),
            Some(EnvCell::Array(a)) => a.to_dense().map(Value::Array),
            None => None,
        }
    }

    /// names iterates every identifier with a cell.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.cells.keys().map(|k| k.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed() -> Env {
        let mut data = HashMap::new();
        data.insert(
            "n".to_owned(),
            DataEntry::Scalar(Scalar::Int(2)),
        );
        data.insert(
            "u".to_owned(),
            DataEntry::Array(ArrayValue {
                shape: vec![3],
                cells: vec![Some(Scalar::Int(1)), None, Some(Scalar::Int(3))],
            }),
        );
        Env::from_data(&data).unwrap()
    }

    #[test]
    fn data_cells_are_tracked_per_element() {
        let env = seed();
        assert!(env.is_data("n"));
        assert!(env.is_data_cell("n", &[]));
        assert!(env.is_data_cell("u", &[1]));
        assert!(!env.is_data_cell("u", &[2]));
        assert!(!env.is_data_cell("u", &[7]));
        assert!(!env.is_data_cell("v", &[1]));
    }

    #[test]
    fn writes_into_missing_data_cells_keep_the_mask() {
        let mut env = seed();
        env.write_element("u", &[2], Scalar::Int(9)).unwrap();
        assert!(!env.is_data_cell("u", &[2]));
        assert_eq!(
            Some(Value::Scalar(Scalar::Int(9))),
            env.var_value(&VarId::element("u", &[2]))
        );
    }

    #[test]
    fn growable_arrays() {
        let mut env = seed();
        env.ensure_array("m", 2).unwrap();
        env.grow_array("m", &[2, 3]);
        env.write_element("m", &[2, 3], Scalar::Int(6)).unwrap();
        assert!(env.write_element("m", &[3, 1], Scalar::Int(0)).is_err());
        assert!(env.ensure_array("m", 1).is_err());
    }

    #[test]
    fn var_determined_footprints() {
        let env = seed();
        assert!(env.var_determined(&VarId::element("u", &[1])));
        assert!(!env.var_determined(&VarId::element("u", &[2])));
        use crate::variable::IndexEntry;
        use smallvec::smallvec;
        let slice = VarId::new("u", smallvec![IndexEntry::Range(1, 3)]);
        assert!(!env.var_determined(&slice));
    }
}
