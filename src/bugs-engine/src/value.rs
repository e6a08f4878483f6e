// Copyright 2025 The Bugs Engine Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::common::Result;
use crate::comp_err;

/// A concrete scalar value.  BUGS distinguishes integers from reals because
/// loop bounds and array indices must be integral.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Int(i64),
    Real(f64),
}

impl Scalar {
    pub fn as_f64(self) -> f64 {
        match self {
            Scalar::Int(n) => n as f64,
            Scalar::Real(x) => x,
        }
    }

    /// as_index coerces to an integer index: integers pass through, reals
    /// are accepted iff exactly integral.
    pub fn as_index(self) -> Result<i64> {
        match self {
            Scalar::Int(n) => Ok(n),
            Scalar::Real(x) => {
                if x.fract() == 0.0 && x.is_finite() {
                    Ok(x as i64)
                } else {
                    comp_err!(NonIntegerIndex, x)
                }
            }
        }
    }

    pub fn is_true(self) -> bool {
        match self {
            Scalar::Int(n) => n != 0,
            Scalar::Real(x) => x != 0.0,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Scalar::Int(n) => write!(f, "{}", n),
            Scalar::Real(x) => write!(f, "{}", x),
        }
    }
}

/// An array with every cell determined, as produced by the evaluator.
/// Row-major; indices throughout the crate are 1-based like the language.
#[derive(Clone, Debug, PartialEq)]
pub struct DenseArray {
    pub shape: Vec<usize>,
    pub cells: Vec<Scalar>,
}

impl DenseArray {
    pub fn vector(cells: Vec<Scalar>) -> Self {
        DenseArray {
            shape: vec![cells.len()],
            cells,
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn f64_cells(&self) -> Vec<f64> {
        self.cells.iter().map(|c| c.as_f64()).collect()
    }

    /// offset maps 1-based per-axis indices to the flat cell offset.
    pub fn offset(&self, indices: &[i64]) -> Option<usize> {
        flat_offset(&self.shape, indices)
    }
}

impl fmt::Display for DenseArray {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[")?;
        for (i, c) in self.cells.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", c)?;
        }
        write!(f, "]")
    }
}

/// A fully evaluated value: a scalar or a complete array.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Scalar(Scalar),
    Array(DenseArray),
}

impl Value {
    pub fn as_scalar(&self) -> Option<Scalar> {
        match self {
            Value::Scalar(s) => Some(*s),
            Value::Array(_) => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.as_scalar().map(|s| s.as_f64())
    }

    pub fn as_array(&self) -> Option<&DenseArray> {
        match self {
            Value::Scalar(_) => None,
            Value::Array(a) => Some(a),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Scalar(s) => write!(f, "{}", s),
            Value::Array(a) => write!(f, "{}", a),
        }
    }
}

/// An array cell store where individual cells may be undetermined.  This is
/// the in-environment representation of every model array: data arrays may
/// be partially observed, non-data arrays start fully undetermined.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArrayValue {
    pub shape: Vec<usize>,
    pub cells: Vec<Option<Scalar>>,
}

impl ArrayValue {
    pub fn undetermined(shape: Vec<usize>) -> Self {
        let n = shape.iter().product();
        ArrayValue {
            shape,
            cells: vec![None; n],
        }
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    pub fn offset(&self, indices: &[i64]) -> Option<usize> {
        flat_offset(&self.shape, indices)
    }

    /// cell returns the stored cell at 1-based indices, or None when the
    /// indices are out of bounds or of the wrong rank.
    pub fn cell(&self, indices: &[i64]) -> Option<Option<Scalar>> {
        self.offset(indices).map(|off| self.cells[off])
    }

    pub fn set(&mut self, indices: &[i64], value: Scalar) -> bool {
        match self.offset(indices) {
            Some(off) => {
                self.cells[off] = Some(value);
                true
            }
            None => false,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.cells.iter().all(|c| c.is_some())
    }

    pub fn determined_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }

    pub fn to_dense(&self) -> Option<DenseArray> {
        let cells: Option<Vec<Scalar>> = self.cells.iter().copied().collect();
        cells.map(|cells| DenseArray {
            shape: self.shape.clone(),
            cells,
        })
    }

    /// grow_to extends each axis to at least the given size, preserving the
    /// existing cells in their row-major positions.  Only meaningful while
    /// shapes are still being inferred.
    pub fn grow_to(&mut self, min_shape: &[usize]) {
        assert_eq!(self.shape.len(), min_shape.len());
        if self
            .shape
            .iter()
            .zip(min_shape.iter())
            .all(|(cur, min)| cur >= min)
        {
            return;
        }
        let new_shape: Vec<usize> = self
            .shape
            .iter()
            .zip(min_shape.iter())
            .map(|(cur, min)| (*cur).max(*min))
            .collect();
        let mut new_cells = vec![None; new_shape.iter().product()];
        let mut idx = vec![0usize; self.shape.len()];
        for cell in &self.cells {
            if cell.is_some() {
                let mut new_off = 0;
                for (axis, &i) in idx.iter().enumerate() {
                    new_off = new_off * new_shape[axis] + i;
                }
                new_cells[new_off] = *cell;
            }
            // odometer over the old shape, last axis fastest
            for axis in (0..idx.len()).rev() {
                idx[axis] += 1;
                if idx[axis] < self.shape[axis] {
                    break;
                }
                idx[axis] = 0;
            }
        }
        self.shape = new_shape;
        self.cells = new_cells;
    }
}

/// flat_offset maps 1-based per-axis indices to a row-major flat offset,
/// or None when the rank disagrees or any index is out of bounds.
pub(crate) fn flat_offset(shape: &[usize], indices: &[i64]) -> Option<usize> {
    if shape.len() != indices.len() {
        return None;
    }
    let mut off = 0usize;
    for (axis, &i) in indices.iter().enumerate() {
        if i < 1 || (i as usize) > shape[axis] {
            return None;
        }
        off = off * shape[axis] + (i as usize - 1);
    }
    Some(off)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_index_coercion() {
        assert_eq!(3, Scalar::Int(3).as_index().unwrap());
        assert_eq!(2, Scalar::Real(2.0).as_index().unwrap());
        assert!(Scalar::Real(2.5).as_index().is_err());
        assert!(Scalar::Real(f64::NAN).as_index().is_err());
    }

    #[test]
    fn array_offsets_are_one_based_row_major() {
        let a = ArrayValue::undetermined(vec![2, 3]);
        assert_eq!(Some(0), a.offset(&[1, 1]));
        assert_eq!(Some(2), a.offset(&[1, 3]));
        assert_eq!(Some(3), a.offset(&[2, 1]));
        assert_eq!(None, a.offset(&[0, 1]));
        assert_eq!(None, a.offset(&[2, 4]));
        assert_eq!(None, a.offset(&[1]));
    }

    #[test]
    fn grow_preserves_cells() {
        let mut a = ArrayValue::undetermined(vec![2, 2]);
        assert!(a.set(&[1, 2], Scalar::Int(12)));
        assert!(a.set(&[2, 1], Scalar::Int(21)));
        a.grow_to(&[3, 4]);
        assert_eq!(vec![3, 4], a.shape);
        assert_eq!(Some(Some(Scalar::Int(12))), a.cell(&[1, 2]));
        assert_eq!(Some(Some(Scalar::Int(21))), a.cell(&[2, 1]));
        assert_eq!(Some(None), a.cell(&[3, 4]));
    }

    #[test]
    fn dense_conversion() {
        let mut a = ArrayValue::undetermined(vec![2]);
        assert!(a.to_dense().is_none());
        a.set(&[1], Scalar::Int(1));
        a.set(&[2], Scalar::Real(2.5));
        let d = a.to_dense().unwrap();
        assert_eq!(vec![Scalar::Int(1), Scalar::Real(2.5)], d.cells);
    }
}
