// Copyright 2025 The Bugs Engine Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::fmt;

use smallvec::{smallvec, SmallVec};

use crate::common::Ident;

/// One axis of a variable's subscript: a single 1-based element index or an
/// inclusive index range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IndexEntry {
    Int(i64),
    Range(i64, i64),
}

impl IndexEntry {
    pub fn len(&self) -> usize {
        match self {
            IndexEntry::Int(_) => 1,
            IndexEntry::Range(lo, hi) => {
                if hi >= lo {
                    (hi - lo + 1) as usize
                } else {
                    0
                }
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn last(&self) -> i64 {
        match self {
            IndexEntry::Int(i) => *i,
            IndexEntry::Range(lo, hi) => (*hi).max(*lo),
        }
    }
}

impl fmt::Display for IndexEntry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            IndexEntry::Int(i) => write!(f, "{}", i),
            IndexEntry::Range(lo, hi) => write!(f, "{}:{}", lo, hi),
        }
    }
}

pub type ElemIndex = SmallVec<[i64; 4]>;
pub type Subscript = SmallVec<[IndexEntry; 4]>;

/// A model variable's identity: a name plus a subscript tuple.  An empty
/// subscript is a scalar, an all-integer subscript is an array element, and
/// a subscript containing a range is an array slice.  Slices scalarize into
/// the cartesian product of their elements and are only graph vertices as
/// fan-out points.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct VarId {
    pub name: Ident,
    pub indices: Subscript,
}

impl VarId {
    pub fn scalar(name: &str) -> Self {
        VarId {
            name: name.to_owned(),
            indices: smallvec![],
        }
    }

    pub fn element(name: &str, indices: &[i64]) -> Self {
        VarId {
            name: name.to_owned(),
            indices: indices.iter().map(|i| IndexEntry::Int(*i)).collect(),
        }
    }

    pub fn new(name: &str, indices: Subscript) -> Self {
        VarId {
            name: name.to_owned(),
            indices,
        }
    }

    pub fn is_scalar(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn is_slice(&self) -> bool {
        self.indices
            .iter()
            .any(|e| matches!(e, IndexEntry::Range(_, _)))
    }

    pub fn is_element(&self) -> bool {
        !self.indices.is_empty() && !self.is_slice()
    }

    /// element_index returns the concrete index tuple when this identity
    /// names a single cell (scalars included, with an empty tuple).
    pub fn element_index(&self) -> Option<ElemIndex> {
        if self.is_slice() {
            return None;
        }
        Some(
            self.indices
                .iter()
                .map(|e| match e {
                    IndexEntry::Int(i) => *i,
                    IndexEntry::Range(_, _) => unreachable!(),
                })
                .collect(),
        )
    }

    /// scalarize expands the subscript into the cartesian product of element
    /// index tuples, row-major (last axis fastest).  A scalar yields one
    /// empty tuple; an empty range yields nothing.
    pub fn scalarize(&self) -> Vec<ElemIndex> {
        footprint(&self.indices)
    }

    /// selected_shape is the shape of the sliced region, with
    /// integer-indexed axes dropped.
    pub fn selected_shape(&self) -> Vec<usize> {
        self.indices
            .iter()
            .filter_map(|e| match e {
                IndexEntry::Int(_) => None,
                IndexEntry::Range(_, _) => Some(e.len()),
            })
            .collect()
    }

    /// element_var builds the identity of one scalarized element.
    pub fn element_var(&self, index: &ElemIndex) -> VarId {
        VarId::element(&self.name, index)
    }
}

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.indices.is_empty() {
            return write!(f, "{}", self.name);
        }
        write!(f, "{}[", self.name)?;
        for (i, e) in self.indices.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", e)?;
        }
        write!(f, "]")
    }
}

/// footprint enumerates the element index tuples covered by a subscript,
/// row-major.  An empty subscript covers exactly the scalar cell.
pub fn footprint(entries: &[IndexEntry]) -> Vec<ElemIndex> {
    let mut out: Vec<ElemIndex> = vec![smallvec![]];
    for entry in entries {
        let mut next = Vec::with_capacity(out.len() * entry.len());
        match entry {
            IndexEntry::Int(i) => {
                for prefix in &out {
                    let mut t = prefix.clone();
                    t.push(*i);
                    next.push(t);
                }
            }
            IndexEntry::Range(lo, hi) => {
                for prefix in &out {
                    for i in *lo..=*hi {
                        let mut t = prefix.clone();
                        t.push(i);
                        next.push(t);
                    }
                }
            }
        }
        out = next;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_classification() {
        assert!(VarId::scalar("a").is_scalar());
        assert!(VarId::element("x", &[3]).is_element());
        let slice = VarId::new(
            "x",
            smallvec![IndexEntry::Int(1), IndexEntry::Range(1, 2)],
        );
        assert!(slice.is_slice());
        assert_eq!(None, slice.element_index());
        assert_eq!("x[1, 1:2]", format!("{}", slice));
    }

    #[test]
    fn scalarize_is_row_major() {
        let slice = VarId::new(
            "m",
            smallvec![IndexEntry::Range(1, 2), IndexEntry::Range(3, 4)],
        );
        let elems = slice.scalarize();
        let expect: Vec<Vec<i64>> = vec![vec![1, 3], vec![1, 4], vec![2, 3], vec![2, 4]];
        assert_eq!(
            expect,
            elems
                .iter()
                .map(|e| e.iter().copied().collect::<Vec<i64>>())
                .collect::<Vec<_>>()
        );
        assert_eq!(vec![2, 2], slice.selected_shape());
    }

    #[test]
    fn scalar_footprint_is_single_empty_tuple() {
        let elems = VarId::scalar("a").scalarize();
        assert_eq!(1, elems.len());
        assert!(elems[0].is_empty());
    }

    #[test]
    fn empty_range_footprint() {
        let slice = VarId::new("x", smallvec![IndexEntry::Range(3, 2)]);
        assert!(slice.scalarize().is_empty());
    }
}
