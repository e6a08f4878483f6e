// Copyright 2025 The Bugs Engine Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! The repeated-assignment checker tracks, per array cell (and per scalar),
//! which statements wrote deterministically and which stochastically.  Two
//! writes of the same kind to one cell are always fatal; a cross-kind
//! overlap survives only if the data-transformation pass fully determines
//! the logical side.

use std::collections::{HashMap, HashSet};

use crate::common::{Ident, Result};
use crate::comp_err;
use crate::env::Env;
use crate::normalize::AssignKind;
use crate::variable::{ElemIndex, VarId};

#[derive(Default, Debug)]
pub struct AssignChecker {
    logical: HashMap<Ident, HashSet<ElemIndex>>,
    stochastic: HashMap<Ident, HashSet<ElemIndex>>,
    // cross-kind overlaps, resolved after the transformation fixpoint
    overlaps: Vec<(Ident, ElemIndex)>,
}

impl AssignChecker {
    pub fn new() -> Self {
        Self::default()
    }

    /// record marks the footprint of one assignment and rejects same-kind
    /// double writes immediately.
    pub fn record(&mut self, kind: AssignKind, var: &VarId) -> Result<()> {
        let elems = var.scalarize();

        {
            let own = match kind {
                AssignKind::Logical => &self.logical,
                AssignKind::Stochastic => &self.stochastic,
            };
            if let Some(mask) = own.get(&var.name) {
                if elems.iter().any(|idx| mask.contains(idx)) {
                    return comp_err!(RepeatedAssignment, var);
                }
            }
        }

        {
            let other = match kind {
                AssignKind::Logical => &self.stochastic,
                AssignKind::Stochastic => &self.logical,
            };
            if let Some(mask) = other.get(&var.name) {
                for idx in elems.iter().filter(|idx| mask.contains(*idx)) {
                    self.overlaps.push((var.name.clone(), idx.clone()));
                }
            }
        }

        let own = match kind {
            AssignKind::Logical => &mut self.logical,
            AssignKind::Stochastic => &mut self.stochastic,
        };
        own.entry(var.name.clone()).or_default().extend(elems);
        Ok(())
    }

    /// has_overlap reports whether any cell of the variable is written both
    /// logically and stochastically.
    pub fn has_overlap(&self, var: &VarId) -> bool {
        match (
            self.logical.get(&var.name),
            self.stochastic.get(&var.name),
        ) {
            (Some(logical), Some(stochastic)) => var
                .scalarize()
                .iter()
                .any(|idx| logical.contains(idx) && stochastic.contains(idx)),
            _ => false,
        }
    }

    /// finalize re-checks every cross-kind overlap once the transformation
    /// pass has settled: the logical side must be fully data-resolved.
    pub fn finalize(&self, env: &Env) -> Result<()> {
        for (name, idx) in &self.overlaps {
            let var = VarId::element(name, idx);
            if !env.var_determined(&var) {
                return comp_err!(LogicalStochasticConflict, var);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ErrorCode;
    use smallvec::smallvec;

    use crate::variable::IndexEntry;

    #[test]
    fn same_kind_overlap_is_fatal() {
        let mut checker = AssignChecker::new();
        checker
            .record(AssignKind::Logical, &VarId::element("x", &[1]))
            .unwrap();
        let err = checker
            .record(AssignKind::Logical, &VarId::element("x", &[1]))
            .unwrap_err();
        assert_eq!(ErrorCode::RepeatedAssignment, err.code);
    }

    #[test]
    fn slices_overlap_elementwise() {
        let mut checker = AssignChecker::new();
        checker
            .record(
                AssignKind::Stochastic,
                &VarId::new("x", smallvec![IndexEntry::Range(1, 3)]),
            )
            .unwrap();
        let err = checker
            .record(AssignKind::Stochastic, &VarId::element("x", &[2]))
            .unwrap_err();
        assert_eq!(ErrorCode::RepeatedAssignment, err.code);
    }

    #[test]
    fn distinct_cells_are_fine() {
        let mut checker = AssignChecker::new();
        checker
            .record(AssignKind::Logical, &VarId::element("x", &[1]))
            .unwrap();
        checker
            .record(AssignKind::Logical, &VarId::element("x", &[2]))
            .unwrap();
        checker
            .record(AssignKind::Logical, &VarId::scalar("a"))
            .unwrap();
        checker
            .record(AssignKind::Stochastic, &VarId::scalar("b"))
            .unwrap();
    }

    #[test]
    fn cross_kind_overlap_defers_to_finalize() {
        let mut checker = AssignChecker::new();
        checker
            .record(AssignKind::Stochastic, &VarId::scalar("x"))
            .unwrap();
        checker
            .record(AssignKind::Logical, &VarId::scalar("x"))
            .unwrap();
        assert!(checker.has_overlap(&VarId::scalar("x")));

        // x never becomes determined, so finalize rejects the model
        let env = Env::default();
        let err = checker.finalize(&env).unwrap_err();
        assert_eq!(ErrorCode::LogicalStochasticConflict, err.code);
    }
}
