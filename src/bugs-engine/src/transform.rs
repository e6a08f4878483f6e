// Copyright 2025 The Bugs Engine Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! The data-transformation pass: a monotone fixpoint that computes every
//! logical variable whose RHS becomes fully data-resolved, promoting it to
//! pseudo-data.  Because the pass iterates to fixpoint, source statement
//! order has no effect on the final environment.

use log::debug;

use crate::builtins::FunctionRegistry;
use crate::collector::FlatStmt;
use crate::common::Result;
use crate::comp_err;
use crate::env::Env;
use crate::eval::eval;
use crate::normalize::AssignKind;
use crate::value::{Scalar, Value};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Outcome {
    /// the RHS resolved and the value landed in the environment
    Wrote,
    /// the RHS still reads undetermined cells
    Pending,
    /// every target cell already holds the right value
    AlreadyDetermined,
}

fn scalars_equal(a: Scalar, b: Scalar) -> bool {
    a.as_f64() == b.as_f64()
}

/// write_cell stores one scalar, enforcing the overwrite rule for observed
/// data cells: a logical assignment may restate a data value exactly, and
/// anything else is fatal.
fn write_cell(stmt: &FlatStmt, env: &mut Env, indices: &[i64], value: Scalar) -> Result<bool> {
    let name = &stmt.var.name;
    if env.is_data_cell(name, indices) {
        let existing = if indices.is_empty() {
            env.scalar(name)
        } else {
            env.array(name).and_then(|a| a.cell(indices).flatten())
        };
        return match existing {
            Some(existing) if scalars_equal(existing, value) => Ok(false),
            _ => comp_err!(OverwriteData, stmt),
        };
    }
    // the repeated-assignment checker guarantees a single writer, so a
    // determined non-data cell means this statement already ran
    if indices.is_empty() {
        if env.scalar(name).is_some() {
            return Ok(false);
        }
        env.write_scalar(name, value);
        Ok(true)
    } else {
        if env
            .array(name)
            .and_then(|a| a.cell(indices).flatten())
            .is_some()
        {
            return Ok(false);
        }
        env.write_element(name, indices, value)?;
        Ok(true)
    }
}

/// apply_assign attempts one logical statement: if the LHS footprint is not
/// yet fully determined and the RHS evaluates to a resolved value, the
/// value is written (element or broadcast).  Statements whose LHS lies in
/// observed data are verified for equality instead.
pub(crate) fn apply_assign(
    stmt: &FlatStmt,
    env: &mut Env,
    reg: &FunctionRegistry,
) -> Result<Outcome> {
    debug_assert_eq!(AssignKind::Logical, stmt.kind);

    let footprint = stmt.var.scalarize();
    let touches_data = footprint
        .iter()
        .any(|idx| env.is_data_cell(&stmt.var.name, idx));
    if env.var_determined(&stmt.var) && !touches_data {
        return Ok(Outcome::AlreadyDetermined);
    }

    let p = eval(&stmt.rhs, env, reg)?;
    let value = match p.as_value() {
        Some(v) => v,
        None => return Ok(Outcome::Pending),
    };

    let mut wrote = false;
    if stmt.var.is_slice() {
        let arr = match &value {
            Value::Array(a) if a.shape == stmt.var.selected_shape() => a,
            Value::Array(a) => {
                return comp_err!(
                    ShapeMismatch,
                    format!(
                        "{}: expected shape {:?}, got {:?}",
                        stmt.var,
                        stmt.var.selected_shape(),
                        a.shape
                    )
                )
            }
            Value::Scalar(_) => {
                return comp_err!(
                    ShapeMismatch,
                    format!("{}: scalar assigned to a slice", stmt.var)
                )
            }
        };
        for (idx, cell) in footprint.iter().zip(arr.cells.iter()) {
            wrote |= write_cell(stmt, env, idx, *cell)?;
        }
    } else {
        let scalar = match &value {
            Value::Scalar(s) => *s,
            Value::Array(_) => {
                return comp_err!(
                    ShapeMismatch,
                    format!("{}: array assigned to a single cell", stmt.var)
                )
            }
        };
        let idx = stmt.var.element_index().unwrap();
        wrote |= write_cell(stmt, env, &idx, scalar)?;
    }

    Ok(if wrote {
        Outcome::Wrote
    } else {
        Outcome::AlreadyDetermined
    })
}

/// run iterates all logical statements to fixpoint, then enforces the
/// deferred overwrite rule: every statement whose LHS touches observed data
/// must have been verified against the provided values.
pub(crate) fn run(
    stmts: &[FlatStmt],
    env: &mut Env,
    reg: &FunctionRegistry,
    deferred_data: &[usize],
) -> Result<()> {
    let logical: Vec<usize> = stmts
        .iter()
        .enumerate()
        .filter(|(_, s)| s.kind == AssignKind::Logical)
        .map(|(i, _)| i)
        .collect();

    let mut settled = vec![false; stmts.len()];
    let mut rounds = 0usize;
    loop {
        rounds += 1;
        let mut changed = false;
        for &i in &logical {
            if settled[i] {
                continue;
            }
            match apply_assign(&stmts[i], env, reg)? {
                Outcome::Wrote => {
                    settled[i] = true;
                    changed = true;
                }
                Outcome::AlreadyDetermined => {
                    settled[i] = true;
                }
                Outcome::Pending => {}
            }
        }
        if !changed {
            break;
        }
    }
    debug!("data transformation settled after {} rounds", rounds);

    for &i in deferred_data {
        if !settled[i] {
            return comp_err!(OverwriteData, stmts[i]);
        }
    }
    Ok(())
}
