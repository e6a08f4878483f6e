// Copyright 2025 The Bugs Engine Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! The variable collector unrolls loops and enumerates every LHS variable,
//! inferring non-data array shapes along the way.  Because loop bounds and
//! indices may themselves be defined by other statements, collection is a
//! fixpoint: statements whose bounds or subscripts cannot yet be resolved
//! are deferred and retried after further rounds of partial evaluation have
//! determined more of the environment.

use std::collections::HashSet;

use log::{debug, trace};
use smallvec::SmallVec;

use crate::ast::{collect_idents, substitute, Expr};
use crate::builtins::FunctionRegistry;
use crate::checker::AssignChecker;
use crate::common::{Error, ErrorCode, Ident, Result};
use crate::comp_err;
use crate::env::Env;
use crate::eval::{eval, Partial};
use crate::normalize::{Assign, AssignKind, LinkFn, NStmt};
use crate::transform::{apply_assign, Outcome};
use crate::variable::{IndexEntry, Subscript, VarId};

/// One fully unrolled assignment instance: loop variables substituted, the
/// LHS resolved to a concrete variable identity.
#[derive(Clone, Debug, PartialEq)]
pub struct FlatStmt {
    pub kind: AssignKind,
    pub link: Option<LinkFn>,
    pub var: VarId,
    pub rhs: Expr,
}

impl std::fmt::Display for FlatStmt {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let op = match self.kind {
            AssignKind::Logical => "=",
            AssignKind::Stochastic => "~",
        };
        match self.link {
            Some(link) => write!(f, "{}({}) {} {}", link.name(), self.var, op, self.rhs),
            None => write!(f, "{} {} {}", self.var, op, self.rhs),
        }
    }
}

pub struct Collection {
    pub stmts: Vec<FlatStmt>,
    /// every enumerated variable, in statement discovery order
    pub vars: Vec<VarId>,
    /// indices of logical statements whose LHS touches observed data cells;
    /// the transformation pass must verify them value-for-value
    pub deferred_data: Vec<usize>,
    pub checker: AssignChecker,
}

type Bindings = Vec<(Ident, i64)>;

struct Collector<'a> {
    env: &'a mut Env,
    reg: &'a FunctionRegistry,
    stmts: Vec<FlatStmt>,
    vars: Vec<VarId>,
    var_set: HashSet<VarId>,
    deferred_data: Vec<usize>,
    checker: AssignChecker,
    changed: bool,
}

pub fn collect(
    program: &[NStmt],
    env: &mut Env,
    reg: &FunctionRegistry,
) -> Result<Collection> {
    prescan(program, env)?;

    let mut ctx = Collector {
        env,
        reg,
        stmts: Vec::new(),
        vars: Vec::new(),
        var_set: HashSet::new(),
        deferred_data: Vec::new(),
        checker: AssignChecker::new(),
        changed: false,
    };

    let mut pending: Vec<(NStmt, Bindings)> = program
        .iter()
        .map(|stmt| (stmt.clone(), Bindings::new()))
        .collect();

    let mut round = 0usize;
    loop {
        round += 1;
        ctx.changed = false;

        // emitted logical statements drive partial evaluation forward so
        // that later rounds can resolve bounds reading their values
        ctx.propagate()?;

        let mut next_pending: Vec<(NStmt, Bindings)> = Vec::new();
        for (stmt, bindings) in pending {
            ctx.walk(&stmt, &bindings, &mut next_pending)?;
        }
        debug!(
            "collection round {}: {} statements, {} deferred",
            round,
            ctx.stmts.len(),
            next_pending.len()
        );

        if next_pending.is_empty() {
            break;
        }
        if !ctx.changed {
            return Err(stuck_error(&next_pending[0].0));
        }
        pending = next_pending;
    }

    // shapes are final: every collected non-data variable now has its
    // undetermined cell, and the environment stops growing
    for var in &ctx.vars {
        if !ctx.env.is_data(&var.name) && var.is_scalar() {
            ctx.env.declare_scalar(&var.name)?;
        }
    }
    ctx.env.freeze();

    Ok(Collection {
        stmts: ctx.stmts,
        vars: ctx.vars,
        deferred_data: ctx.deferred_data,
        checker: ctx.checker,
    })
}

fn stuck_error(stmt: &NStmt) -> Error {
    match stmt {
        NStmt::For { var, lo, hi, .. } => Error::new(
            ErrorCode::UnresolvableLoopBound,
            Some(format!("for ({} in {}:{})", var, lo, hi)),
        ),
        NStmt::If { cond, .. } => Error::new(
            ErrorCode::UnsupportedExpression,
            Some(format!("if ({})", cond)),
        ),
        NStmt::Assign(a) => Error::new(ErrorCode::UnresolvableIndex, Some(a.to_string())),
    }
}

impl Collector<'_> {
    /// propagate runs one data-transformation sweep over the statements
    /// collected so far, so their values become available to loop bounds.
    fn propagate(&mut self) -> Result<()> {
        for i in 0..self.stmts.len() {
            if self.stmts[i].kind != AssignKind::Logical {
                continue;
            }
            let stmt = self.stmts[i].clone();
            if let Outcome::Wrote = apply_assign(&stmt, self.env, self.reg)? {
                trace!("propagated {}", stmt.var);
                self.changed = true;
            }
        }
        Ok(())
    }

    fn walk(
        &mut self,
        stmt: &NStmt,
        bindings: &Bindings,
        pending: &mut Vec<(NStmt, Bindings)>,
    ) -> Result<()> {
        match stmt {
            NStmt::Assign(assign) => self.visit_assign(stmt, assign, bindings, pending),
            NStmt::For {
                var,
                lo,
                hi,
                body,
            } => {
                let lo_p = self.eval_bound(lo, bindings, stmt)?;
                let hi_p = self.eval_bound(hi, bindings, stmt)?;
                let (lo, hi) = match (lo_p, hi_p) {
                    (Some(lo), Some(hi)) => (lo, hi),
                    _ => {
                        pending.push((stmt.clone(), bindings.clone()));
                        return Ok(());
                    }
                };
                self.changed = true;
                // an empty range unrolls to nothing
                for value in lo..=hi {
                    let mut inner = bindings.clone();
                    inner.push((var.clone(), value));
                    for body_stmt in body {
                        self.walk(body_stmt, &inner, pending)?;
                    }
                }
                Ok(())
            }
            NStmt::If { cond, body } => {
                let cond_expr = substitute(cond, bindings);
                match eval(&cond_expr, self.env, self.reg)? {
                    Partial::Const(s) => {
                        self.changed = true;
                        if s.is_true() {
                            for body_stmt in body {
                                self.walk(body_stmt, bindings, pending)?;
                            }
                        }
                        Ok(())
                    }
                    Partial::Array(_) | Partial::Range(_, _) | Partial::Colon => {
                        comp_err!(UnsupportedExpression, cond_expr)
                    }
                    Partial::Expr(_) => {
                        pending.push((stmt.clone(), bindings.clone()));
                        Ok(())
                    }
                }
            }
        }
    }

    fn eval_bound(
        &mut self,
        bound: &Expr,
        bindings: &Bindings,
        stmt: &NStmt,
    ) -> Result<Option<i64>> {
        let expr = substitute(bound, bindings);
        let p = eval(&expr, self.env, self.reg)?;
        match p.try_index() {
            Ok(v) => Ok(v),
            // a bound that resolved to a non-integral value will never
            // become an integer, no matter how many rounds run
            Err(_) => Err(stuck_error(stmt)),
        }
    }

    fn visit_assign(
        &mut self,
        stmt: &NStmt,
        assign: &Assign,
        bindings: &Bindings,
        pending: &mut Vec<(NStmt, Bindings)>,
    ) -> Result<()> {
        let mut entries: Subscript = SmallVec::new();
        for (axis, idx) in assign.indices.iter().enumerate() {
            let idx = substitute(idx, bindings);
            match eval(&idx, self.env, self.reg)? {
                Partial::Const(s) => entries.push(IndexEntry::Int(s.as_index()?)),
                Partial::Range(lo, hi) => entries.push(IndexEntry::Range(lo, hi)),
                Partial::Colon => {
                    // a bare `:` on the LHS only makes sense against an
                    // already-shaped (data) array
                    match self.env.array(&assign.name) {
                        Some(a) if axis < a.shape.len() && a.shape[axis] > 0 => {
                            entries.push(IndexEntry::Range(1, a.shape[axis] as i64));
                        }
                        _ => {
                            pending.push((stmt.clone(), bindings.clone()));
                            return Ok(());
                        }
                    }
                }
                Partial::Array(_) => {
                    return comp_err!(UnsupportedExpression, idx);
                }
                Partial::Expr(_) => {
                    pending.push((stmt.clone(), bindings.clone()));
                    return Ok(());
                }
            }
        }

        for entry in &entries {
            let lo = match entry {
                IndexEntry::Int(i) => *i,
                IndexEntry::Range(lo, _) => *lo,
            };
            if lo < 1 {
                return comp_err!(
                    UnresolvableIndex,
                    format!("{}: indices are 1-based", assign)
                );
            }
        }

        let var = VarId::new(&assign.name, entries);
        let footprint = var.scalarize();
        if footprint.is_empty() {
            // an empty slice assigns nothing
            self.changed = true;
            return Ok(());
        }

        let is_data = self.env.is_data(&var.name);
        if var.is_scalar() {
            if !is_data {
                self.env.declare_scalar(&var.name)?;
            } else if self.env.scalar(&var.name).is_none() && self.env.array(&var.name).is_some()
            {
                return comp_err!(
                    ShapeMismatch,
                    format!("{} used both as a scalar and as an array", var.name)
                );
            }
        } else {
            self.env.ensure_array(&var.name, var.indices.len())?;
            if !is_data {
                let min_shape: Vec<usize> = var
                    .indices
                    .iter()
                    .map(|e| e.last().max(0) as usize)
                    .collect();
                self.env.grow_array(&var.name, &min_shape);
            } else {
                // writes to data arrays must land inside the given shape
                let a = self.env.array(&var.name).unwrap();
                for idx in &footprint {
                    if a.offset(idx).is_none() {
                        return comp_err!(
                            ShapeMismatch,
                            format!(
                                "{} writes outside the data shape {:?}",
                                assign, a.shape
                            )
                        );
                    }
                }
            }
        }

        match assign.kind {
            AssignKind::Stochastic if var.is_slice() && is_data => {
                // a multivariate observation must be entirely observed or
                // entirely missing
                let observed = footprint
                    .iter()
                    .filter(|idx| self.env.is_data_cell(&var.name, idx))
                    .count();
                if observed != 0 && observed != footprint.len() {
                    return comp_err!(PartialObservation, assign);
                }
            }
            AssignKind::Logical => {
                let touches_data = footprint
                    .iter()
                    .any(|idx| self.env.is_data_cell(&var.name, idx));
                if touches_data {
                    self.deferred_data.push(self.stmts.len());
                }
            }
            _ => {}
        }

        self.checker.record(assign.kind, &var)?;
        if !self.var_set.contains(&var) {
            self.var_set.insert(var.clone());
            self.vars.push(var.clone());
        }

        let flat = FlatStmt {
            kind: assign.kind,
            link: assign.link,
            var,
            rhs: substitute(&assign.rhs, bindings),
        };
        trace!("collected {}", flat.var);
        if flat.kind == AssignKind::Logical {
            // eagerly propagate so sibling statements in this same round
            // can already read the value
            apply_assign(&flat, self.env, self.reg)?;
        }
        self.stmts.push(flat);
        self.changed = true;
        Ok(())
    }
}

/// prescan rejects models whose shapes depend on stochastic quantities: any
/// identifier inside a loop bound or an LHS subscript must be a loop
/// variable, data, or a logically-assigned (transformable) variable.
fn prescan(program: &[NStmt], env: &Env) -> Result<()> {
    let mut logical: HashSet<Ident> = HashSet::new();
    let mut stochastic: HashSet<Ident> = HashSet::new();
    gather_assigned(program, &mut logical, &mut stochastic);

    let mut scope: Vec<Ident> = Vec::new();
    check_shape_idents(program, env, &logical, &stochastic, &mut scope)
}

fn gather_assigned(
    stmts: &[NStmt],
    logical: &mut HashSet<Ident>,
    stochastic: &mut HashSet<Ident>,
) {
    for stmt in stmts {
        match stmt {
            NStmt::Assign(a) => {
                match a.kind {
                    AssignKind::Logical => logical.insert(a.name.clone()),
                    AssignKind::Stochastic => stochastic.insert(a.name.clone()),
                };
            }
            NStmt::For { body, .. } | NStmt::If { body, .. } => {
                gather_assigned(body, logical, stochastic)
            }
        }
    }
}

fn check_shape_idents(
    stmts: &[NStmt],
    env: &Env,
    logical: &HashSet<Ident>,
    stochastic: &HashSet<Ident>,
    scope: &mut Vec<Ident>,
) -> Result<()> {
    let validate = |expr: &Expr, scope: &[Ident], code: ErrorCode| -> Result<()> {
        let mut idents = HashSet::new();
        collect_idents(expr, &mut idents);
        for id in idents {
            if scope.contains(&id) || env.is_data(&id) || logical.contains(&id) {
                continue;
            }
            if stochastic.contains(&id) {
                return Err(Error::new(
                    code,
                    Some(format!("{} depends on stochastic {}", expr, id)),
                ));
            }
            return comp_err!(UndefinedVariable, id);
        }
        Ok(())
    };

    for stmt in stmts {
        match stmt {
            NStmt::Assign(a) => {
                for idx in &a.indices {
                    validate(idx, scope, ErrorCode::UnresolvableIndex)?;
                }
            }
            NStmt::For {
                var,
                lo,
                hi,
                body,
            } => {
                validate(lo, scope, ErrorCode::UnresolvableLoopBound)?;
                validate(hi, scope, ErrorCode::UnresolvableLoopBound)?;
                scope.push(var.clone());
                check_shape_idents(body, env, logical, stochastic, scope)?;
                scope.pop();
            }
            NStmt::If { body, .. } => {
                check_shape_idents(body, env, logical, stochastic, scope)?;
            }
        }
    }
    Ok(())
}
