// Copyright 2025 The Bugs Engine Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! AST normalization: link functions, `cumulative`/`density` references and
//! truncation/censoring suffixes are rewritten into canonical call forms so
//! every later pass sees one shape of statement.

use std::collections::HashMap;

use crate::ast::{Expr, Lhs, Stmt, TruncBounds};
use crate::common::{canonicalize, Ident, Result};
use crate::comp_err;

/// The fixed link-function table.  Applying a link to an LHS rewrites the
/// RHS with the link's inverse.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LinkFn {
    Logit,
    Log,
    Cloglog,
    Probit,
}

impl LinkFn {
    pub fn from_name(name: &str) -> Option<LinkFn> {
        match name {
            "logit" => Some(LinkFn::Logit),
            "log" => Some(LinkFn::Log),
            "cloglog" => Some(LinkFn::Cloglog),
            "probit" => Some(LinkFn::Probit),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            LinkFn::Logit => "logit",
            LinkFn::Log => "log",
            LinkFn::Cloglog => "cloglog",
            LinkFn::Probit => "probit",
        }
    }

    pub fn inverse(&self) -> &'static str {
        match self {
            LinkFn::Logit => "logistic",
            LinkFn::Log => "exp",
            LinkFn::Cloglog => "cexpexp",
            LinkFn::Probit => "phi",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AssignKind {
    Logical,
    Stochastic,
}

/// A canonicalized assignment: the LHS reduced to a name plus index
/// expressions, links lifted into either the RHS (logical) or the `link`
/// tag (stochastic), bounds lowered into `truncated*`/`censored*` calls.
#[derive(Clone, Debug, PartialEq)]
pub struct Assign {
    pub kind: AssignKind,
    pub link: Option<LinkFn>,
    pub name: Ident,
    pub indices: Vec<Expr>,
    pub rhs: Expr,
}

impl std::fmt::Display for Assign {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        if let Some(link) = self.link {
            write!(f, "{}(", link.name())?;
        }
        write!(f, "{}", self.name)?;
        if !self.indices.is_empty() {
            write!(f, "[")?;
            for (i, e) in self.indices.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", e)?;
            }
            write!(f, "]")?;
        }
        if self.link.is_some() {
            write!(f, ")")?;
        }
        let op = match self.kind {
            AssignKind::Logical => "=",
            AssignKind::Stochastic => "~",
        };
        write!(f, " {} {}", op, self.rhs)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum NStmt {
    Assign(Assign),
    For {
        var: Ident,
        lo: Expr,
        hi: Expr,
        body: Vec<NStmt>,
    },
    If {
        cond: Expr,
        body: Vec<NStmt>,
    },
}

/// The RHS distributions of stochastic statements, keyed by LHS name, used
/// to resolve `cumulative`/`density` references.
type DistTable = HashMap<Ident, Vec<(Vec<Expr>, Expr)>>;

fn lower_bounds(rhs: Expr, bounds: &Option<TruncBounds>) -> Expr {
    let bounds = match bounds {
        Some(b) => b,
        None => return rhs,
    };
    let base = if bounds.censored { "censored" } else { "truncated" };
    match (&bounds.lower, &bounds.upper) {
        (Some(lo), Some(hi)) => Expr::Call(
            base.to_owned(),
            vec![rhs, lo.clone(), hi.clone()],
        ),
        (Some(lo), None) => Expr::Call(format!("{}_lower", base), vec![rhs, lo.clone()]),
        (None, Some(hi)) => Expr::Call(format!("{}_upper", base), vec![rhs, hi.clone()]),
        (None, None) => rhs,
    }
}

fn unwrap_lhs(lhs: &Lhs) -> Result<(Option<LinkFn>, Ident, Vec<Expr>)> {
    match lhs {
        Lhs::Var(name) => Ok((None, canonicalize(name)?, vec![])),
        Lhs::Ref(name, indices) => Ok((None, canonicalize(name)?, indices.clone())),
        Lhs::Link(func, inner) => {
            let link = match LinkFn::from_name(func) {
                Some(link) => link,
                None => return comp_err!(UndefinedLinkFunction, lhs),
            };
            match inner.as_ref() {
                Lhs::Link(_, _) => comp_err!(UnsupportedExpression, lhs),
                Lhs::Var(name) => Ok((Some(link), canonicalize(name)?, vec![])),
                Lhs::Ref(name, indices) => {
                    Ok((Some(link), canonicalize(name)?, indices.clone()))
                }
            }
        }
    }
}

fn collect_dists(stmts: &[Stmt], table: &mut DistTable) -> Result<()> {
    for stmt in stmts {
        match stmt {
            Stmt::Stochastic { lhs, rhs, bounds } => {
                let (_, name, indices) = unwrap_lhs(lhs)?;
                let rhs = lower_bounds(rhs.clone(), bounds);
                table.entry(name).or_default().push((indices, rhs));
            }
            Stmt::For { body, .. } | Stmt::If { body, .. } => collect_dists(body, table)?,
            Stmt::Logical { .. } => {}
        }
    }
    Ok(())
}

/// substitute_exprs replaces bare identifier references by expressions,
/// used to re-index a looped stochastic RHS at a `cumulative` target.
fn substitute_exprs(expr: &Expr, bindings: &HashMap<Ident, Expr>) -> Expr {
    match expr {
        Expr::Int(_) | Expr::Real(_) | Expr::Colon | Expr::ConstArray(_) => expr.clone(),
        Expr::Var(id) => match bindings.get(id) {
            Some(e) => e.clone(),
            None => expr.clone(),
        },
        Expr::Ref(id, indices) => Expr::Ref(
            id.clone(),
            indices
                .iter()
                .map(|e| substitute_exprs(e, bindings))
                .collect(),
        ),
        Expr::Call(func, args) => Expr::Call(
            func.clone(),
            args.iter().map(|e| substitute_exprs(e, bindings)).collect(),
        ),
        Expr::Range(lo, hi) => Expr::Range(
            Box::new(substitute_exprs(lo, bindings)),
            Box::new(substitute_exprs(hi, bindings)),
        ),
    }
}

/// resolve_dist_ref finds the distribution of `v` for `cumulative(v, y)` /
/// `density(v, y)` and re-indexes it at the target's subscripts.
fn resolve_dist_ref(target: &Expr, table: &DistTable) -> Result<Expr> {
    let (name, tgt_indices): (&str, &[Expr]) = match target {
        Expr::Var(name) => (name, &[]),
        Expr::Ref(name, indices) => (name, indices),
        _ => return comp_err!(UnsupportedExpression, target),
    };
    let entries = match table.get(name) {
        Some(entries) => entries,
        None => return comp_err!(UndefinedDistribution, target),
    };
    if entries.len() > 1 {
        return comp_err!(MultipleDistributionsFor, name);
    }
    let (pattern, dist_rhs) = &entries[0];
    if pattern.len() != tgt_indices.len() {
        return comp_err!(UnsupportedExpression, target);
    }
    let mut bindings = HashMap::new();
    for (pat, tgt) in pattern.iter().zip(tgt_indices.iter()) {
        match pat {
            Expr::Var(loop_var) => {
                bindings.insert(loop_var.clone(), tgt.clone());
            }
            _ if pat == tgt => {}
            _ => return comp_err!(UnsupportedExpression, target),
        }
    }
    Ok(substitute_exprs(dist_rhs, &bindings))
}

/// rewrite_dist_refs lowers `cumulative(v, y)` to `cdf(D_v, y)` and
/// `density(v, y)` to `pdf(D_v, y)` anywhere in an expression.
fn rewrite_dist_refs(expr: &Expr, table: &DistTable) -> Result<Expr> {
    let out = match expr {
        Expr::Int(_) | Expr::Real(_) | Expr::Var(_) | Expr::Colon | Expr::ConstArray(_) => {
            expr.clone()
        }
        Expr::Ref(id, indices) => {
            let indices: Result<Vec<Expr>> = indices
                .iter()
                .map(|e| rewrite_dist_refs(e, table))
                .collect();
            Expr::Ref(id.clone(), indices?)
        }
        Expr::Call(func, args) if func == "cumulative" || func == "density" => {
            if args.len() != 2 {
                return comp_err!(BadFunctionArgs, expr);
            }
            let dist = resolve_dist_ref(&args[0], table)?;
            let y = rewrite_dist_refs(&args[1], table)?;
            let prim = if func == "cumulative" { "cdf" } else { "pdf" };
            Expr::Call(prim.to_owned(), vec![dist, y])
        }
        Expr::Call(func, args) => {
            let args: Result<Vec<Expr>> =
                args.iter().map(|e| rewrite_dist_refs(e, table)).collect();
            Expr::Call(func.clone(), args?)
        }
        Expr::Range(lo, hi) => Expr::Range(
            Box::new(rewrite_dist_refs(lo, table)?),
            Box::new(rewrite_dist_refs(hi, table)?),
        ),
    };
    Ok(out)
}

fn norm_stmts(stmts: &[Stmt], table: &DistTable) -> Result<Vec<NStmt>> {
    let mut out = Vec::with_capacity(stmts.len());
    for stmt in stmts {
        let n = match stmt {
            Stmt::Logical { lhs, rhs } => {
                let (link, name, indices) = unwrap_lhs(lhs)?;
                let mut rhs = rewrite_dist_refs(rhs, table)?;
                if let Some(link) = link {
                    rhs = Expr::Call(link.inverse().to_owned(), vec![rhs]);
                }
                NStmt::Assign(Assign {
                    kind: AssignKind::Logical,
                    link: None,
                    name,
                    indices,
                    rhs,
                })
            }
            Stmt::Stochastic { lhs, rhs, bounds } => {
                let (link, name, indices) = unwrap_lhs(lhs)?;
                let rhs = rewrite_dist_refs(rhs, table)?;
                let rhs = lower_bounds(rhs, bounds);
                NStmt::Assign(Assign {
                    kind: AssignKind::Stochastic,
                    link,
                    name,
                    indices,
                    rhs,
                })
            }
            Stmt::For { var, lo, hi, body } => NStmt::For {
                var: canonicalize(var)?,
                lo: lo.clone(),
                hi: hi.clone(),
                body: norm_stmts(body, table)?,
            },
            Stmt::If { cond, body } => NStmt::If {
                cond: cond.clone(),
                body: norm_stmts(body, table)?,
            },
        };
        out.push(n);
    }
    Ok(out)
}

/// normalize rewrites a parsed program into canonical form.  Applying it to
/// an already-canonical program is a no-op.
pub fn normalize(program: &[Stmt]) -> Result<Vec<NStmt>> {
    let mut table = DistTable::new();
    collect_dists(program, &mut table)?;
    norm_stmts(program, &table)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str) -> Expr {
        Expr::Var(name.to_owned())
    }

    fn call(func: &str, args: Vec<Expr>) -> Expr {
        Expr::Call(func.to_owned(), args)
    }

    /// to_surface maps a normalized statement back to surface form; the
    /// canonical forms print/parse identically, which backs the
    /// normalize-twice-is-identity tests.
    fn to_surface(stmt: &NStmt) -> Stmt {
        match stmt {
            NStmt::Assign(a) => {
                let lhs = if a.indices.is_empty() {
                    Lhs::Var(a.name.clone())
                } else {
                    Lhs::Ref(a.name.clone(), a.indices.clone())
                };
                let lhs = match a.link {
                    Some(link) => Lhs::Link(link.name().to_owned(), Box::new(lhs)),
                    None => lhs,
                };
                match a.kind {
                    AssignKind::Logical => Stmt::Logical {
                        lhs,
                        rhs: a.rhs.clone(),
                    },
                    AssignKind::Stochastic => Stmt::Stochastic {
                        lhs,
                        rhs: a.rhs.clone(),
                        bounds: None,
                    },
                }
            }
            NStmt::For { var, lo, hi, body } => Stmt::For {
                var: var.clone(),
                lo: lo.clone(),
                hi: hi.clone(),
                body: body.iter().map(to_surface).collect(),
            },
            NStmt::If { cond, body } => Stmt::If {
                cond: cond.clone(),
                body: body.iter().map(to_surface).collect(),
            },
        }
    }

    #[test]
    fn link_function_lowering() {
        // logit(p) = r  =>  p = logistic(r)
        let program = vec![Stmt::Logical {
            lhs: Lhs::Link("logit".to_owned(), Box::new(Lhs::Var("p".to_owned()))),
            rhs: var("r"),
        }];
        let normed = normalize(&program).unwrap();
        match &normed[0] {
            NStmt::Assign(a) => {
                assert_eq!("p", a.name);
                assert_eq!(None, a.link);
                assert_eq!(call("logistic", vec![var("r")]), a.rhs);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn stochastic_link_keeps_tag() {
        let program = vec![Stmt::Stochastic {
            lhs: Lhs::Link("probit".to_owned(), Box::new(Lhs::Var("p".to_owned()))),
            rhs: call("dnorm", vec![Expr::Int(0), Expr::Int(1)]),
            bounds: None,
        }];
        let normed = normalize(&program).unwrap();
        match &normed[0] {
            NStmt::Assign(a) => {
                assert_eq!(Some(LinkFn::Probit), a.link);
                assert_eq!("p", a.name);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn unknown_link_is_fatal() {
        let program = vec![Stmt::Logical {
            lhs: Lhs::Link("sinh".to_owned(), Box::new(Lhs::Var("p".to_owned()))),
            rhs: var("r"),
        }];
        let err = normalize(&program).unwrap_err();
        assert_eq!(crate::common::ErrorCode::UndefinedLinkFunction, err.code);
    }

    #[test]
    fn truncation_lowering() {
        let dist = call("dnorm", vec![var("mu"), var("tau")]);
        let program = vec![Stmt::Stochastic {
            lhs: Lhs::Var("y".to_owned()),
            rhs: dist.clone(),
            bounds: Some(TruncBounds {
                censored: false,
                lower: Some(Expr::Int(0)),
                upper: None,
            }),
        }];
        let normed = normalize(&program).unwrap();
        match &normed[0] {
            NStmt::Assign(a) => {
                assert_eq!(
                    call("truncated_lower", vec![dist.clone(), Expr::Int(0)]),
                    a.rhs
                );
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn cumulative_rewrites_to_cdf_of_the_unique_distribution() {
        let program = vec![
            Stmt::Stochastic {
                lhs: Lhs::Ref("x".to_owned(), vec![var("i")]),
                rhs: call("dnorm", vec![Expr::Ref("mu".to_owned(), vec![var("i")]), var("tau")]),
                bounds: None,
            },
            Stmt::Logical {
                lhs: Lhs::Var("c".to_owned()),
                rhs: call("cumulative", vec![Expr::Ref("x".to_owned(), vec![Expr::Int(3)]), var("y")]),
            },
        ];
        let normed = normalize(&program).unwrap();
        match &normed[1] {
            NStmt::Assign(a) => {
                // the loop index i re-binds to the target's subscript 3
                assert_eq!(
                    call(
                        "cdf",
                        vec![
                            call(
                                "dnorm",
                                vec![Expr::Ref("mu".to_owned(), vec![Expr::Int(3)]), var("tau")]
                            ),
                            var("y")
                        ]
                    ),
                    a.rhs
                );
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn cumulative_of_multiply_assigned_variable_is_fatal() {
        let d = call("dnorm", vec![Expr::Int(0), Expr::Int(1)]);
        let program = vec![
            Stmt::Stochastic {
                lhs: Lhs::Ref("x".to_owned(), vec![Expr::Int(1)]),
                rhs: d.clone(),
                bounds: None,
            },
            Stmt::Stochastic {
                lhs: Lhs::Ref("x".to_owned(), vec![Expr::Int(2)]),
                rhs: d,
                bounds: None,
            },
            Stmt::Logical {
                lhs: Lhs::Var("c".to_owned()),
                rhs: call(
                    "cumulative",
                    vec![Expr::Ref("x".to_owned(), vec![Expr::Int(1)]), Expr::Int(0)],
                ),
            },
        ];
        let err = normalize(&program).unwrap_err();
        assert_eq!(
            crate::common::ErrorCode::MultipleDistributionsFor,
            err.code
        );
    }

    #[test]
    fn normalize_is_idempotent() {
        let program = vec![
            Stmt::Logical {
                lhs: Lhs::Link("logit".to_owned(), Box::new(Lhs::Var("p".to_owned()))),
                rhs: var("r"),
            },
            Stmt::Stochastic {
                lhs: Lhs::Var("y".to_owned()),
                rhs: call("dnorm", vec![var("mu"), var("tau")]),
                bounds: Some(TruncBounds {
                    censored: true,
                    lower: Some(Expr::Int(0)),
                    upper: Some(Expr::Int(5)),
                }),
            },
            Stmt::For {
                var: "i".to_owned(),
                lo: Expr::Int(1),
                hi: var("n"),
                body: vec![Stmt::Logical {
                    lhs: Lhs::Ref("z".to_owned(), vec![var("i")]),
                    rhs: var("i"),
                }],
            },
        ];
        let once = normalize(&program).unwrap();
        let surface: Vec<Stmt> = once.iter().map(to_surface).collect();
        let twice = normalize(&surface).unwrap();
        assert_eq!(once, twice);
    }
}
