// Copyright 2025 The Bugs Engine Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::collections::HashSet;
use std::fmt;

use crate::common::Ident;
use crate::value::DenseArray;

/// Expr is the expression AST handed over by the surface parser.  Operators
/// arrive as calls (`Call("+", [a, b])`), ranges as the distinguished
/// `Range` node, and a bare `:` subscript as `Colon`.  `ConstArray` has no
/// surface form; the partial evaluator produces it when embedding a fully
/// determined array back into an expression.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Int(i64),
    Real(f64),
    Var(Ident),
    Ref(Ident, Vec<Expr>),
    Call(Ident, Vec<Expr>),
    Range(Box<Expr>, Box<Expr>),
    Colon,
    ConstArray(DenseArray),
}

/// The left-hand side of an assignment: a scalar, an array reference, or a
/// link function wrapped around either (`logit(p) <- ...`).
#[derive(Clone, Debug, PartialEq)]
pub enum Lhs {
    Var(Ident),
    Ref(Ident, Vec<Expr>),
    Link(Ident, Box<Lhs>),
}

impl Lhs {
    pub fn name(&self) -> &str {
        match self {
            Lhs::Var(name) | Lhs::Ref(name, _) => name,
            Lhs::Link(_, inner) => inner.name(),
        }
    }
}

/// The parsed `T(l, u)` / `C(l, u)` suffix of a stochastic statement.
/// Absent bounds are `None`.
#[derive(Clone, Debug, PartialEq)]
pub struct TruncBounds {
    pub censored: bool,
    pub lower: Option<Expr>,
    pub upper: Option<Expr>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Stmt {
    Logical {
        lhs: Lhs,
        rhs: Expr,
    },
    Stochastic {
        lhs: Lhs,
        rhs: Expr,
        bounds: Option<TruncBounds>,
    },
    For {
        var: Ident,
        lo: Expr,
        hi: Expr,
        body: Vec<Stmt>,
    },
    If {
        cond: Expr,
        body: Vec<Stmt>,
    },
}

/// binary_precedence returns the binding strength of an infix operator
/// name, or None when the name is not an operator.  Higher binds tighter.
fn binary_precedence(op: &str) -> Option<u8> {
    match op {
        "||" => Some(1),
        "&&" => Some(2),
        "==" | "!=" => Some(3),
        "<" | ">" | "<=" | ">=" => Some(4),
        "+" | "-" => Some(5),
        "*" | "/" | "%" => Some(6),
        "^" => Some(7),
        _ => None,
    }
}

fn fmt_expr(expr: &Expr, parent_prec: u8, f: &mut fmt::Formatter) -> fmt::Result {
    match expr {
        Expr::Int(n) => write!(f, "{}", n),
        Expr::Real(x) => write!(f, "{}", x),
        Expr::Var(id) => write!(f, "{}", id),
        Expr::Ref(id, indices) => {
            write!(f, "{}[", id)?;
            for (i, e) in indices.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                fmt_expr(e, 0, f)?;
            }
            write!(f, "]")
        }
        Expr::Call(func, args) => {
            if args.len() == 2 {
                if let Some(prec) = binary_precedence(func) {
                    if prec < parent_prec {
                        write!(f, "(")?;
                    }
                    fmt_expr(&args[0], prec, f)?;
                    write!(f, " {} ", func)?;
                    // right child gets prec+1 so equal-precedence chains
                    // print with explicit grouping only when needed
                    fmt_expr(&args[1], prec + 1, f)?;
                    if prec < parent_prec {
                        write!(f, ")")?;
                    }
                    return Ok(());
                }
            }
            if args.len() == 1 && (func == "-" || func == "+" || func == "!") {
                write!(f, "{}", func)?;
                return fmt_expr(&args[0], 8, f);
            }
            write!(f, "{}(", func)?;
            for (i, e) in args.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                fmt_expr(e, 0, f)?;
            }
            write!(f, ")")
        }
        Expr::Range(lo, hi) => {
            fmt_expr(lo, 8, f)?;
            write!(f, ":")?;
            fmt_expr(hi, 8, f)
        }
        Expr::Colon => write!(f, ":"),
        Expr::ConstArray(a) => write!(f, "{}", a),
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt_expr(self, 0, f)
    }
}

impl fmt::Display for Lhs {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Lhs::Var(id) => write!(f, "{}", id),
            Lhs::Ref(id, indices) => {
                fmt_expr(&Expr::Ref(id.clone(), indices.clone()), 0, f)
            }
            Lhs::Link(func, inner) => write!(f, "{}({})", func, inner),
        }
    }
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Stmt::Logical { lhs, rhs } => write!(f, "{} = {}", lhs, rhs),
            Stmt::Stochastic { lhs, rhs, bounds } => {
                write!(f, "{} ~ {}", lhs, rhs)?;
                if let Some(b) = bounds {
                    let kind = if b.censored { "C" } else { "T" };
                    write!(f, " {}(", kind)?;
                    if let Some(lo) = &b.lower {
                        write!(f, "{}", lo)?;
                    }
                    write!(f, ", ")?;
                    if let Some(hi) = &b.upper {
                        write!(f, "{}", hi)?;
                    }
                    write!(f, ")")?;
                }
                Ok(())
            }
            Stmt::For { var, lo, hi, body } => {
                write!(f, "for ({} in {}:{}) {{ ", var, lo, hi)?;
                for stmt in body {
                    write!(f, "{}; ", stmt)?;
                }
                write!(f, "}}")
            }
            Stmt::If { cond, body } => {
                write!(f, "if ({}) {{ ", cond)?;
                for stmt in body {
                    write!(f, "{}; ", stmt)?;
                }
                write!(f, "}}")
            }
        }
    }
}

/// substitute replaces loop-variable references with their concrete values.
/// Bindings are searched innermost-first so nested loops shadow correctly.
pub(crate) fn substitute(expr: &Expr, bindings: &[(Ident, i64)]) -> Expr {
    match expr {
        Expr::Int(_) | Expr::Real(_) | Expr::Colon | Expr::ConstArray(_) => expr.clone(),
        Expr::Var(id) => {
            for (name, value) in bindings.iter().rev() {
                if name == id {
                    return Expr::Int(*value);
                }
            }
            expr.clone()
        }
        Expr::Ref(id, indices) => Expr::Ref(
            id.clone(),
            indices.iter().map(|e| substitute(e, bindings)).collect(),
        ),
        Expr::Call(func, args) => Expr::Call(
            func.clone(),
            args.iter().map(|e| substitute(e, bindings)).collect(),
        ),
        Expr::Range(lo, hi) => Expr::Range(
            Box::new(substitute(lo, bindings)),
            Box::new(substitute(hi, bindings)),
        ),
    }
}

/// collect_idents accumulates every identifier referenced by an expression
/// (both bare variables and array names).
pub(crate) fn collect_idents(expr: &Expr, out: &mut HashSet<Ident>) {
    match expr {
        Expr::Int(_) | Expr::Real(_) | Expr::Colon | Expr::ConstArray(_) => {}
        Expr::Var(id) => {
            out.insert(id.clone());
        }
        Expr::Ref(id, indices) => {
            out.insert(id.clone());
            for e in indices {
                collect_idents(e, out);
            }
        }
        Expr::Call(_, args) => {
            for e in args {
                collect_idents(e, out);
            }
        }
        Expr::Range(lo, hi) => {
            collect_idents(lo, out);
            collect_idents(hi, out);
        }
    }
}
