// Copyright 2025 The Bugs Engine Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Terse builders for program fragments used across the test modules.

use std::collections::HashMap;

use crate::ast::{Expr, Lhs, Stmt};
use crate::common::Ident;
use crate::env::DataEntry;
use crate::value::{ArrayValue, Scalar};

pub(crate) fn int(n: i64) -> Expr {
    Expr::Int(n)
}

pub(crate) fn real(x: f64) -> Expr {
    Expr::Real(x)
}

pub(crate) fn var(name: &str) -> Expr {
    Expr::Var(name.to_owned())
}

pub(crate) fn reff(name: &str, indices: Vec<Expr>) -> Expr {
    Expr::Ref(name.to_owned(), indices)
}

pub(crate) fn call(func: &str, args: Vec<Expr>) -> Expr {
    Expr::Call(func.to_owned(), args)
}

pub(crate) fn range(lo: Expr, hi: Expr) -> Expr {
    Expr::Range(Box::new(lo), Box::new(hi))
}

pub(crate) fn lvar(name: &str) -> Lhs {
    Lhs::Var(name.to_owned())
}

pub(crate) fn lref(name: &str, indices: Vec<Expr>) -> Lhs {
    Lhs::Ref(name.to_owned(), indices)
}

pub(crate) fn logical(lhs: Lhs, rhs: Expr) -> Stmt {
    Stmt::Logical { lhs, rhs }
}

pub(crate) fn stochastic(lhs: Lhs, rhs: Expr) -> Stmt {
    Stmt::Stochastic {
        lhs,
        rhs,
        bounds: None,
    }
}

pub(crate) fn forloop(var_name: &str, lo: Expr, hi: Expr, body: Vec<Stmt>) -> Stmt {
    Stmt::For {
        var: var_name.to_owned(),
        lo,
        hi,
        body,
    }
}

pub(crate) fn ifstmt(cond: Expr, body: Vec<Stmt>) -> Stmt {
    Stmt::If { cond, body }
}

/// data builds a data environment from (name, entry) pairs.
pub(crate) fn data(entries: &[(&str, DataEntry)]) -> HashMap<Ident, DataEntry> {
    entries
        .iter()
        .map(|(name, entry)| ((*name).to_owned(), entry.clone()))
        .collect()
}

pub(crate) fn scalar_int(n: i64) -> DataEntry {
    DataEntry::Scalar(Scalar::Int(n))
}

pub(crate) fn scalar_real(x: f64) -> DataEntry {
    DataEntry::Scalar(Scalar::Real(x))
}

pub(crate) fn int_vector(cells: &[i64]) -> DataEntry {
    DataEntry::Array(ArrayValue {
        shape: vec![cells.len()],
        cells: cells.iter().map(|&n| Some(Scalar::Int(n))).collect(),
    })
}
