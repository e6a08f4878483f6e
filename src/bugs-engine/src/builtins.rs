// Copyright 2025 The Bugs Engine Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::collections::HashMap;

use crate::common::{canonicalize, Ident, Result};
use crate::comp_err;
use crate::dist::is_distribution_fn;
use crate::float;
use crate::value::{Scalar, Value};

/// is_builtin_fn reports whether the partial evaluator may fold a call to
/// this name: the whitelisted pure primitive set.
pub fn is_builtin_fn(name: &str) -> bool {
    builtin_arity(name).is_some()
}

/// builtin_arity returns the (min, max) argument counts of a builtin.
pub fn builtin_arity(name: &str) -> Option<(usize, usize)> {
    let arity = match name {
        "+" | "-" => (1, 2),
        "*" | "/" | "^" | "%" => (2, 2),
        "<" | ">" | "<=" | ">=" | "==" | "!=" | "&&" | "||" => (2, 2),
        "!" => (1, 1),
        "abs" | "exp" | "log" | "sqrt" | "sin" | "cos" | "tan" => (1, 1),
        "logit" | "logistic" | "ilogit" | "phi" | "cloglog" | "cexpexp" | "icloglog" => (1, 1),
        "step" | "trunc" | "round" => (1, 1),
        "pow" | "equals" => (2, 2),
        "min" | "max" => (1, 2),
        "mean" | "sum" | "prod" | "sd" => (1, 1),
        "inprod" => (2, 2),
        "getindex" => (2, usize::MAX),
        _ => return None,
    };
    Some(arity)
}

fn want_scalar(name: &str, v: &Value) -> Result<Scalar> {
    match v.as_scalar() {
        Some(s) => Ok(s),
        None => comp_err!(BadFunctionArgs, format!("{} expects a scalar", name)),
    }
}

fn want_array<'a>(name: &str, v: &'a Value) -> Result<&'a crate::value::DenseArray> {
    match v.as_array() {
        Some(a) => Ok(a),
        None => comp_err!(BadFunctionArgs, format!("{} expects an array", name)),
    }
}

fn arith2(name: &str, a: Scalar, b: Scalar) -> Result<Scalar> {
    use Scalar::*;
    let v = match (name, a, b) {
        ("+", Int(a), Int(b)) => Int(a + b),
        ("-", Int(a), Int(b)) => Int(a - b),
        ("*", Int(a), Int(b)) => Int(a * b),
        ("%", Int(a), Int(b)) => {
            if b == 0 {
                return comp_err!(BadFunctionArgs, "modulo by zero");
            }
            Int(a.rem_euclid(b))
        }
        ("^", Int(a), Int(b)) if b >= 0 && b <= u32::MAX as i64 => Int(a.pow(b as u32)),
        ("+", a, b) => Real(a.as_f64() + b.as_f64()),
        ("-", a, b) => Real(a.as_f64() - b.as_f64()),
        ("*", a, b) => Real(a.as_f64() * b.as_f64()),
        ("/", a, b) => Real(a.as_f64() / b.as_f64()),
        ("%", a, b) => Real(a.as_f64().rem_euclid(b.as_f64())),
        ("^", a, b) => Real(a.as_f64().powf(b.as_f64())),
        _ => return comp_err!(BadFunctionArgs, name),
    };
    Ok(v)
}

fn compare2(name: &str, a: Scalar, b: Scalar) -> Result<Scalar> {
    let (a, b) = (a.as_f64(), b.as_f64());
    let truth = match name {
        "<" => a < b,
        ">" => a > b,
        "<=" => a <= b,
        ">=" => a >= b,
        "==" => a == b,
        "!=" => a != b,
        "&&" => a != 0.0 && b != 0.0,
        "||" => a != 0.0 || b != 0.0,
        _ => return comp_err!(BadFunctionArgs, name),
    };
    Ok(Scalar::Int(truth as i64))
}

fn math1(name: &str, x: Scalar) -> Result<Scalar> {
    let v = x.as_f64();
    let out = match name {
        "abs" => {
            return Ok(match x {
                Scalar::Int(n) => Scalar::Int(n.abs()),
                Scalar::Real(x) => Scalar::Real(x.abs()),
            })
        }
        "exp" => v.exp(),
        "log" => v.ln(),
        "sqrt" => v.sqrt(),
        "sin" => v.sin(),
        "cos" => v.cos(),
        "tan" => v.tan(),
        "logit" => float::logit(v),
        "logistic" | "ilogit" => float::logistic(v),
        "phi" => float::phi(v),
        "cloglog" => float::cloglog(v),
        "cexpexp" | "icloglog" => float::cexpexp(v),
        "step" => return Ok(Scalar::Int((v >= 0.0) as i64)),
        "trunc" => return Ok(Scalar::Int(v.trunc() as i64)),
        "round" => return Ok(Scalar::Int(v.round() as i64)),
        "!" => return Ok(Scalar::Int((v == 0.0) as i64)),
        _ => return comp_err!(BadFunctionArgs, name),
    };
    Ok(Scalar::Real(out))
}

fn reduce(name: &str, cells: &[Scalar]) -> Result<Scalar> {
    if cells.is_empty() {
        return comp_err!(BadFunctionArgs, format!("{} over an empty array", name));
    }
    let all_int = cells.iter().all(|c| matches!(c, Scalar::Int(_)));
    match name {
        "sum" | "prod" if all_int => {
            let it = cells.iter().map(|c| match c {
                Scalar::Int(n) => *n,
                Scalar::Real(_) => unreachable!(),
            });
            Ok(Scalar::Int(if name == "sum" {
                it.sum()
            } else {
                it.product()
            }))
        }
        "sum" => Ok(Scalar::Real(cells.iter().map(|c| c.as_f64()).sum())),
        "prod" => Ok(Scalar::Real(cells.iter().map(|c| c.as_f64()).product())),
        "mean" => {
            let total: f64 = cells.iter().map(|c| c.as_f64()).sum();
            Ok(Scalar::Real(total / cells.len() as f64))
        }
        "sd" => {
            if cells.len() < 2 {
                return comp_err!(BadFunctionArgs, "sd needs at least two elements");
            }
            let n = cells.len() as f64;
            let mean: f64 = cells.iter().map(|c| c.as_f64()).sum::<f64>() / n;
            let ss: f64 = cells.iter().map(|c| (c.as_f64() - mean).powi(2)).sum();
            Ok(Scalar::Real((ss / (n - 1.0)).sqrt()))
        }
        "min" | "max" => {
            let mut best = cells[0];
            for c in &cells[1..] {
                let better = if name == "min" {
                    c.as_f64() < best.as_f64()
                } else {
                    c.as_f64() > best.as_f64()
                };
                if better {
                    best = *c;
                }
            }
            Ok(best)
        }
        _ => comp_err!(BadFunctionArgs, name),
    }
}

/// apply_builtin folds a whitelisted primitive over fully determined values.
pub(crate) fn apply_builtin(name: &str, args: &[Value]) -> Result<Value> {
    let (min, max) = match builtin_arity(name) {
        Some(a) => a,
        None => return comp_err!(UndefinedFunction, name),
    };
    if args.len() < min || args.len() > max {
        return comp_err!(
            BadFunctionArgs,
            format!("{} takes {}..{} arguments, got {}", name, min, max, args.len())
        );
    }

    match name {
        "+" | "-" if args.len() == 1 => {
            let a = want_scalar(name, &args[0])?;
            if name == "+" {
                return Ok(Value::Scalar(a));
            }
            let neg = match a {
                Scalar::Int(n) => Scalar::Int(-n),
                Scalar::Real(x) => Scalar::Real(-x),
            };
            Ok(Value::Scalar(neg))
        }
        "+" | "-" | "*" | "/" | "^" | "%" => {
            let a = want_scalar(name, &args[0])?;
            let b = want_scalar(name, &args[1])?;
            Ok(Value::Scalar(arith2(name, a, b)?))
        }
        "pow" => {
            let a = want_scalar(name, &args[0])?;
            let b = want_scalar(name, &args[1])?;
            Ok(Value::Scalar(arith2("^", a, b)?))
        }
        "<" | ">" | "<=" | ">=" | "==" | "!=" | "&&" | "||" => {
            let a = want_scalar(name, &args[0])?;
            let b = want_scalar(name, &args[1])?;
            Ok(Value::Scalar(compare2(name, a, b)?))
        }
        "equals" => {
            let a = want_scalar(name, &args[0])?;
            let b = want_scalar(name, &args[1])?;
            Ok(Value::Scalar(Scalar::Int(
                (a.as_f64() == b.as_f64()) as i64,
            )))
        }
        "min" | "max" if args.len() == 1 => {
            let a = want_array(name, &args[0])?;
            Ok(Value::Scalar(reduce(name, &a.cells)?))
        }
        "min" | "max" => {
            let a = want_scalar(name, &args[0])?;
            let b = want_scalar(name, &args[1])?;
            Ok(Value::Scalar(reduce(name, &[a, b])?))
        }
        "mean" | "sum" | "prod" | "sd" => {
            let a = want_array(name, &args[0])?;
            Ok(Value::Scalar(reduce(name, &a.cells)?))
        }
        "inprod" => {
            let a = want_array(name, &args[0])?;
            let b = want_array(name, &args[1])?;
            if a.len() != b.len() {
                return comp_err!(
                    ShapeMismatch,
                    format!("inprod over lengths {} and {}", a.len(), b.len())
                );
            }
            let all_int = a
                .cells
                .iter()
                .chain(b.cells.iter())
                .all(|c| matches!(c, Scalar::Int(_)));
            if all_int {
                let total: i64 = a
                    .cells
                    .iter()
                    .zip(b.cells.iter())
                    .map(|(x, y)| match (x, y) {
                        (Scalar::Int(x), Scalar::Int(y)) => x * y,
                        _ => unreachable!(),
                    })
                    .sum();
                Ok(Value::Scalar(Scalar::Int(total)))
            } else {
                let total: f64 = a
                    .cells
                    .iter()
                    .zip(b.cells.iter())
                    .map(|(x, y)| x.as_f64() * y.as_f64())
                    .sum();
                Ok(Value::Scalar(Scalar::Real(total)))
            }
        }
        "getindex" => {
            let a = want_array(name, &args[0])?;
            let mut indices = Vec::with_capacity(args.len() - 1);
            for arg in &args[1..] {
                indices.push(want_scalar(name, arg)?.as_index()?);
            }
            match a.offset(&indices) {
                Some(off) => Ok(Value::Scalar(a.cells[off])),
                None => comp_err!(
                    ShapeMismatch,
                    format!("getindex out of bounds for shape {:?}", a.shape)
                ),
            }
        }
        _ => {
            let x = want_scalar(name, &args[0])?;
            Ok(Value::Scalar(math1(name, x)?))
        }
    }
}

pub type NativeFn = fn(&[Value]) -> Result<Value>;

/// FunctionRegistry is the pre-compilation extension hook: callers may
/// register additional function names (with arity, and optionally a native
/// implementation that enables constant folding and node evaluation).
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    extra: HashMap<Ident, (usize, Option<NativeFn>)>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: &str, arity: usize, native: Option<NativeFn>) -> Result<()> {
        let name = canonicalize(name)?;
        if is_builtin_fn(&name) || is_distribution_fn(&name) {
            return comp_err!(
                BadIdentifier,
                format!("{} shadows a builtin function", name)
            );
        }
        self.extra.insert(name, (arity, native));
        Ok(())
    }

    pub(crate) fn lookup(&self, name: &str) -> Option<(usize, Option<NativeFn>)> {
        self.extra.get(name).copied()
    }

    /// is_known reports whether a call to this name is legal anywhere in a
    /// model: builtin, distribution machinery, or registered extension.
    pub(crate) fn is_known(&self, name: &str) -> bool {
        is_builtin_fn(name)
            || is_distribution_fn(name)
            || matches!(name, "cdf" | "pdf")
            || self.extra.contains_key(name)
    }
}
