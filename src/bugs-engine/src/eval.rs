// Copyright 2025 The Bugs Engine Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! The partial evaluator: a total function from expressions to either a
//! fully evaluated value, a resolved range, a colon marker, or a residual
//! expression with every resolvable subexpression folded in place.

use smallvec::SmallVec;

use crate::ast::Expr;
use crate::builtins::{apply_builtin, builtin_arity, FunctionRegistry};
use crate::common::Result;
use crate::comp_err;
use crate::dist::{is_bounding_fn, is_distribution_fn};
use crate::env::{Env, EnvCell};
use crate::value::{DenseArray, Scalar, Value};
use crate::variable::{footprint, IndexEntry, Subscript};

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Partial {
    Const(Scalar),
    Array(DenseArray),
    Range(i64, i64),
    Colon,
    Expr(Expr),
}

impl Partial {
    /// is_resolved is true for values with no missing parts: scalars and
    /// complete arrays.
    pub(crate) fn is_resolved(&self) -> bool {
        matches!(self, Partial::Const(_) | Partial::Array(_))
    }

    pub(crate) fn as_value(&self) -> Option<Value> {
        match self {
            Partial::Const(s) => Some(Value::Scalar(*s)),
            Partial::Array(a) => Some(Value::Array(a.clone())),
            _ => None,
        }
    }

    /// try_index returns the integral value of a resolved scalar, None when
    /// still unresolved, and an error for a resolved non-integral value.
    pub(crate) fn try_index(&self) -> Result<Option<i64>> {
        match self {
            Partial::Const(s) => Ok(Some(s.as_index()?)),
            _ => Ok(None),
        }
    }

    /// into_expr embeds the partial result back into expression form.
    pub(crate) fn into_expr(self) -> Expr {
        match self {
            Partial::Const(Scalar::Int(n)) => Expr::Int(n),
            Partial::Const(Scalar::Real(x)) => Expr::Real(x),
            Partial::Array(a) => Expr::ConstArray(a),
            Partial::Range(lo, hi) => {
                Expr::Range(Box::new(Expr::Int(lo)), Box::new(Expr::Int(hi)))
            }
            Partial::Colon => Expr::Colon,
            Partial::Expr(e) => e,
        }
    }
}

/// An index position after evaluation: either a concrete entry or a
/// residual expression.
enum IndexPartial {
    Entry(IndexEntry),
    Unresolved(Expr),
}

fn eval_index(
    expr: &Expr,
    axis: usize,
    shape: Option<&[usize]>,
    env: &Env,
    reg: &FunctionRegistry,
) -> Result<IndexPartial> {
    let p = eval(expr, env, reg)?;
    let out = match p {
        Partial::Const(s) => IndexPartial::Entry(IndexEntry::Int(s.as_index()?)),
        Partial::Range(lo, hi) => IndexPartial::Entry(IndexEntry::Range(lo, hi)),
        Partial::Colon => {
            // a bare `:` selects the full axis once the shape is final
            match shape {
                Some(shape) if env.is_frozen() && axis < shape.len() => {
                    IndexPartial::Entry(IndexEntry::Range(1, shape[axis] as i64))
                }
                _ => IndexPartial::Unresolved(Expr::Colon),
            }
        }
        Partial::Array(_) => {
            return comp_err!(UnsupportedExpression, format!("array-valued index {}", expr))
        }
        Partial::Expr(e) => IndexPartial::Unresolved(e),
    };
    Ok(out)
}

pub(crate) fn eval(expr: &Expr, env: &Env, reg: &FunctionRegistry) -> Result<Partial> {
    let p = match expr {
        Expr::Int(n) => Partial::Const(Scalar::Int(*n)),
        Expr::Real(x) => Partial::Const(Scalar::Real(*x)),
        Expr::Colon => Partial::Colon,
        Expr::ConstArray(a) => Partial::Array(a.clone()),
        Expr::Var(id) => match env.cell(id) {
            Some(EnvCell::Scalar(Some(s))) => Partial::Const(*s),
            // whole-array reads resolve only once shapes are frozen: a
            // growing array's completeness is not yet meaningful
            Some(EnvCell::Array(a)) if env.is_frozen() => match a.to_dense() {
                Some(d) => Partial::Array(d),
                None => Partial::Expr(expr.clone()),
            },
            _ => Partial::Expr(expr.clone()),
        },
        Expr::Range(lo, hi) => {
            let lo_p = eval(lo, env, reg)?;
            let hi_p = eval(hi, env, reg)?;
            match (lo_p.try_index()?, hi_p.try_index()?) {
                (Some(lo), Some(hi)) => Partial::Range(lo, hi),
                _ => Partial::Expr(Expr::Range(
                    Box::new(lo_p.into_expr()),
                    Box::new(hi_p.into_expr()),
                )),
            }
        }
        Expr::Ref(name, indices) => eval_ref(name, indices, env, reg)?,
        Expr::Call(func, args) => eval_call(func, args, env, reg)?,
    };
    Ok(p)
}

fn eval_ref(
    name: &str,
    indices: &[Expr],
    env: &Env,
    reg: &FunctionRegistry,
) -> Result<Partial> {
    let array = env.array(name);
    let shape = array.map(|a| a.shape.as_slice());

    let mut entries: Subscript = SmallVec::new();
    let mut residual: Vec<Expr> = Vec::with_capacity(indices.len());
    let mut all_concrete = true;
    for (axis, idx) in indices.iter().enumerate() {
        match eval_index(idx, axis, shape, env, reg)? {
            IndexPartial::Entry(e) => {
                residual.push(match e {
                    IndexEntry::Int(i) => Expr::Int(i),
                    IndexEntry::Range(lo, hi) => {
                        Expr::Range(Box::new(Expr::Int(lo)), Box::new(Expr::Int(hi)))
                    }
                });
                entries.push(e);
            }
            IndexPartial::Unresolved(e) => {
                residual.push(e);
                all_concrete = false;
            }
        }
    }

    let rebuilt = || Partial::Expr(Expr::Ref(name.to_owned(), residual.clone()));

    if !all_concrete {
        return Ok(rebuilt());
    }
    let a = match array {
        Some(a) => a,
        None => return Ok(rebuilt()),
    };
    if a.rank() != entries.len() {
        return comp_err!(
            ShapeMismatch,
            format!(
                "{} referenced with {} subscripts but has {} axes",
                name,
                entries.len(),
                a.rank()
            )
        );
    }

    let elems = footprint(&entries);
    let mut cells = Vec::with_capacity(elems.len());
    for idx in &elems {
        match a.cell(idx) {
            Some(Some(v)) => cells.push(v),
            Some(None) => return Ok(rebuilt()),
            None => {
                // out of bounds: fatal once shapes are final, otherwise the
                // array may still grow under later statements
                if env.is_frozen() {
                    return comp_err!(
                        ShapeMismatch,
                        format!(
                            "index out of bounds for {} with shape {:?}",
                            name, a.shape
                        )
                    );
                }
                return Ok(rebuilt());
            }
        }
    }

    let is_slice = entries
        .iter()
        .any(|e| matches!(e, IndexEntry::Range(_, _)));
    if is_slice {
        let shape: Vec<usize> = entries
            .iter()
            .filter_map(|e| match e {
                IndexEntry::Int(_) => None,
                IndexEntry::Range(_, _) => Some(e.len()),
            })
            .collect();
        Ok(Partial::Array(DenseArray { shape, cells }))
    } else {
        Ok(Partial::Const(cells[0]))
    }
}

fn eval_call(
    func: &str,
    args: &[Expr],
    env: &Env,
    reg: &FunctionRegistry,
) -> Result<Partial> {
    // the range constructor also arrives in call form
    if func == ":" && args.len() == 2 {
        let lo = eval(&args[0], env, reg)?;
        let hi = eval(&args[1], env, reg)?;
        return Ok(match (lo.try_index()?, hi.try_index()?) {
            (Some(lo), Some(hi)) => Partial::Range(lo, hi),
            _ => Partial::Expr(Expr::Range(
                Box::new(lo.into_expr()),
                Box::new(hi.into_expr()),
            )),
        });
    }

    let parts: Result<Vec<Partial>> = args.iter().map(|a| eval(a, env, reg)).collect();
    let parts = parts?;

    // distribution machinery never folds; it produces distribution objects
    // at node-evaluation time
    let opaque = is_distribution_fn(func)
        || is_bounding_fn(func)
        || matches!(func, "cdf" | "pdf");

    if !opaque && parts.iter().all(|p| p.is_resolved()) {
        let values: Vec<Value> = parts.iter().map(|p| p.as_value().unwrap()).collect();
        if builtin_arity(func).is_some() {
            return Ok(value_to_partial(apply_builtin(func, &values)?));
        }
        if let Some((arity, Some(native))) = reg.lookup(func) {
            if values.len() != arity {
                return comp_err!(
                    BadFunctionArgs,
                    format!("{} takes {} arguments, got {}", func, arity, values.len())
                );
            }
            return Ok(value_to_partial(native(&values)?));
        }
    }

    Ok(Partial::Expr(Expr::Call(
        func.to_owned(),
        parts.into_iter().map(|p| p.into_expr()).collect(),
    )))
}

fn value_to_partial(v: Value) -> Partial {
    match v {
        Value::Scalar(s) => Partial::Const(s),
        Value::Array(a) => Partial::Array(a),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::DataEntry;
    use crate::value::ArrayValue;
    use std::collections::HashMap;

    fn env() -> Env {
        let mut data = HashMap::new();
        data.insert("n".to_owned(), DataEntry::Scalar(Scalar::Int(3)));
        data.insert("x".to_owned(), DataEntry::Scalar(Scalar::Real(8.0)));
        data.insert(
            "g".to_owned(),
            DataEntry::Array(ArrayValue {
                shape: vec![3],
                cells: vec![
                    Some(Scalar::Int(1)),
                    Some(Scalar::Int(2)),
                    None,
                ],
            }),
        );
        let mut env = Env::from_data(&data).unwrap();
        env.freeze();
        env
    }

    fn var(name: &str) -> Expr {
        Expr::Var(name.to_owned())
    }

    fn call(func: &str, args: Vec<Expr>) -> Expr {
        Expr::Call(func.to_owned(), args)
    }

    #[test]
    fn literals_and_lookup() {
        let env = env();
        let reg = FunctionRegistry::new();
        assert_eq!(
            Partial::Const(Scalar::Int(3)),
            eval(&var("n"), &env, &reg).unwrap()
        );
        assert_eq!(
            Partial::Expr(var("mu")),
            eval(&var("mu"), &env, &reg).unwrap()
        );
    }

    #[test]
    fn folding_arithmetic() {
        let env = env();
        let reg = FunctionRegistry::new();
        let e = call("+", vec![var("n"), Expr::Int(1)]);
        assert_eq!(Partial::Const(Scalar::Int(4)), eval(&e, &env, &reg).unwrap());

        // unresolved operand folds the rest and keeps the residual call
        let e = call("+", vec![var("mu"), call("*", vec![var("n"), Expr::Int(2)])]);
        assert_eq!(
            Partial::Expr(call("+", vec![var("mu"), Expr::Int(6)])),
            eval(&e, &env, &reg).unwrap()
        );
    }

    #[test]
    fn ranges_resolve_to_unit_ranges() {
        let env = env();
        let reg = FunctionRegistry::new();
        let e = Expr::Range(Box::new(Expr::Int(1)), Box::new(var("n")));
        assert_eq!(Partial::Range(1, 3), eval(&e, &env, &reg).unwrap());
    }

    #[test]
    fn references_slice_the_environment() {
        let env = env();
        let reg = FunctionRegistry::new();
        let e = Expr::Ref("g".to_owned(), vec![Expr::Int(2)]);
        assert_eq!(Partial::Const(Scalar::Int(2)), eval(&e, &env, &reg).unwrap());

        // slice with a missing cell stays unresolved
        let e = Expr::Ref(
            "g".to_owned(),
            vec![Expr::Range(Box::new(Expr::Int(1)), Box::new(Expr::Int(3)))],
        );
        assert!(!eval(&e, &env, &reg).unwrap().is_resolved());

        // determined sub-slice resolves to an array
        let e = Expr::Ref(
            "g".to_owned(),
            vec![Expr::Range(Box::new(Expr::Int(1)), Box::new(Expr::Int(2)))],
        );
        assert_eq!(
            Partial::Array(DenseArray::vector(vec![Scalar::Int(1), Scalar::Int(2)])),
            eval(&e, &env, &reg).unwrap()
        );
    }

    #[test]
    fn integral_floats_coerce_in_indices() {
        let env = env();
        let reg = FunctionRegistry::new();
        let e = Expr::Ref("g".to_owned(), vec![Expr::Real(2.0)]);
        assert_eq!(Partial::Const(Scalar::Int(2)), eval(&e, &env, &reg).unwrap());

        let e = Expr::Ref("g".to_owned(), vec![Expr::Real(1.5)]);
        let err = eval(&e, &env, &reg).unwrap_err();
        assert_eq!(crate::common::ErrorCode::NonIntegerIndex, err.code);
    }

    #[test]
    fn colon_resolves_against_frozen_shape() {
        let env = env();
        let reg = FunctionRegistry::new();
        // g[3] is missing so g[:] cannot fully resolve, but the colon
        // itself lowers to the full axis range
        let e = Expr::Ref("g".to_owned(), vec![Expr::Colon]);
        match eval(&e, &env, &reg).unwrap() {
            Partial::Expr(Expr::Ref(_, indices)) => {
                assert_eq!(
                    vec![Expr::Range(Box::new(Expr::Int(1)), Box::new(Expr::Int(3)))],
                    indices
                );
            }
            other => panic!("expected residual reference, got {:?}", other),
        }
    }

    #[test]
    fn distribution_calls_never_fold() {
        let env = env();
        let reg = FunctionRegistry::new();
        let e = call("dnorm", vec![Expr::Int(0), Expr::Real(1.0)]);
        assert!(!eval(&e, &env, &reg).unwrap().is_resolved());
    }

    #[test]
    fn out_of_bounds_is_fatal_once_frozen() {
        let env = env();
        let reg = FunctionRegistry::new();
        let e = Expr::Ref("g".to_owned(), vec![Expr::Int(9)]);
        let err = eval(&e, &env, &reg).unwrap_err();
        assert_eq!(crate::common::ErrorCode::ShapeMismatch, err.code);
    }

    #[test]
    fn registered_native_functions_fold() {
        let env = env();
        let mut reg = FunctionRegistry::new();
        fn double(args: &[Value]) -> crate::common::Result<Value> {
            Ok(Value::Scalar(Scalar::Real(
                args[0].as_f64().unwrap() * 2.0,
            )))
        }
        reg.register("double", 1, Some(double)).unwrap();
        let e = call("double", vec![var("x")]);
        assert_eq!(
            Partial::Const(Scalar::Real(16.0)),
            eval(&e, &env, &reg).unwrap()
        );

        // registered without a native implementation: recognized, unfolded
        reg.register("opaque", 1, None).unwrap();
        let e = call("opaque", vec![var("x")]);
        assert!(!eval(&e, &env, &reg).unwrap().is_resolved());
    }
}
