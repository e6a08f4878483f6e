// Copyright 2025 The Bugs Engine Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! The node-function builder: for every surviving model variable it derives
//! the fine-grained dependency set (element level, for graph edges), the
//! coarse argument list (whole arrays and scalars, for the callable), and
//! the node function itself as a tagged variant interpreted at evaluation
//! time.

use std::collections::{HashMap, HashSet};

use smallvec::SmallVec;

use crate::ast::Expr;
use crate::builtins::{apply_builtin, builtin_arity, FunctionRegistry};
use crate::collector::FlatStmt;
use crate::common::{Ident, Result};
use crate::comp_err;
use crate::dist::{bound, construct, is_bounding_fn, is_distribution_fn, Distribution};
use crate::env::Env;
use crate::eval::eval;
use crate::normalize::{AssignKind, LinkFn};
use crate::value::{DenseArray, Scalar, Value};
use crate::variable::{footprint, IndexEntry, Subscript, VarId};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    Logical,
    Stochastic,
}

/// What evaluating a node produces: a concrete value for logical nodes, a
/// distribution object for stochastic ones.
#[derive(Clone, Debug, PartialEq)]
pub enum NodeValue {
    Value(Value),
    Dist(Distribution),
}

/// The callable attached to a node.  Simple right-hand sides compile to
/// dedicated forms; everything else is a folded expression interpreted
/// against the argument scope.
#[derive(Clone, Debug, PartialEq)]
pub enum NodeFn {
    Constant(Value),
    Identity,
    SliceGet(Subscript),
    Compiled { expr: Expr, params: Vec<Ident> },
}

#[derive(Clone, Debug, PartialEq)]
pub struct NodeRecord {
    pub kind: NodeKind,
    pub link: Option<LinkFn>,
    pub func: NodeFn,
    pub args: Vec<Ident>,
    pub deps: Vec<VarId>,
}

struct DepWalker<'a> {
    env: &'a Env,
    deps: Vec<VarId>,
    seen: HashSet<VarId>,
    args: Vec<Ident>,
    args_seen: HashSet<Ident>,
}

impl DepWalker<'_> {
    fn push_dep(&mut self, var: VarId) {
        if self.seen.insert(var.clone()) {
            self.deps.push(var);
        }
    }

    fn push_arg(&mut self, name: &str) {
        if self.args_seen.insert(name.to_owned()) {
            self.args.push(name.to_owned());
        }
    }

    /// depend_on_elements records every still-undetermined element in the
    /// given footprint; fully determined cells contribute nothing.
    fn depend_on_elements(&mut self, name: &str, entries: &Subscript) {
        for idx in footprint(entries) {
            let var = VarId::element(name, &idx);
            if !self.env.var_determined(&var) {
                self.push_dep(var);
            }
        }
    }

    fn depend_on_whole_array(&mut self, name: &str) {
        match self.env.array(name) {
            Some(a) => {
                let entries: Subscript = a
                    .shape
                    .iter()
                    .map(|&d| IndexEntry::Range(1, d as i64))
                    .collect();
                self.depend_on_elements(name, &entries);
            }
            // no cell: nothing ever assigns this array, which the graph
            // validation rejects through the dangling vertex
            None => self.push_dep(VarId::scalar(name)),
        }
    }

    fn walk(&mut self, expr: &Expr) {
        match expr {
            Expr::Int(_) | Expr::Real(_) | Expr::Colon | Expr::ConstArray(_) => {}
            Expr::Var(id) => {
                self.push_arg(id);
                if self.env.array(id).is_some() {
                    self.depend_on_whole_array(id);
                } else {
                    let var = VarId::scalar(id);
                    if !self.env.var_determined(&var) {
                        self.push_dep(var);
                    }
                }
            }
            Expr::Ref(name, indices) => {
                self.push_arg(name);
                let mut entries: Subscript = SmallVec::new();
                let mut concrete = true;
                for idx in indices {
                    match static_entry(idx) {
                        Some(e) => entries.push(e),
                        None => {
                            concrete = false;
                            self.walk(idx);
                        }
                    }
                }
                if concrete {
                    if self.env.array(name).is_some() {
                        self.depend_on_elements(name, &entries);
                    } else {
                        // unknown array: keep the slice itself as the
                        // dependency; the graph will reject it unless
                        // something produces it
                        self.push_dep(VarId::new(name, entries));
                    }
                } else {
                    // an index that depends on model variables widens the
                    // dependency to every undetermined element
                    self.depend_on_whole_array(name);
                }
            }
            Expr::Call(_, args) => {
                for arg in args {
                    self.walk(arg);
                }
            }
            Expr::Range(lo, hi) => {
                self.walk(lo);
                self.walk(hi);
            }
        }
    }
}

/// static_entry reads an index expression that partial evaluation already
/// folded to a literal form.
fn static_entry(expr: &Expr) -> Option<IndexEntry> {
    match expr {
        Expr::Int(n) => Some(IndexEntry::Int(*n)),
        Expr::Range(lo, hi) => match (lo.as_ref(), hi.as_ref()) {
            (Expr::Int(lo), Expr::Int(hi)) => Some(IndexEntry::Range(*lo, *hi)),
            _ => None,
        },
        _ => None,
    }
}

/// validate_calls rejects calls to unknown names and statically checks
/// builtin arities.
fn validate_calls(expr: &Expr, reg: &FunctionRegistry) -> Result<()> {
    if let Expr::Call(func, args) = expr {
        if !reg.is_known(func) {
            return comp_err!(UndefinedFunction, expr);
        }
        if let Some((min, max)) = builtin_arity(func) {
            if args.len() < min || args.len() > max {
                return comp_err!(BadFunctionArgs, expr);
            }
        }
    }
    match expr {
        Expr::Ref(_, children) | Expr::Call(_, children) => {
            for child in children {
                validate_calls(child, reg)?;
            }
        }
        Expr::Range(lo, hi) => {
            validate_calls(lo, reg)?;
            validate_calls(hi, reg)?;
        }
        _ => {}
    }
    Ok(())
}

/// validate_distribution checks that a stochastic RHS is a distribution
/// constructor, possibly wrapped by one truncation/censoring call.
fn validate_distribution(rhs: &Expr) -> Result<()> {
    match rhs {
        Expr::Call(func, args) if is_bounding_fn(func) => match args.first() {
            Some(Expr::Call(inner, _)) if is_distribution_fn(inner) && !is_bounding_fn(inner) => {
                Ok(())
            }
            _ => comp_err!(UndefinedDistribution, rhs),
        },
        Expr::Call(func, _) if is_distribution_fn(func) => Ok(()),
        _ => comp_err!(UndefinedDistribution, rhs),
    }
}

/// build produces the node record for one surviving model variable.
pub(crate) fn build(stmt: &FlatStmt, env: &Env, reg: &FunctionRegistry) -> Result<NodeRecord> {
    let kind = match stmt.kind {
        AssignKind::Logical => NodeKind::Logical,
        AssignKind::Stochastic => NodeKind::Stochastic,
    };
    if kind == NodeKind::Logical && stmt.link.is_some() {
        // normalization rewrites logical links away; one surviving here
        // means the statement never was a valid link form
        return comp_err!(UndefinedLinkFunction, stmt);
    }

    // fold the data-resolvable subexpressions once; the node function only
    // performs the remaining (non-data) computation
    let rhs = eval(&stmt.rhs, env, reg)?.into_expr();
    validate_calls(&rhs, reg)?;
    if kind == NodeKind::Stochastic {
        validate_distribution(&rhs)?;
    }

    let mut walker = DepWalker {
        env,
        deps: Vec::new(),
        seen: HashSet::new(),
        args: Vec::new(),
        args_seen: HashSet::new(),
    };
    walker.walk(&rhs);
    let (deps, args) = (walker.deps, walker.args);

    let func = match &rhs {
        Expr::Int(n) => NodeFn::Constant(Value::Scalar(Scalar::Int(*n))),
        Expr::Real(x) => NodeFn::Constant(Value::Scalar(Scalar::Real(*x))),
        Expr::ConstArray(a) => NodeFn::Constant(Value::Array(a.clone())),
        Expr::Var(_) => NodeFn::Identity,
        Expr::Ref(_, indices) => {
            let entries: Option<Subscript> = indices.iter().map(static_entry).collect();
            match entries {
                Some(entries) => NodeFn::SliceGet(entries),
                None => NodeFn::Compiled {
                    expr: rhs.clone(),
                    params: args.clone(),
                },
            }
        }
        _ => NodeFn::Compiled {
            expr: rhs.clone(),
            params: args.clone(),
        },
    };

    Ok(NodeRecord {
        kind,
        link: stmt.link,
        func,
        args,
        deps,
    })
}

impl NodeRecord {
    /// call evaluates the node function over argument values supplied in
    /// `args` order.
    pub fn call(&self, args: &[Value], reg: &FunctionRegistry) -> Result<NodeValue> {
        if args.len() != self.args.len() {
            return comp_err!(
                Generic,
                format!("node takes {} arguments, got {}", self.args.len(), args.len())
            );
        }
        match &self.func {
            NodeFn::Constant(v) => Ok(NodeValue::Value(v.clone())),
            NodeFn::Identity => Ok(NodeValue::Value(args[0].clone())),
            NodeFn::SliceGet(entries) => {
                let a = match args[0].as_array() {
                    Some(a) => a,
                    None => return comp_err!(ShapeMismatch, "indexing into a scalar"),
                };
                Ok(NodeValue::Value(index_array(a, entries)?))
            }
            NodeFn::Compiled { expr, params } => {
                let scope: HashMap<&str, &Value> = params
                    .iter()
                    .map(|p| p.as_str())
                    .zip(args.iter())
                    .collect();
                eval_full(expr, &scope, reg)
            }
        }
    }
}

fn index_array(a: &DenseArray, entries: &Subscript) -> Result<Value> {
    let elems = footprint(entries);
    let mut cells = Vec::with_capacity(elems.len());
    for idx in &elems {
        match a.offset(idx) {
            Some(off) => cells.push(a.cells[off]),
            None => {
                return comp_err!(
                    ShapeMismatch,
                    format!("index {:?} out of bounds for shape {:?}", idx, a.shape)
                )
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
        Ok(Value::Array(DenseArray { shape, cells }))
    } else {
        Ok(Value::Scalar(cells[0]))
    }
}

fn want_value(nv: NodeValue) -> Result<Value> {
    match nv {
        NodeValue::Value(v) => Ok(v),
        NodeValue::Dist(_) => comp_err!(
            UnsupportedExpression,
            "distribution used where a value is required"
        ),
    }
}

fn want_scalar_value(nv: NodeValue) -> Result<f64> {
    match want_value(nv)?.as_f64() {
        Some(x) => Ok(x),
        None => comp_err!(UnsupportedExpression, "expected a scalar"),
    }
}

/// eval_full interprets a compiled node expression against a complete
/// argument scope; unlike the partial evaluator it must produce a result
/// and it is the only place distribution objects come to life.
fn eval_full(
    expr: &Expr,
    scope: &HashMap<&str, &Value>,
    reg: &FunctionRegistry,
) -> Result<NodeValue> {
    let v = match expr {
        Expr::Int(n) => NodeValue::Value(Value::Scalar(Scalar::Int(*n))),
        Expr::Real(x) => NodeValue::Value(Value::Scalar(Scalar::Real(*x))),
        Expr::ConstArray(a) => NodeValue::Value(Value::Array(a.clone())),
        Expr::Var(id) => match scope.get(id.as_str()) {
            Some(v) => NodeValue::Value((*v).clone()),
            None => return comp_err!(Generic, format!("missing argument {}", id)),
        },
        Expr::Ref(name, indices) => {
            let a = match scope.get(name.as_str()) {
                Some(Value::Array(a)) => a,
                Some(Value::Scalar(_)) => {
                    return comp_err!(ShapeMismatch, format!("{} is not an array", name))
                }
                None => return comp_err!(Generic, format!("missing argument {}", name)),
            };
            let mut entries: Subscript = SmallVec::new();
            for (axis, idx) in indices.iter().enumerate() {
                let entry = match idx {
                    Expr::Range(lo, hi) => {
                        let lo = scalar_of(eval_full(lo, scope, reg)?)?;
                        let hi = scalar_of(eval_full(hi, scope, reg)?)?;
                        IndexEntry::Range(lo.as_index()?, hi.as_index()?)
                    }
                    Expr::Colon => {
                        if axis >= a.shape.len() {
                            return comp_err!(ShapeMismatch, expr);
                        }
                        IndexEntry::Range(1, a.shape[axis] as i64)
                    }
                    _ => {
                        let s = scalar_of(eval_full(idx, scope, reg)?)?;
                        IndexEntry::Int(s.as_index()?)
                    }
                };
                entries.push(entry);
            }
            NodeValue::Value(index_array(a, &entries)?)
        }
        Expr::Call(func, args) => return eval_full_call(func, args, scope, reg),
        Expr::Range(_, _) | Expr::Colon => {
            return comp_err!(UnsupportedExpression, expr)
        }
    };
    Ok(v)
}

fn scalar_of(nv: NodeValue) -> Result<Scalar> {
    match want_value(nv)? {
        Value::Scalar(s) => Ok(s),
        Value::Array(_) => comp_err!(UnsupportedExpression, "expected a scalar"),
    }
}

fn eval_full_call(
    func: &str,
    args: &[Expr],
    scope: &HashMap<&str, &Value>,
    reg: &FunctionRegistry,
) -> Result<NodeValue> {
    if is_bounding_fn(func) {
        let base = match eval_full(&args[0], scope, reg)? {
            NodeValue::Dist(d) => d,
            NodeValue::Value(_) => return comp_err!(UndefinedDistribution, &args[0]),
        };
        let one_sided = func.ends_with("_lower") || func.ends_with("_upper");
        let (lower, upper) = match (one_sided, args.len()) {
            (false, 3) => (
                Some(want_scalar_value(eval_full(&args[1], scope, reg)?)?),
                Some(want_scalar_value(eval_full(&args[2], scope, reg)?)?),
            ),
            (true, 2) => {
                let b = want_scalar_value(eval_full(&args[1], scope, reg)?)?;
                if func.ends_with("_lower") {
                    (Some(b), None)
                } else {
                    (None, Some(b))
                }
            }
            _ => return comp_err!(BadDistributionArgs, func),
        };
        return Ok(NodeValue::Dist(bound(func, base, lower, upper)?));
    }

    if is_distribution_fn(func) {
        let values: Result<Vec<Value>> = args
            .iter()
            .map(|a| want_value(eval_full(a, scope, reg)?))
            .collect();
        return Ok(NodeValue::Dist(construct(func, &values?)?));
    }

    if func == "cdf" || func == "pdf" {
        if args.len() != 2 {
            return comp_err!(BadFunctionArgs, func);
        }
        let d = match eval_full(&args[0], scope, reg)? {
            NodeValue::Dist(d) => d,
            NodeValue::Value(_) => return comp_err!(UndefinedDistribution, &args[0]),
        };
        let x = want_scalar_value(eval_full(&args[1], scope, reg)?)?;
        let out = if func == "cdf" {
            d.cdf(x)?
        } else {
            d.log_density(&Value::Scalar(Scalar::Real(x)))?.exp()
        };
        return Ok(NodeValue::Value(Value::Scalar(Scalar::Real(out))));
    }

    let values: Result<Vec<Value>> = args
        .iter()
        .map(|a| want_value(eval_full(a, scope, reg)?))
        .collect();
    let values = values?;

    if builtin_arity(func).is_some() {
        return Ok(NodeValue::Value(apply_builtin(func, &values)?));
    }
    match reg.lookup(func) {
        Some((arity, Some(native))) => {
            if values.len() != arity {
                return comp_err!(BadFunctionArgs, func);
            }
            Ok(NodeValue::Value(native(&values)?))
        }
        _ => comp_err!(UndefinedFunction, func),
    }
}
