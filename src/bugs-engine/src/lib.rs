// Copyright 2025 The Bugs Engine Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! A compiler from BUGS model programs and data environments to evaluable
//! probabilistic graphs.  The input is a parsed program body (the surface
//! parser is a separate concern) plus a data mapping; the output is a
//! topologically sorted dependency graph with one node function per model
//! variable, ready for an MCMC consumer to evaluate.

#![forbid(unsafe_code)]

pub mod ast;
pub mod builtins;
mod checker;
mod collector;
pub mod common;
pub mod dist;
mod env;
mod eval;
mod float;
mod graph;
pub mod json;
mod model;
mod node;
mod normalize;
mod transform;
pub mod value;
pub mod variable;

#[cfg(test)]
mod eval_proptest;
#[cfg(test)]
mod testutils;

pub use self::ast::{Expr, Lhs, Stmt, TruncBounds};
pub use self::builtins::{is_builtin_fn, FunctionRegistry, NativeFn};
pub use self::common::{canonicalize, Error, ErrorCode, Ident, Result};
pub use self::dist::{is_distribution_fn, Distribution};
pub use self::env::{DataEntry, Env};
pub use self::graph::{Graph, Vertex};
pub use self::model::{compile, CompiledModel};
pub use self::node::{NodeFn, NodeKind, NodeRecord, NodeValue};
pub use self::normalize::{AssignKind, LinkFn};
pub use self::value::{ArrayValue, DenseArray, Scalar, Value};
pub use self::variable::{IndexEntry, VarId};
