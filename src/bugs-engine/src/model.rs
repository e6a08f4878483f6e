// Copyright 2025 The Bugs Engine Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! The driver pipeline: normalization, collection, the repeated-assignment
//! checks, the data-transformation fixpoint, node building, graph building
//! and final assembly of the compiled model.

use std::collections::HashMap;

use log::debug;

use crate::ast::Stmt;
use crate::builtins::FunctionRegistry;
use crate::collector::collect;
use crate::common::{Ident, Result};
use crate::comp_err;
use crate::dist::Distribution;
use crate::env::{DataEntry, Env};
use crate::graph::Graph;
use crate::node::{self, NodeKind, NodeRecord, NodeValue};
use crate::normalize::{normalize, AssignKind};
use crate::transform;
use crate::value::Value;
use crate::variable::VarId;

/// The compiled artifact: the dependency graph with per-vertex node
/// records, the topologically sorted variable list, the parameter sublist,
/// and the final environment doubling as the initial value store.
#[derive(Clone, Debug)]
pub struct CompiledModel {
    pub graph: Graph,
    pub sorted: Vec<VarId>,
    pub parameters: Vec<VarId>,
    pub env: Env,
}

/// compile runs the whole pipeline over a parsed program and a data
/// environment.  Statement order in the program carries no meaning; all
/// passes iterate to fixpoint.
pub fn compile(
    program: &[Stmt],
    data: &HashMap<Ident, DataEntry>,
    registry: &FunctionRegistry,
) -> Result<CompiledModel> {
    let mut env = Env::from_data(data)?;

    let normed = normalize(program)?;
    debug!("normalized {} top-level statements", normed.len());

    let collection = collect(&normed, &mut env, registry)?;
    debug!(
        "collected {} statement instances over {} variables",
        collection.stmts.len(),
        collection.vars.len()
    );

    transform::run(
        &collection.stmts,
        &mut env,
        registry,
        &collection.deferred_data,
    )?;
    collection.checker.finalize(&env)?;

    // demotion: logical variables that became fully data-resolved are
    // pseudo-data now and leave the model; their stochastic counterparts
    // (if any) stay as observed nodes
    let mut nodes: Vec<(VarId, NodeRecord)> = Vec::new();
    for stmt in &collection.stmts {
        if stmt.kind == AssignKind::Logical && env.var_determined(&stmt.var) {
            continue;
        }
        let record = node::build(stmt, &env, registry)?;
        nodes.push((stmt.var.clone(), record));
    }
    debug!("built {} node records", nodes.len());

    let graph = Graph::build(nodes, &env)?;
    let order = graph.toposort()?;

    let sorted: Vec<VarId> = order
        .iter()
        .map(|&i| graph.vertex(i).var.clone())
        .collect();
    let parameters: Vec<VarId> = order
        .iter()
        .filter_map(|&i| {
            let vertex = graph.vertex(i);
            match &vertex.node {
                Some(record)
                    if record.kind == NodeKind::Stochastic
                        && !env.var_determined(&vertex.var) =>
                {
                    Some(vertex.var.clone())
                }
                _ => None,
            }
        })
        .collect();
    debug!(
        "compiled model: {} vertices, {} parameters",
        sorted.len(),
        parameters.len()
    );

    Ok(CompiledModel {
        graph,
        sorted,
        parameters,
        env,
    })
}

impl CompiledModel {
    fn gather_args(&self, record: &NodeRecord, env: &Env) -> Result<Vec<Value>> {
        record
            .args
            .iter()
            .map(|name| match env.materialize(name) {
                Some(v) => Ok(v),
                None => comp_err!(
                    Generic,
                    format!("argument {} is not fully determined", name)
                ),
            })
            .collect()
    }

    /// eval_logical computes every logical node in topological order into
    /// the given environment (typically a clone of `self.env` extended with
    /// parameter values).  This is the ordering guarantee the compiler
    /// makes to its consumers.
    pub fn eval_logical(&self, env: &mut Env, registry: &FunctionRegistry) -> Result<()> {
        for var in &self.sorted {
            let record = match self.graph.node(var) {
                Some(record) if record.kind == NodeKind::Logical => record,
                _ => continue,
            };
            if env.var_determined(var) {
                continue;
            }
            let args = self.gather_args(record, env)?;
            match record.call(&args, registry)? {
                NodeValue::Value(value) => env.write_var(var, &value)?,
                NodeValue::Dist(_) => {
                    return comp_err!(
                        UnsupportedExpression,
                        format!("logical node {} produced a distribution", var)
                    )
                }
            }
        }
        Ok(())
    }

    /// node_distribution evaluates one stochastic node's distribution
    /// against an environment in which its arguments are determined.
    pub fn node_distribution(
        &self,
        var: &VarId,
        env: &Env,
        registry: &FunctionRegistry,
    ) -> Result<Distribution> {
        let record = match self.graph.node(var) {
            Some(record) if record.kind == NodeKind::Stochastic => record,
            _ => return comp_err!(UndefinedVariable, var),
        };
        let args = self.gather_args(record, env)?;
        match record.call(&args, registry)? {
            NodeValue::Dist(d) => Ok(d),
            NodeValue::Value(_) => comp_err!(
                UndefinedDistribution,
                format!("stochastic node {} produced a plain value", var)
            ),
        }
    }
}
