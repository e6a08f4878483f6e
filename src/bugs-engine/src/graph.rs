// Copyright 2025 The Bugs Engine Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! The dependency graph: one vertex per model variable, auxiliary
//! (function-less) vertices for scalarized slice elements, edges directed
//! dependency → dependent.  The topological sort is stable with respect to
//! statement discovery order so compilation is deterministic.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, BTreeSet, HashMap};

use log::debug;

use crate::common::Result;
use crate::comp_err;
use crate::env::Env;
use crate::node::NodeRecord;
use crate::variable::VarId;

#[derive(Clone, Debug)]
pub struct Vertex {
    pub var: VarId,
    /// None marks an auxiliary vertex: a scalarized slice element or a
    /// referenced cell with no statement of its own.
    pub node: Option<NodeRecord>,
}

#[derive(Clone, Debug, Default)]
pub struct Graph {
    vertices: Vec<Vertex>,
    index: HashMap<VarId, usize>,
    out_edges: Vec<BTreeSet<usize>>,
}

impl Graph {
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn vertex(&self, i: usize) -> &Vertex {
        &self.vertices[i]
    }

    pub fn vertices(&self) -> impl Iterator<Item = &Vertex> {
        self.vertices.iter()
    }

    pub fn contains(&self, var: &VarId) -> bool {
        self.index.contains_key(var)
    }

    pub fn node(&self, var: &VarId) -> Option<&NodeRecord> {
        self.index
            .get(var)
            .and_then(|&i| self.vertices[i].node.as_ref())
    }

    pub fn successors(&self, var: &VarId) -> Vec<&VarId> {
        match self.index.get(var) {
            Some(&i) => self.out_edges[i]
                .iter()
                .map(|&j| &self.vertices[j].var)
                .collect(),
            None => vec![],
        }
    }

    fn ensure_vertex(&mut self, var: &VarId) -> usize {
        if let Some(&i) = self.index.get(var) {
            return i;
        }
        let i = self.vertices.len();
        self.vertices.push(Vertex {
            var: var.clone(),
            node: None,
        });
        self.out_edges.push(BTreeSet::new());
        self.index.insert(var.clone(), i);
        i
    }

    fn add_edge(&mut self, from: usize, to: usize) {
        self.out_edges[from].insert(to);
    }

    /// build inserts one vertex per node record (in discovery order), wires
    /// dependency edges and slice fan-outs, and validates that every
    /// referenced cell is produced by something.
    pub(crate) fn build(nodes: Vec<(VarId, NodeRecord)>, env: &Env) -> Result<Graph> {
        let mut g = Graph::default();

        for (var, _) in &nodes {
            g.ensure_vertex(var);
        }

        for (var, record) in nodes {
            let vi = g.index[&var];

            for dep in &record.deps {
                let di = g.ensure_vertex(dep);
                g.add_edge(di, vi);
            }

            // a slice assignment produces each of its scalarized elements
            if var.is_slice() {
                for idx in var.scalarize() {
                    let element = var.element_var(&idx);
                    let ei = g.ensure_vertex(&element);
                    g.add_edge(vi, ei);
                }
            }

            g.vertices[vi].node = Some(record);
        }

        // every auxiliary vertex must be produced by a slice assignment or
        // already determined in the environment
        let mut in_degree = vec![0usize; g.len()];
        for targets in &g.out_edges {
            for &t in targets {
                in_degree[t] += 1;
            }
        }
        for (i, vertex) in g.vertices.iter().enumerate() {
            if vertex.node.is_none() && in_degree[i] == 0 && !env.var_determined(&vertex.var) {
                return comp_err!(UndefinedVariable, vertex.var);
            }
        }

        debug!("dependency graph: {} vertices", g.len());
        Ok(g)
    }

    /// toposort returns vertex indices in dependency order, breaking ties
    /// by discovery order.  A cycle is fatal.
    pub fn toposort(&self) -> Result<Vec<usize>> {
        let n = self.len();
        let mut in_degree = vec![0usize; n];
        for targets in &self.out_edges {
            for &t in targets {
                in_degree[t] += 1;
            }
        }

        let mut ready: BinaryHeap<Reverse<usize>> = (0..n)
            .filter(|&i| in_degree[i] == 0)
            .map(Reverse)
            .collect();
        let mut order = Vec::with_capacity(n);
        while let Some(Reverse(i)) = ready.pop() {
            order.push(i);
            for &t in &self.out_edges[i] {
                in_degree[t] -= 1;
                if in_degree[t] == 0 {
                    ready.push(Reverse(t));
                }
            }
        }

        if order.len() < n {
            let stuck = (0..n)
                .find(|&i| in_degree[i] > 0)
                .map(|i| self.vertices[i].var.to_string())
                .unwrap_or_default();
            return comp_err!(CycleInDependencyGraph, stuck);
        }
        Ok(order)
    }
}
