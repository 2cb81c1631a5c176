//! Topological ordering of a dependency graph.
//!
//! An edge runs from the blocking node to the blocked node. [`sort_dag`] is
//! Kahn's algorithm: nodes with no blockers seed the ready queue, and
//! retiring a node releases every node it was blocking. Whatever edges are
//! left once the queue drains form the cycles, and all of them are reported.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;
use thiserror::Error;

/// A graph node and the names of the nodes that must come before it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DagNode {
    pub name: String,
    pub blocked_by: Vec<String>,
}

impl DagNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            blocked_by: Vec::new(),
        }
    }

    pub fn blocked_by(mut self, name: impl Into<String>) -> Self {
        self.blocked_by.push(name.into());
        self
    }
}

/// `from` must be processed before `to`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Edge {
    pub from: String,
    pub to: String,
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DagError {
    #[error("node {0} is declared more than once")]
    DuplicateNode(String),

    #[error("{node} is blocked by unknown node {blocker}")]
    UnknownNode { node: String, blocker: String },

    #[error("dependency cycle: {}", join_edges(.edges))]
    Cycle { edges: Vec<Edge> },
}

fn join_edges(edges: &[Edge]) -> String {
    edges
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Order `nodes` so every blocker precedes the nodes it blocks.
///
/// Ties keep input order, so the result is deterministic.
pub fn sort_dag(nodes: &[DagNode]) -> Result<Vec<String>, DagError> {
    let mut index = BTreeMap::new();
    for (i, node) in nodes.iter().enumerate() {
        if index.insert(node.name.as_str(), i).is_some() {
            return Err(DagError::DuplicateNode(node.name.clone()));
        }
    }

    // Outgoing edges per node, and the count of unretired incoming edges.
    let mut outgoing: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    let mut incoming = vec![0usize; nodes.len()];
    let mut edges = BTreeSet::new();
    for (to, node) in nodes.iter().enumerate() {
        for blocker in &node.blocked_by {
            let Some(&from) = index.get(blocker.as_str()) else {
                return Err(DagError::UnknownNode {
                    node: node.name.clone(),
                    blocker: blocker.clone(),
                });
            };
            if edges.insert((from, to)) {
                outgoing[from].push(to);
                incoming[to] += 1;
            }
        }
    }

    let mut ready: VecDeque<usize> = (0..nodes.len()).filter(|&i| incoming[i] == 0).collect();
    let mut order = Vec::with_capacity(nodes.len());
    while let Some(current) = ready.pop_front() {
        order.push(nodes[current].name.clone());
        for &next in &outgoing[current] {
            edges.remove(&(current, next));
            incoming[next] -= 1;
            if incoming[next] == 0 {
                ready.push_back(next);
            }
        }
    }

    if !edges.is_empty() {
        let edges = edges
            .into_iter()
            .map(|(from, to)| Edge {
                from: nodes[from].name.clone(),
                to: nodes[to].name.clone(),
            })
            .collect();
        return Err(DagError::Cycle { edges });
    }
    Ok(order)
}
