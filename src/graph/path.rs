//! Cycle-free backward paths
//!
//! A `BackwardsPath` starts at the destination of a checked edge and grows
//! toward the sources of the data. `nodes` and `edges` are kept in walk
//! order (latest edge first); `edges_in_flow_order()` reverses them.
//!
//! An in-edge that leaves the walk's start node would close a cycle through
//! the checked particle. Enumeration records it as the path's closing edge:
//! the data originates at the checked particle's own output, and the path
//! stops there.

use tracing::trace;

use super::node::{Edge, EdgeIndex, EdgeKind, NodeIndex};
use crate::error::FlowError;
use crate::flow_graph::FlowGraph;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackwardsPath {
    nodes: Vec<NodeIndex>,
    edges: Vec<EdgeIndex>,
    closing_edge: Option<EdgeIndex>,
}

impl BackwardsPath {
    /// Single-edge path: from the edge's end back to its start.
    pub fn from_edge(edge: &Edge) -> Self {
        Self {
            nodes: vec![edge.end, edge.start],
            edges: vec![edge.index],
            closing_edge: None,
        }
    }

    /// New path extended backward by `edge`.
    pub fn with_new_edge(&self, edge: &Edge) -> Result<Self, FlowError> {
        if edge.end != self.end_node() {
            return Err(FlowError::PathDisconnected {
                edge_id: edge.edge_id.clone(),
            });
        }
        if self.nodes.contains(&edge.start) {
            return Err(FlowError::PathCycle {
                edge_id: edge.edge_id.clone(),
            });
        }

        let mut nodes = Vec::with_capacity(self.nodes.len() + 1);
        nodes.extend_from_slice(&self.nodes);
        nodes.push(edge.start);
        let mut edges = Vec::with_capacity(self.edges.len() + 1);
        edges.extend_from_slice(&self.edges);
        edges.push(edge.index);
        Ok(Self {
            nodes,
            edges,
            closing_edge: None,
        })
    }

    /// Copy of the path ending in an edge that leaves the start node.
    fn closed_by(&self, edge: EdgeIndex) -> Self {
        Self {
            closing_edge: Some(edge),
            ..self.clone()
        }
    }

    /// Node the walk began at (end of the checked edge).
    #[inline]
    pub fn start_node(&self) -> NodeIndex {
        self.nodes[0]
    }

    /// Node the walk has reached so far.
    #[inline]
    pub fn end_node(&self) -> NodeIndex {
        self.nodes[self.nodes.len() - 1]
    }

    /// Edge most recently added to the walk.
    #[inline]
    pub fn end_edge(&self) -> EdgeIndex {
        self.edges[self.edges.len() - 1]
    }

    pub fn nodes(&self) -> &[NodeIndex] {
        &self.nodes
    }

    pub fn edges(&self) -> &[EdgeIndex] {
        &self.edges
    }

    /// Output of the checked particle the data looped back from, if any
    #[inline]
    pub fn closing_edge(&self) -> Option<EdgeIndex> {
        self.closing_edge
    }

    /// Edges in data-flow order, earliest first. The closing edge leads.
    pub fn edges_in_flow_order(&self) -> impl Iterator<Item = EdgeIndex> + '_ {
        self.closing_edge
            .into_iter()
            .chain(self.edges.iter().rev().copied())
    }

    /// `Particle.connection` labels joined by ` -> `, earliest first.
    pub fn to_label_string(&self, graph: &FlowGraph) -> String {
        self.edges_in_flow_order()
            .map(|index| graph.edge(index).label.as_str())
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}

/// In-edges the walk may continue through from `path.end_node()`.
///
/// When the path entered a particle through an output with `derives from`
/// claims, only those inputs are eligible.
fn incoming<'g>(graph: &'g FlowGraph, path: &BackwardsPath) -> &'g [EdgeIndex] {
    let end_edge = graph.edge(path.end_edge());
    if end_edge.kind == EdgeKind::Output && !end_edge.derives_from.is_empty() {
        &end_edge.derives_from
    } else {
        &graph.node(path.end_node()).in_edges
    }
}

/// Enumerates every maximal cycle-free backward path ending at `edge`.
///
/// Depth-first, in in-edge order. A path is complete when no in-edge of its
/// end node extends it without closing a cycle, or when it is closed by an
/// edge leaving its start node.
pub fn all_input_paths(graph: &FlowGraph, edge: EdgeIndex) -> Vec<BackwardsPath> {
    let mut complete = Vec::new();
    let mut stack = vec![BackwardsPath::from_edge(graph.edge(edge))];

    while let Some(path) = stack.pop() {
        if path.closing_edge.is_some() {
            complete.push(path);
            continue;
        }

        let mut extensions: Vec<BackwardsPath> = Vec::new();
        for &next in incoming(graph, &path) {
            let next = graph.edge(next);
            match path.with_new_edge(next) {
                Ok(extended) => extensions.push(extended),
                Err(FlowError::PathCycle { .. }) if next.start == path.start_node() => {
                    extensions.push(path.closed_by(next.index));
                }
                Err(err) => trace!(%err, "skipping edge"),
            }
        }

        if extensions.is_empty() {
            complete.push(path);
        } else {
            // Reversed so the first in-edge is explored first.
            stack.extend(extensions.into_iter().rev());
        }
    }

    complete
}
