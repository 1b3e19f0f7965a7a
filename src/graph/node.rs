//! Arena-indexed nodes and edges of the flow graph

use std::collections::BTreeMap;
use std::fmt;

use super::internals::{Claim, DeclaredCheck, FlowModifier};

/// Index of a node in the graph arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIndex(pub usize);

/// Index of an edge in the graph arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeIndex(pub usize);

/// Store bound to a handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreInfo {
    pub name: String,
    pub id: Option<String>,
}

impl StoreInfo {
    /// Declared id, or the name when no id was given.
    pub fn effective_id(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Particle { name: String },
    Handle { name: String, store: Option<StoreInfo> },
    Slot { name: String },
}

#[derive(Debug, Clone)]
pub struct Node {
    pub index: NodeIndex,
    pub node_id: String,
    pub kind: NodeKind,
    pub in_edges: Vec<EdgeIndex>,
    pub out_edges: Vec<EdgeIndex>,
    /// Output connection name -> declared claims (particles only)
    pub claims: BTreeMap<String, Vec<Claim>>,
    /// Connection name -> check guarding it
    pub checks: BTreeMap<String, DeclaredCheck>,
}

impl Node {
    pub(crate) fn new(index: NodeIndex, node_id: String, kind: NodeKind) -> Self {
        Self {
            index,
            node_id,
            kind,
            in_edges: Vec::new(),
            out_edges: Vec::new(),
            claims: BTreeMap::new(),
            checks: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        match &self.kind {
            NodeKind::Particle { name } | NodeKind::Handle { name, .. } | NodeKind::Slot { name } => name,
        }
    }

    #[inline]
    pub fn is_particle(&self) -> bool {
        matches!(self.kind, NodeKind::Particle { .. })
    }

    pub fn store(&self) -> Option<&StoreInfo> {
        match &self.kind {
            NodeKind::Handle { store, .. } => store.as_ref(),
            _ => None,
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            NodeKind::Particle { name } => write!(f, "{} particle {name}", self.node_id),
            NodeKind::Handle { name, store: None } => write!(f, "{} handle {name}", self.node_id),
            NodeKind::Handle {
                name,
                store: Some(store),
            } => write!(f, "{} handle {name} (store {})", self.node_id, store.name),
            NodeKind::Slot { name } => write!(f, "{} slot {name}", self.node_id),
        }
    }
}

/// Role of an edge relative to the particle that declares it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    /// handle -> particle
    Input,
    /// particle -> handle
    Output,
    /// particle -> provided slot
    SlotProvide,
    /// consumer particle -> consumed slot
    SlotConsume,
}

#[derive(Debug, Clone)]
pub struct Edge {
    pub index: EdgeIndex,
    pub edge_id: String,
    pub start: NodeIndex,
    pub end: NodeIndex,
    pub kind: EdgeKind,
    pub connection_name: String,
    /// `Particle.connection`
    pub label: String,
    pub claims: Vec<Claim>,
    pub check: Option<DeclaredCheck>,
    pub modifier: FlowModifier,
    /// Input edges an output is restricted to (empty means all inputs)
    pub derives_from: Vec<EdgeIndex>,
}

impl Edge {
    /// Bare edge with an id-only modifier.
    #[cfg(test)]
    pub(crate) fn new(index: EdgeIndex, start: (NodeIndex, &str), end: NodeIndex, label: &str) -> Self {
        let edge_id = format!("E{}", index.0);
        let modifier = FlowModifier::from_claims(&edge_id, start.1, &[]);
        let connection_name = label.rsplit('.').next().unwrap_or(label).to_string();
        Self {
            index,
            edge_id,
            start: start.0,
            end,
            kind: EdgeKind::Output,
            connection_name,
            label: label.to_string(),
            claims: Vec::new(),
            check: None,
            modifier,
            derives_from: Vec::new(),
        }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.edge_id, self.label, self.modifier)?;
        if let Some(check) = &self.check {
            write!(f, " [{check}]")?;
        }
        Ok(())
    }
}
