//! Flow graph built from a recipe
//!
//! Nodes and edges live in arenas owned by the graph and refer to each other
//! by `NodeIndex` / `EdgeIndex`. The graph is immutable once built.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;

use tracing::{debug, warn};

use crate::condition::{parse_check, parse_claims};
use crate::error::FlowError;
use crate::graph::{
    all_input_paths, BackwardsPath, Claim, Condition, DeclaredCheck, Edge, EdgeIndex, EdgeKind, FlowModifier, Node,
    NodeIndex, NodeKind, StoreInfo, StoreRef,
};
use crate::recipe::{Binding, Direction, ParticleDecl, Recipe};

/// Graph of particles, handles and slots joined by directed connection edges
#[derive(Debug)]
pub struct FlowGraph {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    particles: Vec<NodeIndex>,
    handles: Vec<NodeIndex>,
    slots: Vec<NodeIndex>,
    /// particle name -> node
    particle_map: HashMap<String, NodeIndex>,
}

impl FlowGraph {
    /// Validates `recipe` and builds its graph.
    pub fn from_recipe(recipe: &Recipe) -> Result<Self, FlowError> {
        recipe.validate()?;
        GraphBuilder::new(recipe).build()
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, FlowError> {
        Self::from_recipe(&Recipe::from_yaml(yaml)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, FlowError> {
        Self::from_recipe(&Recipe::from_file(path)?)
    }

    #[inline]
    pub fn node(&self, index: NodeIndex) -> &Node {
        &self.nodes[index.0]
    }

    #[inline]
    pub fn edge(&self, index: EdgeIndex) -> &Edge {
        &self.edges[index.0]
    }

    /// Edges in construction order (`E0`, `E1`, ...)
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn particles(&self) -> impl Iterator<Item = &Node> + '_ {
        self.particles.iter().map(|&i| self.node(i))
    }

    pub fn handles(&self) -> impl Iterator<Item = &Node> + '_ {
        self.handles.iter().map(|&i| self.node(i))
    }

    pub fn slots(&self) -> impl Iterator<Item = &Node> + '_ {
        self.slots.iter().map(|&i| self.node(i))
    }

    /// Particles, then handles, then slots
    pub fn nodes(&self) -> impl Iterator<Item = &Node> + '_ {
        self.particles().chain(self.handles()).chain(self.slots())
    }

    #[inline]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn particle_map(&self) -> &HashMap<String, NodeIndex> {
        &self.particle_map
    }

    pub fn particle(&self, name: &str) -> Option<&Node> {
        self.particle_map.get(name).map(|&i| self.node(i))
    }

    /// Handle -> particle edge for the named input connection
    pub fn in_edge_by_name(&self, particle: NodeIndex, connection: &str) -> Option<&Edge> {
        self.node(particle)
            .in_edges
            .iter()
            .map(|&i| self.edge(i))
            .find(|e| e.kind == EdgeKind::Input && e.connection_name == connection)
    }

    /// Particle -> handle edge for the named output connection
    pub fn out_edge_by_name(&self, particle: NodeIndex, connection: &str) -> Option<&Edge> {
        self.node(particle)
            .out_edges
            .iter()
            .map(|&i| self.edge(i))
            .find(|e| e.kind == EdgeKind::Output && e.connection_name == connection)
    }

    fn find_store(&self, store: &StoreRef) -> Result<(NodeIndex, &StoreInfo), FlowError> {
        let mut found = self.handles.iter().filter_map(|&h| {
            let info = self.node(h).store()?;
            let matches = match store {
                StoreRef::Name(name) => &info.name == name,
                StoreRef::Id(id) => info.effective_id() == id,
            };
            matches.then_some((h, info))
        });

        let first = found.next().ok_or_else(|| match store {
            StoreRef::Name(name) => FlowError::StoreNameNotFound { name: name.clone() },
            StoreRef::Id(id) => FlowError::StoreIdNotFound { id: id.clone() },
        })?;
        if found.next().is_some() {
            return Err(FlowError::AmbiguousStore {
                store: store.to_string(),
            });
        }
        Ok(first)
    }

    /// Handle node backed by the referenced store
    pub fn store_handle(&self, store: &StoreRef) -> Result<NodeIndex, FlowError> {
        self.find_store(store).map(|(handle, _)| handle)
    }

    /// Id of the referenced store (its name when declared without an id)
    pub fn resolve_store_ref(&self, store: &StoreRef) -> Result<&str, FlowError> {
        self.find_store(store).map(|(_, info)| info.effective_id())
    }

    /// `Writer.out -> Reader.in` for every handle linking an output to an input
    pub fn connections_as_strings(&self) -> Vec<String> {
        let mut connections = Vec::new();
        for handle in self.handles() {
            for &writer in &handle.in_edges {
                for &reader in &handle.out_edges {
                    connections.push(format!("{} -> {}", self.edge(writer).label, self.edge(reader).label));
                }
            }
        }
        connections
    }

    /// Every maximal cycle-free backward path ending at `edge`
    pub fn input_paths(&self, edge: EdgeIndex) -> Vec<BackwardsPath> {
        all_input_paths(self, edge)
    }

    fn check_unique_ids(&self) -> Result<(), FlowError> {
        let mut seen: HashSet<&str> = HashSet::with_capacity(self.nodes.len() + self.edges.len());
        let ids = self
            .nodes
            .iter()
            .map(|n| n.node_id.as_str())
            .chain(self.edges.iter().map(|e| e.edge_id.as_str()));
        for id in ids {
            if !seen.insert(id) {
                return Err(FlowError::DuplicateId { id: id.to_string() });
            }
        }
        Ok(())
    }
}

impl fmt::Display for FlowGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Nodes:")?;
        for node in self.nodes() {
            writeln!(f, "  {node}")?;
        }
        writeln!(f, "Edges:")?;
        for edge in &self.edges {
            writeln!(
                f,
                "  {} -> {}  {edge}",
                self.node(edge.start).node_id,
                self.node(edge.end).node_id
            )?;
        }
        Ok(())
    }
}

// ============================================================================
// CONSTRUCTION
// ============================================================================

struct GraphBuilder<'r> {
    recipe: &'r Recipe,
    graph: FlowGraph,
    handle_map: HashMap<&'r str, NodeIndex>,
    slot_map: HashMap<&'r str, NodeIndex>,
}

impl<'r> GraphBuilder<'r> {
    fn new(recipe: &'r Recipe) -> Self {
        let capacity = recipe.particles.len();
        Self {
            recipe,
            graph: FlowGraph {
                nodes: Vec::with_capacity(capacity),
                edges: Vec::new(),
                particles: Vec::with_capacity(capacity),
                handles: Vec::new(),
                slots: Vec::new(),
                particle_map: HashMap::with_capacity(capacity),
            },
            handle_map: HashMap::new(),
            slot_map: HashMap::new(),
        }
    }

    fn build(mut self) -> Result<FlowGraph, FlowError> {
        let recipe = self.recipe;

        for particle in &recipe.particles {
            let index = self.add_node(NodeKind::Particle {
                name: particle.name.clone(),
            });
            self.graph.particle_map.insert(particle.name.clone(), index);
        }

        let particles: Vec<(NodeIndex, &'r ParticleDecl)> =
            self.graph.particles.iter().copied().zip(&recipe.particles).collect();

        for &(index, decl) in &particles {
            self.add_connections(index, decl)?;
        }
        for &(index, decl) in &particles {
            self.apply_particle_claims(index, decl)?;
        }
        self.apply_store_claims()?;
        self.compute_modifiers();

        // Second pass: every in-edge exists now, so derives-from claims may
        // reference each other freely.
        self.resolve_derives_from()?;

        for &(index, decl) in &particles {
            self.apply_particle_checks(index, decl)?;
        }

        self.graph.check_unique_ids()?;

        for handle in &recipe.handles {
            if !self.handle_map.contains_key(handle.name.as_str()) {
                warn!(handle = %handle.name, store = %handle.store, "handle declared but never connected");
            }
        }

        debug!(
            particles = self.graph.particles.len(),
            handles = self.graph.handles.len(),
            slots = self.graph.slots.len(),
            edges = self.graph.edges.len(),
            "built flow graph"
        );
        Ok(self.graph)
    }

    fn add_node(&mut self, kind: NodeKind) -> NodeIndex {
        let index = NodeIndex(self.graph.nodes.len());
        let (prefix, members) = match &kind {
            NodeKind::Particle { .. } => ("P", &mut self.graph.particles),
            NodeKind::Handle { .. } => ("H", &mut self.graph.handles),
            NodeKind::Slot { .. } => ("S", &mut self.graph.slots),
        };
        let node_id = format!("{prefix}{}", members.len());
        members.push(index);

        let node = Node::new(index, node_id, kind);
        debug!(%node, "added node");
        self.graph.nodes.push(node);
        index
    }

    fn handle_node(&mut self, name: &'r str) -> NodeIndex {
        if let Some(&index) = self.handle_map.get(name) {
            return index;
        }
        let store = self.recipe.store_for_handle(name).map(|s| StoreInfo {
            name: s.name.clone(),
            id: s.id.clone(),
        });
        let index = self.add_node(NodeKind::Handle {
            name: name.to_string(),
            store,
        });
        self.handle_map.insert(name, index);
        index
    }

    fn slot_node(&mut self, name: &'r str) -> NodeIndex {
        if let Some(&index) = self.slot_map.get(name) {
            return index;
        }
        let index = self.add_node(NodeKind::Slot { name: name.to_string() });
        self.slot_map.insert(name, index);
        index
    }

    fn add_edge(&mut self, kind: EdgeKind, start: NodeIndex, end: NodeIndex, particle: &str, connection: &str) {
        let index = EdgeIndex(self.graph.edges.len());
        let edge = Edge {
            index,
            edge_id: format!("E{}", index.0),
            start,
            end,
            kind,
            connection_name: connection.to_string(),
            label: format!("{particle}.{connection}"),
            claims: Vec::new(),
            check: None,
            modifier: FlowModifier::new(),
            derives_from: Vec::new(),
        };
        debug!(
            edge = %edge.edge_id,
            label = %edge.label,
            from = %self.graph.node(start).node_id,
            to = %self.graph.node(end).node_id,
            "added edge"
        );
        self.graph.nodes[start.0].out_edges.push(index);
        self.graph.nodes[end.0].in_edges.push(index);
        self.graph.edges.push(edge);
    }

    /// One edge per connection; `reads-writes` adds the input edge first.
    fn add_connections(&mut self, particle: NodeIndex, decl: &'r ParticleDecl) -> Result<(), FlowError> {
        for connection in &decl.connections {
            let binding = connection.binding().ok_or_else(|| FlowError::MissingBinding {
                particle: decl.name.clone(),
                connection: connection.name.clone(),
                expected: if connection.direction.is_slot() { "slot" } else { "handle" },
            })?;

            match binding {
                Binding::Handle(name) => {
                    let handle = self.handle_node(name);
                    if connection.direction.reads() {
                        self.add_edge(EdgeKind::Input, handle, particle, &decl.name, &connection.name);
                    }
                    if connection.direction.writes() {
                        self.add_edge(EdgeKind::Output, particle, handle, &decl.name, &connection.name);
                    }
                }
                Binding::Slot(name) => {
                    let slot = self.slot_node(name);
                    let kind = if connection.direction == Direction::Provides {
                        EdgeKind::SlotProvide
                    } else {
                        EdgeKind::SlotConsume
                    };
                    self.add_edge(kind, particle, slot, &decl.name, &connection.name);
                }
            }
        }
        Ok(())
    }

    fn apply_particle_claims(&mut self, particle: NodeIndex, decl: &ParticleDecl) -> Result<(), FlowError> {
        for (connection, text) in &decl.claims {
            let declared = decl
                .connection(connection)
                .ok_or_else(|| unknown_connection(&decl.name, connection))?;
            if !declared.direction.writes() {
                return Err(FlowError::InvalidClaimTarget {
                    particle: decl.name.clone(),
                    connection: connection.clone(),
                });
            }

            let claims = parse_claims(text)?;
            let edge = self
                .graph
                .out_edge_by_name(particle, connection)
                .map(|e| e.index)
                .ok_or_else(|| unknown_connection(&decl.name, connection))?;
            self.graph.edges[edge.0].claims = claims.clone();
            self.graph.nodes[particle.0].claims.insert(connection.clone(), claims);
        }
        Ok(())
    }

    /// Every edge leaving a store-backed handle carries the store's claims.
    fn apply_store_claims(&mut self) -> Result<(), FlowError> {
        let recipe = self.recipe;
        for handle in self.graph.handles.clone() {
            let Some(store) = self.graph.node(handle).store() else {
                continue;
            };
            let Some(text) = recipe
                .stores
                .iter()
                .find(|s| s.name == store.name)
                .and_then(|s| s.claims.as_ref())
            else {
                continue;
            };

            let claims = parse_claims(text)?;
            if claims.iter().any(|c| matches!(c, Claim::DerivesFrom { .. })) {
                return Err(FlowError::StoreDerivesFrom {
                    store: store.name.clone(),
                });
            }
            for edge in self.graph.nodes[handle.0].out_edges.clone() {
                self.graph.edges[edge.0].claims = claims.clone();
            }
        }
        Ok(())
    }

    fn compute_modifiers(&mut self) {
        let nodes = &self.graph.nodes;
        for edge in &mut self.graph.edges {
            let start_id = &nodes[edge.start.0].node_id;
            edge.modifier = FlowModifier::from_claims(&edge.edge_id, start_id, &edge.claims);
        }
    }

    fn resolve_derives_from(&mut self) -> Result<(), FlowError> {
        for i in 0..self.graph.edges.len() {
            let edge = &self.graph.edges[i];
            if edge.kind != EdgeKind::Output {
                continue;
            }
            let particle = edge.start;
            let sources: Vec<String> = edge
                .claims
                .iter()
                .filter_map(|c| match c {
                    Claim::DerivesFrom { connection } => Some(connection.clone()),
                    Claim::IsTag { .. } => None,
                })
                .collect();
            if sources.is_empty() {
                continue;
            }

            let mut derives_from = Vec::with_capacity(sources.len());
            for source in &sources {
                match self.graph.in_edge_by_name(particle, source) {
                    Some(input) => derives_from.push(input.index),
                    None => {
                        let node = self.graph.node(particle);
                        let exists = node
                            .out_edges
                            .iter()
                            .any(|&e| self.graph.edge(e).connection_name == *source);
                        let particle = node.name().to_string();
                        let connection = source.clone();
                        return Err(if exists {
                            FlowError::NotAnInput { particle, connection }
                        } else {
                            FlowError::UnknownConnection { particle, connection }
                        });
                    }
                }
            }
            debug!(edge = %self.graph.edges[i].edge_id, ?sources, "derives from");
            self.graph.edges[i].derives_from = derives_from;
        }
        Ok(())
    }

    fn apply_particle_checks(&mut self, particle: NodeIndex, decl: &ParticleDecl) -> Result<(), FlowError> {
        for (connection, text) in &decl.checks {
            let declared = decl
                .connection(connection)
                .ok_or_else(|| unknown_connection(&decl.name, connection))?;

            let mut condition = parse_check(text)?;
            condition.try_for_each_condition_mut(&mut |leaf: &mut Condition| self.resolve_condition(particle, decl, leaf))?;

            match declared.direction {
                Direction::Reads | Direction::ReadsWrites => {
                    let edge = self
                        .graph
                        .in_edge_by_name(particle, connection)
                        .map(|e| e.index)
                        .ok_or_else(|| unknown_connection(&decl.name, connection))?;
                    let check = DeclaredCheck {
                        subject: connection.clone(),
                        condition,
                    };
                    self.graph.edges[edge.0].check = Some(check.clone());
                    self.graph.nodes[particle.0].checks.insert(connection.clone(), check);
                }
                Direction::Provides => {
                    let slot = declared
                        .slot
                        .as_deref()
                        .and_then(|name| self.slot_map.get(name).copied())
                        .ok_or_else(|| FlowError::MissingBinding {
                            particle: decl.name.clone(),
                            connection: connection.clone(),
                            expected: "slot",
                        })?;
                    let check = DeclaredCheck {
                        subject: format!("{connection} data"),
                        condition,
                    };

                    let consumers: Vec<EdgeIndex> = self
                        .graph
                        .node(slot)
                        .in_edges
                        .iter()
                        .copied()
                        .filter(|&e| self.graph.edge(e).kind == EdgeKind::SlotConsume)
                        .collect();
                    if consumers.is_empty() {
                        debug!(particle = %decl.name, %connection, "slot check has no consumers");
                    }
                    for edge in consumers {
                        self.graph.edges[edge.0].check = Some(check.clone());
                    }
                    self.graph.nodes[slot.0].checks.insert(connection.clone(), check);
                }
                Direction::Writes | Direction::Consumes => {
                    return Err(FlowError::InvalidCheckTarget {
                        particle: decl.name.clone(),
                        connection: connection.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Fills in the node or edge id a `from handle` / `from output` /
    /// `from store` leaf refers to.
    fn resolve_condition(
        &self,
        particle: NodeIndex,
        decl: &ParticleDecl,
        condition: &mut Condition,
    ) -> Result<(), FlowError> {
        match condition {
            Condition::FromHandle { connection, node_id } => {
                let declared = decl
                    .connection(connection)
                    .ok_or_else(|| unknown_connection(&decl.name, connection))?;
                let handle = match declared.binding() {
                    Some(Binding::Handle(name)) => self.handle_map.get(name).copied(),
                    _ => None,
                }
                .ok_or_else(|| FlowError::NotAHandleConnection {
                    particle: decl.name.clone(),
                    connection: connection.clone(),
                })?;
                *node_id = Some(self.graph.node(handle).node_id.clone());
            }
            Condition::FromOutput { connection, edge_id } => {
                decl.connection(connection)
                    .ok_or_else(|| unknown_connection(&decl.name, connection))?;
                let output = self
                    .graph
                    .out_edge_by_name(particle, connection)
                    .ok_or_else(|| FlowError::NotAnOutput {
                        particle: decl.name.clone(),
                        connection: connection.clone(),
                    })?;
                *edge_id = Some(output.edge_id.clone());
            }
            Condition::FromStore { store, node_id } => {
                let handle = match self.graph.store_handle(store) {
                    Ok(handle) => handle,
                    Err(err @ (FlowError::StoreNameNotFound { .. } | FlowError::StoreIdNotFound { .. })) => {
                        return Err(self.unconnected_store(store).unwrap_or(err));
                    }
                    Err(err) => return Err(err),
                };
                *node_id = Some(self.graph.node(handle).node_id.clone());
            }
            Condition::Tag(_) | Condition::Node(_) | Condition::Edge(_) => {}
        }
        Ok(())
    }

    /// Error for a store the recipe declares but no connected handle reads.
    fn unconnected_store(&self, store: &StoreRef) -> Option<FlowError> {
        let declared = self.recipe.stores.iter().any(|s| match store {
            StoreRef::Name(name) => &s.name == name,
            StoreRef::Id(id) => s.id.as_ref().unwrap_or(&s.name) == id,
        });
        declared.then(|| match store {
            StoreRef::Name(name) => FlowError::StoreNotConnected {
                kind: "name",
                value: name.clone(),
            },
            StoreRef::Id(id) => FlowError::StoreNotConnected {
                kind: "id",
                value: id.clone(),
            },
        })
    }
}

fn unknown_connection(particle: &str, connection: &str) -> FlowError {
    FlowError::UnknownConnection {
        particle: particle.to_string(),
        connection: connection.to_string(),
    }
}
