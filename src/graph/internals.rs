//! Flow state, flow deltas, claims and check trees
//!
//! Pure data plus small pure operations. Nothing here walks the graph.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use crate::collections::{OrderedSet, UniqueString};
use crate::error::FlowError;

/// What a claim does to one tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagOperation {
    Add,
    Remove,
}

/// Provenance assertion attached to one output connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Claim {
    /// "output is (not) tagged `tag`"
    IsTag { is_not: bool, tag: String },
    /// "output derives from input `connection`" (restricts the backward walk)
    DerivesFrom { connection: String },
}

impl Claim {
    pub fn is_tag(tag: impl Into<String>) -> Self {
        Claim::IsTag {
            is_not: false,
            tag: tag.into(),
        }
    }

    pub fn is_not_tag(tag: impl Into<String>) -> Self {
        Claim::IsTag {
            is_not: true,
            tag: tag.into(),
        }
    }
}

impl fmt::Display for Claim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Claim::IsTag { is_not: false, tag } => write!(f, "is {tag}"),
            Claim::IsTag { is_not: true, tag } => write!(f, "is not {tag}"),
            Claim::DerivesFrom { connection } => write!(f, "derives from {connection}"),
        }
    }
}

/// Reference to a data store, by name or by id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreRef {
    Name(String),
    Id(String),
}

impl fmt::Display for StoreRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreRef::Name(name) => write!(f, "{name}"),
            StoreRef::Id(id) => write!(f, "'{id}'"),
        }
    }
}

/// Leaf predicate of a check tree.
///
/// `FromHandle` and `FromStore` carry the node id they resolve to, and
/// `FromOutput` the id of the output edge; the graph builder fills them in
/// and refuses to build a graph with an unresolved reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    Tag(String),
    Node(String),
    Edge(String),
    FromHandle {
        connection: String,
        node_id: Option<String>,
    },
    FromStore {
        store: StoreRef,
        node_id: Option<String>,
    },
    FromOutput {
        connection: String,
        edge_id: Option<String>,
    },
}

impl Condition {
    fn holds(&self, flow: &Flow) -> bool {
        match self {
            Condition::Tag(tag) => flow.tags.contains(tag),
            Condition::Node(id) => flow.node_ids.contains(id),
            Condition::Edge(id) => flow.edge_ids.has(id),
            Condition::FromHandle { node_id, .. } | Condition::FromStore { node_id, .. } => node_id
                .as_ref()
                .is_some_and(|id| flow.node_ids.contains(id)),
            Condition::FromOutput { edge_id, .. } => edge_id
                .as_ref()
                .is_some_and(|id| flow.edge_ids.has(id)),
        }
    }
}

/// Boolean condition tree evaluated against one path's `Flow`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Check {
    Leaf { condition: Condition, negated: bool },
    And(Vec<Check>),
    Or(Vec<Check>),
}

impl Check {
    pub fn leaf(condition: Condition) -> Self {
        Check::Leaf {
            condition,
            negated: false,
        }
    }

    pub fn negated(condition: Condition) -> Self {
        Check::Leaf {
            condition,
            negated: true,
        }
    }

    pub fn tag(tag: impl Into<String>) -> Self {
        Check::leaf(Condition::Tag(tag.into()))
    }

    pub fn evaluate(&self, flow: &Flow) -> bool {
        match self {
            Check::Leaf { condition, negated } => condition.holds(flow) != *negated,
            Check::And(children) => children.iter().all(|c| c.evaluate(flow)),
            Check::Or(children) => children.iter().any(|c| c.evaluate(flow)),
        }
    }

    /// Visits every leaf condition, stopping at the first error.
    pub fn try_for_each_condition_mut<F>(&mut self, f: &mut F) -> Result<(), FlowError>
    where
        F: FnMut(&mut Condition) -> Result<(), FlowError>,
    {
        match self {
            Check::Leaf { condition, .. } => f(condition),
            Check::And(children) | Check::Or(children) => {
                for child in children {
                    child.try_for_each_condition_mut(f)?;
                }
                Ok(())
            }
        }
    }

    fn fmt_child(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Check::Leaf { .. } => write!(f, "{self}"),
            _ => write!(f, "({self})"),
        }
    }
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Check::Leaf { condition, negated } => {
                let is = if *negated { "is not" } else { "is" };
                match condition {
                    Condition::Tag(tag) => write!(f, "{is} {tag}"),
                    Condition::Node(id) => write!(f, "{is} node {id}"),
                    Condition::Edge(id) => write!(f, "{is} edge {id}"),
                    Condition::FromHandle { connection, .. } => {
                        write!(f, "{is} from handle {connection}")
                    }
                    Condition::FromStore { store, .. } => write!(f, "{is} from store {store}"),
                    Condition::FromOutput { connection, .. } => {
                        write!(f, "{is} from output {connection}")
                    }
                }
            }
            Check::And(children) | Check::Or(children) => {
                let op = if matches!(self, Check::And(_)) { " and " } else { " or " };
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        f.write_str(op)?;
                    }
                    child.fmt_child(f)?;
                }
                Ok(())
            }
        }
    }
}

/// A check together with the subject it was declared on.
///
/// Renders as `check <subject> <condition>`, e.g. `check bar is trusted` or
/// `check slotToProvide data is trusted`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredCheck {
    pub subject: String,
    pub condition: Check,
}

impl fmt::Display for DeclaredCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "check {} {}", self.subject, self.condition)
    }
}

/// Accumulated provenance state along one path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Flow {
    pub node_ids: HashSet<String>,
    pub edge_ids: OrderedSet<String>,
    pub tags: HashSet<String>,
}

impl Flow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies `modifier` in place. Ids are only ever added; tag operations
    /// can undo earlier ones.
    pub fn modify(&mut self, modifier: &FlowModifier) {
        self.node_ids.extend(modifier.node_ids.iter().cloned());
        self.edge_ids.add_all(&modifier.edge_ids);
        for (tag, op) in &modifier.tag_operations {
            match op {
                TagOperation::Add => {
                    self.tags.insert(tag.clone());
                }
                TagOperation::Remove => {
                    self.tags.remove(tag);
                }
            }
        }
    }

    pub fn copy(&self) -> Flow {
        self.clone()
    }

    pub fn copy_and_modify(&self, modifier: &FlowModifier) -> Flow {
        let mut copy = self.clone();
        copy.modify(modifier);
        copy
    }

    pub fn evaluate(&self, check: &Check) -> bool {
        check.evaluate(self)
    }
}

impl UniqueString for Flow {
    fn to_unique_string(&self) -> String {
        let mut entries: Vec<String> = Vec::new();
        entries.extend(self.edge_ids.distinct().into_iter().map(|id| format!("edge:{id}")));
        entries.extend(self.node_ids.iter().map(|id| format!("node:{id}")));
        entries.extend(self.tags.iter().map(|tag| format!("tag:{tag}")));
        entries.sort();
        format!("{{{}}}", entries.join(", "))
    }
}

/// Delta to apply to a `Flow`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlowModifier {
    pub node_ids: HashSet<String>,
    pub edge_ids: OrderedSet<String>,
    pub tag_operations: BTreeMap<String, TagOperation>,
}

impl FlowModifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a modifier from conditions such as `+edge:E1`, `+node:N1`,
    /// `+tag:t` and `-tag:t`.
    pub fn parse<S: AsRef<str>>(conditions: &[S]) -> Result<FlowModifier, FlowError> {
        let mut modifier = FlowModifier::new();
        for condition in conditions {
            let condition = condition.as_ref();
            let invalid = || FlowError::InvalidFlowCondition {
                condition: condition.to_string(),
            };
            let (sign, rest) = if let Some(rest) = condition.strip_prefix('+') {
                ('+', rest)
            } else if let Some(rest) = condition.strip_prefix('-') {
                ('-', rest)
            } else {
                return Err(invalid());
            };
            let (kind, value) = rest.split_once(':').ok_or_else(invalid)?;
            if value.is_empty() {
                return Err(invalid());
            }
            match (sign, kind) {
                ('+', "node") => {
                    modifier.node_ids.insert(value.to_string());
                }
                ('+', "edge") => modifier.edge_ids.add(value.to_string()),
                ('+', "tag") => {
                    modifier.tag_operations.insert(value.to_string(), TagOperation::Add);
                }
                ('-', "tag") => {
                    modifier.tag_operations.insert(value.to_string(), TagOperation::Remove);
                }
                _ => return Err(invalid()),
            }
        }
        Ok(modifier)
    }

    /// Modifier contributed by one edge: its own id, its start node id, and
    /// the tag operations of its `is`/`is not` claims.
    pub fn from_claims(edge_id: &str, start_node_id: &str, claims: &[Claim]) -> FlowModifier {
        let mut modifier = FlowModifier::new();
        modifier.node_ids.insert(start_node_id.to_string());
        modifier.edge_ids.add(edge_id.to_string());
        for claim in claims {
            if let Claim::IsTag { is_not, tag } = claim {
                let op = if *is_not { TagOperation::Remove } else { TagOperation::Add };
                modifier.tag_operations.insert(tag.clone(), op);
            }
        }
        modifier
    }

    pub fn copy(&self) -> FlowModifier {
        self.clone()
    }

    /// Combines `self` followed by `other`. Tag operations from `other` win.
    pub fn copy_and_modify(&self, other: &FlowModifier) -> FlowModifier {
        let mut copy = self.clone();
        copy.node_ids.extend(other.node_ids.iter().cloned());
        copy.edge_ids.add_all(&other.edge_ids);
        for (tag, op) in &other.tag_operations {
            copy.tag_operations.insert(tag.clone(), *op);
        }
        copy
    }

    /// Applies the modifier to an empty flow.
    pub fn to_flow(&self) -> Flow {
        Flow::new().copy_and_modify(self)
    }
}

impl UniqueString for FlowModifier {
    fn to_unique_string(&self) -> String {
        let mut entries: Vec<String> = Vec::new();
        entries.extend(self.edge_ids.distinct().into_iter().map(|id| format!("+edge:{id}")));
        entries.extend(self.node_ids.iter().map(|id| format!("+node:{id}")));
        entries.extend(self.tag_operations.iter().map(|(tag, op)| match op {
            TagOperation::Add => format!("+tag:{tag}"),
            TagOperation::Remove => format!("-tag:{tag}"),
        }));
        entries.sort();
        format!("{{{}}}", entries.join(", "))
    }
}

impl fmt::Display for FlowModifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_unique_string())
    }
}
