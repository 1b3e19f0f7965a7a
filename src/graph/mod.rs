//! Flow graph building blocks
//!
//! - `internals`: flows, modifiers, claims and check trees
//! - `node`: arena nodes and edges
//! - `path`: cycle-free backward paths and their enumeration

mod internals;
mod node;
mod path;

pub use internals::{Check, Claim, Condition, DeclaredCheck, Flow, FlowModifier, StoreRef, TagOperation};
pub use node::{Edge, EdgeIndex, EdgeKind, Node, NodeIndex, NodeKind, StoreInfo};
pub use path::{all_input_paths, BackwardsPath};
