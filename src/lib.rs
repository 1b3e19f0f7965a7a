//! flowcheck - information-flow verifier for particle composition graphs

pub mod collections;
pub mod condition;
pub mod error;
pub mod flow_graph;
pub mod graph;
pub mod recipe;
pub mod validator;

pub use collections::{DeepSet, OrderedSet, UniqueString};
pub use condition::{parse_check, parse_claims};
pub use error::{FixSuggestion, FlowError};
pub use flow_graph::FlowGraph;
pub use graph::{BackwardsPath, Check, Claim, Condition, Flow, FlowModifier, TagOperation};
pub use recipe::Recipe;
pub use validator::{validate_graph, ValidationFailure, ValidationResult, Validator};
