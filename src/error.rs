//! Error types with fix suggestions
//!
//! Every variant is a construction-time (structural) error. Unsatisfied
//! checks are never errors: they are collected into a `ValidationResult`.

use thiserror::Error;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ─────────────────────────────────────────────────────────────
    // Recipe description errors
    // ─────────────────────────────────────────────────────────────
    #[error("Invalid name '{name}' for {kind}")]
    InvalidName { kind: &'static str, name: String },

    #[error("Duplicate particle name '{name}'")]
    DuplicateParticle { name: String },

    #[error("Duplicate store {kind} '{value}'")]
    DuplicateStore { kind: &'static str, value: String },

    #[error("Duplicate handle declaration '{name}'")]
    DuplicateHandle { name: String },

    #[error("Particle '{particle}' declares connection '{connection}' more than once")]
    DuplicateConnection { particle: String, connection: String },

    #[error("Connection '{particle}.{connection}' must bind a {expected}")]
    MissingBinding {
        particle: String,
        connection: String,
        expected: &'static str,
    },

    #[error("Handle '{handle}' references unknown store '{store}'")]
    UnknownHandleStore { handle: String, store: String },

    #[error("Particle '{particle}' has no connection named '{connection}'")]
    UnknownConnection { particle: String, connection: String },

    #[error("Cannot claim '{particle}.{connection}': claims apply to output connections only")]
    InvalidClaimTarget { particle: String, connection: String },

    #[error("Cannot check '{particle}.{connection}': checks apply to input connections and provided slots only")]
    InvalidCheckTarget { particle: String, connection: String },

    #[error("'{particle}.{connection}' is not an input connection")]
    NotAnInput { particle: String, connection: String },

    #[error("Store '{store}' cannot claim 'derives from'")]
    StoreDerivesFrom { store: String },

    #[error("'{particle}.{connection}' does not bind a handle")]
    NotAHandleConnection { particle: String, connection: String },

    #[error("'{particle}.{connection}' is not an output connection")]
    NotAnOutput { particle: String, connection: String },

    // ─────────────────────────────────────────────────────────────
    // Condition language errors
    // ─────────────────────────────────────────────────────────────
    #[error("Condition parse error at position {position} in '{text}': {details}")]
    ConditionParse {
        text: String,
        position: usize,
        details: String,
    },

    #[error("Invalid flow condition '{condition}'")]
    InvalidFlowCondition { condition: String },

    // ─────────────────────────────────────────────────────────────
    // Store resolution errors
    // ─────────────────────────────────────────────────────────────
    #[error("Store with name {name} not found.")]
    StoreNameNotFound { name: String },

    #[error("Store with id '{id}' not found.")]
    StoreIdNotFound { id: String },

    #[error("Store with {kind} {value} is not connected by a handle.")]
    StoreNotConnected { kind: &'static str, value: String },

    #[error("Store '{store}' is bound to more than one handle")]
    AmbiguousStore { store: String },

    // ─────────────────────────────────────────────────────────────
    // Graph invariants
    // ─────────────────────────────────────────────────────────────
    #[error("Duplicate graph id '{id}'")]
    DuplicateId { id: String },

    #[error("Edge must connect to end of path (edge {edge_id})")]
    PathDisconnected { edge_id: String },

    #[error("Graph must not include cycles (edge {edge_id})")]
    PathCycle { edge_id: String },
}

impl FixSuggestion for FlowError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            FlowError::YamlParse(_) => Some("Check YAML syntax: indentation and quoting"),
            FlowError::Io(_) => Some("Check file path and permissions"),
            FlowError::InvalidName { .. } => {
                Some("Names must start with a letter or '_' and contain only alphanumerics, '_' or '-'")
            }
            FlowError::DuplicateParticle { .. } => Some("Give every particle a unique name"),
            FlowError::DuplicateStore { .. } => Some("Use unique store names and ids"),
            FlowError::DuplicateHandle { .. } => Some("Bind each handle to a store only once"),
            FlowError::DuplicateConnection { .. } => Some("Rename one of the connections"),
            FlowError::MissingBinding { .. } => {
                Some("reads/writes connections bind `handle:`, consumes/provides connections bind `slot:`")
            }
            FlowError::UnknownHandleStore { .. } => Some("Declare the store under `stores:`"),
            FlowError::UnknownConnection { .. } => {
                Some("Claims, checks and 'from handle' conditions must name a connection of the same particle")
            }
            FlowError::InvalidClaimTarget { .. } => Some("Move the claim to a writes or reads-writes connection"),
            FlowError::InvalidCheckTarget { .. } => {
                Some("Move the check to a reads, reads-writes or provides connection")
            }
            FlowError::NotAnInput { .. } => Some("'derives from' must name a reads or reads-writes connection"),
            FlowError::StoreDerivesFrom { .. } => Some("Stores may only claim 'is <tag>' or 'is not <tag>'"),
            FlowError::NotAHandleConnection { .. } => {
                Some("'is from handle' must name a reads/writes connection")
            }
            FlowError::NotAnOutput { .. } => {
                Some("'is from output' must name a writes or reads-writes connection")
            }
            FlowError::ConditionParse { .. } => Some(
                "Use 'is <tag>', 'is not <tag>', 'is from handle|output <conn>', 'is from store <name>' joined by and/or",
            ),
            FlowError::InvalidFlowCondition { .. } => {
                Some("Use +edge:<id>, +node:<id>, +tag:<tag> or -tag:<tag>")
            }
            FlowError::StoreNameNotFound { .. } | FlowError::StoreIdNotFound { .. } => {
                Some("Declare the store and bind it to a handle used by the recipe")
            }
            FlowError::StoreNotConnected { .. } => {
                Some("Read the store through a handle used by one of the recipe's connections")
            }
            FlowError::AmbiguousStore { .. } => Some("Bind each store to a single handle"),
            FlowError::DuplicateId { .. } => None,
            FlowError::PathDisconnected { .. } | FlowError::PathCycle { .. } => None,
        }
    }
}
