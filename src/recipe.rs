//! Recipe description parsing structures
//!
//! A recipe is the resolved composition the flow graph is built from:
//! particles with directioned connections, the handles and slots those
//! connections bind, optional stores backing handles, and claim/check text.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::error::FlowError;

/// Particle, connection, handle, slot and store names
static NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_-]*$").expect("name pattern is valid"));

/// Recipe parsed from YAML
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Recipe {
    #[serde(default)]
    pub stores: Vec<StoreDecl>,
    #[serde(default)]
    pub handles: Vec<HandleDecl>,
    #[serde(default)]
    pub particles: Vec<ParticleDecl>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreDecl {
    pub name: String,
    #[serde(default)]
    pub id: Option<String>,
    /// Claim text applied to everything read from the store
    #[serde(default)]
    pub claims: Option<String>,
}

/// Binds a handle to a store.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HandleDecl {
    pub name: String,
    pub store: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParticleDecl {
    pub name: String,
    #[serde(default)]
    pub connections: Vec<ConnectionDecl>,
    /// Output connection name -> claim text
    #[serde(default)]
    pub claims: BTreeMap<String, String>,
    /// Input connection or provided slot name -> check text
    #[serde(default)]
    pub checks: BTreeMap<String, String>,
}

impl ParticleDecl {
    pub fn connection(&self, name: &str) -> Option<&ConnectionDecl> {
        self.connections.iter().find(|c| c.name == name)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionDecl {
    pub name: String,
    pub direction: Direction,
    #[serde(default)]
    pub handle: Option<String>,
    #[serde(default)]
    pub slot: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Direction {
    Reads,
    Writes,
    ReadsWrites,
    Consumes,
    Provides,
}

impl Direction {
    #[inline]
    pub fn is_slot(self) -> bool {
        matches!(self, Direction::Consumes | Direction::Provides)
    }

    /// Directions that create a handle -> particle edge
    #[inline]
    pub fn reads(self) -> bool {
        matches!(self, Direction::Reads | Direction::ReadsWrites)
    }

    /// Directions that create a particle -> handle edge
    #[inline]
    pub fn writes(self) -> bool {
        matches!(self, Direction::Writes | Direction::ReadsWrites)
    }
}

/// What a connection is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding<'a> {
    Handle(&'a str),
    Slot(&'a str),
}

impl ConnectionDecl {
    /// The handle or slot this connection binds.
    ///
    /// Only meaningful after `Recipe::validate`; before that a connection
    /// may bind neither.
    pub fn binding(&self) -> Option<Binding<'_>> {
        if self.direction.is_slot() {
            self.slot.as_deref().map(Binding::Slot)
        } else {
            self.handle.as_deref().map(Binding::Handle)
        }
    }
}

impl Recipe {
    pub fn from_yaml(yaml: &str) -> Result<Self, FlowError> {
        let recipe: Recipe = serde_yaml::from_str(yaml)?;
        recipe.validate()?;
        Ok(recipe)
    }

    pub fn from_file(path: &Path) -> Result<Self, FlowError> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml(&yaml)
    }

    /// Structural checks that do not need the graph: names, uniqueness and
    /// bindings. Claim/check targets are validated by the graph builder.
    pub fn validate(&self) -> Result<(), FlowError> {
        let mut store_names = HashSet::new();
        let mut store_ids = HashSet::new();
        for store in &self.stores {
            check_name("store", &store.name)?;
            if !store_names.insert(store.name.as_str()) {
                return Err(FlowError::DuplicateStore {
                    kind: "name",
                    value: store.name.clone(),
                });
            }
            // A store without an explicit id is addressed by its name
            let id = store.id.as_deref().unwrap_or(&store.name);
            if !store_ids.insert(id) {
                return Err(FlowError::DuplicateStore {
                    kind: "id",
                    value: id.to_string(),
                });
            }
        }

        let mut handle_names = HashSet::new();
        for handle in &self.handles {
            check_name("handle", &handle.name)?;
            if !handle_names.insert(handle.name.as_str()) {
                return Err(FlowError::DuplicateHandle {
                    name: handle.name.clone(),
                });
            }
            if !store_names.contains(handle.store.as_str()) {
                return Err(FlowError::UnknownHandleStore {
                    handle: handle.name.clone(),
                    store: handle.store.clone(),
                });
            }
        }

        let mut particle_names = HashSet::new();
        for particle in &self.particles {
            check_name("particle", &particle.name)?;
            if !particle_names.insert(particle.name.as_str()) {
                return Err(FlowError::DuplicateParticle {
                    name: particle.name.clone(),
                });
            }
            validate_connections(particle)?;
        }

        Ok(())
    }

    /// Store bound to `handle`, if any.
    pub fn store_for_handle(&self, handle: &str) -> Option<&StoreDecl> {
        let binding = self.handles.iter().find(|h| h.name == handle)?;
        self.stores.iter().find(|s| s.name == binding.store)
    }
}

fn validate_connections(particle: &ParticleDecl) -> Result<(), FlowError> {
    let mut seen = HashSet::new();
    for connection in &particle.connections {
        check_name("connection", &connection.name)?;
        if !seen.insert(connection.name.as_str()) {
            return Err(FlowError::DuplicateConnection {
                particle: particle.name.clone(),
                connection: connection.name.clone(),
            });
        }

        let (expected, bound, other) = if connection.direction.is_slot() {
            ("slot", &connection.slot, &connection.handle)
        } else {
            ("handle", &connection.handle, &connection.slot)
        };
        match bound {
            Some(target) if other.is_none() => check_name(expected, target)?,
            _ => {
                return Err(FlowError::MissingBinding {
                    particle: particle.name.clone(),
                    connection: connection.name.clone(),
                    expected,
                })
            }
        }
    }
    Ok(())
}

fn check_name(kind: &'static str, name: &str) -> Result<(), FlowError> {
    if NAME_PATTERN.is_match(name) {
        Ok(())
    } else {
        Err(FlowError::InvalidName {
            kind,
            name: name.to_string(),
        })
    }
}
