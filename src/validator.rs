//! Check validator
//!
//! For every checked edge, enumerates the backward paths ending at it, folds
//! each path's modifiers into a fresh `Flow` (earliest edge first) and
//! evaluates the check. Every failing path is reported once.

use std::fmt;

use serde::Serialize;
use tracing::{debug, info};

use crate::collections::{DeepSet, UniqueString};
use crate::flow_graph::FlowGraph;
use crate::graph::{BackwardsPath, Flow};

/// One check that did not hold along one path
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationFailure {
    /// Rendered check, e.g. `check bar is trusted`
    pub check: String,
    /// Edge labels, earliest first, e.g. `P1.foo -> P2.bar`
    pub path: String,
    /// Id of the checked edge
    pub edge_id: String,
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' failed for path: {}", self.check, self.path)
    }
}

impl UniqueString for ValidationFailure {
    fn to_unique_string(&self) -> String {
        format!("{}\u{0}{}", self.check, self.path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub failures: Vec<ValidationFailure>,
    pub node_count: usize,
    pub edge_count: usize,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failure_messages(&self) -> Vec<String> {
        self.failures.iter().map(ToString::to_string).collect()
    }
}

/// Validates every check in a graph. Never mutates the graph.
pub struct Validator<'g> {
    graph: &'g FlowGraph,
}

impl<'g> Validator<'g> {
    pub fn new(graph: &'g FlowGraph) -> Self {
        Self { graph }
    }

    pub fn validate(&self) -> ValidationResult {
        let mut failures: DeepSet<ValidationFailure> = DeepSet::new();
        let mut checks = 0usize;
        let mut paths_walked = 0usize;

        for edge in self.graph.edges() {
            let Some(check) = &edge.check else {
                continue;
            };
            checks += 1;

            let paths = self.graph.input_paths(edge.index);
            debug!(edge = %edge.edge_id, label = %edge.label, paths = paths.len(), "enumerated input paths");
            paths_walked += paths.len();

            for path in &paths {
                let flow = self.flow_along(path);
                if !flow.evaluate(&check.condition) {
                    let failure = ValidationFailure {
                        check: check.to_string(),
                        path: path.to_label_string(self.graph),
                        edge_id: edge.edge_id.clone(),
                    };
                    debug!(%failure, flow = %flow.to_unique_string(), "check failed");
                    failures.add(failure);
                }
            }
        }

        let result = ValidationResult {
            failures: failures.into_vec(),
            node_count: self.graph.node_count(),
            edge_count: self.graph.edge_count(),
        };
        info!(
            checks,
            paths = paths_walked,
            failures = result.failures.len(),
            valid = result.is_valid(),
            "validation complete"
        );
        result
    }

    /// Folds the path's modifiers into a fresh flow, earliest edge first.
    fn flow_along(&self, path: &BackwardsPath) -> Flow {
        let mut flow = Flow::new();
        for edge in path.edges_in_flow_order() {
            flow.modify(&self.graph.edge(edge).modifier);
        }
        flow
    }
}

/// Shorthand for `Validator::new(graph).validate()`
pub fn validate_graph(graph: &FlowGraph) -> ValidationResult {
    Validator::new(graph).validate()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validate(yaml: &str) -> ValidationResult {
        validate_graph(&FlowGraph::from_yaml(yaml).unwrap())
    }

    #[test]
    fn test_validate_satisfied_check() {
        let result = validate(
            r#"
particles:
  - name: P1
    connections:
      - { name: foo, direction: writes, handle: h }
    claims:
      foo: is trusted
  - name: P2
    connections:
      - { name: bar, direction: reads, handle: h }
    checks:
      bar: is trusted
"#,
        );

        assert!(result.is_valid(), "Expected valid graph: {:?}", result.failures);
        assert_eq!(result.node_count, 3);
        assert_eq!(result.edge_count, 2);
    }

    #[test]
    fn test_validate_unsatisfied_check() {
        let result = validate(
            r#"
particles:
  - name: P1
    connections:
      - { name: foo, direction: writes, handle: h }
  - name: P2
    connections:
      - { name: bar, direction: reads, handle: h }
    checks:
      bar: is trusted
"#,
        );

        assert!(!result.is_valid());
        assert_eq!(
            result.failure_messages(),
            vec!["'check bar is trusted' failed for path: P1.foo -> P2.bar"]
        );
        assert_eq!(result.failures[0].edge_id, "E1");
    }

    #[test]
    fn test_check_with_no_writers_fails_on_terminal_edge() {
        let result = validate(
            r#"
particles:
  - name: P
    connections:
      - { name: bar, direction: reads, handle: h }
    checks:
      bar: is trusted
"#,
        );

        assert_eq!(
            result.failure_messages(),
            vec!["'check bar is trusted' failed for path: P.bar"]
        );
    }

    #[test]
    fn test_graph_without_checks_is_valid() {
        let result = validate(
            r#"
particles:
  - name: P
    connections:
      - { name: foo, direction: writes, handle: h }
"#,
        );
        assert!(result.is_valid());
    }

    #[test]
    fn test_failure_unique_string_ignores_edge_id() {
        let a = ValidationFailure {
            check: "check x is t".to_string(),
            path: "A.o -> B.x".to_string(),
            edge_id: "E1".to_string(),
        };
        let b = ValidationFailure {
            edge_id: "E9".to_string(),
            ..a.clone()
        };
        assert_eq!(a.to_unique_string(), b.to_unique_string());
    }
}
