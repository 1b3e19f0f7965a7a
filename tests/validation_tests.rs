//! Integration tests for check validation
//!
//! Each test builds a graph from an inline recipe and asserts on the exact
//! failure messages.

use flowcheck::{validate_graph, FlowGraph, ValidationResult};

fn validate(yaml: &str) -> ValidationResult {
    let graph = FlowGraph::from_yaml(yaml).unwrap();
    validate_graph(&graph)
}

fn assert_valid(yaml: &str) {
    let result = validate(yaml);
    assert!(result.is_valid(), "Expected valid graph: {:?}", result.failure_messages());
}

fn assert_failures(yaml: &str, expected: &[&str]) {
    let result = validate(yaml);
    assert!(!result.is_valid(), "Expected invalid graph");
    let mut actual = result.failure_messages();
    let mut expected: Vec<String> = expected.iter().map(|s| s.to_string()).collect();
    actual.sort();
    expected.sort();
    assert_eq!(actual, expected);
}

// ============================================================================
// Tag checks
// ============================================================================

#[test]
fn test_succeeds_when_there_are_no_checks() {
    assert_valid(
        r#"
particles:
  - name: P1
    connections:
      - { name: foo, direction: writes, handle: h }
  - name: P2
    connections:
      - { name: bar, direction: reads, handle: h }
"#,
    );
}

#[test]
fn test_succeeds_when_check_satisfied_directly() {
    assert_valid(
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
}

#[test]
fn test_fails_when_different_tag_claimed() {
    assert_failures(
        r#"
particles:
  - name: P1
    connections:
      - { name: foo, direction: writes, handle: h }
    claims:
      foo: is notTrusted
  - name: P2
    connections:
      - { name: bar, direction: reads, handle: h }
    checks:
      bar: is trusted
"#,
        &["'check bar is trusted' failed for path: P1.foo -> P2.bar"],
    );
}

#[test]
fn test_fails_when_tag_is_removed() {
    assert_failures(
        r#"
particles:
  - name: P1
    connections:
      - { name: foo, direction: writes, handle: h1 }
    claims:
      foo: is trusted
  - name: P2
    connections:
      - { name: bar, direction: reads, handle: h1 }
      - { name: out, direction: writes, handle: h2 }
    claims:
      out: is not trusted
  - name: P3
    connections:
      - { name: baz, direction: reads, handle: h2 }
    checks:
      baz: is trusted
"#,
        &["'check baz is trusted' failed for path: P1.foo -> P2.bar -> P2.out -> P3.baz"],
    );
}

#[test]
fn test_multiple_writers_all_tagged() {
    assert_valid(
        r#"
particles:
  - name: P1
    connections:
      - { name: foo, direction: writes, handle: h }
    claims:
      foo: is trusted
  - name: P2
    connections:
      - { name: foo, direction: writes, handle: h }
    claims:
      foo: is trusted
  - name: P3
    connections:
      - { name: bar, direction: reads, handle: h }
    checks:
      bar: is trusted
"#,
    );
}

#[test]
fn test_multiple_writers_one_untagged() {
    assert_failures(
        r#"
particles:
  - name: P1
    connections:
      - { name: foo, direction: writes, handle: h }
    claims:
      foo: is trusted
  - name: P2
    connections:
      - { name: foo, direction: writes, handle: h }
  - name: P3
    connections:
      - { name: bar, direction: reads, handle: h }
    checks:
      bar: is trusted
"#,
        &["'check bar is trusted' failed for path: P2.foo -> P3.bar"],
    );
}

#[test]
fn test_fails_when_handle_has_no_writers() {
    assert_failures(
        r#"
particles:
  - name: P
    connections:
      - { name: bar, direction: reads, handle: h }
    checks:
      bar: is trusted
"#,
        &["'check bar is trusted' failed for path: P.bar"],
    );
}

#[test]
fn test_claim_propagates_through_chain() {
    assert_valid(
        r#"
particles:
  - name: P1
    connections:
      - { name: foo, direction: writes, handle: h1 }
    claims:
      foo: is trusted
  - name: P2
    connections:
      - { name: bar, direction: reads, handle: h1 }
      - { name: foo, direction: writes, handle: h2 }
  - name: P3
    connections:
      - { name: bar, direction: reads, handle: h2 }
    checks:
      bar: is trusted
"#,
    );
}

#[test]
fn test_later_claim_does_not_override_earlier_tag() {
    assert_valid(
        r#"
particles:
  - name: P1
    connections:
      - { name: foo, direction: writes, handle: h1 }
    claims:
      foo: is trusted
  - name: P2
    connections:
      - { name: bar, direction: reads, handle: h1 }
      - { name: foo, direction: writes, handle: h2 }
    claims:
      foo: is someOtherTag
  - name: P3
    connections:
      - { name: bar, direction: reads, handle: h2 }
    checks:
      bar: is trusted
"#,
    );
}

#[test]
fn test_or_check_satisfied_by_either_tag() {
    assert_valid(
        r#"
particles:
  - name: P1
    connections:
      - { name: foo, direction: writes, handle: h }
    claims:
      foo: is tag1
  - name: P2
    connections:
      - { name: foo, direction: writes, handle: h }
    claims:
      foo: is tag2
  - name: P3
    connections:
      - { name: bar, direction: reads, handle: h }
    checks:
      bar: is tag1 or is tag2
"#,
    );
}

#[test]
fn test_or_check_not_met() {
    assert_failures(
        r#"
particles:
  - name: P1
    connections:
      - { name: foo, direction: writes, handle: h }
    claims:
      foo: is tag1
  - name: P2
    connections:
      - { name: foo, direction: writes, handle: h }
    claims:
      foo: is someOtherTag
  - name: P3
    connections:
      - { name: bar, direction: reads, handle: h }
    checks:
      bar: is tag1 or is tag2
"#,
        &["'check bar is tag1 or is tag2' failed for path: P2.foo -> P3.bar"],
    );
}

#[test]
fn test_more_than_one_failure_for_same_check() {
    assert_failures(
        r#"
particles:
  - name: P1
    connections:
      - { name: foo, direction: writes, handle: h }
    claims:
      foo: is notTrusted
  - name: P2
    connections:
      - { name: foo, direction: writes, handle: h }
    claims:
      foo: is someOtherTag
  - name: P3
    connections:
      - { name: foo, direction: writes, handle: h }
  - name: P4
    connections:
      - { name: bar, direction: reads, handle: h }
    checks:
      bar: is trusted
"#,
        &[
            "'check bar is trusted' failed for path: P1.foo -> P4.bar",
            "'check bar is trusted' failed for path: P2.foo -> P4.bar",
            "'check bar is trusted' failed for path: P3.foo -> P4.bar",
        ],
    );
}

#[test]
fn test_failures_for_different_checks() {
    assert_failures(
        r#"
particles:
  - name: P1
    connections:
      - { name: foo1, direction: writes, handle: h1 }
      - { name: foo2, direction: writes, handle: h2 }
    claims:
      foo1: is notTrusted
      foo2: is trusted
  - name: P2
    connections:
      - { name: bar1, direction: reads, handle: h1 }
      - { name: bar2, direction: reads, handle: h2 }
    checks:
      bar1: is trusted
      bar2: is extraTrusted
"#,
        &[
            "'check bar1 is trusted' failed for path: P1.foo1 -> P2.bar1",
            "'check bar2 is extraTrusted' failed for path: P1.foo2 -> P2.bar2",
        ],
    );
}

#[test]
fn test_and_check_needs_both_tags() {
    let recipe = |claim: &str| {
        format!(
            r#"
particles:
  - name: P1
    connections:
      - {{ name: foo, direction: writes, handle: h }}
    claims:
      foo: {claim}
  - name: P2
    connections:
      - {{ name: bar, direction: reads, handle: h }}
    checks:
      bar: is trusted and is not private
"#
        )
    };

    assert_valid(&recipe("is trusted"));
    assert_failures(
        &recipe("is trusted and is private"),
        &["'check bar is trusted and is not private' failed for path: P1.foo -> P2.bar"],
    );
}

// ============================================================================
// 'is from handle' checks
// ============================================================================

#[test]
fn test_from_handle_same_handle() {
    assert_valid(
        r#"
particles:
  - name: P
    connections:
      - { name: input1, direction: reads, handle: h }
      - { name: input2, direction: reads, handle: h }
    checks:
      input2: is from handle input1
"#,
    );
}

#[test]
fn test_from_handle_different_handle() {
    assert_failures(
        r#"
particles:
  - name: P
    connections:
      - { name: input1, direction: reads, handle: h1 }
      - { name: input2, direction: reads, handle: h2 }
    checks:
      input2: is from handle input1
"#,
        &["'check input2 is from handle input1' failed for path: P.input2"],
    );
}

#[test]
fn test_from_handle_with_writers() {
    assert_valid(
        r#"
particles:
  - name: P1
    connections:
      - { name: output1, direction: writes, handle: h }
      - { name: output2, direction: writes, handle: h }
  - name: P2
    connections:
      - { name: trustedSource, direction: reads, handle: h }
      - { name: inputToCheck, direction: reads, handle: h }
    checks:
      inputToCheck: is from handle trustedSource
"#,
    );
}

#[test]
fn test_from_handle_through_chain_with_claim() {
    assert_valid(
        r#"
particles:
  - name: P1
    connections:
      - { name: input, direction: reads, handle: h }
      - { name: output, direction: writes, handle: h1 }
    claims:
      output: is somethingElse
  - name: P2
    connections:
      - { name: trustedSource, direction: reads, handle: h }
      - { name: inputToCheck, direction: reads, handle: h1 }
    checks:
      inputToCheck: is from handle trustedSource
"#,
    );
}

#[test]
fn test_from_handle_fails_when_another_handle_found() {
    assert_failures(
        r#"
particles:
  - name: P1
    connections:
      - { name: input1, direction: reads, handle: h }
      - { name: input2, direction: reads, handle: h1 }
      - { name: output, direction: writes, handle: h2 }
  - name: P2
    connections:
      - { name: trustedSource, direction: reads, handle: h }
      - { name: inputToCheck, direction: reads, handle: h2 }
    checks:
      inputToCheck: is from handle trustedSource
"#,
        &["'check inputToCheck is from handle trustedSource' failed for path: P1.input2 -> P1.output -> P2.inputToCheck"],
    );
}

#[test]
fn test_or_of_handle_and_tag() {
    let recipe = |shared: &str, claims: &str| {
        format!(
            r#"
particles:
  - name: P1
    connections:
      - {{ name: output, direction: writes, handle: {shared} }}
    claims: {claims}
  - name: P2
    connections:
      - {{ name: trustedSource, direction: reads, handle: h }}
      - {{ name: inputToCheck, direction: reads, handle: {shared} }}
    checks:
      inputToCheck: is from handle trustedSource or is trusted
"#
        )
    };

    assert_valid(&recipe("h", "{}"));
    assert_valid(&recipe("h2", "{ output: is trusted }"));
    assert_failures(
        &recipe("h2", "{}"),
        &["'check inputToCheck is from handle trustedSource or is trusted' failed for path: P1.output -> P2.inputToCheck"],
    );
}

// ============================================================================
// 'is from output' checks
// ============================================================================

#[test]
fn test_from_output_directly_connected_to_input() {
    let recipe = |check: &str| {
        format!(
            r#"
particles:
  - name: P
    connections:
      - {{ name: foo, direction: reads, handle: h }}
      - {{ name: bar, direction: writes, handle: h }}
    checks:
      foo: {check}
"#
        )
    };

    assert_valid(&recipe("is from output bar"));
    assert_failures(
        &recipe("is not from output bar"),
        &["'check foo is not from output bar' failed for path: P.bar -> P.foo"],
    );
}

#[test]
fn test_from_output_fails_when_output_goes_elsewhere() {
    assert_failures(
        r#"
particles:
  - name: P
    connections:
      - { name: foo, direction: reads, handle: h }
      - { name: bar, direction: writes, handle: h2 }
    checks:
      foo: is from output bar
"#,
        &["'check foo is from output bar' failed for path: P.foo"],
    );
}

#[test]
fn test_from_output_separated_by_another_particle() {
    assert_valid(
        r#"
particles:
  - name: P1
    connections:
      - { name: foo, direction: reads, handle: h2 }
      - { name: bar, direction: writes, handle: h1 }
    checks:
      foo: is from output bar
  - name: P2
    connections:
      - { name: foo, direction: reads, handle: h1 }
      - { name: bar, direction: writes, handle: h2 }
"#,
    );
}

#[test]
fn test_from_output_fails_when_another_particle_writes_same_handle() {
    assert_failures(
        r#"
particles:
  - name: P1
    connections:
      - { name: foo, direction: reads, handle: h }
      - { name: bar, direction: writes, handle: h }
    checks:
      foo: is from output bar
  - name: P2
    connections:
      - { name: bar, direction: writes, handle: h }
"#,
        &["'check foo is from output bar' failed for path: P2.bar -> P1.foo"],
    );
}

// ============================================================================
// Stores
// ============================================================================

#[test]
fn test_store_claims_satisfy_checks() {
    assert_valid(
        r#"
stores:
  - { name: MyStore, id: my-store-id, claims: is trusted }
handles:
  - { name: s, store: MyStore }
particles:
  - name: P
    connections:
      - { name: input, direction: reads, handle: s }
    checks:
      input: is trusted
"#,
    );
}

#[test]
fn test_from_store_by_name_and_id() {
    let recipe = |check: &str| {
        format!(
            r#"
stores:
  - {{ name: MyStore, id: my-store-id }}
handles:
  - {{ name: s, store: MyStore }}
particles:
  - name: P1
    connections:
      - {{ name: input, direction: reads, handle: s }}
      - {{ name: output, direction: writes, handle: h }}
  - name: P2
    connections:
      - {{ name: other, direction: writes, handle: h }}
  - name: P3
    connections:
      - {{ name: input, direction: reads, handle: h }}
    checks:
      input: "{check}"
"#
        )
    };

    assert_failures(
        &recipe("is from store MyStore"),
        &["'check input is from store MyStore' failed for path: P2.other -> P3.input"],
    );
    assert_failures(
        &recipe("is from store 'my-store-id'"),
        &["'check input is from store 'my-store-id'' failed for path: P2.other -> P3.input"],
    );
    assert_failures(
        &recipe("is not from store MyStore"),
        &["'check input is not from store MyStore' failed for path: P1.input -> P1.output -> P3.input"],
    );
}

// ============================================================================
// Slots
// ============================================================================

const SLOT_RECIPE: &str = r#"
particles:
  - name: Source
    connections:
      - { name: out, direction: writes, handle: h }
    claims:
      out: is trusted
  - name: Provider
    connections:
      - { name: root, direction: consumes, slot: root }
      - { name: slotToProvide, direction: provides, slot: slot0 }
    checks:
      slotToProvide: is trusted
  - name: Consumer
    connections:
      - { name: data, direction: reads, handle: h }
      - { name: slotToConsume, direction: consumes, slot: slot0 }
"#;

#[test]
fn test_slot_check_satisfied_by_consumer_inputs() {
    assert_valid(SLOT_RECIPE);
}

#[test]
fn test_slot_check_fails_without_tagged_inputs() {
    assert_failures(
        &SLOT_RECIPE.replace("      out: is trusted\n", "      out: is untrusted\n"),
        &["'check slotToProvide data is trusted' failed for path: Source.out -> Consumer.data -> Consumer.slotToConsume"],
    );
}

#[test]
fn test_slot_check_fails_for_consumer_without_inputs() {
    assert_failures(
        r#"
particles:
  - name: P1
    connections:
      - { name: slotToProvide, direction: provides, slot: slot0 }
    checks:
      slotToProvide: is trusted
  - name: P2
    connections:
      - { name: slotToConsume, direction: consumes, slot: slot0 }
"#,
        &["'check slotToProvide data is trusted' failed for path: P2.slotToConsume"],
    );
}

// ============================================================================
// Derives from
// ============================================================================

const DERIVES_RECIPE: &str = r#"
particles:
  - name: Trusted
    connections:
      - { name: out, direction: writes, handle: h1 }
    claims:
      out: is trusted
  - name: Untrusted
    connections:
      - { name: out, direction: writes, handle: h2 }
  - name: Mixer
    connections:
      - { name: in1, direction: reads, handle: h1 }
      - { name: in2, direction: reads, handle: h2 }
      - { name: out, direction: writes, handle: h3 }
    claims:
      out: derives from in1
  - name: Sink
    connections:
      - { name: in, direction: reads, handle: h3 }
    checks:
      in: is trusted
"#;

#[test]
fn test_derives_from_restricts_walk() {
    assert_valid(DERIVES_RECIPE);
}

#[test]
fn test_without_derives_from_all_inputs_flow() {
    assert_failures(
        &DERIVES_RECIPE.replace("    claims:\n      out: derives from in1\n", ""),
        &["'check in is trusted' failed for path: Untrusted.out -> Mixer.in2 -> Mixer.out -> Sink.in"],
    );
}

#[test]
fn test_circular_derives_from_terminates() {
    let result = validate(
        r#"
particles:
  - name: P
    connections:
      - { name: foo1, direction: reads-writes, handle: h1 }
      - { name: foo2, direction: reads-writes, handle: h2 }
    claims:
      foo1: derives from foo2
      foo2: derives from foo1
    checks:
      foo1: is trusted
"#,
    );
    assert_eq!(
        result.failure_messages(),
        vec!["'check foo1 is trusted' failed for path: P.foo1 -> P.foo1"]
    );
}

// ============================================================================
// Cycles and determinism
// ============================================================================

#[test]
fn test_inout_self_loop_closes_at_checked_particle() {
    assert_failures(
        r#"
particles:
  - name: P
    connections:
      - { name: foo, direction: reads-writes, handle: h }
    claims:
      foo: is t2
    checks:
      foo: is t1
"#,
        &["'check foo is t1' failed for path: P.foo -> P.foo"],
    );
}

#[test]
fn test_inout_self_loop_carries_own_claims() {
    assert_valid(
        r#"
particles:
  - name: P
    connections:
      - { name: foo, direction: reads-writes, handle: h }
    claims:
      foo: is trusted
    checks:
      foo: is trusted
"#,
    );
}

#[test]
fn test_cycle_between_particles_terminates() {
    assert_failures(
        r#"
particles:
  - name: A
    connections:
      - { name: in, direction: reads, handle: ab }
      - { name: out, direction: writes, handle: ba }
  - name: B
    connections:
      - { name: in, direction: reads, handle: ba }
      - { name: out, direction: writes, handle: ab }
  - name: C
    connections:
      - { name: in, direction: reads, handle: ba }
    checks:
      in: is trusted
"#,
        &["'check in is trusted' failed for path: B.out -> A.in -> A.out -> C.in"],
    );
}

#[test]
fn test_validate_is_idempotent() {
    let graph = FlowGraph::from_yaml(DERIVES_RECIPE.replace("    claims:\n      out: derives from in1\n", "").as_str())
        .unwrap();

    let first = validate_graph(&graph);
    let second = validate_graph(&graph);
    assert_eq!(first, second);
    assert_eq!(first.failures.len(), 1);
}

#[test]
fn test_result_serializes_to_json() {
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

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["node_count"], 2);
    assert_eq!(json["edge_count"], 1);
    assert_eq!(json["failures"][0]["check"], "check bar is trusted");
    assert_eq!(json["failures"][0]["path"], "P.bar");
    assert_eq!(json["failures"][0]["edge_id"], "E0");
}
