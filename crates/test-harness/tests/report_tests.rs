//! Text and JSON scenario reports.

use combine_engine::{OperationKind, OutcomeStatus, Strategy};
use kernel_adapter::MockQuirks;
use test_harness::{ScenarioBuilder, ScenarioReport};

fn pair_scenario() -> ScenarioBuilder<kernel_adapter::MockKernel> {
    let mut m = ScenarioBuilder::mock();
    m.sphere("a", [0., 0., 0.], 10.0)
        .unwrap()
        .sphere("b", [15., 0., 0.], 10.0)
        .unwrap()
        .sphere("far", [100., 0., 0.], 5.0)
        .unwrap();
    m.union("ab", &["a", "b"]).unwrap();
    let _ = m.difference("cut", "a", "far");
    m
}

#[test]
fn text_report_lists_outcomes_and_errors() {
    let m = pair_scenario();
    let text = m.report().to_text();

    assert!(text.starts_with("=== Combination Scenario Report ==="));
    assert!(text.contains("Outcomes (1 combinations, 0 imperfect, 1 errors):"));
    assert!(text.contains("[OK] union \"ab\" = union(a, b)"), "{text}");
    assert!(text.contains("method=MultiUnion(tol=0.001000) strategy=direct"));
    assert!(text.contains("[PASS] clean_topology"));
    assert!(text.contains("Errors (1):"));
    assert!(text.contains("  cut: "));
}

#[test]
fn empty_report_has_no_errors() {
    let m = ScenarioBuilder::mock();
    let text = m.report().to_string();
    assert!(text.contains("Outcomes (0 combinations"));
    assert!(text.contains("Errors: none"));
}

#[test]
fn imperfect_outcome_lists_defects() {
    let mut m = ScenarioBuilder::mock_with_quirks(MockQuirks {
        self_intersect_all: true,
        ..MockQuirks::default()
    });
    m.sphere("a", [0., 0., 0.], 10.0)
        .unwrap()
        .sphere("b", [15., 0., 0.], 10.0)
        .unwrap();
    let text = m.union("ab", &["a", "b"]).unwrap().to_text();

    assert!(text.starts_with("[IMPERFECT] union \"ab\""));
    assert!(text.contains("strategy=fallback status=Imperfect attempts=17"));
    assert!(text.contains("defects: SelfIntersections=1"), "{text}");
    assert!(text.contains("[FAIL] no_self_intersections"));
}

#[test]
fn json_report_round_trips() {
    let m = pair_scenario();
    let report = m.report();
    let json = report.to_json().unwrap();
    assert!(json.contains("\"method\": \"MultiUnion(tol=0.001000)\""));

    let back = ScenarioReport::from_json(&json).unwrap();
    assert_eq!(back.outcomes.len(), report.outcomes.len());
    assert_eq!(back.errors, report.errors);

    let ab = back.outcome("ab").unwrap();
    assert_eq!(ab.kind, OperationKind::Union);
    assert_eq!(ab.strategy, Strategy::Direct);
    assert_eq!(ab.status, OutcomeStatus::Clean);
    assert!(ab.oracles_passed());
    assert_eq!(ab.request_id, report.outcomes[0].request_id);
    assert_eq!(ab.oracle_results.len(), 3);
    assert!(ab.volume.is_some());
    assert!(back.outcome("cut").is_none());
}

#[test]
fn malformed_json_is_an_error() {
    let err = ScenarioReport::from_json("{\"outcomes\": 3}").unwrap_err();
    assert!(err.to_string().starts_with("report serialization failed"));
}
