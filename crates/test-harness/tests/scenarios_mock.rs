//! Combination scenarios against MockKernel.
//!
//! Each scenario goes through ScenarioBuilder, so every recorded outcome is
//! also checked by the standard oracles.

use combine_engine::{CombineError, OutcomeStatus, Strategy};
use kernel_adapter::{MockQuirks, SolidInspect};
use test_harness::assertions::{assert_strategy, assert_volume_near};
use test_harness::helpers::{sphere_pair_union_volume, sphere_volume};
use test_harness::oracle::check_bbox_growth;
use test_harness::{HarnessError, ScenarioBuilder};

// ── Scenario 1: Overlapping pair ────────────────────────────────────────

#[test]
fn test_overlapping_spheres_union() {
    test_harness::init_tracing();
    let mut m = ScenarioBuilder::mock();
    m.sphere("a", [0., 0., 0.], 10.0)
        .unwrap()
        .sphere("b", [15., 0., 0.], 10.0)
        .unwrap();

    let report = m.union("ab", &["a", "b"]).unwrap();
    assert!(report.success);
    assert_eq!(report.strategy, Strategy::Direct);
    assert_eq!(report.attempts, 1);

    let expected = sphere_pair_union_volume(10.0, 10.0, 15.0);
    let verdict = m.check_volume("ab", expected, 5.0).unwrap();
    assert!(verdict.passed, "{}", verdict.detail);
    m.assert_oracles_pass("ab").unwrap();
    m.assert_no_errors().unwrap();
}

// ── Scenario 2: Difference without overlap ──────────────────────────────

#[test]
fn test_far_apart_difference_is_refused() {
    let mut m = ScenarioBuilder::mock();
    m.sphere("big", [0., 0., 0.], 20.0)
        .unwrap()
        .sphere("far", [100., 0., 0.], 5.0)
        .unwrap();

    let err = m.difference("cut", "big", "far").unwrap_err();
    assert!(
        matches!(
            err,
            HarnessError::Combine(CombineError::NoIntersection { .. })
        ),
        "got {err}"
    );

    let report = m.report();
    assert!(report.outcomes.is_empty());
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].0, "cut");
    assert!(m.solid("cut").is_err());
    assert_eq!(m.live_solids(), 2);
}

// ── Scenario 3: Single operand ──────────────────────────────────────────

#[test]
fn test_single_operand_passthrough() {
    let mut m = ScenarioBuilder::mock();
    m.sphere("a", [1., 2., 3.], 4.0).unwrap();

    let report = m.union("copy", &["a"]).unwrap();
    assert!(report.success);
    assert_eq!(report.status, OutcomeStatus::Trivial);
    assert_eq!(report.method, "SingleOperand");
    assert_eq!(report.attempts, 0);

    assert_volume_near(m.volume("copy").unwrap(), sphere_volume(4.0), 1e-6, "copy").unwrap();
    assert_ne!(m.solid("copy").unwrap().id(), m.solid("a").unwrap().id());
}

// ── Scenario 4: Idempotent re-union ─────────────────────────────────────

#[test]
fn test_reunion_keeps_volume() {
    let mut m = ScenarioBuilder::mock();
    m.sphere("a", [0., 0., 0.], 10.0)
        .unwrap()
        .sphere("b", [15., 0., 0.], 10.0)
        .unwrap();
    m.union("ab", &["a", "b"]).unwrap();
    m.union("again", &["ab"]).unwrap();

    let first = m.volume("ab").unwrap();
    assert_volume_near(m.volume("again").unwrap(), first, 1e-6, "again").unwrap();
}

// ── Scenario 5: Tangent spheres ─────────────────────────────────────────

#[test]
fn test_tangent_spheres_are_perturbed() {
    let mut m = ScenarioBuilder::mock();
    m.sphere("a", [0., 0., 0.], 10.0)
        .unwrap()
        .sphere("b", [20., 0., 0.], 10.0)
        .unwrap();

    let report = m.union("ab", &["a", "b"]).unwrap().clone();
    assert!(report.success);
    assert_eq!(report.strategy, Strategy::Perturb);
    assert_eq!(report.method, "Jiggled(0.0010)");
    m.assert_oracles_pass("ab").unwrap();

    let a = m.kernel().bounding_box(m.solid("a").unwrap()).unwrap();
    let b = m.kernel().bounding_box(m.solid("b").unwrap()).unwrap();
    let max_magnitude = m.config().jiggle.max_magnitude();
    let verdict = check_bbox_growth(
        m.kernel(),
        m.solid("ab").unwrap(),
        &a.union(&b),
        2.0 * max_magnitude,
    );
    assert!(verdict.passed, "{}", verdict.detail);
}

// ── Scenario 6: Dirty operand ───────────────────────────────────────────

#[test]
fn test_dirty_operand_is_repaired() {
    let mut m = ScenarioBuilder::mock();
    m.sphere("a", [0., 0., 0.], 10.0)
        .unwrap()
        .sphere("b", [15., 0., 0.], 10.0)
        .unwrap();
    m.mark_needs_repair("b").unwrap();

    m.union("ab", &["a", "b"]).unwrap();
    let outcome = m.outcome("ab").unwrap();
    assert_strategy(outcome, Strategy::RepairRetry, OutcomeStatus::Clean, "ab").unwrap();
    assert_eq!(outcome.method(), "Repaired");

    let expected = sphere_pair_union_volume(10.0, 10.0, 15.0);
    assert_volume_near(m.volume("ab").unwrap(), expected, 5.0, "ab").unwrap();
}

// ── Scenario 7: Nothing works cleanly ───────────────────────────────────

#[test]
fn test_persistent_defect_is_reported_imperfect() {
    let mut m = ScenarioBuilder::mock_with_quirks(MockQuirks {
        self_intersect_all: true,
        ..MockQuirks::default()
    });
    m.sphere("a", [0., 0., 0.], 10.0)
        .unwrap()
        .sphere("b", [15., 0., 0.], 10.0)
        .unwrap();

    let report = m.union("ab", &["a", "b"]).unwrap().clone();
    assert!(!report.success);
    assert_eq!(report.status, OutcomeStatus::Imperfect);
    assert_eq!(report.method, "Imperfect(SelfIntersections=1)");

    let verdict = |name: &str| {
        report
            .oracle_results
            .iter()
            .find(|v| v.oracle_name == name)
            .cloned()
            .unwrap()
    };
    assert!(verdict("outcome_consistency").passed);
    assert!(!verdict("no_self_intersections").passed);
    assert!(m.assert_oracles_pass("ab").is_err());
}

// ── Scenario 8: Kernel that never answers ───────────────────────────────

#[test]
fn test_exhausted_strategies_leave_only_inputs() {
    let mut m = ScenarioBuilder::mock_with_quirks(MockQuirks {
        min_union_tolerance: 100.0,
        ..MockQuirks::default()
    });
    m.sphere("a", [0., 0., 0.], 10.0)
        .unwrap()
        .sphere("b", [15., 0., 0.], 10.0)
        .unwrap();

    let err = m.union("ab", &["a", "b"]).unwrap_err();
    assert!(matches!(
        err,
        HarnessError::Combine(CombineError::CombinationExhausted { .. })
    ));
    assert!(m.assert_no_errors().is_err());
    assert_eq!(m.live_solids(), 2);
}
