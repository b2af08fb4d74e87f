//! ScenarioBuilder bookkeeping: names, removal, errors, tolerance overrides.

use combine_engine::EngineConfig;
use test_harness::{HarnessError, ScenarioBuilder};

#[test]
fn duplicate_name_is_rejected() {
    let mut m = ScenarioBuilder::mock();
    m.sphere("a", [0., 0., 0.], 1.0).unwrap();
    let Err(err) = m.cuboid("a", [0., 0., 0.], [1., 1., 1.]) else {
        panic!("duplicate name accepted");
    };
    assert!(matches!(err, HarnessError::DuplicateName { ref name } if name == "a"));
    assert_eq!(m.live_solids(), 1);
}

#[test]
fn result_name_must_be_free() {
    let mut m = ScenarioBuilder::mock();
    m.sphere("a", [0., 0., 0.], 10.0)
        .unwrap()
        .sphere("b", [15., 0., 0.], 10.0)
        .unwrap();
    let err = m.union("a", &["a", "b"]).unwrap_err();
    assert!(matches!(err, HarnessError::DuplicateName { .. }));
    assert!(m.report().errors.is_empty());
}

#[test]
fn unknown_operand_is_reported() {
    let mut m = ScenarioBuilder::mock();
    m.sphere("a", [0., 0., 0.], 10.0).unwrap();
    let err = m.union("ab", &["a", "missing"]).unwrap_err();
    assert!(matches!(err, HarnessError::SolidNotFound { ref name } if name == "missing"));
    let err = m.difference("cut", "missing", "a").unwrap_err();
    assert!(matches!(err, HarnessError::SolidNotFound { .. }));
}

#[test]
fn primitives_have_no_outcome() {
    let mut m = ScenarioBuilder::mock();
    m.sphere("a", [0., 0., 0.], 10.0).unwrap();
    assert!(matches!(
        m.outcome("a").unwrap_err(),
        HarnessError::NoOutcome { .. }
    ));
    assert!(matches!(
        m.assert_oracles_pass("a").unwrap_err(),
        HarnessError::NoOutcome { .. }
    ));
}

#[test]
fn remove_unknown_name_fails() {
    let mut m = ScenarioBuilder::mock();
    assert!(matches!(
        m.remove("ghost").unwrap_err(),
        HarnessError::SolidNotFound { .. }
    ));
}

#[test]
fn request_tolerance_overrides_context() {
    let mut m = ScenarioBuilder::mock().with_tolerance(Some(0.1));
    m.sphere("a", [0., 0., 0.], 10.0)
        .unwrap()
        .sphere("b", [15., 0., 0.], 10.0)
        .unwrap();
    let report = m.union("ab", &["a", "b"]).unwrap();
    assert_eq!(report.method, "MultiUnion(tol=0.100000)");
}

#[test]
fn invalid_config_is_recorded_as_error() {
    let mut m = ScenarioBuilder::mock().with_config(EngineConfig {
        escalation_factor: 0.5,
        ..EngineConfig::default()
    });
    m.sphere("a", [0., 0., 0.], 10.0)
        .unwrap()
        .sphere("b", [15., 0., 0.], 10.0)
        .unwrap();
    let err = m.union("ab", &["a", "b"]).unwrap_err();
    assert!(err.to_string().starts_with("combination error"), "{err}");
    assert_eq!(m.report().errors.len(), 1);
}

#[test]
fn corrupted_operand_is_refused() {
    let mut m = ScenarioBuilder::mock();
    m.sphere("a", [0., 0., 0.], 10.0)
        .unwrap()
        .sphere("b", [15., 0., 0.], 10.0)
        .unwrap();
    m.corrupt("b").unwrap();
    assert!(m.union("ab", &["a", "b"]).is_err());
    assert!(m.inspect("b").unwrap().to_string().contains("valid=false"));
}

#[test]
fn volume_checks_can_be_disabled() {
    let mut m = ScenarioBuilder::mock().without_volume_checks();
    m.sphere("a", [0., 0., 0.], 10.0)
        .unwrap()
        .sphere("b", [15., 0., 0.], 10.0)
        .unwrap();
    m.mark_needs_repair("b").unwrap();
    // The lossy direct result is accepted once volumes are not compared
    let report = m.union("ab", &["a", "b"]).unwrap();
    assert_eq!(report.method, "MultiUnion(tol=0.001000)");
}
