//! Oracle verdicts on hand-built solids.

use approx::assert_relative_eq;
use combine_engine::{combine_union, EngineConfig, ValidatorConfig};
use kernel_adapter::{GeometryKernel, MockKernel, MockQuirks, SolidInspect};
use nalgebra::Point3;
use splint_types::ToleranceContext;
use test_harness::assertions::assert_all_pass;
use test_harness::helpers::sphere_volume;
use test_harness::oracle::*;
use test_harness::HarnessError;

#[test]
fn clean_sphere_passes_topology() {
    let mut k = MockKernel::new();
    let s = k.add_sphere(Point3::origin(), 5.0);
    let v = check_clean_topology(&k, &s);
    assert!(v.passed, "{}", v.detail);
    assert!(v.detail.contains("2 faces"));
}

#[test]
fn corrupted_solid_fails_topology() {
    let mut k = MockKernel::new();
    let s = k.add_sphere(Point3::origin(), 5.0);
    k.corrupt(&s);
    let v = check_clean_topology(&k, &s);
    assert!(!v.passed);
    assert!(v.detail.contains("not valid"));
}

#[test]
fn open_result_fails_topology() {
    let mut k = MockKernel::with_quirks(MockQuirks {
        naked_edges_on_results: 2,
        ..MockQuirks::default()
    });
    let a = k.add_sphere(Point3::origin(), 10.0);
    let b = k.add_sphere(Point3::new(15.0, 0.0, 0.0), 10.0);
    let u = k.union(&[&a, &b], 0.001).unwrap();
    let v = check_clean_topology(&k, &u);
    assert!(!v.passed);
    assert!(v.detail.contains("2 naked edges"), "{}", v.detail);
}

#[test]
fn tangent_union_has_self_intersection() {
    let mut k = MockKernel::new();
    let a = k.add_sphere(Point3::origin(), 10.0);
    let b = k.add_sphere(Point3::new(20.0, 0.0, 0.0), 10.0);
    let u = k.union(&[&a, &b], 0.001).unwrap();
    let v = check_no_self_intersections(&k, &u, &ValidatorConfig::default());
    assert!(!v.passed);
    assert_eq!(v.value, Some(1.0));
}

#[test]
fn volume_conservation_reports_signed_error() {
    let mut k = MockKernel::new();
    let s = k.add_sphere(Point3::origin(), 10.0);
    let exact = sphere_volume(10.0);

    let v = check_volume_conservation(&k, &s, exact, 1.0);
    assert!(v.passed);
    assert_relative_eq!(v.value.unwrap(), 0.0, epsilon = 1e-9);

    let v = check_volume_conservation(&k, &s, exact * 2.0, 10.0);
    assert!(!v.passed);
    assert_relative_eq!(v.value.unwrap(), -50.0, epsilon = 1e-9);
}

#[test]
fn missing_volume_fails_conservation() {
    let mut k = MockKernel::with_quirks(MockQuirks {
        volume_unavailable: true,
        ..MockQuirks::default()
    });
    let a = k.add_sphere(Point3::origin(), 10.0);
    let b = k.add_sphere(Point3::new(15.0, 0.0, 0.0), 10.0);
    let u = k.union(&[&a, &b], 0.001).unwrap();
    let v = check_volume_conservation(&k, &u, 1.0, 100.0);
    assert!(!v.passed);
    assert_eq!(v.detail, "volume unavailable");
}

#[test]
fn bbox_growth_is_measured() {
    let mut k = MockKernel::new();
    let mut s = k.add_sphere(Point3::origin(), 10.0);
    let reference = k.bounding_box(&s).unwrap();
    k.translate(&mut s, nalgebra::Vector3::new(0.5, 0.0, 0.0)).unwrap();

    let v = check_bbox_growth(&k, &s, &reference, 1.0);
    assert!(v.passed);
    assert_relative_eq!(v.value.unwrap(), 0.5, epsilon = 1e-9);
    assert!(!check_bbox_growth(&k, &s, &reference, 0.1).passed);
}

#[test]
fn inputs_untouched_detects_discard() {
    let mut k = MockKernel::new();
    let a = k.add_sphere(Point3::origin(), 10.0);
    let b = k.add_sphere(Point3::new(15.0, 0.0, 0.0), 10.0);
    let va = k.volume(&a).unwrap();
    let vb = k.volume(&b).unwrap();

    assert!(check_inputs_untouched(&k, &[(&a, va), (&b, vb)]).passed);

    let copy = k.duplicate(&b).unwrap();
    k.discard(copy);
    assert!(check_inputs_untouched(&k, &[(&a, va), (&b, vb)]).passed);
    assert!(!check_inputs_untouched(&k, &[(&a, vb + 1.0)]).passed);
}

#[test]
fn outcome_oracles_on_engine_result() {
    let mut k = MockKernel::new();
    let a = k.add_sphere(Point3::origin(), 10.0);
    let b = k.add_sphere(Point3::new(15.0, 0.0, 0.0), 10.0);
    let config = EngineConfig::default();
    let outcome = combine_union(
        &mut k,
        &[&a, &b],
        None,
        true,
        &config,
        &ToleranceContext::default(),
    )
    .unwrap();

    assert!(check_method_label(&outcome, "MultiUnion").passed);
    assert!(!check_method_label(&outcome, "Jiggled").passed);

    let verdicts = run_outcome_oracles(&k, &outcome, None, 5.0, &config.validator);
    assert_eq!(verdicts.len(), 3);
    assert_all_pass(&verdicts, "pair").unwrap();
}

#[test]
fn imperfect_outcome_is_consistent() {
    let mut k = MockKernel::with_quirks(MockQuirks {
        self_intersect_all: true,
        ..MockQuirks::default()
    });
    let a = k.add_sphere(Point3::origin(), 10.0);
    let b = k.add_sphere(Point3::new(15.0, 0.0, 0.0), 10.0);
    let outcome = combine_union(
        &mut k,
        &[&a, &b],
        None,
        true,
        &EngineConfig::default(),
        &ToleranceContext::default(),
    )
    .unwrap();

    let v = check_outcome_consistency(&outcome);
    assert!(v.passed, "{}", v.detail);
    assert_eq!(v.value, Some(1.0));
}

#[test]
fn assert_all_pass_reports_each_failure() {
    let mut k = MockKernel::new();
    let s = k.add_sphere(Point3::origin(), 10.0);
    k.corrupt(&s);
    let one = vec![
        check_volume_conservation(&k, &s, sphere_volume(10.0), 1.0),
        check_clean_topology(&k, &s),
    ];
    match assert_all_pass(&one, "single").unwrap_err() {
        HarnessError::OracleFailure { oracle, detail } => {
            assert_eq!(oracle, "clean_topology");
            assert!(detail.starts_with("[single]"));
        }
        other => panic!("expected OracleFailure, got {other}"),
    }

    let two = vec![
        check_volume_conservation(&k, &s, 1.0, 1.0),
        check_clean_topology(&k, &s),
    ];
    let err = assert_all_pass(&two, "double").unwrap_err();
    assert!(err.to_string().contains("2 oracles failed"), "{err}");
}
