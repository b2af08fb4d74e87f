//! Multi-step and multi-body scenarios against MockKernel.

use std::collections::BTreeSet;

use combine_engine::{EngineConfig, OperationKind, Strategy, ValidatorConfig};
use kernel_adapter::{lens_volume, DegenerateContact, MockKernel, MockQuirks};
use splint_types::ToleranceContext;
use test_harness::assertions::assert_volume_near;
use test_harness::helpers::{row_centers, sphere_volume};
use test_harness::ScenarioBuilder;

fn sphere_row(m: &mut ScenarioBuilder<MockKernel>, n: usize, spacing: f64) -> Vec<String> {
    row_centers(n, spacing)
        .into_iter()
        .enumerate()
        .map(|(i, c)| {
            let name = format!("s{i}");
            m.sphere(&name, c, 10.0).unwrap();
            name
        })
        .collect()
}

// ── Chains ──────────────────────────────────────────────────────────────

#[test]
fn test_union_chain_matches_single_union() {
    let mut m = ScenarioBuilder::mock();
    let names = sphere_row(&mut m, 3, 15.0);

    m.union("s01", &[names[0].as_str(), names[1].as_str()]).unwrap();
    m.union("chain", &["s01", names[2].as_str()]).unwrap();
    let all: Vec<&str> = names.iter().map(String::as_str).collect();
    m.union("direct", &all).unwrap();

    // s0 and s2 are 30 apart and do not touch
    let expected = 3.0 * sphere_volume(10.0) - 2.0 * lens_volume(10.0, 10.0, 15.0);
    assert_volume_near(m.volume("direct").unwrap(), expected, 1e-6, "direct").unwrap();
    assert_volume_near(m.volume("chain").unwrap(), expected, 1.0, "chain").unwrap();
    m.assert_oracles_pass("chain").unwrap();
    m.assert_oracles_pass("direct").unwrap();
}

#[test]
fn test_difference_after_union() {
    let mut m = ScenarioBuilder::mock();
    m.sphere("a", [0., 0., 0.], 10.0)
        .unwrap()
        .sphere("b", [15., 0., 0.], 10.0)
        .unwrap()
        .sphere("cutter", [7.5, 0., 10.], 5.0)
        .unwrap();
    m.union("ab", &["a", "b"]).unwrap();

    let report = m.difference("notched", "ab", "cutter").unwrap().clone();
    assert_eq!(report.kind, OperationKind::Difference);
    assert_eq!(report.operands, vec!["ab".to_string(), "cutter".to_string()]);
    assert!(report.volume.unwrap() < m.volume("ab").unwrap());
}

#[test]
fn test_removed_intermediate_is_released() {
    let mut m = ScenarioBuilder::mock();
    let names = sphere_row(&mut m, 2, 15.0);
    m.union("ab", &[names[0].as_str(), names[1].as_str()]).unwrap();
    assert_eq!(m.live_solids(), 3);

    m.remove("ab").unwrap();
    assert_eq!(m.live_solids(), 2);
    assert!(m.volume("ab").is_err());
}

// ── Multi-body ordering ─────────────────────────────────────────────────

#[test]
fn test_wide_union_is_reordered() {
    let mut m = ScenarioBuilder::mock_with_quirks(MockQuirks {
        max_union_arity: Some(2),
        ..MockQuirks::default()
    });
    let names = sphere_row(&mut m, 3, 15.0);
    let all: Vec<&str> = names.iter().map(String::as_str).collect();

    let report = m.union("row", &all).unwrap();
    assert!(report.success);
    assert_eq!(report.strategy, Strategy::Reorder);
    assert_eq!(report.method, "Ordered(Sequential 0→N)");
}

#[test]
fn test_four_operands_fall_back_to_split_halves() {
    let mut m = ScenarioBuilder::mock_with_quirks(MockQuirks {
        max_union_arity: Some(2),
        rejected_unions: vec![
            (BTreeSet::from([0, 1, 2]), BTreeSet::from([3])),
            (BTreeSet::from([1, 2, 3]), BTreeSet::from([0])),
        ],
        ..MockQuirks::default()
    });
    let names = sphere_row(&mut m, 4, 15.0);
    let all: Vec<&str> = names.iter().map(String::as_str).collect();

    let report = m.union("row", &all).unwrap();
    assert_eq!(report.method, "Ordered(Split halves)");
    m.assert_oracles_pass("row").unwrap();
}

// ── Degenerate contact ──────────────────────────────────────────────────

#[test]
fn test_refused_tangent_union_without_smart_routing() {
    let mut m = ScenarioBuilder::mock_with_quirks(MockQuirks {
        degenerate_contact: DegenerateContact::Fail,
        ..MockQuirks::default()
    })
    .with_config(EngineConfig {
        smart_routing: false,
        ..EngineConfig::default()
    });
    let names = sphere_row(&mut m, 2, 20.0);

    let report = m.union("ab", &[names[0].as_str(), names[1].as_str()]).unwrap();
    assert_eq!(report.strategy, Strategy::Perturb);
    assert!(report.success);
}

#[test]
fn test_coplanar_faces_found_with_full_pair_budget() {
    let config = EngineConfig {
        validator: ValidatorConfig {
            max_face_pairs: 1000,
            ..ValidatorConfig::default()
        },
        ..EngineConfig::default()
    };
    let mut m = ScenarioBuilder::mock().with_config(config);
    for (i, x) in [0.0, 10.0, 20.0, 30.0, 32.0].into_iter().enumerate() {
        m.cuboid(&format!("box{i}"), [x, 0., 0.], [x + 2.0, 2., 2.])
            .unwrap();
    }
    let all = ["box0", "box1", "box2", "box3", "box4"];

    let report = m.union("boxes", &all).unwrap();
    assert_eq!(report.method, "Jiggled(0.0010)");
    assert!(m.inspect("boxes").unwrap().usable_for_booleans());
}

// ── Diagnostics ─────────────────────────────────────────────────────────

#[test]
fn test_diagnose_touching_pair() {
    let mut m = ScenarioBuilder::mock();
    let names = sphere_row(&mut m, 2, 20.0);

    let diagnosis = m.diagnose(&names[0], &names[1]).unwrap();
    assert!(diagnosis.bbox_overlap.is_some());
    assert_eq!(diagnosis.intersection_volume, Some(0.0));
    assert!(diagnosis.recommendations.iter().any(|r| r.contains("touch")));
    assert_eq!(m.live_solids(), 2);
}

#[test]
fn test_coarser_context_sets_labels() {
    let mut m =
        ScenarioBuilder::mock().with_context(ToleranceContext::default().with_absolute(0.01));
    let names = sphere_row(&mut m, 2, 15.0);
    let report = m.union("ab", &[names[0].as_str(), names[1].as_str()]).unwrap();
    assert_eq!(report.method, "MultiUnion(tol=0.010000)");
}
