//! Verification oracles: pure functions returning pass/fail verdicts.
//!
//! Each oracle returns an `OracleVerdict` with diagnostic detail, not panics.
//! This lets a scenario collect all failures in one pass.

use combine_engine::{inspect_solid, CombinationOutcome, ValidatorConfig};
use kernel_adapter::{BoundingBox, SolidHandle, SolidInspect};
use serde::{Deserialize, Serialize};

use crate::helpers::percent_error;

/// The result of a single oracle check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleVerdict {
    pub oracle_name: String,
    pub passed: bool,
    pub detail: String,
    pub value: Option<f64>,
}

impl OracleVerdict {
    fn pass(name: &str, detail: String) -> Self {
        Self {
            oracle_name: name.to_string(),
            passed: true,
            detail,
            value: None,
        }
    }

    fn pass_val(name: &str, detail: String, value: f64) -> Self {
        Self {
            oracle_name: name.to_string(),
            passed: true,
            detail,
            value: Some(value),
        }
    }

    fn fail(name: &str, detail: String) -> Self {
        Self {
            oracle_name: name.to_string(),
            passed: false,
            detail,
            value: None,
        }
    }

    fn fail_val(name: &str, detail: String, value: f64) -> Self {
        Self {
            oracle_name: name.to_string(),
            passed: false,
            detail,
            value: Some(value),
        }
    }
}

// ── Topology Oracles ────────────────────────────────────────────────────────

/// Check that the kernel reports a valid, closed, manifold solid with no
/// naked edges.
pub fn check_clean_topology(inspect: &dyn SolidInspect, solid: &SolidHandle) -> OracleVerdict {
    let mut problems = Vec::new();
    if !inspect.is_valid(solid) {
        problems.push("not valid".to_string());
    }
    if !inspect.is_solid(solid) {
        problems.push("not closed".to_string());
    }
    if !inspect.is_manifold(solid) {
        problems.push("not manifold".to_string());
    }
    let naked = inspect.naked_edge_count(solid);
    if naked > 0 {
        problems.push(format!("{naked} naked edges"));
    }

    if problems.is_empty() {
        OracleVerdict::pass(
            "clean_topology",
            format!("{} faces, valid closed manifold", inspect.face_count(solid)),
        )
    } else {
        OracleVerdict::fail("clean_topology", problems.join(", "))
    }
}

/// Check every face pair for interior intersections.
pub fn check_no_self_intersections(
    inspect: &dyn SolidInspect,
    solid: &SolidHandle,
    config: &ValidatorConfig,
) -> OracleVerdict {
    let pairs = inspect_solid(inspect, solid, config).self_intersections;
    if pairs.is_empty() {
        OracleVerdict::pass("no_self_intersections", "no interior face intersections".into())
    } else {
        OracleVerdict::fail_val(
            "no_self_intersections",
            format!(
                "{} intersecting face pairs: {:?}",
                pairs.len(),
                &pairs[..pairs.len().min(5)]
            ),
            pairs.len() as f64,
        )
    }
}

// ── Geometry Oracles ────────────────────────────────────────────────────────

/// Check the solid's volume is within `max_percent` of `expected`.
pub fn check_volume_conservation(
    inspect: &dyn SolidInspect,
    solid: &SolidHandle,
    expected: f64,
    max_percent: f64,
) -> OracleVerdict {
    let Some(actual) = inspect.volume(solid) else {
        return OracleVerdict::fail("volume_conservation", "volume unavailable".into());
    };
    let err = percent_error(actual, expected);
    let detail = format!("volume {actual:.3} vs expected {expected:.3} ({err:+.2}%)");
    if err.abs() <= max_percent {
        OracleVerdict::pass_val("volume_conservation", detail, err)
    } else {
        OracleVerdict::fail_val(
            "volume_conservation",
            format!("{detail}, limit ±{max_percent}%"),
            err,
        )
    }
}

/// Check the solid's bounding box grows at most `max_growth` past `reference`
/// on any side.
pub fn check_bbox_growth(
    inspect: &dyn SolidInspect,
    solid: &SolidHandle,
    reference: &BoundingBox,
    max_growth: f64,
) -> OracleVerdict {
    let Some(bb) = inspect.bounding_box(solid) else {
        return OracleVerdict::fail("bbox_growth", "bounding box unavailable".into());
    };
    let growth = bb.growth_beyond(reference);
    if growth <= max_growth {
        OracleVerdict::pass_val(
            "bbox_growth",
            format!("grew {growth:.6} (limit {max_growth:.6})"),
            growth,
        )
    } else {
        OracleVerdict::fail_val(
            "bbox_growth",
            format!("grew {growth:.6}, above limit {max_growth:.6}"),
            growth,
        )
    }
}

/// Check that each input still has the volume it had before combining.
pub fn check_inputs_untouched(
    inspect: &dyn SolidInspect,
    inputs: &[(&SolidHandle, f64)],
) -> OracleVerdict {
    let mut changed = Vec::new();
    for (solid, before) in inputs {
        match inspect.volume(solid) {
            Some(now) if (now - before).abs() <= 1e-9 * before.abs().max(1.0) => {}
            Some(now) => changed.push(format!("{solid}: {before:.3} -> {now:.3}")),
            None => changed.push(format!("{solid}: gone")),
        }
    }
    if changed.is_empty() {
        OracleVerdict::pass("inputs_untouched", format!("{} inputs unchanged", inputs.len()))
    } else {
        OracleVerdict::fail("inputs_untouched", changed.join("; "))
    }
}

// ── Outcome Oracles ─────────────────────────────────────────────────────────

/// Check the outcome's method label starts with `expected_prefix`.
pub fn check_method_label(outcome: &CombinationOutcome, expected_prefix: &str) -> OracleVerdict {
    let method = outcome.method();
    if method.starts_with(expected_prefix) {
        OracleVerdict::pass("method_label", format!("method {method}"))
    } else {
        OracleVerdict::fail(
            "method_label",
            format!("method {method}, expected prefix {expected_prefix}"),
        )
    }
}

/// Check a successful outcome carries no defects and an imperfect one
/// names them in its label.
pub fn check_outcome_consistency(outcome: &CombinationOutcome) -> OracleVerdict {
    let defects = outcome.defects().len();
    match (outcome.success(), defects) {
        (true, 0) => OracleVerdict::pass(
            "outcome_consistency",
            format!("{:?} via {}", outcome.status(), outcome.strategy()),
        ),
        (false, n) if n > 0 && outcome.method().starts_with("Imperfect(") => OracleVerdict::pass_val(
            "outcome_consistency",
            format!("imperfect with {n} defects: {}", outcome.method()),
            n as f64,
        ),
        (success, n) => OracleVerdict::fail_val(
            "outcome_consistency",
            format!(
                "success={success} with {n} defects, method {}",
                outcome.method()
            ),
            n as f64,
        ),
    }
}

/// Run the oracles that apply to any outcome.
pub fn run_outcome_oracles(
    inspect: &dyn SolidInspect,
    outcome: &CombinationOutcome,
    expected_volume: Option<f64>,
    max_percent: f64,
    config: &ValidatorConfig,
) -> Vec<OracleVerdict> {
    let mut out = vec![
        check_outcome_consistency(outcome),
        check_clean_topology(inspect, outcome.solid()),
        check_no_self_intersections(inspect, outcome.solid(), config),
    ];
    if let Some(expected) = expected_volume {
        out.push(check_volume_conservation(
            inspect,
            outcome.solid(),
            expected,
            max_percent,
        ));
    }
    out
}
