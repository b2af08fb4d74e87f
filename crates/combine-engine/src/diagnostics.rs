//! Solid inspection and pair diagnosis.
//!
//! These do not combine anything the caller keeps. They report why a
//! combination is likely to fail and what to try next.

use std::fmt;

use kernel_adapter::{BoundingBox, KernelBundle, SolidHandle, SolidInspect};
use serde::{Deserialize, Serialize};
use splint_types::ToleranceContext;
use tracing::{debug, instrument};

use crate::config::ValidatorConfig;
use crate::validate::interior_intersection_pairs;

/// Intersection volume below which two solids are considered touching.
const TOUCHING_VOLUME: f64 = 0.001;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InspectionReport {
    pub solid_id: u64,
    pub valid: bool,
    pub solid: bool,
    pub manifold: bool,
    pub face_count: usize,
    pub naked_edges: usize,
    pub volume: Option<f64>,
    pub bounding_box: Option<BoundingBox>,
    /// Every face pair with an interior intersection.
    pub self_intersections: Vec<(usize, usize)>,
}

impl InspectionReport {
    pub fn usable_for_booleans(&self) -> bool {
        self.valid
            && self.solid
            && self.manifold
            && self.naked_edges == 0
            && self.self_intersections.is_empty()
    }
}

impl fmt::Display for InspectionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "solid #{}", self.solid_id)?;
        writeln!(
            f,
            "  valid={} solid={} manifold={}",
            self.valid, self.solid, self.manifold
        )?;
        writeln!(f, "  faces={} naked_edges={}", self.face_count, self.naked_edges)?;
        match self.volume {
            Some(v) => writeln!(f, "  volume={v:.6}")?,
            None => writeln!(f, "  volume=unavailable")?,
        }
        if let Some(bb) = &self.bounding_box {
            writeln!(
                f,
                "  bbox=({:.3}, {:.3}, {:.3})..({:.3}, {:.3}, {:.3})",
                bb.min.x, bb.min.y, bb.min.z, bb.max.x, bb.max.y, bb.max.z
            )?;
        }
        if !self.self_intersections.is_empty() {
            writeln!(f, "  self-intersecting face pairs: {:?}", self.self_intersections)?;
        }
        write!(f, "  usable for booleans: {}", self.usable_for_booleans())
    }
}

/// Inspect one solid, checking every face pair.
pub fn inspect_solid(
    inspect: &dyn SolidInspect,
    solid: &SolidHandle,
    config: &ValidatorConfig,
) -> InspectionReport {
    InspectionReport {
        solid_id: solid.id(),
        valid: inspect.is_valid(solid),
        solid: inspect.is_solid(solid),
        manifold: inspect.is_manifold(solid),
        face_count: inspect.face_count(solid),
        naked_edges: inspect.naked_edge_count(solid),
        volume: inspect.volume(solid),
        bounding_box: inspect.bounding_box(solid),
        self_intersections: interior_intersection_pairs(inspect, solid, config, None),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToleranceProbe {
    pub tolerance: f64,
    pub succeeded: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairDiagnosis {
    pub first: InspectionReport,
    pub second: InspectionReport,
    pub bbox_overlap: Option<BoundingBox>,
    pub intersection_volume: Option<f64>,
    /// Union attempts in sweep order, up to the first success.
    pub sweep: Vec<ToleranceProbe>,
    pub recommendations: Vec<String>,
}

impl PairDiagnosis {
    /// First swept tolerance at which the union succeeded.
    pub fn working_tolerance(&self) -> Option<f64> {
        self.sweep.iter().find(|p| p.succeeded).map(|p| p.tolerance)
    }
}

impl fmt::Display for PairDiagnosis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.first)?;
        writeln!(f, "{}", self.second)?;
        match &self.bbox_overlap {
            Some(bb) => writeln!(f, "bbox overlap volume={:.6}", bb.volume())?,
            None => writeln!(f, "bbox overlap: none")?,
        }
        match self.intersection_volume {
            Some(v) => writeln!(f, "intersection volume={v:.6}")?,
            None => writeln!(f, "intersection volume unavailable")?,
        }
        for probe in &self.sweep {
            match &probe.error {
                None => writeln!(f, "union at tol={:.6}: ok", probe.tolerance)?,
                Some(e) => writeln!(f, "union at tol={:.6}: failed ({e})", probe.tolerance)?,
            }
        }
        for (i, rec) in self.recommendations.iter().enumerate() {
            writeln!(f, "{}. {rec}", i + 1)?;
        }
        Ok(())
    }
}

/// Tolerances tried by the union sweep, without repeats.
pub fn sweep_tolerances(base: f64) -> Vec<f64> {
    let mut out: Vec<f64> = Vec::new();
    for t in [base, base * 10.0, base * 100.0, 0.001, 0.01, 0.1] {
        if !out.iter().any(|seen| (seen - t).abs() <= 1e-12 * t.max(1.0)) {
            out.push(t);
        }
    }
    out
}

/// Diagnose why `a` and `b` may not combine.
#[instrument(skip_all, fields(first = %a, second = %b))]
pub fn diagnose_pair(
    kernel: &mut dyn KernelBundle,
    a: &SolidHandle,
    b: &SolidHandle,
    config: &ValidatorConfig,
    ctx: &ToleranceContext,
) -> PairDiagnosis {
    let first = inspect_solid(kernel.as_inspect(), a, config);
    let second = inspect_solid(kernel.as_inspect(), b, config);
    let bbox_overlap = match (&first.bounding_box, &second.bounding_box) {
        (Some(x), Some(y)) => x.intersection(y),
        _ => None,
    };
    let intersection_volume = match kernel.intersection_volume(a, b, ctx.absolute) {
        Ok(v) => Some(v),
        Err(e) => {
            debug!(error = %e, "intersection volume unavailable");
            None
        }
    };

    let mut sweep = Vec::new();
    for tolerance in sweep_tolerances(ctx.absolute) {
        match kernel.union(&[a, b], tolerance) {
            Ok(result) => {
                kernel.discard(result);
                sweep.push(ToleranceProbe {
                    tolerance,
                    succeeded: true,
                    error: None,
                });
                break;
            }
            Err(e) => sweep.push(ToleranceProbe {
                tolerance,
                succeeded: false,
                error: Some(e.to_string()),
            }),
        }
    }

    let mut diagnosis = PairDiagnosis {
        first,
        second,
        bbox_overlap,
        intersection_volume,
        sweep,
        recommendations: Vec::new(),
    };
    diagnosis.recommendations = recommend(&diagnosis, ctx.absolute);
    diagnosis
}

fn recommend(d: &PairDiagnosis, base: f64) -> Vec<String> {
    let mut out = Vec::new();
    for (name, report) in [("first", &d.first), ("second", &d.second)] {
        if !report.usable_for_booleans() {
            out.push(format!(
                "{name} solid #{} is not clean (valid={}, solid={}, naked edges={}, self-intersections={}); repair it first",
                report.solid_id,
                report.valid,
                report.solid,
                report.naked_edges,
                report.self_intersections.len()
            ));
        }
    }
    if d.bbox_overlap.is_none() {
        out.push("bounding boxes do not overlap; the solids are disjoint".to_string());
    } else if d.intersection_volume.is_some_and(|v| v < TOUCHING_VOLUME) {
        out.push(
            "solids touch without overlapping; perturb one slightly or overlap them".to_string(),
        );
    }
    match d.working_tolerance() {
        Some(t) if t > base => out.push(format!(
            "union only succeeds at tolerance {t:.6}; raise the tolerance"
        )),
        Some(_) => {}
        None => out.push(
            "union fails at every swept tolerance; try another ordering or perturbation"
                .to_string(),
        ),
    }
    out
}
