//! Result quality validation.
//!
//! A candidate is checked for topology, naked edges, interior face/face
//! intersections, volume conservation and (optionally) retention of interior
//! sample points of the inputs. Every failing check contributes its own
//! defect; the candidate is accepted only when none fire.

use kernel_adapter::{
    polyline_point_at, BoundingBox, KernelBundle, KernelError, SolidHandle, SolidInspect,
};
use nalgebra::{Point3, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use splint_types::Defect;
use tracing::{debug, instrument};

use crate::config::ValidatorConfig;
use crate::types::{OperationKind, Operands, ValidationVerdict};

/// Draws per requested probe point before giving up on an operand.
const PROBE_DRAWS_PER_POINT: usize = 32;

// ── Reference ───────────────────────────────────────────────────────────

/// Per-request inputs to validation, computed once before any attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationReference {
    pub kind: OperationKind,
    pub check_volumes: bool,
    /// Sum of operand volumes (the minuend alone for a difference).
    pub input_volume: Option<f64>,
    pub expected_volume: Option<f64>,
    pub minuend_volume: Option<f64>,
    /// Points that must lie inside every acceptable result.
    pub probes: Vec<Point3<f64>>,
}

impl ValidationReference {
    /// Expected union volume: Σ volumes − Σ pairwise intersection volumes.
    /// Pairs the kernel cannot intersect are left out of the correction.
    pub fn for_union(
        kernel: &mut dyn KernelBundle,
        solids: &[&SolidHandle],
        tolerance: f64,
        check_volumes: bool,
        config: &ValidatorConfig,
    ) -> Self {
        let (input_volume, expected_volume) = if check_volumes {
            let volumes: Option<Vec<f64>> =
                solids.iter().map(|s| kernel.as_inspect().volume(s)).collect();
            match volumes {
                Some(volumes) => {
                    let total: f64 = volumes.iter().sum();
                    let mut overlap = 0.0;
                    for i in 0..solids.len() {
                        for j in (i + 1)..solids.len() {
                            match kernel.intersection_volume(solids[i], solids[j], tolerance) {
                                Ok(v) => overlap += v,
                                Err(e) => {
                                    debug!(i, j, error = %e, "pairwise intersection volume unavailable")
                                }
                            }
                        }
                    }
                    (Some(total), Some(total - overlap))
                }
                None => (None, None),
            }
        } else {
            (None, None)
        };

        let probes = union_probes(kernel.as_inspect(), solids, tolerance, config);
        Self {
            kind: OperationKind::Union,
            check_volumes,
            input_volume,
            expected_volume,
            minuend_volume: None,
            probes,
        }
    }

    /// Expected difference volume: minuend − (minuend ∩ subtrahend). Without
    /// an intersection volume the whole subtrahend volume is subtracted.
    pub fn for_difference(
        inspect: &dyn SolidInspect,
        minuend: &SolidHandle,
        subtrahend: &SolidHandle,
        intersection: Option<f64>,
        tolerance: f64,
        check_volumes: bool,
        config: &ValidatorConfig,
    ) -> Self {
        let minuend_volume = if check_volumes {
            inspect.volume(minuend)
        } else {
            None
        };
        let expected_volume = minuend_volume.and_then(|m| match intersection {
            Some(common) => Some(m - common),
            None => inspect.volume(subtrahend).map(|s| m - s),
        });

        let probes = difference_probes(inspect, minuend, subtrahend, tolerance, config);
        Self {
            kind: OperationKind::Difference,
            check_volumes,
            input_volume: minuend_volume,
            expected_volume,
            minuend_volume,
            probes,
        }
    }

    /// Reference for a request's operands.
    pub fn for_operands(
        kernel: &mut dyn KernelBundle,
        operands: &Operands<'_>,
        intersection: Option<f64>,
        tolerance: f64,
        check_volumes: bool,
        config: &ValidatorConfig,
    ) -> Self {
        match operands {
            Operands::Union(solids) => {
                Self::for_union(kernel, solids, tolerance, check_volumes, config)
            }
            Operands::Difference {
                minuend,
                subtrahend,
            } => Self::for_difference(
                kernel.as_inspect(),
                minuend,
                subtrahend,
                intersection,
                tolerance,
                check_volumes,
                config,
            ),
        }
    }
}

// ── Probe points ────────────────────────────────────────────────────────

/// A point is a usable probe when it and its six axis neighbours at
/// `margin` classify the same way.
fn stable<F>(p: &Point3<f64>, margin: f64, classify: &F) -> Result<bool, KernelError>
where
    F: Fn(&Point3<f64>) -> Result<bool, KernelError>,
{
    if !classify(p)? {
        return Ok(false);
    }
    for axis in 0..3 {
        let mut step = Vector3::zeros();
        step[axis] = margin;
        if !classify(&(p + step))? || !classify(&(p - step))? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn sample_probes<F>(
    bb: &BoundingBox,
    count: usize,
    margin: f64,
    rng: &mut StdRng,
    classify: F,
) -> Result<Vec<Point3<f64>>, KernelError>
where
    F: Fn(&Point3<f64>) -> Result<bool, KernelError>,
{
    let mut points = Vec::with_capacity(count);
    let extent = bb.extent();
    for _ in 0..count.saturating_mul(PROBE_DRAWS_PER_POINT) {
        if points.len() == count {
            break;
        }
        let p = bb.min
            + Vector3::new(
                rng.gen::<f64>() * extent.x,
                rng.gen::<f64>() * extent.y,
                rng.gen::<f64>() * extent.z,
            );
        if stable(&p, margin, &classify)? {
            points.push(p);
        }
    }
    Ok(points)
}

fn union_probes(
    inspect: &dyn SolidInspect,
    solids: &[&SolidHandle],
    tolerance: f64,
    config: &ValidatorConfig,
) -> Vec<Point3<f64>> {
    if config.containment_samples == 0 {
        return Vec::new();
    }
    let mut rng = StdRng::seed_from_u64(config.containment_seed);
    let mut probes = Vec::new();
    for solid in solids {
        let Some(bb) = inspect.bounding_box(solid) else {
            continue;
        };
        let sampled = sample_probes(
            &bb,
            config.containment_samples,
            config.edge_proximity,
            &mut rng,
            |p| inspect.contains_point(solid, p, tolerance),
        );
        match sampled {
            Ok(points) => probes.extend(points),
            Err(e) => {
                debug!(error = %e, "containment unavailable, probe check disabled");
                return Vec::new();
            }
        }
    }
    probes
}

fn difference_probes(
    inspect: &dyn SolidInspect,
    minuend: &SolidHandle,
    subtrahend: &SolidHandle,
    tolerance: f64,
    config: &ValidatorConfig,
) -> Vec<Point3<f64>> {
    if config.containment_samples == 0 {
        return Vec::new();
    }
    let Some(bb) = inspect.bounding_box(minuend) else {
        return Vec::new();
    };
    let mut rng = StdRng::seed_from_u64(config.containment_seed);
    let sampled = sample_probes(
        &bb,
        config.containment_samples,
        config.edge_proximity,
        &mut rng,
        |p| {
            Ok(inspect.contains_point(minuend, p, tolerance)?
                && !inspect.contains_point(subtrahend, p, tolerance)?)
        },
    );
    sampled.unwrap_or_else(|e| {
        debug!(error = %e, "containment unavailable, probe check disabled");
        Vec::new()
    })
}

// ── Self-intersection heuristic ─────────────────────────────────────────

/// Face pairs `(i, j)`, `i < j`, whose intersection curves run away from
/// every edge of the solid. At most `limit` pairs are examined.
pub(crate) fn interior_intersection_pairs(
    inspect: &dyn SolidInspect,
    solid: &SolidHandle,
    config: &ValidatorConfig,
    limit: Option<usize>,
) -> Vec<(usize, usize)> {
    let faces = inspect.face_count(solid);
    let pairs = (0..faces).flat_map(|i| ((i + 1)..faces).map(move |j| (i, j)));
    let mut found = Vec::new();
    for (examined, (i, j)) in pairs.enumerate() {
        if limit.is_some_and(|max| examined >= max) {
            break;
        }
        let curves = match inspect.face_intersections(solid, i, j, config.probe_tolerance) {
            Ok(curves) => curves,
            Err(KernelError::NotSupported { operation }) => {
                debug!(%operation, "face intersection unsupported, heuristic skipped");
                break;
            }
            Err(e) => {
                debug!(i, j, error = %e, "face pair skipped");
                continue;
            }
        };
        let interior = curves.iter().any(|curve| {
            config.curve_samples.iter().any(|t| {
                polyline_point_at(curve, *t)
                    .and_then(|p| inspect.distance_to_nearest_edge(solid, &p))
                    .is_some_and(|d| d > config.edge_proximity)
            })
        });
        if interior {
            found.push((i, j));
        }
    }
    found
}

// ── Validator ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct Validator {
    config: ValidatorConfig,
}

impl Validator {
    pub fn new(config: ValidatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Check `candidate` against `reference`, allowing a volume deviation of
    /// `tolerance_percent`.
    #[instrument(skip(self, inspect, candidate, reference), fields(solid = %candidate))]
    pub fn validate(
        &self,
        inspect: &dyn SolidInspect,
        candidate: &SolidHandle,
        reference: &ValidationReference,
        tolerance_percent: f64,
    ) -> ValidationVerdict {
        let mut defects = Vec::new();

        if !inspect.is_valid(candidate) {
            defects.push(Defect::NotValid);
        }
        if !inspect.is_solid(candidate) {
            defects.push(Defect::NotSolid);
        }
        if !inspect.is_manifold(candidate) {
            defects.push(Defect::NotManifold);
        }

        let naked = inspect.naked_edge_count(candidate);
        if naked > 0 {
            defects.push(Defect::NakedEdges { count: naked });
        }

        let pairs = interior_intersection_pairs(
            inspect,
            candidate,
            &self.config,
            Some(self.config.max_face_pairs),
        );
        if !pairs.is_empty() {
            defects.push(Defect::SelfIntersections { count: pairs.len() });
        }

        if reference.check_volumes {
            self.check_volume(inspect, candidate, reference, tolerance_percent, &mut defects);
        }

        if !reference.probes.is_empty() {
            let lost = reference
                .probes
                .iter()
                .map(|p| inspect.contains_point(candidate, p, self.config.probe_tolerance))
                .try_fold(0usize, |lost, inside| inside.map(|i| lost + usize::from(!i)));
            match lost {
                Ok(0) => {}
                Ok(count) => defects.push(Defect::LostInteriorPoints { count }),
                Err(e) => debug!(error = %e, "containment check skipped"),
            }
        }

        debug!(defects = defects.len(), "validated");
        ValidationVerdict::from_defects(defects)
    }

    fn check_volume(
        &self,
        inspect: &dyn SolidInspect,
        candidate: &SolidHandle,
        reference: &ValidationReference,
        tolerance_percent: f64,
        defects: &mut Vec<Defect>,
    ) {
        let Some(volume) = inspect.volume(candidate) else {
            defects.push(Defect::NoVolume);
            return;
        };
        if let Some(expected) = reference.expected_volume.filter(|e| *e > 0.0) {
            let percent = (volume / expected - 1.0) * 100.0;
            if percent.abs() > tolerance_percent {
                defects.push(Defect::VolumeError { percent });
            }
        }
        if reference.kind == OperationKind::Difference {
            if let Some(minuend) = reference.minuend_volume {
                if volume >= minuend {
                    defects.push(Defect::ResultNotSmaller);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use kernel_adapter::{lens_volume, GeometryKernel, MockKernel, MockQuirks};
    use std::f64::consts::PI;

    fn sphere_volume(r: f64) -> f64 {
        4.0 / 3.0 * PI * r.powi(3)
    }

    #[test]
    fn union_reference_subtracts_pairwise_overlap() {
        let mut k = MockKernel::new();
        let a = k.add_sphere(Point3::origin(), 10.0);
        let b = k.add_sphere(Point3::new(15.0, 0.0, 0.0), 10.0);
        let r = ValidationReference::for_union(
            &mut k,
            &[&a, &b],
            0.001,
            true,
            &ValidatorConfig::default(),
        );
        assert_relative_eq!(r.input_volume.unwrap(), 2.0 * sphere_volume(10.0));
        assert_relative_eq!(
            r.expected_volume.unwrap(),
            2.0 * sphere_volume(10.0) - lens_volume(10.0, 10.0, 15.0),
            epsilon = 1e-9
        );
        assert!(r.probes.is_empty());
    }

    #[test]
    fn difference_reference_falls_back_to_subtrahend_volume() {
        let mut k = MockKernel::new();
        let a = k.add_sphere(Point3::origin(), 10.0);
        let b = k.add_sphere(Point3::new(15.0, 0.0, 0.0), 5.0);
        let cfg = ValidatorConfig::default();
        let r = ValidationReference::for_difference(&k, &a, &b, None, 0.001, true, &cfg);
        assert_relative_eq!(
            r.expected_volume.unwrap(),
            sphere_volume(10.0) - sphere_volume(5.0),
            epsilon = 1e-9
        );
        let r = ValidationReference::for_difference(&k, &a, &b, Some(1.0), 0.001, true, &cfg);
        assert_relative_eq!(r.expected_volume.unwrap(), sphere_volume(10.0) - 1.0, epsilon = 1e-9);
    }

    #[test]
    fn clean_union_is_accepted() {
        let mut k = MockKernel::new();
        let a = k.add_sphere(Point3::origin(), 10.0);
        let b = k.add_sphere(Point3::new(15.0, 0.0, 0.0), 10.0);
        let cfg = ValidatorConfig::default();
        let r = ValidationReference::for_union(&mut k, &[&a, &b], 0.001, true, &cfg);
        let u = k.union(&[&a, &b], 0.001).unwrap();
        let verdict = Validator::new(cfg).validate(&k, &u, &r, 5.0);
        assert!(verdict.accepted(), "{:?}", verdict.defects());
    }

    #[test]
    fn tangent_union_reports_one_self_intersection() {
        let mut k = MockKernel::new();
        let a = k.add_sphere(Point3::origin(), 10.0);
        let b = k.add_sphere(Point3::new(20.0, 0.0, 0.0), 10.0);
        let cfg = ValidatorConfig::default();
        let r = ValidationReference::for_union(&mut k, &[&a, &b], 0.001, true, &cfg);
        let u = k.union(&[&a, &b], 0.001).unwrap();
        let verdict = Validator::new(cfg).validate(&k, &u, &r, 5.0);
        assert_eq!(verdict.defects(), &[Defect::SelfIntersections { count: 1 }]);
        assert!(verdict.meets_minimum_bar());
    }

    #[test]
    fn topology_and_volume_defects_accumulate() {
        let quirks = MockQuirks {
            naked_edges_on_results: 3,
            ..MockQuirks::default()
        };
        let mut k = MockKernel::with_quirks(quirks);
        let a = k.add_sphere(Point3::origin(), 10.0);
        let b = k.add_sphere(Point3::new(15.0, 0.0, 0.0), 10.0);
        k.mark_needs_repair(&b);
        let cfg = ValidatorConfig::default();
        let r = ValidationReference::for_union(&mut k, &[&a, &b], 0.001, true, &cfg);
        let u = k.union(&[&a, &b], 0.001).unwrap();
        let verdict = Validator::new(cfg).validate(&k, &u, &r, 5.0);
        let defects = verdict.defects();
        assert_eq!(defects[0], Defect::NotSolid);
        assert_eq!(defects[1], Defect::NakedEdges { count: 3 });
        match defects[2] {
            Defect::VolumeError { percent } => assert_relative_eq!(percent, -30.0, epsilon = 1e-6),
            ref other => panic!("unexpected defect {other:?}"),
        }
        assert!(!verdict.meets_minimum_bar());
    }

    #[test]
    fn volume_checks_skipped_when_disabled() {
        let quirks = MockQuirks {
            volume_unavailable: true,
            ..MockQuirks::default()
        };
        let mut k = MockKernel::with_quirks(quirks);
        let a = k.add_sphere(Point3::origin(), 10.0);
        let b = k.add_sphere(Point3::new(15.0, 0.0, 0.0), 10.0);
        let cfg = ValidatorConfig::default();
        let u = k.union(&[&a, &b], 0.001).unwrap();

        let off = ValidationReference::for_union(&mut k, &[&a, &b], 0.001, false, &cfg);
        assert!(Validator::new(cfg.clone()).validate(&k, &u, &off, 5.0).accepted());

        let on = ValidationReference::for_union(&mut k, &[&a, &b], 0.001, true, &cfg);
        let verdict = Validator::new(cfg).validate(&k, &u, &on, 5.0);
        assert_eq!(verdict.defects(), &[Defect::NoVolume]);
    }

    #[test]
    fn difference_must_shrink_minuend() {
        let mut k = MockKernel::new();
        let a = k.add_sphere(Point3::origin(), 10.0);
        let b = k.add_sphere(Point3::new(15.0, 0.0, 0.0), 10.0);
        let cfg = ValidatorConfig::default();
        let r = ValidationReference::for_difference(
            &k,
            &a,
            &b,
            Some(lens_volume(10.0, 10.0, 15.0)),
            0.001,
            true,
            &cfg,
        );
        // The unchanged minuend is not a valid difference result
        let copy = k.duplicate(&a).unwrap();
        let verdict = Validator::new(cfg).validate(&k, &copy, &r, 10.0);
        assert!(verdict.defects().contains(&Defect::ResultNotSmaller));
    }

    #[test]
    fn lost_probe_points_are_counted() {
        let mut k = MockKernel::new();
        let a = k.add_sphere(Point3::origin(), 10.0);
        let b = k.add_sphere(Point3::new(15.0, 0.0, 0.0), 10.0);
        let cfg = ValidatorConfig {
            containment_samples: 8,
            ..ValidatorConfig::default()
        };
        let r = ValidationReference::for_union(&mut k, &[&a, &b], 0.001, false, &cfg);
        assert_eq!(r.probes.len(), 16);

        // A lone copy of the first operand misses every probe drawn from the second
        // that lies outside it.
        let lone = k.duplicate(&a).unwrap();
        let verdict = Validator::new(cfg.clone()).validate(&k, &lone, &r, 5.0);
        assert!(matches!(
            verdict.defects(),
            [Defect::LostInteriorPoints { count }] if *count > 0
        ));

        let u = k.union(&[&a, &b], 0.001).unwrap();
        assert!(Validator::new(cfg).validate(&k, &u, &r, 5.0).accepted());
    }

    #[test]
    fn pair_limit_bounds_the_search() {
        let mut k = MockKernel::new();
        let a = k.add_sphere(Point3::origin(), 10.0);
        let b = k.add_sphere(Point3::new(20.0, 0.0, 0.0), 10.0);
        let u = k.union(&[&a, &b], 0.001).unwrap();
        let cfg = ValidatorConfig::default();
        // The tangency curve sits on faces (0, 2), the second pair examined
        assert_eq!(interior_intersection_pairs(&k, &u, &cfg, None), vec![(0, 2)]);
        assert!(interior_intersection_pairs(&k, &u, &cfg, Some(1)).is_empty());
    }
}
