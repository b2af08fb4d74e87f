//! MockKernel: deterministic test double implementing GeometryKernel + SolidInspect.
//!
//! Solids are CSG trees over spheres and axis-aligned boxes. Booleans record
//! analytic intersection curves between operands, and volumes are exact
//! where a closed form exists and grid-sampled otherwise. `MockQuirks`
//! injects the failure modes real kernels show (no result below some
//! tolerance, degenerate contact, lossy dirty inputs) so that every recovery
//! path of the combination engine can be exercised.

use std::cell::OnceCell;
use std::collections::{BTreeSet, HashMap};
use std::f64::consts::PI;

use nalgebra::{Isometry3, Point3, Vector3};
use splint_types::ToleranceContext;
use tracing::debug;

use crate::traits::{GeometryKernel, SolidInspect};
use crate::types::*;

/// Geometric coincidence threshold for contact classification.
const EXACT: f64 = 1e-9;
const CIRCLE_SEGMENTS: usize = 64;
const DEFAULT_SAMPLING: usize = 48;
const SLIVER_RADIUS: f64 = 0.01;

// ── Primitives ──────────────────────────────────────────────────────────

/// Analytic building block of a mock solid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Primitive {
    Sphere { center: Point3<f64>, radius: f64 },
    Cuboid { min: Point3<f64>, max: Point3<f64> },
}

impl Primitive {
    /// Sphere: two hemispheres. Cuboid: six planar faces.
    fn face_count(&self) -> usize {
        match self {
            Primitive::Sphere { .. } => 2,
            Primitive::Cuboid { .. } => 6,
        }
    }

    fn volume(&self) -> f64 {
        match self {
            Primitive::Sphere { radius, .. } => 4.0 / 3.0 * PI * radius.powi(3),
            Primitive::Cuboid { min, max } => BoundingBox::new(*min, *max).volume(),
        }
    }

    fn bounding_box(&self) -> BoundingBox {
        match self {
            Primitive::Sphere { center, radius } => {
                BoundingBox::new(*center, *center).expanded(*radius)
            }
            Primitive::Cuboid { min, max } => BoundingBox::new(*min, *max),
        }
    }

    fn contains(&self, p: &Point3<f64>) -> bool {
        match self {
            Primitive::Sphere { center, radius } => (p - center).norm_squared() <= radius * radius,
            Primitive::Cuboid { min, max } => BoundingBox::new(*min, *max).contains(p),
        }
    }

    fn min_size(&self) -> f64 {
        match self {
            Primitive::Sphere { radius, .. } => *radius,
            Primitive::Cuboid { min, max } => {
                let e = max - min;
                e.x.min(e.y).min(e.z)
            }
        }
    }

    /// Sphere: the equator seam. Cuboid: the twelve box edges.
    fn edges(&self) -> Vec<Polyline> {
        match self {
            Primitive::Sphere { center, radius } => {
                vec![circle(*center, Vector3::z(), *radius)]
            }
            Primitive::Cuboid { min, max } => {
                let corner = |i: usize| {
                    Point3::new(
                        if i & 1 == 0 { min.x } else { max.x },
                        if i & 2 == 0 { min.y } else { max.y },
                        if i & 4 == 0 { min.z } else { max.z },
                    )
                };
                let mut edges = Vec::with_capacity(12);
                for bit in [1usize, 2, 4] {
                    for i in (0..8).filter(|i| i & bit == 0) {
                        edges.push(vec![corner(i), corner(i | bit)]);
                    }
                }
                edges
            }
        }
    }

    fn transformed(&self, motion: &Isometry3<f64>) -> Result<Self, KernelError> {
        match self {
            Primitive::Sphere { center, radius } => Ok(Primitive::Sphere {
                center: motion * center,
                radius: *radius,
            }),
            Primitive::Cuboid { min, max } => {
                if motion.rotation.angle() > EXACT {
                    return Err(KernelError::not_supported("rotate axis-aligned cuboid"));
                }
                let offset = motion.translation.vector;
                Ok(Primitive::Cuboid {
                    min: min + offset,
                    max: max + offset,
                })
            }
        }
    }
}

/// Exact volume of `a ∩ b` where a closed form exists.
fn primitive_intersection_volume(a: &Primitive, b: &Primitive) -> Option<f64> {
    match (a, b) {
        (
            Primitive::Sphere { center: ca, radius: ra },
            Primitive::Sphere { center: cb, radius: rb },
        ) => Some(lens_volume(*ra, *rb, (cb - ca).norm())),
        (Primitive::Cuboid { min: amin, max: amax }, Primitive::Cuboid { min: bmin, max: bmax }) => {
            Some(
                BoundingBox::new(*amin, *amax)
                    .intersection(&BoundingBox::new(*bmin, *bmax))
                    .map_or(0.0, |bb| bb.volume()),
            )
        }
        _ => None,
    }
}

/// Volume shared by two spheres with radii `r1`, `r2` whose centers are `d` apart.
pub fn lens_volume(r1: f64, r2: f64, d: f64) -> f64 {
    if d >= r1 + r2 {
        return 0.0;
    }
    if d <= (r1 - r2).abs() {
        let r = r1.min(r2);
        return 4.0 / 3.0 * PI * r.powi(3);
    }
    PI * (r1 + r2 - d).powi(2) * (d * d + 2.0 * d * (r1 + r2) - 3.0 * (r1 - r2).powi(2))
        / (12.0 * d)
}

// ── Contact classification ──────────────────────────────────────────────

enum Contact {
    Separate,
    /// Transversal overlap; the intersection curve when it is analytic.
    Crossing(Option<Polyline>),
    /// Tangency or coplanar faces.
    Degenerate {
        point: Point3<f64>,
        normal: Vector3<f64>,
        size: f64,
    },
}

fn classify_contact(a: &Primitive, b: &Primitive) -> Contact {
    match (a, b) {
        (
            Primitive::Sphere { center: ca, radius: ra },
            Primitive::Sphere { center: cb, radius: rb },
        ) => {
            let (ca, cb, ra, rb) = (*ca, *cb, *ra, *rb);
            let offset = cb - ca;
            let d = offset.norm();
            let size = ra.min(rb);
            if (d - (ra + rb)).abs() <= EXACT {
                let n = offset / d;
                return Contact::Degenerate {
                    point: ca + n * ra,
                    normal: n,
                    size,
                };
            }
            if (d - (ra - rb).abs()).abs() <= EXACT {
                let (center, radius, dir) = if d <= EXACT {
                    (ca, ra, Vector3::x())
                } else if ra >= rb {
                    (ca, ra, offset / d)
                } else {
                    (cb, rb, -offset / d)
                };
                return Contact::Degenerate {
                    point: center + dir * radius,
                    normal: dir,
                    size,
                };
            }
            if d >= ra + rb || d <= (ra - rb).abs() {
                return Contact::Separate;
            }
            let n = offset / d;
            let along = (d * d + ra * ra - rb * rb) / (2.0 * d);
            let rho = (ra * ra - along * along).max(0.0).sqrt();
            Contact::Crossing(Some(circle(ca + n * along, n, rho)))
        }
        (Primitive::Cuboid { min: amin, max: amax }, Primitive::Cuboid { min: bmin, max: bmax }) => {
            let lo = amin.sup(bmin);
            let hi = amax.inf(bmax);
            if (0..3).any(|k| lo[k] > hi[k] + EXACT) {
                return Contact::Separate;
            }
            for k in 0..3 {
                let (u, v) = ((k + 1) % 3, (k + 2) % 3);
                let span = (hi[u] - lo[u]).min(hi[v] - lo[v]);
                if span <= EXACT {
                    continue;
                }
                for plane_a in [amin[k], amax[k]] {
                    for plane_b in [bmin[k], bmax[k]] {
                        if (plane_a - plane_b).abs() <= EXACT {
                            let mut point = nalgebra::center(&lo, &hi);
                            point[k] = plane_a;
                            let mut normal = Vector3::zeros();
                            normal[k] = 1.0;
                            return Contact::Degenerate {
                                point,
                                normal,
                                size: span,
                            };
                        }
                    }
                }
            }
            Contact::Crossing(None)
        }
        _ => {
            if a.bounding_box().intersection(&b.bounding_box()).is_some() {
                Contact::Crossing(None)
            } else {
                Contact::Separate
            }
        }
    }
}

/// Closed polyline circle in the plane through `center` with `normal`.
fn circle(center: Point3<f64>, normal: Vector3<f64>, radius: f64) -> Polyline {
    let n = normal.normalize();
    let helper = if n.x.abs() < 0.9 { Vector3::x() } else { Vector3::y() };
    let u = n.cross(&helper).normalize();
    let v = n.cross(&u);
    (0..=CIRCLE_SEGMENTS)
        .map(|i| {
            let t = 2.0 * PI * i as f64 / CIRCLE_SEGMENTS as f64;
            center + (u * t.cos() + v * t.sin()) * radius
        })
        .collect()
}

// ── Shapes ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Shape {
    Prim(Primitive),
    Union(Vec<Shape>),
    Difference(Box<Shape>, Box<Shape>),
}

impl Shape {
    /// Union with nested unions flattened, so fold order does not change the tree.
    fn union_of(parts: Vec<Shape>) -> Shape {
        let mut flat = Vec::new();
        for part in parts {
            match part {
                Shape::Union(children) => flat.extend(children),
                other => flat.push(other),
            }
        }
        if flat.len() == 1 {
            flat.remove(0)
        } else {
            Shape::Union(flat)
        }
    }

    fn contains(&self, p: &Point3<f64>) -> bool {
        match self {
            Shape::Prim(prim) => prim.contains(p),
            Shape::Union(children) => children.iter().any(|c| c.contains(p)),
            Shape::Difference(a, b) => a.contains(p) && !b.contains(p),
        }
    }

    fn bounding_box(&self) -> BoundingBox {
        match self {
            Shape::Prim(prim) => prim.bounding_box(),
            Shape::Union(children) => children
                .iter()
                .map(Shape::bounding_box)
                .reduce(|a, b| a.union(&b))
                .unwrap_or_else(|| BoundingBox::new(Point3::origin(), Point3::origin())),
            Shape::Difference(a, _) => a.bounding_box(),
        }
    }

    fn transformed(&self, motion: &Isometry3<f64>) -> Result<Shape, KernelError> {
        Ok(match self {
            Shape::Prim(prim) => Shape::Prim(prim.transformed(motion)?),
            Shape::Union(children) => Shape::Union(
                children
                    .iter()
                    .map(|c| c.transformed(motion))
                    .collect::<Result<_, _>>()?,
            ),
            Shape::Difference(a, b) => Shape::Difference(
                Box::new(a.transformed(motion)?),
                Box::new(b.transformed(motion)?),
            ),
        })
    }

    /// Closed-form volume: single primitives, unions of primitives without
    /// triple overlap, and primitive-minus-primitive.
    fn exact_volume(&self) -> Option<f64> {
        match self {
            Shape::Prim(prim) => Some(prim.volume()),
            Shape::Union(children) => {
                let prims = children
                    .iter()
                    .map(|c| match c {
                        Shape::Prim(p) => Some(p),
                        _ => None,
                    })
                    .collect::<Option<Vec<_>>>()?;
                if has_triple_overlap(&prims) {
                    return None;
                }
                let mut volume: f64 = prims.iter().map(|p| p.volume()).sum();
                for i in 0..prims.len() {
                    for j in (i + 1)..prims.len() {
                        volume -= primitive_intersection_volume(prims[i], prims[j])?;
                    }
                }
                Some(volume)
            }
            Shape::Difference(a, b) => match (a.as_ref(), b.as_ref()) {
                (Shape::Prim(a), Shape::Prim(b)) => {
                    Some(a.volume() - primitive_intersection_volume(a, b)?)
                }
                _ => None,
            },
        }
    }
}

fn has_triple_overlap(prims: &[&Primitive]) -> bool {
    let boxes: Vec<BoundingBox> = prims.iter().map(|p| p.bounding_box()).collect();
    for i in 0..boxes.len() {
        for j in (i + 1)..boxes.len() {
            let Some(ij) = boxes[i].intersection(&boxes[j]) else {
                continue;
            };
            for k in (j + 1)..boxes.len() {
                if ij.intersection(&boxes[k]).is_some_and(|b| b.volume() > EXACT) {
                    return true;
                }
            }
        }
    }
    false
}

/// Midpoint-rule volume over `bb` with `resolution` cells per axis.
fn sample_volume<F>(bb: &BoundingBox, resolution: usize, inside: F) -> f64
where
    F: Fn(&Point3<f64>) -> bool,
{
    let n = resolution.max(1);
    let step = bb.extent() / n as f64;
    if step.x <= 0.0 || step.y <= 0.0 || step.z <= 0.0 {
        return 0.0;
    }
    let mut count = 0usize;
    for i in 0..n {
        for j in 0..n {
            for k in 0..n {
                let p = Point3::new(
                    bb.min.x + (i as f64 + 0.5) * step.x,
                    bb.min.y + (j as f64 + 0.5) * step.y,
                    bb.min.z + (k as f64 + 0.5) * step.z,
                );
                if inside(&p) {
                    count += 1;
                }
            }
        }
    }
    count as f64 * step.x * step.y * step.z
}

// ── Solids ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct Leaf {
    prim: Primitive,
    /// Index of the leaf's first face within the owning solid.
    face_base: usize,
    /// Subtracted leaf.
    negative: bool,
}

#[derive(Debug, Clone)]
struct FaceCurve {
    faces: (usize, usize),
    curve: Polyline,
}

#[derive(Debug, Clone)]
struct MockSolid {
    shape: Shape,
    leaves: Vec<Leaf>,
    face_count: usize,
    edges: Vec<Polyline>,
    face_curves: Vec<FaceCurve>,
    valid: bool,
    solid: bool,
    manifold: bool,
    naked_edges: usize,
    /// Multiplier applied to the true volume, models lossy booleans.
    volume_scale: f64,
    volume_unavailable: bool,
    needs_repair: bool,
    /// Source ids of the primitives this solid was built from.
    tags: BTreeSet<u64>,
    volume_cache: OnceCell<Option<f64>>,
}

impl MockSolid {
    fn from_primitive(prim: Primitive, source: u64) -> Self {
        Self {
            shape: Shape::Prim(prim),
            leaves: vec![Leaf {
                prim,
                face_base: 0,
                negative: false,
            }],
            face_count: prim.face_count(),
            edges: prim.edges(),
            face_curves: Vec::new(),
            valid: true,
            solid: true,
            manifold: true,
            naked_edges: 0,
            volume_scale: 1.0,
            volume_unavailable: false,
            needs_repair: false,
            tags: BTreeSet::from([source]),
            volume_cache: OnceCell::new(),
        }
    }

    fn transform_in_place(&mut self, motion: &Isometry3<f64>) -> Result<(), KernelError> {
        let shape = self.shape.transformed(motion)?;
        let leaves = self
            .leaves
            .iter()
            .map(|l| {
                Ok(Leaf {
                    prim: l.prim.transformed(motion)?,
                    ..*l
                })
            })
            .collect::<Result<Vec<_>, KernelError>>()?;
        self.shape = shape;
        self.leaves = leaves;
        for edge in &mut self.edges {
            for p in edge.iter_mut() {
                *p = motion * *p;
            }
        }
        for fc in &mut self.face_curves {
            for p in fc.curve.iter_mut() {
                *p = motion * *p;
            }
        }
        self.volume_cache = OnceCell::new();
        Ok(())
    }
}

// ── Quirks ──────────────────────────────────────────────────────────────

/// How booleans treat tangent spheres and coplanar box faces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DegenerateContact {
    /// Produce a result carrying an interior face/face intersection.
    #[default]
    SelfIntersect,
    /// Refuse the boolean.
    Fail,
    /// Handle it cleanly.
    Ignore,
}

/// Fault injection for the mock kernel.
#[derive(Debug, Clone)]
pub struct MockQuirks {
    /// Unions below this tolerance return no result.
    pub min_union_tolerance: f64,
    /// Differences below this tolerance return no result.
    pub min_difference_tolerance: f64,
    /// Unions of more operands than this return no result.
    pub max_union_arity: Option<usize>,
    pub degenerate_contact: DegenerateContact,
    /// Two-operand unions whose operand source sets match a pair (either
    /// order) fail.
    pub rejected_unions: Vec<(BTreeSet<u64>, BTreeSet<u64>)>,
    /// Fraction of volume lost by booleans with an operand still needing repair.
    pub dirty_volume_loss: f64,
    /// Every boolean result has this many naked edges and is not closed.
    pub naked_edges_on_results: usize,
    /// Every boolean result carries an interior self-intersection.
    pub self_intersect_all: bool,
    /// Extra sliver pieces returned by every difference.
    pub difference_pieces: usize,
    /// `join` leaves pieces separate.
    pub join_fails: bool,
    pub repair_fails: bool,
    /// Boolean results report no volume.
    pub volume_unavailable: bool,
    /// `intersection_volume` is not answered.
    pub intersection_unavailable: bool,
}

impl Default for MockQuirks {
    fn default() -> Self {
        Self {
            min_union_tolerance: 0.0,
            min_difference_tolerance: 0.0,
            max_union_arity: None,
            degenerate_contact: DegenerateContact::default(),
            rejected_unions: Vec::new(),
            dirty_volume_loss: 0.3,
            naked_edges_on_results: 0,
            self_intersect_all: false,
            difference_pieces: 0,
            join_fails: false,
            repair_fails: false,
            volume_unavailable: false,
            intersection_unavailable: false,
        }
    }
}

// ── Kernel ──────────────────────────────────────────────────────────────

/// Deterministic test double for the geometry kernel.
/// Implements both GeometryKernel and SolidInspect.
pub struct MockKernel {
    next_handle: u64,
    next_source: u64,
    solids: HashMap<u64, MockSolid>,
    quirks: MockQuirks,
    sampling: usize,
}

impl MockKernel {
    pub fn new() -> Self {
        Self {
            next_handle: 1,
            next_source: 0,
            solids: HashMap::new(),
            quirks: MockQuirks::default(),
            sampling: DEFAULT_SAMPLING,
        }
    }

    pub fn with_quirks(quirks: MockQuirks) -> Self {
        Self {
            quirks,
            ..Self::new()
        }
    }

    /// Grid resolution per axis for volumes without a closed form.
    pub fn with_sampling(mut self, resolution: usize) -> Self {
        self.sampling = resolution.max(1);
        self
    }

    pub fn quirks(&self) -> &MockQuirks {
        &self.quirks
    }

    pub fn quirks_mut(&mut self) -> &mut MockQuirks {
        &mut self.quirks
    }

    /// Add a sphere. Source ids count up from 0 in creation order.
    pub fn add_sphere(&mut self, center: Point3<f64>, radius: f64) -> SolidHandle {
        self.add_primitive(Primitive::Sphere { center, radius })
    }

    pub fn add_cuboid(&mut self, min: Point3<f64>, max: Point3<f64>) -> SolidHandle {
        self.add_primitive(Primitive::Cuboid {
            min: min.inf(&max),
            max: min.sup(&max),
        })
    }

    pub fn add_primitive(&mut self, prim: Primitive) -> SolidHandle {
        let source = self.next_source;
        self.next_source += 1;
        self.store(MockSolid::from_primitive(prim, source))
    }

    /// Flag a solid as dirty: booleans using it lose volume until repaired.
    pub fn mark_needs_repair(&mut self, solid: &SolidHandle) {
        if let Some(s) = self.solids.get_mut(&solid.id()) {
            s.needs_repair = true;
        }
    }

    /// Flag a solid as invalid.
    pub fn corrupt(&mut self, solid: &SolidHandle) {
        if let Some(s) = self.solids.get_mut(&solid.id()) {
            s.valid = false;
        }
    }

    pub fn source_ids(&self, solid: &SolidHandle) -> Option<&BTreeSet<u64>> {
        self.solids.get(&solid.id()).map(|s| &s.tags)
    }

    /// Number of solids not yet discarded.
    pub fn live_solids(&self) -> usize {
        self.solids.len()
    }

    fn store(&mut self, solid: MockSolid) -> SolidHandle {
        let handle = SolidHandle(self.next_handle);
        self.next_handle += 1;
        self.solids.insert(handle.id(), solid);
        handle
    }

    fn get(&self, handle: &SolidHandle) -> Result<&MockSolid, KernelError> {
        self.solids
            .get(&handle.id())
            .ok_or(KernelError::NotFound { id: handle.id() })
    }

    fn solid_volume(&self, s: &MockSolid) -> Option<f64> {
        if s.volume_unavailable {
            return None;
        }
        *s.volume_cache.get_or_init(|| {
            let base = s.shape.exact_volume().unwrap_or_else(|| {
                sample_volume(&s.shape.bounding_box(), self.sampling, |p| {
                    s.shape.contains(p)
                })
            });
            Some(base * s.volume_scale)
        })
    }

    /// Combine `parts` into one solid with `shape`. The bool marks parts
    /// whose leaves are subtracted.
    fn merge(
        &self,
        parts: &[(&MockSolid, bool)],
        shape: Shape,
        operation: &str,
    ) -> Result<MockSolid, KernelError> {
        let mut bases = Vec::with_capacity(parts.len());
        let mut face_count = 0;
        for (part, _) in parts {
            bases.push(face_count);
            face_count += part.face_count;
        }

        let mut leaves = Vec::new();
        let mut edges = Vec::new();
        let mut face_curves = Vec::new();
        for ((part, negative), base) in parts.iter().zip(&bases) {
            leaves.extend(part.leaves.iter().map(|l| Leaf {
                prim: l.prim,
                face_base: l.face_base + base,
                negative: l.negative != *negative,
            }));
            edges.extend(part.edges.iter().cloned());
            face_curves.extend(part.face_curves.iter().map(|fc| FaceCurve {
                faces: (fc.faces.0 + base, fc.faces.1 + base),
                curve: fc.curve.clone(),
            }));
        }

        for p in 0..parts.len() {
            for q in (p + 1)..parts.len() {
                let left = parts[p].0.leaves.iter().filter(|l| !l.negative);
                for la in left {
                    let right = parts[q].0.leaves.iter().filter(|l| !l.negative);
                    for lb in right {
                        let faces = (la.face_base + bases[p], lb.face_base + bases[q]);
                        match classify_contact(&la.prim, &lb.prim) {
                            Contact::Separate | Contact::Crossing(None) => {}
                            Contact::Crossing(Some(curve)) => {
                                edges.push(curve.clone());
                                face_curves.push(FaceCurve { faces, curve });
                            }
                            Contact::Degenerate {
                                point,
                                normal,
                                size,
                            } => match self.quirks.degenerate_contact {
                                DegenerateContact::SelfIntersect => {
                                    face_curves.push(FaceCurve {
                                        faces,
                                        curve: circle(point, normal, 0.25 * size),
                                    });
                                }
                                DegenerateContact::Fail => {
                                    return Err(KernelError::BooleanFailed {
                                        reason: format!(
                                            "{operation}: degenerate contact near ({:.3}, {:.3}, {:.3})",
                                            point.x, point.y, point.z
                                        ),
                                    });
                                }
                                DegenerateContact::Ignore => {}
                            },
                        }
                    }
                }
            }
        }

        let dirty = parts.iter().any(|(s, _)| s.needs_repair);
        let volume_scale = if dirty {
            1.0 - self.quirks.dirty_volume_loss
        } else {
            parts
                .iter()
                .map(|(s, _)| s.volume_scale)
                .fold(1.0, f64::min)
        };

        let mut result = MockSolid {
            shape,
            leaves,
            face_count,
            edges,
            face_curves,
            valid: parts.iter().all(|(s, _)| s.valid),
            solid: parts.iter().all(|(s, _)| s.solid),
            manifold: parts.iter().all(|(s, _)| s.manifold),
            naked_edges: parts.iter().map(|(s, _)| s.naked_edges).sum(),
            volume_scale,
            volume_unavailable: self.quirks.volume_unavailable,
            needs_repair: false,
            tags: parts.iter().flat_map(|(s, _)| s.tags.iter().copied()).collect(),
            volume_cache: OnceCell::new(),
        };

        if self.quirks.naked_edges_on_results > 0 {
            result.naked_edges = self.quirks.naked_edges_on_results;
            result.solid = false;
        }
        if self.quirks.self_intersect_all && result.face_count >= 2 {
            if let Some(leaf) = result.leaves.iter().find(|l| !l.negative) {
                let seed = circle(
                    leaf.prim.bounding_box().center(),
                    Vector3::z(),
                    0.25 * leaf.prim.min_size(),
                );
                result.face_curves.push(FaceCurve {
                    faces: (0, 1),
                    curve: seed,
                });
            }
        }
        debug!(
            operation,
            faces = result.face_count,
            face_curves = result.face_curves.len(),
            "mock boolean"
        );
        Ok(result)
    }
}

impl Default for MockKernel {
    fn default() -> Self {
        Self::new()
    }
}

impl GeometryKernel for MockKernel {
    fn union(
        &mut self,
        solids: &[&SolidHandle],
        tolerance: f64,
    ) -> Result<SolidHandle, KernelError> {
        if solids.is_empty() {
            return Err(KernelError::InvalidGeometry {
                reason: "union of zero solids".to_string(),
            });
        }
        if tolerance < self.quirks.min_union_tolerance {
            return Err(KernelError::no_result("union"));
        }
        if self.quirks.max_union_arity.is_some_and(|max| solids.len() > max) {
            return Err(KernelError::no_result("union"));
        }
        let parts = solids
            .iter()
            .map(|h| self.get(h).map(|s| (s, false)))
            .collect::<Result<Vec<_>, _>>()?;
        if let [(a, _), (b, _)] = parts.as_slice() {
            let rejected = self
                .quirks
                .rejected_unions
                .iter()
                .any(|(x, y)| (a.tags == *x && b.tags == *y) || (a.tags == *y && b.tags == *x));
            if rejected {
                return Err(KernelError::BooleanFailed {
                    reason: format!("union of {:?} and {:?} rejected", a.tags, b.tags),
                });
            }
        }
        let shape = Shape::union_of(parts.iter().map(|(s, _)| s.shape.clone()).collect());
        let result = self.merge(&parts, shape, "union")?;
        Ok(self.store(result))
    }

    fn difference(
        &mut self,
        a: &SolidHandle,
        b: &SolidHandle,
        tolerance: f64,
    ) -> Result<Vec<SolidHandle>, KernelError> {
        if tolerance < self.quirks.min_difference_tolerance {
            return Err(KernelError::no_result("difference"));
        }
        let minuend = self.get(a)?;
        let subtrahend = self.get(b)?;
        let shape = Shape::Difference(
            Box::new(minuend.shape.clone()),
            Box::new(subtrahend.shape.clone()),
        );
        let result = self.merge(&[(minuend, false), (subtrahend, true)], shape, "difference")?;

        let corner = minuend.shape.bounding_box().max;
        let tags = result.tags.clone();
        let slivers: Vec<MockSolid> = (0..self.quirks.difference_pieces)
            .map(|k| {
                let center = corner + Vector3::new(0.1 * (k + 1) as f64, 0.0, 0.0);
                let mut sliver = MockSolid::from_primitive(
                    Primitive::Sphere {
                        center,
                        radius: SLIVER_RADIUS,
                    },
                    0,
                );
                sliver.tags = tags.clone();
                sliver
            })
            .collect();

        let mut pieces = vec![self.store(result)];
        for sliver in slivers {
            pieces.push(self.store(sliver));
        }
        Ok(pieces)
    }

    fn join(
        &mut self,
        pieces: &[&SolidHandle],
        _tolerance: f64,
    ) -> Result<Vec<SolidHandle>, KernelError> {
        let parts = pieces
            .iter()
            .map(|h| self.get(h).map(|s| (s, false)))
            .collect::<Result<Vec<_>, _>>()?;
        if self.quirks.join_fails || parts.len() <= 1 {
            let copies: Vec<MockSolid> = parts.iter().map(|(s, _)| (*s).clone()).collect();
            return Ok(copies.into_iter().map(|s| self.store(s)).collect());
        }
        let shape = Shape::union_of(parts.iter().map(|(s, _)| s.shape.clone()).collect());
        let joined = self.merge(&parts, shape, "join")?;
        Ok(vec![self.store(joined)])
    }

    fn intersection_volume(
        &mut self,
        a: &SolidHandle,
        b: &SolidHandle,
        _tolerance: f64,
    ) -> Result<f64, KernelError> {
        if self.quirks.intersection_unavailable {
            return Err(KernelError::not_supported("intersection volume"));
        }
        let sa = self.get(a)?;
        let sb = self.get(b)?;
        if let (Shape::Prim(pa), Shape::Prim(pb)) = (&sa.shape, &sb.shape) {
            if let Some(v) = primitive_intersection_volume(pa, pb) {
                return Ok(v);
            }
        }
        let Some(overlap) = sa.shape.bounding_box().intersection(&sb.shape.bounding_box()) else {
            return Ok(0.0);
        };
        Ok(sample_volume(&overlap, self.sampling, |p| {
            sa.shape.contains(p) && sb.shape.contains(p)
        }))
    }

    fn duplicate(&mut self, solid: &SolidHandle) -> Result<SolidHandle, KernelError> {
        let copy = self.get(solid)?.clone();
        Ok(self.store(copy))
    }

    fn transform(
        &mut self,
        solid: &mut SolidHandle,
        motion: &Isometry3<f64>,
    ) -> Result<(), KernelError> {
        let id = solid.id();
        let stored = self
            .solids
            .get_mut(&id)
            .ok_or(KernelError::NotFound { id })?;
        stored.transform_in_place(motion)
    }

    fn repair(
        &mut self,
        solid: &SolidHandle,
        ctx: &ToleranceContext,
    ) -> Result<SolidHandle, KernelError> {
        if !(ctx.angle_radians.is_finite() && ctx.angle_radians > 0.0) {
            return Err(KernelError::InvalidGeometry {
                reason: format!("repair angle tolerance {} must be positive", ctx.angle_radians),
            });
        }
        if self.quirks.repair_fails {
            return Err(KernelError::Other {
                message: "repair failed".to_string(),
            });
        }
        let mut repaired = self.get(solid)?.clone();
        repaired.needs_repair = false;
        Ok(self.store(repaired))
    }

    fn discard(&mut self, solid: SolidHandle) {
        self.solids.remove(&solid.id());
    }
}

impl SolidInspect for MockKernel {
    fn is_valid(&self, solid: &SolidHandle) -> bool {
        self.get(solid).is_ok_and(|s| s.valid)
    }

    fn is_solid(&self, solid: &SolidHandle) -> bool {
        self.get(solid).is_ok_and(|s| s.solid)
    }

    fn is_manifold(&self, solid: &SolidHandle) -> bool {
        self.get(solid).is_ok_and(|s| s.manifold)
    }

    fn face_count(&self, solid: &SolidHandle) -> usize {
        self.get(solid).map_or(0, |s| s.face_count)
    }

    fn naked_edge_count(&self, solid: &SolidHandle) -> usize {
        self.get(solid).map_or(0, |s| s.naked_edges)
    }

    fn volume(&self, solid: &SolidHandle) -> Option<f64> {
        self.get(solid).ok().and_then(|s| self.solid_volume(s))
    }

    fn bounding_box(&self, solid: &SolidHandle) -> Option<BoundingBox> {
        self.get(solid).ok().map(|s| s.shape.bounding_box())
    }

    fn face_intersections(
        &self,
        solid: &SolidHandle,
        i: usize,
        j: usize,
        _tolerance: f64,
    ) -> Result<Vec<Polyline>, KernelError> {
        let s = self.get(solid)?;
        if i >= s.face_count || j >= s.face_count {
            return Err(KernelError::InvalidGeometry {
                reason: format!("face pair ({i}, {j}) out of range for {} faces", s.face_count),
            });
        }
        Ok(s.face_curves
            .iter()
            .filter(|fc| fc.faces == (i, j) || fc.faces == (j, i))
            .map(|fc| fc.curve.clone())
            .collect())
    }

    fn distance_to_nearest_edge(&self, solid: &SolidHandle, point: &Point3<f64>) -> Option<f64> {
        let s = self.get(solid).ok()?;
        s.edges
            .iter()
            .filter_map(|e| distance_to_polyline(point, e))
            .reduce(f64::min)
    }

    fn contains_point(
        &self,
        solid: &SolidHandle,
        point: &Point3<f64>,
        _tolerance: f64,
    ) -> Result<bool, KernelError> {
        Ok(self.get(solid)?.shape.contains(point))
    }
}
