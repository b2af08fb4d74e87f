use nalgebra::{Isometry3, Point3, Translation3, UnitQuaternion, Vector3};
use splint_types::ToleranceContext;

use crate::types::*;

/// Mutating side of the geometry kernel: booleans, copies, rigid motion,
/// repair and disposal.
/// Implemented by TruckKernel (wraps real truck) and MockKernel (deterministic test double).
pub trait GeometryKernel {
    /// Boolean union of all operands in one call.
    fn union(&mut self, solids: &[&SolidHandle], tolerance: f64)
        -> Result<SolidHandle, KernelError>;

    /// Boolean difference `a - b`. May yield several disconnected pieces.
    fn difference(
        &mut self,
        a: &SolidHandle,
        b: &SolidHandle,
        tolerance: f64,
    ) -> Result<Vec<SolidHandle>, KernelError>;

    /// Join pieces sharing boundary into as few solids as possible.
    fn join(&mut self, pieces: &[&SolidHandle], tolerance: f64)
        -> Result<Vec<SolidHandle>, KernelError>;

    /// Volume of `a ∩ b`. Zero for disjoint solids.
    fn intersection_volume(
        &mut self,
        a: &SolidHandle,
        b: &SolidHandle,
        tolerance: f64,
    ) -> Result<f64, KernelError>;

    fn duplicate(&mut self, solid: &SolidHandle) -> Result<SolidHandle, KernelError>;

    /// Apply a rigid motion in place.
    fn transform(&mut self, solid: &mut SolidHandle, motion: &Isometry3<f64>)
        -> Result<(), KernelError>;

    fn translate(&mut self, solid: &mut SolidHandle, offset: Vector3<f64>) -> Result<(), KernelError> {
        let motion = Isometry3::from_parts(Translation3::from(offset), UnitQuaternion::identity());
        self.transform(solid, &motion)
    }

    /// Clean up a solid (split kinky faces, compact) into a new solid.
    fn repair(&mut self, solid: &SolidHandle, ctx: &ToleranceContext)
        -> Result<SolidHandle, KernelError>;

    /// Release a solid the caller no longer needs.
    fn discard(&mut self, solid: SolidHandle);
}

/// Read-only queries on kernel solids.
pub trait SolidInspect {
    fn is_valid(&self, solid: &SolidHandle) -> bool;

    /// Closed (watertight) body.
    fn is_solid(&self, solid: &SolidHandle) -> bool;

    fn is_manifold(&self, solid: &SolidHandle) -> bool;

    fn face_count(&self, solid: &SolidHandle) -> usize;

    /// Edges bordering exactly one face.
    fn naked_edge_count(&self, solid: &SolidHandle) -> usize;

    /// Enclosed volume, `None` when the kernel cannot compute it.
    fn volume(&self, solid: &SolidHandle) -> Option<f64>;

    fn bounding_box(&self, solid: &SolidHandle) -> Option<BoundingBox>;

    /// Intersection curves between faces `i` and `j` of the same solid.
    fn face_intersections(
        &self,
        solid: &SolidHandle,
        i: usize,
        j: usize,
        tolerance: f64,
    ) -> Result<Vec<Polyline>, KernelError>;

    /// Distance from `point` to the closest edge of the solid.
    fn distance_to_nearest_edge(&self, solid: &SolidHandle, point: &Point3<f64>) -> Option<f64>;

    fn contains_point(
        &self,
        solid: &SolidHandle,
        point: &Point3<f64>,
        tolerance: f64,
    ) -> Result<bool, KernelError>;
}

/// Combined trait for callers that need mutable kernel access and
/// read-only inspection on the same object.
pub trait KernelBundle: GeometryKernel + SolidInspect {
    fn as_inspect(&self) -> &dyn SolidInspect;
}

impl<T: GeometryKernel + SolidInspect> KernelBundle for T {
    fn as_inspect(&self) -> &dyn SolidInspect {
        self
    }
}
