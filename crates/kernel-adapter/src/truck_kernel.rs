//! TruckKernel: geometry kernel adapter wrapping truck's B-rep API.
//!
//! Booleans forward to truck-shapeops, measurements go through a
//! tessellation. Queries truck cannot answer (face/face curves, point
//! containment, repair) report `NotSupported`, which callers treat as an
//! unanswered check.

use std::collections::HashMap;

use nalgebra::{Isometry3, Point3};
use splint_types::ToleranceContext;
use tracing::debug;
use truck_modeling::builder;
use truck_modeling::topology::Solid;
use truck_modeling::{Matrix4, Vector4};
use truck_topology::shell::ShellCondition;

use crate::primitives;
use crate::tessellation;
use crate::traits::{GeometryKernel, SolidInspect};
use crate::types::*;

/// Chord tolerance for measurement meshes.
const MESH_TOLERANCE: f64 = 0.01;

/// Real geometry kernel backed by the truck B-rep library.
pub struct TruckKernel {
    next_handle: u64,
    solids: HashMap<u64, Solid>,
}

impl TruckKernel {
    pub fn new() -> Self {
        Self {
            next_handle: 1,
            solids: HashMap::new(),
        }
    }

    /// Take ownership of a truck solid.
    pub fn insert(&mut self, solid: Solid) -> SolidHandle {
        let handle = SolidHandle(self.next_handle);
        self.next_handle += 1;
        self.solids.insert(handle.id(), solid);
        handle
    }

    pub fn add_sphere(&mut self, center: [f64; 3], radius: f64) -> Result<SolidHandle, KernelError> {
        let solid = primitives::make_sphere(center, radius)?;
        Ok(self.insert(solid))
    }

    pub fn add_cuboid(&mut self, min: [f64; 3], max: [f64; 3]) -> Result<SolidHandle, KernelError> {
        let solid = primitives::make_cuboid(min, max)?;
        Ok(self.insert(solid))
    }

    pub fn get_solid(&self, handle: &SolidHandle) -> Option<&Solid> {
        self.solids.get(&handle.id())
    }

    fn cloned(&self, handle: &SolidHandle) -> Result<Solid, KernelError> {
        self.get_solid(handle)
            .cloned()
            .ok_or(KernelError::NotFound { id: handle.id() })
    }

    fn shell_conditions(&self, handle: &SolidHandle) -> Vec<ShellCondition> {
        self.get_solid(handle)
            .map(|s| s.boundaries().iter().map(|sh| sh.shell_condition()).collect())
            .unwrap_or_default()
    }
}

impl Default for TruckKernel {
    fn default() -> Self {
        Self::new()
    }
}

/// nalgebra rigid motion as a cgmath matrix for truck's builder.
fn to_truck_matrix(motion: &Isometry3<f64>) -> Matrix4 {
    let m = motion.to_homogeneous();
    let col = |c: usize| Vector4::new(m[(0, c)], m[(1, c)], m[(2, c)], m[(3, c)]);
    Matrix4::from_cols(col(0), col(1), col(2), col(3))
}

impl GeometryKernel for TruckKernel {
    fn union(
        &mut self,
        solids: &[&SolidHandle],
        tolerance: f64,
    ) -> Result<SolidHandle, KernelError> {
        let (first, rest) = solids.split_first().ok_or_else(|| KernelError::InvalidGeometry {
            reason: "union of zero solids".to_string(),
        })?;
        let mut acc = self.cloned(first)?;
        for handle in rest {
            let next = self.cloned(handle)?;
            acc = truck_shapeops::or(&acc, &next, tolerance)
                .ok_or_else(|| KernelError::no_result("truck or()"))?;
        }
        debug!(operands = solids.len(), tolerance, "truck union");
        Ok(self.insert(acc))
    }

    fn difference(
        &mut self,
        a: &SolidHandle,
        b: &SolidHandle,
        tolerance: f64,
    ) -> Result<Vec<SolidHandle>, KernelError> {
        let solid_a = self.cloned(a)?;
        let mut solid_b = self.cloned(b)?;
        // A − B = A ∩ ¬B. not() mutates in place.
        solid_b.not();
        let result = truck_shapeops::and(&solid_a, &solid_b, tolerance)
            .ok_or_else(|| KernelError::no_result("truck and() for difference"))?;
        Ok(vec![self.insert(result)])
    }

    fn join(
        &mut self,
        pieces: &[&SolidHandle],
        _tolerance: f64,
    ) -> Result<Vec<SolidHandle>, KernelError> {
        match pieces {
            [single] => Ok(vec![self.duplicate(single)?]),
            _ => Err(KernelError::not_supported("join of several pieces")),
        }
    }

    fn intersection_volume(
        &mut self,
        a: &SolidHandle,
        b: &SolidHandle,
        tolerance: f64,
    ) -> Result<f64, KernelError> {
        if let (Some(ba), Some(bb)) = (self.bounding_box(a), self.bounding_box(b)) {
            if ba.intersection(&bb).is_none() {
                return Ok(0.0);
            }
        }
        let solid_a = self.cloned(a)?;
        let solid_b = self.cloned(b)?;
        let common = truck_shapeops::and(&solid_a, &solid_b, tolerance)
            .ok_or_else(|| KernelError::no_result("truck and() for intersection volume"))?;
        // Overlapping boxes with disjoint solids give a body with no faces
        let faces: usize = common.boundaries().iter().map(|sh| sh.face_iter().count()).sum();
        if faces == 0 {
            debug!("empty intersection body");
            return Ok(0.0);
        }
        tessellation::solid_volume(&common, MESH_TOLERANCE)
            .ok_or_else(|| KernelError::no_result("intersection volume mesh"))
    }

    fn duplicate(&mut self, solid: &SolidHandle) -> Result<SolidHandle, KernelError> {
        let copy = self.cloned(solid)?;
        Ok(self.insert(copy))
    }

    fn transform(
        &mut self,
        solid: &mut SolidHandle,
        motion: &Isometry3<f64>,
    ) -> Result<(), KernelError> {
        let id = solid.id();
        let stored = self.solids.get_mut(&id).ok_or(KernelError::NotFound { id })?;
        *stored = builder::transformed(&*stored, to_truck_matrix(motion));
        Ok(())
    }

    fn repair(
        &mut self,
        _solid: &SolidHandle,
        _ctx: &ToleranceContext,
    ) -> Result<SolidHandle, KernelError> {
        Err(KernelError::not_supported("repair"))
    }

    fn discard(&mut self, solid: SolidHandle) {
        self.solids.remove(&solid.id());
    }
}

impl SolidInspect for TruckKernel {
    fn is_valid(&self, solid: &SolidHandle) -> bool {
        self.get_solid(solid).is_some_and(|s| {
            !s.boundaries().is_empty() && s.boundaries().iter().all(|sh| sh.is_connected())
        })
    }

    fn is_solid(&self, solid: &SolidHandle) -> bool {
        let conditions = self.shell_conditions(solid);
        !conditions.is_empty() && conditions.iter().all(|c| *c == ShellCondition::Closed)
    }

    fn is_manifold(&self, solid: &SolidHandle) -> bool {
        let conditions = self.shell_conditions(solid);
        !conditions.is_empty()
            && conditions
                .iter()
                .all(|c| matches!(c, ShellCondition::Oriented | ShellCondition::Closed))
    }

    fn face_count(&self, solid: &SolidHandle) -> usize {
        self.get_solid(solid).map_or(0, |s| {
            s.boundaries().iter().map(|sh| sh.face_iter().count()).sum()
        })
    }

    fn naked_edge_count(&self, solid: &SolidHandle) -> usize {
        self.get_solid(solid).map_or(0, |s| {
            s.boundaries()
                .iter()
                .flat_map(|sh| sh.extract_boundaries())
                .map(|wire| wire.edge_iter().count())
                .sum()
        })
    }

    fn volume(&self, solid: &SolidHandle) -> Option<f64> {
        let s = self.get_solid(solid)?;
        tessellation::solid_volume(s, MESH_TOLERANCE)
    }

    fn bounding_box(&self, solid: &SolidHandle) -> Option<BoundingBox> {
        let s = self.get_solid(solid)?;
        tessellation::mesh_bounding_box(s, MESH_TOLERANCE)
    }

    fn face_intersections(
        &self,
        _solid: &SolidHandle,
        _i: usize,
        _j: usize,
        _tolerance: f64,
    ) -> Result<Vec<Polyline>, KernelError> {
        Err(KernelError::not_supported("face/face intersection"))
    }

    fn distance_to_nearest_edge(&self, solid: &SolidHandle, point: &Point3<f64>) -> Option<f64> {
        let s = self.get_solid(solid)?;
        tessellation::edge_polylines(s, MESH_TOLERANCE)
            .iter()
            .filter_map(|e| distance_to_polyline(point, e))
            .reduce(f64::min)
    }

    fn contains_point(
        &self,
        _solid: &SolidHandle,
        _point: &Point3<f64>,
        _tolerance: f64,
    ) -> Result<bool, KernelError> {
        Err(KernelError::not_supported("point containment"))
    }
}
