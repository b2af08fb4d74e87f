//! Mesh-based measurements of truck solids.
//!
//! Volume and extent come from a tessellation of the solid, edge geometry
//! from sampling each edge curve.

use std::collections::HashSet;

use nalgebra::Point3;
use truck_meshalgo::prelude::*;
use truck_meshalgo::tessellation::MeshableShape;
use truck_modeling::{BoundedCurve, EuclideanSpace, InnerSpace, ParameterDivision1D};

use crate::types::{BoundingBox, Polyline};

type TruckSolid = truck_modeling::Solid;

fn to_nalgebra(p: truck_modeling::Point3) -> Point3<f64> {
    Point3::new(p.x, p.y, p.z)
}

/// Outward-oriented per-face meshes of a solid.
fn face_meshes(solid: &TruckSolid, tolerance: f64) -> Vec<PolygonMesh> {
    let meshed = solid.triangulation(tolerance);
    let mut meshes = Vec::new();
    for shell in meshed.boundaries().iter() {
        for face in shell.face_iter() {
            let maybe_mesh: Option<PolygonMesh> = face.surface();
            let Some(mut mesh) = maybe_mesh else {
                continue;
            };
            if !face.orientation() {
                mesh.invert();
            }
            meshes.push(mesh);
        }
    }
    meshes
}

/// Enclosed volume by the divergence theorem over the tessellation.
/// `None` when nothing could be meshed.
pub fn solid_volume(solid: &TruckSolid, tolerance: f64) -> Option<f64> {
    let meshes = face_meshes(solid, tolerance);
    if meshes.is_empty() {
        return None;
    }
    let mut six_volume = 0.0;
    for mesh in &meshes {
        let positions = mesh.positions();
        for face in mesh.face_iter() {
            // Fan triangulation covers tri, quad and n-gon faces alike
            let Some(first) = face.first() else {
                continue;
            };
            let p0 = positions[first.pos].to_vec();
            for pair in face[1..].windows(2) {
                let p1 = positions[pair[0].pos].to_vec();
                let p2 = positions[pair[1].pos].to_vec();
                six_volume += p0.dot(p1.cross(p2));
            }
        }
    }
    Some(six_volume / 6.0)
}

pub fn mesh_bounding_box(solid: &TruckSolid, tolerance: f64) -> Option<BoundingBox> {
    let points: Vec<Point3<f64>> = face_meshes(solid, tolerance)
        .iter()
        .flat_map(|m| m.positions().iter().map(|p| to_nalgebra(*p)))
        .collect();
    BoundingBox::from_points(points.iter())
}

/// Sample every distinct edge of the solid into a polyline.
pub fn edge_polylines(solid: &TruckSolid, tolerance: f64) -> Vec<Polyline> {
    let mut seen_edges = HashSet::new();
    let mut polylines = Vec::new();
    for shell in solid.boundaries().iter() {
        for edge in shell.edge_iter() {
            // Each edge appears in two faces
            if !seen_edges.insert(edge.id()) {
                continue;
            }
            let curve = edge.oriented_curve();
            let range = curve.range_tuple();
            let (_params, points) = curve.parameter_division(range, tolerance);
            polylines.push(points.into_iter().map(to_nalgebra).collect());
        }
    }
    polylines
}
