//! Sphere and box builders on top of truck's sweep API.
//!
//! truck has no built-in box or sphere; both are built from successive sweeps.

use std::f64::consts::PI;

use truck_modeling::builder;
use truck_modeling::topology::{Edge, Solid, Wire};
use truck_modeling::{EuclideanSpace, Point3, Rad, Vector3};

use crate::types::KernelError;

/// Axis-aligned box spanning `min`..`max`.
pub fn make_cuboid(min: [f64; 3], max: [f64; 3]) -> Result<Solid, KernelError> {
    let size = Vector3::new(max[0] - min[0], max[1] - min[1], max[2] - min[2]);
    if size.x <= 0.0 || size.y <= 0.0 || size.z <= 0.0 {
        return Err(KernelError::InvalidGeometry {
            reason: format!("degenerate box extent {:?}", [size.x, size.y, size.z]),
        });
    }
    let v = builder::vertex(Point3::new(min[0], min[1], min[2]));
    let edge = builder::tsweep(&v, Vector3::new(size.x, 0.0, 0.0));
    let face = builder::tsweep(&edge, Vector3::new(0.0, size.y, 0.0));
    Ok(builder::tsweep(&face, Vector3::new(0.0, 0.0, size.z)))
}

/// Sphere: half-disc face revolved 2π around Z, then moved to `center`.
pub fn make_sphere(center: [f64; 3], radius: f64) -> Result<Solid, KernelError> {
    if radius <= 0.0 {
        return Err(KernelError::InvalidGeometry {
            reason: format!("sphere radius {radius} must be positive"),
        });
    }
    // Semicircle arc in XZ from (r,0,0) over (0,0,r) to (-r,0,0)
    let v_right = builder::vertex(Point3::new(radius, 0.0, 0.0));
    let arc_wire = builder::rsweep(&v_right, Point3::origin(), Vector3::unit_y(), Rad(PI));

    let v_left = builder::vertex(Point3::new(-radius, 0.0, 0.0));
    let line_edge: Edge = builder::tsweep(&v_left, Vector3::new(2.0 * radius, 0.0, 0.0));

    let mut edges: Vec<Edge> = arc_wire.edge_iter().cloned().collect();
    edges.push(line_edge);
    let closed_wire = Wire::from_iter(edges);

    let face = builder::try_attach_plane(&[closed_wire]).map_err(|e| {
        KernelError::InvalidGeometry {
            reason: format!("failed to create half-disc face: {e}"),
        }
    })?;

    let sphere = builder::rsweep(&face, Point3::origin(), Vector3::unit_z(), Rad(2.0 * PI));
    Ok(builder::translated(
        &sphere,
        Vector3::new(center[0], center[1], center[2]),
    ))
}
