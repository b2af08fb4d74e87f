use std::fmt;

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

/// Opaque handle to a solid held by a geometry kernel.
///
/// Not `Clone`: whoever holds the handle owns the solid.
/// Copies only come from `GeometryKernel::duplicate`.
/// Valid only for the kernel session that issued it.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct SolidHandle(pub(crate) u64);

impl SolidHandle {
    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SolidHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Errors from kernel operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum KernelError {
    /// The kernel ran but produced no body.
    #[error("{operation} produced no result")]
    NoResult { operation: String },

    #[error("boolean operation failed: {reason}")]
    BooleanFailed { reason: String },

    #[error("invalid geometry: {reason}")]
    InvalidGeometry { reason: String },

    #[error("solid not found: #{id}")]
    NotFound { id: u64 },

    #[error("operation not supported: {operation}")]
    NotSupported { operation: String },

    #[error("kernel error: {message}")]
    Other { message: String },
}

impl KernelError {
    pub(crate) fn no_result(operation: &str) -> Self {
        KernelError::NoResult {
            operation: operation.to_string(),
        }
    }

    pub(crate) fn not_supported(operation: &str) -> Self {
        KernelError::NotSupported {
            operation: operation.to_string(),
        }
    }
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: Point3<f64>,
    pub max: Point3<f64>,
}

impl BoundingBox {
    pub fn new(min: Point3<f64>, max: Point3<f64>) -> Self {
        Self { min, max }
    }

    /// Smallest box holding every point, or `None` for an empty iterator.
    pub fn from_points<'a, I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Point3<f64>>,
    {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut bb = Self::new(*first, *first);
        for p in iter {
            bb.min = bb.min.inf(p);
            bb.max = bb.max.sup(p);
        }
        Some(bb)
    }

    pub fn union(&self, other: &Self) -> Self {
        Self::new(self.min.inf(&other.min), self.max.sup(&other.max))
    }

    /// Overlap region, `None` when the boxes are disjoint. Touching boxes
    /// produce a flat box.
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        let min = self.min.sup(&other.min);
        let max = self.max.inf(&other.max);
        if (0..3).any(|i| min[i] > max[i]) {
            return None;
        }
        Some(Self::new(min, max))
    }

    pub fn extent(&self) -> Vector3<f64> {
        self.max - self.min
    }

    pub fn center(&self) -> Point3<f64> {
        nalgebra::center(&self.min, &self.max)
    }

    pub fn volume(&self) -> f64 {
        let e = self.extent();
        e.x * e.y * e.z
    }

    pub fn contains(&self, p: &Point3<f64>) -> bool {
        (0..3).all(|i| p[i] >= self.min[i] && p[i] <= self.max[i])
    }

    pub fn expanded(&self, margin: f64) -> Self {
        let m = Vector3::repeat(margin);
        Self::new(self.min - m, self.max + m)
    }

    pub fn translated(&self, offset: &Vector3<f64>) -> Self {
        Self::new(self.min + offset, self.max + offset)
    }

    /// Largest distance any face of `self` lies outside `reference`.
    /// Zero when `self` is contained in `reference`.
    pub fn growth_beyond(&self, reference: &Self) -> f64 {
        (0..3)
            .map(|i| {
                let below = reference.min[i] - self.min[i];
                let above = self.max[i] - reference.max[i];
                below.max(above)
            })
            .fold(0.0_f64, f64::max)
    }
}

/// Sampled curve, e.g. a face/face intersection.
pub type Polyline = Vec<Point3<f64>>;

/// Point at fraction `t` of the polyline's arc length, clamped to `[0, 1]`.
pub fn polyline_point_at(polyline: &[Point3<f64>], t: f64) -> Option<Point3<f64>> {
    let first = polyline.first()?;
    if polyline.len() == 1 {
        return Some(*first);
    }
    let lengths: Vec<f64> = polyline
        .windows(2)
        .map(|w| (w[1] - w[0]).norm())
        .collect();
    let total: f64 = lengths.iter().sum();
    if total <= 0.0 {
        return Some(*first);
    }
    let mut remaining = t.clamp(0.0, 1.0) * total;
    for (i, len) in lengths.iter().enumerate() {
        if remaining <= *len {
            let s = if *len > 0.0 { remaining / len } else { 0.0 };
            return Some(polyline[i] + (polyline[i + 1] - polyline[i]) * s);
        }
        remaining -= len;
    }
    polyline.last().copied()
}

fn distance_to_segment(p: &Point3<f64>, a: &Point3<f64>, b: &Point3<f64>) -> f64 {
    let ab = b - a;
    let len2 = ab.norm_squared();
    if len2 <= 0.0 {
        return (p - a).norm();
    }
    let t = ((p - a).dot(&ab) / len2).clamp(0.0, 1.0);
    (p - (a + ab * t)).norm()
}

/// Shortest distance from `p` to any segment of the polyline.
pub fn distance_to_polyline(p: &Point3<f64>, polyline: &[Point3<f64>]) -> Option<f64> {
    match polyline {
        [] => None,
        [only] => Some((p - only).norm()),
        _ => polyline
            .windows(2)
            .map(|w| distance_to_segment(p, &w[0], &w[1]))
            .reduce(f64::min),
    }
}
