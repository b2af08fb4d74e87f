//! Helper functions: error type, primitive sources, expected-volume math.

use std::f64::consts::PI;

use combine_engine::CombineError;
use kernel_adapter::{lens_volume, KernelError, MockKernel, SolidHandle, TruckKernel};
use nalgebra::Point3;

// ── Error Type ──────────────────────────────────────────────────────────────

/// Unified error type for the test harness.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("solid not found: {name}")]
    SolidNotFound { name: String },

    #[error("duplicate name: {name}")]
    DuplicateName { name: String },

    #[error("no outcome recorded for: {name}")]
    NoOutcome { name: String },

    #[error("assertion failed: {detail}")]
    AssertionFailed { detail: String },

    #[error("oracle failure ({oracle}): {detail}")]
    OracleFailure { oracle: String, detail: String },

    #[error("kernel error: {0}")]
    Kernel(#[from] KernelError),

    #[error("combination error: {0}")]
    Combine(#[from] CombineError),

    #[error("report serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

// ── Primitive Sources ───────────────────────────────────────────────────────

/// Kernels that can build the primitives scenarios are written in.
pub trait PrimitiveSource {
    fn sphere(&mut self, center: [f64; 3], radius: f64) -> Result<SolidHandle, HarnessError>;

    fn cuboid(&mut self, min: [f64; 3], max: [f64; 3]) -> Result<SolidHandle, HarnessError>;
}

impl PrimitiveSource for MockKernel {
    fn sphere(&mut self, center: [f64; 3], radius: f64) -> Result<SolidHandle, HarnessError> {
        Ok(self.add_sphere(Point3::from(center), radius))
    }

    fn cuboid(&mut self, min: [f64; 3], max: [f64; 3]) -> Result<SolidHandle, HarnessError> {
        Ok(self.add_cuboid(Point3::from(min), Point3::from(max)))
    }
}

impl PrimitiveSource for TruckKernel {
    fn sphere(&mut self, center: [f64; 3], radius: f64) -> Result<SolidHandle, HarnessError> {
        Ok(self.add_sphere(center, radius)?)
    }

    fn cuboid(&mut self, min: [f64; 3], max: [f64; 3]) -> Result<SolidHandle, HarnessError> {
        Ok(self.add_cuboid(min, max)?)
    }
}

// ── Expected Volumes ────────────────────────────────────────────────────────

pub fn sphere_volume(radius: f64) -> f64 {
    4.0 / 3.0 * PI * radius.powi(3)
}

/// Exact union volume of two spheres whose centers are `distance` apart.
pub fn sphere_pair_union_volume(r1: f64, r2: f64, distance: f64) -> f64 {
    sphere_volume(r1) + sphere_volume(r2) - lens_volume(r1, r2, distance)
}

/// Signed error of `actual` against `expected`, in percent.
pub fn percent_error(actual: f64, expected: f64) -> f64 {
    if expected.abs() < f64::EPSILON {
        return if actual.abs() < f64::EPSILON { 0.0 } else { f64::INFINITY };
    }
    (actual - expected) / expected * 100.0
}

/// Centers of `n` points spaced along +X from the origin.
pub fn row_centers(n: usize, spacing: f64) -> Vec<[f64; 3]> {
    (0..n).map(|i| [spacing * i as f64, 0.0, 0.0]).collect()
}
