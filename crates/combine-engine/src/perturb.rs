//! Perturbation ("jiggle") engine.
//!
//! Tangent and coplanar contacts defeat most boolean kernels. Moving the
//! least reliable operand by a tiny offset turns them into clean overlaps or
//! clean gaps. Offsets are taken from a fixed or seeded direction set, so
//! runs are reproducible.

use kernel_adapter::{KernelBundle, KernelError, SolidHandle};
use nalgebra::Vector3;
use tracing::debug;

use crate::attempt::{run_operation, Attempt, CandidateSink};
use crate::config::JiggleConfig;
use crate::types::{CombinationOutcome, Operands, Strategy};

#[derive(Debug, Clone, Default)]
pub struct PerturbationEngine {
    config: JiggleConfig,
}

impl PerturbationEngine {
    pub fn new(config: JiggleConfig) -> Self {
        Self { config }
    }

    /// Offsets in trial order: magnitudes ascending, each across every
    /// direction.
    pub fn plan(&self) -> Vec<(f64, Vector3<f64>)> {
        let directions = self.config.directions.unit_vectors();
        self.config
            .sorted_magnitudes()
            .into_iter()
            .flat_map(|m| directions.iter().map(move |d| (m, d * m)))
            .collect()
    }

    /// Jiggle the last union operand (or the subtrahend) and retry until the
    /// sink accepts a candidate. Union results are moved back by the inverse
    /// offset before they are offered.
    pub fn perturb_and_retry(
        &self,
        kernel: &mut dyn KernelBundle,
        operands: &Operands<'_>,
        tolerance: f64,
        sink: &mut dyn CandidateSink,
    ) -> Option<CombinationOutcome> {
        if !self.config.enabled {
            return None;
        }
        for (magnitude, offset) in self.plan() {
            let label = format!("Jiggled({magnitude:.4})");
            let jiggled = match self.jiggle_once(kernel, operands, offset, tolerance) {
                Ok(candidate) => candidate,
                Err(e) => {
                    sink.reject(&label, &e);
                    continue;
                }
            };
            debug!(magnitude, dx = offset.x, dy = offset.y, dz = offset.z, "jiggled candidate");
            let attempt = Attempt {
                label,
                strategy: Strategy::Perturb,
                candidate: jiggled,
            };
            if let Some(outcome) = sink.offer(kernel, attempt) {
                return Some(outcome);
            }
        }
        None
    }

    fn jiggle_once(
        &self,
        kernel: &mut dyn KernelBundle,
        operands: &Operands<'_>,
        offset: Vector3<f64>,
        tolerance: f64,
    ) -> Result<SolidHandle, KernelError> {
        match operands {
            Operands::Union(solids) => {
                let Some((last, rest)) = solids.split_last() else {
                    return Err(KernelError::InvalidGeometry {
                        reason: "jiggle of zero solids".to_string(),
                    });
                };
                let mut moved = kernel.duplicate(last)?;
                if let Err(e) = kernel.translate(&mut moved, offset) {
                    kernel.discard(moved);
                    return Err(e);
                }
                let mut shifted: Vec<&SolidHandle> = rest.to_vec();
                shifted.push(&moved);
                let result = run_operation(kernel, &Operands::Union(shifted), tolerance);
                kernel.discard(moved);
                let mut result = result?;
                if let Err(e) = kernel.translate(&mut result, -offset) {
                    kernel.discard(result);
                    return Err(e);
                }
                Ok(result)
            }
            Operands::Difference {
                minuend,
                subtrahend,
            } => {
                let mut moved = kernel.duplicate(subtrahend)?;
                if let Err(e) = kernel.translate(&mut moved, offset) {
                    kernel.discard(moved);
                    return Err(e);
                }
                let shifted = Operands::Difference {
                    minuend: *minuend,
                    subtrahend: &moved,
                };
                let result = run_operation(kernel, &shifted, tolerance);
                kernel.discard(moved);
                result
            }
        }
    }
}
