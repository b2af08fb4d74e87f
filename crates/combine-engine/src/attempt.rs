//! Single kernel attempts and the hand-off of their candidates.

use kernel_adapter::{KernelBundle, KernelError, SolidHandle};
use tracing::debug;

use crate::types::{CombinationOutcome, Operands, Strategy};

/// A candidate produced by one strategy step, owned until offered.
#[derive(Debug)]
pub struct Attempt {
    pub label: String,
    pub strategy: Strategy,
    pub candidate: SolidHandle,
}

/// Receives candidates from strategies. Returns an outcome when the
/// candidate is accepted; otherwise takes ownership of it.
pub trait CandidateSink {
    fn offer(&mut self, kernel: &mut dyn KernelBundle, attempt: Attempt)
        -> Option<CombinationOutcome>;

    /// Record an attempt that produced no candidate.
    fn reject(&mut self, label: &str, error: &KernelError);
}

/// Run the requested boolean once and settle it into a single solid.
pub fn run_operation(
    kernel: &mut dyn KernelBundle,
    operands: &Operands<'_>,
    tolerance: f64,
) -> Result<SolidHandle, KernelError> {
    match operands {
        Operands::Union(solids) => kernel.union(solids, tolerance),
        Operands::Difference {
            minuend,
            subtrahend,
        } => {
            let pieces = kernel.difference(minuend, subtrahend, tolerance)?;
            settle_pieces(kernel, pieces, tolerance)
        }
    }
}

/// Reduce a multi-piece result to one solid: join the pieces, and when that
/// still leaves several, keep the largest by volume. Every other piece is
/// discarded.
pub fn settle_pieces(
    kernel: &mut dyn KernelBundle,
    mut pieces: Vec<SolidHandle>,
    tolerance: f64,
) -> Result<SolidHandle, KernelError> {
    if pieces.len() <= 1 {
        return pieces
            .pop()
            .ok_or_else(|| KernelError::NoResult {
                operation: "difference".to_string(),
            });
    }

    let count = pieces.len();
    let refs: Vec<&SolidHandle> = pieces.iter().collect();
    let joined = match kernel.join(&refs, tolerance) {
        Ok(joined) if !joined.is_empty() => {
            for piece in pieces {
                kernel.discard(piece);
            }
            joined
        }
        Ok(_) => pieces,
        Err(e) => {
            debug!(pieces = count, error = %e, "join failed, keeping largest piece");
            pieces
        }
    };
    if joined.len() == 1 {
        debug!(pieces = count, "pieces joined");
    }
    keep_largest(kernel, joined)
}

fn keep_largest(
    kernel: &mut dyn KernelBundle,
    pieces: Vec<SolidHandle>,
) -> Result<SolidHandle, KernelError> {
    let volumes: Vec<f64> = pieces
        .iter()
        .map(|p| kernel.as_inspect().volume(p).unwrap_or(f64::NEG_INFINITY))
        .collect();
    let largest = volumes
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i);
    let mut kept = None;
    for (i, piece) in pieces.into_iter().enumerate() {
        if Some(i) == largest {
            kept = Some(piece);
        } else {
            kernel.discard(piece);
        }
    }
    if volumes.len() > 1 {
        debug!(pieces = volumes.len(), "kept largest piece");
    }
    kept.ok_or_else(|| KernelError::NoResult {
        operation: "difference".to_string(),
    })
}
