//! Multi-body ordering planner.
//!
//! Unions of many bodies that fail in one call often succeed as a chain of
//! pairwise unions. The planner lists the orderings worth trying.

use std::fmt;

use kernel_adapter::{KernelBundle, KernelError, SolidHandle};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnionOrdering {
    /// `((s0 ∪ s1) ∪ s2) ∪ …`
    Forward,
    /// `((sN ∪ sN-1) ∪ …) ∪ s0`
    Reverse,
    /// Union each half, then the two partial results.
    SplitHalves,
}

impl UnionOrdering {
    pub fn label(&self) -> &'static str {
        match self {
            UnionOrdering::Forward => "Sequential 0→N",
            UnionOrdering::Reverse => "Sequential N→0",
            UnionOrdering::SplitHalves => "Split halves",
        }
    }

    /// Execute the ordering. A failed pairwise step is retried once at
    /// `retry_tolerance` when given. Intermediate results are discarded.
    pub fn execute(
        &self,
        kernel: &mut dyn KernelBundle,
        solids: &[&SolidHandle],
        tolerance: f64,
        retry_tolerance: Option<f64>,
    ) -> Result<SolidHandle, KernelError> {
        match self {
            UnionOrdering::Forward => fold(kernel, solids, tolerance, retry_tolerance),
            UnionOrdering::Reverse => {
                let reversed: Vec<&SolidHandle> = solids.iter().rev().copied().collect();
                fold(kernel, &reversed, tolerance, retry_tolerance)
            }
            UnionOrdering::SplitHalves => {
                let (left, right) = solids.split_at(solids.len() / 2);
                let left = fold(kernel, left, tolerance, retry_tolerance)?;
                let right = match fold(kernel, right, tolerance, retry_tolerance) {
                    Ok(right) => right,
                    Err(e) => {
                        kernel.discard(left);
                        return Err(e);
                    }
                };
                let result = union_step(kernel, &left, &right, tolerance, retry_tolerance);
                kernel.discard(left);
                kernel.discard(right);
                result
            }
        }
    }
}

impl fmt::Display for UnionOrdering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Orderings to try for `n` operands: forward and reverse always, plus the
/// balanced split for even `n >= 4`.
pub fn plan_orderings(n: usize) -> Vec<UnionOrdering> {
    let mut plan = vec![UnionOrdering::Forward, UnionOrdering::Reverse];
    if n >= 4 && n % 2 == 0 {
        plan.push(UnionOrdering::SplitHalves);
    }
    plan
}

fn union_step(
    kernel: &mut dyn KernelBundle,
    a: &SolidHandle,
    b: &SolidHandle,
    tolerance: f64,
    retry_tolerance: Option<f64>,
) -> Result<SolidHandle, KernelError> {
    match kernel.union(&[a, b], tolerance) {
        Ok(result) => Ok(result),
        Err(e) => match retry_tolerance.filter(|r| *r > tolerance) {
            Some(retry) => {
                debug!(tolerance, retry, error = %e, "pairwise union failed, retrying");
                kernel.union(&[a, b], retry)
            }
            None => Err(e),
        },
    }
}

/// Left fold of pairwise unions. A single operand is duplicated so the
/// caller always owns the result.
fn fold(
    kernel: &mut dyn KernelBundle,
    solids: &[&SolidHandle],
    tolerance: f64,
    retry_tolerance: Option<f64>,
) -> Result<SolidHandle, KernelError> {
    let (first, rest) = solids.split_first().ok_or_else(|| KernelError::InvalidGeometry {
        reason: "ordering over zero solids".to_string(),
    })?;
    let Some((second, rest)) = rest.split_first() else {
        return kernel.duplicate(first);
    };
    let mut acc = union_step(kernel, first, second, tolerance, retry_tolerance)?;
    for (step, next) in rest.iter().enumerate() {
        match union_step(kernel, &acc, next, tolerance, retry_tolerance) {
            Ok(merged) => {
                let previous = std::mem::replace(&mut acc, merged);
                kernel.discard(previous);
            }
            Err(e) => {
                debug!(step = step + 2, error = %e, "ordering step failed");
                kernel.discard(acc);
                return Err(e);
            }
        }
    }
    Ok(acc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_adapter::{MockKernel, MockQuirks};
    use nalgebra::Point3;
    use std::collections::BTreeSet;

    fn row(k: &mut MockKernel, n: usize) -> Vec<SolidHandle> {
        (0..n)
            .map(|i| k.add_sphere(Point3::new(15.0 * i as f64, 0.0, 0.0), 10.0))
            .collect()
    }

    #[test]
    fn plan_includes_split_only_for_even_four_plus() {
        assert_eq!(plan_orderings(3).len(), 2);
        assert_eq!(plan_orderings(4).len(), 3);
        assert_eq!(plan_orderings(5).len(), 2);
        assert_eq!(plan_orderings(6)[2], UnionOrdering::SplitHalves);
    }

    #[test]
    fn forward_fold_discards_intermediates() {
        let quirks = MockQuirks {
            max_union_arity: Some(2),
            ..MockQuirks::default()
        };
        let mut k = MockKernel::with_quirks(quirks);
        let solids = row(&mut k, 4);
        let refs: Vec<&SolidHandle> = solids.iter().collect();
        let result = UnionOrdering::Forward.execute(&mut k, &refs, 0.01, None).unwrap();
        assert_eq!(k.source_ids(&result).unwrap(), &BTreeSet::from([0, 1, 2, 3]));
        assert_eq!(k.live_solids(), 5);
    }

    #[test]
    fn split_halves_avoids_rejected_final_steps() {
        let quirks = MockQuirks {
            max_union_arity: Some(2),
            rejected_unions: vec![
                (BTreeSet::from([0, 1, 2]), BTreeSet::from([3])),
                (BTreeSet::from([1, 2, 3]), BTreeSet::from([0])),
            ],
            ..MockQuirks::default()
        };
        let mut k = MockKernel::with_quirks(quirks);
        let solids = row(&mut k, 4);
        let refs: Vec<&SolidHandle> = solids.iter().collect();
        assert!(UnionOrdering::Forward.execute(&mut k, &refs, 0.01, Some(1.0)).is_err());
        assert!(UnionOrdering::Reverse.execute(&mut k, &refs, 0.01, Some(1.0)).is_err());
        assert_eq!(k.live_solids(), 4);
        let result = UnionOrdering::SplitHalves
            .execute(&mut k, &refs, 0.01, Some(1.0))
            .unwrap();
        assert_eq!(k.source_ids(&result).unwrap().len(), 4);
        assert_eq!(k.live_solids(), 5);
    }

    #[test]
    fn failed_step_retries_at_larger_tolerance() {
        let quirks = MockQuirks {
            min_union_tolerance: 0.5,
            ..MockQuirks::default()
        };
        let mut k = MockKernel::with_quirks(quirks);
        let solids = row(&mut k, 3);
        let refs: Vec<&SolidHandle> = solids.iter().collect();
        assert!(UnionOrdering::Reverse.execute(&mut k, &refs, 0.01, None).is_err());
        assert!(UnionOrdering::Reverse
            .execute(&mut k, &refs, 0.01, Some(1.0))
            .is_ok());
    }

    #[test]
    fn single_operand_is_duplicated() {
        let mut k = MockKernel::new();
        let solids = row(&mut k, 1);
        let refs: Vec<&SolidHandle> = solids.iter().collect();
        let result = UnionOrdering::Forward.execute(&mut k, &refs, 0.01, None).unwrap();
        assert_ne!(result.id(), solids[0].id());
    }
}
