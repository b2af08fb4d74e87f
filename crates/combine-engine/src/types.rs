use std::fmt;

use kernel_adapter::SolidHandle;
use serde::{Deserialize, Serialize};
use splint_types::{Defect, ToleranceContext};
use uuid::Uuid;

/// Boolean operation requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    Union,
    Difference,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Union => write!(f, "union"),
            OperationKind::Difference => write!(f, "difference"),
        }
    }
}

/// Strategy that produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Strategy {
    /// Single-operand union handed back unchanged.
    Passthrough,
    Direct,
    Escalate,
    Reorder,
    Perturb,
    RepairRetry,
    /// Best imperfect candidate after every strategy was exhausted.
    Fallback,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Strategy::Passthrough => "passthrough",
            Strategy::Direct => "direct",
            Strategy::Escalate => "escalate",
            Strategy::Reorder => "reorder",
            Strategy::Perturb => "perturb",
            Strategy::RepairRetry => "repair-retry",
            Strategy::Fallback => "fallback",
        };
        f.write_str(name)
    }
}

/// Borrowed operands of a request. The caller keeps ownership.
#[derive(Debug, Clone)]
pub enum Operands<'a> {
    Union(Vec<&'a SolidHandle>),
    Difference {
        minuend: &'a SolidHandle,
        subtrahend: &'a SolidHandle,
    },
}

impl<'a> Operands<'a> {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operands::Union(_) => OperationKind::Union,
            Operands::Difference { .. } => OperationKind::Difference,
        }
    }

    /// Operands in positional order (minuend first for a difference).
    pub fn as_list(&self) -> Vec<&'a SolidHandle> {
        match self {
            Operands::Union(solids) => solids.clone(),
            Operands::Difference {
                minuend,
                subtrahend,
            } => vec![*minuend, *subtrahend],
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Operands::Union(solids) => solids.len(),
            Operands::Difference { .. } => 2,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One combination request. Immutable once built.
#[derive(Debug, Clone)]
pub struct CombinationRequest<'a> {
    id: Uuid,
    operands: Operands<'a>,
    tolerance: f64,
    check_volumes: bool,
}

impl<'a> CombinationRequest<'a> {
    /// Union of `solids`. A missing or non-positive tolerance falls back to
    /// the context's absolute tolerance.
    pub fn union(
        solids: &[&'a SolidHandle],
        tolerance: Option<f64>,
        check_volumes: bool,
        ctx: &ToleranceContext,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            operands: Operands::Union(solids.to_vec()),
            tolerance: ctx.resolve(tolerance),
            check_volumes,
        }
    }

    /// `minuend − subtrahend`.
    pub fn difference(
        minuend: &'a SolidHandle,
        subtrahend: &'a SolidHandle,
        tolerance: Option<f64>,
        check_volumes: bool,
        ctx: &ToleranceContext,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            operands: Operands::Difference {
                minuend,
                subtrahend,
            },
            tolerance: ctx.resolve(tolerance),
            check_volumes,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn operands(&self) -> &Operands<'a> {
        &self.operands
    }

    pub fn kind(&self) -> OperationKind {
        self.operands.kind()
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn check_volumes(&self) -> bool {
        self.check_volumes
    }
}

/// Validator output. Accepted exactly when no defect was found.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValidationVerdict {
    defects: Vec<Defect>,
}

impl ValidationVerdict {
    pub fn from_defects(defects: Vec<Defect>) -> Self {
        Self { defects }
    }

    pub fn accepted(&self) -> bool {
        self.defects.is_empty()
    }

    pub fn defects(&self) -> &[Defect] {
        &self.defects
    }

    pub fn into_defects(self) -> Vec<Defect> {
        self.defects
    }

    /// Meets the bar for an imperfect fallback: valid, solid and manifold.
    pub fn meets_minimum_bar(&self) -> bool {
        !self.defects.iter().any(Defect::breaks_minimum_bar)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutcomeStatus {
    /// Passed every check.
    Clean,
    /// Nothing to combine.
    Trivial,
    /// Best available result, carrying defects.
    Imperfect,
}

/// Result of a combination request. The caller owns the solid.
#[derive(Debug)]
pub struct CombinationOutcome {
    solid: SolidHandle,
    method: String,
    strategy: Strategy,
    status: OutcomeStatus,
    defects: Vec<Defect>,
    request_id: Uuid,
    attempts: usize,
}

impl CombinationOutcome {
    pub(crate) fn new(
        solid: SolidHandle,
        method: String,
        strategy: Strategy,
        defects: Vec<Defect>,
        request_id: Uuid,
        attempts: usize,
    ) -> Self {
        let status = match (strategy, defects.is_empty()) {
            (_, false) => OutcomeStatus::Imperfect,
            (Strategy::Passthrough, true) => OutcomeStatus::Trivial,
            (_, true) => OutcomeStatus::Clean,
        };
        Self {
            solid,
            method,
            strategy,
            status,
            defects,
            request_id,
            attempts,
        }
    }

    /// True for clean and trivial outcomes.
    pub fn success(&self) -> bool {
        self.status != OutcomeStatus::Imperfect
    }

    pub fn solid(&self) -> &SolidHandle {
        &self.solid
    }

    pub fn into_solid(self) -> SolidHandle {
        self.solid
    }

    /// Human-readable label, e.g. `MultiUnion(tol=0.001000)` or `Jiggled(0.0050)`.
    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn status(&self) -> OutcomeStatus {
        self.status
    }

    pub fn defects(&self) -> &[Defect] {
        &self.defects
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    /// Candidates produced or attempted before this outcome.
    pub fn attempts(&self) -> usize {
        self.attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdict_accepts_only_without_defects() {
        assert!(ValidationVerdict::from_defects(vec![]).accepted());
        let v = ValidationVerdict::from_defects(vec![Defect::NakedEdges { count: 2 }]);
        assert!(!v.accepted());
        assert!(v.meets_minimum_bar());
        let v = ValidationVerdict::from_defects(vec![Defect::NotSolid]);
        assert!(!v.meets_minimum_bar());
    }

    #[test]
    fn request_resolves_tolerance_from_context() {
        let ctx = ToleranceContext::default().with_absolute(0.01);
        let solids: Vec<&SolidHandle> = Vec::new();
        let req = CombinationRequest::union(&solids, None, true, &ctx);
        assert_eq!(req.tolerance(), 0.01);
        let req = CombinationRequest::union(&solids, Some(-2.0), true, &ctx);
        assert_eq!(req.tolerance(), 0.01);
        let req = CombinationRequest::union(&solids, Some(0.5), false, &ctx);
        assert_eq!(req.tolerance(), 0.5);
        assert!(!req.check_volumes());
        assert_eq!(req.kind(), OperationKind::Union);
    }

    #[test]
    fn requests_get_distinct_ids() {
        let ctx = ToleranceContext::default();
        let solids: Vec<&SolidHandle> = Vec::new();
        let a = CombinationRequest::union(&solids, None, true, &ctx);
        let b = CombinationRequest::union(&solids, None, true, &ctx);
        assert_ne!(a.id(), b.id());
    }
}
