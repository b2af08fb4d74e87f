//! Robust boolean combination of solids.
//!
//! Wraps a [`KernelBundle`] with a validator and a fixed ladder of recovery
//! strategies, so that a union or difference either returns a checked solid,
//! a best-effort solid labelled `Imperfect(...)`, or a typed error.

pub mod attempt;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod ordering;
pub mod orchestrator;
pub mod perturb;
pub mod types;
pub mod validate;

pub use config::{
    DirectionSet, EngineConfig, InvalidOperandPolicy, JiggleConfig, ValidatorConfig, VolumeBounds,
};
pub use diagnostics::{diagnose_pair, inspect_solid, InspectionReport, PairDiagnosis, ToleranceProbe};
pub use error::CombineError;
pub use ordering::{plan_orderings, UnionOrdering};
pub use orchestrator::Orchestrator;
pub use perturb::PerturbationEngine;
pub use types::{
    CombinationOutcome, CombinationRequest, OperationKind, Operands, OutcomeStatus, Strategy,
    ValidationVerdict,
};
pub use validate::{ValidationReference, Validator};

use kernel_adapter::{KernelBundle, SolidHandle};
use splint_types::ToleranceContext;

/// Union all `solids`. `tolerance` defaults to the context's absolute
/// tolerance.
pub fn combine_union(
    kernel: &mut dyn KernelBundle,
    solids: &[&SolidHandle],
    tolerance: Option<f64>,
    check_volumes: bool,
    config: &EngineConfig,
    ctx: &ToleranceContext,
) -> Result<CombinationOutcome, CombineError> {
    let request = CombinationRequest::union(solids, tolerance, check_volumes, ctx);
    Orchestrator::new(kernel, config, ctx).combine(&request)
}

/// Subtract `subtrahend` from `minuend`.
pub fn combine_difference(
    kernel: &mut dyn KernelBundle,
    minuend: &SolidHandle,
    subtrahend: &SolidHandle,
    tolerance: Option<f64>,
    check_volumes: bool,
    config: &EngineConfig,
    ctx: &ToleranceContext,
) -> Result<CombinationOutcome, CombineError> {
    let request = CombinationRequest::difference(minuend, subtrahend, tolerance, check_volumes, ctx);
    Orchestrator::new(kernel, config, ctx).combine(&request)
}
