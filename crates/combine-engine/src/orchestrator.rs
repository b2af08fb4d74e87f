//! Strategy orchestrator.
//!
//! Runs the recovery ladder for one request: direct attempt, tolerance
//! escalation, alternative orderings, perturbation, repair-and-retry, and
//! finally the best imperfect candidate. The first candidate the validator
//! accepts wins. Every candidate that does not end up in the outcome is
//! discarded through the kernel.

use kernel_adapter::{KernelBundle, KernelError, SolidHandle};
use splint_types::{format_defects, Defect, ToleranceContext};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::attempt::{run_operation, Attempt, CandidateSink};
use crate::config::{EngineConfig, InvalidOperandPolicy, VolumeBounds};
use crate::error::CombineError;
use crate::ordering::plan_orderings;
use crate::perturb::PerturbationEngine;
use crate::types::{CombinationOutcome, CombinationRequest, OperationKind, Operands, Strategy};
use crate::validate::{ValidationReference, Validator};

/// Recovery stages, in the fixed order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Direct,
    Escalate,
    Reorder,
    Perturb,
    RepairRetry,
}

impl Stage {
    fn next(self) -> Option<Stage> {
        match self {
            Stage::Direct => Some(Stage::Escalate),
            Stage::Escalate => Some(Stage::Reorder),
            Stage::Reorder => Some(Stage::Perturb),
            Stage::Perturb => Some(Stage::RepairRetry),
            Stage::RepairRetry => None,
        }
    }
}

enum Prepared<'r> {
    Trivial(CombinationOutcome),
    Ready {
        operands: Operands<'r>,
        /// Minuend ∩ subtrahend volume, when known.
        intersection: Option<f64>,
    },
}

// ── Attempt bookkeeping ─────────────────────────────────────────────────

#[derive(Debug)]
struct Best {
    solid: SolidHandle,
    label: String,
    defects: Vec<Defect>,
}

/// Validates offered candidates and keeps the best rejected one that still
/// meets the minimum bar. Fewer defects win; ties keep the earlier one.
struct AttemptLog {
    validator: Validator,
    reference: ValidationReference,
    bounds: VolumeBounds,
    request_id: Uuid,
    attempts: usize,
    best: Option<Best>,
    saw_geometry_defects: bool,
}

impl AttemptLog {
    fn new(
        validator: Validator,
        reference: ValidationReference,
        bounds: VolumeBounds,
        request_id: Uuid,
    ) -> Self {
        Self {
            validator,
            reference,
            bounds,
            request_id,
            attempts: 0,
            best: None,
            saw_geometry_defects: false,
        }
    }

    /// Best imperfect candidate, or the exhaustion error.
    fn finish(self) -> Result<CombinationOutcome, CombineError> {
        match self.best {
            Some(best) => {
                let label = format!("Imperfect({})", format_defects(&best.defects));
                warn!(
                    method = %label,
                    source = %best.label,
                    attempts = self.attempts,
                    "no clean result, returning best imperfect candidate"
                );
                Ok(CombinationOutcome::new(
                    best.solid,
                    label,
                    Strategy::Fallback,
                    best.defects,
                    self.request_id,
                    self.attempts,
                ))
            }
            None => {
                warn!(attempts = self.attempts, "every strategy exhausted");
                Err(CombineError::CombinationExhausted {
                    input_volume: self.reference.input_volume,
                    expected_volume: self.reference.expected_volume,
                    attempts: self.attempts,
                })
            }
        }
    }
}

impl CandidateSink for AttemptLog {
    fn offer(
        &mut self,
        kernel: &mut dyn KernelBundle,
        attempt: Attempt,
    ) -> Option<CombinationOutcome> {
        self.attempts += 1;
        let percent = self.bounds.percent(attempt.strategy);
        let verdict =
            self.validator
                .validate(kernel.as_inspect(), &attempt.candidate, &self.reference, percent);

        if verdict.accepted() {
            info!(
                method = %attempt.label,
                strategy = %attempt.strategy,
                attempts = self.attempts,
                "candidate accepted"
            );
            if let Some(best) = self.best.take() {
                kernel.discard(best.solid);
            }
            return Some(CombinationOutcome::new(
                attempt.candidate,
                attempt.label,
                attempt.strategy,
                Vec::new(),
                self.request_id,
                self.attempts,
            ));
        }

        let defects = verdict.defects();
        if defects
            .iter()
            .any(|d| d.is_self_intersection() || d.is_topological())
        {
            self.saw_geometry_defects = true;
        }
        info!(
            method = %attempt.label,
            defects = %format_defects(defects),
            "candidate rejected"
        );

        let improves = verdict.meets_minimum_bar()
            && self
                .best
                .as_ref()
                .map_or(true, |best| defects.len() < best.defects.len());
        if improves {
            let replaced = self.best.replace(Best {
                solid: attempt.candidate,
                label: attempt.label,
                defects: verdict.into_defects(),
            });
            if let Some(old) = replaced {
                kernel.discard(old.solid);
            }
        } else {
            kernel.discard(attempt.candidate);
        }
        None
    }

    fn reject(&mut self, label: &str, error: &KernelError) {
        self.attempts += 1;
        debug!(method = label, error = %error, "attempt produced no solid");
    }
}

// ── Orchestrator ────────────────────────────────────────────────────────

/// Drives combination requests against one kernel.
pub struct Orchestrator<'a> {
    kernel: &'a mut dyn KernelBundle,
    config: &'a EngineConfig,
    ctx: &'a ToleranceContext,
    validator: Validator,
    perturbation: PerturbationEngine,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        kernel: &'a mut dyn KernelBundle,
        config: &'a EngineConfig,
        ctx: &'a ToleranceContext,
    ) -> Self {
        Self {
            kernel,
            config,
            ctx,
            validator: Validator::new(config.validator.clone()),
            perturbation: PerturbationEngine::new(config.jiggle.clone()),
        }
    }

    /// Combine the request's operands. The operands are never modified; the
    /// caller owns the returned solid.
    #[instrument(
        skip_all,
        fields(
            request_id = %request.id(),
            kind = %request.kind(),
            operands = request.operands().len(),
            tolerance = request.tolerance(),
            unit = self.ctx.unit.symbol()
        )
    )]
    pub fn combine(
        &mut self,
        request: &CombinationRequest<'_>,
    ) -> Result<CombinationOutcome, CombineError> {
        self.config.validate()?;
        check_tolerances(self.ctx, request.tolerance())?;

        let (operands, intersection) = match self.prepare(request)? {
            Prepared::Trivial(outcome) => {
                info!(method = outcome.method(), "single operand, nothing to combine");
                return Ok(outcome);
            }
            Prepared::Ready {
                operands,
                intersection,
            } => (operands, intersection),
        };

        let tolerance = request.tolerance();
        let reference = ValidationReference::for_operands(
            self.kernel,
            &operands,
            intersection,
            tolerance,
            request.check_volumes(),
            &self.config.validator,
        );
        debug!(
            input_volume = ?reference.input_volume,
            expected_volume = ?reference.expected_volume,
            probes = reference.probes.len(),
            "validation reference"
        );
        let mut log = AttemptLog::new(
            self.validator.clone(),
            reference,
            *self.config.bounds(request.kind()),
            request.id(),
        );

        let mut stage = Some(Stage::Direct);
        while let Some(current) = stage {
            info!(stage = ?current, attempts = log.attempts, "entering stage");
            if let Some(outcome) = self.run_stage(current, &operands, tolerance, &mut log) {
                return Ok(outcome);
            }
            stage = current.next();
        }
        log.finish()
    }

    /// Operand preconditions. Rejections here are final.
    fn prepare<'r>(
        &mut self,
        request: &CombinationRequest<'r>,
    ) -> Result<Prepared<'r>, CombineError> {
        match request.operands() {
            Operands::Union(solids) => {
                if solids.is_empty() {
                    return Err(CombineError::InvalidOperand {
                        index: 0,
                        reason: "union needs at least one operand".to_string(),
                    });
                }
                let mut usable = Vec::with_capacity(solids.len());
                for (index, solid) in solids.iter().enumerate() {
                    if self.kernel.is_valid(solid) {
                        usable.push(*solid);
                        continue;
                    }
                    match self.config.invalid_operand_policy {
                        InvalidOperandPolicy::Reject => {
                            return Err(CombineError::InvalidOperand {
                                index,
                                reason: format!("{solid} is not a valid solid"),
                            })
                        }
                        InvalidOperandPolicy::Skip => {
                            warn!(index, solid = %solid, "skipping invalid operand")
                        }
                    }
                }
                match usable.len() {
                    0 => Err(CombineError::InvalidOperand {
                        index: 0,
                        reason: "no valid operands".to_string(),
                    }),
                    1 => {
                        let copy = self.kernel.duplicate(usable[0]).map_err(|e| {
                            CombineError::InvalidOperand {
                                index: 0,
                                reason: e.to_string(),
                            }
                        })?;
                        Ok(Prepared::Trivial(CombinationOutcome::new(
                            copy,
                            "SingleOperand".to_string(),
                            Strategy::Passthrough,
                            Vec::new(),
                            request.id(),
                            0,
                        )))
                    }
                    _ => Ok(Prepared::Ready {
                        operands: Operands::Union(usable),
                        intersection: None,
                    }),
                }
            }
            Operands::Difference {
                minuend,
                subtrahend,
            } => {
                for (index, solid) in [*minuend, *subtrahend].into_iter().enumerate() {
                    if !self.kernel.is_valid(solid) {
                        return Err(CombineError::InvalidOperand {
                            index,
                            reason: format!("{solid} is not a valid solid"),
                        });
                    }
                }
                let threshold = self.config.no_intersection_threshold;
                let intersection =
                    match self
                        .kernel
                        .intersection_volume(minuend, subtrahend, request.tolerance())
                    {
                        Ok(volume) if volume < threshold => {
                            info!(volume, threshold, "operands do not intersect");
                            return Err(CombineError::NoIntersection {
                                intersection_volume: volume,
                                threshold,
                            });
                        }
                        Ok(volume) => Some(volume),
                        Err(e) if !self.boxes_overlap(minuend, subtrahend) => {
                            info!(error = %e, "bounding boxes disjoint, operands do not intersect");
                            return Err(CombineError::NoIntersection {
                                intersection_volume: 0.0,
                                threshold,
                            });
                        }
                        Err(e) => {
                            warn!(error = %e, "intersection volume unavailable, proceeding");
                            None
                        }
                    };
                Ok(Prepared::Ready {
                    operands: Operands::Difference {
                        minuend: *minuend,
                        subtrahend: *subtrahend,
                    },
                    intersection,
                })
            }
        }
    }

    /// False only when both boxes are known and disjoint.
    fn boxes_overlap(&self, a: &SolidHandle, b: &SolidHandle) -> bool {
        let inspect = self.kernel.as_inspect();
        match (inspect.bounding_box(a), inspect.bounding_box(b)) {
            (Some(ba), Some(bb)) => ba.intersection(&bb).is_some(),
            _ => true,
        }
    }

    fn run_stage(
        &mut self,
        stage: Stage,
        operands: &Operands<'_>,
        tolerance: f64,
        log: &mut AttemptLog,
    ) -> Option<CombinationOutcome> {
        match stage {
            Stage::Direct => {
                let label = method_label(operands.kind(), tolerance);
                self.attempt(operands, tolerance, label, Strategy::Direct, log)
            }
            Stage::Escalate => {
                for escalated in self.config.escalation_ladder(tolerance) {
                    debug!(tolerance = escalated, "escalating tolerance");
                    let label = method_label(operands.kind(), escalated);
                    let outcome = self.attempt(operands, escalated, label, Strategy::Escalate, log);
                    if outcome.is_some() {
                        return outcome;
                    }
                }
                None
            }
            Stage::Reorder => self.reorder(operands, tolerance, log),
            Stage::Perturb => {
                if self.config.smart_routing && !log.saw_geometry_defects {
                    info!("no self-intersection or topology defects seen, perturbation skipped");
                    return None;
                }
                self.perturbation
                    .perturb_and_retry(self.kernel, operands, tolerance, log)
            }
            Stage::RepairRetry => self.repair_and_retry(operands, tolerance, log),
        }
    }

    fn attempt(
        &mut self,
        operands: &Operands<'_>,
        tolerance: f64,
        label: String,
        strategy: Strategy,
        log: &mut AttemptLog,
    ) -> Option<CombinationOutcome> {
        match run_operation(self.kernel, operands, tolerance) {
            Ok(candidate) => log.offer(
                self.kernel,
                Attempt {
                    label,
                    strategy,
                    candidate,
                },
            ),
            Err(e) => {
                log.reject(&label, &e);
                None
            }
        }
    }

    fn reorder(
        &mut self,
        operands: &Operands<'_>,
        tolerance: f64,
        log: &mut AttemptLog,
    ) -> Option<CombinationOutcome> {
        let Operands::Union(solids) = operands else {
            return None;
        };
        if !self.config.reorder || solids.len() < 3 {
            debug!(operands = solids.len(), "reordering not applicable");
            return None;
        }
        let relaxed = self.config.relaxed_tolerance(tolerance);
        let retry = Some(self.config.largest_tolerance(tolerance));
        for ordering in plan_orderings(solids.len()) {
            let label = format!("Ordered({})", ordering.label());
            debug!(ordering = %ordering, tolerance = relaxed, "trying ordering");
            match ordering.execute(self.kernel, solids, relaxed, retry) {
                Ok(candidate) => {
                    let attempt = Attempt {
                        label,
                        strategy: Strategy::Reorder,
                        candidate,
                    };
                    if let Some(outcome) = log.offer(self.kernel, attempt) {
                        return Some(outcome);
                    }
                }
                Err(e) => log.reject(&label, &e),
            }
        }
        None
    }

    fn repair_and_retry(
        &mut self,
        operands: &Operands<'_>,
        tolerance: f64,
        log: &mut AttemptLog,
    ) -> Option<CombinationOutcome> {
        if !self.config.repair {
            return None;
        }
        const LABEL: &str = "Repaired";
        let mut repaired: Vec<SolidHandle> = Vec::with_capacity(operands.len());
        for solid in operands.as_list() {
            match self.kernel.repair(solid, self.ctx) {
                Ok(fixed) => repaired.push(fixed),
                Err(e) => {
                    log.reject(LABEL, &e);
                    for fixed in repaired {
                        self.kernel.discard(fixed);
                    }
                    return None;
                }
            }
        }

        let relaxed = self.config.relaxed_tolerance(tolerance);
        let result = {
            let refs: Vec<&SolidHandle> = repaired.iter().collect();
            let retried = match operands.kind() {
                OperationKind::Union => Operands::Union(refs),
                OperationKind::Difference => Operands::Difference {
                    minuend: refs[0],
                    subtrahend: refs[1],
                },
            };
            run_operation(self.kernel, &retried, relaxed)
        };
        for fixed in repaired {
            self.kernel.discard(fixed);
        }
        match result {
            Ok(candidate) => log.offer(
                self.kernel,
                Attempt {
                    label: LABEL.to_string(),
                    strategy: Strategy::RepairRetry,
                    candidate,
                },
            ),
            Err(e) => {
                log.reject(LABEL, &e);
                None
            }
        }
    }
}

/// Booleans need a positive tolerance, and so does repair through the
/// context.
fn check_tolerances(ctx: &ToleranceContext, tolerance: f64) -> Result<(), CombineError> {
    let positive = |t: f64| t.is_finite() && t > 0.0;
    if !positive(ctx.absolute) {
        return Err(CombineError::Config(format!(
            "absolute tolerance must be positive, got {}",
            ctx.absolute
        )));
    }
    if !positive(ctx.angle_radians) {
        return Err(CombineError::Config(format!(
            "angle tolerance must be positive, got {}",
            ctx.angle_radians
        )));
    }
    if !positive(tolerance) {
        return Err(CombineError::Config(format!(
            "request tolerance must be positive, got {tolerance}"
        )));
    }
    Ok(())
}

fn method_label(kind: OperationKind, tolerance: f64) -> String {
    match kind {
        OperationKind::Union => format!("MultiUnion(tol={tolerance:.6})"),
        OperationKind::Difference => format!("Difference(tol={tolerance:.6})"),
    }
}
