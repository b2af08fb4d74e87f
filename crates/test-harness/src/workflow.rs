//! ScenarioBuilder: fluent API for scripting combination scenarios in tests.
//!
//! Calls the same `combine_union`/`combine_difference` entry points a caller
//! would. All methods take string names instead of handles for readability.

use std::collections::HashMap;

use combine_engine::{
    combine_difference, combine_union, diagnose_pair, inspect_solid, CombinationOutcome,
    CombineError, EngineConfig, InspectionReport, OperationKind, PairDiagnosis,
};
use kernel_adapter::{
    GeometryKernel, KernelBundle, MockKernel, MockQuirks, SolidHandle, SolidInspect, TruckKernel,
};
use splint_types::ToleranceContext;
use tracing::{debug, warn};

use crate::helpers::{HarnessError, PrimitiveSource};
use crate::oracle::{self, OracleVerdict};
use crate::report::{OutcomeReport, ScenarioReport};

enum Entry {
    Primitive(SolidHandle),
    Combined(CombinationOutcome),
}

impl Entry {
    fn handle(&self) -> &SolidHandle {
        match self {
            Entry::Primitive(h) => h,
            Entry::Combined(o) => o.solid(),
        }
    }
}

fn lookup<'a>(entries: &'a HashMap<String, Entry>, name: &str) -> Result<&'a SolidHandle, HarnessError> {
    entries
        .get(name)
        .map(Entry::handle)
        .ok_or_else(|| HarnessError::SolidNotFound {
            name: name.to_string(),
        })
}

/// A fluent builder for combining named solids and checking every outcome.
///
/// Owns the kernel, the engine configuration and the tolerance context.
/// Every outcome is checked by the standard oracles as it is recorded.
pub struct ScenarioBuilder<K> {
    kernel: K,
    config: EngineConfig,
    ctx: ToleranceContext,
    tolerance: Option<f64>,
    check_volumes: bool,
    entries: HashMap<String, Entry>,
    reports: Vec<OutcomeReport>,
    errors: Vec<(String, String)>,
}

impl ScenarioBuilder<MockKernel> {
    /// Create a new ScenarioBuilder with MockKernel (deterministic, fast).
    pub fn mock() -> Self {
        Self::with_kernel(MockKernel::new())
    }

    pub fn mock_with_quirks(quirks: MockQuirks) -> Self {
        Self::with_kernel(MockKernel::with_quirks(quirks))
    }

    /// Flag a named solid as needing repair.
    pub fn mark_needs_repair(&mut self, name: &str) -> Result<&mut Self, HarnessError> {
        let handle = lookup(&self.entries, name)?;
        self.kernel.mark_needs_repair(handle);
        Ok(self)
    }

    /// Flag a named solid as invalid.
    pub fn corrupt(&mut self, name: &str) -> Result<&mut Self, HarnessError> {
        let handle = lookup(&self.entries, name)?;
        self.kernel.corrupt(handle);
        Ok(self)
    }

    pub fn live_solids(&self) -> usize {
        self.kernel.live_solids()
    }
}

impl ScenarioBuilder<TruckKernel> {
    /// Create a new ScenarioBuilder with TruckKernel (real geometry).
    pub fn truck() -> Self {
        Self::with_kernel(TruckKernel::new())
    }
}

impl<K: KernelBundle + PrimitiveSource> ScenarioBuilder<K> {
    pub fn with_kernel(kernel: K) -> Self {
        Self {
            kernel,
            config: EngineConfig::default(),
            ctx: ToleranceContext::default(),
            tolerance: None,
            check_volumes: true,
            entries: HashMap::new(),
            reports: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_context(mut self, ctx: ToleranceContext) -> Self {
        self.ctx = ctx;
        self
    }

    /// Request tolerance for later combinations; `None` uses the context's.
    pub fn with_tolerance(mut self, tolerance: Option<f64>) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn without_volume_checks(mut self) -> Self {
        self.check_volumes = false;
        self
    }

    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    pub fn kernel_mut(&mut self) -> &mut K {
        &mut self.kernel
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ── Primitives ──────────────────────────────────────────────────────

    pub fn sphere(
        &mut self,
        name: &str,
        center: [f64; 3],
        radius: f64,
    ) -> Result<&mut Self, HarnessError> {
        self.check_name_available(name)?;
        let handle = self.kernel.sphere(center, radius)?;
        self.entries.insert(name.to_string(), Entry::Primitive(handle));
        Ok(self)
    }

    pub fn cuboid(
        &mut self,
        name: &str,
        min: [f64; 3],
        max: [f64; 3],
    ) -> Result<&mut Self, HarnessError> {
        self.check_name_available(name)?;
        let handle = self.kernel.cuboid(min, max)?;
        self.entries.insert(name.to_string(), Entry::Primitive(handle));
        Ok(self)
    }

    // ── Combinations ────────────────────────────────────────────────────

    /// Union the named solids into a new solid called `name`.
    pub fn union(&mut self, name: &str, operands: &[&str]) -> Result<&OutcomeReport, HarnessError> {
        self.check_name_available(name)?;
        let handles = operands
            .iter()
            .map(|n| lookup(&self.entries, n))
            .collect::<Result<Vec<_>, _>>()?;
        let result = combine_union(
            &mut self.kernel,
            &handles,
            self.tolerance,
            self.check_volumes,
            &self.config,
            &self.ctx,
        );
        self.record(name, OperationKind::Union, operands, result)
    }

    /// Subtract `subtrahend` from `minuend` into a new solid called `name`.
    pub fn difference(
        &mut self,
        name: &str,
        minuend: &str,
        subtrahend: &str,
    ) -> Result<&OutcomeReport, HarnessError> {
        self.check_name_available(name)?;
        let a = lookup(&self.entries, minuend)?;
        let b = lookup(&self.entries, subtrahend)?;
        let result = combine_difference(
            &mut self.kernel,
            a,
            b,
            self.tolerance,
            self.check_volumes,
            &self.config,
            &self.ctx,
        );
        self.record(name, OperationKind::Difference, &[minuend, subtrahend], result)
    }

    fn record(
        &mut self,
        name: &str,
        kind: OperationKind,
        operands: &[&str],
        result: Result<CombinationOutcome, CombineError>,
    ) -> Result<&OutcomeReport, HarnessError> {
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(scenario = name, error = %e, "combination refused");
                self.errors.push((name.to_string(), e.to_string()));
                return Err(e.into());
            }
        };
        let mut report = OutcomeReport::from_outcome(name, kind, operands, &outcome, &self.kernel);
        report.oracle_results =
            oracle::run_outcome_oracles(&self.kernel, &outcome, None, 0.0, &self.config.validator);
        debug!(scenario = name, method = %report.method, attempts = report.attempts, "recorded outcome");
        self.entries.insert(name.to_string(), Entry::Combined(outcome));
        self.reports.push(report);
        Ok(&self.reports[self.reports.len() - 1])
    }

    /// Discard a named solid from the kernel.
    pub fn remove(&mut self, name: &str) -> Result<(), HarnessError> {
        let entry = self
            .entries
            .remove(name)
            .ok_or_else(|| HarnessError::SolidNotFound {
                name: name.to_string(),
            })?;
        let handle = match entry {
            Entry::Primitive(h) => h,
            Entry::Combined(o) => o.into_solid(),
        };
        self.kernel.discard(handle);
        Ok(())
    }

    // ── Queries ─────────────────────────────────────────────────────────

    pub fn solid(&self, name: &str) -> Result<&SolidHandle, HarnessError> {
        lookup(&self.entries, name)
    }

    pub fn outcome(&self, name: &str) -> Result<&CombinationOutcome, HarnessError> {
        match self.entries.get(name) {
            Some(Entry::Combined(o)) => Ok(o),
            _ => Err(HarnessError::NoOutcome {
                name: name.to_string(),
            }),
        }
    }

    pub fn volume(&self, name: &str) -> Result<f64, HarnessError> {
        let handle = self.solid(name)?;
        self.kernel
            .volume(handle)
            .ok_or_else(|| HarnessError::AssertionFailed {
                detail: format!("volume unavailable for \"{name}\""),
            })
    }

    pub fn inspect(&self, name: &str) -> Result<InspectionReport, HarnessError> {
        let handle = self.solid(name)?;
        Ok(inspect_solid(&self.kernel, handle, &self.config.validator))
    }

    pub fn diagnose(&mut self, first: &str, second: &str) -> Result<PairDiagnosis, HarnessError> {
        let a = lookup(&self.entries, first)?;
        let b = lookup(&self.entries, second)?;
        Ok(diagnose_pair(
            &mut self.kernel,
            a,
            b,
            &self.config.validator,
            &self.ctx,
        ))
    }

    /// Check `name`'s volume against `expected` within `max_percent`.
    pub fn check_volume(
        &self,
        name: &str,
        expected: f64,
        max_percent: f64,
    ) -> Result<OracleVerdict, HarnessError> {
        let handle = self.solid(name)?;
        Ok(oracle::check_volume_conservation(
            &self.kernel,
            handle,
            expected,
            max_percent,
        ))
    }

    /// Fail unless every oracle recorded for `name` passed.
    pub fn assert_oracles_pass(&self, name: &str) -> Result<(), HarnessError> {
        let report = self
            .reports
            .iter()
            .find(|r| r.name == name)
            .ok_or_else(|| HarnessError::NoOutcome {
                name: name.to_string(),
            })?;
        crate::assertions::assert_all_pass(&report.oracle_results, name)
    }

    pub fn assert_no_errors(&self) -> Result<(), HarnessError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(HarnessError::AssertionFailed {
                detail: format!("{} refused combinations: {:?}", self.errors.len(), self.errors),
            })
        }
    }

    pub fn report(&self) -> ScenarioReport {
        ScenarioReport {
            outcomes: self.reports.clone(),
            errors: self.errors.clone(),
        }
    }

    fn check_name_available(&self, name: &str) -> Result<(), HarnessError> {
        if self.entries.contains_key(name) {
            Err(HarnessError::DuplicateName {
                name: name.to_string(),
            })
        } else {
            Ok(())
        }
    }
}
