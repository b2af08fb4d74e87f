//! Outcome reports as plain text or JSON.
//!
//! Text is for reading a failing scenario in test output; JSON is for
//! diffing runs.

use std::fmt;

use combine_engine::{CombinationOutcome, OperationKind, OutcomeStatus, Strategy};
use kernel_adapter::{BoundingBox, SolidInspect};
use serde::{Deserialize, Serialize};
use splint_types::Defect;
use uuid::Uuid;

use crate::helpers::HarnessError;
use crate::oracle::OracleVerdict;

/// One combination, as recorded after it returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeReport {
    pub name: String,
    pub request_id: Uuid,
    pub kind: OperationKind,
    pub operands: Vec<String>,
    pub method: String,
    pub strategy: Strategy,
    pub status: OutcomeStatus,
    pub success: bool,
    pub attempts: usize,
    pub defects: Vec<Defect>,
    pub volume: Option<f64>,
    pub bounding_box: Option<BoundingBox>,
    pub oracle_results: Vec<OracleVerdict>,
}

impl OutcomeReport {
    pub fn from_outcome(
        name: &str,
        kind: OperationKind,
        operands: &[&str],
        outcome: &CombinationOutcome,
        inspect: &dyn SolidInspect,
    ) -> Self {
        Self {
            name: name.to_string(),
            request_id: outcome.request_id(),
            kind,
            operands: operands.iter().map(|s| s.to_string()).collect(),
            method: outcome.method().to_string(),
            strategy: outcome.strategy(),
            status: outcome.status(),
            success: outcome.success(),
            attempts: outcome.attempts(),
            defects: outcome.defects().to_vec(),
            volume: inspect.volume(outcome.solid()),
            bounding_box: inspect.bounding_box(outcome.solid()),
            oracle_results: Vec::new(),
        }
    }

    pub fn oracles_passed(&self) -> bool {
        self.oracle_results.iter().all(|v| v.passed)
    }

    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let mark = if self.success { "OK" } else { "IMPERFECT" };
        out.push_str(&format!(
            "[{}] {} \"{}\" = {}({})\n",
            mark,
            self.kind,
            self.name,
            self.kind,
            self.operands.join(", "),
        ));
        out.push_str(&format!(
            "      method={} strategy={} status={:?} attempts={}\n",
            self.method, self.strategy, self.status, self.attempts,
        ));
        if !self.defects.is_empty() {
            let defects: Vec<String> = self.defects.iter().map(|d| d.to_string()).collect();
            out.push_str(&format!("      defects: {}\n", defects.join(", ")));
        }
        match self.volume {
            Some(v) => out.push_str(&format!("      volume={v:.3}\n")),
            None => out.push_str("      volume=unavailable\n"),
        }
        if let Some(bb) = &self.bounding_box {
            out.push_str(&format!(
                "      bbox=({:.3}, {:.3}, {:.3}) -> ({:.3}, {:.3}, {:.3})\n",
                bb.min.x, bb.min.y, bb.min.z, bb.max.x, bb.max.y, bb.max.z,
            ));
        }
        for v in &self.oracle_results {
            let status = if v.passed { "PASS" } else { "FAIL" };
            out.push_str(&format!("      [{}] {}: {}\n", status, v.oracle_name, v.detail));
        }
        out
    }
}

impl fmt::Display for OutcomeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_text())
    }
}

/// A whole scenario: every recorded outcome and every refused request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub outcomes: Vec<OutcomeReport>,
    /// (name, error message) for requests that returned an error.
    pub errors: Vec<(String, String)>,
}

impl ScenarioReport {
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        out.push_str("=== Combination Scenario Report ===\n\n");

        let imperfect = self.outcomes.iter().filter(|o| !o.success).count();
        out.push_str(&format!(
            "Outcomes ({} combinations, {} imperfect, {} errors):\n",
            self.outcomes.len(),
            imperfect,
            self.errors.len(),
        ));
        for outcome in &self.outcomes {
            out.push_str("  ");
            out.push_str(&outcome.to_text());
        }

        if self.errors.is_empty() {
            out.push_str("\nErrors: none\n");
        } else {
            out.push_str(&format!("\nErrors ({}):\n", self.errors.len()));
            for (name, msg) in &self.errors {
                out.push_str(&format!("  {}: {}\n", name, msg));
            }
        }
        out
    }

    pub fn to_json(&self) -> Result<String, HarnessError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, HarnessError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn outcome(&self, name: &str) -> Option<&OutcomeReport> {
        self.outcomes.iter().find(|o| o.name == name)
    }
}

impl fmt::Display for ScenarioReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_text())
    }
}
