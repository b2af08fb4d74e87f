//! Assertion helpers with diagnostic output.
//!
//! Every failure names the context and carries expected vs actual, plus the
//! method and defects of the outcome involved.

use combine_engine::{CombinationOutcome, OutcomeStatus, Strategy};
use splint_types::format_defects;

use crate::helpers::{percent_error, HarnessError};
use crate::oracle::OracleVerdict;

/// Assert every verdict passed; the error lists all failures at once.
pub fn assert_all_pass(verdicts: &[OracleVerdict], ctx: &str) -> Result<(), HarnessError> {
    let failures: Vec<&OracleVerdict> = verdicts.iter().filter(|v| !v.passed).collect();
    match failures.as_slice() {
        [] => Ok(()),
        [only] => Err(HarnessError::OracleFailure {
            oracle: only.oracle_name.clone(),
            detail: format!("[{}] {}", ctx, only.detail),
        }),
        many => Err(HarnessError::AssertionFailed {
            detail: format!(
                "[{}] {} oracles failed: {}",
                ctx,
                many.len(),
                many.iter()
                    .map(|v| format!("{} ({})", v.oracle_name, v.detail))
                    .collect::<Vec<_>>()
                    .join("; "),
            ),
        }),
    }
}

/// Assert the outcome came from `strategy` with the given status.
pub fn assert_strategy(
    outcome: &CombinationOutcome,
    strategy: Strategy,
    status: OutcomeStatus,
    ctx: &str,
) -> Result<(), HarnessError> {
    if outcome.strategy() == strategy && outcome.status() == status {
        Ok(())
    } else {
        Err(HarnessError::AssertionFailed {
            detail: format!(
                "[{}] expected {} / {:?}, got {} / {:?} (method {}, defects [{}])",
                ctx,
                strategy,
                status,
                outcome.strategy(),
                outcome.status(),
                outcome.method(),
                format_defects(outcome.defects()),
            ),
        })
    }
}

/// Assert `actual` is within `max_percent` of `expected`.
pub fn assert_volume_near(
    actual: f64,
    expected: f64,
    max_percent: f64,
    ctx: &str,
) -> Result<(), HarnessError> {
    let err = percent_error(actual, expected);
    if err.abs() <= max_percent {
        Ok(())
    } else {
        Err(HarnessError::AssertionFailed {
            detail: format!(
                "[{}] volume {:.3}, expected {:.3} ({:+.2}%, limit ±{}%)",
                ctx, actual, expected, err, max_percent,
            ),
        })
    }
}
