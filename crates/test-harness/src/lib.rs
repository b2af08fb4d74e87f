//! Test harness for the solid combination engine.
//!
//! Provides programmatic tools for scripting multi-step combination
//! scenarios, verifying every outcome, and generating diagnostic output.
//!
//! # Key Components
//!
//! - [`ScenarioBuilder`]: Fluent API over a kernel with named solids
//! - [`oracle`]: Verification functions returning pass/fail verdicts
//! - [`report`]: Text and JSON outcome reports
//! - [`helpers`]: Error type, primitive sources, expected-volume math
//! - [`assertions`]: Assertion helpers with diagnostics

pub mod assertions;
pub mod helpers;
pub mod oracle;
pub mod report;
pub mod workflow;

pub use helpers::{HarnessError, PrimitiveSource};
pub use oracle::OracleVerdict;
pub use report::{OutcomeReport, ScenarioReport};
pub use workflow::ScenarioBuilder;

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Install a `fmt` subscriber routed through the test writer.
///
/// Honors `RUST_LOG`, defaulting to `warn`. Later calls are no-ops.
pub fn init_tracing() {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
