/// Request-level failures. Kernel errors inside strategies never surface
/// here; they are recorded as failed attempts.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CombineError {
    #[error("operand {index} is not usable: {reason}")]
    InvalidOperand { index: usize, reason: String },

    #[error("solids do not intersect: intersection volume {intersection_volume:.6} is below {threshold}")]
    NoIntersection {
        intersection_volume: f64,
        threshold: f64,
    },

    #[error(
        "no strategy produced an acceptable solid after {attempts} attempts \
         (input volume {input_volume:?}, expected volume {expected_volume:?})"
    )]
    CombinationExhausted {
        input_volume: Option<f64>,
        expected_volume: Option<f64>,
        attempts: usize,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}
