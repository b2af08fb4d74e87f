//! Configuration for the combination engine.

use nalgebra::Vector3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::CombineError;
use crate::types::{OperationKind, Strategy};

const MAX_SEEDED_DIRECTIONS: usize = 1024;
const MAX_CONTAINMENT_SAMPLES: usize = 4096;

/// Allowed volume deviation, in percent, per strategy stage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeBounds {
    pub direct: f64,
    pub escalate: f64,
    pub reorder: f64,
    pub perturb: f64,
    pub repair: f64,
}

impl Default for VolumeBounds {
    fn default() -> Self {
        Self::union_defaults()
    }
}

impl VolumeBounds {
    pub fn union_defaults() -> Self {
        Self {
            direct: 5.0,
            escalate: 10.0,
            reorder: 10.0,
            perturb: 15.0,
            repair: 15.0,
        }
    }

    pub fn difference_defaults() -> Self {
        Self {
            direct: 10.0,
            escalate: 15.0,
            reorder: 15.0,
            perturb: 15.0,
            repair: 20.0,
        }
    }

    fn uniform(percent: f64) -> Self {
        Self {
            direct: percent,
            escalate: percent,
            reorder: percent,
            perturb: percent,
            repair: percent,
        }
    }

    pub fn percent(&self, strategy: Strategy) -> f64 {
        match strategy {
            Strategy::Passthrough | Strategy::Direct => self.direct,
            Strategy::Escalate => self.escalate,
            Strategy::Reorder => self.reorder,
            Strategy::Perturb => self.perturb,
            Strategy::RepairRetry | Strategy::Fallback => self.repair,
        }
    }

    fn all(&self) -> [f64; 5] {
        [self.direct, self.escalate, self.reorder, self.perturb, self.repair]
    }
}

/// Where jiggle directions come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DirectionSet {
    Fixed { directions: Vec<[f64; 3]> },
    /// Reproducible pseudo-random unit vectors.
    Seeded { seed: u64, count: usize },
}

impl Default for DirectionSet {
    fn default() -> Self {
        DirectionSet::Fixed {
            directions: vec![
                [1.0, 1.0, 1.0],
                [0.0, 0.0, 1.0],
                [1.0, 0.0, 0.0],
                [0.0, 1.0, 0.0],
            ],
        }
    }
}

impl DirectionSet {
    /// Normalized directions in trial order. Zero vectors are dropped.
    pub fn unit_vectors(&self) -> Vec<Vector3<f64>> {
        match self {
            DirectionSet::Fixed { directions } => directions
                .iter()
                .map(|d| Vector3::new(d[0], d[1], d[2]))
                .filter_map(|v| v.try_normalize(1e-12))
                .collect(),
            DirectionSet::Seeded { seed, count } => {
                let mut rng = StdRng::seed_from_u64(*seed);
                let mut out = Vec::with_capacity(*count);
                // Rejection sampling in the unit ball gives uniform directions
                let mut draws = 0;
                while out.len() < *count && draws < count.saturating_mul(64) {
                    draws += 1;
                    let v = Vector3::new(
                        rng.gen_range(-1.0..=1.0),
                        rng.gen_range(-1.0..=1.0),
                        rng.gen_range(-1.0..=1.0),
                    );
                    let n = v.norm();
                    if n > 1e-3 && n <= 1.0 {
                        out.push(v / n);
                    }
                }
                out
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JiggleConfig {
    pub enabled: bool,
    /// Offset lengths, tried smallest first.
    pub magnitudes: Vec<f64>,
    pub directions: DirectionSet,
}

impl Default for JiggleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            magnitudes: vec![0.001, 0.005, 0.01],
            directions: DirectionSet::default(),
        }
    }
}

impl JiggleConfig {
    /// Positive finite magnitudes in ascending order.
    pub fn sorted_magnitudes(&self) -> Vec<f64> {
        let mut mags: Vec<f64> = self
            .magnitudes
            .iter()
            .copied()
            .filter(|m| m.is_finite() && *m > 0.0)
            .collect();
        mags.sort_by(f64::total_cmp);
        mags.dedup();
        mags
    }

    pub fn max_magnitude(&self) -> f64 {
        self.sorted_magnitudes().last().copied().unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Face pairs examined by the self-intersection heuristic.
    pub max_face_pairs: usize,
    /// Curve samples farther than this from every edge count as interior.
    pub edge_proximity: f64,
    /// Tolerance for face/face intersection probes.
    pub probe_tolerance: f64,
    /// Curve parameters sampled, as arc-length fractions.
    pub curve_samples: Vec<f64>,
    /// Interior points per operand for the containment check; 0 disables it.
    pub containment_samples: usize,
    pub containment_seed: u64,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            max_face_pairs: 50,
            edge_proximity: 0.1,
            probe_tolerance: 0.01,
            curve_samples: vec![0.0, 0.5, 1.0],
            containment_samples: 0,
            containment_seed: 7,
        }
    }
}

/// What to do with operands that are not valid solids.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvalidOperandPolicy {
    #[default]
    Reject,
    /// Drop invalid union operands with a warning.
    Skip,
}

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Multiplier giving the first escalated and the relaxed tolerance.
    pub escalation_factor: f64,
    /// Absolute tolerances tried after `escalation_factor × base`.
    pub escalation_tolerances: Vec<f64>,
    pub union_bounds: VolumeBounds,
    pub difference_bounds: VolumeBounds,
    pub jiggle: JiggleConfig,
    /// Try alternative orderings for unions of three or more operands.
    pub reorder: bool,
    /// Repair operands and retry.
    pub repair: bool,
    pub validator: ValidatorConfig,
    /// Differences whose operands share less volume than this are rejected.
    pub no_intersection_threshold: f64,
    pub invalid_operand_policy: InvalidOperandPolicy,
    /// Perturb only after self-intersection or topology defects were seen.
    pub smart_routing: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            escalation_factor: 10.0,
            escalation_tolerances: vec![0.01, 0.1, 1.0],
            union_bounds: VolumeBounds::union_defaults(),
            difference_bounds: VolumeBounds::difference_defaults(),
            jiggle: JiggleConfig::default(),
            reorder: true,
            repair: true,
            validator: ValidatorConfig::default(),
            no_intersection_threshold: 0.001,
            invalid_operand_policy: InvalidOperandPolicy::Reject,
            smart_routing: true,
        }
    }
}

impl EngineConfig {
    /// Tight volume bounds plus interior-point containment.
    pub fn strict() -> Self {
        Self {
            union_bounds: VolumeBounds::uniform(5.0),
            difference_bounds: VolumeBounds::uniform(10.0),
            validator: ValidatorConfig {
                containment_samples: 16,
                ..ValidatorConfig::default()
            },
            ..Self::default()
        }
    }

    /// Wide volume bounds, larger jiggles, invalid union operands skipped.
    pub fn lenient() -> Self {
        Self {
            union_bounds: VolumeBounds::uniform(25.0),
            difference_bounds: VolumeBounds::uniform(25.0),
            jiggle: JiggleConfig {
                magnitudes: vec![0.001, 0.005, 0.01, 0.05],
                ..JiggleConfig::default()
            },
            invalid_operand_policy: InvalidOperandPolicy::Skip,
            smart_routing: false,
            ..Self::default()
        }
    }

    /// Parse and validate a JSON configuration. Missing fields take defaults.
    pub fn from_json_str(json: &str) -> Result<Self, CombineError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| CombineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), CombineError> {
        if !(self.escalation_factor.is_finite() && self.escalation_factor > 1.0) {
            return Err(CombineError::Config(format!(
                "escalation_factor must be > 1, got {}",
                self.escalation_factor
            )));
        }
        if let Some(t) = self
            .escalation_tolerances
            .iter()
            .find(|t| !(t.is_finite() && **t > 0.0))
        {
            return Err(CombineError::Config(format!(
                "escalation tolerance {t} must be positive"
            )));
        }
        if let Some(m) = self
            .jiggle
            .magnitudes
            .iter()
            .find(|m| !(m.is_finite() && **m > 0.0))
        {
            return Err(CombineError::Config(format!(
                "jiggle magnitude {m} must be positive"
            )));
        }
        let bounds = self.union_bounds.all().into_iter().chain(self.difference_bounds.all());
        for b in bounds {
            if !(b.is_finite() && b >= 0.0) {
                return Err(CombineError::Config(format!(
                    "volume bound {b} must be a non-negative percentage"
                )));
            }
        }
        if let DirectionSet::Seeded { count, .. } = self.jiggle.directions {
            if !(1..=MAX_SEEDED_DIRECTIONS).contains(&count) {
                return Err(CombineError::Config(format!(
                    "seeded direction count {count} must be in 1..={MAX_SEEDED_DIRECTIONS}"
                )));
            }
        }
        if self.jiggle.enabled && self.jiggle.directions.unit_vectors().is_empty() {
            return Err(CombineError::Config(
                "jiggle needs at least one non-zero direction".to_string(),
            ));
        }
        if self.validator.curve_samples.is_empty()
            || self
                .validator
                .curve_samples
                .iter()
                .any(|t| !(0.0..=1.0).contains(t))
        {
            return Err(CombineError::Config(
                "curve_samples must be non-empty fractions in [0, 1]".to_string(),
            ));
        }
        if self.validator.containment_samples > MAX_CONTAINMENT_SAMPLES {
            return Err(CombineError::Config(format!(
                "containment_samples {} exceeds {MAX_CONTAINMENT_SAMPLES}",
                self.validator.containment_samples
            )));
        }
        if self.validator.edge_proximity < 0.0 || self.validator.probe_tolerance <= 0.0 {
            return Err(CombineError::Config(
                "validator edge_proximity must be >= 0 and probe_tolerance > 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn bounds(&self, kind: OperationKind) -> &VolumeBounds {
        match kind {
            OperationKind::Union => &self.union_bounds,
            OperationKind::Difference => &self.difference_bounds,
        }
    }

    /// Tolerance used by reorder and repair retries.
    pub fn relaxed_tolerance(&self, base: f64) -> f64 {
        base * self.escalation_factor
    }

    /// Escalation tolerances above `base`: `factor × base` and the fixed
    /// ladder, ascending, without repeats.
    pub fn escalation_ladder(&self, base: f64) -> Vec<f64> {
        let mut ladder: Vec<f64> = std::iter::once(self.relaxed_tolerance(base))
            .chain(self.escalation_tolerances.iter().copied())
            .filter(|t| t.is_finite() && *t > base)
            .collect();
        ladder.sort_by(f64::total_cmp);
        ladder.dedup_by(|a, b| (*a - *b).abs() <= 1e-12 * b.abs().max(1.0));
        ladder
    }

    /// Largest tolerance the escalation ladder reaches from `base`.
    pub fn largest_tolerance(&self, base: f64) -> f64 {
        self.escalation_ladder(base)
            .last()
            .copied()
            .unwrap_or_else(|| self.relaxed_tolerance(base))
    }
}
