use serde::{Deserialize, Serialize};

/// Working length unit of a model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LengthUnit {
    #[default]
    Millimeters,
    Centimeters,
    Meters,
    Inches,
}

impl LengthUnit {
    pub fn symbol(&self) -> &'static str {
        match self {
            LengthUnit::Millimeters => "mm",
            LengthUnit::Centimeters => "cm",
            LengthUnit::Meters => "m",
            LengthUnit::Inches => "in",
        }
    }
}

/// Tolerances of the model being combined.
///
/// Passed explicitly into every entry point; nothing reads tolerance from
/// ambient document state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToleranceContext {
    /// Absolute model tolerance in `unit`.
    pub absolute: f64,
    /// Angle tolerance in radians for kernel repair (kinky-face splitting).
    pub angle_radians: f64,
    pub unit: LengthUnit,
}

impl Default for ToleranceContext {
    fn default() -> Self {
        Self {
            absolute: 0.001,
            angle_radians: 1.0_f64.to_radians(),
            unit: LengthUnit::Millimeters,
        }
    }
}

impl ToleranceContext {
    pub fn new(absolute: f64, unit: LengthUnit) -> Self {
        Self {
            absolute,
            unit,
            ..Self::default()
        }
    }

    pub fn with_absolute(self, absolute: f64) -> Self {
        Self { absolute, ..self }
    }

    /// Resolve a caller-supplied tolerance: missing, non-finite and
    /// non-positive values fall back to the context's absolute tolerance.
    pub fn resolve(&self, requested: Option<f64>) -> f64 {
        match requested {
            Some(t) if t.is_finite() && t > 0.0 => t,
            _ => self.absolute,
        }
    }
}
