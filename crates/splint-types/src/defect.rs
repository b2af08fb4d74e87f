use std::fmt;

use serde::{Deserialize, Serialize};

/// A named defect found on a combination result.
///
/// The `Display` form is the compact tag used in method labels and logs,
/// e.g. `NakedEdges=3` or `VolumeError=-12.4%`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Defect {
    NotValid,
    NotSolid,
    NotManifold,
    /// Edges bordering only one face.
    NakedEdges { count: usize },
    /// Face pairs whose intersection lies away from every edge.
    SelfIntersections { count: usize },
    /// Signed deviation of result volume from the expected volume, in percent.
    VolumeError { percent: f64 },
    /// Difference result is not smaller than its minuend.
    ResultNotSmaller,
    /// Volume checks were requested but the result volume is unavailable.
    NoVolume,
    /// Interior sample points of the inputs that fell outside the result.
    LostInteriorPoints { count: usize },
}

impl Defect {
    /// Valid/solid/manifold failures: the candidate does not meet the
    /// minimum bar for an imperfect fallback.
    pub fn breaks_minimum_bar(&self) -> bool {
        matches!(self, Defect::NotValid | Defect::NotSolid | Defect::NotManifold)
    }

    /// Open or non-manifold topology.
    pub fn is_topological(&self) -> bool {
        matches!(
            self,
            Defect::NotValid | Defect::NotSolid | Defect::NotManifold | Defect::NakedEdges { .. }
        )
    }

    pub fn is_self_intersection(&self) -> bool {
        matches!(self, Defect::SelfIntersections { .. })
    }
}

impl fmt::Display for Defect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Defect::NotValid => write!(f, "NotValid"),
            Defect::NotSolid => write!(f, "NotSolid"),
            Defect::NotManifold => write!(f, "NotManifold"),
            Defect::NakedEdges { count } => write!(f, "NakedEdges={count}"),
            Defect::SelfIntersections { count } => write!(f, "SelfIntersections={count}"),
            Defect::VolumeError { percent } => write!(f, "VolumeError={percent:+.1}%"),
            Defect::ResultNotSmaller => write!(f, "ResultNotSmaller"),
            Defect::NoVolume => write!(f, "NoVolume"),
            Defect::LostInteriorPoints { count } => write!(f, "LostInteriorPoints={count}"),
        }
    }
}

/// Join defect tags with `,` as used inside `Imperfect(...)` labels.
pub fn format_defects(defects: &[Defect]) -> String {
    defects
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_tags() {
        assert_eq!(Defect::NakedEdges { count: 3 }.to_string(), "NakedEdges=3");
        assert_eq!(
            Defect::VolumeError { percent: -12.44 }.to_string(),
            "VolumeError=-12.4%"
        );
        assert_eq!(
            Defect::VolumeError { percent: 6.0 }.to_string(),
            "VolumeError=+6.0%"
        );
    }

    #[test]
    fn format_defects_joins_in_order() {
        let defects = vec![Defect::NotSolid, Defect::SelfIntersections { count: 2 }];
        assert_eq!(format_defects(&defects), "NotSolid,SelfIntersections=2");
        assert_eq!(format_defects(&[]), "");
    }

    #[test]
    fn classification() {
        assert!(Defect::NotManifold.breaks_minimum_bar());
        assert!(!Defect::NakedEdges { count: 1 }.breaks_minimum_bar());
        assert!(Defect::NakedEdges { count: 1 }.is_topological());
        assert!(!Defect::ResultNotSmaller.is_topological());
        assert!(Defect::SelfIntersections { count: 1 }.is_self_intersection());
    }

    #[test]
    fn serializes_with_type_tag() {
        let json = serde_json::to_string(&Defect::NakedEdges { count: 2 }).unwrap();
        assert_eq!(json, r#"{"type":"NakedEdges","count":2}"#);
    }
}
