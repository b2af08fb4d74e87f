pub mod defect;
pub mod tolerance;

pub use defect::*;
pub use tolerance::*;
