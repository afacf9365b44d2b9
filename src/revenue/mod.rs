//! Development fee schedules and the engine collecting them

pub mod engine;
pub mod schedule;

pub use engine::{FeeAssessmentEngine, FeeDeposit};
pub use schedule::{FeeBasis, FeeSchedule};
