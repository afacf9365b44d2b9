//! Year-by-year development simulation

pub mod engine;
pub mod output;
pub mod report;
pub mod scenario;

pub use engine::{DevelopmentSimulation, SimulationOptions, YearInputs};
pub use output::{AccountLedger, RunOutput, RunStats};
pub use report::{AllocationSummary, YearReport};
pub use scenario::{Scenario, SyntheticConfig};
