//! Policy levers that reshape project profitability before allocation

pub mod buckets;
pub mod fees;
pub mod inclusionary;
pub mod modifier;
pub mod parking;
pub mod pipeline;
pub mod tiered;

pub use buckets::{Buckets, PercentageBucketModifier, RangeBucket};
pub use fees::FeeModifier;
pub use inclusionary::{AffordabilityParams, HouseholdIncomes, InclusionaryModifier};
pub use modifier::{
    apply_pct, pct_delta, CombinationMode, ModifierContext, ModifierStage, ModifierSummary,
    PolicyModifier,
};
pub use parking::ParkingModifier;
pub use pipeline::{PipelineOutcome, PolicyModificationPipeline};
pub use tiered::{Tier, TieredFormulaModifier};
