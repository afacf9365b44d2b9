//! Budget-constrained subsidy allocation and the placement contract

pub mod office;
pub mod outcome;
pub mod placement;
pub mod program;
pub mod residential;

pub use office::{walk_office_candidates, SubsidizedOfficeAllocator};
pub use outcome::{AllocationOutcome, PassSummary};
pub use placement::{
    CapacityPlacement, DemandTargets, NewBuilding, PlacementError, PlacementRequest,
    PlacementService,
};
pub use program::SubsidyProgram;
pub use residential::{prefix_within_budget, CarryOver, SubsidizedResidentialAllocator};
