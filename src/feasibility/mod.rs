//! Feasibility layer - profit estimates and the parcel attributes they are judged against

pub mod parcel;
pub mod record;

pub use parcel::{ParcelAttributes, ParcelTable};
pub use record::{FeasibilityRecord, FeasibilityTable, ProfitAdjustment};
