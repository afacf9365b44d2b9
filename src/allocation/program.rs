//! A configured subsidy program of either kind

use crate::accounts::Coffer;
use crate::allocation::office::SubsidizedOfficeAllocator;
use crate::allocation::outcome::AllocationOutcome;
use crate::allocation::placement::PlacementService;
use crate::allocation::residential::SubsidizedResidentialAllocator;
use crate::core::error::Result;
use crate::core::types::Year;
use crate::feasibility::{FeasibilityTable, ParcelTable};

#[derive(Debug, Clone)]
pub enum SubsidyProgram {
    Residential(SubsidizedResidentialAllocator),
    Office(SubsidizedOfficeAllocator),
}

impl SubsidyProgram {
    pub fn account(&self) -> &str {
        match self {
            SubsidyProgram::Residential(a) => a.account(),
            SubsidyProgram::Office(a) => a.account(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SubsidyProgram::Residential(_) => "residential",
            SubsidyProgram::Office(_) => "office",
        }
    }

    /// Whether an ordering entry names this program: `account` or `kind:account`
    pub fn matches(&self, entry: &str) -> bool {
        match entry.split_once(':') {
            Some((kind, account)) => kind == self.kind() && account == self.account(),
            None => entry == self.account(),
        }
    }

    pub fn allocate(
        &self,
        table: &FeasibilityTable,
        parcels: &ParcelTable,
        coffer: &mut Coffer,
        placement: &mut dyn PlacementService,
        year: Year,
    ) -> Result<AllocationOutcome> {
        match self {
            SubsidyProgram::Residential(a) => a.allocate(table, parcels, coffer, placement, year),
            SubsidyProgram::Office(a) => a.allocate(table, parcels, coffer, placement, year),
        }
    }
}
