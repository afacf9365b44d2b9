//! Per-year summaries

use serde::{Deserialize, Serialize};

use crate::accounts::AccountBalance;
use crate::allocation::AllocationOutcome;
use crate::core::types::{Money, Year};
use crate::policy::ModifierSummary;
use crate::revenue::FeeDeposit;

/// What one subsidy program did in a year
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationSummary {
    pub policy: String,
    pub spent: Money,
    pub buildings: usize,
    pub units: u32,
    pub deed_restricted_units: u32,
    pub non_residential_sqft: f64,
}

impl From<&AllocationOutcome> for AllocationSummary {
    fn from(outcome: &AllocationOutcome) -> Self {
        Self {
            policy: outcome.policy.clone(),
            spent: outcome.total_subsidy,
            buildings: outcome.buildings.len(),
            units: outcome.units,
            deed_restricted_units: outcome.deed_restricted_units(),
            non_residential_sqft: outcome.non_residential_sqft(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearReport {
    pub year: Year,
    pub periodic_deposits: Money,
    pub modifiers: Vec<ModifierSummary>,
    /// Fees collected on the previous year's market-rate buildings
    pub fee_deposits: Vec<FeeDeposit>,
    pub allocations: Vec<AllocationSummary>,
    pub market_buildings: usize,
    pub market_units: u32,
    /// Balances at the end of the year
    pub balances: Vec<AccountBalance>,
}

impl YearReport {
    pub fn fee_revenue(&self) -> Money {
        self.fee_deposits.iter().map(|d| d.amount).sum()
    }

    pub fn subsidy_spent(&self) -> Money {
        self.allocations.iter().map(|a| a.spent).sum()
    }

    pub fn subsidized_units(&self) -> u32 {
        self.allocations.iter().map(|a| a.units).sum()
    }

    pub fn summary(&self) -> String {
        format!(
            "{}: spent {:.0} on {} subsidized units, collected {:.0} in fees, {} market buildings",
            self.year,
            self.subsidy_spent(),
            self.subsidized_units(),
            self.fee_revenue(),
            self.market_buildings,
        )
    }
}
