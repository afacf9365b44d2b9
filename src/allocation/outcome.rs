//! What an allocator did in one call

use serde::{Deserialize, Serialize};

use crate::allocation::placement::NewBuilding;
use crate::core::types::{Money, SubaccountId};

/// One subaccount's selection pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassSummary {
    pub subaccount: SubaccountId,
    /// Balance when the pass started
    pub budget: Money,
    pub candidates: usize,
    pub accepted: usize,
    pub built: usize,
    pub spent: Money,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AllocationOutcome {
    pub policy: String,
    pub buildings: Vec<NewBuilding>,
    pub total_subsidy: Money,
    pub units: u32,
    pub passes: Vec<PassSummary>,
}

impl AllocationOutcome {
    pub fn new(policy: &str) -> Self {
        Self {
            policy: policy.to_string(),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.buildings.is_empty()
    }

    pub fn deed_restricted_units(&self) -> u32 {
        self.buildings.iter().map(|b| b.deed_restricted_units).sum()
    }

    pub fn non_residential_sqft(&self) -> f64 {
        self.buildings.iter().map(|b| b.non_residential_sqft).sum()
    }

    pub(crate) fn absorb(&mut self, pass: PassSummary, buildings: Vec<NewBuilding>) {
        self.total_subsidy += pass.spent;
        self.units += buildings.iter().map(|b| b.residential_units).sum::<u32>();
        self.buildings.extend(buildings);
        self.passes.push(pass);
    }
}
