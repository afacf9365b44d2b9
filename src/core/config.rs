//! Allocation settings with documented constants
//!
//! Run-wide numeric settings shared by the subsidy allocators. The values are
//! owned by the simulation context; nothing here is global.

use serde::{Deserialize, Serialize};

use crate::core::error::{DevsimError, Result};
use crate::core::types::Money;

/// Run-wide settings for subsidy allocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocationSettings {
    /// Largest subsidy a single residential project may receive
    ///
    /// Projects whose loss exceeds this are never candidates. Keeps one
    /// giant project from absorbing a whole pool.
    pub max_subsidy_per_project: Money,

    /// Floor on the per-unit subsidy used to rank residential candidates
    ///
    /// Administration costs at least this much per unit even when the pro
    /// forma says a project is almost profitable.
    pub min_subsidy_per_unit: Money,

    /// Profit per sqft an office project needs to compete in the open market
    pub normal_office_profit_per_sqft: Money,

    /// Mint deed-restricted units from residential subsidy
    pub mint_deed_restricted_units: bool,
}

impl Default for AllocationSettings {
    fn default() -> Self {
        Self {
            max_subsidy_per_project: 50_000_000.0,
            min_subsidy_per_unit: 10_000.0,
            normal_office_profit_per_sqft: 70.0,
            mint_deed_restricted_units: true,
        }
    }
}

impl AllocationSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate settings for internal consistency
    pub fn validate(&self) -> Result<()> {
        if !(self.max_subsidy_per_project.is_finite() && self.max_subsidy_per_project > 0.0) {
            return Err(DevsimError::Config(format!(
                "max_subsidy_per_project must be positive, got {}",
                self.max_subsidy_per_project
            )));
        }
        if !(self.min_subsidy_per_unit.is_finite() && self.min_subsidy_per_unit >= 0.0) {
            return Err(DevsimError::Config(format!(
                "min_subsidy_per_unit must be non-negative, got {}",
                self.min_subsidy_per_unit
            )));
        }
        if !self.normal_office_profit_per_sqft.is_finite() {
            return Err(DevsimError::Config(
                "normal_office_profit_per_sqft must be finite".into(),
            ));
        }
        Ok(())
    }
}
