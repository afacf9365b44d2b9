//! Feasibility records - per parcel and development form profit estimates
//!
//! A record arrives from the external pro forma with a base profit. Policy
//! modifiers never overwrite that profit: each one appends a
//! [`ProfitAdjustment`] and `max_profit()` is re-derived from the base plus
//! the recorded deltas.

use serde::{Deserialize, Serialize};

use crate::core::types::{Form, Money, ParcelId};

/// One recorded change to a record's profit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfitAdjustment {
    pub policy: String,
    pub delta: Money,
}

/// Profit estimate for developing one parcel under one form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeasibilityRecord {
    pub parcel_id: ParcelId,
    pub form: Form,
    /// Unmodified profit from the pro forma
    #[serde(rename = "max_profit")]
    base_profit: Money,
    #[serde(default)]
    adjustments: Vec<ProfitAdjustment>,
    #[serde(default)]
    pub total_cost: Money,
    #[serde(default)]
    pub building_revenue: Money,
    #[serde(default)]
    pub residential_sqft: f64,
    /// Average unit size allowed on the parcel
    #[serde(default)]
    pub ave_sqft_per_unit: f64,
    #[serde(default)]
    pub non_residential_sqft: f64,
    /// Units already standing on the parcel before development
    #[serde(default)]
    pub total_residential_units: u32,
    /// Development fees charged by policy modifiers
    #[serde(default)]
    pub fees: Money,
    #[serde(default)]
    pub deed_restricted_units: u32,
    #[serde(default)]
    pub inclusionary_units: u32,
}

impl FeasibilityRecord {
    pub fn new(parcel_id: ParcelId, form: Form, max_profit: Money) -> Self {
        Self {
            parcel_id,
            form,
            base_profit: max_profit,
            adjustments: Vec::new(),
            total_cost: 0.0,
            building_revenue: 0.0,
            residential_sqft: 0.0,
            ave_sqft_per_unit: 0.0,
            non_residential_sqft: 0.0,
            total_residential_units: 0,
            fees: 0.0,
            deed_restricted_units: 0,
            inclusionary_units: 0,
        }
    }

    pub fn with_residential(mut self, residential_sqft: f64, ave_sqft_per_unit: f64) -> Self {
        self.residential_sqft = residential_sqft;
        self.ave_sqft_per_unit = ave_sqft_per_unit;
        self
    }

    pub fn with_non_residential(mut self, sqft: f64) -> Self {
        self.non_residential_sqft = sqft;
        self
    }

    pub fn with_finances(mut self, total_cost: Money, building_revenue: Money) -> Self {
        self.total_cost = total_cost;
        self.building_revenue = building_revenue;
        self
    }

    pub fn with_existing_units(mut self, units: u32) -> Self {
        self.total_residential_units = units;
        self
    }

    /// Current profit: base estimate plus every recorded policy delta
    pub fn max_profit(&self) -> Money {
        self.base_profit + self.adjustments.iter().map(|a| a.delta).sum::<Money>()
    }

    pub fn base_profit(&self) -> Money {
        self.base_profit
    }

    pub fn adjustments(&self) -> &[ProfitAdjustment] {
        &self.adjustments
    }

    /// Total delta recorded under one policy name
    pub fn policy_adjustment(&self, policy: &str) -> Money {
        self.adjustments
            .iter()
            .filter(|a| a.policy == policy)
            .map(|a| a.delta)
            .sum()
    }

    /// Record a profit change attributed to a policy
    pub fn adjust_profit(&mut self, policy: &str, delta: Money) {
        self.adjustments.push(ProfitAdjustment {
            policy: policy.to_string(),
            delta,
        });
    }

    /// Whether the profit is a usable number
    pub fn has_finite_profit(&self) -> bool {
        self.max_profit().is_finite()
    }

    /// Feasible without help: profit at or above zero
    pub fn is_market_feasible(&self) -> bool {
        self.max_profit() >= 0.0
    }

    /// Units the project would contain
    pub fn residential_units(&self) -> u32 {
        if self.ave_sqft_per_unit > 0.0 && self.residential_sqft > 0.0 {
            (self.residential_sqft / self.ave_sqft_per_unit).floor() as u32
        } else {
            0
        }
    }

    /// Units added beyond what already stands on the parcel
    pub fn net_units(&self) -> u32 {
        self.residential_units()
            .saturating_sub(self.total_residential_units)
    }

    /// Market revenue per unit, if the project has units and revenue
    pub fn revenue_per_unit(&self) -> Option<Money> {
        let units = self.residential_units();
        if units == 0 || self.building_revenue <= 0.0 {
            return None;
        }
        Some(self.building_revenue / units as f64)
    }
}

/// The feasibility table for one simulated year
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeasibilityTable {
    records: Vec<FeasibilityRecord>,
}

impl FeasibilityTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: FeasibilityRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FeasibilityRecord> {
        self.records.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut FeasibilityRecord> {
        self.records.iter_mut()
    }

    /// Records for one development form
    pub fn for_form(&self, form: Form) -> impl Iterator<Item = &FeasibilityRecord> {
        self.records.iter().filter(move |r| r.form == form)
    }

    pub fn get(&self, parcel_id: ParcelId, form: Form) -> Option<&FeasibilityRecord> {
        self.records
            .iter()
            .find(|r| r.parcel_id == parcel_id && r.form == form)
    }

    pub fn records(&self) -> &[FeasibilityRecord] {
        &self.records
    }
}

impl FromIterator<FeasibilityRecord> for FeasibilityTable {
    fn from_iter<I: IntoIterator<Item = FeasibilityRecord>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}
