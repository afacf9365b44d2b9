//! Placement service contract and a capacity-limited reference service
//!
//! The allocators decide which projects get funded; a placement service
//! decides which of them are actually built. It may build fewer than asked
//! when demand runs out, and never builds twice on one parcel.

use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::core::types::{BuildingId, Form, Money, ParcelId, SubaccountId, Year};
use crate::feasibility::FeasibilityRecord;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlacementError {
    /// No demand left for the form; allocators treat this as an empty result
    #[error("no remaining demand for {form}")]
    InsufficientDemand { form: Form },

    #[error("{0} has no remaining capacity")]
    CapacityExceeded(ParcelId),

    #[error("placement service failed: {0}")]
    Service(String),
}

/// Projects offered to a placement service, in priority order
#[derive(Debug, Clone, Copy)]
pub struct PlacementRequest<'a> {
    pub form: Form,
    pub projects: &'a [FeasibilityRecord],
    pub year: Year,
}

/// A building produced by the placement service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewBuilding {
    pub building_id: BuildingId,
    pub parcel_id: ParcelId,
    pub form: Form,
    pub year_built: Year,
    pub max_profit: Money,
    pub total_cost: Money,
    pub building_revenue: Money,
    pub residential_units: u32,
    pub non_residential_sqft: f64,
    /// Units standing on the parcel before redevelopment
    pub total_residential_units: u32,
    pub subsidized: bool,
    pub policy_name: Option<String>,
    pub subaccount: Option<SubaccountId>,
    pub subsidy_amount: Money,
    pub deed_restricted_units: u32,
    pub subsidized_units: u32,
    pub inclusionary_units: u32,
}

impl NewBuilding {
    pub fn from_record(building_id: BuildingId, record: &FeasibilityRecord, year: Year) -> Self {
        Self {
            building_id,
            parcel_id: record.parcel_id,
            form: record.form,
            year_built: year,
            max_profit: record.max_profit(),
            total_cost: record.total_cost,
            building_revenue: record.building_revenue,
            residential_units: record.residential_units(),
            non_residential_sqft: record.non_residential_sqft,
            total_residential_units: record.total_residential_units,
            subsidized: false,
            policy_name: None,
            subaccount: None,
            subsidy_amount: 0.0,
            deed_restricted_units: record.deed_restricted_units,
            subsidized_units: 0,
            inclusionary_units: record.inclusionary_units,
        }
    }

    pub fn net_units(&self) -> u32 {
        self.residential_units.saturating_sub(self.total_residential_units)
    }

    pub fn revenue_per_unit(&self) -> Option<Money> {
        (self.residential_units > 0).then(|| self.building_revenue / self.residential_units as f64)
    }
}

/// Builds projects chosen by an allocator
pub trait PlacementService {
    fn place(&mut self, request: PlacementRequest<'_>) -> Result<Vec<NewBuilding>, PlacementError>;
}

/// Demand available to a placement service for one year
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DemandTargets {
    /// Net new housing units households will occupy
    #[serde(default)]
    pub residential_units: u32,
    /// Non-residential sqft absorbed, by form
    #[serde(default)]
    pub non_residential_sqft: AHashMap<Form, f64>,
}

/// Deterministic placement limited by yearly demand
///
/// Projects are taken in the order offered. One that does not fit the
/// remaining demand is skipped and later, smaller ones are still tried.
#[derive(Debug, Clone, Default)]
pub struct CapacityPlacement {
    remaining_units: u32,
    remaining_sqft: AHashMap<Form, f64>,
    developed: AHashSet<ParcelId>,
    next_id: u64,
}

impl CapacityPlacement {
    pub fn new(demand: DemandTargets) -> Self {
        let mut service = Self::default();
        service.reset_year(demand);
        service
    }

    /// Refresh demand at the start of a year; developed parcels stay developed
    pub fn reset_year(&mut self, demand: DemandTargets) {
        self.remaining_units = demand.residential_units;
        self.remaining_sqft = demand.non_residential_sqft;
    }

    pub fn remaining_units(&self) -> u32 {
        self.remaining_units
    }

    pub fn remaining_sqft(&self, form: Form) -> f64 {
        self.remaining_sqft.get(&form).copied().unwrap_or(0.0)
    }

    pub fn is_developed(&self, parcel_id: ParcelId) -> bool {
        self.developed.contains(&parcel_id)
    }

    /// Mark a parcel built by someone else (e.g. market-rate development)
    pub fn mark_developed(&mut self, parcel_id: ParcelId) {
        self.developed.insert(parcel_id);
    }

    fn has_demand(&self, form: Form) -> bool {
        if form.is_residential() {
            self.remaining_units > 0
        } else {
            self.remaining_sqft(form) > 0.0
        }
    }

    fn try_consume(&mut self, record: &FeasibilityRecord) -> bool {
        if record.form.is_residential() {
            let units = record.net_units();
            if units == 0 || units > self.remaining_units {
                return false;
            }
            self.remaining_units -= units;
        } else {
            let remaining = self.remaining_sqft(record.form);
            let sqft = record.non_residential_sqft;
            if sqft <= 0.0 || sqft > remaining {
                return false;
            }
            self.remaining_sqft.insert(record.form, remaining - sqft);
        }
        true
    }
}

impl PlacementService for CapacityPlacement {
    fn place(&mut self, request: PlacementRequest<'_>) -> Result<Vec<NewBuilding>, PlacementError> {
        if request.projects.is_empty() {
            return Ok(Vec::new());
        }
        if !self.has_demand(request.form) {
            return Err(PlacementError::InsufficientDemand { form: request.form });
        }

        let mut built = Vec::new();
        for record in request.projects {
            if record.form != request.form {
                return Err(PlacementError::Service(format!(
                    "{} offered in a {} request",
                    record.form, request.form
                )));
            }
            if self.developed.contains(&record.parcel_id) {
                debug!(parcel = %record.parcel_id, "parcel already developed");
                continue;
            }
            if !self.try_consume(record) {
                continue;
            }
            self.developed.insert(record.parcel_id);
            self.next_id += 1;
            built.push(NewBuilding::from_record(BuildingId(self.next_id), record, request.year));
        }

        debug!(
            form = %request.form,
            offered = request.projects.len(),
            built = built.len(),
            "placement complete"
        );
        Ok(built)
    }
}
