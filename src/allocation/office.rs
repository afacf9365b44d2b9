//! Subsidized office allocation
//!
//! An office project needs help only until its profit per sqft reaches the
//! normal market level, so each one asks for a different top-up. Candidates
//! are walked cheapest-profit first with a running balance; a project that
//! cannot be afforded is skipped and the walk continues, since a later one
//! may still fit.

use ahash::AHashMap;
use ordered_float::OrderedFloat;
use tracing::info;

use crate::accounts::{Coffer, TransactionMetadata};
use crate::allocation::outcome::{AllocationOutcome, PassSummary};
use crate::allocation::placement::{PlacementError, PlacementRequest, PlacementService};
use crate::core::config::AllocationSettings;
use crate::core::error::{DevsimError, Result};
use crate::core::types::{Form, Money, ParcelId, SubaccountId, Year};
use crate::expression::Formula;
use crate::feasibility::{FeasibilityRecord, FeasibilityTable, ParcelTable};

/// Accepted `(index, top_up)` pairs from a walk over `(profit_per_sqft, sqft)`
/// candidates already sorted by profit per sqft
pub fn walk_office_candidates(
    candidates: &[(f64, f64)],
    threshold: f64,
    budget: Money,
) -> Vec<(usize, Money)> {
    let mut remaining = budget;
    let mut accepted = Vec::new();
    for (idx, &(profit_per_sqft, sqft)) in candidates.iter().enumerate() {
        if profit_per_sqft >= threshold {
            continue;
        }
        let needed = (threshold - profit_per_sqft) * sqft;
        if needed > remaining {
            continue;
        }
        remaining -= needed;
        accepted.push((idx, needed));
    }
    accepted
}

#[derive(Debug, Clone)]
pub struct SubsidizedOfficeAllocator {
    account: String,
    form: Form,
    subaccount: SubaccountId,
    receiving_zone: Option<Formula>,
    settings: AllocationSettings,
}

impl SubsidizedOfficeAllocator {
    pub fn new(account: &str, settings: AllocationSettings) -> Self {
        Self {
            account: account.to_string(),
            form: Form::Office,
            subaccount: SubaccountId::regional(),
            receiving_zone: None,
            settings,
        }
    }

    pub fn with_form(mut self, form: Form) -> Self {
        self.form = form;
        self
    }

    pub fn with_subaccount(mut self, subaccount: SubaccountId) -> Self {
        self.subaccount = subaccount;
        self
    }

    pub fn with_receiving_zone(mut self, formula: Formula) -> Self {
        self.receiving_zone = Some(formula);
        self
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn allocate(
        &self,
        table: &FeasibilityTable,
        parcels: &ParcelTable,
        coffer: &mut Coffer,
        placement: &mut dyn PlacementService,
        year: Year,
    ) -> Result<AllocationOutcome> {
        let threshold = self.settings.normal_office_profit_per_sqft;
        let mut outcome = AllocationOutcome::new(&self.account);

        let mut pool: Vec<(f64, &FeasibilityRecord)> = Vec::new();
        for record in table.for_form(self.form) {
            if !record.has_finite_profit() || record.non_residential_sqft <= 0.0 {
                continue;
            }
            let eligible = match (&self.receiving_zone, parcels.get(record.parcel_id)) {
                (None, _) => true,
                (Some(formula), Some(p)) => formula.matches(p)?,
                (Some(_), None) => false,
            };
            if eligible {
                pool.push((record.max_profit() / record.non_residential_sqft, record));
            }
        }
        if pool.is_empty() {
            info!(policy = %self.account, year, "no office subsidy candidates");
            return Ok(outcome);
        }
        pool.sort_by_key(|(pps, r)| (OrderedFloat(*pps), r.parcel_id));

        let budget = coffer.require(&self.account)?.balance(&self.subaccount);
        let walk: Vec<(f64, f64)> = pool.iter().map(|(pps, r)| (*pps, r.non_residential_sqft)).collect();
        let accepted = walk_office_candidates(&walk, threshold, budget);

        let mut pass = PassSummary {
            subaccount: self.subaccount.clone(),
            budget,
            candidates: pool.len(),
            accepted: accepted.len(),
            built: 0,
            spent: 0.0,
        };
        if accepted.is_empty() {
            outcome.absorb(pass, Vec::new());
            return Ok(outcome);
        }

        // Requested top-up and its rate per sqft
        let mut top_ups: AHashMap<ParcelId, (Money, Money)> = AHashMap::with_capacity(accepted.len());
        let projects: Vec<FeasibilityRecord> = accepted
            .iter()
            .map(|&(idx, needed)| {
                let mut record = pool[idx].1.clone();
                record.adjust_profit(&self.account, needed);
                top_ups.insert(record.parcel_id, (needed, needed / record.non_residential_sqft));
                record
            })
            .collect();

        let request = PlacementRequest {
            form: self.form,
            projects: &projects,
            year,
        };
        let mut buildings = match placement.place(request) {
            Ok(buildings) => buildings,
            Err(PlacementError::InsufficientDemand { form }) => {
                info!(policy = %self.account, %form, "no demand for subsidized projects");
                Vec::new()
            }
            Err(e) => return Err(e.into()),
        };

        let account = coffer.require_mut(&self.account)?;
        for building in &mut buildings {
            let Some(&(requested, per_sqft)) = top_ups.get(&building.parcel_id) else {
                return Err(DevsimError::InvariantViolation(format!(
                    "placement built unrequested {}",
                    building.parcel_id
                )));
            };
            // Pay for the floor area actually built
            let needed = (per_sqft * building.non_residential_sqft).min(requested);
            account.withdraw(
                needed,
                self.subaccount.clone(),
                TransactionMetadata::subsidy(year, &self.account, vec![building.parcel_id]),
            );
            building.subsidized = true;
            building.policy_name = Some(self.account.clone());
            building.subaccount = Some(self.subaccount.clone());
            building.subsidy_amount = needed;
            pass.spent += needed;
        }
        pass.built = buildings.len();

        info!(
            policy = %self.account,
            year,
            budget,
            accepted = pass.accepted,
            built = pass.built,
            spent = pass.spent,
            sqft = buildings.iter().map(|b| b.non_residential_sqft).sum::<f64>(),
            "office subsidy allocated"
        );
        outcome.absorb(pass, buildings);
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::AccountDefinition;
    use crate::allocation::placement::{CapacityPlacement, DemandTargets};

    fn office(parcel: u64, profit_per_sqft: f64, sqft: f64) -> FeasibilityRecord {
        FeasibilityRecord::new(ParcelId(parcel), Form::Office, profit_per_sqft * sqft).with_non_residential(sqft)
    }

    fn placement(sqft: f64) -> CapacityPlacement {
        let mut demand = DemandTargets::default();
        demand.non_residential_sqft.insert(Form::Office, sqft);
        CapacityPlacement::new(demand)
    }

    #[test]
    fn test_walk_skips_unaffordable_and_continues() {
        let accepted = walk_office_candidates(&[(60.0, 1_000.0), (65.0, 500.0)], 70.0, 6_000.0);
        assert_eq!(accepted.len(), 1);
        assert_eq!(accepted[0].0, 1);
        assert!((accepted[0].1 - 2_500.0).abs() < 0.01);
    }

    #[test]
    fn test_walk_skips_market_rate_projects() {
        let accepted = walk_office_candidates(&[(50.0, 100.0), (80.0, 100.0)], 70.0, 1e9);
        assert_eq!(accepted, vec![(0, 2_000.0)]);
    }

    #[test]
    fn test_allocate_tops_up_profit_and_withdraws() {
        let table: FeasibilityTable = vec![office(1, 60.0, 1_000.0), office(2, 65.0, 500.0), office(3, 90.0, 500.0)]
            .into_iter()
            .collect();
        let mut coffer = Coffer::from_definitions(&[AccountDefinition::new("office", 6_000.0)], 2025).unwrap();
        let allocator = SubsidizedOfficeAllocator::new("office", AllocationSettings::default());

        let outcome = allocator
            .allocate(&table, &ParcelTable::new(), &mut coffer, &mut placement(10_000.0), 2025)
            .unwrap();

        assert_eq!(outcome.buildings.len(), 1);
        let building = &outcome.buildings[0];
        assert_eq!(building.parcel_id, ParcelId(2));
        assert!(building.subsidized);
        // Profit per sqft lifted to the threshold
        assert!((building.max_profit / building.non_residential_sqft - 70.0).abs() < 0.01);
        let balance = coffer.require("office").unwrap().balance(&SubaccountId::regional());
        assert!((balance - 3_500.0).abs() < 0.01);
    }

    #[test]
    fn test_unplaced_projects_cost_nothing() {
        let table: FeasibilityTable = vec![office(1, 60.0, 100.0)].into_iter().collect();
        let mut coffer = Coffer::from_definitions(&[AccountDefinition::new("office", 6_000.0)], 2025).unwrap();
        let allocator = SubsidizedOfficeAllocator::new("office", AllocationSettings::default());

        let outcome = allocator
            .allocate(&table, &ParcelTable::new(), &mut coffer, &mut CapacityPlacement::default(), 2025)
            .unwrap();
        assert!(outcome.is_empty());
        assert!((coffer.require("office").unwrap().total_balance() - 6_000.0).abs() < 0.01);
    }

    struct HalfFloorArea;

    impl PlacementService for HalfFloorArea {
        fn place(&mut self, request: PlacementRequest<'_>) -> std::result::Result<Vec<crate::allocation::NewBuilding>, PlacementError> {
            Ok(request
                .projects
                .iter()
                .map(|record| {
                    let mut b = crate::allocation::NewBuilding::from_record(crate::core::types::BuildingId(1), record, request.year);
                    b.non_residential_sqft /= 2.0;
                    b.max_profit /= 2.0;
                    b
                })
                .collect())
        }
    }

    #[test]
    fn test_smaller_building_pays_for_built_floor_area() {
        // 10/sqft short on 1000 sqft requested, 500 sqft built
        let table: FeasibilityTable = vec![office(1, 60.0, 1_000.0)].into_iter().collect();
        let mut coffer = Coffer::from_definitions(&[AccountDefinition::new("office", 20_000.0)], 2025).unwrap();
        let allocator = SubsidizedOfficeAllocator::new("office", AllocationSettings::default());

        let outcome = allocator
            .allocate(&table, &ParcelTable::new(), &mut coffer, &mut HalfFloorArea, 2025)
            .unwrap();

        assert!((outcome.buildings[0].subsidy_amount - 5_000.0).abs() < 0.01);
        assert!((outcome.total_subsidy - 5_000.0).abs() < 0.01);
        assert!((coffer.require("office").unwrap().total_balance() - 15_000.0).abs() < 0.01);
    }
}
