//! Subsidized residential allocation
//!
//! Unprofitable housing projects are ranked by subsidy per unit and funded
//! greedily: for each subaccount the cheapest-per-unit projects are taken
//! while the running total of their losses stays within the balance. Each
//! funded building can mint deed-restricted units in proportion to the
//! subsidy it received.

use ahash::AHashSet;
use ordered_float::OrderedFloat;
use tracing::{debug, info, warn};

use crate::accounts::{Coffer, TransactionMetadata};
use crate::allocation::outcome::{AllocationOutcome, PassSummary};
use crate::allocation::placement::{NewBuilding, PlacementError, PlacementRequest, PlacementService};
use crate::core::config::AllocationSettings;
use crate::core::error::{DevsimError, Result};
use crate::core::types::{Form, Money, ParcelId, SubaccountId, Year};
use crate::expression::{Formula, Value};
use crate::feasibility::{FeasibilityRecord, FeasibilityTable, ParcelTable};

/// Balances below this are treated as overdrawn
const BALANCE_TOLERANCE: Money = 1e-6;

/// Length of the longest prefix of `costs` whose running sum stays within `budget`
///
/// `costs` must be positive so the running sum is increasing.
pub fn prefix_within_budget(costs: &[Money], budget: Money) -> usize {
    if budget <= 0.0 {
        return 0;
    }
    let cumulative: Vec<Money> = costs
        .iter()
        .scan(0.0, |total, cost| {
            *total += cost;
            Some(*total)
        })
        .collect();
    cumulative.partition_point(|&total| total <= budget)
}

/// Fractional deed-restricted credit carried between buildings of one pass
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CarryOver {
    remainder: f64,
}

impl CarryOver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn remainder(&self) -> f64 {
        self.remainder
    }

    /// Whole units bought by a subsidy, keeping the fraction for the next building
    pub fn mint(&mut self, total_subsidy: Money, revenue_per_unit: Money) -> u32 {
        if !(revenue_per_unit > 0.0) || !(total_subsidy > 0.0) {
            return 0;
        }
        let raw = total_subsidy / revenue_per_unit + self.remainder;
        let whole = raw.floor();
        self.remainder = raw - whole;
        whole as u32
    }
}

#[derive(Debug, Clone)]
struct Candidate {
    record: FeasibilityRecord,
    subsidy: Money,
    subsidy_per_unit: Money,
    subaccount: SubaccountId,
}

#[derive(Debug, Clone)]
pub struct SubsidizedResidentialAllocator {
    account: String,
    receiving_zone: Option<Formula>,
    subaccount_formula: Option<Formula>,
    settings: AllocationSettings,
}

impl SubsidizedResidentialAllocator {
    pub fn new(account: &str, settings: AllocationSettings) -> Self {
        Self {
            account: account.to_string(),
            receiving_zone: None,
            subaccount_formula: None,
            settings,
        }
    }

    /// Only parcels matching the formula can receive subsidy
    pub fn with_receiving_zone(mut self, formula: Formula) -> Self {
        self.receiving_zone = Some(formula);
        self
    }

    /// Formula naming the subaccount that pays for each parcel
    pub fn with_subaccount_formula(mut self, formula: Formula) -> Self {
        self.subaccount_formula = Some(formula);
        self
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    fn candidates(&self, table: &FeasibilityTable, parcels: &ParcelTable) -> Result<Vec<Candidate>> {
        let mut dropped = 0usize;
        let mut candidates = Vec::new();

        for record in table.for_form(Form::Residential) {
            if !record.has_finite_profit() {
                dropped += 1;
                continue;
            }
            let profit = record.max_profit();
            if profit >= 0.0 {
                continue;
            }
            let units = record.residential_units();
            if units <= record.total_residential_units {
                continue;
            }
            if profit < -self.settings.max_subsidy_per_project {
                debug!(parcel = %record.parcel_id, profit, "loss above project cap");
                continue;
            }

            let parcel = parcels.get(record.parcel_id);
            let eligible = match (&self.receiving_zone, parcel) {
                (None, _) => true,
                (Some(formula), Some(p)) => formula.matches(p)?,
                (Some(_), None) => false,
            };
            if !eligible {
                continue;
            }
            let subaccount = match (&self.subaccount_formula, parcel) {
                (Some(formula), Some(p)) => subaccount_from(formula.evaluate(p)?),
                _ => SubaccountId::regional(),
            };

            let subsidy = -profit;
            candidates.push(Candidate {
                record: record.clone(),
                subsidy,
                subsidy_per_unit: (subsidy / units as f64).max(self.settings.min_subsidy_per_unit),
                subaccount,
            });
        }

        if dropped > 0 {
            warn!(policy = %self.account, dropped, "records with non-finite profit dropped");
        }
        Ok(candidates)
    }

    /// Fund and build unprofitable housing from every funded subaccount
    pub fn allocate(
        &self,
        table: &FeasibilityTable,
        parcels: &ParcelTable,
        coffer: &mut Coffer,
        placement: &mut dyn PlacementService,
        year: Year,
    ) -> Result<AllocationOutcome> {
        let mut outcome = AllocationOutcome::new(&self.account);
        let candidates = self.candidates(table, parcels)?;
        if candidates.is_empty() {
            info!(policy = %self.account, year, "no residential subsidy candidates");
            return Ok(outcome);
        }

        let funded: Vec<SubaccountId> = coffer
            .require(&self.account)?
            .iterate_subaccounts()
            .map(|(sub, _)| sub)
            .collect();

        for subaccount in funded {
            let mut pool: Vec<&Candidate> =
                candidates.iter().filter(|c| c.subaccount == subaccount).collect();
            if pool.is_empty() {
                continue;
            }
            let budget = coffer.require(&self.account)?.balance(&subaccount);
            let (pass, buildings) = self.run_pass(&mut pool, &subaccount, budget, coffer, placement, year)?;
            outcome.absorb(pass, buildings);
        }

        info!(
            policy = %self.account,
            year,
            spent = outcome.total_subsidy,
            units = outcome.units,
            buildings = outcome.buildings.len(),
            "residential subsidy allocated"
        );
        Ok(outcome)
    }

    fn run_pass(
        &self,
        pool: &mut [&Candidate],
        subaccount: &SubaccountId,
        budget: Money,
        coffer: &mut Coffer,
        placement: &mut dyn PlacementService,
        year: Year,
    ) -> Result<(PassSummary, Vec<NewBuilding>)> {
        pool.sort_by_key(|c| (OrderedFloat(c.subsidy_per_unit), c.record.parcel_id));
        let costs: Vec<Money> = pool.iter().map(|c| c.subsidy).collect();
        let accepted = prefix_within_budget(&costs, budget);

        let mut pass = PassSummary {
            subaccount: subaccount.clone(),
            budget,
            candidates: pool.len(),
            accepted,
            built: 0,
            spent: 0.0,
        };
        if accepted == 0 {
            debug!(policy = %self.account, subaccount = %subaccount, budget, "nothing affordable");
            return Ok((pass, Vec::new()));
        }

        let projects: Vec<FeasibilityRecord> = pool[..accepted].iter().map(|c| c.record.clone()).collect();
        let requested: AHashSet<ParcelId> = pool[..accepted].iter().map(|c| c.record.parcel_id).collect();

        let request = PlacementRequest {
            form: Form::Residential,
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
        let mut carry = CarryOver::new();
        for building in &mut buildings {
            if !requested.contains(&building.parcel_id) {
                return Err(DevsimError::InvariantViolation(format!(
                    "placement built unrequested {}",
                    building.parcel_id
                )));
            }
            // The placed building may be smaller than the requested project
            let subsidy = (-building.max_profit).max(0.0);
            account.withdraw(
                subsidy,
                subaccount.clone(),
                TransactionMetadata::subsidy(year, &self.account, vec![building.parcel_id]),
            );
            let balance = account.balance(subaccount);
            if balance < -BALANCE_TOLERANCE {
                return Err(DevsimError::InvariantViolation(format!(
                    "{}/{} overdrawn to {:.2}",
                    self.account, subaccount, balance
                )));
            }

            if self.settings.mint_deed_restricted_units {
                let minted = building
                    .revenue_per_unit()
                    .map(|rpu| carry.mint(subsidy, rpu))
                    .unwrap_or(0);
                let affordable = (minted + building.deed_restricted_units).min(building.residential_units);
                building.subsidized_units = affordable.saturating_sub(building.deed_restricted_units);
                building.deed_restricted_units = affordable;
            }

            building.subsidized = true;
            building.policy_name = Some(self.account.clone());
            building.subaccount = Some(subaccount.clone());
            building.subsidy_amount = subsidy;
            pass.spent += subsidy;
        }
        pass.built = buildings.len();

        debug!(
            policy = %self.account,
            subaccount = %subaccount,
            budget,
            accepted,
            built = pass.built,
            spent = pass.spent,
            carry = carry.remainder(),
            "subaccount pass complete"
        );
        Ok((pass, buildings))
    }
}

/// Subaccount named by a formula value; numbers are written without decimals
fn subaccount_from(value: Value) -> SubaccountId {
    match value {
        Value::Text(s) => SubaccountId(s),
        Value::Number(n) => SubaccountId(format!("{:.0}", n)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::AccountDefinition;
    use crate::allocation::placement::{CapacityPlacement, DemandTargets};
    use crate::feasibility::ParcelAttributes;

    fn project(parcel: u64, loss: Money, units: u32) -> FeasibilityRecord {
        FeasibilityRecord::new(ParcelId(parcel), Form::Residential, -loss)
            .with_residential(units as f64 * 1_000.0, 1_000.0)
            .with_finances(0.0, units as f64 * 300_000.0)
    }

    fn demand() -> CapacityPlacement {
        CapacityPlacement::new(DemandTargets { residential_units: 1_000, ..Default::default() })
    }

    #[test]
    fn test_prefix_within_budget() {
        assert_eq!(prefix_within_budget(&[40.0, 50.0, 80.0], 200.0), 3);
        assert_eq!(prefix_within_budget(&[40.0, 50.0, 80.0], 170.0), 3);
        assert_eq!(prefix_within_budget(&[40.0, 50.0, 80.0], 169.0), 2);
        assert_eq!(prefix_within_budget(&[40.0, 50.0, 80.0], 39.0), 0);
        assert_eq!(prefix_within_budget(&[40.0], 0.0), 0);
        assert_eq!(prefix_within_budget(&[], 100.0), 0);
    }

    #[test]
    fn test_carry_over_accumulates_fractions() {
        let mut carry = CarryOver::new();
        assert_eq!(carry.mint(150.0, 100.0), 1);
        assert!((carry.remainder() - 0.5).abs() < 1e-9);
        assert_eq!(carry.mint(150.0, 100.0), 2);
        assert!(carry.remainder().abs() < 1e-9);
        assert_eq!(carry.mint(10.0, 0.0), 0);
    }

    #[test]
    fn test_greedy_selection_by_subsidy_per_unit() {
        let table: FeasibilityTable = vec![project(1, 50_000.0, 1), project(2, 40_000.0, 2), project(3, 80_000.0, 1)]
            .into_iter()
            .collect();
        let mut coffer = Coffer::from_definitions(&[AccountDefinition::new("housing", 100_000.0)], 2025).unwrap();
        let allocator = SubsidizedResidentialAllocator::new("housing", AllocationSettings::default());

        let outcome = allocator
            .allocate(&table, &ParcelTable::new(), &mut coffer, &mut demand(), 2025)
            .unwrap();

        // 20k/unit then 50k/unit fit in 100k; the 80k project does not
        let parcels: Vec<_> = outcome.buildings.iter().map(|b| b.parcel_id).collect();
        assert_eq!(parcels, vec![ParcelId(2), ParcelId(1)]);
        assert!((outcome.total_subsidy - 90_000.0).abs() < 0.01);
        assert_eq!(outcome.units, 3);
        let balance = coffer.require("housing").unwrap().balance(&SubaccountId::regional());
        assert!((balance - 10_000.0).abs() < 0.01);
        assert!(outcome.buildings.iter().all(|b| b.subsidized && b.policy_name.as_deref() == Some("housing")));
    }

    #[test]
    fn test_filters_profitable_replacement_and_oversized() {
        let settings = AllocationSettings {
            max_subsidy_per_project: 60_000.0,
            ..Default::default()
        };
        let table: FeasibilityTable = vec![
            FeasibilityRecord::new(ParcelId(1), Form::Residential, 5_000.0).with_residential(2_000.0, 1_000.0),
            project(2, 10_000.0, 2).with_existing_units(2),
            project(3, 70_000.0, 4),
            FeasibilityRecord::new(ParcelId(4), Form::Residential, f64::NEG_INFINITY).with_residential(2_000.0, 1_000.0),
            project(5, 10_000.0, 2).with_existing_units(1),
        ]
        .into_iter()
        .collect();
        let mut coffer = Coffer::from_definitions(&[AccountDefinition::new("housing", 1_000_000.0)], 2025).unwrap();
        let allocator = SubsidizedResidentialAllocator::new("housing", settings);

        let outcome = allocator
            .allocate(&table, &ParcelTable::new(), &mut coffer, &mut demand(), 2025)
            .unwrap();
        let parcels: Vec<_> = outcome.buildings.iter().map(|b| b.parcel_id).collect();
        assert_eq!(parcels, vec![ParcelId(5)]);
    }

    #[test]
    fn test_receiving_zone_and_subaccounts() {
        let table: FeasibilityTable = vec![project(1, 30_000.0, 1), project(2, 30_000.0, 1), project(3, 30_000.0, 1)]
            .into_iter()
            .collect();
        let parcels: ParcelTable = vec![
            ParcelAttributes::new(ParcelId(1), "oakland", "alameda").with_value("tra", 1.0),
            ParcelAttributes::new(ParcelId(2), "berkeley", "alameda").with_value("tra", 1.0),
            ParcelAttributes::new(ParcelId(3), "oakland", "alameda").with_value("tra", 0.0),
        ]
        .into_iter()
        .collect();
        let mut def = AccountDefinition::new("housing", 0.0);
        def.starting_subaccounts = vec![
            crate::accounts::SubaccountDeposit { subaccount: "oakland".into(), amount: 50_000.0 },
            crate::accounts::SubaccountDeposit { subaccount: "berkeley".into(), amount: 10_000.0 },
        ];
        let mut coffer = Coffer::from_definitions(&[def], 2025).unwrap();
        let allocator = SubsidizedResidentialAllocator::new("housing", AllocationSettings::default())
            .with_receiving_zone(Formula::compile("zone", "tra == 1").unwrap())
            .with_subaccount_formula(Formula::compile("sub", "jurisdiction").unwrap());

        let outcome = allocator
            .allocate(&table, &parcels, &mut coffer, &mut demand(), 2025)
            .unwrap();

        // Berkeley cannot afford its project; parcel 3 is outside the zone
        assert_eq!(outcome.buildings.len(), 1);
        assert_eq!(outcome.buildings[0].parcel_id, ParcelId(1));
        assert_eq!(outcome.buildings[0].subaccount, Some(SubaccountId::from("oakland")));
        assert_eq!(outcome.passes.len(), 2);
        let account = coffer.require("housing").unwrap();
        assert!((account.balance(&"oakland".into()) - 20_000.0).abs() < 0.01);
        assert!((account.balance(&"berkeley".into()) - 10_000.0).abs() < 0.01);
    }

    #[test]
    fn test_mints_deed_restricted_units_with_carry_over() {
        // Revenue 300k per unit: 450k subsidy buys 1.5 units each
        let table: FeasibilityTable = vec![project(1, 450_000.0, 10), project(2, 450_000.0, 10)]
            .into_iter()
            .collect();
        let mut coffer = Coffer::from_definitions(&[AccountDefinition::new("housing", 1_000_000.0)], 2025).unwrap();
        let allocator = SubsidizedResidentialAllocator::new("housing", AllocationSettings::default());

        let outcome = allocator
            .allocate(&table, &ParcelTable::new(), &mut coffer, &mut demand(), 2025)
            .unwrap();
        let minted: Vec<_> = outcome.buildings.iter().map(|b| b.deed_restricted_units).collect();
        assert_eq!(minted, vec![1, 2]);
        assert_eq!(outcome.deed_restricted_units(), 3);
    }

    #[test]
    fn test_no_demand_is_silent() {
        let table: FeasibilityTable = vec![project(1, 10_000.0, 1)].into_iter().collect();
        let mut coffer = Coffer::from_definitions(&[AccountDefinition::new("housing", 100_000.0)], 2025).unwrap();
        let allocator = SubsidizedResidentialAllocator::new("housing", AllocationSettings::default());
        let mut placement = CapacityPlacement::default();

        let outcome = allocator
            .allocate(&table, &ParcelTable::new(), &mut coffer, &mut placement, 2025)
            .unwrap();
        assert!(outcome.is_empty());
        assert_eq!(coffer.require("housing").unwrap().transactions().len(), 1);
    }

    /// Builds every requested project at half its size
    struct HalfSize;

    impl PlacementService for HalfSize {
        fn place(&mut self, request: PlacementRequest<'_>) -> std::result::Result<Vec<NewBuilding>, PlacementError> {
            Ok(request
                .projects
                .iter()
                .enumerate()
                .map(|(i, record)| {
                    let mut b = NewBuilding::from_record(crate::core::types::BuildingId(i as u64 + 1), record, request.year);
                    b.residential_units /= 2;
                    b.max_profit /= 2.0;
                    b.building_revenue /= 2.0;
                    b
                })
                .collect())
        }
    }

    #[test]
    fn test_smaller_building_is_charged_its_own_loss() {
        // Requested: 10 units losing 900k; built: 5 units losing 450k
        let table: FeasibilityTable = vec![project(1, 900_000.0, 10)].into_iter().collect();
        let mut coffer = Coffer::from_definitions(&[AccountDefinition::new("housing", 1_000_000.0)], 2025).unwrap();
        let allocator = SubsidizedResidentialAllocator::new("housing", AllocationSettings::default());

        let outcome = allocator
            .allocate(&table, &ParcelTable::new(), &mut coffer, &mut HalfSize, 2025)
            .unwrap();

        let building = &outcome.buildings[0];
        assert!((building.subsidy_amount - 450_000.0).abs() < 0.01);
        assert!((outcome.total_subsidy - 450_000.0).abs() < 0.01);
        assert!((outcome.passes[0].spent - 450_000.0).abs() < 0.01);
        // 450k at 300k per unit mints one unit, not three
        assert_eq!(building.deed_restricted_units, 1);
        let balance = coffer.require("housing").unwrap().balance(&SubaccountId::regional());
        assert!((balance - 550_000.0).abs() < 0.01);
    }

    #[test]
    fn test_numeric_subaccount_has_no_decimals() {
        assert_eq!(subaccount_from(Value::Number(7.0)), SubaccountId::from("7"));
        assert_eq!(subaccount_from(Value::Text("x".into())), SubaccountId::from("x"));
    }
}
