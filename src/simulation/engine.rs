//! Main simulation loop
//!
//! Each year runs to completion before the next: periodic deposits, policy
//! modification of the unmodified feasibility table, fees on the previous
//! year's market-rate buildings, then every subsidy program in its
//! configured order. Market-rate buildings of a year are only charged at the
//! start of the next one, so fee revenue never funds same-year subsidy.

use std::time::Instant;

use ahash::AHashSet;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::accounts::Coffer;
use crate::allocation::{NewBuilding, PlacementError, PlacementRequest, PlacementService};
use crate::core::error::{DevsimError, Result};
use crate::core::types::{Form, ParcelId, Year};
use crate::feasibility::{FeasibilityRecord, FeasibilityTable, ParcelTable};
use crate::policy::HouseholdIncomes;
use crate::rules::CompiledStrategy;
use crate::simulation::output::RunOutput;
use crate::simulation::report::{AllocationSummary, YearReport};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationOptions {
    /// Build profitable projects through the placement service after the
    /// subsidy programs have run
    pub place_market_projects: bool,
}

impl Default for SimulationOptions {
    fn default() -> Self {
        Self {
            place_market_projects: true,
        }
    }
}

/// Everything one simulated year reads
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct YearInputs {
    pub year: Year,
    /// Unmodified pro forma results
    pub feasibility: FeasibilityTable,
    pub parcels: ParcelTable,
    #[serde(default)]
    pub incomes: HouseholdIncomes,
    /// Market-rate buildings completed this year by an outside model
    #[serde(default)]
    pub market_buildings: Vec<NewBuilding>,
}

/// Explicit run context: strategy, accounts and placement, no globals
pub struct DevelopmentSimulation<P: PlacementService> {
    strategy: CompiledStrategy,
    coffer: Coffer,
    placement: P,
    options: SimulationOptions,
    developed: AHashSet<ParcelId>,
    /// Market-rate buildings waiting to be charged fees next year
    pending_fees: Vec<NewBuilding>,
    buildings: Vec<NewBuilding>,
    reports: Vec<YearReport>,
    last_year: Option<Year>,
    started: Instant,
}

impl<P: PlacementService> DevelopmentSimulation<P> {
    pub fn new(strategy: CompiledStrategy, placement: P, start_year: Year) -> Result<Self> {
        let coffer = Coffer::from_definitions(&strategy.accounts, start_year)?;
        Ok(Self {
            strategy,
            coffer,
            placement,
            options: SimulationOptions::default(),
            developed: AHashSet::new(),
            pending_fees: Vec::new(),
            buildings: Vec::new(),
            reports: Vec::new(),
            last_year: None,
            started: Instant::now(),
        })
    }

    pub fn with_options(mut self, options: SimulationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn coffer(&self) -> &Coffer {
        &self.coffer
    }

    pub fn placement_mut(&mut self) -> &mut P {
        &mut self.placement
    }

    /// Building inventory so far
    pub fn buildings(&self) -> &[NewBuilding] {
        &self.buildings
    }

    pub fn reports(&self) -> &[YearReport] {
        &self.reports
    }

    /// Run one year to completion
    pub fn run_year(&mut self, inputs: YearInputs) -> Result<YearReport> {
        let YearInputs {
            year,
            feasibility,
            mut parcels,
            incomes,
            market_buildings,
        } = inputs;
        if let Some(last) = self.last_year {
            if year <= last {
                return Err(DevsimError::Config(format!(
                    "year {} does not follow {}",
                    year, last
                )));
            }
        }
        self.last_year = Some(year);

        let periodic_deposits = self.coffer.apply_periodic_deposits(year);

        let modified = self.strategy.pipeline.apply(&feasibility, &mut parcels, &incomes)?;

        let pending = std::mem::take(&mut self.pending_fees);
        let fee_deposits = self
            .strategy
            .fee_engine
            .assess(&pending, &parcels, &mut self.coffer, year)?;

        let mut allocations = Vec::with_capacity(self.strategy.programs.len());
        for program in &self.strategy.programs {
            let available = undeveloped(&modified.table, &self.developed);
            let outcome = program.allocate(&available, &parcels, &mut self.coffer, &mut self.placement, year)?;
            allocations.push(AllocationSummary::from(&outcome));
            self.developed.extend(outcome.buildings.iter().map(|b| b.parcel_id));
            self.buildings.extend(outcome.buildings);
        }

        let mut market = market_buildings;
        if self.options.place_market_projects {
            let available = undeveloped(&modified.table, &self.developed);
            market.extend(self.place_market(&available, year)?);
        }
        let market_units = market.iter().map(|b| b.net_units()).sum();
        let market_count = market.len();
        self.developed.extend(market.iter().map(|b| b.parcel_id));
        self.buildings.extend(market.iter().cloned());
        self.pending_fees = market;

        let report = YearReport {
            year,
            periodic_deposits,
            modifiers: modified.summaries,
            fee_deposits,
            allocations,
            market_buildings: market_count,
            market_units,
            balances: self.coffer.summary(),
        };
        info!("{}", report.summary());
        self.reports.push(report.clone());
        Ok(report)
    }

    /// Run a sequence of years and collect the output
    pub fn run(mut self, years: impl IntoIterator<Item = YearInputs>) -> Result<RunOutput> {
        for inputs in years {
            self.run_year(inputs)?;
        }
        Ok(self.finish())
    }

    pub fn finish(self) -> RunOutput {
        RunOutput::new(self.reports, self.buildings, &self.coffer, self.started.elapsed())
    }

    /// Most profitable market-feasible projects first, form by form
    fn place_market(&mut self, table: &FeasibilityTable, year: Year) -> Result<Vec<NewBuilding>> {
        let mut built = Vec::new();
        for form in Form::ALL {
            let mut projects: Vec<FeasibilityRecord> = table
                .for_form(form)
                .filter(|r| r.has_finite_profit() && r.is_market_feasible())
                .filter(|r| !built.iter().any(|b: &NewBuilding| b.parcel_id == r.parcel_id))
                .cloned()
                .collect();
            if projects.is_empty() {
                continue;
            }
            projects.sort_by_key(|r| (std::cmp::Reverse(OrderedFloat(r.max_profit())), r.parcel_id));

            let request = PlacementRequest {
                form,
                projects: &projects,
                year,
            };
            match self.placement.place(request) {
                Ok(buildings) => built.extend(buildings),
                Err(PlacementError::InsufficientDemand { .. }) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(built)
    }
}

fn undeveloped(table: &FeasibilityTable, developed: &AHashSet<ParcelId>) -> FeasibilityTable {
    table
        .iter()
        .filter(|r| !developed.contains(&r.parcel_id))
        .cloned()
        .collect()
}
