//! Scenario inputs: loaded from JSON or generated from a seed

use std::path::Path;

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::allocation::{CapacityPlacement, DemandTargets};
use crate::core::error::Result;
use crate::core::types::{Form, ParcelId, Year};
use crate::feasibility::{FeasibilityRecord, FeasibilityTable, ParcelAttributes, ParcelTable};
use crate::policy::{apply_pct, HouseholdIncomes};
use crate::rules::CompiledStrategy;
use crate::simulation::engine::{DevelopmentSimulation, SimulationOptions, YearInputs};
use crate::simulation::output::RunOutput;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub start_year: Year,
    /// Demand available to the placement service every year
    #[serde(default)]
    pub demand: DemandTargets,
    pub years: Vec<YearInputs>,
}

/// Parameters for a generated scenario
#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    pub seed: u64,
    pub parcels: u32,
    pub years: u32,
    pub start_year: Year,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            seed: 12345,
            parcels: 500,
            years: 5,
            start_year: 2025,
        }
    }
}

const JURISDICTIONS: [(&str, &str); 4] = [
    ("oakland", "alameda"),
    ("berkeley", "alameda"),
    ("san_jose", "santa_clara"),
    ("novato", "marin"),
];

const VMT_CATEGORIES: [&str; 4] = ["S", "M", "H", "VH"];

impl Scenario {
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Random parcels with drifting profit estimates, reproducible from the seed
    pub fn synthetic(config: &SyntheticConfig) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);

        let parcels: Vec<ParcelAttributes> = (1..=config.parcels as u64)
            .map(|id| {
                let (juris, county) = *JURISDICTIONS.choose(&mut rng).unwrap_or(&JURISDICTIONS[0]);
                let vmt = *VMT_CATEGORIES.choose(&mut rng).unwrap_or(&"M");
                ParcelAttributes::new(ParcelId(id), juris, county)
                    .with_label("juris", juris)
                    .with_label("vmt_res_cat", vmt)
                    .with_label("vmt_nonres_cat", vmt)
                    .with_value("tra_id", if rng.gen_bool(0.3) { rng.gen_range(1..40) as f64 } else { 0.0 })
                    .with_value("hra", if rng.gen_bool(0.25) { 1.0 } else { 0.0 })
                    .with_value("land_value_per_sqft", rng.gen_range(10.0..400.0))
                    .with_value("parking_ratio", rng.gen_range(0.5..2.0))
            })
            .collect();

        let mut incomes = HouseholdIncomes::new();
        for (juris, _) in JURISDICTIONS {
            let median = rng.gen_range(70_000.0..160_000.0);
            let samples = (0..200).map(|_| median * rng.gen_range(0.2..2.5)).collect();
            incomes.insert(juris, samples);
        }

        // Base pro forma per parcel, drifted each year
        let base: Vec<(FeasibilityRecord, FeasibilityRecord)> = parcels
            .iter()
            .map(|p| {
                let ave = rng.gen_range(700.0..1_200.0);
                let units = rng.gen_range(2..120) as f64;
                let revenue = units * rng.gen_range(350_000.0..900_000.0);
                let residential = FeasibilityRecord::new(p.parcel_id, Form::Residential, revenue * rng.gen_range(-0.25..0.1))
                    .with_residential(units * ave, ave)
                    .with_finances(revenue * 0.9, revenue)
                    .with_existing_units(if rng.gen_bool(0.2) { rng.gen_range(1..4) } else { 0 });
                let sqft = rng.gen_range(5_000.0..150_000.0);
                let office = FeasibilityRecord::new(p.parcel_id, Form::Office, sqft * rng.gen_range(20.0..110.0))
                    .with_non_residential(sqft)
                    .with_finances(sqft * 500.0, sqft * 560.0);
                (residential, office)
            })
            .collect();

        let parcel_table: ParcelTable = parcels.into_iter().collect();
        let years = (0..config.years)
            .map(|offset| {
                let drift = 1.0 + 0.03 * offset as f64;
                let feasibility: FeasibilityTable = base
                    .iter()
                    .flat_map(|(r, o)| [r.clone(), o.clone()])
                    .map(|record| {
                        let profit = apply_pct(record.base_profit(), drift - 1.0);
                        rebase(record, profit)
                    })
                    .collect();
                YearInputs {
                    year: config.start_year + offset,
                    feasibility,
                    parcels: parcel_table.clone(),
                    incomes: incomes.clone(),
                    market_buildings: Vec::new(),
                }
            })
            .collect();

        let units = (config.parcels / 4).max(1) * 40;
        let mut demand = DemandTargets {
            residential_units: units,
            ..Default::default()
        };
        demand.non_residential_sqft.insert(Form::Office, config.parcels as f64 * 4_000.0);

        Self {
            start_year: config.start_year,
            demand,
            years,
        }
    }

    /// Run every year against a capacity-limited placement service
    pub fn run(self, strategy: CompiledStrategy, options: SimulationOptions) -> Result<RunOutput> {
        let placement = CapacityPlacement::new(self.demand.clone());
        let mut sim = DevelopmentSimulation::new(strategy, placement, self.start_year)?.with_options(options);
        for inputs in self.years {
            sim.placement_mut().reset_year(self.demand.clone());
            sim.run_year(inputs)?;
        }
        Ok(sim.finish())
    }
}

fn rebase(record: FeasibilityRecord, profit: f64) -> FeasibilityRecord {
    FeasibilityRecord::new(record.parcel_id, record.form, profit)
        .with_residential(record.residential_sqft, record.ave_sqft_per_unit)
        .with_non_residential(record.non_residential_sqft)
        .with_finances(record.total_cost, record.building_revenue)
        .with_existing_units(record.total_residential_units)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_is_reproducible() {
        let config = SyntheticConfig { parcels: 20, years: 2, ..Default::default() };
        let a = Scenario::synthetic(&config);
        let b = Scenario::synthetic(&config);
        assert_eq!(a.years.len(), 2);
        assert_eq!(a.years[0].feasibility, b.years[0].feasibility);
        assert_eq!(a.years[1].year, 2026);
        assert_eq!(a.years[0].feasibility.len(), 40);
        assert_eq!(a.years[0].parcels.len(), 20);
    }

    #[test]
    fn test_scenario_json_roundtrip_of_inputs() {
        let config = SyntheticConfig { parcels: 3, years: 1, ..Default::default() };
        let scenario = Scenario::synthetic(&config);
        let json = serde_json::to_string(&scenario).unwrap();
        let back: Scenario = serde_json::from_str(&json).unwrap();
        assert_eq!(back.years[0].parcels.len(), 3);
        assert_eq!(back.demand, scenario.demand);
    }
}
