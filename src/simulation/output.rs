//! Run output and serialization

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::accounts::{Coffer, Transaction};
use crate::allocation::NewBuilding;
use crate::core::types::Money;
use crate::simulation::report::YearReport;

/// Complete run output
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunOutput {
    pub reports: Vec<YearReport>,
    pub buildings: Vec<NewBuilding>,
    pub ledgers: Vec<AccountLedger>,
    pub statistics: RunStats,
}

/// One account's full transaction log
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AccountLedger {
    pub account: String,
    pub balance: Money,
    pub transactions: Vec<Transaction>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunStats {
    pub years_simulated: u32,
    pub simulation_time_ms: u64,
    pub total_subsidy: Money,
    pub total_fee_revenue: Money,
    pub subsidized_buildings: u32,
    pub subsidized_units: u32,
    pub deed_restricted_units: u32,
    pub market_buildings: u32,
}

impl RunOutput {
    pub fn new(reports: Vec<YearReport>, buildings: Vec<NewBuilding>, coffer: &Coffer, elapsed: Duration) -> Self {
        let subsidized: Vec<&NewBuilding> = buildings.iter().filter(|b| b.subsidized).collect();
        let statistics = RunStats {
            years_simulated: reports.len() as u32,
            simulation_time_ms: elapsed.as_millis() as u64,
            total_subsidy: reports.iter().map(|r| r.subsidy_spent()).sum(),
            total_fee_revenue: reports.iter().map(|r| r.fee_revenue()).sum(),
            subsidized_buildings: subsidized.len() as u32,
            subsidized_units: subsidized.iter().map(|b| b.residential_units).sum(),
            deed_restricted_units: subsidized.iter().map(|b| b.deed_restricted_units).sum(),
            market_buildings: (buildings.len() - subsidized.len()) as u32,
        };
        let ledgers = coffer
            .iter()
            .map(|account| AccountLedger {
                account: account.name.clone(),
                balance: account.total_balance(),
                transactions: account.transactions().to_vec(),
            })
            .collect();

        Self {
            reports,
            buildings,
            ledgers,
            statistics,
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(&self).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn summary(&self) -> String {
        format!(
            "Simulated {} years in {}ms\n{:.0} subsidy for {} units ({} deed-restricted), {:.0} fees collected, {} market buildings",
            self.statistics.years_simulated,
            self.statistics.simulation_time_ms,
            self.statistics.total_subsidy,
            self.statistics.subsidized_units,
            self.statistics.deed_restricted_units,
            self.statistics.total_fee_revenue,
            self.statistics.market_buildings,
        )
    }
}
