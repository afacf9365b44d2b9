//! Fee assessment on completed market-rate projects
//!
//! Fees collected here only enlarge balances for later allocation passes;
//! the engine is never run between the allocators of the year it charges.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::accounts::{Coffer, TransactionMetadata};
use crate::allocation::placement::NewBuilding;
use crate::core::error::Result;
use crate::core::types::{Money, SubaccountId, Year};
use crate::feasibility::ParcelTable;
use crate::revenue::schedule::FeeSchedule;

/// One deposit made by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeDeposit {
    /// Schedules that contributed to the deposit
    pub schedules: Vec<String>,
    pub account: String,
    pub subaccount: SubaccountId,
    pub amount: Money,
    pub projects: usize,
}

#[derive(Debug, Clone, Default)]
pub struct FeeAssessmentEngine {
    schedules: Vec<FeeSchedule>,
}

impl FeeAssessmentEngine {
    pub fn new(schedules: Vec<FeeSchedule>) -> Self {
        Self {
            schedules: schedules.into_iter().filter(|s| s.enabled).collect(),
        }
    }

    pub fn schedules(&self) -> &[FeeSchedule] {
        &self.schedules
    }

    /// Charge fees on the non-subsidized buildings and deposit one
    /// transaction per account and subaccount
    pub fn assess(
        &self,
        buildings: &[NewBuilding],
        parcels: &ParcelTable,
        coffer: &mut Coffer,
        year: Year,
    ) -> Result<Vec<FeeDeposit>> {
        // Keyed by (account, subaccount) in first-seen order
        let mut deposits: Vec<FeeDeposit> = Vec::new();
        let mut index: AHashMap<(String, SubaccountId), usize> = AHashMap::new();

        for schedule in &self.schedules {
            for building in buildings
                .iter()
                .filter(|b| !b.subsidized && schedule.applies_to(b.form))
            {
                let Some(parcel) = parcels.get(building.parcel_id) else {
                    debug!(parcel = %building.parcel_id, "no parcel attributes, no fee");
                    continue;
                };
                let fee = schedule.fee(parcel, building.residential_units, building.non_residential_sqft);
                if fee <= 0.0 {
                    continue;
                }
                let key = (schedule.account.clone(), schedule.subaccount_for(parcel));
                let slot = *index.entry(key.clone()).or_insert_with(|| {
                    deposits.push(FeeDeposit {
                        schedules: Vec::new(),
                        account: key.0,
                        subaccount: key.1,
                        amount: 0.0,
                        projects: 0,
                    });
                    deposits.len() - 1
                });
                let deposit = &mut deposits[slot];
                deposit.amount += fee;
                deposit.projects += 1;
                if !deposit.schedules.contains(&schedule.name) {
                    deposit.schedules.push(schedule.name.clone());
                }
            }
        }

        for deposit in &deposits {
            coffer.require_mut(&deposit.account)?.deposit(
                deposit.amount,
                deposit.subaccount.clone(),
                TransactionMetadata::fee_revenue(year, &deposit.schedules, deposit.projects),
            );
            info!(
                account = %deposit.account,
                subaccount = %deposit.subaccount,
                amount = deposit.amount,
                projects = deposit.projects,
                "fees collected"
            );
        }

        Ok(deposits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::AccountDefinition;
    use crate::core::types::{BuildingId, Form, ParcelId};
    use crate::core::DevsimError;
    use crate::feasibility::{FeasibilityRecord, ParcelAttributes};
    use crate::revenue::schedule::FeeBasis;

    fn vmt_schedule() -> FeeSchedule {
        let mut rates = AHashMap::new();
        rates.insert("H".to_string(), 10_000.0);
        rates.insert("M".to_string(), 5_000.0);
        FeeSchedule {
            name: "vmt_res".into(),
            enabled: true,
            account: "vmt".into(),
            forms: vec![Form::Residential],
            basis: FeeBasis::PerUnit,
            category_attr: "vmt_res_cat".into(),
            rates,
            county_rates: AHashMap::new(),
            subaccount_attr: Some("juris".into()),
        }
    }

    fn building(id: u64, units: f64, subsidized: bool) -> NewBuilding {
        let record = FeasibilityRecord::new(ParcelId(id), Form::Residential, 1.0).with_residential(units * 1_000.0, 1_000.0);
        let mut b = NewBuilding::from_record(BuildingId(id), &record, 2025);
        b.subsidized = subsidized;
        b
    }

    fn parcels() -> ParcelTable {
        vec![
            ParcelAttributes::new(ParcelId(1), "oakland", "alameda")
                .with_label("vmt_res_cat", "H")
                .with_label("juris", "oakland"),
            ParcelAttributes::new(ParcelId(2), "oakland", "alameda")
                .with_label("vmt_res_cat", "M")
                .with_label("juris", "oakland"),
            ParcelAttributes::new(ParcelId(3), "berkeley", "alameda")
                .with_label("vmt_res_cat", "H")
                .with_label("juris", "berkeley"),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_one_deposit_per_subaccount() {
        let mut coffer = Coffer::from_definitions(&[AccountDefinition::new("vmt", 0.0)], 2025).unwrap();
        let engine = FeeAssessmentEngine::new(vec![vmt_schedule()]);
        let buildings = vec![building(1, 2.0, false), building(2, 4.0, false), building(3, 1.0, false)];

        let deposits = engine.assess(&buildings, &parcels(), &mut coffer, 2025).unwrap();
        assert_eq!(deposits.len(), 2);

        let account = coffer.require("vmt").unwrap();
        assert_eq!(account.transactions().len(), 2);
        // 2 * 10k + 4 * 5k
        assert!((account.balance(&"oakland".into()) - 40_000.0).abs() < 0.01);
        assert!((account.balance(&"berkeley".into()) - 10_000.0).abs() < 0.01);
        assert_eq!(deposits[0].projects, 2);
    }

    #[test]
    fn test_schedules_sharing_an_account_deposit_once() {
        let mut nonres = vmt_schedule();
        nonres.name = "vmt_nonres".into();
        nonres.forms = vec![Form::Office];
        nonres.basis = FeeBasis::PerSqft;
        nonres.rates.insert("H".to_string(), 2.0);

        let office = NewBuilding::from_record(
            BuildingId(9),
            &FeasibilityRecord::new(ParcelId(1), Form::Office, 1.0).with_non_residential(1_000.0),
            2025,
        );
        let buildings = vec![building(1, 2.0, false), office];

        let mut coffer = Coffer::from_definitions(&[AccountDefinition::new("vmt", 0.0)], 2025).unwrap();
        let engine = FeeAssessmentEngine::new(vec![vmt_schedule(), nonres]);
        let deposits = engine.assess(&buildings, &parcels(), &mut coffer, 2025).unwrap();

        assert_eq!(deposits.len(), 1);
        assert_eq!(deposits[0].schedules, vec!["vmt_res".to_string(), "vmt_nonres".to_string()]);
        assert_eq!(deposits[0].projects, 2);

        let account = coffer.require("vmt").unwrap();
        assert_eq!(account.transactions().len(), 1);
        // 2 * 10k + 1000 sqft * 2
        assert!((account.balance(&"oakland".into()) - 22_000.0).abs() < 0.01);
    }

    #[test]
    fn test_subsidized_buildings_pay_nothing() {
        let mut coffer = Coffer::from_definitions(&[AccountDefinition::new("vmt", 0.0)], 2025).unwrap();
        let engine = FeeAssessmentEngine::new(vec![vmt_schedule()]);
        let deposits = engine
            .assess(&[building(1, 2.0, true)], &parcels(), &mut coffer, 2025)
            .unwrap();
        assert!(deposits.is_empty());
        assert!(coffer.require("vmt").unwrap().transactions().is_empty());
    }

    #[test]
    fn test_missing_account_is_error() {
        let mut coffer = Coffer::new();
        let engine = FeeAssessmentEngine::new(vec![vmt_schedule()]);
        let result = engine.assess(&[building(1, 2.0, false)], &parcels(), &mut coffer, 2025);
        assert!(matches!(result, Err(DevsimError::AccountNotFound(_))));
    }

    #[test]
    fn test_disabled_schedule_ignored() {
        let mut schedule = vmt_schedule();
        schedule.enabled = false;
        let engine = FeeAssessmentEngine::new(vec![schedule]);
        assert!(engine.schedules().is_empty());
    }
}
