//! Development fee modifier - charges a fee schedule against project profit

use tracing::debug;

use crate::core::error::Result;
use crate::core::types::Form;
use crate::feasibility::FeasibilityTable;
use crate::policy::modifier::{
    CombinationMode, ModifierContext, ModifierStage, ModifierSummary, PolicyModifier,
};
use crate::revenue::FeeSchedule;

/// Subtracts `quantity * rate(parcel)` from profit and books it in the `fees` column
#[derive(Debug, Clone)]
pub struct FeeModifier {
    schedule: FeeSchedule,
}

impl FeeModifier {
    pub fn new(schedule: FeeSchedule) -> Self {
        Self { schedule }
    }

    pub fn schedule(&self) -> &FeeSchedule {
        &self.schedule
    }
}

impl PolicyModifier for FeeModifier {
    fn name(&self) -> &str {
        &self.schedule.name
    }

    fn stage(&self) -> ModifierStage {
        ModifierStage::Fees
    }

    fn mode(&self) -> CombinationMode {
        CombinationMode::AdditiveAmount
    }

    fn applies_to(&self) -> &[Form] {
        &self.schedule.forms
    }

    fn apply(
        &self,
        table: &mut FeasibilityTable,
        ctx: &mut ModifierContext<'_>,
    ) -> Result<ModifierSummary> {
        let mut summary = ModifierSummary::new(self.name(), self.stage());

        for record in table.iter_mut() {
            if !self.schedule.applies_to(record.form) {
                continue;
            }
            let Some(parcel) = ctx.parcels.get(record.parcel_id) else {
                debug!(parcel = %record.parcel_id, fee = self.name(), "no parcel attributes, fee skipped");
                continue;
            };
            let fee = self.schedule.fee(
                parcel,
                record.residential_units(),
                record.non_residential_sqft,
            );
            if fee == 0.0 {
                continue;
            }
            record.fees += fee;
            record.adjust_profit(self.name(), -fee);
            summary.record(-fee);
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::ParcelId;
    use crate::feasibility::{FeasibilityRecord, ParcelAttributes, ParcelTable};
    use crate::policy::inclusionary::HouseholdIncomes;
    use crate::revenue::FeeBasis;
    use ahash::AHashMap;

    fn jobs_housing_fee() -> FeeSchedule {
        let mut rates = AHashMap::new();
        rates.insert("Oakland".to_string(), 10.0);
        FeeSchedule {
            name: "jobs_housing_fee".into(),
            enabled: true,
            account: "jobs_housing".into(),
            forms: vec![Form::Office],
            basis: FeeBasis::PerSqft,
            category_attr: "jurisdiction".into(),
            rates,
            county_rates: AHashMap::new(),
            subaccount_attr: None,
        }
    }

    #[test]
    fn test_fee_reduces_profit_and_is_recorded() {
        let mut parcels: ParcelTable =
            vec![ParcelAttributes::new(ParcelId(1), "Oakland", "Alameda")].into_iter().collect();
        let incomes = HouseholdIncomes::default();
        let mut table: FeasibilityTable = vec![
            FeasibilityRecord::new(ParcelId(1), Form::Office, 500_000.0).with_non_residential(20_000.0),
            FeasibilityRecord::new(ParcelId(1), Form::Residential, 500_000.0),
        ]
        .into_iter()
        .collect();

        let modifier = FeeModifier::new(jobs_housing_fee());
        let mut ctx = ModifierContext {
            parcels: &mut parcels,
            incomes: &incomes,
        };
        let summary = modifier.apply(&mut table, &mut ctx).unwrap();

        let office = table.get(ParcelId(1), Form::Office).unwrap();
        assert!((office.fees - 200_000.0).abs() < 0.01);
        assert!((office.max_profit() - 300_000.0).abs() < 0.01);
        assert!((office.policy_adjustment("jobs_housing_fee") - -200_000.0).abs() < 0.01);

        // Residential is outside the schedule's forms
        let res = table.get(ParcelId(1), Form::Residential).unwrap();
        assert_eq!(res.fees, 0.0);
        assert_eq!(summary.records_adjusted, 1);
    }
}
