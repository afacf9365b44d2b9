//! Formula-based tiered modifiers
//!
//! Each tier is a boolean parcel formula and a percentage. A record's
//! adjustment is the sum of the percentages of every tier its parcel falls
//! in, applied with the sign-preserving rule. Every tier's 0/1
//! classification is written back as a parcel attribute named after the
//! tier so reporting can pick it up.

use tracing::debug;

use crate::core::error::Result;
use crate::core::types::{Form, ParcelId};
use crate::expression::Formula;
use crate::feasibility::FeasibilityTable;
use crate::policy::modifier::{
    pct_delta, CombinationMode, ModifierContext, ModifierStage, ModifierSummary, PolicyModifier,
};

#[derive(Debug, Clone)]
pub struct Tier {
    pub formula: Formula,
    pub pct: f64,
}

impl Tier {
    pub fn name(&self) -> &str {
        &self.formula.name
    }
}

#[derive(Debug, Clone)]
pub struct TieredFormulaModifier {
    name: String,
    forms: Vec<Form>,
    tiers: Vec<Tier>,
}

impl TieredFormulaModifier {
    pub fn new(name: &str, forms: Vec<Form>, tiers: Vec<Tier>) -> Self {
        Self {
            name: name.to_string(),
            forms,
            tiers,
        }
    }

    pub fn tiers(&self) -> &[Tier] {
        &self.tiers
    }
}

impl PolicyModifier for TieredFormulaModifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn stage(&self) -> ModifierStage {
        ModifierStage::Tiered
    }

    fn mode(&self) -> CombinationMode {
        CombinationMode::AdditivePct
    }

    fn applies_to(&self) -> &[Form] {
        &self.forms
    }

    fn apply(
        &self,
        table: &mut FeasibilityTable,
        ctx: &mut ModifierContext<'_>,
    ) -> Result<ModifierSummary> {
        let mut summary = ModifierSummary::new(&self.name, self.stage());

        // Classify every parcel first, then expose the flags
        let mut flags: Vec<(ParcelId, Vec<bool>)> = Vec::with_capacity(ctx.parcels.len());
        for parcel in ctx.parcels.iter() {
            let mut in_tier = Vec::with_capacity(self.tiers.len());
            for tier in &self.tiers {
                in_tier.push(tier.formula.matches(parcel)?);
            }
            flags.push((parcel.parcel_id, in_tier));
        }
        for (parcel_id, in_tier) in &flags {
            for (tier, flag) in self.tiers.iter().zip(in_tier) {
                ctx.parcels
                    .set_value(*parcel_id, tier.name(), if *flag { 1.0 } else { 0.0 });
            }
        }
        let total_pct: ahash::AHashMap<ParcelId, f64> = flags
            .into_iter()
            .map(|(id, in_tier)| {
                let pct = self
                    .tiers
                    .iter()
                    .zip(in_tier)
                    .filter(|(_, flag)| *flag)
                    .map(|(tier, _)| tier.pct)
                    .sum();
                (id, pct)
            })
            .collect();

        for record in table.iter_mut() {
            if !self.forms.contains(&record.form) {
                continue;
            }
            let pct = total_pct.get(&record.parcel_id).copied().unwrap_or(0.0);
            let profit = record.max_profit();
            if pct == 0.0 || !profit.is_finite() {
                continue;
            }
            let delta = pct_delta(profit, pct);
            debug!(parcel = %record.parcel_id, policy = %self.name, pct, delta, "tier adjustment");
            record.adjust_profit(&self.name, delta);
            summary.record(delta);
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DevsimError;
    use crate::feasibility::{FeasibilityRecord, ParcelAttributes, ParcelTable};
    use crate::policy::inclusionary::HouseholdIncomes;

    fn modifier() -> TieredFormulaModifier {
        TieredFormulaModifier::new(
            "transit_tiers",
            vec![Form::Residential],
            vec![
                Tier {
                    formula: Formula::compile("tier_tra", "tra_id > 0").unwrap(),
                    pct: 0.05,
                },
                Tier {
                    formula: Formula::compile("tier_hra", "hra == 1").unwrap(),
                    pct: 0.03,
                },
            ],
        )
    }

    #[test]
    fn test_tiers_combine_additively_and_expose_flags() {
        let mut parcels: ParcelTable = vec![
            ParcelAttributes::new(ParcelId(1), "A", "X").with_value("tra_id", 4.0).with_value("hra", 1.0),
            ParcelAttributes::new(ParcelId(2), "A", "X").with_value("tra_id", 0.0).with_value("hra", 1.0),
            ParcelAttributes::new(ParcelId(3), "A", "X").with_value("tra_id", 0.0).with_value("hra", 0.0),
        ]
        .into_iter()
        .collect();
        let incomes = HouseholdIncomes::default();
        let mut table: FeasibilityTable = vec![
            FeasibilityRecord::new(ParcelId(1), Form::Residential, -100_000.0),
            FeasibilityRecord::new(ParcelId(2), Form::Residential, -100_000.0),
            FeasibilityRecord::new(ParcelId(3), Form::Residential, -100_000.0),
        ]
        .into_iter()
        .collect();

        let mut ctx = ModifierContext { parcels: &mut parcels, incomes: &incomes };
        let summary = modifier().apply(&mut table, &mut ctx).unwrap();

        assert!((table.get(ParcelId(1), Form::Residential).unwrap().max_profit() - -92_000.0).abs() < 0.01);
        assert!((table.get(ParcelId(2), Form::Residential).unwrap().max_profit() - -97_000.0).abs() < 0.01);
        assert!((table.get(ParcelId(3), Form::Residential).unwrap().max_profit() - -100_000.0).abs() < 0.01);
        assert_eq!(summary.records_adjusted, 2);

        assert_eq!(parcels.get(ParcelId(1)).unwrap().value("tier_tra"), Some(1.0));
        assert_eq!(parcels.get(ParcelId(2)).unwrap().value("tier_tra"), Some(0.0));
        assert_eq!(parcels.get(ParcelId(2)).unwrap().value("tier_hra"), Some(1.0));
    }

    #[test]
    fn test_missing_attribute_is_fatal() {
        let mut parcels: ParcelTable =
            vec![ParcelAttributes::new(ParcelId(1), "A", "X")].into_iter().collect();
        let incomes = HouseholdIncomes::default();
        let mut table = FeasibilityTable::new();
        let mut ctx = ModifierContext { parcels: &mut parcels, incomes: &incomes };
        assert!(matches!(
            modifier().apply(&mut table, &mut ctx),
            Err(DevsimError::FormulaEval { .. })
        ));
    }
}
