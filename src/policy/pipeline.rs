//! Policy modification pipeline
//!
//! Modifiers run in stage order: fees, inclusionary housing, SB743, land
//! value tax, parking, then tiered formulas. The pipeline always starts
//! from a clone of the unmodified table, so applying it twice to the same
//! base never double counts.

use tracing::{debug, info};

use crate::core::error::Result;
use crate::feasibility::{FeasibilityTable, ParcelTable};
use crate::policy::inclusionary::HouseholdIncomes;
use crate::policy::modifier::{ModifierContext, ModifierSummary, PolicyModifier};

/// Result of one pipeline pass
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub table: FeasibilityTable,
    pub summaries: Vec<ModifierSummary>,
}

#[derive(Debug, Default)]
pub struct PolicyModificationPipeline {
    modifiers: Vec<Box<dyn PolicyModifier>>,
}

impl PolicyModificationPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a modifier; it lands after every modifier of an earlier or equal stage
    pub fn add(&mut self, modifier: Box<dyn PolicyModifier>) {
        let at = self
            .modifiers
            .partition_point(|m| m.stage() <= modifier.stage());
        self.modifiers.insert(at, modifier);
    }

    pub fn with(mut self, modifier: impl PolicyModifier + 'static) -> Self {
        self.add(Box::new(modifier));
        self
    }

    pub fn len(&self) -> usize {
        self.modifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modifiers.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.modifiers.iter().map(|m| m.name()).collect()
    }

    /// Apply every modifier, in order, to a copy of the unmodified table
    pub fn apply(
        &self,
        base: &FeasibilityTable,
        parcels: &mut ParcelTable,
        incomes: &HouseholdIncomes,
    ) -> Result<PipelineOutcome> {
        let mut table = base.clone();
        let mut summaries = Vec::with_capacity(self.modifiers.len());
        let mut ctx = ModifierContext { parcels, incomes };

        for modifier in &self.modifiers {
            let summary = modifier.apply(&mut table, &mut ctx)?;
            debug!(
                policy = %summary.policy,
                mode = ?modifier.mode(),
                records = summary.records_adjusted,
                total_delta = summary.total_delta,
                "modifier applied"
            );
            summaries.push(summary);
        }

        info!(
            modifiers = self.modifiers.len(),
            records = table.len(),
            "policy modifications applied"
        );
        Ok(PipelineOutcome { table, summaries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Form, ParcelId};
    use crate::feasibility::{FeasibilityRecord, ParcelAttributes};
    use crate::policy::buckets::{Buckets, PercentageBucketModifier};
    use crate::policy::modifier::ModifierStage;
    use crate::policy::parking::ParkingModifier;
    use ahash::AHashMap;

    fn sb743() -> PercentageBucketModifier {
        let mut cats = AHashMap::new();
        cats.insert("S".to_string(), 0.10);
        PercentageBucketModifier::new("sb743", ModifierStage::Sb743, vec![Form::Residential], "vmt_res_cat", Buckets::Categories(cats))
            .unwrap()
    }

    fn parking() -> ParkingModifier {
        ParkingModifier {
            name: "parking".into(),
            required_ratio_attr: "parking_ratio".into(),
            policy_ratio: 0.0,
            cost_per_space: 10_000.0,
        }
    }

    fn fixtures() -> (FeasibilityTable, ParcelTable) {
        let table: FeasibilityTable = vec![FeasibilityRecord::new(ParcelId(1), Form::Residential, -100_000.0)
            .with_residential(5_000.0, 1_000.0)]
        .into_iter()
        .collect();
        let parcels: ParcelTable = vec![ParcelAttributes::new(ParcelId(1), "A", "X")
            .with_label("vmt_res_cat", "S")
            .with_value("parking_ratio", 1.0)]
        .into_iter()
        .collect();
        (table, parcels)
    }

    #[test]
    fn test_stage_order_independent_of_insertion() {
        let pipeline = PolicyModificationPipeline::new().with(parking()).with(sb743());
        assert_eq!(pipeline.names(), vec!["sb743", "parking"]);
    }

    #[test]
    fn test_order_matters_and_is_fixed() {
        let (table, mut parcels) = fixtures();
        let incomes = HouseholdIncomes::default();
        let pipeline = PolicyModificationPipeline::new().with(parking()).with(sb743());
        let outcome = pipeline.apply(&table, &mut parcels, &incomes).unwrap();

        // sb743 first: -100k + 10k = -90k, then parking +50k = -40k
        let record = outcome.table.get(ParcelId(1), Form::Residential).unwrap();
        assert!((record.max_profit() - -40_000.0).abs() < 0.01);
        assert_eq!(outcome.summaries.len(), 2);
    }

    #[test]
    fn test_reapplying_to_same_base_is_idempotent() {
        let (table, mut parcels) = fixtures();
        let incomes = HouseholdIncomes::default();
        let pipeline = PolicyModificationPipeline::new().with(sb743()).with(parking());

        let first = pipeline.apply(&table, &mut parcels, &incomes).unwrap();
        let second = pipeline.apply(&table, &mut parcels, &incomes).unwrap();
        assert_eq!(first.table, second.table);
        // The base is never touched
        assert!(table.get(ParcelId(1), Form::Residential).unwrap().adjustments().is_empty());
    }

    #[test]
    fn test_empty_pipeline_returns_copy() {
        let (table, mut parcels) = fixtures();
        let outcome = PolicyModificationPipeline::new()
            .apply(&table, &mut parcels, &HouseholdIncomes::default())
            .unwrap();
        assert_eq!(outcome.table, table);
        assert!(outcome.summaries.is_empty());
    }
}
