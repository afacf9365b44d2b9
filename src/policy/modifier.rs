//! Policy modifier trait and the sign-preserving percentage rule

use serde::{Deserialize, Serialize};

use crate::core::error::Result;
use crate::core::types::{Form, Money};
use crate::feasibility::{FeasibilityTable, ParcelTable};
use crate::policy::inclusionary::HouseholdIncomes;

/// How a modifier combines with the profit it adjusts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombinationMode {
    /// `profit + |profit| * pct`
    AdditivePct,
    /// `profit + amount`
    AdditiveAmount,
}

/// Position of a modifier in the yearly pipeline, in application order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModifierStage {
    Fees,
    Inclusionary,
    Sb743,
    LandValueTax,
    Parking,
    Tiered,
}

/// Percentage delta measured against the magnitude of the profit
///
/// A positive pct always raises profit and a negative pct always lowers it,
/// whatever the sign of the profit itself.
pub fn pct_delta(max_profit: Money, pct: f64) -> Money {
    max_profit.abs() * pct
}

/// Apply a sign-preserving percentage adjustment
pub fn apply_pct(max_profit: Money, pct: f64) -> Money {
    max_profit + pct_delta(max_profit, pct)
}

/// Inputs a modifier may read (and, for tier classification, write)
pub struct ModifierContext<'a> {
    pub parcels: &'a mut ParcelTable,
    pub incomes: &'a HouseholdIncomes,
}

/// What one modifier did to the table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModifierSummary {
    pub policy: String,
    pub stage: ModifierStage,
    pub records_adjusted: usize,
    pub total_delta: Money,
}

impl ModifierSummary {
    pub fn new(policy: &str, stage: ModifierStage) -> Self {
        Self {
            policy: policy.to_string(),
            stage,
            records_adjusted: 0,
            total_delta: 0.0,
        }
    }

    pub fn record(&mut self, delta: Money) {
        self.records_adjusted += 1;
        self.total_delta += delta;
    }
}

/// A single profitability policy lever
pub trait PolicyModifier: std::fmt::Debug {
    fn name(&self) -> &str;

    fn stage(&self) -> ModifierStage;

    fn mode(&self) -> CombinationMode;

    /// Forms whose records this modifier touches
    fn applies_to(&self) -> &[Form];

    /// Adjust the table in place, recording every delta on the records
    fn apply(
        &self,
        table: &mut FeasibilityTable,
        ctx: &mut ModifierContext<'_>,
    ) -> Result<ModifierSummary>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positive_pct_improves_loss() {
        // -100k with +10% becomes -90k, not -110k
        assert!((apply_pct(-100_000.0, 0.10) - -90_000.0).abs() < 0.01);
    }

    #[test]
    fn test_negative_pct_worsens_profit() {
        assert!((apply_pct(100_000.0, -0.10) - 90_000.0).abs() < 0.01);
        assert!((apply_pct(-100_000.0, -0.10) - -110_000.0).abs() < 0.01);
    }

    #[test]
    fn test_zero_profit_unchanged() {
        assert_eq!(apply_pct(0.0, 0.5), 0.0);
    }

    #[test]
    fn test_stage_order() {
        let mut stages = vec![
            ModifierStage::Tiered,
            ModifierStage::Fees,
            ModifierStage::Parking,
            ModifierStage::Inclusionary,
            ModifierStage::LandValueTax,
            ModifierStage::Sb743,
        ];
        stages.sort();
        assert_eq!(
            stages,
            vec![
                ModifierStage::Fees,
                ModifierStage::Inclusionary,
                ModifierStage::Sb743,
                ModifierStage::LandValueTax,
                ModifierStage::Parking,
                ModifierStage::Tiered,
            ]
        );
    }
}
