//! Parking requirement modifier
//!
//! Relaxing the parking minimum saves the cost of every space no longer
//! required: `(required_ratio - policy_ratio) * units * cost_per_space`.

use serde::{Deserialize, Serialize};

use crate::core::error::Result;
use crate::core::types::{Form, Money};
use crate::feasibility::FeasibilityTable;
use crate::policy::modifier::{
    CombinationMode, ModifierContext, ModifierStage, ModifierSummary, PolicyModifier,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParkingModifier {
    pub name: String,
    /// Parcel attribute with the zoning-derived spaces-per-unit requirement
    pub required_ratio_attr: String,
    /// Spaces per unit required under the policy
    pub policy_ratio: f64,
    pub cost_per_space: Money,
}

const FORMS: [Form; 1] = [Form::Residential];

impl PolicyModifier for ParkingModifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn stage(&self) -> ModifierStage {
        ModifierStage::Parking
    }

    fn mode(&self) -> CombinationMode {
        CombinationMode::AdditiveAmount
    }

    fn applies_to(&self) -> &[Form] {
        &FORMS
    }

    fn apply(
        &self,
        table: &mut FeasibilityTable,
        ctx: &mut ModifierContext<'_>,
    ) -> Result<ModifierSummary> {
        let mut summary = ModifierSummary::new(&self.name, self.stage());

        for record in table.iter_mut() {
            if record.form != Form::Residential {
                continue;
            }
            let Some(required) = ctx
                .parcels
                .get(record.parcel_id)
                .and_then(|p| p.value(&self.required_ratio_attr))
            else {
                continue;
            };
            let spaces_saved = (required - self.policy_ratio).max(0.0) * record.residential_units() as f64;
            if spaces_saved <= 0.0 {
                continue;
            }
            let savings = spaces_saved * self.cost_per_space;
            record.adjust_profit(&self.name, savings);
            summary.record(savings);
        }

        Ok(summary)
    }
}
