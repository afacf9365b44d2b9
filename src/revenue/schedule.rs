//! Fee rate schedules keyed by parcel category and county

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::core::types::{Form, Money, SubaccountId};
use crate::feasibility::ParcelAttributes;

/// What a fee rate is charged against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeBasis {
    PerUnit,
    PerSqft,
}

/// A development fee: $/unit or $/sqft by parcel category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeSchedule {
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Account the collected fees are deposited into
    pub account: String,
    pub forms: Vec<Form>,
    pub basis: FeeBasis,
    /// Parcel attribute holding the rate category (VMT category, jurisdiction, ...)
    pub category_attr: String,
    #[serde(default)]
    pub rates: AHashMap<String, Money>,
    /// Per-county overrides of `rates`
    #[serde(default)]
    pub county_rates: AHashMap<String, AHashMap<String, Money>>,
    /// Parcel attribute naming the subaccount to deposit into
    #[serde(default)]
    pub subaccount_attr: Option<String>,
}

fn default_enabled() -> bool {
    true
}

impl FeeSchedule {
    pub fn applies_to(&self, form: Form) -> bool {
        self.forms.contains(&form)
    }

    /// Rate for a parcel: county override first, then the regional table
    pub fn rate_for(&self, parcel: &ParcelAttributes) -> Option<Money> {
        let category = parcel.code(&self.category_attr)?;
        self.county_rates
            .get(&parcel.county)
            .and_then(|rates| rates.get(&category))
            .or_else(|| self.rates.get(&category))
            .copied()
    }

    /// Fee owed for a project of the given size; zero when the parcel has no rate
    pub fn fee(&self, parcel: &ParcelAttributes, units: u32, sqft: f64) -> Money {
        let quantity = match self.basis {
            FeeBasis::PerUnit => units as f64,
            FeeBasis::PerSqft => sqft,
        };
        self.rate_for(parcel).map(|rate| rate * quantity).unwrap_or(0.0)
    }

    pub fn subaccount_for(&self, parcel: &ParcelAttributes) -> SubaccountId {
        self.subaccount_attr
            .as_deref()
            .and_then(|attr| parcel.code(attr))
            .map(SubaccountId)
            .unwrap_or_else(SubaccountId::regional)
    }
}
