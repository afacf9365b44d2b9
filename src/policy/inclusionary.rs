//! Inclusionary housing modifier
//!
//! A share of every residential project must sell at a price a household at
//! a chosen income percentile can afford. The gap between market price and
//! that affordable price, times the number of affordable units, comes off
//! the project's profit.
//!
//! Affordable price:
//!
//! ```text
//! payment = income * housing_cost_share / 12 - monthly_fee
//! price   = PV(annual_rate / 12, term_years * 12, payment) * tax_insurance_factor
//! ```

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::error::{DevsimError, Result};
use crate::core::types::{Form, Money};
use crate::feasibility::FeasibilityTable;
use crate::policy::modifier::{
    CombinationMode, ModifierContext, ModifierStage, ModifierSummary, PolicyModifier,
};

/// Household income samples grouped by geography code
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HouseholdIncomes {
    by_geography: AHashMap<String, Vec<f64>>,
}

impl HouseholdIncomes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, geography: &str, incomes: Vec<f64>) {
        self.by_geography.insert(geography.to_string(), incomes);
    }

    pub fn is_empty(&self) -> bool {
        self.by_geography.values().all(|v| v.is_empty())
    }

    /// Income at a percentile (0..=1) within one geography
    pub fn percentile(&self, geography: &str, pct: f64) -> Option<f64> {
        quantile(self.by_geography.get(geography)?, pct)
    }

    /// Income at a percentile across every geography
    pub fn regional_percentile(&self, pct: f64) -> Option<f64> {
        let pooled: Vec<f64> = self.by_geography.values().flatten().copied().collect();
        quantile(&pooled, pct)
    }
}

/// Linear-interpolated quantile of the finite samples
fn quantile(samples: &[f64], pct: f64) -> Option<f64> {
    let mut sorted: Vec<f64> = samples.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(f64::total_cmp);
    let pos = pct.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Mortgage assumptions behind the affordable sale price
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AffordabilityParams {
    /// Income percentile the affordable price targets
    pub income_percentile: f64,
    /// Share of gross income spent on housing
    pub housing_cost_share: f64,
    pub annual_interest_rate: f64,
    pub term_years: u32,
    /// Fixed monthly fee (HOA and similar) netted out of the payment
    pub monthly_fee: Money,
    /// Share of the financed price left after property tax and insurance
    pub tax_insurance_factor: f64,
}

impl Default for AffordabilityParams {
    fn default() -> Self {
        Self {
            income_percentile: 0.5,
            housing_cost_share: 0.33,
            annual_interest_rate: 0.055,
            term_years: 30,
            monthly_fee: 250.0,
            tax_insurance_factor: 0.8,
        }
    }
}

impl AffordabilityParams {
    /// Highest price a household with this annual income can pay
    pub fn affordable_price(&self, annual_income: f64) -> Money {
        let payment = annual_income * self.housing_cost_share / 12.0 - self.monthly_fee;
        if payment <= 0.0 {
            return 0.0;
        }
        let periods = (self.term_years * 12) as i32;
        let rate = self.annual_interest_rate / 12.0;
        let present_value = if rate == 0.0 {
            payment * periods as f64
        } else {
            payment * (1.0 - (1.0 + rate).powi(-periods)) / rate
        };
        present_value * self.tax_insurance_factor
    }
}

/// Inclusionary mandate: deed-restricted share of units per geography
#[derive(Debug, Clone)]
pub struct InclusionaryModifier {
    name: String,
    /// Parcel attribute the percentages are keyed by
    geography_attr: String,
    pct_by_geography: AHashMap<String, f64>,
    default_pct: f64,
    affordability: AffordabilityParams,
}

const FORMS: [Form; 1] = [Form::Residential];

impl InclusionaryModifier {
    pub fn new(
        name: &str,
        geography_attr: &str,
        pct_by_geography: AHashMap<String, f64>,
        default_pct: f64,
        affordability: AffordabilityParams,
    ) -> Result<Self> {
        let out_of_range = pct_by_geography
            .iter()
            .map(|(g, p)| (g.as_str(), *p))
            .chain(std::iter::once(("default", default_pct)))
            .find(|(_, p)| !(0.0..=1.0).contains(p));
        if let Some((geography, pct)) = out_of_range {
            return Err(DevsimError::Config(format!(
                "inclusionary share for {} must be within 0..=1, got {}",
                geography, pct
            )));
        }
        Ok(Self {
            name: name.to_string(),
            geography_attr: geography_attr.to_string(),
            pct_by_geography,
            default_pct,
            affordability,
        })
    }

    fn pct_for(&self, geography: Option<&str>) -> f64 {
        geography
            .and_then(|g| self.pct_by_geography.get(g))
            .copied()
            .unwrap_or(self.default_pct)
    }
}

impl PolicyModifier for InclusionaryModifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn stage(&self) -> ModifierStage {
        ModifierStage::Inclusionary
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
        let pct = self.affordability.income_percentile;
        let regional_income = ctx.incomes.regional_percentile(pct);
        let mut price_cache: AHashMap<String, Money> = AHashMap::new();

        for record in table.iter_mut() {
            if record.form != Form::Residential {
                continue;
            }
            let units = record.residential_units();
            let geography = ctx
                .parcels
                .get(record.parcel_id)
                .and_then(|p| p.code(&self.geography_attr));
            let share = self.pct_for(geography.as_deref());
            let affordable_units = ((units as f64) * share).floor() as u32;
            if affordable_units == 0 {
                continue;
            }
            if affordable_units > units {
                return Err(DevsimError::InvariantViolation(format!(
                    "{} requires {} affordable of {} units on {}",
                    self.name, affordable_units, units, record.parcel_id
                )));
            }

            let key = geography.unwrap_or_default();
            let affordable_price = match price_cache.get(&key) {
                Some(price) => *price,
                None => {
                    let income = ctx
                        .incomes
                        .percentile(&key, pct)
                        .or(regional_income)
                        .ok_or_else(|| {
                            DevsimError::Config(format!(
                                "inclusionary policy '{}' needs household incomes",
                                self.name
                            ))
                        })?;
                    let price = self.affordability.affordable_price(income);
                    debug!(geography = %key, income, price, "affordable price");
                    price_cache.insert(key, price);
                    price
                }
            };

            let Some(market_price) = record.revenue_per_unit() else {
                warn!(parcel = %record.parcel_id, "no revenue per unit, inclusionary loss not computed");
                record.deed_restricted_units = affordable_units;
                record.inclusionary_units = affordable_units;
                continue;
            };
            let loss_per_unit = (market_price - affordable_price).max(0.0);
            let delta = -(affordable_units as f64) * loss_per_unit;

            record.deed_restricted_units = affordable_units;
            record.inclusionary_units = affordable_units;
            record.adjust_profit(&self.name, delta);
            summary.record(delta);
        }

        Ok(summary)
    }
}
