//! Percentage-bucket modifiers (SB743 VMT categories, land value tax bins)
//!
//! A parcel metric is mapped to a bucket carrying a signed percentage,
//! applied with the sign-preserving rule. Parcels that fall in no bucket,
//! or lack the metric, are left unchanged.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::error::{DevsimError, Result};
use crate::core::types::Form;
use crate::expression::Value;
use crate::expression::AttributeSource;
use crate::feasibility::{FeasibilityTable, ParcelAttributes};
use crate::policy::modifier::{
    pct_delta, CombinationMode, ModifierContext, ModifierStage, ModifierSummary, PolicyModifier,
};

/// Half-open range `[min, max)` of a continuous metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeBucket {
    #[serde(default = "neg_infinity")]
    pub min: f64,
    #[serde(default = "infinity")]
    pub max: f64,
    pub pct: f64,
}

fn neg_infinity() -> f64 {
    f64::NEG_INFINITY
}

fn infinity() -> f64 {
    f64::INFINITY
}

/// How parcel metric values map to percentages
#[derive(Debug, Clone, PartialEq)]
pub enum Buckets {
    Ranges(Vec<RangeBucket>),
    Categories(AHashMap<String, f64>),
}

impl Buckets {
    fn pct_for(&self, value: &Value) -> Option<f64> {
        match (self, value) {
            (Buckets::Ranges(ranges), Value::Number(v)) => ranges
                .iter()
                .find(|b| *v >= b.min && *v < b.max)
                .map(|b| b.pct),
            (Buckets::Categories(map), v) => map.get(&v.to_string()).copied(),
            (Buckets::Ranges(_), Value::Text(_)) => None,
        }
    }
}

/// Maps a parcel metric into buckets and adjusts profit by the bucket's pct
#[derive(Debug, Clone)]
pub struct PercentageBucketModifier {
    name: String,
    stage: ModifierStage,
    forms: Vec<Form>,
    metric: String,
    buckets: Buckets,
}

impl PercentageBucketModifier {
    pub fn new(
        name: &str,
        stage: ModifierStage,
        forms: Vec<Form>,
        metric: &str,
        buckets: Buckets,
    ) -> Result<Self> {
        if let Buckets::Ranges(ranges) = &buckets {
            if let Some(bad) = ranges.iter().find(|b| !(b.min < b.max)) {
                return Err(DevsimError::Config(format!(
                    "bucket [{}, {}) in '{}' is empty",
                    bad.min, bad.max, name
                )));
            }
        }
        Ok(Self {
            name: name.to_string(),
            stage,
            forms,
            metric: metric.to_string(),
            buckets,
        })
    }

    /// Pct assigned to a parcel, zero when unmapped
    pub fn pct_for_parcel(&self, parcel: &ParcelAttributes) -> f64 {
        parcel
            .attribute(&self.metric)
            .and_then(|v| self.buckets.pct_for(&v))
            .unwrap_or(0.0)
    }
}

impl PolicyModifier for PercentageBucketModifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn stage(&self) -> ModifierStage {
        self.stage
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
        let mut summary = ModifierSummary::new(&self.name, self.stage);

        for record in table.iter_mut() {
            if !self.forms.contains(&record.form) {
                continue;
            }
            let profit = record.max_profit();
            if !profit.is_finite() {
                debug!(parcel = %record.parcel_id, policy = %self.name, "non-finite profit, skipped");
                continue;
            }
            let pct = ctx
                .parcels
                .get(record.parcel_id)
                .map(|p| self.pct_for_parcel(p))
                .unwrap_or(0.0);
            if pct == 0.0 {
                continue;
            }
            let delta = pct_delta(profit, pct);
            record.adjust_profit(&self.name, delta);
            summary.record(delta);
        }

        Ok(summary)
    }
}
