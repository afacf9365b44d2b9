//! Declarative strategy configuration
//!
//! Everything a run needs besides its data: run settings, accounts, fee
//! schedules, the policy modifiers to enable, and the subsidy programs
//! drawing on the accounts. Formulas are kept as strings here and parsed
//! when the strategy is compiled.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::accounts::AccountDefinition;
use crate::core::config::AllocationSettings;
use crate::core::types::{Form, Money, SubaccountId};
use crate::policy::{AffordabilityParams, ModifierStage, RangeBucket};
use crate::revenue::FeeSchedule;

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    #[serde(default)]
    pub settings: AllocationSettings,
    #[serde(default)]
    pub accounts: Vec<AccountDefinition>,
    #[serde(default)]
    pub fees: Vec<FeeSchedule>,
    #[serde(default)]
    pub inclusionary: Option<InclusionaryConfig>,
    #[serde(default)]
    pub percentage_buckets: Vec<BucketPolicyConfig>,
    #[serde(default)]
    pub parking: Option<ParkingConfig>,
    #[serde(default)]
    pub tiers: Vec<TierPolicyConfig>,
    #[serde(default)]
    pub residential_subsidies: Vec<ResidentialSubsidyConfig>,
    #[serde(default)]
    pub office_subsidies: Vec<OfficeSubsidyConfig>,
    /// Subsidy programs in the order they run, by account or `kind:account`;
    /// unlisted ones follow
    #[serde(default)]
    pub allocation_order: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InclusionaryConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_inclusionary_name")]
    pub name: String,
    /// Parcel attribute naming the geography the share is set for
    pub geography_attr: String,
    #[serde(default)]
    pub default_pct: f64,
    #[serde(default)]
    pub pct_by_geography: AHashMap<String, f64>,
    #[serde(default)]
    pub affordability: AffordabilityParams,
}

fn default_inclusionary_name() -> String {
    "inclusionary".to_string()
}

/// A metric mapped to ranges or categories
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketPolicyConfig {
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub stage: ModifierStage,
    pub forms: Vec<Form>,
    pub metric: String,
    #[serde(default)]
    pub ranges: Vec<RangeBucket>,
    #[serde(default)]
    pub categories: AHashMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParkingConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_parking_name")]
    pub name: String,
    pub required_ratio_attr: String,
    pub policy_ratio: f64,
    pub cost_per_space: Money,
}

fn default_parking_name() -> String {
    "parking".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierPolicyConfig {
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub forms: Vec<Form>,
    pub levels: Vec<TierLevelConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierLevelConfig {
    /// Also the parcel attribute the classification is written to
    pub name: String,
    pub formula: String,
    pub pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResidentialSubsidyConfig {
    pub account: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub receiving_zone: Option<String>,
    #[serde(default)]
    pub subaccount_formula: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfficeSubsidyConfig {
    pub account: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_office_form")]
    pub form: Form,
    #[serde(default = "SubaccountId::regional")]
    pub subaccount: SubaccountId,
    #[serde(default)]
    pub receiving_zone: Option<String>,
}

fn default_office_form() -> Form {
    Form::Office
}
