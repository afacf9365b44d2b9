//! Load a strategy from TOML and compile it into runtime objects

use std::fs;
use std::path::Path;

use ahash::AHashSet;
use tracing::info;

use crate::accounts::AccountDefinition;
use crate::allocation::{SubsidizedOfficeAllocator, SubsidizedResidentialAllocator, SubsidyProgram};
use crate::core::config::AllocationSettings;
use crate::core::error::{DevsimError, Result};
use crate::expression::Formula;
use crate::policy::{
    Buckets, FeeModifier, InclusionaryModifier, ParkingModifier, PercentageBucketModifier,
    PolicyModificationPipeline, Tier, TieredFormulaModifier,
};
use crate::revenue::FeeAssessmentEngine;
use crate::rules::strategy::{BucketPolicyConfig, StrategyConfig};

/// A strategy ready to run: formulas parsed, references resolved
#[derive(Debug)]
pub struct CompiledStrategy {
    pub settings: AllocationSettings,
    pub accounts: Vec<AccountDefinition>,
    pub pipeline: PolicyModificationPipeline,
    pub fee_engine: FeeAssessmentEngine,
    /// In the order they run each year
    pub programs: Vec<SubsidyProgram>,
}

impl StrategyConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::parse_toml(&content)
    }

    pub fn parse_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Validate the strategy and build the pipeline, fee engine and allocators
    pub fn compile(&self) -> Result<CompiledStrategy> {
        self.settings.validate()?;

        let accounts: Vec<AccountDefinition> =
            self.accounts.iter().filter(|a| a.enabled).cloned().collect();
        let mut known = AHashSet::new();
        for account in &accounts {
            if !known.insert(account.name.as_str()) {
                return Err(DevsimError::Config(format!("account '{}' defined twice", account.name)));
            }
        }
        let require_account = |name: &str, user: &str| -> Result<()> {
            if known.contains(name) {
                Ok(())
            } else {
                Err(DevsimError::Config(format!(
                    "{} refers to unknown or disabled account '{}'",
                    user, name
                )))
            }
        };

        let mut pipeline = PolicyModificationPipeline::new();

        let fees: Vec<_> = self.fees.iter().filter(|f| f.enabled).cloned().collect();
        for schedule in &fees {
            require_account(&schedule.account, &format!("fee schedule '{}'", schedule.name))?;
            pipeline.add(Box::new(FeeModifier::new(schedule.clone())));
        }

        if let Some(cfg) = self.inclusionary.as_ref().filter(|c| c.enabled) {
            pipeline.add(Box::new(InclusionaryModifier::new(
                &cfg.name,
                &cfg.geography_attr,
                cfg.pct_by_geography.clone(),
                cfg.default_pct,
                cfg.affordability.clone(),
            )?));
        }

        for cfg in self.percentage_buckets.iter().filter(|c| c.enabled) {
            pipeline.add(Box::new(compile_buckets(cfg)?));
        }

        if let Some(cfg) = self.parking.as_ref().filter(|c| c.enabled) {
            pipeline.add(Box::new(ParkingModifier {
                name: cfg.name.clone(),
                required_ratio_attr: cfg.required_ratio_attr.clone(),
                policy_ratio: cfg.policy_ratio,
                cost_per_space: cfg.cost_per_space,
            }));
        }

        for cfg in self.tiers.iter().filter(|c| c.enabled) {
            let tiers = cfg
                .levels
                .iter()
                .map(|level| {
                    Ok(Tier {
                        formula: Formula::compile(&level.name, &level.formula)?,
                        pct: level.pct,
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            pipeline.add(Box::new(TieredFormulaModifier::new(&cfg.name, cfg.forms.clone(), tiers)));
        }

        let mut programs = Vec::new();
        for cfg in self.residential_subsidies.iter().filter(|c| c.enabled) {
            require_account(&cfg.account, "residential subsidy")?;
            let mut allocator = SubsidizedResidentialAllocator::new(&cfg.account, self.settings.clone());
            if let Some(source) = &cfg.receiving_zone {
                allocator = allocator
                    .with_receiving_zone(Formula::compile(&format!("{}.receiving_zone", cfg.account), source)?);
            }
            if let Some(source) = &cfg.subaccount_formula {
                allocator = allocator
                    .with_subaccount_formula(Formula::compile(&format!("{}.subaccount", cfg.account), source)?);
            }
            programs.push(SubsidyProgram::Residential(allocator));
        }
        for cfg in self.office_subsidies.iter().filter(|c| c.enabled) {
            require_account(&cfg.account, "office subsidy")?;
            if cfg.form.is_residential() {
                return Err(DevsimError::Config(format!(
                    "office subsidy '{}' cannot target residential projects",
                    cfg.account
                )));
            }
            let mut allocator = SubsidizedOfficeAllocator::new(&cfg.account, self.settings.clone())
                .with_form(cfg.form)
                .with_subaccount(cfg.subaccount.clone());
            if let Some(source) = &cfg.receiving_zone {
                allocator = allocator
                    .with_receiving_zone(Formula::compile(&format!("{}.receiving_zone", cfg.account), source)?);
            }
            programs.push(SubsidyProgram::Office(allocator));
        }

        let programs = order_programs(programs, &self.allocation_order)?;

        info!(
            accounts = accounts.len(),
            modifiers = pipeline.len(),
            fee_schedules = fees.len(),
            programs = programs.len(),
            "strategy compiled"
        );
        Ok(CompiledStrategy {
            settings: self.settings.clone(),
            accounts,
            pipeline,
            fee_engine: FeeAssessmentEngine::new(fees),
            programs,
        })
    }
}

fn compile_buckets(cfg: &BucketPolicyConfig) -> Result<PercentageBucketModifier> {
    let buckets = match (cfg.ranges.is_empty(), cfg.categories.is_empty()) {
        (false, true) => Buckets::Ranges(cfg.ranges.clone()),
        (true, false) => Buckets::Categories(cfg.categories.clone()),
        _ => {
            return Err(DevsimError::Config(format!(
                "bucket policy '{}' needs exactly one of ranges or categories",
                cfg.name
            )))
        }
    };
    PercentageBucketModifier::new(&cfg.name, cfg.stage, cfg.forms.clone(), &cfg.metric, buckets)
}

/// Listed programs first in the listed order, then the rest as configured
///
/// An entry is an account name, or `residential:<account>` / `office:<account>`
/// when both kinds of program draw on the same account.
fn order_programs(mut programs: Vec<SubsidyProgram>, order: &[String]) -> Result<Vec<SubsidyProgram>> {
    let mut ordered = Vec::with_capacity(programs.len());
    for entry in order {
        let matching: Vec<usize> = programs
            .iter()
            .enumerate()
            .filter(|(_, p)| p.matches(entry))
            .map(|(idx, _)| idx)
            .collect();
        match matching.as_slice() {
            [idx] => ordered.push(programs.remove(*idx)),
            [] => {
                return Err(DevsimError::Config(format!(
                    "allocation_order names '{}', which has no enabled subsidy program",
                    entry
                )))
            }
            _ => {
                return Err(DevsimError::Config(format!(
                    "allocation_order entry '{}' is ambiguous; use 'residential:{}' or 'office:{}'",
                    entry, entry, entry
                )))
            }
        }
    }
    ordered.extend(programs);
    Ok(ordered)
}
