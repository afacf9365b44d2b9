//! Coffer - every account open during a run

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::accounts::account::{Account, TransactionMetadata};
use crate::core::error::{DevsimError, Result};
use crate::core::types::{Money, SubaccountId, Year};

/// Explicit starting amount for one subaccount
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubaccountDeposit {
    pub subaccount: SubaccountId,
    pub amount: Money,
}

/// Declarative account setup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountDefinition {
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Subaccount receiving the starting and periodic deposits
    #[serde(default = "SubaccountId::regional")]
    pub default_subaccount: SubaccountId,
    #[serde(default)]
    pub starting_deposit: Money,
    #[serde(default)]
    pub starting_subaccounts: Vec<SubaccountDeposit>,
    /// Deposited at the start of every active year
    #[serde(default)]
    pub periodic_deposit: Money,
    #[serde(default)]
    pub first_year: Option<Year>,
    #[serde(default)]
    pub last_year: Option<Year>,
}

fn default_enabled() -> bool {
    true
}

impl AccountDefinition {
    pub fn new(name: &str, starting_deposit: Money) -> Self {
        Self {
            name: name.to_string(),
            enabled: true,
            default_subaccount: SubaccountId::regional(),
            starting_deposit,
            starting_subaccounts: Vec::new(),
            periodic_deposit: 0.0,
            first_year: None,
            last_year: None,
        }
    }

    pub fn is_active(&self, year: Year) -> bool {
        self.first_year.map_or(true, |first| year >= first)
            && self.last_year.map_or(true, |last| year <= last)
    }
}

/// Balance row for reporting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountBalance {
    pub account: String,
    pub total: Money,
    pub subaccounts: Vec<(SubaccountId, Money)>,
}

/// Every account open during a run, in definition order
#[derive(Debug, Clone, Default)]
pub struct Coffer {
    accounts: AHashMap<String, Account>,
    order: Vec<String>,
    definitions: Vec<AccountDefinition>,
}

impl Coffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open every enabled account and make its starting deposits
    pub fn from_definitions(definitions: &[AccountDefinition], start_year: Year) -> Result<Self> {
        let mut coffer = Self::new();
        for def in definitions.iter().filter(|d| d.enabled) {
            if coffer.accounts.contains_key(&def.name) {
                return Err(DevsimError::Config(format!("account '{}' defined twice", def.name)));
            }
            let numbers = std::iter::once(def.starting_deposit)
                .chain(std::iter::once(def.periodic_deposit))
                .chain(def.starting_subaccounts.iter().map(|s| s.amount));
            for amount in numbers {
                if !amount.is_finite() || amount < 0.0 {
                    return Err(DevsimError::Config(format!(
                        "account '{}' has invalid deposit {}",
                        def.name, amount
                    )));
                }
            }

            let mut account = Account::new(&def.name);
            if def.starting_deposit > 0.0 {
                account.deposit(
                    def.starting_deposit,
                    def.default_subaccount.clone(),
                    TransactionMetadata::deposit(start_year, "starting balance"),
                );
            }
            for sub in &def.starting_subaccounts {
                account.deposit(
                    sub.amount,
                    sub.subaccount.clone(),
                    TransactionMetadata::deposit(start_year, "starting balance"),
                );
            }
            debug!(account = %def.name, balance = account.total_balance(), "account opened");
            coffer.insert(account);
            coffer.definitions.push(def.clone());
        }
        Ok(coffer)
    }

    /// Add an account, replacing one of the same name
    pub fn insert(&mut self, account: Account) {
        if !self.accounts.contains_key(&account.name) {
            self.order.push(account.name.clone());
        }
        self.accounts.insert(account.name.clone(), account);
    }

    /// Deposit each account's periodic amount for the year; returns the total
    pub fn apply_periodic_deposits(&mut self, year: Year) -> Money {
        let mut total = 0.0;
        for def in &self.definitions {
            if def.periodic_deposit <= 0.0 || !def.is_active(year) {
                continue;
            }
            if let Some(account) = self.accounts.get_mut(&def.name) {
                account.deposit(
                    def.periodic_deposit,
                    def.default_subaccount.clone(),
                    TransactionMetadata::deposit(year, "periodic deposit"),
                );
                total += def.periodic_deposit;
            }
        }
        if total > 0.0 {
            info!(year, total, "periodic deposits");
        }
        total
    }

    pub fn get(&self, name: &str) -> Option<&Account> {
        self.accounts.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Account> {
        self.accounts.get_mut(name)
    }

    pub fn require(&self, name: &str) -> Result<&Account> {
        self.accounts
            .get(name)
            .ok_or_else(|| DevsimError::AccountNotFound(name.to_string()))
    }

    pub fn require_mut(&mut self, name: &str) -> Result<&mut Account> {
        self.accounts
            .get_mut(name)
            .ok_or_else(|| DevsimError::AccountNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.accounts.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Accounts in the order they were opened
    pub fn iter(&self) -> impl Iterator<Item = &Account> {
        self.order.iter().filter_map(|name| self.accounts.get(name))
    }

    pub fn summary(&self) -> Vec<AccountBalance> {
        self.iter()
            .map(|account| AccountBalance {
                account: account.name.clone(),
                total: account.total_balance(),
                subaccounts: account.total_by_subaccount(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definitions() -> Vec<AccountDefinition> {
        let mut housing = AccountDefinition::new("housing", 1_000_000.0);
        housing.periodic_deposit = 100_000.0;
        housing.first_year = Some(2021);
        housing.last_year = Some(2022);

        let mut jurisdictions = AccountDefinition::new("jurisdictions", 0.0);
        jurisdictions.starting_subaccounts = vec![
            SubaccountDeposit { subaccount: "oakland".into(), amount: 300.0 },
            SubaccountDeposit { subaccount: "berkeley".into(), amount: 200.0 },
        ];

        let mut disabled = AccountDefinition::new("office", 5.0);
        disabled.enabled = false;

        vec![housing, jurisdictions, disabled]
    }

    #[test]
    fn test_from_definitions_skips_disabled() {
        let coffer = Coffer::from_definitions(&definitions(), 2020).unwrap();
        assert_eq!(coffer.len(), 2);
        assert!(coffer.get("office").is_none());
        assert!(matches!(coffer.require("office"), Err(DevsimError::AccountNotFound(_))));

        let housing = coffer.require("housing").unwrap();
        assert!((housing.balance(&SubaccountId::regional()) - 1_000_000.0).abs() < 0.01);

        let subs: Vec<_> = coffer
            .require("jurisdictions")
            .unwrap()
            .iterate_subaccounts()
            .map(|(s, _)| s)
            .collect();
        assert_eq!(subs, vec![SubaccountId::from("oakland"), SubaccountId::from("berkeley")]);
    }

    #[test]
    fn test_periodic_deposits_respect_window() {
        let mut coffer = Coffer::from_definitions(&definitions(), 2020).unwrap();
        assert_eq!(coffer.apply_periodic_deposits(2020), 0.0);
        assert!((coffer.apply_periodic_deposits(2021) - 100_000.0).abs() < 0.01);
        assert!((coffer.apply_periodic_deposits(2022) - 100_000.0).abs() < 0.01);
        assert_eq!(coffer.apply_periodic_deposits(2023), 0.0);

        let housing = coffer.require("housing").unwrap();
        assert!((housing.total_balance() - 1_200_000.0).abs() < 0.01);
    }

    #[test]
    fn test_duplicate_account_rejected() {
        let defs = vec![
            AccountDefinition::new("housing", 1.0),
            AccountDefinition::new("housing", 2.0),
        ];
        assert!(matches!(Coffer::from_definitions(&defs, 2020), Err(DevsimError::Config(_))));
    }

    #[test]
    fn test_negative_deposit_rejected() {
        let defs = vec![AccountDefinition::new("housing", -1.0)];
        assert!(Coffer::from_definitions(&defs, 2020).is_err());
    }

    #[test]
    fn test_summary_in_definition_order() {
        let coffer = Coffer::from_definitions(&definitions(), 2020).unwrap();
        let summary = coffer.summary();
        assert_eq!(summary[0].account, "housing");
        assert_eq!(summary[1].account, "jurisdictions");
        assert!((summary[1].total - 500.0).abs() < 0.01);
        assert_eq!(summary[1].subaccounts.len(), 2);
    }
}
