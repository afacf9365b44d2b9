//! Account - append-only ledger of deposits and withdrawals
//!
//! Entries are never modified or removed, so the log is the audit trail of
//! every dollar that moved during a run. Running per-subaccount balances are
//! kept beside it and always equal the sum of the log.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::core::types::{Money, ParcelId, SubaccountId, Year};

/// What caused a transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransactionKind {
    /// Starting or periodic funding
    Deposit,
    /// Development fees collected from market-rate projects
    FeeRevenue { schedules: Vec<String>, projects: usize },
    /// Subsidy paid out to one or more projects
    Subsidy { policy: String, parcel_ids: Vec<ParcelId> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionMetadata {
    pub year: Year,
    pub description: String,
    #[serde(flatten)]
    pub kind: TransactionKind,
}

impl TransactionMetadata {
    pub fn deposit(year: Year, description: &str) -> Self {
        Self {
            year,
            description: description.to_string(),
            kind: TransactionKind::Deposit,
        }
    }

    pub fn fee_revenue(year: Year, schedules: &[String], projects: usize) -> Self {
        Self {
            year,
            description: format!("{} fees", schedules.join(", ")),
            kind: TransactionKind::FeeRevenue {
                schedules: schedules.to_vec(),
                projects,
            },
        }
    }

    pub fn subsidy(year: Year, policy: &str, parcel_ids: Vec<ParcelId>) -> Self {
        Self {
            year,
            description: format!("{} subsidy", policy),
            kind: TransactionKind::Subsidy {
                policy: policy.to_string(),
                parcel_ids,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Positive for deposits, negative for withdrawals
    pub amount: Money,
    pub subaccount: SubaccountId,
    #[serde(flatten)]
    pub metadata: TransactionMetadata,
}

/// A named budget split into subaccounts
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Account {
    pub name: String,
    transactions: Vec<Transaction>,
    /// Subaccounts in order of first reference
    subaccounts: Vec<SubaccountId>,
    balances: AHashMap<SubaccountId, Money>,
    total: Money,
}

impl Account {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Append a transaction. There is no overdraft check; callers enforce
    /// their budget before withdrawing.
    pub fn deposit(&mut self, amount: Money, subaccount: SubaccountId, metadata: TransactionMetadata) {
        match self.balances.get_mut(&subaccount) {
            Some(balance) => *balance += amount,
            None => {
                self.balances.insert(subaccount.clone(), amount);
                self.subaccounts.push(subaccount.clone());
            }
        }
        self.total += amount;
        self.transactions.push(Transaction {
            amount,
            subaccount,
            metadata,
        });
    }

    pub fn withdraw(&mut self, amount: Money, subaccount: SubaccountId, metadata: TransactionMetadata) {
        self.deposit(-amount, subaccount, metadata);
    }

    /// Sum of every transaction against a subaccount; zero if never referenced
    pub fn balance(&self, subaccount: &SubaccountId) -> Money {
        self.balances.get(subaccount).copied().unwrap_or(0.0)
    }

    pub fn total_balance(&self) -> Money {
        self.total
    }

    /// Subaccounts that currently hold funds, in order of first deposit
    ///
    /// The returned iterator is lazy and can be cloned to restart it.
    pub fn iterate_subaccounts(&self) -> SubaccountIter<'_> {
        SubaccountIter {
            account: self,
            next: 0,
        }
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn subaccounts(&self) -> &[SubaccountId] {
        &self.subaccounts
    }

    /// Balance of every subaccount ever referenced, funded or not
    pub fn total_by_subaccount(&self) -> Vec<(SubaccountId, Money)> {
        self.subaccounts
            .iter()
            .map(|s| (s.clone(), self.balance(s)))
            .collect()
    }

    /// Money withdrawn during a year, as a positive amount
    pub fn spent_in_year(&self, year: Year) -> Money {
        self.transactions
            .iter()
            .filter(|t| t.metadata.year == year && t.amount < 0.0)
            .map(|t| -t.amount)
            .sum()
    }

    pub fn deposited_in_year(&self, year: Year) -> Money {
        self.transactions
            .iter()
            .filter(|t| t.metadata.year == year && t.amount > 0.0)
            .map(|t| t.amount)
            .sum()
    }
}

/// Lazy walk over funded subaccounts
#[derive(Debug, Clone)]
pub struct SubaccountIter<'a> {
    account: &'a Account,
    next: usize,
}

impl Iterator for SubaccountIter<'_> {
    type Item = (SubaccountId, Money);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(sub) = self.account.subaccounts.get(self.next) {
            self.next += 1;
            let balance = self.account.balance(sub);
            if balance > 0.0 {
                return Some((sub.clone(), balance));
            }
        }
        None
    }
}
