//! Budget accounts and the coffer holding them

pub mod account;
pub mod coffer;

pub use account::{Account, SubaccountIter, Transaction, TransactionKind, TransactionMetadata};
pub use coffer::{AccountBalance, AccountDefinition, Coffer, SubaccountDeposit};
