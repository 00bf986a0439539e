//! Data models for the banking API.
//!
//! This module contains the resource shapes the console reads and writes:
//!
//! - `Account`, `NewAccount`: accounts plus balance and round-up responses
//! - `Transaction`, `NewTransaction`: payments, withdrawals, deposits, transfers
//! - `Business`, `NewBusiness`: merchants with their sanction flag
//! - `Money`: monetary amounts, which the API sends as strings or numbers

pub mod account;
pub mod business;
pub mod money;
pub mod transaction;

pub use account::{Account, CurrentBalance, NewAccount, RoundUpReclaim, RoundUpStatus, SpendingTrend};
pub use business::{Business, NewBusiness};
pub use money::Money;
pub use transaction::{Direction, NewTransaction, TopSpender, Transaction, TransactionType};
