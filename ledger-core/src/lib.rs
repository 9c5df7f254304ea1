//! AgriRail Ledger Core
//!
//! Double-entry accounting ledger for freight settlement. The single
//! source of financial truth: every subsystem (escrow release, carbon
//! minting, credit sales) moves value exclusively through
//! [`LedgerEngine::post_transaction`].
//!
//! # Invariants
//!
//! - Balance: Σ(debit base amounts) == Σ(credit base amounts) per transaction
//! - Atomicity: a transaction and its entries commit in one batch or not at all
//! - Append-only: transactions and entries are never modified or deleted
//! - Derived balances: account balances are computed from entries, never stored

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod config;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod storage;
pub mod types;

// Re-exports
pub use config::Config;
pub use engine::LedgerEngine;
pub use error::{Error, Result};
pub use storage::Storage;
pub use types::{
    Account, AccountCode, AccountOwner, AccountType, Currency, Direction, Entry, EntryDraft,
    Transaction, TransactionType,
};
