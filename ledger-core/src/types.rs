//! Core types for the double-entry ledger
//!
//! All types are designed for:
//! - Deterministic serialization (bincode)
//! - Memory safety (no unsafe code)
//! - Exact arithmetic (Decimal for money)

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Account code (unique ledger-wide, e.g. "DRV-42-RECEIVABLE")
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountCode(String);

impl AccountCode {
    /// Create new account code
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// ISO 4217 currency code
///
/// The ledger posts everything in a single base currency (USD); entry-level
/// currencies are informational for cross-border reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Currency {
    /// US Dollar (base currency)
    USD,
    /// Euro
    EUR,
    /// Kenyan Shilling
    KES,
    /// Ugandan Shilling
    UGX,
    /// Ethiopian Birr
    ETB,
}

impl Currency {
    /// ISO 4217 code
    pub fn code(&self) -> &'static str {
        match self {
            Currency::USD => "USD",
            Currency::EUR => "EUR",
            Currency::KES => "KES",
            Currency::UGX => "UGX",
            Currency::ETB => "ETB",
        }
    }

    /// Parse from string
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "USD" => Some(Currency::USD),
            "EUR" => Some(Currency::EUR),
            "KES" => Some(Currency::KES),
            "UGX" => Some(Currency::UGX),
            "ETB" => Some(Currency::ETB),
            _ => None,
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Account type with double-entry sign conventions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum AccountType {
    /// Resources owned (debit-increase)
    Asset = 1,
    /// Obligations owed (credit-increase)
    Liability = 2,
    /// Revenue (credit-increase)
    Income = 3,
    /// Costs (debit-increase)
    Expense = 4,
    /// Owner stake (credit-increase)
    Equity = 5,
}

impl AccountType {
    /// Direction that increases this account's balance
    pub fn natural_direction(&self) -> Direction {
        match self {
            AccountType::Asset | AccountType::Expense => Direction::Debit,
            AccountType::Liability | AccountType::Income | AccountType::Equity => {
                Direction::Credit
            }
        }
    }
}

/// Owning entity behind a ledger account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountOwner {
    /// Producing farm
    Farm(String),
    /// Freight driver
    Driver(String),
    /// The platform itself (system accounts)
    Platform,
    /// Generic platform user
    User(String),
}

/// Ledger account
///
/// Its balance is derived from the entry set, never stored directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Unique account code
    pub code: AccountCode,

    /// Account type (sign convention)
    pub account_type: AccountType,

    /// Account currency
    pub currency: Currency,

    /// Owning entity
    pub owner: AccountOwner,

    /// System-managed account flag
    pub system: bool,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Debit/credit direction of an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum Direction {
    /// Debit side
    Debit = 1,
    /// Credit side
    Credit = 2,
}

/// Kind of financial movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum TransactionType {
    /// Freight payment locked into escrow
    EscrowHold = 1,
    /// Escrow released to the driver after delivery proof
    EscrowRelease = 2,
    /// Escrow returned after dispute resolution
    EscrowRefund = 3,
    /// Carbon credit minted (sibling domain)
    CarbonMint = 4,
    /// Carbon/ESG credit sold (sibling domain)
    CreditSale = 5,
    /// Correction of a prior transaction
    Reversal = 6,
}

/// Committed ledger transaction header
///
/// Append-only: once committed, neither the transaction nor its entries
/// may be edited. Corrections post new reversing transactions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique transaction ID (UUIDv7 for time-ordering)
    pub transaction_id: Uuid,

    /// Kind of movement
    pub transaction_type: TransactionType,

    /// Human-readable description
    pub description: String,

    /// Base currency of the posting
    pub base_currency: Currency,

    /// Total debit-side base amount
    pub base_amount: Decimal,

    /// Optional external reference (escrow ID, batch ID, ...)
    pub external_ref: Option<String>,

    /// Commit timestamp
    pub posted_at: DateTime<Utc>,

    /// Entry IDs in posting order
    pub entry_ids: Vec<Uuid>,
}

/// Committed ledger entry
///
/// Belongs to exactly one transaction and one account; never exists
/// outside a balanced transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    /// Unique entry ID
    pub entry_id: Uuid,

    /// Owning transaction
    pub transaction_id: Uuid,

    /// Account posted against
    pub account: AccountCode,

    /// Debit or credit
    pub direction: Direction,

    /// Amount in the entry currency
    pub amount: Decimal,

    /// Entry currency
    pub currency: Currency,

    /// Amount in the base currency
    pub base_amount: Decimal,

    /// Memo line
    pub memo: String,
}

/// Entry awaiting commit, built by callers of `post_transaction`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryDraft {
    /// Account posted against
    pub account: AccountCode,

    /// Debit or credit
    pub direction: Direction,

    /// Amount in the entry currency
    pub amount: Decimal,

    /// Entry currency
    pub currency: Currency,

    /// Amount in the base currency
    pub base_amount: Decimal,

    /// Memo line
    pub memo: String,
}

impl EntryDraft {
    /// Debit draft in a single currency (amount == base amount)
    pub fn debit(account: AccountCode, amount: Decimal, currency: Currency, memo: impl Into<String>) -> Self {
        Self {
            account,
            direction: Direction::Debit,
            amount,
            currency,
            base_amount: amount,
            memo: memo.into(),
        }
    }

    /// Credit draft in a single currency (amount == base amount)
    pub fn credit(account: AccountCode, amount: Decimal, currency: Currency, memo: impl Into<String>) -> Self {
        Self {
            account,
            direction: Direction::Credit,
            amount,
            currency,
            base_amount: amount,
            memo: memo.into(),
        }
    }
}

/// Sum the debit and credit base amounts of a draft set
pub fn balance_totals(drafts: &[EntryDraft]) -> (Decimal, Decimal) {
    let mut debits = Decimal::ZERO;
    let mut credits = Decimal::ZERO;
    for draft in drafts {
        match draft.direction {
            Direction::Debit => debits += draft.base_amount,
            Direction::Credit => credits += draft.base_amount,
        }
    }
    (debits, credits)
}
