//! Double-entry ledger engine
//!
//! The only way the rest of the system moves value. Every posting is
//! validated (Σ debits == Σ credits in the base currency) before anything
//! touches storage, then the transaction and all of its entries commit in
//! a single atomic batch. Account balances are always derived from the
//! entry set, never cached and mutated.
//!
//! # Example
//!
//! ```no_run
//! use ledger_core::{Config, LedgerEngine};
//! use ledger_core::types::{AccountCode, AccountOwner, AccountType, Currency, EntryDraft, TransactionType};
//! use rust_decimal::Decimal;
//!
//! fn main() -> ledger_core::Result<()> {
//!     let engine = LedgerEngine::open(Config::default())?;
//!
//!     let escrow = engine.get_or_create_account(
//!         AccountCode::new("PLATFORM-ESCROW-LIABILITY"),
//!         AccountType::Liability,
//!         Currency::USD,
//!         AccountOwner::Platform,
//!         true,
//!     )?;
//!     let driver = engine.get_or_create_account(
//!         AccountCode::new("DRV-1-RECEIVABLE"),
//!         AccountType::Asset,
//!         Currency::USD,
//!         AccountOwner::Driver("DRV-1".into()),
//!         false,
//!     )?;
//!
//!     let amount = Decimal::new(42500, 2);
//!     engine.post_transaction(
//!         TransactionType::EscrowHold,
//!         "freight escrow hold",
//!         Currency::USD,
//!         vec![
//!             EntryDraft::debit(escrow.code, amount, Currency::USD, "hold"),
//!             EntryDraft::credit(driver.code, amount, Currency::USD, "hold"),
//!         ],
//!         None,
//!     )?;
//!     Ok(())
//! }
//! ```

use crate::{
    metrics::Metrics,
    types::{
        balance_totals, Account, AccountCode, AccountOwner, AccountType, Currency, Entry,
        EntryDraft, Transaction, TransactionType,
    },
    Config, Error, Result, Storage,
};
use chrono::Utc;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

/// Double-entry ledger engine
pub struct LedgerEngine {
    /// Storage layer
    storage: Arc<Storage>,

    /// Serializes the lookup-or-create path per engine
    create_lock: Mutex<()>,

    /// Prometheus metrics
    metrics: Metrics,
}

impl LedgerEngine {
    /// Open engine with configuration
    pub fn open(config: Config) -> Result<Self> {
        let storage = Arc::new(Storage::open(&config)?);
        let metrics =
            Metrics::new().map_err(|e| Error::Config(format!("Metrics init failed: {}", e)))?;

        Ok(Self {
            storage,
            create_lock: Mutex::new(()),
            metrics,
        })
    }

    /// Idempotent lookup-or-create, keyed by account code
    ///
    /// Concurrent calls for the same code resolve to a single account:
    /// the create path is double-checked under a lock. An existing code
    /// with a conflicting account type is a validation error. Codes must
    /// be non-empty and must not contain `|`, which delimits the entry
    /// index keys: a code like `A|B` would alias account `A`'s index
    /// prefix and leak its entries into `A`'s balance.
    pub fn get_or_create_account(
        &self,
        code: AccountCode,
        account_type: AccountType,
        currency: Currency,
        owner: AccountOwner,
        system: bool,
    ) -> Result<Account> {
        if code.as_str().is_empty() || code.as_str().contains('|') {
            return Err(Error::Validation(format!(
                "Account code {:?} must be non-empty and must not contain '|'",
                code.as_str()
            )));
        }

        if let Some(existing) = self.storage.get_account(&code)? {
            return Self::check_type(existing, account_type);
        }

        let _guard = self.create_lock.lock();

        // Re-check under the lock: another caller may have won
        if let Some(existing) = self.storage.get_account(&code)? {
            return Self::check_type(existing, account_type);
        }

        let account = Account {
            code: code.clone(),
            account_type,
            currency,
            owner,
            system,
            created_at: Utc::now(),
        };
        self.storage.put_account(&account)?;
        self.metrics.record_account_created();

        tracing::info!(code = %code, account_type = ?account_type, "Account created");

        Ok(account)
    }

    fn check_type(existing: Account, requested: AccountType) -> Result<Account> {
        if existing.account_type != requested {
            return Err(Error::Validation(format!(
                "Account {} exists as {:?}, requested {:?}",
                existing.code, existing.account_type, requested
            )));
        }
        Ok(existing)
    }

    /// Get account by code
    pub fn get_account(&self, code: &AccountCode) -> Result<Account> {
        self.storage
            .get_account(code)?
            .ok_or_else(|| Error::AccountNotFound(code.to_string()))
    }

    /// Validate and atomically commit a balanced transaction
    ///
    /// Fails with [`Error::Imbalance`] before any persistence if the
    /// debit and credit base amounts differ. On success the transaction
    /// and all entries commit in one batch; partial writes cannot occur.
    pub fn post_transaction(
        &self,
        transaction_type: TransactionType,
        description: impl Into<String>,
        base_currency: Currency,
        drafts: Vec<EntryDraft>,
        external_ref: Option<String>,
    ) -> Result<Transaction> {
        let started = std::time::Instant::now();

        if drafts.len() < 2 {
            return Err(Error::Validation(
                "A transaction requires at least one debit and one credit entry".to_string(),
            ));
        }

        for draft in &drafts {
            if draft.amount <= Decimal::ZERO || draft.base_amount <= Decimal::ZERO {
                return Err(Error::Validation(format!(
                    "Entry amount must be positive (account {})",
                    draft.account
                )));
            }
            // Accounts are created lazily by callers before posting
            if self.storage.get_account(&draft.account)?.is_none() {
                return Err(Error::AccountNotFound(draft.account.to_string()));
            }
        }

        let (debits, credits) = balance_totals(&drafts);
        if debits != credits {
            self.metrics.record_imbalance_rejection();
            tracing::error!(
                %debits,
                %credits,
                transaction_type = ?transaction_type,
                "Unbalanced posting rejected"
            );
            return Err(Error::Imbalance { debits, credits });
        }

        let transaction_id = Uuid::now_v7();
        let entries: Vec<Entry> = drafts
            .into_iter()
            .map(|draft| Entry {
                entry_id: Uuid::now_v7(),
                transaction_id,
                account: draft.account,
                direction: draft.direction,
                amount: draft.amount,
                currency: draft.currency,
                base_amount: draft.base_amount,
                memo: draft.memo,
            })
            .collect();

        let transaction = Transaction {
            transaction_id,
            transaction_type,
            description: description.into(),
            base_currency,
            base_amount: debits,
            external_ref,
            posted_at: Utc::now(),
            entry_ids: entries.iter().map(|e| e.entry_id).collect(),
        };

        self.storage.post_atomic(&transaction, &entries)?;
        self.metrics.record_transaction();
        self.metrics
            .record_post_duration(started.elapsed().as_secs_f64());

        tracing::info!(
            transaction_id = %transaction_id,
            transaction_type = ?transaction_type,
            base_amount = %transaction.base_amount,
            "Transaction posted"
        );

        Ok(transaction)
    }

    /// Derived account balance
    ///
    /// Sums entries by the account type's natural sign convention:
    /// Asset/Expense increase on debit, Liability/Income/Equity on credit.
    pub fn account_balance(&self, code: &AccountCode) -> Result<Decimal> {
        let account = self.get_account(code)?;
        let natural = account.account_type.natural_direction();

        let mut balance = Decimal::ZERO;
        for entry in self.storage.entries_for_account(code)? {
            if entry.direction == natural {
                balance += entry.base_amount;
            } else {
                balance -= entry.base_amount;
            }
        }

        Ok(balance)
    }

    /// Get transaction by ID
    pub fn get_transaction(&self, transaction_id: Uuid) -> Result<Transaction> {
        self.storage.get_transaction(transaction_id)
    }

    /// All entries posted against an account
    pub fn entries_for_account(&self, code: &AccountCode) -> Result<Vec<Entry>> {
        self.storage.entries_for_account(code)
    }

    /// All entries of a transaction
    pub fn entries_for_transaction(&self, transaction_id: Uuid) -> Result<Vec<Entry>> {
        let transaction = self.storage.get_transaction(transaction_id)?;
        self.storage.entries_for_transaction(&transaction)
    }

    /// Metrics registry for scraping
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }
}
