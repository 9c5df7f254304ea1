//! Storage layer using RocksDB
//!
//! # Column Families
//!
//! - `accounts` - Ledger accounts (key: account code)
//! - `transactions` - Committed transaction headers (key: transaction_id)
//! - `entries` - Committed entries (key: entry_id)
//! - `indices` - Secondary indices (account code || entry_id)
//!
//! A transaction and all of its entries commit through a single
//! `WriteBatch`: either everything lands or nothing does.

use crate::{
    error::{Error, Result},
    types::{Account, AccountCode, Entry, Transaction},
    Config,
};
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, DBCompactionStyle, Direction as IterDirection,
    IteratorMode, Options, WriteBatch, DB,
};
use std::sync::Arc;
use uuid::Uuid;

/// Column family names
const CF_ACCOUNTS: &str = "accounts";
const CF_TRANSACTIONS: &str = "transactions";
const CF_ENTRIES: &str = "entries";
const CF_INDICES: &str = "indices";

/// Index key separator (rejected in account codes at creation)
const SEP: u8 = b'|';

/// Storage wrapper for RocksDB
pub struct Storage {
    db: Arc<DB>,
}

impl Storage {
    /// Open or create database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;

        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        // Tuning from config
        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_target_file_size_base(config.rocksdb.target_file_size_mb * 1024 * 1024);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);

        // Universal compaction for the append-heavy entry log
        db_opts.set_compaction_style(DBCompactionStyle::Universal);

        if config.rocksdb.enable_statistics {
            db_opts.enable_statistics();
        }

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_ACCOUNTS, Self::cf_options_accounts()),
            ColumnFamilyDescriptor::new(CF_TRANSACTIONS, Self::cf_options_transactions()),
            ColumnFamilyDescriptor::new(CF_ENTRIES, Self::cf_options_entries()),
            ColumnFamilyDescriptor::new(CF_INDICES, Self::cf_options_indices()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        tracing::info!(path = ?path, "Opened ledger RocksDB");

        Ok(Self { db: Arc::new(db) })
    }

    // Column family options

    fn cf_options_accounts() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn cf_options_transactions() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
        opts
    }

    fn cf_options_entries() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
        opts.set_bottommost_compression_type(rocksdb::DBCompressionType::Zstd);
        opts
    }

    fn cf_options_indices() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        // Indices benefit from bloom filters
        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        opts.set_block_based_table_factory(&block_opts);
        opts
    }

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", name)))
    }

    // Account operations

    /// Put account (keyed by code)
    pub fn put_account(&self, account: &Account) -> Result<()> {
        let cf = self.cf_handle(CF_ACCOUNTS)?;
        let value = bincode::serialize(account)?;
        self.db.put_cf(cf, account.code.as_str().as_bytes(), &value)?;

        tracing::debug!(code = %account.code, "Account stored");

        Ok(())
    }

    /// Get account by code
    pub fn get_account(&self, code: &AccountCode) -> Result<Option<Account>> {
        let cf = self.cf_handle(CF_ACCOUNTS)?;

        match self.db.get_cf(cf, code.as_str().as_bytes())? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    // Transaction operations

    /// Commit a transaction with all entries and indices atomically
    pub fn post_atomic(&self, transaction: &Transaction, entries: &[Entry]) -> Result<()> {
        let mut batch = WriteBatch::default();

        // 1. Transaction header
        let cf_txn = self.cf_handle(CF_TRANSACTIONS)?;
        let txn_value = bincode::serialize(transaction)?;
        batch.put_cf(cf_txn, transaction.transaction_id.as_bytes(), &txn_value);

        // 2. Entries + account index
        let cf_entries = self.cf_handle(CF_ENTRIES)?;
        let cf_indices = self.cf_handle(CF_INDICES)?;

        for entry in entries {
            let entry_value = bincode::serialize(entry)?;
            batch.put_cf(cf_entries, entry.entry_id.as_bytes(), &entry_value);

            let idx = Self::index_key_account_entry(&entry.account, entry.entry_id);
            batch.put_cf(cf_indices, &idx, &[]);
        }

        // Atomic commit
        self.db.write(batch)?;

        tracing::debug!(
            transaction_id = %transaction.transaction_id,
            entry_count = entries.len(),
            "Transaction committed"
        );

        Ok(())
    }

    /// Get transaction by ID
    pub fn get_transaction(&self, transaction_id: Uuid) -> Result<Transaction> {
        let cf = self.cf_handle(CF_TRANSACTIONS)?;

        let value = self
            .db
            .get_cf(cf, transaction_id.as_bytes())?
            .ok_or_else(|| Error::TransactionNotFound(transaction_id.to_string()))?;

        Ok(bincode::deserialize(&value)?)
    }

    /// Get entry by ID
    pub fn get_entry(&self, entry_id: Uuid) -> Result<Entry> {
        let cf = self.cf_handle(CF_ENTRIES)?;

        let value = self
            .db
            .get_cf(cf, entry_id.as_bytes())?
            .ok_or_else(|| Error::EntryNotFound(entry_id.to_string()))?;

        Ok(bincode::deserialize(&value)?)
    }

    /// Get all entries posted against an account (via index scan)
    pub fn entries_for_account(&self, code: &AccountCode) -> Result<Vec<Entry>> {
        let cf_indices = self.cf_handle(CF_INDICES)?;

        let mut prefix = code.as_str().as_bytes().to_vec();
        prefix.push(SEP);

        let iter = self.db.iterator_cf(
            cf_indices,
            IteratorMode::From(&prefix, IterDirection::Forward),
        );

        let mut entries = Vec::new();
        for item in iter {
            let (key, _) = item?;

            if !key.starts_with(&prefix) {
                break;
            }

            // Entry ID is the trailing 16 bytes of the index key
            if key.len() >= prefix.len() + 16 {
                let entry_id_bytes: [u8; 16] =
                    key[key.len() - 16..].try_into().map_err(|_| {
                        Error::Storage("Malformed index key".to_string())
                    })?;
                entries.push(self.get_entry(Uuid::from_bytes(entry_id_bytes))?);
            }
        }

        Ok(entries)
    }

    /// Get all entries of a transaction
    pub fn entries_for_transaction(&self, transaction: &Transaction) -> Result<Vec<Entry>> {
        transaction
            .entry_ids
            .iter()
            .map(|id| self.get_entry(*id))
            .collect()
    }

    // Index key helpers

    fn index_key_account_entry(account: &AccountCode, entry_id: Uuid) -> Vec<u8> {
        let mut key = account.as_str().as_bytes().to_vec();
        key.push(SEP);
        key.extend_from_slice(entry_id.as_bytes());
        key
    }

    /// Close database (graceful shutdown)
    pub fn close(self) -> Result<()> {
        drop(self.db);
        tracing::info!("Ledger RocksDB closed");
        Ok(())
    }
}
