//! Balance collaborator. Every method is a single atomic adjustment under
//! the ledger's own lock, so two rooms racing debits against one address
//! can never both pass a balance check that only one of them should.

use std::collections::HashMap;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::ids::Address;

const LOG_TARGET: &str = "arena::ledger";

/// Which balance of an address an operation touches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Purse {
    /// Persistent in-game currency; antes and pots move through it.
    Currency,
    /// Spectator betting credits.
    Credits,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("{address} has {available} in {purse:?}, needs {needed}")]
    InsufficientFunds {
        address: Address,
        purse: Purse,
        needed: u64,
        available: u64,
    },
    #[error("pool {pool} holds {available}, cannot release {needed}")]
    PoolExhausted {
        pool: String,
        needed: u64,
        available: u64,
    },
    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}

/// Betting-credit view of an address.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditLedgerEntry {
    pub balance: u64,
    /// Sizes default wagers.
    pub lifetime_deposited: u64,
}

pub trait Ledger: Send + Sync {
    /// Remove `amount` from a purse. Returns the new balance.
    fn debit(&self, address: &Address, purse: Purse, amount: u64) -> Result<u64, LedgerError>;

    /// Add `amount` to a purse. Returns the new balance.
    fn credit(&self, address: &Address, purse: Purse, amount: u64) -> Result<u64, LedgerError>;

    /// Move currency from an address into a named pool.
    fn escrow(&self, address: &Address, pool: &str, amount: u64) -> Result<(), LedgerError>;

    /// Release currency from a named pool to an address.
    fn transfer(&self, pool: &str, to: &Address, amount: u64) -> Result<(), LedgerError>;

    fn balance(&self, address: &Address, purse: Purse) -> u64;

    fn pool_balance(&self, pool: &str) -> u64;

    /// Turn persistent currency into betting credits.
    fn deposit_credits(&self, address: &Address, amount: u64)
        -> Result<CreditLedgerEntry, LedgerError>;

    /// Convert every remaining credit back into currency at 1:1. Returns
    /// the amount converted.
    fn convert_credits(&self, address: &Address) -> Result<u64, LedgerError>;

    fn credit_entry(&self, address: &Address) -> CreditLedgerEntry;
}

#[derive(Clone, Copy, Debug, Default)]
struct AccountRecord {
    currency: u64,
    credits: u64,
    lifetime_deposited: u64,
}

impl AccountRecord {
    fn purse_mut(&mut self, purse: Purse) -> &mut u64 {
        match purse {
            Purse::Currency => &mut self.currency,
            Purse::Credits => &mut self.credits,
        }
    }

    fn purse(&self, purse: Purse) -> u64 {
        match purse {
            Purse::Currency => self.currency,
            Purse::Credits => self.credits,
        }
    }
}

#[derive(Debug, Default)]
struct Book {
    accounts: HashMap<Address, AccountRecord>,
    pools: HashMap<String, u64>,
}

impl Book {
    fn take(&mut self, address: &Address, purse: Purse, amount: u64) -> Result<u64, LedgerError> {
        let record = self.accounts.entry(address.clone()).or_default();
        let available = record.purse(purse);
        if available < amount {
            return Err(LedgerError::InsufficientFunds {
                address: address.clone(),
                purse,
                needed: amount,
                available,
            });
        }
        let slot = record.purse_mut(purse);
        *slot -= amount;
        Ok(*slot)
    }

    fn give(&mut self, address: &Address, purse: Purse, amount: u64) -> u64 {
        let record = self.accounts.entry(address.clone()).or_default();
        let slot = record.purse_mut(purse);
        *slot = slot.saturating_add(amount);
        *slot
    }
}

/// Process-local ledger. Stands in for the external balance service.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    book: Mutex<Book>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create currency out of thin air (faucet / test funding).
    pub fn mint(&self, address: &Address, amount: u64) -> u64 {
        self.book.lock().give(address, Purse::Currency, amount)
    }
}

impl Ledger for InMemoryLedger {
    fn debit(&self, address: &Address, purse: Purse, amount: u64) -> Result<u64, LedgerError> {
        self.book.lock().take(address, purse, amount)
    }

    fn credit(&self, address: &Address, purse: Purse, amount: u64) -> Result<u64, LedgerError> {
        Ok(self.book.lock().give(address, purse, amount))
    }

    fn escrow(&self, address: &Address, pool: &str, amount: u64) -> Result<(), LedgerError> {
        let mut book = self.book.lock();
        book.take(address, Purse::Currency, amount)?;
        let held = book.pools.entry(pool.to_string()).or_default();
        *held = held.saturating_add(amount);
        debug!(target: LOG_TARGET, %address, pool, amount, "escrowed");
        Ok(())
    }

    fn transfer(&self, pool: &str, to: &Address, amount: u64) -> Result<(), LedgerError> {
        let mut book = self.book.lock();
        let available = book.pools.get(pool).copied().unwrap_or(0);
        if available < amount {
            return Err(LedgerError::PoolExhausted {
                pool: pool.to_string(),
                needed: amount,
                available,
            });
        }
        if available == amount {
            book.pools.remove(pool);
        } else {
            book.pools.insert(pool.to_string(), available - amount);
        }
        book.give(to, Purse::Currency, amount);
        debug!(target: LOG_TARGET, pool, to = %to, amount, "released from pool");
        Ok(())
    }

    fn balance(&self, address: &Address, purse: Purse) -> u64 {
        self.book
            .lock()
            .accounts
            .get(address)
            .map(|r| r.purse(purse))
            .unwrap_or(0)
    }

    fn pool_balance(&self, pool: &str) -> u64 {
        self.book.lock().pools.get(pool).copied().unwrap_or(0)
    }

    fn deposit_credits(
        &self,
        address: &Address,
        amount: u64,
    ) -> Result<CreditLedgerEntry, LedgerError> {
        let mut book = self.book.lock();
        book.take(address, Purse::Currency, amount)?;
        let record = book.accounts.entry(address.clone()).or_default();
        record.credits = record.credits.saturating_add(amount);
        record.lifetime_deposited = record.lifetime_deposited.saturating_add(amount);
        Ok(CreditLedgerEntry {
            balance: record.credits,
            lifetime_deposited: record.lifetime_deposited,
        })
    }

    fn convert_credits(&self, address: &Address) -> Result<u64, LedgerError> {
        let mut book = self.book.lock();
        let Some(record) = book.accounts.get_mut(address) else {
            return Ok(0);
        };
        let amount = record.credits;
        record.credits = 0;
        record.currency = record.currency.saturating_add(amount);
        Ok(amount)
    }

    fn credit_entry(&self, address: &Address) -> CreditLedgerEntry {
        self.book
            .lock()
            .accounts
            .get(address)
            .map(|r| CreditLedgerEntry {
                balance: r.credits,
                lifetime_deposited: r.lifetime_deposited,
            })
            .unwrap_or_default()
    }
}
