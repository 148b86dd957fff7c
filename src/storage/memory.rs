// In-memory repository, used by tests and throwaway sessions.
// Same compare-and-set contract as the SQLite backend.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{BudgetRepository, InsertOutcome, TransactionRepository};
use crate::budget::BudgetDocument;
use crate::error::{FinanceError, Result};
use crate::model::Transaction;

#[derive(Debug, Clone)]
struct StoredTransaction {
    tx: Transaction,
    fingerprint: Option<String>,
}

#[derive(Debug, Default)]
pub struct MemoryRepository {
    /// Insertion order is preserved
    transactions: Arc<RwLock<Vec<StoredTransaction>>>,
    budgets: Arc<RwLock<HashMap<String, BudgetDocument>>>,
}

fn poisoned() -> FinanceError {
    FinanceError::Storage("in-memory store lock poisoned".to_string())
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn read_transactions(&self) -> Result<RwLockReadGuard<'_, Vec<StoredTransaction>>> {
        self.transactions.read().map_err(|_| poisoned())
    }

    fn write_transactions(&self) -> Result<RwLockWriteGuard<'_, Vec<StoredTransaction>>> {
        self.transactions.write().map_err(|_| poisoned())
    }
}

impl TransactionRepository for MemoryRepository {
    fn get_transaction(&self, owner_id: &str, id: &str) -> Result<Option<Transaction>> {
        let stored = self.read_transactions()?;
        Ok(stored
            .iter()
            .find(|s| s.tx.owner_id == owner_id && s.tx.id == id)
            .map(|s| s.tx.clone()))
    }

    fn list_transactions(&self, owner_id: &str) -> Result<Vec<Transaction>> {
        let stored = self.read_transactions()?;
        // Newest insert first, matching the SQLite ordering on ties
        Ok(stored
            .iter()
            .rev()
            .filter(|s| s.tx.owner_id == owner_id)
            .map(|s| s.tx.clone())
            .collect())
    }

    fn insert_transaction(&self, tx: &Transaction, fingerprint: Option<&str>) -> Result<InsertOutcome> {
        let mut stored = self.write_transactions()?;

        if let Some(fp) = fingerprint {
            if let Some(existing) = stored.iter().find(|s| s.fingerprint.as_deref() == Some(fp)) {
                return Ok(InsertOutcome::Duplicate(existing.tx.clone()));
            }
        }

        if stored.iter().any(|s| s.tx.id == tx.id) {
            return Err(FinanceError::Storage(format!("duplicate transaction id: {}", tx.id)));
        }

        stored.push(StoredTransaction {
            tx: tx.clone(),
            fingerprint: fingerprint.map(str::to_string),
        });
        Ok(InsertOutcome::Inserted)
    }

    fn replace_transaction(&self, tx: &Transaction, expected_version: i64) -> Result<bool> {
        let mut stored = self.write_transactions()?;

        match stored
            .iter_mut()
            .find(|s| s.tx.owner_id == tx.owner_id && s.tx.id == tx.id)
        {
            Some(current) if current.tx.version == expected_version => {
                current.tx = tx.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn delete_transaction(&self, owner_id: &str, id: &str, expected_version: i64) -> Result<bool> {
        let mut stored = self.write_transactions()?;

        let Some(index) = stored.iter().position(|s| {
            s.tx.owner_id == owner_id && s.tx.id == id && s.tx.version == expected_version
        }) else {
            return Ok(false);
        };

        stored.remove(index);
        Ok(true)
    }
}

impl BudgetRepository for MemoryRepository {
    fn load_budgets(&self, owner_id: &str) -> Result<Option<BudgetDocument>> {
        let docs = self.budgets.read().map_err(|_| poisoned())?;
        Ok(docs.get(owner_id).cloned())
    }

    fn save_budgets(&self, doc: &BudgetDocument, expected_version: i64) -> Result<bool> {
        let mut docs = self.budgets.write().map_err(|_| poisoned())?;

        let stored_version = docs.get(&doc.owner_id).map(|d| d.version).unwrap_or(0);
        if stored_version != expected_version {
            return Ok(false);
        }

        docs.insert(doc.owner_id.clone(), doc.clone());
        Ok(true)
    }
}
