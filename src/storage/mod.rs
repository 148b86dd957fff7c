// Persistence seam
//
// The core only needs keyed get/put/delete with a version check:
// transactions by (owner_id, id), budget documents by owner_id.
// Every write is a compare-and-set against the version the caller read.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryRepository;
pub use sqlite::SqliteRepository;

use crate::budget::BudgetDocument;
use crate::error::Result;
use crate::model::Transaction;

/// Result of an insert that may carry an idempotency fingerprint
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome {
    Inserted,
    /// A record with the same fingerprint already exists for this owner
    Duplicate(Transaction),
}

pub trait TransactionRepository: Send + Sync {
    fn get_transaction(&self, owner_id: &str, id: &str) -> Result<Option<Transaction>>;

    fn list_transactions(&self, owner_id: &str) -> Result<Vec<Transaction>>;

    fn insert_transaction(&self, tx: &Transaction, fingerprint: Option<&str>) -> Result<InsertOutcome>;

    /// Overwrite the stored record iff its version still equals `expected_version`.
    /// Returns false when the record is gone or has moved on.
    fn replace_transaction(&self, tx: &Transaction, expected_version: i64) -> Result<bool>;

    /// Delete iff owner, id and version all match
    fn delete_transaction(&self, owner_id: &str, id: &str, expected_version: i64) -> Result<bool>;

    /// Cheap liveness check
    fn ping(&self) -> Result<()> {
        Ok(())
    }
}

pub trait BudgetRepository: Send + Sync {
    fn load_budgets(&self, owner_id: &str) -> Result<Option<BudgetDocument>>;

    /// Store `doc` iff the stored version equals `expected_version`
    /// (0 = no document stored yet). `doc.version` is the new version.
    fn save_budgets(&self, doc: &BudgetDocument, expected_version: i64) -> Result<bool>;
}
