use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};

use super::{BudgetRepository, InsertOutcome, TransactionRepository};
use crate::budget::BudgetDocument;
use crate::error::{FinanceError, Result};
use crate::model::{Transaction, TransactionType};

/// SQLite-backed repository (one connection, serialized behind a mutex)
pub struct SqliteRepository {
    conn: Mutex<Connection>,
}

impl SqliteRepository {
    pub fn open(db_path: &Path) -> Result<Self> {
        let conn = Connection::open(db_path)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    pub fn from_connection(conn: Connection) -> Result<Self> {
        setup_database(&conn)?;
        Ok(SqliteRepository {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| FinanceError::Storage("database connection lock poisoned".to_string()))
    }
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    // ==========================================================================
    // Transactions Table
    // amount is TEXT so decimals survive exactly
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS transactions (
            row_id INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT UNIQUE NOT NULL,
            owner_id TEXT NOT NULL,
            amount TEXT NOT NULL,
            description TEXT NOT NULL,
            category TEXT NOT NULL,
            date TEXT NOT NULL,
            tx_type TEXT NOT NULL,
            version INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            idempotency_hash TEXT UNIQUE
        )",
        [],
    )?;

    // ==========================================================================
    // Budget documents (one JSON document per owner)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS budget_documents (
            owner_id TEXT PRIMARY KEY,
            version INTEGER NOT NULL,
            document TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_transactions_owner ON transactions(owner_id, date)",
        [],
    )?;

    Ok(())
}

const TRANSACTION_COLUMNS: &str =
    "id, owner_id, amount, description, category, date, tx_type, version, created_at";

fn conversion_error<E>(index: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(err))
}

fn row_to_transaction(row: &Row<'_>) -> rusqlite::Result<Transaction> {
    let amount: String = row.get(2)?;
    let date: String = row.get(5)?;
    let tx_type: String = row.get(6)?;
    let created_at: String = row.get(8)?;

    Ok(Transaction {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        amount: Decimal::from_str(&amount).map_err(|e| conversion_error(2, e))?,
        description: row.get(3)?,
        category: row.get(4)?,
        date: NaiveDate::parse_from_str(&date, "%Y-%m-%d").map_err(|e| conversion_error(5, e))?,
        tx_type: TransactionType::from_str(&tx_type).map_err(|e| conversion_error(6, e))?,
        version: row.get(7)?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map_err(|e| conversion_error(8, e))?
            .with_timezone(&Utc),
    })
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

impl TransactionRepository for SqliteRepository {
    fn get_transaction(&self, owner_id: &str, id: &str) -> Result<Option<Transaction>> {
        let conn = self.conn()?;
        let tx = conn
            .query_row(
                &format!(
                    "SELECT {} FROM transactions WHERE owner_id = ?1 AND id = ?2",
                    TRANSACTION_COLUMNS
                ),
                params![owner_id, id],
                row_to_transaction,
            )
            .optional()?;
        Ok(tx)
    }

    fn list_transactions(&self, owner_id: &str) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM transactions
             WHERE owner_id = ?1
             ORDER BY date DESC, row_id DESC",
            TRANSACTION_COLUMNS
        ))?;

        let transactions = stmt
            .query_map([owner_id], row_to_transaction)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(transactions)
    }

    fn insert_transaction(&self, tx: &Transaction, fingerprint: Option<&str>) -> Result<InsertOutcome> {
        let conn = self.conn()?;

        let result = conn.execute(
            "INSERT INTO transactions (
                id, owner_id, amount, description, category, date, tx_type,
                version, created_at, idempotency_hash
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                tx.id,
                tx.owner_id,
                tx.amount.to_string(),
                tx.description,
                tx.category,
                tx.date.format("%Y-%m-%d").to_string(),
                tx.tx_type.as_str(),
                tx.version,
                tx.created_at.to_rfc3339(),
                fingerprint,
            ],
        );

        match result {
            Ok(_) => Ok(InsertOutcome::Inserted),
            Err(e) if fingerprint.is_some() && is_constraint_violation(&e) => {
                let existing = conn
                    .query_row(
                        &format!(
                            "SELECT {} FROM transactions WHERE idempotency_hash = ?1",
                            TRANSACTION_COLUMNS
                        ),
                        [fingerprint],
                        row_to_transaction,
                    )
                    .optional()?;

                match existing {
                    Some(existing) => Ok(InsertOutcome::Duplicate(existing)),
                    None => Err(e.into()),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    fn replace_transaction(&self, tx: &Transaction, expected_version: i64) -> Result<bool> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE transactions
             SET amount = ?1, description = ?2, category = ?3, date = ?4, tx_type = ?5,
                 version = ?6
             WHERE owner_id = ?7 AND id = ?8 AND version = ?9",
            params![
                tx.amount.to_string(),
                tx.description,
                tx.category,
                tx.date.format("%Y-%m-%d").to_string(),
                tx.tx_type.as_str(),
                tx.version,
                tx.owner_id,
                tx.id,
                expected_version,
            ],
        )?;
        Ok(changed == 1)
    }

    fn delete_transaction(&self, owner_id: &str, id: &str, expected_version: i64) -> Result<bool> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "DELETE FROM transactions WHERE owner_id = ?1 AND id = ?2 AND version = ?3",
            params![owner_id, id, expected_version],
        )?;
        Ok(changed == 1)
    }

    fn ping(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }
}

impl BudgetRepository for SqliteRepository {
    fn load_budgets(&self, owner_id: &str) -> Result<Option<BudgetDocument>> {
        let conn = self.conn()?;
        let stored: Option<(i64, String)> = conn
            .query_row(
                "SELECT version, document FROM budget_documents WHERE owner_id = ?1",
                [owner_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match stored {
            Some((version, json)) => {
                let mut doc: BudgetDocument = serde_json::from_str(&json)?;
                // The column is authoritative for the version
                doc.version = version;
                doc.owner_id = owner_id.to_string();
                Ok(Some(doc))
            }
            None => Ok(None),
        }
    }

    fn save_budgets(&self, doc: &BudgetDocument, expected_version: i64) -> Result<bool> {
        let conn = self.conn()?;
        let json = serde_json::to_string(doc)?;
        let now = Utc::now().to_rfc3339();

        if expected_version == 0 {
            let result = conn.execute(
                "INSERT INTO budget_documents (owner_id, version, document, updated_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![doc.owner_id, doc.version, json, now],
            );
            return match result {
                Ok(_) => Ok(true),
                Err(e) if is_constraint_violation(&e) => Ok(false),
                Err(e) => Err(e.into()),
            };
        }

        let changed = conn.execute(
            "UPDATE budget_documents
             SET version = ?1, document = ?2, updated_at = ?3
             WHERE owner_id = ?4 AND version = ?5",
            params![doc.version, json, now, doc.owner_id, expected_version],
        )?;
        Ok(changed == 1)
    }
}
