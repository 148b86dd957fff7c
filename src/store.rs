// 🗄️ Transaction Store - Owner-scoped CRUD over transaction records
//
// Every mutation is check-then-write against (owner_id, id, version).
// A lost race is re-read and re-applied once before Conflict reaches the caller.

use chrono::Utc;
use std::cmp::Reverse;
use std::io::Read;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::categorizer::RuleEngine;
use crate::error::{FinanceError, Result};
use crate::model::{
    canonical_amount, idempotency_fingerprint, parse_date, validate_description, NewTransaction,
    RawAmount, Transaction, TransactionPatch, TransactionType,
};
use crate::storage::{InsertOutcome, TransactionRepository};

pub struct TransactionStore<R: TransactionRepository> {
    repo: Arc<R>,
    rules: RuleEngine,
}

impl<R: TransactionRepository> TransactionStore<R> {
    pub fn new(repo: Arc<R>) -> Self {
        TransactionStore {
            repo,
            rules: RuleEngine::builtin(),
        }
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repo
    }

    /// All of the owner's transactions, newest date first, newest entry first on ties
    pub fn list(&self, owner_id: &str) -> Result<Vec<Transaction>> {
        let mut transactions = self.repo.list_transactions(owner_id)?;
        transactions.sort_by_key(|t| (Reverse(t.date), Reverse(t.created_at)));
        Ok(transactions)
    }

    pub fn get(&self, owner_id: &str, id: &str) -> Result<Transaction> {
        self.repo
            .get_transaction(owner_id, id)?
            .ok_or_else(|| FinanceError::transaction_not_found(id))
    }

    /// Validate, fill the category if absent, persist.
    ///
    /// With an idempotency key, repeating the call returns the first record
    /// instead of creating a second one.
    pub fn create(
        &self,
        owner_id: &str,
        fields: NewTransaction,
        idempotency_key: Option<&str>,
    ) -> Result<Transaction> {
        let tx = self.prepare(owner_id, fields)?;

        let fingerprint = idempotency_key
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(|k| idempotency_fingerprint(owner_id, k));

        match self.repo.insert_transaction(&tx, fingerprint.as_deref())? {
            InsertOutcome::Inserted => {
                info!(owner_id, id = %tx.id, category = %tx.category, "transaction created");
                Ok(tx)
            }
            InsertOutcome::Duplicate(existing) => {
                debug!(owner_id, id = %existing.id, "idempotent create replayed");
                Ok(existing)
            }
        }
    }

    /// Merge a partial update. Re-reads and re-applies once if another
    /// session wrote the record in between.
    pub fn update(&self, owner_id: &str, id: &str, patch: TransactionPatch) -> Result<Transaction> {
        let mut expected = 0;

        for attempt in 0..2 {
            let current = self.get(owner_id, id)?;
            expected = current.version;

            if let Some(updated) = self.try_apply(current, &patch)? {
                return Ok(updated);
            }
            warn!(owner_id, id, attempt, "transaction changed concurrently, re-reading");
        }

        Err(FinanceError::Conflict {
            entity: "transaction",
            id: id.to_string(),
            expected,
        })
    }

    /// Like `update`, but against the version the caller last saw.
    /// A stale version is a Conflict straight away.
    pub fn update_at_version(
        &self,
        owner_id: &str,
        id: &str,
        expected_version: i64,
        patch: TransactionPatch,
    ) -> Result<Transaction> {
        let current = self.get(owner_id, id)?;
        let conflict = || FinanceError::Conflict {
            entity: "transaction",
            id: id.to_string(),
            expected: expected_version,
        };

        if current.version != expected_version {
            return Err(conflict());
        }
        self.try_apply(current, &patch)?.ok_or_else(conflict)
    }

    /// Remove the record; absent and not-owned are both NotFound.
    pub fn delete(&self, owner_id: &str, id: &str) -> Result<()> {
        let mut expected = 0;

        for attempt in 0..2 {
            let current = self.get(owner_id, id)?;
            expected = current.version;

            if self.repo.delete_transaction(owner_id, id, current.version)? {
                info!(owner_id, id, "transaction deleted");
                return Ok(());
            }
            warn!(owner_id, id, attempt, "transaction changed before delete, re-reading");
        }

        Err(FinanceError::Conflict {
            entity: "transaction",
            id: id.to_string(),
            expected,
        })
    }

    /// Bulk create from CSV with a header row: date, description, amount, type[, category].
    ///
    /// Every row is parsed and validated before anything is written, so a bad
    /// row (wrong shape or bad value) rejects the whole file with
    /// `Validation("line N: ...")`. A storage failure during the write phase
    /// can still leave the rows before it stored.
    pub fn import_csv<Rd: Read>(&self, owner_id: &str, reader: Rd) -> Result<usize> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);
        let headers = rdr.headers().map_err(|e| csv_row_error(1, e))?.clone();

        let mut pending = Vec::new();
        for (index, record) in rdr.records().enumerate() {
            // Header is line 1
            let mut line = index as u64 + 2;
            let record = record.map_err(|e| csv_row_error(line, e))?;
            if let Some(position) = record.position() {
                line = position.line();
            }

            let row: CsvRow = record
                .deserialize(Some(&headers))
                .map_err(|e| csv_row_error(line, e))?;
            let fields = NewTransaction {
                amount: RawAmount::Text(row.amount),
                description: row.description,
                category: row.category,
                date: row.date,
                tx_type: row.tx_type,
            };

            let tx = self.prepare(owner_id, fields).map_err(|e| match e {
                FinanceError::Validation(msg) => FinanceError::Validation(format!("line {}: {}", line, msg)),
                other => other,
            })?;
            pending.push(tx);
        }

        for tx in &pending {
            self.repo.insert_transaction(tx, None)?;
        }

        info!(owner_id, created = pending.len(), "csv import finished");
        Ok(pending.len())
    }

    /// Validate raw fields and build a fresh version-1 record
    fn prepare(&self, owner_id: &str, fields: NewTransaction) -> Result<Transaction> {
        let description = validate_description(&fields.description)?;
        let date = parse_date(&fields.date)?;
        let tx_type = TransactionType::from_str(&fields.tx_type)?;
        let amount = canonical_amount(&fields.amount)?;
        let category = self.rules.resolve(fields.category.as_deref(), &description);

        Ok(Transaction {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            amount,
            description,
            category,
            date,
            tx_type,
            version: 1,
            created_at: Utc::now(),
        })
    }

    /// Apply the patch on top of `current` and compare-and-set it.
    /// Ok(None) means the stored version moved.
    fn try_apply(&self, current: Transaction, patch: &TransactionPatch) -> Result<Option<Transaction>> {
        let expected = current.version;
        let next = self.merge(current, patch)?;

        if self.repo.replace_transaction(&next, expected)? {
            debug!(owner_id = %next.owner_id, id = %next.id, version = next.version, "transaction updated");
            Ok(Some(next))
        } else {
            Ok(None)
        }
    }

    /// Validate every provided field first, so a bad field rejects the whole patch
    fn merge(&self, current: Transaction, patch: &TransactionPatch) -> Result<Transaction> {
        let mut next = current;

        if let Some(description) = &patch.description {
            next.description = validate_description(description)?;
        }
        if let Some(date) = &patch.date {
            next.date = parse_date(date)?;
        }
        if let Some(tx_type) = &patch.tx_type {
            next.tx_type = TransactionType::from_str(tx_type)?;
        }
        if let Some(amount) = &patch.amount {
            next.amount = canonical_amount(amount)?;
        }
        if let Some(category) = &patch.category {
            next.category = self.rules.resolve(Some(category), &next.description);
        }

        next.version += 1;
        Ok(next)
    }
}

/// Malformed rows are the caller's input problem; read failures stay storage errors
fn csv_row_error(line: u64, err: csv::Error) -> FinanceError {
    if err.is_io_error() {
        return FinanceError::from(err);
    }
    FinanceError::Validation(format!("line {}: {}", line, err))
}

#[derive(Debug, serde::Deserialize)]
struct CsvRow {
    date: String,
    description: String,
    amount: String,
    #[serde(rename = "type")]
    tx_type: String,
    #[serde(default)]
    category: Option<String>,
}
