// Facade wiring the store, the budget service and the derived views over one repository.

use chrono::NaiveDate;
use std::sync::Arc;

use crate::aggregator::{self, Dashboard};
use crate::budget::BudgetService;
use crate::error::Result;
use crate::report::{build_report, Report};
use crate::storage::{BudgetRepository, TransactionRepository};
use crate::store::TransactionStore;

pub struct Tracker<R>
where
    R: TransactionRepository + BudgetRepository,
{
    pub transactions: TransactionStore<R>,
    pub budgets: BudgetService<R>,
}

impl<R> Tracker<R>
where
    R: TransactionRepository + BudgetRepository,
{
    pub fn new(repo: Arc<R>) -> Self {
        Tracker {
            transactions: TransactionStore::new(repo.clone()),
            budgets: BudgetService::new(repo),
        }
    }

    /// Recomputed on every read; nothing derived is stored
    pub fn dashboard(&self, owner_id: &str) -> Result<Dashboard> {
        let transactions = self.transactions.list(owner_id)?;
        let budgets = self.budgets.get_all(owner_id)?;
        Ok(aggregator::dashboard(&transactions, &budgets))
    }

    pub fn report(&self, owner_id: &str, display_name: &str, generated_on: NaiveDate) -> Result<Report> {
        let transactions = self.transactions.list(owner_id)?;
        Ok(build_report(&transactions, display_name, generated_on))
    }

    pub fn health(&self) -> Result<()> {
        self.transactions.repository().ping()
    }
}
