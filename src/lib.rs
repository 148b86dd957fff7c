// Finance Tracker - Core Library
// Exposes all modules for use in the CLI, the API server, and tests

pub mod error;
pub mod config;
pub mod model;
pub mod categorizer;    // Keyword rules -> category label
pub mod storage;        // Persistence seam (SQLite, in-memory)
pub mod store;          // Owner-scoped transaction CRUD
pub mod budget;         // Budget ledger + per-owner service
pub mod budget_migration; // One-time legacy budget reconciliation
pub mod aggregator;     // Totals, breakdowns, over-budget checks
pub mod report;         // Report rows for the exporter
pub mod tracker;

#[cfg(feature = "server")]
pub mod server;

// Re-export commonly used types
pub use error::{FinanceError, Result};
pub use config::{init_logging, Config};
pub use model::{
    format_money, NewTransaction, RawAmount, Transaction, TransactionPatch, TransactionType,
};
pub use categorizer::{categorize, KeywordRule, RuleEngine};
pub use storage::{
    BudgetRepository, InsertOutcome, MemoryRepository, SqliteRepository, TransactionRepository,
};
pub use store::TransactionStore;
pub use budget::{Budget, BudgetDocument, BudgetLedger, BudgetService, CategoryName};
pub use budget_migration::{reconcile, ReconcileOutcome};
pub use aggregator::{
    budget_overview, by_category, dashboard, monthly_totals, over_budget_check, spent_for,
    totals, BudgetCheck, BudgetProgress, CategorySum, Dashboard, MonthlyTotals, Totals,
    YearMonth,
};
pub use report::{build_report, write_csv, Report, ReportRow};
pub use tracker::Tracker;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
