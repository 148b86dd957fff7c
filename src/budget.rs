// 💰 Budget Ledger - Per-user category limits with protected defaults
//
// The ledger itself is a plain value (pure operations). BudgetService scopes it
// to an owner: load the versioned document, apply, write back with a version check.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::budget_migration;
use crate::error::{FinanceError, Result};
use crate::model::{check_magnitude, RawAmount};
use crate::storage::BudgetRepository;

/// Color tag for categories the user adds
pub const DEFAULT_COLOR_TAG: &str = "bg-gray-500";

// ============================================================================
// CATEGORY NAME
// ============================================================================

/// Free-form category label, trimmed and non-empty.
/// Equality between names is case-insensitive; the original spelling is kept.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CategoryName(pub(crate) String);

impl CategoryName {
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(FinanceError::validation("category name must not be empty"));
        }
        Ok(CategoryName(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-insensitive comparison against a raw label
    pub fn matches(&self, other: &str) -> bool {
        same_category(&self.0, other)
    }
}

/// Category labels compare trimmed and case-insensitively
pub fn same_category(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

impl PartialEq for CategoryName {
    fn eq(&self, other: &Self) -> bool {
        self.matches(&other.0)
    }
}

impl Eq for CategoryName {}

impl TryFrom<String> for CategoryName {
    type Error = FinanceError;

    fn try_from(value: String) -> Result<Self> {
        CategoryName::parse(&value)
    }
}

impl From<CategoryName> for String {
    fn from(name: CategoryName) -> Self {
        name.0
    }
}

impl fmt::Display for CategoryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// BUDGET
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    pub category: CategoryName,
    pub limit: Decimal,
    /// Protected entries are editable but never deletable
    pub protected: bool,
    pub color_tag: String,
}

impl Budget {
    fn protected_default(category: &str, limit: i64, color_tag: &str) -> Self {
        Budget {
            category: CategoryName(category.to_string()),
            limit: Decimal::from(limit),
            protected: true,
            color_tag: color_tag.to_string(),
        }
    }
}

/// Seed set for a user's first visit
pub fn default_budgets() -> Vec<Budget> {
    vec![
        Budget::protected_default("Transportation", 200, "bg-blue-500"),
        Budget::protected_default("Shopping", 300, "bg-purple-500"),
        Budget::protected_default("Entertainment", 150, "bg-pink-500"),
        Budget::protected_default("Housing", 1000, "bg-green-500"),
    ]
}

/// Limits are numeric, non-negative and at most MAX_AMOUNT
pub fn parse_limit(raw: &RawAmount) -> Result<Decimal> {
    let limit = raw.parse()?;
    if limit < Decimal::ZERO {
        return Err(FinanceError::validation(format!(
            "limit must not be negative: {}",
            limit
        )));
    }
    check_magnitude("limit", limit)
}

// ============================================================================
// LEDGER
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct BudgetLedger {
    budgets: Vec<Budget>,
}

impl BudgetLedger {
    pub fn with_defaults() -> Self {
        BudgetLedger::from_budgets(default_budgets())
    }

    pub fn from_budgets(budgets: Vec<Budget>) -> Self {
        BudgetLedger { budgets }
    }

    /// Budgets in display order
    pub fn get_all(&self) -> &[Budget] {
        &self.budgets
    }

    pub fn into_budgets(self) -> Vec<Budget> {
        self.budgets
    }

    pub fn find(&self, category: &str) -> Option<&Budget> {
        self.budgets.iter().find(|b| b.category.matches(category))
    }

    /// Replace a limit. Invalid or negative input and unknown categories leave
    /// the ledger untouched; returns whether anything changed.
    pub fn set_limit(&mut self, category: &str, new_limit: &RawAmount) -> bool {
        let Ok(limit) = parse_limit(new_limit) else {
            debug!(category, "ignoring invalid budget limit");
            return false;
        };

        match self.budgets.iter_mut().find(|b| b.category.matches(category)) {
            Some(budget) if budget.limit != limit => {
                budget.limit = limit;
                true
            }
            _ => false,
        }
    }

    /// Append a new, unprotected category
    pub fn add_category(&mut self, name: &str, limit: &RawAmount) -> Result<&Budget> {
        let category = CategoryName::parse(name)?;
        let limit = parse_limit(limit)?;

        if self.find(category.as_str()).is_some() {
            return Err(FinanceError::validation(format!(
                "budget category already exists: {}",
                category
            )));
        }

        self.budgets.push(Budget {
            category,
            limit,
            protected: false,
            color_tag: DEFAULT_COLOR_TAG.to_string(),
        });

        Ok(&self.budgets[self.budgets.len() - 1])
    }

    /// Remove an unprotected category; protected or unknown names are a no-op
    pub fn remove_category(&mut self, name: &str) -> bool {
        let Some(index) = self.budgets.iter().position(|b| b.category.matches(name)) else {
            return false;
        };

        if self.budgets[index].protected {
            debug!(category = name, "refusing to remove protected budget category");
            return false;
        }

        self.budgets.remove(index);
        true
    }

    pub(crate) fn budgets_mut(&mut self) -> &mut Vec<Budget> {
        &mut self.budgets
    }
}

impl Default for BudgetLedger {
    fn default() -> Self {
        Self::with_defaults()
    }
}

// ============================================================================
// PERSISTED DOCUMENT
// ============================================================================

/// One per owner. `version` is the optimistic-concurrency token (0 = never stored).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetDocument {
    pub owner_id: String,
    pub version: i64,
    pub budgets: Vec<Budget>,

    /// False for documents carried over from device-local storage; those get
    /// the one-time reconciliation on their first load.
    #[serde(default)]
    pub reconciled: bool,
}

impl BudgetDocument {
    pub fn seeded(owner_id: &str) -> Self {
        BudgetDocument {
            owner_id: owner_id.to_string(),
            version: 0,
            budgets: default_budgets(),
            reconciled: true,
        }
    }
}

/// Entry shape written by the old device-local budget store
#[derive(Debug, Clone, Deserialize)]
pub struct LegacyBudgetEntry {
    pub category: String,
    pub budget: RawAmount,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub protected: bool,
}

// ============================================================================
// SERVICE
// ============================================================================

pub struct BudgetService<R: BudgetRepository> {
    repo: Arc<R>,
}

impl<R: BudgetRepository> BudgetService<R> {
    pub fn new(repo: Arc<R>) -> Self {
        BudgetService { repo }
    }

    /// Current document for an owner, seeding defaults on first use and
    /// applying the legacy reconciliation to unreconciled documents.
    pub fn load(&self, owner_id: &str) -> Result<BudgetDocument> {
        for _ in 0..2 {
            let Some(mut doc) = self.repo.load_budgets(owner_id)? else {
                let seeded = BudgetDocument::seeded(owner_id);
                let stored = BudgetDocument { version: 1, ..seeded };
                if self.repo.save_budgets(&stored, 0)? {
                    info!(owner_id, "seeded default budgets");
                    return Ok(stored);
                }
                continue;
            };

            if doc.reconciled {
                return Ok(doc);
            }

            let mut ledger = BudgetLedger::from_budgets(std::mem::take(&mut doc.budgets));
            let outcome = budget_migration::reconcile(&mut ledger);
            let expected = doc.version;
            let healed = BudgetDocument {
                owner_id: doc.owner_id,
                version: expected + 1,
                budgets: ledger.into_budgets(),
                reconciled: true,
            };

            if self.repo.save_budgets(&healed, expected)? {
                info!(
                    owner_id,
                    restored_mandatory = outcome.restored_mandatory,
                    dropped_legacy = outcome.dropped_legacy,
                    "reconciled legacy budget document"
                );
                return Ok(healed);
            }
        }

        // Another session won both races; its stored copy is authoritative
        self.repo
            .load_budgets(owner_id)?
            .ok_or_else(|| FinanceError::NotFound {
                entity: "budget document",
                id: owner_id.to_string(),
            })
    }

    pub fn get_all(&self, owner_id: &str) -> Result<Vec<Budget>> {
        Ok(self.load(owner_id)?.budgets)
    }

    /// Returns false when the input was rejected or nothing changed
    pub fn set_limit(&self, owner_id: &str, category: &str, new_limit: &RawAmount) -> Result<bool> {
        self.mutate(owner_id, |ledger| {
            let changed = ledger.set_limit(category, new_limit);
            Ok((changed, changed))
        })
    }

    pub fn add_category(&self, owner_id: &str, name: &str, limit: &RawAmount) -> Result<Budget> {
        self.mutate(owner_id, |ledger| {
            let added = ledger.add_category(name, limit)?.clone();
            Ok((added, true))
        })
    }

    /// Returns false when the category is protected or absent
    pub fn remove_category(&self, owner_id: &str, name: &str) -> Result<bool> {
        self.mutate(owner_id, |ledger| {
            let removed = ledger.remove_category(name);
            Ok((removed, removed))
        })
    }

    /// Store budgets exported from the old device-local format. The document is
    /// marked unreconciled so the next load runs the migration shim.
    pub fn import_legacy(&self, owner_id: &str, json: &str) -> Result<BudgetDocument> {
        let entries: Vec<LegacyBudgetEntry> = serde_json::from_str(json)
            .map_err(|e| FinanceError::validation(format!("legacy budgets: {}", e)))?;

        let mut budgets: Vec<Budget> = Vec::with_capacity(entries.len());
        for entry in entries {
            let category = CategoryName::parse(&entry.category)?;
            if budgets.iter().any(|b| b.category == category) {
                continue;
            }
            budgets.push(Budget {
                category,
                limit: parse_limit(&entry.budget)?,
                protected: entry.protected,
                color_tag: entry.color.unwrap_or_else(|| DEFAULT_COLOR_TAG.to_string()),
            });
        }

        let current = self.repo.load_budgets(owner_id)?;
        let expected = current.as_ref().map(|d| d.version).unwrap_or(0);
        let doc = BudgetDocument {
            owner_id: owner_id.to_string(),
            version: expected + 1,
            budgets,
            reconciled: false,
        };

        if !self.repo.save_budgets(&doc, expected)? {
            return Err(FinanceError::Conflict {
                entity: "budget document",
                id: owner_id.to_string(),
                expected,
            });
        }

        self.load(owner_id)
    }

    /// Load, apply, compare-and-set; one re-read on a lost race
    fn mutate<T, F>(&self, owner_id: &str, mut apply: F) -> Result<T>
    where
        F: FnMut(&mut BudgetLedger) -> Result<(T, bool)>,
    {
        let mut expected = 0;

        for attempt in 0..2 {
            let doc = self.load(owner_id)?;
            expected = doc.version;

            let mut ledger = BudgetLedger::from_budgets(doc.budgets);
            let (output, changed) = apply(&mut ledger)?;
            if !changed {
                return Ok(output);
            }

            let next = BudgetDocument {
                owner_id: owner_id.to_string(),
                version: expected + 1,
                budgets: ledger.into_budgets(),
                reconciled: true,
            };

            if self.repo.save_budgets(&next, expected)? {
                debug!(owner_id, version = next.version, "budget document saved");
                return Ok(output);
            }

            warn!(owner_id, attempt, expected, "budget document changed concurrently");
        }

        Err(FinanceError::Conflict {
            entity: "budget document",
            id: owner_id.to_string(),
            expected,
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryRepository;
    use rust_decimal_macros::dec;

    fn service() -> (Arc<MemoryRepository>, BudgetService<MemoryRepository>) {
        let repo = Arc::new(MemoryRepository::new());
        (repo.clone(), BudgetService::new(repo))
    }

    #[test]
    fn test_category_name_rules() {
        assert_eq!(CategoryName::parse("  Pets ").unwrap().as_str(), "Pets");
        assert!(CategoryName::parse("   ").is_err());
        assert_eq!(CategoryName::parse("pets").unwrap(), CategoryName::parse("PETS").unwrap());

        let json = serde_json::to_string(&CategoryName::parse("Pets").unwrap()).unwrap();
        assert_eq!(json, "\"Pets\"");
        assert!(serde_json::from_str::<CategoryName>("\"  \"").is_err());
    }

    #[test]
    fn test_defaults_are_protected() {
        let ledger = BudgetLedger::with_defaults();
        let names: Vec<&str> = ledger.get_all().iter().map(|b| b.category.as_str()).collect();

        assert_eq!(names, vec!["Transportation", "Shopping", "Entertainment", "Housing"]);
        assert!(ledger.get_all().iter().all(|b| b.protected));
        assert_eq!(ledger.find("housing").unwrap().limit, dec!(1000));
    }

    #[test]
    fn test_set_limit() {
        let mut ledger = BudgetLedger::with_defaults();

        assert!(ledger.set_limit("shopping", &RawAmount::from("450")));
        assert_eq!(ledger.find("Shopping").unwrap().limit, dec!(450));

        // Rejected inputs are no-ops
        assert!(!ledger.set_limit("Shopping", &RawAmount::from("-1")));
        assert!(!ledger.set_limit("Shopping", &RawAmount::from("lots")));
        assert!(!ledger.set_limit("Unknown", &RawAmount::from("10")));
        assert_eq!(ledger.find("Shopping").unwrap().limit, dec!(450));

        // Protected entries are still editable, zero is a valid limit
        assert!(ledger.set_limit("Housing", &RawAmount::from(0.0)));
        assert_eq!(ledger.find("Housing").unwrap().limit, Decimal::ZERO);
    }

    #[test]
    fn test_add_category() {
        let mut ledger = BudgetLedger::with_defaults();

        let added = ledger.add_category(" Pets ", &RawAmount::from("75")).unwrap().clone();
        assert_eq!(added.category.as_str(), "Pets");
        assert!(!added.protected);
        assert_eq!(added.color_tag, DEFAULT_COLOR_TAG);
        assert_eq!(ledger.get_all().last().unwrap(), &added);

        assert!(matches!(
            ledger.add_category("PETS", &RawAmount::from("10")),
            Err(FinanceError::Validation(_))
        ));
        assert!(matches!(
            ledger.add_category("transportation", &RawAmount::from("10")),
            Err(FinanceError::Validation(_))
        ));
        assert!(ledger.add_category("Gifts", &RawAmount::from("-5")).is_err());
        assert!(ledger.add_category("Gifts", &RawAmount::from("abc")).is_err());
        assert!(ledger.add_category("  ", &RawAmount::from("5")).is_err());
        assert_eq!(ledger.get_all().len(), 5);
    }

    #[test]
    fn test_remove_category() {
        let mut ledger = BudgetLedger::with_defaults();
        ledger.add_category("Pets", &RawAmount::from("75")).unwrap();

        assert!(!ledger.remove_category("Housing"));
        assert!(ledger.find("Housing").is_some());

        assert!(ledger.remove_category("pets"));
        assert!(ledger.find("Pets").is_none());
        assert!(!ledger.remove_category("Pets"));
    }

    #[test]
    fn test_service_seeds_once() {
        let (repo, service) = service();

        let first = service.load("u1").unwrap();
        assert_eq!(first.version, 1);
        assert_eq!(first.budgets, default_budgets());

        let again = service.load("u1").unwrap();
        assert_eq!(again.version, 1);
        assert_eq!(repo.load_budgets("u1").unwrap().unwrap().version, 1);
    }

    #[test]
    fn test_service_mutations_bump_version() {
        let (repo, service) = service();

        let added = service.add_category("u1", "Pets", &RawAmount::from("75")).unwrap();
        assert_eq!(added.limit, dec!(75));
        assert!(service.set_limit("u1", "pets", &RawAmount::from("80")).unwrap());
        assert!(service.remove_category("u1", "Pets").unwrap());

        // Seed (1) + three changes
        assert_eq!(repo.load_budgets("u1").unwrap().unwrap().version, 4);

        // No-ops do not write
        assert!(!service.remove_category("u1", "Housing").unwrap());
        assert!(!service.set_limit("u1", "Housing", &RawAmount::from("-3")).unwrap());
        assert_eq!(repo.load_budgets("u1").unwrap().unwrap().version, 4);
    }

    #[test]
    fn test_service_is_owner_scoped() {
        let (_repo, service) = service();

        service.add_category("u1", "Pets", &RawAmount::from("75")).unwrap();
        let other = service.get_all("u2").unwrap();

        assert!(other.iter().all(|b| !b.category.matches("Pets")));
    }

    #[test]
    fn test_duplicate_add_is_validation_error() {
        let (_repo, service) = service();

        let err = service
            .add_category("u1", "shopping", &RawAmount::from("10"))
            .unwrap_err();
        assert!(matches!(err, FinanceError::Validation(_)));
    }

    #[test]
    fn test_import_legacy_runs_reconciliation() {
        let (repo, service) = service();

        let legacy = r#"[
            {"category": "Transportation", "budget": 250, "color": "bg-blue-500", "protected": true},
            {"category": "Food & Dining", "budget": 400, "color": "bg-orange-500", "protected": true},
            {"category": "Pets", "budget": "60", "color": "bg-gray-500", "protected": false}
        ]"#;

        let doc = service.import_legacy("u1", legacy).unwrap();
        let names: Vec<&str> = doc.budgets.iter().map(|b| b.category.as_str()).collect();

        assert_eq!(names, vec!["Transportation", "Pets", "Housing"]);
        assert!(doc.reconciled);
        assert_eq!(doc.budgets[0].limit, dec!(250));

        // Persisted healed copy; later loads are steady-state
        let stored = repo.load_budgets("u1").unwrap().unwrap();
        assert_eq!(stored, doc);
        assert_eq!(service.load("u1").unwrap(), doc);
    }

    /// Budget repository where a rival session saves first, `races` times
    struct RacingBudgets {
        inner: MemoryRepository,
        races_left: std::sync::Mutex<u32>,
    }

    impl RacingBudgets {
        fn new(races: u32) -> Self {
            RacingBudgets {
                inner: MemoryRepository::new(),
                races_left: std::sync::Mutex::new(races),
            }
        }

        /// Rival bumps the Shopping limit by 1 (or seeds with Shopping at 999)
        fn rival_write(&self, owner_id: &str) {
            let mut races = self.races_left.lock().unwrap();
            if *races == 0 {
                return;
            }
            *races -= 1;

            match self.inner.load_budgets(owner_id).unwrap() {
                Some(mut doc) => {
                    let expected = doc.version;
                    doc.version += 1;
                    let shopping = doc.budgets.iter_mut().find(|b| b.category.matches("Shopping")).unwrap();
                    shopping.limit += Decimal::ONE;
                    assert!(self.inner.save_budgets(&doc, expected).unwrap());
                }
                None => {
                    let mut doc = BudgetDocument { version: 1, ..BudgetDocument::seeded(owner_id) };
                    doc.budgets[1].limit = dec!(999);
                    assert!(self.inner.save_budgets(&doc, 0).unwrap());
                }
            }
        }
    }

    impl BudgetRepository for RacingBudgets {
        fn load_budgets(&self, owner_id: &str) -> Result<Option<BudgetDocument>> {
            self.inner.load_budgets(owner_id)
        }

        fn save_budgets(&self, doc: &BudgetDocument, expected_version: i64) -> Result<bool> {
            self.rival_write(&doc.owner_id);
            self.inner.save_budgets(doc, expected_version)
        }
    }

    fn racing_service(races: u32) -> (Arc<RacingBudgets>, BudgetService<RacingBudgets>) {
        let repo = Arc::new(RacingBudgets::new(races));
        let seeded = BudgetDocument { version: 1, ..BudgetDocument::seeded("u1") };
        assert!(repo.inner.save_budgets(&seeded, 0).unwrap());
        (repo.clone(), BudgetService::new(repo))
    }

    #[test]
    fn test_mutation_retries_once_after_lost_race() {
        let (repo, service) = racing_service(1);

        assert!(service.set_limit("u1", "Transportation", &RawAmount::from("250")).unwrap());

        // Both writes survive: rival (v2) then ours re-applied on top (v3)
        let stored = repo.load_budgets("u1").unwrap().unwrap();
        assert_eq!(stored.version, 3);
        assert_eq!(stored.budgets[0].limit, dec!(250));
        assert_eq!(stored.budgets[1].limit, dec!(301));
    }

    #[test]
    fn test_second_lost_race_is_conflict() {
        let (repo, service) = racing_service(2);

        let err = service
            .add_category("u1", "Pets", &RawAmount::from("60"))
            .unwrap_err();
        assert!(err.is_conflict());

        let stored = repo.load_budgets("u1").unwrap().unwrap();
        assert_eq!(stored.version, 3);
        assert!(stored.budgets.iter().all(|b| !b.category.matches("Pets")));
    }

    #[test]
    fn test_lost_seeding_race_returns_stored_document() {
        let repo = Arc::new(RacingBudgets::new(1));
        let service = BudgetService::new(repo.clone());

        let doc = service.load("u2").unwrap();
        assert_eq!(doc.version, 1);
        assert_eq!(doc.budgets[1].limit, dec!(999));
        assert_eq!(repo.load_budgets("u2").unwrap().unwrap(), doc);
    }

    #[test]
    fn test_limit_upper_bound() {
        let mut ledger = BudgetLedger::with_defaults();

        assert!(ledger.set_limit("Shopping", &RawAmount::from("1000000000000")));
        assert!(!ledger.set_limit("Shopping", &RawAmount::from("1000000000000.5")));
        assert!(matches!(
            ledger.add_category("Yacht", &RawAmount::from("50000000000000000000000000000")),
            Err(FinanceError::Validation(_))
        ));
    }

    #[test]
    fn test_reconciled_documents_keep_user_food_budget() {
        let (_repo, service) = service();

        service.add_category("u1", "Food & Dining", &RawAmount::from("400")).unwrap();
        let budgets = service.get_all("u1").unwrap();

        assert!(budgets.iter().any(|b| b.category.matches("Food & Dining")));
    }
}
