// One-time migration for budget documents carried over from device-local storage.
//
// Old clients could lose the Housing entry and still carried a deprecated
// Food & Dining budget. Kept separate from the ledger so it can be deleted once
// no unreconciled documents remain.

use rust_decimal::Decimal;

use crate::budget::{Budget, BudgetLedger, CategoryName};

pub const MANDATORY_CATEGORY: &str = "Housing";
pub const MANDATORY_LIMIT: i64 = 1000;
pub const MANDATORY_COLOR_TAG: &str = "bg-green-500";
pub const LEGACY_CATEGORY: &str = "Food & Dining";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub restored_mandatory: bool,
    pub dropped_legacy: usize,
}

impl ReconcileOutcome {
    pub fn changed(&self) -> bool {
        self.restored_mandatory || self.dropped_legacy > 0
    }
}

/// Drop the legacy category, then re-add the mandatory one if it is missing.
pub fn reconcile(ledger: &mut BudgetLedger) -> ReconcileOutcome {
    let budgets = ledger.budgets_mut();

    let before = budgets.len();
    budgets.retain(|b| !b.category.matches(LEGACY_CATEGORY));
    let dropped_legacy = before - budgets.len();

    let restored_mandatory = !budgets.iter().any(|b| b.category.matches(MANDATORY_CATEGORY));
    if restored_mandatory {
        budgets.push(Budget {
            category: CategoryName(MANDATORY_CATEGORY.to_string()),
            limit: Decimal::from(MANDATORY_LIMIT),
            protected: true,
            color_tag: MANDATORY_COLOR_TAG.to_string(),
        });
    }

    ReconcileOutcome {
        restored_mandatory,
        dropped_legacy,
    }
}
