// 📊 Aggregator - Derived dashboard views
//
// Pure functions over transaction slices. Direction always comes from the type
// field; expense magnitudes come from abs(amount). Sums saturate, never panic.

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::budget::{same_category, Budget};
use crate::model::{Transaction, TransactionType};

/// Category that triggers the high-spending warning
pub const FOOD_CATEGORY: &str = "Food & Dining";
pub const FOOD_WARNING_THRESHOLD: i64 = 400;
pub const TRANSPORT_CATEGORY: &str = "Transportation";
pub const TRANSPORT_PRAISE_THRESHOLD: i64 = 50;

/// Transactions shown in the dashboard's recent list
pub const RECENT_LIMIT: usize = 5;

// ============================================================================
// TOTALS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    pub income: Decimal,
    pub expenses: Decimal,
    pub balance: Decimal,
}

impl Totals {
    pub const ZERO: Totals = Totals {
        income: Decimal::ZERO,
        expenses: Decimal::ZERO,
        balance: Decimal::ZERO,
    };

    /// Income adds its amount as stored; expenses add their magnitude.
    /// Sums saturate at the Decimal bounds instead of overflowing.
    fn add(&mut self, tx: &Transaction) {
        match tx.tx_type {
            TransactionType::Income => self.income = self.income.saturating_add(tx.amount),
            TransactionType::Expense => self.expenses = self.expenses.saturating_add(tx.magnitude()),
        }
        self.balance = self.income.saturating_sub(self.expenses);
    }
}

pub fn totals(transactions: &[Transaction]) -> Totals {
    let mut sums = Totals::ZERO;
    for tx in transactions {
        sums.add(tx);
    }
    sums
}

/// Calendar month a transaction falls in
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn of(date: NaiveDate) -> Self {
        YearMonth {
            year: date.year(),
            month: date.month(),
        }
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyTotals {
    pub month: YearMonth,
    pub totals: Totals,
}

/// Totals per calendar month, oldest month first. Months without entries are skipped.
pub fn monthly_totals(transactions: &[Transaction]) -> Vec<MonthlyTotals> {
    let mut months: BTreeMap<YearMonth, Totals> = BTreeMap::new();
    for tx in transactions {
        months.entry(YearMonth::of(tx.date)).or_insert(Totals::ZERO).add(tx);
    }

    months
        .into_iter()
        .map(|(month, totals)| MonthlyTotals { month, totals })
        .collect()
}

// ============================================================================
// CATEGORY BREAKDOWN
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySum {
    pub category: String,
    pub total: Decimal,
}

/// Per-category sums for one type, in first-seen category order
pub fn by_category(transactions: &[Transaction], tx_type: TransactionType) -> Vec<CategorySum> {
    let mut sums: Vec<CategorySum> = Vec::new();

    for tx in transactions.iter().filter(|t| t.tx_type == tx_type) {
        match sums.iter_mut().find(|s| s.category == tx.category) {
            Some(sum) => sum.total = sum.total.saturating_add(tx.magnitude()),
            None => sums.push(CategorySum {
                category: tx.category.clone(),
                total: tx.magnitude(),
            }),
        }
    }

    sums
}

/// Expense breakdown, the chart's default view
pub fn expenses_by_category(transactions: &[Transaction]) -> Vec<CategorySum> {
    by_category(transactions, TransactionType::Expense)
}

/// Total expense magnitude recorded under `category`. Labels match the way
/// budget names do (trimmed, case-insensitive).
pub fn spent_for(transactions: &[Transaction], category: &str) -> Decimal {
    transactions
        .iter()
        .filter(|t| t.is_expense() && same_category(&t.category, category))
        .fold(Decimal::ZERO, |sum, t| sum.saturating_add(t.magnitude()))
}

// ============================================================================
// OVER-BUDGET CHECK
// ============================================================================

/// `percentage` is None when the limit is zero (undefined ratio); in that case
/// no over-budget signal is raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetCheck {
    pub percentage: Option<Decimal>,
    pub over_budget: bool,
    pub overage: Option<Decimal>,
}

pub fn over_budget_check(spent: Decimal, limit: Decimal) -> BudgetCheck {
    if limit.is_zero() {
        return BudgetCheck {
            percentage: None,
            over_budget: false,
            overage: None,
        };
    }

    // Ratios too large for a Decimal pin to the bound
    let percentage = spent
        .checked_div(limit)
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        .unwrap_or(Decimal::MAX);
    let over_budget = percentage > Decimal::ONE_HUNDRED;

    BudgetCheck {
        percentage: Some(percentage),
        over_budget,
        overage: over_budget.then(|| spent.saturating_sub(limit)),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetProgress {
    pub category: String,
    pub limit: Decimal,
    pub spent: Decimal,
    pub protected: bool,
    pub color_tag: String,
    pub check: BudgetCheck,
    /// Percentage clamped to 0..=100 for progress bars
    pub progress: Decimal,
}

pub fn budget_overview(transactions: &[Transaction], budgets: &[Budget]) -> Vec<BudgetProgress> {
    budgets
        .iter()
        .map(|budget| {
            let spent = spent_for(transactions, budget.category.as_str());
            let check = over_budget_check(spent, budget.limit);
            let progress = check
                .percentage
                .unwrap_or(Decimal::ZERO)
                .clamp(Decimal::ZERO, Decimal::ONE_HUNDRED);

            BudgetProgress {
                category: budget.category.to_string(),
                limit: budget.limit,
                spent,
                protected: budget.protected,
                color_tag: budget.color_tag.clone(),
                check,
                progress,
            }
        })
        .collect()
}

// ============================================================================
// RECENT + INSIGHTS
// ============================================================================

/// The `n` newest transactions (by date, then entry time)
pub fn recent(transactions: &[Transaction], n: usize) -> Vec<Transaction> {
    let mut sorted: Vec<&Transaction> = transactions.iter().collect();
    sorted.sort_by(|a, b| b.date.cmp(&a.date).then(b.created_at.cmp(&a.created_at)));
    sorted.into_iter().take(n).cloned().collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightKind {
    Warning,
    Positive,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Insight {
    pub kind: InsightKind,
    pub title: String,
    pub description: String,
}

/// Threshold notices on food and transport spending
pub fn insights(transactions: &[Transaction]) -> Vec<Insight> {
    let mut notices = Vec::new();

    let food = spent_for(transactions, FOOD_CATEGORY);
    if food > Decimal::from(FOOD_WARNING_THRESHOLD) {
        notices.push(Insight {
            kind: InsightKind::Warning,
            title: "High Food Spending".to_string(),
            description: format!(
                "You've spent {} on food. Consider meal planning to reduce costs.",
                food.round()
            ),
        });
    }

    let transport = spent_for(transactions, TRANSPORT_CATEGORY);
    if transport < Decimal::from(TRANSPORT_PRAISE_THRESHOLD) {
        notices.push(Insight {
            kind: InsightKind::Positive,
            title: "Great Transportation Savings".to_string(),
            description: "Your transportation costs are well controlled. Keep it up!".to_string(),
        });
    }

    notices
}

// ============================================================================
// DASHBOARD
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dashboard {
    pub totals: Totals,
    pub transaction_count: usize,
    /// Income vs. expenses per month, for the trend chart
    pub monthly: Vec<MonthlyTotals>,
    pub expenses_by_category: Vec<CategorySum>,
    pub budgets: Vec<BudgetProgress>,
    pub recent: Vec<Transaction>,
    pub insights: Vec<Insight>,
}

pub fn dashboard(transactions: &[Transaction], budgets: &[Budget]) -> Dashboard {
    Dashboard {
        totals: totals(transactions),
        transaction_count: transactions.len(),
        monthly: monthly_totals(transactions),
        expenses_by_category: expenses_by_category(transactions),
        budgets: budget_overview(transactions, budgets),
        recent: recent(transactions, RECENT_LIMIT),
        insights: insights(transactions),
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::default_budgets;
    use chrono::{Duration, NaiveDate, Utc};
    use rust_decimal_macros::dec;

    fn create_test_transaction(amount: Decimal, tx_type: TransactionType, category: &str, day: u32) -> Transaction {
        Transaction {
            id: format!("{}-{}", category, day),
            owner_id: "u1".to_string(),
            amount,
            description: category.to_string(),
            category: category.to_string(),
            date: NaiveDate::from_ymd_opt(2024, 12, day).unwrap(),
            tx_type,
            version: 1,
            created_at: Utc::now() + Duration::seconds(day as i64),
        }
    }

    fn mixed_set() -> Vec<Transaction> {
        vec![
            create_test_transaction(dec!(-45.99), TransactionType::Expense, "Food & Dining", 1),
            create_test_transaction(dec!(3500), TransactionType::Income, "Income", 2),
            create_test_transaction(dec!(120), TransactionType::Expense, "Shopping", 3),
            create_test_transaction(dec!(-30.01), TransactionType::Expense, "Food & Dining", 4),
            create_test_transaction(dec!(250), TransactionType::Expense, "Transportation", 5),
            create_test_transaction(dec!(-200), TransactionType::Income, "Refunds", 6),
        ]
    }

    #[test]
    fn test_totals_example() {
        let transactions = vec![
            create_test_transaction(dec!(-45.99), TransactionType::Expense, "Food & Dining", 1),
            create_test_transaction(dec!(3500), TransactionType::Income, "Income", 2),
        ];

        let t = totals(&transactions);
        assert_eq!(t.income, dec!(3500));
        assert_eq!(t.expenses, dec!(45.99));
        assert_eq!(t.balance, dec!(3454.01));
    }

    #[test]
    fn test_totals_sign_handling() {
        let t = totals(&mixed_set());
        // Income sums amounts as stored; expenses sum magnitudes
        assert_eq!(t.income, dec!(3300));
        assert_eq!(t.expenses, dec!(446.00));
        assert_eq!(t.balance, dec!(2854.00));
        assert_eq!(t.balance, t.income - t.expenses);
    }

    #[test]
    fn test_huge_sums_saturate() {
        let huge = Decimal::from_i128_with_scale(5 * 10i128.pow(28), 0);
        let transactions = vec![
            create_test_transaction(huge, TransactionType::Expense, "Transportation", 1),
            create_test_transaction(huge, TransactionType::Expense, "Transportation", 2),
        ];

        let t = totals(&transactions);
        assert_eq!(t.expenses, Decimal::MAX);
        assert_eq!(t.balance, -Decimal::MAX);
        assert_eq!(spent_for(&transactions, "Transportation"), Decimal::MAX);
        assert_eq!(expenses_by_category(&transactions)[0].total, Decimal::MAX);

        let view = dashboard(&transactions, &default_budgets());
        let transport = view.budgets.iter().find(|b| b.category == "Transportation").unwrap();
        assert!(transport.check.over_budget);
    }

    #[test]
    fn test_huge_percentage_saturates() {
        let spent = Decimal::from_i128_with_scale(10i128.pow(27), 0);

        let check = over_budget_check(spent, dec!(0.5));
        assert_eq!(check.percentage, Some(Decimal::MAX));
        assert!(check.over_budget);
        assert_eq!(check.overage, Some(spent - dec!(0.5)));

        let tiny = Decimal::new(1, 28);
        assert_eq!(over_budget_check(dec!(1), tiny).percentage, Some(Decimal::MAX));
    }

    #[test]
    fn test_monthly_totals_in_date_order() {
        let mut late = create_test_transaction(dec!(100), TransactionType::Expense, "Shopping", 3);
        late.date = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
        let mut early = create_test_transaction(dec!(2000), TransactionType::Income, "Income", 4);
        early.date = NaiveDate::from_ymd_opt(2024, 11, 30).unwrap();

        let mut transactions = mixed_set();
        transactions.insert(0, late);
        transactions.push(early);

        let months = monthly_totals(&transactions);
        let labels: Vec<String> = months.iter().map(|m| m.month.to_string()).collect();
        assert_eq!(labels, vec!["2024-11", "2024-12", "2025-01"]);

        assert_eq!(months[0].totals.income, dec!(2000));
        assert_eq!(months[1].totals, totals(&mixed_set()));
        assert_eq!(months[2].totals.expenses, dec!(100));
        assert_eq!(months[2].totals.balance, dec!(-100));

        assert!(monthly_totals(&[]).is_empty());
    }

    #[test]
    fn test_spent_for_matches_budget_names_case_insensitively() {
        let transactions = vec![
            create_test_transaction(dec!(30), TransactionType::Expense, "Pets", 1),
            create_test_transaction(dec!(12), TransactionType::Expense, "pets ", 2),
        ];

        assert_eq!(spent_for(&transactions, "PETS"), dec!(42));
        // Breakdown keeps labels exactly as recorded
        assert_eq!(expenses_by_category(&transactions).len(), 2);
    }

    #[test]
    fn test_empty_set() {
        let t = totals(&[]);
        assert_eq!(t, Totals::ZERO);
        assert!(by_category(&[], TransactionType::Expense).is_empty());
    }

    #[test]
    fn test_by_category_first_seen_order() {
        let sums = expenses_by_category(&mixed_set());
        let categories: Vec<&str> = sums.iter().map(|s| s.category.as_str()).collect();

        assert_eq!(categories, vec!["Food & Dining", "Shopping", "Transportation"]);
        assert_eq!(sums[0].total, dec!(76.00));
    }

    #[test]
    fn test_category_sums_match_expense_total() {
        let transactions = mixed_set();
        let summed: Decimal = expenses_by_category(&transactions).iter().map(|s| s.total).sum();
        assert_eq!(summed, totals(&transactions).expenses);
    }

    #[test]
    fn test_spent_for_ignores_income() {
        let mut transactions = mixed_set();
        transactions.push(create_test_transaction(dec!(500), TransactionType::Income, "Shopping", 7));

        assert_eq!(spent_for(&transactions, "Shopping"), dec!(120));
        assert_eq!(spent_for(&transactions, "Healthcare"), Decimal::ZERO);
    }

    #[test]
    fn test_over_budget_example() {
        let check = over_budget_check(dec!(250), dec!(200));
        assert_eq!(check.percentage, Some(dec!(125)));
        assert!(check.over_budget);
        assert_eq!(check.overage, Some(dec!(50)));
    }

    #[test]
    fn test_exactly_at_limit_is_not_over() {
        let check = over_budget_check(dec!(200), dec!(200));
        assert_eq!(check.percentage, Some(dec!(100)));
        assert!(!check.over_budget);
        assert_eq!(check.overage, None);
    }

    #[test]
    fn test_zero_limit_is_undefined() {
        let check = over_budget_check(dec!(80), Decimal::ZERO);
        assert_eq!(check.percentage, None);
        assert!(!check.over_budget);
        assert_eq!(check.overage, None);
    }

    #[test]
    fn test_budget_overview_clamps_progress() {
        let overview = budget_overview(&mixed_set(), &default_budgets());

        let transport = overview.iter().find(|b| b.category == "Transportation").unwrap();
        assert_eq!(transport.spent, dec!(250));
        assert!(transport.check.over_budget);
        assert_eq!(transport.progress, dec!(100));

        let shopping = overview.iter().find(|b| b.category == "Shopping").unwrap();
        assert_eq!(shopping.progress, dec!(40));
        assert!(!shopping.check.over_budget);

        assert_eq!(overview.len(), 4);
    }

    #[test]
    fn test_recent_newest_first() {
        let recent_txs = recent(&mixed_set(), 2);
        let days: Vec<u32> = recent_txs.iter().map(|t| chrono::Datelike::day(&t.date)).collect();
        assert_eq!(days, vec![6, 5]);
    }

    #[test]
    fn test_insights_thresholds() {
        let mut transactions = vec![create_test_transaction(
            dec!(401),
            TransactionType::Expense,
            "Food & Dining",
            1,
        )];
        let notices = insights(&transactions);
        assert_eq!(notices.len(), 2);
        assert_eq!(notices[0].kind, InsightKind::Warning);
        assert_eq!(notices[1].kind, InsightKind::Positive);

        transactions.push(create_test_transaction(dec!(50), TransactionType::Expense, "Transportation", 2));
        transactions[0].amount = dec!(400);
        assert!(insights(&transactions).is_empty());
    }

    #[test]
    fn test_dashboard_bundle() {
        let transactions = mixed_set();
        let view = dashboard(&transactions, &default_budgets());

        assert_eq!(view.transaction_count, 6);
        assert_eq!(view.recent.len(), RECENT_LIMIT);
        assert_eq!(view.totals, totals(&transactions));
        assert_eq!(view.budgets.len(), 4);
        assert_eq!(view.monthly.len(), 1);
        assert_eq!(view.monthly[0].month.to_string(), "2024-12");

        let json = serde_json::to_value(&view).unwrap();
        assert!(json["budgets"][0]["check"]["over_budget"].is_boolean());
    }
}
