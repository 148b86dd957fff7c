// 📄 Report data for the exporter
// Ordered rows with sign-by-type, two-decimal amounts. Layout (PDF etc.) lives elsewhere.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::aggregator::{totals, Totals};
use crate::error::{FinanceError, Result};
use crate::model::{format_money, Transaction};

pub const REPORT_TITLE: &str = "Personal Finance Report";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
    pub date: NaiveDate,
    pub description: String,
    pub category: String,
    #[serde(rename = "type")]
    pub type_label: String,
    /// "+3500.00" / "-45.99"
    pub amount: String,
}

impl From<&Transaction> for ReportRow {
    fn from(tx: &Transaction) -> Self {
        ReportRow {
            date: tx.date,
            description: tx.description.clone(),
            category: tx.category.clone(),
            type_label: tx.tx_type.label().to_string(),
            amount: tx.signed_display(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub title: String,
    pub display_name: String,
    pub generated_on: NaiveDate,
    pub totals: Totals,
    pub rows: Vec<ReportRow>,
}

impl Report {
    /// "Total Income: 3500.00" style summary lines
    pub fn summary_lines(&self) -> Vec<String> {
        vec![
            format!("User: {}", self.display_name),
            format!("Generated: {}", self.generated_on),
            format!("Total Income: {}", format_money(self.totals.income)),
            format!("Total Expenses: {}", format_money(self.totals.expenses)),
            format!("Net Amount: {}", format_money(self.totals.balance)),
        ]
    }

    pub fn file_name(&self) -> String {
        format!("finance-report-{}.csv", self.generated_on.format("%Y-%m-%d"))
    }
}

/// Rows sorted by date ascending; entries on the same date keep their input order.
pub fn build_report(transactions: &[Transaction], display_name: &str, generated_on: NaiveDate) -> Report {
    let mut ordered: Vec<&Transaction> = transactions.iter().collect();
    ordered.sort_by_key(|t| t.date);

    Report {
        title: REPORT_TITLE.to_string(),
        display_name: display_name.to_string(),
        generated_on,
        totals: totals(transactions),
        rows: ordered.into_iter().map(ReportRow::from).collect(),
    }
}

/// Header plus one line per row
pub fn write_csv<W: Write>(report: &Report, writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);

    wtr.write_record(["Date", "Description", "Category", "Type", "Amount"])?;
    for row in &report.rows {
        let date = row.date.format("%Y-%m-%d").to_string();
        wtr.write_record([
            date.as_str(),
            row.description.as_str(),
            row.category.as_str(),
            row.type_label.as_str(),
            row.amount.as_str(),
        ])?;
    }

    wtr.flush()
        .map_err(|e| FinanceError::Storage(format!("csv flush: {}", e)))?;
    Ok(())
}
