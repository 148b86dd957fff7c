// Finance Tracker - CLI
// Import, summarize and export one owner's ledger from the local database

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use finance_tracker::{format_money, init_logging, write_csv, Config, SqliteRepository, Tracker};

#[derive(Parser)]
#[command(name = "finance-tracker", version, about = "Personal finance ledger")]
struct Cli {
    /// Database file (overrides FINANCE_DB_PATH)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load transactions from a CSV file (date,description,amount,type[,category])
    Import { owner: String, csv: PathBuf },
    /// Load budgets saved in the old JSON export format
    ImportBudgets { owner: String, json: PathBuf },
    /// Print totals, budget progress and insights
    Summary { owner: String },
    /// Write the report as CSV (stdout unless --out is given)
    Export {
        owner: String,
        name: String,
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env().with_db_path(cli.db);
    init_logging(&config);

    let repo = SqliteRepository::open(&config.db_path)
        .with_context(|| format!("opening database {}", config.db_path.display()))?;
    let tracker = Tracker::new(Arc::new(repo));

    match cli.command {
        Command::Import { owner, csv } => run_import(&tracker, &owner, &csv),
        Command::ImportBudgets { owner, json } => run_import_budgets(&tracker, &owner, &json),
        Command::Summary { owner } => run_summary(&tracker, &owner),
        Command::Export { owner, name, out } => run_export(&tracker, &owner, &name, out),
    }
}

fn run_import(tracker: &Tracker<SqliteRepository>, owner: &str, csv: &Path) -> Result<()> {
    println!("📂 Loading CSV {}...", csv.display());

    let file = File::open(csv).with_context(|| format!("opening {}", csv.display()))?;
    let created = tracker
        .transactions
        .import_csv(owner, file)
        .with_context(|| format!("importing {}", csv.display()))?;

    println!("✓ Imported {} transactions for {}", created, owner);
    Ok(())
}

fn run_import_budgets(tracker: &Tracker<SqliteRepository>, owner: &str, json: &Path) -> Result<()> {
    let raw = fs::read_to_string(json).with_context(|| format!("reading {}", json.display()))?;
    let doc = tracker.budgets.import_legacy(owner, &raw)?;

    println!("✓ Stored {} budget categories (version {})", doc.budgets.len(), doc.version);
    Ok(())
}

fn run_summary(tracker: &Tracker<SqliteRepository>, owner: &str) -> Result<()> {
    let view = tracker.dashboard(owner)?;

    println!("📊 Summary for {}", owner);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Transactions:  {}", view.transaction_count);
    println!("Income:        {}", format_money(view.totals.income));
    println!("Expenses:      {}", format_money(view.totals.expenses));
    println!("Balance:       {}", format_money(view.totals.balance));

    if !view.monthly.is_empty() {
        println!("\n📅 By month");
        for month in &view.monthly {
            println!(
                "  {}  income {:>10}  expenses {:>10}",
                month.month,
                format_money(month.totals.income),
                format_money(month.totals.expenses),
            );
        }
    }

    println!("\n💰 Budgets");
    for budget in &view.budgets {
        let marker = if budget.check.over_budget { "⚠️ " } else { "  " };
        println!(
            "{}{:<16} {:>10} / {:>10}  ({}%)",
            marker,
            budget.category,
            format_money(budget.spent),
            format_money(budget.limit),
            budget.progress.round_dp(0),
        );
    }

    if !view.insights.is_empty() {
        println!("\n💡 Insights");
        for insight in &view.insights {
            println!("  {}: {}", insight.title, insight.description);
        }
    }

    Ok(())
}

fn run_export(tracker: &Tracker<SqliteRepository>, owner: &str, name: &str, out: Option<PathBuf>) -> Result<()> {
    let report = tracker.report(owner, name, Utc::now().date_naive())?;

    match out {
        Some(path) => {
            let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
            write_csv(&report, file)?;
            info!(rows = report.rows.len(), path = %path.display(), "report written");
            for line in report.summary_lines() {
                println!("{}", line);
            }
            println!("✓ Wrote {} rows to {}", report.rows.len(), path.display());
        }
        None => write_csv(&report, io::stdout().lock())?,
    }

    Ok(())
}
