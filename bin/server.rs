// Finance Tracker - Web Server
// REST API with Axum over the SQLite-backed tracker

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use finance_tracker::server::{router, AppState};
use finance_tracker::{init_logging, Config, SqliteRepository};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env();
    init_logging(&config);

    println!("🌐 Finance Tracker - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let repo = SqliteRepository::open(&config.db_path)
        .with_context(|| format!("opening database {}", config.db_path.display()))?;
    info!(db = %config.db_path.display(), "database opened");

    let app = router(AppState::new(Arc::new(repo)));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;

    println!("\n🚀 Server running on http://{}", config.bind_addr);
    println!("   API: http://{}/api/transactions", config.bind_addr);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
