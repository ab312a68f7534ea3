use anyhow::Result;
use tracing_subscriber::EnvFilter;

use sqlite_relations::demos;
use sqlite_relations::store::{Database, SqliteConfig};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // One catch for everything: a failure in an earlier demo skips the rest.
    if let Err(error) = run().await {
        tracing::error!("association demos failed: {:#}", error);
    }
}

async fn run() -> Result<()> {
    let config = SqliteConfig::new("db.sqlite");
    let db = Database::open(&config)?;
    demos::run_all(&db).await?;
    Ok(())
}
