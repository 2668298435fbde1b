use anyhow::Result;
use async_trait::async_trait;

use crate::models::ShowRun;

/// Append-only record of finished shows.
#[async_trait]
pub trait RunJournal: Send + Sync {
    async fn record_run(&self, run: &ShowRun) -> Result<()>;

    async fn list_runs(&self, limit: usize) -> Result<Vec<ShowRun>>;
}
