use anyhow::Result;
use async_trait::async_trait;
use rusqlite::{params, Row};

use crate::db::{
    connection::Database,
    helpers::{minutes_to_ms, ms_to_minutes, parse_datetime, to_i64, to_usize},
};
use crate::models::ShowRun;
use crate::persistence::RunJournal;

fn row_to_show_run(row: &Row) -> Result<ShowRun> {
    let activated_at: String = row.get("activated_at")?;
    let ended_at: String = row.get("ended_at")?;
    let elapsed_ms: i64 = row.get("elapsed_ms")?;
    let final_segment_index: i64 = row.get("final_segment_index")?;
    let segment_count: i64 = row.get("segment_count")?;

    Ok(ShowRun {
        id: row.get("id")?,
        plan_id: row.get("plan_id")?,
        show_id: row.get("show_id")?,
        title: row.get("title")?,
        activated_at: parse_datetime(&activated_at, "activated_at")?,
        ended_at: parse_datetime(&ended_at, "ended_at")?,
        elapsed_minutes: ms_to_minutes(elapsed_ms),
        final_segment_index: to_usize(final_segment_index, "final_segment_index")?,
        segment_count: to_usize(segment_count, "segment_count")?,
    })
}

impl Database {
    pub async fn insert_show_run(&self, run: &ShowRun) -> Result<()> {
        let record = run.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO show_runs (id, plan_id, show_id, title, activated_at, ended_at, elapsed_ms, final_segment_index, segment_count)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    record.id,
                    record.plan_id,
                    record.show_id,
                    record.title,
                    record.activated_at.to_rfc3339(),
                    record.ended_at.to_rfc3339(),
                    minutes_to_ms(record.elapsed_minutes),
                    to_i64(record.final_segment_index)?,
                    to_i64(record.segment_count)?,
                ],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn list_show_runs(&self, limit: usize) -> Result<Vec<ShowRun>> {
        let limit = to_i64(limit)?;
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, plan_id, show_id, title, activated_at, ended_at, elapsed_ms, final_segment_index, segment_count
                 FROM show_runs
                 ORDER BY ended_at DESC
                 LIMIT ?1",
            )?;

            let mut rows = stmt.query(params![limit])?;
            let mut runs = Vec::new();
            while let Some(row) = rows.next()? {
                runs.push(row_to_show_run(row)?);
            }

            Ok(runs)
        })
        .await
    }
}

#[async_trait]
impl RunJournal for Database {
    async fn record_run(&self, run: &ShowRun) -> Result<()> {
        self.insert_show_run(run).await
    }

    async fn list_runs(&self, limit: usize) -> Result<Vec<ShowRun>> {
        self.list_show_runs(limit).await
    }
}
