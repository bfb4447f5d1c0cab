use crate::error::VtqError;
use crate::job::Job;
use horos_contracts::{new_id, now_ms};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// A single SQL-table queue with SQS-style visibility timeouts. Usable for
/// work distribution, leader election (one row + N contenders), and
/// elastic overflow.
#[derive(Clone)]
pub struct Vtq {
    conn: Arc<Mutex<Connection>>,
    default_visibility: Duration,
}

fn row_to_job(row: &rusqlite::Row) -> rusqlite::Result<Job> {
    Ok(Job {
        id: row.get(0)?,
        queue: row.get(1)?,
        payload: row.get(2)?,
        visible_at: row.get(3)?,
        created_at: row.get(4)?,
        attempts: row.get(5)?,
    })
}

impl Vtq {
    pub fn new(conn: Arc<Mutex<Connection>>, default_visibility: Duration) -> Self {
        Self {
            conn,
            default_visibility,
        }
    }

    /// Idempotent schema creation.
    pub fn migrate(conn: &Connection) -> rusqlite::Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS vtq_jobs (
                id TEXT PRIMARY KEY,
                queue TEXT NOT NULL,
                payload BLOB NOT NULL,
                visible_at INTEGER NOT NULL,
                created_at INTEGER NOT NULL,
                attempts INTEGER NOT NULL DEFAULT 0
            );
            CREATE INDEX IF NOT EXISTS idx_vtq_jobs_queue_visible_at
            ON vtq_jobs(queue, visible_at);",
        )
    }

    /// Insert a job, immediately claimable (`visible_at = now()`).
    pub fn publish(&self, queue: &str, payload: Vec<u8>) -> Result<String, VtqError> {
        self.publish_with_id(&new_id(), queue, payload)
    }

    pub fn publish_with_id(&self, id: &str, queue: &str, payload: Vec<u8>) -> Result<String, VtqError> {
        let now = now_ms();
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO vtq_jobs (id, queue, payload, visible_at, created_at, attempts)
             VALUES (?1, ?2, ?3, ?4, ?4, 0)",
            params![id, queue, payload, now],
        )?;
        Ok(id.to_string())
    }

    /// Atomically select the most-overdue visible row, mark it claimed for
    /// `visibility` (default if `None`), increment `attempts`, and return
    /// it. `None` if nothing is currently visible.
    pub fn claim(&self, queue: &str, visibility: Option<Duration>) -> Result<Option<Job>, VtqError> {
        let jobs = self.batch_claim(queue, 1, visibility)?;
        Ok(jobs.into_iter().next())
    }

    pub fn batch_claim(
        &self,
        queue: &str,
        n: u32,
        visibility: Option<Duration>,
    ) -> Result<Vec<Job>, VtqError> {
        let now = now_ms();
        let new_visible_at = now + visibility.unwrap_or(self.default_visibility).as_millis() as i64;
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "UPDATE vtq_jobs
             SET visible_at = ?1, attempts = attempts + 1
             WHERE id IN (
                 SELECT id FROM vtq_jobs
                 WHERE queue = ?2 AND visible_at <= ?3
                 ORDER BY visible_at ASC
                 LIMIT ?4
             )
             RETURNING id, queue, payload, visible_at, created_at, attempts",
        )?;
        let rows = stmt.query_map(params![new_visible_at, queue, now, n], row_to_job)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn ack(&self, id: &str) -> Result<(), VtqError> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM vtq_jobs WHERE id = ?1", params![id])?;
        Ok(())
    }

    pub fn nack(&self, id: &str) -> Result<(), VtqError> {
        let conn = self.conn.lock();
        conn.execute("UPDATE vtq_jobs SET visible_at = 0 WHERE id = ?1", params![id])?;
        Ok(())
    }

    pub fn extend(&self, id: &str, extra: Duration) -> Result<(), VtqError> {
        let new_visible_at = now_ms() + extra.as_millis() as i64;
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE vtq_jobs SET visible_at = ?1 WHERE id = ?2",
            params![new_visible_at, id],
        )?;
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<Option<Job>, VtqError> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, queue, payload, visible_at, created_at, attempts FROM vtq_jobs WHERE id = ?1",
            params![id],
            row_to_job,
        )
        .optional()
        .map_err(VtqError::from)
    }

    /// Poll `queue` every `poll_interval`; for each claim, discard (ack) and
    /// log jobs whose `attempts` exceed `max_attempts`; otherwise call
    /// `handler` with a child of `cancel` so it can observe the consumer's
    /// context, ack on success, nack on error. Blocks until `cancel` fires.
    pub async fn run<F, Fut>(
        &self,
        queue: &str,
        poll_interval: Duration,
        max_attempts: Option<i64>,
        visibility: Option<Duration>,
        cancel: CancellationToken,
        handler: F,
    ) where
        F: Fn(Job, CancellationToken) -> Fut,
        Fut: std::future::Future<Output = Result<(), String>>,
    {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(poll_interval) => {}
            }

            let claimed = match self.claim(queue, visibility) {
                Ok(Some(job)) => job,
                Ok(None) => continue,
                Err(e) => {
                    warn!(error = %e, "vtq: claim failed");
                    continue;
                }
            };

            if let Some(max) = max_attempts {
                if claimed.attempts > max {
                    debug!(job_id = %claimed.id, attempts = claimed.attempts, "vtq: max attempts exceeded, discarding");
                    if let Err(e) = self.ack(&claimed.id) {
                        warn!(error = %e, "vtq: failed to discard job past max attempts");
                    }
                    continue;
                }
            }

            let id = claimed.id.clone();
            match handler(claimed, cancel.child_token()).await {
                Ok(()) => {
                    if let Err(e) = self.ack(&id) {
                        warn!(error = %e, "vtq: ack failed");
                    }
                }
                Err(e) => {
                    debug!(job_id = %id, error = %e, "vtq: handler failed, nacking");
                    if let Err(e) = self.nack(&id) {
                        warn!(error = %e, "vtq: nack failed");
                    }
                }
            }
        }
    }
}
