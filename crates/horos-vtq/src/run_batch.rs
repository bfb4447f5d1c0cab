use crate::job::Job;
use crate::vtq::Vtq;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

impl Vtq {
    /// Like `run`, but claims up to `batch_size` jobs per poll and fans
    /// them out to at most `max_concurrency` concurrently-running handlers
    /// via a counting semaphore, each given a child of `cancel` so it can
    /// observe the consumer's context. On `cancel`, stops claiming new work
    /// and drains in-flight handlers before returning; each job's ack/nack
    /// still runs (it's a plain synchronous DB write, unaffected by the
    /// cancellation of the surrounding loop), but a handler whose token was
    /// cancelled before it finished is always nacked regardless of the
    /// result it returned, so it reappears quickly rather than waiting out
    /// its full visibility timeout.
    pub async fn run_batch<F, Fut>(
        &self,
        queue: &str,
        poll_interval: Duration,
        batch_size: u32,
        max_concurrency: usize,
        max_attempts: Option<i64>,
        visibility: Option<Duration>,
        cancel: CancellationToken,
        handler: F,
    ) where
        F: Fn(Job, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), String>> + Send + 'static,
    {
        let handler = Arc::new(handler);
        let semaphore = Arc::new(Semaphore::new(max_concurrency));
        let mut in_flight = JoinSet::new();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(poll_interval) => {}
            }

            let claimed = match self.batch_claim(queue, batch_size, visibility) {
                Ok(jobs) => jobs,
                Err(e) => {
                    warn!(error = %e, "vtq: batch claim failed");
                    continue;
                }
            };

            for job in claimed {
                if let Some(max) = max_attempts {
                    if job.attempts > max {
                        debug!(job_id = %job.id, attempts = job.attempts, "vtq: max attempts exceeded, discarding");
                        if let Err(e) = self.ack(&job.id) {
                            warn!(error = %e, "vtq: failed to discard job past max attempts");
                        }
                        continue;
                    }
                }

                let permit = semaphore.clone().acquire_owned().await.expect("semaphore not closed");
                let handler = handler.clone();
                let vtq = self.clone();
                let id = job.id.clone();
                let job_cancel = cancel.child_token();
                in_flight.spawn(async move {
                    let _permit = permit;
                    let outcome = handler(job, job_cancel.clone()).await;
                    if job_cancel.is_cancelled() {
                        debug!(job_id = %id, "vtq: handler ran under cancellation, nacking regardless of outcome");
                        if let Err(e) = vtq.nack(&id) {
                            warn!(error = %e, "vtq: nack failed");
                        }
                        return;
                    }
                    match outcome {
                        Ok(()) => {
                            if let Err(e) = vtq.ack(&id) {
                                warn!(error = %e, "vtq: ack failed");
                            }
                        }
                        Err(e) => {
                            debug!(job_id = %id, error = %e, "vtq: handler failed, nacking");
                            if let Err(e) = vtq.nack(&id) {
                                warn!(error = %e, "vtq: nack failed");
                            }
                        }
                    }
                });
            }

            // Reap finished tasks without blocking the poll loop.
            while in_flight.try_join_next().is_some() {}
        }

        // Drain every in-flight handler before returning.
        while in_flight.join_next().await.is_some() {}
    }
}
