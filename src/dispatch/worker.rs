// src/dispatch/worker.rs

//! Asynchronous dispatch queue.
//!
//! Change notifications are decoupled from the synchronous sync cycle:
//! matched rules are enqueued here and delivered by a background worker
//! with at-least-once semantics and a bounded fixed-delay retry.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::dispatch::dispatcher::{Dispatcher, Notification};
use crate::models::Subscriber;
use crate::utils::BackoffPolicy;

/// One unit of dispatch work.
#[derive(Debug, Clone)]
pub struct DispatchJob {
    pub rule_id: String,
    pub subscriber: Subscriber,
    pub notification: Notification,
}

/// Handle for enqueuing dispatch jobs.
#[derive(Clone)]
pub struct DispatchQueue {
    tx: mpsc::UnboundedSender<DispatchJob>,
}

impl DispatchQueue {
    /// Start the worker task and return the queue handle.
    ///
    /// The worker drains jobs until every queue handle is dropped, then
    /// exits; the join handle lets callers await that drain.
    pub fn start(dispatcher: Arc<Dispatcher>, retry: BackoffPolicy) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run_worker(dispatcher, retry, rx));
        (Self { tx }, worker)
    }

    /// Enqueue a job. Returns false if the worker has already exited.
    pub fn enqueue(&self, job: DispatchJob) -> bool {
        self.tx.send(job).is_ok()
    }
}

async fn run_worker(
    dispatcher: Arc<Dispatcher>,
    retry: BackoffPolicy,
    mut rx: mpsc::UnboundedReceiver<DispatchJob>,
) {
    while let Some(job) = rx.recv().await {
        deliver_with_retry(&dispatcher, &retry, &job).await;
    }
    log::debug!("Dispatch worker drained, exiting");
}

/// Deliver one job, retrying failed attempts per the policy.
///
/// Exhausted retries are a permanent failure: logged with full context,
/// never re-queued, and never allowed to block other pending jobs.
async fn deliver_with_retry(dispatcher: &Dispatcher, retry: &BackoffPolicy, job: &DispatchJob) {
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        match dispatcher
            .dispatch_change(&job.subscriber, &job.notification)
            .await
        {
            Ok(outcome) => {
                log::debug!(
                    "Dispatch job done: rule={} subscriber={} outcome={:?} attempt={}",
                    job.rule_id,
                    job.subscriber.id,
                    outcome,
                    attempt
                );
                return;
            }
            Err(error) => match retry.delay_after(attempt) {
                Some(delay) => {
                    log::warn!(
                        "Dispatch attempt {} failed for rule {} (subscriber {}, location {:?}): {}",
                        attempt,
                        job.rule_id,
                        job.subscriber.id,
                        job.notification.location_id,
                        error
                    );
                    tokio::time::sleep(delay).await;
                }
                None => {
                    log::error!(
                        "Dispatch permanently failed after {} attempts: rule={} subscriber={} location={:?} error={}",
                        attempt,
                        job.rule_id,
                        job.subscriber.id,
                        job.notification.location_id,
                        error
                    );
                    return;
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::push::{PushChannel, PushReceipt};
    use crate::error::{AppError, Result};
    use crate::models::NotificationKind;
    use crate::storage::LocalStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    /// Fails a configured number of times, then succeeds.
    struct FlakyChannel {
        failures: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl PushChannel for FlakyChannel {
        async fn send(
            &self,
            _: &str,
            _: &str,
            _: &str,
            _: &serde_json::Value,
        ) -> Result<PushReceipt> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(AppError::provider("connection reset"))
            } else {
                Ok(PushReceipt {
                    success: 1,
                    failure: 0,
                })
            }
        }
    }

    fn make_job() -> DispatchJob {
        DispatchJob {
            rule_id: "r1".to_string(),
            subscriber: Subscriber {
                id: "sub1".to_string(),
                push_token: Some("t1".to_string()),
                notifications_enabled: true,
            },
            notification: Notification {
                subscriber_id: "sub1".to_string(),
                location_id: Some("loc1".to_string()),
                kind: NotificationKind::Change,
                title: "t".to_string(),
                body: "b".to_string(),
                data: serde_json::json!({}),
            },
        }
    }

    async fn run_queue(channel: Arc<FlakyChannel>, retry: BackoffPolicy) {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(LocalStore::new(tmp.path()));
        let dispatcher = Arc::new(Dispatcher::new(channel, store));

        let (queue, worker) = DispatchQueue::start(dispatcher, retry);
        assert!(queue.enqueue(make_job()));
        drop(queue);
        worker.await.unwrap();
    }

    #[tokio::test]
    async fn job_retries_until_success() {
        let channel = Arc::new(FlakyChannel {
            failures: 2,
            calls: AtomicU32::new(0),
        });
        let retry = BackoffPolicy::fixed(3, Duration::from_millis(1));

        run_queue(channel.clone(), retry).await;
        assert_eq!(channel.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_failure_stops_after_attempt_budget() {
        let channel = Arc::new(FlakyChannel {
            failures: u32::MAX,
            calls: AtomicU32::new(0),
        });
        let retry = BackoffPolicy::fixed(3, Duration::from_millis(1));

        run_queue(channel.clone(), retry).await;
        assert_eq!(channel.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn worker_processes_jobs_in_order() {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(LocalStore::new(tmp.path()));
        let channel = Arc::new(FlakyChannel {
            failures: 0,
            calls: AtomicU32::new(0),
        });
        let dispatcher = Arc::new(Dispatcher::new(channel.clone(), store));

        let (queue, worker) =
            DispatchQueue::start(dispatcher, BackoffPolicy::fixed(3, Duration::from_millis(1)));
        for _ in 0..5 {
            assert!(queue.enqueue(make_job()));
        }
        drop(queue);
        worker.await.unwrap();

        assert_eq!(channel.calls.load(Ordering::SeqCst), 5);
    }
}
