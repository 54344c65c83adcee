// src/dispatch/dispatcher.rs

//! Notification dispatcher.
//!
//! Resolves whether a subscriber is deliverable, performs one push call,
//! and writes exactly one audit record per outcome, `skipped` included.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;

use crate::dispatch::push::PushChannel;
use crate::error::{AppError, Result};
use crate::models::{DeliveryOutcome, NotificationKind, NotificationRecord, Subscriber};
use crate::storage::Store;

/// A rendered notification ready for delivery.
#[derive(Debug, Clone)]
pub struct Notification {
    pub subscriber_id: String,
    pub location_id: Option<String>,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub data: Value,
}

/// Sends notifications through a push channel and audits every attempt.
pub struct Dispatcher {
    channel: Arc<dyn PushChannel>,
    store: Arc<dyn Store>,
}

impl Dispatcher {
    pub fn new(channel: Arc<dyn PushChannel>, store: Arc<dyn Store>) -> Self {
        Self { channel, store }
    }

    /// Dispatch a change notification.
    ///
    /// A delivery failure is returned as an error so the queue worker's
    /// retry policy can apply. The failure is audited before returning.
    pub async fn dispatch_change(
        &self,
        subscriber: &Subscriber,
        notification: &Notification,
    ) -> Result<DeliveryOutcome> {
        let (outcome, error) = self.deliver(subscriber, notification).await?;
        if let Some(error) = error {
            return Err(error);
        }
        Ok(outcome)
    }

    /// Dispatch a reminder notification, best-effort.
    ///
    /// Failures are audited and logged but never raised; one failed
    /// reminder must not block the rest of a batch.
    pub async fn dispatch_reminder(
        &self,
        subscriber: &Subscriber,
        notification: &Notification,
    ) -> Result<DeliveryOutcome> {
        let (outcome, error) = self.deliver(subscriber, notification).await?;
        if let Some(error) = error {
            log::warn!(
                "Reminder delivery failed for subscriber {}: {}",
                subscriber.id,
                error
            );
        }
        Ok(outcome)
    }

    /// Perform one delivery attempt and audit it.
    ///
    /// The outer `Result` carries audit-write failures only; the delivery
    /// error, if any, is returned alongside the recorded outcome so the
    /// caller decides whether to raise it.
    async fn deliver(
        &self,
        subscriber: &Subscriber,
        notification: &Notification,
    ) -> Result<(DeliveryOutcome, Option<AppError>)> {
        if !subscriber.notifications_enabled {
            log::info!(
                "Skipping notification for subscriber {}: notifications disabled",
                subscriber.id
            );
            self.audit(notification, DeliveryOutcome::Skipped).await?;
            return Ok((DeliveryOutcome::Skipped, None));
        }

        let Some(token) = subscriber.push_token.as_deref() else {
            log::info!(
                "Skipping notification for subscriber {}: no delivery token",
                subscriber.id
            );
            self.audit(notification, DeliveryOutcome::Skipped).await?;
            return Ok((DeliveryOutcome::Skipped, None));
        };

        match self
            .channel
            .send(token, &notification.title, &notification.body, &notification.data)
            .await
        {
            Ok(receipt) if receipt.success > 0 => {
                self.audit(notification, DeliveryOutcome::Sent).await?;
                Ok((DeliveryOutcome::Sent, None))
            }
            Ok(receipt) => {
                // The call went through but the provider accepted nothing.
                self.audit(notification, DeliveryOutcome::Failed).await?;
                Ok((
                    DeliveryOutcome::Failed,
                    Some(AppError::push(
                        &subscriber.id,
                        format!(
                            "provider accepted 0 messages (failure count {})",
                            receipt.failure
                        ),
                    )),
                ))
            }
            Err(error) => {
                self.audit(notification, DeliveryOutcome::Failed).await?;
                Ok((
                    DeliveryOutcome::Failed,
                    Some(AppError::push(&subscriber.id, error)),
                ))
            }
        }
    }

    async fn audit(&self, notification: &Notification, outcome: DeliveryOutcome) -> Result<()> {
        let record = NotificationRecord {
            subscriber_id: notification.subscriber_id.clone(),
            location_id: notification.location_id.clone(),
            kind: notification.kind,
            title: notification.title.clone(),
            body: notification.body.clone(),
            outcome,
            created_at: Utc::now(),
        };
        self.store.append_notification(&record).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::push::PushReceipt;
    use crate::storage::LocalStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tempfile::TempDir;

    /// Push channel double with a scripted response.
    struct ScriptedChannel {
        response: Response,
        calls: AtomicU32,
    }

    enum Response {
        Accepted,
        Rejected,
        Broken,
    }

    impl ScriptedChannel {
        fn new(response: Response) -> Self {
            Self {
                response,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl PushChannel for ScriptedChannel {
        async fn send(&self, _: &str, _: &str, _: &str, _: &Value) -> Result<PushReceipt> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.response {
                Response::Accepted => Ok(PushReceipt {
                    success: 1,
                    failure: 0,
                }),
                Response::Rejected => Ok(PushReceipt {
                    success: 0,
                    failure: 1,
                }),
                Response::Broken => Err(AppError::provider("connection reset")),
            }
        }
    }

    fn make_subscriber(token: Option<&str>, enabled: bool) -> Subscriber {
        Subscriber {
            id: "sub1".to_string(),
            push_token: token.map(str::to_string),
            notifications_enabled: enabled,
        }
    }

    fn make_notification() -> Notification {
        Notification {
            subscriber_id: "sub1".to_string(),
            location_id: Some("loc1".to_string()),
            kind: NotificationKind::Change,
            title: "Avalanche danger risen".to_string(),
            body: "2 -> 3".to_string(),
            data: serde_json::json!({"old_level": 2, "new_level": 3}),
        }
    }

    fn audited_outcomes(root: &std::path::Path) -> Vec<DeliveryOutcome> {
        use chrono::Datelike;
        let now = Utc::now();
        let path = root.join(format!("notifications/{}/{:02}.json", now.year(), now.month()));
        let Ok(bytes) = std::fs::read(path) else {
            return Vec::new();
        };
        let records: Vec<NotificationRecord> = serde_json::from_slice(&bytes).unwrap();
        records.into_iter().map(|r| r.outcome).collect()
    }

    #[tokio::test]
    async fn successful_delivery_audits_sent() {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(LocalStore::new(tmp.path()));
        let dispatcher = Dispatcher::new(Arc::new(ScriptedChannel::new(Response::Accepted)), store.clone());

        let outcome = dispatcher
            .dispatch_change(&make_subscriber(Some("t1"), true), &make_notification())
            .await
            .unwrap();

        assert_eq!(outcome, DeliveryOutcome::Sent);
        assert_eq!(audited_outcomes(tmp.path()), vec![DeliveryOutcome::Sent]);
    }

    #[tokio::test]
    async fn disabled_subscriber_only_ever_audits_skipped() {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(LocalStore::new(tmp.path()));
        let channel = Arc::new(ScriptedChannel::new(Response::Accepted));
        let dispatcher = Dispatcher::new(channel.clone(), store.clone());

        let subscriber = make_subscriber(Some("t1"), false);
        dispatcher
            .dispatch_change(&subscriber, &make_notification())
            .await
            .unwrap();
        dispatcher
            .dispatch_reminder(&subscriber, &make_notification())
            .await
            .unwrap();

        assert_eq!(
            audited_outcomes(tmp.path()),
            vec![DeliveryOutcome::Skipped, DeliveryOutcome::Skipped]
        );
        // The channel is never touched for a disabled subscriber.
        assert_eq!(channel.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_token_audits_skipped() {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(LocalStore::new(tmp.path()));
        let dispatcher = Dispatcher::new(Arc::new(ScriptedChannel::new(Response::Accepted)), store.clone());

        let outcome = dispatcher
            .dispatch_change(&make_subscriber(None, true), &make_notification())
            .await
            .unwrap();

        assert_eq!(outcome, DeliveryOutcome::Skipped);
        assert_eq!(audited_outcomes(tmp.path()), vec![DeliveryOutcome::Skipped]);
    }

    #[tokio::test]
    async fn zero_acceptance_is_a_failure_on_the_change_path() {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(LocalStore::new(tmp.path()));
        let dispatcher = Dispatcher::new(Arc::new(ScriptedChannel::new(Response::Rejected)), store.clone());

        let result = dispatcher
            .dispatch_change(&make_subscriber(Some("t1"), true), &make_notification())
            .await;

        assert!(result.is_err());
        assert_eq!(audited_outcomes(tmp.path()), vec![DeliveryOutcome::Failed]);
    }

    #[tokio::test]
    async fn reminder_path_swallows_transport_failures() {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(LocalStore::new(tmp.path()));
        let dispatcher = Dispatcher::new(Arc::new(ScriptedChannel::new(Response::Broken)), store.clone());

        let outcome = dispatcher
            .dispatch_reminder(&make_subscriber(Some("t1"), true), &make_notification())
            .await
            .unwrap();

        assert_eq!(outcome, DeliveryOutcome::Failed);
        assert_eq!(audited_outcomes(tmp.path()), vec![DeliveryOutcome::Failed]);
    }
}
