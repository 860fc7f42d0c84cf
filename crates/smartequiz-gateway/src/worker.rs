//! Background worker driving scheduled retries.
//!
//! Polls the store for deliveries whose `next_retry_at` has passed, claims
//! them (clearing the schedule so no other tick picks them up), and spawns
//! one attempt per claimed delivery.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;

use crate::services::DeliveryService;
use crate::store::GatewayStore;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Retries claimed per tick. Keeps one slow tick from monopolizing the
/// store lock.
const RETRY_BATCH_SIZE: usize = 50;

pub struct DeliveryWorker {
    store: Arc<GatewayStore>,
    delivery: DeliveryService,
    poll_interval: Duration,
}

impl DeliveryWorker {
    pub fn new(store: Arc<GatewayStore>, delivery: DeliveryService) -> Self {
        Self {
            store,
            delivery,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Shorten the poll interval (tests).
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Poll until the shutdown signal flips. Run as a background task.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            target: "delivery_worker",
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "Delivery worker started"
        );

        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick().await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        tracing::info!(target: "delivery_worker", "Delivery worker stopping");
                        return;
                    }
                }
            }
        }
    }

    /// Claim and launch every due retry. Public so tests can drive ticks
    /// without the timer.
    pub async fn tick(&self) {
        let due = self
            .store
            .claim_due_retries(Utc::now(), RETRY_BATCH_SIZE)
            .await;
        if due.is_empty() {
            return;
        }

        tracing::debug!(
            target: "delivery_worker",
            claimed = due.len(),
            "Claimed due retries"
        );

        for delivery in due {
            let delivery_service = self.delivery.clone();
            tokio::spawn(async move {
                delivery_service.execute_delivery(delivery.id).await;
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DeliveryStatus, EventType, WebhookDelivery};
    use chrono::Duration as ChronoDuration;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_tick_claims_only_due_retries() {
        let store = Arc::new(GatewayStore::new());
        let delivery_service = DeliveryService::new(store.clone(), vec![0x42u8; 32]).unwrap();
        let worker = DeliveryWorker::new(store.clone(), delivery_service);

        let tenant = Uuid::new_v4();
        let webhook_id = Uuid::new_v4();

        let mut due = WebhookDelivery::pending(
            webhook_id,
            tenant,
            EventType::QuizCompleted,
            serde_json::json!({}),
        );
        due.status = DeliveryStatus::Retrying;
        due.next_retry_at = Some(Utc::now() - ChronoDuration::seconds(1));
        let due_id = due.id;

        let mut future = WebhookDelivery::pending(
            webhook_id,
            tenant,
            EventType::QuizCompleted,
            serde_json::json!({}),
        );
        future.status = DeliveryStatus::Retrying;
        future.next_retry_at = Some(Utc::now() + ChronoDuration::hours(1));
        let future_id = future.id;

        store.insert_delivery(due).await;
        store.insert_delivery(future).await;

        worker.tick().await;

        // The due delivery was claimed: schedule cleared so no other tick
        // re-claims it. The future one is untouched.
        let claimed = store.get_delivery(due_id).await.unwrap();
        assert!(claimed.next_retry_at.is_none());
        let untouched = store.get_delivery(future_id).await.unwrap();
        assert!(untouched.next_retry_at.is_some());
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown_signal() {
        let store = Arc::new(GatewayStore::new());
        let delivery_service = DeliveryService::new(store.clone(), vec![0x42u8; 32]).unwrap();
        let worker = DeliveryWorker::new(store, delivery_service)
            .with_poll_interval(Duration::from_millis(10));

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(worker.run(rx));

        tokio::time::sleep(Duration::from_millis(30)).await;
        tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("worker should stop promptly")
            .unwrap();
    }
}
