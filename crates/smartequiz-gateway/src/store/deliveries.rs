//! Delivery log store operations.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::GatewayStore;
use crate::models::{DeliveryStatus, WebhookDelivery};

impl GatewayStore {
    pub async fn insert_delivery(&self, delivery: WebhookDelivery) {
        self.deliveries.write().await.insert(delivery.id, delivery);
    }

    pub async fn find_delivery(
        &self,
        tenant_id: Uuid,
        webhook_id: Uuid,
        delivery_id: Uuid,
    ) -> Option<WebhookDelivery> {
        self.deliveries
            .read()
            .await
            .get(&delivery_id)
            .filter(|d| d.tenant_id == tenant_id && d.webhook_id == webhook_id)
            .cloned()
    }

    pub async fn get_delivery(&self, delivery_id: Uuid) -> Option<WebhookDelivery> {
        self.deliveries.read().await.get(&delivery_id).cloned()
    }

    /// Deliveries for one webhook, newest first, with an optional status
    /// filter; returns the page plus the filtered total.
    pub async fn list_deliveries_by_webhook(
        &self,
        tenant_id: Uuid,
        webhook_id: Uuid,
        limit: usize,
        offset: usize,
        status: Option<DeliveryStatus>,
    ) -> (Vec<WebhookDelivery>, usize) {
        let mut rows: Vec<WebhookDelivery> = self
            .deliveries
            .read()
            .await
            .values()
            .filter(|d| {
                d.tenant_id == tenant_id
                    && d.webhook_id == webhook_id
                    && status.map_or(true, |s| d.status == s)
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = rows.len();
        (rows.into_iter().skip(offset).take(limit).collect(), total)
    }

    /// Record a successful attempt. No-op once the delivery is terminal, so
    /// an in-flight attempt cannot resurrect a cancelled delivery.
    pub async fn mark_delivery_success(
        &self,
        delivery_id: Uuid,
        attempts: u32,
        response_status: u16,
        response_body: Option<String>,
    ) {
        let mut rows = self.deliveries.write().await;
        if let Some(d) = rows.get_mut(&delivery_id).filter(|d| !d.status.is_terminal()) {
            d.status = DeliveryStatus::Success;
            d.attempts = attempts;
            d.response_status = Some(response_status);
            d.response_body = response_body;
            d.error_message = None;
            d.last_attempt_at = Some(Utc::now());
            d.next_retry_at = None;
        }
    }

    /// Record a failed attempt that will be retried.
    #[allow(clippy::too_many_arguments)]
    pub async fn mark_delivery_retrying(
        &self,
        delivery_id: Uuid,
        attempts: u32,
        error_message: String,
        response_status: Option<u16>,
        response_body: Option<String>,
        next_retry_at: DateTime<Utc>,
    ) {
        let mut rows = self.deliveries.write().await;
        if let Some(d) = rows.get_mut(&delivery_id).filter(|d| !d.status.is_terminal()) {
            d.status = DeliveryStatus::Retrying;
            d.attempts = attempts;
            d.response_status = response_status;
            d.response_body = response_body;
            d.error_message = Some(error_message);
            d.last_attempt_at = Some(Utc::now());
            d.next_retry_at = Some(next_retry_at);
        }
    }

    /// Record a terminal failure (retries exhausted or cancellation).
    pub async fn mark_delivery_failed(
        &self,
        delivery_id: Uuid,
        attempts: u32,
        error_message: String,
        response_status: Option<u16>,
        response_body: Option<String>,
    ) {
        let mut rows = self.deliveries.write().await;
        if let Some(d) = rows.get_mut(&delivery_id).filter(|d| !d.status.is_terminal()) {
            d.status = DeliveryStatus::Failed;
            d.attempts = attempts;
            d.response_status = response_status;
            d.response_body = response_body;
            d.error_message = Some(error_message);
            d.last_attempt_at = Some(Utc::now());
            d.next_retry_at = None;
        }
    }

    /// Cancel every pending/retrying delivery for a webhook (on deletion).
    /// Attempts already in flight keep running; their outcome is logged but
    /// no longer affects webhook state.
    pub async fn cancel_deliveries_for_webhook(&self, webhook_id: Uuid, reason: &str) -> usize {
        let mut rows = self.deliveries.write().await;
        let mut cancelled = 0;
        for d in rows.values_mut() {
            if d.webhook_id == webhook_id
                && matches!(d.status, DeliveryStatus::Pending | DeliveryStatus::Retrying)
            {
                d.status = DeliveryStatus::Failed;
                d.error_message = Some(reason.to_string());
                d.next_retry_at = None;
                cancelled += 1;
            }
        }
        cancelled
    }

    /// Atomically claim retrying deliveries that are due.
    ///
    /// Claiming clears `next_retry_at` under the write lock, so a delivery
    /// leaves the due set the moment it is taken and attempts for the same
    /// delivery can never overlap.
    pub async fn claim_due_retries(&self, now: DateTime<Utc>, max: usize) -> Vec<WebhookDelivery> {
        let mut rows = self.deliveries.write().await;
        let mut claimed = Vec::new();
        for d in rows.values_mut() {
            if claimed.len() >= max {
                break;
            }
            if d.status == DeliveryStatus::Retrying
                && d.next_retry_at.is_some_and(|due| due <= now)
            {
                d.next_retry_at = None;
                claimed.push(d.clone());
            }
        }
        claimed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EventType;
    use chrono::Duration;

    fn sample_delivery(tenant_id: Uuid, webhook_id: Uuid) -> WebhookDelivery {
        WebhookDelivery {
            id: Uuid::new_v4(),
            webhook_id,
            tenant_id,
            event_type: EventType::TournamentCompleted,
            payload: serde_json::json!({"id": "x"}),
            status: DeliveryStatus::Pending,
            attempts: 0,
            response_status: None,
            response_body: None,
            error_message: None,
            created_at: Utc::now(),
            last_attempt_at: None,
            next_retry_at: None,
        }
    }

    #[tokio::test]
    async fn test_list_newest_first_with_filter() {
        let store = GatewayStore::new();
        let tenant = Uuid::new_v4();
        let webhook = Uuid::new_v4();

        let mut older = sample_delivery(tenant, webhook);
        older.created_at = Utc::now() - Duration::minutes(10);
        let newer = sample_delivery(tenant, webhook);
        let newer_id = newer.id;
        store.insert_delivery(older.clone()).await;
        store.insert_delivery(newer).await;
        store
            .mark_delivery_success(older.id, 1, 200, None)
            .await;

        let (all, total) = store
            .list_deliveries_by_webhook(tenant, webhook, 50, 0, None)
            .await;
        assert_eq!(total, 2);
        assert_eq!(all[0].id, newer_id);

        let (succeeded, succeeded_total) = store
            .list_deliveries_by_webhook(tenant, webhook, 50, 0, Some(DeliveryStatus::Success))
            .await;
        assert_eq!(succeeded_total, 1);
        assert_eq!(succeeded[0].id, older.id);
    }

    #[tokio::test]
    async fn test_cancel_skips_terminal_rows() {
        let store = GatewayStore::new();
        let tenant = Uuid::new_v4();
        let webhook = Uuid::new_v4();

        let pending = sample_delivery(tenant, webhook);
        let done = sample_delivery(tenant, webhook);
        store.insert_delivery(pending.clone()).await;
        store.insert_delivery(done.clone()).await;
        store.mark_delivery_success(done.id, 1, 200, None).await;

        let cancelled = store
            .cancel_deliveries_for_webhook(webhook, "webhook deleted")
            .await;
        assert_eq!(cancelled, 1);

        let row = store.get_delivery(pending.id).await.unwrap();
        assert_eq!(row.status, DeliveryStatus::Failed);
        assert_eq!(row.error_message.as_deref(), Some("webhook deleted"));

        let untouched = store.get_delivery(done.id).await.unwrap();
        assert_eq!(untouched.status, DeliveryStatus::Success);
    }

    #[tokio::test]
    async fn test_claim_removes_from_due_set() {
        let store = GatewayStore::new();
        let tenant = Uuid::new_v4();
        let webhook = Uuid::new_v4();
        let delivery = sample_delivery(tenant, webhook);
        let id = delivery.id;
        store.insert_delivery(delivery).await;
        store
            .mark_delivery_retrying(
                id,
                1,
                "HTTP 500".to_string(),
                Some(500),
                None,
                Utc::now() - Duration::seconds(1),
            )
            .await;

        let first = store.claim_due_retries(Utc::now(), 10).await;
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].id, id);

        // Claimed rows are no longer due.
        let second = store.claim_due_retries(Utc::now(), 10).await;
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn test_future_retries_are_not_claimed() {
        let store = GatewayStore::new();
        let delivery = sample_delivery(Uuid::new_v4(), Uuid::new_v4());
        let id = delivery.id;
        store.insert_delivery(delivery).await;
        store
            .mark_delivery_retrying(
                id,
                1,
                "timeout".to_string(),
                None,
                None,
                Utc::now() + Duration::minutes(5),
            )
            .await;

        assert!(store.claim_due_retries(Utc::now(), 10).await.is_empty());
    }
}
