//! Webhook store operations.

use chrono::Utc;
use uuid::Uuid;

use super::GatewayStore;
use crate::models::{EventType, Webhook, WebhookStatus};

impl GatewayStore {
    pub async fn insert_webhook(&self, webhook: Webhook) {
        self.webhooks.write().await.insert(webhook.id, webhook);
    }

    pub async fn find_webhook(&self, tenant_id: Uuid, id: Uuid) -> Option<Webhook> {
        self.webhooks
            .read()
            .await
            .get(&id)
            .filter(|w| w.tenant_id == tenant_id)
            .cloned()
    }

    pub async fn count_webhooks(&self, tenant_id: Uuid) -> usize {
        self.webhooks
            .read()
            .await
            .values()
            .filter(|w| w.tenant_id == tenant_id)
            .count()
    }

    /// Webhooks for a tenant, newest first, with total for pagination.
    pub async fn list_webhooks(
        &self,
        tenant_id: Uuid,
        limit: usize,
        offset: usize,
    ) -> (Vec<Webhook>, usize) {
        let mut hooks: Vec<Webhook> = self
            .webhooks
            .read()
            .await
            .values()
            .filter(|w| w.tenant_id == tenant_id)
            .cloned()
            .collect();
        hooks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = hooks.len();
        (hooks.into_iter().skip(offset).take(limit).collect(), total)
    }

    /// Active webhooks of a tenant subscribed to the exact event type.
    pub async fn find_active_by_event_type(
        &self,
        tenant_id: Uuid,
        event_type: EventType,
    ) -> Vec<Webhook> {
        self.webhooks
            .read()
            .await
            .values()
            .filter(|w| {
                w.tenant_id == tenant_id
                    && w.status == WebhookStatus::Active
                    && w.subscribes_to(event_type)
            })
            .cloned()
            .collect()
    }

    /// Apply an update closure to a webhook, bumping `updated_at`.
    pub async fn update_webhook<F>(&self, tenant_id: Uuid, id: Uuid, apply: F) -> Option<Webhook>
    where
        F: FnOnce(&mut Webhook),
    {
        let mut hooks = self.webhooks.write().await;
        let webhook = hooks.get_mut(&id).filter(|w| w.tenant_id == tenant_id)?;
        apply(webhook);
        webhook.updated_at = Utc::now();
        Some(webhook.clone())
    }

    pub async fn delete_webhook(&self, tenant_id: Uuid, id: Uuid) -> bool {
        let mut hooks = self.webhooks.write().await;
        match hooks.get(&id) {
            Some(w) if w.tenant_id == tenant_id => {
                hooks.remove(&id);
                true
            }
            _ => false,
        }
    }

    /// Increment the consecutive-failure counter; returns the new count, or
    /// `None` when the webhook no longer exists (deleted mid-flight, the
    /// outcome is logged but ignored).
    pub async fn increment_consecutive_failures(&self, webhook_id: Uuid) -> Option<u32> {
        let mut hooks = self.webhooks.write().await;
        let webhook = hooks.get_mut(&webhook_id)?;
        webhook.consecutive_failures += 1;
        Some(webhook.consecutive_failures)
    }

    /// Pause a webhook that crossed the failure threshold.
    pub async fn pause_webhook(&self, webhook_id: Uuid) -> bool {
        let mut hooks = self.webhooks.write().await;
        match hooks.get_mut(&webhook_id) {
            Some(webhook) => {
                webhook.status = WebhookStatus::Paused;
                webhook.updated_at = Utc::now();
                true
            }
            None => false,
        }
    }

    /// Record a successful delivery: reset the failure counter and stamp
    /// `last_delivery_at`.
    pub async fn record_webhook_success(&self, webhook_id: Uuid) {
        let mut hooks = self.webhooks.write().await;
        if let Some(webhook) = hooks.get_mut(&webhook_id) {
            webhook.consecutive_failures = 0;
            webhook.last_delivery_at = Some(Utc::now());
        }
    }

    /// Manual reactivation: back to Active with the counter reset.
    pub async fn reactivate_webhook(&self, tenant_id: Uuid, id: Uuid) -> Option<Webhook> {
        let mut hooks = self.webhooks.write().await;
        let webhook = hooks.get_mut(&id).filter(|w| w.tenant_id == tenant_id)?;
        webhook.status = WebhookStatus::Active;
        webhook.consecutive_failures = 0;
        webhook.updated_at = Utc::now();
        Some(webhook.clone())
    }
}
