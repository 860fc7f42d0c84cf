//! Webhook subscription management.
//!
//! Handles registration, update, deletion, reactivation, and the delivery
//! log, plus the synchronous test-delivery path. Signing secrets are
//! generated here, encrypted at rest, and surfaced exactly once at
//! creation.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use crate::crypto;
use crate::error::GatewayError;
use crate::models::{
    CreateWebhookRequest, CreateWebhookResponse, DeliveryEnvelope, DeliveryListResponse,
    DeliveryResponse, DeliveryStatus, DomainEvent, EventType, ListDeliveriesQuery,
    ListWebhooksQuery, UpdateWebhookRequest, Webhook, WebhookDelivery, WebhookListResponse,
    WebhookResponse, WebhookStatus,
};
use crate::services::delivery_service::DeliveryService;
use crate::store::GatewayStore;
use crate::validation;

/// Maximum registered webhooks per tenant.
pub const DEFAULT_MAX_WEBHOOKS: usize = 25;

/// Retries after the initial attempt when the request omits the field.
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

/// Per-attempt timeout when the request omits the field.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Hard cap on delivery-log page size.
const MAX_PAGE_SIZE: usize = 100;

/// Service managing webhook subscriptions for tenants.
#[derive(Clone)]
pub struct WebhookService {
    store: Arc<GatewayStore>,
    encryption_key: Vec<u8>,
    delivery: DeliveryService,
    max_webhooks: usize,
    allow_http: bool,
}

impl WebhookService {
    pub fn new(store: Arc<GatewayStore>, encryption_key: Vec<u8>, delivery: DeliveryService) -> Self {
        Self {
            store,
            encryption_key,
            delivery,
            max_webhooks: DEFAULT_MAX_WEBHOOKS,
            allow_http: false,
        }
    }

    /// Override the per-tenant webhook limit.
    pub fn with_max_webhooks(mut self, max: usize) -> Self {
        self.max_webhooks = max;
        self
    }

    /// Permit `http://` endpoint URLs (local development and tests).
    pub fn with_allow_http(mut self, allow: bool) -> Self {
        self.allow_http = allow;
        self
    }

    /// Register a webhook endpoint.
    ///
    /// # Errors
    ///
    /// Returns validation errors for a bad URL, unknown event types, or
    /// out-of-range retry/timeout values, and `WebhookLimitExceeded` once
    /// the tenant is at their cap.
    pub async fn create_webhook(
        &self,
        tenant_id: Uuid,
        request: CreateWebhookRequest,
    ) -> Result<CreateWebhookResponse, GatewayError> {
        request
            .validate()
            .map_err(|e| GatewayError::Validation(e.to_string()))?;

        validation::validate_webhook_url(&request.url, self.allow_http)?;
        let events = validation::parse_event_types(&request.events)?;

        let retry_attempts = request.retry_attempts.unwrap_or(DEFAULT_RETRY_ATTEMPTS);
        validation::validate_retry_attempts(retry_attempts)?;
        let timeout_ms = request.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS);
        validation::validate_timeout_ms(timeout_ms)?;

        if self.store.count_webhooks(tenant_id).await >= self.max_webhooks {
            return Err(GatewayError::WebhookLimitExceeded {
                limit: self.max_webhooks,
            });
        }

        let secret = crypto::generate_webhook_secret();
        let secret_encrypted = crypto::encrypt_secret(&secret, &self.encryption_key)?;

        let now = Utc::now();
        let webhook = Webhook {
            id: Uuid::new_v4(),
            tenant_id,
            url: request.url,
            description: request.description,
            events,
            retry_attempts,
            timeout_ms,
            status: WebhookStatus::Active,
            consecutive_failures: 0,
            secret_encrypted,
            last_delivery_at: None,
            created_at: now,
            updated_at: now,
        };

        tracing::info!(
            target: "webhooks",
            webhook_id = %webhook.id,
            tenant_id = %tenant_id,
            url = %webhook.url,
            events = webhook.events.len(),
            "Webhook registered"
        );

        let response = WebhookResponse::from(&webhook);
        self.store.insert_webhook(webhook).await;

        Ok(CreateWebhookResponse {
            webhook: response,
            secret,
        })
    }

    pub async fn get_webhook(
        &self,
        tenant_id: Uuid,
        webhook_id: Uuid,
    ) -> Result<WebhookResponse, GatewayError> {
        self.store
            .find_webhook(tenant_id, webhook_id)
            .await
            .map(|w| WebhookResponse::from(&w))
            .ok_or(GatewayError::WebhookNotFound)
    }

    pub async fn list_webhooks(
        &self,
        tenant_id: Uuid,
        query: &ListWebhooksQuery,
    ) -> WebhookListResponse {
        let limit = query.limit.clamp(1, MAX_PAGE_SIZE);
        let (webhooks, total) = self.store.list_webhooks(tenant_id, limit, query.offset).await;
        WebhookListResponse {
            items: webhooks.iter().map(WebhookResponse::from).collect(),
            total,
        }
    }

    /// Apply a partial update. Absent fields keep their current value;
    /// present fields are validated before anything is written.
    pub async fn update_webhook(
        &self,
        tenant_id: Uuid,
        webhook_id: Uuid,
        request: UpdateWebhookRequest,
    ) -> Result<WebhookResponse, GatewayError> {
        request
            .validate()
            .map_err(|e| GatewayError::Validation(e.to_string()))?;

        if self.store.find_webhook(tenant_id, webhook_id).await.is_none() {
            return Err(GatewayError::WebhookNotFound);
        }

        if let Some(ref url) = request.url {
            validation::validate_webhook_url(url, self.allow_http)?;
        }
        let events = match request.events {
            Some(ref raw) => Some(validation::parse_event_types(raw)?),
            None => None,
        };
        if let Some(retry_attempts) = request.retry_attempts {
            validation::validate_retry_attempts(retry_attempts)?;
        }
        if let Some(timeout_ms) = request.timeout_ms {
            validation::validate_timeout_ms(timeout_ms)?;
        }

        let updated = self
            .store
            .update_webhook(tenant_id, webhook_id, |w| {
                if let Some(url) = request.url {
                    w.url = url;
                }
                if let Some(description) = request.description {
                    w.description = Some(description);
                }
                if let Some(events) = events {
                    w.events = events;
                }
                if let Some(retry_attempts) = request.retry_attempts {
                    w.retry_attempts = retry_attempts;
                }
                if let Some(timeout_ms) = request.timeout_ms {
                    w.timeout_ms = timeout_ms;
                }
            })
            .await
            .ok_or(GatewayError::WebhookNotFound)?;

        tracing::info!(
            target: "webhooks",
            webhook_id = %webhook_id,
            tenant_id = %tenant_id,
            "Webhook updated"
        );

        Ok(WebhookResponse::from(&updated))
    }

    /// Delete a webhook and cancel its queued deliveries. Attempts already
    /// in flight finish but can no longer affect any state.
    pub async fn delete_webhook(
        &self,
        tenant_id: Uuid,
        webhook_id: Uuid,
    ) -> Result<(), GatewayError> {
        if !self.store.delete_webhook(tenant_id, webhook_id).await {
            return Err(GatewayError::WebhookNotFound);
        }

        let cancelled = self
            .store
            .cancel_deliveries_for_webhook(webhook_id, "webhook deleted")
            .await;

        tracing::info!(
            target: "webhooks",
            webhook_id = %webhook_id,
            tenant_id = %tenant_id,
            cancelled_deliveries = cancelled,
            "Webhook deleted"
        );

        Ok(())
    }

    /// Manually resume a paused or failed webhook, resetting its failure
    /// counter. Idempotent on an already-active webhook.
    pub async fn reactivate_webhook(
        &self,
        tenant_id: Uuid,
        webhook_id: Uuid,
    ) -> Result<WebhookResponse, GatewayError> {
        let webhook = self
            .store
            .reactivate_webhook(tenant_id, webhook_id)
            .await
            .ok_or(GatewayError::WebhookNotFound)?;

        tracing::info!(
            target: "webhooks",
            webhook_id = %webhook_id,
            tenant_id = %tenant_id,
            "Webhook reactivated"
        );

        Ok(WebhookResponse::from(&webhook))
    }

    /// Send a `TEST_EVENT` through the real delivery pipeline and wait for
    /// the first attempt, so the caller sees the endpoint's actual response.
    /// The attempt is logged like any other delivery and failed attempts
    /// retry on the normal schedule.
    pub async fn test_webhook(
        &self,
        tenant_id: Uuid,
        webhook_id: Uuid,
    ) -> Result<DeliveryResponse, GatewayError> {
        let webhook = self
            .store
            .find_webhook(tenant_id, webhook_id)
            .await
            .ok_or(GatewayError::WebhookNotFound)?;

        let event = DomainEvent::new(
            tenant_id,
            EventType::TestEvent,
            serde_json::json!({
                "webhookId": webhook.id,
                "message": "Test delivery from SmartEquiz",
            }),
        );
        let payload = serde_json::to_value(DeliveryEnvelope::from_event(&event))
            .map_err(|e| GatewayError::Internal(format!("Failed to build test payload: {e}")))?;

        let delivery =
            WebhookDelivery::pending(webhook.id, tenant_id, EventType::TestEvent, payload);
        let delivery_id = delivery.id;
        self.store.insert_delivery(delivery).await;

        self.delivery.execute_delivery(delivery_id).await;

        self.store
            .get_delivery(delivery_id)
            .await
            .map(|d| DeliveryResponse::from(&d))
            .ok_or(GatewayError::DeliveryNotFound)
    }

    /// Page through a webhook's delivery log, newest first, optionally
    /// filtered by status.
    pub async fn list_deliveries(
        &self,
        tenant_id: Uuid,
        webhook_id: Uuid,
        query: &ListDeliveriesQuery,
    ) -> Result<DeliveryListResponse, GatewayError> {
        if self.store.find_webhook(tenant_id, webhook_id).await.is_none() {
            return Err(GatewayError::WebhookNotFound);
        }

        let status = match query.status.as_deref() {
            Some(raw) => Some(DeliveryStatus::parse(raw).ok_or_else(|| {
                GatewayError::Validation(format!("Unknown delivery status: {raw}"))
            })?),
            None => None,
        };

        let limit = query.limit.clamp(1, MAX_PAGE_SIZE);
        let (deliveries, total) = self
            .store
            .list_deliveries_by_webhook(tenant_id, webhook_id, limit, query.offset, status)
            .await;

        Ok(DeliveryListResponse {
            items: deliveries.iter().map(DeliveryResponse::from).collect(),
            total,
            limit,
            offset: query.offset,
        })
    }

    pub async fn get_delivery(
        &self,
        tenant_id: Uuid,
        webhook_id: Uuid,
        delivery_id: Uuid,
    ) -> Result<DeliveryResponse, GatewayError> {
        self.store
            .find_delivery(tenant_id, webhook_id, delivery_id)
            .await
            .map(|d| DeliveryResponse::from(&d))
            .ok_or(GatewayError::DeliveryNotFound)
    }
}
