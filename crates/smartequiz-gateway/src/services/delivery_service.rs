//! Webhook delivery execution.
//!
//! Executes one signed HTTP POST per attempt, interprets the outcome, and
//! either records success, schedules a retry with exponential backoff and
//! jitter, or records terminal failure and escalates toward webhook pause.
//!
//! Delivery is at-least-once: a retry may duplicate receiver-side effects,
//! and receivers are expected to dedupe on the `X-Smartequiz-Delivery`
//! header.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use uuid::Uuid;

use crate::crypto;
use crate::error::GatewayError;
use crate::models::{Webhook, WebhookDelivery, WebhookStatus};
use crate::store::GatewayStore;

/// Consecutive failed deliveries before a webhook is paused.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 10;

/// Backoff base delay.
pub const DEFAULT_BACKOFF_BASE_SECS: i64 = 30;

/// Backoff ceiling.
pub const DEFAULT_BACKOFF_MAX_SECS: i64 = 3_600;

/// Response bodies are truncated to this many characters in the log.
const RESPONSE_BODY_MAX_CHARS: usize = 4_096;

/// Service executing individual delivery attempts.
#[derive(Clone)]
pub struct DeliveryService {
    store: Arc<GatewayStore>,
    http_client: Client,
    encryption_key: Vec<u8>,
    failure_threshold: u32,
    backoff_base: Duration,
    backoff_max: Duration,
}

impl DeliveryService {
    /// Create a new delivery service with a shared HTTP client.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Internal` if the HTTP client cannot be built.
    pub fn new(store: Arc<GatewayStore>, encryption_key: Vec<u8>) -> Result<Self, GatewayError> {
        let http_client = Client::builder()
            .user_agent("smartequiz-gateway/0.1")
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| GatewayError::Internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            store,
            http_client,
            encryption_key,
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            backoff_base: Duration::seconds(DEFAULT_BACKOFF_BASE_SECS),
            backoff_max: Duration::seconds(DEFAULT_BACKOFF_MAX_SECS),
        })
    }

    /// Set the consecutive-failure threshold for auto-pause.
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Override the backoff base and ceiling (short delays in tests).
    pub fn with_backoff(mut self, base: Duration, max: Duration) -> Self {
        self.backoff_base = base;
        self.backoff_max = max;
        self
    }

    /// Execute one attempt for a delivery.
    ///
    /// The webhook is reloaded first: if it was deleted or paused since the
    /// delivery was enqueued, the delivery is abandoned and the outcome has
    /// no further effect on webhook state.
    pub async fn execute_delivery(&self, delivery_id: Uuid) {
        let Some(delivery) = self.store.get_delivery(delivery_id).await else {
            tracing::error!(
                target: "webhook_delivery",
                delivery_id = %delivery_id,
                "Delivery record not found"
            );
            return;
        };
        if delivery.status.is_terminal() {
            return;
        }

        let Some(webhook) = self
            .store
            .find_webhook(delivery.tenant_id, delivery.webhook_id)
            .await
        else {
            tracing::info!(
                target: "webhook_delivery",
                delivery_id = %delivery.id,
                webhook_id = %delivery.webhook_id,
                "Abandoning delivery for deleted webhook"
            );
            self.store
                .mark_delivery_failed(delivery.id, delivery.attempts, "webhook deleted".to_string(), None, None)
                .await;
            return;
        };

        if webhook.status != WebhookStatus::Active {
            tracing::info!(
                target: "webhook_delivery",
                delivery_id = %delivery.id,
                webhook_id = %webhook.id,
                "Abandoning delivery for paused webhook"
            );
            self.store
                .mark_delivery_failed(delivery.id, delivery.attempts, "webhook paused".to_string(), None, None)
                .await;
            return;
        }

        self.attempt(&delivery, &webhook).await;
    }

    /// Perform the signed POST and dispatch the outcome.
    async fn attempt(&self, delivery: &WebhookDelivery, webhook: &Webhook) {
        let attempts = delivery.attempts + 1;

        let body = match serde_json::to_vec(&delivery.payload) {
            Ok(b) => b,
            Err(e) => {
                self.handle_failure(
                    delivery,
                    webhook,
                    attempts,
                    format!("Failed to serialize payload: {e}"),
                    None,
                    None,
                )
                .await;
                return;
            }
        };

        let secret = match crypto::decrypt_secret(&webhook.secret_encrypted, &self.encryption_key)
        {
            Ok(s) => s,
            Err(e) => {
                self.handle_failure(
                    delivery,
                    webhook,
                    attempts,
                    format!("Failed to decrypt webhook secret: {e}"),
                    None,
                    None,
                )
                .await;
                return;
            }
        };
        let signature = crypto::sign_payload(&secret, &body);

        let result = self
            .http_client
            .post(&webhook.url)
            .timeout(std::time::Duration::from_millis(webhook.timeout_ms))
            .header("Content-Type", "application/json")
            .header("X-Smartequiz-Signature", signature)
            .header("X-Smartequiz-Event", delivery.event_type.as_str())
            .header("X-Smartequiz-Delivery", delivery.id.to_string())
            .body(body)
            .send()
            .await;

        match result {
            Ok(response) => {
                let status = response.status().as_u16();
                let body = response
                    .text()
                    .await
                    .unwrap_or_default()
                    .chars()
                    .take(RESPONSE_BODY_MAX_CHARS)
                    .collect::<String>();

                if (200..300).contains(&status) {
                    self.handle_success(delivery, webhook, attempts, status, body).await;
                } else {
                    self.handle_failure(
                        delivery,
                        webhook,
                        attempts,
                        format!("HTTP {status}"),
                        Some(status),
                        Some(body),
                    )
                    .await;
                }
            }
            Err(e) => {
                let error_msg = if e.is_timeout() {
                    format!("Request timeout ({}ms)", webhook.timeout_ms)
                } else if e.is_connect() {
                    format!("Connection failed: {e}")
                } else {
                    format!("Request error: {e}")
                };
                self.handle_failure(delivery, webhook, attempts, error_msg, None, None)
                    .await;
            }
        }
    }

    async fn handle_success(
        &self,
        delivery: &WebhookDelivery,
        webhook: &Webhook,
        attempts: u32,
        response_status: u16,
        response_body: String,
    ) {
        tracing::info!(
            target: "webhook_delivery",
            delivery_id = %delivery.id,
            webhook_id = %webhook.id,
            tenant_id = %webhook.tenant_id,
            event_type = %delivery.event_type,
            response_status,
            attempts,
            "Webhook delivery succeeded"
        );

        self.store
            .mark_delivery_success(delivery.id, attempts, response_status, Some(response_body))
            .await;
        self.store.record_webhook_success(webhook.id).await;
    }

    /// Failed attempt: schedule a retry while attempts remain, otherwise
    /// record terminal failure and bump the webhook's failure counter.
    async fn handle_failure(
        &self,
        delivery: &WebhookDelivery,
        webhook: &Webhook,
        attempts: u32,
        error_message: String,
        response_status: Option<u16>,
        response_body: Option<String>,
    ) {
        let retries_left = attempts <= webhook.retry_attempts;

        tracing::warn!(
            target: "webhook_delivery",
            delivery_id = %delivery.id,
            webhook_id = %webhook.id,
            tenant_id = %webhook.tenant_id,
            event_type = %delivery.event_type,
            error = %error_message,
            attempts,
            has_next_retry = retries_left,
            "Webhook delivery failed"
        );

        if retries_left {
            let next_retry_at = Utc::now() + self.backoff_delay(attempts);
            self.store
                .mark_delivery_retrying(
                    delivery.id,
                    attempts,
                    error_message,
                    response_status,
                    response_body,
                    next_retry_at,
                )
                .await;
            return;
        }

        self.store
            .mark_delivery_failed(
                delivery.id,
                attempts,
                error_message,
                response_status,
                response_body,
            )
            .await;

        // Escalate toward pause; None means the webhook was deleted while
        // the attempt was in flight and the outcome is log-only.
        if let Some(failures) = self.store.increment_consecutive_failures(webhook.id).await {
            if failures >= self.failure_threshold {
                tracing::warn!(
                    target: "webhook_delivery",
                    webhook_id = %webhook.id,
                    tenant_id = %webhook.tenant_id,
                    consecutive_failures = failures,
                    threshold = self.failure_threshold,
                    "Pausing webhook after consecutive failures"
                );
                self.store.pause_webhook(webhook.id).await;
                self.store
                    .cancel_deliveries_for_webhook(webhook.id, "webhook paused")
                    .await;
            }
        }
    }

    /// Exponential backoff with jitter:
    /// `min(max_delay, base * 2^(n-1)) + random(0, base)`.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        use rand::Rng;

        let base_ms = self.backoff_base.num_milliseconds().max(1);
        let max_ms = self.backoff_max.num_milliseconds().max(base_ms);
        let exp_ms = base_ms.saturating_mul(1i64 << (attempt.saturating_sub(1)).min(30));
        let jitter_ms = rand::thread_rng().gen_range(0..base_ms);
        Duration::milliseconds(exp_ms.min(max_ms) + jitter_ms)
    }

    /// Next retry instant for an attempt that just failed (for tests and
    /// operator tooling).
    pub fn next_retry_at(&self, attempt: u32) -> DateTime<Utc> {
        Utc::now() + self.backoff_delay(attempt)
    }
}
