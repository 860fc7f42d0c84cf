//! Webhook endpoint domain model and management DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::models::event::EventType;

/// Webhook lifecycle status.
///
/// `Paused` is reached automatically once consecutive failures hit the
/// threshold and never auto-resumes; reactivation is a manual operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WebhookStatus {
    Active,
    Paused,
    Failed,
}

/// A tenant-configured webhook endpoint.
///
/// `secret_encrypted` holds the AES-GCM-encrypted per-webhook signing
/// secret; the plaintext is returned once at creation and never again.
#[derive(Debug, Clone)]
pub struct Webhook {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub url: String,
    pub description: Option<String>,
    pub events: Vec<EventType>,
    pub retry_attempts: u32,
    pub timeout_ms: u64,
    pub status: WebhookStatus,
    pub consecutive_failures: u32,
    pub secret_encrypted: String,
    pub last_delivery_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Webhook {
    /// Whether the webhook should receive the given event type.
    pub fn subscribes_to(&self, event_type: EventType) -> bool {
        self.events.contains(&event_type)
    }
}

// ---------------------------------------------------------------------------
// Management DTOs
// ---------------------------------------------------------------------------

/// Request to register a webhook endpoint.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateWebhookRequest {
    /// Destination URL. Must be `https://` and pass the SSRF guard.
    #[schema(example = "https://example.com/hooks/smartequiz")]
    pub url: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Subscribed event types; non-empty, each a known type.
    #[schema(example = json!(["TOURNAMENT_COMPLETED", "QUIZ_COMPLETED"]))]
    pub events: Vec<String>,

    /// Retries after the initial attempt, 0-5. Defaults to 3.
    #[serde(default)]
    pub retry_attempts: Option<u32>,

    /// Per-attempt timeout in milliseconds, 5000-60000. Defaults to 30000.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

/// Request to update a webhook. Absent fields are left unchanged.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct UpdateWebhookRequest {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub events: Option<Vec<String>>,
    #[serde(default)]
    pub retry_attempts: Option<u32>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

/// A webhook as returned by the management API (never includes the secret).
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WebhookResponse {
    pub id: Uuid,
    pub url: String,
    pub description: Option<String>,
    pub events: Vec<EventType>,
    pub retry_attempts: u32,
    pub timeout_ms: u64,
    pub status: WebhookStatus,
    pub consecutive_failures: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_delivery_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Webhook> for WebhookResponse {
    fn from(webhook: &Webhook) -> Self {
        Self {
            id: webhook.id,
            url: webhook.url.clone(),
            description: webhook.description.clone(),
            events: webhook.events.clone(),
            retry_attempts: webhook.retry_attempts,
            timeout_ms: webhook.timeout_ms,
            status: webhook.status,
            consecutive_failures: webhook.consecutive_failures,
            last_delivery_at: webhook.last_delivery_at,
            created_at: webhook.created_at,
            updated_at: webhook.updated_at,
        }
    }
}

/// Creation response: the webhook plus the one-time plaintext secret.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CreateWebhookResponse {
    #[serde(flatten)]
    pub webhook: WebhookResponse,

    /// Signing secret for verifying `X-Smartequiz-Signature`.
    /// SECURITY: Shown only once and never retrievable later.
    pub secret: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WebhookListResponse {
    pub items: Vec<WebhookResponse>,
    pub total: usize,
}

/// Pagination query for webhook listing.
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct ListWebhooksQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    50
}
