//! Webhook delivery records: the durable per-attempt log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::models::event::EventType;

/// Delivery lifecycle. `Success` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryStatus {
    Pending,
    Success,
    Failed,
    Retrying,
}

impl DeliveryStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }

    /// Parse a wire string; `None` for unknown values.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(Self::Pending),
            "SUCCESS" => Some(Self::Success),
            "FAILED" => Some(Self::Failed),
            "RETRYING" => Some(Self::Retrying),
            _ => None,
        }
    }
}

/// One logical attempt-sequence delivering a single event to a single
/// webhook. Created by the dispatcher, mutated only by the delivery worker,
/// never deleted by the core.
#[derive(Debug, Clone)]
pub struct WebhookDelivery {
    pub id: Uuid,
    pub webhook_id: Uuid,
    pub tenant_id: Uuid,
    pub event_type: EventType,
    /// The serialized envelope posted to the endpoint; retries resend the
    /// identical body.
    pub payload: serde_json::Value,
    pub status: DeliveryStatus,
    pub attempts: u32,
    pub response_status: Option<u16>,
    pub response_body: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub next_retry_at: Option<DateTime<Utc>>,
}

impl WebhookDelivery {
    /// A fresh delivery awaiting its first attempt.
    pub fn pending(
        webhook_id: Uuid,
        tenant_id: Uuid,
        event_type: EventType,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            webhook_id,
            tenant_id,
            event_type,
            payload,
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
}

// ---------------------------------------------------------------------------
// Log DTOs
// ---------------------------------------------------------------------------

/// A delivery row as returned by the delivery-log endpoints.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DeliveryResponse {
    pub id: Uuid,
    pub webhook_id: Uuid,
    pub event_type: EventType,
    pub status: DeliveryStatus,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_attempt_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_retry_at: Option<DateTime<Utc>>,
}

impl From<&WebhookDelivery> for DeliveryResponse {
    fn from(d: &WebhookDelivery) -> Self {
        Self {
            id: d.id,
            webhook_id: d.webhook_id,
            event_type: d.event_type,
            status: d.status,
            attempts: d.attempts,
            response_status: d.response_status,
            response_body: d.response_body.clone(),
            error_message: d.error_message.clone(),
            created_at: d.created_at,
            last_attempt_at: d.last_attempt_at,
            next_retry_at: d.next_retry_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DeliveryListResponse {
    pub items: Vec<DeliveryResponse>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

/// Pagination and filter query for the delivery log.
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct ListDeliveriesQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
    /// Optional status filter (`PENDING`, `SUCCESS`, `FAILED`, `RETRYING`).
    #[serde(default)]
    pub status: Option<String>,
}

fn default_limit() -> usize {
    50
}
