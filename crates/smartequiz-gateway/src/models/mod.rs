//! Domain models and API DTOs for the tenant gateway.

pub mod api_key;
pub mod delivery;
pub mod event;
pub mod webhook;

pub use api_key::{
    ApiKey, ApiKeyListResponse, ApiKeyResponse, ApiKeyStatus, ApiKeyType, CreateApiKeyRequest,
    CreateApiKeyResponse,
};
pub use delivery::{
    DeliveryListResponse, DeliveryResponse, DeliveryStatus, ListDeliveriesQuery, WebhookDelivery,
};
pub use event::{
    DeliveryEnvelope, DomainEvent, EventType, EventTypeInfo, EventTypeListResponse,
};
pub use webhook::{
    CreateWebhookRequest, CreateWebhookResponse, ListWebhooksQuery, UpdateWebhookRequest, Webhook,
    WebhookListResponse, WebhookResponse, WebhookStatus,
};
