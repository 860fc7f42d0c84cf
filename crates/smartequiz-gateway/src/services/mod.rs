//! Business logic for API keys, webhooks, and delivery.

pub mod api_key_service;
pub mod delivery_service;
pub mod event_dispatcher;
pub mod webhook_service;

pub use api_key_service::ApiKeyService;
pub use delivery_service::DeliveryService;
pub use event_dispatcher::{EventDispatcher, EventPublisher};
pub use webhook_service::WebhookService;
