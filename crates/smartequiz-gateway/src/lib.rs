//! Tenant programmatic API gateway for the SmartEquiz platform.
//!
//! Provides scoped API keys for tenant integrations and reliable webhook
//! delivery of platform events: HMAC-signed payloads, exponential-backoff
//! retries, automatic pause of persistently failing endpoints, and a
//! queryable delivery log.

pub mod crypto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod rate_limiter;
pub mod router;
pub mod scopes;
pub mod services;
pub mod store;
pub mod validation;
pub mod worker;

pub use error::{ApiResult, ErrorResponse, GatewayError};
pub use middleware::AuthContext;
pub use models::{ApiKey, DomainEvent, EventType, Webhook, WebhookDelivery};
pub use rate_limiter::RateLimiterRegistry;
pub use router::{build_router, ApiDoc, GatewayState};
pub use scopes::Scope;
pub use services::{ApiKeyService, DeliveryService, EventDispatcher, EventPublisher, WebhookService};
pub use store::GatewayStore;
pub use worker::DeliveryWorker;
