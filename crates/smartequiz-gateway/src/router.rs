//! Route table and shared application state.

use std::sync::Arc;

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post},
    Json, Router,
};
use tower_http::trace::TraceLayer;
use utoipa::{
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
    Modify, OpenApi,
};

use crate::error::GatewayError;
use crate::handlers::{api_keys, catalog, deliveries, webhooks};
use crate::middleware::{require_api_key, require_secret_key};
use crate::rate_limiter::RateLimiterRegistry;
use crate::services::{ApiKeyService, DeliveryService, EventPublisher, WebhookService};
use crate::store::GatewayStore;

/// Shared state for every handler and middleware.
#[derive(Clone)]
pub struct GatewayState {
    pub store: Arc<GatewayStore>,
    pub api_keys: ApiKeyService,
    pub webhooks: WebhookService,
    pub rate_limiter: Arc<RateLimiterRegistry>,
    pub publisher: EventPublisher,
}

impl GatewayState {
    /// Wire up the default service graph over one shared store.
    ///
    /// `key_secret` keys the API-key hash; `encryption_key` is the 32-byte
    /// AES key for webhook secrets at rest.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Internal` if the delivery HTTP client cannot
    /// be built.
    pub fn new(
        store: Arc<GatewayStore>,
        key_secret: Vec<u8>,
        encryption_key: Vec<u8>,
    ) -> Result<Self, GatewayError> {
        let delivery = DeliveryService::new(store.clone(), encryption_key.clone())?;
        Ok(Self {
            api_keys: ApiKeyService::new(store.clone(), key_secret),
            webhooks: WebhookService::new(store.clone(), encryption_key, delivery),
            rate_limiter: Arc::new(RateLimiterRegistry::new()),
            publisher: EventPublisher::new(),
            store,
        })
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "SmartEquiz Gateway API",
        description = "Tenant programmatic API: key management, webhook subscriptions, and delivery logs."
    ),
    paths(
        api_keys::create_api_key,
        api_keys::list_api_keys,
        api_keys::revoke_api_key,
        webhooks::create_webhook,
        webhooks::list_webhooks,
        webhooks::get_webhook,
        webhooks::update_webhook,
        webhooks::delete_webhook,
        webhooks::reactivate_webhook,
        webhooks::test_webhook,
        deliveries::list_deliveries,
        deliveries::get_delivery,
        catalog::list_scopes,
        catalog::list_event_types,
    ),
    modifiers(&ApiKeySecurity),
    tags(
        (name = "api-keys", description = "API key issuance and revocation"),
        (name = "webhooks", description = "Webhook subscription management"),
        (name = "deliveries", description = "Webhook delivery logs"),
        (name = "catalog", description = "Scope and event-type discovery"),
    )
)]
pub struct ApiDoc;

struct ApiKeySecurity;

impl Modify for ApiKeySecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "api_key",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}

/// Build the gateway router.
///
/// Every `/v1` route requires a valid API key; management routes
/// additionally require a SECRET-type key. Scope checks live in the
/// handlers.
pub fn build_router(state: GatewayState) -> Router {
    let management = Router::new()
        .route(
            "/api-keys",
            post(api_keys::create_api_key).get(api_keys::list_api_keys),
        )
        .route("/api-keys/{key_id}", delete(api_keys::revoke_api_key))
        .route(
            "/webhooks",
            post(webhooks::create_webhook).get(webhooks::list_webhooks),
        )
        .route(
            "/webhooks/{webhook_id}",
            get(webhooks::get_webhook)
                .patch(webhooks::update_webhook)
                .delete(webhooks::delete_webhook),
        )
        .route(
            "/webhooks/{webhook_id}/reactivate",
            post(webhooks::reactivate_webhook),
        )
        .route("/webhooks/{webhook_id}/test", post(webhooks::test_webhook))
        .route(
            "/webhooks/{webhook_id}/deliveries",
            get(deliveries::list_deliveries),
        )
        .route(
            "/webhooks/{webhook_id}/deliveries/{delivery_id}",
            get(deliveries::get_delivery),
        )
        .route_layer(from_fn(require_secret_key));

    let discovery = Router::new()
        .route("/scopes", get(catalog::list_scopes))
        .route("/event-types", get(catalog::list_event_types));

    let v1 = management
        .merge(discovery)
        .route_layer(from_fn_with_state(state.clone(), require_api_key));

    Router::new()
        .route("/health", get(health))
        .route("/openapi.json", get(openapi_spec))
        .nest("/v1", v1)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn openapi_spec() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
