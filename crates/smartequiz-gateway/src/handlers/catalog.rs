//! Discovery endpoints: scope and event-type catalogs.
//!
//! Any authenticated key may read these; they carry no tenant data.

use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::models::{EventType, EventTypeInfo, EventTypeListResponse};
use crate::scopes::{self, ScopeInfo};

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ScopeListResponse {
    pub scopes: Vec<ScopeInfo>,
}

/// List every scope an API key can be granted.
#[utoipa::path(
    get,
    path = "/v1/scopes",
    tag = "catalog",
    responses(
        (status = 200, description = "Available scopes", body = ScopeListResponse),
    ),
    security(("api_key" = []))
)]
pub async fn list_scopes() -> Json<ScopeListResponse> {
    Json(ScopeListResponse {
        scopes: scopes::scope_catalog(),
    })
}

/// List every event type a webhook can subscribe to.
#[utoipa::path(
    get,
    path = "/v1/event-types",
    tag = "catalog",
    responses(
        (status = 200, description = "Available event types", body = EventTypeListResponse),
    ),
    security(("api_key" = []))
)]
pub async fn list_event_types() -> Json<EventTypeListResponse> {
    Json(EventTypeListResponse {
        event_types: EventType::all()
            .into_iter()
            .map(|e| EventTypeInfo {
                event_type: e.as_str().to_string(),
                category: e.category().to_string(),
                description: e.description().to_string(),
            })
            .collect(),
    })
}
