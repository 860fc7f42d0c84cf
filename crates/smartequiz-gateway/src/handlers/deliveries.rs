//! Delivery log endpoints.

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use uuid::Uuid;

use crate::error::{ApiResult, ErrorResponse};
use crate::middleware::AuthContext;
use crate::models::{DeliveryListResponse, DeliveryResponse, ListDeliveriesQuery};
use crate::router::GatewayState;
use crate::scopes::Scope;

/// Page through a webhook's delivery log, newest first.
#[utoipa::path(
    get,
    path = "/v1/webhooks/{webhook_id}/deliveries",
    tag = "deliveries",
    params(
        ("webhook_id" = Uuid, Path, description = "Webhook id"),
        ListDeliveriesQuery,
    ),
    responses(
        (status = 200, description = "Delivery records", body = DeliveryListResponse),
        (status = 400, description = "Unknown status filter", body = ErrorResponse),
        (status = 404, description = "Webhook not found", body = ErrorResponse),
    ),
    security(("api_key" = []))
)]
pub async fn list_deliveries(
    State(state): State<GatewayState>,
    Extension(ctx): Extension<AuthContext>,
    Path(webhook_id): Path<Uuid>,
    Query(query): Query<ListDeliveriesQuery>,
) -> ApiResult<Json<DeliveryListResponse>> {
    ctx.require_scope(&Scope::parse("webhooks:read")?)?;
    Ok(Json(
        state
            .webhooks
            .list_deliveries(ctx.tenant_id(), webhook_id, &query)
            .await?,
    ))
}

/// Fetch a single delivery record.
#[utoipa::path(
    get,
    path = "/v1/webhooks/{webhook_id}/deliveries/{delivery_id}",
    tag = "deliveries",
    params(
        ("webhook_id" = Uuid, Path, description = "Webhook id"),
        ("delivery_id" = Uuid, Path, description = "Delivery id"),
    ),
    responses(
        (status = 200, description = "Delivery record", body = DeliveryResponse),
        (status = 404, description = "Webhook or delivery not found", body = ErrorResponse),
    ),
    security(("api_key" = []))
)]
pub async fn get_delivery(
    State(state): State<GatewayState>,
    Extension(ctx): Extension<AuthContext>,
    Path((webhook_id, delivery_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<DeliveryResponse>> {
    ctx.require_scope(&Scope::parse("webhooks:read")?)?;
    Ok(Json(
        state
            .webhooks
            .get_delivery(ctx.tenant_id(), webhook_id, delivery_id)
            .await?,
    ))
}
