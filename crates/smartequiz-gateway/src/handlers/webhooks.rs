//! Webhook subscription endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use uuid::Uuid;

use crate::error::{ApiResult, ErrorResponse};
use crate::middleware::AuthContext;
use crate::models::{
    CreateWebhookRequest, CreateWebhookResponse, DeliveryResponse, ListWebhooksQuery,
    UpdateWebhookRequest, WebhookListResponse, WebhookResponse,
};
use crate::router::GatewayState;
use crate::scopes::Scope;

/// Register a webhook. The signing secret appears only in this response.
#[utoipa::path(
    post,
    path = "/v1/webhooks",
    tag = "webhooks",
    request_body = CreateWebhookRequest,
    responses(
        (status = 201, description = "Webhook registered", body = CreateWebhookResponse),
        (status = 400, description = "Invalid URL, event type, or settings", body = ErrorResponse),
        (status = 401, description = "Invalid API key", body = ErrorResponse),
        (status = 403, description = "Missing scope or not a secret key", body = ErrorResponse),
        (status = 409, description = "Webhook limit reached", body = ErrorResponse),
    ),
    security(("api_key" = []))
)]
pub async fn create_webhook(
    State(state): State<GatewayState>,
    Extension(ctx): Extension<AuthContext>,
    Json(request): Json<CreateWebhookRequest>,
) -> ApiResult<impl IntoResponse> {
    ctx.require_scope(&Scope::parse("webhooks:write")?)?;
    let response = state.webhooks.create_webhook(ctx.tenant_id(), request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// List the tenant's webhooks.
#[utoipa::path(
    get,
    path = "/v1/webhooks",
    tag = "webhooks",
    params(ListWebhooksQuery),
    responses(
        (status = 200, description = "Webhooks for the tenant", body = WebhookListResponse),
        (status = 401, description = "Invalid API key", body = ErrorResponse),
        (status = 403, description = "Missing scope or not a secret key", body = ErrorResponse),
    ),
    security(("api_key" = []))
)]
pub async fn list_webhooks(
    State(state): State<GatewayState>,
    Extension(ctx): Extension<AuthContext>,
    Query(query): Query<ListWebhooksQuery>,
) -> ApiResult<Json<WebhookListResponse>> {
    ctx.require_scope(&Scope::parse("webhooks:read")?)?;
    Ok(Json(state.webhooks.list_webhooks(ctx.tenant_id(), &query).await))
}

/// Fetch a single webhook.
#[utoipa::path(
    get,
    path = "/v1/webhooks/{webhook_id}",
    tag = "webhooks",
    params(("webhook_id" = Uuid, Path, description = "Webhook id")),
    responses(
        (status = 200, description = "The webhook", body = WebhookResponse),
        (status = 404, description = "Webhook not found", body = ErrorResponse),
    ),
    security(("api_key" = []))
)]
pub async fn get_webhook(
    State(state): State<GatewayState>,
    Extension(ctx): Extension<AuthContext>,
    Path(webhook_id): Path<Uuid>,
) -> ApiResult<Json<WebhookResponse>> {
    ctx.require_scope(&Scope::parse("webhooks:read")?)?;
    Ok(Json(state.webhooks.get_webhook(ctx.tenant_id(), webhook_id).await?))
}

/// Partially update a webhook. Omitted fields are unchanged.
#[utoipa::path(
    patch,
    path = "/v1/webhooks/{webhook_id}",
    tag = "webhooks",
    params(("webhook_id" = Uuid, Path, description = "Webhook id")),
    request_body = UpdateWebhookRequest,
    responses(
        (status = 200, description = "Updated webhook", body = WebhookResponse),
        (status = 400, description = "Invalid URL, event type, or settings", body = ErrorResponse),
        (status = 404, description = "Webhook not found", body = ErrorResponse),
    ),
    security(("api_key" = []))
)]
pub async fn update_webhook(
    State(state): State<GatewayState>,
    Extension(ctx): Extension<AuthContext>,
    Path(webhook_id): Path<Uuid>,
    Json(request): Json<UpdateWebhookRequest>,
) -> ApiResult<Json<WebhookResponse>> {
    ctx.require_scope(&Scope::parse("webhooks:write")?)?;
    Ok(Json(
        state
            .webhooks
            .update_webhook(ctx.tenant_id(), webhook_id, request)
            .await?,
    ))
}

/// Delete a webhook and cancel its queued deliveries.
#[utoipa::path(
    delete,
    path = "/v1/webhooks/{webhook_id}",
    tag = "webhooks",
    params(("webhook_id" = Uuid, Path, description = "Webhook id")),
    responses(
        (status = 204, description = "Webhook deleted"),
        (status = 404, description = "Webhook not found", body = ErrorResponse),
    ),
    security(("api_key" = []))
)]
pub async fn delete_webhook(
    State(state): State<GatewayState>,
    Extension(ctx): Extension<AuthContext>,
    Path(webhook_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    ctx.require_scope(&Scope::parse("webhooks:write")?)?;
    state.webhooks.delete_webhook(ctx.tenant_id(), webhook_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Resume a paused webhook and reset its failure counter.
#[utoipa::path(
    post,
    path = "/v1/webhooks/{webhook_id}/reactivate",
    tag = "webhooks",
    params(("webhook_id" = Uuid, Path, description = "Webhook id")),
    responses(
        (status = 200, description = "Reactivated webhook", body = WebhookResponse),
        (status = 404, description = "Webhook not found", body = ErrorResponse),
    ),
    security(("api_key" = []))
)]
pub async fn reactivate_webhook(
    State(state): State<GatewayState>,
    Extension(ctx): Extension<AuthContext>,
    Path(webhook_id): Path<Uuid>,
) -> ApiResult<Json<WebhookResponse>> {
    ctx.require_scope(&Scope::parse("webhooks:write")?)?;
    Ok(Json(
        state
            .webhooks
            .reactivate_webhook(ctx.tenant_id(), webhook_id)
            .await?,
    ))
}

/// Send a TEST_EVENT through the live delivery pipeline and return the
/// resulting delivery record, including the endpoint's response.
#[utoipa::path(
    post,
    path = "/v1/webhooks/{webhook_id}/test",
    tag = "webhooks",
    params(("webhook_id" = Uuid, Path, description = "Webhook id")),
    responses(
        (status = 200, description = "Delivery record for the test attempt", body = DeliveryResponse),
        (status = 404, description = "Webhook not found", body = ErrorResponse),
    ),
    security(("api_key" = []))
)]
pub async fn test_webhook(
    State(state): State<GatewayState>,
    Extension(ctx): Extension<AuthContext>,
    Path(webhook_id): Path<Uuid>,
) -> ApiResult<Json<DeliveryResponse>> {
    ctx.require_scope(&Scope::parse("webhooks:write")?)?;
    Ok(Json(state.webhooks.test_webhook(ctx.tenant_id(), webhook_id).await?))
}
