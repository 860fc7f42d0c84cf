//! API key management endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use uuid::Uuid;

use crate::error::{ApiResult, ErrorResponse};
use crate::middleware::AuthContext;
use crate::models::{ApiKeyListResponse, CreateApiKeyRequest, CreateApiKeyResponse};
use crate::router::GatewayState;
use crate::scopes::Scope;

/// Create an API key. The raw key material appears only in this response.
#[utoipa::path(
    post,
    path = "/v1/api-keys",
    tag = "api-keys",
    request_body = CreateApiKeyRequest,
    responses(
        (status = 201, description = "API key created", body = CreateApiKeyResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 401, description = "Invalid API key", body = ErrorResponse),
        (status = 403, description = "Missing scope or not a secret key", body = ErrorResponse),
    ),
    security(("api_key" = []))
)]
pub async fn create_api_key(
    State(state): State<GatewayState>,
    Extension(ctx): Extension<AuthContext>,
    Json(request): Json<CreateApiKeyRequest>,
) -> ApiResult<impl IntoResponse> {
    ctx.require_scope(&Scope::parse("api_keys:write")?)?;
    let response = state.api_keys.create_key(ctx.tenant_id(), request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// List the tenant's API keys. Key material and hashes are never included.
#[utoipa::path(
    get,
    path = "/v1/api-keys",
    tag = "api-keys",
    responses(
        (status = 200, description = "API keys for the tenant", body = ApiKeyListResponse),
        (status = 401, description = "Invalid API key", body = ErrorResponse),
        (status = 403, description = "Missing scope or not a secret key", body = ErrorResponse),
    ),
    security(("api_key" = []))
)]
pub async fn list_api_keys(
    State(state): State<GatewayState>,
    Extension(ctx): Extension<AuthContext>,
) -> ApiResult<Json<ApiKeyListResponse>> {
    ctx.require_scope(&Scope::parse("api_keys:read")?)?;
    Ok(Json(state.api_keys.list_keys(ctx.tenant_id()).await))
}

/// Revoke an API key. Revocation is immediate and permanent.
#[utoipa::path(
    delete,
    path = "/v1/api-keys/{key_id}",
    tag = "api-keys",
    params(("key_id" = Uuid, Path, description = "API key id")),
    responses(
        (status = 204, description = "API key revoked"),
        (status = 401, description = "Invalid API key", body = ErrorResponse),
        (status = 403, description = "Missing scope or not a secret key", body = ErrorResponse),
        (status = 404, description = "API key not found", body = ErrorResponse),
    ),
    security(("api_key" = []))
)]
pub async fn revoke_api_key(
    State(state): State<GatewayState>,
    Extension(ctx): Extension<AuthContext>,
    Path(key_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    ctx.require_scope(&Scope::parse("api_keys:write")?)?;
    state.api_keys.revoke_key(ctx.tenant_id(), key_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
