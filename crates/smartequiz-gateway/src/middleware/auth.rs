//! API key authentication middleware.
//!
//! Checks run in a fixed order: credential, then IP allowlist, then rate
//! limit. Rate-limit headers are attached to every authenticated response,
//! including the 429 itself.

use std::net::{IpAddr, SocketAddr};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::GatewayError;
use crate::models::{ApiKey, ApiKeyType};
use crate::rate_limiter::RateLimitDecision;
use crate::router::GatewayState;
use crate::scopes::{self, Scope};

/// The authenticated principal, inserted as a request extension for
/// handlers to consume.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub key: ApiKey,
}

impl AuthContext {
    pub fn tenant_id(&self) -> uuid::Uuid {
        self.key.tenant_id
    }

    pub fn key_id(&self) -> uuid::Uuid {
        self.key.id
    }

    /// Check the key grants the required scope.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Authorization` naming the missing scope.
    pub fn require_scope(&self, required: &Scope) -> Result<(), GatewayError> {
        if scopes::is_authorized(&self.key.scopes, required) {
            Ok(())
        } else {
            Err(GatewayError::Authorization {
                required: required.to_string(),
            })
        }
    }
}

/// Authenticate the request's bearer API key, enforce its IP allowlist, and
/// count it against the key's rate limit.
pub async fn require_api_key(
    State(state): State<GatewayState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = bearer_token(&request).map(str::to_owned);
    let ip = client_ip(&request);
    let (context, decision) = match authenticate(&state, token.as_deref(), ip).await {
        Ok(outcome) => outcome,
        Err(err) => return err.into_response(),
    };

    request.extensions_mut().insert(context);
    let mut response = next.run(request).await;
    apply_rate_limit_headers(&mut response, &decision);
    response
}

/// Gate for key- and webhook-management routes: only SECRET-type keys may
/// manage gateway configuration. Runs after `require_api_key`.
pub async fn require_secret_key(request: Request, next: Next) -> Response {
    let is_secret = request
        .extensions()
        .get::<AuthContext>()
        .map(|ctx| ctx.key.key_type == ApiKeyType::Secret)
        .unwrap_or(false);

    if !is_secret {
        return GatewayError::Authorization {
            required: "secret API key".to_string(),
        }
        .into_response();
    }
    next.run(request).await
}

async fn authenticate(
    state: &GatewayState,
    token: Option<&str>,
    client_ip: Option<IpAddr>,
) -> Result<(AuthContext, RateLimitDecision), GatewayError> {
    let token = token.ok_or(GatewayError::Authentication)?;
    let key = state.api_keys.authenticate(token).await?;

    if !key.ip_whitelist.is_empty() {
        let ip = client_ip.ok_or_else(|| GatewayError::IpNotAllowed {
            ip: "unknown".to_string(),
        })?;
        state.api_keys.enforce_ip(&key, ip)?;
    }

    let decision = state.rate_limiter.check(key.id, key.rate_limit);
    if !decision.allowed {
        tracing::warn!(
            target: "rate_limit",
            key_id = %key.id,
            tenant_id = %key.tenant_id,
            limit = decision.limit,
            "Rate limit exceeded"
        );
        return Err(GatewayError::RateLimitExceeded {
            limit: decision.limit,
            retry_after_secs: decision.retry_after_secs(),
            reset_at: decision.reset_at,
        });
    }

    Ok((AuthContext { key }, decision))
}

fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Resolve the client address: first `X-Forwarded-For` hop, then
/// `X-Real-IP`, then the socket peer address.
fn client_ip(request: &Request) -> Option<IpAddr> {
    if let Some(forwarded) = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
    {
        if let Some(first) = forwarded.split(',').next() {
            if let Ok(ip) = first.trim().parse() {
                return Some(ip);
            }
        }
    }

    if let Some(real_ip) = request
        .headers()
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
    {
        if let Ok(ip) = real_ip.trim().parse() {
            return Some(ip);
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip())
}

fn apply_rate_limit_headers(response: &mut Response, decision: &RateLimitDecision) {
    let headers = response.headers_mut();
    if let Ok(v) = HeaderValue::from_str(&decision.limit.to_string()) {
        headers.insert("x-ratelimit-limit", v);
    }
    if let Ok(v) = HeaderValue::from_str(&decision.remaining.to_string()) {
        headers.insert("x-ratelimit-remaining", v);
    }
    if let Ok(v) = HeaderValue::from_str(&decision.reset_at.timestamp_millis().to_string()) {
        headers.insert("x-ratelimit-reset", v);
    }
}
