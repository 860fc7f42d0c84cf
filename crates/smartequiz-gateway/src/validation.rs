//! Request validation for webhook configuration and key allowlists.
//!
//! Webhook URLs are checked for scheme and SSRF exposure (private/internal
//! ranges, cloud metadata endpoints); event types and retry/timeout ranges
//! are validated against the catalog and the configurable bounds.

use std::net::IpAddr;

use ipnetwork::IpNetwork;

use crate::error::GatewayError;
use crate::models::EventType;

/// Allowed retry count range (retries after the initial attempt).
pub const RETRY_ATTEMPTS_RANGE: std::ops::RangeInclusive<u32> = 0..=5;

/// Allowed per-attempt timeout range in milliseconds.
pub const TIMEOUT_MS_RANGE: std::ops::RangeInclusive<u64> = 5_000..=60_000;

// ---------------------------------------------------------------------------
// URL validation
// ---------------------------------------------------------------------------

/// Validate a webhook delivery URL.
///
/// Checks:
/// 1. URL is parseable
/// 2. Scheme is HTTPS (or HTTP when `allow_http` is set for dev/test)
/// 3. Host is not a private/internal address
///
/// `allow_http` also admits loopback hosts, so local receivers work in
/// development; every other internal range stays blocked.
pub fn validate_webhook_url(url: &str, allow_http: bool) -> Result<(), GatewayError> {
    let parsed = url::Url::parse(url)
        .map_err(|e| GatewayError::InvalidUrl(format!("Invalid URL format: {e}")))?;

    match parsed.scheme() {
        "https" => {}
        "http" if allow_http => {}
        "http" => {
            return Err(GatewayError::InvalidUrl(
                "Webhook URLs must use HTTPS".to_string(),
            ));
        }
        scheme => {
            return Err(GatewayError::InvalidUrl(format!(
                "Unsupported URL scheme: {scheme}"
            )));
        }
    }

    let host = parsed
        .host_str()
        .ok_or_else(|| GatewayError::InvalidUrl("URL must have a host".to_string()))?;

    if allow_http && is_loopback_host(host) {
        return Ok(());
    }
    validate_host_not_internal(host)
}

fn is_loopback_host(host: &str) -> bool {
    host.eq_ignore_ascii_case("localhost")
        || host
            .parse::<IpAddr>()
            .map(|ip| ip.is_loopback())
            .unwrap_or(false)
}

/// Validate that a host is not a private/internal address.
///
/// Blocks loopback, RFC1918 ranges, link-local (cloud metadata), CGNAT,
/// IPv6 loopback/unspecified, and internal hostnames.
pub fn validate_host_not_internal(host: &str) -> Result<(), GatewayError> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        if is_internal_ip(&ip) {
            return Err(GatewayError::SsrfDetected(format!(
                "Destination host {host} is a private/internal address"
            )));
        }
    }

    let lower = host.to_ascii_lowercase();
    if lower == "localhost"
        || lower == "metadata.google.internal"
        || lower.ends_with(".internal")
        || lower.ends_with(".local")
    {
        return Err(GatewayError::SsrfDetected(format!(
            "Destination host {host} is a restricted internal hostname"
        )));
    }

    Ok(())
}

/// Check if an IP address belongs to a private/internal range.
fn is_internal_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_unspecified()
                || (v4.octets()[0] == 100 && (v4.octets()[1] & 0xC0) == 64) // 100.64.0.0/10
        }
        IpAddr::V6(v6) => v6.is_loopback() || v6.is_unspecified(),
    }
}

// ---------------------------------------------------------------------------
// Event type and range validation
// ---------------------------------------------------------------------------

/// Parse and validate the subscribed event set: non-empty, all known types.
pub fn parse_event_types(events: &[String]) -> Result<Vec<EventType>, GatewayError> {
    if events.is_empty() {
        return Err(GatewayError::Validation(
            "At least one event type is required".to_string(),
        ));
    }
    events
        .iter()
        .map(|e| EventType::parse(e).ok_or_else(|| GatewayError::UnknownEventType(e.clone())))
        .collect()
}

/// Validate the retry-attempt count against the configured range.
pub fn validate_retry_attempts(retry_attempts: u32) -> Result<(), GatewayError> {
    if !RETRY_ATTEMPTS_RANGE.contains(&retry_attempts) {
        return Err(GatewayError::Validation(format!(
            "retry_attempts must be between {} and {}",
            RETRY_ATTEMPTS_RANGE.start(),
            RETRY_ATTEMPTS_RANGE.end()
        )));
    }
    Ok(())
}

/// Validate the per-attempt timeout against the configured range.
pub fn validate_timeout_ms(timeout_ms: u64) -> Result<(), GatewayError> {
    if !TIMEOUT_MS_RANGE.contains(&timeout_ms) {
        return Err(GatewayError::Validation(format!(
            "timeout_ms must be between {} and {}",
            TIMEOUT_MS_RANGE.start(),
            TIMEOUT_MS_RANGE.end()
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// IP allowlist parsing
// ---------------------------------------------------------------------------

/// Parse an IP allowlist of CIDR blocks or single addresses.
pub fn parse_ip_whitelist(entries: &[String]) -> Result<Vec<IpNetwork>, GatewayError> {
    entries
        .iter()
        .map(|entry| {
            entry.parse::<IpNetwork>().map_err(|_| {
                GatewayError::Validation(format!("Invalid IP or CIDR block: {entry}"))
            })
        })
        .collect()
}
