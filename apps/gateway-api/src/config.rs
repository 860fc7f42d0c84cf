//! Environment-driven server configuration.
//!
//! Secrets have development defaults so a bare `cargo run` works locally,
//! but startup fails in production if any default is still in place.

use std::env;
use std::net::SocketAddr;

use thiserror::Error;

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";

// Development-only fallbacks, rejected outside development.
const DEV_API_KEY_SECRET: &str = "dev-api-key-secret-not-for-production";
const DEV_ENCRYPTION_KEY_HEX: &str =
    "0000000000000000000000000000000000000000000000000000000000000001";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid {name}: {reason}")]
    Invalid { name: &'static str, reason: String },

    #[error("{name} must be set in production")]
    MissingInProduction { name: &'static str },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Production,
}

impl AppEnvironment {
    fn from_env() -> Result<Self, ConfigError> {
        match env::var("APP_ENV").as_deref() {
            Err(_) | Ok("development") | Ok("dev") => Ok(Self::Development),
            Ok("production") | Ok("prod") => Ok(Self::Production),
            Ok(other) => Err(ConfigError::Invalid {
                name: "APP_ENV",
                reason: format!("unknown environment '{other}'"),
            }),
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub listen_addr: SocketAddr,
    pub environment: AppEnvironment,
    /// Keys the HMAC over stored API-key hashes.
    pub api_key_secret: Vec<u8>,
    /// 32-byte AES-256-GCM key for webhook secrets at rest.
    pub webhook_encryption_key: Vec<u8>,
    /// Permit `http://` webhook URLs. Never honored in production.
    pub allow_http_webhooks: bool,
}

impl GatewayConfig {
    /// Load from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for malformed values, and for development
    /// defaults still present in production.
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment = AppEnvironment::from_env()?;

        let listen_addr = env::var("GATEWAY_LISTEN_ADDR")
            .unwrap_or_else(|_| DEFAULT_LISTEN_ADDR.to_string())
            .parse()
            .map_err(|e| ConfigError::Invalid {
                name: "GATEWAY_LISTEN_ADDR",
                reason: format!("{e}"),
            })?;

        let api_key_secret = match env::var("GATEWAY_API_KEY_SECRET") {
            Ok(s) if !s.is_empty() => s.into_bytes(),
            _ if environment.is_production() => {
                return Err(ConfigError::MissingInProduction {
                    name: "GATEWAY_API_KEY_SECRET",
                });
            }
            _ => {
                tracing::warn!("GATEWAY_API_KEY_SECRET not set, using development default");
                DEV_API_KEY_SECRET.as_bytes().to_vec()
            }
        };

        let encryption_key_hex = match env::var("GATEWAY_WEBHOOK_ENCRYPTION_KEY") {
            Ok(s) if !s.is_empty() => s,
            _ if environment.is_production() => {
                return Err(ConfigError::MissingInProduction {
                    name: "GATEWAY_WEBHOOK_ENCRYPTION_KEY",
                });
            }
            _ => {
                tracing::warn!(
                    "GATEWAY_WEBHOOK_ENCRYPTION_KEY not set, using development default"
                );
                DEV_ENCRYPTION_KEY_HEX.to_string()
            }
        };
        let webhook_encryption_key =
            hex::decode(&encryption_key_hex).map_err(|e| ConfigError::Invalid {
                name: "GATEWAY_WEBHOOK_ENCRYPTION_KEY",
                reason: format!("not valid hex: {e}"),
            })?;
        if webhook_encryption_key.len() != 32 {
            return Err(ConfigError::Invalid {
                name: "GATEWAY_WEBHOOK_ENCRYPTION_KEY",
                reason: format!(
                    "expected 32 bytes (64 hex chars), got {}",
                    webhook_encryption_key.len()
                ),
            });
        }

        let allow_http_webhooks = !environment.is_production()
            && env::var("GATEWAY_ALLOW_HTTP_WEBHOOKS").as_deref() == Ok("true");

        Ok(Self {
            listen_addr,
            environment,
            api_key_secret,
            webhook_encryption_key,
            allow_http_webhooks,
        })
    }
}
