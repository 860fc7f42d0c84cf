//! API key issuance, authentication, and authorization.

use std::net::IpAddr;
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use crate::crypto;
use crate::error::GatewayError;
use crate::models::{
    ApiKey, ApiKeyListResponse, ApiKeyResponse, ApiKeyStatus, CreateApiKeyRequest,
    CreateApiKeyResponse,
};
use crate::scopes::{self, Scope};
use crate::store::GatewayStore;
use crate::validation;

/// Minimum interval between `last_used_at` writes for one key.
const LAST_USED_DEBOUNCE_SECS: i64 = 60;

/// Service for API key operations. Keys are stateless bearer tokens; the
/// only stored form of the material is a keyed hash.
#[derive(Clone)]
pub struct ApiKeyService {
    store: Arc<GatewayStore>,
    /// Server secret keying the stored hash of every raw key.
    key_secret: Vec<u8>,
}

impl ApiKeyService {
    pub fn new(store: Arc<GatewayStore>, key_secret: Vec<u8>) -> Self {
        Self { store, key_secret }
    }

    /// Create a new API key.
    ///
    /// Returns the raw key exactly once; afterwards only the hash exists.
    pub async fn create_key(
        &self,
        tenant_id: Uuid,
        request: CreateApiKeyRequest,
    ) -> Result<CreateApiKeyResponse, GatewayError> {
        request
            .validate()
            .map_err(|e| GatewayError::Validation(e.to_string()))?;

        let parsed_scopes = scopes::parse_scopes(&request.scopes)?;
        let ip_whitelist = validation::parse_ip_whitelist(&request.ip_whitelist)?;

        let raw_key = crypto::generate_raw_key(request.key_type);
        let key_hash = crypto::hash_api_key(&self.key_secret, &raw_key);
        let key_prefix = ApiKey::display_prefix(&raw_key, request.key_type);
        let rate_limit = request
            .rate_limit
            .unwrap_or_else(|| request.key_type.default_rate_limit());

        let key = ApiKey {
            id: Uuid::new_v4(),
            tenant_id,
            name: request.name,
            description: request.description,
            key_type: request.key_type,
            key_hash,
            key_prefix: key_prefix.clone(),
            scopes: parsed_scopes.clone(),
            rate_limit,
            ip_whitelist,
            status: ApiKeyStatus::Active,
            created_at: Utc::now(),
            last_used_at: None,
        };

        tracing::info!(
            target: "api_keys",
            key_id = %key.id,
            tenant_id = %tenant_id,
            key_prefix = %key_prefix,
            key_type = ?key.key_type,
            "API key created"
        );

        let response = CreateApiKeyResponse {
            id: key.id,
            name: key.name.clone(),
            key_type: key.key_type,
            api_key: raw_key,
            key_prefix,
            scopes: parsed_scopes,
            rate_limit,
            ip_whitelist: key.ip_whitelist.iter().map(|n| n.to_string()).collect(),
            created_at: key.created_at,
        };

        self.store.insert_api_key(key).await;
        Ok(response)
    }

    /// List a tenant's keys for dashboard display. Never includes hashes.
    pub async fn list_keys(&self, tenant_id: Uuid) -> ApiKeyListResponse {
        let keys = self.store.list_api_keys(tenant_id).await;
        ApiKeyListResponse {
            total: keys.len(),
            items: keys.iter().map(ApiKeyResponse::from).collect(),
        }
    }

    /// Revoke a key. Idempotent; takes effect on the next authentication.
    pub async fn revoke_key(&self, tenant_id: Uuid, key_id: Uuid) -> Result<(), GatewayError> {
        if !self.store.revoke_api_key(tenant_id, key_id).await {
            return Err(GatewayError::KeyNotFound);
        }
        tracing::info!(
            target: "api_keys",
            key_id = %key_id,
            tenant_id = %tenant_id,
            "API key revoked"
        );
        Ok(())
    }

    /// Resolve a presented raw key to its record.
    ///
    /// Unknown and revoked keys both map to the same generic
    /// `Authentication` error so responses cannot be used for key
    /// enumeration. Usage tracking is spawned off the request path.
    pub async fn authenticate(&self, raw_key: &str) -> Result<ApiKey, GatewayError> {
        let key_hash = crypto::hash_api_key(&self.key_secret, raw_key);
        let key = self
            .store
            .find_api_key_by_hash(&key_hash)
            .await
            .ok_or(GatewayError::Authentication)?;

        if key.status == ApiKeyStatus::Revoked {
            tracing::debug!(target: "api_keys", key_id = %key.id, "Revoked key rejected");
            return Err(GatewayError::Authentication);
        }

        // Best-effort last_used_at update; never blocks the request.
        let store = Arc::clone(&self.store);
        let key_id = key.id;
        tokio::spawn(async move {
            store
                .touch_api_key_last_used(key_id, Utc::now(), LAST_USED_DEBOUNCE_SECS)
                .await;
        });

        Ok(key)
    }

    /// Check a key against a required scope (exact or resource wildcard).
    pub fn authorize(&self, key: &ApiKey, required: &Scope) -> Result<(), GatewayError> {
        if scopes::is_authorized(&key.scopes, required) {
            Ok(())
        } else {
            Err(GatewayError::Authorization {
                required: required.to_string(),
            })
        }
    }

    /// CIDR-aware allowlist check. An empty allowlist admits every address.
    pub fn check_ip_allowed(&self, key: &ApiKey, remote_ip: IpAddr) -> bool {
        key.ip_whitelist.is_empty()
            || key.ip_whitelist.iter().any(|network| network.contains(remote_ip))
    }

    /// Enforce the allowlist, mapping a miss to an authorization failure.
    pub fn enforce_ip(&self, key: &ApiKey, remote_ip: IpAddr) -> Result<(), GatewayError> {
        if self.check_ip_allowed(key, remote_ip) {
            Ok(())
        } else {
            tracing::warn!(
                target: "api_keys",
                key_id = %key.id,
                ip = %remote_ip,
                "Request from IP outside the key's allowlist"
            );
            Err(GatewayError::IpNotAllowed {
                ip: remote_ip.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ApiKeyType;

    fn service() -> ApiKeyService {
        ApiKeyService::new(Arc::new(GatewayStore::new()), b"server-secret".to_vec())
    }

    fn create_request(scopes: Vec<&str>) -> CreateApiKeyRequest {
        CreateApiKeyRequest {
            name: "integration".to_string(),
            description: None,
            key_type: ApiKeyType::Secret,
            scopes: scopes.into_iter().map(String::from).collect(),
            rate_limit: None,
            ip_whitelist: vec![],
        }
    }

    #[tokio::test]
    async fn test_created_key_authenticates() {
        let service = service();
        let tenant = Uuid::new_v4();
        let created = service
            .create_key(tenant, create_request(vec!["tournaments:read"]))
            .await
            .unwrap();

        let key = service.authenticate(&created.api_key).await.unwrap();
        assert_eq!(key.id, created.id);
        assert_eq!(key.tenant_id, tenant);
    }

    #[tokio::test]
    async fn test_foreign_key_never_authenticates() {
        let service = service();
        let tenant = Uuid::new_v4();
        let first = service
            .create_key(tenant, create_request(vec!["tournaments:read"]))
            .await
            .unwrap();
        let second = service
            .create_key(tenant, create_request(vec!["tournaments:read"]))
            .await
            .unwrap();

        assert_ne!(first.api_key, second.api_key);
        let resolved = service.authenticate(&second.api_key).await.unwrap();
        assert_eq!(resolved.id, second.id);
        assert_ne!(resolved.id, first.id);
    }

    #[tokio::test]
    async fn test_revoked_key_rejected() {
        let service = service();
        let tenant = Uuid::new_v4();
        let created = service
            .create_key(tenant, create_request(vec!["tournaments:read"]))
            .await
            .unwrap();

        service.revoke_key(tenant, created.id).await.unwrap();
        assert!(matches!(
            service.authenticate(&created.api_key).await,
            Err(GatewayError::Authentication)
        ));
        // Idempotent.
        service.revoke_key(tenant, created.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_key_rejected() {
        let service = service();
        assert!(matches!(
            service.authenticate("sk_live_nonsense").await,
            Err(GatewayError::Authentication)
        ));
    }

    #[tokio::test]
    async fn test_empty_scopes_rejected() {
        let service = service();
        let result = service.create_key(Uuid::new_v4(), create_request(vec![])).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_unknown_scope_rejected() {
        let service = service();
        let result = service
            .create_key(Uuid::new_v4(), create_request(vec!["brackets:read"]))
            .await;
        assert!(matches!(result, Err(GatewayError::UnknownScope(_))));
    }

    #[tokio::test]
    async fn test_default_rate_limit_by_type() {
        let service = service();
        let mut request = create_request(vec!["tournaments:read"]);
        request.key_type = ApiKeyType::Public;
        let created = service.create_key(Uuid::new_v4(), request).await.unwrap();
        assert_eq!(created.rate_limit, 60);
    }

    #[tokio::test]
    async fn test_authorize_wildcard() {
        let service = service();
        let created = service
            .create_key(Uuid::new_v4(), create_request(vec!["tournaments:*"]))
            .await
            .unwrap();
        let key = service.authenticate(&created.api_key).await.unwrap();

        assert!(service
            .authorize(&key, &Scope::parse("tournaments:write").unwrap())
            .is_ok());
        assert!(service
            .authorize(&key, &Scope::parse("quizzes:read").unwrap())
            .is_err());
    }

    #[tokio::test]
    async fn test_ip_allowlist() {
        let service = service();
        let mut request = create_request(vec!["tournaments:read"]);
        request.ip_whitelist = vec!["203.0.113.0/24".to_string()];
        let created = service.create_key(Uuid::new_v4(), request).await.unwrap();
        let key = service.authenticate(&created.api_key).await.unwrap();

        assert!(service.check_ip_allowed(&key, "203.0.113.40".parse().unwrap()));
        assert!(!service.check_ip_allowed(&key, "198.51.100.1".parse().unwrap()));
        assert!(service
            .enforce_ip(&key, "198.51.100.1".parse().unwrap())
            .is_err());
    }

    #[tokio::test]
    async fn test_empty_allowlist_admits_all() {
        let service = service();
        let created = service
            .create_key(Uuid::new_v4(), create_request(vec!["tournaments:read"]))
            .await
            .unwrap();
        let key = service.authenticate(&created.api_key).await.unwrap();
        assert!(service.check_ip_allowed(&key, "198.51.100.1".parse().unwrap()));
    }

    #[tokio::test]
    async fn test_list_excludes_material() {
        let service = service();
        let tenant = Uuid::new_v4();
        service
            .create_key(tenant, create_request(vec!["tournaments:read"]))
            .await
            .unwrap();

        let listed = service.list_keys(tenant).await;
        assert_eq!(listed.total, 1);
        let value = serde_json::to_value(&listed).unwrap();
        assert!(value["items"][0].get("api_key").is_none());
        assert!(value["items"][0].get("key_hash").is_none());
    }
}
