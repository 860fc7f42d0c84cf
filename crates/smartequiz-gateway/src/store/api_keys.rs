//! API key store operations.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::GatewayStore;
use crate::models::{ApiKey, ApiKeyStatus};

impl GatewayStore {
    /// Insert a freshly created key and index its hash.
    pub async fn insert_api_key(&self, key: ApiKey) {
        self.key_hash_index
            .write()
            .await
            .insert(key.key_hash.clone(), key.id);
        self.api_keys.write().await.insert(key.id, key);
    }

    /// Look a key up by its stored hash. Returns revoked keys too; the
    /// caller decides how to reject them.
    pub async fn find_api_key_by_hash(&self, key_hash: &str) -> Option<ApiKey> {
        let id = *self.key_hash_index.read().await.get(key_hash)?;
        self.api_keys.read().await.get(&id).cloned()
    }

    /// Look a key up by id within a tenant.
    pub async fn find_api_key(&self, tenant_id: Uuid, id: Uuid) -> Option<ApiKey> {
        self.api_keys
            .read()
            .await
            .get(&id)
            .filter(|k| k.tenant_id == tenant_id)
            .cloned()
    }

    /// All keys for a tenant, newest first.
    pub async fn list_api_keys(&self, tenant_id: Uuid) -> Vec<ApiKey> {
        let mut keys: Vec<ApiKey> = self
            .api_keys
            .read()
            .await
            .values()
            .filter(|k| k.tenant_id == tenant_id)
            .cloned()
            .collect();
        keys.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        keys
    }

    /// Flip a key to revoked. Idempotent; returns false only when the key
    /// does not exist in this tenant.
    pub async fn revoke_api_key(&self, tenant_id: Uuid, id: Uuid) -> bool {
        let mut keys = self.api_keys.write().await;
        match keys.get_mut(&id) {
            Some(key) if key.tenant_id == tenant_id => {
                key.status = ApiKeyStatus::Revoked;
                true
            }
            _ => false,
        }
    }

    /// Best-effort `last_used_at` update, skipped inside the debounce
    /// interval to limit write churn.
    pub async fn touch_api_key_last_used(&self, id: Uuid, now: DateTime<Utc>, debounce_secs: i64) {
        let mut keys = self.api_keys.write().await;
        if let Some(key) = keys.get_mut(&id) {
            let due = match key.last_used_at {
                Some(last) => (now - last).num_seconds() >= debounce_secs,
                None => true,
            };
            if due {
                key.last_used_at = Some(now);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ApiKeyType;
    use crate::scopes::Scope;

    fn sample_key(tenant_id: Uuid, hash: &str) -> ApiKey {
        ApiKey {
            id: Uuid::new_v4(),
            tenant_id,
            name: "test-key".to_string(),
            description: None,
            key_type: ApiKeyType::Secret,
            key_hash: hash.to_string(),
            key_prefix: "sk_live_abcd".to_string(),
            scopes: vec![Scope::parse("tournaments:read").unwrap()],
            rate_limit: 600,
            ip_whitelist: vec![],
            status: ApiKeyStatus::Active,
            created_at: Utc::now(),
            last_used_at: None,
        }
    }

    #[tokio::test]
    async fn test_hash_lookup_and_tenant_scoping() {
        let store = GatewayStore::new();
        let tenant = Uuid::new_v4();
        let key = sample_key(tenant, "hash-1");
        let id = key.id;
        store.insert_api_key(key).await;

        assert!(store.find_api_key_by_hash("hash-1").await.is_some());
        assert!(store.find_api_key_by_hash("hash-2").await.is_none());
        assert!(store.find_api_key(tenant, id).await.is_some());
        assert!(store.find_api_key(Uuid::new_v4(), id).await.is_none());
    }

    #[tokio::test]
    async fn test_revoke_is_idempotent() {
        let store = GatewayStore::new();
        let tenant = Uuid::new_v4();
        let key = sample_key(tenant, "hash-1");
        let id = key.id;
        store.insert_api_key(key).await;

        assert!(store.revoke_api_key(tenant, id).await);
        assert!(store.revoke_api_key(tenant, id).await);
        let revoked = store.find_api_key(tenant, id).await.unwrap();
        assert_eq!(revoked.status, ApiKeyStatus::Revoked);
    }

    #[tokio::test]
    async fn test_touch_debounces() {
        let store = GatewayStore::new();
        let tenant = Uuid::new_v4();
        let key = sample_key(tenant, "hash-1");
        let id = key.id;
        store.insert_api_key(key).await;

        let first = Utc::now();
        store.touch_api_key_last_used(id, first, 60).await;
        let after_first = store.find_api_key(tenant, id).await.unwrap().last_used_at;
        assert_eq!(after_first, Some(first));

        // Second touch within the debounce window is skipped.
        store
            .touch_api_key_last_used(id, first + chrono::Duration::seconds(5), 60)
            .await;
        let after_second = store.find_api_key(tenant, id).await.unwrap().last_used_at;
        assert_eq!(after_second, Some(first));
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let store = GatewayStore::new();
        let tenant = Uuid::new_v4();
        let mut older = sample_key(tenant, "hash-old");
        older.created_at = Utc::now() - chrono::Duration::hours(1);
        let newer = sample_key(tenant, "hash-new");
        let newer_id = newer.id;
        store.insert_api_key(older).await;
        store.insert_api_key(newer).await;

        let listed = store.list_api_keys(tenant).await;
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, newer_id);
    }
}
