//! Shared fixtures for gateway integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::Duration as ChronoDuration;
use uuid::Uuid;
use wiremock::{Request, Respond, ResponseTemplate};

use smartequiz_gateway::models::{ApiKeyType, CreateApiKeyRequest, CreateWebhookRequest};
use smartequiz_gateway::{
    ApiKeyService, DeliveryService, EventPublisher, GatewayState, GatewayStore,
    RateLimiterRegistry, WebhookService,
};

pub const ENCRYPTION_KEY: [u8; 32] = [0x42; 32];
pub const KEY_SECRET: &[u8] = b"integration-test-key-secret";

pub const TENANT_A: Uuid = Uuid::from_u128(0xA11CE_0001);
pub const TENANT_B: Uuid = Uuid::from_u128(0xB0B0_0002);

pub struct TestGateway {
    pub state: GatewayState,
    pub store: Arc<GatewayStore>,
    pub delivery: DeliveryService,
}

/// A gateway wired for tests: plain-HTTP webhook URLs allowed (wiremock
/// listens on localhost) and millisecond-scale retry backoff.
pub fn gateway() -> TestGateway {
    let store = Arc::new(GatewayStore::new());
    let delivery = DeliveryService::new(store.clone(), ENCRYPTION_KEY.to_vec())
        .expect("delivery service")
        .with_backoff(
            ChronoDuration::milliseconds(20),
            ChronoDuration::milliseconds(200),
        );
    let webhooks = WebhookService::new(store.clone(), ENCRYPTION_KEY.to_vec(), delivery.clone())
        .with_allow_http(true);

    let state = GatewayState {
        store: store.clone(),
        api_keys: ApiKeyService::new(store.clone(), KEY_SECRET.to_vec()),
        webhooks,
        rate_limiter: Arc::new(RateLimiterRegistry::new()),
        publisher: EventPublisher::new(),
    };

    TestGateway {
        state,
        store,
        delivery,
    }
}

impl TestGateway {
    /// Issue a secret key with the given scopes, returning the raw key.
    pub async fn seed_secret_key(&self, tenant_id: Uuid, scopes: &[&str]) -> String {
        self.seed_key(tenant_id, ApiKeyType::Secret, scopes, None).await
    }

    pub async fn seed_key(
        &self,
        tenant_id: Uuid,
        key_type: ApiKeyType,
        scopes: &[&str],
        rate_limit: Option<u32>,
    ) -> String {
        let response = self
            .state
            .api_keys
            .create_key(
                tenant_id,
                CreateApiKeyRequest {
                    name: "test key".to_string(),
                    description: None,
                    key_type,
                    scopes: scopes.iter().map(|s| s.to_string()).collect(),
                    rate_limit,
                    ip_whitelist: vec![],
                },
            )
            .await
            .expect("seed api key");
        response.api_key
    }

    /// Register a webhook, returning its id and plaintext signing secret.
    pub async fn seed_webhook(
        &self,
        tenant_id: Uuid,
        url: &str,
        events: &[&str],
        retry_attempts: u32,
    ) -> (Uuid, String) {
        let created = self
            .state
            .webhooks
            .create_webhook(
                tenant_id,
                CreateWebhookRequest {
                    url: url.to_string(),
                    description: None,
                    events: events.iter().map(|e| e.to_string()).collect(),
                    retry_attempts: Some(retry_attempts),
                    timeout_ms: None,
                },
            )
            .await
            .expect("seed webhook");
        (created.webhook.id, created.secret)
    }
}

/// Responds with `failures` errors, then succeeds.
pub struct FlakyResponder {
    failures: usize,
    calls: Arc<AtomicUsize>,
}

impl FlakyResponder {
    pub fn new(failures: usize) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                failures,
                calls: calls.clone(),
            },
            calls,
        )
    }
}

impl Respond for FlakyResponder {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n < self.failures {
            ResponseTemplate::new(500).set_body_string("upstream error")
        } else {
            ResponseTemplate::new(200).set_body_string("ok")
        }
    }
}

/// Poll an async condition until it holds or the deadline passes.
pub async fn wait_until<F, Fut>(mut condition: F, timeout_ms: u64) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + std::time::Duration::from_millis(timeout_ms);
    loop {
        if condition().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
}
