//! The injectable gateway store.
//!
//! Persistence technology is a deployment concern; the core needs only
//! key-by-hash lookup, per-tenant set-membership queries, and paginated log
//! queries. `GatewayStore` is the in-memory default engine behind the
//! managers; a durable implementation replaces this method surface without
//! touching the services.
//!
//! Mutation discipline: ApiKey and Webhook records are only mutated through
//! their owning service; delivery rows are mutated only by the delivery
//! worker, one in-flight attempt at a time.

mod api_keys;
mod deliveries;
mod webhooks;

use std::collections::HashMap;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{ApiKey, Webhook, WebhookDelivery};

/// In-memory store for keys, webhooks, and the delivery log.
#[derive(Debug, Default)]
pub struct GatewayStore {
    pub(crate) api_keys: RwLock<HashMap<Uuid, ApiKey>>,
    /// key_hash -> key id; the hash uniquely determines at most one key.
    pub(crate) key_hash_index: RwLock<HashMap<String, Uuid>>,
    pub(crate) webhooks: RwLock<HashMap<Uuid, Webhook>>,
    pub(crate) deliveries: RwLock<HashMap<Uuid, WebhookDelivery>>,
}

impl GatewayStore {
    pub fn new() -> Self {
        Self::default()
    }
}
