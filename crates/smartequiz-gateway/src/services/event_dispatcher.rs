//! Event fan-out: from domain events to per-webhook deliveries.
//!
//! `EventPublisher` is the fire-and-forget handle the rest of the platform
//! uses to emit events; `EventDispatcher` consumes them, matches active
//! subscriptions, writes one Pending delivery per matching webhook, and
//! spawns the first attempt for each.

use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError};
use uuid::Uuid;

use crate::models::{DeliveryEnvelope, DomainEvent, WebhookDelivery};
use crate::services::delivery_service::DeliveryService;
use crate::store::GatewayStore;

const EVENT_CHANNEL_CAPACITY: usize = 1_024;

/// Cheap-to-clone publishing handle. Publishing never blocks and never
/// fails the caller: a full channel or missing dispatcher only loses the
/// event, which is logged.
#[derive(Clone)]
pub struct EventPublisher {
    sender: broadcast::Sender<DomainEvent>,
}

impl EventPublisher {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn publish(&self, event: DomainEvent) {
        let event_id = event.event_id;
        let event_type = event.event_type;
        if let Err(e) = self.sender.send(event) {
            tracing::warn!(
                target: "event_dispatch",
                event_id = %event_id,
                event_type = %event_type,
                error = %e,
                "Dropping event: no dispatcher listening"
            );
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new()
    }
}

/// Consumes published events and materializes deliveries.
#[derive(Clone)]
pub struct EventDispatcher {
    store: Arc<GatewayStore>,
    delivery: DeliveryService,
}

impl EventDispatcher {
    pub fn new(store: Arc<GatewayStore>, delivery: DeliveryService) -> Self {
        Self { store, delivery }
    }

    /// Consume the publisher's stream until the channel closes. Run as a
    /// background task.
    pub async fn run(self, mut events: broadcast::Receiver<DomainEvent>) {
        loop {
            match events.recv().await {
                Ok(event) => self.dispatch(event).await,
                Err(RecvError::Lagged(missed)) => {
                    tracing::error!(
                        target: "event_dispatch",
                        missed,
                        "Event dispatcher lagged; events lost"
                    );
                }
                Err(RecvError::Closed) => {
                    tracing::info!(target: "event_dispatch", "Event channel closed, dispatcher stopping");
                    return;
                }
            }
        }
    }

    /// Fan one event out to every active, subscribed webhook of its tenant.
    /// Each matching webhook gets its own delivery record; first attempts
    /// run concurrently.
    pub async fn dispatch(&self, event: DomainEvent) {
        let webhooks = self
            .store
            .find_active_by_event_type(event.tenant_id, event.event_type)
            .await;
        if webhooks.is_empty() {
            return;
        }

        let payload = match serde_json::to_value(DeliveryEnvelope::from_event(&event)) {
            Ok(p) => p,
            Err(e) => {
                tracing::error!(
                    target: "event_dispatch",
                    event_id = %event.event_id,
                    error = %e,
                    "Failed to serialize event envelope"
                );
                return;
            }
        };

        tracing::info!(
            target: "event_dispatch",
            event_id = %event.event_id,
            tenant_id = %event.tenant_id,
            event_type = %event.event_type,
            webhooks = webhooks.len(),
            "Dispatching event"
        );

        for webhook in webhooks {
            let delivery = WebhookDelivery::pending(
                webhook.id,
                event.tenant_id,
                event.event_type,
                payload.clone(),
            );
            let delivery_id = delivery.id;
            self.store.insert_delivery(delivery).await;

            let delivery_service = self.delivery.clone();
            tokio::spawn(async move {
                delivery_service.execute_delivery(delivery_id).await;
            });
        }
    }

    /// Create the delivery records for an event without spawning attempts.
    /// Used by tests that drive attempts deterministically.
    #[doc(hidden)]
    pub async fn materialize(&self, event: &DomainEvent) -> Vec<Uuid> {
        let webhooks = self
            .store
            .find_active_by_event_type(event.tenant_id, event.event_type)
            .await;
        let payload = match serde_json::to_value(DeliveryEnvelope::from_event(event)) {
            Ok(p) => p,
            Err(_) => return Vec::new(),
        };

        let mut ids = Vec::with_capacity(webhooks.len());
        for webhook in webhooks {
            let delivery = WebhookDelivery::pending(
                webhook.id,
                event.tenant_id,
                event.event_type,
                payload.clone(),
            );
            ids.push(delivery.id);
            self.store.insert_delivery(delivery).await;
        }
        ids
    }
}
