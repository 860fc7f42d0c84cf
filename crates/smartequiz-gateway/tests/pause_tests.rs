//! Auto-pause after consecutive failures, and manual reactivation.

mod common;

use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{gateway, TestGateway, TENANT_A};
use smartequiz_gateway::models::{
    DeliveryStatus, DomainEvent, EventType, WebhookDelivery, WebhookStatus,
};
use smartequiz_gateway::services::{DeliveryService, EventDispatcher};
use uuid::Uuid;

const THRESHOLD: u32 = 3;

fn strict_delivery(gw: &TestGateway) -> DeliveryService {
    gw.delivery.clone().with_failure_threshold(THRESHOLD)
}

async fn fail_once(gw: &TestGateway, delivery_service: &DeliveryService, event: EventType) -> Uuid {
    let dispatcher = EventDispatcher::new(gw.store.clone(), delivery_service.clone());
    let ids = dispatcher
        .materialize(&DomainEvent::new(TENANT_A, event, serde_json::json!({})))
        .await;
    assert_eq!(ids.len(), 1, "webhook should still be active");
    delivery_service.execute_delivery(ids[0]).await;
    ids[0]
}

#[tokio::test]
async fn test_webhook_pauses_at_failure_threshold() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let gw = gateway();
    let delivery_service = strict_delivery(&gw);
    let (webhook_id, _) = gw
        .seed_webhook(TENANT_A, &server.uri(), &["QUIZ_COMPLETED"], 0)
        .await;

    for i in 1..THRESHOLD {
        fail_once(&gw, &delivery_service, EventType::QuizCompleted).await;
        let webhook = gw.store.find_webhook(TENANT_A, webhook_id).await.unwrap();
        assert_eq!(webhook.consecutive_failures, i);
        assert_eq!(webhook.status, WebhookStatus::Active);
    }

    // A delivery queued before the pause gets cancelled with it.
    let queued = WebhookDelivery::pending(
        webhook_id,
        TENANT_A,
        EventType::QuizCompleted,
        serde_json::json!({}),
    );
    let queued_id = queued.id;
    gw.store.insert_delivery(queued).await;

    fail_once(&gw, &delivery_service, EventType::QuizCompleted).await;

    let webhook = gw.store.find_webhook(TENANT_A, webhook_id).await.unwrap();
    assert_eq!(webhook.status, WebhookStatus::Paused);
    assert_eq!(webhook.consecutive_failures, THRESHOLD);

    let cancelled = gw.store.get_delivery(queued_id).await.unwrap();
    assert_eq!(cancelled.status, DeliveryStatus::Failed);
    assert_eq!(cancelled.error_message.as_deref(), Some("webhook paused"));
}

#[tokio::test]
async fn test_paused_webhook_receives_no_new_events() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let gw = gateway();
    let delivery_service = strict_delivery(&gw);
    let (webhook_id, _) = gw
        .seed_webhook(TENANT_A, &server.uri(), &["TOURNAMENT_COMPLETED"], 0)
        .await;

    for _ in 0..THRESHOLD {
        fail_once(&gw, &delivery_service, EventType::TournamentCompleted).await;
    }
    let webhook = gw.store.find_webhook(TENANT_A, webhook_id).await.unwrap();
    assert_eq!(webhook.status, WebhookStatus::Paused);

    // Events after the pause create no deliveries for this webhook.
    let dispatcher = EventDispatcher::new(gw.store.clone(), delivery_service);
    let ids = dispatcher
        .materialize(&DomainEvent::new(
            TENANT_A,
            EventType::TournamentCompleted,
            serde_json::json!({}),
        ))
        .await;
    assert!(ids.is_empty());
}

#[tokio::test]
async fn test_reactivation_resets_the_failure_streak() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let gw = gateway();
    let delivery_service = strict_delivery(&gw);
    let (webhook_id, _) = gw
        .seed_webhook(TENANT_A, &server.uri(), &["QUIZ_COMPLETED"], 0)
        .await;

    for _ in 0..THRESHOLD {
        fail_once(&gw, &delivery_service, EventType::QuizCompleted).await;
    }

    let reactivated = gw
        .state
        .webhooks
        .reactivate_webhook(TENANT_A, webhook_id)
        .await
        .unwrap();
    assert_eq!(reactivated.status, WebhookStatus::Active);
    assert_eq!(reactivated.consecutive_failures, 0);

    // The streak restarts from zero: one more failure is 1, not 4, so the
    // webhook stays active.
    fail_once(&gw, &delivery_service, EventType::QuizCompleted).await;
    let webhook = gw.store.find_webhook(TENANT_A, webhook_id).await.unwrap();
    assert_eq!(webhook.status, WebhookStatus::Active);
    assert_eq!(webhook.consecutive_failures, 1);
}
