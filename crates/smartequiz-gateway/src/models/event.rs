//! Domain event transport types.
//!
//! Event payloads are opaque to the gateway; only the event type and tenant
//! drive webhook matching. Unknown type strings are rejected at the API
//! boundary rather than passed through.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Closed catalog of event types the platform emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    TournamentCreated,
    TournamentStarted,
    TournamentCompleted,
    TournamentCancelled,
    QuizCompleted,
    QuestionAnswered,
    PlayerRegistered,
    PlayerEliminated,
    SubscriptionUpdated,
    /// Synthetic event used by the test-webhook endpoint.
    TestEvent,
}

impl EventType {
    /// Wire representation (`SCREAMING_SNAKE_CASE`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TournamentCreated => "TOURNAMENT_CREATED",
            Self::TournamentStarted => "TOURNAMENT_STARTED",
            Self::TournamentCompleted => "TOURNAMENT_COMPLETED",
            Self::TournamentCancelled => "TOURNAMENT_CANCELLED",
            Self::QuizCompleted => "QUIZ_COMPLETED",
            Self::QuestionAnswered => "QUESTION_ANSWERED",
            Self::PlayerRegistered => "PLAYER_REGISTERED",
            Self::PlayerEliminated => "PLAYER_ELIMINATED",
            Self::SubscriptionUpdated => "SUBSCRIPTION_UPDATED",
            Self::TestEvent => "TEST_EVENT",
        }
    }

    /// Parse a wire string; `None` for unknown types.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "TOURNAMENT_CREATED" => Some(Self::TournamentCreated),
            "TOURNAMENT_STARTED" => Some(Self::TournamentStarted),
            "TOURNAMENT_COMPLETED" => Some(Self::TournamentCompleted),
            "TOURNAMENT_CANCELLED" => Some(Self::TournamentCancelled),
            "QUIZ_COMPLETED" => Some(Self::QuizCompleted),
            "QUESTION_ANSWERED" => Some(Self::QuestionAnswered),
            "PLAYER_REGISTERED" => Some(Self::PlayerRegistered),
            "PLAYER_ELIMINATED" => Some(Self::PlayerEliminated),
            "SUBSCRIPTION_UPDATED" => Some(Self::SubscriptionUpdated),
            "TEST_EVENT" => Some(Self::TestEvent),
            _ => None,
        }
    }

    /// All subscribable event types (excludes the synthetic test event).
    pub fn all() -> Vec<Self> {
        vec![
            Self::TournamentCreated,
            Self::TournamentStarted,
            Self::TournamentCompleted,
            Self::TournamentCancelled,
            Self::QuizCompleted,
            Self::QuestionAnswered,
            Self::PlayerRegistered,
            Self::PlayerEliminated,
            Self::SubscriptionUpdated,
        ]
    }

    pub fn category(&self) -> &'static str {
        match self {
            Self::TournamentCreated
            | Self::TournamentStarted
            | Self::TournamentCompleted
            | Self::TournamentCancelled => "tournament",
            Self::QuizCompleted | Self::QuestionAnswered => "quiz",
            Self::PlayerRegistered | Self::PlayerEliminated => "player",
            Self::SubscriptionUpdated => "billing",
            Self::TestEvent => "test",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::TournamentCreated => "A tournament was created",
            Self::TournamentStarted => "A tournament started accepting answers",
            Self::TournamentCompleted => "A tournament finished and results are final",
            Self::TournamentCancelled => "A tournament was cancelled",
            Self::QuizCompleted => "A quiz session completed",
            Self::QuestionAnswered => "A player answered a question",
            Self::PlayerRegistered => "A player registered for a tournament",
            Self::PlayerEliminated => "A player was eliminated from a tournament",
            Self::SubscriptionUpdated => "The tenant's subscription plan changed",
            Self::TestEvent => "Synthetic event emitted by the test-webhook endpoint",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A domain event emitted by the platform, as received by the dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEvent {
    pub event_id: Uuid,
    pub tenant_id: Uuid,
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
    pub data: serde_json::Value,
}

impl DomainEvent {
    pub fn new(tenant_id: Uuid, event_type: EventType, data: serde_json::Value) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            tenant_id,
            event_type,
            timestamp: Utc::now(),
            data,
        }
    }
}

/// The JSON body posted to webhook endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryEnvelope {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub created_at: DateTime<Utc>,
    pub data: serde_json::Value,
}

impl DeliveryEnvelope {
    pub fn from_event(event: &DomainEvent) -> Self {
        Self {
            id: event.event_id,
            event_type: event.event_type,
            created_at: event.timestamp,
            data: event.data.clone(),
        }
    }
}

/// Catalog entry describing one event type.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EventTypeInfo {
    pub event_type: String,
    pub category: String,
    pub description: String,
}

/// Response for the event-type catalog endpoint.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EventTypeListResponse {
    pub event_types: Vec<EventTypeInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_roundtrip_for_all_types() {
        for et in EventType::all() {
            assert_eq!(EventType::parse(et.as_str()), Some(et));
        }
        assert_eq!(EventType::parse("TEST_EVENT"), Some(EventType::TestEvent));
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert_eq!(EventType::parse("BRACKET_UPDATED"), None);
        assert_eq!(EventType::parse(""), None);
    }

    #[test]
    fn test_serde_uses_wire_names() {
        let json = serde_json::to_string(&EventType::TournamentCompleted).unwrap();
        assert_eq!(json, "\"TOURNAMENT_COMPLETED\"");
    }

    #[test]
    fn test_envelope_field_names() {
        let event = DomainEvent::new(
            Uuid::new_v4(),
            EventType::QuizCompleted,
            serde_json::json!({"quiz_id": 7}),
        );
        let envelope = DeliveryEnvelope::from_event(&event);
        let value = serde_json::to_value(&envelope).unwrap();

        assert_eq!(value["id"], serde_json::json!(event.event_id));
        assert_eq!(value["type"], "QUIZ_COMPLETED");
        assert!(value.get("createdAt").is_some());
        assert_eq!(value["data"]["quiz_id"], 7);
    }

    #[test]
    fn test_all_excludes_test_event() {
        assert!(!EventType::all().contains(&EventType::TestEvent));
    }
}
