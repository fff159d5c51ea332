use serde::{Deserialize, Serialize};
use std::fmt;

/// Named events the transport adapter exposes to the rest of the UI.
/// `Connected`/`Disconnected` are synthesized from the socket lifecycle;
/// the rest arrive as the `type` discriminator of a JSON envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Connected,
    Disconnected,
    AgentMessage,
    WorkflowStatus,
    TestResponse,
    Unknown,
}

impl EventType {
    /// Maps a wire discriminator onto an event. The backend emits both
    /// "test" and "test_response" for runner output; they are one event
    /// from the UI's point of view.
    pub fn parse(kind: &str) -> EventType {
        match kind {
            "connected" | "connection" => EventType::Connected,
            "disconnected" => EventType::Disconnected,
            "agent_message" => EventType::AgentMessage,
            "workflow_status" => EventType::WorkflowStatus,
            "test" | "test_response" => EventType::TestResponse,
            _ => EventType::Unknown,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EventType::Connected => "connected",
            EventType::Disconnected => "disconnected",
            EventType::AgentMessage => "agent_message",
            EventType::WorkflowStatus => "workflow_status",
            EventType::TestResponse => "test_response",
            EventType::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_serialization() {
        let serialized = serde_json::to_string(&EventType::AgentMessage).unwrap();
        assert_eq!(serialized, "\"agent_message\"");

        let deserialized: EventType = serde_json::from_str(&serialized).unwrap();
        assert_eq!(deserialized, EventType::AgentMessage);
    }

    #[test]
    fn test_parse_wire_discriminators() {
        assert_eq!(EventType::parse("agent_message"), EventType::AgentMessage);
        assert_eq!(EventType::parse("workflow_status"), EventType::WorkflowStatus);
        assert_eq!(EventType::parse("test"), EventType::TestResponse);
        assert_eq!(EventType::parse("test_response"), EventType::TestResponse);
        assert_eq!(EventType::parse("something_else"), EventType::Unknown);
    }

    #[test]
    fn test_event_type_display() {
        assert_eq!(EventType::Connected.to_string(), "connected");
        assert_eq!(EventType::TestResponse.to_string(), "test_response");
    }
}
