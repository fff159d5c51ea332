//! Typed WebSocket payloads. Incoming frames are decoded at the boundary
//! into these tagged shapes instead of being trusted as loose JSON; frames
//! that fail the envelope check are dropped by the client.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::models::AgentMessage;
use super::event_types::EventType;

/// Payload of an `agent_message` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentMessageEvent {
    pub from_agent: String,
    pub to_agent: String,
    pub content: String,
    #[serde(default)]
    pub timestamp: Option<Value>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Payload of a `workflow_status` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowStatusEvent {
    #[serde(default)]
    pub workflow_id: Option<String>,
    pub status: String,
}

/// Payload of a `test` / `test_response` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResponseEvent {
    #[serde(default)]
    pub tests_passed: Option<bool>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub test_results: Option<String>,
    #[serde(default)]
    pub timestamp: Option<Value>,
}

impl TestResponseEvent {
    pub fn output(&self) -> String {
        self.content
            .clone()
            .or_else(|| self.test_results.clone())
            .unwrap_or_default()
    }
}

/// A decoded incoming frame.
#[derive(Debug, Clone)]
pub enum WsEvent {
    AgentMessage(AgentMessageEvent),
    WorkflowStatus(WorkflowStatusEvent),
    TestResponse(TestResponseEvent),
    Lifecycle(EventType),
    Unknown(String),
}

/// Minimal envelope check: an object with a string `type` discriminator.
/// Anything else is malformed and gets dropped rather than trusted.
pub fn validate_envelope(value: &Value) -> bool {
    value
        .as_object()
        .map(|obj| obj.get("type").map_or(false, |t| t.is_string()))
        .unwrap_or(false)
}

/// Decodes a validated envelope into a typed event. Payload fields that
/// fail to decode produce an error string the caller logs and drops.
pub fn parse_event(value: &Value) -> Result<WsEvent, String> {
    let kind = value
        .get("type")
        .and_then(|t| t.as_str())
        .ok_or_else(|| "missing type discriminator".to_string())?;

    match EventType::parse(kind) {
        EventType::AgentMessage => serde_json::from_value::<AgentMessageEvent>(value.clone())
            .map(WsEvent::AgentMessage)
            .map_err(|e| format!("bad agent_message payload: {}", e)),
        EventType::WorkflowStatus => serde_json::from_value::<WorkflowStatusEvent>(value.clone())
            .map(WsEvent::WorkflowStatus)
            .map_err(|e| format!("bad workflow_status payload: {}", e)),
        EventType::TestResponse => serde_json::from_value::<TestResponseEvent>(value.clone())
            .map(WsEvent::TestResponse)
            .map_err(|e| format!("bad test payload: {}", e)),
        EventType::Connected => Ok(WsEvent::Lifecycle(EventType::Connected)),
        EventType::Disconnected => Ok(WsEvent::Lifecycle(EventType::Disconnected)),
        EventType::Unknown => Ok(WsEvent::Unknown(kind.to_string())),
    }
}

/// Accepts the timestamp shapes the backend actually sends: ISO-8601
/// strings (with or without offset), epoch seconds, or epoch milliseconds.
/// `fallback_ms` is used when the field is missing or unreadable.
pub fn parse_timestamp_ms(value: Option<&Value>, fallback_ms: f64) -> f64 {
    match value {
        Some(Value::Number(n)) => {
            let raw = n.as_f64().unwrap_or(fallback_ms);
            // Anything this small has to be seconds
            if raw < 1.0e12 {
                raw * 1000.0
            } else {
                raw
            }
        }
        Some(Value::String(s)) => parse_iso_ms(s).unwrap_or(fallback_ms),
        _ => fallback_ms,
    }
}

fn parse_iso_ms(s: &str) -> Option<f64> {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis() as f64);
    }
    // Python's datetime.isoformat() omits the offset for naive datetimes
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|dt| dt.and_utc().timestamp_millis() as f64)
}

impl AgentMessageEvent {
    /// Translates the backend payload into the local message shape.
    pub fn into_agent_message(self, fallback_now_ms: f64) -> AgentMessage {
        let timestamp_ms = parse_timestamp_ms(self.timestamp.as_ref(), fallback_now_ms);
        AgentMessage {
            id: Uuid::new_v4().to_string(),
            from_agent: self.from_agent,
            to_agent: self.to_agent,
            content: self.content,
            timestamp_ms,
        }
    }
}

/// Translates one `/run-manual-flow` transcript entry into the local shape.
pub fn flow_payload_to_agent_message(
    payload: &crate::models::FlowMessagePayload,
    fallback_now_ms: f64,
) -> AgentMessage {
    AgentMessage {
        id: Uuid::new_v4().to_string(),
        from_agent: payload.from.clone(),
        to_agent: payload.to.clone(),
        content: payload.content.clone(),
        timestamp_ms: parse_timestamp_ms(
            Some(&Value::String(payload.timestamp.clone())),
            fallback_now_ms,
        ),
    }
}

/// Outbound frames.
pub mod builders {
    use serde::Serialize;

    #[derive(Debug, Clone, Serialize)]
    pub struct PingMessage {
        #[serde(rename = "type")]
        pub kind: &'static str,
        pub timestamp: i64,
    }

    pub fn create_ping() -> PingMessage {
        PingMessage {
            kind: "ping",
            timestamp: js_sys::Date::now() as i64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_validate_envelope() {
        assert!(validate_envelope(&json!({"type": "agent_message"})));
        assert!(!validate_envelope(&json!({"kind": "agent_message"})));
        assert!(!validate_envelope(&json!({"type": 7})));
        assert!(!validate_envelope(&json!("agent_message")));
        assert!(!validate_envelope(&json!([1, 2, 3])));
    }

    #[test]
    fn test_parse_agent_message_event() {
        let frame = json!({
            "type": "agent_message",
            "from_agent": "coordinator",
            "to_agent": "coder",
            "content": "generate code for the task",
            "timestamp": "2025-03-14T09:26:53.589793"
        });
        match parse_event(&frame).unwrap() {
            WsEvent::AgentMessage(event) => {
                assert_eq!(event.from_agent, "coordinator");
                assert_eq!(event.to_agent, "coder");
                let msg = event.into_agent_message(0.0);
                assert!(msg.timestamp_ms > 1.7e12);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_parse_workflow_status_event() {
        let frame = json!({
            "type": "workflow_status",
            "workflow_id": "wf-12",
            "status": "running"
        });
        match parse_event(&frame).unwrap() {
            WsEvent::WorkflowStatus(event) => {
                assert_eq!(event.workflow_id.as_deref(), Some("wf-12"));
                assert_eq!(event.status, "running");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_parse_test_event_under_both_names() {
        for kind in ["test", "test_response"] {
            let frame = json!({
                "type": kind,
                "tests_passed": true,
                "content": "2 passed in 0.01s"
            });
            match parse_event(&frame).unwrap() {
                WsEvent::TestResponse(event) => {
                    assert_eq!(event.tests_passed, Some(true));
                    assert_eq!(event.output(), "2 passed in 0.01s");
                }
                other => panic!("unexpected event: {:?}", other),
            }
        }
    }

    #[test]
    fn test_unknown_event_is_not_an_error() {
        let frame = json!({"type": "heartbeat"});
        match parse_event(&frame).unwrap() {
            WsEvent::Unknown(kind) => assert_eq!(kind, "heartbeat"),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_malformed_payload_is_an_error() {
        // Missing required content/from/to fields
        let frame = json!({"type": "agent_message", "from_agent": "a"});
        assert!(parse_event(&frame).is_err());
    }

    #[test]
    fn test_timestamp_shapes() {
        let fallback = 42.0;
        assert_eq!(parse_timestamp_ms(None, fallback), fallback);
        assert_eq!(
            parse_timestamp_ms(Some(&json!(1700000000.0)), fallback),
            1.7e12
        );
        assert_eq!(
            parse_timestamp_ms(Some(&json!(1700000000123.0_f64)), fallback),
            1700000000123.0
        );
        let iso = parse_timestamp_ms(Some(&json!("2023-11-14T22:13:20+00:00")), fallback);
        assert_eq!(iso, 1700000000000.0);
        assert_eq!(parse_timestamp_ms(Some(&json!("garbage")), fallback), fallback);
    }
}
