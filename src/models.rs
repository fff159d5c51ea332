use serde::{Serialize, Deserialize};

/// One of the four fixed anchor points on a box border.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
    Top,
    Bottom,
}

impl Side {
    pub const ALL: [Side; 4] = [Side::Left, Side::Right, Side::Top, Side::Bottom];

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Left => "left",
            Side::Right => "right",
            Side::Top => "top",
            Side::Bottom => "bottom",
        }
    }
}

/// Which backend agent implementation a box stands for.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AgentKind {
    Coordinator,
    Coder,
    Tester,
    Runner,
    Custom(String),
}

impl AgentKind {
    pub fn as_str(&self) -> &str {
        match self {
            AgentKind::Coordinator => "coordinator",
            AgentKind::Coder => "coder",
            AgentKind::Tester => "tester",
            AgentKind::Runner => "runner",
            AgentKind::Custom(s) => s,
        }
    }

    /// Role string the backend uses for this kind by default.
    pub fn default_role(&self) -> &str {
        match self {
            AgentKind::Coordinator => "Smart Coordinator",
            AgentKind::Coder => "Python Developer",
            AgentKind::Tester => "Test Engineer",
            AgentKind::Runner => "Test Runner",
            AgentKind::Custom(_) => "Agent",
        }
    }
}

impl From<String> for AgentKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "coordinator" => AgentKind::Coordinator,
            "coder" => AgentKind::Coder,
            "tester" => AgentKind::Tester,
            "runner" => AgentKind::Runner,
            _ => AgentKind::Custom(s),
        }
    }
}

impl From<AgentKind> for String {
    fn from(k: AgentKind) -> Self {
        k.as_str().to_string()
    }
}

/// A positioned, resizable rectangle representing one agent on the canvas.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentBox {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub kind: AgentKind,
    pub role: String,
    pub model: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub pinned: bool,
}

/// Directed edge between two handles on two different boxes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub id: String,
    pub from_box: String,
    pub from_side: Side,
    pub to_box: String,
    pub to_side: Side,
    #[serde(default)]
    pub pinned: bool,
}

/// One transcript entry, translated from a backend event into the local shape.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentMessage {
    pub id: String,
    pub from_agent: String,
    pub to_agent: String,
    pub content: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp_ms: f64,
}

/// Override position/size for one transcript popup. `x`/`y` stay `None`
/// until the user drags the popup; before that it follows the connection
/// midpoint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PopupState {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub width: f64,
    pub height: f64,
}

impl Default for PopupState {
    fn default() -> Self {
        Self {
            x: None,
            y: None,
            width: crate::constants::DEFAULT_POPUP_WIDTH,
            height: crate::constants::DEFAULT_POPUP_HEIGHT,
        }
    }
}

/// Everything needed to restore a canvas, exported as one JSON document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CanvasSnapshot {
    pub version: u32,
    pub boxes: Vec<AgentBox>,
    pub connections: Vec<Connection>,
    pub prompt: String,
    pub viewport_x: f64,
    pub viewport_y: f64,
    pub zoom: f64,
}

pub const SNAPSHOT_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// API payloads - these match the backend schema
// ---------------------------------------------------------------------------

/// Structured result of `POST /chat`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatResult {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub tests: Option<String>,
    #[serde(default)]
    pub test_results: Option<String>,
    #[serde(default)]
    pub tests_passed: Option<bool>,
    #[serde(default)]
    pub success: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatRequest {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

/// Box payload for `POST /run-manual-flow`; field names follow the wire.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FlowBoxPayload {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(rename = "agentType")]
    pub agent_type: String,
    pub role: String,
    pub model: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FlowConnectionPayload {
    pub id: String,
    #[serde(rename = "fromId")]
    pub from_id: String,
    #[serde(rename = "fromSide")]
    pub from_side: Side,
    #[serde(rename = "toId")]
    pub to_id: String,
    #[serde(rename = "toSide")]
    pub to_side: Side,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ManualFlowRequest {
    pub prompt: String,
    pub boxes: Vec<FlowBoxPayload>,
    pub connections: Vec<FlowConnectionPayload>,
}

/// One transcript entry as returned by `/run-manual-flow`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FlowMessagePayload {
    pub from: String,
    pub to: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub content: String,
    pub timestamp: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ManualFlowResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub messages: Vec<FlowMessagePayload>,
    #[serde(default)]
    pub results: Option<serde_json::Value>,
    #[serde(default)]
    pub generated_files: Vec<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Agent descriptor for the `/run-workflow` endpoints (local and online
/// service take the same shape).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkflowAgentSpec {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub role: String,
    pub model: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkflowRequest {
    pub task: String,
    pub agents: Vec<WorkflowAgentSpec>,
}

/// Result of the local `/run-workflow`; the backend returns the message
/// bus outcome, so only the success flag is load-bearing.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkflowRunResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OnlineWorkflowRequest {
    pub task: String,
    pub agents: Vec<WorkflowAgentSpec>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OnlineWorkflowResponse {
    #[serde(default)]
    pub workflow_id: Option<String>,
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub messages: Vec<FlowMessagePayload>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub agents_available: Option<Vec<String>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FileListResponse {
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkflowStatusResponse {
    pub workflow_id: String,
    pub status: String,
    #[serde(default)]
    pub message_count: Option<u64>,
    #[serde(default)]
    pub conversation_id: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExampleAgent {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: AgentKind,
    pub role: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExampleWorkflowResponse {
    pub agents: Vec<ExampleAgent>,
    #[serde(default)]
    pub description: Option<String>,
}

impl AgentBox {
    pub fn to_workflow_agent(&self) -> WorkflowAgentSpec {
        WorkflowAgentSpec {
            id: self.id.clone(),
            kind: self.kind.as_str().to_string(),
            role: self.role.clone(),
            model: self
                .model
                .clone()
                .unwrap_or_else(|| crate::constants::DEFAULT_AGENT_MODEL.to_string()),
        }
    }

    pub fn to_flow_payload(&self) -> FlowBoxPayload {
        FlowBoxPayload {
            id: self.id.clone(),
            x: self.x,
            y: self.y,
            width: self.width,
            height: self.height,
            agent_type: self.kind.as_str().to_string(),
            role: self.role.clone(),
            model: self
                .model
                .clone()
                .unwrap_or_else(|| crate::constants::DEFAULT_AGENT_MODEL.to_string()),
        }
    }
}

impl Connection {
    pub fn to_flow_payload(&self) -> FlowConnectionPayload {
        FlowConnectionPayload {
            id: self.id.clone(),
            from_id: self.from_box.clone(),
            from_side: self.from_side,
            to_id: self.to_box.clone(),
            to_side: self.to_side,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_serialization() {
        assert_eq!(serde_json::to_string(&Side::Left).unwrap(), "\"left\"");
        let side: Side = serde_json::from_str("\"bottom\"").unwrap();
        assert_eq!(side, Side::Bottom);
    }

    #[test]
    fn test_agent_kind_round_trip() {
        let kind: AgentKind = serde_json::from_str("\"coder\"").unwrap();
        assert_eq!(kind, AgentKind::Coder);

        let custom: AgentKind = serde_json::from_str("\"reviewer\"").unwrap();
        assert_eq!(custom, AgentKind::Custom("reviewer".to_string()));
        assert_eq!(serde_json::to_string(&custom).unwrap(), "\"reviewer\"");
    }

    #[test]
    fn test_flow_payload_field_names() {
        let conn = Connection {
            id: "c1".to_string(),
            from_box: "a".to_string(),
            from_side: Side::Right,
            to_box: "b".to_string(),
            to_side: Side::Left,
            pinned: false,
        };
        let json = serde_json::to_string(&conn.to_flow_payload()).unwrap();
        assert!(json.contains("\"fromId\":\"a\""));
        assert!(json.contains("\"fromSide\":\"right\""));
        assert!(json.contains("\"toSide\":\"left\""));
    }

    #[test]
    fn test_chat_result_parses_backend_shape() {
        let json = r#"{
            "type": "coding",
            "message": "Task completed",
            "code": "def add(a, b):\n    return a + b",
            "tests": null,
            "test_results": null,
            "tests_passed": null,
            "success": true
        }"#;
        let result: ChatResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.kind, "coding");
        assert!(result.success);
        assert!(result.code.is_some());
        assert!(result.tests.is_none());
    }

    #[test]
    fn test_snapshot_round_trip() {
        let snapshot = CanvasSnapshot {
            version: SNAPSHOT_VERSION,
            boxes: vec![AgentBox {
                id: "b1".to_string(),
                x: 40.0,
                y: 60.0,
                width: 200.0,
                height: 100.0,
                kind: AgentKind::Coordinator,
                role: "Smart Coordinator".to_string(),
                model: None,
                description: Some("routes tasks".to_string()),
                pinned: true,
            }],
            connections: vec![],
            prompt: "write a parser".to_string(),
            viewport_x: 10.0,
            viewport_y: -5.0,
            zoom: 1.25,
        };
        let json = serde_json::to_string(&snapshot).unwrap();
        let restored: CanvasSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, snapshot);
    }
}
