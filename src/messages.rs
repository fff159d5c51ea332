// The events that can occur in the UI, plus the side-effect commands the
// reducer hands back to the runtime.

use crate::models::{AgentKind, AgentMessage, ChatResult, ExampleAgent, ManualFlowRequest, Side};

#[derive(Debug, Clone)]
pub enum Message {
    // Box/connection model
    AddBoxAt {
        x: f64,
        y: f64,
        kind: AgentKind,
    },
    UpdateBoxRole {
        box_id: String,
        role: String,
    },
    UpdateBoxModel {
        box_id: String,
        model: String,
    },
    UpdateBoxDescription {
        box_id: String,
        description: String,
    },
    ToggleBoxPin(String),
    ToggleConnectionPin(String),
    DeleteSelection,
    ClearCanvas,

    // Selection / popup
    SelectBox(String),
    SelectConnection(String),
    ClearSelection,

    // Interaction state machine
    StartBoxDrag {
        box_id: String,
        grab_x: f64,
        grab_y: f64,
    },
    StartBoxResize {
        box_id: String,
        mouse_x: f64,
        mouse_y: f64,
    },
    StartConnecting {
        box_id: String,
        side: Side,
    },
    StartPan {
        screen_x: f64,
        screen_y: f64,
    },
    StartPopupDrag {
        key: String,
        grab_x: f64,
        grab_y: f64,
    },
    StartPopupResize {
        key: String,
        mouse_x: f64,
        mouse_y: f64,
    },
    PointerMoved {
        world_x: f64,
        world_y: f64,
        screen_x: f64,
        screen_y: f64,
    },
    PointerReleased {
        world_x: f64,
        world_y: f64,
    },
    EscapePressed,

    // View controls
    ToggleConnectMode,
    ToggleTheme,
    ZoomCanvas {
        new_zoom: f64,
        viewport_x: f64,
        viewport_y: f64,
    },

    // Prompt / workflow run
    UpdatePromptText(String),
    SubmitPrompt,
    AbortRun,
    RunCompleted {
        run_id: u32,
        result: ChatResult,
    },
    RunFailed {
        run_id: u32,
        error: String,
    },
    FlowMessagesReceived {
        run_id: u32,
        messages: Vec<AgentMessage>,
    },
    ClearMessages,

    // Connectivity status
    HealthChecked(bool),
    WsConnected,
    WsDisconnected,

    // Backend push events
    ReceiveAgentMessage(AgentMessage),
    ReceiveWorkflowStatus {
        workflow_id: Option<String>,
        status: String,
    },
    ReceiveTestResponse {
        passed: Option<bool>,
        output: String,
        timestamp_ms: f64,
    },
    WorkflowStatusPolled {
        status: String,
    },

    // Catalog data
    ModelsFetched(Vec<String>),
    FilesFetched(Vec<String>),
    RequestLoadFile(String),
    RequestDeleteFile(String),
    GeneratedFileLoaded {
        filename: String,
        code: String,
    },
    FileDeleted(String),
    LoadExampleWorkflow,
    ExampleWorkflowLoaded(Vec<ExampleAgent>),

    // Persistence
    ExportCanvas,
    ImportCanvas(String),
}

/// Which in-page custom event a file payload should be announced on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileEventKind {
    Select,
    Generate,
}

/// Commands represent side effects to run after the state update: network
/// calls, browser alerts, downloads. The reducer itself stays synchronous.
pub enum Command {
    SendMessage(Message),
    CheckHealth,
    SendChatPrompt {
        run_id: u32,
        prompt: String,
    },
    RunAgentWorkflow {
        run_id: u32,
        task: String,
        agents: Vec<crate::models::WorkflowAgentSpec>,
    },
    RunManualFlow {
        run_id: u32,
        payload: ManualFlowRequest,
    },
    UpdateAgentModel {
        agent_id: String,
        model: String,
    },
    FetchModels,
    FetchFiles,
    LoadGeneratedFile {
        filename: String,
    },
    DeleteGeneratedFile {
        filename: String,
    },
    FetchExampleWorkflow,
    PollWorkflowStatus {
        workflow_id: String,
    },
    EmitFileEvent {
        kind: FileEventKind,
        filename: String,
        code: String,
    },
    DownloadSnapshot {
        filename: String,
        json: String,
    },
    SaveLocal,
    Alert(String),
    NoOp,
}

impl Command {
    pub fn send(msg: Message) -> Self {
        Command::SendMessage(msg)
    }

    pub fn none() -> Self {
        Command::NoOp
    }
}
