use crate::canvas::geometry::{self, Point};
use crate::constants::*;
use crate::messages::{Command, FileEventKind, Message};
use crate::models::{AgentMessage, CanvasSnapshot, ManualFlowRequest};
use crate::state::{AppState, Interaction, Selection};

/// Applies one message to the state and returns the side effects to run.
/// All interaction-state-machine legality checks live here: a new
/// interactive mode starts only from `Idle`, and stale pointer events are
/// dropped instead of raising.
pub fn update(state: &mut AppState, msg: Message) -> Vec<Command> {
    match msg {
        // -------------------------------------------------------------
        // Box/connection model
        // -------------------------------------------------------------
        Message::AddBoxAt { x, y, kind } => {
            let id = state.create_box(x, y, kind);
            state.selection = Some(Selection::Box(id));
            vec![]
        }

        Message::UpdateBoxRole { box_id, role } => {
            state.update_box(&box_id, |bx| bx.role = role);
            vec![]
        }

        Message::UpdateBoxModel { box_id, model } => {
            state.update_box(&box_id, |bx| bx.model = Some(model.clone()));
            // Keep the backend's per-agent model assignment in sync
            vec![Command::UpdateAgentModel {
                agent_id: box_id,
                model,
            }]
        }

        Message::UpdateBoxDescription {
            box_id,
            description,
        } => {
            state.update_box(&box_id, |bx| {
                bx.description = if description.is_empty() {
                    None
                } else {
                    Some(description)
                }
            });
            vec![]
        }

        Message::ToggleBoxPin(box_id) => {
            state.update_box(&box_id, |bx| bx.pinned = !bx.pinned);
            vec![]
        }

        Message::ToggleConnectionPin(conn_id) => {
            if let Some(conn) = state.connections.iter_mut().find(|c| c.id == conn_id) {
                conn.pinned = !conn.pinned;
                state.state_modified = true;
            }
            vec![]
        }

        Message::DeleteSelection => {
            match state.selection.take() {
                Some(Selection::Box(id)) => state.delete_box(&id),
                Some(Selection::Connection(id)) => state.delete_connection(&id),
                None => {}
            }
            vec![]
        }

        Message::ClearCanvas => {
            state.boxes.clear();
            state.box_order.clear();
            state.connections.clear();
            state.popups.clear();
            state.open_popup = None;
            state.selection = None;
            state.interaction = Interaction::Idle;
            state.state_modified = true;
            vec![]
        }

        // -------------------------------------------------------------
        // Selection / popup
        // -------------------------------------------------------------
        Message::SelectBox(id) => {
            if state.boxes.contains_key(&id) {
                state.selection = Some(Selection::Box(id.clone()));
                state.popups.entry(id.clone()).or_default();
                state.open_popup = Some(id);
            }
            vec![]
        }

        Message::SelectConnection(id) => {
            if state.connection(&id).is_some() {
                state.selection = Some(Selection::Connection(id.clone()));
                state.popups.entry(id.clone()).or_default();
                state.open_popup = Some(id);
            }
            vec![]
        }

        Message::ClearSelection => {
            state.selection = None;
            close_popup_unless_pinned(state);
            vec![]
        }

        // -------------------------------------------------------------
        // Interaction state machine
        // -------------------------------------------------------------
        Message::StartBoxDrag {
            box_id,
            grab_x,
            grab_y,
        } => {
            if state.interaction != Interaction::Idle {
                return vec![];
            }
            match state.boxes.get(&box_id) {
                Some(bx) if !bx.pinned => {
                    state.selection = Some(Selection::Box(box_id.clone()));
                    state.interaction = Interaction::Dragging {
                        box_id,
                        grab_x,
                        grab_y,
                    };
                }
                _ => {}
            }
            vec![]
        }

        Message::StartBoxResize {
            box_id,
            mouse_x,
            mouse_y,
        } => {
            if state.interaction != Interaction::Idle {
                return vec![];
            }
            if let Some(bx) = state.boxes.get(&box_id) {
                state.interaction = Interaction::Resizing {
                    box_id,
                    start_width: bx.width,
                    start_height: bx.height,
                    start_mouse: Point::new(mouse_x, mouse_y),
                };
            }
            vec![]
        }

        Message::StartConnecting { box_id, side } => {
            if state.interaction != Interaction::Idle || !state.connect_mode {
                return vec![];
            }
            if let Some(bx) = state.boxes.get(&box_id) {
                let anchor = geometry::anchor_point(bx, side);
                state.interaction = Interaction::Connecting {
                    from_box: box_id,
                    from_side: side,
                    cursor: anchor,
                };
            }
            vec![]
        }

        Message::StartPan { screen_x, screen_y } => {
            if state.interaction != Interaction::Idle {
                return vec![];
            }
            state.interaction = Interaction::Panning {
                last_x: screen_x,
                last_y: screen_y,
            };
            vec![]
        }

        Message::StartPopupDrag {
            key,
            grab_x,
            grab_y,
        } => {
            if state.interaction != Interaction::Idle {
                return vec![];
            }
            // Materialize the default anchor so dragging has a base
            let (dx, dy) = state.default_popup_position(&key);
            if let Some(popup) = state.popups.get_mut(&key) {
                if popup.x.is_none() {
                    popup.x = Some(dx);
                    popup.y = Some(dy);
                }
                state.interaction = Interaction::DraggingPopup {
                    key,
                    grab_x,
                    grab_y,
                };
            }
            vec![]
        }

        Message::StartPopupResize {
            key,
            mouse_x,
            mouse_y,
        } => {
            if state.interaction != Interaction::Idle {
                return vec![];
            }
            if let Some(popup) = state.popups.get(&key) {
                state.interaction = Interaction::ResizingPopup {
                    key,
                    start_width: popup.width,
                    start_height: popup.height,
                    start_mouse: Point::new(mouse_x, mouse_y),
                };
            }
            vec![]
        }

        Message::PointerMoved {
            world_x,
            world_y,
            screen_x,
            screen_y,
        } => {
            pointer_moved(state, world_x, world_y, screen_x, screen_y);
            vec![]
        }

        Message::PointerReleased { world_x, world_y } => {
            pointer_released(state, world_x, world_y);
            vec![]
        }

        Message::EscapePressed => {
            if state.interaction != Interaction::Idle {
                // Discard whatever operation is in flight
                state.interaction = Interaction::Idle;
            } else {
                state.selection = None;
                close_popup_unless_pinned(state);
            }
            vec![]
        }

        // -------------------------------------------------------------
        // View controls
        // -------------------------------------------------------------
        Message::ToggleConnectMode => {
            state.connect_mode = !state.connect_mode;
            if !state.connect_mode {
                if let Interaction::Connecting { .. } = state.interaction {
                    state.interaction = Interaction::Idle;
                }
            }
            vec![]
        }

        Message::ToggleTheme => {
            state.theme = match state.theme {
                crate::state::Theme::Light => crate::state::Theme::Dark,
                crate::state::Theme::Dark => crate::state::Theme::Light,
            };
            vec![]
        }

        Message::ZoomCanvas {
            new_zoom,
            viewport_x,
            viewport_y,
        } => {
            state.zoom_level = new_zoom.clamp(MIN_ZOOM, MAX_ZOOM);
            state.viewport_x = viewport_x;
            state.viewport_y = viewport_y;
            state.state_modified = true;
            vec![]
        }

        // -------------------------------------------------------------
        // Prompt / workflow run
        // -------------------------------------------------------------
        Message::UpdatePromptText(text) => {
            state.prompt_text = text;
            state.state_modified = true;
            vec![]
        }

        Message::SubmitPrompt => submit_prompt(state),

        Message::AbortRun => {
            if state.is_processing {
                state.run_generation = state.run_generation.wrapping_add(1);
                state.is_processing = false;
                state.suppress_events = true;
                state.workflow_status = Some("aborted".to_string());
            }
            vec![]
        }

        Message::RunCompleted { run_id, result } => {
            if run_id != state.run_generation {
                // Stale completion from an aborted or superseded run
                return vec![];
            }
            state.is_processing = false;
            state.workflow_status = Some(if result.success {
                "complete".to_string()
            } else {
                "failed".to_string()
            });
            let mut commands = vec![Command::FetchFiles];
            if let Some(code) = &result.code {
                commands.push(Command::EmitFileEvent {
                    kind: FileEventKind::Generate,
                    filename: "generated_code.py".to_string(),
                    code: code.clone(),
                });
            }
            state.last_result = Some(result);
            commands
        }

        Message::RunFailed { run_id, error } => {
            if run_id != state.run_generation {
                return vec![];
            }
            state.is_processing = false;
            state.workflow_status = Some(format!("failed: {}", error));
            vec![]
        }

        Message::FlowMessagesReceived { run_id, messages } => {
            if run_id != state.run_generation {
                return vec![];
            }
            state.message_log.extend(messages);
            vec![]
        }

        Message::ClearMessages => {
            state.message_log.clear();
            vec![]
        }

        // -------------------------------------------------------------
        // Connectivity status
        // -------------------------------------------------------------
        Message::HealthChecked(ok) => {
            // Overlapping checks are fine; last writer wins
            state.backend_connected = Some(ok);
            vec![]
        }

        Message::WsConnected => {
            state.ws_connected = true;
            vec![]
        }

        Message::WsDisconnected => {
            state.ws_connected = false;
            vec![]
        }

        // -------------------------------------------------------------
        // Backend push events
        // -------------------------------------------------------------
        Message::ReceiveAgentMessage(message) => {
            if !state.suppress_events {
                state.message_log.push(message);
            }
            vec![]
        }

        Message::ReceiveWorkflowStatus {
            workflow_id,
            status,
        } => {
            if state.suppress_events {
                return vec![];
            }
            if workflow_id.is_some() {
                state.active_workflow_id = workflow_id;
            }
            apply_workflow_status(state, status);
            vec![]
        }

        Message::WorkflowStatusPolled { status } => {
            if !state.suppress_events {
                apply_workflow_status(state, status);
            }
            vec![]
        }

        Message::ReceiveTestResponse {
            passed,
            output,
            timestamp_ms,
        } => {
            if state.suppress_events {
                return vec![];
            }
            let verdict = match passed {
                Some(true) => "tests passed",
                Some(false) => "tests failed",
                None => "test run",
            };
            state.message_log.push(AgentMessage {
                id: format!("test-{}", timestamp_ms),
                from_agent: "runner".to_string(),
                to_agent: "user".to_string(),
                content: format!("{}\n{}", verdict, output),
                timestamp_ms,
            });
            vec![]
        }

        // -------------------------------------------------------------
        // Catalog data
        // -------------------------------------------------------------
        Message::ModelsFetched(models) => {
            state.available_models = models;
            vec![]
        }

        Message::FilesFetched(files) => {
            state.generated_files = files;
            vec![]
        }

        Message::RequestLoadFile(filename) => vec![Command::LoadGeneratedFile { filename }],

        Message::RequestDeleteFile(filename) => vec![Command::DeleteGeneratedFile { filename }],

        Message::GeneratedFileLoaded { filename, code } => vec![Command::EmitFileEvent {
            kind: FileEventKind::Select,
            filename,
            code,
        }],

        Message::FileDeleted(filename) => {
            state.generated_files.retain(|f| f != &filename);
            vec![]
        }

        Message::LoadExampleWorkflow => vec![Command::FetchExampleWorkflow],

        Message::ExampleWorkflowLoaded(agents) => {
            load_example_workflow(state, agents);
            vec![]
        }

        // -------------------------------------------------------------
        // Persistence
        // -------------------------------------------------------------
        Message::ExportCanvas => match serde_json::to_string_pretty(&crate::storage::snapshot_of(state)) {
            Ok(json) => vec![Command::DownloadSnapshot {
                filename: "agent-canvas.json".to_string(),
                json,
            }],
            Err(e) => vec![Command::Alert(format!("Could not export canvas: {}", e))],
        },

        Message::ImportCanvas(json) => import_canvas(state, &json),
    }
}

fn close_popup_unless_pinned(state: &mut AppState) {
    let keep = state
        .open_popup
        .as_ref()
        .and_then(|key| state.connection(key))
        .map(|conn| conn.pinned)
        .unwrap_or(false);
    if !keep {
        state.open_popup = None;
    }
}

fn apply_workflow_status(state: &mut AppState, status: String) {
    let terminal = matches!(
        status.as_str(),
        "complete" | "completed" | "failed" | "error"
    );
    state.workflow_status = Some(status);
    if terminal {
        state.is_processing = false;
    }
}

fn pointer_moved(state: &mut AppState, world_x: f64, world_y: f64, screen_x: f64, screen_y: f64) {
    match state.interaction.clone() {
        Interaction::Dragging {
            box_id,
            grab_x,
            grab_y,
        } => {
            // A box removed mid-drag simply stops responding; mouse-up
            // still returns the controller to Idle
            state.update_box(&box_id, |bx| {
                bx.x = world_x - grab_x;
                bx.y = world_y - grab_y;
            });
        }

        Interaction::Resizing {
            box_id,
            start_width,
            start_height,
            start_mouse,
        } => {
            state.update_box(&box_id, |bx| {
                bx.width = start_width + (world_x - start_mouse.x);
                bx.height = start_height + (world_y - start_mouse.y);
            });
        }

        Interaction::Connecting {
            from_box,
            from_side,
            ..
        } => {
            state.interaction = Interaction::Connecting {
                from_box,
                from_side,
                cursor: Point::new(world_x, world_y),
            };
        }

        Interaction::Panning { last_x, last_y } => {
            state.viewport_x -= (screen_x - last_x) / state.zoom_level;
            state.viewport_y -= (screen_y - last_y) / state.zoom_level;
            state.interaction = Interaction::Panning {
                last_x: screen_x,
                last_y: screen_y,
            };
            state.state_modified = true;
        }

        Interaction::DraggingPopup {
            key,
            grab_x,
            grab_y,
        } => {
            if let Some(popup) = state.popups.get_mut(&key) {
                popup.x = Some(f64::max(0.0, screen_x - grab_x));
                popup.y = Some(f64::max(0.0, screen_y - grab_y));
            }
        }

        Interaction::ResizingPopup {
            key,
            start_width,
            start_height,
            start_mouse,
        } => {
            if let Some(popup) = state.popups.get_mut(&key) {
                popup.width = f64::max(MIN_POPUP_WIDTH, start_width + (screen_x - start_mouse.x));
                popup.height =
                    f64::max(MIN_POPUP_HEIGHT, start_height + (screen_y - start_mouse.y));
            }
        }

        Interaction::Idle => {}
    }
}

fn pointer_released(state: &mut AppState, world_x: f64, world_y: f64) {
    if let Interaction::Connecting {
        from_box,
        from_side,
        ..
    } = state.interaction.clone()
    {
        // Commit only when released over a handle on a different box;
        // create_connection re-checks endpoints and self-loops
        if let Some((to_box, to_side)) = state.find_handle_at(world_x, world_y) {
            let _ = state.create_connection(&from_box, from_side, &to_box, to_side);
        }
    }
    state.interaction = Interaction::Idle;
}

fn submit_prompt(state: &mut AppState) -> Vec<Command> {
    if state.prompt_text.trim().is_empty() {
        return vec![Command::Alert(
            "Please enter a prompt before running the workflow.".to_string(),
        )];
    }
    if state.boxes.is_empty() {
        return vec![Command::Alert(
            "Add at least one agent box to the canvas first.".to_string(),
        )];
    }
    if state.is_processing {
        return vec![Command::Alert("A workflow is already running.".to_string())];
    }

    state.is_processing = true;
    state.suppress_events = false;
    state.run_generation = state.run_generation.wrapping_add(1);
    state.message_log.clear();
    state.last_result = None;
    state.active_workflow_id = None;
    state.workflow_status = Some("running".to_string());

    let run_id = state.run_generation;
    let prompt = state.prompt_text.clone();

    if state.connections.is_empty() {
        // No wiring on the canvas: run the default pipeline. /chat ignores
        // per-agent models, so customized boxes go through /run-workflow
        let customized = state
            .boxes
            .values()
            .any(|bx| bx.model.as_deref().unwrap_or(DEFAULT_AGENT_MODEL) != DEFAULT_AGENT_MODEL);
        if customized {
            let agents = state
                .box_order
                .iter()
                .filter_map(|id| state.boxes.get(id))
                .map(|bx| bx.to_workflow_agent())
                .collect();
            vec![Command::RunAgentWorkflow {
                run_id,
                task: prompt,
                agents,
            }]
        } else {
            vec![Command::SendChatPrompt { run_id, prompt }]
        }
    } else {
        let boxes = state
            .box_order
            .iter()
            .filter_map(|id| state.boxes.get(id))
            .map(|bx| bx.to_flow_payload())
            .collect();
        let connections = state
            .connections
            .iter()
            .map(|c| c.to_flow_payload())
            .collect();
        vec![Command::RunManualFlow {
            run_id,
            payload: ManualFlowRequest {
                prompt,
                boxes,
                connections,
            },
        }]
    }
}

fn load_example_workflow(state: &mut AppState, agents: Vec<crate::models::ExampleAgent>) {
    state.boxes.clear();
    state.box_order.clear();
    state.connections.clear();
    state.popups.clear();
    state.open_popup = None;
    state.selection = None;

    let mut previous: Option<String> = None;
    for (i, agent) in agents.into_iter().enumerate() {
        let x = 80.0 + i as f64 * (DEFAULT_BOX_WIDTH + 80.0);
        let id = state.create_box(x, 120.0, agent.kind);
        state.update_box(&id, |bx| bx.role = agent.role.clone());
        if let Some(prev) = previous {
            let _ = state.create_connection(
                &prev,
                crate::models::Side::Right,
                &id,
                crate::models::Side::Left,
            );
        }
        previous = Some(id);
    }
    state.state_modified = true;
}

/// Parses and validates the whole document before touching state; a
/// malformed file leaves the previous canvas exactly as it was.
fn import_canvas(state: &mut AppState, json: &str) -> Vec<Command> {
    let snapshot: CanvasSnapshot = match serde_json::from_str(json) {
        Ok(s) => s,
        Err(e) => {
            return vec![Command::Alert(format!("Could not import canvas: {}", e))];
        }
    };

    if let Err(e) = crate::storage::validate_snapshot(&snapshot) {
        return vec![Command::Alert(format!("Could not import canvas: {}", e))];
    }

    crate::storage::apply_snapshot(state, snapshot);
    vec![Command::SaveLocal]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AgentKind, ChatResult, Side};

    fn dispatch(state: &mut AppState, msg: Message) -> Vec<Command> {
        update(state, msg)
    }

    fn new_state_with_boxes(n: usize) -> (AppState, Vec<String>) {
        let mut state = AppState::new();
        let ids = (0..n)
            .map(|i| state.create_box(i as f64 * 400.0, 100.0, AgentKind::Coder))
            .collect();
        (state, ids)
    }

    fn has_alert(commands: &[Command]) -> bool {
        commands.iter().any(|c| matches!(c, Command::Alert(_)))
    }

    fn has_network_command(commands: &[Command]) -> bool {
        commands.iter().any(|c| {
            matches!(
                c,
                Command::SendChatPrompt { .. }
                    | Command::RunAgentWorkflow { .. }
                    | Command::RunManualFlow { .. }
                    | Command::CheckHealth
            )
        })
    }

    #[test]
    fn test_drag_lifecycle() {
        let (mut state, ids) = new_state_with_boxes(1);
        dispatch(
            &mut state,
            Message::StartBoxDrag {
                box_id: ids[0].clone(),
                grab_x: 10.0,
                grab_y: 10.0,
            },
        );
        assert!(matches!(state.interaction, Interaction::Dragging { .. }));

        dispatch(
            &mut state,
            Message::PointerMoved {
                world_x: 300.0,
                world_y: 200.0,
                screen_x: 300.0,
                screen_y: 200.0,
            },
        );
        let bx = state.boxes.get(&ids[0]).unwrap();
        assert_eq!(bx.x, 290.0);
        assert_eq!(bx.y, 190.0);

        dispatch(
            &mut state,
            Message::PointerReleased {
                world_x: 300.0,
                world_y: 200.0,
            },
        );
        assert_eq!(state.interaction, Interaction::Idle);
    }

    #[test]
    fn test_pinned_box_refuses_drag() {
        let (mut state, ids) = new_state_with_boxes(1);
        state.update_box(&ids[0], |bx| bx.pinned = true);
        dispatch(
            &mut state,
            Message::StartBoxDrag {
                box_id: ids[0].clone(),
                grab_x: 0.0,
                grab_y: 0.0,
            },
        );
        assert_eq!(state.interaction, Interaction::Idle);
    }

    #[test]
    fn test_mutual_exclusion_between_modes() {
        let (mut state, ids) = new_state_with_boxes(2);
        dispatch(
            &mut state,
            Message::StartBoxDrag {
                box_id: ids[0].clone(),
                grab_x: 0.0,
                grab_y: 0.0,
            },
        );
        // A resize attempt while dragging must be ignored
        dispatch(
            &mut state,
            Message::StartBoxResize {
                box_id: ids[1].clone(),
                mouse_x: 0.0,
                mouse_y: 0.0,
            },
        );
        assert!(matches!(state.interaction, Interaction::Dragging { .. }));
    }

    #[test]
    fn test_resize_clamps_to_minimum() {
        let (mut state, ids) = new_state_with_boxes(1);
        dispatch(
            &mut state,
            Message::StartBoxResize {
                box_id: ids[0].clone(),
                mouse_x: 200.0,
                mouse_y: 200.0,
            },
        );
        dispatch(
            &mut state,
            Message::PointerMoved {
                world_x: -500.0,
                world_y: -500.0,
                screen_x: -500.0,
                screen_y: -500.0,
            },
        );
        let bx = state.boxes.get(&ids[0]).unwrap();
        assert_eq!(bx.width, MIN_BOX_WIDTH);
        assert_eq!(bx.height, MIN_BOX_HEIGHT);
    }

    #[test]
    fn test_connect_commit_between_two_boxes() {
        let (mut state, ids) = new_state_with_boxes(2);
        state.connect_mode = true;
        dispatch(
            &mut state,
            Message::StartConnecting {
                box_id: ids[0].clone(),
                side: Side::Right,
            },
        );
        assert!(matches!(state.interaction, Interaction::Connecting { .. }));

        // Release over the left handle of the second box
        let target = state.boxes.get(&ids[1]).unwrap();
        let anchor = geometry::anchor_point(target, Side::Left);
        dispatch(
            &mut state,
            Message::PointerReleased {
                world_x: anchor.x,
                world_y: anchor.y,
            },
        );

        assert_eq!(state.interaction, Interaction::Idle);
        assert_eq!(state.connections.len(), 1);
        assert_eq!(state.connections[0].from_box, ids[0]);
        assert_eq!(state.connections[0].to_box, ids[1]);
    }

    #[test]
    fn test_connect_discarded_on_empty_release_and_escape() {
        let (mut state, ids) = new_state_with_boxes(2);
        state.connect_mode = true;
        dispatch(
            &mut state,
            Message::StartConnecting {
                box_id: ids[0].clone(),
                side: Side::Right,
            },
        );
        dispatch(
            &mut state,
            Message::PointerReleased {
                world_x: 9999.0,
                world_y: 9999.0,
            },
        );
        assert!(state.connections.is_empty());

        dispatch(
            &mut state,
            Message::StartConnecting {
                box_id: ids[0].clone(),
                side: Side::Right,
            },
        );
        dispatch(&mut state, Message::EscapePressed);
        assert_eq!(state.interaction, Interaction::Idle);
        assert!(state.connections.is_empty());
    }

    #[test]
    fn test_connect_release_on_own_box_creates_nothing() {
        let (mut state, ids) = new_state_with_boxes(1);
        state.connect_mode = true;
        dispatch(
            &mut state,
            Message::StartConnecting {
                box_id: ids[0].clone(),
                side: Side::Right,
            },
        );
        let own = state.boxes.get(&ids[0]).unwrap();
        let anchor = geometry::anchor_point(own, Side::Left);
        dispatch(
            &mut state,
            Message::PointerReleased {
                world_x: anchor.x,
                world_y: anchor.y,
            },
        );
        assert!(state.connections.is_empty());
    }

    #[test]
    fn test_box_removed_mid_drag_is_tolerated() {
        let (mut state, ids) = new_state_with_boxes(1);
        dispatch(
            &mut state,
            Message::StartBoxDrag {
                box_id: ids[0].clone(),
                grab_x: 0.0,
                grab_y: 0.0,
            },
        );
        state.delete_box(&ids[0]);
        // Further moves are silent no-ops; release returns to Idle
        dispatch(
            &mut state,
            Message::PointerMoved {
                world_x: 100.0,
                world_y: 100.0,
                screen_x: 100.0,
                screen_y: 100.0,
            },
        );
        dispatch(
            &mut state,
            Message::PointerReleased {
                world_x: 100.0,
                world_y: 100.0,
            },
        );
        assert_eq!(state.interaction, Interaction::Idle);
    }

    #[test]
    fn test_select_connection_opens_single_popup() {
        let (mut state, ids) = new_state_with_boxes(2);
        let conn = state
            .create_connection(&ids[0], Side::Right, &ids[1], Side::Left)
            .unwrap();
        dispatch(&mut state, Message::SelectConnection(conn.clone()));
        assert_eq!(state.open_popup.as_deref(), Some(conn.as_str()));

        dispatch(&mut state, Message::SelectBox(ids[0].clone()));
        assert_eq!(state.open_popup.as_deref(), Some(ids[0].as_str()));

        dispatch(&mut state, Message::ClearSelection);
        assert!(state.open_popup.is_none());
    }

    #[test]
    fn test_delete_key_removes_selected_connection() {
        let (mut state, ids) = new_state_with_boxes(2);
        let conn = state
            .create_connection(&ids[0], Side::Right, &ids[1], Side::Left)
            .unwrap();
        dispatch(&mut state, Message::SelectConnection(conn));
        dispatch(&mut state, Message::DeleteSelection);
        assert!(state.connections.is_empty());
        assert!(state.selection.is_none());
    }

    #[test]
    fn test_submit_with_empty_prompt_blocks() {
        let (mut state, _) = new_state_with_boxes(1);
        state.prompt_text = "   ".to_string();
        let commands = dispatch(&mut state, Message::SubmitPrompt);
        assert!(has_alert(&commands));
        assert!(!has_network_command(&commands));
        assert!(!state.is_processing);
    }

    #[test]
    fn test_submit_with_zero_boxes_blocks() {
        let mut state = AppState::new();
        state.prompt_text = "build a parser".to_string();
        let commands = dispatch(&mut state, Message::SubmitPrompt);
        assert!(has_alert(&commands));
        assert!(!has_network_command(&commands));
        assert!(!state.is_processing);
    }

    #[test]
    fn test_submit_without_connections_uses_chat() {
        let (mut state, _) = new_state_with_boxes(2);
        state.prompt_text = "add two numbers".to_string();
        let commands = dispatch(&mut state, Message::SubmitPrompt);
        assert!(state.is_processing);
        assert!(commands
            .iter()
            .any(|c| matches!(c, Command::SendChatPrompt { .. })));
    }

    #[test]
    fn test_submit_with_custom_model_uses_run_workflow() {
        let (mut state, ids) = new_state_with_boxes(2);
        state.update_box(&ids[1], |bx| bx.model = Some("codellama".to_string()));
        state.prompt_text = "add two numbers".to_string();
        let commands = dispatch(&mut state, Message::SubmitPrompt);
        match commands.first() {
            Some(Command::RunAgentWorkflow { task, agents, .. }) => {
                assert_eq!(task, "add two numbers");
                assert_eq!(agents.len(), 2);
                assert_eq!(agents[1].model, "codellama");
            }
            _ => panic!("expected RunAgentWorkflow command"),
        }
    }

    #[test]
    fn test_submit_with_connections_uses_manual_flow() {
        let (mut state, ids) = new_state_with_boxes(2);
        state
            .create_connection(&ids[0], Side::Right, &ids[1], Side::Left)
            .unwrap();
        state.prompt_text = "add two numbers".to_string();
        let commands = dispatch(&mut state, Message::SubmitPrompt);
        match commands.first() {
            Some(Command::RunManualFlow { payload, .. }) => {
                assert_eq!(payload.boxes.len(), 2);
                assert_eq!(payload.connections.len(), 1);
                assert_eq!(payload.prompt, "add two numbers");
            }
            _ => panic!("expected RunManualFlow command"),
        }
    }

    #[test]
    fn test_second_submit_blocked_while_processing() {
        let (mut state, _) = new_state_with_boxes(1);
        state.prompt_text = "task".to_string();
        dispatch(&mut state, Message::SubmitPrompt);
        let commands = dispatch(&mut state, Message::SubmitPrompt);
        assert!(has_alert(&commands));
        assert!(!has_network_command(&commands));
    }

    fn sample_result(success: bool) -> ChatResult {
        ChatResult {
            kind: "coding".to_string(),
            message: "done".to_string(),
            code: Some("def f():\n    pass".to_string()),
            tests: None,
            test_results: None,
            tests_passed: Some(success),
            success,
        }
    }

    #[test]
    fn test_abort_suppresses_stale_completion_and_events() {
        let (mut state, _) = new_state_with_boxes(1);
        state.prompt_text = "task".to_string();
        dispatch(&mut state, Message::SubmitPrompt);
        let run_id = state.run_generation;

        dispatch(&mut state, Message::AbortRun);
        assert!(!state.is_processing);

        dispatch(
            &mut state,
            Message::RunCompleted {
                run_id,
                result: sample_result(true),
            },
        );
        assert!(state.last_result.is_none());
        assert_eq!(state.workflow_status.as_deref(), Some("aborted"));

        dispatch(
            &mut state,
            Message::ReceiveAgentMessage(AgentMessage {
                id: "m1".to_string(),
                from_agent: "coder".to_string(),
                to_agent: "tester".to_string(),
                content: "late".to_string(),
                timestamp_ms: 1.0,
            }),
        );
        assert!(state.message_log.is_empty());
    }

    #[test]
    fn test_current_run_completion_applies() {
        let (mut state, _) = new_state_with_boxes(1);
        state.prompt_text = "task".to_string();
        dispatch(&mut state, Message::SubmitPrompt);
        let run_id = state.run_generation;
        dispatch(
            &mut state,
            Message::RunCompleted {
                run_id,
                result: sample_result(true),
            },
        );
        assert!(!state.is_processing);
        assert_eq!(state.workflow_status.as_deref(), Some("complete"));
        assert!(state.last_result.is_some());
    }

    #[test]
    fn test_health_check_failure_marks_disconnected() {
        let mut state = AppState::new();
        dispatch(&mut state, Message::HealthChecked(false));
        assert_eq!(state.backend_connected, Some(false));
        dispatch(&mut state, Message::HealthChecked(true));
        assert_eq!(state.backend_connected, Some(true));
    }

    #[test]
    fn test_zoom_is_clamped() {
        let mut state = AppState::new();
        dispatch(
            &mut state,
            Message::ZoomCanvas {
                new_zoom: 99.0,
                viewport_x: 0.0,
                viewport_y: 0.0,
            },
        );
        assert_eq!(state.zoom_level, MAX_ZOOM);
        dispatch(
            &mut state,
            Message::ZoomCanvas {
                new_zoom: 0.0001,
                viewport_x: 0.0,
                viewport_y: 0.0,
            },
        );
        assert_eq!(state.zoom_level, MIN_ZOOM);
    }

    #[test]
    fn test_export_clear_import_round_trip() {
        let (mut state, ids) = new_state_with_boxes(2);
        state
            .create_connection(&ids[0], Side::Right, &ids[1], Side::Left)
            .unwrap();
        state.prompt_text = "round trip".to_string();
        state.update_box(&ids[0], |bx| bx.pinned = true);

        let boxes_before = state.boxes.clone();
        let connections_before = state.connections.clone();

        let commands = dispatch(&mut state, Message::ExportCanvas);
        let json = match commands.first() {
            Some(Command::DownloadSnapshot { json, .. }) => json.clone(),
            _ => panic!("expected DownloadSnapshot command"),
        };

        dispatch(&mut state, Message::ClearCanvas);
        assert!(state.boxes.is_empty());

        dispatch(&mut state, Message::ImportCanvas(json));
        assert_eq!(state.boxes, boxes_before);
        assert_eq!(state.connections, connections_before);
        assert_eq!(state.prompt_text, "round trip");
    }

    #[test]
    fn test_malformed_import_leaves_state_untouched() {
        let (mut state, ids) = new_state_with_boxes(1);
        let boxes_before = state.boxes.clone();

        let commands = dispatch(&mut state, Message::ImportCanvas("{not json".to_string()));
        assert!(has_alert(&commands));
        assert_eq!(state.boxes, boxes_before);

        // Structurally valid JSON with a dangling connection is also rejected
        let bad = format!(
            r#"{{"version":1,"boxes":[],"connections":[{{"id":"c","from_box":"{}","from_side":"right","to_box":"ghost","to_side":"left"}}],"prompt":"","viewport_x":0.0,"viewport_y":0.0,"zoom":1.0}}"#,
            ids[0]
        );
        let commands = dispatch(&mut state, Message::ImportCanvas(bad));
        assert!(has_alert(&commands));
        assert_eq!(state.boxes, boxes_before);
    }

    #[test]
    fn test_message_grouping_pipeline_from_push_events() {
        let mut state = AppState::new();
        for (i, ts) in [0.0, 1000.0, 7000.0, 7500.0].iter().enumerate() {
            dispatch(
                &mut state,
                Message::ReceiveAgentMessage(AgentMessage {
                    id: format!("m{}", i),
                    from_agent: "coordinator".to_string(),
                    to_agent: "coder".to_string(),
                    content: format!("step {}", i),
                    timestamp_ms: *ts,
                }),
            );
        }
        let groups = crate::overlay::group_messages(&state.message_log, 5000.0);
        assert_eq!(groups.len(), 2);
    }
}
