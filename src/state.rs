use std::cell::RefCell;
use std::collections::HashMap;
use wasm_bindgen::JsValue;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement};
use uuid::Uuid;

use crate::canvas::geometry::{self, Point};
use crate::canvas::renderer;
use crate::constants::*;
use crate::messages::{Command, Message};
use crate::models::{AgentBox, AgentKind, AgentMessage, ChatResult, Connection, PopupState, Side};
use crate::update::update;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Theme {
    Light,
    Dark,
}

/// What the user currently has selected on the canvas.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Selection {
    Box(String),
    Connection(String),
}

/// The interaction controller's state machine. Only one interactive mode
/// can be active at a time; transitions out of `Idle` are rejected while
/// another mode is running.
#[derive(Clone, Debug, PartialEq)]
pub enum Interaction {
    Idle,
    Dragging {
        box_id: String,
        grab_x: f64,
        grab_y: f64,
    },
    Resizing {
        box_id: String,
        start_width: f64,
        start_height: f64,
        start_mouse: Point,
    },
    Connecting {
        from_box: String,
        from_side: Side,
        cursor: Point,
    },
    Panning {
        last_x: f64,
        last_y: f64,
    },
    DraggingPopup {
        key: String,
        grab_x: f64,
        grab_y: f64,
    },
    ResizingPopup {
        key: String,
        start_width: f64,
        start_height: f64,
        start_mouse: Point,
    },
}

// Store global application state
pub struct AppState {
    pub boxes: HashMap<String, AgentBox>,
    // Insertion order doubles as z-order; last entry draws on top
    pub box_order: Vec<String>,
    pub connections: Vec<Connection>,

    // Append-only transcript for the current workflow run
    pub message_log: Vec<AgentMessage>,

    pub interaction: Interaction,
    pub selection: Option<Selection>,
    pub connect_mode: bool,
    // Popup overrides keyed by connection or box id; at most one is open
    pub popups: HashMap<String, PopupState>,
    pub open_popup: Option<String>,

    pub prompt_text: String,
    pub is_processing: bool,
    // Bumped on every submit and on abort; completions carrying a stale
    // generation are dropped
    pub run_generation: u32,
    // Set on abort so late push events from the dead pipeline are ignored
    pub suppress_events: bool,

    pub backend_connected: Option<bool>,
    pub ws_connected: bool,
    pub available_models: Vec<String>,
    pub generated_files: Vec<String>,
    pub active_workflow_id: Option<String>,
    pub workflow_status: Option<String>,
    pub last_result: Option<ChatResult>,

    // Canvas and rendering related
    pub canvas: Option<HtmlCanvasElement>,
    pub context: Option<CanvasRenderingContext2d>,
    pub canvas_width: f64,
    pub canvas_height: f64,
    pub viewport_x: f64,
    pub viewport_y: f64,
    pub zoom_level: f64,

    pub theme: Theme,
    pub state_modified: bool,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            boxes: HashMap::new(),
            box_order: Vec::new(),
            connections: Vec::new(),
            message_log: Vec::new(),
            interaction: Interaction::Idle,
            selection: None,
            connect_mode: false,
            popups: HashMap::new(),
            open_popup: None,
            prompt_text: String::new(),
            is_processing: false,
            run_generation: 0,
            suppress_events: false,
            backend_connected: None,
            ws_connected: false,
            available_models: Vec::new(),
            generated_files: Vec::new(),
            active_workflow_id: None,
            workflow_status: None,
            last_result: None,
            canvas: None,
            context: None,
            canvas_width: 800.0,
            canvas_height: 600.0,
            viewport_x: 0.0,
            viewport_y: 0.0,
            zoom_level: 1.0,
            theme: Theme::Light,
            state_modified: false,
        }
    }

    // -----------------------------------------------------------------
    // Box/connection model operations
    // -----------------------------------------------------------------

    /// Inserts a new box with default size at the given position. Always
    /// succeeds; returns the fresh id.
    pub fn create_box(&mut self, x: f64, y: f64, kind: AgentKind) -> String {
        let id = Uuid::new_v4().to_string();
        let role = kind.default_role().to_string();
        let bx = AgentBox {
            id: id.clone(),
            x,
            y,
            width: DEFAULT_BOX_WIDTH,
            height: DEFAULT_BOX_HEIGHT,
            kind,
            role,
            model: Some(DEFAULT_AGENT_MODEL.to_string()),
            description: None,
            pinned: false,
        };
        self.boxes.insert(id.clone(), bx);
        self.box_order.push(id.clone());
        self.state_modified = true;
        id
    }

    /// Merges fields into an existing box; unknown ids are a no-op.
    pub fn update_box<F>(&mut self, id: &str, apply: F)
    where
        F: FnOnce(&mut AgentBox),
    {
        if let Some(bx) = self.boxes.get_mut(id) {
            apply(bx);
            bx.width = f64::max(bx.width, MIN_BOX_WIDTH);
            bx.height = f64::max(bx.height, MIN_BOX_HEIGHT);
            self.state_modified = true;
        }
    }

    /// Removes a box and cascades deletion of every connection that
    /// references it, in the same operation.
    pub fn delete_box(&mut self, id: &str) {
        if self.boxes.remove(id).is_none() {
            return;
        }
        self.box_order.retain(|b| b != id);

        let removed: Vec<String> = self
            .connections
            .iter()
            .filter(|c| c.from_box == id || c.to_box == id)
            .map(|c| c.id.clone())
            .collect();
        self.connections
            .retain(|c| c.from_box != id && c.to_box != id);
        for conn_id in removed {
            self.popups.remove(&conn_id);
            if self.open_popup.as_deref() == Some(conn_id.as_str()) {
                self.open_popup = None;
            }
        }
        self.popups.remove(id);
        if self.open_popup.as_deref() == Some(id) {
            self.open_popup = None;
        }
        self.state_modified = true;
    }

    /// Appends a new edge. Fails silently (returns `None`) on self-loops
    /// and missing endpoints. Duplicate edges over the same 4-tuple are
    /// allowed on purpose.
    pub fn create_connection(
        &mut self,
        from_box: &str,
        from_side: Side,
        to_box: &str,
        to_side: Side,
    ) -> Option<String> {
        if from_box == to_box {
            return None;
        }
        if !self.boxes.contains_key(from_box) || !self.boxes.contains_key(to_box) {
            return None;
        }
        let id = Uuid::new_v4().to_string();
        self.connections.push(Connection {
            id: id.clone(),
            from_box: from_box.to_string(),
            from_side,
            to_box: to_box.to_string(),
            to_side,
            pinned: false,
        });
        self.state_modified = true;
        Some(id)
    }

    pub fn delete_connection(&mut self, id: &str) {
        let before = self.connections.len();
        self.connections.retain(|c| c.id != id);
        if self.connections.len() != before {
            self.popups.remove(id);
            if self.open_popup.as_deref() == Some(id) {
                self.open_popup = None;
            }
            self.state_modified = true;
        }
    }

    pub fn connection(&self, id: &str) -> Option<&Connection> {
        self.connections.iter().find(|c| c.id == id)
    }

    pub fn selected_box_id(&self) -> Option<&str> {
        match &self.selection {
            Some(Selection::Box(id)) => Some(id.as_str()),
            _ => None,
        }
    }

    pub fn selected_connection_id(&self) -> Option<&str> {
        match &self.selection {
            Some(Selection::Connection(id)) => Some(id.as_str()),
            _ => None,
        }
    }

    // -----------------------------------------------------------------
    // Coordinate transforms and hit testing
    // -----------------------------------------------------------------

    pub fn screen_to_world(&self, x: f64, y: f64) -> (f64, f64) {
        (
            x / self.zoom_level + self.viewport_x,
            y / self.zoom_level + self.viewport_y,
        )
    }

    pub fn world_to_screen(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x - self.viewport_x) * self.zoom_level,
            (y - self.viewport_y) * self.zoom_level,
        )
    }

    /// Topmost box containing the world point, with the grab offset from
    /// its corner.
    pub fn find_box_at(&self, x: f64, y: f64) -> Option<(String, f64, f64)> {
        for id in self.box_order.iter().rev() {
            if let Some(bx) = self.boxes.get(id) {
                if x >= bx.x && x <= bx.x + bx.width && y >= bx.y && y <= bx.y + bx.height {
                    return Some((id.clone(), x - bx.x, y - bx.y));
                }
            }
        }
        None
    }

    /// Resize grip test, checked before the drag region.
    pub fn find_resize_grip_at(&self, x: f64, y: f64) -> Option<String> {
        for id in self.box_order.iter().rev() {
            if let Some(bx) = self.boxes.get(id) {
                let gx = bx.x + bx.width - RESIZE_GRIP_SIZE;
                let gy = bx.y + bx.height - RESIZE_GRIP_SIZE;
                if x >= gx && x <= bx.x + bx.width && y >= gy && y <= bx.y + bx.height {
                    return Some(id.clone());
                }
            }
        }
        None
    }

    /// Connection handle under the pointer; only meaningful in connect mode.
    pub fn find_handle_at(&self, x: f64, y: f64) -> Option<(String, Side)> {
        let p = Point::new(x, y);
        for id in self.box_order.iter().rev() {
            if let Some(bx) = self.boxes.get(id) {
                for side in Side::ALL {
                    let anchor = geometry::anchor_point(bx, side);
                    if p.distance_to(anchor) <= HANDLE_RADIUS * 2.0 {
                        return Some((id.clone(), side));
                    }
                }
            }
        }
        None
    }

    /// Connection whose midpoint marker or path passes near the point.
    pub fn find_connection_at(&self, x: f64, y: f64) -> Option<String> {
        let p = Point::new(x, y);
        for conn in self.connections.iter().rev() {
            if let Some(spec) = renderer::connection_path(self, conn) {
                let mid = geometry::path_midpoint(&spec);
                if p.distance_to(mid) <= CONNECTION_MARKER_RADIUS + 2.0
                    || geometry::point_near_path(&spec, p, PATH_HIT_TOLERANCE)
                {
                    return Some(conn.id.clone());
                }
            }
        }
        None
    }

    /// Default screen position for a popup that has not been dragged yet:
    /// just right of the connection midpoint (or the box center).
    pub fn default_popup_position(&self, key: &str) -> (f64, f64) {
        if let Some(conn) = self.connection(key) {
            if let Some(spec) = renderer::connection_path(self, conn) {
                let mid = geometry::path_midpoint(&spec);
                let (sx, sy) = self.world_to_screen(mid.x, mid.y);
                return (sx + 20.0, sy + 20.0);
            }
        }
        if let Some(bx) = self.boxes.get(key) {
            let (sx, sy) = self.world_to_screen(bx.x + bx.width, bx.y);
            return (sx + 20.0, sy);
        }
        (80.0, 80.0)
    }

    pub fn draw_canvas(&self) {
        renderer::draw_canvas(self);
    }

    // New dispatch method to handle messages
    pub fn dispatch(&mut self, msg: Message) -> Vec<Command> {
        update(self, msg)
    }

    // Separate method to refresh UI after state changes
    pub fn refresh_ui_after_state_change() -> Result<(), JsValue> {
        let window = web_sys::window().ok_or(JsValue::from_str("No window"))?;
        let document = window.document().ok_or(JsValue::from_str("No document"))?;

        APP_STATE.with(|state| {
            let state = state.borrow();
            state.draw_canvas();
            crate::components::popup::render_popup(&document, &state)?;
            crate::components::control_panel::sync_controls(&document, &state)?;
            crate::network::ui_updates::render_status(&document, &state);
            Ok(())
        })
    }
}

// We use thread_local to store our app state
thread_local! {
    pub static APP_STATE: RefCell<AppState> = RefCell::new(AppState::new());
}

// Global helper for dispatching messages with command execution and a UI
// refresh once the mutable borrow is released.
pub fn dispatch_global_message(msg: Message) {
    let commands = APP_STATE.with(|state| {
        let mut state = state.borrow_mut();
        state.dispatch(msg)
    });

    for cmd in commands {
        crate::command_executors::execute(cmd);
    }

    if let Err(e) = AppState::refresh_ui_after_state_change() {
        web_sys::console::warn_1(&format!("Failed to refresh UI: {:?}", e).into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with_two_boxes() -> (AppState, String, String) {
        let mut state = AppState::new();
        let a = state.create_box(0.0, 0.0, AgentKind::Coordinator);
        let b = state.create_box(400.0, 0.0, AgentKind::Coder);
        (state, a, b)
    }

    #[test]
    fn test_create_box_defaults() {
        let mut state = AppState::new();
        let id = state.create_box(50.0, 60.0, AgentKind::Tester);
        let bx = state.boxes.get(&id).unwrap();
        assert_eq!(bx.width, DEFAULT_BOX_WIDTH);
        assert_eq!(bx.height, DEFAULT_BOX_HEIGHT);
        assert_eq!(bx.role, "Test Engineer");
        assert!(!bx.pinned);
        assert_eq!(state.box_order, vec![id]);
    }

    #[test]
    fn test_update_box_clamps_minimum_size() {
        let (mut state, a, _) = state_with_two_boxes();
        state.update_box(&a, |bx| {
            bx.width = 10.0;
            bx.height = 5.0;
        });
        let bx = state.boxes.get(&a).unwrap();
        assert_eq!(bx.width, MIN_BOX_WIDTH);
        assert_eq!(bx.height, MIN_BOX_HEIGHT);
    }

    #[test]
    fn test_update_unknown_box_is_noop() {
        let mut state = AppState::new();
        state.update_box("missing", |bx| bx.x = 999.0);
        assert!(!state.state_modified);
    }

    #[test]
    fn test_delete_box_cascades_connections() {
        let (mut state, a, b) = state_with_two_boxes();
        let c = state.create_box(800.0, 0.0, AgentKind::Tester);
        state
            .create_connection(&a, Side::Right, &b, Side::Left)
            .unwrap();
        state
            .create_connection(&b, Side::Right, &c, Side::Left)
            .unwrap();
        state
            .create_connection(&c, Side::Top, &a, Side::Bottom)
            .unwrap();

        state.delete_box(&b);

        assert_eq!(state.connections.len(), 1);
        assert!(state
            .connections
            .iter()
            .all(|conn| conn.from_box != b && conn.to_box != b));
    }

    #[test]
    fn test_self_loop_connection_rejected() {
        let (mut state, a, _) = state_with_two_boxes();
        let result = state.create_connection(&a, Side::Left, &a, Side::Right);
        assert!(result.is_none());
        assert!(state.connections.is_empty());
    }

    #[test]
    fn test_connection_to_missing_box_rejected() {
        let (mut state, a, _) = state_with_two_boxes();
        assert!(state
            .create_connection(&a, Side::Right, "ghost", Side::Left)
            .is_none());
        assert!(state
            .create_connection("ghost", Side::Right, &a, Side::Left)
            .is_none());
        assert!(state.connections.is_empty());
    }

    #[test]
    fn test_duplicate_connections_permitted() {
        let (mut state, a, b) = state_with_two_boxes();
        let first = state.create_connection(&a, Side::Right, &b, Side::Left);
        let second = state.create_connection(&a, Side::Right, &b, Side::Left);
        assert!(first.is_some());
        assert!(second.is_some());
        assert_eq!(state.connections.len(), 2);
    }

    #[test]
    fn test_delete_connection_noop_when_absent() {
        let (mut state, a, b) = state_with_two_boxes();
        state
            .create_connection(&a, Side::Right, &b, Side::Left)
            .unwrap();
        state.delete_connection("not-there");
        assert_eq!(state.connections.len(), 1);
    }

    #[test]
    fn test_screen_world_round_trip() {
        let mut state = AppState::new();
        state.zoom_level = 2.0;
        state.viewport_x = 100.0;
        state.viewport_y = -40.0;
        let (wx, wy) = state.screen_to_world(250.0, 30.0);
        let (sx, sy) = state.world_to_screen(wx, wy);
        assert!((sx - 250.0).abs() < 1e-9);
        assert!((sy - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_find_box_at_prefers_topmost() {
        let (mut state, _a, b) = state_with_two_boxes();
        // Move the second box over the first; it was inserted later so it
        // renders on top and should win the hit test.
        state.update_box(&b, |bx| {
            bx.x = 0.0;
            bx.y = 0.0;
        });
        let (hit, _, _) = state.find_box_at(10.0, 10.0).unwrap();
        assert_eq!(hit, b);
    }

    #[test]
    fn test_find_handle_at_anchor() {
        let (state, a, _) = state_with_two_boxes();
        let bx = state.boxes.get(&a).unwrap();
        let anchor = geometry::anchor_point(bx, Side::Right);
        let found = state.find_handle_at(anchor.x + 3.0, anchor.y - 3.0);
        assert_eq!(found, Some((a, Side::Right)));
    }
}
