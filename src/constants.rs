// Default values and tuning knobs - these are the single source of truth for defaults
pub const DEFAULT_BOX_WIDTH: f64 = 200.0;
pub const DEFAULT_BOX_HEIGHT: f64 = 100.0;

// Boxes smaller than this stop being usable drag/drop targets
pub const MIN_BOX_WIDTH: f64 = 120.0;
pub const MIN_BOX_HEIGHT: f64 = 60.0;

// Side length of the square resize grip in the bottom-right corner
pub const RESIZE_GRIP_SIZE: f64 = 14.0;
// Radius of the connection handles drawn on each side midpoint
pub const HANDLE_RADIUS: f64 = 6.0;
// Radius of the clickable marker at a connection's midpoint
pub const CONNECTION_MARKER_RADIUS: f64 = 8.0;
// Distance within which a click counts as hitting a connection path
pub const PATH_HIT_TOLERANCE: f64 = 6.0;

pub const MIN_ZOOM: f64 = 0.1;
pub const MAX_ZOOM: f64 = 5.0;

// Transcript popup defaults; the user can drag/resize past these
pub const DEFAULT_POPUP_WIDTH: f64 = 340.0;
pub const DEFAULT_POPUP_HEIGHT: f64 = 260.0;
pub const MIN_POPUP_WIDTH: f64 = 220.0;
pub const MIN_POPUP_HEIGHT: f64 = 140.0;

// Messages closer together than this render as one visual cluster
pub const MESSAGE_GROUP_THRESHOLD_MS: f64 = 5000.0;
// Grapheme budget before a message body is truncated with an ellipsis
pub const MESSAGE_TRUNCATE_GRAPHEMES: usize = 280;

pub const EMPTY_TRANSCRIPT_TEXT: &str = "No messages yet for this selection.";

pub const HEALTH_CHECK_INTERVAL_MS: u32 = 10_000;
// Polling fallback for workflow status when the WebSocket is down
pub const WORKFLOW_POLL_INTERVAL_MS: u32 = 3_000;

pub const DEFAULT_AGENT_MODEL: &str = "mistral";

// Accent colors per agent kind
pub const BOX_COLOR_COORDINATOR: &str = "#e3f2fd";
pub const BOX_COLOR_CODER: &str = "#e8f5e9";
pub const BOX_COLOR_TESTER: &str = "#fff3e0";
pub const BOX_COLOR_RUNNER: &str = "#f3e5f5";
pub const BOX_COLOR_CUSTOM: &str = "#f5f5f5";

pub const BOX_BORDER_DEFAULT: &str = "#90a4ae";
pub const BOX_BORDER_SELECTED: &str = "#1976d2";
pub const BOX_BORDER_PINNED: &str = "#c62828";
pub const BOX_TEXT_COLOR: &str = "#263238";
pub const HANDLE_COLOR: &str = "#546e7a";
pub const HANDLE_COLOR_ACTIVE: &str = "#1976d2";
pub const CONNECTION_LINE_COLOR: &str = "#78909c";
pub const CONNECTION_LINE_SELECTED: &str = "#1976d2";
pub const RUBBER_BAND_COLOR: &str = "#1976d2";
pub const SHADOW_COLOR: &str = "rgba(0, 0, 0, 0.15)";

pub const CANVAS_BACKGROUND_LIGHT: &str = "#fafafa";
pub const CANVAS_BACKGROUND_DARK: &str = "#1e242b";
