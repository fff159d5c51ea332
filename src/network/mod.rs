pub mod api_client;
pub mod event_types;
pub mod messages;
pub mod ui_updates;
pub mod ws_client;

pub use api_client::{ApiClient, ApiError};
pub use event_types::EventType;
pub use ws_client::setup_websocket;

const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";
const DEFAULT_ONLINE_BASE_URL: &str = "http://localhost:8001";

// Base URL for the local orchestration backend. A localStorage override
// lets the UI point at a remote deployment without rebuilding.
pub(crate) fn get_api_base_url() -> String {
    if let Some(window) = web_sys::window() {
        if let Ok(Some(storage)) = window.local_storage() {
            if let Ok(Some(url)) = storage.get_item("api_base_url") {
                if !url.is_empty() {
                    return url;
                }
            }
        }
    }
    DEFAULT_API_BASE_URL.to_string()
}

// The online model service runs as a separate process on its own port.
pub(crate) fn get_online_base_url() -> String {
    if let Some(window) = web_sys::window() {
        if let Ok(Some(storage)) = window.local_storage() {
            if let Ok(Some(url)) = storage.get_item("online_base_url") {
                if !url.is_empty() {
                    return url;
                }
            }
        }
    }
    DEFAULT_ONLINE_BASE_URL.to_string()
}

pub(crate) fn get_ws_url() -> String {
    let base = get_api_base_url();
    let ws_base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        format!("ws://{}", base)
    };
    format!("{}/ws", ws_base)
}
