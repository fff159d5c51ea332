use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use js_sys::Array;
use web_sys::{BlobPropertyBag, HtmlAnchorElement, Url};

use crate::constants::{MAX_ZOOM, MIN_BOX_HEIGHT, MIN_BOX_WIDTH, MIN_ZOOM};
use crate::models::{CanvasSnapshot, SNAPSHOT_VERSION};
use crate::state::{AppState, Interaction};

const SNAPSHOT_STORAGE_KEY: &str = "agent_canvas_snapshot";

/// Builds the exportable document from current state. Boxes come out in
/// z-order so a round trip preserves stacking.
pub fn snapshot_of(state: &AppState) -> CanvasSnapshot {
    CanvasSnapshot {
        version: SNAPSHOT_VERSION,
        boxes: state
            .box_order
            .iter()
            .filter_map(|id| state.boxes.get(id))
            .cloned()
            .collect(),
        connections: state.connections.clone(),
        prompt: state.prompt_text.clone(),
        viewport_x: state.viewport_x,
        viewport_y: state.viewport_y,
        zoom: state.zoom_level,
    }
}

/// Checks a parsed snapshot before anything touches live state, so a bad
/// document can be rejected without a partial apply.
pub fn validate_snapshot(snapshot: &CanvasSnapshot) -> Result<(), String> {
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(format!(
            "Unsupported canvas file version {}",
            snapshot.version
        ));
    }
    let box_ids: std::collections::HashSet<&str> =
        snapshot.boxes.iter().map(|b| b.id.as_str()).collect();
    for conn in &snapshot.connections {
        if !box_ids.contains(conn.from_box.as_str()) || !box_ids.contains(conn.to_box.as_str()) {
            return Err("connection references a missing box".to_string());
        }
    }
    Ok(())
}

/// Replaces the whole canvas with a validated snapshot. Interaction state,
/// selection, and popups reset; the transcript is left alone.
pub fn apply_snapshot(state: &mut AppState, snapshot: CanvasSnapshot) {
    state.boxes.clear();
    state.box_order.clear();
    for mut bx in snapshot.boxes {
        bx.width = f64::max(bx.width, MIN_BOX_WIDTH);
        bx.height = f64::max(bx.height, MIN_BOX_HEIGHT);
        state.box_order.push(bx.id.clone());
        state.boxes.insert(bx.id.clone(), bx);
    }
    state.connections = snapshot.connections;
    state.prompt_text = snapshot.prompt;
    state.viewport_x = snapshot.viewport_x;
    state.viewport_y = snapshot.viewport_y;
    state.zoom_level = snapshot.zoom.clamp(MIN_ZOOM, MAX_ZOOM);

    state.popups.clear();
    state.open_popup = None;
    state.selection = None;
    state.interaction = Interaction::Idle;
    state.state_modified = true;
}

/// Autosave target; the timer in lib.rs calls this through
/// `save_if_modified`.
pub fn save_snapshot_local(state: &AppState) -> Result<(), JsValue> {
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
    let storage = window
        .local_storage()?
        .ok_or_else(|| JsValue::from_str("no local storage"))?;
    let json = serde_json::to_string(&snapshot_of(state))
        .map_err(|e| JsValue::from_str(&e.to_string()))?;
    storage.set_item(SNAPSHOT_STORAGE_KEY, &json)?;
    Ok(())
}

pub fn save_if_modified(state: &mut AppState) -> Result<(), JsValue> {
    if state.state_modified {
        save_snapshot_local(state)?;
        state.state_modified = false;
    }
    Ok(())
}

/// Restores the autosaved canvas on startup. Returns whether anything was
/// applied; malformed stored data is discarded rather than propagated.
pub fn load_snapshot_local(state: &mut AppState) -> Result<bool, JsValue> {
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
    let storage = window
        .local_storage()?
        .ok_or_else(|| JsValue::from_str("no local storage"))?;

    let json = match storage.get_item(SNAPSHOT_STORAGE_KEY)? {
        Some(json) => json,
        None => return Ok(false),
    };

    match serde_json::from_str::<CanvasSnapshot>(&json) {
        Ok(snapshot) => match validate_snapshot(&snapshot) {
            Ok(()) => {
                apply_snapshot(state, snapshot);
                state.state_modified = false;
                Ok(true)
            }
            Err(e) => {
                web_sys::console::warn_1(&format!("Discarding stored canvas: {}", e).into());
                let _ = storage.remove_item(SNAPSHOT_STORAGE_KEY);
                Ok(false)
            }
        },
        Err(e) => {
            web_sys::console::warn_1(&format!("Failed to parse stored canvas: {}", e).into());
            let _ = storage.remove_item(SNAPSHOT_STORAGE_KEY);
            Ok(false)
        }
    }
}

pub fn clear_storage() -> Result<(), JsValue> {
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
    if let Some(storage) = window.local_storage()? {
        storage.remove_item(SNAPSHOT_STORAGE_KEY)?;
    }
    Ok(())
}

/// Offers a JSON document as a browser download via a temporary object URL.
pub fn download_json(filename: &str, json: &str) -> Result<(), JsValue> {
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
    let document = window
        .document()
        .ok_or_else(|| JsValue::from_str("no document"))?;

    let parts = Array::new();
    parts.push(&JsValue::from_str(json));
    let bag = BlobPropertyBag::new();
    bag.set_type("application/json");
    let blob = web_sys::Blob::new_with_str_sequence_and_options(&parts, &bag)?;
    let url = Url::create_object_url_with_blob(&blob)?;

    let anchor: HtmlAnchorElement = document.create_element("a")?.dyn_into()?;
    anchor.set_href(&url);
    anchor.set_download(filename);
    let body = document
        .body()
        .ok_or_else(|| JsValue::from_str("no body"))?;
    body.append_child(&anchor)?;
    anchor.click();
    body.remove_child(&anchor)?;
    Url::revoke_object_url(&url)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AgentKind, Side};

    #[test]
    fn test_snapshot_round_trip_through_apply() {
        let mut state = AppState::new();
        let a = state.create_box(0.0, 0.0, AgentKind::Coordinator);
        let b = state.create_box(400.0, 0.0, AgentKind::Runner);
        state
            .create_connection(&a, Side::Bottom, &b, Side::Top)
            .unwrap();
        state.prompt_text = "persisted".to_string();
        state.zoom_level = 1.5;

        let snapshot = snapshot_of(&state);
        assert!(validate_snapshot(&snapshot).is_ok());

        let mut restored = AppState::new();
        apply_snapshot(&mut restored, snapshot);
        assert_eq!(restored.boxes, state.boxes);
        assert_eq!(restored.box_order, state.box_order);
        assert_eq!(restored.connections, state.connections);
        assert_eq!(restored.prompt_text, "persisted");
        assert_eq!(restored.zoom_level, 1.5);
    }

    #[test]
    fn test_validate_rejects_wrong_version() {
        let mut snapshot = snapshot_of(&AppState::new());
        snapshot.version = 99;
        assert!(validate_snapshot(&snapshot).is_err());
    }

    #[test]
    fn test_validate_rejects_dangling_connection() {
        let mut state = AppState::new();
        let a = state.create_box(0.0, 0.0, AgentKind::Coder);
        let b = state.create_box(400.0, 0.0, AgentKind::Tester);
        state
            .create_connection(&a, Side::Right, &b, Side::Left)
            .unwrap();

        let mut snapshot = snapshot_of(&state);
        snapshot.boxes.retain(|bx| bx.id != b);
        assert!(validate_snapshot(&snapshot).is_err());
    }

    #[test]
    fn test_apply_clamps_zoom_and_box_sizes() {
        let mut snapshot = snapshot_of(&AppState::new());
        snapshot.zoom = 1000.0;
        snapshot.boxes.push(crate::models::AgentBox {
            id: "tiny".to_string(),
            x: 0.0,
            y: 0.0,
            width: 1.0,
            height: 1.0,
            kind: AgentKind::Coder,
            role: "Python Developer".to_string(),
            model: None,
            description: None,
            pinned: false,
        });

        let mut state = AppState::new();
        apply_snapshot(&mut state, snapshot);
        assert_eq!(state.zoom_level, MAX_ZOOM);
        let tiny = state.boxes.get("tiny").unwrap();
        assert_eq!(tiny.width, MIN_BOX_WIDTH);
        assert_eq!(tiny.height, MIN_BOX_HEIGHT);
    }
}
