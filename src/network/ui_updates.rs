use std::cell::RefCell;
use js_sys::Array;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::Document;

use crate::state::AppState;

// Packet counter for the activity indicator
thread_local! {
    static PACKET_COUNTER: RefCell<u32> = RefCell::new(0);
}

/// Paints the backend/WebSocket status banner from current state. Called
/// from the central UI refresh, so overlapping health checks simply apply
/// last-writer-wins here.
pub fn render_status(document: &Document, state: &AppState) {
    if let Some(el) = document.get_element_by_id("backend-status") {
        let (text, class) = match state.backend_connected {
            Some(true) => ("Backend Connected", "status-ok"),
            Some(false) => ("Backend Disconnected", "status-error"),
            None => ("Checking backend…", "status-pending"),
        };
        el.set_class_name(class);
        el.set_text_content(Some(text));
    }

    if let Some(el) = document.get_element_by_id("ws-status") {
        let (text, class) = if state.ws_connected {
            ("Live events: on", "status-ok")
        } else {
            ("Live events: off", "status-error")
        };
        el.set_class_name(class);
        el.set_text_content(Some(text));
    }

    if let Some(el) = document.get_element_by_id("workflow-status") {
        let text = match (&state.workflow_status, state.is_processing) {
            (Some(status), true) => format!("Workflow: {} …", status),
            (Some(status), false) => format!("Workflow: {}", status),
            (None, _) => String::new(),
        };
        el.set_text_content(Some(&text));
    }
}

/// Brief flash on the activity LED for every API call.
pub fn flash_activity() {
    let window = match web_sys::window() {
        Some(w) => w,
        None => return,
    };
    let document = match window.document() {
        Some(d) => d,
        None => return,
    };
    let status_element = match document.get_element_by_id("api-activity") {
        Some(el) => el,
        None => return,
    };

    PACKET_COUNTER.with(|counter| {
        let count = counter.borrow().wrapping_add(1);
        *counter.borrow_mut() = count;
        status_element.set_text_content(Some(&format!("PKT {:06}", count)));
    });

    status_element.set_class_name("flash");
    let status_clone = status_element.clone();
    let clear_callback = Closure::wrap(Box::new(move || {
        status_clone.set_class_name("");
    }) as Box<dyn FnMut()>);

    let _ = window.set_timeout_with_callback_and_timeout_and_arguments(
        clear_callback.as_ref().unchecked_ref(),
        50,
        &Array::new(),
    );
    clear_callback.forget();
}
