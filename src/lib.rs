use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::Document;
use gloo_timers::callback::Interval;

mod canvas;
mod command_executors;
mod components;
mod constants;
mod dom_utils;
mod messages;
mod models;
mod network;
mod overlay;
mod state;
mod storage;
mod toast;
mod update;

#[cfg(all(test, target_arch = "wasm32"))]
mod ui_smoke_test;

use messages::{Command, Message};

// Main entry point for the WASM application
#[wasm_bindgen(start)]
pub fn start() -> Result<(), JsValue> {
    // Initialize better panic messages
    console_error_panic_hook::set_once();

    let window = web_sys::window().ok_or_else(|| JsValue::from_str("no global window"))?;
    let document = window
        .document()
        .ok_or_else(|| JsValue::from_str("no document on window"))?;

    ensure_app_root(&document)?;
    components::control_panel::setup_control_panel(&document)?;
    components::canvas_editor::setup_canvas(&document)?;
    components::popup::setup_popup(&document)?;
    components::canvas_editor::setup_document_mouse_events(&document)?;
    setup_keyboard_events(&document)?;

    // Live events are best-effort; the UI stays usable on REST alone
    if let Err(e) = network::setup_websocket() {
        web_sys::console::warn_1(&format!("WebSocket setup failed: {:?}", e).into());
    }

    // Restore the autosaved canvas before the first paint
    state::APP_STATE.with(|state_ref| {
        let mut state = state_ref.borrow_mut();
        match storage::load_snapshot_local(&mut state) {
            Ok(true) => web_sys::console::log_1(&"Restored canvas from local storage".into()),
            Ok(false) => {}
            Err(e) => web_sys::console::warn_1(&format!("Canvas restore failed: {:?}", e).into()),
        }
    });

    command_executors::execute(Command::CheckHealth);
    command_executors::execute(Command::FetchModels);
    command_executors::execute(Command::FetchFiles);

    setup_health_check_timer();
    setup_auto_save_timer();
    setup_workflow_poll_timer();

    state::AppState::refresh_ui_after_state_change()?;
    Ok(())
}

fn ensure_app_root(document: &Document) -> Result<(), JsValue> {
    if document.get_element_by_id("app-root").is_some() {
        return Ok(());
    }
    let root = document.create_element("div")?;
    root.set_id("app-root");
    document
        .body()
        .ok_or_else(|| JsValue::from_str("no body"))?
        .append_child(&root)?;
    Ok(())
}

fn setup_keyboard_events(document: &Document) -> Result<(), JsValue> {
    let keydown = Closure::wrap(Box::new(move |event: web_sys::KeyboardEvent| {
        match event.key().as_str() {
            "Escape" => {
                state::dispatch_global_message(Message::EscapePressed);
            }
            "Delete" | "Backspace" => {
                let in_input = web_sys::window()
                    .and_then(|w| w.document())
                    .map(|d| dom_utils::focus_in_text_input(&d))
                    .unwrap_or(false);
                if !in_input {
                    event.prevent_default();
                    state::dispatch_global_message(Message::DeleteSelection);
                }
            }
            _ => {}
        }
    }) as Box<dyn FnMut(_)>);
    document.add_event_listener_with_callback("keydown", keydown.as_ref().unchecked_ref())?;
    keydown.forget();
    Ok(())
}

// Fixed-interval health probe; each tick is independent and the displayed
// status is whatever answered last.
fn setup_health_check_timer() {
    Interval::new(constants::HEALTH_CHECK_INTERVAL_MS, || {
        command_executors::execute(Command::CheckHealth);
    })
    .forget();
}

// Autosave the canvas whenever something changed since the last tick.
fn setup_auto_save_timer() {
    Interval::new(5_000, || {
        state::APP_STATE.with(|state| {
            let mut state = state.borrow_mut();
            if let Err(e) = storage::save_if_modified(&mut state) {
                web_sys::console::warn_1(&format!("Auto-save failed: {:?}", e).into());
            }
        });
    })
    .forget();
}

// Polling is only the fallback; while the WebSocket is delivering
// workflow_status pushes this timer stays quiet.
fn setup_workflow_poll_timer() {
    Interval::new(constants::WORKFLOW_POLL_INTERVAL_MS, || {
        let workflow_id = state::APP_STATE.with(|state| {
            let state = state.borrow();
            if state.is_processing && !state.ws_connected {
                state.active_workflow_id.clone()
            } else {
                None
            }
        });
        if let Some(workflow_id) = workflow_id {
            command_executors::execute(Command::PollWorkflowStatus { workflow_id });
        }
    })
    .forget();
}
