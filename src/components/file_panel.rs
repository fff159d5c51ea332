//! Generated-files list plus a code viewer. The two regions stay decoupled
//! through the page-local custom events `ai:file-select` and
//! `ai:file-generate`: the list announces a payload, the viewer listens.

use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen::closure::Closure;
use web_sys::{CustomEvent, CustomEventInit, Document, Element, MouseEvent};

use crate::messages::{FileEventKind, Message};
use crate::state::{dispatch_global_message, AppState};

pub const FILE_SELECT_EVENT: &str = "ai:file-select";
pub const FILE_GENERATE_EVENT: &str = "ai:file-generate";

/// Payload carried in the custom event's `detail` field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEventDetail {
    pub name: String,
    pub code: String,
}

pub fn build_file_panel(document: &Document, parent: &Element) -> Result<(), JsValue> {
    let section = document.create_element("div")?;
    section.set_id("file-panel");
    section.set_class_name("result-section");

    let heading = document.create_element("div")?;
    heading.set_class_name("result-heading");
    heading.set_text_content(Some("Generated files"));
    section.append_child(&heading)?;

    let list = document.create_element("ul")?;
    list.set_id("file-list");
    section.append_child(&list)?;

    let viewer_name = document.create_element("div")?;
    viewer_name.set_id("code-viewer-name");
    viewer_name.set_class_name("result-heading");
    section.append_child(&viewer_name)?;

    let viewer = document.create_element("pre")?;
    viewer.set_id("code-viewer");
    section.append_child(&viewer)?;

    parent.append_child(&section)?;

    setup_file_event_listeners(document)?;
    Ok(())
}

/// Rebuilds the file list from state.
pub fn render_file_list(document: &Document, state: &AppState) -> Result<(), JsValue> {
    let list = match document.get_element_by_id("file-list") {
        Some(el) => el,
        None => return Ok(()),
    };
    list.set_inner_html("");

    for filename in &state.generated_files {
        let item = document.create_element("li")?;
        item.set_class_name("file-item");

        let name = document.create_element("span")?;
        name.set_text_content(Some(filename));
        let filename_for_open = filename.clone();
        let open_click = Closure::wrap(Box::new(move |_: MouseEvent| {
            dispatch_global_message(Message::RequestLoadFile(filename_for_open.clone()));
        }) as Box<dyn FnMut(_)>);
        name.add_event_listener_with_callback("click", open_click.as_ref().unchecked_ref())?;
        open_click.forget();
        item.append_child(&name)?;

        let delete = document.create_element("button")?;
        delete.set_class_name("file-delete");
        delete.set_text_content(Some("×"));
        let filename_for_delete = filename.clone();
        let delete_click = Closure::wrap(Box::new(move |event: MouseEvent| {
            event.stop_propagation();
            dispatch_global_message(Message::RequestDeleteFile(filename_for_delete.clone()));
        }) as Box<dyn FnMut(_)>);
        delete.add_event_listener_with_callback("click", delete_click.as_ref().unchecked_ref())?;
        delete_click.forget();
        item.append_child(&delete)?;

        list.append_child(&item)?;
    }

    Ok(())
}

/// Publishes a file payload on the matching custom event.
pub fn emit_file_event(kind: FileEventKind, filename: &str, code: &str) {
    let document = match web_sys::window().and_then(|w| w.document()) {
        Some(d) => d,
        None => return,
    };

    let detail = FileEventDetail {
        name: filename.to_string(),
        code: code.to_string(),
    };
    let detail = match serde_wasm_bindgen::to_value(&detail) {
        Ok(value) => value,
        Err(e) => {
            web_sys::console::error_1(&format!("Could not build event detail: {}", e).into());
            return;
        }
    };

    let init = CustomEventInit::new();
    init.set_detail(&detail);
    let event_name = match kind {
        FileEventKind::Select => FILE_SELECT_EVENT,
        FileEventKind::Generate => FILE_GENERATE_EVENT,
    };
    if let Ok(event) = CustomEvent::new_with_event_init_dict(event_name, &init) {
        let _ = document.dispatch_event(&event);
    }
}

// The viewer reacts to both events the same way; it has no idea who sent
// them.
fn setup_file_event_listeners(document: &Document) -> Result<(), JsValue> {
    for event_name in [FILE_SELECT_EVENT, FILE_GENERATE_EVENT] {
        let handler = Closure::wrap(Box::new(move |event: web_sys::Event| {
            let custom: CustomEvent = match event.dyn_into() {
                Ok(c) => c,
                Err(_) => return,
            };
            let detail: FileEventDetail = match serde_wasm_bindgen::from_value(custom.detail()) {
                Ok(detail) => detail,
                Err(e) => {
                    web_sys::console::warn_1(&format!("Ignoring malformed file event: {}", e).into());
                    return;
                }
            };

            if let Some(document) = web_sys::window().and_then(|w| w.document()) {
                if let Some(el) = document.get_element_by_id("code-viewer-name") {
                    el.set_text_content(Some(&detail.name));
                }
                if let Some(el) = document.get_element_by_id("code-viewer") {
                    el.set_text_content(Some(&detail.code));
                }
            }
        }) as Box<dyn FnMut(_)>);
        document.add_event_listener_with_callback(event_name, handler.as_ref().unchecked_ref())?;
        handler.forget();
    }
    Ok(())
}
