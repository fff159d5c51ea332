//! Floating transcript popup. One popup at most is open at a time; it
//! anchors to the selected connection's midpoint until the user drags it,
//! after which its override position in `PopupState` wins.

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen::closure::Closure;
use web_sys::{Document, Element, MouseEvent};

use crate::constants::EMPTY_TRANSCRIPT_TEXT;
use crate::messages::Message;
use crate::models::AgentMessage;
use crate::overlay::{self, MessageLabel};
use crate::state::{dispatch_global_message, AppState, APP_STATE};

pub fn setup_popup(document: &Document) -> Result<(), JsValue> {
    if document.get_element_by_id("transcript-popup").is_some() {
        return Ok(());
    }
    let container = document
        .get_element_by_id("canvas-container")
        .ok_or_else(|| JsValue::from_str("canvas-container not found"))?;

    let popup = document.create_element("div")?;
    popup.set_id("transcript-popup");
    popup.set_class_name("transcript-popup hidden");

    let header = document.create_element("div")?;
    header.set_id("popup-header");
    header.set_class_name("popup-header");

    let title = document.create_element("span")?;
    title.set_id("popup-title");
    header.append_child(&title)?;

    let pin_btn = document.create_element("button")?;
    pin_btn.set_id("popup-pin");
    pin_btn.set_class_name("popup-button");
    pin_btn.set_text_content(Some("pin"));
    header.append_child(&pin_btn)?;

    let close_btn = document.create_element("button")?;
    close_btn.set_id("popup-close");
    close_btn.set_class_name("popup-button");
    close_btn.set_text_content(Some("×"));
    header.append_child(&close_btn)?;

    popup.append_child(&header)?;

    let body = document.create_element("div")?;
    body.set_id("popup-body");
    body.set_class_name("popup-body");
    popup.append_child(&body)?;

    let grip = document.create_element("div")?;
    grip.set_id("popup-resize");
    grip.set_class_name("popup-resize-grip");
    popup.append_child(&grip)?;

    container.append_child(&popup)?;

    wire_popup_events(document, &popup, &header, &grip)?;
    Ok(())
}

fn wire_popup_events(
    document: &Document,
    popup: &Element,
    header: &Element,
    grip: &Element,
) -> Result<(), JsValue> {
    // Drag by header
    let popup_for_drag = popup.clone();
    let header_down = Closure::wrap(Box::new(move |event: MouseEvent| {
        // Buttons inside the header keep their own click behavior
        if let Some(target) = event.target() {
            if let Ok(el) = target.dyn_into::<Element>() {
                if el.tag_name() == "BUTTON" {
                    return;
                }
            }
        }
        event.prevent_default();
        let key = match APP_STATE.with(|s| s.borrow().open_popup.clone()) {
            Some(key) => key,
            None => return,
        };
        let rect = popup_for_drag.get_bounding_client_rect();
        dispatch_global_message(Message::StartPopupDrag {
            key,
            grab_x: event.client_x() as f64 - rect.left(),
            grab_y: event.client_y() as f64 - rect.top(),
        });
    }) as Box<dyn FnMut(_)>);
    header.add_event_listener_with_callback("mousedown", header_down.as_ref().unchecked_ref())?;
    header_down.forget();

    // Resize by corner grip
    let grip_down = Closure::wrap(Box::new(move |event: MouseEvent| {
        event.prevent_default();
        event.stop_propagation();
        let key = match APP_STATE.with(|s| s.borrow().open_popup.clone()) {
            Some(key) => key,
            None => return,
        };
        let (x, y) = crate::components::canvas_editor::container_coords(event);
        dispatch_global_message(Message::StartPopupResize {
            key,
            mouse_x: x,
            mouse_y: y,
        });
    }) as Box<dyn FnMut(_)>);
    grip.add_event_listener_with_callback("mousedown", grip_down.as_ref().unchecked_ref())?;
    grip_down.forget();

    // Close deselects, which closes the popup
    if let Some(close_btn) = document.get_element_by_id("popup-close") {
        let close_click = Closure::wrap(Box::new(move |_: MouseEvent| {
            dispatch_global_message(Message::ClearSelection);
        }) as Box<dyn FnMut(_)>);
        close_btn.add_event_listener_with_callback("click", close_click.as_ref().unchecked_ref())?;
        close_click.forget();
    }

    // Pin toggles on the selected connection
    if let Some(pin_btn) = document.get_element_by_id("popup-pin") {
        let pin_click = Closure::wrap(Box::new(move |_: MouseEvent| {
            let key = APP_STATE.with(|s| {
                let state = s.borrow();
                state
                    .open_popup
                    .clone()
                    .filter(|k| state.connection(k).is_some())
            });
            if let Some(key) = key {
                dispatch_global_message(Message::ToggleConnectionPin(key));
            }
        }) as Box<dyn FnMut(_)>);
        pin_btn.add_event_listener_with_callback("click", pin_click.as_ref().unchecked_ref())?;
        pin_click.forget();
    }

    Ok(())
}

/// Rebuilds the popup from state; called from the central UI refresh.
pub fn render_popup(document: &Document, state: &AppState) -> Result<(), JsValue> {
    let popup = match document.get_element_by_id("transcript-popup") {
        Some(el) => el,
        None => return Ok(()),
    };

    let key = match &state.open_popup {
        Some(key) => key.clone(),
        None => {
            crate::dom_utils::hide(&popup);
            return Ok(());
        }
    };
    crate::dom_utils::show(&popup);

    let popup_state = state.popups.get(&key).cloned().unwrap_or_default();
    let (x, y) = match (popup_state.x, popup_state.y) {
        (Some(x), Some(y)) => (x, y),
        _ => state.default_popup_position(&key),
    };

    if let Some(html) = popup.dyn_ref::<web_sys::HtmlElement>() {
        let style = html.style();
        style.set_property("left", &format!("{}px", x))?;
        style.set_property("top", &format!("{}px", y))?;
        style.set_property("width", &format!("{}px", popup_state.width))?;
        style.set_property("height", &format!("{}px", popup_state.height))?;
    }

    // Title and transcript depend on whether a connection or a box is open
    let (title, transcript, is_connection) = if let Some(conn) = state.connection(&key) {
        let from = state
            .boxes
            .get(&conn.from_box)
            .map(|b| b.kind.as_str().to_string())
            .unwrap_or_else(|| conn.from_box.clone());
        let to = state
            .boxes
            .get(&conn.to_box)
            .map(|b| b.kind.as_str().to_string())
            .unwrap_or_else(|| conn.to_box.clone());
        (
            format!("{} → {}", from, to),
            overlay::messages_for_connection(conn, &state.message_log),
            true,
        )
    } else if let Some(bx) = state.boxes.get(&key) {
        (
            format!("{} ({})", bx.kind.as_str(), bx.role),
            overlay::messages_for_box(&key, &state.message_log),
            false,
        )
    } else {
        (key.clone(), Vec::new(), false)
    };

    if let Some(title_el) = document.get_element_by_id("popup-title") {
        title_el.set_text_content(Some(&title));
    }
    if let Some(pin_btn) = document.get_element_by_id("popup-pin") {
        let pinned = state.connection(&key).map(|c| c.pinned).unwrap_or(false);
        pin_btn.set_class_name(if pinned {
            "popup-button pinned"
        } else {
            "popup-button"
        });
        if let Some(html) = pin_btn.dyn_ref::<web_sys::HtmlElement>() {
            html.style().set_property(
                "display",
                if is_connection { "inline-block" } else { "none" },
            )?;
        }
    }

    render_transcript(document, &transcript)?;
    Ok(())
}

fn render_transcript(document: &Document, transcript: &[AgentMessage]) -> Result<(), JsValue> {
    let body = match document.get_element_by_id("popup-body") {
        Some(el) => el,
        None => return Ok(()),
    };
    body.set_inner_html("");

    if transcript.is_empty() {
        let empty = document.create_element("div")?;
        empty.set_class_name("popup-empty");
        empty.set_text_content(Some(EMPTY_TRANSCRIPT_TEXT));
        body.append_child(&empty)?;
        return Ok(());
    }

    for group in overlay::group_messages_default(transcript) {
        let cluster = document.create_element("div")?;
        cluster.set_class_name("message-cluster");

        if let Some(first) = group.first() {
            let header = document.create_element("div")?;
            header.set_class_name("cluster-time");
            header.set_text_content(Some(&overlay::format_timestamp(first.timestamp_ms)));
            cluster.append_child(&header)?;
        }

        for msg in &group {
            let row = document.create_element("div")?;
            let label = match overlay::classify_message(&msg.content) {
                MessageLabel::Command => "message message-command",
                MessageLabel::Response => "message message-response",
                MessageLabel::Plain => "message",
            };
            row.set_class_name(label);

            let route = document.create_element("div")?;
            route.set_class_name("message-route");
            route.set_text_content(Some(&format!("{} → {}", msg.from_agent, msg.to_agent)));
            row.append_child(&route)?;

            let content = document.create_element("div")?;
            content.set_class_name("message-content");
            content.set_text_content(Some(&overlay::truncate_content_default(&msg.content)));
            row.append_child(&content)?;

            cluster.append_child(&row)?;
        }
        body.append_child(&cluster)?;
    }

    Ok(())
}
