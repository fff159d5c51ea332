//! Thin helper layer for repetitive DOM operations.

use wasm_bindgen::JsCast;
use web_sys::{Document, Element, HtmlInputElement, HtmlTextAreaElement};

/// Make an element visible by toggling CSS classes.
pub fn show(el: &Element) {
    let _ = el.class_list().remove_1("hidden");
    let _ = el.class_list().add_1("visible");
}

/// Hide the element by toggling CSS classes.
pub fn hide(el: &Element) {
    let _ = el.class_list().remove_1("visible");
    let _ = el.class_list().add_1("hidden");
}

/// Whether keyboard focus is currently inside a text entry element, so
/// Delete/Backspace can keep their editing meaning there.
pub fn focus_in_text_input(document: &Document) -> bool {
    match document.active_element() {
        Some(el) => {
            let tag = el.tag_name();
            tag == "INPUT" || tag == "TEXTAREA" || tag == "SELECT"
        }
        None => false,
    }
}

/// Update an input's value unless the user is typing in it right now.
pub fn set_input_value_if_unfocused(document: &Document, id: &str, value: &str) {
    if let Some(el) = document.get_element_by_id(id) {
        let focused = document
            .active_element()
            .map(|active| active.id() == id)
            .unwrap_or(false);
        if focused {
            return;
        }
        if let Some(input) = el.dyn_ref::<HtmlInputElement>() {
            input.set_value(value);
        } else if let Some(area) = el.dyn_ref::<HtmlTextAreaElement>() {
            area.set_value(value);
        }
    }
}

/// Enable or disable a button-like element.
pub fn set_disabled(document: &Document, id: &str, disabled: bool) {
    if let Some(el) = document.get_element_by_id(id) {
        if disabled {
            let _ = el.set_attribute("disabled", "disabled");
        } else {
            let _ = el.remove_attribute("disabled");
        }
    }
}
