//! Tiny toast helper for non-blocking notices. Blocking validation uses
//! window.alert instead; this is for background outcomes like file deletes.

use wasm_bindgen::{closure::Closure, JsCast};
use web_sys::{Document, Element, HtmlElement};

#[derive(Debug, Clone, Copy)]
pub enum ToastKind {
    Success,
    Error,
}

pub fn success(msg: &str) {
    show(msg, ToastKind::Success);
}

pub fn error(msg: &str) {
    show(msg, ToastKind::Error);
}

pub fn show(message: &str, kind: ToastKind) {
    let window = match web_sys::window() {
        Some(w) => w,
        None => return,
    };
    let document = match window.document() {
        Some(d) => d,
        None => return,
    };

    let root = match ensure_root(&document) {
        Some(root) => root,
        None => return,
    };

    let toast = match document.create_element("div") {
        Ok(el) => el,
        Err(_) => return,
    };
    toast.set_class_name(match kind {
        ToastKind::Success => "toast toast-success",
        ToastKind::Error => "toast toast-error",
    });
    toast.set_text_content(Some(message));
    let _ = root.prepend_with_node_1(&toast);

    // Auto-remove after 4s
    let toast_el: HtmlElement = toast.unchecked_into();
    let cb = Closure::once_into_js(move || {
        if let Some(parent) = toast_el.parent_node() {
            let _ = parent.remove_child(&toast_el);
        }
    });
    let _ = window.set_timeout_with_callback_and_timeout_and_arguments_0(
        cb.as_ref().unchecked_ref(),
        4000,
    );
}

fn ensure_root(document: &Document) -> Option<Element> {
    if let Some(root) = document.get_element_by_id("toast-root") {
        return Some(root);
    }
    let root = document.create_element("div").ok()?;
    root.set_id("toast-root");
    document.body()?.append_child(&root).ok()?;
    Some(root)
}
