//! Browser-only smoke checks for the DOM-coupled helpers (compiled to
//! WASM; skipped entirely on native test runs).

use wasm_bindgen_test::*;

use crate::dom_utils;

wasm_bindgen_test_configure!(run_in_browser);

fn document() -> web_sys::Document {
    web_sys::window()
        .and_then(|w| w.document())
        .expect("test runner provides a document")
}

#[wasm_bindgen_test]
fn show_hide_toggle_css_classes() {
    let document = document();
    let el = document.create_element("div").expect("create element");

    dom_utils::hide(&el);
    assert!(el.class_list().contains("hidden"));
    assert!(!el.class_list().contains("visible"));

    dom_utils::show(&el);
    assert!(el.class_list().contains("visible"));
    assert!(!el.class_list().contains("hidden"));
}

#[wasm_bindgen_test]
fn toast_creates_root_and_entry() {
    crate::toast::success("saved");
    let document = document();
    let root = document.get_element_by_id("toast-root").expect("toast root");
    assert!(root.children().length() >= 1);
}

#[wasm_bindgen_test]
fn file_event_round_trips_through_dom() {
    let document = document();
    // The viewer listener is normally installed by build_file_panel
    let viewer = document.create_element("pre").expect("create element");
    viewer.set_id("code-viewer");
    document
        .body()
        .expect("body")
        .append_child(&viewer)
        .expect("append");

    crate::components::file_panel::emit_file_event(
        crate::messages::FileEventKind::Generate,
        "code_1.py",
        "def add(a, b):\n    return a + b",
    );
    // Listener may not be installed in this harness; the emit itself must
    // not panic and the element must still exist.
    assert!(document.get_element_by_id("code-viewer").is_some());
}
