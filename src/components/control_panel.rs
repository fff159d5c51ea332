//! Toolbar, prompt row, box inspector, and results panel. All handlers go
//! through the central dispatch; this module never mutates state directly.

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen::closure::Closure;
use web_sys::{Document, Element, Event, FileReader, HtmlInputElement, HtmlSelectElement,
    HtmlTextAreaElement, MouseEvent};

use crate::constants::DEFAULT_AGENT_MODEL;
use crate::messages::Message;
use crate::models::AgentKind;
use crate::state::{dispatch_global_message, AppState, Theme, APP_STATE};

pub fn setup_control_panel(document: &Document) -> Result<(), JsValue> {
    let root = document
        .get_element_by_id("app-root")
        .ok_or_else(|| JsValue::from_str("app-root not found"))?;

    build_status_bar(document, &root)?;
    build_toolbar(document, &root)?;

    // Canvas container sits between the toolbar and the prompt row
    let container = document.create_element("div")?;
    container.set_id("canvas-container");
    container.set_class_name("canvas-container");
    let canvas = document.create_element("canvas")?;
    canvas.set_id("workflow-canvas");
    container.append_child(&canvas)?;
    root.append_child(&container)?;

    build_prompt_row(document, &root)?;
    build_inspector(document, &root)?;
    build_results_panel(document, &root)?;

    Ok(())
}

fn build_status_bar(document: &Document, root: &Element) -> Result<(), JsValue> {
    let bar = document.create_element("div")?;
    bar.set_id("status-bar");
    bar.set_class_name("status-bar");
    for id in ["backend-status", "ws-status", "workflow-status", "api-activity"] {
        let span = document.create_element("span")?;
        span.set_id(id);
        bar.append_child(&span)?;
    }
    root.append_child(&bar)?;
    Ok(())
}

fn build_toolbar(document: &Document, root: &Element) -> Result<(), JsValue> {
    let toolbar = document.create_element("div")?;
    toolbar.set_id("toolbar");
    toolbar.set_class_name("toolbar");

    // Agent palette: one button per kind, dropped at the visible center
    for kind in [
        AgentKind::Coordinator,
        AgentKind::Coder,
        AgentKind::Tester,
        AgentKind::Runner,
    ] {
        let btn = document.create_element("button")?;
        btn.set_class_name("toolbar-button");
        btn.set_text_content(Some(&format!("+ {}", kind.as_str())));
        let kind_for_click = kind.clone();
        let click = Closure::wrap(Box::new(move |_: MouseEvent| {
            let (x, y) = APP_STATE.with(|s| {
                let state = s.borrow();
                crate::components::canvas_editor::visible_center(&state)
            });
            dispatch_global_message(Message::AddBoxAt {
                x: x - crate::constants::DEFAULT_BOX_WIDTH / 2.0,
                y: y - crate::constants::DEFAULT_BOX_HEIGHT / 2.0,
                kind: kind_for_click.clone(),
            });
        }) as Box<dyn FnMut(_)>);
        btn.add_event_listener_with_callback("click", click.as_ref().unchecked_ref())?;
        click.forget();
        toolbar.append_child(&btn)?;
    }

    add_button(document, &toolbar, "connect-toggle", "Connect mode", || {
        dispatch_global_message(Message::ToggleConnectMode);
    })?;
    add_button(document, &toolbar, "theme-toggle", "Theme", || {
        dispatch_global_message(Message::ToggleTheme);
    })?;
    add_button(document, &toolbar, "example-workflow", "Example workflow", || {
        dispatch_global_message(Message::LoadExampleWorkflow);
    })?;
    add_button(document, &toolbar, "export-canvas", "Export", || {
        dispatch_global_message(Message::ExportCanvas);
    })?;
    add_button(document, &toolbar, "clear-canvas", "Clear canvas", || {
        dispatch_global_message(Message::ClearCanvas);
    })?;
    add_button(document, &toolbar, "clear-messages", "Clear messages", || {
        dispatch_global_message(Message::ClearMessages);
    })?;

    build_import_control(document, &toolbar)?;

    root.append_child(&toolbar)?;
    Ok(())
}

fn add_button<F>(
    document: &Document,
    parent: &Element,
    id: &str,
    label: &str,
    handler: F,
) -> Result<(), JsValue>
where
    F: Fn() + 'static,
{
    let btn = document.create_element("button")?;
    btn.set_id(id);
    btn.set_class_name("toolbar-button");
    btn.set_text_content(Some(label));
    let click = Closure::wrap(Box::new(move |_: MouseEvent| handler()) as Box<dyn FnMut(_)>);
    btn.add_event_listener_with_callback("click", click.as_ref().unchecked_ref())?;
    click.forget();
    parent.append_child(&btn)?;
    Ok(())
}

// Import goes through a hidden file input and FileReader; the reducer
// validates the document before anything is applied.
fn build_import_control(document: &Document, toolbar: &Element) -> Result<(), JsValue> {
    let input = document.create_element("input")?;
    input.set_id("import-input");
    input.set_attribute("type", "file")?;
    input.set_attribute("accept", "application/json")?;
    input.set_attribute("style", "display: none;")?;

    let change = Closure::wrap(Box::new(move |event: Event| {
        let input: HtmlInputElement = match event.target().and_then(|t| t.dyn_into().ok()) {
            Some(input) => input,
            None => return,
        };
        let file = match input.files().and_then(|files| files.get(0)) {
            Some(file) => file,
            None => return,
        };
        // Allow picking the same file again later
        input.set_value("");

        let reader = match FileReader::new() {
            Ok(reader) => reader,
            Err(_) => return,
        };
        let reader_for_load = reader.clone();
        let onload = Closure::wrap(Box::new(move |_: Event| {
            if let Ok(result) = reader_for_load.result() {
                if let Some(text) = result.as_string() {
                    dispatch_global_message(Message::ImportCanvas(text));
                }
            }
        }) as Box<dyn FnMut(_)>);
        reader.set_onload(Some(onload.as_ref().unchecked_ref()));
        onload.forget();

        if let Err(e) = reader.read_as_text(&file) {
            web_sys::console::error_1(&format!("Could not read file: {:?}", e).into());
        }
    }) as Box<dyn FnMut(_)>);
    input.add_event_listener_with_callback("change", change.as_ref().unchecked_ref())?;
    change.forget();

    let input_for_click = input.clone();
    add_button(document, toolbar, "import-canvas", "Import", move || {
        if let Some(html) = input_for_click.dyn_ref::<web_sys::HtmlElement>() {
            html.click();
        }
    })?;
    toolbar.append_child(&input)?;
    Ok(())
}

fn build_prompt_row(document: &Document, root: &Element) -> Result<(), JsValue> {
    let row = document.create_element("div")?;
    row.set_id("prompt-row");
    row.set_class_name("prompt-row");

    let prompt = document.create_element("textarea")?;
    prompt.set_id("prompt-input");
    prompt.set_attribute("placeholder", "Describe the task for the agents…")?;
    let prompt_input = Closure::wrap(Box::new(move |event: Event| {
        if let Some(area) = event
            .target()
            .and_then(|t| t.dyn_into::<HtmlTextAreaElement>().ok())
        {
            dispatch_global_message(Message::UpdatePromptText(area.value()));
        }
    }) as Box<dyn FnMut(_)>);
    prompt.add_event_listener_with_callback("input", prompt_input.as_ref().unchecked_ref())?;
    prompt_input.forget();
    row.append_child(&prompt)?;

    add_button(document, &row, "run-workflow", "Run", || {
        dispatch_global_message(Message::SubmitPrompt);
    })?;
    add_button(document, &row, "abort-workflow", "Abort", || {
        dispatch_global_message(Message::AbortRun);
    })?;

    root.append_child(&row)?;
    Ok(())
}

fn build_inspector(document: &Document, root: &Element) -> Result<(), JsValue> {
    let panel = document.create_element("div")?;
    panel.set_id("box-inspector");
    panel.set_class_name("box-inspector hidden");

    let title = document.create_element("div")?;
    title.set_id("inspector-title");
    title.set_class_name("inspector-title");
    panel.append_child(&title)?;

    let role = document.create_element("input")?;
    role.set_id("inspector-role");
    role.set_attribute("placeholder", "Role")?;
    let role_input = Closure::wrap(Box::new(move |event: Event| {
        let value = match event
            .target()
            .and_then(|t| t.dyn_into::<HtmlInputElement>().ok())
        {
            Some(input) => input.value(),
            None => return,
        };
        if let Some(box_id) = selected_box_id() {
            dispatch_global_message(Message::UpdateBoxRole {
                box_id,
                role: value,
            });
        }
    }) as Box<dyn FnMut(_)>);
    role.add_event_listener_with_callback("change", role_input.as_ref().unchecked_ref())?;
    role_input.forget();
    panel.append_child(&role)?;

    let model = document.create_element("select")?;
    model.set_id("inspector-model");
    let model_change = Closure::wrap(Box::new(move |event: Event| {
        let value = match event
            .target()
            .and_then(|t| t.dyn_into::<HtmlSelectElement>().ok())
        {
            Some(select) => select.value(),
            None => return,
        };
        if let Some(box_id) = selected_box_id() {
            dispatch_global_message(Message::UpdateBoxModel {
                box_id,
                model: value,
            });
        }
    }) as Box<dyn FnMut(_)>);
    model.add_event_listener_with_callback("change", model_change.as_ref().unchecked_ref())?;
    model_change.forget();
    panel.append_child(&model)?;

    let description = document.create_element("textarea")?;
    description.set_id("inspector-description");
    description.set_attribute("placeholder", "What should this agent do?")?;
    let desc_change = Closure::wrap(Box::new(move |event: Event| {
        let value = match event
            .target()
            .and_then(|t| t.dyn_into::<HtmlTextAreaElement>().ok())
        {
            Some(area) => area.value(),
            None => return,
        };
        if let Some(box_id) = selected_box_id() {
            dispatch_global_message(Message::UpdateBoxDescription {
                box_id,
                description: value,
            });
        }
    }) as Box<dyn FnMut(_)>);
    description.add_event_listener_with_callback("change", desc_change.as_ref().unchecked_ref())?;
    desc_change.forget();
    panel.append_child(&description)?;

    add_button(document, &panel, "inspector-pin", "Pin/unpin", || {
        if let Some(box_id) = selected_box_id() {
            dispatch_global_message(Message::ToggleBoxPin(box_id));
        }
    })?;
    add_button(document, &panel, "inspector-delete", "Delete", || {
        dispatch_global_message(Message::DeleteSelection);
    })?;

    root.append_child(&panel)?;
    Ok(())
}

fn build_results_panel(document: &Document, root: &Element) -> Result<(), JsValue> {
    let panel = document.create_element("div")?;
    panel.set_id("results-panel");
    panel.set_class_name("results-panel");

    for (id, label) in [
        ("result-code", "Code"),
        ("result-tests", "Tests"),
        ("result-test-output", "Test results"),
    ] {
        let section = document.create_element("div")?;
        section.set_class_name("result-section");
        let heading = document.create_element("div")?;
        heading.set_class_name("result-heading");
        heading.set_text_content(Some(label));
        section.append_child(&heading)?;
        let pre = document.create_element("pre")?;
        pre.set_id(id);
        section.append_child(&pre)?;
        panel.append_child(&section)?;
    }

    // Generated-files list and viewer live next to the results
    crate::components::file_panel::build_file_panel(document, &panel)?;

    root.append_child(&panel)?;
    Ok(())
}

fn selected_box_id() -> Option<String> {
    APP_STATE.with(|s| s.borrow().selected_box_id().map(|id| id.to_string()))
}

/// Reconciles the controls with current state after every dispatch.
pub fn sync_controls(document: &Document, state: &AppState) -> Result<(), JsValue> {
    crate::dom_utils::set_disabled(document, "run-workflow", state.is_processing);
    crate::dom_utils::set_disabled(document, "abort-workflow", !state.is_processing);
    crate::dom_utils::set_input_value_if_unfocused(document, "prompt-input", &state.prompt_text);

    if let Some(btn) = document.get_element_by_id("connect-toggle") {
        btn.set_class_name(if state.connect_mode {
            "toolbar-button active"
        } else {
            "toolbar-button"
        });
    }

    if let Some(body) = document.body() {
        body.set_class_name(match state.theme {
            Theme::Light => "theme-light",
            Theme::Dark => "theme-dark",
        });
    }

    sync_inspector(document, state)?;
    sync_results(document, state);
    crate::components::file_panel::render_file_list(document, state)?;
    Ok(())
}

fn sync_inspector(document: &Document, state: &AppState) -> Result<(), JsValue> {
    let panel = match document.get_element_by_id("box-inspector") {
        Some(el) => el,
        None => return Ok(()),
    };

    let bx = state
        .selected_box_id()
        .and_then(|id| state.boxes.get(id));
    let bx = match bx {
        Some(bx) => bx,
        None => {
            crate::dom_utils::hide(&panel);
            return Ok(());
        }
    };
    crate::dom_utils::show(&panel);

    if let Some(title) = document.get_element_by_id("inspector-title") {
        title.set_text_content(Some(&format!(
            "{}{}",
            bx.kind.as_str(),
            if bx.pinned { " (pinned)" } else { "" }
        )));
    }
    crate::dom_utils::set_input_value_if_unfocused(document, "inspector-role", &bx.role);
    crate::dom_utils::set_input_value_if_unfocused(
        document,
        "inspector-description",
        bx.description.as_deref().unwrap_or(""),
    );

    // Rebuild the model dropdown from the catalog plus the local default
    if let Some(select) = document
        .get_element_by_id("inspector-model")
        .and_then(|el| el.dyn_into::<HtmlSelectElement>().ok())
    {
        let focused = document
            .active_element()
            .map(|el| el.id() == "inspector-model")
            .unwrap_or(false);
        if !focused {
            select.set_inner_html("");
            let current = bx.model.clone().unwrap_or_else(|| DEFAULT_AGENT_MODEL.to_string());
            let mut options: Vec<String> = vec![DEFAULT_AGENT_MODEL.to_string()];
            options.extend(state.available_models.iter().cloned());
            if !options.contains(&current) {
                options.push(current.clone());
            }
            for model in options {
                let option = document.create_element("option")?;
                option.set_attribute("value", &model)?;
                option.set_text_content(Some(&model));
                if model == current {
                    option.set_attribute("selected", "selected")?;
                }
                select.append_child(&option)?;
            }
        }
    }

    Ok(())
}

fn sync_results(document: &Document, state: &AppState) {
    let (code, tests, output) = match &state.last_result {
        Some(result) => (
            result.code.as_deref().unwrap_or(""),
            result.tests.as_deref().unwrap_or(""),
            result.test_results.as_deref().unwrap_or(""),
        ),
        None => ("", "", ""),
    };
    for (id, text) in [
        ("result-code", code),
        ("result-tests", tests),
        ("result-test-output", output),
    ] {
        if let Some(el) = document.get_element_by_id(id) {
            el.set_text_content(Some(text));
        }
    }
}
