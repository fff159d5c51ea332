use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen::closure::Closure;
use web_sys::{AddEventListenerOptions, Document, HtmlCanvasElement, MouseEvent};
use std::cell::RefCell;
use std::rc::Rc;

use crate::constants::{MAX_ZOOM, MIN_ZOOM};
use crate::messages::Message;
use crate::state::{dispatch_global_message, AppState, Interaction, APP_STATE};

// What a mousedown landed on, kept until mouseup decides click vs drag
#[derive(Clone, Debug)]
enum ClickTarget {
    Box(String),
    Empty,
}

pub fn setup_canvas(document: &Document) -> Result<(), JsValue> {
    let canvas = document
        .get_element_by_id("workflow-canvas")
        .ok_or_else(|| JsValue::from_str("workflow-canvas not found"))?
        .dyn_into::<HtmlCanvasElement>()?;

    resize_canvas(&canvas)?;

    let context = canvas
        .get_context("2d")?
        .ok_or_else(|| JsValue::from_str("no 2d context"))?
        .dyn_into::<web_sys::CanvasRenderingContext2d>()?;

    APP_STATE.with(|state| {
        let mut state = state.borrow_mut();
        state.canvas = Some(canvas.clone());
        state.context = Some(context);
    });

    setup_canvas_mouse_events(&canvas)?;
    setup_resize_handler(&canvas)?;

    Ok(())
}

pub fn resize_canvas(canvas: &HtmlCanvasElement) -> Result<(), JsValue> {
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
    let document = window
        .document()
        .ok_or_else(|| JsValue::from_str("no document"))?;

    if let Some(container) = document.get_element_by_id("canvas-container") {
        let container_width = container.client_width();
        let container_height = container.client_height();
        let dpr = window.device_pixel_ratio();

        // Bitmap size follows the device pixel ratio; CSS size stays logical
        canvas.set_width((container_width as f64 * dpr) as u32);
        canvas.set_height((container_height as f64 * dpr) as u32);
        canvas
            .style()
            .set_property("width", &format!("{}px", container_width))?;
        canvas
            .style()
            .set_property("height", &format!("{}px", container_height))?;

        APP_STATE.with(|state| {
            let mut state = state.borrow_mut();
            state.canvas_width = container_width as f64;
            state.canvas_height = container_height as f64;
            state.draw_canvas();
        });
    }

    Ok(())
}

fn setup_resize_handler(canvas: &HtmlCanvasElement) -> Result<(), JsValue> {
    let canvas_clone = canvas.clone();
    let resize_callback = Closure::wrap(Box::new(move || {
        let _ = resize_canvas(&canvas_clone);
    }) as Box<dyn FnMut()>);

    web_sys::window()
        .ok_or_else(|| JsValue::from_str("no window"))?
        .add_event_listener_with_callback("resize", resize_callback.as_ref().unchecked_ref())?;
    resize_callback.forget();

    Ok(())
}

fn setup_canvas_mouse_events(canvas: &HtmlCanvasElement) -> Result<(), JsValue> {
    // Shared between mousedown and mouseup to tell clicks from drags
    let click_track: Rc<RefCell<Option<(f64, f64, ClickTarget)>>> = Rc::new(RefCell::new(None));

    // Mouse down: hit-test and enter the matching interactive mode
    let click_track_down = click_track.clone();
    let mousedown_handler = Closure::wrap(Box::new(move |event: MouseEvent| {
        if event.button() != 0 {
            return;
        }
        let x = event.offset_x() as f64;
        let y = event.offset_y() as f64;

        enum Hit {
            Handle(String, crate::models::Side),
            Grip(String),
            Box(String, f64, f64),
            Connection(String),
            Empty,
        }

        let hit = APP_STATE.with(|state| {
            let state = state.borrow();
            let (wx, wy) = state.screen_to_world(x, y);
            if state.connect_mode {
                if let Some((box_id, side)) = state.find_handle_at(wx, wy) {
                    return Hit::Handle(box_id, side);
                }
            }
            if let Some(box_id) = state.find_resize_grip_at(wx, wy) {
                return Hit::Grip(box_id);
            }
            if let Some((box_id, grab_x, grab_y)) = state.find_box_at(wx, wy) {
                return Hit::Box(box_id, grab_x, grab_y);
            }
            if let Some(conn_id) = state.find_connection_at(wx, wy) {
                return Hit::Connection(conn_id);
            }
            Hit::Empty
        });

        match hit {
            Hit::Handle(box_id, side) => {
                dispatch_global_message(Message::StartConnecting { box_id, side });
            }
            Hit::Grip(box_id) => {
                let (wx, wy) = APP_STATE.with(|s| s.borrow().screen_to_world(x, y));
                dispatch_global_message(Message::StartBoxResize {
                    box_id,
                    mouse_x: wx,
                    mouse_y: wy,
                });
            }
            Hit::Box(box_id, grab_x, grab_y) => {
                *click_track_down.borrow_mut() = Some((x, y, ClickTarget::Box(box_id.clone())));
                dispatch_global_message(Message::StartBoxDrag {
                    box_id,
                    grab_x,
                    grab_y,
                });
            }
            Hit::Connection(conn_id) => {
                dispatch_global_message(Message::SelectConnection(conn_id));
            }
            Hit::Empty => {
                *click_track_down.borrow_mut() = Some((x, y, ClickTarget::Empty));
                dispatch_global_message(Message::StartPan {
                    screen_x: x,
                    screen_y: y,
                });
            }
        }
    }) as Box<dyn FnMut(_)>);

    canvas.add_event_listener_with_callback("mousedown", mousedown_handler.as_ref().unchecked_ref())?;
    mousedown_handler.forget();

    // Mouse move: only forwarded while an interactive mode is active
    let mousemove_handler = Closure::wrap(Box::new(move |event: MouseEvent| {
        let active = APP_STATE.with(|state| state.borrow().interaction != Interaction::Idle);
        if !active {
            return;
        }
        let x = event.offset_x() as f64;
        let y = event.offset_y() as f64;
        let (wx, wy) = APP_STATE.with(|state| state.borrow().screen_to_world(x, y));
        dispatch_global_message(Message::PointerMoved {
            world_x: wx,
            world_y: wy,
            screen_x: x,
            screen_y: y,
        });
    }) as Box<dyn FnMut(_)>);

    canvas.add_event_listener_with_callback("mousemove", mousemove_handler.as_ref().unchecked_ref())?;
    mousemove_handler.forget();

    // Mouse up: release the active mode, then resolve clicks
    let click_track_up = click_track.clone();
    let mouseup_handler = Closure::wrap(Box::new(move |event: MouseEvent| {
        let x = event.offset_x() as f64;
        let y = event.offset_y() as f64;
        let (wx, wy) = APP_STATE.with(|state| state.borrow().screen_to_world(x, y));
        dispatch_global_message(Message::PointerReleased {
            world_x: wx,
            world_y: wy,
        });

        if let Some((start_x, start_y, target)) = click_track_up.borrow_mut().take() {
            let dx = x - start_x;
            let dy = y - start_y;
            // 5px threshold between a click and a drag
            if dx * dx + dy * dy < 25.0 {
                match target {
                    ClickTarget::Box(box_id) => {
                        dispatch_global_message(Message::SelectBox(box_id));
                    }
                    ClickTarget::Empty => {
                        dispatch_global_message(Message::ClearSelection);
                    }
                }
            }
        }
    }) as Box<dyn FnMut(_)>);

    canvas.add_event_listener_with_callback("mouseup", mouseup_handler.as_ref().unchecked_ref())?;
    mouseup_handler.forget();

    // Wheel: zoom around the cursor
    let wheel_handler = Closure::wrap(Box::new(move |event: web_sys::WheelEvent| {
        let x = event.offset_x() as f64;
        let y = event.offset_y() as f64;

        let (zoom_level, world_x, world_y) = APP_STATE.with(|state| {
            let state = state.borrow();
            let (wx, wy) = state.screen_to_world(x, y);
            (state.zoom_level, wx, wy)
        });

        let zoom_delta = if event.delta_y() > 0.0 { 0.9 } else { 1.1 };
        let new_zoom = (zoom_level * zoom_delta).clamp(MIN_ZOOM, MAX_ZOOM);

        // Keep the point under the cursor fixed while zooming
        let new_viewport_x = world_x - x / new_zoom;
        let new_viewport_y = world_y - y / new_zoom;

        dispatch_global_message(Message::ZoomCanvas {
            new_zoom,
            viewport_x: new_viewport_x,
            viewport_y: new_viewport_y,
        });
    }) as Box<dyn FnMut(_)>);

    let options = AddEventListenerOptions::new();
    canvas.add_event_listener_with_callback_and_add_event_listener_options(
        "wheel",
        wheel_handler.as_ref().unchecked_ref(),
        &options,
    )?;
    wheel_handler.forget();

    Ok(())
}

/// Document-level pointer handlers so popup drags and pans keep tracking
/// when the cursor leaves the canvas.
pub fn setup_document_mouse_events(document: &Document) -> Result<(), JsValue> {
    let mousemove_handler = Closure::wrap(Box::new(move |event: MouseEvent| {
        let popup_mode = APP_STATE.with(|state| {
            matches!(
                state.borrow().interaction,
                Interaction::DraggingPopup { .. } | Interaction::ResizingPopup { .. }
            )
        });
        if !popup_mode {
            return;
        }
        let (x, y) = container_coords(event);
        let (wx, wy) = APP_STATE.with(|state| state.borrow().screen_to_world(x, y));
        dispatch_global_message(Message::PointerMoved {
            world_x: wx,
            world_y: wy,
            screen_x: x,
            screen_y: y,
        });
    }) as Box<dyn FnMut(_)>);
    document.add_event_listener_with_callback("mousemove", mousemove_handler.as_ref().unchecked_ref())?;
    mousemove_handler.forget();

    let mouseup_handler = Closure::wrap(Box::new(move |event: MouseEvent| {
        let popup_mode = APP_STATE.with(|state| {
            matches!(
                state.borrow().interaction,
                Interaction::DraggingPopup { .. } | Interaction::ResizingPopup { .. }
            )
        });
        if !popup_mode {
            return;
        }
        let (x, y) = container_coords(event);
        let (wx, wy) = APP_STATE.with(|state| state.borrow().screen_to_world(x, y));
        dispatch_global_message(Message::PointerReleased {
            world_x: wx,
            world_y: wy,
        });
    }) as Box<dyn FnMut(_)>);
    document.add_event_listener_with_callback("mouseup", mouseup_handler.as_ref().unchecked_ref())?;
    mouseup_handler.forget();

    Ok(())
}

/// Pointer position relative to the canvas container, which is also the
/// popup coordinate space.
pub fn container_coords(event: MouseEvent) -> (f64, f64) {
    let rect = web_sys::window()
        .and_then(|w| w.document())
        .and_then(|d| d.get_element_by_id("canvas-container"))
        .map(|el| el.get_bounding_client_rect());
    match rect {
        Some(rect) => (
            event.client_x() as f64 - rect.left(),
            event.client_y() as f64 - rect.top(),
        ),
        None => (event.client_x() as f64, event.client_y() as f64),
    }
}

/// World coordinates of the visible canvas center, used when adding boxes
/// from the palette.
pub fn visible_center(state: &AppState) -> (f64, f64) {
    state.screen_to_world(state.canvas_width / 2.0, state.canvas_height / 2.0)
}
