use crate::constants::*;
use crate::models::Connection;
use crate::state::{AppState, Interaction, Theme};
use super::geometry::{self, PathSpec};
use super::shapes;

/// Redraws the whole scene from the model. Nothing is cached between
/// frames; paths and handle positions are recomputed from current state.
pub fn draw_canvas(state: &AppState) {
    let (canvas_el, context) = match (&state.canvas, &state.context) {
        (Some(canvas), Some(context)) => (canvas, context),
        _ => return,
    };

    let background = match state.theme {
        Theme::Light => CANVAS_BACKGROUND_LIGHT,
        Theme::Dark => CANVAS_BACKGROUND_DARK,
    };
    let _ = canvas_el.style().set_property("background-color", background);

    context.save();
    let _ = context.set_transform(1.0, 0.0, 0.0, 1.0, 0.0, 0.0);
    context.set_fill_style_str(background);
    context.fill_rect(0.0, 0.0, canvas_el.width() as f64, canvas_el.height() as f64);
    context.restore();

    let window = match web_sys::window() {
        Some(w) => w,
        None => return,
    };
    let dpr = window.device_pixel_ratio();

    context.save();
    let _ = context.set_transform(1.0, 0.0, 0.0, 1.0, 0.0, 0.0);
    let _ = context.scale(dpr, dpr);
    let _ = context.scale(state.zoom_level, state.zoom_level);
    let _ = context.translate(-state.viewport_x, -state.viewport_y);

    // Connections go underneath the boxes
    for conn in &state.connections {
        if let Some(spec) = connection_path(state, conn) {
            let selected = state.selected_connection_id() == Some(conn.id.as_str());
            shapes::draw_connection_path(context, &spec, selected);
        }
    }

    for id in &state.box_order {
        if let Some(bx) = state.boxes.get(id) {
            let selected = state.selected_box_id() == Some(id.as_str());
            shapes::draw_agent_box(context, bx, selected);
            if state.connect_mode {
                let active = match &state.interaction {
                    Interaction::Connecting {
                        from_box,
                        from_side,
                        ..
                    } if from_box == id => Some(*from_side),
                    _ => None,
                };
                shapes::draw_handles(context, bx, active);
            }
        }
    }

    // Rubber-band preview while a connection is being dragged out
    if let Interaction::Connecting {
        from_box,
        from_side,
        cursor,
    } = &state.interaction
    {
        if let Some(bx) = state.boxes.get(from_box) {
            let from = geometry::anchor_point(bx, *from_side);
            shapes::draw_rubber_band(context, from, *cursor);
        }
    }

    context.restore();
}

/// World-space curve for a connection; `None` when an endpoint is gone.
/// The model cascades deletes, so this only covers mid-frame races.
pub fn connection_path(state: &AppState, conn: &Connection) -> Option<PathSpec> {
    let from = state.boxes.get(&conn.from_box)?;
    let to = state.boxes.get(&conn.to_box)?;
    Some(geometry::curved_path(
        geometry::anchor_point(from, conn.from_side),
        geometry::anchor_point(to, conn.to_side),
    ))
}
