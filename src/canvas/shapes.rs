use web_sys::CanvasRenderingContext2d;
use crate::models::{AgentBox, AgentKind, Side};
use crate::constants::*;
use super::geometry::{self, PathSpec, Point};

pub fn box_fill_color(kind: &AgentKind) -> &'static str {
    match kind {
        AgentKind::Coordinator => BOX_COLOR_COORDINATOR,
        AgentKind::Coder => BOX_COLOR_CODER,
        AgentKind::Tester => BOX_COLOR_TESTER,
        AgentKind::Runner => BOX_COLOR_RUNNER,
        AgentKind::Custom(_) => BOX_COLOR_CUSTOM,
    }
}

// Creates a rounded rectangle path without filling or stroking
pub fn rounded_rect_path(context: &CanvasRenderingContext2d, x: f64, y: f64, width: f64, height: f64) {
    let radius = 10.0;
    context.begin_path();
    context.move_to(x + radius, y);
    context.line_to(x + width - radius, y);
    context.quadratic_curve_to(x + width, y, x + width, y + radius);
    context.line_to(x + width, y + height - radius);
    context.quadratic_curve_to(x + width, y + height, x + width - radius, y + height);
    context.line_to(x + radius, y + height);
    context.quadratic_curve_to(x, y + height, x, y + height - radius);
    context.line_to(x, y + radius);
    context.quadratic_curve_to(x, y, x + radius, y);
    context.close_path();
}

pub fn draw_agent_box(context: &CanvasRenderingContext2d, bx: &AgentBox, selected: bool) {
    context.save();

    // Shadow for depth
    context.set_shadow_color(SHADOW_COLOR);
    context.set_shadow_blur(8.0);
    context.set_shadow_offset_x(0.0);
    context.set_shadow_offset_y(2.0);

    context.set_fill_style_str(box_fill_color(&bx.kind));
    rounded_rect_path(context, bx.x, bx.y, bx.width, bx.height);
    context.fill();

    // Remove shadow for border
    context.set_shadow_blur(0.0);
    context.set_shadow_offset_x(0.0);
    context.set_shadow_offset_y(0.0);

    context.set_line_width(1.5);
    context.set_stroke_style_str(BOX_BORDER_DEFAULT);

    if selected {
        context.set_stroke_style_str(BOX_BORDER_SELECTED);
        context.set_line_width(2.5);
        context.set_shadow_color(BOX_BORDER_SELECTED);
        context.set_shadow_blur(4.0);
    } else if bx.pinned {
        context.set_stroke_style_str(BOX_BORDER_PINNED);
        context.set_line_width(2.0);
    }

    rounded_rect_path(context, bx.x, bx.y, bx.width, bx.height);
    context.stroke();

    context.restore();

    draw_box_labels(context, bx);
    draw_resize_grip(context, bx);
}

fn draw_box_labels(context: &CanvasRenderingContext2d, bx: &AgentBox) {
    context.save();

    context.set_fill_style_str(BOX_TEXT_COLOR);
    context.set_text_align("left");
    context.set_text_baseline("top");

    // Kind header
    context.set_font("600 14px system-ui, -apple-system, sans-serif");
    let _ = context.fill_text(bx.kind.as_str(), bx.x + 12.0, bx.y + 10.0);

    // Role line
    context.set_font("400 12px system-ui, -apple-system, sans-serif");
    let _ = context.fill_text(&bx.role, bx.x + 12.0, bx.y + 30.0);

    // Model badge, bottom-left
    if let Some(model) = &bx.model {
        context.set_font("400 11px system-ui, -apple-system, sans-serif");
        context.set_fill_style_str("#607d8b");
        let _ = context.fill_text(model, bx.x + 12.0, bx.y + bx.height - 18.0);
    }

    // Free-text description, word-wrapped into the remaining area
    if let Some(description) = &bx.description {
        context.set_font("400 12px system-ui, -apple-system, sans-serif");
        context.set_fill_style_str(BOX_TEXT_COLOR);
        draw_wrapped_text(
            context,
            description,
            bx.x + 12.0,
            bx.y + 50.0,
            bx.width - 24.0,
            bx.y + bx.height - 24.0,
        );
    }

    context.restore();
}

// Word-wrap using measured text widths; stops when the vertical budget runs out.
fn draw_wrapped_text(
    context: &CanvasRenderingContext2d,
    text: &str,
    x: f64,
    y: f64,
    max_width: f64,
    max_y: f64,
) {
    let line_height = 16.0;
    let words = text.split_whitespace().collect::<Vec<&str>>();
    let mut current_line = String::new();
    let mut current_y = y;

    for word in words {
        let test_line = if current_line.is_empty() {
            word.to_string()
        } else {
            format!("{} {}", current_line, word)
        };

        let width = context
            .measure_text(&test_line)
            .map(|m| m.width())
            .unwrap_or(0.0);

        if width > max_width && !current_line.is_empty() {
            let _ = context.fill_text(&current_line, x, current_y);
            current_line = word.to_string();
            current_y += line_height;
            if current_y > max_y {
                return;
            }
        } else {
            current_line = test_line;
        }
    }

    if !current_line.is_empty() && current_y <= max_y {
        let _ = context.fill_text(&current_line, x, current_y);
    }
}

fn draw_resize_grip(context: &CanvasRenderingContext2d, bx: &AgentBox) {
    let gx = bx.x + bx.width - RESIZE_GRIP_SIZE;
    let gy = bx.y + bx.height - RESIZE_GRIP_SIZE;

    context.save();
    context.set_stroke_style_str(HANDLE_COLOR);
    context.set_line_width(1.0);
    for i in 0..3 {
        let offset = 3.0 + i as f64 * 4.0;
        context.begin_path();
        context.move_to(gx + offset, bx.y + bx.height - 2.0);
        context.line_to(bx.x + bx.width - 2.0, gy + offset);
        context.stroke();
    }
    context.restore();
}

/// Connection handles on the four side midpoints; only drawn in connect mode.
pub fn draw_handles(context: &CanvasRenderingContext2d, bx: &AgentBox, active: Option<Side>) {
    context.save();
    for side in Side::ALL {
        let p = geometry::anchor_point(bx, side);
        context.begin_path();
        let _ = context.arc(p.x, p.y, HANDLE_RADIUS, 0.0, 2.0 * std::f64::consts::PI);
        if active == Some(side) {
            context.set_fill_style_str(HANDLE_COLOR_ACTIVE);
        } else {
            context.set_fill_style_str(HANDLE_COLOR);
        }
        context.fill();
    }
    context.restore();
}

pub fn draw_connection_path(
    context: &CanvasRenderingContext2d,
    spec: &PathSpec,
    selected: bool,
) {
    context.begin_path();
    context.move_to(spec.start.x, spec.start.y);
    context.bezier_curve_to(
        spec.control1.x,
        spec.control1.y,
        spec.control2.x,
        spec.control2.y,
        spec.end.x,
        spec.end.y,
    );
    if selected {
        context.set_stroke_style_str(CONNECTION_LINE_SELECTED);
        context.set_line_width(3.0);
    } else {
        context.set_stroke_style_str(CONNECTION_LINE_COLOR);
        context.set_line_width(2.0);
    }
    context.stroke();

    draw_arrow_head(context, spec, selected);
    draw_midpoint_marker(context, spec, selected);
}

// Arrow head at the end point, oriented along the final curve segment.
fn draw_arrow_head(context: &CanvasRenderingContext2d, spec: &PathSpec, selected: bool) {
    let tail = geometry::bezier_point(spec, 0.95);
    let dx = spec.end.x - tail.x;
    let dy = spec.end.y - tail.y;
    let angle = f64::atan2(dy, dx);
    let head_len = 10.0;

    context.begin_path();
    context.move_to(spec.end.x, spec.end.y);
    context.line_to(
        spec.end.x - head_len * f64::cos(angle - std::f64::consts::PI / 6.0),
        spec.end.y - head_len * f64::sin(angle - std::f64::consts::PI / 6.0),
    );
    context.move_to(spec.end.x, spec.end.y);
    context.line_to(
        spec.end.x - head_len * f64::cos(angle + std::f64::consts::PI / 6.0),
        spec.end.y - head_len * f64::sin(angle + std::f64::consts::PI / 6.0),
    );
    context.set_stroke_style_str(if selected {
        CONNECTION_LINE_SELECTED
    } else {
        CONNECTION_LINE_COLOR
    });
    context.set_line_width(2.0);
    context.stroke();
}

fn draw_midpoint_marker(context: &CanvasRenderingContext2d, spec: &PathSpec, selected: bool) {
    let mid = geometry::path_midpoint(spec);
    context.begin_path();
    let _ = context.arc(mid.x, mid.y, CONNECTION_MARKER_RADIUS, 0.0, 2.0 * std::f64::consts::PI);
    context.set_fill_style_str(if selected {
        CONNECTION_LINE_SELECTED
    } else {
        CONNECTION_LINE_COLOR
    });
    context.fill();
}

/// Dashed preview from a fixed anchor to the live cursor while connecting.
pub fn draw_rubber_band(context: &CanvasRenderingContext2d, from: Point, to: Point) {
    let spec = geometry::curved_path(from, to);

    context.save();
    let dash = js_sys::Array::of2(
        &wasm_bindgen::JsValue::from_f64(6.0),
        &wasm_bindgen::JsValue::from_f64(4.0),
    );
    let _ = context.set_line_dash(dash.as_ref());

    context.begin_path();
    context.move_to(spec.start.x, spec.start.y);
    context.bezier_curve_to(
        spec.control1.x,
        spec.control1.y,
        spec.control2.x,
        spec.control2.y,
        spec.end.x,
        spec.end.y,
    );
    context.set_stroke_style_str(RUBBER_BAND_COLOR);
    context.set_line_width(2.0);
    context.stroke();
    context.restore();
}
