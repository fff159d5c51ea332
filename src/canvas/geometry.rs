//! Pure coordinate math for handle anchors and connection curves.
//!
//! Everything in here is deterministic and side-effect free; callers
//! guarantee box validity, so nothing returns a Result.

use crate::models::{AgentBox, Side};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: Point) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// A cubic Bezier in world coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PathSpec {
    pub start: Point,
    pub control1: Point,
    pub control2: Point,
    pub end: Point,
}

fn side_offsets(side: Side) -> (f64, f64) {
    match side {
        Side::Left => (0.0, 0.5),
        Side::Right => (1.0, 0.5),
        Side::Top => (0.5, 0.0),
        Side::Bottom => (0.5, 1.0),
    }
}

/// Midpoint of the requested side of a box.
pub fn anchor_point(bx: &AgentBox, side: Side) -> Point {
    let (ox, oy) = side_offsets(side);
    Point::new(bx.x + bx.width * ox, bx.y + bx.height * oy)
}

/// Builds an "S" curve between two points, oriented along the dominant
/// axis. Placing both control points at the midpoint of that axis keeps the
/// path from crossing itself when the endpoints are roughly aligned.
pub fn curved_path(p1: Point, p2: Point) -> PathSpec {
    let dx = p2.x - p1.x;
    let dy = p2.y - p1.y;

    let (control1, control2) = if dx.abs() >= dy.abs() {
        let mid_x = p1.x + dx / 2.0;
        (Point::new(mid_x, p1.y), Point::new(mid_x, p2.y))
    } else {
        let mid_y = p1.y + dy / 2.0;
        (Point::new(p1.x, mid_y), Point::new(p2.x, mid_y))
    };

    PathSpec {
        start: p1,
        control1,
        control2,
        end: p2,
    }
}

/// Evaluates the curve at parameter `t` in [0, 1].
pub fn bezier_point(spec: &PathSpec, t: f64) -> Point {
    let u = 1.0 - t;
    let b0 = u * u * u;
    let b1 = 3.0 * u * u * t;
    let b2 = 3.0 * u * t * t;
    let b3 = t * t * t;
    Point::new(
        b0 * spec.start.x + b1 * spec.control1.x + b2 * spec.control2.x + b3 * spec.end.x,
        b0 * spec.start.y + b1 * spec.control1.y + b2 * spec.control2.y + b3 * spec.end.y,
    )
}

/// Curve midpoint, used for the selection marker and default popup anchor.
pub fn path_midpoint(spec: &PathSpec) -> Point {
    bezier_point(spec, 0.5)
}

const HIT_TEST_SAMPLES: usize = 24;

/// Whether `p` lies within `tolerance` of the sampled curve.
pub fn point_near_path(spec: &PathSpec, p: Point, tolerance: f64) -> bool {
    let mut prev = spec.start;
    for i in 1..=HIT_TEST_SAMPLES {
        let t = i as f64 / HIT_TEST_SAMPLES as f64;
        let next = bezier_point(spec, t);
        if distance_to_segment(p, prev, next) <= tolerance {
            return true;
        }
        prev = next;
    }
    false
}

fn distance_to_segment(p: Point, a: Point, b: Point) -> f64 {
    let abx = b.x - a.x;
    let aby = b.y - a.y;
    let len_sq = abx * abx + aby * aby;
    if len_sq == 0.0 {
        return p.distance_to(a);
    }
    let t = (((p.x - a.x) * abx + (p.y - a.y) * aby) / len_sq).clamp(0.0, 1.0);
    p.distance_to(Point::new(a.x + t * abx, a.y + t * aby))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AgentKind;
    use proptest::prelude::*;

    fn sample_box(x: f64, y: f64, width: f64, height: f64) -> AgentBox {
        AgentBox {
            id: "box".to_string(),
            x,
            y,
            width,
            height,
            kind: AgentKind::Coder,
            role: "Python Developer".to_string(),
            model: None,
            description: None,
            pinned: false,
        }
    }

    #[test]
    fn test_anchor_points_per_side() {
        let bx = sample_box(10.0, 20.0, 200.0, 100.0);
        assert_eq!(anchor_point(&bx, Side::Left), Point::new(10.0, 70.0));
        assert_eq!(anchor_point(&bx, Side::Right), Point::new(210.0, 70.0));
        assert_eq!(anchor_point(&bx, Side::Top), Point::new(110.0, 20.0));
        assert_eq!(anchor_point(&bx, Side::Bottom), Point::new(110.0, 120.0));
    }

    #[test]
    fn test_horizontal_dominant_curve_uses_x_midpoints() {
        let spec = curved_path(Point::new(0.0, 0.0), Point::new(100.0, 20.0));
        assert_eq!(spec.control1, Point::new(50.0, 0.0));
        assert_eq!(spec.control2, Point::new(50.0, 20.0));
    }

    #[test]
    fn test_vertical_dominant_curve_uses_y_midpoints() {
        let spec = curved_path(Point::new(0.0, 0.0), Point::new(20.0, 100.0));
        assert_eq!(spec.control1, Point::new(0.0, 50.0));
        assert_eq!(spec.control2, Point::new(20.0, 50.0));
    }

    #[test]
    fn test_midpoint_of_symmetric_curve() {
        let spec = curved_path(Point::new(0.0, 0.0), Point::new(100.0, 0.0));
        let mid = path_midpoint(&spec);
        assert!((mid.x - 50.0).abs() < 1e-9);
        assert!(mid.y.abs() < 1e-9);
    }

    #[test]
    fn test_point_near_path_hit_and_miss() {
        let spec = curved_path(Point::new(0.0, 0.0), Point::new(100.0, 0.0));
        assert!(point_near_path(&spec, Point::new(50.0, 3.0), 6.0));
        assert!(!point_near_path(&spec, Point::new(50.0, 40.0), 6.0));
    }

    proptest! {
        // Anchors must lie exactly on the box boundary for every side.
        #[test]
        fn prop_anchor_on_boundary(
            x in -1000.0f64..1000.0,
            y in -1000.0f64..1000.0,
            width in 120.0f64..800.0,
            height in 60.0f64..600.0,
        ) {
            let bx = sample_box(x, y, width, height);
            for side in Side::ALL {
                let p = anchor_point(&bx, side);
                let on_vertical_edge =
                    (p.x == bx.x || p.x == bx.x + bx.width) && p.y >= bx.y && p.y <= bx.y + bx.height;
                let on_horizontal_edge =
                    (p.y == bx.y || p.y == bx.y + bx.height) && p.x >= bx.x && p.x <= bx.x + bx.width;
                prop_assert!(on_vertical_edge || on_horizontal_edge);
            }
        }

        // Identical endpoints must always produce an identical path.
        #[test]
        fn prop_curved_path_deterministic(
            x1 in -500.0f64..500.0,
            y1 in -500.0f64..500.0,
            x2 in -500.0f64..500.0,
            y2 in -500.0f64..500.0,
        ) {
            let a = curved_path(Point::new(x1, y1), Point::new(x2, y2));
            let b = curved_path(Point::new(x1, y1), Point::new(x2, y2));
            prop_assert_eq!(a, b);
        }

        // The curve interpolates its endpoints.
        #[test]
        fn prop_curve_endpoints(
            x1 in -500.0f64..500.0,
            y1 in -500.0f64..500.0,
            x2 in -500.0f64..500.0,
            y2 in -500.0f64..500.0,
        ) {
            let spec = curved_path(Point::new(x1, y1), Point::new(x2, y2));
            prop_assert_eq!(bezier_point(&spec, 0.0), spec.start);
            prop_assert_eq!(bezier_point(&spec, 1.0), spec.end);
        }
    }
}
