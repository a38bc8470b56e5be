//! Points, bounding boxes, rotation and cubic bezier helpers.
//!
//! The y axis points up: "above" means a larger y.

use serde::Serialize;

use super::constants::BEZIER_SAMPLES;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Rotate this point by `angle` radians around `center`.
    pub fn rotated(self, angle: f64, center: Point) -> Point {
        let (s, c) = angle.sin_cos();
        let x = self.x - center.x;
        let y = self.y - center.y;
        Point {
            x: x * c - y * s + center.x,
            y: x * s + y * c + center.y,
        }
    }

    pub fn translated(self, dx: f64, dy: f64) -> Point {
        Point {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

/// An axis-aligned box with `x1 <= x2` and `y1 <= y2`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BoundingBox {
    /// Build a box from two corners given in any order.
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            x1: x1.min(x2),
            y1: y1.min(y2),
            x2: x1.max(x2),
            y2: y1.max(y2),
        }
    }

    /// Smallest box around a set of points.
    pub fn from_points(points: &[Point]) -> Option<Self> {
        let first = points.first()?;
        let mut b = BoundingBox::new(first.x, first.y, first.x, first.y);
        for p in &points[1..] {
            b.x1 = b.x1.min(p.x);
            b.x2 = b.x2.max(p.x);
            b.y1 = b.y1.min(p.y);
            b.y2 = b.y2.max(p.y);
        }
        Some(b)
    }

    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }

    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            x1: self.x1.min(other.x1),
            y1: self.y1.min(other.y1),
            x2: self.x2.max(other.x2),
            y2: self.y2.max(other.y2),
        }
    }

    pub fn translated(&self, dx: f64, dy: f64) -> BoundingBox {
        BoundingBox {
            x1: self.x1 + dx,
            y1: self.y1 + dy,
            x2: self.x2 + dx,
            y2: self.y2 + dy,
        }
    }

    /// Grow the box by `margin` on every side.
    pub fn inflated(&self, margin: f64) -> BoundingBox {
        BoundingBox {
            x1: self.x1 - margin,
            y1: self.y1 - margin,
            x2: self.x2 + margin,
            y2: self.y2 + margin,
        }
    }

    /// Drop the vertical extent, as a horizontal-only measurement does.
    pub fn flattened(&self) -> BoundingBox {
        BoundingBox {
            y1: 0.0,
            y2: 0.0,
            ..*self
        }
    }

    /// Whether the x-extents of the two boxes overlap.
    pub fn horizontal_overlap(&self, other: &BoundingBox) -> bool {
        self.x1 < other.x2 && other.x1 < self.x2
    }
}

// ── Bezier ──────────────────────────────────────────────────────────

/// Point on a cubic bezier at parameter `t`.
pub fn bezier_point(curve: &[Point; 4], t: f64) -> Point {
    let mt = 1.0 - t;
    let a = mt * mt * mt;
    let b = 3.0 * mt * mt * t;
    let c = 3.0 * mt * t * t;
    let d = t * t * t;
    Point {
        x: a * curve[0].x + b * curve[1].x + c * curve[2].x + d * curve[3].x,
        y: a * curve[0].y + b * curve[1].y + c * curve[2].y + d * curve[3].y,
    }
}

/// Height of a cubic bezier at `x`, taking `t` proportional to `x`
/// between the end points.
pub fn bezier_y_at(curve: &[Point; 4], x: f64) -> f64 {
    let span = curve[3].x - curve[0].x;
    let t = if span != 0.0 {
        ((x - curve[0].x) / span).clamp(0.0, 1.0)
    } else {
        0.0
    };
    bezier_point(curve, t).y
}

/// Box around the curve, sampled along its length.
pub fn bezier_bounds(curve: &[Point; 4]) -> BoundingBox {
    let mut b = BoundingBox::new(curve[0].x, curve[0].y, curve[3].x, curve[3].y);
    for i in 1..BEZIER_SAMPLES {
        let p = bezier_point(curve, i as f64 / BEZIER_SAMPLES as f64);
        b.x1 = b.x1.min(p.x);
        b.x2 = b.x2.max(p.x);
        b.y1 = b.y1.min(p.y);
        b.y2 = b.y2.max(p.y);
    }
    b
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;
    use proptest::prelude::*;

    #[test]
    fn rotation_quarter_turn() {
        let p = Point::new(2.0, 1.0).rotated(std::f64::consts::FRAC_PI_2, Point::new(1.0, 1.0));
        assert!(approx_eq!(f64, p.x, 1.0, epsilon = 1e-9));
        assert!(approx_eq!(f64, p.y, 2.0, epsilon = 1e-9));
    }

    #[test]
    fn horizontal_overlap_is_strict() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 5.0);
        let touching = BoundingBox::new(10.0, 0.0, 20.0, 5.0);
        let crossing = BoundingBox::new(9.0, 100.0, 20.0, 105.0);
        assert!(!a.horizontal_overlap(&touching));
        assert!(a.horizontal_overlap(&crossing));
    }

    #[test]
    fn flat_curve_has_mid_height_of_three_quarters() {
        // Control points at height h put the apex at 3/4 h.
        let curve = [
            Point::new(0.0, 0.0),
            Point::new(10.0, 40.0),
            Point::new(90.0, 40.0),
            Point::new(100.0, 0.0),
        ];
        assert!(approx_eq!(f64, bezier_y_at(&curve, 50.0), 30.0, epsilon = 1e-9));
        let b = bezier_bounds(&curve);
        assert!(approx_eq!(f64, b.y2, 30.0, epsilon = 1e-9));
        assert!(approx_eq!(f64, b.y1, 0.0));
    }

    fn point_strategy() -> impl Strategy<Value = Point> {
        (-1000.0f64..1000.0, -1000.0f64..1000.0).prop_map(|(x, y)| Point::new(x, y))
    }

    proptest! {
        #[test]
        fn rotation_roundtrip(p in point_strategy(), c in point_strategy(), angle in -3.0f64..3.0) {
            let back = p.rotated(angle, c).rotated(-angle, c);
            prop_assert!(approx_eq!(f64, back.x, p.x, epsilon = 1e-6));
            prop_assert!(approx_eq!(f64, back.y, p.y, epsilon = 1e-6));
        }

        #[test]
        fn union_contains_both(a in point_strategy(), b in point_strategy(), c in point_strategy()) {
            let b1 = BoundingBox::new(a.x, a.y, b.x, b.y);
            let b2 = BoundingBox::new(b.x, b.y, c.x, c.y);
            let u = b1.union(&b2);
            prop_assert!(u.x1 <= b1.x1 && u.x1 <= b2.x1);
            prop_assert!(u.y2 >= b1.y2 && u.y2 >= b2.y2);
        }
    }
}
